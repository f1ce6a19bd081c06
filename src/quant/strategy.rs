//! # Strategy
//!
//! $$
//! \mathbf{w}_t = \operatorname{Opt}_k\big(\hat{\mathcal{I}}(\mathcal{W}_t)\big)
//! $$
//!
//! A shared price panel, a lookback window, an estimator and one optimizer kind.

use std::sync::Arc;

use anyhow::ensure;
use anyhow::Result;
use chrono::NaiveDateTime;
use rayon::prelude::*;
use tracing::info;

use super::portfolio::optimizers::OptimizerKind;
use super::portfolio::optimizers::PortfolioOptimizer;
use super::portfolio::optimizers::RiskAversionParams;
use super::portfolio::solver::SolverConfig;
use super::portfolio::types::Portfolio;
use crate::data::panel::PricePanel;
use crate::data::window::InformationWindow;
use crate::stats::estimator::StatisticsEstimator;
use crate::stats::information::InformationSet;
use crate::traits::Information;

#[derive(Clone, Debug)]
pub struct Strategy {
  panel: Arc<PricePanel>,
  window: InformationWindow,
  estimator: StatisticsEstimator,
  optimizer: PortfolioOptimizer,
}

impl Strategy {
  pub fn new(
    panel: Arc<PricePanel>,
    window: InformationWindow,
    estimator: StatisticsEstimator,
    optimizer: PortfolioOptimizer,
  ) -> Self {
    Self {
      panel,
      window,
      estimator,
      optimizer,
    }
  }

  fn preset(panel: Arc<PricePanel>, window: InformationWindow, kind: OptimizerKind) -> Self {
    let estimator = StatisticsEstimator::default().with_higher_moments(kind.requires_kurtosis());
    Self::new(panel, window, estimator, PortfolioOptimizer::new(kind))
  }

  pub fn minimum_variance(panel: Arc<PricePanel>, window: InformationWindow) -> Self {
    Self::preset(panel, window, OptimizerKind::MinimumVariance)
  }

  /// Risk aversion with minimum return and VaR constraints, default parameters.
  pub fn risk_aversion_var(panel: Arc<PricePanel>, window: InformationWindow) -> Self {
    Self::preset(
      panel,
      window,
      OptimizerKind::RiskAversionVaR(RiskAversionParams::default()),
    )
  }

  pub fn max_sharpe(panel: Arc<PricePanel>, window: InformationWindow) -> Self {
    Self::preset(panel, window, OptimizerKind::MaxSharpe)
  }

  /// Estimates higher moments as well.
  pub fn min_kurtosis(panel: Arc<PricePanel>, window: InformationWindow) -> Self {
    Self::preset(panel, window, OptimizerKind::MinKurtosis)
  }

  pub fn with_solver(mut self, solver: SolverConfig) -> Self {
    self.optimizer = self.optimizer.with_solver(solver);
    self
  }

  pub fn with_risk_free(mut self, risk_free: f64) -> Self {
    self.optimizer = self.optimizer.with_risk_free(risk_free);
    self
  }

  pub fn estimator(&self) -> &StatisticsEstimator {
    &self.estimator
  }

  pub fn optimizer(&self) -> &PortfolioOptimizer {
    &self.optimizer
  }

  pub fn kind(&self) -> OptimizerKind {
    self.optimizer.kind()
  }

  /// Information set and portfolio at `t` in one call.
  pub fn compute_weights(&self, t: NaiveDateTime) -> Result<Portfolio> {
    let info = self.compute_information(t)?;
    Ok(self.compute_portfolio(t, &info))
  }

  /// [`Strategy::compute_weights`] for every date, in parallel, in input order.
  pub fn compute_portfolios(&self, dates: &[NaiveDateTime]) -> Result<Vec<Portfolio>> {
    dates.par_iter().map(|t| self.compute_weights(*t)).collect()
  }
}

impl Information for Strategy {
  fn window(&self) -> &InformationWindow {
    &self.window
  }

  fn panel(&self) -> &PricePanel {
    &self.panel
  }

  /// Fails only when the panel holds no assets at all.
  fn compute_information(&self, t: NaiveDateTime) -> Result<InformationSet> {
    ensure!(!self.panel.is_empty(), "price panel contains no assets");
    self.estimator.estimate(&self.slice_data(t))
  }

  fn compute_portfolio(&self, t: NaiveDateTime, information: &InformationSet) -> Portfolio {
    let portfolio = self.optimizer.optimize(information);
    info!(
      %t,
      kind = %self.optimizer.kind(),
      assets = portfolio.len(),
      status = %portfolio.status(),
      iterations = portfolio.iterations(),
      "portfolio computed"
    );
    portfolio
  }
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;
  use chrono::NaiveDate;
  use tracing_test::traced_test;

  use super::*;
  use crate::data::panel::PriceRow;
  use crate::quant::portfolio::types::SolveStatus;

  fn day(d: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, d)
      .and_then(|d| d.and_hms_opt(0, 0, 0))
      .unwrap()
  }

  fn two_asset_panel() -> Arc<PricePanel> {
    let a = [100.0, 102.0, 101.0, 104.0, 106.0];
    let b = [50.0, 50.5, 51.5, 51.0, 52.0];
    let rows = (0..5).flat_map(|i| {
      let d = day(i as u32 + 1);
      [PriceRow::flat(d, "A", a[i]), PriceRow::flat(d, "B", b[i])]
    });
    Arc::new(PricePanel::from_rows(rows))
  }

  fn window() -> InformationWindow {
    InformationWindow::days(10).unwrap()
  }

  #[test]
  fn two_asset_example() {
    let strategy = Strategy::minimum_variance(two_asset_panel(), window());
    let info = strategy.compute_information(day(6)).unwrap();

    assert_eq!(info.companies(), &["A", "B"]);
    assert_eq!(info.covariance().dim(), (2, 2));
    assert!(info.expected_return_of("A") != info.expected_return_of("B"));

    for strategy in [
      Strategy::minimum_variance(two_asset_panel(), window()),
      Strategy::max_sharpe(two_asset_panel(), window()),
    ] {
      let p = strategy.compute_weights(day(6)).unwrap();
      let w = p.dense_weights().expect("converged");
      assert_eq!(w.len(), 2);
      assert!(w.iter().all(|v| *v >= 0.0));
      assert_abs_diff_eq!(w.iter().sum::<f64>(), 1.0, epsilon = 1e-6);
    }
  }

  #[test]
  fn bar_at_reference_time_is_not_seen() {
    let base = two_asset_panel();
    let mut rows: Vec<PriceRow> = base.rows().collect();
    rows.push(PriceRow::flat(day(6), "A", 1.0e6));
    let shocked = Arc::new(PricePanel::from_rows(rows));

    let clean = Strategy::minimum_variance(base, window())
      .compute_information(day(6))
      .unwrap();
    let with_shock = Strategy::minimum_variance(shocked, window())
      .compute_information(day(6))
      .unwrap();

    assert_eq!(clean.expected_return(), with_shock.expected_return());
    assert_eq!(clean.covariance(), with_shock.covariance());
  }

  #[test]
  fn single_observation_is_insufficient() {
    let rows = [PriceRow::flat(day(1), "A", 10.0), PriceRow::flat(day(1), "B", 20.0)];
    let strategy = Strategy::max_sharpe(Arc::new(PricePanel::from_rows(rows)), window());

    let p = strategy.compute_weights(day(2)).unwrap();

    assert_eq!(p.status(), SolveStatus::InsufficientData);
    assert_eq!(p.len(), 2);
    assert!(p.weights().iter().all(Option::is_none));
  }

  #[test]
  fn empty_panel_is_an_error() {
    let strategy = Strategy::minimum_variance(Arc::new(PricePanel::default()), window());
    assert!(strategy.compute_information(day(6)).is_err());
    assert!(strategy.compute_weights(day(6)).is_err());
  }

  #[test]
  fn window_before_any_data_gives_empty_portfolio() {
    let strategy = Strategy::minimum_variance(two_asset_panel(), window());
    let p = strategy.compute_weights(day(1)).unwrap();
    assert!(p.is_empty());
    assert_eq!(p.status(), SolveStatus::InsufficientData);
  }

  #[test]
  fn kurtosis_preset_estimates_higher_moments() {
    let strategy = Strategy::min_kurtosis(two_asset_panel(), window());
    assert!(strategy.estimator().config().higher_moments);

    let info = strategy.compute_information(day(6)).unwrap();
    assert!(info.kurtosis().is_some());
    assert!(!Strategy::max_sharpe(two_asset_panel(), window())
      .estimator()
      .config()
      .higher_moments);
  }

  #[test]
  #[traced_test]
  fn parallel_dates_keep_input_order() {
    let strategy = Strategy::minimum_variance(two_asset_panel(), window());
    let dates = [day(6), day(1), day(4)];

    let batch = strategy.compute_portfolios(&dates).unwrap();

    assert_eq!(batch.len(), 3);
    for (t, p) in dates.iter().zip(&batch) {
      let single = strategy.compute_weights(*t).unwrap();
      assert_eq!(p.status(), single.status());
      assert_eq!(p.weights(), single.weights());
    }
    assert!(logs_contain("portfolio computed"));
  }

  #[test]
  fn risk_aversion_preset_returns_on_daily_data() {
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;

    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use rand_distr::Distribution;
    use rand_distr::StandardNormal;

    let mut rng = StdRng::seed_from_u64(7);
    let mut prices = [100.0; 6];
    let mut rows = Vec::new();
    for d in 0..150 {
      let ts = day(1) + chrono::TimeDelta::days(d);
      let market: f64 = StandardNormal.sample(&mut rng);
      for (j, price) in prices.iter_mut().enumerate() {
        let own: f64 = StandardNormal.sample(&mut rng);
        *price *= 1.0 + 0.0004 + 0.015 * (0.7 * market + 0.7 * own);
        rows.push(PriceRow::flat(ts, format!("S{j}"), *price));
      }
    }
    let panel = Arc::new(PricePanel::from_rows(rows));
    let strategy = Strategy::risk_aversion_var(panel, InformationWindow::days(90).unwrap());
    let t = day(1) + chrono::TimeDelta::days(120);

    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
      let _ = tx.send(strategy.compute_weights(t));
    });
    let p = rx
      .recv_timeout(Duration::from_secs(60))
      .expect("solve finished within its evaluation budget")
      .unwrap();

    assert_eq!(p.status(), SolveStatus::NotConverged);
    assert_eq!(p.len(), 6);
    assert!(p.weights().iter().all(Option::is_none));
  }
}
