//! # Statistics Estimator
//!
//! $$
//! r_{i,k} = \frac{p_{i,k}}{p_{i,k-1}} - 1,\qquad
//! \hat\mu_i = \overline{r_{i,\cdot}},\qquad
//! \hat\Sigma = \operatorname{cov}\big(R^{\text{clean}}\big)
//! $$
//!
//! Turns a windowed panel view into an [`InformationSet`].
//!
//! Expected returns are grouped by asset before averaging. The covariance uses
//! the wide `timestamp x asset` price matrix with every incomplete timestamp
//! dropped (inner join over time). Both are laid out in the same sorted
//! company order.

use std::collections::BTreeMap;

use anyhow::Result;
use chrono::NaiveDateTime;
use ndarray::Array1;
use ndarray::Array2;
use tracing::debug;

use super::information::InformationSet;
use super::moments::excess_kurtosis;
use super::moments::mean;
use super::moments::sample_covariance;
use super::moments::simple_returns;
use super::moments::skewness;
use crate::data::panel::PanelView;
use crate::data::panel::PriceField;

/// Runtime configuration for [`StatisticsEstimator`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EstimatorConfig {
  /// Price column returns are computed from.
  pub price_field: PriceField,
  /// Also estimate skewness and excess kurtosis.
  pub higher_moments: bool,
}

impl Default for EstimatorConfig {
  fn default() -> Self {
    Self {
      price_field: PriceField::Close,
      higher_moments: false,
    }
  }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct StatisticsEstimator {
  config: EstimatorConfig,
}

impl StatisticsEstimator {
  pub fn new(config: EstimatorConfig) -> Self {
    Self { config }
  }

  pub fn with_higher_moments(mut self, enabled: bool) -> Self {
    self.config.higher_moments = enabled;
    self
  }

  pub fn config(&self) -> &EstimatorConfig {
    &self.config
  }

  /// Estimate the information set of `view`.
  ///
  /// An empty view gives an empty set. Too few observations give `NaN` entries
  /// rather than an error; check [`InformationSet::is_sufficient`].
  pub fn estimate(&self, view: &PanelView<'_>) -> Result<InformationSet> {
    let mut by_asset: BTreeMap<&str, Vec<(NaiveDateTime, f64)>> = BTreeMap::new();
    for (ts, asset, price) in view.observations(self.config.price_field) {
      if price.is_finite() {
        by_asset.entry(asset).or_default().push((ts, price));
      }
    }

    if by_asset.is_empty() {
      return Ok(InformationSet::empty());
    }

    for series in by_asset.values_mut() {
      series.sort_by_key(|(ts, _)| *ts);
    }

    // column order of the wide matrix; every per-asset vector follows it
    let companies: Vec<String> = by_asset.keys().map(|a| a.to_string()).collect();
    let n = companies.len();

    let returns: Vec<Vec<f64>> = by_asset
      .values()
      .map(|series| {
        let prices: Vec<f64> = series.iter().map(|(_, p)| *p).collect();
        simple_returns(&prices)
      })
      .collect();
    let expected_return: Array1<f64> = returns.iter().map(|r| mean(r)).collect();

    let mut wide: BTreeMap<NaiveDateTime, Vec<Option<f64>>> = BTreeMap::new();
    for (j, series) in by_asset.values().enumerate() {
      for &(ts, price) in series {
        wide.entry(ts).or_insert_with(|| vec![None; n])[j] = Some(price);
      }
    }
    let clean: Vec<Vec<f64>> = wide
      .into_values()
      .filter_map(|row| row.into_iter().collect::<Option<Vec<f64>>>())
      .collect();

    let clean_returns: Vec<f64> = clean
      .windows(2)
      .map(|w| {
        w[0]
          .iter()
          .zip(&w[1])
          .map(|(p0, p1)| p1 / p0 - 1.0)
          .collect::<Vec<f64>>()
      })
      .filter(|r| r.iter().all(|v| v.is_finite()))
      .flatten()
      .collect();
    let rows = clean_returns.len() / n;
    let covariance = sample_covariance(&Array2::from_shape_vec((rows, n), clean_returns)?);

    debug!(
      assets = n,
      window_rows = view.len(),
      clean_timestamps = clean.len(),
      "estimated information set"
    );

    let info = InformationSet::new(companies, expected_return, covariance)?;
    if !self.config.higher_moments {
      return Ok(info);
    }

    let skew: Array1<f64> = returns.iter().map(|r| skewness(r)).collect();
    let kurt: Array1<f64> = returns.iter().map(|r| excess_kurtosis(r)).collect();
    info.with_skewness(skew)?.with_kurtosis(kurt)
  }
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;
  use chrono::NaiveDate;
  use rand::rngs::StdRng;
  use rand::Rng;
  use rand::SeedableRng;
  use rand_distr::Distribution;
  use rand_distr::StandardNormal;

  use super::*;
  use crate::data::panel::PricePanel;
  use crate::data::panel::PriceRow;

  fn day(d: i64) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 1)
      .and_then(|d| d.and_hms_opt(0, 0, 0))
      .unwrap()
      + chrono::TimeDelta::days(d)
  }

  fn panel_from(series: &[(&str, &[f64])]) -> PricePanel {
    series
      .iter()
      .flat_map(|(asset, prices)| {
        prices
          .iter()
          .enumerate()
          .map(move |(d, p)| PriceRow::flat(day(d as i64), *asset, *p))
      })
      .collect()
  }

  #[test]
  fn expected_returns_are_grouped_by_asset() {
    // a single ungrouped mean would broadcast one value to both assets
    let panel = panel_from(&[
      ("A", &[100.0, 101.0, 102.01, 103.0301, 104.060401]),
      ("B", &[50.0, 49.0, 48.02, 47.0596, 46.118408]),
    ]);

    let info = StatisticsEstimator::default().estimate(&panel.view()).unwrap();

    assert_eq!(info.companies(), &["A".to_string(), "B".to_string()]);
    assert_abs_diff_eq!(info.expected_return_of("A").unwrap(), 0.01, epsilon = 1e-9);
    assert_abs_diff_eq!(info.expected_return_of("B").unwrap(), -0.02, epsilon = 1e-9);
    assert!(info.expected_return_of("A") != info.expected_return_of("B"));
  }

  #[test]
  fn order_follows_sorted_columns_not_insertion() {
    let panel = panel_from(&[
      ("ZZZ", &[10.0, 11.0, 12.0, 12.5]),
      ("AAA", &[20.0, 19.0, 19.5, 21.0]),
      ("MMM", &[30.0, 30.3, 30.0, 31.0]),
    ]);

    let info = StatisticsEstimator::default().estimate(&panel.view()).unwrap();

    assert_eq!(info.companies(), &["AAA", "MMM", "ZZZ"]);
    assert_abs_diff_eq!(info.expected_return()[2], info.expected_return_of("ZZZ").unwrap());
    let var_zzz = info.covariance()[[2, 2]];
    let zzz = simple_returns(&[10.0, 11.0, 12.0, 12.5]);
    let m = mean(&zzz);
    let expected = zzz.iter().map(|r| (r - m).powi(2)).sum::<f64>() / 2.0;
    assert_abs_diff_eq!(var_zzz, expected, epsilon = 1e-12);
  }

  #[test]
  fn dimensions_agree() {
    let panel = panel_from(&[
      ("A", &[1.0, 1.1, 1.2, 1.1, 1.3]),
      ("B", &[2.0, 2.1, 2.0, 2.2, 2.1]),
      ("C", &[3.0, 2.9, 3.1, 3.3, 3.2]),
    ]);

    let info = StatisticsEstimator::default()
      .with_higher_moments(true)
      .estimate(&panel.view())
      .unwrap();

    let n = info.companies().len();
    assert_eq!(info.expected_return().len(), n);
    assert_eq!(info.covariance().nrows(), n);
    assert_eq!(info.covariance().ncols(), n);
    assert_eq!(info.skewness().map(|s| s.len()), Some(n));
    assert_eq!(info.kurtosis().map(|k| k.len()), Some(n));
  }

  #[test]
  fn incomplete_timestamps_are_dropped_from_covariance() {
    let mut rows: Vec<PriceRow> = Vec::new();
    for (d, (a, b)) in [(10.0, 20.0), (11.0, 21.0), (12.0, 20.0), (11.5, 22.0), (12.5, 21.0)]
      .iter()
      .enumerate()
    {
      rows.push(PriceRow::flat(day(d as i64), "A", *a));
      // B is missing on day 2
      if d != 2 {
        rows.push(PriceRow::flat(day(d as i64), "B", *b));
      }
    }
    let panel = PricePanel::from_rows(rows);

    let info = StatisticsEstimator::default().estimate(&panel.view()).unwrap();

    // clean days 0,1,3,4 -> returns between consecutive clean rows
    let a = simple_returns(&[10.0, 11.0, 11.5, 12.5]);
    let m = mean(&a);
    let var_a = a.iter().map(|r| (r - m).powi(2)).sum::<f64>() / (a.len() as f64 - 1.0);
    assert_abs_diff_eq!(info.covariance()[[0, 0]], var_a, epsilon = 1e-12);

    // expected return of A still uses its full own series
    let own = simple_returns(&[10.0, 11.0, 12.0, 11.5, 12.5]);
    assert_abs_diff_eq!(info.expected_return_of("A").unwrap(), mean(&own), epsilon = 1e-12);
  }

  #[test]
  fn covariance_is_symmetric_psd() {
    let mut rng = StdRng::seed_from_u64(11);
    let assets = ["A", "B", "C", "D"];
    let mut rows = Vec::new();
    let mut prices = [100.0, 80.0, 60.0, 40.0];
    for d in 0..120 {
      let common: f64 = StandardNormal.sample(&mut rng);
      for (j, asset) in assets.iter().enumerate() {
        let own: f64 = StandardNormal.sample(&mut rng);
        prices[j] *= 1.0 + 0.0005 + 0.01 * (0.6 * common + 0.8 * own);
        rows.push(PriceRow::flat(day(d), *asset, prices[j]));
      }
    }
    let info = StatisticsEstimator::default()
      .estimate(&PricePanel::from_rows(rows).view())
      .unwrap();
    let cov = info.covariance();

    for i in 0..4 {
      for j in 0..4 {
        assert_abs_diff_eq!(cov[[i, j]], cov[[j, i]], epsilon = 1e-15);
      }
    }
    for _ in 0..200 {
      let v: Array1<f64> = (0..4).map(|_| rng.gen_range(-1.0..1.0)).collect();
      assert!(v.dot(&cov.dot(&v)) >= -1e-14);
    }
  }

  #[test]
  fn single_observation_gives_degenerate_bundle() {
    let panel = panel_from(&[("A", &[10.0]), ("B", &[20.0])]);

    let info = StatisticsEstimator::default()
      .with_higher_moments(true)
      .estimate(&panel.view())
      .unwrap();

    assert_eq!(info.len(), 2);
    assert!(info.expected_return().iter().all(|v| v.is_nan()));
    assert!(info.covariance().iter().all(|v| v.is_nan()));
    assert!(!info.is_sufficient());
  }

  #[test]
  fn empty_view_gives_empty_set() {
    let panel = PricePanel::default();
    let info = StatisticsEstimator::default().estimate(&panel.view()).unwrap();
    assert!(info.is_empty());
  }

  #[test]
  fn uses_configured_price_field() {
    let rows = (0..4).map(|d| {
      let p = 10.0 + d as f64;
      PriceRow::new(day(d), "A".to_string(), p, p, p, p, 2.0 * p * (1.0 + d as f64), 0.0)
    });
    let panel = PricePanel::from_rows(rows);

    let close = StatisticsEstimator::default().estimate(&panel.view()).unwrap();
    let adj = StatisticsEstimator::new(EstimatorConfig {
      price_field: PriceField::AdjClose,
      higher_moments: false,
    })
    .estimate(&panel.view())
    .unwrap();

    assert!(adj.expected_return()[0] > close.expected_return()[0]);
  }
}
