use std::sync::Arc;

use anyhow::Result;
use chrono::Datelike;
use chrono::NaiveDate;
use chrono::NaiveDateTime;
use chrono::TimeDelta;
use indicatif::ProgressBar;
use indicatif::ProgressStyle;
use prettytable::row;
use prettytable::Table;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::Distribution;
use rand_distr::StandardNormal;
use rolling_portfolio::data::panel::PricePanel;
use rolling_portfolio::data::panel::PriceRow;
use rolling_portfolio::data::source::fetch_panel;
use rolling_portfolio::data::source::InMemorySource;
use rolling_portfolio::data::universe::AssetUniverse;
use rolling_portfolio::InformationWindow;
use rolling_portfolio::Strategy;
use tracing::info;
use tracing_subscriber::EnvFilter;

const UNIVERSE: &str = "\
ticker,cik
AAPL,0000320193
MSFT,0000789019
GOOGL,0001652044
AMZN,0001018724
META,0001326801
XOM,0000034088
";

/// (ticker, annual drift, annual volatility, market beta)
const ASSETS: [(&str, f64, f64, f64); 6] = [
  ("AAPL", 0.12, 0.28, 0.8),
  ("MSFT", 0.10, 0.24, 0.8),
  ("GOOGL", 0.09, 0.30, 0.7),
  ("AMZN", 0.11, 0.34, 0.75),
  ("META", 0.14, 0.40, 0.6),
  ("XOM", 0.06, 0.22, 0.3),
];

fn midnight(date: NaiveDate) -> NaiveDateTime {
  date.and_time(chrono::NaiveTime::MIN)
}

/// Correlated GBM closes on weekdays, one common market factor.
fn simulate(start: NaiveDate, days: i64, seed: u64) -> PricePanel {
  let mut rng = StdRng::seed_from_u64(seed);
  let dt = 1.0 / 252.0;
  let mut prices = [100.0; ASSETS.len()];
  let mut rows = Vec::new();

  for d in 0..days {
    let date = start + TimeDelta::days(d);
    if date.weekday().number_from_monday() > 5 {
      continue;
    }

    let market: f64 = StandardNormal.sample(&mut rng);
    for (price, (ticker, drift, vol, beta)) in prices.iter_mut().zip(ASSETS) {
      let own: f64 = StandardNormal.sample(&mut rng);
      let z = beta * market + (1.0 - beta * beta).sqrt() * own;
      *price *= ((drift - 0.5 * vol * vol) * dt + vol * dt.sqrt() * z).exp();
      rows.push(PriceRow::flat(midnight(date), ticker, *price));
    }
  }

  PricePanel::from_rows(rows)
}

fn month_starts(from: NaiveDate, to: NaiveDate) -> Vec<NaiveDateTime> {
  let mut dates = Vec::new();
  let mut current = from.with_day(1);
  while let Some(date) = current.filter(|d| *d <= to) {
    dates.push(midnight(date));
    current = date.checked_add_months(chrono::Months::new(1));
  }
  dates
}

fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .init();

  let start = NaiveDate::from_ymd_opt(2022, 1, 3).ok_or_else(|| anyhow::anyhow!("bad start"))?;
  let end = NaiveDate::from_ymd_opt(2023, 12, 29).ok_or_else(|| anyhow::anyhow!("bad end"))?;

  let universe = AssetUniverse::from_csv_str(UNIVERSE)?;
  let tickers = universe.restrict(&["aapl", "MSFT", "googl", "AMZN", "META", "XOM", "TSLA"]);
  info!(tickers = tickers.len(), "universe restricted");

  let simulated = simulate(start, (end - start).num_days() + 1, 7);
  let source = InMemorySource::new(Arc::new(simulated));
  let panel = Arc::new(fetch_panel(
    &source,
    &tickers,
    midnight(start),
    midnight(end) + TimeDelta::days(1),
  )?);
  info!(rows = panel.len(), assets = panel.assets().len(), "panel loaded");

  let window = InformationWindow::days(90)?;
  let first = start
    .checked_add_months(chrono::Months::new(4))
    .ok_or_else(|| anyhow::anyhow!("first rebalance date out of range"))?;
  let dates = month_starts(first, end);

  let strategies = [
    Strategy::minimum_variance(panel.clone(), window),
    Strategy::risk_aversion_var(panel.clone(), window),
    Strategy::max_sharpe(panel.clone(), window),
    Strategy::min_kurtosis(panel.clone(), window),
  ];

  let progress = ProgressBar::new(strategies.len() as u64);
  progress.set_style(
    ProgressStyle::default_bar()
      .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
      .progress_chars("#>-"),
  );

  let mut table = Table::new();
  table.add_row(row![
    "strategy",
    "dates",
    "converged",
    "mean return",
    "mean vol",
    "mean sharpe",
    "last weights"
  ]);

  for strategy in &strategies {
    progress.set_message(strategy.kind().label());
    let portfolios = strategy.compute_portfolios(&dates)?;

    let metrics: Vec<_> = portfolios.iter().filter_map(|p| p.metrics()).collect();
    let avg = |f: fn(&rolling_portfolio::quant::portfolio::PortfolioMetrics) -> f64| {
      if metrics.is_empty() {
        f64::NAN
      } else {
        metrics.iter().map(|m| f(m)).sum::<f64>() / metrics.len() as f64
      }
    };
    let last = portfolios
      .iter()
      .rev()
      .find(|p| p.is_converged())
      .map(|p| {
        p.iter()
          .map(|(asset, w)| format!("{asset}={:.3}", w.unwrap_or(f64::NAN)))
          .collect::<Vec<_>>()
          .join(" ")
      })
      .unwrap_or_else(|| "-".to_string());

    table.add_row(row![
      strategy.kind().label(),
      portfolios.len(),
      metrics.len(),
      format!("{:.5}", avg(|m| m.expected_return)),
      format!("{:.5}", avg(|m| m.volatility)),
      format!("{:.3}", avg(|m| m.sharpe)),
      last
    ]);
    progress.inc(1);
  }
  progress.finish_with_message("done");

  table.printstd();
  Ok(())
}
