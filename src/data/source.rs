//! # Price Sources
//!
//! $$
//! \mathcal{P} = \biguplus_{a \in \mathcal{U}} \operatorname{fetch}(a, [t_0, t_1))
//! $$
//!
//! Retrieval seam for historical bars. Batch retrieval skips assets whose lookup
//! fails instead of aborting the whole universe.

use std::sync::Arc;

use anyhow::bail;
use anyhow::Result;
use chrono::NaiveDateTime;
use tracing::debug;
use tracing::warn;

use super::panel::PricePanel;
use super::panel::PriceRow;

/// Provider of daily bars for one asset over `[start, end)`.
pub trait PriceSource {
  fn fetch(&self, asset_id: &str, start: NaiveDateTime, end: NaiveDateTime)
    -> Result<Vec<PriceRow>>;
}

/// Fetch every ticker and merge the results into one deduplicated panel.
///
/// Lookup failures and empty histories are logged and skipped. Fails only when
/// no ticker produced any row.
pub fn fetch_panel<S, T>(
  source: &S,
  tickers: &[T],
  start: NaiveDateTime,
  end: NaiveDateTime,
) -> Result<PricePanel>
where
  S: PriceSource + ?Sized,
  T: AsRef<str>,
{
  let mut rows = Vec::new();
  let mut fetched = 0usize;

  for ticker in tickers {
    let ticker = ticker.as_ref();
    match source.fetch(ticker, start, end) {
      Ok(batch) if batch.is_empty() => {
        warn!(ticker, "no price history returned, skipping");
      }
      Ok(batch) => {
        debug!(ticker, rows = batch.len(), "fetched price history");
        fetched += 1;
        rows.extend(batch);
      }
      Err(err) => {
        warn!(ticker, error = %err, "stock not found, skipping");
      }
    }
  }

  if fetched == 0 {
    bail!(
      "no price data retrieved for any of {} tickers between {start} and {end}",
      tickers.len()
    );
  }

  Ok(PricePanel::from_rows(rows))
}

/// Source backed by an already loaded panel.
#[derive(Clone, Debug)]
pub struct InMemorySource {
  panel: Arc<PricePanel>,
}

impl InMemorySource {
  pub fn new(panel: Arc<PricePanel>) -> Self {
    Self { panel }
  }
}

impl PriceSource for InMemorySource {
  fn fetch(
    &self,
    asset_id: &str,
    start: NaiveDateTime,
    end: NaiveDateTime,
  ) -> Result<Vec<PriceRow>> {
    if !self.panel.assets().contains(&asset_id) {
      bail!("asset '{asset_id}' is not available");
    }

    let panel = &self.panel;
    Ok(
      (0..panel.len())
        .filter(|&idx| panel.asset(idx) == asset_id)
        .filter(|&idx| {
          let ts = panel.timestamp(idx);
          ts >= start && ts < end
        })
        .map(|idx| panel.row(idx))
        .collect(),
    )
  }
}
