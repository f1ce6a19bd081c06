//! # Yahoo Finance Source
//!
//! $$
//! \operatorname{fetch}(a, [t_0, t_1)) = \{\text{daily bars of } a\}
//! $$
//!
//! Daily history through `yahoo_finance_api`. The client is async; each fetch is
//! driven to completion on a private current-thread runtime.

use anyhow::anyhow;
use anyhow::Result;
use chrono::DateTime;
use chrono::NaiveDateTime;
use time::OffsetDateTime;
use yahoo_finance_api as yahoo;

use super::panel::PriceRow;
use super::source::PriceSource;

pub struct YahooSource {
  connector: yahoo::YahooConnector,
  runtime: tokio::runtime::Runtime,
}

fn to_offset(ts: NaiveDateTime) -> Result<OffsetDateTime> {
  Ok(OffsetDateTime::from_unix_timestamp(ts.and_utc().timestamp())?)
}

impl YahooSource {
  pub fn new() -> Result<Self> {
    let runtime = tokio::runtime::Builder::new_current_thread()
      .enable_all()
      .build()?;
    Ok(Self {
      connector: yahoo::YahooConnector::new()?,
      runtime,
    })
  }
}

impl PriceSource for YahooSource {
  fn fetch(
    &self,
    asset_id: &str,
    start: NaiveDateTime,
    end: NaiveDateTime,
  ) -> Result<Vec<PriceRow>> {
    let (from, to) = (to_offset(start)?, to_offset(end)?);
    let response = self
      .runtime
      .block_on(self.connector.get_quote_history(asset_id, from, to))?;

    response
      .quotes()?
      .into_iter()
      .map(|q| {
        let timestamp = DateTime::from_timestamp(q.timestamp as i64, 0)
          .ok_or_else(|| anyhow!("invalid timestamp {} for {asset_id}", q.timestamp))?
          .naive_utc();
        Ok(PriceRow {
          timestamp,
          asset_id: asset_id.to_string(),
          open: q.open,
          high: q.high,
          low: q.low,
          close: q.close,
          adj_close: q.adjclose,
          volume: q.volume as f64,
        })
      })
      .filter(|row| match row {
        Ok(row) => row.timestamp >= start && row.timestamp < end,
        Err(_) => true,
      })
      .collect()
  }
}
