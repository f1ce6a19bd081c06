//! # Price Panel
//!
//! $$
//! \mathcal{P} = \{(t_k, a_k, o_k, h_k, l_k, c_k, \tilde c_k, v_k)\}_{k=1}^{N},\qquad
//! (t_k, a_k) \ \text{unique}
//! $$
//!
//! Immutable columnar table of daily bars. Rows need not be sorted; duplicate
//! `(timestamp, asset)` keys are collapsed on construction, the last supplied row wins.

use std::collections::BTreeSet;
use std::collections::HashMap;
use std::fmt::Display;
use std::str::FromStr;

use anyhow::bail;
use chrono::NaiveDateTime;
use impl_new_derive::ImplNew;

/// One bar of market data for one asset.
#[derive(ImplNew, Clone, Debug, PartialEq)]
pub struct PriceRow {
  pub timestamp: NaiveDateTime,
  pub asset_id: String,
  pub open: f64,
  pub high: f64,
  pub low: f64,
  pub close: f64,
  pub adj_close: f64,
  pub volume: f64,
}

impl PriceRow {
  /// Bar where every price column carries the same value and volume is zero.
  pub fn flat(timestamp: NaiveDateTime, asset_id: impl Into<String>, price: f64) -> Self {
    Self {
      timestamp,
      asset_id: asset_id.into(),
      open: price,
      high: price,
      low: price,
      close: price,
      adj_close: price,
      volume: 0.0,
    }
  }

  pub fn price(&self, field: PriceField) -> f64 {
    match field {
      PriceField::Open => self.open,
      PriceField::High => self.high,
      PriceField::Low => self.low,
      PriceField::Close => self.close,
      PriceField::AdjClose => self.adj_close,
    }
  }
}

/// Price column used to derive returns.
#[derive(Default, Clone, Copy, PartialEq, Eq, Debug, Hash)]
pub enum PriceField {
  Open,
  High,
  Low,
  #[default]
  Close,
  AdjClose,
}

impl FromStr for PriceField {
  type Err = anyhow::Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_lowercase().replace(['_', '-', ' '], "").as_str() {
      "open" => Ok(Self::Open),
      "high" => Ok(Self::High),
      "low" => Ok(Self::Low),
      "close" => Ok(Self::Close),
      "adjclose" | "adjustedclose" => Ok(Self::AdjClose),
      _ => bail!("unknown price field '{s}'"),
    }
  }
}

impl Display for PriceField {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      PriceField::Open => write!(f, "open"),
      PriceField::High => write!(f, "high"),
      PriceField::Low => write!(f, "low"),
      PriceField::Close => write!(f, "close"),
      PriceField::AdjClose => write!(f, "adj_close"),
    }
  }
}

/// Columnar, deduplicated price table.
#[derive(Clone, Debug, Default)]
pub struct PricePanel {
  timestamps: Vec<NaiveDateTime>,
  assets: Vec<String>,
  open: Vec<f64>,
  high: Vec<f64>,
  low: Vec<f64>,
  close: Vec<f64>,
  adj_close: Vec<f64>,
  volume: Vec<f64>,
}

impl PricePanel {
  /// Build a panel from rows in any order. Later duplicates overwrite earlier ones in place.
  pub fn from_rows<I>(rows: I) -> Self
  where
    I: IntoIterator<Item = PriceRow>,
  {
    let mut panel = Self::default();
    let mut slots: HashMap<(NaiveDateTime, String), usize> = HashMap::new();

    for row in rows {
      let key = (row.timestamp, row.asset_id.clone());
      match slots.get(&key) {
        Some(&idx) => panel.write(idx, row),
        None => {
          slots.insert(key, panel.len());
          panel.push(row);
        }
      }
    }

    panel
  }

  fn push(&mut self, row: PriceRow) {
    self.timestamps.push(row.timestamp);
    self.assets.push(row.asset_id);
    self.open.push(row.open);
    self.high.push(row.high);
    self.low.push(row.low);
    self.close.push(row.close);
    self.adj_close.push(row.adj_close);
    self.volume.push(row.volume);
  }

  fn write(&mut self, idx: usize, row: PriceRow) {
    self.open[idx] = row.open;
    self.high[idx] = row.high;
    self.low[idx] = row.low;
    self.close[idx] = row.close;
    self.adj_close[idx] = row.adj_close;
    self.volume[idx] = row.volume;
  }

  pub fn len(&self) -> usize {
    self.timestamps.len()
  }

  pub fn is_empty(&self) -> bool {
    self.timestamps.is_empty()
  }

  pub fn timestamp(&self, idx: usize) -> NaiveDateTime {
    self.timestamps[idx]
  }

  pub fn asset(&self, idx: usize) -> &str {
    &self.assets[idx]
  }

  pub fn price(&self, idx: usize, field: PriceField) -> f64 {
    match field {
      PriceField::Open => self.open[idx],
      PriceField::High => self.high[idx],
      PriceField::Low => self.low[idx],
      PriceField::Close => self.close[idx],
      PriceField::AdjClose => self.adj_close[idx],
    }
  }

  pub fn volume(&self, idx: usize) -> f64 {
    self.volume[idx]
  }

  /// Materialize row `idx`.
  pub fn row(&self, idx: usize) -> PriceRow {
    PriceRow {
      timestamp: self.timestamps[idx],
      asset_id: self.assets[idx].clone(),
      open: self.open[idx],
      high: self.high[idx],
      low: self.low[idx],
      close: self.close[idx],
      adj_close: self.adj_close[idx],
      volume: self.volume[idx],
    }
  }

  pub fn rows(&self) -> impl Iterator<Item = PriceRow> + '_ {
    (0..self.len()).map(|idx| self.row(idx))
  }

  /// Distinct asset identifiers, sorted.
  pub fn assets(&self) -> Vec<&str> {
    self
      .assets
      .iter()
      .map(String::as_str)
      .collect::<BTreeSet<_>>()
      .into_iter()
      .collect()
  }

  /// Earliest and latest timestamp in the panel.
  pub fn time_range(&self) -> Option<(NaiveDateTime, NaiveDateTime)> {
    let first = self.timestamps.iter().min()?;
    let last = self.timestamps.iter().max()?;
    Some((*first, *last))
  }

  /// View over every row.
  pub fn view(&self) -> PanelView<'_> {
    PanelView {
      panel: self,
      rows: (0..self.len()).collect(),
    }
  }

  /// View over the rows whose timestamp satisfies `keep`.
  pub fn view_where<F>(&self, keep: F) -> PanelView<'_>
  where
    F: Fn(NaiveDateTime) -> bool,
  {
    let rows = self
      .timestamps
      .iter()
      .enumerate()
      .filter(|(_, ts)| keep(**ts))
      .map(|(idx, _)| idx)
      .collect();

    PanelView { panel: self, rows }
  }
}

impl FromIterator<PriceRow> for PricePanel {
  fn from_iter<T: IntoIterator<Item = PriceRow>>(iter: T) -> Self {
    Self::from_rows(iter)
  }
}

/// Borrowed subset of a [`PricePanel`]; the panel itself is never touched.
#[derive(Clone, Debug)]
pub struct PanelView<'a> {
  panel: &'a PricePanel,
  rows: Vec<usize>,
}

impl<'a> PanelView<'a> {
  pub fn len(&self) -> usize {
    self.rows.len()
  }

  pub fn is_empty(&self) -> bool {
    self.rows.is_empty()
  }

  pub fn panel(&self) -> &'a PricePanel {
    self.panel
  }

  /// `(timestamp, asset, price)` triples for `field`, in panel order.
  pub fn observations(
    &self,
    field: PriceField,
  ) -> impl Iterator<Item = (NaiveDateTime, &'a str, f64)> + '_ {
    let panel = self.panel;
    self
      .rows
      .iter()
      .map(move |&idx| (panel.timestamp(idx), panel.asset(idx), panel.price(idx, field)))
  }

  pub fn timestamps(&self) -> impl Iterator<Item = NaiveDateTime> + '_ {
    self.rows.iter().map(|&idx| self.panel.timestamp(idx))
  }

  /// Distinct assets present in the view, sorted.
  pub fn assets(&self) -> Vec<&'a str> {
    let panel = self.panel;
    self
      .rows
      .iter()
      .map(|&idx| panel.asset(idx))
      .collect::<BTreeSet<_>>()
      .into_iter()
      .collect()
  }

  /// Copy the viewed rows into a standalone panel.
  pub fn to_panel(&self) -> PricePanel {
    self.rows.iter().map(|&idx| self.panel.row(idx)).collect()
  }
}

#[cfg(test)]
mod tests {
  use chrono::NaiveDate;

  use super::*;

  fn day(d: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, d)
      .and_then(|d| d.and_hms_opt(0, 0, 0))
      .unwrap()
  }

  #[test]
  fn duplicate_keys_keep_last_row() {
    let panel = PricePanel::from_rows(vec![
      PriceRow::flat(day(2), "AAA", 10.0),
      PriceRow::flat(day(3), "AAA", 11.0),
      PriceRow::flat(day(2), "AAA", 12.0),
    ]);

    assert_eq!(panel.len(), 2);
    assert_eq!(panel.price(0, PriceField::Close), 12.0);
    assert_eq!(panel.timestamp(0), day(2));
  }

  #[test]
  fn assets_are_sorted_and_unique() {
    let panel: PricePanel = vec![
      PriceRow::flat(day(2), "MSFT", 1.0),
      PriceRow::flat(day(2), "AAPL", 1.0),
      PriceRow::flat(day(3), "MSFT", 1.0),
    ]
    .into_iter()
    .collect();

    assert_eq!(panel.assets(), vec!["AAPL", "MSFT"]);
    assert_eq!(panel.time_range(), Some((day(2), day(3))));
  }

  #[test]
  fn price_field_selects_column() {
    let row = PriceRow::new(day(2), "AAA".to_string(), 1.0, 2.0, 0.5, 1.5, 1.4, 100.0);
    let panel = PricePanel::from_rows(vec![row.clone()]);

    assert_eq!(panel.price(0, PriceField::AdjClose), 1.4);
    assert_eq!(panel.price(0, PriceField::High), row.price(PriceField::High));
    assert_eq!(panel.volume(0), 100.0);
    assert_eq!(panel.row(0), row);
  }

  #[test]
  fn price_field_parses_common_spellings() {
    assert_eq!("Adj Close".parse::<PriceField>().unwrap(), PriceField::AdjClose);
    assert_eq!("close".parse::<PriceField>().unwrap(), PriceField::Close);
    assert!("vwap".parse::<PriceField>().is_err());
  }

  #[test]
  fn view_to_panel_copies_selected_rows() {
    let panel = PricePanel::from_rows(vec![
      PriceRow::flat(day(2), "AAA", 1.0),
      PriceRow::flat(day(3), "AAA", 2.0),
      PriceRow::flat(day(4), "AAA", 3.0),
    ]);

    let view = panel.view_where(|ts| ts >= day(3));
    let copy = view.to_panel();

    assert_eq!(view.len(), 2);
    assert_eq!(copy.len(), 2);
    assert_eq!(panel.len(), 3);
    assert_eq!(copy.price(0, PriceField::Close), 2.0);
  }
}
