//! # Information Window
//!
//! $$
//! \mathcal{W}_t = \{(t_k, a_k, p_k)\in\mathcal{P} : t - s \le t_k < t\}
//! $$
//!
//! Trailing lookback window. The reference timestamp itself is excluded so an
//! estimate at `t` never sees the bar it will trade on.

use anyhow::ensure;
use anyhow::Result;
use chrono::NaiveDateTime;
use chrono::TimeDelta;

use super::panel::PanelView;
use super::panel::PricePanel;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InformationWindow {
  duration: TimeDelta,
}

impl InformationWindow {
  /// Window of length `duration`. Fails when `duration <= 0`.
  pub fn new(duration: TimeDelta) -> Result<Self> {
    ensure!(
      duration > TimeDelta::zero(),
      "window duration must be positive, got {duration}"
    );
    Ok(Self { duration })
  }

  pub fn days(days: i64) -> Result<Self> {
    let duration = TimeDelta::try_days(days)
      .ok_or_else(|| anyhow::anyhow!("window of {days} days is out of range"))?;
    Self::new(duration)
  }

  pub fn duration(&self) -> TimeDelta {
    self.duration
  }

  /// Half-open bounds `[start, end)` for reference time `t`.
  pub fn bounds(&self, t: NaiveDateTime) -> (NaiveDateTime, NaiveDateTime) {
    let start = t
      .checked_sub_signed(self.duration)
      .unwrap_or(NaiveDateTime::MIN);
    (start, t)
  }

  pub fn contains(&self, t: NaiveDateTime, ts: NaiveDateTime) -> bool {
    let (start, end) = self.bounds(t);
    ts >= start && ts < end
  }

  /// Rows of `panel` inside the window ending at `t`. May be empty.
  pub fn slice<'a>(&self, panel: &'a PricePanel, t: NaiveDateTime) -> PanelView<'a> {
    panel.view_where(|ts| self.contains(t, ts))
  }
}
