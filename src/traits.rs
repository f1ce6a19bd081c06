//! # Traits
//!
//! $$
//! \text{Information contract: }(\mathcal{P}, t)\mapsto \mathcal{W}_t \mapsto \mathcal{I}_t \mapsto \mathbf{w}_t
//! $$
//!
use anyhow::Result;
use chrono::NaiveDateTime;

use crate::data::panel::PanelView;
use crate::data::panel::PricePanel;
use crate::data::window::InformationWindow;
use crate::quant::portfolio::Portfolio;
use crate::stats::information::InformationSet;

/// Windowed view of a price panel that turns into portfolios.
///
/// Implementors supply the panel, the window and the two estimation steps;
/// slicing comes for free.
pub trait Information {
  fn window(&self) -> &InformationWindow;

  fn panel(&self) -> &PricePanel;

  /// Rows with `t - s <= timestamp < t`.
  fn slice_data(&self, t: NaiveDateTime) -> PanelView<'_> {
    self.window().slice(self.panel(), t)
  }

  /// Statistics of the window ending at `t`.
  fn compute_information(&self, t: NaiveDateTime) -> Result<InformationSet>;

  /// Weights for `information`, keyed by its company order.
  fn compute_portfolio(&self, t: NaiveDateTime, information: &InformationSet) -> Portfolio;
}
