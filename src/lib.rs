//! # Rolling Portfolio
//!
//! $$
//! \mathbf{w}_t = \operatorname{Optimize}\big(\hat\mu_{[t-s,t)},\ \hat\Sigma_{[t-s,t)}\big)
//! $$
//!
//! Time-indexed portfolio construction. A trailing lookback window over a
//! [`data::panel::PricePanel`] feeds a [`stats::estimator::StatisticsEstimator`],
//! whose [`stats::information::InformationSet`] is handed to a constrained
//! [`quant::portfolio::optimizers::PortfolioOptimizer`].
//!
//! [`quant::strategy::Strategy`] binds the pieces together behind the
//! [`traits::Information`] contract.

pub mod data;
pub mod quant;
pub mod stats;
pub mod traits;

pub use data::panel::PriceField;
pub use data::panel::PricePanel;
pub use data::panel::PriceRow;
pub use data::window::InformationWindow;
pub use quant::portfolio::Portfolio;
pub use quant::portfolio::SolveStatus;
pub use quant::strategy::Strategy;
pub use stats::information::InformationSet;
pub use traits::Information;
