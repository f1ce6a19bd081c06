//! # Portfolio
//!
//! $$
//! \sigma_p^2 = \mathbf{w}^\top \Sigma \mathbf{w}
//! $$
//!
//! Constrained portfolio optimization over estimated information sets.

pub mod optimizers;
pub mod solver;
pub mod types;

pub use optimizers::OptimizerKind;
pub use optimizers::PortfolioOptimizer;
pub use optimizers::RiskAversionParams;
pub use solver::AugmentedLagrangian;
pub use solver::NonlinearProgram;
pub use solver::SolveOutcome;
pub use solver::SolverConfig;
pub use types::Portfolio;
pub use types::PortfolioMetrics;
pub use types::SolveStatus;
