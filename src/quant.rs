//! # Quant
//!
//! $$
//! \mathcal{I}_t \mapsto \mathbf{w}_t
//! $$
//!
//! Optimizers and the strategies that drive them through time.

pub mod portfolio;
pub mod strategy;
