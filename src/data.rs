//! # Data
//!
//! $$
//! \mathcal{P} = \{(t_k, a_k, p_k)\}_{k=1}^{N}
//! $$
//!
//! Price panel storage, lookback windows and the collaborators that feed them.

pub mod panel;
pub mod source;
pub mod universe;
pub mod window;
#[cfg(feature = "yahoo")]
pub mod yahoo;
