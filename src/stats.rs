//! # Stats
//!
//! $$
//! \hat\mu_i = \frac{1}{T_i}\sum_{k} r_{i,k},\qquad
//! \hat\Sigma = \frac{1}{T-1}\sum_{k}(r_k-\bar r)(r_k-\bar r)^\top
//! $$
//!
//! Return moments and the per-query information set built from a lookback window.

pub mod estimator;
pub mod information;
pub mod moments;
