//! # Portfolio Types
//!
//! $$
//! \mathbf{w}^\*=\arg\max_{\mathbf{w}} \frac{\mathbb E[R_p]-r_f}{\sigma_p}
//! $$
//!
//! Optimizer outcome and per-asset weights. A weight is either set for every
//! asset (converged solve) or unset for every asset.

use std::fmt::Display;

use ndarray::Array1;
use ndarray::Array2;
use ndarray::ArrayView1;

/// How a portfolio request ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SolveStatus {
  /// Constraints satisfied and KKT-stationary within tolerance.
  Converged,
  /// Iteration budget and retries exhausted.
  NotConverged,
  /// Information set was empty or carried undefined statistics; no solve attempted.
  InsufficientData,
}

impl Display for SolveStatus {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      SolveStatus::Converged => write!(f, "converged"),
      SolveStatus::NotConverged => write!(f, "not converged"),
      SolveStatus::InsufficientData => write!(f, "insufficient data"),
    }
  }
}

/// Model statistics of a weight vector.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PortfolioMetrics {
  /// `w . mu`, in the units of the information set (per period).
  pub expected_return: f64,
  /// `sqrt(w' Sigma w)`.
  pub volatility: f64,
  /// `(expected_return - risk_free) / volatility`, zero when volatility vanishes.
  pub sharpe: f64,
}

impl PortfolioMetrics {
  pub fn evaluate(weights: &[f64], mu: &Array1<f64>, cov: &Array2<f64>, risk_free: f64) -> Self {
    let w = ArrayView1::from(weights);
    let expected_return = w.dot(mu);
    let volatility = w.dot(&cov.dot(&w)).max(0.0).sqrt();
    let sharpe = if volatility > 1e-15 {
      (expected_return - risk_free) / volatility
    } else {
      0.0
    };

    Self {
      expected_return,
      volatility,
      sharpe,
    }
  }
}

/// Weights keyed by the company order of the information set they came from.
///
/// `None` means unset: no position, flag for review. It is never a silent zero.
#[derive(Clone, Debug)]
pub struct Portfolio {
  companies: Vec<String>,
  weights: Vec<Option<f64>>,
  status: SolveStatus,
  metrics: Option<PortfolioMetrics>,
  iterations: u64,
}

impl Portfolio {
  /// Every asset unset.
  pub fn unset(companies: Vec<String>, status: SolveStatus) -> Self {
    let weights = vec![None; companies.len()];
    Self {
      companies,
      weights,
      status,
      metrics: None,
      iterations: 0,
    }
  }

  pub(crate) fn converged(
    companies: Vec<String>,
    weights: Vec<f64>,
    metrics: PortfolioMetrics,
    iterations: u64,
  ) -> Self {
    Self {
      companies,
      weights: weights.into_iter().map(Some).collect(),
      status: SolveStatus::Converged,
      metrics: Some(metrics),
      iterations,
    }
  }

  pub(crate) fn with_iterations(mut self, iterations: u64) -> Self {
    self.iterations = iterations;
    self
  }

  pub fn status(&self) -> SolveStatus {
    self.status
  }

  pub fn is_converged(&self) -> bool {
    self.status == SolveStatus::Converged
  }

  pub fn len(&self) -> usize {
    self.companies.len()
  }

  pub fn is_empty(&self) -> bool {
    self.companies.is_empty()
  }

  pub fn companies(&self) -> &[String] {
    &self.companies
  }

  pub fn weights(&self) -> &[Option<f64>] {
    &self.weights
  }

  /// `None` for an unknown asset, `Some(None)` for an unset weight.
  pub fn get(&self, asset_id: &str) -> Option<Option<f64>> {
    let idx = self.companies.iter().position(|c| c == asset_id)?;
    Some(self.weights[idx])
  }

  /// Weight of `asset_id` when known and set.
  pub fn weight(&self, asset_id: &str) -> Option<f64> {
    self.get(asset_id).flatten()
  }

  /// All weights, when every one of them is set.
  pub fn dense_weights(&self) -> Option<Vec<f64>> {
    self.weights.iter().copied().collect()
  }

  pub fn iter(&self) -> impl Iterator<Item = (&str, Option<f64>)> {
    self
      .companies
      .iter()
      .map(String::as_str)
      .zip(self.weights.iter().copied())
  }

  pub fn metrics(&self) -> Option<&PortfolioMetrics> {
    self.metrics.as_ref()
  }

  /// Solver iterations spent across all attempts.
  pub fn iterations(&self) -> u64 {
    self.iterations
  }
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;
  use ndarray::array;

  use super::*;

  #[test]
  fn unset_portfolio_has_no_weights() {
    let p = Portfolio::unset(vec!["A".into(), "B".into()], SolveStatus::NotConverged);

    assert_eq!(p.get("A"), Some(None));
    assert_eq!(p.get("Z"), None);
    assert_eq!(p.weight("B"), None);
    assert!(p.dense_weights().is_none());
    assert!(p.metrics().is_none());
    assert!(!p.is_converged());
  }

  #[test]
  fn metrics_match_hand_computation() {
    let mu = array![0.1, 0.2];
    let cov = array![[0.04, 0.0], [0.0, 0.09]];
    let m = PortfolioMetrics::evaluate(&[0.5, 0.5], &mu, &cov, 0.05);

    assert_abs_diff_eq!(m.expected_return, 0.15, epsilon = 1e-12);
    assert_abs_diff_eq!(m.volatility, (0.25f64 * 0.13).sqrt(), epsilon = 1e-12);
    assert_abs_diff_eq!(m.sharpe, 0.1 / (0.25f64 * 0.13).sqrt(), epsilon = 1e-12);
  }

  #[test]
  fn converged_portfolio_exposes_keyed_weights() {
    let p = Portfolio::converged(
      vec!["A".into(), "B".into()],
      vec![0.3, 0.7],
      PortfolioMetrics::default(),
      12,
    );

    assert_eq!(p.weight("B"), Some(0.7));
    assert_eq!(p.dense_weights(), Some(vec![0.3, 0.7]));
    assert_eq!(p.iter().count(), 2);
    assert_eq!(p.iterations(), 12);
  }
}
