//! # Portfolio Optimizers
//!
//! $$
//! \min_{\mathbf{x}} f(\mathbf{x})\quad\text{s.t.}\quad \mathbf{1}^\top\mathbf{x}=1
//! $$
//!
//! Constrained allocation over an [`InformationSet`]. Every variant is fully
//! invested; they differ in objective, extra constraints and short-selling.
//!
//! | Variant | Objective | Extra constraints | Shorts |
//! |---|---|---|---|
//! | minimum variance | `x' S x` | | no |
//! | risk aversion / VaR | `x' S x - g x.mu` | `x.mu >= r_min`, `z sqrt(x' S x) + l >= 0` | yes |
//! | max Sharpe | `-(x.mu - rf) / sqrt(x' S x)` | | no |
//! | min kurtosis | `x.k` | | no |

use std::fmt::Display;
use std::str::FromStr;

use anyhow::bail;
use ndarray::Array1;
use ndarray::Array2;
use ndarray::ArrayView1;
use tracing::debug;
use tracing::warn;

use super::solver::AugmentedLagrangian;
use super::solver::NonlinearProgram;
use super::solver::SolverConfig;
use super::types::Portfolio;
use super::types::PortfolioMetrics;
use super::types::SolveStatus;
use crate::stats::information::InformationSet;

/// Parameters of the risk-aversion variant with the VaR and minimum-return constraints.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RiskAversionParams {
  /// Weight of expected return against variance.
  pub gamma: f64,
  /// Lower bound on `x . mu`.
  pub min_return: f64,
  /// Normal quantile used in the VaR constraint, `-1.96` by default.
  ///
  /// Taken as given and not re-derived from a confidence level, so the VaR
  /// level it stands for is only approximate.
  pub var_z: f64,
  /// VaR limit added to `z * sigma_p`, portfolio value normalized to 1.
  pub var_limit: f64,
}

impl Default for RiskAversionParams {
  fn default() -> Self {
    Self {
      gamma: 0.1,
      min_return: 0.10,
      var_z: -1.96,
      var_limit: 0.01,
    }
  }
}

/// Supported allocation problems.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum OptimizerKind {
  /// Long-only minimum variance.
  MinimumVariance,
  /// Mean-variance utility with minimum return and parametric VaR, shorts allowed.
  RiskAversionVaR(RiskAversionParams),
  /// Long-only tangency portfolio.
  MaxSharpe,
  /// Long-only, minimizing the weighted excess kurtosis.
  MinKurtosis,
}

impl OptimizerKind {
  pub fn allows_short(&self) -> bool {
    matches!(self, Self::RiskAversionVaR(_))
  }

  pub fn requires_kurtosis(&self) -> bool {
    matches!(self, Self::MinKurtosis)
  }

  pub fn label(&self) -> &'static str {
    match self {
      Self::MinimumVariance => "minimum-variance",
      Self::RiskAversionVaR(_) => "risk-aversion-var",
      Self::MaxSharpe => "max-sharpe",
      Self::MinKurtosis => "min-kurtosis",
    }
  }
}

impl Display for OptimizerKind {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.label())
  }
}

impl FromStr for OptimizerKind {
  type Err = anyhow::Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    Ok(match s.to_lowercase().as_str() {
      "min-var" | "minvar" | "minimum-variance" => Self::MinimumVariance,
      "var" | "risk-aversion" | "risk-aversion-var" | "hedge-fund" => {
        Self::RiskAversionVaR(RiskAversionParams::default())
      }
      "sharpe" | "max-sharpe" | "maxsharpe" => Self::MaxSharpe,
      "kurtosis" | "min-kurtosis" | "minkurtosis" => Self::MinKurtosis,
      other => bail!("unknown optimizer '{other}'"),
    })
  }
}

fn quad_form(cov: &Array2<f64>, x: &[f64]) -> (f64, Array1<f64>) {
  let w = ArrayView1::from(x);
  let sx = cov.dot(&w);
  (w.dot(&sx), sx)
}

fn budget(x: &[f64]) -> Vec<f64> {
  vec![x.iter().sum::<f64>() - 1.0]
}

fn budget_jacobian(n: usize) -> Vec<Vec<f64>> {
  vec![vec![1.0; n]]
}

fn long_only(n: usize) -> Vec<(f64, f64)> {
  vec![(0.0, f64::INFINITY); n]
}

struct MinimumVariance<'a> {
  cov: &'a Array2<f64>,
}

impl NonlinearProgram for MinimumVariance<'_> {
  fn dim(&self) -> usize {
    self.cov.nrows()
  }

  fn objective(&self, x: &[f64]) -> f64 {
    quad_form(self.cov, x).0
  }

  fn gradient(&self, x: &[f64]) -> Vec<f64> {
    quad_form(self.cov, x).1.iter().map(|v| 2.0 * v).collect()
  }

  fn equalities(&self, x: &[f64]) -> Vec<f64> {
    budget(x)
  }

  fn equality_jacobian(&self, x: &[f64]) -> Vec<Vec<f64>> {
    budget_jacobian(x.len())
  }

  fn bounds(&self) -> Vec<(f64, f64)> {
    long_only(self.dim())
  }
}

struct RiskAversionVaR<'a> {
  mu: &'a Array1<f64>,
  cov: &'a Array2<f64>,
  params: RiskAversionParams,
}

impl NonlinearProgram for RiskAversionVaR<'_> {
  fn dim(&self) -> usize {
    self.mu.len()
  }

  fn objective(&self, x: &[f64]) -> f64 {
    let w = ArrayView1::from(x);
    quad_form(self.cov, x).0 - self.params.gamma * w.dot(self.mu)
  }

  fn gradient(&self, x: &[f64]) -> Vec<f64> {
    let (_, sx) = quad_form(self.cov, x);
    sx.iter()
      .zip(self.mu)
      .map(|(s, m)| 2.0 * s - self.params.gamma * m)
      .collect()
  }

  fn equalities(&self, x: &[f64]) -> Vec<f64> {
    budget(x)
  }

  fn equality_jacobian(&self, x: &[f64]) -> Vec<Vec<f64>> {
    budget_jacobian(x.len())
  }

  fn inequalities(&self, x: &[f64]) -> Vec<f64> {
    let w = ArrayView1::from(x);
    let (var, _) = quad_form(self.cov, x);
    vec![
      w.dot(self.mu) - self.params.min_return,
      self.params.var_z * var.max(0.0).sqrt() + self.params.var_limit,
    ]
  }

  fn inequality_jacobian(&self, x: &[f64]) -> Vec<Vec<f64>> {
    let (var, sx) = quad_form(self.cov, x);
    let sigma = var.max(0.0).sqrt();
    let var_row = if sigma > 1e-15 {
      sx.iter().map(|s| self.params.var_z * s / sigma).collect()
    } else {
      vec![0.0; x.len()]
    };
    vec![self.mu.to_vec(), var_row]
  }
}

struct MaxSharpe<'a> {
  mu: &'a Array1<f64>,
  cov: &'a Array2<f64>,
  risk_free: f64,
}

impl MaxSharpe<'_> {
  const MIN_VOL: f64 = 1e-12;
}

impl NonlinearProgram for MaxSharpe<'_> {
  fn dim(&self) -> usize {
    self.mu.len()
  }

  fn objective(&self, x: &[f64]) -> f64 {
    let w = ArrayView1::from(x);
    let sigma = quad_form(self.cov, x).0.max(0.0).sqrt().max(Self::MIN_VOL);
    -(w.dot(self.mu) - self.risk_free) / sigma
  }

  fn gradient(&self, x: &[f64]) -> Vec<f64> {
    let w = ArrayView1::from(x);
    let (var, sx) = quad_form(self.cov, x);
    let sigma = var.max(0.0).sqrt().max(Self::MIN_VOL);
    let excess = w.dot(self.mu) - self.risk_free;
    self
      .mu
      .iter()
      .zip(&sx)
      .map(|(m, s)| -(m / sigma - excess * s / sigma.powi(3)))
      .collect()
  }

  fn equalities(&self, x: &[f64]) -> Vec<f64> {
    budget(x)
  }

  fn equality_jacobian(&self, x: &[f64]) -> Vec<Vec<f64>> {
    budget_jacobian(x.len())
  }

  fn bounds(&self) -> Vec<(f64, f64)> {
    long_only(self.dim())
  }
}

struct MinKurtosis<'a> {
  kurtosis: &'a Array1<f64>,
}

impl NonlinearProgram for MinKurtosis<'_> {
  fn dim(&self) -> usize {
    self.kurtosis.len()
  }

  fn objective(&self, x: &[f64]) -> f64 {
    ArrayView1::from(x).dot(self.kurtosis)
  }

  fn gradient(&self, _x: &[f64]) -> Vec<f64> {
    self.kurtosis.to_vec()
  }

  fn equalities(&self, x: &[f64]) -> Vec<f64> {
    budget(x)
  }

  fn equality_jacobian(&self, x: &[f64]) -> Vec<Vec<f64>> {
    budget_jacobian(x.len())
  }

  fn bounds(&self) -> Vec<(f64, f64)> {
    long_only(self.dim())
  }
}

/// Solves one [`OptimizerKind`] over information sets.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PortfolioOptimizer {
  kind: OptimizerKind,
  solver: SolverConfig,
  risk_free: f64,
}

impl PortfolioOptimizer {
  pub fn new(kind: OptimizerKind) -> Self {
    Self {
      kind,
      solver: SolverConfig::default(),
      risk_free: 0.0,
    }
  }

  pub fn with_solver(mut self, solver: SolverConfig) -> Self {
    self.solver = solver;
    self
  }

  /// Risk-free rate, per period, for the Sharpe objective and diagnostics.
  pub fn with_risk_free(mut self, risk_free: f64) -> Self {
    self.risk_free = risk_free;
    self
  }

  pub fn kind(&self) -> OptimizerKind {
    self.kind
  }

  pub fn solver(&self) -> &SolverConfig {
    &self.solver
  }

  pub fn risk_free(&self) -> f64 {
    self.risk_free
  }

  /// Optimal weights keyed by `info.companies()`.
  ///
  /// Missing or undefined inputs give [`SolveStatus::InsufficientData`] without
  /// calling the solver; a failed solve gives [`SolveStatus::NotConverged`].
  /// Both leave every weight unset.
  pub fn optimize(&self, info: &InformationSet) -> Portfolio {
    let companies = info.companies().to_vec();
    let kurtosis = match (self.kind.requires_kurtosis(), info.kurtosis()) {
      (true, Some(k)) if k.iter().all(|v| v.is_finite()) => Some(k),
      (true, _) => {
        debug!(kind = %self.kind, "kurtosis missing or undefined");
        return Portfolio::unset(companies, SolveStatus::InsufficientData);
      }
      (false, _) => None,
    };
    if !info.is_sufficient() {
      debug!(kind = %self.kind, assets = info.len(), "information set insufficient");
      return Portfolio::unset(companies, SolveStatus::InsufficientData);
    }

    let mu = info.expected_return();
    let cov = info.covariance();
    let n = info.len();
    let x0 = vec![1.0 / n as f64; n];
    let solver = AugmentedLagrangian::new(self.solver);

    let outcome = match self.kind {
      OptimizerKind::MinimumVariance => solver.minimize(&MinimumVariance { cov }, &x0),
      OptimizerKind::RiskAversionVaR(params) => {
        solver.minimize(&RiskAversionVaR { mu, cov, params }, &x0)
      }
      OptimizerKind::MaxSharpe => solver.minimize(
        &MaxSharpe {
          mu,
          cov,
          risk_free: self.risk_free,
        },
        &x0,
      ),
      OptimizerKind::MinKurtosis => match kurtosis {
        Some(kurtosis) => solver.minimize(&MinKurtosis { kurtosis }, &x0),
        None => return Portfolio::unset(companies, SolveStatus::InsufficientData),
      },
    };

    if !outcome.converged {
      warn!(
        kind = %self.kind,
        attempts = outcome.attempts,
        max_violation = outcome.max_violation,
        stationarity = outcome.stationarity,
        "optimizer did not converge, weights left unset"
      );
      return Portfolio::unset(companies, SolveStatus::NotConverged)
        .with_iterations(outcome.iterations);
    }

    let metrics = PortfolioMetrics::evaluate(&outcome.x, mu, cov, self.risk_free);
    Portfolio::converged(companies, outcome.x, metrics, outcome.iterations)
  }
}
