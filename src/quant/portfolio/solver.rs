//! # Augmented Lagrangian Solver
//!
//! $$
//! \mathcal{L}_\rho(x,\lambda,\mu) = f(x) + \sum_j \Big(\lambda_j h_j(x) + \tfrac{\rho}{2}h_j(x)^2\Big)
//! + \frac{1}{2\rho}\sum_i \Big(\max(0,\mu_i-\rho g_i(x))^2-\mu_i^2\Big)
//! $$
//!
//! Powell-Hestenes-Rockafellar method for
//! `min f(x)  s.t.  h(x) = 0,  g(x) >= 0,  lo <= x <= hi`.
//! Each outer step minimizes the augmented Lagrangian with argmin's L-BFGS, then
//! updates the multipliers and, when feasibility stalls, the penalty.
//! Box bounds are handled as inequalities during the solve and projected at the end.
//!
//! Everything is deterministic: retries start from perturbations drawn from a
//! seeded generator.

use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Mutex;

use argmin::core::CostFunction;
use argmin::core::Executor;
use argmin::core::Gradient;
use argmin::core::State;
use argmin::solver::linesearch::MoreThuenteLineSearch;
use argmin::solver::quasinewton::LBFGS;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::Distribution;
use rand_distr::StandardNormal;
use tracing::debug;

/// Smooth constrained minimization problem.
///
/// Only [`NonlinearProgram::dim`] and [`NonlinearProgram::objective`] are required;
/// derivatives fall back to forward differences.
pub trait NonlinearProgram {
  fn dim(&self) -> usize;

  fn objective(&self, x: &[f64]) -> f64;

  fn gradient(&self, x: &[f64]) -> Vec<f64> {
    forward_difference(x, |p| vec![self.objective(p)])
      .into_iter()
      .next()
      .unwrap_or_default()
  }

  /// Equality constraints `h(x) = 0`.
  fn equalities(&self, _x: &[f64]) -> Vec<f64> {
    Vec::new()
  }

  /// One gradient row per equality constraint.
  fn equality_jacobian(&self, x: &[f64]) -> Vec<Vec<f64>> {
    forward_difference(x, |p| self.equalities(p))
  }

  /// Inequality constraints `g(x) >= 0`.
  fn inequalities(&self, _x: &[f64]) -> Vec<f64> {
    Vec::new()
  }

  /// One gradient row per inequality constraint.
  fn inequality_jacobian(&self, x: &[f64]) -> Vec<Vec<f64>> {
    forward_difference(x, |p| self.inequalities(p))
  }

  /// Per-coordinate `(lower, upper)`; infinite means unbounded.
  fn bounds(&self) -> Vec<(f64, f64)> {
    vec![(f64::NEG_INFINITY, f64::INFINITY); self.dim()]
  }
}

/// Jacobian rows of `f` at `x` by forward differences.
fn forward_difference<F>(x: &[f64], f: F) -> Vec<Vec<f64>>
where
  F: Fn(&[f64]) -> Vec<f64>,
{
  let f0 = f(x);
  let mut rows = vec![vec![0.0; x.len()]; f0.len()];
  let mut xp = x.to_vec();

  for i in 0..x.len() {
    let eps = 1e-8 * x[i].abs().max(1.0);
    xp[i] = x[i] + eps;
    let fp = f(&xp);
    xp[i] = x[i];
    for (row, (a, b)) in rows.iter_mut().zip(fp.iter().zip(&f0)) {
      row[i] = (a - b) / eps;
    }
  }

  rows
}

/// Runtime configuration for [`AugmentedLagrangian`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SolverConfig {
  /// Multiplier updates per attempt.
  pub max_outer_iters: u64,
  /// L-BFGS iterations per multiplier update.
  pub max_inner_iters: u64,
  /// Cost and gradient evaluations per attempt, line searches included.
  pub max_evaluations: u64,
  /// Largest tolerated constraint violation.
  pub tol_feasibility: f64,
  /// Largest tolerated Lagrangian gradient (infinity norm).
  pub tol_stationarity: f64,
  pub initial_penalty: f64,
  pub penalty_growth: f64,
  pub max_penalty: f64,
  /// L-BFGS history length.
  pub lbfgs_memory: usize,
  /// Extra attempts from perturbed initial guesses after a failed attempt.
  pub retries: usize,
  /// Scale of the initial-guess perturbation.
  pub perturbation: f64,
  pub seed: u64,
}

impl Default for SolverConfig {
  fn default() -> Self {
    Self {
      max_outer_iters: 50,
      max_inner_iters: 1000,
      max_evaluations: 20_000,
      tol_feasibility: 1e-8,
      tol_stationarity: 1e-6,
      initial_penalty: 10.0,
      penalty_growth: 10.0,
      max_penalty: 1e8,
      lbfgs_memory: 10,
      retries: 2,
      perturbation: 0.05,
      seed: 42,
    }
  }
}

/// Result of [`AugmentedLagrangian::minimize`].
#[derive(Clone, Debug)]
pub struct SolveOutcome {
  /// Final point, projected onto the bounds.
  pub x: Vec<f64>,
  pub converged: bool,
  pub objective: f64,
  pub max_violation: f64,
  pub stationarity: f64,
  /// Inner iterations summed over every attempt.
  pub iterations: u64,
  /// Cost and gradient evaluations summed over every attempt.
  pub evaluations: u64,
  pub attempts: usize,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct AugmentedLagrangian {
  config: SolverConfig,
}

fn inequality_values<P>(problem: &P, bounds: &[(f64, f64)], x: &[f64]) -> Vec<f64>
where
  P: NonlinearProgram + ?Sized,
{
  let mut g = problem.inequalities(x);
  for (xi, &(lo, hi)) in x.iter().zip(bounds) {
    if lo.is_finite() {
      g.push(xi - lo);
    }
    if hi.is_finite() {
      g.push(hi - xi);
    }
  }
  g
}

fn inequality_rows<P>(problem: &P, bounds: &[(f64, f64)], x: &[f64]) -> Vec<Vec<f64>>
where
  P: NonlinearProgram + ?Sized,
{
  let mut rows = problem.inequality_jacobian(x);
  for (i, &(lo, hi)) in bounds.iter().enumerate() {
    if lo.is_finite() {
      let mut row = vec![0.0; x.len()];
      row[i] = 1.0;
      rows.push(row);
    }
    if hi.is_finite() {
      let mut row = vec![0.0; x.len()];
      row[i] = -1.0;
      rows.push(row);
    }
  }
  rows
}

fn violation(h: &[f64], g: &[f64]) -> f64 {
  h.iter()
    .map(|v| v.abs())
    .chain(g.iter().map(|v| (-v).max(0.0)))
    .fold(0.0, f64::max)
}

/// `grad f + sum lambda_j grad h_j - sum mu_i grad g_i`, bounds included in `g`.
fn lagrangian_gradient<P>(
  problem: &P,
  bounds: &[(f64, f64)],
  x: &[f64],
  eq_coef: &[f64],
  ineq_coef: &[f64],
) -> Vec<f64>
where
  P: NonlinearProgram + ?Sized,
{
  let mut grad = problem.gradient(x);
  for (row, c) in problem.equality_jacobian(x).iter().zip(eq_coef) {
    for (gk, rk) in grad.iter_mut().zip(row) {
      *gk += c * rk;
    }
  }
  for (row, c) in inequality_rows(problem, bounds, x).iter().zip(ineq_coef) {
    for (gk, rk) in grad.iter_mut().zip(row) {
      *gk -= c * rk;
    }
  }
  grad
}

/// Augmented Lagrangian at fixed multipliers, minimized by L-BFGS.
struct Subproblem<'a, P: ?Sized> {
  problem: &'a P,
  bounds: &'a [(f64, f64)],
  lambda: &'a [f64],
  mu: &'a [f64],
  rho: f64,
  /// Lowest finite value seen, kept even when the line search aborts the run.
  best: &'a Mutex<Option<(f64, Vec<f64>)>>,
  /// Evaluations spent by the current attempt.
  evaluations: &'a AtomicU64,
  budget: u64,
}

impl<P: NonlinearProgram + ?Sized> Subproblem<'_, P> {
  fn value(&self, x: &[f64]) -> f64 {
    let mut v = self.problem.objective(x);
    for (h, l) in self.problem.equalities(x).iter().zip(self.lambda) {
      v += l * h + 0.5 * self.rho * h * h;
    }
    for (g, m) in inequality_values(self.problem, self.bounds, x)
      .iter()
      .zip(self.mu)
    {
      let s = (m - self.rho * g).max(0.0);
      v += (s * s - m * m) / (2.0 * self.rho);
    }
    v
  }

  fn shifted_multipliers(&self, x: &[f64]) -> (Vec<f64>, Vec<f64>) {
    let eq = self
      .problem
      .equalities(x)
      .iter()
      .zip(self.lambda)
      .map(|(h, l)| l + self.rho * h)
      .collect();
    let ineq = inequality_values(self.problem, self.bounds, x)
      .iter()
      .zip(self.mu)
      .map(|(g, m)| (m - self.rho * g).max(0.0))
      .collect();
    (eq, ineq)
  }

  /// Fails once the attempt's evaluation budget is spent; argmin's line search
  /// has no iteration cap of its own.
  fn spend(&self) -> Result<(), argmin::core::Error> {
    let used = self.evaluations.fetch_add(1, Ordering::Relaxed) + 1;
    if used > self.budget {
      return Err(argmin::core::Error::msg("evaluation budget exhausted"));
    }
    Ok(())
  }

  fn record(&self, x: &[f64], value: f64) {
    if !value.is_finite() {
      return;
    }
    if let Ok(mut best) = self.best.lock() {
      if best.as_ref().map_or(true, |(v, _)| value < *v) {
        *best = Some((value, x.to_vec()));
      }
    }
  }
}

impl<P: NonlinearProgram + ?Sized> CostFunction for Subproblem<'_, P> {
  type Param = Vec<f64>;
  type Output = f64;

  fn cost(&self, x: &Self::Param) -> Result<Self::Output, argmin::core::Error> {
    self.spend()?;
    let value = self.value(x);
    self.record(x, value);
    Ok(value)
  }
}

impl<P: NonlinearProgram + ?Sized> Gradient for Subproblem<'_, P> {
  type Param = Vec<f64>;
  type Gradient = Vec<f64>;

  fn gradient(&self, x: &Self::Param) -> Result<Self::Gradient, argmin::core::Error> {
    self.spend()?;
    let (eq, ineq) = self.shifted_multipliers(x);
    Ok(lagrangian_gradient(self.problem, self.bounds, x, &eq, &ineq))
  }
}

impl AugmentedLagrangian {
  pub fn new(config: SolverConfig) -> Self {
    Self { config }
  }

  pub fn config(&self) -> &SolverConfig {
    &self.config
  }

  /// Minimize `problem` from `x0`, retrying from perturbed guesses on failure.
  ///
  /// Never panics on numerical trouble; failure is reported through
  /// [`SolveOutcome::converged`].
  pub fn minimize<P>(&self, problem: &P, x0: &[f64]) -> SolveOutcome
  where
    P: NonlinearProgram + ?Sized,
  {
    if x0.len() != problem.dim() {
      debug!(
        expected = problem.dim(),
        got = x0.len(),
        "initial guess has the wrong dimension"
      );
      return SolveOutcome {
        x: x0.to_vec(),
        converged: false,
        objective: f64::NAN,
        max_violation: f64::INFINITY,
        stationarity: f64::INFINITY,
        iterations: 0,
        evaluations: 0,
        attempts: 0,
      };
    }

    let mut rng = StdRng::seed_from_u64(self.config.seed);
    let mut outcome = self.attempt(problem, x0);
    let mut iterations = outcome.iterations;
    let mut evaluations = outcome.evaluations;

    for attempt in 1..=self.config.retries {
      if outcome.converged {
        break;
      }

      let start: Vec<f64> = x0
        .iter()
        .map(|v| {
          let z: f64 = StandardNormal.sample(&mut rng);
          v + self.config.perturbation * v.abs().max(1.0) * z
        })
        .collect();
      debug!(attempt, "retrying from perturbed initial guess");

      outcome = self.attempt(problem, &start);
      iterations += outcome.iterations;
      evaluations += outcome.evaluations;
      outcome.attempts = attempt + 1;
    }

    outcome.iterations = iterations;
    outcome.evaluations = evaluations;
    outcome
  }

  fn attempt<P>(&self, problem: &P, x0: &[f64]) -> SolveOutcome
  where
    P: NonlinearProgram + ?Sized,
  {
    let cfg = &self.config;
    let bounds = problem.bounds();
    let mut x = x0.to_vec();
    let mut lambda = vec![0.0; problem.equalities(&x).len()];
    let mut mu = vec![0.0; inequality_values(problem, &bounds, &x).len()];
    let mut rho = cfg.initial_penalty;

    let mut max_violation = violation(
      &problem.equalities(&x),
      &inequality_values(problem, &bounds, &x),
    );
    let mut stationarity = f64::INFINITY;
    let mut iterations = 0;
    let mut converged = false;
    let evaluations = AtomicU64::new(0);

    for outer in 0..cfg.max_outer_iters {
      let best = Mutex::new(None);
      let sub = Subproblem {
        problem,
        bounds: &bounds,
        lambda: &lambda,
        mu: &mu,
        rho,
        best: &best,
        evaluations: &evaluations,
        budget: cfg.max_evaluations,
      };
      let (candidate, inner) = self.inner_solve(sub, &x);
      iterations += inner;
      if candidate.iter().all(|v| v.is_finite()) {
        x = candidate;
      }

      let h = problem.equalities(&x);
      let g = inequality_values(problem, &bounds, &x);
      for (l, hj) in lambda.iter_mut().zip(&h) {
        *l += rho * hj;
      }
      for (m, gi) in mu.iter_mut().zip(&g) {
        *m = (*m - rho * gi).max(0.0);
      }

      let previous = max_violation;
      max_violation = violation(&h, &g);
      stationarity = lagrangian_gradient(problem, &bounds, &x, &lambda, &mu)
        .iter()
        .fold(0.0, |acc, v| acc.max(v.abs()));

      debug!(outer, rho, max_violation, stationarity, "augmented lagrangian step");

      if max_violation <= cfg.tol_feasibility && stationarity <= cfg.tol_stationarity {
        converged = true;
        break;
      }
      if !stationarity.is_finite() || lambda.iter().chain(&mu).any(|v| !v.is_finite()) {
        break;
      }
      if evaluations.load(Ordering::Relaxed) >= cfg.max_evaluations {
        debug!(outer, max_violation, "evaluation budget exhausted");
        break;
      }
      if max_violation > 0.25 * previous {
        rho = (rho * cfg.penalty_growth).min(cfg.max_penalty);
      }
    }

    for (xi, &(lo, hi)) in x.iter_mut().zip(&bounds) {
      *xi = xi.clamp(lo, hi);
    }

    SolveOutcome {
      objective: problem.objective(&x),
      x,
      converged,
      max_violation,
      stationarity,
      iterations,
      evaluations: evaluations.load(Ordering::Relaxed).min(cfg.max_evaluations),
      attempts: 1,
    }
  }

  /// Minimize one subproblem from `x`; returns the best point seen and the iterations used.
  fn inner_solve<P>(&self, sub: Subproblem<'_, P>, x: &[f64]) -> (Vec<f64>, u64)
  where
    P: NonlinearProgram + ?Sized,
  {
    let best = sub.best;
    let iterations = match self.run_lbfgs(sub, x) {
      Ok(iterations) => iterations,
      Err(err) => {
        debug!(error = %err, "inner solve stopped early");
        0
      }
    };

    let point = best
      .lock()
      .ok()
      .and_then(|b| b.as_ref().map(|(_, p)| p.clone()))
      .unwrap_or_else(|| x.to_vec());
    (point, iterations)
  }

  fn run_lbfgs<P>(&self, sub: Subproblem<'_, P>, x: &[f64]) -> Result<u64, argmin::core::Error>
  where
    P: NonlinearProgram + ?Sized,
  {
    let linesearch = MoreThuenteLineSearch::new()
      .with_c(1e-4, 0.9)?
      .with_bounds(1e-12, 1e6)?;
    let solver = LBFGS::new(linesearch, self.config.lbfgs_memory)
      .with_tolerance_grad(self.config.tol_stationarity * 1e-2)?;
    let max_iters = self.config.max_inner_iters;

    let res = Executor::new(sub, solver)
      .configure(|state| state.param(x.to_vec()).max_iters(max_iters))
      .run()?;

    Ok(res.state().get_iter())
  }
}
