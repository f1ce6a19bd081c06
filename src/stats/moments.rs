//! # Return Moments
//!
//! $$
//! G_1 = \frac{\sqrt{n(n-1)}}{n-2}\frac{m_3}{m_2^{3/2}},\qquad
//! G_2 = \frac{(n-1)\big((n+1)g_2+6\big)}{(n-2)(n-3)},\quad g_2=\frac{m_4}{m_2^2}-3
//! $$
//!
//! Sample statistics of simple-return series. Undefined values are `NaN`, never panics.

use ndarray::Array2;
use ndarray_stats::CorrelationExt;

/// Period-over-period percentage change. Non-finite changes (zero previous price) are dropped.
pub fn simple_returns(prices: &[f64]) -> Vec<f64> {
  prices
    .windows(2)
    .map(|w| w[1] / w[0] - 1.0)
    .filter(|r| r.is_finite())
    .collect()
}

pub fn mean(xs: &[f64]) -> f64 {
  if xs.is_empty() {
    f64::NAN
  } else {
    xs.iter().sum::<f64>() / xs.len() as f64
  }
}

/// Population central moments `(m2, m3, m4)`.
fn central_moments(xs: &[f64]) -> (f64, f64, f64) {
  let n = xs.len() as f64;
  let mu = mean(xs);

  let mut m2 = 0.0;
  let mut m3 = 0.0;
  let mut m4 = 0.0;
  for &x in xs {
    let d = x - mu;
    let d2 = d * d;
    m2 += d2;
    m3 += d2 * d;
    m4 += d2 * d2;
  }

  (m2 / n, m3 / n, m4 / n)
}

/// Bias-adjusted Fisher-Pearson skewness. Needs three observations.
pub fn skewness(xs: &[f64]) -> f64 {
  let n = xs.len();
  if n < 3 {
    return f64::NAN;
  }

  let (m2, m3, _) = central_moments(xs);
  if m2 <= f64::EPSILON * f64::EPSILON {
    return 0.0;
  }

  let n = n as f64;
  let g1 = m3 / m2.powf(1.5);
  g1 * (n * (n - 1.0)).sqrt() / (n - 2.0)
}

/// Unbiased excess kurtosis. Needs four observations.
pub fn excess_kurtosis(xs: &[f64]) -> f64 {
  let n = xs.len();
  if n < 4 {
    return f64::NAN;
  }

  let (m2, _, m4) = central_moments(xs);
  if m2 <= f64::EPSILON * f64::EPSILON {
    return 0.0;
  }

  let n = n as f64;
  let g2 = m4 / (m2 * m2) - 3.0;
  ((n + 1.0) * g2 + 6.0) * (n - 1.0) / ((n - 2.0) * (n - 3.0))
}

/// Sample covariance (ddof = 1) of a `observations x assets` matrix.
///
/// Fewer than two observations gives an all-`NaN` matrix of the right shape.
pub fn sample_covariance(returns: &Array2<f64>) -> Array2<f64> {
  let n = returns.ncols();
  if returns.nrows() < 2 {
    return Array2::from_elem((n, n), f64::NAN);
  }

  match returns.t().cov(1.0) {
    // exact symmetry regardless of summation order
    Ok(cov) => (&cov + &cov.t()) * 0.5,
    Err(_) => Array2::from_elem((n, n), f64::NAN),
  }
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;
  use ndarray::array;

  use super::*;

  #[test]
  fn simple_returns_skip_zero_prices() {
    let r = simple_returns(&[100.0, 110.0, 0.0, 5.0, 10.0]);
    assert_eq!(r.len(), 3);
    assert_abs_diff_eq!(r[0], 0.1, epsilon = 1e-12);
    assert_abs_diff_eq!(r[1], -1.0, epsilon = 1e-12);
    assert_abs_diff_eq!(r[2], 1.0, epsilon = 1e-12);
  }

  #[test]
  fn mean_of_empty_is_nan() {
    assert!(mean(&[]).is_nan());
    assert_abs_diff_eq!(mean(&[1.0, 2.0, 6.0]), 3.0, epsilon = 1e-12);
  }

  #[test]
  fn adjusted_skewness_matches_reference_value() {
    assert_abs_diff_eq!(skewness(&[1.0, 2.0, 3.0, 4.0, 10.0]), 1.697056, epsilon = 1e-6);
    assert_abs_diff_eq!(skewness(&[1.0, 2.0, 3.0, 4.0, 5.0]), 0.0, epsilon = 1e-12);
    assert!(skewness(&[1.0, 2.0]).is_nan());
  }

  #[test]
  fn unbiased_kurtosis_matches_reference_value() {
    assert_abs_diff_eq!(excess_kurtosis(&[1.0, 2.0, 3.0, 4.0, 5.0]), -1.2, epsilon = 1e-12);
    assert!(excess_kurtosis(&[1.0, 2.0, 3.0]).is_nan());
    assert_eq!(excess_kurtosis(&[0.01; 6]), 0.0);
  }

  #[test]
  fn covariance_of_known_matrix() {
    let returns = array![[1.0, 2.0], [2.0, 4.0], [3.0, 7.0]];
    let cov = sample_covariance(&returns);

    assert_abs_diff_eq!(cov[[0, 0]], 1.0, epsilon = 1e-12);
    assert_abs_diff_eq!(cov[[0, 1]], 2.5, epsilon = 1e-12);
    assert_abs_diff_eq!(cov[[1, 0]], 2.5, epsilon = 1e-12);
    assert_abs_diff_eq!(cov[[1, 1]], 6.333333333333333, epsilon = 1e-12);
  }

  #[test]
  fn covariance_with_one_observation_is_nan() {
    let returns = array![[0.01, 0.02, 0.03]];
    let cov = sample_covariance(&returns);

    assert_eq!(cov.dim(), (3, 3));
    assert!(cov.iter().all(|v| v.is_nan()));
  }
}
