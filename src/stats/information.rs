//! # Information Set
//!
//! $$
//! \mathcal{I}_t = \big(\mathbf{a},\ \hat\mu \in \mathbb{R}^n,\ \hat\Sigma \in \mathbb{R}^{n\times n},\ \hat\gamma_1,\ \hat\gamma_2\big)
//! $$
//!
//! Struct of arrays keyed by one explicit company order. Position `i` of every
//! vector and row/column `i` of the covariance refer to `companies[i]`.

use anyhow::ensure;
use anyhow::Result;
use ndarray::Array1;
use ndarray::Array2;

#[derive(Clone, Debug, Default)]
pub struct InformationSet {
  companies: Vec<String>,
  expected_return: Array1<f64>,
  covariance: Array2<f64>,
  skewness: Option<Array1<f64>>,
  kurtosis: Option<Array1<f64>>,
}

impl InformationSet {
  /// Fails unless `expected_return` and both covariance axes match `companies`.
  pub fn new(
    companies: Vec<String>,
    expected_return: Array1<f64>,
    covariance: Array2<f64>,
  ) -> Result<Self> {
    let n = companies.len();
    ensure!(
      expected_return.len() == n,
      "expected_return has {} entries for {n} companies",
      expected_return.len()
    );
    ensure!(
      covariance.dim() == (n, n),
      "covariance is {:?}, expected ({n}, {n})",
      covariance.dim()
    );

    Ok(Self {
      companies,
      expected_return,
      covariance,
      skewness: None,
      kurtosis: None,
    })
  }

  /// Set with no assets.
  pub fn empty() -> Self {
    Self {
      covariance: Array2::zeros((0, 0)),
      ..Self::default()
    }
  }

  pub fn with_skewness(mut self, skewness: Array1<f64>) -> Result<Self> {
    ensure!(
      skewness.len() == self.len(),
      "skewness has {} entries for {} companies",
      skewness.len(),
      self.len()
    );
    self.skewness = Some(skewness);
    Ok(self)
  }

  pub fn with_kurtosis(mut self, kurtosis: Array1<f64>) -> Result<Self> {
    ensure!(
      kurtosis.len() == self.len(),
      "kurtosis has {} entries for {} companies",
      kurtosis.len(),
      self.len()
    );
    self.kurtosis = Some(kurtosis);
    Ok(self)
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

  pub fn expected_return(&self) -> &Array1<f64> {
    &self.expected_return
  }

  pub fn covariance(&self) -> &Array2<f64> {
    &self.covariance
  }

  pub fn skewness(&self) -> Option<&Array1<f64>> {
    self.skewness.as_ref()
  }

  pub fn kurtosis(&self) -> Option<&Array1<f64>> {
    self.kurtosis.as_ref()
  }

  pub fn index_of(&self, asset_id: &str) -> Option<usize> {
    self.companies.iter().position(|c| c == asset_id)
  }

  pub fn expected_return_of(&self, asset_id: &str) -> Option<f64> {
    self.index_of(asset_id).map(|i| self.expected_return[i])
  }

  pub fn kurtosis_of(&self, asset_id: &str) -> Option<f64> {
    let i = self.index_of(asset_id)?;
    self.kurtosis.as_ref().map(|k| k[i])
  }

  /// Per-asset volatility, `sqrt(diag(cov))`.
  pub fn volatilities(&self) -> Array1<f64> {
    self.covariance.diag().mapv(|v| v.max(0.0).sqrt())
  }

  /// `(company, expected_return)` pairs in set order.
  pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
    self
      .companies
      .iter()
      .map(String::as_str)
      .zip(self.expected_return.iter().copied())
  }

  /// Non-empty with finite expected returns and covariance.
  pub fn is_sufficient(&self) -> bool {
    !self.is_empty()
      && self.expected_return.iter().all(|v| v.is_finite())
      && self.covariance.iter().all(|v| v.is_finite())
  }
}
