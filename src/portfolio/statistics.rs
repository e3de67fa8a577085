//! # Return Statistics
//!
//! $$
//! \mu_i = \Big(1 + \frac{1}{T}\sum_{t=1}^{T} \frac{r_{i,t}}{(1+d)^{t/12}}\Big)^{12} - 1,
//! \qquad \Sigma = 12 \cdot \widehat{\operatorname{Cov}}(r)
//! $$
//!
//! Annualised expected returns and covariance from monthly returns.

use nalgebra::DMatrix;
use nalgebra::DVector;
use statrs::statistics::Statistics;
use tracing::debug;

use super::data::ReturnMatrix;
use super::types::sharpe_ratio;
use crate::error::MarkowitzError;
use crate::error::Result;

/// Monthly observations per year.
pub const PERIODS_PER_YEAR: f64 = 12.0;

const SYMMETRY_TOLERANCE: f64 = 1e-12;

/// Annualised inputs of the mean-variance problem.
#[derive(Clone, Debug, PartialEq)]
pub struct ReturnStatistics {
  assets: Vec<String>,
  expected_returns: DVector<f64>,
  covariance: DMatrix<f64>,
}

/// One row of the per-asset statistics table.
#[derive(Clone, Debug, PartialEq)]
pub struct AssetSummary {
  pub name: String,
  pub annual_return: f64,
  pub annual_volatility: f64,
  /// `None` for constant-return assets.
  pub sharpe_ratio: Option<f64>,
}

impl ReturnStatistics {
  /// Build statistics from already annualised inputs.
  ///
  /// The covariance must be square, symmetric, finite and have a
  /// non-negative diagonal.
  pub fn new(
    assets: Vec<String>,
    expected_returns: DVector<f64>,
    covariance: DMatrix<f64>,
  ) -> Result<Self> {
    let n = assets.len();
    if n < 2 {
      return Err(MarkowitzError::EmptyUniverse { provided: n });
    }
    if expected_returns.len() != n {
      return Err(MarkowitzError::DimensionMismatch {
        what: "expected returns",
        expected: n,
        found: expected_returns.len(),
      });
    }
    if covariance.nrows() != n || covariance.ncols() != n {
      return Err(MarkowitzError::DimensionMismatch {
        what: "covariance",
        expected: n,
        found: covariance.nrows().max(covariance.ncols()),
      });
    }
    if expected_returns.iter().chain(covariance.iter()).any(|v| !v.is_finite()) {
      return Err(MarkowitzError::InvalidInput(
        "statistics must be finite".to_string(),
      ));
    }

    for i in 0..n {
      if covariance[(i, i)] < 0.0 {
        return Err(MarkowitzError::InvalidInput(format!(
          "negative variance for {}",
          assets[i]
        )));
      }
      for j in (i + 1)..n {
        let (a, b) = (covariance[(i, j)], covariance[(j, i)]);
        let scale = a.abs().max(b.abs()).max(1.0);
        if (a - b).abs() > SYMMETRY_TOLERANCE * scale {
          return Err(MarkowitzError::InvalidInput(
            "covariance matrix must be symmetric".to_string(),
          ));
        }
      }
    }

    Ok(Self {
      assets,
      expected_returns,
      covariance,
    })
  }

  /// Asset names in column order.
  pub fn assets(&self) -> &[String] {
    &self.assets
  }

  /// Number of assets.
  pub fn len(&self) -> usize {
    self.assets.len()
  }

  /// Whether the universe has no asset.
  pub fn is_empty(&self) -> bool {
    self.assets.is_empty()
  }

  /// Annualised discounted expected returns.
  pub fn expected_returns(&self) -> &DVector<f64> {
    &self.expected_returns
  }

  /// Annualised covariance matrix.
  pub fn covariance(&self) -> &DMatrix<f64> {
    &self.covariance
  }

  /// Annualised volatilities, `sqrt(diag(Sigma))`.
  pub fn volatilities(&self) -> DVector<f64> {
    self.covariance.diagonal().map(|v| v.max(0.0).sqrt())
  }

  /// Pearson correlations implied by the covariance.
  ///
  /// Pairs involving a zero-variance asset get a correlation of zero.
  pub fn correlation(&self) -> DMatrix<f64> {
    let sigma = self.volatilities();
    let n = self.len();
    DMatrix::from_fn(n, n, |i, j| {
      if i == j {
        return 1.0;
      }
      let denom = sigma[i] * sigma[j];
      if denom > 1e-15 {
        (self.covariance[(i, j)] / denom).clamp(-1.0, 1.0)
      } else {
        0.0
      }
    })
  }

  /// Statistics table rows with per-asset Sharpe ratios.
  pub fn asset_summaries(&self, risk_free: f64) -> Vec<AssetSummary> {
    let sigma = self.volatilities();
    self
      .assets
      .iter()
      .enumerate()
      .map(|(i, name)| AssetSummary {
        name: name.clone(),
        annual_return: self.expected_returns[i],
        annual_volatility: sigma[i],
        sharpe_ratio: sharpe_ratio(self.expected_returns[i], sigma[i], risk_free),
      })
      .collect()
  }
}

/// Discount each monthly return by `(1 + d)^(t/12)`, `t = 1..T`.
pub fn discounted_returns(returns: &[f64], discount_rate: f64) -> Vec<f64> {
  returns
    .iter()
    .enumerate()
    .map(|(k, r)| r / (1.0 + discount_rate).powf((k + 1) as f64 / PERIODS_PER_YEAR))
    .collect()
}

/// Compound the mean discounted monthly return to an annual figure.
pub fn annualized_discounted_return(returns: &[f64], discount_rate: f64) -> f64 {
  let mean = discounted_returns(returns, discount_rate).mean();
  (1.0 + mean).powf(PERIODS_PER_YEAR) - 1.0
}

/// Derive annualised statistics from aligned monthly returns.
pub fn compute_statistics(returns: &ReturnMatrix, discount_rate: f64) -> Result<ReturnStatistics> {
  let n = returns.n_assets();
  if n < 2 {
    return Err(MarkowitzError::EmptyUniverse { provided: n });
  }
  let t = returns.n_periods();
  if t < 2 {
    return Err(MarkowitzError::InsufficientData {
      required: 2,
      provided: t,
    });
  }
  if !discount_rate.is_finite() || discount_rate <= -1.0 {
    return Err(MarkowitzError::InvalidInput(format!(
      "discount rate must be finite and above -1, got {discount_rate}"
    )));
  }

  let columns: Vec<Vec<f64>> = (0..n)
    .map(|j| returns.column(j).iter().copied().collect())
    .collect();

  let expected_returns = DVector::from_iterator(
    n,
    columns
      .iter()
      .map(|c| annualized_discounted_return(c, discount_rate)),
  );

  let mut covariance = DMatrix::zeros(n, n);
  for i in 0..n {
    for j in i..n {
      let c = columns[i].iter().covariance(columns[j].iter()) * PERIODS_PER_YEAR;
      covariance[(i, j)] = c;
      covariance[(j, i)] = c;
    }
  }

  debug!(assets = n, periods = t, discount_rate, "computed return statistics");

  ReturnStatistics::new(returns.assets().to_vec(), expected_returns, covariance)
}

#[cfg(test)]
mod tests {
  use approx::assert_relative_eq;
  use chrono::NaiveDate;

  use super::*;

  fn matrix(columns: &[&[f64]]) -> ReturnMatrix {
    let t = columns[0].len();
    let periods = (0..t)
      .map(|m| NaiveDate::from_ymd_opt(2021, 1 + m as u32, 1).unwrap())
      .collect();
    let assets = (0..columns.len()).map(|j| format!("A{j}")).collect();
    let values = DMatrix::from_fn(t, columns.len(), |i, j| columns[j][i]);
    ReturnMatrix::new(periods, assets, values).unwrap()
  }

  #[test]
  fn undiscounted_statistics_match_hand_computation() {
    let m = matrix(&[&[0.01, 0.02, 0.03], &[0.02, 0.0, 0.01]]);
    let stats = compute_statistics(&m, 0.0).unwrap();

    assert_relative_eq!(stats.expected_returns()[0], 1.02_f64.powi(12) - 1.0, epsilon = 1e-12);
    assert_relative_eq!(stats.expected_returns()[1], 1.01_f64.powi(12) - 1.0, epsilon = 1e-12);
    assert_relative_eq!(stats.covariance()[(0, 0)], 1.2e-3, epsilon = 1e-12);
    assert_relative_eq!(stats.covariance()[(0, 1)], -6e-4, epsilon = 1e-12);
    assert_relative_eq!(stats.covariance()[(1, 0)], -6e-4, epsilon = 1e-12);
  }

  #[test]
  fn discounting_uses_fractional_year_exponent() {
    let r = [0.02, 0.02, 0.02, 0.02];
    let d = 0.12;
    let expected_mean = r
      .iter()
      .enumerate()
      .map(|(k, x)| x / 1.12_f64.powf((k + 1) as f64 / 12.0))
      .sum::<f64>()
      / 4.0;

    assert_relative_eq!(
      annualized_discounted_return(&r, d),
      (1.0 + expected_mean).powi(12) - 1.0,
      epsilon = 1e-14
    );
    assert!(annualized_discounted_return(&r, d) < annualized_discounted_return(&r, 0.0));
  }

  #[test]
  fn covariance_ignores_discounting() {
    let m = matrix(&[&[0.01, -0.02, 0.03, 0.0], &[0.02, 0.01, -0.01, 0.04]]);
    let plain = compute_statistics(&m, 0.0).unwrap();
    let discounted = compute_statistics(&m, 0.05).unwrap();
    assert_eq!(plain.covariance(), discounted.covariance());
  }

  #[test]
  fn covariance_is_symmetric() {
    let m = matrix(&[
      &[0.01, -0.02, 0.03, 0.0, 0.015],
      &[0.02, 0.01, -0.01, 0.04, -0.005],
      &[-0.03, 0.02, 0.0, 0.01, 0.02],
    ]);
    let stats = compute_statistics(&m, 0.03).unwrap();
    let cov = stats.covariance();
    for i in 0..3 {
      assert!(cov[(i, i)] >= 0.0);
      for j in 0..3 {
        assert_relative_eq!(cov[(i, j)], cov[(j, i)], epsilon = 1e-15);
      }
    }
  }

  #[test]
  fn volatility_is_monthly_std_scaled() {
    let col = [0.01, -0.02, 0.03, 0.0];
    let m = matrix(&[&col, &[0.02, 0.01, -0.01, 0.04]]);
    let stats = compute_statistics(&m, 0.0).unwrap();
    let monthly_std = col.iter().std_dev();
    assert_relative_eq!(stats.volatilities()[0], monthly_std * 12f64.sqrt(), epsilon = 1e-12);
  }

  #[test]
  fn constant_asset_has_undefined_sharpe() {
    let m = matrix(&[&[0.0, 0.0, 0.0], &[0.02, 0.0, 0.01]]);
    let stats = compute_statistics(&m, 0.0).unwrap();
    let rows = stats.asset_summaries(0.02);
    assert_eq!(rows[0].sharpe_ratio, None);
    assert_eq!(rows[0].annual_volatility, 0.0);
    assert!(rows[1].sharpe_ratio.is_some());
    assert_eq!(stats.correlation()[(0, 1)], 0.0);
  }

  #[test]
  fn rejects_small_universes_and_histories() {
    let one_asset = matrix(&[&[0.01, 0.02]]);
    assert_eq!(
      compute_statistics(&one_asset, 0.0).unwrap_err(),
      MarkowitzError::EmptyUniverse { provided: 1 }
    );

    let one_period = matrix(&[&[0.01], &[0.02]]);
    assert_eq!(
      compute_statistics(&one_period, 0.0).unwrap_err(),
      MarkowitzError::InsufficientData {
        required: 2,
        provided: 1
      }
    );
  }

  #[test]
  fn new_rejects_asymmetric_covariance() {
    let err = ReturnStatistics::new(
      vec!["A".into(), "B".into()],
      DVector::from_vec(vec![0.05, 0.07]),
      DMatrix::from_row_slice(2, 2, &[0.04, 0.01, 0.02, 0.09]),
    )
    .unwrap_err();
    assert!(matches!(err, MarkowitzError::InvalidInput(_)));
  }
}
