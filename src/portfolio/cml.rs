//! # Capital Market Line
//!
//! $$
//! \mathbb E[R](\sigma) = r_f + \frac{\mu_T - r_f}{\sigma_T}\,\sigma
//! $$
//!
//! Line from the risk-free rate through the tangency portfolio.

use super::types::TangencyResult;
use crate::error::MarkowitzError;
use crate::error::Result;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CapitalMarketLine {
  pub risk_free_rate: f64,
  pub tangency_volatility: f64,
  pub tangency_return: f64,
  /// Excess return per unit of volatility.
  pub slope: f64,
  /// Right end of the plotted segment.
  pub max_volatility: f64,
}

impl CapitalMarketLine {
  /// Expected return on the line at `volatility`, also beyond the tangency point.
  pub fn return_at(&self, volatility: f64) -> f64 {
    self.risk_free_rate + self.slope * volatility
  }

  pub fn intercept(&self) -> f64 {
    self.risk_free_rate
  }

  /// `(volatility, return)` at `0` and at `max_volatility`.
  pub fn endpoints(&self) -> [(f64, f64); 2] {
    [
      (0.0, self.risk_free_rate),
      (self.max_volatility, self.return_at(self.max_volatility)),
    ]
  }

  /// `samples` evenly spaced `(volatility, return)` pairs over `[0, max_volatility]`.
  pub fn sample(&self, samples: usize) -> Vec<(f64, f64)> {
    match samples {
      0 => Vec::new(),
      1 => vec![(0.0, self.risk_free_rate)],
      _ => {
        let step = self.max_volatility / (samples - 1) as f64;
        (0..samples)
          .map(|i| {
            let sigma = step * i as f64;
            (sigma, self.return_at(sigma))
          })
          .collect()
      }
    }
  }
}

/// Project the capital market line for display.
pub fn project(
  tangency: &TangencyResult,
  risk_free: f64,
  max_volatility: f64,
) -> Result<CapitalMarketLine> {
  if !max_volatility.is_finite() || max_volatility < 0.0 {
    return Err(MarkowitzError::InvalidInput(format!(
      "maximum volatility must be finite and non-negative, got {max_volatility}"
    )));
  }
  if tangency.volatility == 0.0 || !tangency.volatility.is_finite() {
    return Err(MarkowitzError::ZeroTangencyRisk);
  }

  Ok(CapitalMarketLine {
    risk_free_rate: risk_free,
    tangency_volatility: tangency.volatility,
    tangency_return: tangency.expected_return,
    slope: (tangency.expected_return - risk_free) / tangency.volatility,
    max_volatility,
  })
}

#[cfg(test)]
mod tests {
  use approx::assert_relative_eq;

  use super::*;
  use crate::portfolio::types::Portfolio;

  fn tangency(expected_return: f64, volatility: f64) -> TangencyResult {
    TangencyResult {
      portfolio: Portfolio::new(vec!["A".into(), "B".into()], vec![0.5, 0.5]),
      expected_return,
      volatility,
      sharpe_ratio: None,
      grid_target: expected_return,
      grid_sharpe_ratio: 0.0,
    }
  }

  #[test]
  fn passes_through_risk_free_and_tangency() {
    let line = project(&tangency(0.09, 0.15), 0.03, 0.3).unwrap();
    assert_eq!(line.return_at(0.0), 0.03);
    assert_relative_eq!(line.return_at(0.15), 0.09, epsilon = 1e-15);
    assert_relative_eq!(line.slope, 0.4, epsilon = 1e-12);

    let [start, end] = line.endpoints();
    assert_eq!(start, (0.0, 0.03));
    assert_relative_eq!(end.1, 0.03 + 0.4 * 0.3, epsilon = 1e-12);
  }

  #[test]
  fn sample_covers_segment() {
    let line = project(&tangency(0.09, 0.15), 0.03, 0.3).unwrap();
    let pts = line.sample(100);
    assert_eq!(pts.len(), 100);
    assert_eq!(pts[0], (0.0, 0.03));
    assert_relative_eq!(pts[99].0, 0.3, epsilon = 1e-12);
    assert!(line.sample(0).is_empty());
  }

  #[test]
  fn zero_risk_tangency_is_rejected() {
    assert_eq!(
      project(&tangency(0.05, 0.0), 0.03, 0.3).unwrap_err(),
      MarkowitzError::ZeroTangencyRisk
    );
    assert!(matches!(
      project(&tangency(0.05, 0.1), 0.03, -1.0),
      Err(MarkowitzError::InvalidInput(_))
    ));
  }
}
