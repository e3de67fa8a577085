//! # Portfolio Types
//!
//! $$
//! \mathbf{w}^\*=\arg\max_{\mathbf{w}} \frac{\mathbb E[R_p]-r_f}{\sigma_p}
//! $$
//!
//! Shared enums and value objects for frontier and tangency computations.

use std::fmt::Display;

use serde::Deserialize;
use serde::Serialize;

/// Tolerance on the budget constraint `sum(w) = 1` for every returned portfolio.
pub const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

/// Weight bounds applied to every asset.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConstraintMode {
  /// Long-only, each weight in `[0, 1]`.
  #[default]
  Bounded,
  /// Long/short, each weight in `[-1, 1]`.
  Unbounded,
}

impl ConstraintMode {
  /// Both modes, long-only first.
  pub const ALL: [ConstraintMode; 2] = [ConstraintMode::Bounded, ConstraintMode::Unbounded];

  /// `(lower, upper)` bound shared by every weight.
  pub fn bounds(self) -> (f64, f64) {
    match self {
      Self::Bounded => (0.0, 1.0),
      Self::Unbounded => (-1.0, 1.0),
    }
  }

  /// Whether `w` respects the bounds, allowing `tol` of slack.
  pub fn admits(self, w: f64, tol: f64) -> bool {
    let (lo, hi) = self.bounds();
    w >= lo - tol && w <= hi + tol
  }

  /// Parse a user supplied mode name.
  pub fn parse(s: &str) -> Option<Self> {
    match s.to_lowercase().as_str() {
      "bounded" | "long-only" | "longonly" => Some(Self::Bounded),
      "unbounded" | "long-short" | "longshort" | "short" => Some(Self::Unbounded),
      _ => None,
    }
  }
}

impl Display for ConstraintMode {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      ConstraintMode::Bounded => write!(f, "long only"),
      ConstraintMode::Unbounded => write!(f, "long and short"),
    }
  }
}

/// Portfolio weights keyed by asset name.
#[derive(Clone, Debug, PartialEq)]
pub struct Portfolio {
  assets: Vec<String>,
  weights: Vec<f64>,
}

impl Portfolio {
  /// Pair asset names with weights. Both slices must have the same length.
  pub(crate) fn new(assets: Vec<String>, weights: Vec<f64>) -> Self {
    debug_assert_eq!(assets.len(), weights.len());
    Self { assets, weights }
  }

  pub fn assets(&self) -> &[String] {
    &self.assets
  }

  pub fn weights(&self) -> &[f64] {
    &self.weights
  }

  /// Weight held in `asset`, if it belongs to the portfolio.
  pub fn weight_of(&self, asset: &str) -> Option<f64> {
    self
      .assets
      .iter()
      .position(|a| a == asset)
      .map(|i| self.weights[i])
  }

  /// `(asset, weight)` pairs in asset order.
  pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
    self
      .assets
      .iter()
      .map(String::as_str)
      .zip(self.weights.iter().copied())
  }

  pub fn total_weight(&self) -> f64 {
    self.weights.iter().sum()
  }

  /// Budget and bound check used by tests and callers validating results.
  pub fn is_admissible(&self, mode: ConstraintMode) -> bool {
    (self.total_weight() - 1.0).abs() < WEIGHT_SUM_TOLERANCE
      && self
        .weights
        .iter()
        .all(|&w| mode.admits(w, WEIGHT_SUM_TOLERANCE))
  }
}

/// One retained point of the efficient frontier.
#[derive(Clone, Debug, PartialEq)]
pub struct FrontierPoint {
  /// Requested minimum portfolio return.
  pub target_return: f64,
  /// Minimal volatility found for the target.
  pub volatility: f64,
  /// Weights achieving `volatility`, kept only when requested.
  pub portfolio: Option<Portfolio>,
}

/// Maximum-Sharpe portfolio re-solved at its exact target return.
#[derive(Clone, Debug, PartialEq)]
pub struct TangencyResult {
  pub portfolio: Portfolio,
  /// Achieved expected return `w^T mu`.
  pub expected_return: f64,
  /// Achieved volatility `sqrt(w^T Sigma w)`.
  pub volatility: f64,
  /// `(expected_return - risk_free) / volatility`, `None` when volatility is zero.
  pub sharpe_ratio: Option<f64>,
  /// Grid target selected during the frontier scan.
  pub grid_target: f64,
  /// Sharpe ratio of the selected grid point.
  pub grid_sharpe_ratio: f64,
}

/// Sharpe ratio guarded against zero or non-finite volatility.
pub fn sharpe_ratio(expected_return: f64, volatility: f64, risk_free: f64) -> Option<f64> {
  if volatility.is_nan() || volatility <= 0.0 {
    return None;
  }
  let ratio = (expected_return - risk_free) / volatility;
  ratio.is_finite().then_some(ratio)
}
