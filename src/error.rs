//! Error types for statistics, frontier and tangency computations.
//!
//! Validation failures abort a request before any optimisation starts.
//! Frontier, tangency and capital market line failures are recoverable:
//! the engine records them on the report and keeps the partial results.

use chrono::NaiveDate;
use thiserror::Error;

use crate::portfolio::solver::SolveError;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, MarkowitzError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MarkowitzError {
  /// Fewer than two assets selected.
  #[error("at least 2 assets are required, got {provided}")]
  EmptyUniverse {
    /// Number of assets supplied
    provided: usize,
  },

  /// Not enough aligned periods to estimate a covariance.
  #[error("at least {required} aligned periods are required, got {provided}")]
  InsufficientData {
    /// Minimum number of periods
    required: usize,
    /// Periods left after alignment
    provided: usize,
  },

  /// Start date after end date.
  #[error("start date {start} is after end date {end}")]
  InvalidDateRange { start: NaiveDate, end: NaiveDate },

  /// Requested history shorter than the minimum span.
  #[error("history spans {days} days, at least {required_days} are required")]
  HistoryTooShort { days: i64, required_days: i64 },

  #[error("unknown asset: {0}")]
  UnknownAsset(String),

  #[error("duplicate asset: {0}")]
  DuplicateAsset(String),

  /// A missing or non-finite return survived cleansing.
  #[error("missing or non-finite value for {asset} at {period}")]
  MissingValue { asset: String, period: NaiveDate },

  #[error("dimension mismatch for {what}: expected {expected}, found {found}")]
  DimensionMismatch {
    what: &'static str,
    expected: usize,
    found: usize,
  },

  #[error("invalid input: {0}")]
  InvalidInput(String),

  /// Every target of the grid failed to converge.
  #[error("no frontier point converged out of {attempted} targets")]
  FrontierUnsolvable { attempted: usize },

  /// No frontier point with a defined Sharpe ratio.
  #[error("frontier has no point with a defined Sharpe ratio")]
  DegenerateFrontier,

  /// Exact re-solve at the maximum-Sharpe target failed.
  #[error("tangency portfolio could not be solved at target return {target_return}: {source}")]
  TangencyInfeasible {
    target_return: f64,
    #[source]
    source: SolveError,
  },

  /// Tangency volatility is zero, the capital market line is undefined.
  #[error("tangency portfolio has zero volatility")]
  ZeroTangencyRisk,

  #[error("failed to read return data: {0}")]
  Read(String),

  #[error("invalid configuration: {0}")]
  Config(String),
}

impl From<csv::Error> for MarkowitzError {
  fn from(err: csv::Error) -> Self {
    Self::Read(err.to_string())
  }
}

impl From<toml::de::Error> for MarkowitzError {
  fn from(err: toml::de::Error) -> Self {
    Self::Config(err.to_string())
  }
}
