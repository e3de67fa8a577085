//! # Markowitz Engine
//!
//! $$
//! r \;\to\; (\mu, \Sigma) \;\to\; \sigma^\*(\tau) \;\to\; \mathbf{w}_T \;\to\; \text{CML}
//! $$
//!
//! High-level orchestration of statistics, frontier, tangency and capital market line.

use std::path::Path;

use nalgebra::DMatrix;
use serde::Deserialize;
use serde::Serialize;
use tracing::info;
use tracing::instrument;
use tracing::warn;

use super::cml;
use super::cml::CapitalMarketLine;
use super::data::ReturnMatrix;
use super::frontier::FrontierSolver;
use super::frontier::DEFAULT_GRID_SIZE;
use super::request::ReturnSource;
use super::request::UniverseRequest;
use super::solver::SolverConfig;
use super::statistics::compute_statistics;
use super::statistics::AssetSummary;
use super::statistics::ReturnStatistics;
use super::tangency::TangencyPortfolioSolver;
use super::types::ConstraintMode;
use super::types::FrontierPoint;
use super::types::TangencyResult;
use crate::error::MarkowitzError;
use crate::error::Result;

/// Runtime configuration for [`MarkowitzEngine`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
  /// Annual risk-free rate used for Sharpe ratios and the capital market line.
  pub risk_free_rate: f64,
  /// Annual rate discounting monthly returns, the risk-free rate when unset.
  pub discount_rate: Option<f64>,
  /// Weight bounds used by [`MarkowitzEngine::run`].
  pub constraint_mode: ConstraintMode,
  /// Number of target returns on the frontier grid.
  pub grid_size: usize,
  /// Solve frontier targets on the rayon pool.
  pub parallel: bool,
  /// Keep the weights of every frontier point.
  pub retain_weights: bool,
  pub solver: SolverConfig,
}

impl Default for EngineConfig {
  fn default() -> Self {
    Self {
      risk_free_rate: 0.04,
      discount_rate: None,
      constraint_mode: ConstraintMode::Bounded,
      grid_size: DEFAULT_GRID_SIZE,
      parallel: false,
      retain_weights: false,
      solver: SolverConfig::default(),
    }
  }
}

impl EngineConfig {
  /// Parse a TOML document, missing keys fall back to the defaults.
  pub fn from_toml_str(s: &str) -> Result<Self> {
    let config: Self = toml::from_str(s)?;
    config.validate()?;
    Ok(config)
  }

  /// Read and parse a TOML configuration file.
  pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path)
      .map_err(|e| MarkowitzError::Config(format!("{}: {e}", path.display())))?;
    Self::from_toml_str(&raw)
  }

  /// Rate applied by the statistics step.
  pub fn effective_discount_rate(&self) -> f64 {
    self.discount_rate.unwrap_or(self.risk_free_rate)
  }

  /// Reject settings no run can succeed with.
  pub fn validate(&self) -> Result<()> {
    if !self.risk_free_rate.is_finite() {
      return Err(MarkowitzError::Config(format!(
        "risk_free_rate must be finite, got {}",
        self.risk_free_rate
      )));
    }
    if self.grid_size == 0 {
      return Err(MarkowitzError::Config(
        "grid_size must be at least 1".to_string(),
      ));
    }
    if self.solver.lbfgs_memory == 0 {
      return Err(MarkowitzError::Config(
        "solver.lbfgs_memory must be at least 1".to_string(),
      ));
    }
    Ok(())
  }
}

/// Everything computed for one constraint mode.
///
/// `frontier`, `tangency` and `capital_market_line` are left empty when
/// their step failed, the failure is listed in `issues`.
#[derive(Clone, Debug, PartialEq)]
pub struct MarkowitzReport {
  pub mode: ConstraintMode,
  pub risk_free_rate: f64,
  pub statistics: ReturnStatistics,
  pub asset_summaries: Vec<AssetSummary>,
  pub correlation: DMatrix<f64>,
  pub frontier: Vec<FrontierPoint>,
  pub tangency: Option<TangencyResult>,
  pub capital_market_line: Option<CapitalMarketLine>,
  pub issues: Vec<MarkowitzError>,
}

impl MarkowitzReport {
  /// Whether every step succeeded.
  pub fn is_complete(&self) -> bool {
    self.issues.is_empty()
  }

  /// Largest volatility of the frontier, the right end of the plotted segment.
  pub fn max_frontier_volatility(&self) -> Option<f64> {
    max_volatility(&self.frontier)
  }
}

fn max_volatility(frontier: &[FrontierPoint]) -> Option<f64> {
  frontier
    .iter()
    .map(|p| p.volatility)
    .filter(|v| v.is_finite())
    .max_by(|a, b| a.total_cmp(b))
}

/// Single entry-point engine for the mean-variance workflow.
#[derive(Clone, Debug, Default)]
pub struct MarkowitzEngine {
  config: EngineConfig,
}

impl MarkowitzEngine {
  /// Construct a new engine with explicit configuration.
  pub fn new(config: EngineConfig) -> Self {
    Self { config }
  }

  /// Borrow engine configuration.
  pub fn config(&self) -> &EngineConfig {
    &self.config
  }

  /// Statistics of `returns` with the configured discount rate.
  pub fn statistics(&self, returns: &ReturnMatrix) -> Result<ReturnStatistics> {
    compute_statistics(returns, self.config.effective_discount_rate())
  }

  /// Run the configured constraint mode.
  pub fn run(&self, returns: &ReturnMatrix) -> Result<MarkowitzReport> {
    self.run_with_mode(returns, self.config.constraint_mode)
  }

  /// Run `mode` regardless of the configured constraint mode.
  pub fn run_with_mode(&self, returns: &ReturnMatrix, mode: ConstraintMode) -> Result<MarkowitzReport> {
    let stats = self.statistics(returns)?;
    self.run_on_statistics(stats, mode)
  }

  /// Validate `request`, fetch its returns from `source` and run it.
  ///
  /// The request's risk-free rate and constraint mode take precedence over
  /// the configured ones, the remaining settings are kept.
  pub fn run_request<S: ReturnSource + ?Sized>(
    &self,
    request: &UniverseRequest,
    source: &S,
  ) -> Result<MarkowitzReport> {
    let returns = request.fetch(source)?;
    let engine = Self::new(EngineConfig {
      risk_free_rate: request.risk_free_rate,
      constraint_mode: request.constraint_mode,
      ..self.config.clone()
    });
    engine.run(&returns)
  }

  /// Long-only and long/short reports over the same statistics.
  pub fn run_all_modes(&self, returns: &ReturnMatrix) -> Result<Vec<MarkowitzReport>> {
    let stats = self.statistics(returns)?;
    ConstraintMode::ALL
      .iter()
      .map(|&mode| self.run_on_statistics(stats.clone(), mode))
      .collect()
  }

  /// Frontier, tangency and capital market line for given statistics.
  ///
  /// Only configuration errors are returned. A failing step is recorded
  /// in [`MarkowitzReport::issues`] and skips the steps depending on it.
  #[instrument(skip_all, fields(assets = stats.len(), mode = %mode))]
  pub fn run_on_statistics(
    &self,
    stats: ReturnStatistics,
    mode: ConstraintMode,
  ) -> Result<MarkowitzReport> {
    self.config.validate()?;
    let rf = self.config.risk_free_rate;
    let mut issues = Vec::new();

    let frontier = FrontierSolver::new(self.config.solver.clone())
      .parallel(self.config.parallel)
      .retain_weights(self.config.retain_weights)
      .compute_frontier(&stats, mode, self.config.grid_size)
      .unwrap_or_else(|err| {
        warn!(%err, "frontier unavailable");
        issues.push(err);
        Vec::new()
      });

    let tangency = if frontier.is_empty() {
      None
    } else {
      match TangencyPortfolioSolver::new(self.config.solver.clone())
        .compute_tangency(&frontier, rf, &stats, mode)
      {
        Ok(t) => Some(t),
        Err(err) => {
          warn!(%err, "tangency portfolio unavailable");
          issues.push(err);
          None
        }
      }
    };

    let capital_market_line = tangency.as_ref().and_then(|t| {
      let max_vol = max_volatility(&frontier).unwrap_or(t.volatility);
      match cml::project(t, rf, max_vol) {
        Ok(line) => Some(line),
        Err(err) => {
          warn!(%err, "capital market line unavailable");
          issues.push(err);
          None
        }
      }
    });

    info!(
      points = frontier.len(),
      tangency = tangency.is_some(),
      issues = issues.len(),
      "markowitz report ready"
    );

    Ok(MarkowitzReport {
      mode,
      risk_free_rate: rf,
      asset_summaries: stats.asset_summaries(rf),
      correlation: stats.correlation(),
      statistics: stats,
      frontier,
      tangency,
      capital_market_line,
      issues,
    })
  }
}

#[cfg(test)]
mod tests {
  use nalgebra::DVector;

  use super::*;

  fn diagonal_three() -> ReturnStatistics {
    ReturnStatistics::new(
      vec!["A".into(), "B".into(), "C".into()],
      DVector::from_vec(vec![0.05, 0.07, 0.03]),
      DMatrix::from_diagonal_element(3, 3, 0.02),
    )
    .unwrap()
  }

  #[test]
  fn discount_rate_defaults_to_risk_free() {
    let config = EngineConfig::default();
    assert_eq!(config.effective_discount_rate(), 0.04);

    let config = EngineConfig {
      discount_rate: Some(0.0),
      ..EngineConfig::default()
    };
    assert_eq!(config.effective_discount_rate(), 0.0);
  }

  #[test]
  fn toml_overrides_selected_keys() {
    let config = EngineConfig::from_toml_str(
      r#"
        risk_free_rate = 0.02
        constraint_mode = "unbounded"
        grid_size = 25

        [solver]
        max_outer_iters = 40
      "#,
    )
    .unwrap();

    assert_eq!(config.risk_free_rate, 0.02);
    assert_eq!(config.constraint_mode, ConstraintMode::Unbounded);
    assert_eq!(config.grid_size, 25);
    assert_eq!(config.solver.max_outer_iters, 40);
    assert_eq!(config.solver.acceptance_tol, 1e-6);
    assert!(!config.parallel);
  }

  #[test]
  fn bad_toml_is_a_config_error() {
    assert!(matches!(
      EngineConfig::from_toml_str("grid_size = \"many\""),
      Err(MarkowitzError::Config(_))
    ));
    assert!(matches!(
      EngineConfig::from_toml_str("grid_size = 0"),
      Err(MarkowitzError::Config(_))
    ));
  }

  #[test]
  fn full_run_on_statistics() {
    let engine = MarkowitzEngine::new(EngineConfig {
      risk_free_rate: 0.02,
      grid_size: 20,
      ..EngineConfig::default()
    });
    let report = engine
      .run_on_statistics(diagonal_three(), ConstraintMode::Bounded)
      .unwrap();

    assert!(report.is_complete());
    assert!(!report.frontier.is_empty());
    let tangency = report.tangency.as_ref().unwrap();
    assert!(tangency.sharpe_ratio.unwrap() > 0.0);
    let line = report.capital_market_line.unwrap();
    assert_eq!(line.max_volatility, report.max_frontier_volatility().unwrap());
    assert_eq!(report.asset_summaries.len(), 3);
  }

  #[test]
  fn failed_frontier_is_recorded_not_raised() {
    let engine = MarkowitzEngine::new(EngineConfig {
      grid_size: 5,
      solver: SolverConfig {
        max_outer_iters: 0,
        ..SolverConfig::default()
      },
      ..EngineConfig::default()
    });
    let report = engine
      .run_on_statistics(diagonal_three(), ConstraintMode::Unbounded)
      .unwrap();

    assert!(report.frontier.is_empty());
    assert!(report.tangency.is_none());
    assert!(report.capital_market_line.is_none());
    assert_eq!(
      report.issues,
      vec![MarkowitzError::FrontierUnsolvable { attempted: 5 }]
    );
    assert_eq!(report.asset_summaries.len(), 3);
  }
}
