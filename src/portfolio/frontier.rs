//! # Efficient Frontier
//!
//! $$
//! \sigma^\*(\tau) = \min_{\mathbf{w}} \sqrt{\mathbf{w}^\top \Sigma \mathbf{w}}
//! \quad \text{s.t.} \quad \mathbf{1}^\top\mathbf{w}=1,\ \mathbf{w}^\top\mu \ge \tau
//! $$
//!
//! Minimum-volatility scan over a grid of target returns.

use rayon::prelude::*;
use tracing::debug;
use tracing::info;
use tracing::instrument;

use super::solver::solve_min_variance;
use super::solver::ReturnConstraint;
use super::solver::SolverConfig;
use super::statistics::ReturnStatistics;
use super::types::ConstraintMode;
use super::types::FrontierPoint;
use super::types::Portfolio;
use crate::error::MarkowitzError;
use crate::error::Result;

/// Default number of target returns on the frontier grid.
pub const DEFAULT_GRID_SIZE: usize = 100;

/// `grid_size` targets evenly spaced over `[min(mu), max(mu)]`, both ends included.
pub fn target_grid(stats: &ReturnStatistics, grid_size: usize) -> Result<Vec<f64>> {
  if grid_size == 0 {
    return Err(MarkowitzError::InvalidInput(
      "frontier grid needs at least one target".to_string(),
    ));
  }

  let lo = stats.expected_returns().min();
  let hi = stats.expected_returns().max();
  if grid_size == 1 {
    return Ok(vec![lo]);
  }

  let step = (hi - lo) / (grid_size - 1) as f64;
  Ok(
    (0..grid_size)
      .map(|i| if i == grid_size - 1 { hi } else { lo + step * i as f64 })
      .collect(),
  )
}

/// Solves the minimum-variance problem for every target of the grid.
#[derive(Clone, Debug, Default)]
pub struct FrontierSolver {
  pub solver: SolverConfig,
  /// Dispatch targets on the rayon pool.
  pub parallel: bool,
  /// Keep the weights of each retained point.
  pub retain_weights: bool,
}

impl FrontierSolver {
  /// Sequential solver without retained weights.
  pub fn new(solver: SolverConfig) -> Self {
    Self {
      solver,
      ..Self::default()
    }
  }

  /// Toggle rayon dispatch of the grid targets.
  pub fn parallel(mut self, parallel: bool) -> Self {
    self.parallel = parallel;
    self
  }

  /// Toggle keeping the weights on each [`FrontierPoint`].
  pub fn retain_weights(mut self, retain: bool) -> Self {
    self.retain_weights = retain;
    self
  }

  fn solve_target(
    &self,
    stats: &ReturnStatistics,
    mode: ConstraintMode,
    target: f64,
  ) -> Option<FrontierPoint> {
    let constraint = ReturnConstraint::AtLeast(target);
    match solve_min_variance(
      stats.expected_returns(),
      stats.covariance(),
      mode,
      constraint,
      &self.solver,
    ) {
      Ok(solved) => Some(FrontierPoint {
        target_return: target,
        volatility: solved.volatility,
        portfolio: self
          .retain_weights
          .then(|| Portfolio::new(stats.assets().to_vec(), solved.weights)),
      }),
      Err(err) => {
        debug!(target, %err, "dropping frontier target");
        None
      }
    }
  }

  /// Frontier points in ascending target order.
  ///
  /// Targets whose solve does not converge are left out, so the result may
  /// be shorter than `grid_size`. Fails only when no target converges.
  #[instrument(skip_all, fields(assets = stats.len(), mode = %mode, grid_size = grid_size))]
  pub fn compute_frontier(
    &self,
    stats: &ReturnStatistics,
    mode: ConstraintMode,
    grid_size: usize,
  ) -> Result<Vec<FrontierPoint>> {
    let grid = target_grid(stats, grid_size)?;

    let mut points: Vec<FrontierPoint> = if self.parallel {
      grid
        .par_iter()
        .filter_map(|&target| self.solve_target(stats, mode, target))
        .collect()
    } else {
      grid
        .iter()
        .filter_map(|&target| self.solve_target(stats, mode, target))
        .collect()
    };
    points.sort_by(|a, b| a.target_return.total_cmp(&b.target_return));

    info!(
      retained = points.len(),
      dropped = grid.len() - points.len(),
      "efficient frontier computed"
    );

    if points.is_empty() {
      return Err(MarkowitzError::FrontierUnsolvable {
        attempted: grid.len(),
      });
    }
    Ok(points)
  }
}

/// Frontier with the default solver settings, solved sequentially.
pub fn compute_frontier(
  stats: &ReturnStatistics,
  mode: ConstraintMode,
  grid_size: usize,
) -> Result<Vec<FrontierPoint>> {
  FrontierSolver::default().compute_frontier(stats, mode, grid_size)
}
