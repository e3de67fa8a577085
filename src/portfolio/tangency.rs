//! # Tangency Portfolio
//!
//! $$
//! \tau^\* = \arg\max_{\tau} \frac{\tau - r_f}{\sigma^\*(\tau)}
//! $$
//!
//! Maximum-Sharpe point of the frontier, re-solved with an exact return
//! constraint so its weights are reproducible.

use tracing::info;
use tracing::instrument;

use super::solver::solve_min_variance;
use super::solver::ReturnConstraint;
use super::solver::SolverConfig;
use super::statistics::ReturnStatistics;
use super::types::sharpe_ratio;
use super::types::ConstraintMode;
use super::types::FrontierPoint;
use super::types::Portfolio;
use super::types::TangencyResult;
use crate::error::MarkowitzError;
use crate::error::Result;

/// Sharpe ratio of each frontier point, `None` where volatility is zero.
pub fn frontier_sharpe_ratios(frontier: &[FrontierPoint], risk_free: f64) -> Vec<Option<f64>> {
  frontier
    .iter()
    .map(|p| sharpe_ratio(p.target_return, p.volatility, risk_free))
    .collect()
}

/// Index and ratio of the maximum-Sharpe point, first occurrence on ties.
///
/// All-negative ratios still select the largest (least negative) one.
pub fn select_max_sharpe(frontier: &[FrontierPoint], risk_free: f64) -> Result<(usize, f64)> {
  frontier_sharpe_ratios(frontier, risk_free)
    .into_iter()
    .enumerate()
    .filter_map(|(i, s)| s.map(|s| (i, s)))
    .fold(None, |best: Option<(usize, f64)>, (i, s)| match best {
      Some((_, b)) if b >= s => best,
      _ => Some((i, s)),
    })
    .ok_or(MarkowitzError::DegenerateFrontier)
}

/// Re-solves the maximum-Sharpe frontier target with `w^T mu = tau`.
#[derive(Clone, Debug, Default)]
pub struct TangencyPortfolioSolver {
  pub solver: SolverConfig,
}

impl TangencyPortfolioSolver {
  pub fn new(solver: SolverConfig) -> Self {
    Self { solver }
  }

  #[instrument(skip_all, fields(points = frontier.len(), risk_free = risk_free, mode = %mode))]
  pub fn compute_tangency(
    &self,
    frontier: &[FrontierPoint],
    risk_free: f64,
    stats: &ReturnStatistics,
    mode: ConstraintMode,
  ) -> Result<TangencyResult> {
    let (index, grid_sharpe_ratio) = select_max_sharpe(frontier, risk_free)?;
    let grid_target = frontier[index].target_return;

    let solved = solve_min_variance(
      stats.expected_returns(),
      stats.covariance(),
      mode,
      ReturnConstraint::Exactly(grid_target),
      &self.solver,
    )
    .map_err(|source| MarkowitzError::TangencyInfeasible {
      target_return: grid_target,
      source,
    })?;

    let sharpe = sharpe_ratio(solved.expected_return, solved.volatility, risk_free);
    info!(
      target = grid_target,
      volatility = solved.volatility,
      sharpe = ?sharpe,
      "tangency portfolio solved"
    );

    Ok(TangencyResult {
      portfolio: Portfolio::new(stats.assets().to_vec(), solved.weights),
      expected_return: solved.expected_return,
      volatility: solved.volatility,
      sharpe_ratio: sharpe,
      grid_target,
      grid_sharpe_ratio,
    })
  }
}

/// Tangency portfolio with the default solver settings.
pub fn compute_tangency(
  frontier: &[FrontierPoint],
  risk_free: f64,
  stats: &ReturnStatistics,
  mode: ConstraintMode,
) -> Result<TangencyResult> {
  TangencyPortfolioSolver::default().compute_tangency(frontier, risk_free, stats, mode)
}

#[cfg(test)]
mod tests {
  use nalgebra::DMatrix;
  use nalgebra::DVector;

  use super::*;

  fn point(target_return: f64, volatility: f64) -> FrontierPoint {
    FrontierPoint {
      target_return,
      volatility,
      portfolio: None,
    }
  }

  #[test]
  fn picks_least_negative_ratio() {
    let frontier = [point(0.03, 0.10), point(0.05, 0.12), point(0.07, 0.20)];
    let (i, s) = select_max_sharpe(&frontier, 0.10).unwrap();
    assert_eq!(i, 2);
    assert!((s + 0.15).abs() < 1e-12);
  }

  #[test]
  fn ties_keep_first_point() {
    let frontier = [point(0.25, 0.5), point(0.5, 1.0), point(0.75, 1.5)];
    let (i, _) = select_max_sharpe(&frontier, 0.0).unwrap();
    assert_eq!(i, 0);
  }

  #[test]
  fn zero_volatility_points_are_skipped() {
    let frontier = [point(0.05, 0.0), point(0.06, 0.2)];
    let (i, _) = select_max_sharpe(&frontier, 0.02).unwrap();
    assert_eq!(i, 1);
  }

  #[test]
  fn empty_frontier_is_degenerate() {
    assert_eq!(
      select_max_sharpe(&[], 0.02).unwrap_err(),
      MarkowitzError::DegenerateFrontier
    );

    let stats = ReturnStatistics::new(
      vec!["A".into(), "B".into()],
      DVector::from_vec(vec![0.05, 0.07]),
      DMatrix::from_diagonal_element(2, 2, 0.02),
    )
    .unwrap();
    assert_eq!(
      compute_tangency(&[], 0.02, &stats, ConstraintMode::Bounded).unwrap_err(),
      MarkowitzError::DegenerateFrontier
    );
  }

  #[test]
  fn failed_resolve_is_infeasible() {
    let stats = ReturnStatistics::new(
      vec!["A".into(), "B".into()],
      DVector::from_vec(vec![0.05, 0.07]),
      DMatrix::from_diagonal_element(2, 2, 0.02),
    )
    .unwrap();
    let solver = TangencyPortfolioSolver::new(SolverConfig {
      max_outer_iters: 0,
      ..SolverConfig::default()
    });

    let err = solver
      .compute_tangency(&[point(0.06, 0.1)], 0.02, &stats, ConstraintMode::Bounded)
      .unwrap_err();
    assert!(matches!(
      err,
      MarkowitzError::TangencyInfeasible { target_return, .. } if target_return == 0.06
    ));
  }
}
