//! # Minimum-Variance Solver
//!
//! $$
//! \min_{\mathbf{w}} \ \mathbf{w}^\top \Sigma \mathbf{w}
//! \quad \text{s.t.} \quad \mathbf{1}^\top\mathbf{w} = 1,\quad
//! \mathbf{w}^\top\mu \ge \tau \ \ (\text{or} = \tau),\quad l \le w_i \le u
//! $$
//!
//! Augmented-Lagrangian method: every constraint (budget, target return and
//! the weight bounds) is moved into a smooth penalised objective whose
//! unconstrained minimum is found with argmin's L-BFGS. Multipliers are
//! updated between the inner solves until the constraint violation vanishes.
//! A converged point is finally projected onto `{sum(w) = 1, l <= w <= u}`.
//!
//! Minimising the variance gives the same weights as minimising the
//! volatility and stays differentiable for singular covariances.

use std::time::Duration;
use std::time::Instant;

use argmin::core::CostFunction;
use argmin::core::Executor;
use argmin::core::Gradient;
use argmin::solver::linesearch::MoreThuenteLineSearch;
use argmin::solver::quasinewton::LBFGS;
use nalgebra::DMatrix;
use nalgebra::DVector;
use roots::find_root_brent;
use roots::SimpleConvergency;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;
use tracing::trace;

use super::types::ConstraintMode;

/// Return requirement of a single solve, holding its target by value.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ReturnConstraint {
  /// `w^T mu >= target`, used when scanning the frontier.
  AtLeast(f64),
  /// `w^T mu = target`, used to pin the tangency weights.
  Exactly(f64),
}

impl ReturnConstraint {
  pub fn target(self) -> f64 {
    match self {
      Self::AtLeast(t) | Self::Exactly(t) => t,
    }
  }

  /// Amount by which `achieved` violates the requirement.
  pub fn violation(self, achieved: f64) -> f64 {
    match self {
      Self::AtLeast(t) => (t - achieved).max(0.0),
      Self::Exactly(t) => (achieved - t).abs(),
    }
  }
}

/// Tolerances and budgets of a single minimum-variance solve.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
  /// Multiplier updates before giving up.
  pub max_outer_iters: usize,
  /// L-BFGS iterations per multiplier update.
  pub max_inner_iters: u64,
  /// Constraint violation regarded as satisfied by the multiplier loop.
  pub constraint_tol: f64,
  /// Largest weight change between two outer iterations at convergence.
  pub step_tol: f64,
  /// Return-constraint slack accepted on the projected solution.
  pub acceptance_tol: f64,
  pub initial_penalty: f64,
  pub penalty_growth: f64,
  pub max_penalty: f64,
  /// L-BFGS history length.
  pub lbfgs_memory: usize,
  /// Wall-clock budget per solve, in milliseconds.
  pub time_budget_ms: Option<u64>,
}

impl Default for SolverConfig {
  fn default() -> Self {
    Self {
      max_outer_iters: 100,
      max_inner_iters: 500,
      constraint_tol: 1e-9,
      step_tol: 1e-6,
      acceptance_tol: 1e-6,
      initial_penalty: 10.0,
      penalty_growth: 10.0,
      max_penalty: 1e9,
      lbfgs_memory: 7,
      time_budget_ms: None,
    }
  }
}

/// Why a single solve did not produce a usable portfolio.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SolveError {
  #[error("no convergence after {iterations} iterations (constraint violation {violation:e})")]
  NotConverged { iterations: usize, violation: f64 },

  #[error("time budget of {budget:?} exhausted after {iterations} iterations")]
  BudgetExhausted { budget: Duration, iterations: usize },

  #[error("weights could not be projected onto the budget and bounds")]
  Infeasible,

  #[error("projected weights miss the return target by {violation:e}")]
  TargetMissed { violation: f64 },
}

/// Weights and risk/return of a converged solve.
#[derive(Clone, Debug, PartialEq)]
pub struct SolvedPortfolio {
  pub weights: Vec<f64>,
  pub expected_return: f64,
  pub volatility: f64,
  /// Outer (multiplier) iterations used.
  pub iterations: usize,
}

/// `w^T Sigma w`.
pub fn portfolio_variance(weights: &[f64], cov: &DMatrix<f64>) -> f64 {
  let w = DVector::from_column_slice(weights);
  w.dot(&(cov * &w))
}

/// `w^T mu`.
pub fn portfolio_return(weights: &[f64], mu: &DVector<f64>) -> f64 {
  weights.iter().zip(mu.iter()).map(|(w, m)| w * m).sum()
}

/// PHR term for an inequality `g >= 0` with multiplier `nu` and penalty `rho`.
fn inequality_term(nu: f64, g: f64, rho: f64) -> f64 {
  let shifted = (nu - rho * g).max(0.0);
  (shifted * shifted - nu * nu) / (2.0 * rho)
}

/// Derivative of [`inequality_term`] with respect to `g`.
fn inequality_slope(nu: f64, g: f64, rho: f64) -> f64 {
  -(nu - rho * g).max(0.0)
}

#[derive(Clone)]
struct AugmentedLagrangian<'a> {
  mu: &'a DVector<f64>,
  cov: &'a DMatrix<f64>,
  lower: f64,
  upper: f64,
  constraint: ReturnConstraint,
  budget_mult: f64,
  return_mult: f64,
  lower_mults: Vec<f64>,
  upper_mults: Vec<f64>,
  penalty: f64,
}

impl<'a> AugmentedLagrangian<'a> {
  fn new(
    mu: &'a DVector<f64>,
    cov: &'a DMatrix<f64>,
    mode: ConstraintMode,
    constraint: ReturnConstraint,
    penalty: f64,
  ) -> Self {
    let (lower, upper) = mode.bounds();
    let n = mu.len();
    Self {
      mu,
      cov,
      lower,
      upper,
      constraint,
      budget_mult: 0.0,
      return_mult: 0.0,
      lower_mults: vec![0.0; n],
      upper_mults: vec![0.0; n],
      penalty,
    }
  }

  fn budget_residual(&self, w: &[f64]) -> f64 {
    w.iter().sum::<f64>() - 1.0
  }

  fn return_residual(&self, w: &[f64]) -> f64 {
    portfolio_return(w, self.mu) - self.constraint.target()
  }

  /// Largest violation over all constraints.
  fn violation(&self, w: &[f64]) -> f64 {
    let bounds = w
      .iter()
      .map(|&wi| (self.lower - wi).max(wi - self.upper).max(0.0))
      .fold(0.0, f64::max);
    self
      .budget_residual(w)
      .abs()
      .max(self.constraint.violation(portfolio_return(w, self.mu)))
      .max(bounds)
  }

  /// First-order multiplier update at the inner minimiser `w`.
  fn update_multipliers(&mut self, w: &[f64]) {
    let rho = self.penalty;
    self.budget_mult += rho * self.budget_residual(w);

    let r = self.return_residual(w);
    self.return_mult = match self.constraint {
      ReturnConstraint::Exactly(_) => self.return_mult + rho * r,
      ReturnConstraint::AtLeast(_) => (self.return_mult - rho * r).max(0.0),
    };

    for (i, &wi) in w.iter().enumerate() {
      self.lower_mults[i] = (self.lower_mults[i] - rho * (wi - self.lower)).max(0.0);
      self.upper_mults[i] = (self.upper_mults[i] - rho * (self.upper - wi)).max(0.0);
    }
  }
}

impl CostFunction for AugmentedLagrangian<'_> {
  type Param = Vec<f64>;
  type Output = f64;

  fn cost(&self, w: &Self::Param) -> Result<Self::Output, argmin::core::Error> {
    let rho = self.penalty;
    let mut value = portfolio_variance(w, self.cov);

    let h = self.budget_residual(w);
    value += self.budget_mult * h + 0.5 * rho * h * h;

    let r = self.return_residual(w);
    value += match self.constraint {
      ReturnConstraint::Exactly(_) => self.return_mult * r + 0.5 * rho * r * r,
      ReturnConstraint::AtLeast(_) => inequality_term(self.return_mult, r, rho),
    };

    for (i, &wi) in w.iter().enumerate() {
      value += inequality_term(self.lower_mults[i], wi - self.lower, rho);
      value += inequality_term(self.upper_mults[i], self.upper - wi, rho);
    }

    Ok(value)
  }
}

impl Gradient for AugmentedLagrangian<'_> {
  type Param = Vec<f64>;
  type Gradient = Vec<f64>;

  fn gradient(&self, w: &Self::Param) -> Result<Self::Gradient, argmin::core::Error> {
    let rho = self.penalty;
    let x = DVector::from_column_slice(w);
    let mut grad = (self.cov * &x) * 2.0;

    let budget_slope = self.budget_mult + rho * self.budget_residual(w);
    grad.add_scalar_mut(budget_slope);

    let r = self.return_residual(w);
    let return_slope = match self.constraint {
      ReturnConstraint::Exactly(_) => self.return_mult + rho * r,
      ReturnConstraint::AtLeast(_) => inequality_slope(self.return_mult, r, rho),
    };
    grad.axpy(return_slope, self.mu, 1.0);

    for (i, &wi) in w.iter().enumerate() {
      grad[i] += inequality_slope(self.lower_mults[i], wi - self.lower, rho);
      grad[i] -= inequality_slope(self.upper_mults[i], self.upper - wi, rho);
    }

    Ok(grad.iter().copied().collect())
  }
}

/// Unconstrained L-BFGS minimisation of the current augmented Lagrangian.
fn minimize_inner(
  problem: &AugmentedLagrangian<'_>,
  start: &[f64],
  config: &SolverConfig,
) -> anyhow::Result<Vec<f64>> {
  let x0 = start.to_vec();
  let g0 = problem.gradient(&x0)?;
  if g0.iter().all(|g| g.abs() < f64::EPSILON) {
    return Ok(x0);
  }

  let linesearch = MoreThuenteLineSearch::new().with_c(1e-4, 0.9)?;
  let solver = LBFGS::new(linesearch, config.lbfgs_memory);

  let res = Executor::new(problem.clone(), solver)
    .configure(|state| state.param(x0.clone()).max_iters(config.max_inner_iters))
    .run()?;

  Ok(res.state.best_param.unwrap_or(x0))
}

/// Euclidean projection onto `{sum(w) = 1, lower <= w_i <= upper}`.
///
/// The projection is `clamp(w_i - t)` for the shift `t` solving the budget.
pub fn project_onto_budget(weights: &[f64], mode: ConstraintMode) -> Option<Vec<f64>> {
  let (lower, upper) = mode.bounds();
  let n = weights.len() as f64;
  if n * lower > 1.0 || n * upper < 1.0 {
    return None;
  }

  let shifted = |t: f64| -> f64 {
    weights
      .iter()
      .map(|w| (w - t).clamp(lower, upper))
      .sum::<f64>()
      - 1.0
  };

  let lo = weights.iter().copied().fold(f64::INFINITY, f64::min) - upper;
  let hi = weights.iter().copied().fold(f64::NEG_INFINITY, f64::max) - lower;

  let mut convergency = SimpleConvergency {
    eps: 1e-13,
    max_iter: 200,
  };
  let t = find_root_brent(lo, hi, shifted, &mut convergency).ok()?;

  Some(weights.iter().map(|w| (w - t).clamp(lower, upper)).collect())
}

/// Minimise portfolio variance under the budget, bounds and return requirement.
///
/// Every solve starts from equal weights.
pub fn solve_min_variance(
  mu: &DVector<f64>,
  cov: &DMatrix<f64>,
  mode: ConstraintMode,
  constraint: ReturnConstraint,
  config: &SolverConfig,
) -> Result<SolvedPortfolio, SolveError> {
  let n = mu.len();
  let started = Instant::now();
  let budget = config.time_budget_ms.map(Duration::from_millis);

  let mut problem = AugmentedLagrangian::new(mu, cov, mode, constraint, config.initial_penalty);
  let mut w = vec![1.0 / n as f64; n];
  let mut violation = problem.violation(&w);

  for iteration in 1..=config.max_outer_iters {
    if let Some(budget) = budget {
      if started.elapsed() >= budget {
        return Err(SolveError::BudgetExhausted {
          budget,
          iterations: iteration - 1,
        });
      }
    }

    let (next, inner_ok) = match minimize_inner(&problem, &w, config) {
      Ok(next) => (next, true),
      Err(err) => {
        trace!(iteration, %err, "inner minimisation failed, keeping previous weights");
        (w.clone(), false)
      }
    };

    let step = next
      .iter()
      .zip(w.iter())
      .map(|(a, b)| (a - b).abs())
      .fold(0.0, f64::max);
    let next_violation = problem.violation(&next);
    w = next;

    if inner_ok && next_violation <= config.constraint_tol && step <= config.step_tol {
      return finish(w, mu, cov, mode, constraint, config, iteration);
    }

    problem.update_multipliers(&w);
    if next_violation > 0.25 * violation {
      problem.penalty = (problem.penalty * config.penalty_growth).min(config.max_penalty);
    }
    violation = next_violation;
  }

  Err(SolveError::NotConverged {
    iterations: config.max_outer_iters,
    violation,
  })
}

fn finish(
  weights: Vec<f64>,
  mu: &DVector<f64>,
  cov: &DMatrix<f64>,
  mode: ConstraintMode,
  constraint: ReturnConstraint,
  config: &SolverConfig,
  iterations: usize,
) -> Result<SolvedPortfolio, SolveError> {
  let weights = project_onto_budget(&weights, mode).ok_or(SolveError::Infeasible)?;

  let expected_return = portfolio_return(&weights, mu);
  let violation = constraint.violation(expected_return);
  if violation > config.acceptance_tol {
    return Err(SolveError::TargetMissed { violation });
  }

  let volatility = portfolio_variance(&weights, cov).max(0.0).sqrt();
  Ok(SolvedPortfolio {
    weights,
    expected_return,
    volatility,
    iterations,
  })
}
