//! # Portfolio
//!
//! $$
//! \sigma_p^2 = \mathbf{w}^\top \Sigma \mathbf{w}
//! $$
//!
//! Mean-variance efficient frontier, tangency portfolio and capital market line.

pub mod cml;
pub mod data;
pub mod engine;
pub mod frontier;
pub mod report;
pub mod request;
pub mod solver;
pub mod statistics;
pub mod tangency;
pub mod types;

pub use cml::project;
pub use cml::CapitalMarketLine;
pub use data::AssetSeries;
pub use data::ReturnMatrix;
pub use engine::EngineConfig;
pub use engine::MarkowitzEngine;
pub use engine::MarkowitzReport;
pub use frontier::compute_frontier;
pub use frontier::target_grid;
pub use frontier::FrontierSolver;
pub use frontier::DEFAULT_GRID_SIZE;
pub use request::AssetSpec;
pub use request::ReturnSource;
pub use request::UniverseRequest;
pub use solver::solve_min_variance;
pub use solver::ReturnConstraint;
pub use solver::SolveError;
pub use solver::SolvedPortfolio;
pub use solver::SolverConfig;
pub use statistics::compute_statistics;
pub use statistics::AssetSummary;
pub use statistics::ReturnStatistics;
pub use tangency::compute_tangency;
pub use tangency::frontier_sharpe_ratios;
pub use tangency::select_max_sharpe;
pub use tangency::TangencyPortfolioSolver;
pub use types::sharpe_ratio;
pub use types::ConstraintMode;
pub use types::FrontierPoint;
pub use types::Portfolio;
pub use types::TangencyResult;
pub use types::WEIGHT_SUM_TOLERANCE;
