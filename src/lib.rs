//! # Markowitz
//!
//! $$
//! \min_{\mathbf{w}} \mathbf{w}^\top \Sigma \mathbf{w}
//! \quad \text{s.t.} \quad \mathbf{1}^\top\mathbf{w}=1,\ \mathbf{w}^\top\mu \ge \tau
//! $$
//!
//! Efficient frontier, tangency portfolio and capital market line from monthly returns.

pub mod error;
pub mod portfolio;

pub use error::MarkowitzError;
pub use error::Result;
