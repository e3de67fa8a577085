//! # Universe Request
//!
//! $$
//! t_{\text{end}} - t_{\text{start}} \ge 365\ \text{days}
//! $$
//!
//! User selection of assets, history window and risk-free rate.

use std::collections::HashSet;

use chrono::NaiveDate;
use serde::Deserialize;
use serde::Serialize;

use super::data::ReturnMatrix;
use super::types::ConstraintMode;
use crate::error::MarkowitzError;
use crate::error::Result;

/// Shortest accepted history window.
pub const MIN_HISTORY_DAYS: i64 = 365;

/// An asset as shown to the user and as known to the data provider.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetSpec {
  /// Display name, also the column name of the returned matrix.
  pub name: String,
  /// Symbol for external market-data sources, unused by in-memory ones.
  pub ticker: String,
}

impl AssetSpec {
  /// Asset named `name`, quoted as `ticker`.
  pub fn new(name: impl Into<String>, ticker: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      ticker: ticker.into(),
    }
  }
}

/// Provider of aligned monthly returns, e.g. a market-data client.
pub trait ReturnSource {
  /// Monthly returns of `assets` over `[start, end]`, columns named by [`AssetSpec::name`].
  fn monthly_returns(
    &self,
    assets: &[AssetSpec],
    start: NaiveDate,
    end: NaiveDate,
  ) -> Result<ReturnMatrix>;
}

/// Already loaded returns, e.g. from CSV, served by asset name and date window.
impl ReturnSource for ReturnMatrix {
  fn monthly_returns(
    &self,
    assets: &[AssetSpec],
    start: NaiveDate,
    end: NaiveDate,
  ) -> Result<ReturnMatrix> {
    let names: Vec<&str> = assets.iter().map(|a| a.name.as_str()).collect();
    Ok(self.select(&names)?.restrict(start, end))
  }
}

/// Assets, history window and run parameters chosen by the user.
///
/// [`MarkowitzEngine::run_request`](super::engine::MarkowitzEngine::run_request)
/// runs it with its own risk-free rate and constraint mode.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UniverseRequest {
  pub assets: Vec<AssetSpec>,
  pub start: NaiveDate,
  pub end: NaiveDate,
  pub risk_free_rate: f64,
  #[serde(default)]
  pub constraint_mode: ConstraintMode,
}

impl UniverseRequest {
  /// Check the request before any data is fetched.
  pub fn validate(&self) -> Result<()> {
    if self.assets.len() < 2 {
      return Err(MarkowitzError::EmptyUniverse {
        provided: self.assets.len(),
      });
    }

    let mut seen = HashSet::new();
    for asset in &self.assets {
      if !seen.insert(asset.name.as_str()) {
        return Err(MarkowitzError::DuplicateAsset(asset.name.clone()));
      }
    }

    if self.start > self.end {
      return Err(MarkowitzError::InvalidDateRange {
        start: self.start,
        end: self.end,
      });
    }

    let days = (self.end - self.start).num_days();
    if days < MIN_HISTORY_DAYS {
      return Err(MarkowitzError::HistoryTooShort {
        days,
        required_days: MIN_HISTORY_DAYS,
      });
    }

    if !(0.0..=1.0).contains(&self.risk_free_rate) {
      return Err(MarkowitzError::InvalidInput(format!(
        "risk-free rate must lie in [0, 1], got {}",
        self.risk_free_rate
      )));
    }

    Ok(())
  }

  /// Validate, then fetch the returns from `source`.
  pub fn fetch<S: ReturnSource + ?Sized>(&self, source: &S) -> Result<ReturnMatrix> {
    self.validate()?;
    source.monthly_returns(&self.assets, self.start, self.end)
  }
}

#[cfg(test)]
mod tests {
  use nalgebra::DMatrix;

  use super::*;

  fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
  }

  fn request() -> UniverseRequest {
    UniverseRequest {
      assets: vec![
        AssetSpec::new("Apple", "AAPL"),
        AssetSpec::new("Microsoft", "MSFT"),
      ],
      start: date(2019, 1, 1),
      end: date(2021, 1, 1),
      risk_free_rate: 0.04,
      constraint_mode: ConstraintMode::Bounded,
    }
  }

  #[test]
  fn valid_request_passes() {
    assert!(request().validate().is_ok());
  }

  #[test]
  fn rejects_single_asset() {
    let mut req = request();
    req.assets.truncate(1);
    assert_eq!(
      req.validate().unwrap_err(),
      MarkowitzError::EmptyUniverse { provided: 1 }
    );
  }

  #[test]
  fn rejects_duplicate_asset() {
    let mut req = request();
    req.assets.push(AssetSpec::new("Apple", "AAPL"));
    assert_eq!(
      req.validate().unwrap_err(),
      MarkowitzError::DuplicateAsset("Apple".into())
    );
  }

  #[test]
  fn rejects_reversed_and_short_windows() {
    let mut req = request();
    req.start = date(2022, 1, 1);
    assert!(matches!(
      req.validate(),
      Err(MarkowitzError::InvalidDateRange { .. })
    ));

    req.start = date(2020, 6, 1);
    assert_eq!(
      req.validate().unwrap_err(),
      MarkowitzError::HistoryTooShort {
        days: 214,
        required_days: 365
      }
    );
  }

  #[test]
  fn rejects_risk_free_outside_unit_interval() {
    let mut req = request();
    req.risk_free_rate = 1.5;
    assert!(matches!(req.validate(), Err(MarkowitzError::InvalidInput(_))));
    req.risk_free_rate = -0.01;
    assert!(matches!(req.validate(), Err(MarkowitzError::InvalidInput(_))));
  }

  #[test]
  fn loaded_matrix_serves_as_source() {
    let periods: Vec<NaiveDate> = (1..=12).map(|m| date(2020, m, 1)).collect();
    let assets = vec!["Apple".into(), "Gold".into(), "Microsoft".into()];
    let values = DMatrix::from_fn(12, 3, |i, j| 0.001 * (i + j) as f64);
    let matrix = ReturnMatrix::new(periods, assets, values).unwrap();

    let mut req = request();
    req.start = date(2019, 6, 1);
    req.end = date(2020, 6, 30);
    let fetched = req.fetch(&matrix).unwrap();

    assert_eq!(fetched.assets(), ["Apple".to_string(), "Microsoft".to_string()]);
    assert_eq!(fetched.n_periods(), 6);
    assert_eq!(fetched.values()[(0, 1)], 0.002);
  }
}
