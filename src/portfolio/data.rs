//! # Return Data
//!
//! $$
//! r_t = \frac{P_t}{P_{t-1}} - 1
//! $$
//!
//! Dated return series, inner-join alignment and the aligned [`ReturnMatrix`].

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::collections::HashSet;
use std::io::Read;
use std::path::Path;

use chrono::NaiveDate;
use nalgebra::DMatrix;
use nalgebra::DVector;
use tracing::debug;

use crate::error::MarkowitzError;
use crate::error::Result;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Dated observations of a single asset, possibly with gaps.
#[derive(Clone, Debug, PartialEq)]
pub struct AssetSeries {
  pub name: String,
  pub observations: Vec<(NaiveDate, f64)>,
}

impl AssetSeries {
  pub fn new(name: impl Into<String>, observations: Vec<(NaiveDate, f64)>) -> Self {
    Self {
      name: name.into(),
      observations,
    }
  }

  /// Drop non-finite observations and sort by date.
  pub fn cleaned(mut self) -> Self {
    self.observations.retain(|(_, v)| v.is_finite());
    self.observations.sort_by_key(|(d, _)| *d);
    self.observations.dedup_by_key(|(d, _)| *d);
    self
  }

  /// Convert closing prices into simple returns dated at the later close.
  ///
  /// Pairs with a non-positive previous close are skipped.
  pub fn to_returns(&self) -> Self {
    let cleaned = self.clone().cleaned();
    let returns = cleaned
      .observations
      .windows(2)
      .filter(|w| w[0].1 > 0.0)
      .map(|w| (w[1].0, w[1].1 / w[0].1 - 1.0))
      .collect();

    Self::new(self.name.clone(), returns)
  }
}

/// Periodic returns aligned on a common, strictly increasing date index.
///
/// Rows are periods, columns are assets. Values are always finite.
#[derive(Clone, Debug, PartialEq)]
pub struct ReturnMatrix {
  periods: Vec<NaiveDate>,
  assets: Vec<String>,
  values: DMatrix<f64>,
}

impl ReturnMatrix {
  pub fn new(periods: Vec<NaiveDate>, assets: Vec<String>, values: DMatrix<f64>) -> Result<Self> {
    if values.nrows() != periods.len() {
      return Err(MarkowitzError::DimensionMismatch {
        what: "return rows",
        expected: periods.len(),
        found: values.nrows(),
      });
    }
    if values.ncols() != assets.len() {
      return Err(MarkowitzError::DimensionMismatch {
        what: "return columns",
        expected: assets.len(),
        found: values.ncols(),
      });
    }

    let mut seen = HashSet::with_capacity(assets.len());
    for asset in &assets {
      if !seen.insert(asset.as_str()) {
        return Err(MarkowitzError::DuplicateAsset(asset.clone()));
      }
    }

    if periods.windows(2).any(|w| w[0] >= w[1]) {
      return Err(MarkowitzError::InvalidInput(
        "periods must be strictly increasing".to_string(),
      ));
    }

    for (j, asset) in assets.iter().enumerate() {
      for (i, period) in periods.iter().enumerate() {
        if !values[(i, j)].is_finite() {
          return Err(MarkowitzError::MissingValue {
            asset: asset.clone(),
            period: *period,
          });
        }
      }
    }

    Ok(Self {
      periods,
      assets,
      values,
    })
  }

  /// Inner-join cleaned series on the dates common to all of them.
  pub fn from_series(series: Vec<AssetSeries>) -> Result<Self> {
    let series: Vec<AssetSeries> = series.into_iter().map(AssetSeries::cleaned).collect();

    let mut common: Option<BTreeSet<NaiveDate>> = None;
    for s in &series {
      let dates: BTreeSet<NaiveDate> = s.observations.iter().map(|(d, _)| *d).collect();
      common = Some(match common {
        Some(acc) => acc.intersection(&dates).copied().collect(),
        None => dates,
      });
    }
    let periods: Vec<NaiveDate> = common.unwrap_or_default().into_iter().collect();

    let mut values = DMatrix::zeros(periods.len(), series.len());
    for (j, s) in series.iter().enumerate() {
      let by_date: BTreeMap<NaiveDate, f64> = s.observations.iter().copied().collect();
      for (i, period) in periods.iter().enumerate() {
        values[(i, j)] = by_date[period];
      }
    }

    debug!(
      assets = series.len(),
      periods = periods.len(),
      "aligned return series"
    );

    Self::new(
      periods,
      series.into_iter().map(|s| s.name).collect(),
      values,
    )
  }

  /// Read dated series from CSV: a `date` column followed by one column per asset.
  ///
  /// Blank or unparsable cells are missing observations for that asset only.
  pub fn read_series_csv<R: Read>(reader: R) -> Result<Vec<AssetSeries>> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let headers = rdr.headers()?.clone();
    if headers.len() < 2 {
      return Err(MarkowitzError::Read(
        "expected a date column followed by asset columns".to_string(),
      ));
    }

    let mut series: Vec<AssetSeries> = headers
      .iter()
      .skip(1)
      .map(|name| AssetSeries::new(name, Vec::new()))
      .collect();

    for (line, record) in rdr.records().enumerate() {
      let record = record?;
      let raw_date = record.get(0).unwrap_or_default();
      let date = NaiveDate::parse_from_str(raw_date, DATE_FORMAT).map_err(|e| {
        MarkowitzError::Read(format!("row {}: invalid date '{raw_date}': {e}", line + 1))
      })?;

      for (s, cell) in series.iter_mut().zip(record.iter().skip(1)) {
        if let Ok(v) = cell.parse::<f64>() {
          s.observations.push((date, v));
        }
      }
    }

    Ok(series)
  }

  /// Aligned monthly returns from a returns CSV.
  pub fn from_returns_csv<R: Read>(reader: R) -> Result<Self> {
    Self::from_series(Self::read_series_csv(reader)?)
  }

  /// Aligned monthly returns from a closing-price CSV.
  pub fn from_prices_csv<R: Read>(reader: R) -> Result<Self> {
    let series = Self::read_series_csv(reader)?
      .iter()
      .map(AssetSeries::to_returns)
      .collect();
    Self::from_series(series)
  }

  pub fn from_path(path: impl AsRef<Path>, prices: bool) -> Result<Self> {
    let path = path.as_ref();
    let file = std::fs::File::open(path)
      .map_err(|e| MarkowitzError::Read(format!("{}: {e}", path.display())))?;
    if prices {
      Self::from_prices_csv(file)
    } else {
      Self::from_returns_csv(file)
    }
  }

  /// Keep the named assets, in the requested order.
  pub fn select(&self, names: &[&str]) -> Result<Self> {
    let mut columns = Vec::with_capacity(names.len());
    for name in names {
      let j = self
        .assets
        .iter()
        .position(|a| a == name)
        .ok_or_else(|| MarkowitzError::UnknownAsset(name.to_string()))?;
      columns.push(j);
    }

    Self::new(
      self.periods.clone(),
      names.iter().map(|n| n.to_string()).collect(),
      self.values.select_columns(columns.iter()),
    )
  }

  /// Keep periods within `[start, end]`.
  pub fn restrict(&self, start: NaiveDate, end: NaiveDate) -> Self {
    let rows: Vec<usize> = self
      .periods
      .iter()
      .enumerate()
      .filter(|(_, d)| **d >= start && **d <= end)
      .map(|(i, _)| i)
      .collect();

    Self {
      periods: rows.iter().map(|&i| self.periods[i]).collect(),
      assets: self.assets.clone(),
      values: self.values.select_rows(rows.iter()),
    }
  }

  pub fn periods(&self) -> &[NaiveDate] {
    &self.periods
  }

  pub fn assets(&self) -> &[String] {
    &self.assets
  }

  pub fn n_periods(&self) -> usize {
    self.periods.len()
  }

  pub fn n_assets(&self) -> usize {
    self.assets.len()
  }

  /// Period-by-asset return matrix.
  pub fn values(&self) -> &DMatrix<f64> {
    &self.values
  }

  /// Returns of asset `j` in period order.
  pub fn column(&self, j: usize) -> DVector<f64> {
    self.values.column(j).into_owned()
  }
}
