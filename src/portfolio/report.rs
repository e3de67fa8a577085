//! Text tables for statistics, tangency weights and frontier series.

use nalgebra::DMatrix;
use prettytable::format;
use prettytable::row;
use prettytable::Cell;
use prettytable::Row;
use prettytable::Table;

use super::cml::CapitalMarketLine;
use super::engine::MarkowitzReport;
use super::statistics::AssetSummary;
use super::types::FrontierPoint;
use super::types::TangencyResult;

fn pct(v: f64) -> String {
  format!("{:.2}%", v * 100.0)
}

fn ratio(v: Option<f64>) -> String {
  v.map_or_else(|| "n/a".to_string(), |s| format!("{s:.4}"))
}

fn new_table() -> Table {
  let mut table = Table::new();
  table.set_format(*format::consts::FORMAT_NO_BORDER_LINE_SEPARATOR);
  table
}

/// Asset, annual return, annual volatility and Sharpe ratio.
pub fn statistics_table(rows: &[AssetSummary]) -> Table {
  let mut table = new_table();
  table.set_titles(row!["Asset", "Return", "Volatility", "Sharpe"]);
  for s in rows {
    table.add_row(row![
      s.name,
      r->pct(s.annual_return),
      r->pct(s.annual_volatility),
      r->ratio(s.sharpe_ratio)
    ]);
  }
  table
}

pub fn correlation_table(assets: &[String], correlation: &DMatrix<f64>) -> Table {
  let mut table = new_table();
  let mut titles = vec![Cell::new("")];
  titles.extend(assets.iter().map(|a| Cell::new(a)));
  table.set_titles(Row::new(titles));

  for (i, name) in assets.iter().enumerate() {
    let mut cells = vec![Cell::new(name)];
    cells.extend((0..assets.len()).map(|j| Cell::new(&format!("{:.3}", correlation[(i, j)]))));
    table.add_row(Row::new(cells));
  }
  table
}

/// Tangency weights, largest first, followed by the portfolio figures.
pub fn tangency_table(tangency: &TangencyResult) -> Table {
  let mut weights: Vec<(&str, f64)> = tangency.portfolio.iter().collect();
  weights.sort_by(|a, b| b.1.total_cmp(&a.1));

  let mut table = new_table();
  table.set_titles(row!["Asset", "Weight"]);
  for (name, w) in weights {
    table.add_row(row![name, r->pct(w)]);
  }
  table.add_row(row!["Expected return", r->pct(tangency.expected_return)]);
  table.add_row(row!["Volatility", r->pct(tangency.volatility)]);
  table.add_row(row!["Sharpe", r->ratio(tangency.sharpe_ratio)]);
  table
}

/// Frontier series as `(volatility, target)` rows.
pub fn frontier_table(frontier: &[FrontierPoint]) -> Table {
  let mut table = new_table();
  table.set_titles(row!["Target return", "Volatility"]);
  for p in frontier {
    table.add_row(row![r->pct(p.target_return), r->pct(p.volatility)]);
  }
  table
}

pub fn capital_market_line_table(line: &CapitalMarketLine) -> Table {
  let [(v0, r0), (v1, r1)] = line.endpoints();
  let mut table = new_table();
  table.set_titles(row!["", "Volatility", "Return"]);
  table.add_row(row!["Risk-free", r->pct(v0), r->pct(r0)]);
  table.add_row(row![
    "Tangency",
    r->pct(line.tangency_volatility),
    r->pct(line.tangency_return)
  ]);
  table.add_row(row!["End", r->pct(v1), r->pct(r1)]);
  table.add_row(row!["Slope", "", r->format!("{:.4}", line.slope)]);
  table
}

/// Plain-text rendering of a whole report.
pub fn render(report: &MarkowitzReport, show_frontier: bool) -> String {
  let mut out = format!(
    "== {} (risk-free {}) ==\n\n",
    report.mode,
    pct(report.risk_free_rate)
  );

  out.push_str(&statistics_table(&report.asset_summaries).to_string());
  out.push('\n');
  out.push_str(&correlation_table(report.statistics.assets(), &report.correlation).to_string());
  out.push('\n');

  if let Some(tangency) = &report.tangency {
    out.push_str("Tangency portfolio\n");
    out.push_str(&tangency_table(tangency).to_string());
    out.push('\n');
  }
  if let Some(line) = &report.capital_market_line {
    out.push_str("Capital market line\n");
    out.push_str(&capital_market_line_table(line).to_string());
    out.push('\n');
  }
  if show_frontier && !report.frontier.is_empty() {
    out.push_str("Efficient frontier\n");
    out.push_str(&frontier_table(&report.frontier).to_string());
    out.push('\n');
  }
  for issue in &report.issues {
    out.push_str(&format!("warning: {issue}\n"));
  }
  out
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::portfolio::types::Portfolio;

  #[test]
  fn statistics_table_marks_undefined_sharpe() {
    let rows = vec![
      AssetSummary {
        name: "Gold".into(),
        annual_return: 0.05,
        annual_volatility: 0.0,
        sharpe_ratio: None,
      },
      AssetSummary {
        name: "Apple".into(),
        annual_return: 0.12,
        annual_volatility: 0.25,
        sharpe_ratio: Some(0.32),
      },
    ];
    let text = statistics_table(&rows).to_string();
    assert!(text.contains("Gold"));
    assert!(text.contains("n/a"));
    assert!(text.contains("12.00%"));
    assert!(text.contains("0.3200"));
  }

  #[test]
  fn tangency_weights_sorted_descending() {
    let tangency = TangencyResult {
      portfolio: Portfolio::new(vec!["A".into(), "B".into()], vec![0.25, 0.75]),
      expected_return: 0.06,
      volatility: 0.1,
      sharpe_ratio: Some(0.4),
      grid_target: 0.06,
      grid_sharpe_ratio: 0.4,
    };
    let text = tangency_table(&tangency).to_string();
    let b = text.find("75.00%").unwrap();
    let a = text.find("25.00%").unwrap();
    assert!(b < a);
  }
}
