//! Markowitz CLI
//!
//! Usage:
//!   markowitz returns.csv
//!   markowitz prices.csv --prices --mode both --risk-free 0.03
//!   markowitz returns.csv --config engine.toml --assets AAPL,MSFT,GLD --start 2018-01-01

use std::path::PathBuf;

use anyhow::bail;
use anyhow::Context;
use anyhow::Result;
use chrono::NaiveDate;
use clap::Parser;
use clap::ValueEnum;
use markowitz::portfolio::report;
use markowitz::portfolio::AssetSpec;
use markowitz::portfolio::ConstraintMode;
use markowitz::portfolio::EngineConfig;
use markowitz::portfolio::MarkowitzEngine;
use markowitz::portfolio::ReturnMatrix;
use markowitz::portfolio::UniverseRequest;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Mode {
  /// Long-only weights in [0, 1]
  Bounded,
  /// Long/short weights in [-1, 1]
  Unbounded,
  /// Both modes side by side
  Both,
}

#[derive(Parser, Debug)]
#[command(name = "markowitz")]
#[command(about = "Efficient frontier and tangency portfolio from monthly returns")]
struct Cli {
  /// CSV with a `date` column followed by one column per asset
  input: PathBuf,

  /// Input holds monthly closing prices instead of returns
  #[arg(long)]
  prices: bool,

  /// Engine configuration in TOML
  #[arg(long)]
  config: Option<PathBuf>,

  /// Annual risk-free rate, e.g. 0.04
  #[arg(long)]
  risk_free: Option<f64>,

  /// Annual discount rate, defaults to the risk-free rate
  #[arg(long)]
  discount_rate: Option<f64>,

  #[arg(long, value_enum)]
  mode: Option<Mode>,

  /// Number of target returns on the frontier
  #[arg(long)]
  grid_size: Option<usize>,

  /// Comma separated asset columns to keep
  #[arg(long, value_delimiter = ',')]
  assets: Vec<String>,

  /// First period to include (YYYY-MM-DD)
  #[arg(long)]
  start: Option<NaiveDate>,

  /// Last period to include (YYYY-MM-DD)
  #[arg(long)]
  end: Option<NaiveDate>,

  /// Solve frontier targets in parallel
  #[arg(long)]
  parallel: bool,

  /// Print the frontier series
  #[arg(long)]
  show_frontier: bool,

  #[arg(short, long)]
  verbose: bool,
}

impl Cli {
  fn engine_config(&self) -> Result<EngineConfig> {
    let mut config = match &self.config {
      Some(path) => EngineConfig::from_toml_file(path)?,
      None => EngineConfig::default(),
    };

    if let Some(rf) = self.risk_free {
      config.risk_free_rate = rf;
    }
    if self.discount_rate.is_some() {
      config.discount_rate = self.discount_rate;
    }
    if let Some(n) = self.grid_size {
      config.grid_size = n;
    }
    match self.mode {
      Some(Mode::Bounded) => config.constraint_mode = ConstraintMode::Bounded,
      Some(Mode::Unbounded) => config.constraint_mode = ConstraintMode::Unbounded,
      Some(Mode::Both) | None => {}
    }
    config.parallel |= self.parallel;
    config.validate()?;
    Ok(config)
  }

  fn request(&self, config: &EngineConfig, loaded: &ReturnMatrix) -> Result<UniverseRequest> {
    let (Some(first), Some(last)) = (loaded.periods().first(), loaded.periods().last()) else {
      bail!("{} has no period common to all assets", self.input.display());
    };

    let names: Vec<String> = if self.assets.is_empty() {
      loaded.assets().to_vec()
    } else {
      self.assets.clone()
    };

    Ok(UniverseRequest {
      assets: names.iter().map(|n| AssetSpec::new(n, n)).collect(),
      start: self.start.unwrap_or(*first),
      end: self.end.unwrap_or(*last),
      risk_free_rate: config.risk_free_rate,
      constraint_mode: config.constraint_mode,
    })
  }
}

fn init_tracing(verbose: bool) {
  let default = if verbose { "markowitz=debug" } else { "markowitz=warn" };
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
  tracing_subscriber::registry()
    .with(filter)
    .with(tracing_subscriber::fmt::layer().with_target(false))
    .init();
}

fn main() -> Result<()> {
  let cli = Cli::parse();
  init_tracing(cli.verbose);

  let config = cli.engine_config()?;
  let loaded = ReturnMatrix::from_path(&cli.input, cli.prices)
    .with_context(|| format!("loading {}", cli.input.display()))?;
  info!(
    assets = loaded.n_assets(),
    periods = loaded.n_periods(),
    "returns loaded"
  );
  let request = cli.request(&config, &loaded)?;

  let engine = MarkowitzEngine::new(config);
  let reports = match cli.mode {
    Some(Mode::Both) => engine.run_all_modes(&request.fetch(&loaded)?)?,
    _ => vec![engine.run_request(&request, &loaded)?],
  };

  for report in &reports {
    println!("{}", report::render(report, cli.show_frontier));
  }

  Ok(())
}
