mod metrics;
mod report;
mod run;
mod validate;
mod window;

use std::path::Path;
use std::time::Instant;

use marketlens_core::{ConfigError, PipelineConfig};
use marketlens_warehouse::{Warehouse, WarehouseConfig, WarehouseError};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::cli::{Cli, Command};
use crate::error::CliError;
use crate::metadata::Envelope;

pub struct CommandResult {
    pub data: Value,
    pub warnings: Vec<String>,
}

impl CommandResult {
    pub fn ok(data: Value) -> Self {
        Self {
            data,
            warnings: Vec::new(),
        }
    }

    pub fn with_warnings(mut self, warnings: Vec<String>) -> Self {
        self.warnings.extend(warnings);
        self
    }
}

pub async fn run(cli: &Cli, cancel: CancellationToken) -> Result<Envelope, CliError> {
    let started = Instant::now();
    let home = cli.home.as_deref();

    let (name, result) = match &cli.command {
        Command::Run(args) => ("run", run::run(args, home, cancel).await?),
        Command::Validate(args) => ("validate", validate::run(args, cancel).await?),
        Command::Window(args) => ("window", window::run(args, home)?),
        Command::Metrics(args) => ("metrics", metrics::run(args, home)?),
        Command::Report(args) => ("report", report::run(args, home)?),
    };

    let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
    Ok(Envelope::new(name, elapsed_ms, result.warnings, result.data))
}

/// Environment configuration with command-line tickers taking precedence.
fn load_config(symbols: &[String]) -> Result<PipelineConfig, ConfigError> {
    Ok(PipelineConfig::from_env()?.with_symbols(symbols.to_vec()))
}

fn open_warehouse(home: Option<&Path>) -> Result<Warehouse, WarehouseError> {
    let config = match home {
        Some(home) => WarehouseConfig::at(home),
        None => WarehouseConfig::default(),
    };
    Warehouse::open(config)
}

/// Trimmed, uppercased tickers for warehouse lookups.
fn normalize_tickers(symbols: &[String]) -> Vec<String> {
    symbols
        .iter()
        .map(|symbol| symbol.trim().to_ascii_uppercase())
        .filter(|symbol| !symbol.is_empty())
        .collect()
}
