//! CLI argument definitions for marketlens.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `run` | Full run: validate, news, discussions, window, bars, metrics |
//! | `validate` | Confirm tickers against the fundamentals source |
//! | `window` | Analysis window from stored document timestamps |
//! | `metrics` | Recompute metrics from stored bars |
//! | `report` | Latest metrics and sentiment trend from the warehouse |
//!
//! # Global Options
//!
//! | Option | Default | Description |
//! |--------|---------|-------------|
//! | `--format` | `json` | Output format (json, table) |
//! | `--pretty` | `false` | Pretty-print JSON output |
//! | `--log-json` | `false` | Emit logs as JSON lines on stderr |
//! | `--home` | `$MARKETLENS_HOME` | Warehouse root directory |
//!
//! # Examples
//!
//! ```bash
//! marketlens run AAPL MSFT --concurrency 4
//! marketlens validate AAPL NOTREAL --pretty
//! marketlens metrics --no-store --format table
//! ```

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Debug, Parser)]
#[command(
    name = "marketlens",
    author,
    version,
    about = "Equity news, discussion and price metrics pipeline",
    long_about = "marketlens validates a universe of tickers, gathers news and social \
discussion for each company, derives a shared analysis window, pulls daily bars and \
computes rolling metrics, storing every table in a local DuckDB warehouse.\n\
\n\
Credentials are read from MARKETLENS_* environment variables or a .env file."
)]
pub struct Cli {
    /// Output format for results.
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Json)]
    pub format: OutputFormat,

    /// Pretty-print JSON output with indentation.
    #[arg(long, global = true, default_value_t = false)]
    pub pretty: bool,

    /// Emit logs as JSON lines instead of human-readable text.
    #[arg(long, global = true, default_value_t = false)]
    pub log_json: bool,

    /// Warehouse root directory. Defaults to $MARKETLENS_HOME or ~/.marketlens.
    #[arg(long, global = true)]
    pub home: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Single JSON object.
    Json,
    /// Human-readable summary.
    Table,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run every stage and store each table as it completes.
    ///
    /// # Examples
    ///
    ///   marketlens run
    ///   marketlens run AAPL MSFT NVDA --concurrency 3
    ///   marketlens run AAPL --delay-scale 0.1 --no-store
    ///   marketlens run --retry-jitter
    Run(RunArgs),

    /// Confirm tickers against the fundamentals source.
    ///
    /// # Examples
    ///
    ///   marketlens validate AAPL MSFT NOTREAL
    Validate(SymbolArgs),

    /// Derive the analysis window from stored news and posts.
    Window(WindowArgs),

    /// Recompute metrics from bars already in the warehouse.
    ///
    /// # Examples
    ///
    ///   marketlens metrics
    ///   marketlens metrics AAPL --no-store --format table
    Metrics(MetricsArgs),

    /// Show the latest metrics and daily sentiment stored in the warehouse.
    Report(ReportArgs),
}

#[derive(Debug, Clone, Args)]
pub struct SymbolArgs {
    /// Tickers to process. Defaults to $MARKETLENS_SYMBOLS or the built-in universe.
    pub symbols: Vec<String>,
}

#[derive(Debug, Clone, Args)]
pub struct RunArgs {
    #[command(flatten)]
    pub symbols: SymbolArgs,

    /// Symbols in flight per stage.
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Multiplier for every retry base delay and pacing interval.
    #[arg(long)]
    pub delay_scale: Option<f64>,

    /// Randomise throttle backoff by up to 50% either way.
    #[arg(long, default_value_t = false)]
    pub retry_jitter: bool,

    /// Keep results in memory instead of writing the warehouse.
    #[arg(long, default_value_t = false)]
    pub no_store: bool,

    /// Include every row of every table in the output.
    #[arg(long, default_value_t = false)]
    pub full: bool,
}

#[derive(Debug, Clone, Args)]
pub struct WindowArgs {
    /// Trailing days to use when no stored document has a timestamp.
    #[arg(long)]
    pub fallback_days: Option<u32>,
}

#[derive(Debug, Clone, Args)]
pub struct MetricsArgs {
    #[command(flatten)]
    pub symbols: SymbolArgs,

    /// Print the rows without writing them back.
    #[arg(long, default_value_t = false)]
    pub no_store: bool,
}

#[derive(Debug, Clone, Args)]
pub struct ReportArgs {
    /// Restrict the sentiment trend to one ticker.
    #[arg(long)]
    pub symbol: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_flags_parse() {
        let cli = Cli::try_parse_from([
            "marketlens",
            "--format",
            "table",
            "run",
            "AAPL",
            "MSFT",
            "--concurrency",
            "3",
            "--no-store",
            "--retry-jitter",
        ])
        .expect("parse");

        assert_eq!(cli.format, OutputFormat::Table);
        let Command::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.symbols.symbols, vec!["AAPL", "MSFT"]);
        assert_eq!(args.concurrency, Some(3));
        assert!(args.no_store);
        assert!(args.retry_jitter);
        assert!(!args.full);
    }

    #[test]
    fn global_flags_follow_the_subcommand() {
        let cli = Cli::try_parse_from(["marketlens", "metrics", "--pretty", "--log-json"])
            .expect("parse");

        assert!(cli.pretty);
        assert!(cli.log_json);
        assert!(matches!(cli.command, Command::Metrics(_)));
    }

    #[test]
    fn unknown_format_is_rejected() {
        assert!(Cli::try_parse_from(["marketlens", "--format", "xml", "report"]).is_err());
    }
}
