use std::path::Path;

use serde::Serialize;
use uuid::Uuid;

use marketlens_core::pipeline::metrics_report;
use marketlens_core::sink::load_stored_bars;
use marketlens_core::{MetricRow, MetricsEngine, StageReport, TableSink};

use crate::cli::MetricsArgs;
use crate::error::CliError;

use super::{normalize_tickers, open_warehouse, CommandResult};

#[derive(Debug, Serialize)]
struct MetricsResponseData {
    bars: usize,
    stored: usize,
    report: StageReport,
    rows: Vec<MetricRow>,
}

pub fn run(args: &MetricsArgs, home: Option<&Path>) -> Result<CommandResult, CliError> {
    let warehouse = open_warehouse(home)?;
    let symbols = normalize_tickers(&args.symbols.symbols);

    let bars = load_stored_bars(&warehouse, &symbols)?;
    let rows = MetricsEngine::default().compute(&bars);
    let report = metrics_report(&bars, &rows);

    let stored = if args.no_store {
        0
    } else {
        let run_id = Uuid::new_v4().to_string();
        TableSink::upsert_metrics(&warehouse, &run_id, &rows)?
    };

    let mut warnings = Vec::new();
    if bars.is_empty() {
        warnings.push(String::from("no stored bars, run `marketlens run` first"));
    }

    let data = serde_json::to_value(MetricsResponseData {
        bars: bars.len(),
        stored,
        report,
        rows,
    })?;
    Ok(CommandResult::ok(data).with_warnings(warnings))
}
