use std::path::Path;

use serde::Serialize;

use marketlens_warehouse::{MetricRecord, SentimentTrendRow};

use crate::cli::ReportArgs;
use crate::error::CliError;

use super::{open_warehouse, CommandResult};

#[derive(Debug, Serialize)]
struct ReportResponseData {
    latest_metrics: Vec<MetricRecord>,
    sentiment_trend: Vec<SentimentTrendRow>,
}

pub fn run(args: &ReportArgs, home: Option<&Path>) -> Result<CommandResult, CliError> {
    let warehouse = open_warehouse(home)?;
    let symbol = args
        .symbol
        .as_deref()
        .map(|symbol| symbol.trim().to_ascii_uppercase());

    let data = serde_json::to_value(ReportResponseData {
        latest_metrics: warehouse.latest_metrics()?,
        sentiment_trend: warehouse.sentiment_trend(symbol.as_deref())?,
    })?;
    Ok(CommandResult::ok(data))
}
