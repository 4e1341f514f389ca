use std::path::Path;
use std::sync::Arc;

use serde::Serialize;

use marketlens_core::{
    AnalysisWindow, MemorySink, Pipeline, PipelineConfig, PipelineOutput, ReqwestHttpClient,
    StageReport, TableSink, WindowOrigin,
};
use tokio_util::sync::CancellationToken;

use crate::cli::RunArgs;
use crate::error::CliError;

use super::{load_config, open_warehouse, CommandResult};

#[derive(Debug, Serialize)]
struct TableCounts {
    companies: usize,
    news: usize,
    posts: usize,
    bars: usize,
    metrics: usize,
}

#[derive(Debug, Serialize)]
struct RunSummary<'a> {
    run_id: &'a str,
    stored: bool,
    companies: Vec<&'a str>,
    rejected: &'a [String],
    window: AnalysisWindow,
    window_origin: WindowOrigin,
    counts: TableCounts,
    reports: &'a [StageReport],
    cancelled: bool,
}

impl<'a> RunSummary<'a> {
    fn new(output: &'a PipelineOutput, stored: bool) -> Self {
        Self {
            run_id: &output.run_id,
            stored,
            companies: output
                .companies
                .iter()
                .map(|company| company.symbol.as_str())
                .collect(),
            rejected: &output.rejected,
            window: output.window,
            window_origin: output.window_origin,
            counts: TableCounts {
                companies: output.companies.len(),
                news: output.news.len(),
                posts: output.posts.len(),
                bars: output.bars.len(),
                metrics: output.metrics.len(),
            },
            reports: &output.reports,
            cancelled: output.cancelled,
        }
    }
}

pub async fn run(
    args: &RunArgs,
    home: Option<&Path>,
    cancel: CancellationToken,
) -> Result<CommandResult, CliError> {
    let config = apply_run_args(load_config(&args.symbols.symbols)?, args)?;
    let fallback_days = config.fallback_days;

    let sink: Arc<dyn TableSink> = if args.no_store {
        Arc::new(MemorySink::new())
    } else {
        Arc::new(open_warehouse(home)?)
    };

    let pipeline = Pipeline::from_config(config, Arc::new(ReqwestHttpClient::new()), sink)?
        .with_cancel(cancel);
    let output = pipeline.run().await?;

    let data = if args.full {
        serde_json::to_value(&output)?
    } else {
        serde_json::to_value(RunSummary::new(&output, !args.no_store))?
    };

    Ok(CommandResult::ok(data).with_warnings(run_warnings(&output, fallback_days)))
}

fn apply_run_args(mut config: PipelineConfig, args: &RunArgs) -> Result<PipelineConfig, CliError> {
    if let Some(concurrency) = args.concurrency {
        if concurrency == 0 {
            return Err(CliError::Command(String::from(
                "--concurrency must be at least 1",
            )));
        }
        config = config.with_concurrency(concurrency);
    }
    if let Some(scale) = args.delay_scale {
        if !scale.is_finite() || scale < 0.0 {
            return Err(CliError::Command(format!(
                "--delay-scale must be a non-negative number, got {scale}"
            )));
        }
        config = config.with_delay_scale(scale);
    }
    if args.retry_jitter {
        config = config.with_retry_jitter(true);
    }
    Ok(config)
}

fn run_warnings(output: &PipelineOutput, fallback_days: u32) -> Vec<String> {
    let mut warnings: Vec<String> = output
        .reports
        .iter()
        .filter(|report| report.is_exhausted())
        .map(|report| {
            format!(
                "{} stage exhausted: all {} attempted symbols failed",
                report.stage, report.failed
            )
        })
        .collect();

    if output.window_origin == WindowOrigin::Fallback {
        warnings.push(format!(
            "no usable document timestamps, used the trailing {fallback_days}-day window"
        ));
    }
    if output.cancelled {
        warnings.push(String::from("run cancelled, remaining symbols were skipped"));
    }
    warnings
}
