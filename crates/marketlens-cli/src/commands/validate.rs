use std::sync::Arc;

use serde::Serialize;

use marketlens_core::pipeline::profile_source;
use marketlens_core::{
    Company, PipelineError, ReqwestHttpClient, Stage, StageOptions, StageReport, SymbolValidator,
    TokioSleeper,
};
use tokio_util::sync::CancellationToken;

use crate::cli::SymbolArgs;
use crate::error::CliError;

use super::{load_config, CommandResult};

#[derive(Debug, Serialize)]
struct ValidateResponseData {
    validated: Vec<Company>,
    rejected: Vec<String>,
    report: StageReport,
}

pub async fn run(args: &SymbolArgs, cancel: CancellationToken) -> Result<CommandResult, CliError> {
    let config = load_config(&args.symbols)?;
    let source = profile_source(
        &config,
        Arc::new(ReqwestHttpClient::new()),
        Arc::new(TokioSleeper),
    )?;

    let validator = SymbolValidator::new(source, config.fundamentals.pacer());
    let options = StageOptions::default()
        .with_concurrency(config.max_concurrency)
        .with_cancel(cancel);
    let validation = validator.validate(&config.symbols, &options).await;

    if validation.report.is_exhausted() {
        return Err(PipelineError::SourceExhausted {
            stage: Stage::Validate,
            failed: validation.report.failed,
        }
        .into());
    }

    let data = serde_json::to_value(ValidateResponseData {
        validated: validation.validated,
        rejected: validation.rejected,
        report: validation.report,
    })?;
    Ok(CommandResult::ok(data))
}
