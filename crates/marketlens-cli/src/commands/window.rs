use std::path::Path;

use serde::Serialize;

use marketlens_core::date_range::{resolve, resolve_or_trailing};
use marketlens_core::sink::load_document_timestamps;
use marketlens_core::{AnalysisWindow, PipelineConfig, PipelineError, UtcDateTime, WindowOrigin};

use crate::cli::WindowArgs;
use crate::error::CliError;

use super::{open_warehouse, CommandResult};

#[derive(Debug, Serialize)]
struct WindowResponseData {
    window: AnalysisWindow,
    days: i64,
    origin: WindowOrigin,
    news_timestamps: usize,
    post_timestamps: usize,
    unreadable: usize,
}

pub fn run(args: &WindowArgs, home: Option<&Path>) -> Result<CommandResult, CliError> {
    let fallback_days = match args.fallback_days {
        Some(days) => days,
        None => PipelineConfig::from_env()?.fallback_days,
    };

    let warehouse = open_warehouse(home)?;
    let (news, posts) = load_document_timestamps(&warehouse)?;
    let unreadable = news.iter().chain(&posts).filter(|value| value.is_none()).count();
    let (news_timestamps, post_timestamps) = (news.len(), posts.len());

    let (window, origin) = if fallback_days == 0 {
        let window = resolve(news, posts).map_err(PipelineError::from)?;
        (window, WindowOrigin::Documents)
    } else {
        resolve_or_trailing(news, posts, UtcDateTime::now().date(), fallback_days)
    };

    let mut warnings = Vec::new();
    if unreadable > 0 {
        warnings.push(format!("{unreadable} stored timestamps could not be read"));
    }
    if origin == WindowOrigin::Fallback {
        warnings.push(format!(
            "no stored document timestamps, using the trailing {fallback_days}-day window"
        ));
    }

    let data = serde_json::to_value(WindowResponseData {
        window,
        days: window.days(),
        origin,
        news_timestamps,
        post_timestamps,
        unreadable,
    })?;
    Ok(CommandResult::ok(data).with_warnings(warnings))
}
