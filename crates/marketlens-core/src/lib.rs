//! # marketlens core
//!
//! Multi-source ingestion and reconciliation for a fixed universe of equities.
//!
//! ## Overview
//!
//! A run confirms tickers against a fundamentals source, gathers news and
//! social discussion per company, derives a common analysis window from the
//! document timestamps, pulls daily bars across that window and computes
//! rolling technical metrics. Every HTTP call goes through
//! [`RateLimitedClient`], which retries throttled responses with exponential
//! backoff; every other failure is isolated to the symbol it happened on.
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`bars`] | Daily bar retrieval over a window |
//! | [`client`] | Throttle-aware retrying HTTP wrapper |
//! | [`config`] | Environment configuration and the default universe |
//! | [`date_range`] | Analysis window from document timestamps |
//! | [`discussions`] | Social posts per company, scored for sentiment |
//! | [`domain`] | Symbols, timestamps, windows and table rows |
//! | [`error`] | Validation and fetch errors |
//! | [`http_client`] | HTTP transport abstraction |
//! | [`metrics`] | Moving averages, returns and volatility |
//! | [`news`] | News articles per company |
//! | [`pipeline`] | Run driver |
//! | [`provider_policy`] | Per-source retry, pacing and caps |
//! | [`retry`] | Backoff schedules and sleepers |
//! | [`sentiment`] | VADER sentiment scorer |
//! | [`sink`] | Persistence boundary |
//! | [`sources`] | Source contracts and their HTTP adapters |
//! | [`stage`] | Per-stage reports and ordered bounded execution |
//! | [`throttling`] | Inter-call pacing |
//! | [`validator`] | Ticker validation |
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use marketlens_core::{MemorySink, Pipeline, PipelineConfig, ReqwestHttpClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = PipelineConfig::from_env()?;
//!     let pipeline = Pipeline::from_config(
//!         config,
//!         Arc::new(ReqwestHttpClient::new()),
//!         Arc::new(MemorySink::new()),
//!     )?;
//!
//!     let output = pipeline.run().await?;
//!     println!("{} metric rows over {}", output.metrics.len(), output.window);
//!     Ok(())
//! }
//! ```
//!
//! ## Security
//!
//! - Credentials come from the environment only and are masked in `Debug`
//! - Warehouse writes are parameterised

pub mod bars;
pub mod client;
pub mod config;
pub mod date_range;
pub mod discussions;
pub mod domain;
pub mod error;
pub mod http_client;
pub mod metrics;
pub mod news;
pub mod pipeline;
pub mod provider_policy;
pub mod retry;
pub mod sentiment;
pub mod sink;
pub mod sources;
pub mod stage;
pub mod throttling;
pub mod validator;

#[cfg(test)]
mod test_support;

pub use bars::{normalize_bars, BarsFetcher};
pub use client::RateLimitedClient;
pub use config::{ConfigError, Credentials, PipelineConfig, DEFAULT_UNIVERSE};
pub use date_range::{NoWindow, WindowOrigin};
pub use discussions::DiscussionFetcher;
pub use domain::{
    is_removed, AnalysisWindow, Bar, Company, DiscussionPost, MetricRow, NewsArticle, Sentiment,
    Symbol, UtcDateTime, MAX_SYMBOL_LEN, REMOVED_SENTINEL,
};
pub use error::{FetchError, ValidationError};
pub use http_client::{
    HttpAuth, HttpClient, HttpError, HttpErrorKind, HttpMethod, HttpRequest, HttpResponse,
    ReqwestHttpClient,
};
pub use metrics::MetricsEngine;
pub use news::{retain_articles, NewsFetcher};
pub use pipeline::{Pipeline, PipelineError, PipelineOutput, Sources};
pub use provider_policy::{SourceKind, SourcePolicy};
pub use retry::{Backoff, RetryPolicy, Sleeper, TokioSleeper};
pub use sentiment::VaderScorer;
pub use sink::{MemorySink, MemoryTables, SinkError, TableSink};
pub use stage::{Stage, StageOptions, StageOutput, StageReport};
pub use throttling::Pacer;
pub use validator::{SymbolValidator, Validation};

// Warehouse (re-exported from marketlens-warehouse)
pub use marketlens_warehouse::{Warehouse, WarehouseConfig, WarehouseError};
