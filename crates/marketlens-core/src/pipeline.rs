//! Run driver: validate, then news and discussions side by side, then the
//! window, bars and metrics. Each stage's table goes to the sink as soon as
//! the stage ends, so a failure later in the run keeps earlier tables.

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use time::Date;
use tokio_util::sync::CancellationToken;
use tracing::{info, info_span, instrument, warn, Instrument};
use uuid::Uuid;

use crate::bars::BarsFetcher;
use crate::client::RateLimitedClient;
use crate::config::{ConfigError, PipelineConfig};
use crate::date_range::{self, NoWindow, WindowOrigin};
use crate::discussions::DiscussionFetcher;
use crate::http_client::HttpClient;
use crate::metrics::MetricsEngine;
use crate::news::NewsFetcher;
use crate::provider_policy::SourceKind;
use crate::retry::{Sleeper, TokioSleeper};
use crate::sentiment::VaderScorer;
use crate::sink::{SinkError, TableSink};
use crate::sources::{
    AlpacaBars, BarSource, DiscussionSource, FinnhubProfiles, NewsApiClient, NewsSource,
    ProfileSource, RedditClient, SentimentScorer,
};
use crate::stage::{Stage, StageOptions, StageReport};
use crate::validator::SymbolValidator;
use crate::{AnalysisWindow, Bar, Company, DiscussionPost, MetricRow, NewsArticle, UtcDateTime};

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Every attempted unit of a gating stage failed with an error.
    #[error("{stage} stage exhausted: all {failed} attempted symbols failed")]
    SourceExhausted { stage: Stage, failed: usize },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Sink(#[from] SinkError),

    #[error("analysis window unavailable: {0}")]
    InputInvalid(#[from] NoWindow),
}

impl PipelineError {
    pub const fn code(&self) -> &'static str {
        match self {
            Self::SourceExhausted { .. } => "pipeline.source_exhausted",
            Self::Config(_) => "pipeline.config",
            Self::Sink(error) => error.code(),
            Self::InputInvalid(_) => "pipeline.input_invalid",
        }
    }
}

/// The collaborators a run talks to.
#[derive(Clone)]
pub struct Sources {
    pub profiles: Arc<dyn ProfileSource>,
    pub news: Arc<dyn NewsSource>,
    pub discussions: Arc<dyn DiscussionSource>,
    pub bars: Arc<dyn BarSource>,
    pub scorer: Arc<dyn SentimentScorer>,
}

impl Sources {
    /// HTTP adapters for every source, each behind its own retry policy.
    /// Fails on the first missing credential.
    pub fn from_config(
        config: &PipelineConfig,
        http: Arc<dyn HttpClient>,
        sleeper: Arc<dyn Sleeper>,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            profiles: profile_source(config, Arc::clone(&http), Arc::clone(&sleeper))?,
            news: news_source(config, Arc::clone(&http), Arc::clone(&sleeper))?,
            discussions: discussion_source(config, Arc::clone(&http), Arc::clone(&sleeper))?,
            bars: bar_source(config, http, sleeper)?,
            scorer: Arc::new(VaderScorer),
        })
    }
}

fn client_for(
    config: &PipelineConfig,
    kind: SourceKind,
    http: Arc<dyn HttpClient>,
    sleeper: Arc<dyn Sleeper>,
) -> RateLimitedClient {
    RateLimitedClient::new(kind.provider(), http, config.policy(kind).retry.clone())
        .with_sleeper(sleeper)
}

pub fn profile_source(
    config: &PipelineConfig,
    http: Arc<dyn HttpClient>,
    sleeper: Arc<dyn Sleeper>,
) -> Result<Arc<dyn ProfileSource>, ConfigError> {
    let api_key = config.credentials.finnhub()?;
    let client = client_for(config, SourceKind::Fundamentals, http, sleeper);
    Ok(Arc::new(FinnhubProfiles::new(client, api_key)))
}

pub fn news_source(
    config: &PipelineConfig,
    http: Arc<dyn HttpClient>,
    sleeper: Arc<dyn Sleeper>,
) -> Result<Arc<dyn NewsSource>, ConfigError> {
    let api_key = config.credentials.newsapi()?;
    let client = client_for(config, SourceKind::News, http, sleeper);
    Ok(Arc::new(NewsApiClient::new(client, api_key)))
}

pub fn discussion_source(
    config: &PipelineConfig,
    http: Arc<dyn HttpClient>,
    sleeper: Arc<dyn Sleeper>,
) -> Result<Arc<dyn DiscussionSource>, ConfigError> {
    let credentials = config.credentials.reddit()?;
    let client = client_for(config, SourceKind::Discussions, http, sleeper);
    Ok(Arc::new(
        RedditClient::new(client, credentials).with_subreddit(config.subreddit.clone()),
    ))
}

pub fn bar_source(
    config: &PipelineConfig,
    http: Arc<dyn HttpClient>,
    sleeper: Arc<dyn Sleeper>,
) -> Result<Arc<dyn BarSource>, ConfigError> {
    let (api_key, secret_key) = config.credentials.alpaca()?;
    let client = client_for(config, SourceKind::Bars, http, sleeper);
    Ok(Arc::new(AlpacaBars::new(client, api_key, secret_key)))
}

/// Everything one run produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineOutput {
    pub run_id: String,
    pub companies: Vec<Company>,
    pub rejected: Vec<String>,
    pub news: Vec<NewsArticle>,
    pub posts: Vec<DiscussionPost>,
    pub window: AnalysisWindow,
    pub window_origin: WindowOrigin,
    pub bars: Vec<Bar>,
    pub metrics: Vec<MetricRow>,
    pub reports: Vec<StageReport>,
    pub cancelled: bool,
}

impl PipelineOutput {
    pub fn report(&self, stage: Stage) -> Option<&StageReport> {
        self.reports.iter().find(|report| report.stage == stage)
    }
}

pub struct Pipeline {
    config: PipelineConfig,
    sources: Sources,
    sink: Arc<dyn TableSink>,
    engine: MetricsEngine,
    cancel: CancellationToken,
    today: Option<Date>,
}

impl Pipeline {
    pub fn new(config: PipelineConfig, sources: Sources, sink: Arc<dyn TableSink>) -> Self {
        Self {
            config,
            sources,
            sink,
            engine: MetricsEngine::default(),
            cancel: CancellationToken::new(),
            today: None,
        }
    }

    /// Wires the HTTP adapters for `config` with real sleeps.
    pub fn from_config(
        config: PipelineConfig,
        http: Arc<dyn HttpClient>,
        sink: Arc<dyn TableSink>,
    ) -> Result<Self, PipelineError> {
        let sources = Sources::from_config(&config, http, Arc::new(TokioSleeper))?;
        Ok(Self::new(config, sources, sink))
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Fixes the end date of the fallback window.
    pub fn with_today(mut self, today: Date) -> Self {
        self.today = Some(today);
        self
    }

    pub fn with_engine(mut self, engine: MetricsEngine) -> Self {
        self.engine = engine;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    #[instrument(skip(self), fields(sink = self.sink.name(), symbols = self.config.symbols.len()))]
    pub async fn run(&self) -> Result<PipelineOutput, PipelineError> {
        let run_id = Uuid::new_v4().to_string();
        let options = StageOptions::default()
            .with_concurrency(self.config.max_concurrency)
            .with_cancel(self.cancel.clone());
        info!(%run_id, "run started");

        let validator =
            SymbolValidator::new(Arc::clone(&self.sources.profiles), self.config.fundamentals.pacer());
        let validation = validator
            .validate(&self.config.symbols, &options)
            .instrument(info_span!("stage", stage = "validate"))
            .await;
        if validation.report.is_exhausted() {
            warn!(stage = "validate", failed = validation.report.failed, "every lookup failed, check fundamentals credentials");
            return Err(PipelineError::SourceExhausted {
                stage: Stage::Validate,
                failed: validation.report.failed,
            });
        }
        let companies = validation.validated;
        self.sink.upsert_companies(&run_id, &companies)?;

        let news_fetcher = NewsFetcher::new(
            Arc::clone(&self.sources.news),
            self.config.news.pacer(),
            self.config.news.result_cap,
        );
        let discussion_fetcher = DiscussionFetcher::new(
            Arc::clone(&self.sources.discussions),
            Arc::clone(&self.sources.scorer),
            self.config.discussions.pacer(),
            self.config.discussions.result_cap,
        );
        let (news, posts) = tokio::join!(
            news_fetcher
                .fetch(&companies, &options)
                .instrument(info_span!("stage", stage = "news")),
            discussion_fetcher
                .fetch(&companies, &options)
                .instrument(info_span!("stage", stage = "discussions")),
        );
        self.sink.upsert_news(&run_id, &news.items)?;
        self.sink.upsert_posts(&run_id, &posts.items)?;

        let (window, window_origin) = self.resolve_window(&news.items, &posts.items)?;
        info!(%window, origin = ?window_origin, "analysis window");

        let bars = BarsFetcher::new(Arc::clone(&self.sources.bars), self.config.bars.pacer())
            .fetch(&companies, window, &options)
            .instrument(info_span!("stage", stage = "bars"))
            .await;
        self.sink.upsert_bars(&run_id, &bars.items)?;

        let (metrics, metrics_report) =
            info_span!("stage", stage = "metrics").in_scope(|| self.compute_metrics(&bars.items));
        self.sink.upsert_metrics(&run_id, &metrics)?;

        let reports = vec![
            validation.report,
            news.report,
            posts.report,
            bars.report,
            metrics_report,
        ];
        for report in reports.iter().filter(|report| report.is_exhausted()) {
            warn!(stage = %report.stage, failed = report.failed, "stage exhausted, its table is empty");
        }

        let cancelled = self.cancel.is_cancelled();
        info!(
            %run_id,
            companies = companies.len(),
            news = news.items.len(),
            posts = posts.items.len(),
            bars = bars.items.len(),
            metrics = metrics.len(),
            cancelled,
            "run finished"
        );

        Ok(PipelineOutput {
            run_id,
            companies,
            rejected: validation.rejected,
            news: news.items,
            posts: posts.items,
            window,
            window_origin,
            bars: bars.items,
            metrics,
            reports,
            cancelled,
        })
    }

    fn resolve_window(
        &self,
        news: &[NewsArticle],
        posts: &[DiscussionPost],
    ) -> Result<(AnalysisWindow, WindowOrigin), PipelineError> {
        let news_times = news.iter().map(|article| Some(article.published_at));
        let post_times = posts.iter().map(|post| Some(post.created_at));

        if self.config.fallback_days == 0 {
            let window = date_range::resolve(news_times, post_times)?;
            return Ok((window, WindowOrigin::Documents));
        }

        let today = self.today.unwrap_or_else(|| UtcDateTime::now().date());
        Ok(date_range::resolve_or_trailing(
            news_times,
            post_times,
            today,
            self.config.fallback_days,
        ))
    }

    fn compute_metrics(&self, bars: &[Bar]) -> (Vec<MetricRow>, StageReport) {
        let rows = self.engine.compute(bars);
        let report = metrics_report(bars, &rows);
        (rows, report)
    }
}

/// One unit per symbol with bars: a success when it produced any row.
pub fn metrics_report(bars: &[Bar], rows: &[MetricRow]) -> StageReport {
    let mut report = StageReport::new(Stage::Metrics);
    let mut symbols: Vec<_> = bars.iter().map(|bar| &bar.symbol).collect();
    symbols.sort();
    symbols.dedup();

    for symbol in symbols {
        if rows.iter().any(|row| &row.symbol == symbol) {
            report.record_success();
        } else {
            report.record_empty();
        }
    }
    report
}
