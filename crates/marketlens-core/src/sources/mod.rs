//! Contracts for the external collaborators and their HTTP adapters.
//!
//! Every trait returns raw records decoded from the provider's own schema.
//! Sentinel filtering, timestamp parsing and validation into domain types
//! happen in the stages that consume them, so a fake source in a test sees
//! the same treatment as a real one.

mod alpaca;
mod finnhub;
mod newsapi;
mod reddit;

use std::future::Future;
use std::pin::Pin;

pub use alpaca::{AlpacaBars, ALPACA_DATA_URL};
pub use finnhub::{FinnhubProfiles, FINNHUB_URL};
pub use newsapi::{NewsApiClient, NEWSAPI_URL};
pub use reddit::{RedditClient, RedditCredentials, REDDIT_API_URL, REDDIT_AUTH_URL};

use crate::{AnalysisWindow, FetchError, Sentiment, Symbol};

/// Boxed future returned by every source contract.
pub type SourceFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, FetchError>> + Send + 'a>>;

/// Company profile returned by the fundamentals lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawProfile {
    pub name: Option<String>,
    pub exchange: Option<String>,
    pub industry: Option<String>,
}

impl RawProfile {
    /// Display name, when the profile names a company at all.
    pub fn display_name(&self) -> Option<&str> {
        self.name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawArticle {
    pub title: Option<String>,
    pub description: Option<String>,
    pub url: Option<String>,
    pub published_at: Option<String>,
    pub source_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawPost {
    pub id: String,
    /// Seconds since the Unix epoch.
    pub created_utc: f64,
    pub title: String,
    pub body: String,
    pub subreddit: String,
    pub author: Option<String>,
    pub score: i64,
    pub comment_count: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawBar {
    /// Session timestamp as sent by the provider (RFC3339).
    pub timestamp: String,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

/// Fundamentals lookup: ticker to profile. `Ok(None)` means the ticker is
/// unknown to the provider.
pub trait ProfileSource: Send + Sync {
    fn name(&self) -> &'static str;

    fn profile<'a>(&'a self, symbol: &'a Symbol) -> SourceFuture<'a, Option<RawProfile>>;
}

/// News search by free-text query.
pub trait NewsSource: Send + Sync {
    fn name(&self) -> &'static str;

    fn search<'a>(&'a self, query: &'a str, limit: usize) -> SourceFuture<'a, Vec<RawArticle>>;
}

/// Discussion search by free-text query.
pub trait DiscussionSource: Send + Sync {
    fn name(&self) -> &'static str;

    fn search<'a>(&'a self, query: &'a str, limit: usize) -> SourceFuture<'a, Vec<RawPost>>;
}

/// Daily bars for one symbol across a window.
pub trait BarSource: Send + Sync {
    fn name(&self) -> &'static str;

    fn daily_bars<'a>(
        &'a self,
        symbol: &'a Symbol,
        window: AnalysisWindow,
    ) -> SourceFuture<'a, Vec<RawBar>>;
}

/// Maps text to a sentiment tuple. Pure and infallible.
pub trait SentimentScorer: Send + Sync {
    fn score(&self, text: &str) -> Sentiment;
}
