use serde::{Deserialize, Serialize};
use time::Date;

use crate::{Symbol, UtcDateTime, ValidationError};

/// Placeholder upstream APIs put in place of content that is no longer available.
pub const REMOVED_SENTINEL: &str = "[Removed]";

/// True when a document field carries the "content unavailable" marker.
pub fn is_removed(value: &str) -> bool {
    value.trim() == REMOVED_SENTINEL
}

/// A ticker confirmed by the fundamentals source, with its display name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Company {
    pub symbol: Symbol,
    pub name: String,
}

impl Company {
    pub fn new(symbol: Symbol, name: impl Into<String>) -> Self {
        Self {
            symbol,
            name: name.into().trim().to_owned(),
        }
    }
}

/// News article retained for a symbol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewsArticle {
    pub symbol: Symbol,
    pub title: String,
    pub description: Option<String>,
    pub url: String,
    pub published_at: UtcDateTime,
    pub source_name: Option<String>,
}

/// Sentiment for one piece of text. All components lie in their
/// documented ranges: `compound` in `[-1, 1]`, the proportions in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sentiment {
    pub compound: f64,
    pub positive: f64,
    pub negative: f64,
    pub neutral: f64,
}

impl Sentiment {
    /// Score assigned to text without any sentiment-bearing tokens.
    pub const NEUTRAL: Self = Self {
        compound: 0.0,
        positive: 0.0,
        negative: 0.0,
        neutral: 1.0,
    };
}

impl Default for Sentiment {
    fn default() -> Self {
        Self::NEUTRAL
    }
}

/// Social discussion post retained for a symbol, scored on its body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscussionPost {
    pub post_id: String,
    pub symbol: Symbol,
    pub company_name: String,
    pub created_at: UtcDateTime,
    pub title: String,
    pub body: String,
    pub subreddit: String,
    pub author: Option<String>,
    pub score: i64,
    pub comment_count: u64,
    pub sentiment: Sentiment,
}

/// Daily OHLCV bar. At most one per `(symbol, date)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub symbol: Symbol,
    pub date: Date,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

impl Bar {
    pub fn new(
        symbol: Symbol,
        date: Date,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: u64,
    ) -> Result<Self, ValidationError> {
        validate_price("open", open)?;
        validate_price("high", high)?;
        validate_price("low", low)?;
        validate_price("close", close)?;

        if high < low {
            return Err(ValidationError::InvalidBarRange);
        }

        Ok(Self {
            symbol,
            date,
            open,
            high,
            low,
            close,
            volume,
        })
    }
}

/// Fully defined metric row for one `(symbol, date)`.
///
/// Rows are only ever built with every component present; partially defined
/// dates are dropped by the engine instead of being emitted with gaps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricRow {
    pub symbol: Symbol,
    pub date: Date,
    pub close: f64,
    pub moving_average_5: f64,
    pub moving_average_10: f64,
    pub daily_return: f64,
    pub daily_price_change: f64,
    pub volatility: f64,
}

fn validate_price(field: &'static str, value: f64) -> Result<(), ValidationError> {
    if !value.is_finite() {
        return Err(ValidationError::NonFiniteValue { field });
    }
    if value < 0.0 {
        return Err(ValidationError::NegativeValue { field });
    }
    Ok(())
}
