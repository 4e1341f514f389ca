//! # Domain Models
//!
//! Validated types shared by every stage of the pipeline.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Symbol`] | Normalised exchange ticker |
//! | [`Company`] | Ticker confirmed by the fundamentals source |
//! | [`NewsArticle`] | News document for a symbol |
//! | [`DiscussionPost`] | Social post for a symbol, with [`Sentiment`] |
//! | [`Bar`] | Daily OHLCV bar |
//! | [`MetricRow`] | Fully defined rolling indicators for one date |
//! | [`AnalysisWindow`] | Inclusive date range bounding the bar fetch |
//! | [`UtcDateTime`] | Instant normalised to UTC |
//!
//! Constructors enforce invariants, so a value of these types that exists is
//! already valid:
//!
//! ```rust
//! use marketlens_core::{Bar, Symbol, ValidationError};
//! use time::macros::date;
//!
//! # fn main() -> Result<(), ValidationError> {
//! let symbol = Symbol::parse("brk.b")?;
//! assert_eq!(symbol.as_str(), "BRK.B");
//!
//! let invalid = Bar::new(symbol, date!(2024 - 01 - 02), 10.0, 9.0, 11.0, 10.0, 0);
//! assert!(matches!(invalid, Err(ValidationError::InvalidBarRange)));
//! # Ok(())
//! # }
//! ```

mod models;
mod symbol;
mod timestamp;
mod window;

pub use models::{
    is_removed, Bar, Company, DiscussionPost, MetricRow, NewsArticle, Sentiment, REMOVED_SENTINEL,
};
pub use symbol::{Symbol, MAX_SYMBOL_LEN};
pub use timestamp::UtcDateTime;
pub use window::AnalysisWindow;
