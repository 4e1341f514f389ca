//! Persistence boundary for the tables a run produces.
//!
//! Every method is an upsert keyed by the natural key of its table:
//!
//! | Table | Key |
//! |-------|-----|
//! | companies | ticker |
//! | news | `(symbol, url)` |
//! | posts | post id |
//! | bars | `(symbol, date)` |
//! | metrics | `(symbol, date)` |

use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

use marketlens_warehouse::{
    BarRecord, CompanyRecord, MetricRecord, NewsRecord, PostRecord, Warehouse, WarehouseError,
};
use thiserror::Error;
use time::macros::format_description;
use time::Date;
use tracing::warn;

use crate::{Bar, Company, DiscussionPost, MetricRow, NewsArticle, Symbol, UtcDateTime};

#[derive(Debug, Error)]
pub enum SinkError {
    #[error(transparent)]
    Warehouse(#[from] WarehouseError),
}

impl SinkError {
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Warehouse(_) => "sink.warehouse",
        }
    }
}

/// Receives each stage's table as soon as the stage ends. Implementations
/// return the number of rows written.
pub trait TableSink: Send + Sync {
    fn name(&self) -> &'static str;

    fn upsert_companies(&self, run_id: &str, rows: &[Company]) -> Result<usize, SinkError>;

    fn upsert_news(&self, run_id: &str, rows: &[NewsArticle]) -> Result<usize, SinkError>;

    fn upsert_posts(&self, run_id: &str, rows: &[DiscussionPost]) -> Result<usize, SinkError>;

    fn upsert_bars(&self, run_id: &str, rows: &[Bar]) -> Result<usize, SinkError>;

    fn upsert_metrics(&self, run_id: &str, rows: &[MetricRow]) -> Result<usize, SinkError>;
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemoryTables {
    pub companies: BTreeMap<Symbol, Company>,
    pub news: BTreeMap<(Symbol, String), NewsArticle>,
    pub posts: BTreeMap<String, DiscussionPost>,
    pub bars: BTreeMap<(Symbol, Date), Bar>,
    pub metrics: BTreeMap<(Symbol, Date), MetricRow>,
    /// Non-empty batches received, across all tables.
    pub batches: usize,
}

/// In-process sink with the same keyed-upsert semantics as the warehouse.
#[derive(Debug, Default)]
pub struct MemorySink {
    tables: Mutex<MemoryTables>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> MemoryTables {
        self.tables
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn write<T>(&self, rows: &[T], mut insert: impl FnMut(&mut MemoryTables, &T)) -> usize {
        if rows.is_empty() {
            return 0;
        }
        let mut tables = self.tables.lock().unwrap_or_else(PoisonError::into_inner);
        for row in rows {
            insert(&mut tables, row);
        }
        tables.batches += 1;
        rows.len()
    }
}

impl TableSink for MemorySink {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn upsert_companies(&self, _run_id: &str, rows: &[Company]) -> Result<usize, SinkError> {
        Ok(self.write(rows, |tables, row| {
            tables.companies.insert(row.symbol.clone(), row.clone());
        }))
    }

    fn upsert_news(&self, _run_id: &str, rows: &[NewsArticle]) -> Result<usize, SinkError> {
        Ok(self.write(rows, |tables, row| {
            tables
                .news
                .insert((row.symbol.clone(), row.url.clone()), row.clone());
        }))
    }

    fn upsert_posts(&self, _run_id: &str, rows: &[DiscussionPost]) -> Result<usize, SinkError> {
        Ok(self.write(rows, |tables, row| {
            tables.posts.insert(row.post_id.clone(), row.clone());
        }))
    }

    fn upsert_bars(&self, _run_id: &str, rows: &[Bar]) -> Result<usize, SinkError> {
        Ok(self.write(rows, |tables, row| {
            tables
                .bars
                .insert((row.symbol.clone(), row.date), row.clone());
        }))
    }

    fn upsert_metrics(&self, _run_id: &str, rows: &[MetricRow]) -> Result<usize, SinkError> {
        Ok(self.write(rows, |tables, row| {
            tables
                .metrics
                .insert((row.symbol.clone(), row.date), row.clone());
        }))
    }
}

impl TableSink for Warehouse {
    fn name(&self) -> &'static str {
        "warehouse"
    }

    fn upsert_companies(&self, run_id: &str, rows: &[Company]) -> Result<usize, SinkError> {
        let records: Vec<_> = rows.iter().map(company_record).collect();
        Ok(Warehouse::upsert_companies(self, run_id, &records)?)
    }

    fn upsert_news(&self, run_id: &str, rows: &[NewsArticle]) -> Result<usize, SinkError> {
        let records: Vec<_> = rows.iter().map(news_record).collect();
        Ok(Warehouse::upsert_news(self, run_id, &records)?)
    }

    fn upsert_posts(&self, run_id: &str, rows: &[DiscussionPost]) -> Result<usize, SinkError> {
        let records: Vec<_> = rows.iter().map(post_record).collect();
        Ok(Warehouse::upsert_posts(self, run_id, &records)?)
    }

    fn upsert_bars(&self, run_id: &str, rows: &[Bar]) -> Result<usize, SinkError> {
        let records: Vec<_> = rows.iter().map(bar_record).collect();
        Ok(Warehouse::upsert_bars(self, run_id, &records)?)
    }

    fn upsert_metrics(&self, run_id: &str, rows: &[MetricRow]) -> Result<usize, SinkError> {
        let records: Vec<_> = rows.iter().map(metric_record).collect();
        Ok(Warehouse::upsert_metrics(self, run_id, &records)?)
    }
}

pub fn company_record(company: &Company) -> CompanyRecord {
    CompanyRecord {
        symbol: company.symbol.to_string(),
        name: company.name.clone(),
    }
}

pub fn news_record(article: &NewsArticle) -> NewsRecord {
    NewsRecord {
        symbol: article.symbol.to_string(),
        url: article.url.clone(),
        title: article.title.clone(),
        description: article.description.clone(),
        published_at: storage_timestamp(article.published_at),
        source_name: article.source_name.clone(),
    }
}

pub fn post_record(post: &DiscussionPost) -> PostRecord {
    PostRecord {
        post_id: post.post_id.clone(),
        symbol: post.symbol.to_string(),
        company_name: post.company_name.clone(),
        created_utc: storage_timestamp(post.created_at),
        title: post.title.clone(),
        body: post.body.clone(),
        subreddit: post.subreddit.clone(),
        author: post.author.clone(),
        score: post.score,
        num_comments: i64::try_from(post.comment_count).unwrap_or(i64::MAX),
        compound: post.sentiment.compound,
        positive: post.sentiment.positive,
        negative: post.sentiment.negative,
        neutral: post.sentiment.neutral,
    }
}

pub fn bar_record(bar: &Bar) -> BarRecord {
    BarRecord {
        symbol: bar.symbol.to_string(),
        date: bar.date.to_string(),
        open: bar.open,
        high: bar.high,
        low: bar.low,
        close: bar.close,
        volume: bar.volume,
    }
}

pub fn metric_record(row: &MetricRow) -> MetricRecord {
    MetricRecord {
        symbol: row.symbol.to_string(),
        date: row.date.to_string(),
        close: row.close,
        moving_average_5: row.moving_average_5,
        moving_average_10: row.moving_average_10,
        daily_return: row.daily_return,
        daily_price_change: row.daily_price_change,
        volatility: row.volatility,
    }
}

/// Stored bars as domain bars. Rows that no longer validate are logged and
/// skipped.
pub fn load_stored_bars(warehouse: &Warehouse, symbols: &[String]) -> Result<Vec<Bar>, SinkError> {
    let records = warehouse.load_bars(symbols)?;
    let mut bars = Vec::with_capacity(records.len());

    for record in records {
        let symbol = match Symbol::parse(&record.symbol) {
            Ok(symbol) => symbol,
            Err(error) => {
                warn!(symbol = %record.symbol, "stored bar skipped: {error}");
                continue;
            }
        };
        let Ok(date) = Date::parse(&record.date, format_description!("[year]-[month]-[day]"))
        else {
            warn!(symbol = %symbol, date = %record.date, "stored bar with unreadable date skipped");
            continue;
        };
        match Bar::new(
            symbol,
            date,
            record.open,
            record.high,
            record.low,
            record.close,
            record.volume,
        ) {
            Ok(bar) => bars.push(bar),
            Err(error) => warn!(symbol = %record.symbol, %date, "stored bar skipped: {error}"),
        }
    }

    Ok(bars)
}

/// Stored news and post timestamps, parsed. Unreadable values become `None`.
pub fn load_document_timestamps(
    warehouse: &Warehouse,
) -> Result<(Vec<Option<UtcDateTime>>, Vec<Option<UtcDateTime>>), SinkError> {
    let stored = warehouse.document_timestamps()?;
    let parse = |values: Vec<String>| {
        values
            .iter()
            .map(|value| UtcDateTime::parse_lenient(value))
            .collect::<Vec<_>>()
    };
    Ok((parse(stored.news), parse(stored.posts)))
}

fn storage_timestamp(value: UtcDateTime) -> String {
    let value = value.into_inner();
    format!(
        "{} {:02}:{:02}:{:02}",
        value.date(),
        value.hour(),
        value.minute(),
        value.second()
    )
}
