//! # marketlens warehouse
//!
//! DuckDB-backed store for the tables a marketlens run produces.
//!
//! Every write is a parameterised `INSERT OR REPLACE` keyed by the natural key
//! of its table, executed inside one transaction per batch together with an
//! `ingest_log` entry. Re-running a batch is therefore a no-op on row counts.
//!
//! ```rust,no_run
//! use marketlens_warehouse::{CompanyRecord, Warehouse};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let warehouse = Warehouse::open_default()?;
//!     warehouse.upsert_companies(
//!         "run-1",
//!         &[CompanyRecord {
//!             symbol: "AAPL".to_string(),
//!             name: "Apple Inc".to_string(),
//!         }],
//!     )?;
//!     Ok(())
//! }
//! ```
//!
//! ## Tables
//!
//! | Table | Key |
//! |-------|-----|
//! | `company_tickers` | `symbol` |
//! | `news_articles` | `(symbol, url)` |
//! | `reddit_posts` | `post_id` |
//! | `stock_data` | `(stock_symbol, date)` |
//! | `stock_metrics` | `(stock_symbol, date)` |
//! | `ingest_log` | append-only, one row per batch |
//!
//! Timestamps cross this boundary as UTC `YYYY-MM-DD HH:MM:SS` strings and
//! dates as `YYYY-MM-DD`.

pub mod duckdb;
pub mod migrations;
pub mod views;

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use ::duckdb::{params, Connection, ToSql};
use serde::Serialize;
use thiserror::Error;

pub use duckdb::{ConnectionPool, PooledConnection};

/// Environment variable naming the warehouse root directory.
pub const ENV_HOME: &str = "MARKETLENS_HOME";

#[derive(Debug, Error)]
pub enum WarehouseError {
    #[error(transparent)]
    DuckDb(#[from] ::duckdb::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// A stored value could not be mapped back into a record.
    #[error("malformed {column} in {table}: {value}")]
    MalformedRow {
        table: &'static str,
        column: &'static str,
        value: String,
    },
}

#[derive(Debug, Clone)]
pub struct WarehouseConfig {
    /// Root directory for marketlens data.
    pub home: PathBuf,
    /// Path to the `DuckDB` database file.
    pub db_path: PathBuf,
    /// Connections kept open between uses.
    pub max_pool_size: usize,
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        Self::at(resolve_home())
    }
}

impl WarehouseConfig {
    /// Configuration rooted at `home`, with the database at
    /// `home/warehouse.duckdb`.
    pub fn at(home: impl Into<PathBuf>) -> Self {
        let home = home.into();
        let db_path = home.join("warehouse.duckdb");
        Self {
            home,
            db_path,
            max_pool_size: 4,
        }
    }
}

/// The tables a batch can target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dataset {
    Companies,
    News,
    Posts,
    Bars,
    Metrics,
}

impl Dataset {
    pub const fn table(self) -> &'static str {
        match self {
            Self::Companies => "company_tickers",
            Self::News => "news_articles",
            Self::Posts => "reddit_posts",
            Self::Bars => "stock_data",
            Self::Metrics => "stock_metrics",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompanyRecord {
    pub symbol: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewsRecord {
    pub symbol: String,
    pub url: String,
    pub title: String,
    pub description: Option<String>,
    pub published_at: String,
    pub source_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostRecord {
    pub post_id: String,
    pub symbol: String,
    pub company_name: String,
    pub created_utc: String,
    pub title: String,
    pub body: String,
    pub subreddit: String,
    pub author: Option<String>,
    pub score: i64,
    pub num_comments: i64,
    pub compound: f64,
    pub positive: f64,
    pub negative: f64,
    pub neutral: f64,
}

/// One daily OHLCV bar.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BarRecord {
    pub symbol: String,
    pub date: String,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricRecord {
    pub symbol: String,
    pub date: String,
    pub close: f64,
    pub moving_average_5: f64,
    pub moving_average_10: f64,
    pub daily_return: f64,
    pub daily_price_change: f64,
    pub volatility: f64,
}

/// A row of `vw_sentiment_trend`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SentimentTrendRow {
    pub symbol: String,
    pub date: String,
    pub post_count: i64,
    pub avg_compound: f64,
    pub avg_positive: f64,
    pub avg_negative: f64,
}

/// Stored document timestamps, as written.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentTimestamps {
    pub news: Vec<String>,
    pub posts: Vec<String>,
}

/// Handle to the warehouse database. Cheap to clone.
#[derive(Clone)]
pub struct Warehouse {
    config: WarehouseConfig,
    pool: ConnectionPool,
}

impl std::fmt::Debug for Warehouse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Warehouse")
            .field("db_path", &self.config.db_path)
            .finish()
    }
}

impl Warehouse {
    /// Opens the warehouse under `$MARKETLENS_HOME` (or `~/.marketlens`).
    pub fn open_default() -> Result<Self, WarehouseError> {
        Self::open(WarehouseConfig::default())
    }

    /// Opens (creating if needed) the database and brings the schema and
    /// views up to date.
    pub fn open(config: WarehouseConfig) -> Result<Self, WarehouseError> {
        if let Some(parent) = config.db_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let pool = ConnectionPool::new(config.db_path.clone(), config.max_pool_size);
        let warehouse = Self { config, pool };
        warehouse.initialize()?;
        Ok(warehouse)
    }

    pub fn initialize(&self) -> Result<(), WarehouseError> {
        let connection = self.pool.acquire()?;
        migrations::apply_migrations(&connection)?;
        views::create_views(&connection)?;
        Ok(())
    }

    pub fn db_path(&self) -> &Path {
        self.pool.db_path()
    }

    /// Upserts companies keyed by symbol. Returns the number of rows written.
    pub fn upsert_companies(
        &self,
        run_id: &str,
        rows: &[CompanyRecord],
    ) -> Result<usize, WarehouseError> {
        self.upsert(run_id, Dataset::Companies, rows, |connection, row| {
            let params: [&dyn ToSql; 2] = [&row.symbol, &row.name];
            connection.execute(
                "INSERT OR REPLACE INTO company_tickers (symbol, company_name, updated_at) \
                 VALUES (?, ?, CURRENT_TIMESTAMP)",
                params.as_slice(),
            )
        })
    }

    /// Upserts news articles keyed by `(symbol, url)`.
    pub fn upsert_news(&self, run_id: &str, rows: &[NewsRecord]) -> Result<usize, WarehouseError> {
        self.upsert(run_id, Dataset::News, rows, |connection, row| {
            let params: [&dyn ToSql; 6] = [
                &row.symbol,
                &row.url,
                &row.title,
                &row.description,
                &row.published_at,
                &row.source_name,
            ];
            connection.execute(
                "INSERT OR REPLACE INTO news_articles \
                 (symbol, url, title, description, published_at, source_name, updated_at) \
                 VALUES (?, ?, ?, ?, TRY_CAST(? AS TIMESTAMP), ?, CURRENT_TIMESTAMP)",
                params.as_slice(),
            )
        })
    }

    /// Upserts discussion posts keyed by post id.
    pub fn upsert_posts(&self, run_id: &str, rows: &[PostRecord]) -> Result<usize, WarehouseError> {
        self.upsert(run_id, Dataset::Posts, rows, |connection, row| {
            let params: [&dyn ToSql; 14] = [
                &row.post_id,
                &row.symbol,
                &row.company_name,
                &row.created_utc,
                &row.title,
                &row.body,
                &row.subreddit,
                &row.author,
                &row.score,
                &row.num_comments,
                &row.compound,
                &row.positive,
                &row.negative,
                &row.neutral,
            ];
            connection.execute(
                "INSERT OR REPLACE INTO reddit_posts \
                 (post_id, symbol, company_name, created_utc, title, body, subreddit, author, \
                  score, num_comments, compound, positive, negative, neutral, updated_at) \
                 VALUES (?, ?, ?, TRY_CAST(? AS TIMESTAMP), ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, \
                  CURRENT_TIMESTAMP)",
                params.as_slice(),
            )
        })
    }

    /// Upserts daily bars keyed by `(symbol, date)`.
    pub fn upsert_bars(&self, run_id: &str, rows: &[BarRecord]) -> Result<usize, WarehouseError> {
        self.upsert(run_id, Dataset::Bars, rows, |connection, row| {
            let params: [&dyn ToSql; 7] = [
                &row.symbol,
                &row.date,
                &row.open,
                &row.high,
                &row.low,
                &row.close,
                &row.volume,
            ];
            connection.execute(
                "INSERT OR REPLACE INTO stock_data \
                 (stock_symbol, date, open, high, low, close, volume, updated_at) \
                 VALUES (?, TRY_CAST(? AS DATE), ?, ?, ?, ?, ?, CURRENT_TIMESTAMP)",
                params.as_slice(),
            )
        })
    }

    /// Upserts metric rows keyed by `(symbol, date)`.
    pub fn upsert_metrics(
        &self,
        run_id: &str,
        rows: &[MetricRecord],
    ) -> Result<usize, WarehouseError> {
        self.upsert(run_id, Dataset::Metrics, rows, |connection, row| {
            let params: [&dyn ToSql; 8] = [
                &row.symbol,
                &row.date,
                &row.close,
                &row.moving_average_5,
                &row.moving_average_10,
                &row.daily_return,
                &row.daily_price_change,
                &row.volatility,
            ];
            connection.execute(
                "INSERT OR REPLACE INTO stock_metrics \
                 (stock_symbol, date, close, moving_average_5, moving_average_10, \
                  daily_return, daily_price_change, volatility, updated_at) \
                 VALUES (?, TRY_CAST(? AS DATE), ?, ?, ?, ?, ?, ?, CURRENT_TIMESTAMP)",
                params.as_slice(),
            )
        })
    }

    /// Stored bars ordered by `(symbol, date)`. An empty `symbols` slice
    /// loads every symbol.
    pub fn load_bars(&self, symbols: &[String]) -> Result<Vec<BarRecord>, WarehouseError> {
        let connection = self.pool.acquire()?;
        let mut statement = connection.prepare(
            "SELECT stock_symbol, CAST(date AS VARCHAR), open, high, low, close, volume \
             FROM stock_data ORDER BY stock_symbol, date",
        )?;
        let rows = statement.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, f64>(2)?,
                row.get::<_, f64>(3)?,
                row.get::<_, f64>(4)?,
                row.get::<_, f64>(5)?,
                row.get::<_, i64>(6)?,
            ))
        })?;

        let mut bars = Vec::new();
        for row in rows {
            let (symbol, date, open, high, low, close, volume) = row?;
            if !symbols.is_empty() && !symbols.contains(&symbol) {
                continue;
            }
            let volume = u64::try_from(volume).map_err(|_| WarehouseError::MalformedRow {
                table: Dataset::Bars.table(),
                column: "volume",
                value: volume.to_string(),
            })?;
            bars.push(BarRecord {
                symbol,
                date,
                open,
                high,
                low,
                close,
                volume,
            });
        }
        Ok(bars)
    }

    /// Every stored news `published_at` and post `created_utc`.
    pub fn document_timestamps(&self) -> Result<DocumentTimestamps, WarehouseError> {
        let connection = self.pool.acquire()?;
        Ok(DocumentTimestamps {
            news: query_strings(
                &connection,
                "SELECT strftime(published_at, '%Y-%m-%d %H:%M:%S') FROM news_articles \
                 ORDER BY published_at",
            )?,
            posts: query_strings(
                &connection,
                "SELECT strftime(created_utc, '%Y-%m-%d %H:%M:%S') FROM reddit_posts \
                 ORDER BY created_utc",
            )?,
        })
    }

    /// `vw_latest_metrics`, ordered by symbol.
    pub fn latest_metrics(&self) -> Result<Vec<MetricRecord>, WarehouseError> {
        let connection = self.pool.acquire()?;
        let mut statement = connection.prepare(
            "SELECT stock_symbol, CAST(date AS VARCHAR), close, moving_average_5, \
             moving_average_10, daily_return, daily_price_change, volatility \
             FROM vw_latest_metrics ORDER BY stock_symbol",
        )?;
        let rows = statement.query_map([], |row| {
            Ok(MetricRecord {
                symbol: row.get(0)?,
                date: row.get(1)?,
                close: row.get(2)?,
                moving_average_5: row.get(3)?,
                moving_average_10: row.get(4)?,
                daily_return: row.get(5)?,
                daily_price_change: row.get(6)?,
                volatility: row.get(7)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// `vw_sentiment_trend` ordered by `(symbol, date)`, optionally for one
    /// symbol.
    pub fn sentiment_trend(
        &self,
        symbol: Option<&str>,
    ) -> Result<Vec<SentimentTrendRow>, WarehouseError> {
        let connection = self.pool.acquire()?;
        let mut statement = connection.prepare(
            "SELECT symbol, CAST(date AS VARCHAR), post_count, avg_compound, avg_positive, \
             avg_negative FROM vw_sentiment_trend ORDER BY symbol, date",
        )?;
        let rows = statement.query_map([], |row| {
            Ok(SentimentTrendRow {
                symbol: row.get(0)?,
                date: row.get(1)?,
                post_count: row.get(2)?,
                avg_compound: row.get(3)?,
                avg_positive: row.get(4)?,
                avg_negative: row.get(5)?,
            })
        })?;

        let mut trend = Vec::new();
        for row in rows {
            let row = row?;
            if symbol.is_none_or(|wanted| wanted == row.symbol) {
                trend.push(row);
            }
        }
        Ok(trend)
    }

    /// Number of rows currently stored for `dataset`.
    pub fn row_count(&self, dataset: Dataset) -> Result<usize, WarehouseError> {
        let connection = self.pool.acquire()?;
        // Table names come from a closed enum.
        let sql = format!("SELECT COUNT(*) FROM {}", dataset.table());
        let count: i64 = connection.query_row(sql.as_str(), [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or_default())
    }

    fn upsert<R>(
        &self,
        run_id: &str,
        dataset: Dataset,
        rows: &[R],
        mut write: impl FnMut(&Connection, &R) -> Result<usize, ::duckdb::Error>,
    ) -> Result<usize, WarehouseError> {
        if rows.is_empty() {
            return Ok(0);
        }

        let connection = self.pool.acquire()?;
        connection.execute_batch("BEGIN TRANSACTION")?;
        let result = (|| -> Result<usize, WarehouseError> {
            for row in rows {
                write(&*connection, row)?;
            }
            let row_count = i64::try_from(rows.len()).unwrap_or(i64::MAX);
            connection.execute(
                "INSERT INTO ingest_log (run_id, dataset, row_count, status, timestamp) \
                 VALUES (?, ?, ?, 'ok', CURRENT_TIMESTAMP)",
                params![run_id, dataset.table(), row_count],
            )?;
            Ok(rows.len())
        })();

        finalize_transaction(&connection, result)
    }
}

fn query_strings(connection: &Connection, sql: &str) -> Result<Vec<String>, WarehouseError> {
    let mut statement = connection.prepare(sql)?;
    let rows = statement.query_map([], |row| row.get::<_, String>(0))?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

fn finalize_transaction<T>(
    connection: &Connection,
    result: Result<T, WarehouseError>,
) -> Result<T, WarehouseError> {
    match result {
        Ok(value) => {
            connection.execute_batch("COMMIT")?;
            Ok(value)
        }
        Err(error) => {
            // The original error is more useful than a failed rollback.
            let _ = connection.execute_batch("ROLLBACK");
            Err(error)
        }
    }
}

fn resolve_home() -> PathBuf {
    if let Some(home) = env::var_os(ENV_HOME).filter(|value| !value.is_empty()) {
        return PathBuf::from(home);
    }
    match env::var_os("HOME").filter(|value| !value.is_empty()) {
        Some(home) => PathBuf::from(home).join(".marketlens"),
        None => PathBuf::from(".marketlens"),
    }
}
