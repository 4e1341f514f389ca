//! Behavior-driven tests for the warehouse as a run sink.
//!
//! These tests verify what a user sees in the warehouse across runs: rows
//! keyed by their natural keys, stored bars feeding later metric runs, and
//! stored timestamps feeding later window resolution.

use marketlens_core::date_range::resolve;
use marketlens_core::sink::{load_document_timestamps, load_stored_bars};
use marketlens_core::{
    Bar, Company, DiscussionPost, MetricsEngine, NewsArticle, Sentiment, Symbol, TableSink,
    UtcDateTime,
};
use marketlens_tests::temp_warehouse;
use marketlens_warehouse::{Dataset, Warehouse, WarehouseConfig};
use time::macros::date;
use time::Duration;

fn symbol(ticker: &str) -> Symbol {
    Symbol::parse(ticker).expect("valid symbol")
}

fn bars(ticker: &str, closes: &[f64]) -> Vec<Bar> {
    let first = date!(2024 - 01 - 01);
    closes
        .iter()
        .enumerate()
        .map(|(offset, close)| {
            Bar::new(
                symbol(ticker),
                first + Duration::days(offset as i64),
                *close,
                close + 1.0,
                close - 1.0,
                *close,
                1_000,
            )
            .expect("valid bar")
        })
        .collect()
}

fn article(ticker: &str, url: &str, published_at: &str) -> NewsArticle {
    NewsArticle {
        symbol: symbol(ticker),
        title: format!("{ticker} headline"),
        description: None,
        url: url.to_owned(),
        published_at: UtcDateTime::parse(published_at).expect("timestamp"),
        source_name: Some(String::from("Wire")),
    }
}

fn post(id: &str, ticker: &str, created_at: &str, compound: f64) -> DiscussionPost {
    DiscussionPost {
        post_id: id.to_owned(),
        symbol: symbol(ticker),
        company_name: format!("{ticker} Corp"),
        created_at: UtcDateTime::parse(created_at).expect("timestamp"),
        title: String::from("thread"),
        body: String::from("body"),
        subreddit: String::from("stocks"),
        author: Some(String::from("user")),
        score: 10,
        comment_count: 2,
        sentiment: Sentiment {
            compound,
            ..Sentiment::NEUTRAL
        },
    }
}

// =============================================================================
// Warehouse: Repeated Runs
// =============================================================================

#[test]
fn when_a_run_is_repeated_rows_are_replaced_not_duplicated() {
    // Given: A warehouse holding one run's companies and bars
    let (_temp, warehouse) = temp_warehouse();
    let companies = vec![
        Company::new(symbol("AAPL"), "Apple Inc"),
        Company::new(symbol("MSFT"), "Microsoft Corp"),
    ];
    let series = bars("AAPL", &[10.0, 11.0, 12.0]);
    TableSink::upsert_companies(&warehouse, "run-1", &companies).expect("companies");
    TableSink::upsert_bars(&warehouse, "run-1", &series).expect("bars");

    // When: The same rows are written again with a renamed company
    let renamed = vec![Company::new(symbol("AAPL"), "Apple Inc.")];
    TableSink::upsert_companies(&warehouse, "run-2", &renamed).expect("companies");
    TableSink::upsert_bars(&warehouse, "run-2", &series).expect("bars");

    // Then: Row counts are unchanged
    assert_eq!(warehouse.row_count(Dataset::Companies).expect("count"), 2);
    assert_eq!(warehouse.row_count(Dataset::Bars).expect("count"), 3);
}

#[test]
fn when_the_same_article_is_found_twice_it_is_stored_once() {
    // Given: A warehouse
    let (_temp, warehouse) = temp_warehouse();

    // When: Two runs store the same article for the same ticker
    let first = vec![article("AAPL", "https://news.test/a", "2024-03-01T10:00:00Z")];
    TableSink::upsert_news(&warehouse, "run-1", &first).expect("news");
    TableSink::upsert_news(&warehouse, "run-2", &first).expect("news");

    // And: A different ticker stores the same link
    let other = vec![article("MSFT", "https://news.test/a", "2024-03-01T10:00:00Z")];
    TableSink::upsert_news(&warehouse, "run-2", &other).expect("news");

    // Then: The article is kept once per ticker
    assert_eq!(warehouse.row_count(Dataset::News).expect("count"), 2);
}

#[test]
fn when_the_warehouse_is_reopened_earlier_runs_are_still_there() {
    // Given: A warehouse with stored companies
    let temp = tempfile::tempdir().expect("tempdir");
    {
        let warehouse = Warehouse::open(WarehouseConfig::at(temp.path())).expect("open");
        let companies = [Company::new(symbol("AAPL"), "Apple Inc")];
        TableSink::upsert_companies(&warehouse, "run-1", &companies).expect("companies");
    }

    // When: The warehouse is opened again from the same home
    let warehouse = Warehouse::open(WarehouseConfig::at(temp.path())).expect("reopen");

    // Then: The rows survive and the database sits under the home directory
    assert_eq!(warehouse.row_count(Dataset::Companies).expect("count"), 1);
    assert!(warehouse.db_path().starts_with(temp.path()));
}

// =============================================================================
// Warehouse: Feeding Later Commands
// =============================================================================

#[test]
fn when_metrics_are_recomputed_from_stored_bars_they_match_the_live_run() {
    // Given: Bars for two symbols stored by a run
    let (_temp, warehouse) = temp_warehouse();
    let closes: Vec<f64> = (0..15).map(|offset| 50.0 + (offset % 4) as f64).collect();
    let mut live = bars("MSFT", &closes);
    live.extend(bars("AAPL", &closes[..11]));
    TableSink::upsert_bars(&warehouse, "run-1", &live).expect("bars");

    // When: Metrics are recomputed from the warehouse
    let stored = load_stored_bars(&warehouse, &[]).expect("load");
    let engine = MetricsEngine::default();

    // Then: The rows equal the ones computed from the live bars
    assert_eq!(stored.len(), live.len());
    let recomputed = engine.compute(&stored);
    assert_eq!(recomputed, engine.compute(&live));
    assert_eq!(recomputed.len(), 2 + 6);

    // And: The rows can be written back
    let written = TableSink::upsert_metrics(&warehouse, "run-2", &recomputed).expect("metrics");
    assert_eq!(written, 8);
    let latest = warehouse.latest_metrics().expect("latest");
    let latest: Vec<(&str, &str)> = latest
        .iter()
        .map(|row| (row.symbol.as_str(), row.date.as_str()))
        .collect();
    assert_eq!(latest, vec![("AAPL", "2024-01-11"), ("MSFT", "2024-01-15")]);
}

#[test]
fn when_stored_bars_are_filtered_only_requested_symbols_load() {
    // Given: Bars for two symbols
    let (_temp, warehouse) = temp_warehouse();
    let mut series = bars("AAPL", &[1.0, 2.0]);
    series.extend(bars("MSFT", &[3.0]));
    TableSink::upsert_bars(&warehouse, "run-1", &series).expect("bars");

    // When: Only MSFT is requested
    let loaded = load_stored_bars(&warehouse, &[String::from("MSFT")]).expect("load");

    // Then: AAPL is left out
    assert_eq!(loaded.len(), 1);
    assert_eq!(loaded[0].symbol.as_str(), "MSFT");
    assert_eq!(loaded[0].date, date!(2024 - 01 - 01));
}

#[test]
fn when_documents_are_stored_the_window_can_be_resolved_later() {
    // Given: Stored news and posts from an earlier run
    let (_temp, warehouse) = temp_warehouse();
    let news = [article("AAPL", "https://news.test/a", "2024-02-03T08:00:00Z")];
    let posts = [
        post("p1", "AAPL", "2024-02-10T23:59:59Z", 0.5),
        post("p2", "AAPL", "2024-01-28T00:00:01Z", -0.1),
    ];
    TableSink::upsert_news(&warehouse, "run-1", &news).expect("news");
    TableSink::upsert_posts(&warehouse, "run-1", &posts).expect("posts");

    // When: The timestamps are read back and resolved
    let (news, posts) = load_document_timestamps(&warehouse).expect("timestamps");
    let window = resolve(news, posts).expect("window");

    // Then: The window spans the stored documents by calendar date
    assert_eq!(window.start(), date!(2024 - 01 - 28));
    assert_eq!(window.end(), date!(2024 - 02 - 10));
}

#[test]
fn when_posts_are_stored_the_sentiment_trend_averages_per_day() {
    // Given: Three posts across two days
    let (_temp, warehouse) = temp_warehouse();
    let posts = [
        post("p1", "AAPL", "2024-02-10T09:00:00Z", 0.6),
        post("p2", "AAPL", "2024-02-10T18:00:00Z", -0.2),
        post("p3", "AAPL", "2024-02-11T12:00:00Z", 0.4),
    ];
    TableSink::upsert_posts(&warehouse, "run-1", &posts).expect("posts");

    // When: The trend is read
    let trend = warehouse.sentiment_trend(Some("AAPL")).expect("trend");

    // Then: Each day has its post count and mean compound score
    assert_eq!(trend.len(), 2);
    assert_eq!(trend[0].date, "2024-02-10");
    assert_eq!(trend[0].post_count, 2);
    assert!((trend[0].avg_compound - 0.2).abs() < 1e-9);
    assert_eq!(trend[1].post_count, 1);
}
