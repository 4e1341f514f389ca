//! Behavior-driven tests for a full run.
//!
//! Every run here goes through the real HTTP adapters and retry wrapper,
//! answered by a routed fake that plays the four upstream providers.

use std::sync::Arc;

use marketlens_core::{HttpError, HttpRequest, HttpResponse, Pipeline, PipelineError, Stage, TableSink, WindowOrigin};
use marketlens_tests::{json, status, temp_warehouse, test_config, RoutedHttpClient};
use marketlens_warehouse::Dataset;
use serde_json::json as body;
use time::macros::date;
use time::{Date, Duration};
use tokio_util::sync::CancellationToken;

/// 2024-03-20T12:00:00Z
const AAPL_POST_CREATED: f64 = 1_710_936_000.0;
/// 2024-03-10T10:00:00Z
const MSFT_POST_CREATED: f64 = 1_710_064_800.0;

fn profile(request: &HttpRequest) -> Result<HttpResponse, HttpError> {
    match request.query_value("symbol") {
        Some("AAPL") => json(r#"{"name":"Apple Inc","exchange":"NASDAQ","finnhubIndustry":"Technology"}"#),
        Some("MSFT") => json(r#"{"name":"Microsoft Corp","exchange":"NASDAQ","finnhubIndustry":"Technology"}"#),
        _ => json("{}"),
    }
}

fn news(request: &HttpRequest) -> Result<HttpResponse, HttpError> {
    let articles = match request.query_value("q") {
        Some("AAPL") => body!([
            {
                "source": { "name": "Reuters" },
                "title": "Apple beats estimates",
                "description": "Services revenue climbs",
                "url": "https://news.test/apple-beats",
                "publishedAt": "2024-03-01T14:00:00Z"
            },
            {
                "source": { "name": "[Removed]" },
                "title": "[Removed]",
                "description": "[Removed]",
                "url": "https://removed.com",
                "publishedAt": "1970-01-01T00:00:00Z"
            }
        ]),
        _ => body!([]),
    };
    json(body!({ "status": "ok", "articles": articles }).to_string())
}

fn listing(posts: serde_json::Value) -> Result<HttpResponse, HttpError> {
    json(body!({ "kind": "Listing", "data": { "children": posts } }).to_string())
}

fn discussions(request: &HttpRequest) -> Result<HttpResponse, HttpError> {
    match request.query_value("q") {
        Some("AAPL") => listing(body!([{
            "kind": "t3",
            "data": {
                "id": "aapl1",
                "created_utc": AAPL_POST_CREATED,
                "title": "AAPL earnings thread",
                "selftext": "strong quarter, bullish on services growth",
                "subreddit": "stocks",
                "author": "holder",
                "score": 42,
                "num_comments": 7
            }
        }])),
        Some("Microsoft Corp") => listing(body!([{
            "kind": "t3",
            "data": {
                "id": "msft1",
                "created_utc": MSFT_POST_CREATED,
                "title": "Microsoft cloud numbers",
                "selftext": "worried about the capex",
                "subreddit": "stocks",
                "author": null,
                "score": 3,
                "num_comments": 1
            }
        }])),
        _ => listing(body!([])),
    }
}

/// Twelve sessions from 2024-03-04 with closes 100, 101, ... 111.
fn rising_bars() -> Result<HttpResponse, HttpError> {
    let first = date!(2024 - 03 - 04);
    let bars: Vec<serde_json::Value> = (0..12)
        .map(|offset| {
            let close = 100.0 + offset as f64;
            body!({
                "t": format!("{}T04:00:00Z", first + Duration::days(offset)),
                "o": close - 0.5,
                "h": close + 1.0,
                "l": close - 1.0,
                "c": close,
                "v": 1_000_000 + offset
            })
        })
        .collect();
    json(body!({ "bars": bars, "symbol": "AAPL", "next_page_token": null }).to_string())
}

fn market(request: &HttpRequest, _previous: usize) -> Result<HttpResponse, HttpError> {
    let url = request.url.as_str();
    if url.contains("/stock/profile2") {
        profile(request)
    } else if url.contains("/everything") {
        news(request)
    } else if url.contains("/access_token") {
        json(r#"{"access_token":"token-1","token_type":"bearer","expires_in":86400}"#)
    } else if url.contains("/search") {
        discussions(request)
    } else if url.contains("/v2/stocks/AAPL/bars") {
        rising_bars()
    } else if url.contains("/bars") {
        json(r#"{"bars":null}"#)
    } else {
        status(404)
    }
}

fn queries(http: &RoutedHttpClient, fragment: &str) -> Vec<String> {
    http.requests_to(fragment)
        .iter()
        .filter_map(|request| request.query_value("q").map(str::to_owned))
        .collect()
}

// =============================================================================
// Pipeline: Full Run
// =============================================================================

#[tokio::test]
async fn when_user_runs_the_pipeline_every_table_reaches_the_warehouse() {
    // Given: Two listed tickers, one unknown ticker and an empty warehouse
    let http = RoutedHttpClient::new(market);
    let (_temp, warehouse) = temp_warehouse();
    let warehouse = Arc::new(warehouse);
    let pipeline = Pipeline::from_config(
        test_config(&["AAPL", "ZZZZ", "MSFT"]),
        http.clone(),
        warehouse.clone(),
    )
    .expect("pipeline wiring");

    // When: The run completes
    let output = pipeline.run().await.expect("run succeeds");

    // Then: The unknown ticker is rejected and the others keep input order
    let symbols: Vec<&str> = output
        .companies
        .iter()
        .map(|company| company.symbol.as_str())
        .collect();
    assert_eq!(symbols, vec!["AAPL", "MSFT"]);
    assert_eq!(output.rejected, vec![String::from("ZZZZ")]);

    // And: Sentinel articles are dropped
    assert_eq!(output.news.len(), 1);
    assert_eq!(output.news[0].url, "https://news.test/apple-beats");

    // And: The window spans the earliest article and the latest post
    assert_eq!(output.window_origin, WindowOrigin::Documents);
    assert_eq!(output.window.start(), date!(2024 - 03 - 01));
    assert_eq!(output.window.end(), date!(2024 - 03 - 20));

    // And: Every table is stored
    assert_eq!(warehouse.row_count(Dataset::Companies).expect("count"), 2);
    assert_eq!(warehouse.row_count(Dataset::News).expect("count"), 1);
    assert_eq!(warehouse.row_count(Dataset::Posts).expect("count"), 2);
    assert_eq!(warehouse.row_count(Dataset::Bars).expect("count"), 12);
    assert_eq!(warehouse.row_count(Dataset::Metrics).expect("count"), 3);
    assert!(!output.cancelled);
}

#[tokio::test]
async fn when_ticker_search_is_quiet_the_company_name_is_searched() {
    // Given: A forum where MSFT is only discussed by company name
    let http = RoutedHttpClient::new(market);
    let pipeline = Pipeline::from_config(
        test_config(&["AAPL", "MSFT"]),
        http.clone(),
        Arc::new(marketlens_core::MemorySink::new()),
    )
    .expect("pipeline wiring");

    // When: The run completes
    let output = pipeline.run().await.expect("run succeeds");

    // Then: AAPL is found by ticker and MSFT by name, with no extra queries
    assert_eq!(queries(&http, "/search"), vec!["AAPL", "MSFT", "Microsoft Corp"]);
    let post_ids: Vec<&str> = output.posts.iter().map(|post| post.post_id.as_str()).collect();
    assert_eq!(post_ids, vec!["aapl1", "msft1"]);
    assert_eq!(output.posts[1].company_name, "Microsoft Corp");

    // And: The application token is requested once for the whole run
    assert_eq!(http.requests_to("/access_token").len(), 1);

    // And: Bullish text scores above worried text
    assert!(output.posts[0].sentiment.compound > output.posts[1].sentiment.compound);
}

#[tokio::test]
async fn when_bars_arrive_metrics_start_on_the_tenth_session() {
    // Given: Twelve rising sessions for AAPL and none for MSFT
    let http = RoutedHttpClient::new(market);
    let pipeline = Pipeline::from_config(
        test_config(&["AAPL", "MSFT"]),
        http.clone(),
        Arc::new(marketlens_core::MemorySink::new()),
    )
    .expect("pipeline wiring");

    // When: The run completes
    let output = pipeline.run().await.expect("run succeeds");

    // Then: Bars are requested across the resolved window
    let bar_requests = http.requests_to("/bars");
    assert_eq!(bar_requests.len(), 2);
    assert_eq!(bar_requests[0].query_value("start"), Some("2024-03-01"));
    assert_eq!(bar_requests[0].query_value("end"), Some("2024-03-20"));
    assert_eq!(bar_requests[0].query_value("timeframe"), Some("1Day"));

    // And: Only fully defined rows are kept
    assert_eq!(output.bars.len(), 12);
    let dates: Vec<Date> = output.metrics.iter().map(|row| row.date).collect();
    assert_eq!(
        dates,
        vec![date!(2024 - 03 - 13), date!(2024 - 03 - 14), date!(2024 - 03 - 15)]
    );

    let last = output.metrics.last().expect("last row");
    assert!((last.close - 111.0).abs() < 1e-9);
    assert!((last.moving_average_5 - 109.0).abs() < 1e-9);
    assert!((last.moving_average_10 - 106.5).abs() < 1e-9);
    assert!((last.daily_price_change - 1.0).abs() < 1e-9);
    assert!((last.daily_return - 100.0 / 110.0).abs() < 1e-9);

    // And: The empty symbol is reported as empty, not failed
    let bars = output.report(Stage::Bars).expect("bars report");
    assert_eq!((bars.succeeded, bars.empty, bars.failed), (1, 1, 0));
}

// =============================================================================
// Pipeline: Degraded Upstreams
// =============================================================================

#[tokio::test]
async fn when_news_is_throttled_the_run_retries_and_keeps_the_articles() {
    // Given: A news provider that throttles the first request
    let http = RoutedHttpClient::new(|request: &HttpRequest, previous| {
        if request.url.contains("/everything") && previous == 0 {
            return status(429);
        }
        market(request, previous)
    });
    let pipeline = Pipeline::from_config(
        test_config(&["AAPL"]),
        http.clone(),
        Arc::new(marketlens_core::MemorySink::new()),
    )
    .expect("pipeline wiring");

    // When: The run completes
    let output = pipeline.run().await.expect("run succeeds");

    // Then: The throttled call was repeated and its result kept
    assert_eq!(http.requests_to("/everything").len(), 2);
    assert_eq!(output.news.len(), 1);
    let news = output.report(Stage::News).expect("news report");
    assert_eq!((news.succeeded, news.failed), (1, 0));
}

#[tokio::test]
async fn when_one_symbol_fails_other_symbols_keep_their_rows() {
    // Given: A bar provider that errors for MSFT only
    let http = RoutedHttpClient::new(|request: &HttpRequest, previous| {
        if request.url.contains("/v2/stocks/MSFT/bars") {
            return status(503);
        }
        market(request, previous)
    });
    let pipeline = Pipeline::from_config(
        test_config(&["AAPL", "MSFT"]),
        http.clone(),
        Arc::new(marketlens_core::MemorySink::new()),
    )
    .expect("pipeline wiring");

    // When: The run completes
    let output = pipeline.run().await.expect("run succeeds");

    // Then: The server error is not retried and AAPL is unaffected
    assert_eq!(http.requests_to("/v2/stocks/MSFT/bars").len(), 1);
    assert_eq!(output.bars.len(), 12);
    assert_eq!(output.metrics.len(), 3);
    let bars = output.report(Stage::Bars).expect("bars report");
    assert_eq!((bars.succeeded, bars.failed), (1, 1));
}

#[tokio::test]
async fn when_every_profile_lookup_fails_nothing_is_written() {
    // Given: A fundamentals provider rejecting the API key
    let http = RoutedHttpClient::new(|request: &HttpRequest, previous| {
        if request.url.contains("/stock/profile2") {
            return status(401);
        }
        market(request, previous)
    });
    let (_temp, warehouse) = temp_warehouse();
    let warehouse = Arc::new(warehouse);
    let pipeline = Pipeline::from_config(
        test_config(&["AAPL", "MSFT"]),
        http.clone(),
        warehouse.clone(),
    )
    .expect("pipeline wiring");

    // When: The run is attempted
    let error = pipeline.run().await.expect_err("validation exhausted");

    // Then: The run stops before any other source is contacted
    assert_eq!(error.code(), "pipeline.source_exhausted");
    assert!(matches!(
        error,
        PipelineError::SourceExhausted {
            stage: Stage::Validate,
            failed: 2
        }
    ));
    assert!(http.requests_to("/everything").is_empty());
    assert_eq!(warehouse.row_count(Dataset::Companies).expect("count"), 0);
}

#[tokio::test]
async fn when_documents_are_missing_a_trailing_year_is_used() {
    // Given: Providers with no news and no posts
    let http = RoutedHttpClient::new(|request: &HttpRequest, previous| {
        if request.url.contains("/everything") {
            return json(r#"{"status":"ok","articles":[]}"#);
        }
        if request.url.contains("/search") {
            return listing(body!([]));
        }
        market(request, previous)
    });
    let pipeline = Pipeline::from_config(
        test_config(&["AAPL"]),
        http.clone(),
        Arc::new(marketlens_core::MemorySink::new()),
    )
    .expect("pipeline wiring")
    .with_today(date!(2024 - 06 - 30));

    // When: The run completes
    let output = pipeline.run().await.expect("run succeeds");

    // Then: Bars cover the 365 days ending today
    assert_eq!(output.window_origin, WindowOrigin::Fallback);
    let bar_requests = http.requests_to("/bars");
    assert_eq!(bar_requests[0].query_value("start"), Some("2023-07-01"));
    assert_eq!(bar_requests[0].query_value("end"), Some("2024-06-30"));
}

#[tokio::test]
async fn when_run_is_cancelled_before_start_no_source_is_called() {
    // Given: A cancelled token
    let http = RoutedHttpClient::new(market);
    let cancel = CancellationToken::new();
    cancel.cancel();
    let sink = Arc::new(marketlens_core::MemorySink::new());
    let pipeline = Pipeline::from_config(test_config(&["AAPL", "MSFT"]), http.clone(), sink.clone())
        .expect("pipeline wiring")
        .with_cancel(cancel);

    // When: The run is started
    let output = pipeline.run().await.expect("cancelled runs still report");

    // Then: Every symbol is skipped and no request leaves the process
    assert!(output.cancelled);
    assert!(http.requests().is_empty());
    assert_eq!(output.report(Stage::Validate).map(|report| report.skipped), Some(2));
    assert_eq!(sink.snapshot().batches, 0);
    assert_eq!(sink.name(), "memory");
}
