//! Analytic views over the run tables.
//!
//! | View | Rows |
//! |------|------|
//! | `vw_sentiment_trend` | one per symbol and UTC day with posts: post count and mean scores |
//! | `vw_latest_metrics` | the most recent `stock_metrics` row per symbol |

use ::duckdb::Connection;

/// Creates or replaces every view.
///
/// # Errors
/// Returns an error if the view SQL fails to execute.
pub fn create_views(connection: &Connection) -> Result<(), ::duckdb::Error> {
    connection.execute_batch(
        r"
CREATE OR REPLACE VIEW vw_sentiment_trend AS
SELECT
    symbol,
    CAST(created_utc AS DATE) AS date,
    COUNT(*) AS post_count,
    AVG(compound) AS avg_compound,
    AVG(positive) AS avg_positive,
    AVG(negative) AS avg_negative
FROM reddit_posts
GROUP BY symbol, CAST(created_utc AS DATE);

CREATE OR REPLACE VIEW vw_latest_metrics AS
SELECT
    stock_symbol,
    date,
    close,
    moving_average_5,
    moving_average_10,
    daily_return,
    daily_price_change,
    volatility
FROM (
    SELECT
        *,
        ROW_NUMBER() OVER (PARTITION BY stock_symbol ORDER BY date DESC) AS recency
    FROM stock_metrics
)
WHERE recency = 1;
",
    )
}
