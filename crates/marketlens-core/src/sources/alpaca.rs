use serde::Deserialize;

use super::{BarSource, RawBar, SourceFuture};
use crate::client::RateLimitedClient;
use crate::http_client::HttpRequest;
use crate::{AnalysisWindow, Symbol};

pub const ALPACA_DATA_URL: &str = "https://data.alpaca.markets";

/// Free-tier market data feed.
const ALPACA_FEED: &str = "iex";

/// Page size for the single bars request; covers several years of sessions.
const BARS_PAGE_LIMIT: u32 = 10_000;

/// Alpaca market-data daily bars (`/v2/stocks/{symbol}/bars`).
#[derive(Debug, Clone)]
pub struct AlpacaBars {
    client: RateLimitedClient,
    api_key: String,
    secret_key: String,
    base_url: String,
}

impl AlpacaBars {
    pub fn new(
        client: RateLimitedClient,
        api_key: impl Into<String>,
        secret_key: impl Into<String>,
    ) -> Self {
        Self {
            client,
            api_key: api_key.into(),
            secret_key: secret_key.into(),
            base_url: String::from(ALPACA_DATA_URL),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

}

impl BarSource for AlpacaBars {
    fn name(&self) -> &'static str {
        self.client.provider()
    }

    fn daily_bars<'a>(
        &'a self,
        symbol: &'a Symbol,
        window: AnalysisWindow,
    ) -> SourceFuture<'a, Vec<RawBar>> {
        Box::pin(async move {
            let endpoint = format!(
                "{}/v2/stocks/{}/bars",
                self.base_url,
                urlencoding::encode(symbol.as_str())
            );
            let request = HttpRequest::get(endpoint)
                .with_query("timeframe", "1Day")
                .with_query("start", window.start().to_string())
                .with_query("end", window.end().to_string())
                .with_query("limit", BARS_PAGE_LIMIT.to_string())
                .with_query("adjustment", "raw")
                .with_query("feed", ALPACA_FEED)
                .with_header("APCA-API-KEY-ID", &self.api_key)
                .with_header("APCA-API-SECRET-KEY", &self.secret_key);

            let payload: BarsPayload = self.client.call_json(request).await?;

            Ok(payload
                .bars
                .unwrap_or_default()
                .into_iter()
                .map(|bar| RawBar {
                    timestamp: bar.t,
                    open: bar.o,
                    high: bar.h,
                    low: bar.l,
                    close: bar.c,
                    volume: bar.v,
                })
                .collect())
        })
    }
}

#[derive(Debug, Deserialize)]
struct BarsPayload {
    #[serde(default)]
    bars: Option<Vec<BarPayload>>,
}

#[derive(Debug, Deserialize)]
struct BarPayload {
    t: String,
    o: f64,
    h: f64,
    l: f64,
    c: f64,
    #[serde(default)]
    v: u64,
}
