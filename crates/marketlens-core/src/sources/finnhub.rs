use serde::Deserialize;

use super::{ProfileSource, RawProfile, SourceFuture};
use crate::client::RateLimitedClient;
use crate::http_client::HttpRequest;
use crate::Symbol;

pub const FINNHUB_URL: &str = "https://finnhub.io/api/v1";

/// Finnhub company profile lookup (`/stock/profile2`).
///
/// Unknown tickers come back as an empty JSON object, which maps to `Ok(None)`.
#[derive(Debug, Clone)]
pub struct FinnhubProfiles {
    client: RateLimitedClient,
    api_key: String,
    base_url: String,
}

impl FinnhubProfiles {
    pub fn new(client: RateLimitedClient, api_key: impl Into<String>) -> Self {
        Self {
            client,
            api_key: api_key.into(),
            base_url: String::from(FINNHUB_URL),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

impl ProfileSource for FinnhubProfiles {
    fn name(&self) -> &'static str {
        self.client.provider()
    }

    fn profile<'a>(&'a self, symbol: &'a Symbol) -> SourceFuture<'a, Option<RawProfile>> {
        Box::pin(async move {
            let request = HttpRequest::get(format!("{}/stock/profile2", self.base_url))
                .with_query("symbol", symbol.as_str())
                .with_header("X-Finnhub-Token", &self.api_key);

            let payload: FinnhubProfilePayload = self.client.call_json(request).await?;
            let profile = RawProfile {
                name: payload.name,
                exchange: payload.exchange,
                industry: payload.finnhub_industry,
            };

            Ok(profile.display_name().is_some().then_some(profile))
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FinnhubProfilePayload {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    exchange: Option<String>,
    #[serde(default)]
    finnhub_industry: Option<String>,
}
