use serde::Deserialize;

use super::{NewsSource, RawArticle, SourceFuture};
use crate::client::RateLimitedClient;
use crate::http_client::HttpRequest;

pub const NEWSAPI_URL: &str = "https://newsapi.org/v2";

/// NewsAPI `everything` search, English articles only.
#[derive(Debug, Clone)]
pub struct NewsApiClient {
    client: RateLimitedClient,
    api_key: String,
    base_url: String,
    language: String,
}

impl NewsApiClient {
    pub fn new(client: RateLimitedClient, api_key: impl Into<String>) -> Self {
        Self {
            client,
            api_key: api_key.into(),
            base_url: String::from(NEWSAPI_URL),
            language: String::from("en"),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

impl NewsSource for NewsApiClient {
    fn name(&self) -> &'static str {
        self.client.provider()
    }

    fn search<'a>(&'a self, query: &'a str, limit: usize) -> SourceFuture<'a, Vec<RawArticle>> {
        Box::pin(async move {
            let request = HttpRequest::get(format!("{}/everything", self.base_url))
                .with_query("q", query)
                .with_query("language", &self.language)
                .with_query("pageSize", limit.to_string())
                .with_header("X-Api-Key", &self.api_key);

            let payload: EverythingPayload = self.client.call_json(request).await?;

            Ok(payload
                .articles
                .into_iter()
                .take(limit)
                .map(|article| RawArticle {
                    title: article.title,
                    description: article.description,
                    url: article.url,
                    published_at: article.published_at,
                    source_name: article.source.and_then(|source| source.name),
                })
                .collect())
        })
    }
}

#[derive(Debug, Deserialize)]
struct EverythingPayload {
    #[serde(default)]
    articles: Vec<ArticlePayload>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ArticlePayload {
    #[serde(default)]
    source: Option<SourcePayload>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    published_at: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SourcePayload {
    #[serde(default)]
    name: Option<String>,
}
