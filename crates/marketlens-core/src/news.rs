use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::sources::{NewsSource, RawArticle};
use crate::stage::{run_ordered, Stage, StageOptions, StageOutput, StageReport};
use crate::throttling::Pacer;
use crate::{is_removed, Company, NewsArticle, Symbol, UtcDateTime};

/// Pulls recent news for each validated company, one query per ticker.
pub struct NewsFetcher {
    source: Arc<dyn NewsSource>,
    pacer: Pacer,
    result_cap: usize,
}

impl NewsFetcher {
    pub fn new(source: Arc<dyn NewsSource>, pacer: Pacer, result_cap: usize) -> Self {
        Self {
            source,
            pacer,
            result_cap,
        }
    }

    pub async fn fetch(&self, companies: &[Company], options: &StageOptions) -> StageOutput<NewsArticle> {
        let mut report = StageReport::new(Stage::News);
        let mut items = Vec::new();

        let results = run_ordered(companies, options, |company| async move {
            self.pacer.ready().await;
            self.source
                .search(company.symbol.as_str(), self.result_cap)
                .await
        })
        .await;

        for (company, result) in companies.iter().zip(results) {
            match result {
                None => report.record_skipped(),
                Some(Err(error)) => {
                    report.record_failure();
                    warn!(
                        stage = "news",
                        source = error.provider(),
                        symbol = %company.symbol,
                        status = ?error.status(),
                        code = error.code(),
                        "news fetch failed: {error}"
                    );
                }
                Some(Ok(raw)) => {
                    let retained = retain_articles(&company.symbol, raw);
                    if retained.is_empty() {
                        report.record_empty();
                        info!(stage = "news", symbol = %company.symbol, "no articles");
                    } else {
                        report.record_success();
                        debug!(stage = "news", symbol = %company.symbol, count = retained.len(), "articles retained");
                    }
                    items.extend(retained);
                }
            }
        }

        StageOutput { items, report }
    }
}

/// Drops sentinel, keyless and undated articles, converting the rest.
pub fn retain_articles(symbol: &Symbol, raw: Vec<RawArticle>) -> Vec<NewsArticle> {
    raw.into_iter()
        .filter(|article| !has_sentinel(article))
        .filter_map(|article| {
            let Some(url) = article.url.filter(|url| !url.trim().is_empty()) else {
                debug!(stage = "news", symbol = %symbol, "article without url dropped");
                return None;
            };
            let published_at = article
                .published_at
                .as_deref()
                .and_then(UtcDateTime::parse_lenient);
            let Some(published_at) = published_at else {
                warn!(stage = "news", symbol = %symbol, url = %url, "article with unparseable timestamp dropped");
                return None;
            };

            Some(NewsArticle {
                symbol: symbol.clone(),
                title: article.title.unwrap_or_default(),
                description: article.description,
                url,
                published_at,
                source_name: article.source_name,
            })
        })
        .collect()
}

fn has_sentinel(article: &RawArticle) -> bool {
    [
        &article.title,
        &article.description,
        &article.url,
        &article.published_at,
    ]
    .into_iter()
    .flatten()
    .any(|value| is_removed(value))
}
