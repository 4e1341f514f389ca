use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::sources::{DiscussionSource, RawPost, SentimentScorer};
use crate::stage::{run_ordered, Stage, StageOptions, StageOutput, StageReport};
use crate::throttling::Pacer;
use crate::{is_removed, Company, DiscussionPost, FetchError, UtcDateTime};

/// Pulls discussion posts per company, trying the ticker first and the
/// company name second. The first query that yields a retained post wins;
/// results of different queries are never merged.
pub struct DiscussionFetcher {
    source: Arc<dyn DiscussionSource>,
    scorer: Arc<dyn SentimentScorer>,
    pacer: Pacer,
    result_cap: usize,
}

enum SymbolPosts {
    Found(Vec<DiscussionPost>),
    Nothing,
    AllQueriesFailed,
}

impl DiscussionFetcher {
    pub fn new(
        source: Arc<dyn DiscussionSource>,
        scorer: Arc<dyn SentimentScorer>,
        pacer: Pacer,
        result_cap: usize,
    ) -> Self {
        Self {
            source,
            scorer,
            pacer,
            result_cap,
        }
    }

    pub async fn fetch(
        &self,
        companies: &[Company],
        options: &StageOptions,
    ) -> StageOutput<DiscussionPost> {
        let mut report = StageReport::new(Stage::Discussions);
        let mut items = Vec::new();

        let results = run_ordered(companies, options, |company| self.fetch_company(company)).await;

        for (company, result) in companies.iter().zip(results) {
            match result {
                None => report.record_skipped(),
                Some(SymbolPosts::Found(posts)) => {
                    report.record_success();
                    items.extend(posts);
                }
                Some(SymbolPosts::Nothing) => {
                    report.record_empty();
                    info!(stage = "discussions", symbol = %company.symbol, "no posts");
                }
                Some(SymbolPosts::AllQueriesFailed) => report.record_failure(),
            }
        }

        StageOutput { items, report }
    }

    async fn fetch_company(&self, company: &Company) -> SymbolPosts {
        let mut any_succeeded = false;

        for query in search_terms(company) {
            self.pacer.ready().await;
            match self.source.search(query, self.result_cap).await {
                Ok(raw) => {
                    any_succeeded = true;
                    let posts = self.retain_posts(company, raw);
                    if !posts.is_empty() {
                        debug!(
                            stage = "discussions",
                            symbol = %company.symbol,
                            query,
                            count = posts.len(),
                            "posts retained"
                        );
                        return SymbolPosts::Found(posts);
                    }
                }
                Err(error) => log_failure(company, query, &error),
            }
        }

        if any_succeeded {
            SymbolPosts::Nothing
        } else {
            SymbolPosts::AllQueriesFailed
        }
    }

    fn retain_posts(&self, company: &Company, raw: Vec<RawPost>) -> Vec<DiscussionPost> {
        raw.into_iter()
            .filter(|post| !is_removed(&post.title) && !is_removed(&post.body))
            .filter_map(|post| {
                let created_at = created_at(post.created_utc);
                let Some(created_at) = created_at else {
                    warn!(
                        stage = "discussions",
                        symbol = %company.symbol,
                        post_id = %post.id,
                        "post with invalid creation time dropped"
                    );
                    return None;
                };
                let sentiment = self.scorer.score(&post.body);

                Some(DiscussionPost {
                    post_id: post.id,
                    symbol: company.symbol.clone(),
                    company_name: company.name.clone(),
                    created_at,
                    title: post.title,
                    body: post.body,
                    subreddit: post.subreddit,
                    author: post.author,
                    score: post.score,
                    comment_count: post.comment_count,
                    sentiment,
                })
            })
            .collect()
    }
}

/// Ticker first, then the display name when it adds anything.
fn search_terms(company: &Company) -> Vec<&str> {
    let mut terms = vec![company.symbol.as_str()];
    let name = company.name.trim();
    if !name.is_empty() && !name.eq_ignore_ascii_case(company.symbol.as_str()) {
        terms.push(name);
    }
    terms
}

fn created_at(created_utc: f64) -> Option<UtcDateTime> {
    if !created_utc.is_finite() {
        return None;
    }
    UtcDateTime::from_unix_seconds(created_utc.floor() as i64).ok()
}

fn log_failure(company: &Company, query: &str, error: &FetchError) {
    warn!(
        stage = "discussions",
        source = error.provider(),
        symbol = %company.symbol,
        query,
        status = ?error.status(),
        code = error.code(),
        "discussion query failed: {error}"
    );
}
