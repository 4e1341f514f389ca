use serde::Deserialize;
use tokio::sync::OnceCell;
use tracing::debug;

use super::{DiscussionSource, RawPost, SourceFuture};
use crate::client::RateLimitedClient;
use crate::http_client::{HttpAuth, HttpRequest};
use crate::FetchError;

pub const REDDIT_AUTH_URL: &str = "https://www.reddit.com/api/v1/access_token";
pub const REDDIT_API_URL: &str = "https://oauth.reddit.com";

/// Script-app credentials for the application-only OAuth flow.
#[derive(Clone, PartialEq, Eq)]
pub struct RedditCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub user_agent: String,
}

impl std::fmt::Debug for RedditCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedditCredentials")
            .field("client_id", &self.client_id)
            .field("user_agent", &self.user_agent)
            .finish_non_exhaustive()
    }
}

/// Subreddit search. The bearer token is fetched on first use and reused for
/// every later query made through the same client.
#[derive(Debug)]
pub struct RedditClient {
    client: RateLimitedClient,
    credentials: RedditCredentials,
    subreddit: String,
    auth_url: String,
    api_url: String,
    token: OnceCell<String>,
}

impl RedditClient {
    pub fn new(client: RateLimitedClient, credentials: RedditCredentials) -> Self {
        Self {
            client,
            credentials,
            subreddit: String::from("stocks"),
            auth_url: String::from(REDDIT_AUTH_URL),
            api_url: String::from(REDDIT_API_URL),
            token: OnceCell::new(),
        }
    }

    pub fn with_subreddit(mut self, subreddit: impl Into<String>) -> Self {
        self.subreddit = subreddit.into();
        self
    }

    pub fn with_urls(mut self, auth_url: impl Into<String>, api_url: impl Into<String>) -> Self {
        self.auth_url = auth_url.into();
        self.api_url = api_url.into();
        self
    }

    async fn access_token(&self) -> Result<&str, FetchError> {
        let token = self
            .token
            .get_or_try_init(|| async {
                let request = HttpRequest::post(&self.auth_url)
                    .with_auth(&HttpAuth::Basic {
                        username: self.credentials.client_id.clone(),
                        password: self.credentials.client_secret.clone(),
                    })
                    .with_header("User-Agent", &self.credentials.user_agent)
                    .with_header("Content-Type", "application/x-www-form-urlencoded")
                    .with_body("grant_type=client_credentials");

                let payload: TokenPayload = self.client.call_json(request).await?;
                debug!(source = self.client.provider(), "obtained application token");
                Ok::<_, FetchError>(payload.access_token)
            })
            .await?;
        Ok(token.as_str())
    }
}

impl DiscussionSource for RedditClient {
    fn name(&self) -> &'static str {
        self.client.provider()
    }

    fn search<'a>(&'a self, query: &'a str, limit: usize) -> SourceFuture<'a, Vec<RawPost>> {
        Box::pin(async move {
            let token = self.access_token().await?;
            let url = format!(
                "{}/r/{}/search",
                self.api_url,
                urlencoding::encode(&self.subreddit)
            );
            let request = HttpRequest::get(url)
                .with_query("q", query)
                .with_query("restrict_sr", "1")
                .with_query("sort", "relevance")
                .with_query("limit", limit.to_string())
                .with_query("raw_json", "1")
                .with_auth(&HttpAuth::BearerToken(token.to_owned()))
                .with_header("User-Agent", &self.credentials.user_agent);

            let listing: ListingPayload = self.client.call_json(request).await?;

            Ok(listing
                .data
                .children
                .into_iter()
                .take(limit)
                .map(|child| {
                    let post = child.data;
                    RawPost {
                        id: post.id,
                        created_utc: post.created_utc,
                        title: post.title,
                        body: post.selftext,
                        subreddit: post.subreddit,
                        author: post.author,
                        score: post.score,
                        comment_count: post.num_comments,
                    }
                })
                .collect())
        })
    }
}

#[derive(Debug, Deserialize)]
struct TokenPayload {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct ListingPayload {
    data: ListingData,
}

#[derive(Debug, Deserialize)]
struct ListingData {
    #[serde(default)]
    children: Vec<ListingChild>,
}

#[derive(Debug, Deserialize)]
struct ListingChild {
    data: PostPayload,
}

#[derive(Debug, Deserialize)]
struct PostPayload {
    id: String,
    created_utc: f64,
    #[serde(default)]
    title: String,
    #[serde(default)]
    selftext: String,
    #[serde(default)]
    subreddit: String,
    #[serde(default)]
    author: Option<String>,
    #[serde(default)]
    score: i64,
    #[serde(default)]
    num_comments: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{single_shot, ScriptedHttpClient};

    const TOKEN: &str = r#"{"access_token":"tok-1","token_type":"bearer","expires_in":86400}"#;
    const LISTING: &str = r#"{"kind":"Listing","data":{"children":[
        {"kind":"t3","data":{"id":"abc1","created_utc":1704463200.0,"title":"AAPL earnings",
         "selftext":"Great quarter","subreddit":"stocks","author":"trader1","score":42,"num_comments":7}}
    ]}}"#;

    fn credentials() -> RedditCredentials {
        RedditCredentials {
            client_id: String::from("cid"),
            client_secret: String::from("hunter2"),
            user_agent: String::from("marketlens-test/0.1"),
        }
    }

    #[tokio::test]
    async fn token_is_requested_once_and_reused() {
        let http = ScriptedHttpClient::json(&[TOKEN, LISTING, LISTING]);
        let reddit = RedditClient::new(single_shot("reddit", http.clone()), credentials())
            .with_urls("https://auth.test/token", "https://api.test");

        let first = reddit.search("AAPL", 5).await.expect("first search");
        let second = reddit.search("Apple Inc", 5).await.expect("second search");

        assert_eq!(first.len(), 1);
        assert_eq!(second.len(), 1);
        assert_eq!(first[0].id, "abc1");
        assert_eq!(first[0].comment_count, 7);

        let requests = http.requests();
        assert_eq!(requests.len(), 3);
        assert_eq!(requests[0].url, "https://auth.test/token");
        assert_eq!(
            requests[0].basic_auth,
            Some((String::from("cid"), String::from("hunter2")))
        );
        assert_eq!(requests[1].url, "https://api.test/r/stocks/search");
        assert_eq!(requests[1].query_value("q"), Some("AAPL"));
        assert_eq!(requests[1].query_value("limit"), Some("5"));
        assert_eq!(
            requests[2].headers.get("authorization").map(String::as_str),
            Some("Bearer tok-1")
        );
    }

    #[tokio::test]
    async fn rejected_token_request_surfaces_status() {
        let http = ScriptedHttpClient::new(vec![Ok(crate::http_client::HttpResponse::new(
            401, "",
        ))]);
        let reddit = RedditClient::new(single_shot("reddit", http), credentials());

        let err = reddit.search("AAPL", 5).await.expect_err("auth fails");

        assert_eq!(err.status(), Some(401));
    }

    #[test]
    fn debug_output_hides_the_secret() {
        let rendered = format!("{:?}", credentials());
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("cid"));
    }
}
