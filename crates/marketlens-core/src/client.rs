use std::sync::Arc;

use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::http_client::{HttpClient, HttpRequest, HttpResponse};
use crate::retry::{RetryPolicy, Sleeper, TokioSleeper};
use crate::FetchError;

/// HTTP wrapper that retries throttled calls with exponential backoff.
///
/// Only throttle statuses are retried. Any other non-2xx status and every
/// transport fault is returned to the caller on the first occurrence.
#[derive(Clone)]
pub struct RateLimitedClient {
    provider: &'static str,
    http: Arc<dyn HttpClient>,
    policy: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
}

impl RateLimitedClient {
    pub fn new(provider: &'static str, http: Arc<dyn HttpClient>, policy: RetryPolicy) -> Self {
        Self {
            provider,
            http,
            policy,
            sleeper: Arc::new(TokioSleeper),
        }
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub const fn provider(&self) -> &'static str {
        self.provider
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub async fn call(&self, request: HttpRequest) -> Result<HttpResponse, FetchError> {
        let mut attempt: u32 = 1;

        loop {
            let response = match self.http.execute(request.clone()).await {
                Ok(response) => response,
                Err(error) => {
                    warn!(
                        source = self.provider,
                        fault = ?error.kind(),
                        attempt,
                        "transport fault: {}",
                        error.message()
                    );
                    return Err(FetchError::TransportFault {
                        provider: self.provider,
                        message: error.message().to_owned(),
                    });
                }
            };

            if response.is_success() {
                debug!(source = self.provider, status = response.status, attempt, "call succeeded");
                return Ok(response);
            }

            if !self.policy.is_throttle(response.status) {
                warn!(
                    source = self.provider,
                    status = response.status,
                    attempt,
                    "upstream rejected request"
                );
                return Err(FetchError::UpstreamRejected {
                    provider: self.provider,
                    status: response.status,
                });
            }

            let Some(delay) = self.policy.delay_after_attempt(attempt) else {
                warn!(
                    source = self.provider,
                    status = response.status,
                    attempt,
                    "throttled, attempt ceiling reached"
                );
                return Err(FetchError::Throttled {
                    provider: self.provider,
                    attempts: attempt,
                });
            };

            warn!(
                source = self.provider,
                status = response.status,
                attempt,
                delay_ms = delay.as_millis() as u64,
                "throttled, backing off"
            );
            self.sleeper.sleep(delay).await;
            attempt += 1;
        }
    }

    /// [`RateLimitedClient::call`] followed by decoding the body as JSON.
    pub async fn call_json<T>(&self, request: HttpRequest) -> Result<T, FetchError>
    where
        T: DeserializeOwned,
    {
        let response = self.call(request).await?;
        serde_json::from_str(&response.body).map_err(|error| {
            warn!(source = self.provider, "undecodable body: {error}");
            FetchError::decode(self.provider, error)
        })
    }
}

impl std::fmt::Debug for RateLimitedClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimitedClient")
            .field("provider", &self.provider)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}
