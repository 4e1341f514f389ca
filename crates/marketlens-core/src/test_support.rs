use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::http_client::{HttpClient, HttpError, HttpRequest, HttpResponse};
use crate::retry::{RetryPolicy, Sleeper};
use crate::RateLimitedClient;

/// Replays queued replies in order and records every request it sees.
#[derive(Default)]
pub(crate) struct ScriptedHttpClient {
    replies: Mutex<VecDeque<Result<HttpResponse, HttpError>>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl ScriptedHttpClient {
    pub(crate) fn new(replies: Vec<Result<HttpResponse, HttpError>>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub(crate) fn json(bodies: &[&str]) -> Arc<Self> {
        Self::new(
            bodies
                .iter()
                .map(|body| Ok(HttpResponse::ok_json(*body)))
                .collect(),
        )
    }

    pub(crate) fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().expect("requests lock").clone()
    }

    pub(crate) fn calls(&self) -> usize {
        self.requests.lock().expect("requests lock").len()
    }
}

impl HttpClient for ScriptedHttpClient {
    fn execute<'a>(
        &'a self,
        request: HttpRequest,
    ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, HttpError>> + Send + 'a>> {
        self.requests.lock().expect("requests lock").push(request);
        let reply = self
            .replies
            .lock()
            .expect("replies lock")
            .pop_front()
            .unwrap_or_else(|| Ok(HttpResponse::new(599, "script exhausted")));
        Box::pin(async move { reply })
    }
}

/// Records requested delays and returns immediately.
#[derive(Default)]
pub(crate) struct RecordingSleeper(Mutex<Vec<Duration>>);

impl RecordingSleeper {
    pub(crate) fn delays(&self) -> Vec<Duration> {
        self.0.lock().expect("sleeper lock").clone()
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep<'a>(&'a self, duration: Duration) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
        self.0.lock().expect("sleeper lock").push(duration);
        Box::pin(async {})
    }
}

/// Client with a single attempt and no real sleeping, for adapter tests.
pub(crate) fn single_shot(provider: &'static str, http: Arc<ScriptedHttpClient>) -> RateLimitedClient {
    RateLimitedClient::new(provider, http, RetryPolicy::no_retry())
        .with_sleeper(Arc::new(RecordingSleeper::default()))
}

/// Interval used by pacing tests. Governor runs on the wall clock, so these
/// tests take real time.
pub(crate) const PACING: Duration = Duration::from_millis(200);

/// Timestamps of every call a fake source receives, in arrival order.
#[derive(Default)]
pub(crate) struct CallClock(Mutex<Vec<Instant>>);

impl CallClock {
    pub(crate) fn tick(&self) {
        self.0.lock().expect("clock lock").push(Instant::now());
    }

    pub(crate) fn calls(&self) -> usize {
        self.0.lock().expect("clock lock").len()
    }

    /// Asserts `expected` calls, each at least [`PACING`] after the previous.
    pub(crate) fn assert_paced(&self, expected: usize) {
        let calls = self.0.lock().expect("clock lock").clone();
        assert_eq!(calls.len(), expected);
        let tolerance = Duration::from_millis(15);
        for pair in calls.windows(2) {
            let gap = pair[1].duration_since(pair[0]);
            assert!(gap + tolerance >= PACING, "calls only {gap:?} apart");
        }
    }
}
