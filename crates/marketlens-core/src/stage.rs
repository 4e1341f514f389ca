use std::fmt::{Display, Formatter};
use std::future::Future;

use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

/// Named step of a run, used in log fields and reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Validate,
    News,
    Discussions,
    Bars,
    Metrics,
}

impl Stage {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Validate => "validate",
            Self::News => "news",
            Self::Discussions => "discussions",
            Self::Bars => "bars",
            Self::Metrics => "metrics",
        }
    }
}

impl Display for Stage {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-unit tally for one stage. A unit is one symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageReport {
    pub stage: Stage,
    pub attempted: usize,
    pub succeeded: usize,
    pub empty: usize,
    pub failed: usize,
    /// Units not started because the run was cancelled.
    pub skipped: usize,
}

impl StageReport {
    pub const fn new(stage: Stage) -> Self {
        Self {
            stage,
            attempted: 0,
            succeeded: 0,
            empty: 0,
            failed: 0,
            skipped: 0,
        }
    }

    pub fn record_success(&mut self) {
        self.attempted += 1;
        self.succeeded += 1;
    }

    pub fn record_empty(&mut self) {
        self.attempted += 1;
        self.empty += 1;
    }

    pub fn record_failure(&mut self) {
        self.attempted += 1;
        self.failed += 1;
    }

    pub fn record_skipped(&mut self) {
        self.skipped += 1;
    }

    /// Every attempted unit failed with an error. An empty stage is not exhausted.
    pub const fn is_exhausted(&self) -> bool {
        self.attempted > 0 && self.failed == self.attempted
    }
}

/// Items produced by a stage together with its report.
#[derive(Debug, Clone, PartialEq)]
pub struct StageOutput<T> {
    pub items: Vec<T>,
    pub report: StageReport,
}

impl<T> StageOutput<T> {
    pub fn empty(stage: Stage) -> Self {
        Self {
            items: Vec::new(),
            report: StageReport::new(stage),
        }
    }
}

/// Execution knobs shared by every per-symbol stage.
#[derive(Debug, Clone)]
pub struct StageOptions {
    /// Units in flight at once. Output order never depends on it.
    pub concurrency: usize,
    pub cancel: CancellationToken,
}

impl Default for StageOptions {
    fn default() -> Self {
        Self {
            concurrency: 1,
            cancel: CancellationToken::new(),
        }
    }
}

impl StageOptions {
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}

/// Runs `unit` over every input with bounded concurrency, preserving input
/// order. Units that have not started when the token is cancelled yield `None`.
pub(crate) async fn run_ordered<I, F, Fut>(
    inputs: I,
    options: &StageOptions,
    mut unit: F,
) -> Vec<Option<Fut::Output>>
where
    I: IntoIterator,
    F: FnMut(I::Item) -> Fut,
    Fut: Future,
{
    stream::iter(inputs)
        .map(|input| {
            let cancel = options.cancel.clone();
            let work = unit(input);
            async move {
                if cancel.is_cancelled() {
                    None
                } else {
                    Some(work.await)
                }
            }
        })
        .buffered(options.concurrency.max(1))
        .collect()
        .await
}
