use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, info, warn};

use crate::sources::ProfileSource;
use crate::stage::{run_ordered, Stage, StageOptions, StageReport};
use crate::throttling::Pacer;
use crate::{Company, FetchError, Symbol};

/// Result of validating a batch of proposed tickers.
#[derive(Debug, Clone, PartialEq)]
pub struct Validation {
    /// Confirmed companies, in input order.
    pub validated: Vec<Company>,
    /// Inputs that did not validate, in input order.
    pub rejected: Vec<String>,
    pub report: StageReport,
}

/// Confirms tickers against the fundamentals source and attaches display names.
///
/// Each symbol is looked up at most once per validator; later calls reuse the
/// earlier verdict, so a rejected ticker is never retried within a run.
pub struct SymbolValidator {
    source: Arc<dyn ProfileSource>,
    pacer: Pacer,
    verdicts: Mutex<HashMap<Symbol, Option<Company>>>,
}

enum Lookup {
    Cached(Option<Company>),
    Fetched(Result<Option<Company>, FetchError>),
}

impl SymbolValidator {
    pub fn new(source: Arc<dyn ProfileSource>, pacer: Pacer) -> Self {
        Self {
            source,
            pacer,
            verdicts: Mutex::new(HashMap::new()),
        }
    }

    pub async fn validate<S>(&self, symbols: &[S], options: &StageOptions) -> Validation
    where
        S: AsRef<str>,
    {
        let mut report = StageReport::new(Stage::Validate);
        let mut rejected = Vec::new();
        let mut seen = HashSet::new();
        let mut candidates = Vec::new();

        for input in symbols {
            let input = input.as_ref();
            match Symbol::parse(input) {
                Ok(symbol) => {
                    if seen.insert(symbol.clone()) {
                        candidates.push(symbol);
                    } else {
                        debug!(stage = "validate", symbol = %symbol, "duplicate ticker dropped");
                    }
                }
                Err(error) => {
                    warn!(stage = "validate", input, "malformed ticker rejected: {error}");
                    rejected.push(input.to_owned());
                }
            }
        }

        let lookups = run_ordered(candidates.iter(), options, |symbol| self.lookup(symbol)).await;

        let mut validated = Vec::new();
        for (symbol, lookup) in candidates.iter().zip(lookups) {
            let verdict = match lookup {
                None => {
                    report.record_skipped();
                    continue;
                }
                Some(Lookup::Cached(verdict)) => verdict,
                Some(Lookup::Fetched(Ok(verdict))) => {
                    match verdict {
                        Some(_) => report.record_success(),
                        None => report.record_empty(),
                    }
                    verdict
                }
                Some(Lookup::Fetched(Err(error))) => {
                    report.record_failure();
                    warn!(
                        stage = "validate",
                        source = error.provider(),
                        symbol = %symbol,
                        status = ?error.status(),
                        code = error.code(),
                        "symbol rejected: {error}"
                    );
                    None
                }
            };

            match verdict {
                Some(company) => validated.push(company),
                None => rejected.push(symbol.to_string()),
            }
        }

        info!(
            stage = "validate",
            validated = validated.len(),
            rejected = rejected.len(),
            "validation finished"
        );

        Validation {
            validated,
            rejected,
            report,
        }
    }

    async fn lookup(&self, symbol: &Symbol) -> Lookup {
        if let Some(verdict) = self.cached(symbol) {
            return Lookup::Cached(verdict);
        }

        self.pacer.ready().await;
        let result = self.source.profile(symbol).await.map(|profile| {
            profile.and_then(|profile| {
                profile
                    .display_name()
                    .map(|name| Company::new(symbol.clone(), name))
            })
        });

        match &result {
            Ok(Some(company)) => {
                debug!(stage = "validate", symbol = %symbol, name = %company.name, "symbol validated")
            }
            Ok(None) => info!(stage = "validate", symbol = %symbol, "unknown ticker"),
            Err(_) => {}
        }

        let verdict = result.as_ref().ok().cloned().flatten();
        self.verdicts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(symbol.clone(), verdict);

        Lookup::Fetched(result)
    }

    fn cached(&self, symbol: &Symbol) -> Option<Option<Company>> {
        self.verdicts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(symbol)
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::sources::{RawProfile, SourceFuture};
    use crate::test_support::{CallClock, PACING};

    struct Directory {
        calls: AtomicUsize,
        clock: CallClock,
    }

    impl ProfileSource for Directory {
        fn name(&self) -> &'static str {
            "directory"
        }

        fn profile<'a>(&'a self, symbol: &'a Symbol) -> SourceFuture<'a, Option<RawProfile>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.clock.tick();
            Box::pin(async move {
                match symbol.as_str() {
                    "AAPL" => Ok(Some(RawProfile {
                        name: Some(String::from("Apple Inc")),
                        ..RawProfile::default()
                    })),
                    "MSFT" => Ok(Some(RawProfile {
                        name: Some(String::from("Microsoft Corp")),
                        ..RawProfile::default()
                    })),
                    "BLNK" => Ok(Some(RawProfile {
                        name: Some(String::new()),
                        ..RawProfile::default()
                    })),
                    "FAIL" => Err(FetchError::UpstreamRejected {
                        provider: "directory",
                        status: 500,
                    }),
                    _ => Ok(None),
                }
            })
        }
    }

    fn paced_validator(pacer: Pacer) -> (SymbolValidator, Arc<Directory>) {
        let source = Arc::new(Directory {
            calls: AtomicUsize::new(0),
            clock: CallClock::default(),
        });
        (SymbolValidator::new(source.clone(), pacer), source)
    }

    fn validator() -> (SymbolValidator, Arc<Directory>) {
        paced_validator(Pacer::disabled())
    }

    #[tokio::test]
    async fn keeps_input_order_of_validated_subset() {
        let (validator, _) = validator();

        let outcome = validator
            .validate(
                &["MSFT", "ZZZZ", "aapl", "FAIL", "BLNK"],
                &StageOptions::default(),
            )
            .await;

        let names: Vec<_> = outcome
            .validated
            .iter()
            .map(|company| company.symbol.as_str())
            .collect();
        assert_eq!(names, vec!["MSFT", "AAPL"]);
        assert_eq!(outcome.rejected, vec!["ZZZZ", "FAIL", "BLNK"]);
        assert_eq!(outcome.report.succeeded, 2);
        assert_eq!(outcome.report.empty, 2);
        assert_eq!(outcome.report.failed, 1);
    }

    #[tokio::test]
    async fn malformed_and_duplicate_tickers_never_reach_the_source() {
        let (validator, source) = validator();

        let outcome = validator
            .validate(&["AAPL", "$$$", " aapl "], &StageOptions::default())
            .await;

        assert_eq!(outcome.validated.len(), 1);
        assert_eq!(outcome.rejected, vec!["$$$"]);
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn verdicts_are_reused_across_calls() {
        let (validator, source) = validator();
        let options = StageOptions::default();

        let first = validator.validate(&["AAPL", "ZZZZ"], &options).await;
        let second = validator.validate(&["ZZZZ", "AAPL"], &options).await;

        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
        assert_eq!(first.validated, second.validated);
        assert_eq!(second.rejected, vec!["ZZZZ"]);
        assert_eq!(second.report.attempted, 0);
    }

    #[tokio::test]
    async fn every_lookup_failing_exhausts_the_stage() {
        let (validator, _) = validator();

        let outcome = validator
            .validate(&["FAIL"], &StageOptions::default())
            .await;

        assert!(outcome.validated.is_empty());
        assert!(outcome.report.is_exhausted());
    }

    #[tokio::test]
    async fn concurrent_lookups_still_wait_for_the_pacer() {
        let (validator, source) = paced_validator(Pacer::new(PACING));
        let options = StageOptions::default().with_concurrency(3);

        let outcome = validator.validate(&["AAPL", "MSFT", "ZZZZ"], &options).await;

        assert_eq!(outcome.validated.len(), 2);
        source.clock.assert_paced(3);
    }
}
