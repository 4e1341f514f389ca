use std::collections::BTreeMap;
use std::sync::Arc;

use time::Date;
use tracing::{debug, info, warn};

use crate::sources::{BarSource, RawBar};
use crate::stage::{run_ordered, Stage, StageOptions, StageOutput, StageReport};
use crate::throttling::Pacer;
use crate::{AnalysisWindow, Bar, Company, Symbol, UtcDateTime};

/// Retrieves daily bars per company across one window, one request each.
pub struct BarsFetcher {
    source: Arc<dyn BarSource>,
    pacer: Pacer,
}

impl BarsFetcher {
    pub fn new(source: Arc<dyn BarSource>, pacer: Pacer) -> Self {
        Self { source, pacer }
    }

    /// Concatenated per-symbol bars in company order. A symbol whose request
    /// fails contributes nothing and never removes another symbol's bars.
    pub async fn fetch(
        &self,
        companies: &[Company],
        window: AnalysisWindow,
        options: &StageOptions,
    ) -> StageOutput<Bar> {
        let mut report = StageReport::new(Stage::Bars);
        let mut items = Vec::new();

        let results = run_ordered(companies, options, |company| async move {
            self.pacer.ready().await;
            self.source.daily_bars(&company.symbol, window).await
        })
        .await;

        for (company, result) in companies.iter().zip(results) {
            match result {
                None => report.record_skipped(),
                Some(Err(error)) => {
                    report.record_failure();
                    warn!(
                        stage = "bars",
                        source = error.provider(),
                        symbol = %company.symbol,
                        status = ?error.status(),
                        code = error.code(),
                        "bar fetch failed: {error}"
                    );
                }
                Some(Ok(raw)) => {
                    let bars = normalize_bars(&company.symbol, raw);
                    if bars.is_empty() {
                        report.record_empty();
                        info!(stage = "bars", symbol = %company.symbol, %window, "no bars in window");
                    } else {
                        report.record_success();
                        debug!(stage = "bars", symbol = %company.symbol, count = bars.len(), "bars fetched");
                    }
                    items.extend(bars);
                }
            }
        }

        StageOutput { items, report }
    }
}

/// Validates raw bars into at most one bar per date, ascending. When a date
/// repeats, the later bar replaces the earlier one.
pub fn normalize_bars(symbol: &Symbol, raw: Vec<RawBar>) -> Vec<Bar> {
    let mut by_date: BTreeMap<Date, Bar> = BTreeMap::new();

    for bar in raw {
        let Some(date) = UtcDateTime::parse_lenient(&bar.timestamp).map(UtcDateTime::date) else {
            warn!(stage = "bars", symbol = %symbol, timestamp = %bar.timestamp, "bar with unparseable timestamp dropped");
            continue;
        };

        match Bar::new(
            symbol.clone(),
            date,
            bar.open,
            bar.high,
            bar.low,
            bar.close,
            bar.volume,
        ) {
            Ok(valid) => {
                if by_date.insert(date, valid).is_some() {
                    warn!(stage = "bars", symbol = %symbol, %date, "duplicate bar date, keeping the later bar");
                }
            }
            Err(error) => {
                warn!(stage = "bars", symbol = %symbol, %date, "invalid bar dropped: {error}");
            }
        }
    }

    by_date.into_values().collect()
}

#[cfg(test)]
mod tests {
    use time::macros::date;

    use super::*;
    use crate::sources::SourceFuture;
    use crate::test_support::{CallClock, PACING};
    use crate::FetchError;

    fn raw(timestamp: &str, close: f64) -> RawBar {
        RawBar {
            timestamp: timestamp.to_owned(),
            open: close,
            high: close + 1.0,
            low: close - 1.0,
            close,
            volume: 1_000,
        }
    }

    #[test]
    fn bars_are_sorted_and_deduplicated_by_date() {
        let symbol = Symbol::parse("AAPL").expect("symbol");

        let bars = normalize_bars(
            &symbol,
            vec![
                raw("2024-01-03T05:00:00Z", 102.0),
                raw("2024-01-02T05:00:00Z", 100.0),
                raw("2024-01-03T21:00:00Z", 103.0),
            ],
        );

        let closes: Vec<_> = bars.iter().map(|bar| (bar.date, bar.close)).collect();
        assert_eq!(
            closes,
            vec![(date!(2024 - 01 - 02), 100.0), (date!(2024 - 01 - 03), 103.0)]
        );
    }

    #[test]
    fn invalid_bars_are_dropped() {
        let symbol = Symbol::parse("AAPL").expect("symbol");
        let mut inverted = raw("2024-01-04T05:00:00Z", 10.0);
        inverted.high = 5.0;

        let bars = normalize_bars(
            &symbol,
            vec![inverted, raw("whenever", 10.0), raw("2024-01-05T05:00:00Z", f64::NAN)],
        );

        assert!(bars.is_empty());
    }

    struct Market;

    impl BarSource for Market {
        fn name(&self) -> &'static str {
            "market"
        }

        fn daily_bars<'a>(
            &'a self,
            symbol: &'a Symbol,
            _window: AnalysisWindow,
        ) -> SourceFuture<'a, Vec<RawBar>> {
            Box::pin(async move {
                match symbol.as_str() {
                    "AAPL" => Ok(vec![raw("2024-01-02T05:00:00Z", 185.0)]),
                    "MSFT" => Err(FetchError::UpstreamRejected {
                        provider: "market",
                        status: 422,
                    }),
                    _ => Ok(Vec::new()),
                }
            })
        }
    }

    #[tokio::test]
    async fn failing_symbol_leaves_other_bars_intact() {
        let fetcher = BarsFetcher::new(Arc::new(Market), Pacer::disabled());
        let companies = [
            Company::new(Symbol::parse("MSFT").expect("symbol"), "Microsoft"),
            Company::new(Symbol::parse("AAPL").expect("symbol"), "Apple"),
            Company::new(Symbol::parse("TSLA").expect("symbol"), "Tesla"),
        ];
        let window = AnalysisWindow::trailing(date!(2024 - 01 - 31), 30);

        let output = fetcher
            .fetch(&companies, window, &StageOptions::default())
            .await;

        assert_eq!(output.items.len(), 1);
        assert_eq!(output.items[0].symbol.as_str(), "AAPL");
        assert_eq!(
            (output.report.succeeded, output.report.failed, output.report.empty),
            (1, 1, 1)
        );
    }

    #[derive(Default)]
    struct TimedMarket {
        clock: CallClock,
    }

    impl BarSource for TimedMarket {
        fn name(&self) -> &'static str {
            "timed"
        }

        fn daily_bars<'a>(
            &'a self,
            _symbol: &'a Symbol,
            _window: AnalysisWindow,
        ) -> SourceFuture<'a, Vec<RawBar>> {
            self.clock.tick();
            Box::pin(async { Ok(vec![raw("2024-01-02T05:00:00Z", 10.0)]) })
        }
    }

    #[tokio::test]
    async fn paced_bar_requests_are_spaced_apart() {
        let market = Arc::new(TimedMarket::default());
        let fetcher = BarsFetcher::new(market.clone(), Pacer::new(PACING));
        let companies: Vec<Company> = ["AAPL", "MSFT", "NVDA"]
            .into_iter()
            .map(|ticker| Company::new(Symbol::parse(ticker).expect("symbol"), ticker))
            .collect();
        let window = AnalysisWindow::trailing(date!(2024 - 01 - 31), 30);

        let output = fetcher
            .fetch(&companies, window, &StageOptions::default().with_concurrency(2))
            .await;

        assert_eq!(output.items.len(), 3);
        market.clock.assert_paced(3);
    }
}
