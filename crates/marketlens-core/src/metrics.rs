//! Rolling technical indicators over daily closes.
//!
//! The primitives return one `Option` per input position, `None` where the
//! indicator is undefined for lack of history. [`MetricsEngine::compute`]
//! combines them and keeps only the dates on which every indicator is defined.

use std::collections::BTreeMap;

use time::Date;
use tracing::{debug, info, warn};

use crate::{Bar, MetricRow, Symbol};

/// Mean of the trailing `window` values ending at each position.
pub fn rolling_mean(values: &[f64], window: usize) -> Vec<Option<f64>> {
    if window == 0 {
        return vec![None; values.len()];
    }
    (0..values.len())
        .map(|end| {
            (end + 1 >= window).then(|| {
                let slice = &values[end + 1 - window..=end];
                slice.iter().sum::<f64>() / window as f64
            })
        })
        .collect()
}

/// Percentage change from the previous value, `(v[t] / v[t-1] - 1) * 100`.
/// Undefined at the first position and after a zero.
pub fn pct_change(values: &[f64]) -> Vec<Option<f64>> {
    let mut changes = Vec::with_capacity(values.len());
    changes.push(None);
    changes.extend(values.windows(2).map(|pair| {
        let (previous, current) = (pair[0], pair[1]);
        (previous != 0.0)
            .then(|| (current / previous - 1.0) * 100.0)
            .filter(|change| change.is_finite())
    }));
    changes.truncate(values.len());
    changes
}

/// Absolute change from the previous value.
pub fn diff(values: &[f64]) -> Vec<Option<f64>> {
    let mut changes = Vec::with_capacity(values.len());
    changes.push(None);
    changes.extend(values.windows(2).map(|pair| Some(pair[1] - pair[0])));
    changes.truncate(values.len());
    changes
}

/// Sample standard deviation (n - 1) of the trailing `window` values. A
/// window containing any undefined value is itself undefined.
pub fn rolling_sample_std(values: &[Option<f64>], window: usize) -> Vec<Option<f64>> {
    if window < 2 {
        return vec![None; values.len()];
    }
    (0..values.len())
        .map(|end| {
            if end + 1 < window {
                return None;
            }
            let slice = values[end + 1 - window..=end]
                .iter()
                .copied()
                .collect::<Option<Vec<f64>>>()?;
            let mean = slice.iter().sum::<f64>() / window as f64;
            let variance = slice
                .iter()
                .map(|value| (value - mean).powi(2))
                .sum::<f64>()
                / (window - 1) as f64;
            Some(variance.sqrt())
        })
        .collect()
}

/// Window lengths for the derived indicators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsEngine {
    pub short_window: usize,
    pub long_window: usize,
    pub volatility_window: usize,
}

impl Default for MetricsEngine {
    fn default() -> Self {
        Self {
            short_window: 5,
            long_window: 10,
            volatility_window: 5,
        }
    }
}

impl MetricsEngine {
    /// Fully defined metric rows ordered by `(symbol, date)`.
    ///
    /// Input order is irrelevant. If a symbol has two bars on one date the
    /// later one in the input wins.
    pub fn compute(&self, bars: &[Bar]) -> Vec<MetricRow> {
        if bars.is_empty() {
            info!(stage = "metrics", "no bars, nothing to compute");
            return Vec::new();
        }

        let mut series: BTreeMap<&Symbol, BTreeMap<Date, f64>> = BTreeMap::new();
        for bar in bars {
            if series
                .entry(&bar.symbol)
                .or_default()
                .insert(bar.date, bar.close)
                .is_some()
            {
                warn!(stage = "metrics", symbol = %bar.symbol, date = %bar.date, "duplicate bar date, keeping the later bar");
            }
        }

        let mut rows = Vec::new();
        for (symbol, closes_by_date) in series {
            let before = rows.len();
            self.compute_symbol(symbol, &closes_by_date, &mut rows);
            debug!(
                stage = "metrics",
                symbol = %symbol,
                bars = closes_by_date.len(),
                rows = rows.len() - before,
                "metrics computed"
            );
        }
        rows
    }

    fn compute_symbol(
        &self,
        symbol: &Symbol,
        closes_by_date: &BTreeMap<Date, f64>,
        rows: &mut Vec<MetricRow>,
    ) {
        let dates: Vec<Date> = closes_by_date.keys().copied().collect();
        let closes: Vec<f64> = closes_by_date.values().copied().collect();

        let short = rolling_mean(&closes, self.short_window);
        let long = rolling_mean(&closes, self.long_window);
        let returns = pct_change(&closes);
        let changes = diff(&closes);
        let volatility = rolling_sample_std(&returns, self.volatility_window);

        for (index, date) in dates.into_iter().enumerate() {
            let row = (|| {
                Some(MetricRow {
                    symbol: symbol.clone(),
                    date,
                    close: closes[index],
                    moving_average_5: short[index]?,
                    moving_average_10: long[index]?,
                    daily_return: returns[index]?,
                    daily_price_change: changes[index]?,
                    volatility: volatility[index]?,
                })
            })();
            rows.extend(row);
        }
    }
}
