use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::Date;
use tracing::{debug, info};

use crate::{AnalysisWindow, UtcDateTime};

/// None of the supplied timestamps was usable.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("no usable document timestamps to derive an analysis window from")]
pub struct NoWindow;

/// How the window used for a run was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowOrigin {
    Documents,
    Fallback,
}

/// Window bounded by the earliest and latest timestamp across both
/// collections, by UTC calendar date. Missing entries are skipped; the
/// resolver never invents dates.
pub fn resolve<A, B>(timestamps_a: A, timestamps_b: B) -> Result<AnalysisWindow, NoWindow>
where
    A: IntoIterator<Item = Option<UtcDateTime>>,
    B: IntoIterator<Item = Option<UtcDateTime>>,
{
    let bounds = timestamps_a
        .into_iter()
        .chain(timestamps_b)
        .flatten()
        .map(UtcDateTime::date)
        .fold(None::<(Date, Date)>, |bounds, date| match bounds {
            None => Some((date, date)),
            Some((start, end)) => Some((start.min(date), end.max(date))),
        });

    let (start, end) = bounds.ok_or(NoWindow)?;
    debug!(%start, %end, "window resolved from documents");
    AnalysisWindow::new(start, end).map_err(|_| NoWindow)
}

/// Parses each raw timestamp leniently and resolves the window.
pub fn resolve_raw<'a, A, B>(raw_a: A, raw_b: B) -> Result<AnalysisWindow, NoWindow>
where
    A: IntoIterator<Item = &'a str>,
    B: IntoIterator<Item = &'a str>,
{
    resolve(
        raw_a.into_iter().map(UtcDateTime::parse_lenient),
        raw_b.into_iter().map(UtcDateTime::parse_lenient),
    )
}

/// Caller-side fallback: the trailing `fallback_days` ending at `today` when
/// the documents yield no window.
pub fn resolve_or_trailing<A, B>(
    timestamps_a: A,
    timestamps_b: B,
    today: Date,
    fallback_days: u32,
) -> (AnalysisWindow, WindowOrigin)
where
    A: IntoIterator<Item = Option<UtcDateTime>>,
    B: IntoIterator<Item = Option<UtcDateTime>>,
{
    match resolve(timestamps_a, timestamps_b) {
        Ok(window) => (window, WindowOrigin::Documents),
        Err(NoWindow) => {
            let window = AnalysisWindow::trailing(today, fallback_days);
            info!(%window, fallback_days, "no document timestamps, using trailing window");
            (window, WindowOrigin::Fallback)
        }
    }
}

#[cfg(test)]
mod tests {
    use time::macros::date;

    use super::*;

    #[test]
    fn takes_min_and_max_across_both_sources() {
        let window = resolve_raw(
            ["2024-01-05T12:00:00Z", "2024-01-01 08:30:00"],
            ["not a date", "2024-02-10"],
        )
        .expect("window");

        assert_eq!(window.start(), date!(2024 - 01 - 01));
        assert_eq!(window.end(), date!(2024 - 02 - 10));
    }

    #[test]
    fn all_invalid_yields_no_window() {
        assert_eq!(resolve_raw(["garbage"], ["[Removed]", ""]), Err(NoWindow));
        let none: Vec<Option<UtcDateTime>> = vec![None];
        assert_eq!(resolve(none.clone(), none), Err(NoWindow));
    }

    #[test]
    fn single_timestamp_yields_single_day_window() {
        let only = UtcDateTime::parse("2024-03-05T23:59:59Z").ok();

        let window = resolve([only], std::iter::empty()).expect("window");

        assert_eq!(window.days(), 1);
    }

    #[test]
    fn offsets_are_compared_as_utc_dates() {
        let window =
            resolve_raw(["2024-01-01T23:30:00-02:00"], std::iter::empty()).expect("window");

        assert_eq!(window.start(), date!(2024 - 01 - 02));
    }

    #[test]
    fn caller_falls_back_to_trailing_year() {
        let nothing: Vec<Option<UtcDateTime>> = Vec::new();
        let (window, origin) =
            resolve_or_trailing(nothing.clone(), nothing, date!(2024 - 12 - 31), 365);

        assert_eq!(origin, WindowOrigin::Fallback);
        assert_eq!(window.start(), date!(2024 - 01 - 01));
        assert_eq!(window.end(), date!(2024 - 12 - 31));
    }
}
