//! Period codes and current/comparison window resolution.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Days, Months, NaiveDate};
use serde::{Deserialize, Serialize};

/// An inclusive range of calendar days. `start_date <= end_date` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeWindow {
    start_date: NaiveDate,
    end_date: NaiveDate,
}

impl TimeWindow {
    /// Creates a window, or `None` if `start > end`.
    pub fn new(start_date: NaiveDate, end_date: NaiveDate) -> Option<Self> {
        (start_date <= end_date).then_some(Self { start_date, end_date })
    }

    pub fn start_date(&self) -> NaiveDate {
        self.start_date
    }

    pub fn end_date(&self) -> NaiveDate {
        self.end_date
    }

    /// Number of days covered, inclusive of both boundaries.
    pub fn days(&self) -> i64 {
        (self.end_date - self.start_date).num_days() + 1
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start_date && date <= self.end_date
    }

    pub fn overlaps(&self, other: &TimeWindow) -> bool {
        self.start_date <= other.end_date && other.start_date <= self.end_date
    }

    /// Smallest window covering both.
    pub fn union(&self, other: &TimeWindow) -> TimeWindow {
        TimeWindow {
            start_date: self.start_date.min(other.start_date),
            end_date: self.end_date.max(other.end_date),
        }
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start_date, self.end_date)
    }
}

/// How the comparison window is derived from the current window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompareMode {
    #[default]
    PreviousPeriod,
    SamePeriodLastMonth,
    None,
}

impl CompareMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PreviousPeriod => "previous_period",
            Self::SamePeriodLastMonth => "same_period_last_month",
            Self::None => "none",
        }
    }
}

impl fmt::Display for CompareMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CompareMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "previous_period" => Ok(Self::PreviousPeriod),
            "same_period_last_month" => Ok(Self::SamePeriodLastMonth),
            "none" => Ok(Self::None),
            other => Err(format!(
                "unknown compare mode '{}' (expected previous_period, same_period_last_month, none)",
                other
            )),
        }
    }
}

/// A current analysis window and its optional comparison window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowPair {
    pub current: TimeWindow,
    pub previous: Option<TimeWindow>,
}

impl WindowPair {
    /// The single window fetched from the row source: covers both windows.
    pub fn fetch_window(&self) -> TimeWindow {
        match self.previous {
            Some(previous) => self.current.union(&previous),
            None => self.current,
        }
    }
}

/// Longest accepted `last_<n>_days` span.
const MAX_RELATIVE_DAYS: u32 = 366;

/// A parsed period code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeriodCode {
    /// Trailing `n` days ending on the latest charge date.
    LastDays(u32),
    Today,
    MonthToDate,
    PreviousMonth,
    QuarterToDate,
    YearToDate,
    /// Explicit `YYYY-MM-DD..YYYY-MM-DD` range.
    Range(TimeWindow),
}

impl PeriodCode {
    /// Parses a period code, returning `None` for anything unresolvable.
    pub fn parse(code: &str) -> Option<Self> {
        let code = code.trim().to_lowercase();
        match code.as_str() {
            "today" => return Some(Self::Today),
            "month_to_date" | "mtd" => return Some(Self::MonthToDate),
            "previous_month" | "last_month" => return Some(Self::PreviousMonth),
            "quarter_to_date" | "qtd" => return Some(Self::QuarterToDate),
            "year_to_date" | "ytd" => return Some(Self::YearToDate),
            _ => {}
        }

        if let Some(days) = code.strip_prefix("last_").and_then(|rest| rest.strip_suffix("_days")) {
            return days
                .parse::<u32>()
                .ok()
                .filter(|n| (1..=MAX_RELATIVE_DAYS).contains(n))
                .map(Self::LastDays);
        }

        let (start, end) = code.split_once("..")?;
        let start = NaiveDate::parse_from_str(start.trim(), "%Y-%m-%d").ok()?;
        let end = NaiveDate::parse_from_str(end.trim(), "%Y-%m-%d").ok()?;
        TimeWindow::new(start, end).map(Self::Range)
    }

    /// True if the window is anchored on the latest charge date rather than "now".
    pub fn needs_latest_charge_date(&self) -> bool {
        matches!(self, Self::LastDays(_))
    }

    /// Resolves the current window.
    ///
    /// Relative codes anchor on `latest_charge_date`, falling back to `now`.
    pub fn current_window(&self, now: NaiveDate, latest_charge_date: Option<NaiveDate>) -> Option<TimeWindow> {
        match *self {
            Self::LastDays(n) => {
                let end = latest_charge_date.unwrap_or(now);
                let start = end.checked_sub_days(Days::new(u64::from(n.checked_sub(1)?)))?;
                TimeWindow::new(start, end)
            }
            Self::Today => TimeWindow::new(now, now),
            Self::MonthToDate => TimeWindow::new(now.with_day(1)?, now),
            Self::PreviousMonth => {
                let first_this_month = now.with_day(1)?;
                let end = first_this_month.pred_opt()?;
                TimeWindow::new(end.with_day(1)?, end)
            }
            Self::QuarterToDate => {
                let quarter_start_month = ((now.month() - 1) / 3) * 3 + 1;
                TimeWindow::new(NaiveDate::from_ymd_opt(now.year(), quarter_start_month, 1)?, now)
            }
            Self::YearToDate => TimeWindow::new(NaiveDate::from_ymd_opt(now.year(), 1, 1)?, now),
            Self::Range(window) => Some(window),
        }
    }
}

/// Derives the comparison window for `current`.
///
/// `PreviousPeriod` is the contiguous window of equal length ending the day before
/// `current` starts. `SamePeriodLastMonth` shifts both boundaries back one calendar
/// month (days clamped to month end) and clips the end so it never reaches into
/// `current`. Returns `None` for `CompareMode::None` or an invalid shifted range.
pub fn previous_window(current: &TimeWindow, mode: CompareMode) -> Option<TimeWindow> {
    match mode {
        CompareMode::None => None,
        CompareMode::PreviousPeriod => {
            let end = current.start_date.pred_opt()?;
            let start = end.checked_sub_days(Days::new(u64::try_from(current.days() - 1).ok()?))?;
            TimeWindow::new(start, end)
        }
        CompareMode::SamePeriodLastMonth => {
            let start = current.start_date.checked_sub_months(Months::new(1))?;
            let shifted_end = current.end_date.checked_sub_months(Months::new(1))?;
            let end = shifted_end.min(current.start_date.pred_opt()?);
            TimeWindow::new(start, end)
        }
    }
}

/// Resolves a period code and compare mode into a [`WindowPair`].
///
/// Returns `None` when the period code cannot be resolved.
pub fn resolve_windows(
    period: &PeriodCode,
    compare: CompareMode,
    now: NaiveDate,
    latest_charge_date: Option<NaiveDate>,
) -> Option<WindowPair> {
    let current = period.current_window(now, latest_charge_date)?;
    let previous = previous_window(&current, compare);
    Some(WindowPair { current, previous })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn w(start: NaiveDate, end: NaiveDate) -> TimeWindow {
        TimeWindow::new(start, end).unwrap()
    }

    #[test]
    fn test_time_window_rejects_inverted_range() {
        assert!(TimeWindow::new(d(2026, 3, 2), d(2026, 3, 1)).is_none());
        assert_eq!(w(d(2026, 3, 1), d(2026, 3, 1)).days(), 1);
    }

    #[test]
    fn test_parse_period_codes() {
        assert_eq!(PeriodCode::parse("last_30_days"), Some(PeriodCode::LastDays(30)));
        assert_eq!(PeriodCode::parse(" LAST_7_DAYS "), Some(PeriodCode::LastDays(7)));
        assert_eq!(PeriodCode::parse("month_to_date"), Some(PeriodCode::MonthToDate));
        assert_eq!(PeriodCode::parse("previous_month"), Some(PeriodCode::PreviousMonth));
        assert_eq!(
            PeriodCode::parse("2026-01-01..2026-01-31"),
            Some(PeriodCode::Range(w(d(2026, 1, 1), d(2026, 1, 31))))
        );
    }

    #[test]
    fn test_parse_rejects_unresolvable_codes() {
        assert_eq!(PeriodCode::parse("last_0_days"), None);
        assert_eq!(PeriodCode::parse("last_400_days"), None);
        assert_eq!(PeriodCode::parse("fortnight"), None);
        assert_eq!(PeriodCode::parse("2026-02-01..2026-01-01"), None);
        assert_eq!(PeriodCode::parse(""), None);
    }

    #[test]
    fn test_relative_window_anchors_on_latest_charge_date() {
        let period = PeriodCode::LastDays(30);
        let window = period.current_window(d(2026, 5, 20), Some(d(2026, 4, 30))).unwrap();
        assert_eq!(window, w(d(2026, 4, 1), d(2026, 4, 30)));

        let fallback = period.current_window(d(2026, 5, 20), None).unwrap();
        assert_eq!(fallback.end_date(), d(2026, 5, 20));
        assert_eq!(fallback.days(), 30);
    }

    #[test]
    fn test_zero_day_relative_window_does_not_resolve() {
        let now = d(2026, 5, 20);
        assert_eq!(PeriodCode::LastDays(0).current_window(now, Some(now)), None);
        assert_eq!(resolve_windows(&PeriodCode::LastDays(0), CompareMode::PreviousPeriod, now, None), None);
    }

    #[test]
    fn test_fixed_windows() {
        let now = d(2026, 5, 20);
        assert_eq!(PeriodCode::MonthToDate.current_window(now, None), Some(w(d(2026, 5, 1), now)));
        assert_eq!(
            PeriodCode::PreviousMonth.current_window(now, None),
            Some(w(d(2026, 4, 1), d(2026, 4, 30)))
        );
        assert_eq!(PeriodCode::QuarterToDate.current_window(now, None), Some(w(d(2026, 4, 1), now)));
        assert_eq!(PeriodCode::YearToDate.current_window(now, None), Some(w(d(2026, 1, 1), now)));
        assert_eq!(PeriodCode::Today.current_window(now, None), Some(w(now, now)));
    }

    #[test]
    fn test_previous_period_is_contiguous_and_equal_length() {
        let current = w(d(2026, 3, 1), d(2026, 3, 10));
        let previous = previous_window(&current, CompareMode::PreviousPeriod).unwrap();
        assert_eq!(previous, w(d(2026, 2, 19), d(2026, 2, 28)));
        assert_eq!(previous.days(), current.days());
        assert!(!previous.overlaps(&current));
    }

    #[test]
    fn test_same_period_last_month_clamps_month_end() {
        let current = w(d(2026, 3, 31), d(2026, 3, 31));
        let previous = previous_window(&current, CompareMode::SamePeriodLastMonth).unwrap();
        assert_eq!(previous, w(d(2026, 2, 28), d(2026, 2, 28)));
    }

    #[test]
    fn test_same_period_last_month_never_overlaps() {
        let current = w(d(2026, 1, 10), d(2026, 3, 5));
        let previous = previous_window(&current, CompareMode::SamePeriodLastMonth).unwrap();
        assert_eq!(previous, w(d(2025, 12, 10), d(2026, 1, 9)));
        assert!(!previous.overlaps(&current));
    }

    #[test]
    fn test_compare_none_has_no_previous() {
        let pair = resolve_windows(&PeriodCode::Today, CompareMode::None, d(2026, 1, 1), None).unwrap();
        assert!(pair.previous.is_none());
        assert_eq!(pair.fetch_window(), pair.current);
    }

    #[test]
    fn test_fetch_window_covers_both() {
        let pair = resolve_windows(&PeriodCode::LastDays(7), CompareMode::PreviousPeriod, d(2026, 6, 14), None).unwrap();
        assert_eq!(pair.fetch_window(), w(d(2026, 6, 1), d(2026, 6, 14)));
    }

    #[test]
    fn test_resolution_is_deterministic() {
        let a = resolve_windows(&PeriodCode::LastDays(30), CompareMode::SamePeriodLastMonth, d(2026, 7, 1), Some(d(2026, 6, 30)));
        let b = resolve_windows(&PeriodCode::LastDays(30), CompareMode::SamePeriodLastMonth, d(2026, 7, 1), Some(d(2026, 6, 30)));
        assert_eq!(a, b);
    }

    #[test]
    fn test_compare_mode_parse_and_display() {
        assert_eq!("previous_period".parse::<CompareMode>().unwrap(), CompareMode::PreviousPeriod);
        assert_eq!("Same_Period_Last_Month".parse::<CompareMode>().unwrap(), CompareMode::SamePeriodLastMonth);
        assert_eq!(CompareMode::None.to_string(), "none");
        assert!("yesterday".parse::<CompareMode>().is_err());
    }
}
