// 📅 Period Resolver - Map calendar days to accounting periods
//
// Two period flavors:
//   Payroll  - "YYYY-MM" is the period ENDING on the 20th of that month,
//              covering [previous month 21st, this month 20th]
//   Calendar - "YYYY-MM" is the plain calendar month (remittances)
//
// Keys sort lexicographically the same way they sort chronologically.

use crate::error::{LedgerError, Result};
use chrono::{Datelike, Days, Months, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// First day of a payroll period (payday)
pub const PAYROLL_START_DAY: u32 = 21;

// ============================================================================
// PERIOD KEY
// ============================================================================

/// A `YYYY-MM` period key. Stored as the first day of the month so every
/// derived date is always valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PeriodKey(NaiveDate);

impl PeriodKey {
    /// Key of the calendar month containing `date`
    pub fn of(date: NaiveDate) -> Self {
        // Day 1 exists in every month
        PeriodKey(date - Days::new(u64::from(date.day0())))
    }

    pub fn from_year_month(year: i32, month: u32) -> Result<Self> {
        NaiveDate::from_ymd_opt(year, month, 1)
            .map(PeriodKey)
            .ok_or_else(|| LedgerError::invalid("period", format!("{}-{} is not a month", year, month)))
    }

    pub fn year(&self) -> i32 {
        self.0.year()
    }

    pub fn month(&self) -> u32 {
        self.0.month()
    }

    pub fn first_day(&self) -> NaiveDate {
        self.0
    }

    pub fn last_day(&self) -> NaiveDate {
        self.next().0 - Days::new(1)
    }

    pub fn next(&self) -> Self {
        PeriodKey(self.0 + Months::new(1))
    }

    pub fn previous(&self) -> Self {
        PeriodKey(self.0 - Months::new(1))
    }
}

impl fmt::Display for PeriodKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year(), self.month())
    }
}

impl FromStr for PeriodKey {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self> {
        let bad = || LedgerError::invalid("period", format!("expected YYYY-MM, got '{}'", s));

        let (year, month) = s.trim().split_once('-').ok_or_else(bad)?;
        if year.len() != 4 || month.len() != 2 {
            return Err(bad());
        }
        let year: i32 = year.parse().map_err(|_| bad())?;
        let month: u32 = month.parse().map_err(|_| bad())?;

        PeriodKey::from_year_month(year, month)
    }
}

impl TryFrom<String> for PeriodKey {
    type Error = LedgerError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<PeriodKey> for String {
    fn from(key: PeriodKey) -> Self {
        key.to_string()
    }
}

// ============================================================================
// DATE RANGE
// ============================================================================

/// Inclusive date range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

// ============================================================================
// PERIOD MODE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeriodMode {
    /// 21st → 20th, used for expenses
    Payroll,
    /// 1st → last day, used for remittances
    Calendar,
}

impl PeriodMode {
    pub fn resolve(&self, date: NaiveDate) -> PeriodKey {
        match self {
            PeriodMode::Payroll => payroll_period_of(date),
            PeriodMode::Calendar => calendar_period_of(date),
        }
    }

    pub fn range(&self, key: PeriodKey) -> DateRange {
        match self {
            PeriodMode::Payroll => payroll_range_of(key),
            PeriodMode::Calendar => calendar_range_of(key),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PeriodMode::Payroll => "payroll",
            PeriodMode::Calendar => "calendar",
        }
    }
}

impl FromStr for PeriodMode {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "payroll" | "expenses" => Ok(PeriodMode::Payroll),
            "calendar" | "remittances" => Ok(PeriodMode::Calendar),
            other => Err(LedgerError::invalid("mode", format!("unknown period mode '{}'", other))),
        }
    }
}

// ============================================================================
// RESOLVERS
// ============================================================================

/// Payroll period owning `date`: from the 21st on, the date belongs to the
/// period ending next month.
pub fn payroll_period_of(date: NaiveDate) -> PeriodKey {
    let key = PeriodKey::of(date);
    if date.day() >= PAYROLL_START_DAY {
        key.next()
    } else {
        key
    }
}

/// `[previous month 21st, key month 20th]`
pub fn payroll_range_of(key: PeriodKey) -> DateRange {
    let start_day = u64::from(PAYROLL_START_DAY - 1);
    DateRange {
        start: key.previous().first_day() + Days::new(start_day),
        end: key.first_day() + Days::new(start_day - 1),
    }
}

pub fn calendar_period_of(date: NaiveDate) -> PeriodKey {
    PeriodKey::of(date)
}

pub fn calendar_range_of(key: PeriodKey) -> DateRange {
    DateRange {
        start: key.first_day(),
        end: key.last_day(),
    }
}

/// Descending, duplicate-free keys touched by `dates`, always including
/// today's key so the current period is selectable before any data exists.
pub fn available_periods<I>(dates: I, mode: PeriodMode, today: NaiveDate) -> Vec<PeriodKey>
where
    I: IntoIterator<Item = NaiveDate>,
{
    let mut keys: BTreeSet<PeriodKey> = dates.into_iter().map(|d| mode.resolve(d)).collect();
    keys.insert(mode.resolve(today));
    keys.into_iter().rev().collect()
}

/// Same day `months` calendar months earlier, clamped to the month's end
pub fn months_before(date: NaiveDate, months: u32) -> NaiveDate {
    date - Months::new(months)
}

/// Display label, e.g. `2025-03 (02/21〜03/20)`
pub fn period_label(key: PeriodKey, mode: PeriodMode) -> String {
    let range = mode.range(key);
    format!(
        "{} ({:02}/{:02}〜{:02}/{:02})",
        key,
        range.start.month(),
        range.start.day(),
        range.end.month(),
        range.end.day()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn key(s: &str) -> PeriodKey {
        s.parse().unwrap()
    }

    #[test]
    fn test_payroll_period_day_boundaries() {
        assert_eq!(payroll_period_of(date(2025, 3, 1)), key("2025-03"));
        assert_eq!(payroll_period_of(date(2025, 3, 20)), key("2025-03"));
        assert_eq!(payroll_period_of(date(2025, 3, 21)), key("2025-04"));
        assert_eq!(payroll_period_of(date(2025, 3, 31)), key("2025-04"));
    }

    #[test]
    fn test_payroll_period_rolls_year_in_december() {
        assert_eq!(payroll_period_of(date(2024, 12, 20)), key("2024-12"));
        assert_eq!(payroll_period_of(date(2024, 12, 21)), key("2025-01"));
        assert_eq!(payroll_period_of(date(2024, 12, 31)), key("2025-01"));
    }

    #[test]
    fn test_payroll_period_law_for_every_day() {
        let mut d = date(2023, 1, 1);
        while d <= date(2025, 12, 31) {
            let own = PeriodKey::of(d);
            let expected = if d.day() <= 20 { own } else { own.next() };
            assert_eq!(payroll_period_of(d), expected, "date {}", d);
            d = d.succ_opt().unwrap();
        }
    }

    #[test]
    fn test_payroll_range() {
        let range = payroll_range_of(key("2025-03"));
        assert_eq!(range.start, date(2025, 2, 21));
        assert_eq!(range.end, date(2025, 3, 20));

        let january = payroll_range_of(key("2025-01"));
        assert_eq!(january.start, date(2024, 12, 21));
        assert_eq!(january.end, date(2025, 1, 20));
    }

    #[test]
    fn test_range_contains_resolved_date() {
        // Includes leap day 2024-02-29
        let mut d = date(2023, 11, 1);
        while d <= date(2025, 2, 28) {
            assert!(payroll_range_of(payroll_period_of(d)).contains(d), "payroll {}", d);
            assert!(calendar_range_of(calendar_period_of(d)).contains(d), "calendar {}", d);
            d = d.succ_opt().unwrap();
        }
    }

    #[test]
    fn test_calendar_range_last_day() {
        assert_eq!(calendar_range_of(key("2024-02")).end, date(2024, 2, 29));
        assert_eq!(calendar_range_of(key("2025-02")).end, date(2025, 2, 28));
        assert_eq!(calendar_range_of(key("2025-04")).end, date(2025, 4, 30));
        assert_eq!(calendar_range_of(key("2025-12")).end, date(2025, 12, 31));
        assert_eq!(calendar_range_of(key("2025-12")).start, date(2025, 12, 1));
    }

    #[test]
    fn test_calendar_period_has_no_offset() {
        assert_eq!(calendar_period_of(date(2025, 3, 31)), key("2025-03"));
        assert_eq!(calendar_period_of(date(2025, 3, 21)), key("2025-03"));
    }

    #[test]
    fn test_period_key_parse_and_display() {
        assert_eq!(key("2025-03").to_string(), "2025-03");
        assert_eq!(key("2025-12").month(), 12);
        assert!("2025-13".parse::<PeriodKey>().is_err());
        assert!("2025-3".parse::<PeriodKey>().is_err());
        assert!("25-03".parse::<PeriodKey>().is_err());
        assert!("garbage".parse::<PeriodKey>().is_err());
    }

    #[test]
    fn test_keys_sort_chronologically() {
        let mut keys = vec![key("2025-01"), key("2024-12"), key("2025-10"), key("2025-02")];
        keys.sort();
        let as_strings: Vec<String> = keys.iter().map(|k| k.to_string()).collect();
        let mut lexicographic = as_strings.clone();
        lexicographic.sort();
        assert_eq!(as_strings, lexicographic);
    }

    #[test]
    fn test_available_periods_empty_contains_today() {
        let periods = available_periods(Vec::new(), PeriodMode::Payroll, date(2025, 3, 25));
        assert_eq!(periods, vec![key("2025-04")]);
    }

    #[test]
    fn test_available_periods_sorted_descending_without_duplicates() {
        let dates = vec![
            date(2025, 1, 5),
            date(2025, 1, 10),
            date(2024, 12, 22),
            date(2025, 2, 21),
            date(2024, 11, 30),
        ];
        let periods = available_periods(dates, PeriodMode::Payroll, date(2025, 3, 1));
        assert_eq!(
            periods,
            vec![key("2025-03"), key("2025-01"), key("2024-12")]
        );
    }

    #[test]
    fn test_available_periods_calendar_mode() {
        let dates = vec![date(2025, 1, 31), date(2025, 1, 1)];
        let periods = available_periods(dates, PeriodMode::Calendar, date(2025, 2, 25));
        assert_eq!(periods, vec![key("2025-02"), key("2025-01")]);
    }

    #[test]
    fn test_months_before_clamps() {
        assert_eq!(months_before(date(2025, 3, 31), 1), date(2025, 2, 28));
        assert_eq!(months_before(date(2025, 1, 15), 2), date(2024, 11, 15));
    }

    #[test]
    fn test_period_label() {
        assert_eq!(period_label(key("2025-03"), PeriodMode::Payroll), "2025-03 (02/21〜03/20)");
        assert_eq!(period_label(key("2025-02"), PeriodMode::Calendar), "2025-02 (02/01〜02/28)");
    }
}
