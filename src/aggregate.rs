// ➕ Aggregator - Period filtering and sums
//
// Everything here is total: an empty period yields zero sums and an empty
// breakdown, never an error.

use crate::categories::CategoryList;
use crate::db::{ExpenseRecord, Participant, RemittanceRecord};
use crate::period::DateRange;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Anything with a calendar day and an amount
pub trait LedgerEntry {
    fn date(&self) -> NaiveDate;
    fn amount(&self) -> f64;
}

impl LedgerEntry for ExpenseRecord {
    fn date(&self) -> NaiveDate {
        self.date
    }

    fn amount(&self) -> f64 {
        self.amount
    }
}

impl LedgerEntry for RemittanceRecord {
    fn date(&self) -> NaiveDate {
        self.date
    }

    fn amount(&self) -> f64 {
        self.amount
    }
}

/// Records dated inside `range` (both ends inclusive), input order kept
pub fn filter_range<'a, T: LedgerEntry>(records: &'a [T], range: &DateRange) -> Vec<&'a T> {
    records.iter().filter(|r| range.contains(r.date())).collect()
}

/// Sum of amounts over records matching `predicate`
pub fn sum_by<T, F>(records: &[&T], predicate: F) -> f64
where
    T: LedgerEntry,
    F: Fn(&T) -> bool,
{
    records
        .iter()
        .filter(|r| predicate(r))
        .map(|r| r.amount())
        .sum()
}

// ============================================================================
// PER-PARTICIPANT VALUES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PerParticipant<T> {
    pub first: T,
    pub second: T,
}

impl<T: Copy> PerParticipant<T> {
    pub fn new(first: T, second: T) -> Self {
        PerParticipant { first, second }
    }

    /// Same values with the participants exchanged
    pub fn swapped(&self) -> Self {
        PerParticipant {
            first: self.second,
            second: self.first,
        }
    }
}

/// The four partial sums the settlement works from
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SpendingSums {
    /// Non-advance spending per logger
    pub normal: PerParticipant<f64>,
    /// Advance-payment spending per logger
    pub advance: PerParticipant<f64>,
}

impl SpendingSums {
    pub fn normal_total(&self) -> f64 {
        self.normal.first + self.normal.second
    }

    /// What each participant personally keyed in, advances included
    pub fn display_totals(&self) -> PerParticipant<f64> {
        PerParticipant::new(
            self.normal.first + self.advance.first,
            self.normal.second + self.advance.second,
        )
    }

    pub fn swapped(&self) -> Self {
        SpendingSums {
            normal: self.normal.swapped(),
            advance: self.advance.swapped(),
        }
    }
}

pub fn spending_sums(expenses: &[&ExpenseRecord], advance_category: &str) -> SpendingSums {
    let sum_for = |participant: Participant, advance: bool| {
        sum_by(expenses, |e: &ExpenseRecord| {
            e.participant == participant && e.is_advance(advance_category) == advance
        })
    };

    SpendingSums {
        normal: PerParticipant::new(
            sum_for(Participant::First, false),
            sum_for(Participant::Second, false),
        ),
        advance: PerParticipant::new(
            sum_for(Participant::First, true),
            sum_for(Participant::Second, true),
        ),
    }
}

// ============================================================================
// CATEGORY SUMS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryAmount {
    pub name: String,
    pub amount: f64,
}

/// Sum for every known category, zeros included, in list order
pub fn category_sums(expenses: &[&ExpenseRecord], categories: &CategoryList) -> Vec<CategoryAmount> {
    categories
        .iter()
        .map(|name| CategoryAmount {
            name: name.to_string(),
            amount: sum_by(expenses, |e: &ExpenseRecord| e.category == name),
        })
        .collect()
}

/// Like `category_sums` but without zero entries. Records in categories
/// no longer on the list are not reported.
pub fn category_breakdown(expenses: &[&ExpenseRecord], categories: &CategoryList) -> Vec<CategoryAmount> {
    category_sums(expenses, categories)
        .into_iter()
        .filter(|c| c.amount > 0.0)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::period::{payroll_range_of, PeriodKey};

    const ADVANCE: &str = "立て替え";

    fn expense(date: &str, amount: f64, participant: Participant, category: &str) -> ExpenseRecord {
        ExpenseRecord {
            id: String::new(),
            date: date.parse().unwrap(),
            description: "test".to_string(),
            amount,
            participant,
            category: category.to_string(),
            memo: None,
        }
    }

    fn march() -> DateRange {
        payroll_range_of("2025-03".parse::<PeriodKey>().unwrap())
    }

    #[test]
    fn test_filter_range_is_inclusive() {
        let records = vec![
            expense("2025-02-20", 1.0, Participant::First, "食費"),
            expense("2025-02-21", 2.0, Participant::First, "食費"),
            expense("2025-03-20", 3.0, Participant::First, "食費"),
            expense("2025-03-21", 4.0, Participant::First, "食費"),
        ];

        let filtered = filter_range(&records, &march());
        let amounts: Vec<f64> = filtered.iter().map(|e| e.amount).collect();
        assert_eq!(amounts, vec![2.0, 3.0]);
    }

    #[test]
    fn test_sum_by_empty_is_zero() {
        let records: Vec<&ExpenseRecord> = Vec::new();
        assert_eq!(sum_by(&records, |_: &ExpenseRecord| true), 0.0);
    }

    #[test]
    fn test_spending_sums_split_advance_from_normal() {
        let records = vec![
            expense("2025-03-01", 3000.0, Participant::First, "食費"),
            expense("2025-03-02", 1000.0, Participant::Second, "外食"),
            expense("2025-03-03", 1500.0, Participant::Second, ADVANCE),
            expense("2025-03-04", 200.0, Participant::First, ADVANCE),
        ];
        let refs: Vec<&ExpenseRecord> = records.iter().collect();

        let sums = spending_sums(&refs, ADVANCE);
        assert_eq!(sums.normal, PerParticipant::new(3000.0, 1000.0));
        assert_eq!(sums.advance, PerParticipant::new(200.0, 1500.0));
        assert_eq!(sums.normal_total(), 4000.0);
        assert_eq!(sums.display_totals(), PerParticipant::new(3200.0, 2500.0));
    }

    #[test]
    fn test_category_breakdown_follows_list_order_and_drops_zeros() {
        let categories = CategoryList::new(vec!["食費", "外食", "デート", ADVANCE]);
        let records = vec![
            expense("2025-03-01", 100.0, Participant::First, ADVANCE),
            expense("2025-03-02", 5000.0, Participant::Second, "外食"),
            expense("2025-03-03", 300.0, Participant::First, "食費"),
            expense("2025-03-04", 700.0, Participant::First, "unlisted"),
        ];
        let refs: Vec<&ExpenseRecord> = records.iter().collect();

        let breakdown = category_breakdown(&refs, &categories);
        let names: Vec<&str> = breakdown.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["食費", "外食", ADVANCE]);
        assert_eq!(breakdown[1].amount, 5000.0);

        assert_eq!(category_sums(&refs, &categories).len(), 4);
    }

    #[test]
    fn test_empty_period_yields_zeros() {
        let records = vec![expense("2025-05-01", 100.0, Participant::First, "食費")];
        let filtered = filter_range(&records, &march());
        assert!(filtered.is_empty());

        let sums = spending_sums(&filtered, ADVANCE);
        assert_eq!(sums, SpendingSums::default());
        assert!(category_breakdown(&filtered, &CategoryList::with_defaults()).is_empty());
    }
}
