// 📈 Trend Generator - Trailing payroll periods as a time series

use crate::aggregate::{category_sums, filter_range, spending_sums, CategoryAmount, PerParticipant};
use crate::categories::CategoryList;
use crate::db::ExpenseRecord;
use crate::period::{months_before, payroll_period_of, payroll_range_of, PeriodKey};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Number of periods in a trend
pub const TREND_WINDOW: u32 = 6;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendPoint {
    pub period: PeriodKey,
    /// Normal spending only
    pub total: f64,
    pub display_totals: PerParticipant<f64>,
    /// Every known category, zeros included
    pub categories: Vec<CategoryAmount>,
}

/// Oldest → newest, ending with the period containing `now`
pub fn trend_periods(now: NaiveDate) -> Vec<PeriodKey> {
    (0..TREND_WINDOW)
        .rev()
        .map(|i| payroll_period_of(months_before(now, i)))
        .collect()
}

pub fn trend(
    expenses: &[ExpenseRecord],
    categories: &CategoryList,
    advance_category: &str,
    now: NaiveDate,
) -> Vec<TrendPoint> {
    trend_periods(now)
        .into_iter()
        .map(|period| {
            let filtered = filter_range(expenses, &payroll_range_of(period));
            let sums = spending_sums(&filtered, advance_category);

            TrendPoint {
                period,
                total: sums.normal_total(),
                display_totals: sums.display_totals(),
                categories: category_sums(&filtered, categories),
            }
        })
        .collect()
}
