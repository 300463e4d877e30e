// ⚖️ Settlement Calculator - Who owes whom for a period
//
// Two stages, applied in this order:
//   1. Split normal (non-advance) spending 50/50
//   2. Offset advance payments, flipping direction whenever the running
//      amount crosses zero
// The amount is rounded once, at the very end.

use crate::aggregate::{
    category_breakdown, filter_range, spending_sums, CategoryAmount, PerParticipant, SpendingSums,
};
use crate::categories::CategoryList;
use crate::db::{ExpenseRecord, Participant};
use crate::period::{payroll_range_of, PeriodKey};
use serde::{Deserialize, Serialize};

// ============================================================================
// DIRECTION
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettlementDirection {
    /// Nothing to transfer
    None,
    /// Second participant pays the first
    SecondToFirst,
    /// First participant pays the second
    FirstToSecond,
}

impl SettlementDirection {
    pub fn payer(&self) -> Option<Participant> {
        match self {
            SettlementDirection::None => None,
            SettlementDirection::SecondToFirst => Some(Participant::Second),
            SettlementDirection::FirstToSecond => Some(Participant::First),
        }
    }

    pub fn flipped(&self) -> Self {
        match self {
            SettlementDirection::None => SettlementDirection::None,
            SettlementDirection::SecondToFirst => SettlementDirection::FirstToSecond,
            SettlementDirection::FirstToSecond => SettlementDirection::SecondToFirst,
        }
    }

    /// "payer → payee" using the given display names
    pub fn label(&self, first_name: &str, second_name: &str) -> String {
        match self {
            SettlementDirection::None => String::new(),
            SettlementDirection::SecondToFirst => format!("{} → {}", second_name, first_name),
            SettlementDirection::FirstToSecond => format!("{} → {}", first_name, second_name),
        }
    }
}

// ============================================================================
// SETTLEMENT
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Settlement {
    /// Whole currency units, never negative
    pub amount: f64,
    pub direction: SettlementDirection,
}

impl Settlement {
    pub fn none() -> Self {
        Settlement {
            amount: 0.0,
            direction: SettlementDirection::None,
        }
    }

    pub fn is_settled(&self) -> bool {
        self.direction == SettlementDirection::None || self.amount == 0.0
    }

    /// Positive when the first participant pays, negative when they receive
    pub fn signed_amount(&self) -> f64 {
        match self.direction {
            SettlementDirection::None => 0.0,
            SettlementDirection::FirstToSecond => self.amount,
            SettlementDirection::SecondToFirst => -self.amount,
        }
    }
}

/// Nearest whole unit, halves away from zero
pub fn round_currency(amount: f64) -> f64 {
    amount.round()
}

/// Net debt between the two participants for one period
pub fn settle(sums: &SpendingSums) -> Settlement {
    let normal = sums.normal;
    let half = sums.normal_total() / 2.0;

    // Stage 1: baseline split of normal spending
    let (mut amount, mut direction) = if normal.first > normal.second {
        (normal.first - half, SettlementDirection::SecondToFirst)
    } else if normal.second > normal.first {
        (normal.second - half, SettlementDirection::FirstToSecond)
    } else {
        (0.0, SettlementDirection::None)
    };

    // Stage 2: advances fronted by the second participant raise what the
    // first owes, and vice versa
    let adjustment = sums.advance.second - sums.advance.first;

    match direction {
        SettlementDirection::SecondToFirst => {
            amount -= adjustment;
            if amount < 0.0 {
                amount = amount.abs();
                direction = SettlementDirection::FirstToSecond;
            }
        }
        SettlementDirection::FirstToSecond => {
            amount += adjustment;
            if amount < 0.0 {
                amount = amount.abs();
                direction = SettlementDirection::SecondToFirst;
            }
        }
        SettlementDirection::None => {
            if adjustment > 0.0 {
                amount = adjustment;
                direction = SettlementDirection::FirstToSecond;
            } else if adjustment < 0.0 {
                amount = adjustment.abs();
                direction = SettlementDirection::SecondToFirst;
            }
        }
    }

    Settlement {
        amount: round_currency(amount),
        direction,
    }
}

// ============================================================================
// PERIOD STATS
// ============================================================================

/// Everything the summary view shows for one payroll period
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodStats {
    pub period: PeriodKey,
    pub display_totals: PerParticipant<f64>,
    /// Normal spending only
    pub normal_total: f64,
    /// Half of `normal_total`
    pub half: f64,
    pub category_breakdown: Vec<CategoryAmount>,
    pub settlement: Settlement,
}

/// Stats for the payroll period `period` over the full expense collection
pub fn period_stats(
    period: PeriodKey,
    expenses: &[ExpenseRecord],
    categories: &CategoryList,
    advance_category: &str,
) -> PeriodStats {
    let filtered = filter_range(expenses, &payroll_range_of(period));
    let sums = spending_sums(&filtered, advance_category);
    let normal_total = sums.normal_total();

    PeriodStats {
        period,
        display_totals: sums.display_totals(),
        normal_total,
        half: normal_total / 2.0,
        category_breakdown: category_breakdown(&filtered, categories),
        settlement: settle(&sums),
    }
}
