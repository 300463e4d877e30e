// 🔁 Remittance Reconciler - Auto-generated remittance entries
//
// Rent and ledger-settlement transfers are mirrored into the remittance
// ledger as `auto` entries. Regenerating deletes every auto entry with the
// same memo key in the calendar month and inserts the new one, so at most
// one exists per (month, key).

use crate::aggregate::{filter_range, sum_by};
use crate::db::{RemittanceRecord, RemittanceTarget};
use crate::error::Result;
use crate::period::{calendar_range_of, PeriodKey};
use crate::settlement::Settlement;
use crate::store::RecordStore;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const RENT_MEMO: &str = "rent";
pub const SETTLEMENT_MEMO: &str = "ledger-settlement";

// ============================================================================
// PLANS
// ============================================================================

/// Replacement to apply: delete `stale_ids`, then insert `record`
#[derive(Debug, Clone, PartialEq)]
pub struct AutoEntryPlan {
    pub stale_ids: Vec<String>,
    pub record: RemittanceRecord,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum GenerateOutcome {
    Generated { record: RemittanceRecord },
    /// Settlement rounds to zero; nothing was written
    NothingToSettle,
}

/// Ids of auto entries with `memo_key` dated inside `period`
pub fn stale_auto_entries(period: PeriodKey, memo_key: &str, existing: &[RemittanceRecord]) -> Vec<String> {
    filter_range(existing, &calendar_range_of(period))
        .into_iter()
        .filter(|r| r.is_auto_entry(memo_key))
        .map(|r| r.id.clone())
        .collect()
}

fn auto_entry(period: PeriodKey, amount: f64, memo_key: &str) -> RemittanceRecord {
    RemittanceRecord {
        id: String::new(),
        date: period.last_day(),
        amount,
        target: RemittanceTarget::Partner,
        memo: memo_key.to_string(),
        auto: true,
    }
}

pub fn plan_rent_entry(period: PeriodKey, rent_amount: f64, existing: &[RemittanceRecord]) -> AutoEntryPlan {
    AutoEntryPlan {
        stale_ids: stale_auto_entries(period, RENT_MEMO, existing),
        record: auto_entry(period, rent_amount, RENT_MEMO),
    }
}

/// `None` when there is nothing to settle
pub fn plan_settlement_entry(
    period: PeriodKey,
    settlement: &Settlement,
    existing: &[RemittanceRecord],
) -> Option<AutoEntryPlan> {
    if settlement.is_settled() {
        return None;
    }

    Some(AutoEntryPlan {
        stale_ids: stale_auto_entries(period, SETTLEMENT_MEMO, existing),
        record: auto_entry(period, settlement.signed_amount(), SETTLEMENT_MEMO),
    })
}

/// Write the plan through the store. On failure nothing is assumed changed.
pub fn apply_plan<S: RecordStore + ?Sized>(store: &mut S, plan: AutoEntryPlan) -> Result<RemittanceRecord> {
    let id = store.swap_remittances(&plan.stale_ids, &plan.record)?;

    tracing::info!(
        memo = %plan.record.memo,
        date = %plan.record.date,
        amount = plan.record.amount,
        replaced = plan.stale_ids.len(),
        "Auto remittance generated"
    );

    Ok(RemittanceRecord { id, ..plan.record })
}

// ============================================================================
// REMITTANCE STATS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetTotal {
    pub target: String,
    pub amount: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RemittanceStats {
    /// Sorted by target label
    pub per_target: Vec<TargetTotal>,
    /// Sum of positive entries
    pub total_outgoing: f64,
    /// Magnitude of the sum of negative entries
    pub total_incoming: f64,
}

pub fn remittance_stats(filtered: &[&RemittanceRecord]) -> RemittanceStats {
    let mut per_target: BTreeMap<String, f64> = BTreeMap::new();
    for record in filtered {
        *per_target.entry(record.target.label().to_string()).or_insert(0.0) += record.amount;
    }

    RemittanceStats {
        per_target: per_target
            .into_iter()
            .map(|(target, amount)| TargetTotal { target, amount })
            .collect(),
        total_outgoing: sum_by(filtered, |r: &RemittanceRecord| r.amount > 0.0),
        total_incoming: sum_by(filtered, |r: &RemittanceRecord| r.amount < 0.0).abs(),
    }
}
