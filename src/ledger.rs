// 📒 Ledger - The core as seen by the CLI and the API server
//
// Holds the latest snapshot of each collection plus the selected period.
// State is only ever rebuilt from store snapshots: a write that fails
// leaves it exactly as it was.

use crate::aggregate::filter_range;
use crate::categories::CategoryList;
use crate::config::LedgerConfig;
use crate::db::{ActivityAction, ActivityEntry, ExpenseRecord, RemittanceRecord};
use crate::error::{LedgerError, Result};
use crate::import::ImportSummary;
use crate::period::{
    available_periods, calendar_range_of, payroll_period_of, payroll_range_of, DateRange, PeriodKey,
    PeriodMode,
};
use crate::reconcile::{
    apply_plan, plan_rent_entry, plan_settlement_entry, remittance_stats, GenerateOutcome, RemittanceStats,
};
use crate::settlement::{period_stats, PeriodStats};
use crate::store::{RecordStore, SnapshotEvent};
use crate::trend::{trend, TrendPoint};
use crate::validation::{ExpenseForm, RemittanceForm};
use chrono::NaiveDate;
use std::collections::{BTreeSet, HashSet};
use std::sync::mpsc::Receiver;

pub struct Ledger<S: RecordStore> {
    store: S,
    config: LedgerConfig,
    snapshots: Receiver<SnapshotEvent>,
    expenses: Vec<ExpenseRecord>,
    categories: CategoryList,
    remittances: Vec<RemittanceRecord>,
    selected: PeriodKey,
}

impl<S: RecordStore> Ledger<S> {
    /// Subscribe to `store` and select today's payroll period
    pub fn new(mut store: S, config: LedgerConfig, today: NaiveDate) -> Result<Self> {
        let snapshots = store.subscribe()?;
        let categories = config.default_categories();

        let mut ledger = Ledger {
            store,
            config,
            snapshots,
            expenses: Vec::new(),
            categories,
            remittances: Vec::new(),
            selected: payroll_period_of(today),
        };
        ledger.sync();

        tracing::info!(
            expenses = ledger.expenses.len(),
            remittances = ledger.remittances.len(),
            period = %ledger.selected,
            "Ledger loaded"
        );
        Ok(ledger)
    }

    /// Apply every pending snapshot. Returns how many were applied.
    pub fn sync(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(event) = self.snapshots.try_recv() {
            tracing::debug!(collection = event.collection().as_str(), "Snapshot replaced");
            match event {
                SnapshotEvent::Expenses(expenses) => self.expenses = expenses,
                SnapshotEvent::Categories(categories) => self.categories = categories,
                SnapshotEvent::Remittances(remittances) => self.remittances = remittances,
            }
            applied += 1;
        }
        applied
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// Newest first
    pub fn expenses(&self) -> &[ExpenseRecord] {
        &self.expenses
    }

    pub fn categories(&self) -> &CategoryList {
        &self.categories
    }

    /// Newest first
    pub fn remittances(&self) -> &[RemittanceRecord] {
        &self.remittances
    }

    fn advance_category(&self) -> &str {
        &self.config.advance_category
    }

    // ========================================================================
    // PERIODS
    // ========================================================================

    pub fn resolve_period(&self, date: NaiveDate, mode: PeriodMode) -> (PeriodKey, DateRange) {
        let key = mode.resolve(date);
        (key, mode.range(key))
    }

    /// Payroll periods come from expenses, calendar periods from remittances
    pub fn available_periods(&self, mode: PeriodMode, today: NaiveDate) -> Vec<PeriodKey> {
        match mode {
            PeriodMode::Payroll => available_periods(self.expenses.iter().map(|e| e.date), mode, today),
            PeriodMode::Calendar => available_periods(self.remittances.iter().map(|r| r.date), mode, today),
        }
    }

    pub fn selected_period(&self) -> PeriodKey {
        self.selected
    }

    pub fn select_period(&mut self, period: PeriodKey) {
        self.selected = period;
    }

    /// Step to the closest older payroll period that has data. Works from a
    /// selection with no data too, so navigation never gets stuck.
    pub fn select_previous(&mut self, today: NaiveDate) -> Option<PeriodKey> {
        let selected = self.selected;
        let previous = self
            .available_periods(PeriodMode::Payroll, today)
            .into_iter()
            .find(|p| *p < selected)?;
        self.selected = previous;
        Some(previous)
    }

    /// Step to the closest newer payroll period that has data
    pub fn select_next(&mut self, today: NaiveDate) -> Option<PeriodKey> {
        let selected = self.selected;
        let next = self
            .available_periods(PeriodMode::Payroll, today)
            .into_iter()
            .rev()
            .find(|p| *p > selected)?;
        self.selected = next;
        Some(next)
    }

    // ========================================================================
    // EXPENSES
    // ========================================================================

    /// Expenses of a payroll period, newest first
    pub fn expenses_in(&self, period: PeriodKey) -> Vec<&ExpenseRecord> {
        filter_range(&self.expenses, &payroll_range_of(period))
    }

    pub fn stats(&self, period: PeriodKey) -> PeriodStats {
        period_stats(period, &self.expenses, &self.categories, self.advance_category())
    }

    pub fn trend(&self, now: NaiveDate) -> Vec<TrendPoint> {
        trend(&self.expenses, &self.categories, self.advance_category(), now)
    }

    pub fn add_expense(&mut self, form: ExpenseForm) -> Result<ExpenseRecord> {
        let mut record = form.validate(&self.config)?;
        self.sync();

        record.id = self.store.append_expense(&record)?;
        self.sync();

        tracing::info!(id = %record.id, date = %record.date, amount = record.amount, "Expense added");
        self.record_activity(ActivityEntry::for_expense(ActivityAction::Added, &record));
        Ok(record)
    }

    pub fn edit_expense(&mut self, id: &str, form: ExpenseForm) -> Result<ExpenseRecord> {
        let mut record = form.validate(&self.config)?;
        self.sync();

        if !self.expenses.iter().any(|e| e.id == id) {
            return Err(LedgerError::not_found("expense", id));
        }

        record.id = id.to_string();
        self.store.replace_expense(id, &record)?;
        self.sync();

        tracing::info!(id, "Expense updated");
        self.record_activity(ActivityEntry::for_expense(ActivityAction::Updated, &record));
        Ok(record)
    }

    pub fn delete_expense(&mut self, id: &str) -> Result<ExpenseRecord> {
        self.sync();

        let record = self
            .expenses
            .iter()
            .find(|e| e.id == id)
            .cloned()
            .ok_or_else(|| LedgerError::not_found("expense", id))?;

        self.store.delete_expense(id)?;
        self.sync();

        tracing::info!(id, "Expense deleted");
        self.record_activity(ActivityEntry::for_expense(ActivityAction::Deleted, &record));
        Ok(record)
    }

    /// Validate every row first, then append the ones not already stored.
    /// A bad row rejects the whole batch before anything is written.
    pub fn import_expenses(&mut self, forms: Vec<ExpenseForm>) -> Result<ImportSummary> {
        let records = forms
            .into_iter()
            .enumerate()
            .map(|(index, form)| {
                form.validate(&self.config).map_err(|e| match e {
                    LedgerError::InvalidInput { field, message } => LedgerError::InvalidInput {
                        // Header is line 1
                        field: format!("line {} {}", index + 2, field),
                        message,
                    },
                    other => other,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        self.sync();
        let mut seen: HashSet<String> = self.expenses.iter().map(|e| e.idempotency_hash()).collect();
        let mut periods = BTreeSet::new();
        let mut summary = ImportSummary::default();

        let mut fresh = Vec::with_capacity(records.len());
        for record in records {
            if seen.insert(record.idempotency_hash()) {
                periods.insert(payroll_period_of(record.date));
                fresh.push(record);
            } else {
                summary.skipped_duplicates += 1;
            }
        }

        if let Err(e) = self.store.append_expenses(&fresh) {
            // Stores without transactions may have kept part of the batch
            let before = self.expenses.len();
            self.sync();
            tracing::error!(
                rows = fresh.len(),
                persisted = self.expenses.len().saturating_sub(before),
                error = %e,
                "Import failed"
            );
            return Err(e);
        }
        self.sync();

        summary.imported = fresh.len();
        summary.periods = periods.len();
        tracing::info!(
            imported = summary.imported,
            skipped = summary.skipped_duplicates,
            periods = summary.periods,
            "Import finished"
        );

        if summary.imported > 0 {
            self.record_activity(ActivityEntry::for_import(summary.imported, summary.periods));
        }
        Ok(summary)
    }

    pub fn activity_log(&self) -> Result<Vec<ActivityEntry>> {
        self.store.activity_log()
    }

    /// The activity log is observational: a failed append never undoes the
    /// mutation it describes.
    fn record_activity(&mut self, entry: ActivityEntry) {
        if let Err(e) = self.store.append_activity(&entry) {
            tracing::warn!(action = entry.action.as_str(), error = %e, "Failed to append activity log entry");
        }
    }

    // ========================================================================
    // CATEGORIES
    // ========================================================================

    pub fn add_category(&mut self, name: &str) -> Result<&CategoryList> {
        self.sync();
        let next = self.categories.with_added(name)?;
        self.save_categories(next)
    }

    pub fn remove_category(&mut self, name: &str) -> Result<&CategoryList> {
        self.sync();
        let next = self.categories.with_removed(name)?;
        self.save_categories(next)
    }

    fn save_categories(&mut self, next: CategoryList) -> Result<&CategoryList> {
        self.store.save_categories(&next)?;
        self.sync();

        tracing::info!(version = next.version, count = next.len(), "Category list saved");
        Ok(&self.categories)
    }

    // ========================================================================
    // REMITTANCES
    // ========================================================================

    /// Remittances of a calendar month, newest first
    pub fn remittances_in(&self, period: PeriodKey) -> Vec<&RemittanceRecord> {
        filter_range(&self.remittances, &calendar_range_of(period))
    }

    pub fn remittance_stats(&self, period: PeriodKey) -> RemittanceStats {
        remittance_stats(&self.remittances_in(period))
    }

    pub fn add_remittance(&mut self, form: RemittanceForm) -> Result<RemittanceRecord> {
        let mut record = form.validate()?;

        record.id = self.store.append_remittance(&record)?;
        self.sync();

        tracing::info!(id = %record.id, amount = record.amount, target = record.target.label(), "Remittance added");
        Ok(record)
    }

    pub fn delete_remittance(&mut self, id: &str) -> Result<()> {
        self.store.delete_remittance(id)?;
        self.sync();

        tracing::info!(id, "Remittance deleted");
        Ok(())
    }

    /// Rent entry for the calendar month, replacing any earlier one
    pub fn generate_rent_entry(&mut self, period: PeriodKey) -> Result<RemittanceRecord> {
        let amount = self.config.rent_amount;
        self.generate_rent_entry_for_amount(period, amount)
    }

    pub fn generate_rent_entry_for_amount(&mut self, period: PeriodKey, amount: f64) -> Result<RemittanceRecord> {
        if !amount.is_finite() || amount <= 0.0 {
            return Err(LedgerError::invalid("amount", "rent must be a positive number"));
        }

        self.sync();
        let plan = plan_rent_entry(period, amount, &self.remittances);
        let record = apply_plan(&mut self.store, plan)?;
        self.sync();
        Ok(record)
    }

    /// Mirror the settlement of the payroll period with the same key into the
    /// remittances of the calendar month
    pub fn generate_settlement_entry(&mut self, period: PeriodKey) -> Result<GenerateOutcome> {
        self.sync();
        let settlement = self.stats(period).settlement;

        let Some(plan) = plan_settlement_entry(period, &settlement, &self.remittances) else {
            tracing::info!(period = %period, "Nothing to settle");
            return Ok(GenerateOutcome::NothingToSettle);
        };

        let record = apply_plan(&mut self.store, plan)?;
        self.sync();
        Ok(GenerateOutcome::Generated { record })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Participant, SqliteStore};
    use crate::reconcile::{RENT_MEMO, SETTLEMENT_MEMO};
    use crate::settlement::SettlementDirection;

    fn today() -> NaiveDate {
        "2025-03-10".parse().unwrap()
    }

    fn key(s: &str) -> PeriodKey {
        s.parse().unwrap()
    }

    fn new_ledger() -> Ledger<SqliteStore> {
        Ledger::new(SqliteStore::open_in_memory().unwrap(), LedgerConfig::default(), today()).unwrap()
    }

    fn form(date: &str, amount: &str, person: &str, category: &str) -> ExpenseForm {
        ExpenseForm {
            date: date.to_string(),
            description: format!("{} on {}", category, date),
            amount: amount.to_string(),
            participant: person.to_string(),
            category: category.to_string(),
            memo: None,
        }
    }

    #[test]
    fn test_new_ledger_selects_today() {
        let ledger = new_ledger();
        assert_eq!(ledger.selected_period(), key("2025-03"));
        assert_eq!(ledger.available_periods(PeriodMode::Payroll, today()), vec![key("2025-03")]);
        assert_eq!(ledger.categories(), &CategoryList::with_defaults());
    }

    #[test]
    fn test_add_expense_updates_snapshot_and_log() {
        let mut ledger = new_ledger();
        let record = ledger.add_expense(form("2025-03-01", "3000", "ひも", "食費")).unwrap();

        assert!(!record.id.is_empty());
        assert_eq!(ledger.expenses().len(), 1);

        let log = ledger.activity_log().unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].action, ActivityAction::Added);
    }

    #[test]
    fn test_invalid_expense_never_reaches_store() {
        let mut ledger = new_ledger();
        let err = ledger.add_expense(form("2025-03-01", "-10", "ひも", "食費")).unwrap_err();

        assert!(err.is_invalid_input());
        assert!(ledger.expenses().is_empty());
        assert!(ledger.activity_log().unwrap().is_empty());
    }

    #[test]
    fn test_edit_and_delete_expense() {
        let mut ledger = new_ledger();
        let record = ledger.add_expense(form("2025-03-01", "3000", "ひも", "食費")).unwrap();

        let edited = ledger
            .edit_expense(&record.id, form("2025-03-02", "3500", "あづ", "外食"))
            .unwrap();
        assert_eq!(edited.id, record.id);
        assert_eq!(ledger.expenses()[0].amount, 3500.0);
        assert_eq!(ledger.expenses()[0].participant, Participant::Second);

        ledger.delete_expense(&record.id).unwrap();
        assert!(ledger.expenses().is_empty());

        let actions: Vec<ActivityAction> = ledger.activity_log().unwrap().iter().map(|e| e.action).collect();
        assert_eq!(
            actions,
            vec![ActivityAction::Deleted, ActivityAction::Updated, ActivityAction::Added]
        );

        assert!(matches!(
            ledger.delete_expense(&record.id),
            Err(LedgerError::NotFound { .. })
        ));
    }

    #[test]
    fn test_stats_scenario_with_advance_payment() {
        let mut ledger = new_ledger();
        ledger.add_expense(form("2025-02-25", "3000", "ひも", "食費")).unwrap();
        ledger.add_expense(form("2025-03-05", "1000", "あづ", "外食")).unwrap();
        ledger.add_expense(form("2025-03-06", "1500", "あづ", "立て替え")).unwrap();

        let stats = ledger.stats(key("2025-03"));
        assert_eq!(stats.normal_total, 4000.0);
        assert_eq!(stats.half, 2000.0);
        assert_eq!(stats.settlement.amount, 500.0);
        assert_eq!(stats.settlement.direction, SettlementDirection::FirstToSecond);
        assert_eq!(ledger.expenses_in(key("2025-03")).len(), 3);
    }

    #[test]
    fn test_period_navigation() {
        let mut ledger = new_ledger();
        ledger.add_expense(form("2025-01-10", "100", "ひも", "食費")).unwrap();
        ledger.add_expense(form("2024-11-10", "100", "ひも", "食費")).unwrap();

        assert_eq!(ledger.select_next(today()), None);
        assert_eq!(ledger.select_previous(today()), Some(key("2025-01")));
        assert_eq!(ledger.select_previous(today()), Some(key("2024-11")));
        assert_eq!(ledger.select_previous(today()), None);
        assert_eq!(ledger.select_next(today()), Some(key("2025-01")));
    }

    #[test]
    fn test_navigation_from_period_without_data() {
        let mut ledger = new_ledger();
        ledger.add_expense(form("2025-01-10", "100", "ひも", "食費")).unwrap();

        ledger.select_period(key("2024-06"));
        assert_eq!(ledger.select_previous(today()), None);
        assert_eq!(ledger.select_next(today()), Some(key("2025-01")));

        ledger.select_period(key("2024-12"));
        assert_eq!(ledger.select_previous(today()), None);
        ledger.select_period(key("2025-02"));
        assert_eq!(ledger.select_previous(today()), Some(key("2025-01")));
        ledger.select_period(key("2025-02"));
        assert_eq!(ledger.select_next(today()), Some(key("2025-03")));
    }

    #[test]
    fn test_resolve_period_both_modes() {
        let ledger = new_ledger();
        let date: NaiveDate = "2024-12-25".parse().unwrap();

        let (payroll, range) = ledger.resolve_period(date, PeriodMode::Payroll);
        assert_eq!(payroll, key("2025-01"));
        assert_eq!(range.start, "2024-12-21".parse::<NaiveDate>().unwrap());
        assert_eq!(range.end, "2025-01-20".parse::<NaiveDate>().unwrap());

        let (calendar, range) = ledger.resolve_period(date, PeriodMode::Calendar);
        assert_eq!(calendar, key("2024-12"));
        assert_eq!(range.start, "2024-12-01".parse::<NaiveDate>().unwrap());
        assert_eq!(range.end, "2024-12-31".parse::<NaiveDate>().unwrap());
    }

    #[test]
    fn test_categories_are_versioned_commands() {
        let mut ledger = new_ledger();
        let version = ledger.add_category("旅行").unwrap().version;
        assert_eq!(version, 2);
        assert!(ledger.categories().contains("旅行"));

        ledger.remove_category("デート").unwrap();
        assert!(!ledger.categories().contains("デート"));
        assert_eq!(ledger.categories().version, 3);

        assert!(ledger.add_category("旅行").is_err());
    }

    #[test]
    fn test_generate_rent_twice_keeps_one_entry() {
        let mut ledger = new_ledger();
        ledger.generate_rent_entry(key("2025-02")).unwrap();
        let second = ledger.generate_rent_entry_for_amount(key("2025-02"), 85000.0).unwrap();

        let rents: Vec<&RemittanceRecord> = ledger
            .remittances()
            .iter()
            .filter(|r| r.is_auto_entry(RENT_MEMO))
            .collect();
        assert_eq!(rents.len(), 1);
        assert_eq!(rents[0].id, second.id);
        assert_eq!(rents[0].amount, 85000.0);
        assert_eq!(rents[0].date, "2025-02-28".parse::<NaiveDate>().unwrap());
    }

    #[test]
    fn test_generate_settlement_entry() {
        let mut ledger = new_ledger();
        ledger.add_expense(form("2025-03-01", "3000", "ひも", "食費")).unwrap();
        ledger.add_expense(form("2025-03-02", "1000", "あづ", "食費")).unwrap();

        let outcome = ledger.generate_settlement_entry(key("2025-03")).unwrap();
        let GenerateOutcome::Generated { record } = outcome else {
            panic!("expected a generated entry");
        };
        // Second owes first: the first participant receives
        assert_eq!(record.amount, -1000.0);
        assert_eq!(record.memo, SETTLEMENT_MEMO);
        assert_eq!(record.date, "2025-03-31".parse::<NaiveDate>().unwrap());

        // More spending by the second participant flips the direction
        ledger.add_expense(form("2025-03-03", "4000", "あづ", "食費")).unwrap();
        ledger.generate_settlement_entry(key("2025-03")).unwrap();

        let entries: Vec<&RemittanceRecord> = ledger.remittances_in(key("2025-03"));
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].amount, 1000.0);

        let stats = ledger.remittance_stats(key("2025-03"));
        assert_eq!(stats.total_outgoing, 1000.0);
        assert_eq!(stats.total_incoming, 0.0);
    }

    #[test]
    fn test_generate_settlement_nothing_to_settle() {
        let mut ledger = new_ledger();
        assert_eq!(
            ledger.generate_settlement_entry(key("2025-03")).unwrap(),
            GenerateOutcome::NothingToSettle
        );
        assert!(ledger.remittances().is_empty());
    }

    #[test]
    fn test_manual_remittances_and_stats() {
        let mut ledger = new_ledger();
        let manual = ledger
            .add_remittance(RemittanceForm {
                date: "2025-03-15".to_string(),
                amount: "12000".to_string(),
                target: "Card Co".to_string(),
                memo: Some("card bill".to_string()),
            })
            .unwrap();
        ledger.generate_rent_entry_for_amount(key("2025-03"), 80000.0).unwrap();

        let stats = ledger.remittance_stats(key("2025-03"));
        assert_eq!(stats.total_outgoing, 92000.0);
        assert_eq!(stats.per_target.len(), 2);
        assert_eq!(
            ledger.available_periods(PeriodMode::Calendar, today()),
            vec![key("2025-03")]
        );

        ledger.delete_remittance(&manual.id).unwrap();
        assert_eq!(ledger.remittances().len(), 1);
    }

    #[test]
    fn test_import_dedupes_and_logs_once() {
        let mut ledger = new_ledger();
        let rows = vec![
            form("2025-02-01", "1000", "ひも", "食費"),
            form("2025-02-25", "2000", "あづ", "外食"),
            form("2025-02-01", "1000", "ひも", "食費"),
        ];

        let summary = ledger.import_expenses(rows.clone()).unwrap();
        assert_eq!(summary.imported, 2);
        assert_eq!(summary.skipped_duplicates, 1);
        assert_eq!(summary.periods, 2);

        let again = ledger.import_expenses(rows).unwrap();
        assert_eq!(again.imported, 0);
        assert_eq!(again.skipped_duplicates, 3);

        assert_eq!(ledger.expenses().len(), 2);
        assert_eq!(ledger.activity_log().unwrap().len(), 1);
    }

    #[test]
    fn test_import_rejects_batch_with_bad_row() {
        let mut ledger = new_ledger();
        let rows = vec![
            form("2025-02-01", "1000", "ひも", "食費"),
            form("2025-02-02", "abc", "ひも", "食費"),
        ];

        let err = ledger.import_expenses(rows).unwrap_err();
        assert!(err.to_string().contains("line 3"));
        assert!(ledger.expenses().is_empty());
    }

    /// Store whose writes always fail
    struct UnavailableStore;

    impl RecordStore for UnavailableStore {
        fn subscribe(&mut self) -> Result<Receiver<SnapshotEvent>> {
            let (tx, rx) = std::sync::mpsc::channel();
            let _ = tx.send(SnapshotEvent::Expenses(Vec::new()));
            Ok(rx)
        }
        fn append_expense(&mut self, _: &ExpenseRecord) -> Result<String> {
            Err(LedgerError::StoreUnavailable("offline".to_string()))
        }
        fn replace_expense(&mut self, _: &str, _: &ExpenseRecord) -> Result<()> {
            Err(LedgerError::StoreUnavailable("offline".to_string()))
        }
        fn delete_expense(&mut self, _: &str) -> Result<()> {
            Err(LedgerError::StoreUnavailable("offline".to_string()))
        }
        fn save_categories(&mut self, _: &CategoryList) -> Result<()> {
            Err(LedgerError::StoreUnavailable("offline".to_string()))
        }
        fn append_remittance(&mut self, _: &RemittanceRecord) -> Result<String> {
            Err(LedgerError::StoreUnavailable("offline".to_string()))
        }
        fn delete_remittance(&mut self, _: &str) -> Result<()> {
            Err(LedgerError::StoreUnavailable("offline".to_string()))
        }
        fn append_activity(&mut self, _: &ActivityEntry) -> Result<()> {
            Err(LedgerError::StoreUnavailable("offline".to_string()))
        }
        fn activity_log(&self) -> Result<Vec<ActivityEntry>> {
            Err(LedgerError::StoreUnavailable("offline".to_string()))
        }
    }

    #[test]
    fn test_store_failure_leaves_state_unchanged() {
        let mut ledger = Ledger::new(UnavailableStore, LedgerConfig::default(), today()).unwrap();

        let err = ledger.add_expense(form("2025-03-01", "3000", "ひも", "食費")).unwrap_err();
        assert!(matches!(err, LedgerError::StoreUnavailable(_)));
        assert!(ledger.expenses().is_empty());

        assert!(ledger.add_category("旅行").is_err());
        assert_eq!(ledger.categories().version, 1);

        assert!(ledger.generate_rent_entry(key("2025-03")).is_err());
        assert!(ledger.remittances().is_empty());
    }

    #[test]
    fn test_import_into_unavailable_store_changes_nothing() {
        let mut ledger = Ledger::new(UnavailableStore, LedgerConfig::default(), today()).unwrap();
        let rows = vec![
            form("2025-02-01", "1000", "ひも", "食費"),
            form("2025-02-02", "2000", "あづ", "外食"),
        ];

        assert!(matches!(ledger.import_expenses(rows), Err(LedgerError::StoreUnavailable(_))));
        assert!(ledger.expenses().is_empty());
    }

    /// SQLite store whose single-row expense appends start failing after
    /// `remaining` successes. Batches fall back to the row-by-row default.
    struct FlakyStore {
        inner: SqliteStore,
        remaining: usize,
    }

    impl RecordStore for FlakyStore {
        fn subscribe(&mut self) -> Result<Receiver<SnapshotEvent>> {
            self.inner.subscribe()
        }
        fn append_expense(&mut self, record: &ExpenseRecord) -> Result<String> {
            if self.remaining == 0 {
                return Err(LedgerError::StoreUnavailable("disk full".to_string()));
            }
            self.remaining -= 1;
            self.inner.append_expense(record)
        }
        fn replace_expense(&mut self, id: &str, record: &ExpenseRecord) -> Result<()> {
            self.inner.replace_expense(id, record)
        }
        fn delete_expense(&mut self, id: &str) -> Result<()> {
            self.inner.delete_expense(id)
        }
        fn save_categories(&mut self, categories: &CategoryList) -> Result<()> {
            self.inner.save_categories(categories)
        }
        fn append_remittance(&mut self, record: &RemittanceRecord) -> Result<String> {
            self.inner.append_remittance(record)
        }
        fn delete_remittance(&mut self, id: &str) -> Result<()> {
            self.inner.delete_remittance(id)
        }
        fn append_activity(&mut self, entry: &ActivityEntry) -> Result<()> {
            self.inner.append_activity(entry)
        }
        fn activity_log(&self) -> Result<Vec<ActivityEntry>> {
            self.inner.activity_log()
        }
    }

    #[test]
    fn test_partial_import_is_visible_after_failure() {
        let store = FlakyStore {
            inner: SqliteStore::open_in_memory().unwrap(),
            remaining: 2,
        };
        let mut ledger = Ledger::new(store, LedgerConfig::default(), today()).unwrap();
        let rows = vec![
            form("2025-02-01", "1000", "ひも", "食費"),
            form("2025-02-02", "2000", "あづ", "外食"),
            form("2025-02-03", "3000", "ひも", "日用品"),
        ];

        assert!(ledger.import_expenses(rows).is_err());
        // Snapshot matches what the store kept; no import entry is logged
        assert_eq!(ledger.expenses().len(), 2);
        assert!(ledger.activity_log().unwrap().is_empty());
    }

    #[test]
    fn test_import_skips_rows_from_earlier_import() {
        let mut ledger = new_ledger();
        ledger.import_expenses(vec![form("2025-02-01", "1000", "ひも", "食費")]).unwrap();

        let summary = ledger
            .import_expenses(vec![
                form("2025-02-01", "1000", "ひも", "食費"),
                form("2025-02-05", "500", "あづ", "外食"),
            ])
            .unwrap();
        assert_eq!(summary.imported, 1);
        assert_eq!(summary.skipped_duplicates, 1);
        assert_eq!(summary.periods, 1);
        assert_eq!(ledger.expenses().len(), 2);
    }

    #[test]
    fn test_trend_has_six_points() {
        let mut ledger = new_ledger();
        ledger.add_expense(form("2025-03-01", "1000", "ひも", "食費")).unwrap();

        let points = ledger.trend(today());
        assert_eq!(points.len(), 6);
        assert_eq!(points[5].total, 1000.0);
    }
}
