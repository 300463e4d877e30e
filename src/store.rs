// 🔌 Record Store Boundary
//
// The ledger never patches its state incrementally: the store publishes a
// full-collection snapshot after every successful write and the ledger
// replaces its copy wholesale.

use crate::categories::CategoryList;
use crate::db::{ActivityEntry, ExpenseRecord, RemittanceRecord};
use crate::error::Result;
use std::sync::mpsc::Receiver;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collection {
    Expenses,
    Categories,
    Remittances,
}

impl Collection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Expenses => "expenses",
            Collection::Categories => "categories",
            Collection::Remittances => "remittances",
        }
    }
}

/// Snapshot-replaced event for one collection
#[derive(Debug, Clone)]
pub enum SnapshotEvent {
    Expenses(Vec<ExpenseRecord>),
    Categories(CategoryList),
    Remittances(Vec<RemittanceRecord>),
}

impl SnapshotEvent {
    pub fn collection(&self) -> Collection {
        match self {
            SnapshotEvent::Expenses(_) => Collection::Expenses,
            SnapshotEvent::Categories(_) => Collection::Categories,
            SnapshotEvent::Remittances(_) => Collection::Remittances,
        }
    }
}

/// Persistent, push-notified record store
///
/// Writes either succeed (and a fresh snapshot is published) or fail with
/// `LedgerError::StoreUnavailable`, in which case nothing changed.
pub trait RecordStore {
    /// Subscribe to snapshots. The current state of every stored collection
    /// is delivered immediately.
    fn subscribe(&mut self) -> Result<Receiver<SnapshotEvent>>;

    /// Returns the generated identifier
    fn append_expense(&mut self, record: &ExpenseRecord) -> Result<String>;

    /// Append a batch, returning identifiers in order.
    ///
    /// Stores that support transactions should override this so a failure
    /// writes nothing.
    fn append_expenses(&mut self, records: &[ExpenseRecord]) -> Result<Vec<String>> {
        records.iter().map(|record| self.append_expense(record)).collect()
    }
    fn replace_expense(&mut self, id: &str, record: &ExpenseRecord) -> Result<()>;
    fn delete_expense(&mut self, id: &str) -> Result<()>;

    fn save_categories(&mut self, categories: &CategoryList) -> Result<()>;

    /// Returns the generated identifier
    fn append_remittance(&mut self, record: &RemittanceRecord) -> Result<String>;
    fn delete_remittance(&mut self, id: &str) -> Result<()>;

    /// Delete `stale_ids` then append `record`.
    ///
    /// Stores that support transactions should override this so the
    /// replacement is atomic.
    fn swap_remittances(&mut self, stale_ids: &[String], record: &RemittanceRecord) -> Result<String> {
        for id in stale_ids {
            self.delete_remittance(id)?;
        }
        self.append_remittance(record)
    }

    fn append_activity(&mut self, entry: &ActivityEntry) -> Result<()>;

    /// Newest first
    fn activity_log(&self) -> Result<Vec<ActivityEntry>>;
}
