// Pair Ledger - Core Library
// Exposes all modules for use in CLI, API server, and tests

pub mod error;
pub mod config;
pub mod logging;
pub mod period;         // Period Resolver: payroll (21st → 20th) and calendar months
pub mod categories;
pub mod db;             // Records + SQLite record store
pub mod store;          // Record store boundary
pub mod aggregate;      // Aggregator
pub mod settlement;     // Settlement Calculator
pub mod reconcile;      // Remittance Reconciler
pub mod trend;          // Trend Generator
pub mod validation;
pub mod import;
pub mod ledger;

// Re-export commonly used types
pub use error::{LedgerError, Result};
pub use config::{LedgerConfig, ParticipantNames};
pub use period::{
    available_periods, calendar_period_of, calendar_range_of, payroll_period_of,
    payroll_range_of, period_label, DateRange, PeriodKey, PeriodMode,
};
pub use categories::CategoryList;
pub use db::{
    ActivityAction, ActivityEntry, ExpenseRecord, Participant,
    RemittanceRecord, RemittanceTarget, SqliteStore,
};
pub use store::{Collection, RecordStore, SnapshotEvent};
pub use aggregate::{CategoryAmount, PerParticipant, SpendingSums};
pub use settlement::{settle, PeriodStats, Settlement, SettlementDirection};
pub use reconcile::{GenerateOutcome, RemittanceStats, TargetTotal};
pub use trend::TrendPoint;
pub use validation::{ExpenseForm, RemittanceForm};
pub use import::{load_csv, ImportSummary};
pub use ledger::Ledger;
