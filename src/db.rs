use crate::categories::CategoryList;
use crate::error::{LedgerError, Result};
use crate::store::{Collection, RecordStore, SnapshotEvent};
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::mpsc::{self, Receiver, Sender};

// ============================================================================
// PARTICIPANTS
// ============================================================================

/// One of the two fixed ledger participants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Participant {
    First,
    Second,
}

impl Participant {
    pub fn other(self) -> Participant {
        match self {
            Participant::First => Participant::Second,
            Participant::Second => Participant::First,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Participant::First => "first",
            Participant::Second => "second",
        }
    }
}

impl fmt::Display for Participant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Participant {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "first" | "p1" | "1" => Ok(Participant::First),
            "second" | "p2" | "2" => Ok(Participant::Second),
            other => Err(LedgerError::invalid(
                "participant",
                format!("unknown participant '{}'", other),
            )),
        }
    }
}

// ============================================================================
// EXPENSE RECORD
// ============================================================================

/// A single shared expense, logged by one participant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpenseRecord {
    /// Assigned by the store on append
    #[serde(default)]
    pub id: String,

    pub date: NaiveDate,
    pub description: String,

    /// Always > 0
    pub amount: f64,

    /// Who keyed the expense in (not necessarily who bears it)
    pub participant: Participant,

    pub category: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memo: Option<String>,
}

impl ExpenseRecord {
    /// Hash for import deduplication. Identity is `id`; this only says
    /// "the same line was already imported".
    pub fn idempotency_hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(format!(
            "{}|{}|{}|{}",
            self.date, self.description, self.amount, self.participant
        ));
        format!("{:x}", hasher.finalize())
    }

    pub fn is_advance(&self, advance_category: &str) -> bool {
        self.category == advance_category
    }

    /// Economic bearer: the logger, unless this is an advance payment made
    /// on the other participant's behalf.
    pub fn bearer(&self, advance_category: &str) -> Participant {
        if self.is_advance(advance_category) {
            self.participant.other()
        } else {
            self.participant
        }
    }
}

// ============================================================================
// REMITTANCE RECORD
// ============================================================================

pub const PARTNER_TARGET: &str = "partner";

/// Who the first participant sends money to (or receives money from)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum RemittanceTarget {
    /// The second participant
    Partner,
    /// Bank, card issuer, landlord...
    Institution(String),
}

impl RemittanceTarget {
    pub fn label(&self) -> &str {
        match self {
            RemittanceTarget::Partner => PARTNER_TARGET,
            RemittanceTarget::Institution(name) => name,
        }
    }
}

impl FromStr for RemittanceTarget {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        match s.to_lowercase().as_str() {
            "" => Err(LedgerError::invalid("target", "target must not be empty")),
            PARTNER_TARGET | "p2" | "second" => Ok(RemittanceTarget::Partner),
            _ => Ok(RemittanceTarget::Institution(s.to_string())),
        }
    }
}

impl TryFrom<String> for RemittanceTarget {
    type Error = LedgerError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<RemittanceTarget> for String {
    fn from(target: RemittanceTarget) -> Self {
        target.label().to_string()
    }
}

/// A money transfer. Positive = first participant sends, negative = receives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemittanceRecord {
    #[serde(default)]
    pub id: String,

    pub date: NaiveDate,

    /// Signed, never zero
    pub amount: f64,

    pub target: RemittanceTarget,

    /// Dedupe key when `auto` ("rent", "ledger-settlement")
    #[serde(default)]
    pub memo: String,

    /// Machine-generated, replaced on regenerate
    #[serde(default)]
    pub auto: bool,
}

impl RemittanceRecord {
    pub fn is_auto_entry(&self, memo_key: &str) -> bool {
        self.auto && self.memo == memo_key
    }
}

// ============================================================================
// ACTIVITY LOG
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityAction {
    Added,
    Updated,
    Deleted,
    Imported,
}

impl ActivityAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityAction::Added => "added",
            ActivityAction::Updated => "updated",
            ActivityAction::Deleted => "deleted",
            ActivityAction::Imported => "imported",
        }
    }
}

impl FromStr for ActivityAction {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "added" => Ok(ActivityAction::Added),
            "updated" => Ok(ActivityAction::Updated),
            "deleted" => Ok(ActivityAction::Deleted),
            "imported" => Ok(ActivityAction::Imported),
            other => Err(LedgerError::invalid("action", format!("unknown action '{}'", other))),
        }
    }
}

/// Append-only audit entry ("every change is an event")
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityEntry {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub action: ActivityAction,
    pub details: serde_json::Value,
}

impl ActivityEntry {
    pub fn new(action: ActivityAction, details: serde_json::Value) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            action,
            details,
        }
    }

    pub fn for_expense(action: ActivityAction, expense: &ExpenseRecord) -> Self {
        Self::new(
            action,
            serde_json::json!({
                "participant": expense.participant,
                "description": expense.description,
                "amount": expense.amount,
                "category": expense.category,
                "date": expense.date,
            }),
        )
    }

    pub fn for_import(count: usize, periods: usize) -> Self {
        Self::new(
            ActivityAction::Imported,
            serde_json::json!({ "count": count, "periods": periods }),
        )
    }
}

// ============================================================================
// SCHEMA
// ============================================================================

pub fn setup_database(conn: &Connection) -> Result<()> {
    // WAL for crash recovery; in-memory databases report "memory" and ignore it
    conn.pragma_update(None, "journal_mode", "WAL")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS expenses (
            id TEXT PRIMARY KEY,
            date TEXT NOT NULL,
            description TEXT NOT NULL,
            amount REAL NOT NULL CHECK (amount > 0),
            participant TEXT NOT NULL,
            category TEXT NOT NULL,
            memo TEXT,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS remittances (
            id TEXT PRIMARY KEY,
            date TEXT NOT NULL,
            amount REAL NOT NULL,
            target TEXT NOT NULL,
            memo TEXT NOT NULL DEFAULT '',
            auto INTEGER NOT NULL DEFAULT 0,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    // Single row: the whole list is one versioned value
    conn.execute(
        "CREATE TABLE IF NOT EXISTS category_list (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            data TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS activity_log (
            id TEXT PRIMARY KEY,
            timestamp TEXT NOT NULL,
            action TEXT NOT NULL,
            details TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute("CREATE INDEX IF NOT EXISTS idx_expenses_date ON expenses(date)", [])?;
    conn.execute("CREATE INDEX IF NOT EXISTS idx_remittances_date ON remittances(date)", [])?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_activity_timestamp ON activity_log(timestamp)",
        [],
    )?;

    Ok(())
}

fn conversion_error<E>(idx: usize, err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(err))
}

fn parse_date_column(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<NaiveDate> {
    let text: String = row.get(idx)?;
    text.parse::<NaiveDate>().map_err(|e| conversion_error(idx, e))
}

// ============================================================================
// SQLITE STORE
// ============================================================================

/// `RecordStore` backed by SQLite
pub struct SqliteStore {
    conn: Connection,
    subscribers: Vec<Sender<SnapshotEvent>>,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        tracing::debug!(path = %path.display(), "Opened ledger database");
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    pub fn from_connection(conn: Connection) -> Result<Self> {
        setup_database(&conn)?;
        Ok(SqliteStore {
            conn,
            subscribers: Vec::new(),
        })
    }

    /// Newest first
    pub fn load_expenses(&self) -> Result<Vec<ExpenseRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, date, description, amount, participant, category, memo
             FROM expenses
             ORDER BY date DESC, rowid DESC",
        )?;

        let expenses = stmt
            .query_map([], |row| {
                let participant: String = row.get(4)?;
                Ok(ExpenseRecord {
                    id: row.get(0)?,
                    date: parse_date_column(row, 1)?,
                    description: row.get(2)?,
                    amount: row.get(3)?,
                    participant: participant.parse().map_err(|e| conversion_error(4, e))?,
                    category: row.get(5)?,
                    memo: row.get(6)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(expenses)
    }

    /// Newest first
    pub fn load_remittances(&self) -> Result<Vec<RemittanceRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, date, amount, target, memo, auto
             FROM remittances
             ORDER BY date DESC, rowid DESC",
        )?;

        let remittances = stmt
            .query_map([], |row| {
                let target: String = row.get(3)?;
                Ok(RemittanceRecord {
                    id: row.get(0)?,
                    date: parse_date_column(row, 1)?,
                    amount: row.get(2)?,
                    target: target.parse().map_err(|e| conversion_error(3, e))?,
                    memo: row.get(4)?,
                    auto: row.get(5)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(remittances)
    }

    /// `None` until a list has been saved
    pub fn load_categories(&self) -> Result<Option<CategoryList>> {
        let data: Option<String> = self
            .conn
            .query_row("SELECT data FROM category_list WHERE id = 1", [], |row| row.get(0))
            .optional()?;

        match data {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    fn snapshot(&self, collection: Collection) -> Result<Option<SnapshotEvent>> {
        Ok(match collection {
            Collection::Expenses => Some(SnapshotEvent::Expenses(self.load_expenses()?)),
            Collection::Remittances => Some(SnapshotEvent::Remittances(self.load_remittances()?)),
            Collection::Categories => self.load_categories()?.map(SnapshotEvent::Categories),
        })
    }

    /// Push a fresh snapshot to every live subscriber
    fn publish(&mut self, collection: Collection) {
        if self.subscribers.is_empty() {
            return;
        }

        match self.snapshot(collection) {
            Ok(Some(event)) => {
                self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
            }
            Ok(None) => {}
            Err(e) => {
                // The write itself succeeded; subscribers catch up on the next one
                tracing::warn!(collection = collection.as_str(), error = %e, "Failed to publish snapshot");
            }
        }
    }

    fn insert_expense(conn: &Connection, id: &str, record: &ExpenseRecord) -> Result<()> {
        conn.execute(
            "INSERT INTO expenses (id, date, description, amount, participant, category, memo)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                id,
                record.date.to_string(),
                record.description,
                record.amount,
                record.participant.as_str(),
                record.category,
                record.memo,
            ],
        )?;
        Ok(())
    }

    fn insert_remittance(conn: &Connection, id: &str, record: &RemittanceRecord) -> Result<()> {
        conn.execute(
            "INSERT INTO remittances (id, date, amount, target, memo, auto)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                id,
                record.date.to_string(),
                record.amount,
                record.target.label(),
                record.memo,
                record.auto,
            ],
        )?;
        Ok(())
    }
}

impl RecordStore for SqliteStore {
    fn subscribe(&mut self) -> Result<Receiver<SnapshotEvent>> {
        let (tx, rx) = mpsc::channel();

        for collection in [Collection::Expenses, Collection::Categories, Collection::Remittances] {
            if let Some(event) = self.snapshot(collection)? {
                // Receiver is still in scope, send cannot fail
                let _ = tx.send(event);
            }
        }

        self.subscribers.push(tx);
        Ok(rx)
    }

    fn append_expense(&mut self, record: &ExpenseRecord) -> Result<String> {
        let id = uuid::Uuid::new_v4().to_string();
        Self::insert_expense(&self.conn, &id, record)?;

        self.publish(Collection::Expenses);
        Ok(id)
    }

    fn append_expenses(&mut self, records: &[ExpenseRecord]) -> Result<Vec<String>> {
        let ids: Vec<String> = records.iter().map(|_| uuid::Uuid::new_v4().to_string()).collect();

        let tx = self.conn.transaction()?;
        for (id, record) in ids.iter().zip(records) {
            Self::insert_expense(&tx, id, record)?;
        }
        tx.commit()?;

        if !ids.is_empty() {
            self.publish(Collection::Expenses);
        }
        Ok(ids)
    }

    fn replace_expense(&mut self, id: &str, record: &ExpenseRecord) -> Result<()> {
        let changed = self.conn.execute(
            "UPDATE expenses
             SET date = ?2, description = ?3, amount = ?4, participant = ?5, category = ?6, memo = ?7
             WHERE id = ?1",
            params![
                id,
                record.date.to_string(),
                record.description,
                record.amount,
                record.participant.as_str(),
                record.category,
                record.memo,
            ],
        )?;

        if changed == 0 {
            return Err(LedgerError::not_found("expense", id));
        }

        self.publish(Collection::Expenses);
        Ok(())
    }

    fn delete_expense(&mut self, id: &str) -> Result<()> {
        let changed = self.conn.execute("DELETE FROM expenses WHERE id = ?1", params![id])?;
        if changed == 0 {
            return Err(LedgerError::not_found("expense", id));
        }

        self.publish(Collection::Expenses);
        Ok(())
    }

    fn save_categories(&mut self, categories: &CategoryList) -> Result<()> {
        let data = serde_json::to_string(categories)?;

        self.conn.execute(
            "INSERT INTO category_list (id, data, updated_at) VALUES (1, ?1, ?2)
             ON CONFLICT(id) DO UPDATE SET data = excluded.data, updated_at = excluded.updated_at",
            params![data, Utc::now().to_rfc3339()],
        )?;

        self.publish(Collection::Categories);
        Ok(())
    }

    fn append_remittance(&mut self, record: &RemittanceRecord) -> Result<String> {
        let id = uuid::Uuid::new_v4().to_string();
        Self::insert_remittance(&self.conn, &id, record)?;

        self.publish(Collection::Remittances);
        Ok(id)
    }

    fn delete_remittance(&mut self, id: &str) -> Result<()> {
        let changed = self.conn.execute("DELETE FROM remittances WHERE id = ?1", params![id])?;
        if changed == 0 {
            return Err(LedgerError::not_found("remittance", id));
        }

        self.publish(Collection::Remittances);
        Ok(())
    }

    fn swap_remittances(&mut self, stale_ids: &[String], record: &RemittanceRecord) -> Result<String> {
        let id = uuid::Uuid::new_v4().to_string();

        let tx = self.conn.transaction()?;
        for stale in stale_ids {
            tx.execute("DELETE FROM remittances WHERE id = ?1", params![stale])?;
        }
        Self::insert_remittance(&tx, &id, record)?;
        tx.commit()?;

        self.publish(Collection::Remittances);
        Ok(id)
    }

    fn append_activity(&mut self, entry: &ActivityEntry) -> Result<()> {
        let details = serde_json::to_string(&entry.details)?;

        self.conn.execute(
            "INSERT INTO activity_log (id, timestamp, action, details) VALUES (?1, ?2, ?3, ?4)",
            params![
                entry.id,
                // Fixed width so text ordering matches time ordering
                entry.timestamp.to_rfc3339_opts(SecondsFormat::Nanos, true),
                entry.action.as_str(),
                details,
            ],
        )?;

        Ok(())
    }

    fn activity_log(&self) -> Result<Vec<ActivityEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, timestamp, action, details
             FROM activity_log
             ORDER BY timestamp DESC, rowid DESC",
        )?;

        let entries = stmt
            .query_map([], |row| {
                let timestamp: String = row.get(1)?;
                let action: String = row.get(2)?;
                let details: String = row.get(3)?;

                Ok(ActivityEntry {
                    id: row.get(0)?,
                    timestamp: DateTime::parse_from_rfc3339(&timestamp)
                        .map_err(|e| conversion_error(1, e))?
                        .with_timezone(&Utc),
                    action: action.parse().map_err(|e| conversion_error(2, e))?,
                    details: serde_json::from_str(&details).map_err(|e| conversion_error(3, e))?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(entries)
    }
}
