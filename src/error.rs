// ⚠️ Ledger Errors
// Invalid input is rejected before anything reaches the store; store failures
// leave the ledger state unchanged and are surfaced to the caller.

/// Errors produced by the ledger core and its record store
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("Invalid input: {field} - {message}")]
    InvalidInput { field: String, message: String },

    #[error("Record store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("{collection} record not found: {id}")]
    NotFound { collection: String, id: String },

    #[error("Configuration error: {0}")]
    Config(String),
}

impl LedgerError {
    pub fn invalid(field: &str, message: impl Into<String>) -> Self {
        LedgerError::InvalidInput {
            field: field.to_string(),
            message: message.into(),
        }
    }

    pub fn not_found(collection: &str, id: &str) -> Self {
        LedgerError::NotFound {
            collection: collection.to_string(),
            id: id.to_string(),
        }
    }

    /// True when the failure came from the caller's input rather than the store
    pub fn is_invalid_input(&self) -> bool {
        matches!(self, LedgerError::InvalidInput { .. })
    }
}

impl From<rusqlite::Error> for LedgerError {
    fn from(err: rusqlite::Error) -> Self {
        LedgerError::StoreUnavailable(err.to_string())
    }
}

impl From<serde_json::Error> for LedgerError {
    fn from(err: serde_json::Error) -> Self {
        LedgerError::StoreUnavailable(format!("serialization failed: {}", err))
    }
}

pub type Result<T> = std::result::Result<T, LedgerError>;
