// ⚙️ Ledger Configuration
// JSON file, every field optional; CLI flags override individual values.

use crate::categories::{CategoryList, DEFAULT_ADVANCE_CATEGORY, DEFAULT_CATEGORIES};
use crate::db::Participant;
use crate::error::{LedgerError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Monthly rent mirrored into the remittance ledger
pub const DEFAULT_RENT_AMOUNT: f64 = 80_000.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticipantNames {
    pub first: String,
    pub second: String,
}

impl Default for ParticipantNames {
    fn default() -> Self {
        ParticipantNames {
            first: "ひも".to_string(),
            second: "あづ".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    pub participants: ParticipantNames,

    /// Category marking advance (proxy) payments
    pub advance_category: String,

    /// Used until a category list has been saved to the store
    pub categories: Vec<String>,

    pub rent_amount: f64,

    pub database_path: PathBuf,

    /// Default tracing filter level; `RUST_LOG` wins when set
    pub log_level: String,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        LedgerConfig {
            participants: ParticipantNames::default(),
            advance_category: DEFAULT_ADVANCE_CATEGORY.to_string(),
            categories: DEFAULT_CATEGORIES.iter().map(|c| c.to_string()).collect(),
            rent_amount: DEFAULT_RENT_AMOUNT,
            database_path: PathBuf::from("pair-ledger.db"),
            log_level: "info".to_string(),
        }
    }
}

impl LedgerConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| LedgerError::Config(format!("cannot read {}: {}", path.display(), e)))?;
        let config: LedgerConfig = serde_json::from_str(&text)
            .map_err(|e| LedgerError::Config(format!("invalid {}: {}", path.display(), e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Defaults when no file is given
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !self.rent_amount.is_finite() || self.rent_amount <= 0.0 {
            return Err(LedgerError::Config("rent_amount must be a positive number".to_string()));
        }

        let first = self.participants.first.trim();
        let second = self.participants.second.trim();
        if first.is_empty() || second.is_empty() {
            return Err(LedgerError::Config("participant names must not be empty".to_string()));
        }
        if first == second {
            return Err(LedgerError::Config("participant names must differ".to_string()));
        }

        if self.advance_category.trim().is_empty() {
            return Err(LedgerError::Config("advance_category must not be empty".to_string()));
        }

        Ok(())
    }

    pub fn default_categories(&self) -> CategoryList {
        CategoryList::new(self.categories.iter().cloned())
    }

    pub fn participant_name(&self, participant: Participant) -> &str {
        match participant {
            Participant::First => &self.participants.first,
            Participant::Second => &self.participants.second,
        }
    }

    /// Accepts a display name or one of the fixed identifiers (`first`, `p2`...)
    pub fn resolve_participant(&self, name: &str) -> Result<Participant> {
        let name = name.trim();
        if name == self.participants.first.trim() {
            Ok(Participant::First)
        } else if name == self.participants.second.trim() {
            Ok(Participant::Second)
        } else {
            name.parse()
        }
    }
}
