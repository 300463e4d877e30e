// ✅ Boundary validation
// Raw user input is checked here; nothing malformed reaches the computation
// functions or the store.

use crate::config::LedgerConfig;
use crate::db::{ExpenseRecord, RemittanceRecord};
use crate::error::{LedgerError, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub fn parse_date(field: &str, value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|_| LedgerError::invalid(field, format!("expected YYYY-MM-DD, got '{}'", value)))
}

/// Finite and non-zero. Thousands separators ("1,200") are accepted.
pub fn parse_amount(field: &str, value: &str) -> Result<f64> {
    let cleaned: String = value.trim().chars().filter(|c| *c != ',').collect();
    let amount: f64 = cleaned
        .parse()
        .map_err(|_| LedgerError::invalid(field, format!("'{}' is not a number", value)))?;

    if !amount.is_finite() {
        return Err(LedgerError::invalid(field, "amount must be finite"));
    }
    if amount == 0.0 {
        return Err(LedgerError::invalid(field, "amount must not be zero"));
    }
    Ok(amount)
}

pub fn parse_positive_amount(field: &str, value: &str) -> Result<f64> {
    let amount = parse_amount(field, value)?;
    if amount < 0.0 {
        return Err(LedgerError::invalid(field, "amount must be positive"));
    }
    Ok(amount)
}

fn optional_text(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

// ============================================================================
// FORMS
// ============================================================================

/// Expense as typed by a user (CLI args, JSON body, CSV row)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExpenseForm {
    pub date: String,
    #[serde(default)]
    pub description: String,
    pub amount: String,
    /// Display name or fixed identifier
    #[serde(alias = "person")]
    pub participant: String,
    pub category: String,
    #[serde(default)]
    pub memo: Option<String>,
}

impl ExpenseForm {
    pub fn validate(self, config: &LedgerConfig) -> Result<ExpenseRecord> {
        let category = self.category.trim().to_string();
        if category.is_empty() {
            return Err(LedgerError::invalid("category", "category must not be empty"));
        }

        Ok(ExpenseRecord {
            id: String::new(),
            date: parse_date("date", &self.date)?,
            description: self.description.trim().to_string(),
            amount: parse_positive_amount("amount", &self.amount)?,
            participant: config.resolve_participant(&self.participant)?,
            category,
            memo: optional_text(self.memo),
        })
    }
}

/// Manually entered remittance
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RemittanceForm {
    pub date: String,
    /// Signed: negative means money received
    pub amount: String,
    pub target: String,
    #[serde(default)]
    pub memo: Option<String>,
}

impl RemittanceForm {
    pub fn validate(self) -> Result<RemittanceRecord> {
        Ok(RemittanceRecord {
            id: String::new(),
            date: parse_date("date", &self.date)?,
            amount: parse_amount("amount", &self.amount)?,
            target: self.target.parse()?,
            memo: optional_text(self.memo).unwrap_or_default(),
            auto: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Participant, RemittanceTarget};

    fn form(amount: &str) -> ExpenseForm {
        ExpenseForm {
            date: "2025-03-01".to_string(),
            description: " Groceries ".to_string(),
            amount: amount.to_string(),
            participant: "あづ".to_string(),
            category: "食費".to_string(),
            memo: Some("  ".to_string()),
        }
    }

    #[test]
    fn test_valid_expense_form() {
        let record = form("1,280").validate(&LedgerConfig::default()).unwrap();
        assert_eq!(record.amount, 1280.0);
        assert_eq!(record.participant, Participant::Second);
        assert_eq!(record.description, "Groceries");
        assert_eq!(record.memo, None);
    }

    #[test]
    fn test_rejects_bad_amounts() {
        let config = LedgerConfig::default();
        for bad in ["", "abc", "0", "-5", "NaN", "inf"] {
            let err = form(bad).validate(&config).unwrap_err();
            assert!(err.is_invalid_input(), "amount '{}' should be rejected", bad);
        }
    }

    #[test]
    fn test_rejects_bad_date() {
        let mut f = form("100");
        f.date = "2025-02-30".to_string();
        assert!(f.validate(&LedgerConfig::default()).unwrap_err().is_invalid_input());

        assert!(parse_date("date", "03/01/2025").is_err());
    }

    #[test]
    fn test_remittance_form_keeps_sign() {
        let record = RemittanceForm {
            date: "2025-03-31".to_string(),
            amount: "-4500".to_string(),
            target: "Card Co".to_string(),
            memo: None,
        }
        .validate()
        .unwrap();

        assert_eq!(record.amount, -4500.0);
        assert_eq!(record.target, RemittanceTarget::Institution("Card Co".to_string()));
        assert!(!record.auto);

        let zero = RemittanceForm {
            date: "2025-03-31".to_string(),
            amount: "0".to_string(),
            target: "partner".to_string(),
            memo: None,
        };
        assert!(zero.validate().is_err());
    }
}
