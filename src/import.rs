// 📥 CSV Import - Bulk-load expense rows
//
// Expected header: date,description,amount,person,category,memo
// Rows are only parsed here; validation and dedupe happen in the ledger.

use crate::validation::ExpenseForm;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::path::Path;

/// Outcome of one import run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ImportSummary {
    pub imported: usize,
    /// Rows whose idempotency hash was already present
    pub skipped_duplicates: usize,
    /// Distinct payroll periods touched by the imported rows
    pub periods: usize,
}

pub fn load_csv(csv_path: &Path) -> Result<Vec<ExpenseForm>> {
    let file = std::fs::File::open(csv_path)
        .with_context(|| format!("Failed to open CSV file {}", csv_path.display()))?;
    read_csv(file)
}

pub fn read_csv<R: Read>(reader: R) -> Result<Vec<ExpenseForm>> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);

    let mut forms = Vec::new();
    for (index, result) in rdr.deserialize().enumerate() {
        // Header is line 1
        let form: ExpenseForm =
            result.with_context(|| format!("Failed to deserialize expense on line {}", index + 2))?;
        forms.push(form);
    }

    Ok(forms)
}
