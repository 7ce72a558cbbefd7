use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::Path;

/// Unit separator between fingerprinted fields
const FIELD_SEPARATOR: &[u8] = b"\x1f";

/// Name used when neither the source nor the registry provides one
pub const NAME_PLACEHOLDER: &str = "NÃO INFORMADO";

/// Consolidated output header, in column order
pub const CONSOLIDATED_HEADERS: [&str; 5] = ["CNPJ", "RazaoSocial", "Trimestre", "Ano", "ValorDespesas"];

/// True when a declared name carries no information
pub fn is_placeholder_name(name: &str) -> bool {
    let name = name.trim();
    name.is_empty() || name == NAME_PLACEHOLDER
}

/// Expense row as extracted from one source file, before cleaning.
/// The quarter is still raw text; the cleaner coerces it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawExpense {
    pub identifier: String,
    pub declared_name: String,
    pub quarter: String,
    pub year: i32,
    pub expense_amount: f64,
}

impl RawExpense {
    pub fn new(
        identifier: &str,
        declared_name: &str,
        quarter: &str,
        year: i32,
        expense_amount: f64,
    ) -> Self {
        RawExpense {
            identifier: identifier.to_string(),
            declared_name: declared_name.to_string(),
            quarter: quarter.to_string(),
            year,
            expense_amount,
        }
    }

    /// SHA-256 over every field; equal rows produce equal fingerprints
    pub fn fingerprint(&self) -> String {
        // -0.0 and 0.0 are the same amount
        let amount = if self.expense_amount == 0.0 {
            0.0f64
        } else {
            self.expense_amount
        };

        let mut hasher = Sha256::new();
        hasher.update(self.identifier.as_bytes());
        hasher.update(FIELD_SEPARATOR);
        hasher.update(self.declared_name.as_bytes());
        hasher.update(FIELD_SEPARATOR);
        hasher.update(self.quarter.as_bytes());
        hasher.update(FIELD_SEPARATOR);
        hasher.update(self.year.to_le_bytes());
        hasher.update(FIELD_SEPARATOR);
        hasher.update(amount.to_bits().to_le_bytes());
        format!("{:x}", hasher.finalize())
    }
}

/// Canonical expense record: cleaned, quarter in 1..=4, amount >= 0
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpenseRecord {
    /// 6-digit registry code or 14-digit tax id
    #[serde(rename = "CNPJ")]
    pub identifier: String,

    #[serde(rename = "RazaoSocial")]
    pub declared_name: String,

    #[serde(rename = "Trimestre")]
    pub quarter: u8,

    #[serde(rename = "Ano")]
    pub year: i32,

    #[serde(rename = "ValorDespesas")]
    pub expense_amount: f64,
}

impl ExpenseRecord {
    pub fn new(identifier: &str, declared_name: &str, quarter: u8, year: i32, expense_amount: f64) -> Self {
        ExpenseRecord {
            identifier: identifier.to_string(),
            declared_name: declared_name.to_string(),
            quarter,
            year,
            expense_amount,
        }
    }

    pub fn has_name(&self) -> bool {
        !is_placeholder_name(&self.declared_name)
    }
}

// ============================================================================
// DELIMITED OUTPUT
// Comma separator, UTF-8, amounts with two decimals
// ============================================================================

pub fn write_consolidated(path: &Path, records: &[ExpenseRecord]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create output directory: {}", parent.display()))?;
    }

    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create CSV file: {}", path.display()))?;

    writer.write_record(CONSOLIDATED_HEADERS)?;

    for record in records {
        writer.write_record([
            record.identifier.clone(),
            record.declared_name.clone(),
            record.quarter.to_string(),
            record.year.to_string(),
            format!("{:.2}", record.expense_amount),
        ])?;
    }

    writer.flush()?;
    Ok(())
}

pub fn read_consolidated(path: &Path) -> Result<Vec<ExpenseRecord>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("Failed to open consolidated CSV: {}", path.display()))?;

    let mut records = Vec::new();

    for (line_num, result) in reader.deserialize().enumerate() {
        let record: ExpenseRecord = result.with_context(|| {
            format!("Failed to parse line {} in {}", line_num + 2, path.display())
        })?;
        records.push(record);
    }

    Ok(records)
}
