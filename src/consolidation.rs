// 📦 Consolidation - per-file read → filter → extract, then one cleaning pass
// A failure in one file is logged and skipped; the batch keeps going.

use crate::cleaning::{
    CleaningAction, CleaningLogEntry, CleaningReason, CleaningReport, Cleaner,
};
use crate::columns::{ColumnResolver, ColumnRole};
use crate::filter::RecordFilter;
use crate::reader::TabularReader;
use crate::record::{ExpenseRecord, RawExpense};
use crate::table::Table;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::{debug, error, info, warn};

// ============================================================================
// REPORTING PERIOD
// ============================================================================

/// Period tag in folder names such as `1T2024`
static PERIOD_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d)T(\d{4})").unwrap()
});

/// Quarter and year a filing refers to, e.g. `1T2024`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportingPeriod {
    pub quarter: u8,
    pub year: i32,
}

impl ReportingPeriod {
    /// First `<digit>T<4 digits>` occurrence in `text`
    pub fn parse(text: &str) -> Option<Self> {
        let caps = PERIOD_PATTERN.captures(text)?;

        Some(ReportingPeriod {
            quarter: caps[1].parse().ok()?,
            year: caps[2].parse().ok()?,
        })
    }
}

/// Period from the parent directory name, falling back to the file stem
pub fn period_from_path(path: &Path) -> Option<ReportingPeriod> {
    let parent = path
        .parent()
        .and_then(|p| p.file_name())
        .and_then(|n| n.to_str());
    let stem = path.file_stem().and_then(|n| n.to_str());

    parent
        .and_then(ReportingPeriod::parse)
        .or_else(|| stem.and_then(ReportingPeriod::parse))
}

// ============================================================================
// FIELD EXTRACTION
// ============================================================================

/// Brazilian-locale amount: "1.234,56" → 1234.56. None when nothing numeric remains.
pub fn parse_amount(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .replace('.', "")
        .replace(',', ".")
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();

    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

pub struct ExpenseExtractor {
    resolver: ColumnResolver,
}

impl ExpenseExtractor {
    pub fn new() -> Self {
        ExpenseExtractor {
            resolver: ColumnResolver::for_expenses(),
        }
    }

    /// Canonical fields from a filtered table. Empty when the identifier or
    /// the amount column cannot be found.
    pub fn extract(&self, table: &Table, period: Option<ReportingPeriod>) -> Vec<RawExpense> {
        let mapping = self.resolver.resolve(&table.headers);

        let identifier_col = mapping
            .index(ColumnRole::RegistryCode)
            .or_else(|| mapping.index(ColumnRole::TaxId));
        let name_col = mapping.index(ColumnRole::Name);

        let (identifier_col, amount_col) =
            match (identifier_col, mapping.index(ColumnRole::Amount)) {
                (Some(id), Some(amount)) => (id, amount),
                _ => {
                    warn!(headers = ?table.headers, "identifier or amount column not found");
                    return Vec::new();
                }
            };

        let (quarter, year) = match period {
            Some(p) => (p.quarter.to_string(), p.year),
            None => (String::new(), 0),
        };

        let mut unparsed = 0usize;
        let rows: Vec<RawExpense> = (0..table.len())
            .filter_map(|row| {
                let amount = parse_amount(table.cell(row, amount_col));
                if amount.is_none() {
                    unparsed += 1;
                }

                let name = name_col.map(|col| table.cell(row, col).trim()).unwrap_or("");

                amount.map(|amount| {
                    RawExpense::new(
                        table.cell(row, identifier_col).trim(),
                        name,
                        &quarter,
                        year,
                        amount,
                    )
                })
            })
            .collect();

        if unparsed > 0 {
            debug!(count = unparsed, "dropped rows with non-numeric amount");
        }

        rows
    }
}

impl Default for ExpenseExtractor {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// CONSOLIDATOR
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConsolidationReport {
    pub files_found: usize,
    pub files_processed: usize,
    pub skipped_files: Vec<SkippedFile>,
    pub rows_extracted: usize,
    pub records_written: usize,
    pub cleaning: CleaningReport,
}

#[derive(Debug, Clone)]
pub struct ConsolidationOutput {
    pub records: Vec<ExpenseRecord>,
    pub report: ConsolidationReport,
}

pub struct Consolidator {
    reader: TabularReader,
    filter: RecordFilter,
    extractor: ExpenseExtractor,
    cleaner: Cleaner,
}

impl Consolidator {
    pub fn new(target_account: &str) -> Self {
        Consolidator {
            reader: TabularReader::new(),
            filter: RecordFilter::new(target_account),
            extractor: ExpenseExtractor::new(),
            cleaner: Cleaner::new(),
        }
    }

    /// Rows from a single file, already filtered and extracted
    pub fn process_file(&self, path: &Path) -> crate::error::Result<Vec<RawExpense>> {
        let table = self.reader.read(path)?;
        let filtered = self.filter.filter(&table);

        if filtered.is_empty() {
            debug!(file = %path.display(), "no target expense rows");
            return Ok(Vec::new());
        }

        let period = period_from_path(path);
        if period.is_none() {
            warn!(file = %path.display(), "reporting period not found in path");
        }

        Ok(self.extractor.extract(&filtered, period))
    }

    pub fn consolidate(&self, files: &[PathBuf]) -> ConsolidationOutput {
        let mut report = ConsolidationReport {
            files_found: files.len(),
            ..Default::default()
        };

        let mut raw_rows = Vec::new();

        for path in files {
            match self.process_file(path) {
                Ok(rows) => {
                    report.files_processed += 1;
                    raw_rows.extend(rows);
                }
                Err(e) => {
                    error!(file = %path.display(), error = %e, "failed to process file");
                    report.skipped_files.push(SkippedFile {
                        path: path.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        report.rows_extracted = raw_rows.len();
        info!(
            files = report.files_processed,
            skipped = report.skipped_files.len(),
            rows = report.rows_extracted,
            "extraction finished"
        );

        let outcome = self.cleaner.clean(raw_rows);
        let mut cleaning = outcome.report;

        let before = outcome.records.len();
        let records: Vec<ExpenseRecord> = outcome
            .records
            .into_iter()
            .filter(|r| !r.identifier.trim().is_empty())
            .collect();

        let missing = before - records.len();
        if missing > 0 {
            warn!(count = missing, "removed records without identifier");
            cleaning.push(CleaningLogEntry::new(
                CleaningReason::MissingIdentifier,
                missing,
                CleaningAction::Removed,
            ));
        }

        report.records_written = records.len();
        report.cleaning = cleaning;

        ConsolidationOutput { records, report }
    }
}

impl Default for Consolidator {
    fn default() -> Self {
        Self::new(crate::filter::DEFAULT_TARGET_ACCOUNT)
    }
}

// ============================================================================
// TESTS
// ============================================================================
