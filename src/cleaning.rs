// 🧹 Cleaner - deterministic multi-pass cleanup with an action log
// Passes: negative amounts → exact duplicates → name consistency → quarter

use crate::record::{ExpenseRecord, RawExpense};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use tracing::{info, warn};

/// How many inconsistent identifiers are sampled into the log
const INCONSISTENCY_SAMPLE: usize = 5;

// ============================================================================
// CLEANING LOG
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CleaningReason {
    NegativeAmount,
    ZeroAmount,
    ExactDuplicate,
    InconsistentName,
    InvalidQuarter,
    MissingIdentifier,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CleaningAction {
    Removed,
    Kept,
    Flagged,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleaningLogEntry {
    pub reason: CleaningReason,
    pub count: usize,
    pub action: CleaningAction,

    /// Sample of affected keys, when the reason has any
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<String>,
}

impl CleaningLogEntry {
    pub fn new(reason: CleaningReason, count: usize, action: CleaningAction) -> Self {
        CleaningLogEntry {
            reason,
            count,
            action,
            details: Vec::new(),
        }
    }

    pub fn with_details(mut self, details: Vec<String>) -> Self {
        self.details = details;
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CleaningReport {
    pub entries: Vec<CleaningLogEntry>,
}

impl CleaningReport {
    pub fn push(&mut self, entry: CleaningLogEntry) {
        self.entries.push(entry);
    }

    /// Concatenate another report after this one
    pub fn merge(&mut self, other: CleaningReport) {
        self.entries.extend(other.entries);
    }

    pub fn total_inconsistencies(&self) -> usize {
        self.entries.len()
    }

    pub fn removed_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| e.action == CleaningAction::Removed)
            .map(|e| e.count)
            .sum()
    }

    pub fn find(&self, reason: CleaningReason) -> Option<&CleaningLogEntry> {
        self.entries.iter().find(|e| e.reason == reason)
    }
}

// ============================================================================
// CLEANER
// ============================================================================

#[derive(Debug, Clone)]
pub struct CleaningOutcome {
    pub records: Vec<ExpenseRecord>,
    pub report: CleaningReport,
}

pub struct Cleaner;

impl Cleaner {
    pub fn new() -> Self {
        Cleaner
    }

    /// Run every pass in order. Output never has more rows than the input.
    pub fn clean(&self, rows: Vec<RawExpense>) -> CleaningOutcome {
        let original_count = rows.len();
        let mut report = CleaningReport::default();

        let rows = self.remove_negative_amounts(rows, &mut report);
        let rows = self.remove_exact_duplicates(rows, &mut report);
        self.detect_name_inconsistencies(&rows, &mut report);
        let records = self.normalize_quarters(rows, &mut report);

        let removed = original_count - records.len();
        if removed > 0 {
            info!(removed, "records removed during cleaning");
        }

        CleaningOutcome { records, report }
    }

    /// Pass 1: negatives are removed, zeros are kept and logged
    fn remove_negative_amounts(
        &self,
        rows: Vec<RawExpense>,
        report: &mut CleaningReport,
    ) -> Vec<RawExpense> {
        let negative_count = rows.iter().filter(|r| r.expense_amount < 0.0).count();
        let zero_count = rows.iter().filter(|r| r.expense_amount == 0.0).count();

        if negative_count > 0 {
            info!(count = negative_count, "removed records with negative amounts");
            report.push(CleaningLogEntry::new(
                CleaningReason::NegativeAmount,
                negative_count,
                CleaningAction::Removed,
            ));
        }

        if zero_count > 0 {
            info!(count = zero_count, "kept records with zero amount");
            report.push(CleaningLogEntry::new(
                CleaningReason::ZeroAmount,
                zero_count,
                CleaningAction::Kept,
            ));
        }

        rows.into_iter().filter(|r| r.expense_amount >= 0.0).collect()
    }

    /// Pass 2: exact full-row duplicates, first occurrence kept
    fn remove_exact_duplicates(
        &self,
        rows: Vec<RawExpense>,
        report: &mut CleaningReport,
    ) -> Vec<RawExpense> {
        let mut seen = HashSet::new();
        let before = rows.len();

        let unique: Vec<RawExpense> = rows
            .into_iter()
            .filter(|r| seen.insert(r.fingerprint()))
            .collect();

        let duplicates = before - unique.len();
        if duplicates > 0 {
            info!(count = duplicates, "removed exact duplicate rows");
            report.push(CleaningLogEntry::new(
                CleaningReason::ExactDuplicate,
                duplicates,
                CleaningAction::Removed,
            ));
        }

        unique
    }

    /// Pass 3: identifiers declared under several names. Logged only; name
    /// changes over time are legitimate.
    fn detect_name_inconsistencies(&self, rows: &[RawExpense], report: &mut CleaningReport) {
        let mut names_by_identifier: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
        for row in rows {
            names_by_identifier
                .entry(row.identifier.as_str())
                .or_default()
                .insert(row.declared_name.as_str());
        }

        let inconsistent: Vec<(&str, usize)> = names_by_identifier
            .iter()
            .filter(|(_, names)| names.len() > 1)
            .map(|(identifier, names)| (*identifier, names.len()))
            .collect();

        if inconsistent.is_empty() {
            return;
        }

        let sample: Vec<String> = inconsistent
            .iter()
            .take(INCONSISTENCY_SAMPLE)
            .map(|(identifier, count)| format!("{}: {}", identifier, count))
            .collect();

        warn!(
            count = inconsistent.len(),
            sample = ?sample,
            "identifiers with more than one declared name (kept for later analysis)"
        );

        report.push(
            CleaningLogEntry::new(
                CleaningReason::InconsistentName,
                inconsistent.len(),
                CleaningAction::Flagged,
            )
            .with_details(sample),
        );
    }

    /// Pass 4: quarter coerced to a number; anything outside 1..=4 is removed
    fn normalize_quarters(
        &self,
        rows: Vec<RawExpense>,
        report: &mut CleaningReport,
    ) -> Vec<ExpenseRecord> {
        let mut invalid = 0usize;

        let records: Vec<ExpenseRecord> = rows
            .into_iter()
            .filter_map(|row| match parse_quarter(&row.quarter) {
                Some(quarter) => Some(ExpenseRecord {
                    identifier: row.identifier,
                    declared_name: row.declared_name,
                    quarter,
                    year: row.year,
                    expense_amount: row.expense_amount,
                }),
                None => {
                    invalid += 1;
                    None
                }
            })
            .collect();

        if invalid > 0 {
            warn!(count = invalid, "removed records with invalid quarter");
            report.push(CleaningLogEntry::new(
                CleaningReason::InvalidQuarter,
                invalid,
                CleaningAction::Removed,
            ));
        }

        records
    }
}

impl Default for Cleaner {
    fn default() -> Self {
        Self::new()
    }
}

/// Numeric quarter in 1..=4 ("2", " 3 ", "4.0"); None otherwise
pub fn parse_quarter(raw: &str) -> Option<u8> {
    let value: f64 = raw.trim().parse().ok()?;

    if value.fract() != 0.0 || !(1.0..=4.0).contains(&value) {
        return None;
    }

    Some(value as u8)
}

// ============================================================================
// TESTS
// ============================================================================
