// ✅ Validator - per-record structural checks
// Never deletes: each record comes back with an explicit validity result.

use crate::record::ExpenseRecord;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

const FIRST_CHECK_WEIGHTS: [u32; 12] = [5, 4, 3, 2, 9, 8, 7, 6, 5, 4, 3, 2];
const SECOND_CHECK_WEIGHTS: [u32; 13] = [6, 5, 4, 3, 2, 9, 8, 7, 6, 5, 4, 3, 2];

// ============================================================================
// IDENTIFIERS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IdentifierKind {
    /// 6-digit operator registry code
    RegistryCode,
    /// 14-digit tax id, check digits still to be verified
    TaxId,
    Unknown,
}

/// Digits-only form of an identifier
pub fn normalize_identifier(identifier: &str) -> String {
    identifier.chars().filter(|c| c.is_ascii_digit()).collect()
}

pub fn classify_identifier(identifier: &str) -> IdentifierKind {
    match normalize_identifier(identifier).len() {
        6 => IdentifierKind::RegistryCode,
        14 => IdentifierKind::TaxId,
        _ => IdentifierKind::Unknown,
    }
}

/// Dual check-digit verification for a 14-digit tax id.
/// Non-digit characters are ignored; any other length fails.
pub fn is_valid_tax_id(identifier: &str) -> bool {
    let digits: Vec<u32> = identifier.chars().filter_map(|c| c.to_digit(10)).collect();

    if digits.len() != 14 {
        return false;
    }

    if digits.iter().all(|&d| d == digits[0]) {
        return false;
    }

    check_digit(&digits[..12], &FIRST_CHECK_WEIGHTS) == digits[12]
        && check_digit(&digits[..13], &SECOND_CHECK_WEIGHTS) == digits[13]
}

fn check_digit(digits: &[u32], weights: &[u32]) -> u32 {
    let sum: u32 = digits.iter().zip(weights).map(|(d, w)| d * w).sum();
    let remainder = sum % 11;

    if remainder < 2 {
        0
    } else {
        11 - remainder
    }
}

// ============================================================================
// VALIDITY
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InvalidReason {
    FormatInvalid,
    CheckDigitInvalid,
    NegativeValue,
}

impl InvalidReason {
    pub fn code(&self) -> &'static str {
        match self {
            InvalidReason::FormatInvalid => "FORMAT_INVALID",
            InvalidReason::CheckDigitInvalid => "CHECK_DIGIT_INVALID",
            InvalidReason::NegativeValue => "NEGATIVE_VALUE",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "reasons", rename_all = "snake_case")]
pub enum Validity {
    Valid,
    Invalid(Vec<InvalidReason>),
}

impl Validity {
    fn from_reasons(reasons: Vec<InvalidReason>) -> Self {
        if reasons.is_empty() {
            Validity::Valid
        } else {
            Validity::Invalid(reasons)
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, Validity::Valid)
    }

    pub fn reasons(&self) -> &[InvalidReason] {
        match self {
            Validity::Valid => &[],
            Validity::Invalid(reasons) => reasons,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidatedRecord {
    pub record: ExpenseRecord,
    pub identifier_kind: IdentifierKind,
    pub validity: Validity,
}

impl ValidatedRecord {
    pub fn is_valid(&self) -> bool {
        self.validity.is_valid()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub total_records: usize,
    pub invalid_records: usize,
    pub format_errors: usize,
    pub check_digit_errors: usize,
    pub negative_values: usize,

    /// Report-only: names are filled in later by enrichment
    pub empty_names: usize,
}

impl ValidationReport {
    pub fn valid_records(&self) -> usize {
        self.total_records - self.invalid_records
    }
}

#[derive(Debug, Clone)]
pub struct ValidationOutcome {
    pub records: Vec<ValidatedRecord>,
    pub report: ValidationReport,
}

// ============================================================================
// VALIDATOR
// ============================================================================

pub struct Validator;

impl Validator {
    pub fn new() -> Self {
        Validator
    }

    /// Annotate every record; the output has exactly as many rows as the input
    pub fn validate(&self, records: Vec<ExpenseRecord>) -> ValidationOutcome {
        let mut report = ValidationReport {
            total_records: records.len(),
            ..Default::default()
        };

        let validated: Vec<ValidatedRecord> = records
            .into_iter()
            .map(|record| {
                let validated = self.validate_record(record);

                for reason in validated.validity.reasons() {
                    match reason {
                        InvalidReason::FormatInvalid => report.format_errors += 1,
                        InvalidReason::CheckDigitInvalid => report.check_digit_errors += 1,
                        InvalidReason::NegativeValue => report.negative_values += 1,
                    }
                }
                if !validated.is_valid() {
                    report.invalid_records += 1;
                }
                if !validated.record.has_name() {
                    report.empty_names += 1;
                }

                validated
            })
            .collect();

        if report.invalid_records > 0 {
            warn!(
                invalid = report.invalid_records,
                format = report.format_errors,
                check_digit = report.check_digit_errors,
                negative = report.negative_values,
                "records flagged as invalid"
            );
        }
        if report.empty_names > 0 {
            info!(count = report.empty_names, "records without declared name (filled by enrichment)");
        }

        ValidationOutcome {
            records: validated,
            report,
        }
    }

    pub fn validate_record(&self, record: ExpenseRecord) -> ValidatedRecord {
        let mut reasons = Vec::new();

        let identifier_kind = classify_identifier(&record.identifier);
        match identifier_kind {
            IdentifierKind::RegistryCode => {}
            IdentifierKind::TaxId => {
                if !is_valid_tax_id(&record.identifier) {
                    reasons.push(InvalidReason::CheckDigitInvalid);
                }
            }
            IdentifierKind::Unknown => reasons.push(InvalidReason::FormatInvalid),
        }

        if record.expense_amount < 0.0 {
            reasons.push(InvalidReason::NegativeValue);
        }

        ValidatedRecord {
            record,
            identifier_kind,
            validity: Validity::from_reasons(reasons),
        }
    }
}

impl Default for Validator {
    fn default() -> Self {
        Self::new()
    }
}

/// Records that go on to enrichment
pub fn valid_records(records: &[ValidatedRecord]) -> Vec<ValidatedRecord> {
    records.iter().filter(|r| r.is_valid()).cloned().collect()
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const VALID_TAX_ID: &str = "11222333000181";

    fn record(identifier: &str, amount: f64) -> ExpenseRecord {
        ExpenseRecord::new(identifier, "OPERADORA", 1, 2024, amount)
    }

    #[test]
    fn test_valid_tax_id_sample() {
        assert!(is_valid_tax_id(VALID_TAX_ID));
        assert!(is_valid_tax_id("11.222.333/0001-81"));
    }

    #[test]
    fn test_identical_digits_rejected() {
        assert!(!is_valid_tax_id("11111111111111"));
        assert!(!is_valid_tax_id("00000000000000"));

        let validated = Validator::new().validate_record(record("11111111111111", 10.0));
        assert_eq!(validated.validity.reasons(), &[InvalidReason::CheckDigitInvalid]);
    }

    #[test]
    fn test_single_digit_change_fails() {
        let tampered = "11222333000191";
        assert!(!is_valid_tax_id(tampered));

        let validated = Validator::new().validate_record(record(tampered, 10.0));
        assert!(!validated.is_valid());
        assert_eq!(validated.validity.reasons(), &[InvalidReason::CheckDigitInvalid]);
    }

    #[test]
    fn test_classify_identifier() {
        assert_eq!(classify_identifier("123456"), IdentifierKind::RegistryCode);
        assert_eq!(classify_identifier(VALID_TAX_ID), IdentifierKind::TaxId);
        assert_eq!(classify_identifier("12345"), IdentifierKind::Unknown);
        assert_eq!(classify_identifier(""), IdentifierKind::Unknown);
    }

    #[test]
    fn test_registry_code_accepted_unconditionally() {
        let validated = Validator::new().validate_record(record("000000", 0.0));
        assert!(validated.is_valid());
    }

    #[test]
    fn test_reasons_accumulate() {
        let validated = Validator::new().validate_record(record("1234", -1.0));

        assert_eq!(
            validated.validity,
            Validity::Invalid(vec![InvalidReason::FormatInvalid, InvalidReason::NegativeValue])
        );
    }

    #[test]
    fn test_empty_name_never_invalidates() {
        let mut unnamed = record("123456", 5.0);
        unnamed.declared_name = String::new();

        let outcome = Validator::new().validate(vec![unnamed]);

        assert!(outcome.records[0].is_valid());
        assert_eq!(outcome.report.empty_names, 1);
        assert_eq!(outcome.report.invalid_records, 0);
    }

    #[test]
    fn test_validation_keeps_row_count() {
        let input = vec![
            record("123456", 1.0),
            record(VALID_TAX_ID, 2.0),
            record("11111111111111", 3.0),
            record("abc", 4.0),
        ];

        let outcome = Validator::new().validate(input);

        assert_eq!(outcome.records.len(), 4);
        assert_eq!(outcome.report.total_records, 4);
        assert_eq!(outcome.report.invalid_records, 2);
        assert_eq!(outcome.report.valid_records(), 2);
        assert_eq!(outcome.report.format_errors, 1);
        assert_eq!(outcome.report.check_digit_errors, 1);

        let valid = valid_records(&outcome.records);
        assert_eq!(valid.len(), 2);
        assert_eq!(valid[0].record.identifier, "123456");
        assert_eq!(valid[1].record.identifier, VALID_TAX_ID);
    }

    #[test]
    fn test_reason_codes_serialize() {
        let json = serde_json::to_string(&InvalidReason::CheckDigitInvalid).unwrap();
        assert_eq!(json, "\"CHECK_DIGIT_INVALID\"");
        assert_eq!(InvalidReason::FormatInvalid.code(), "FORMAT_INVALID");
    }
}
