// Operator Expenses - Core Library
// Normalizes, validates and aggregates health-insurance operator expense filings

pub mod table;
pub mod error;
pub mod columns;        // Column Resolver - header keyword rules
pub mod reader;         // Tabular Reader - separator/encoding trial
pub mod filter;         // Record Filter - account code / description keywords
pub mod record;         // Data model + consolidated CSV
pub mod cleaning;       // Cleaner - multi-pass cleanup with action log
pub mod consolidation;  // Per-file extraction + batch cleaning
pub mod validation;     // Validator - identifier check digits, tagged validity
pub mod enrichment;     // Registry left join
pub mod aggregation;    // Per-operator statistics
pub mod audit;          // SQLite run audit trail
pub mod packaging;      // Zip archives of stage outputs
pub mod config;
pub mod logging;
pub mod pipeline;

// Re-export commonly used types
pub use error::PipelineError;
pub use table::Table;
pub use columns::{
    ColumnMapping, ColumnResolver, ColumnRole, ColumnRule, KeywordMatch, ResolvedColumn,
};
pub use reader::{find_source_files, ReadOptions, SourceFormat, TabularReader, TextEncoding};
pub use filter::RecordFilter;
pub use record::{
    read_consolidated, write_consolidated, ExpenseRecord, RawExpense, NAME_PLACEHOLDER,
};
pub use cleaning::{
    CleaningAction, CleaningLogEntry, CleaningOutcome, CleaningReason, CleaningReport, Cleaner,
};
pub use consolidation::{
    parse_amount, period_from_path, ConsolidationOutput, ConsolidationReport, Consolidator,
    ExpenseExtractor, ReportingPeriod, SkippedFile,
};
pub use validation::{
    classify_identifier, is_valid_tax_id, IdentifierKind, InvalidReason, ValidatedRecord,
    ValidationOutcome, ValidationReport, Validator, Validity,
};
pub use enrichment::{
    EnrichedRecord, Enricher, EnrichmentOutcome, EnrichmentStats, Registry, RegistryEntry,
};
pub use aggregation::{
    summarize_regions, write_aggregated, AggregatedGroup, AggregationOutcome, AggregationStats,
    Aggregator, RegionSummary, VariabilityLevel,
};
pub use audit::{AuditEvent, AuditLog};
pub use config::PipelineConfig;
pub use packaging::package_csv;
pub use pipeline::{run_all, run_analysis, run_consolidation, AnalysisReport};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
