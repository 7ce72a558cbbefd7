// 🏷️ Enricher - left join of validated records against the operator registry
// Join key is the trimmed 6-digit registry code; unmatched records pass through.

use crate::columns::{ColumnResolver, ColumnRole};
use crate::error::PipelineError;
use crate::record::{is_placeholder_name, NAME_PLACEHOLDER};
use crate::table::Table;
use crate::validation::ValidatedRecord;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{info, warn};

// ============================================================================
// REGISTRY
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryEntry {
    pub registry_code: String,
    pub canonical_name: Option<String>,
    pub modality: String,
    pub region: String,
}

#[derive(Debug, Clone, Default)]
pub struct Registry {
    entries: HashMap<String, RegistryEntry>,

    /// Rows dropped because their code was already present
    duplicates: usize,
}

fn non_blank(value: &str) -> Option<String> {
    let value = value.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

impl Registry {
    /// Build from a loaded registry table. Fails when the code or modality
    /// column cannot be identified, and with `MissingRegion` when there is no
    /// region column to join.
    pub fn from_table(table: &Table) -> Result<Self, PipelineError> {
        let mapping = ColumnResolver::for_registry().resolve(&table.headers);
        mapping.require(&[ColumnRole::RegistryCode, ColumnRole::Modality], "registry")?;

        let (code_col, modality_col, region_col) = match (
            mapping.index(ColumnRole::RegistryCode),
            mapping.index(ColumnRole::Modality),
            mapping.index(ColumnRole::Region),
        ) {
            (Some(code), Some(modality), Some(region)) => (code, modality, region),
            _ => return Err(PipelineError::MissingRegion),
        };
        let name_col = mapping.index(ColumnRole::Name);

        let mut registry = Registry::default();

        for row in 0..table.len() {
            let registry_code = table.cell(row, code_col).trim().to_string();
            if registry_code.is_empty() {
                continue;
            }

            let entry = RegistryEntry {
                registry_code: registry_code.clone(),
                canonical_name: name_col.and_then(|col| non_blank(table.cell(row, col))),
                modality: table.cell(row, modality_col).trim().to_string(),
                region: table.cell(row, region_col).trim().to_string(),
            };
            registry.insert(entry);
        }

        if registry.duplicates > 0 {
            warn!(count = registry.duplicates, "duplicate registry codes (first kept)");
        }
        info!(entries = registry.len(), "registry loaded");

        Ok(registry)
    }

    /// Keeps the first entry per code; later ones are counted as duplicates
    pub fn insert(&mut self, entry: RegistryEntry) -> bool {
        if self.entries.contains_key(&entry.registry_code) {
            self.duplicates += 1;
            return false;
        }
        self.entries.insert(entry.registry_code.clone(), entry);
        true
    }

    pub fn lookup(&self, registry_code: &str) -> Option<&RegistryEntry> {
        self.entries.get(registry_code.trim())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn duplicates(&self) -> usize {
        self.duplicates
    }
}

// ============================================================================
// ENRICHER
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedRecord {
    pub record: ValidatedRecord,

    /// Empty when the record had no registry match
    pub registry_code: Option<String>,
    pub canonical_name: Option<String>,
    pub modality: Option<String>,
    pub region: Option<String>,
}

impl EnrichedRecord {
    pub fn declared_name(&self) -> &str {
        &self.record.record.declared_name
    }

    pub fn is_matched(&self) -> bool {
        self.registry_code.is_some()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnrichmentStats {
    pub total_records: usize,
    pub matched: usize,
    pub not_matched: usize,
    pub multiple_matches: usize,
}

impl EnrichmentStats {
    pub fn match_rate(&self) -> f64 {
        if self.total_records == 0 {
            return 0.0;
        }
        self.matched as f64 / self.total_records as f64 * 100.0
    }
}

#[derive(Debug, Clone)]
pub struct EnrichmentOutcome {
    pub records: Vec<EnrichedRecord>,
    pub stats: EnrichmentStats,
}

pub struct Enricher;

impl Enricher {
    pub fn new() -> Self {
        Enricher
    }

    /// Left-preserving: one output record per input record
    pub fn enrich(&self, registry: &Registry, records: Vec<ValidatedRecord>) -> EnrichmentOutcome {
        let mut stats = EnrichmentStats {
            total_records: records.len(),
            multiple_matches: registry.duplicates(),
            ..Default::default()
        };

        let enriched: Vec<EnrichedRecord> = records
            .into_iter()
            .map(|mut validated| match registry.lookup(&validated.record.identifier) {
                Some(entry) => {
                    stats.matched += 1;

                    if is_placeholder_name(&validated.record.declared_name) {
                        validated.record.declared_name = entry
                            .canonical_name
                            .clone()
                            .unwrap_or_else(|| NAME_PLACEHOLDER.to_string());
                    }

                    EnrichedRecord {
                        record: validated,
                        registry_code: Some(entry.registry_code.clone()),
                        canonical_name: entry.canonical_name.clone(),
                        modality: non_blank(&entry.modality),
                        region: non_blank(&entry.region),
                    }
                }
                None => {
                    stats.not_matched += 1;

                    if is_placeholder_name(&validated.record.declared_name) {
                        validated.record.declared_name = NAME_PLACEHOLDER.to_string();
                    }

                    EnrichedRecord {
                        record: validated,
                        registry_code: None,
                        canonical_name: None,
                        modality: None,
                        region: None,
                    }
                }
            })
            .collect();

        info!(
            total = stats.total_records,
            matched = stats.matched,
            not_matched = stats.not_matched,
            multiple_matches = stats.multiple_matches,
            "enrichment finished"
        );

        EnrichmentOutcome {
            records: enriched,
            stats,
        }
    }
}

impl Default for Enricher {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// TESTS
// ============================================================================
