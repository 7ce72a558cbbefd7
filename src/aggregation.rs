// 📊 Aggregator - per-operator expense statistics
// Groups valid, enriched records by (name, region) with streaming accumulators.

use crate::enrichment::EnrichedRecord;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

pub const HIGH_VARIABILITY_THRESHOLD: f64 = 0.5;
pub const MEDIUM_VARIABILITY_THRESHOLD: f64 = 0.25;

/// Aggregated output header, in column order
pub const AGGREGATED_HEADERS: [&str; 5] = [
    "RazaoSocial",
    "UF",
    "TotalDespesas",
    "MediaDespesasTrimestre",
    "DesvioPadraoDespesas",
];

// ============================================================================
// TYPES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariabilityLevel {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedGroup {
    #[serde(rename = "RazaoSocial")]
    pub name: String,

    #[serde(rename = "UF")]
    pub region: String,

    #[serde(rename = "TotalDespesas")]
    pub total: f64,

    #[serde(rename = "MediaDespesasTrimestre")]
    pub mean: f64,

    /// Population standard deviation; 0 for single-record groups
    #[serde(rename = "DesvioPadraoDespesas")]
    pub std_dev: f64,

    #[serde(rename = "NumeroRegistros")]
    pub record_count: usize,

    #[serde(rename = "NumeroTrimestres")]
    pub quarter_count: usize,

    /// std / mean, always finite and >= 0
    #[serde(rename = "CoeficienteVariacao")]
    pub coefficient_of_variation: f64,

    pub variability: VariabilityLevel,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregationStats {
    pub original_records: usize,
    pub aggregated_groups: usize,

    /// Invalid records or records without name/region
    pub dropped_records: usize,
}

#[derive(Debug, Clone)]
pub struct AggregationOutcome {
    pub groups: Vec<AggregatedGroup>,
    pub stats: AggregationStats,
}

impl AggregationOutcome {
    pub fn grand_total(&self) -> f64 {
        self.groups.iter().map(|g| g.total).sum()
    }

    pub fn high_variability(&self) -> Vec<&AggregatedGroup> {
        self.groups
            .iter()
            .filter(|g| g.variability == VariabilityLevel::High)
            .collect()
    }
}

// ============================================================================
// ACCUMULATOR
// ============================================================================

/// Welford running mean/variance plus distinct quarters
#[derive(Debug, Default)]
struct GroupAccumulator {
    count: usize,
    sum: f64,
    mean: f64,
    m2: f64,
    quarters: BTreeSet<u8>,
}

impl GroupAccumulator {
    fn push(&mut self, amount: f64, quarter: u8) {
        self.count += 1;
        self.sum += amount;

        let delta = amount - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (amount - self.mean);

        self.quarters.insert(quarter);
    }

    fn population_std(&self) -> f64 {
        if self.count < 2 {
            return 0.0;
        }
        (self.m2 / self.count as f64).max(0.0).sqrt()
    }
}

/// std / mean with undefined or infinite results replaced by 0
pub fn coefficient_of_variation(std_dev: f64, mean: f64) -> f64 {
    let cv = std_dev / mean;
    if cv.is_finite() {
        cv.abs()
    } else {
        0.0
    }
}

// ============================================================================
// AGGREGATOR
// ============================================================================

pub struct Aggregator {
    high_threshold: f64,
    medium_threshold: f64,
}

impl Aggregator {
    pub fn new() -> Self {
        Aggregator {
            high_threshold: HIGH_VARIABILITY_THRESHOLD,
            medium_threshold: MEDIUM_VARIABILITY_THRESHOLD,
        }
    }

    pub fn with_thresholds(high_threshold: f64, medium_threshold: f64) -> Self {
        Aggregator {
            high_threshold,
            medium_threshold,
        }
    }

    pub fn classify(&self, cv: f64) -> VariabilityLevel {
        if cv > self.high_threshold {
            VariabilityLevel::High
        } else if cv > self.medium_threshold {
            VariabilityLevel::Medium
        } else {
            VariabilityLevel::Low
        }
    }

    /// Groups sorted by total descending, ties in first-appearance order.
    /// Records without a name or region are counted as dropped.
    pub fn aggregate(&self, records: &[EnrichedRecord]) -> AggregationOutcome {
        let mut order: Vec<(String, String)> = Vec::new();
        let mut groups: HashMap<(String, String), GroupAccumulator> = HashMap::new();
        let mut dropped = 0usize;

        for enriched in records {
            let name = enriched.declared_name().trim();
            let region = enriched.region.as_deref().map(str::trim).unwrap_or("");

            if !enriched.record.is_valid() || name.is_empty() || region.is_empty() {
                dropped += 1;
                continue;
            }

            let key = (name.to_string(), region.to_string());
            let record = &enriched.record.record;

            groups
                .entry(key.clone())
                .or_insert_with(|| {
                    order.push(key);
                    GroupAccumulator::default()
                })
                .push(record.expense_amount, record.quarter);
        }

        let mut aggregated: Vec<AggregatedGroup> = order
            .into_iter()
            .filter_map(|key| {
                let acc = groups.remove(&key)?;
                let std_dev = acc.population_std();
                let cv = coefficient_of_variation(std_dev, acc.mean);

                Some(AggregatedGroup {
                    name: key.0,
                    region: key.1,
                    total: acc.sum,
                    mean: acc.mean,
                    std_dev,
                    record_count: acc.count,
                    quarter_count: acc.quarters.len(),
                    coefficient_of_variation: cv,
                    variability: self.classify(cv),
                })
            })
            .collect();

        // sort_by is stable: equal totals keep first-appearance order
        aggregated.sort_by(|a, b| b.total.total_cmp(&a.total));

        let stats = AggregationStats {
            original_records: records.len(),
            aggregated_groups: aggregated.len(),
            dropped_records: dropped,
        };

        if !records.is_empty() && aggregated.is_empty() {
            warn!(count = dropped, "no record had both a name and a region; nothing aggregated");
        } else if dropped > 0 {
            debug!(count = dropped, "records left out of aggregation");
        }
        info!(
            records = stats.original_records,
            groups = stats.aggregated_groups,
            "aggregation finished"
        );

        AggregationOutcome {
            groups: aggregated,
            stats,
        }
    }
}

impl Default for Aggregator {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// REGIONAL SUMMARY
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionSummary {
    pub region: String,
    pub total: f64,
    pub operator_count: usize,

    /// Percentage of the overall total
    pub share: f64,
}

pub fn summarize_regions(groups: &[AggregatedGroup]) -> Vec<RegionSummary> {
    let grand_total: f64 = groups.iter().map(|g| g.total).sum();

    let mut order: Vec<&str> = Vec::new();
    let mut by_region: HashMap<&str, (f64, BTreeSet<&str>)> = HashMap::new();

    for group in groups {
        let entry = by_region.entry(group.region.as_str()).or_insert_with(|| {
            order.push(group.region.as_str());
            (0.0, BTreeSet::new())
        });
        entry.0 += group.total;
        entry.1.insert(group.name.as_str());
    }

    let mut summaries: Vec<RegionSummary> = order
        .into_iter()
        .filter_map(|region| {
            let (total, operators) = by_region.remove(region)?;
            let share = if grand_total > 0.0 {
                total / grand_total * 100.0
            } else {
                0.0
            };

            Some(RegionSummary {
                region: region.to_string(),
                total,
                operator_count: operators.len(),
                share,
            })
        })
        .collect();

    summaries.sort_by(|a, b| b.total.total_cmp(&a.total));
    summaries
}

// ============================================================================
// DELIMITED OUTPUT
// ============================================================================

pub fn write_aggregated(path: &Path, groups: &[AggregatedGroup]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create output directory: {}", parent.display()))?;
    }

    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create CSV file: {}", path.display()))?;

    writer.write_record(AGGREGATED_HEADERS)?;

    for group in groups {
        writer.write_record([
            group.name.clone(),
            group.region.clone(),
            format!("{:.2}", group.total),
            format!("{:.2}", group.mean),
            format!("{:.2}", group.std_dev),
        ])?;
    }

    writer.flush()?;
    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================
