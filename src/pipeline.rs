// 🚀 Pipeline - stage orchestration
// consolidate: sources → consolidated CSV
// analyze:     consolidated CSV → validate → enrich → aggregate → aggregated CSV

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};

use crate::aggregation::{summarize_regions, write_aggregated, Aggregator, AggregationStats, RegionSummary};
use crate::audit::{new_run_id, AuditEvent, AuditLog};
use crate::config::PipelineConfig;
use crate::consolidation::{ConsolidationReport, Consolidator};
use crate::enrichment::{Enricher, EnrichmentStats, Registry};
use crate::packaging::package_csv;
use crate::reader::{find_source_files, ReadOptions, TabularReader};
use crate::record::{read_consolidated, write_consolidated};
use crate::validation::{valid_records, ValidationReport, Validator};

/// The registry loader needs more than three columns to accept a layout
const REGISTRY_MIN_COLUMNS: usize = 4;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub validation: ValidationReport,
    pub enrichment: EnrichmentStats,
    pub aggregation: AggregationStats,
    pub regions: Vec<RegionSummary>,
    pub high_variability_groups: usize,
}

/// Audit sink for one run; a no-op when no database is configured
struct RunContext {
    run_id: String,
    audit: Option<AuditLog>,
}

impl RunContext {
    fn open(config: &PipelineConfig) -> Result<Self> {
        let audit = match &config.audit_db {
            Some(path) => Some(AuditLog::open(path)?),
            None => None,
        };

        Ok(RunContext {
            run_id: new_run_id(),
            audit,
        })
    }

    fn record<T: Serialize>(&self, stage: &str, report: &T) -> Result<()> {
        if let Some(audit) = &self.audit {
            let data = serde_json::to_value(report)?;
            audit.record(&AuditEvent::new(&self.run_id, stage, data))?;
        }
        Ok(())
    }
}

pub fn run_consolidation(config: &PipelineConfig) -> Result<ConsolidationReport> {
    let ctx = RunContext::open(config)?;
    consolidation_stage(config, &ctx)
}

pub fn run_analysis(config: &PipelineConfig) -> Result<AnalysisReport> {
    let ctx = RunContext::open(config)?;
    analysis_stage(config, &ctx)
}

/// Both stages under a single run id
pub fn run_all(config: &PipelineConfig) -> Result<(ConsolidationReport, AnalysisReport)> {
    let ctx = RunContext::open(config)?;
    let consolidation = consolidation_stage(config, &ctx)?;
    let analysis = analysis_stage(config, &ctx)?;
    Ok((consolidation, analysis))
}

fn package_output(config: &PipelineConfig, csv_path: &Path) -> Result<()> {
    if config.package_outputs {
        let zip_path = package_csv(csv_path)?;
        info!(path = %zip_path.display(), "output packaged");
    }
    Ok(())
}

fn consolidation_stage(config: &PipelineConfig, ctx: &RunContext) -> Result<ConsolidationReport> {
    let files = find_source_files(&config.input_dir);
    if files.is_empty() {
        warn!(dir = %config.input_dir.display(), "no source files found");
    }

    let output = Consolidator::new(&config.target_account).consolidate(&files);

    write_consolidated(&config.consolidated_output, &output.records)?;
    info!(
        records = output.records.len(),
        path = %config.consolidated_output.display(),
        "consolidated file written"
    );
    package_output(config, &config.consolidated_output)?;

    ctx.record("consolidation", &output.report)?;
    Ok(output.report)
}

fn analysis_stage(config: &PipelineConfig, ctx: &RunContext) -> Result<AnalysisReport> {
    let records = read_consolidated(&config.consolidated_output)?;
    info!(records = records.len(), "consolidated file loaded");

    let validation = Validator::new().validate(records);
    let valid = valid_records(&validation.records);

    if !config.registry_path.exists() {
        bail!(
            "Registry file not found: {} (aggregation needs region data)",
            config.registry_path.display()
        );
    }

    let registry_table = TabularReader::with_options(ReadOptions {
        min_columns: REGISTRY_MIN_COLUMNS,
    })
    .read(&config.registry_path)
    .with_context(|| format!("Failed to load registry: {}", config.registry_path.display()))?;

    let registry = Registry::from_table(&registry_table)?;
    let enrichment = Enricher::new().enrich(&registry, valid);

    let aggregator = Aggregator::with_thresholds(
        config.high_variability_threshold,
        config.medium_variability_threshold,
    );
    let aggregation = aggregator.aggregate(&enrichment.records);

    write_aggregated(&config.aggregated_output, &aggregation.groups)?;
    info!(
        groups = aggregation.groups.len(),
        path = %config.aggregated_output.display(),
        "aggregated file written"
    );
    package_output(config, &config.aggregated_output)?;

    let report = AnalysisReport {
        validation: validation.report,
        enrichment: enrichment.stats,
        regions: summarize_regions(&aggregation.groups),
        high_variability_groups: aggregation.high_variability().len(),
        aggregation: aggregation.stats,
    };

    ctx.record("analysis", &report)?;
    Ok(report)
}
