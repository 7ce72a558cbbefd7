use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use operator_expenses::logging::init_logging;
use operator_expenses::{
    run_all, run_analysis, run_consolidation, AnalysisReport, ConsolidationReport,
    PipelineConfig, VERSION,
};

#[derive(Parser)]
#[command(name = "operator-expenses")]
#[command(about = "Consolidate, validate and aggregate operator expense filings")]
#[command(version = VERSION)]
struct Cli {
    /// TOML config file (defaults are used when omitted)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Read source files and write the consolidated CSV
    Consolidate,
    /// Validate, enrich and aggregate the consolidated CSV
    Analyze,
    /// Consolidate then analyze
    Run,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = PipelineConfig::load_or_default(cli.config.as_deref())?;

    init_logging(&config.log_level);

    match cli.command {
        Commands::Consolidate => {
            let report = run_consolidation(&config)?;
            print_consolidation(&report, &config);
        }
        Commands::Analyze => {
            let report = run_analysis(&config)?;
            print_analysis(&report, &config);
        }
        Commands::Run => {
            let (consolidation, analysis) = run_all(&config)?;
            print_consolidation(&consolidation, &config);
            print_analysis(&analysis, &config);
        }
    }

    Ok(())
}

fn print_consolidation(report: &ConsolidationReport, config: &PipelineConfig) {
    println!("📦 Consolidation");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("✓ Files processed: {}/{}", report.files_processed, report.files_found);
    for skipped in &report.skipped_files {
        println!("⚠️  Skipped {}: {}", skipped.path.display(), skipped.reason);
    }
    println!("✓ Rows extracted: {}", report.rows_extracted);

    if report.cleaning.total_inconsistencies() > 0 {
        println!("\n🧹 Inconsistencies:");
        for entry in &report.cleaning.entries {
            println!("  • {:?}: {} ({:?})", entry.reason, entry.count, entry.action);
        }
    }

    println!(
        "\n✅ {} records → {}",
        report.records_written,
        config.consolidated_output.display()
    );
}

fn print_analysis(report: &AnalysisReport, config: &PipelineConfig) {
    println!("\n📊 Analysis");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!(
        "✓ Valid records: {}/{}",
        report.validation.valid_records(),
        report.validation.total_records
    );
    println!(
        "✓ Registry matches: {} ({:.1}%), unmatched: {}, duplicate codes: {}",
        report.enrichment.matched,
        report.enrichment.match_rate(),
        report.enrichment.not_matched,
        report.enrichment.multiple_matches
    );
    println!(
        "✓ Groups: {} ({} high variability)",
        report.aggregation.aggregated_groups, report.high_variability_groups
    );

    if !report.regions.is_empty() {
        println!("\n🗺️  By region:");
        for region in &report.regions {
            println!(
                "  {} {:>16.2} {:>5.1}% ({} operators)",
                region.region, region.total, region.share, region.operator_count
            );
        }
    }

    println!("\n✅ Aggregated → {}", config.aggregated_output.display());
}
