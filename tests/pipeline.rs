use std::fs::{self, File};
use std::io::Read;
use std::path::Path;

use operator_expenses::{run_all, run_analysis, run_consolidation, PipelineConfig};
use tempfile::{tempdir, TempDir};

fn write(path: &Path, content: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn create_test_workspace() -> (TempDir, PipelineConfig) {
    let dir = tempdir().unwrap();
    let root = dir.path();

    write(
        &root.join("extracted/1T2024/balancete.csv"),
        "REG_ANS;CD_CONTA_CONTABIL;DESCRICAO;VL_SALDO_FINAL\n\
         123456;411111;EVENTOS CONHECIDOS;1.000,00\n\
         654321;411111;EVENTOS CONHECIDOS;500,00\n\
         999999;311111;RECEITA;9,00\n",
    );
    write(
        &root.join("extracted/2T2024/balancete.csv"),
        "REG_ANS;CD_CONTA_CONTABIL;DESCRICAO;VL_SALDO_FINAL\n\
         123456;411111;EVENTOS CONHECIDOS;3.000,00\n\
         123456;411111;EVENTOS CONHECIDOS;3.000,00\n\
         654321;411111;EVENTOS CONHECIDOS;-10,00\n",
    );
    write(&root.join("extracted/2T2024/leiame.pdf"), "not a table");

    write(
        &root.join("registry/cadop.csv"),
        "Registro_Operadora;CNPJ;Razao_Social;Modalidade;UF\n\
         123456;11222333000181;OPERADORA A;Cooperativa Medica;SP\n\
         654321;;OPERADORA B;Autogestao;RJ\n\
         123456;;DUPLICADA;Medicina de Grupo;MG\n",
    );

    let config = PipelineConfig {
        input_dir: root.join("extracted"),
        registry_path: root.join("registry/cadop.csv"),
        consolidated_output: root.join("output/consolidado_despesas.csv"),
        aggregated_output: root.join("output/despesas_agregadas.csv"),
        audit_db: Some(root.join("audit/runs.db")),
        ..PipelineConfig::default()
    };

    (dir, config)
}

#[test]
fn test_consolidation_stage() {
    let (_dir, config) = create_test_workspace();

    let report = run_consolidation(&config).unwrap();

    assert_eq!(report.files_found, 2);
    assert_eq!(report.files_processed, 2);
    assert!(report.skipped_files.is_empty());
    assert_eq!(report.rows_extracted, 5);
    assert_eq!(report.records_written, 3);
    assert_eq!(report.cleaning.removed_count(), 2);

    let content = fs::read_to_string(&config.consolidated_output).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines[0], "CNPJ,RazaoSocial,Trimestre,Ano,ValorDespesas");
    assert_eq!(lines[1], "123456,,1,2024,1000.00");
    assert_eq!(lines.len(), 4);
}

#[test]
fn test_full_run() {
    let (_dir, config) = create_test_workspace();

    let (consolidation, analysis) = run_all(&config).unwrap();

    assert_eq!(consolidation.records_written, 3);
    assert_eq!(analysis.validation.total_records, 3);
    assert_eq!(analysis.validation.invalid_records, 0);
    assert_eq!(analysis.enrichment.total_records, 3);
    assert_eq!(analysis.enrichment.matched, 3);
    assert_eq!(analysis.enrichment.multiple_matches, 1);
    assert_eq!(analysis.aggregation.aggregated_groups, 2);
    assert_eq!(analysis.high_variability_groups, 0);

    let content = fs::read_to_string(&config.aggregated_output).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(
        lines,
        vec![
            "RazaoSocial,UF,TotalDespesas,MediaDespesasTrimestre,DesvioPadraoDespesas",
            "OPERADORA A,SP,4000.00,2000.00,1000.00",
            "OPERADORA B,RJ,500.00,500.00,0.00",
        ]
    );

    assert_eq!(analysis.regions[0].region, "SP");
    assert_eq!(analysis.regions[0].operator_count, 1);
    assert!((analysis.regions[0].share + analysis.regions[1].share - 100.0).abs() < 1e-9);

    let conn = rusqlite::Connection::open(config.audit_db.as_ref().unwrap()).unwrap();
    let stages: Vec<String> = conn
        .prepare("SELECT stage FROM events ORDER BY id")
        .unwrap()
        .query_map([], |row| row.get(0))
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(stages, vec!["consolidation", "analysis"]);
}

#[test]
fn test_analysis_requires_registry() {
    let (_dir, mut config) = create_test_workspace();
    run_consolidation(&config).unwrap();

    config.registry_path = config.registry_path.with_file_name("missing.csv");

    let err = run_analysis(&config).unwrap_err();
    assert!(err.to_string().contains("Registry file not found"));
}

#[test]
fn test_registry_without_region_stops_analysis() {
    let (_dir, config) = create_test_workspace();
    run_consolidation(&config).unwrap();

    fs::write(
        &config.registry_path,
        "Registro_Operadora;CNPJ;Razao_Social;Modalidade\n123456;;OPERADORA A;Autogestao\n",
    )
    .unwrap();

    let err = run_analysis(&config).unwrap_err();
    assert!(err.to_string().contains("no region column"));
    assert!(!config.aggregated_output.exists());
}

fn zip_entry(zip_path: &Path) -> (String, String) {
    let mut archive = zip::ZipArchive::new(File::open(zip_path).unwrap()).unwrap();
    assert_eq!(archive.len(), 1);

    let mut entry = archive.by_index(0).unwrap();
    let mut content = String::new();
    entry.read_to_string(&mut content).unwrap();
    (entry.name().to_string(), content)
}

#[test]
fn test_packaged_outputs() {
    let (dir, mut config) = create_test_workspace();
    config.package_outputs = true;

    run_all(&config).unwrap();

    let (name, content) = zip_entry(&dir.path().join("output/consolidado_despesas.zip"));
    assert_eq!(name, "consolidado_despesas.csv");
    assert_eq!(content, fs::read_to_string(&config.consolidated_output).unwrap());

    let (name, content) = zip_entry(&dir.path().join("output/despesas_agregadas.zip"));
    assert_eq!(name, "despesas_agregadas.csv");
    assert_eq!(content, fs::read_to_string(&config.aggregated_output).unwrap());
}

#[test]
fn test_outputs_not_packaged_by_default() {
    let (dir, config) = create_test_workspace();

    run_all(&config).unwrap();

    assert!(config.aggregated_output.exists());
    assert!(!dir.path().join("output/consolidado_despesas.zip").exists());
    assert!(!dir.path().join("output/despesas_agregadas.zip").exists());
}
