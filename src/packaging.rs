// 📦 Packaging - deflated zip archive next to each stage CSV

use anyhow::{Context, Result};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use zip::write::SimpleFileOptions;
use zip::CompressionMethod;

/// Zip `csv_path` into a sibling `.zip` holding one entry named after the CSV.
/// Returns the archive path.
pub fn package_csv(csv_path: &Path) -> Result<PathBuf> {
    let entry_name = csv_path
        .file_name()
        .and_then(|name| name.to_str())
        .with_context(|| format!("Not a file path: {}", csv_path.display()))?;

    let content = fs::read(csv_path)
        .with_context(|| format!("Failed to read {}", csv_path.display()))?;

    let zip_path = csv_path.with_extension("zip");
    let file = File::create(&zip_path)
        .with_context(|| format!("Failed to create {}", zip_path.display()))?;

    let mut zip = zip::ZipWriter::new(file);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    zip.start_file(entry_name, options)?;
    zip.write_all(&content)?;
    zip.finish()?;

    Ok(zip_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use tempfile::tempdir;

    #[test]
    fn test_package_csv_single_entry() {
        let dir = tempdir().unwrap();
        let csv_path = dir.path().join("consolidado_despesas.csv");
        fs::write(&csv_path, "CNPJ,RazaoSocial\n123456,OPERADORA A\n").unwrap();

        let zip_path = package_csv(&csv_path).unwrap();
        assert_eq!(zip_path, dir.path().join("consolidado_despesas.zip"));

        let mut archive = zip::ZipArchive::new(File::open(&zip_path).unwrap()).unwrap();
        assert_eq!(archive.len(), 1);

        let mut entry = archive.by_index(0).unwrap();
        assert_eq!(entry.name(), "consolidado_despesas.csv");
        let mut content = String::new();
        entry.read_to_string(&mut content).unwrap();
        assert_eq!(content, "CNPJ,RazaoSocial\n123456,OPERADORA A\n");
    }

    #[test]
    fn test_package_missing_csv_fails() {
        let dir = tempdir().unwrap();

        let err = package_csv(&dir.path().join("ausente.csv")).unwrap_err();

        assert!(err.to_string().contains("Failed to read"));
        assert!(!dir.path().join("ausente.zip").exists());
    }
}
