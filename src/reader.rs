// 📂 Tabular Reader - delimited text and spreadsheets
// Unknown separator/encoding are found by trying candidates in a fixed order

use crate::error::PipelineError;
use crate::table::Table;
use calamine::{open_workbook_auto, Reader};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

// ============================================================================
// SOURCE FORMAT
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceFormat {
    Delimited,
    Spreadsheet,
}

impl SourceFormat {
    /// Extensions accepted by file discovery
    pub const EXTENSIONS: [&'static str; 4] = ["csv", "txt", "xlsx", "xls"];

    /// Dispatch on the file extension
    pub fn from_path(path: &Path) -> Result<Self, PipelineError> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();

        match extension.as_str() {
            "csv" | "txt" => Ok(SourceFormat::Delimited),
            "xlsx" | "xls" => Ok(SourceFormat::Spreadsheet),
            _ => Err(PipelineError::UnsupportedFormat(if extension.is_empty() {
                path.display().to_string()
            } else {
                format!(".{}", extension)
            })),
        }
    }
}

// ============================================================================
// TEXT ENCODINGS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TextEncoding {
    Latin1,
    Utf8,
    Windows1252,
}

impl TextEncoding {
    pub fn name(&self) -> &str {
        match self {
            TextEncoding::Latin1 => "latin-1",
            TextEncoding::Utf8 => "utf-8",
            TextEncoding::Windows1252 => "windows-1252",
        }
    }

    /// Decode the whole buffer, or None when the bytes are not valid in this encoding
    pub fn decode<'a>(&self, bytes: &'a [u8]) -> Option<Cow<'a, str>> {
        match self {
            TextEncoding::Latin1 => Some(encoding_rs::mem::decode_latin1(bytes)),
            TextEncoding::Utf8 => {
                encoding_rs::UTF_8.decode_without_bom_handling_and_without_replacement(bytes)
            }
            TextEncoding::Windows1252 => {
                encoding_rs::WINDOWS_1252.decode_without_bom_handling_and_without_replacement(bytes)
            }
        }
    }
}

/// Separators in trial order
pub const SEPARATORS: [u8; 4] = [b';', b',', b'\t', b'|'];

/// Encodings in trial order (inner loop)
pub const ENCODINGS: [TextEncoding; 3] = [
    TextEncoding::Latin1,
    TextEncoding::Utf8,
    TextEncoding::Windows1252,
];

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

// ============================================================================
// READER
// ============================================================================

#[derive(Debug, Clone, Copy)]
pub struct ReadOptions {
    /// A parse is accepted only when the header has at least this many columns
    pub min_columns: usize,
}

impl Default for ReadOptions {
    fn default() -> Self {
        ReadOptions { min_columns: 2 }
    }
}

pub struct TabularReader {
    options: ReadOptions,
}

impl TabularReader {
    pub fn new() -> Self {
        TabularReader {
            options: ReadOptions::default(),
        }
    }

    pub fn with_options(options: ReadOptions) -> Self {
        TabularReader { options }
    }

    /// Read a source file into a table of text cells
    pub fn read(&self, path: &Path) -> Result<Table, PipelineError> {
        match SourceFormat::from_path(path)? {
            SourceFormat::Delimited => {
                let bytes = fs::read(path)?;
                self.read_delimited(&bytes).ok_or_else(|| PipelineError::Unreadable {
                    path: path.to_path_buf(),
                    reason: "no separator/encoding combination produced multiple columns"
                        .to_string(),
                })
            }
            SourceFormat::Spreadsheet => read_spreadsheet(path),
        }
    }

    /// Try every separator × encoding combination; first plausible parse wins
    pub fn read_delimited(&self, bytes: &[u8]) -> Option<Table> {
        let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);

        for &separator in SEPARATORS.iter() {
            for encoding in ENCODINGS.iter() {
                let text = match encoding.decode(bytes) {
                    Some(text) => text,
                    None => continue,
                };

                if let Some(table) = parse_delimited(&text, separator, self.options.min_columns) {
                    debug!(
                        separator = %(separator as char).escape_default(),
                        encoding = encoding.name(),
                        columns = table.column_count(),
                        rows = table.len(),
                        "detected delimited layout"
                    );
                    return Some(table);
                }
            }
        }

        None
    }
}

impl Default for TabularReader {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse decoded text with one separator.
///
/// Returns None when the header has fewer than `min_columns` cells. Lines wider
/// than the header and lines the csv parser rejects are skipped.
fn parse_delimited(text: &str, separator: u8, min_columns: usize) -> Option<Table> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(separator)
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader.headers().ok()?.iter().map(|h| h.to_string()).collect();
    if headers.len() < min_columns {
        return None;
    }

    let mut rows = Vec::new();
    let mut skipped = 0usize;

    for result in reader.records() {
        match result {
            Ok(record) if record.len() <= headers.len() => {
                rows.push(record.iter().map(|c| c.to_string()).collect());
            }
            _ => skipped += 1,
        }
    }

    if skipped > 0 {
        debug!(skipped, "skipped malformed lines");
    }

    Some(Table::new(headers, rows))
}

/// First worksheet, first row as header, every cell as text
fn read_spreadsheet(path: &Path) -> Result<Table, PipelineError> {
    let unreadable = |reason: String| PipelineError::Unreadable {
        path: path.to_path_buf(),
        reason,
    };

    let mut workbook = open_workbook_auto(path).map_err(|e| unreadable(e.to_string()))?;

    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| unreadable("workbook contains no sheets".to_string()))?;

    let range = workbook
        .worksheet_range(&sheet_name)
        .map_err(|e| unreadable(e.to_string()))?;

    let mut rows = range
        .rows()
        .map(|row| row.iter().map(|cell| cell.to_string()).collect::<Vec<String>>());

    let headers = rows
        .next()
        .ok_or_else(|| unreadable(format!("sheet '{}' is empty", sheet_name)))?;

    Ok(Table::new(headers, rows.collect()))
}

// ============================================================================
// FILE DISCOVERY
// ============================================================================

/// Recursively list supported source files under `dir`, sorted by path
pub fn find_source_files(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!(error = %e, "skipping unreadable directory entry");
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| SourceFormat::from_path(path).is_ok())
        .collect();

    files.sort();
    files
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_format_dispatch() {
        assert_eq!(
            SourceFormat::from_path(Path::new("a/1T2024.csv")).unwrap(),
            SourceFormat::Delimited
        );
        assert_eq!(
            SourceFormat::from_path(Path::new("a/dados.TXT")).unwrap(),
            SourceFormat::Delimited
        );
        assert_eq!(
            SourceFormat::from_path(Path::new("a/b.xlsx")).unwrap(),
            SourceFormat::Spreadsheet
        );
        assert!(matches!(
            SourceFormat::from_path(Path::new("a/b.pdf")),
            Err(PipelineError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_semicolon_file() {
        let reader = TabularReader::new();
        let table = reader
            .read_delimited(b"REG_ANS;CD_CONTA_CONTABIL;VL_SALDO_FINAL\n123456;411;1000,50\n")
            .unwrap();

        assert_eq!(table.headers, vec!["REG_ANS", "CD_CONTA_CONTABIL", "VL_SALDO_FINAL"]);
        assert_eq!(table.len(), 1);
        assert_eq!(table.cell(0, 2), "1000,50");
    }

    #[test]
    fn test_comma_file_falls_through_semicolon() {
        let reader = TabularReader::new();
        let table = reader.read_delimited(b"A,B,C\n1,2,3\n4,5,6\n").unwrap();

        assert_eq!(table.column_count(), 3);
        assert_eq!(table.len(), 2);
        assert_eq!(table.cell(1, 2), "6");
    }

    #[test]
    fn test_pipe_file() {
        let reader = TabularReader::new();
        let table = reader.read_delimited(b"A|B\nx|y\n").unwrap();

        assert_eq!(table.headers, vec!["A", "B"]);
        assert_eq!(table.cell(0, 1), "y");
    }

    #[test]
    fn test_single_column_is_unreadable() {
        let reader = TabularReader::new();
        assert!(reader.read_delimited(b"ONLY\n1\n2\n").is_none());
    }

    #[test]
    fn test_wide_lines_are_skipped_short_lines_padded() {
        let reader = TabularReader::new();
        let table = reader
            .read_delimited(b"A;B;C\n1;2;3\n1;2;3;4;5\n7;8\n")
            .unwrap();

        assert_eq!(table.len(), 2);
        assert_eq!(table.rows[1], vec!["7", "8", ""]);
    }

    #[test]
    fn test_latin1_bytes_are_decoded() {
        // "DESCRIÇÃO" encoded as Latin-1
        let mut bytes = b"CONTA;DESCRI".to_vec();
        bytes.extend_from_slice(&[0xC7, 0xC3]);
        bytes.extend_from_slice(b"O\n411;EVENTOS\n");

        let table = TabularReader::new().read_delimited(&bytes).unwrap();

        assert_eq!(table.headers[1], "DESCRIÇÃO");
    }

    #[test]
    fn test_bom_is_stripped() {
        let mut bytes = UTF8_BOM.to_vec();
        bytes.extend_from_slice(b"UF;NOME\nSP;X\n");

        let table = TabularReader::new().read_delimited(&bytes).unwrap();

        assert_eq!(table.headers[0], "UF");
    }

    #[test]
    fn test_min_columns_option() {
        let reader = TabularReader::with_options(ReadOptions { min_columns: 4 });
        assert!(reader.read_delimited(b"A;B;C\n1;2;3\n").is_none());
        assert!(reader.read_delimited(b"A;B;C;D\n1;2;3;4\n").is_some());
    }

    #[test]
    fn test_read_unknown_extension_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("notes.pdf");
        fs::write(&path, "A;B\n1;2\n").unwrap();

        let err = TabularReader::new().read(&path).unwrap_err();
        assert!(matches!(err, PipelineError::UnsupportedFormat(_)));
    }

    #[test]
    fn test_read_broken_spreadsheet_is_unreadable() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.xlsx");
        fs::write(&path, "this is not a workbook").unwrap();

        let err = TabularReader::new().read(&path).unwrap_err();
        assert!(matches!(err, PipelineError::Unreadable { .. }));
    }

    #[test]
    fn test_read_spreadsheet_cells_as_text() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("1T2024.xlsx");

        let mut workbook = rust_xlsxwriter::Workbook::new();
        let sheet = workbook.add_worksheet();
        for (col, header) in ["REG_ANS", "CD_CONTA_CONTABIL", "DESCRICAO", "VL_SALDO_FINAL"]
            .iter()
            .enumerate()
        {
            sheet.write_string(0, col as u16, *header).unwrap();
        }
        sheet.write_number(1, 0, 123456.0).unwrap();
        sheet.write_string(1, 1, "411111").unwrap();
        sheet.write_string(1, 2, "EVENTOS CONHECIDOS").unwrap();
        sheet.write_number(1, 3, 1500.5).unwrap();
        sheet.write_number(2, 0, 654321.0).unwrap();
        sheet.write_string(2, 1, "311111").unwrap();
        sheet.write_string(2, 2, "RECEITA").unwrap();
        sheet.write_number(2, 3, 9.0).unwrap();
        workbook.save(&path).unwrap();

        let table = TabularReader::new().read(&path).unwrap();

        assert_eq!(
            table.headers,
            vec!["REG_ANS", "CD_CONTA_CONTABIL", "DESCRICAO", "VL_SALDO_FINAL"]
        );
        assert_eq!(table.len(), 2);
        assert_eq!(table.cell(0, 0), "123456");
        assert_eq!(table.cell(0, 2), "EVENTOS CONHECIDOS");
        assert_eq!(table.cell(0, 3), "1500.5");
        assert_eq!(table.cell(1, 1), "311111");
        assert_eq!(table.cell(1, 3), "9");
    }

    #[test]
    fn test_read_empty_spreadsheet_is_unreadable() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("vazio.xlsx");

        let mut workbook = rust_xlsxwriter::Workbook::new();
        workbook.add_worksheet();
        workbook.save(&path).unwrap();

        match TabularReader::new().read(&path).unwrap_err() {
            PipelineError::Unreadable { reason, .. } => assert!(reason.contains("is empty")),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_find_source_files_sorted_and_filtered() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("2T2024");
        fs::create_dir_all(&nested).unwrap();
        fs::write(nested.join("b.csv"), "A;B\n").unwrap();
        fs::write(dir.path().join("a.txt"), "A;B\n").unwrap();
        fs::write(dir.path().join("ignored.zip"), "").unwrap();

        let files = find_source_files(dir.path());

        assert_eq!(files.len(), 2);
        assert!(files[0].ends_with("2T2024/b.csv") || files[0].ends_with("a.txt"));
        assert!(files.windows(2).all(|w| w[0] <= w[1]));
    }
}
