// 🔎 Record Filter - keep only claims/medical-event expense lines
// A row matches by account-code prefix OR description keyword

use crate::columns::{ColumnResolver, ColumnRole};
use crate::table::Table;
use tracing::{debug, warn};

/// Synonyms for claims / medical events / assistance / procedures
pub const DESCRIPTION_KEYWORDS: [&str; 11] = [
    "EVENTO",
    "SINISTRO",
    "DESPESA COM EVENTO",
    "ASSISTENCIA",
    "ASSISTÊNCIA",
    "INTERNACAO",
    "INTERNAÇÃO",
    "CONSULTA",
    "EXAME",
    "TERAPIA",
    "PROCEDIMENTO",
];

pub const DEFAULT_TARGET_ACCOUNT: &str = "411";

pub struct RecordFilter {
    /// Account-code prefixes: the configured code and its first two characters
    target_codes: Vec<String>,
    keywords: Vec<String>,
    resolver: ColumnResolver,
}

impl RecordFilter {
    pub fn new(target_account: &str) -> Self {
        let target = target_account.trim().to_string();
        let mut target_codes = vec![target.clone()];

        let prefix: String = target.chars().take(2).collect();
        if !prefix.is_empty() && prefix != target {
            target_codes.push(prefix);
        }

        RecordFilter {
            target_codes,
            keywords: DESCRIPTION_KEYWORDS.iter().map(|k| k.to_string()).collect(),
            resolver: ColumnResolver::for_filter(),
        }
    }

    pub fn target_codes(&self) -> &[String] {
        &self.target_codes
    }

    /// Rows that look like target expense items; empty when no usable column resolves
    pub fn filter(&self, table: &Table) -> Table {
        if table.is_empty() {
            return table.clone();
        }

        let mapping = self.resolver.resolve(&table.headers);
        let account_col = mapping.index(ColumnRole::AccountCode);
        let description_col = mapping.index(ColumnRole::Description);

        if account_col.is_none() && description_col.is_none() {
            warn!("could not identify account or description columns; no usable rows");
            return Table::with_headers(table.headers.clone());
        }

        let selected: Vec<usize> = (0..table.len())
            .filter(|&row| {
                let by_account = account_col
                    .map(|col| self.matches_account(table.cell(row, col)))
                    .unwrap_or(false);

                by_account
                    || description_col
                        .map(|col| self.matches_description(table.cell(row, col)))
                        .unwrap_or(false)
            })
            .collect();

        if !selected.is_empty() {
            debug!(kept = selected.len(), total = table.len(), "filtered expense rows");
        }

        table.select(&selected)
    }

    fn matches_account(&self, code: &str) -> bool {
        let code = code.trim();
        !code.is_empty() && self.target_codes.iter().any(|target| code.starts_with(target.as_str()))
    }

    fn matches_description(&self, description: &str) -> bool {
        let description = description.to_uppercase();
        self.keywords.iter().any(|keyword| description.contains(keyword.as_str()))
    }
}

impl Default for RecordFilter {
    fn default() -> Self {
        Self::new(DEFAULT_TARGET_ACCOUNT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(headers: &[&str], rows: &[&[&str]]) -> Table {
        Table::new(
            headers.iter().map(|s| s.to_string()).collect(),
            rows.iter()
                .map(|r| r.iter().map(|s| s.to_string()).collect())
                .collect(),
        )
    }

    #[test]
    fn test_target_codes() {
        let filter = RecordFilter::new("411");
        assert_eq!(filter.target_codes(), &["411".to_string(), "41".to_string()]);

        let short = RecordFilter::new("41");
        assert_eq!(short.target_codes(), &["41".to_string()]);
    }

    #[test]
    fn test_filter_by_account_prefix() {
        let input = table(
            &["REG_ANS", "CD_CONTA_CONTABIL", "DESCRICAO"],
            &[
                &["123456", "41111", "OUTROS"],
                &["123456", "4199", "OUTROS"],
                &["123456", "311", "RECEITA"],
            ],
        );

        let filtered = RecordFilter::new("411").filter(&input);

        assert_eq!(filtered.len(), 2);
        assert_eq!(filtered.cell(0, 1), "41111");
        assert_eq!(filtered.cell(1, 1), "4199");
    }

    #[test]
    fn test_filter_by_description_keyword() {
        let input = table(
            &["CD_CONTA_CONTABIL", "DESCRICAO"],
            &[
                &["31", "Eventos indenizáveis líquidos"],
                &["32", "Internação hospitalar"],
                &["33", "Receita de contraprestações"],
            ],
        );

        let filtered = RecordFilter::new("411").filter(&input);

        assert_eq!(filtered.len(), 2);
        assert_eq!(filtered.cell(1, 0), "32");
    }

    #[test]
    fn test_description_only_table() {
        let input = table(
            &["REG_ANS", "DESCRICAO"],
            &[&["1", "SINISTROS CONHECIDOS"], &["2", "IMPOSTOS"]],
        );

        let filtered = RecordFilter::default().filter(&input);

        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered.cell(0, 0), "1");
    }

    #[test]
    fn test_unresolved_columns_give_empty_table() {
        let input = table(&["FOO", "BAR"], &[&["411", "EVENTO"]]);

        let filtered = RecordFilter::default().filter(&input);

        assert!(filtered.is_empty());
        assert_eq!(filtered.headers, input.headers);
    }
}
