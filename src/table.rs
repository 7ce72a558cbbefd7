// 📋 Table - untyped rows of text cells
// Every stage before the typed record model works on this shape.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    /// Build a table, padding short rows and truncating long ones to the header width
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        let width = headers.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, String::new());
                row
            })
            .collect();

        Table { headers, rows }
    }

    /// Empty table that keeps the given headers
    pub fn with_headers(headers: Vec<String>) -> Self {
        Table {
            headers,
            rows: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_count(&self) -> usize {
        self.headers.len()
    }

    /// Cell text, or "" when out of range
    pub fn cell(&self, row: usize, col: usize) -> &str {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .map(|s| s.as_str())
            .unwrap_or("")
    }

    /// New table with the same headers and only the given rows, in the given order
    pub fn select(&self, row_indices: &[usize]) -> Table {
        let rows = row_indices
            .iter()
            .filter_map(|&i| self.rows.get(i).cloned())
            .collect();

        Table {
            headers: self.headers.clone(),
            rows,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_new_pads_short_rows() {
        let table = Table::new(
            strings(&["A", "B", "C"]),
            vec![strings(&["1"]), strings(&["1", "2", "3", "4"])],
        );

        assert_eq!(table.rows[0], strings(&["1", "", ""]));
        assert_eq!(table.rows[1], strings(&["1", "2", "3"]));
    }

    #[test]
    fn test_cell_out_of_range_is_empty() {
        let table = Table::new(strings(&["A"]), vec![strings(&["x"])]);

        assert_eq!(table.cell(0, 0), "x");
        assert_eq!(table.cell(0, 5), "");
        assert_eq!(table.cell(9, 0), "");
    }

    #[test]
    fn test_select_keeps_order() {
        let table = Table::new(
            strings(&["A"]),
            vec![strings(&["r0"]), strings(&["r1"]), strings(&["r2"])],
        );

        let selected = table.select(&[2, 0]);

        assert_eq!(selected.len(), 2);
        assert_eq!(selected.cell(0, 0), "r2");
        assert_eq!(selected.cell(1, 0), "r0");
        assert_eq!(selected.headers, table.headers);
    }
}
