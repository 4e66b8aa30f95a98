// In-memory columnar session tables loaded from CSV exports

use std::path::Path;

use crate::errors::LapsmithError;

/// A raw session table: ordered rows of string cells, immutable once loaded.
///
/// Exported tables frequently carry metadata rows before the real header,
/// and rows are not guaranteed to share a width, so the table keeps every
/// row as-is and leaves shape detection to the callers.
#[derive(Clone, Debug, Default)]
pub struct SessionTable {
    rows: Vec<Vec<String>>,
}

impl SessionTable {
    pub fn new(rows: Vec<Vec<String>>) -> Self {
        Self { rows }
    }

    /// Load a table from a CSV file. The reader is flexible: no header row
    /// is assumed and ragged record lengths are accepted.
    pub fn from_csv_file(path: &Path) -> Result<Self, LapsmithError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_path(path)
            .map_err(|e| LapsmithError::TableDecode {
                path: path.to_path_buf(),
                source: e,
            })?;

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.map_err(|e| LapsmithError::TableDecode {
                path: path.to_path_buf(),
                source: e,
            })?;
            rows.push(record.iter().map(|cell| cell.to_string()).collect());
        }
        Ok(Self { rows })
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Widest row in the table. Shape detection and lap extraction treat
    /// this as the table's column count.
    pub fn width(&self) -> usize {
        self.rows.iter().map(|row| row.len()).max().unwrap_or(0)
    }

    /// Cell text at (row, col), or None when the row is short or absent.
    pub fn cell(&self, row: usize, col: usize) -> Option<&str> {
        self.rows.get(row).and_then(|r| r.get(col)).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn table_from_csv(content: &str) -> SessionTable {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        SessionTable::from_csv_file(file.path()).unwrap()
    }

    #[test]
    fn test_loads_ragged_rows() {
        let table = table_from_csv("a,b,c\nd\ne,f\n");
        assert_eq!(table.row_count(), 3);
        assert_eq!(table.width(), 3);
        assert_eq!(table.cell(0, 2), Some("c"));
        assert_eq!(table.cell(1, 1), None);
        assert_eq!(table.cell(2, 1), Some("f"));
    }

    #[test]
    fn test_missing_cell_is_none() {
        let table = table_from_csv("a,b\n");
        assert_eq!(table.cell(0, 5), None);
        assert_eq!(table.cell(3, 0), None);
    }

    #[test]
    fn test_empty_table() {
        let table = SessionTable::default();
        assert!(table.is_empty());
        assert_eq!(table.width(), 0);
    }
}
