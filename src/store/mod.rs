// Tabular store seam - the sheet-like grid the desk reads and writes
//
// Rows and columns are 1-based, matching what operators see in the sheet.
// Row 1 is the header row.

pub mod sheet;
pub mod workbook;

use thiserror::Error;

pub use sheet::Sheet;
pub use workbook::Workbook;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("row {row} is outside sheet '{sheet}' ({rows} rows)")]
    RowOutOfRange {
        sheet: String,
        row: usize,
        rows: usize,
    },
    #[error("column {column} is not a valid position in sheet '{sheet}'")]
    ColumnOutOfRange { sheet: String, column: usize },
    #[error("sheet '{0}' not found in workbook")]
    SheetNotFound(String),
    #[error("workbook I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("workbook format error: {0}")]
    Format(#[from] serde_json::Error),
}

/// Row/column access over one sheet.
pub trait TabularStore {
    /// Sheet name, used in log fields and operator notices
    fn name(&self) -> &str;

    /// Number of rows including the header row
    fn row_count(&self) -> usize;

    /// Header row values in column order
    fn headers(&self) -> Vec<String>;

    /// All values of one row; short rows are not padded
    fn read_row(&self, row: usize) -> Result<Vec<String>, StoreError>;

    /// Values of one column for every data row (row 2 onwards)
    fn read_column(&self, column: usize) -> Result<Vec<String>, StoreError>;

    fn write_cell(&mut self, row: usize, column: usize, value: &str) -> Result<(), StoreError>;

    /// 1-based column whose trimmed header equals `header`
    fn find_column(&self, header: &str) -> Option<usize> {
        self.headers()
            .iter()
            .position(|h| h.trim() == header)
            .map(|idx| idx + 1)
    }

    /// Add headers after the last used header column
    fn append_headers(&mut self, headers: &[String]) -> Result<(), StoreError> {
        let start = self.headers().len() + 1;
        for (offset, header) in headers.iter().enumerate() {
            self.write_cell(1, start + offset, header)?;
        }
        Ok(())
    }
}

/// Cell value at a 1-based column of an already-read row; missing cells read as empty
pub fn cell(row: &[String], column: usize) -> &str {
    column
        .checked_sub(1)
        .and_then(|idx| row.get(idx))
        .map(String::as_str)
        .unwrap_or("")
}

/// Stage fields and markers are "present" when they hold any non-whitespace text
pub fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}
