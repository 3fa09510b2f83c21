use serde::{Deserialize, Serialize};

use super::{StoreError, TabularStore};

/// In-memory grid of text cells.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sheet {
    pub name: String,
    #[serde(default)]
    pub rows: Vec<Vec<String>>,
}

impl Sheet {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rows: Vec::new(),
        }
    }

    /// Sheet with a header row
    pub fn with_headers<S: AsRef<str>>(name: impl Into<String>, headers: &[S]) -> Self {
        let mut sheet = Self::new(name);
        sheet
            .rows
            .push(headers.iter().map(|h| h.as_ref().to_string()).collect());
        sheet
    }

    /// Append a data row and return its 1-based index
    pub fn push_row<S: AsRef<str>>(&mut self, values: &[S]) -> usize {
        if self.rows.is_empty() {
            self.rows.push(Vec::new());
        }
        self.rows
            .push(values.iter().map(|v| v.as_ref().to_string()).collect());
        self.rows.len()
    }

    /// Append a data row given as (header, value) pairs; unknown headers are ignored
    pub fn push_record(&mut self, fields: &[(&str, &str)]) -> usize {
        let width = self.headers().len();
        let mut row = vec![String::new(); width];
        for (header, value) in fields {
            if let Some(column) = self.find_column(header) {
                row[column - 1] = value.to_string();
            }
        }
        self.push_row(&row)
    }

    /// Cell text by header name, mostly for assertions and the CLI
    pub fn value(&self, row: usize, header: &str) -> Option<&str> {
        let column = self.find_column(header)?;
        self.rows
            .get(row.checked_sub(1)?)
            .and_then(|r| r.get(column - 1))
            .map(String::as_str)
    }
}

impl TabularStore for Sheet {
    fn name(&self) -> &str {
        &self.name
    }

    fn row_count(&self) -> usize {
        self.rows.len()
    }

    fn headers(&self) -> Vec<String> {
        let mut headers = self.rows.first().cloned().unwrap_or_default();
        while headers.last().is_some_and(|h| h.trim().is_empty()) {
            headers.pop();
        }
        headers
    }

    fn read_row(&self, row: usize) -> Result<Vec<String>, StoreError> {
        row.checked_sub(1)
            .and_then(|idx| self.rows.get(idx))
            .cloned()
            .ok_or_else(|| StoreError::RowOutOfRange {
                sheet: self.name.clone(),
                row,
                rows: self.rows.len(),
            })
    }

    fn read_column(&self, column: usize) -> Result<Vec<String>, StoreError> {
        if column == 0 {
            return Err(StoreError::ColumnOutOfRange {
                sheet: self.name.clone(),
                column,
            });
        }
        Ok(self
            .rows
            .iter()
            .skip(1)
            .map(|r| r.get(column - 1).cloned().unwrap_or_default())
            .collect())
    }

    fn write_cell(&mut self, row: usize, column: usize, value: &str) -> Result<(), StoreError> {
        if column == 0 {
            return Err(StoreError::ColumnOutOfRange {
                sheet: self.name.clone(),
                column,
            });
        }
        let rows = self.rows.len();
        // The header row may be created on demand; data rows must already exist
        if row == 1 && rows == 0 {
            self.rows.push(Vec::new());
        }
        let target = row
            .checked_sub(1)
            .and_then(|idx| self.rows.get_mut(idx))
            .ok_or_else(|| StoreError::RowOutOfRange {
                sheet: self.name.clone(),
                row,
                rows,
            })?;
        if target.len() < column {
            target.resize(column, String::new());
        }
        target[column - 1] = value.to_string();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Sheet {
        let mut sheet = Sheet::with_headers("requests", &["クラス", " 名前 ", "受付番号"]);
        sheet.push_row(&["A組", "山田"]);
        sheet
    }

    #[test]
    fn find_column_trims_headers() {
        let sheet = sample();
        assert_eq!(sheet.find_column("名前"), Some(2));
        assert_eq!(sheet.find_column("受付番号"), Some(3));
        assert_eq!(sheet.find_column("missing"), None);
    }

    #[test]
    fn write_cell_extends_short_rows() {
        let mut sheet = sample();
        sheet.write_cell(2, 3, "1").unwrap();
        assert_eq!(sheet.read_row(2).unwrap(), vec!["A組", "山田", "1"]);
        assert_eq!(sheet.value(2, "受付番号"), Some("1"));
    }

    #[test]
    fn out_of_range_rows_are_errors() {
        let mut sheet = sample();
        assert!(matches!(
            sheet.read_row(5),
            Err(StoreError::RowOutOfRange { row: 5, rows: 2, .. })
        ));
        assert!(sheet.write_cell(9, 1, "x").is_err());
        assert!(sheet.read_row(0).is_err());
    }

    #[test]
    fn read_column_skips_header_and_pads() {
        let sheet = sample();
        assert_eq!(sheet.read_column(3).unwrap(), vec![String::new()]);
        assert_eq!(sheet.read_column(1).unwrap(), vec!["A組".to_string()]);
    }

    #[test]
    fn append_headers_goes_after_last_header() {
        let mut sheet = sample();
        sheet
            .append_headers(&["担任の確認".to_string(), "完了通知".to_string()])
            .unwrap();
        assert_eq!(sheet.find_column("担任の確認"), Some(4));
        assert_eq!(sheet.find_column("完了通知"), Some(5));
    }

    #[test]
    fn push_record_places_values_by_header() {
        let mut sheet = sample();
        let row = sheet.push_record(&[("受付番号", "4"), ("クラス", "B組"), ("unknown", "x")]);
        assert_eq!(row, 3);
        assert_eq!(sheet.read_row(3).unwrap(), vec!["B組", "", "4"]);
    }
}
