// Workbook persistence - the request, payment and settings sheets in one JSON file

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use super::{Sheet, StoreError, TabularStore};
use crate::config::WorkbookConfig;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workbook {
    pub requests: Sheet,
    pub payments: Sheet,
    pub settings: Sheet,
}

impl Workbook {
    /// Empty workbook with the configured sheet names
    pub fn empty(config: &WorkbookConfig) -> Self {
        Self {
            requests: Sheet::new(&config.requests_sheet),
            payments: Sheet::new(&config.payments_sheet),
            settings: Sheet::new(&config.settings_sheet),
        }
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Load the workbook, or start an empty one when the file does not exist yet
    pub fn load_or_empty<P: AsRef<Path>>(path: P, config: &WorkbookConfig) -> Result<Self, StoreError> {
        if path.as_ref().exists() {
            Self::load(path)
        } else {
            Ok(Self::empty(config))
        }
    }

    /// Write to a sibling temp file first so a crash never leaves half a workbook
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_string_pretty(self)?)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }

    /// Settings sheet as (key, value) pairs from its first two columns
    pub fn settings_rows(&self) -> Vec<(String, String)> {
        (1..=self.settings.row_count())
            .filter_map(|row| self.settings.read_row(row).ok())
            .map(|values| {
                (
                    super::cell(&values, 1).to_string(),
                    super::cell(&values, 2).to_string(),
                )
            })
            .collect()
    }
}
