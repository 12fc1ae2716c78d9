//! Decoded dataset types and runtime views derived from [`AppConfig`].

use std::collections::BTreeMap;

use crate::config::AppConfig;

/// Metadata block of a decoded CSV: key → value.
pub type Metadata = BTreeMap<String, String>;

/// Dataset block of a decoded CSV.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DatasetTable {
    /// Column names in file order.
    pub columns: Vec<String>,
    /// Records beneath the header; every row has `columns.len()` cells.
    pub rows: Vec<Vec<String>>,
}

impl DatasetTable {
    /// Number of records (header excluded).
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Cell value of `row` in the named column.
    pub fn get(&self, row: usize, column: &str) -> Option<&str> {
        let idx = self.columns.iter().position(|c| c == column)?;
        self.rows.get(row).and_then(|r| r.get(idx)).map(String::as_str)
    }
}

/// Expected shape of every input CSV.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvSchema {
    /// Metadata keys, in config order. Their count fixes the separator row.
    pub metadata_keys: Vec<String>,
    /// Column names expected in the dataset header.
    pub dataset_keys: Vec<String>,
}

impl CsvSchema {
    pub fn new(metadata_keys: Vec<String>, dataset_keys: Vec<String>) -> Self {
        Self {
            metadata_keys,
            dataset_keys,
        }
    }
}

impl From<&AppConfig> for CsvSchema {
    fn from(config: &AppConfig) -> Self {
        Self {
            metadata_keys: config.metadata_keys(),
            dataset_keys: config.dataset.columns.clone(),
        }
    }
}

/// Lookup from index table column to the metadata key that fills it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexMapping {
    /// `(table_column, metadata_key)` pairs in config order.
    pub entries: Vec<(String, String)>,
}

impl IndexMapping {
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(column, key)| (column.as_str(), key.as_str()))
    }
}

impl From<&AppConfig> for IndexMapping {
    fn from(config: &AppConfig) -> Self {
        let entries = config
            .metadata
            .iter()
            .filter_map(|f| {
                f.table_column
                    .as_ref()
                    .filter(|c| !c.is_empty())
                    .map(|c| (c.clone(), f.key.clone()))
            })
            .collect();
        Self { entries }
    }
}
