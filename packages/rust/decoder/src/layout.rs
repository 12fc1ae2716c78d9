//! Split a raw grid into its metadata block and dataset block.
//!
//! Expected layout, with `n = metadata_keys.len()`:
//!
//! ```text
//! row 0..n    key ; value            (metadata block, two filled columns)
//! row n       ; ; ; ;                (separator, entirely empty)
//! row n+1     ; ; colX ; colY        (dataset header, first two columns empty)
//! row n+2..   ; ; 1    ; 2           (dataset records)
//! ```

use std::collections::{BTreeSet, HashSet};
use std::ops::Range;

use csv2md_shared::{Csv2MdError, DatasetTable, Metadata, Result};

use crate::grid::RawGrid;

/// Number of leading columns reserved for the metadata block.
const METADATA_COLUMNS: usize = 2;

/// Decode a grid into `(metadata, dataset)`, validating the fixed layout.
pub fn decode(
    grid: &RawGrid,
    metadata_keys: &[String],
    dataset_keys: &[String],
) -> Result<(Metadata, DatasetTable)> {
    let separator = metadata_keys.len();

    if grid.len() < separator + 1 {
        return Err(Csv2MdError::structure(format!(
            "expected at least {} rows, found {}",
            separator + 1,
            grid.len()
        )));
    }
    if !grid.is_row_empty(separator) {
        return Err(Csv2MdError::structure(format!(
            "line {} must be empty",
            separator + 1
        )));
    }

    let metadata = metadata_block(grid, 0..separator, metadata_keys)?;
    let dataset = dataset_block(grid, separator + 1..grid.len(), dataset_keys)?;

    Ok((metadata, dataset))
}

fn metadata_block(grid: &RawGrid, rows: Range<usize>, expected: &[String]) -> Result<Metadata> {
    let filled: Vec<usize> = (0..grid.width_of(rows.clone()))
        .filter(|&col| rows.clone().any(|row| grid.cell(row, col).is_some()))
        .collect();

    let &[key_col, value_col] = filled.as_slice() else {
        return Err(Csv2MdError::structure(format!(
            "only two columns may be filled in the metadata block, found {}",
            filled.len()
        )));
    };

    let mut metadata = Metadata::new();
    for row in rows {
        let key = grid.cell(row, key_col).unwrap_or_default();
        let value = grid.cell(row, value_col).unwrap_or_default();
        if metadata.insert(key.to_string(), value.to_string()).is_some() {
            return Err(Csv2MdError::structure(format!(
                "duplicate metadata key '{key}' on line {}",
                row + 1
            )));
        }
    }

    ensure_same_keys("metadata keys", metadata.keys().map(String::as_str), expected)?;
    Ok(metadata)
}

fn dataset_block(grid: &RawGrid, rows: Range<usize>, expected: &[String]) -> Result<DatasetTable> {
    if let Some(row) = rows
        .clone()
        .find(|&row| (0..METADATA_COLUMNS).any(|col| grid.cell(row, col).is_some()))
    {
        return Err(Csv2MdError::structure(format!(
            "first two columns of the dataset block must be empty (line {})",
            row + 1
        )));
    }

    if rows.is_empty() {
        return Err(Csv2MdError::structure("dataset block has no header row"));
    }

    let data_cols = METADATA_COLUMNS..grid.width_of(rows.clone()).max(METADATA_COLUMNS);
    let read_row = |row: usize| -> Vec<String> {
        data_cols
            .clone()
            .map(|col| grid.cell(row, col).unwrap_or_default().to_string())
            .collect()
    };

    let header_row = rows.start;
    let columns = read_row(header_row);

    let mut seen = HashSet::new();
    if let Some(dup) = columns.iter().find(|c| !seen.insert(c.as_str())) {
        return Err(Csv2MdError::structure(format!(
            "duplicate dataset column '{dup}' on line {}",
            header_row + 1
        )));
    }
    ensure_same_keys("dataset keys", columns.iter().map(String::as_str), expected)?;

    let records = (header_row + 1..rows.end).map(read_row).collect();

    Ok(DatasetTable {
        columns,
        rows: records,
    })
}

/// Exact, order-insensitive key set comparison.
fn ensure_same_keys<'a>(
    what: &str,
    found: impl Iterator<Item = &'a str>,
    expected: &[String],
) -> Result<()> {
    let found: BTreeSet<&str> = found.collect();
    let wanted: BTreeSet<&str> = expected.iter().map(String::as_str).collect();

    if found == wanted {
        return Ok(());
    }

    let missing: Vec<&str> = wanted.difference(&found).copied().collect();
    let unexpected: Vec<&str> = found.difference(&wanted).copied().collect();
    Err(Csv2MdError::structure(format!(
        "invalid {what}, expected: {expected:?} (missing: {missing:?}, unexpected: {unexpected:?})"
    )))
}
