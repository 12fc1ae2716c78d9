//! Headerless, nullable cell grid read from delimited text.

use std::io::Cursor;

/// Field delimiter used by the uploaded spreadsheets.
pub const DELIMITER: u8 = b';';

/// Ordered rows of nullable cells. No header is assumed.
///
/// Rows may be ragged: a cell past the end of its row reads as empty, and so
/// does an empty field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawGrid {
    rows: Vec<Vec<Option<String>>>,
}

impl RawGrid {
    /// Build a grid from string rows; empty strings become empty cells.
    pub fn from_rows<I, R, S>(rows: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let rows = rows
            .into_iter()
            .map(|row| {
                row.into_iter()
                    .map(|cell| Some(cell.into()).filter(|c: &String| !c.is_empty()))
                    .collect()
            })
            .collect();
        Self { rows }
    }

    /// Parse delimited text. Blank lines are skipped.
    ///
    /// Parsing is lenient: an unbalanced quote runs to the end of the input
    /// instead of failing.
    pub fn parse(text: &str, delimiter: u8) -> Self {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(false)
            .flexible(true)
            .from_reader(Cursor::new(text.as_bytes()));

        // In-memory UTF-8 input with flexible rows: records cannot fail.
        let rows = reader
            .records()
            .flatten()
            .map(|record| record.iter().map(str::to_string).collect::<Vec<_>>());

        Self::from_rows(rows)
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Widest row length within `rows`.
    pub fn width_of(&self, rows: std::ops::Range<usize>) -> usize {
        self.rows
            .get(rows)
            .map(|rows| rows.iter().map(Vec::len).max().unwrap_or(0))
            .unwrap_or(0)
    }

    /// Cell value, `None` when empty or out of range.
    pub fn cell(&self, row: usize, col: usize) -> Option<&str> {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .and_then(|c| c.as_deref())
    }

    /// Whether every cell of `row` is empty.
    pub fn is_row_empty(&self, row: usize) -> bool {
        self.rows
            .get(row)
            .is_none_or(|cells| cells.iter().all(Option::is_none))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_semicolon_rows() {
        let grid = RawGrid::parse("name;DatasetA\n;;\n;;colX;colY\n", DELIMITER);
        assert_eq!(grid.len(), 3);
        assert_eq!(grid.cell(0, 1), Some("DatasetA"));
        assert!(grid.is_row_empty(1));
        assert_eq!(grid.cell(2, 0), None);
        assert_eq!(grid.cell(2, 3), Some("colY"));
        assert_eq!(grid.width_of(0..3), 4);
    }

    #[test]
    fn quoted_fields_keep_delimiters() {
        let grid = RawGrid::parse("description;\"rain; hourly\"\n", DELIMITER);
        assert_eq!(grid.cell(0, 1), Some("rain; hourly"));
    }

    #[test]
    fn unbalanced_quote_reads_to_end() {
        let grid = RawGrid::parse("name;\"open\nversion;1.0\n", DELIMITER);
        assert_eq!(grid.len(), 1);
        assert_eq!(grid.cell(0, 0), Some("name"));
        assert!(grid.cell(0, 1).is_some_and(|cell| cell.starts_with("open\nversion;1.0")));
    }

    #[test]
    fn out_of_range_cells_are_empty() {
        let grid = RawGrid::from_rows(vec![vec!["a"]]);
        assert_eq!(grid.cell(0, 5), None);
        assert_eq!(grid.cell(9, 0), None);
        assert!(grid.is_row_empty(9));
        assert_eq!(grid.width_of(3..5), 0);
    }

    #[test]
    fn whitespace_is_not_empty() {
        let grid = RawGrid::from_rows(vec![vec!["", " "]]);
        assert!(!grid.is_row_empty(0));
    }
}
