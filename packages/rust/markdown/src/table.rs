//! In-place editing of pipe tables inside a Markdown document.
//!
//! The document is held as lines with their terminators, so rendering after
//! an edit reproduces every untouched line byte for byte.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use csv2md_shared::{Csv2MdError, Result};

/// A trimmed line that starts and ends with a pipe.
static TABLE_LINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\|.*\|$").expect("valid regex"));

/// Inclusive line range of one table in a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableRegion {
    /// Header line index.
    pub start: usize,
    /// Last table line index.
    pub end: usize,
}

impl TableRegion {
    /// Number of lines below the header (separator row included).
    pub fn body_len(&self) -> usize {
        self.end - self.start
    }
}

/// A Markdown document with one selected table open for editing.
#[derive(Debug, Clone)]
pub struct MarkdownTable {
    lines: Vec<String>,
    region: TableRegion,
    columns: Vec<String>,
}

impl MarkdownTable {
    /// Open the `ordinal`-th table (0-based) of `document`.
    pub fn open(document: &str, ordinal: usize) -> Result<Self> {
        let lines = split_lines(document);
        let regions = find_regions(&lines);

        let region = *regions.get(ordinal).ok_or_else(|| {
            Csv2MdError::not_found(format!(
                "table #{ordinal} requested but the document has {} table(s)",
                regions.len()
            ))
        })?;

        let columns = split_cells(&lines[region.start]);
        debug!(ordinal, start = region.start, end = region.end, ?columns, "opened table");

        Ok(Self {
            lines,
            region,
            columns,
        })
    }

    /// Read `path` and open its `ordinal`-th table.
    pub fn from_path(path: &Path, ordinal: usize) -> Result<Self> {
        let document = std::fs::read_to_string(path).map_err(|e| Csv2MdError::io(path, e))?;
        Self::open(&document, ordinal)
    }

    /// Column names parsed from the header line.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Current bounds of the selected table.
    pub fn region(&self) -> TableRegion {
        self.region
    }

    /// All document lines, terminators included.
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Append a row after the last row of the table.
    ///
    /// Every key of `values` must be a column; missing columns stay empty.
    pub fn append_row(&mut self, values: &BTreeMap<String, String>) -> Result<()> {
        let unknown: Vec<&str> = values
            .keys()
            .filter(|k| !self.columns.contains(k))
            .map(String::as_str)
            .collect();
        if !unknown.is_empty() {
            return Err(Csv2MdError::validation(format!(
                "keys not found in table columns: {unknown:?} (columns: {:?})",
                self.columns
            )));
        }

        let cells: Vec<String> = self
            .columns
            .iter()
            .map(|col| values.get(col).map(|v| escape_cell(v)).unwrap_or_default())
            .collect();

        // New rows take the table's own line ending.
        let terminator = self.lines[self.region.start..=self.region.end]
            .iter()
            .rev()
            .map(|line| line_terminator(line))
            .find(|t| !t.is_empty())
            .unwrap_or("\n")
            .to_string();

        // A table ending the document without a newline would swallow the new row.
        let last = &mut self.lines[self.region.end];
        if !last.ends_with('\n') {
            last.push_str(&terminator);
        }

        self.region.end += 1;
        self.lines.insert(self.region.end, format_row(&cells, &terminator));
        debug!(line = self.region.end, "appended table row");
        Ok(())
    }

    /// Overwrite one cell. `row_index` counts from the header, which is row 0 and read-only.
    pub fn edit_cell(&mut self, column: &str, row_index: usize, new_value: &str) -> Result<()> {
        if row_index == 0 {
            return Err(Csv2MdError::validation(
                "row 0 is the table header and cannot be modified",
            ));
        }
        let col_index = self.columns.iter().position(|c| c == column).ok_or_else(|| {
            Csv2MdError::validation(format!(
                "column '{column}' not found in table columns: {:?}",
                self.columns
            ))
        })?;
        if row_index > self.region.body_len() {
            return Err(Csv2MdError::validation(format!(
                "row {row_index} is outside the table ({} rows below the header)",
                self.region.body_len()
            )));
        }

        let line_index = self.region.start + row_index;
        let line = &self.lines[line_index];
        let mut cells = split_cells(line);
        if col_index >= cells.len() {
            return Err(Csv2MdError::validation(format!(
                "row {row_index} has {} cells, column '{column}' is #{col_index}",
                cells.len()
            )));
        }

        cells[col_index] = escape_cell(new_value);
        let rebuilt = format_row(&cells, line_terminator(line));
        self.lines[line_index] = rebuilt;
        debug!(line = line_index, column, "edited table cell");
        Ok(())
    }

    /// The full document with all edits applied.
    pub fn render(&self) -> String {
        self.lines.concat()
    }
}

/// Find every table in `document`, in order.
pub fn find_tables(document: &str) -> Vec<TableRegion> {
    find_regions(&split_lines(document))
}

/// Split into lines, each keeping its `\n` / `\r\n` terminator.
fn split_lines(document: &str) -> Vec<String> {
    document.split_inclusive('\n').map(str::to_string).collect()
}

fn is_table_line(line: &str) -> bool {
    TABLE_LINE_RE.is_match(line.trim())
}

/// Maximal runs of consecutive table lines.
fn find_regions(lines: &[String]) -> Vec<TableRegion> {
    let mut regions = Vec::new();
    let mut start: Option<usize> = None;

    for (i, line) in lines.iter().enumerate() {
        match (is_table_line(line), start) {
            (true, None) => start = Some(i),
            (false, Some(s)) => {
                regions.push(TableRegion { start: s, end: i - 1 });
                start = None;
            }
            _ => {}
        }
    }
    if let Some(s) = start {
        regions.push(TableRegion {
            start: s,
            end: lines.len() - 1,
        });
    }

    regions
}

/// Cells of a table line: split on unescaped pipes, drop the outer fragments, trim.
fn split_cells(line: &str) -> Vec<String> {
    let mut fragments = Vec::new();
    let mut current = String::new();
    let mut escaped = false;

    for ch in line.trim().chars() {
        match ch {
            '|' if !escaped => fragments.push(std::mem::take(&mut current)),
            _ => current.push(ch),
        }
        escaped = ch == '\\' && !escaped;
    }
    fragments.push(current);

    if fragments.len() < 2 {
        return Vec::new();
    }
    let inner = fragments.len() - 1;
    fragments[1..inner]
        .iter()
        .map(|f| f.trim().to_string())
        .collect()
}

fn format_row(cells: &[String], terminator: &str) -> String {
    format!("| {} |{terminator}", cells.join(" | "))
}

fn escape_cell(value: &str) -> String {
    value.replace('|', "\\|").replace(['\r', '\n'], " ")
}

fn line_terminator(line: &str) -> &str {
    if line.ends_with("\r\n") {
        "\r\n"
    } else if line.ends_with('\n') {
        "\n"
    } else {
        ""
    }
}
