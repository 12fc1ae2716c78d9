//! Rendering of decoded datasets as standalone Markdown pages.

use csv2md_shared::DatasetTable;

/// Minimum dash count of a separator cell.
const MIN_WIDTH: usize = 3;

/// Content of one generated dataset page.
#[derive(Debug, Clone)]
pub struct DatasetPage<'a> {
    /// Page heading.
    pub title: String,
    /// Name of the CSV the page was generated from.
    pub source_file: String,
    /// ISO 8601 timestamp for the `generated_at` frontmatter field.
    pub generated_at: Option<String>,
    /// Metadata pairs in display order.
    pub metadata: Vec<(String, String)>,
    /// Dataset body.
    pub dataset: &'a DatasetTable,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Align {
    Left,
    Right,
}

/// Render an aligned pipe table. Numeric columns are right-aligned.
pub fn render_table(columns: &[String], rows: &[Vec<String>]) -> String {
    if columns.is_empty() {
        return String::new();
    }

    let header: Vec<String> = columns.iter().map(|c| escape_cell(c)).collect();
    let body: Vec<Vec<String>> = rows
        .iter()
        .map(|row| {
            (0..columns.len())
                .map(|i| row.get(i).map(|c| escape_cell(c)).unwrap_or_default())
                .collect()
        })
        .collect();

    let widths: Vec<usize> = (0..columns.len())
        .map(|i| {
            body.iter()
                .map(|r| r[i].chars().count())
                .chain(std::iter::once(header[i].chars().count()))
                .max()
                .unwrap_or(0)
                .max(MIN_WIDTH)
        })
        .collect();

    let aligns: Vec<Align> = (0..columns.len())
        .map(|i| {
            let mut values = body.iter().map(|r| r[i].as_str()).filter(|v| !v.is_empty());
            let first = values.next();
            if first.is_some_and(is_number) && values.all(is_number) {
                Align::Right
            } else {
                Align::Left
            }
        })
        .collect();

    let mut md = String::new();
    push_row(&mut md, &header, &widths, &aligns);

    md.push('|');
    for (width, align) in widths.iter().zip(&aligns) {
        let dashes = "-".repeat(width + 1);
        match align {
            Align::Left => md.push_str(&format!(":{dashes}|")),
            Align::Right => md.push_str(&format!("{dashes}:|")),
        }
    }
    md.push('\n');

    for row in &body {
        push_row(&mut md, row, &widths, &aligns);
    }

    md
}

/// Render a full dataset page: frontmatter, title, metadata table, data table.
pub fn render_dataset_page(page: &DatasetPage<'_>) -> String {
    let mut md = build_frontmatter(&page.source_file, &page.title, page.generated_at.as_deref());
    md.push('\n');
    md.push_str(&format!("# {}\n\n", page.title));

    if !page.metadata.is_empty() {
        let columns = vec!["Key".to_string(), "Value".to_string()];
        let rows: Vec<Vec<String>> = page
            .metadata
            .iter()
            .map(|(k, v)| vec![k.clone(), v.clone()])
            .collect();
        md.push_str(&render_table(&columns, &rows));
        md.push('\n');
    }

    md.push_str("## Data\n\n");
    if page.dataset.is_empty() {
        md.push_str("_No records._\n\n");
    }
    md.push_str(&render_table(&page.dataset.columns, &page.dataset.rows));
    md
}

fn push_row(md: &mut String, cells: &[String], widths: &[usize], aligns: &[Align]) {
    md.push('|');
    for ((cell, width), align) in cells.iter().zip(widths).zip(aligns) {
        match align {
            Align::Left => md.push_str(&format!(" {cell:<width$} |")),
            Align::Right => md.push_str(&format!(" {cell:>width$} |")),
        }
    }
    md.push('\n');
}

fn is_number(value: &str) -> bool {
    value.trim().parse::<f64>().is_ok_and(f64::is_finite)
}

fn escape_cell(value: &str) -> String {
    value.replace('|', "\\|").replace(['\r', '\n'], " ")
}

/// Build a YAML frontmatter block.
fn build_frontmatter(source_file: &str, title: &str, generated_at: Option<&str>) -> String {
    let mut fm = String::from("---\n");
    fm.push_str(&format!("title: \"{}\"\n", escape_yaml_string(title)));
    fm.push_str(&format!("source_file: \"{}\"\n", escape_yaml_string(source_file)));
    if let Some(ts) = generated_at {
        fm.push_str(&format!("generated_at: \"{ts}\"\n"));
    }
    fm.push_str("---\n");
    fm
}

/// Escape special characters in a YAML string value.
fn escape_yaml_string(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn sample_table() -> DatasetTable {
        DatasetTable {
            columns: strings(&["station", "rain_mm"]),
            rows: vec![strings(&["Valencia", "1.2"]), strings(&["Xàtiva", "10"])],
        }
    }

    #[test]
    fn renders_aligned_table() {
        let table = sample_table();
        let md = render_table(&table.columns, &table.rows);
        let expected = "\
| station  | rain_mm |
|:---------|--------:|
| Valencia |     1.2 |
| Xàtiva   |      10 |
";
        assert_eq!(md, expected);
    }

    #[test]
    fn escapes_pipes_and_newlines() {
        let md = render_table(&strings(&["a"]), &[strings(&["x|y\nz"])]);
        assert!(md.contains("| x\\|y z |"));
    }

    #[test]
    fn short_rows_are_padded() {
        let md = render_table(&strings(&["a", "b"]), &[strings(&["1"])]);
        assert_eq!(md.lines().nth(2), Some("|   1 |     |"));
    }

    #[test]
    fn empty_columns_render_nothing() {
        assert_eq!(render_table(&[], &[]), "");
    }

    #[test]
    fn header_only_table_is_left_aligned() {
        let md = render_table(&strings(&["value"]), &[]);
        assert_eq!(md, "| value |\n|:------|\n");
    }

    #[test]
    fn renders_full_page() {
        let table = sample_table();
        let page = DatasetPage {
            title: "Rain \"gauges\"".into(),
            source_file: "rain.csv".into(),
            generated_at: Some("2024-05-01T10:00:00Z".into()),
            metadata: vec![("name".into(), "Rain gauges".into())],
            dataset: &table,
        };

        let md = render_dataset_page(&page);
        assert!(md.starts_with("---\ntitle: \"Rain \\\"gauges\\\"\"\n"));
        assert!(md.contains("source_file: \"rain.csv\""));
        assert!(md.contains("generated_at: \"2024-05-01T10:00:00Z\""));
        assert!(md.contains("# Rain \"gauges\"\n"));
        assert!(md.contains("| name | Rain gauges |"));
        assert!(md.contains("## Data\n\n| station "));
        assert!(md.ends_with("|      10 |\n"));
    }

    #[test]
    fn empty_dataset_page_notes_no_records() {
        let table = DatasetTable {
            columns: strings(&["a"]),
            rows: vec![],
        };
        let page = DatasetPage {
            title: "Empty".into(),
            source_file: "empty.csv".into(),
            generated_at: None,
            metadata: vec![],
            dataset: &table,
        };
        let md = render_dataset_page(&page);
        assert!(!md.contains("generated_at"));
        assert!(md.contains("_No records._"));
        assert!(md.ends_with("| a   |\n|:----|\n"));
    }
}
