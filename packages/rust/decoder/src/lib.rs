//! Semicolon-delimited CSV decoding into a metadata block and a dataset table.
//!
//! Each uploaded file carries a fixed layout: a key/value metadata block, one
//! empty separator row, then a dataset whose first two columns stay empty.
//! Decoding has two failure modes:
//! - the bytes cannot be read as delimited text at all: `Ok(None)`, logged,
//!   so callers can skip the file
//! - the grid does not follow the layout: [`Csv2MdError::Structure`]

mod encoding;
mod grid;
mod layout;

use std::path::Path;

use tracing::{debug, info, instrument, warn};

use csv2md_shared::{CsvSchema, Csv2MdError, DatasetTable, Metadata, Result};

pub use encoding::{DecodedText, decode_text, detect_encoding};
pub use grid::{DELIMITER, RawGrid};
pub use layout::decode;

/// A successfully decoded CSV file.
#[derive(Debug, Clone)]
pub struct DecodedCsv {
    /// File name used in messages and for the generated page.
    pub name: String,
    /// Name of the detected character encoding.
    pub encoding: &'static str,
    /// Metadata block.
    pub metadata: Metadata,
    /// Dataset block.
    pub dataset: DatasetTable,
}

/// Read and decode a CSV file.
///
/// I/O errors propagate; an undecodable byte stream yields `Ok(None)`.
#[instrument(skip_all, fields(path = %path.display()))]
pub fn decode_file(path: &Path, schema: &CsvSchema) -> Result<Option<DecodedCsv>> {
    let bytes = std::fs::read(path).map_err(|e| Csv2MdError::io(path, e))?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    decode_bytes(&name, &bytes, schema)
}

/// Decode raw CSV bytes belonging to the file `name`.
pub fn decode_bytes(name: &str, bytes: &[u8], schema: &CsvSchema) -> Result<Option<DecodedCsv>> {
    let Some((grid, encoding)) = read_grid(name, bytes) else {
        return Ok(None);
    };

    let (metadata, dataset) = decode(&grid, &schema.metadata_keys, &schema.dataset_keys)
        .map_err(|e| match e {
            Csv2MdError::Structure { message } => {
                Csv2MdError::structure(format!("[{name}] - {message}"))
            }
            other => other,
        })?;

    info!(
        file = name,
        encoding,
        metadata_keys = metadata.len(),
        records = dataset.len(),
        "decoded CSV"
    );

    Ok(Some(DecodedCsv {
        name: name.to_string(),
        encoding,
        metadata,
        dataset,
    }))
}

/// Detect the encoding and parse the text into a grid. `None` on any failure.
fn read_grid(name: &str, bytes: &[u8]) -> Option<(RawGrid, &'static str)> {
    let decoded = match decode_text(bytes) {
        Ok(decoded) => decoded,
        Err(reason) => {
            warn!(file = name, %reason, "could not decode CSV bytes, skipping");
            return None;
        }
    };
    let encoding = decoded.encoding.name();
    debug!(file = name, encoding, "encoding detected");

    let grid = RawGrid::parse(&decoded.text, DELIMITER);
    if grid.is_empty() {
        warn!(file = name, encoding, "CSV contains no rows, skipping");
        return None;
    }
    debug!(file = name, rows = grid.len(), "parsed CSV grid");
    Some((grid, encoding))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn schema() -> CsvSchema {
        CsvSchema::new(
            vec!["name".into(), "version".into()],
            vec!["colX".into(), "colY".into()],
        )
    }

    fn fixture_path(name: &str) -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("../../../fixtures/csv")
            .join(name)
    }

    #[test]
    fn decode_bytes_well_formed() {
        let bytes = b"name;DatasetA;;\nversion;1.0;;\n;;;\n;;colX;colY\n;;1;2\n;;3;4\n";
        let decoded = decode_bytes("a.csv", bytes, &schema()).unwrap().unwrap();

        assert_eq!(decoded.name, "a.csv");
        assert_eq!(decoded.metadata["name"], "DatasetA");
        assert_eq!(decoded.dataset.len(), 2);
        assert_eq!(decoded.dataset.get(1, "colY"), Some("4"));
    }

    #[test]
    fn structure_errors_name_the_file() {
        let bytes = b"name;DatasetA\nversion;1.0\n;;colX;colY\n";
        let err = decode_bytes("broken.csv", bytes, &schema()).unwrap_err();
        assert!(matches!(err, Csv2MdError::Structure { .. }));
        assert!(err.to_string().contains("[broken.csv] - line 3 must be empty"));
    }

    #[test]
    fn empty_input_is_no_result() {
        assert!(decode_bytes("empty.csv", b"", &schema()).unwrap().is_none());
        assert!(decode_bytes("blank.csv", b"\n\n", &schema()).unwrap().is_none());
    }

    #[test]
    fn malformed_utf8_is_no_result() {
        let bytes = b"\xEF\xBB\xBFname;\xFF\xFE\nversion;1.0\n;;\n;;colX;colY\n";
        assert!(decode_bytes("bad.csv", bytes, &schema()).unwrap().is_none());
    }

    #[test]
    fn crlf_line_endings() {
        let bytes = b"name;DatasetA\r\nversion;1.0\r\n;;;\r\n;;colX;colY\r\n;;1;2\r\n";
        let decoded = decode_bytes("crlf.csv", bytes, &schema()).unwrap().unwrap();
        assert_eq!(decoded.dataset.get(0, "colX"), Some("1"));
    }

    #[test]
    fn decode_file_missing_is_io_error() {
        let err = decode_file(Path::new("/nonexistent/never.csv"), &schema()).unwrap_err();
        assert!(matches!(err, Csv2MdError::Io { .. }));
    }

    #[test]
    fn legacy_encoding_keeps_ascii_cells() {
        let bytes = b"name;Estaci\xF3 Val\xE8ncia\nversion;1.0\n;;\n;;colX;colY\n;;1;2\n";
        let decoded = decode_bytes("legacy.csv", bytes, &schema()).unwrap().unwrap();
        assert_ne!(decoded.encoding, "UTF-8");
        assert_eq!(decoded.metadata["version"], "1.0");
        assert!(decoded.metadata["name"].starts_with("Estaci"));
    }

    fn fixture_schema() -> CsvSchema {
        CsvSchema::new(
            vec![
                "name".into(),
                "description".into(),
                "author".into(),
                "license".into(),
                "version".into(),
            ],
            vec!["timestamp".into(), "value".into()],
        )
    }

    #[test]
    fn decode_fixture_utf8_bom() {
        let decoded = decode_file(&fixture_path("rain-valencia.csv"), &fixture_schema())
            .unwrap()
            .expect("fixture decodes");

        assert_eq!(decoded.name, "rain-valencia.csv");
        assert_eq!(decoded.encoding, "UTF-8");
        assert_eq!(decoded.metadata["author"], "Ajuntament de València");
        assert_eq!(
            decoded.metadata["description"],
            "Hourly rainfall; city centre station"
        );
        assert_eq!(decoded.dataset.columns, vec!["timestamp", "value"]);
        assert_eq!(decoded.dataset.len(), 3);
    }

    #[test]
    fn decode_fixture_missing_separator() {
        let err = decode_file(&fixture_path("missing-separator.csv"), &fixture_schema())
            .unwrap_err();
        assert!(err.to_string().contains("[missing-separator.csv] - line 6 must be empty"));
    }
}
