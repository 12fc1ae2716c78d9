//! Character encoding detection for uploaded CSV files.
//!
//! Spreadsheet exports arrive as UTF-8, UTF-8 with BOM, UTF-16, or a legacy
//! single-byte code page depending on the uploader's locale.

use chardetng::EncodingDetector;
use encoding_rs::Encoding;

/// Text decoded from raw bytes, with the encoding that was used.
#[derive(Debug, Clone)]
pub struct DecodedText {
    pub text: String,
    pub encoding: &'static Encoding,
}

/// Guess the encoding of `bytes`: a byte-order mark wins, otherwise statistical detection.
pub fn detect_encoding(bytes: &[u8]) -> &'static Encoding {
    if let Some((encoding, _bom_len)) = Encoding::for_bom(bytes) {
        return encoding;
    }

    let mut detector = EncodingDetector::new();
    detector.feed(bytes, true);
    detector.guess(None, true)
}

/// Decode `bytes` with the detected encoding.
///
/// Returns the failure reason when the bytes contain sequences that are
/// malformed for that encoding.
pub fn decode_text(bytes: &[u8]) -> Result<DecodedText, String> {
    let detected = detect_encoding(bytes);
    let (text, used, had_errors) = detected.decode(bytes);

    if had_errors {
        return Err(format!("malformed byte sequence for encoding {}", used.name()));
    }

    Ok(DecodedText {
        text: text.into_owned(),
        encoding: used,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_ascii_decodes() {
        let decoded = decode_text(b"name;DatasetA\n").unwrap();
        assert_eq!(decoded.text, "name;DatasetA\n");
    }

    #[test]
    fn utf8_bom_is_detected_and_stripped() {
        let bytes = b"\xEF\xBB\xBFname;Caf\xC3\xA9\n";
        let decoded = decode_text(bytes).unwrap();
        assert_eq!(decoded.encoding, encoding_rs::UTF_8);
        assert_eq!(decoded.text, "name;Café\n");
    }

    #[test]
    fn utf16le_bom_is_detected() {
        let mut bytes = vec![0xFF, 0xFE];
        for unit in "a;b\n".encode_utf16() {
            bytes.extend_from_slice(&unit.to_le_bytes());
        }
        let decoded = decode_text(&bytes).unwrap();
        assert_eq!(decoded.encoding, encoding_rs::UTF_16LE);
        assert_eq!(decoded.text, "a;b\n");
    }

    #[test]
    fn latin1_text_is_not_reported_as_utf8() {
        // "València;Aigua" in windows-1252: the é/è bytes are invalid UTF-8.
        let bytes = b"Val\xE8ncia;Aigua de pluja\nnom;Estaci\xF3 meteorol\xF2gica\n";
        let decoded = decode_text(bytes).unwrap();
        assert_ne!(decoded.encoding, encoding_rs::UTF_8);
        assert!(decoded.text.contains("Val"));
        assert!(decoded.text.contains("Aigua de pluja"));
    }
}
