//! Utility functions for feed payload and text processing.

use chrono::{DateTime, Utc};

use crate::error::{Error, Result};

/// Maximum number of characters in a derived title.
pub const TITLE_MAX_CHARS: usize = 60;

/// Title used when a body has no usable first line.
pub const UNTITLED: &str = "Untitled";

/// Convert bytes with various text encodings to a UTF-8 string.
///
/// Tries UTF-8 first, then UTF-16 when the data starts with a byte order
/// mark, and finally Windows-1252, which maps every byte and so never fails.
///
/// # Example
///
/// ```
/// use unhook_rs::utils::decode_text_with_encoding;
///
/// assert_eq!(decode_text_with_encoding(b"plain ascii"), "plain ascii");
/// // 0xE9 is "é" in Windows-1252
/// assert_eq!(decode_text_with_encoding(&[0x63, 0x61, 0x66, 0xE9]), "café");
/// ```
pub fn decode_text_with_encoding(data: &[u8]) -> String {
    if let Ok(text) = std::str::from_utf8(data) {
        return text.strip_prefix('\u{feff}').unwrap_or(text).to_string();
    }

    if let Some((encoding, bom_len)) = encoding_rs::Encoding::for_bom(data) {
        let (decoded, had_errors) = encoding.decode_without_bom_handling(&data[bom_len..]);
        if !had_errors {
            return decoded.into_owned();
        }
    }

    // Covers ISO-8859-1 plus extras
    let (decoded, _) = encoding_rs::WINDOWS_1252.decode_without_bom_handling(data);
    decoded.into_owned()
}

/// Parse an ISO 8601 / RFC 3339 timestamp as returned by the social API.
///
/// # Example
///
/// ```
/// use unhook_rs::utils::parse_timestamp;
///
/// let ts = parse_timestamp("2025-01-06T14:04:52.233Z").unwrap();
/// assert_eq!(ts.to_rfc3339(), "2025-01-06T14:04:52.233+00:00");
/// ```
pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value.trim())
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| Error::Parse(format!("invalid timestamp {value:?}: {e}")))
}

/// Derive a display title from a body: its first line, capped at
/// [`TITLE_MAX_CHARS`] characters.
///
/// # Example
///
/// ```
/// use unhook_rs::utils::derive_title;
///
/// assert_eq!(derive_title("Hello\nworld"), "Hello");
/// assert_eq!(derive_title("   "), "Untitled");
/// ```
pub fn derive_title(body: &str) -> String {
    let first_line = body.trim().lines().next().unwrap_or("").trim();
    if first_line.is_empty() {
        return UNTITLED.to_string();
    }
    first_line.chars().take(TITLE_MAX_CHARS).collect()
}

/// Length of a text in characters, the unit used for length thresholds.
pub fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Escape the HTML special characters in a plain text body.
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_decode_utf8() {
        assert_eq!(decode_text_with_encoding("héllo".as_bytes()), "héllo");
    }

    #[test]
    fn test_decode_strips_bom() {
        let mut data = vec![0xEF, 0xBB, 0xBF];
        data.extend_from_slice(b"[]");
        assert_eq!(decode_text_with_encoding(&data), "[]");
    }

    #[test]
    fn test_decode_windows_1252() {
        assert_eq!(decode_text_with_encoding(&[0x6E, 0x61, 0xEF, 0x76, 0x65]), "naïve");
    }

    #[test]
    fn test_decode_utf16_with_bom() {
        // "hé" as UTF-16LE and UTF-16BE, each behind its byte order mark
        assert_eq!(decode_text_with_encoding(&[0xFF, 0xFE, 0x68, 0x00, 0xE9, 0x00]), "hé");
        assert_eq!(decode_text_with_encoding(&[0xFE, 0xFF, 0x00, 0x68, 0x00, 0xE9]), "hé");
    }

    #[test]
    fn test_decode_unpaired_surrogate_falls_back_to_1252() {
        // Lone high surrogate after a UTF-16LE BOM is not valid UTF-16
        let data = [0xFF, 0xFE, 0x00, 0xD8];
        assert_eq!(decode_text_with_encoding(&data), "ÿþ\u{0}Ø");
    }

    #[test]
    fn test_parse_timestamp_variants() {
        let expected = Utc.with_ymd_and_hms(2025, 10, 6, 12, 0, 0).unwrap();
        assert_eq!(parse_timestamp("2025-10-06T12:00:00Z").unwrap(), expected);
        assert_eq!(parse_timestamp("2025-10-06T12:00:00+00:00").unwrap(), expected);
        assert_eq!(parse_timestamp("2025-10-06T14:00:00+02:00").unwrap(), expected);

        let micros = parse_timestamp("2025-10-06T12:00:00.123456Z").unwrap();
        assert_eq!(micros.timestamp_subsec_micros(), 123456);
    }

    #[test]
    fn test_parse_timestamp_invalid() {
        assert!(matches!(parse_timestamp("yesterday"), Err(Error::Parse(_))));
        assert!(parse_timestamp("").is_err());
    }

    #[test]
    fn test_derive_title() {
        assert_eq!(derive_title("Short post"), "Short post");
        assert_eq!(derive_title("\n\nSecond line first\nthird"), "Second line first");
        assert_eq!(derive_title(""), UNTITLED);

        let long = "x".repeat(100);
        assert_eq!(derive_title(&long).chars().count(), TITLE_MAX_CHARS);
    }

    #[test]
    fn test_char_len_counts_characters() {
        assert_eq!(char_len("abc"), 3);
        assert_eq!(char_len("日本語"), 3);
        assert_eq!(char_len(""), 0);
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html(r#"a < b & "c" > d"#),
            "a &lt; b &amp; &quot;c&quot; &gt; d"
        );
    }
}
