//! JSON envelope: `{ "timestamp": ..., "data": [[...], ...] }`.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::ParseError;
use crate::store::parse_timestamp;
use crate::table::Table;

#[derive(Debug, Deserialize)]
struct Document {
    #[serde(default)]
    timestamp: Option<serde_json::Value>,
    #[serde(default)]
    data: Option<Table>,
}

/// A published envelope as read, before it is cached.
#[derive(Debug, Clone, PartialEq)]
pub struct Published {
    /// When the publisher took the snapshot. `None` if absent or unreadable.
    pub timestamp: Option<DateTime<Utc>>,
    pub data: Table,
}

/// Read both fields of a JSON envelope.
///
/// The timestamp is optional: a missing, non-string or unparsable value is
/// reported as `None` rather than failing the document.
pub fn parse_published(source: &str) -> Result<Published, ParseError> {
    let document: Document = serde_json::from_str(source)?;
    let timestamp = document
        .timestamp
        .as_ref()
        .and_then(serde_json::Value::as_str)
        .and_then(parse_timestamp);
    Ok(Published {
        timestamp,
        data: document.data.unwrap_or_default(),
    })
}

/// Extract the `data` table from a JSON envelope.
///
/// A missing or null `data` field yields an empty table.
pub fn parse_envelope(source: &str) -> Result<Table, ParseError> {
    parse_published(source).map(|p| p.data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_data_field() {
        let src = r#"{
            "timestamp": "2025-01-05T10:15:00",
            "data": [["Symbol", "LTP"], ["ACLBSL", "1,011.00"]]
        }"#;
        let t = parse_envelope(src).unwrap();
        assert_eq!(t.data_len(), 1);
        assert_eq!(t.data_rows()[0][1], "1,011.00");
    }

    #[test]
    fn missing_data_is_empty_table() {
        assert!(parse_envelope(r#"{"timestamp":"x"}"#).unwrap().is_empty());
        assert!(parse_envelope(r#"{"data":null}"#).unwrap().is_empty());
    }

    #[test]
    fn keeps_published_timestamp() {
        use chrono::TimeZone;

        let p = parse_published(
            r#"{"timestamp": "2025-01-01T09:30:00+05:45", "data": [["Symbol","LTP"],["ABC","1"]]}"#,
        )
        .unwrap();
        assert_eq!(p.timestamp, Some(Utc.with_ymd_and_hms(2025, 1, 1, 3, 45, 0).unwrap()));
        assert_eq!(p.data.data_len(), 1);

        assert_eq!(parse_published(r#"{"data":[]}"#).unwrap().timestamp, None);
        assert_eq!(parse_published(r#"{"timestamp":"soon"}"#).unwrap().timestamp, None);
        assert_eq!(parse_published(r#"{"timestamp":1736000000}"#).unwrap().timestamp, None);
    }

    #[test]
    fn invalid_json_is_parse_error() {
        assert!(matches!(parse_envelope("{not json"), Err(ParseError::Json(_))));
        assert!(matches!(parse_envelope("[1,2]"), Err(ParseError::Json(_))));
    }
}
