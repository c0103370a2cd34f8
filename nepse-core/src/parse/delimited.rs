//! Delimited text with a header line.

use super::ParseError;
use crate::table::{Row, Table};

/// Parse comma-separated text into a table.
///
/// The first non-empty line is the header. Quoted fields follow RFC 4180.
/// Empty lines are skipped. Any record whose cell count differs from the
/// header's fails the whole parse.
pub fn parse_delimited(source: &str) -> Result<Table, ParseError> {
    let source = source.strip_prefix('\u{feff}').unwrap_or(source);

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(false)
        .from_reader(source.as_bytes());

    let mut rows: Vec<Row> = Vec::new();
    for result in reader.records() {
        let record = result.map_err(|e| to_parse_error(&e))?;
        rows.push(record.iter().map(str::to_string).collect());
    }

    Ok(Table::new(rows))
}

fn to_parse_error(err: &csv::Error) -> ParseError {
    let line = match err.kind() {
        csv::ErrorKind::UnequalLengths { pos: Some(pos), .. } => pos.line(),
        _ => err.position().map(|p| p.line()).unwrap_or(0),
    };
    ParseError::Delimited {
        line,
        message: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_header_and_records() {
        let text = "Symbol,Fiscal Year,Bonus(%),Cash(%)\nABC,2079/80,10,5\nABC,2078/79,20,15\n";
        let t = parse_delimited(text).unwrap();
        assert_eq!(t.header().unwrap()[2], "Bonus(%)");
        assert_eq!(t.data_len(), 2);

        let rec = t.records().nth(1).unwrap();
        assert_eq!(rec.get("Cash(%)"), Some("15"));
        assert_eq!(rec.get("Fiscal Year"), Some("2078/79"));
    }

    #[test]
    fn skips_empty_lines() {
        let text = "Symbol,EPS\n\nABC,1.5\n\n\nXYZ,2\n";
        let t = parse_delimited(text).unwrap();
        assert_eq!(t.data_len(), 2);
        assert_eq!(t.data_rows()[1][0], "XYZ");
    }

    #[test]
    fn handles_quotes_and_crlf() {
        let text = "Symbol,Book Value\r\n\"ABC\",\"1,234.50\"\r\n\"X\"\"Y\",7\r\n";
        let t = parse_delimited(text).unwrap();
        assert_eq!(t.data_rows()[0][1], "1,234.50");
        assert_eq!(t.data_rows()[1][0], "X\"Y");
    }

    #[test]
    fn strips_byte_order_mark() {
        let t = parse_delimited("\u{feff}Symbol,EPS\nABC,1\n").unwrap();
        assert_eq!(t.column_index("Symbol"), Some(0));
    }

    #[test]
    fn wrong_cell_count_fails_whole_parse() {
        let text = "Symbol,EPS,Book Value\nABC,1,2\nXYZ,3\n";
        match parse_delimited(text) {
            Err(ParseError::Delimited { line, .. }) => assert_eq!(line, 3),
            other => panic!("expected Delimited error, got {other:?}"),
        }
    }

    #[test]
    fn empty_input_is_empty_table() {
        let t = parse_delimited("").unwrap();
        assert!(t.is_empty());
    }
}
