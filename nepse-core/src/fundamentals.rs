//! Per-symbol EPS and book value.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::parse::ParseError;
use crate::table::Table;

pub const SYMBOL_COLUMN: &str = "Symbol";
pub const EPS_COLUMN: &str = "EPS";
pub const BOOK_VALUE_COLUMN: &str = "Book Value";

/// One fundamentals row as read from the source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FundamentalsRecord {
    pub symbol: String,
    pub eps: String,
    pub book_value: String,
}

/// EPS and book value, forwarded verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fundamentals {
    pub eps: String,
    pub book_value: String,
}

pub type FundamentalsMap = HashMap<String, Fundamentals>;

/// Build the lookup. A symbol seen twice keeps its last record.
pub fn build(records: impl IntoIterator<Item = FundamentalsRecord>) -> FundamentalsMap {
    records
        .into_iter()
        .map(|r| {
            (
                r.symbol,
                Fundamentals {
                    eps: r.eps,
                    book_value: r.book_value,
                },
            )
        })
        .collect()
}

/// Read fundamentals records from a parsed CSV.
///
/// `Symbol` is required; missing `EPS` or `Book Value` cells read as empty.
pub fn records_from_table(table: &Table) -> Result<Vec<FundamentalsRecord>, ParseError> {
    if table.is_empty() {
        return Ok(Vec::new());
    }
    if table.column_index(SYMBOL_COLUMN).is_none() {
        return Err(ParseError::MissingColumn(SYMBOL_COLUMN.to_string()));
    }

    Ok(table
        .records()
        .filter_map(|rec| {
            let symbol = rec.get(SYMBOL_COLUMN).filter(|s| !s.is_empty())?;
            Some(FundamentalsRecord {
                symbol: symbol.to_string(),
                eps: rec.get(EPS_COLUMN).unwrap_or_default().to_string(),
                book_value: rec.get(BOOK_VALUE_COLUMN).unwrap_or_default().to_string(),
            })
        })
        .collect())
}

/// Lay records out as a fundamentals CSV table, in the given order.
pub fn records_to_table(records: &[FundamentalsRecord]) -> Table {
    let data = records
        .iter()
        .map(|r| vec![r.symbol.clone(), r.eps.clone(), r.book_value.clone()])
        .collect();
    Table::with_header([SYMBOL_COLUMN, EPS_COLUMN, BOOK_VALUE_COLUMN], data)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(symbol: &str, eps: &str, bv: &str) -> FundamentalsRecord {
        FundamentalsRecord {
            symbol: symbol.into(),
            eps: eps.into(),
            book_value: bv.into(),
        }
    }

    #[test]
    fn last_write_wins() {
        let map = build(vec![rec("X", "1", "100"), rec("Y", "3", "50"), rec("X", "2", "110")]);
        assert_eq!(map.len(), 2);
        assert_eq!(map["X"].eps, "2");
        assert_eq!(map["X"].book_value, "110");
    }

    #[test]
    fn values_are_not_validated() {
        let map = build(vec![rec("ABC", "N/A", "1,234.5")]);
        assert_eq!(map["ABC"].eps, "N/A");
        assert_eq!(map["ABC"].book_value, "1,234.5");
    }

    #[test]
    fn reads_records_from_csv() {
        let table = crate::parse::parse_delimited(
            "Symbol,EPS,Book Value\nADBL,21.53,180.2\nNABIL,N/A,N/A\n",
        )
        .unwrap();
        let records = records_from_table(&table).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0], rec("ADBL", "21.53", "180.2"));
    }

    #[test]
    fn missing_value_column_reads_empty() {
        let table = crate::parse::parse_delimited("Symbol,EPS\nADBL,21.53\n").unwrap();
        let records = records_from_table(&table).unwrap();
        assert_eq!(records[0].book_value, "");
    }

    #[test]
    fn requires_symbol_column() {
        let table = crate::parse::parse_delimited("Ticker,EPS\nADBL,1\n").unwrap();
        assert!(records_from_table(&table).is_err());
    }

    #[test]
    fn table_reads_back_as_records() {
        let records = vec![rec("ADBL", "21.53", "180.2"), rec("NABIL", "N/A", "N/A")];
        let table = records_to_table(&records);
        assert_eq!(table.header().unwrap(), &vec!["Symbol", "EPS", "Book Value"]);
        assert_eq!(records_from_table(&table).unwrap(), records);
    }
}
