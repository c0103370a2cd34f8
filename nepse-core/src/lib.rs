//! NEPSE Core: table model, parsers, freshness policy, dividend aggregation, merge.
//!
//! This crate holds the pure part of the screener pipeline:
//! - Position-encoded tables with a fixed header row
//! - Parsers for delimited text, the live trading HTML table, company detail
//!   pages and the JSON cache envelope
//! - Market-hours-aware cache freshness
//! - Dividend aggregation and fundamentals lookup
//! - The left-join merger producing the screener table
//! - The single-record snapshot cache abstraction

pub mod dividends;
pub mod freshness;
pub mod fundamentals;
pub mod merge;
pub mod parse;
pub mod schema;
pub mod store;
pub mod table;

pub use dividends::{aggregate, DividendAggregate, DividendMap, DividendRecord};
pub use freshness::{is_fresh, FreshnessPolicy, MarketCalendar, MarketSession};
pub use fundamentals::{Fundamentals, FundamentalsMap, FundamentalsRecord};
pub use merge::{merge, PLACEHOLDER};
pub use parse::{parse, parse_published, ParseError, Published, SourceKind};
pub use schema::{OutputColumn, OutputSchema};
pub use store::{CacheEnvelope, CacheStore, FileStore, MemoryStore, StoreError};
pub use table::{Row, Table};

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: pipeline types can cross the rayon fan-in.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        require_send::<Table>();
        require_sync::<Table>();
        require_send::<DividendMap>();
        require_sync::<DividendMap>();
        require_send::<FundamentalsMap>();
        require_sync::<FundamentalsMap>();
        require_send::<CacheEnvelope>();
        require_sync::<CacheEnvelope>();
        require_send::<ParseError>();
        require_send::<StoreError>();
        require_send::<FileStore>();
        require_sync::<FileStore>();
        require_send::<MemoryStore>();
        require_sync::<MemoryStore>();
    }

    #[test]
    fn aggregate_then_merge_is_idempotent() {
        let trading = parse(
            r#"{"data":[["Symbol","LTP"],["ABC","100"],["XYZ","50"],["NABIL","512"]]}"#,
            SourceKind::JsonEnvelope,
        )
        .unwrap();
        let dividend_table = parse(
            "Symbol,Bonus(%),Cash(%),Right Share\nABC,10,5,\nNABIL,N/A,12.5,\nABC,20,15,50\n",
            SourceKind::Delimited,
        )
        .unwrap();
        let records = dividends::records_from_table(&dividend_table).unwrap();
        let fundamentals =
            fundamentals::build(vec![FundamentalsRecord {
                symbol: "NABIL".into(),
                eps: "30.1".into(),
                book_value: "210".into(),
            }]);

        let run = || {
            let map = aggregate(&records);
            serde_json::to_string(&merge(&trading, &map, &fundamentals, OutputSchema::Extended))
                .unwrap()
        };
        assert_eq!(run(), run());
    }
}
