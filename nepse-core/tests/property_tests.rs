//! Property tests for the merge invariants.
//!
//! Uses proptest to verify:
//! 1. Row preservation: merging against empty lookups keeps every trading row
//! 2. Aggregate count equals the number of records for each symbol
//! 3. Averages are the arithmetic mean rounded to two decimals
//! 4. Aggregate-then-merge is idempotent
//! 5. Freshness is monotone in cache age within one session

use chrono::{Duration, TimeZone, Utc};
use proptest::prelude::*;
use std::collections::HashMap;

use nepse_core::dividends::{aggregate, DividendRecord};
use nepse_core::table::{Table, TRADING_HEADER};
use nepse_core::{
    is_fresh, merge, DividendMap, FreshnessPolicy, FundamentalsMap, MarketCalendar, OutputSchema,
    PLACEHOLDER,
};

// ── Strategies (proptest) ────────────────────────────────────────────

fn arb_symbol() -> impl Strategy<Value = String> {
    "[A-Z]{2,5}"
}

fn arb_trading() -> impl Strategy<Value = Table> {
    prop::collection::vec((arb_symbol(), 1u32..100_000), 0..40).prop_map(|rows| {
        let data = rows
            .into_iter()
            .map(|(symbol, cents)| vec![symbol, format!("{:.2}", f64::from(cents) / 100.0)])
            .collect();
        Table::with_header(TRADING_HEADER, data)
    })
}

/// Percentages in hundredths, so the expected mean can be computed exactly.
fn arb_records() -> impl Strategy<Value = Vec<(String, u32, u32)>> {
    prop::collection::vec(
        (prop::sample::select(vec!["ABC", "XYZ", "NABIL", "ADBL"]), 0u32..10_000, 0u32..10_000),
        0..60,
    )
    .prop_map(|v| {
        v.into_iter()
            .map(|(s, b, c)| (s.to_string(), b, c))
            .collect()
    })
}

fn to_records(raw: &[(String, u32, u32)]) -> Vec<DividendRecord> {
    raw.iter()
        .map(|(symbol, bonus, cash)| {
            let bonus = format!("{}", f64::from(*bonus) / 100.0);
            let cash = format!("{}", f64::from(*cash) / 100.0);
            DividendRecord::from_raw(symbol, Some(&bonus), Some(&cash), None)
        })
        .collect()
}

// ── 1. Row preservation ──────────────────────────────────────────────

proptest! {
    #[test]
    fn merge_with_empty_lookups_keeps_rows(trading in arb_trading()) {
        for schema in [OutputSchema::Basic, OutputSchema::Extended] {
            let merged = merge(&trading, &DividendMap::new(), &FundamentalsMap::new(), schema);
            prop_assert_eq!(merged.data_len(), trading.data_len());

            for (out, input) in merged.data_rows().iter().zip(trading.data_rows()) {
                prop_assert_eq!(out.len(), schema.columns().len());
                prop_assert_eq!(&out[0], &input[0]);
                prop_assert_eq!(&out[1], &input[1]);
                prop_assert!(out[2..].iter().all(|c| c == PLACEHOLDER));
            }
        }
    }
}

// ── 2. Aggregate counts ──────────────────────────────────────────────

proptest! {
    #[test]
    fn aggregate_count_matches_records(raw in arb_records()) {
        let records = to_records(&raw);
        let map = aggregate(&records);

        let mut expected: HashMap<&str, u32> = HashMap::new();
        for (symbol, _, _) in &raw {
            *expected.entry(symbol.as_str()).or_default() += 1;
        }

        prop_assert_eq!(map.len(), expected.len());
        for (symbol, count) in expected {
            prop_assert_eq!(map[symbol].count, count);
        }
    }
}

// ── 3. Rounded averages ──────────────────────────────────────────────

proptest! {
    #[test]
    fn merged_average_is_rounded_mean(raw in arb_records()) {
        prop_assume!(!raw.is_empty());
        let records = to_records(&raw);
        let dividends = aggregate(&records);

        let symbol = raw[0].0.clone();
        let trading = Table::with_header(TRADING_HEADER, vec![vec![symbol.clone(), "100".into()]]);
        let merged = merge(&trading, &dividends, &FundamentalsMap::new(), OutputSchema::Basic);
        let row = &merged.data_rows()[0];

        let mine: Vec<_> = raw.iter().filter(|r| r.0 == symbol).collect();
        let n = mine.len() as f64;
        let bonus_mean = mine.iter().map(|r| f64::from(r.1)).sum::<f64>() / 100.0 / n;
        let cash_mean = mine.iter().map(|r| f64::from(r.2)).sum::<f64>() / 100.0 / n;

        let bonus: f64 = row[2].parse().unwrap();
        let cash: f64 = row[3].parse().unwrap();
        prop_assert!((bonus - bonus_mean).abs() <= 0.005 + 1e-9);
        prop_assert!((cash - cash_mean).abs() <= 0.005 + 1e-9);
        prop_assert_eq!(row[2].split('.').nth(1).map(str::len), Some(2));
        prop_assert_eq!(row[4].parse::<usize>().unwrap(), mine.len());
    }
}

// ── 4. Idempotence ───────────────────────────────────────────────────

proptest! {
    #[test]
    fn aggregate_then_merge_is_idempotent(trading in arb_trading(), raw in arb_records()) {
        let records = to_records(&raw);
        let first = merge(&trading, &aggregate(&records), &FundamentalsMap::new(), OutputSchema::Extended);
        let second = merge(&trading, &aggregate(&records), &FundamentalsMap::new(), OutputSchema::Extended);
        prop_assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }
}

// ── 5. Freshness monotonicity ────────────────────────────────────────

proptest! {
    /// If an entry of age `a` is stale, any older entry is stale too.
    #[test]
    fn older_entries_are_never_fresher(a in 0i64..2000, extra in 1i64..2000) {
        let calendar = MarketCalendar::default();
        let policy = FreshnessPolicy::default();
        // 2025-01-05 15:00 NPT, market closed
        let now = Utc.with_ymd_and_hms(2025, 1, 5, 9, 15, 0).unwrap();

        let younger = is_fresh(now - Duration::minutes(a), now, &calendar, &policy);
        let older = is_fresh(now - Duration::minutes(a + extra), now, &calendar, &policy);
        prop_assert!(younger || !older);
    }
}
