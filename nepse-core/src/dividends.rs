//! Dividend history aggregation.
//!
//! The dividend file holds one row per symbol and fiscal year. Rows are
//! folded into per-symbol sums and a count, from which the merger derives
//! "average bonus", "average cash", "average right" and "years observed".

use std::cmp::Ordering;
use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::parse::ParseError;
use crate::table::Table;

pub const SYMBOL_COLUMN: &str = "Symbol";
pub const BONUS_COLUMN: &str = "Bonus(%)";
pub const CASH_COLUMN: &str = "Cash(%)";
pub const RIGHT_COLUMN: &str = "Right Share";
pub const FISCAL_YEAR_COLUMN: &str = "Fiscal Year";

/// One (symbol, fiscal year) observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DividendRecord {
    pub symbol: String,
    pub bonus_pct: f64,
    pub cash_pct: f64,
    pub right_pct: f64,
}

impl DividendRecord {
    /// Build a record from raw cell text. Unparsable numbers become 0.
    pub fn from_raw(symbol: &str, bonus: Option<&str>, cash: Option<&str>, right: Option<&str>) -> Self {
        Self {
            symbol: symbol.to_string(),
            bonus_pct: lenient_f64(bonus),
            cash_pct: lenient_f64(cash),
            right_pct: lenient_f64(right),
        }
    }
}

/// Running totals for one symbol.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DividendAggregate {
    pub bonus_sum: f64,
    pub cash_sum: f64,
    pub right_sum: f64,
    pub count: u32,
}

impl DividendAggregate {
    fn add(&mut self, record: &DividendRecord) {
        self.bonus_sum += record.bonus_pct;
        self.cash_sum += record.cash_pct;
        self.right_sum += record.right_pct;
        self.count += 1;
    }

    fn mean(&self, sum: f64) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            sum / f64::from(self.count)
        }
    }

    pub fn avg_bonus(&self) -> f64 {
        self.mean(self.bonus_sum)
    }

    pub fn avg_cash(&self) -> f64 {
        self.mean(self.cash_sum)
    }

    pub fn avg_right(&self) -> f64 {
        self.mean(self.right_sum)
    }
}

/// Per-symbol dividend aggregates.
pub type DividendMap = HashMap<String, DividendAggregate>;

/// Fold records into one aggregate per symbol.
///
/// Symbols without records are absent from the map, which is how the
/// merger tells "no dividend history" apart from "zero dividends".
pub fn aggregate<'a>(records: impl IntoIterator<Item = &'a DividendRecord>) -> DividendMap {
    let mut map = DividendMap::new();
    for record in records {
        map.entry(record.symbol.clone()).or_default().add(record);
    }
    map
}

/// Read dividend records out of a parsed dividend CSV.
///
/// `Symbol` is required. `Bonus(%)`, `Cash(%)` and `Right Share` are read when
/// present; a missing column contributes 0 to every record.
pub fn records_from_table(table: &Table) -> Result<Vec<DividendRecord>, ParseError> {
    if table.is_empty() {
        return Ok(Vec::new());
    }

    let symbol_idx = table
        .column_index(SYMBOL_COLUMN)
        .ok_or_else(|| ParseError::MissingColumn(SYMBOL_COLUMN.to_string()))?;
    let bonus_idx = table.column_index(BONUS_COLUMN);
    let cash_idx = table.column_index(CASH_COLUMN);
    let right_idx = table.column_index(RIGHT_COLUMN);

    for (name, idx) in [(BONUS_COLUMN, bonus_idx), (CASH_COLUMN, cash_idx)] {
        if idx.is_none() {
            warn!(column = name, "dividend table has no such column, treating as 0");
        }
    }

    let mut records = Vec::with_capacity(table.data_len());
    let mut skipped = 0usize;
    for row in table.data_rows() {
        let symbol = row.get(symbol_idx).map(|s| s.as_str()).unwrap_or("");
        if symbol.is_empty() {
            skipped += 1;
            continue;
        }
        records.push(DividendRecord::from_raw(
            symbol,
            pick(row, bonus_idx),
            pick(row, cash_idx),
            pick(row, right_idx),
        ));
    }

    if skipped > 0 {
        debug!(skipped, "dividend rows without a symbol were skipped");
    }

    Ok(records)
}

fn pick(row: &[String], idx: Option<usize>) -> Option<&str> {
    idx.and_then(|i| row.get(i)).map(String::as_str)
}

/// Sort a dividend table by `Symbol` ascending, then `Fiscal Year` descending.
///
/// The header stays first; ties keep their input order. A table without a
/// `Fiscal Year` column is sorted by symbol alone.
pub fn sort_table(table: &mut Table) -> Result<(), ParseError> {
    if table.data_len() < 2 {
        return Ok(());
    }

    let symbol_idx = table
        .column_index(SYMBOL_COLUMN)
        .ok_or_else(|| ParseError::MissingColumn(SYMBOL_COLUMN.to_string()))?;
    let year_idx = table.column_index(FISCAL_YEAR_COLUMN);

    let key = |row: &[String], idx: usize| row.get(idx).cloned().unwrap_or_default();

    let rows = table.rows_mut();
    rows[1..].sort_by(|a, b| {
        let by_symbol = key(a, symbol_idx).cmp(&key(b, symbol_idx));
        match (by_symbol, year_idx) {
            (Ordering::Equal, Some(y)) => key(b, y).cmp(&key(a, y)),
            (ord, _) => ord,
        }
    });

    Ok(())
}

/// Parse the leading decimal number of `raw`, or 0 when there is none.
///
/// `"10%"` reads as 10, `"12.5 (approx)"` as 12.5, `"N/A"` and `""` as 0.
pub fn lenient_f64(raw: Option<&str>) -> f64 {
    let Some(text) = raw.map(str::trim_start) else {
        return 0.0;
    };

    let bytes = text.as_bytes();
    let mut end = 0;
    if matches!(bytes.first(), Some(b'+') | Some(b'-')) {
        end += 1;
    }
    let int_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    let mut digits = end - int_start;
    if end < bytes.len() && bytes[end] == b'.' {
        let frac_start = end + 1;
        let mut frac_end = frac_start;
        while frac_end < bytes.len() && bytes[frac_end].is_ascii_digit() {
            frac_end += 1;
        }
        digits += frac_end - frac_start;
        if digits > 0 {
            end = frac_end;
        }
    }
    if digits == 0 {
        return 0.0;
    }
    // Optional exponent, only when followed by at least one digit.
    if end < bytes.len() && matches!(bytes[end], b'e' | b'E') {
        let mut exp_end = end + 1;
        if matches!(bytes.get(exp_end), Some(b'+') | Some(b'-')) {
            exp_end += 1;
        }
        let exp_digits_start = exp_end;
        while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
            exp_end += 1;
        }
        if exp_end > exp_digits_start {
            end = exp_end;
        }
    }

    text[..end]
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}
