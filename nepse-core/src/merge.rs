//! Left join of the trading snapshot against dividend and fundamentals lookups.
//!
//! The trading table drives: every data row comes out exactly once, in input
//! order, whether or not the symbol has dividend history or fundamentals.
//! Unmatched fields are filled with [`PLACEHOLDER`].

use crate::dividends::{DividendAggregate, DividendMap};
use crate::fundamentals::{Fundamentals, FundamentalsMap};
use crate::schema::{OutputColumn, OutputSchema};
use crate::table::{cell, columns, Row, Table};

/// Cell text for a field with no matching source record.
pub const PLACEHOLDER: &str = "-";

/// Merge trading rows with dividend aggregates and fundamentals.
///
/// The input header is replaced by the schema's fixed header. An input with
/// no rows at all merges to an empty table.
pub fn merge(
    trading: &Table,
    dividends: &DividendMap,
    fundamentals: &FundamentalsMap,
    schema: OutputSchema,
) -> Table {
    if trading.is_empty() {
        return Table::default();
    }

    let data = trading
        .data_rows()
        .iter()
        .map(|row| merge_row(row, dividends, fundamentals, schema))
        .collect();

    Table::with_header(schema.header(), data)
}

fn merge_row(
    row: &[String],
    dividends: &DividendMap,
    fundamentals: &FundamentalsMap,
    schema: OutputSchema,
) -> Row {
    let symbol = cell(row, columns::SYMBOL).unwrap_or("");
    let ltp = cell(row, columns::LTP).unwrap_or("");
    let dividend = dividends.get(symbol);
    let fundamental = fundamentals.get(symbol);

    schema
        .columns()
        .iter()
        .map(|&column| field(column, symbol, ltp, dividend, fundamental))
        .collect()
}

fn field(
    column: OutputColumn,
    symbol: &str,
    ltp: &str,
    dividend: Option<&DividendAggregate>,
    fundamental: Option<&Fundamentals>,
) -> String {
    match column {
        OutputColumn::Symbol => symbol.to_string(),
        OutputColumn::Ltp => ltp.to_string(),
        OutputColumn::AvgBonus => fixed2(dividend.map(DividendAggregate::avg_bonus)),
        OutputColumn::AvgCash => fixed2(dividend.map(DividendAggregate::avg_cash)),
        OutputColumn::AvgRight => fixed2(dividend.map(DividendAggregate::avg_right)),
        OutputColumn::YearsCount => dividend
            .map(|d| d.count.to_string())
            .unwrap_or_else(|| PLACEHOLDER.to_string()),
        OutputColumn::Eps => fundamental
            .map(|f| f.eps.clone())
            .unwrap_or_else(|| PLACEHOLDER.to_string()),
        OutputColumn::BookValue => fundamental
            .map(|f| f.book_value.clone())
            .unwrap_or_else(|| PLACEHOLDER.to_string()),
    }
}

fn fixed2(value: Option<f64>) -> String {
    match value {
        Some(v) => to_fixed2(v),
        None => PLACEHOLDER.to_string(),
    }
}

/// Two decimals, with exact half-cent ties rounded away from zero.
///
/// `{:.2}` rounds exact binary ties (2.625, 0.125) to even; published
/// screener values round them up. Values that only look like ties in
/// decimal (1.005 is stored below the tie) keep the exact rounding.
fn to_fixed2(v: f64) -> String {
    if is_half_cent_tie(v) {
        // v * 100 is exact for a tie, so `round` sees the true .5.
        format!("{:.2}", (v * 100.0).round() / 100.0)
    } else {
        format!("{v:.2}")
    }
}

fn is_half_cent_tie(v: f64) -> bool {
    if !v.is_finite() {
        return false;
    }
    // Formatting is exact, and any double that is not a tie differs from
    // the nearest half cent far above the 40th decimal.
    let exact = format!("{:.40}", v.abs());
    match exact.split_once('.') {
        Some((_, frac)) => frac[2..].starts_with('5') && frac[3..].bytes().all(|b| b == b'0'),
        None => false,
    }
}
