//! Position-encoded tables.
//!
//! Every source and the merged output share one shape: an ordered list of
//! rows, each an ordered list of string cells, with row 0 as the header.
//! On the wire this is a plain JSON array of arrays, so `Table` serializes
//! transparently.

use serde::{Deserialize, Serialize};

/// One row of string cells. Meaning is encoded by position.
pub type Row = Vec<String>;

/// Column positions in a trading snapshot.
pub mod columns {
    /// Ticker symbol.
    pub const SYMBOL: usize = 0;
    /// Last traded price.
    pub const LTP: usize = 1;
}

/// Header of a trading snapshot as written by the scraper.
pub const TRADING_HEADER: [&str; 2] = ["Symbol", "LTP"];

/// An ordered sequence of rows; row 0 is the header.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Table {
    rows: Vec<Row>,
}

impl Table {
    pub fn new(rows: Vec<Row>) -> Self {
        Self { rows }
    }

    /// Build a table from a header and its data rows.
    pub fn with_header<S: Into<String>>(header: impl IntoIterator<Item = S>, data: Vec<Row>) -> Self {
        let mut rows = Vec::with_capacity(data.len() + 1);
        rows.push(header.into_iter().map(Into::into).collect());
        rows.extend(data);
        Self { rows }
    }

    /// The header row, if the table has any rows at all.
    pub fn header(&self) -> Option<&Row> {
        self.rows.first()
    }

    /// All rows after the header.
    pub fn data_rows(&self) -> &[Row] {
        self.rows.get(1..).unwrap_or(&[])
    }

    /// All rows, header included.
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn rows_mut(&mut self) -> &mut Vec<Row> {
        &mut self.rows
    }

    pub fn into_rows(self) -> Vec<Row> {
        self.rows
    }

    /// True when the table has no rows (not even a header).
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Number of data rows (header excluded).
    pub fn data_len(&self) -> usize {
        self.rows.len().saturating_sub(1)
    }

    /// Position of a header cell, matched after trimming.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.header()?.iter().position(|h| h.trim() == name)
    }

    /// Iterate data rows with by-name access through the header.
    pub fn records(&self) -> impl Iterator<Item = Record<'_>> {
        let header = self.header().map(Vec::as_slice).unwrap_or(&[]);
        self.data_rows().iter().map(move |row| Record { header, row })
    }
}

/// Read a cell, treating missing trailing cells as absent.
pub fn cell(row: &[String], index: usize) -> Option<&str> {
    row.get(index).map(String::as_str)
}

/// A data row viewed through the table header.
#[derive(Debug, Clone, Copy)]
pub struct Record<'a> {
    header: &'a [String],
    row: &'a [String],
}

impl<'a> Record<'a> {
    /// Cell under the header column `name`, if both exist.
    pub fn get(&self, name: &str) -> Option<&'a str> {
        let idx = self.header.iter().position(|h| h.trim() == name)?;
        cell(self.row, idx)
    }

    pub fn row(&self) -> &'a [String] {
        self.row
    }
}
