//! Tabular parsers.
//!
//! Three external formats feed the pipeline: delimited text with a header
//! line (dividend and fundamentals CSVs), HTML pages holding the live
//! trading table, and the JSON cache envelope. All of them come out as a
//! [`Table`] whose first row is the header. Company detail pages are read
//! for two labelled figures only, see [`parse_company_page`].

pub mod delimited;
pub mod envelope;
pub mod markup;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::table::Table;

pub use delimited::parse_delimited;
pub use envelope::{parse_envelope, parse_published, Published};
pub use markup::{parse_company_page, parse_markup, CompanyFields};

/// Which external format a source is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Comma-separated text whose first line names the columns.
    Delimited,
    /// An HTML document containing the trading table.
    Markup,
    /// A JSON value with a `data` field holding the table.
    JsonEnvelope,
}

/// Errors raised while turning raw text into a [`Table`].
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("malformed delimited text at line {line}: {message}")]
    Delimited { line: u64, message: String },

    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("no trading table found in document")]
    TableNotFound,

    #[error("missing required column '{0}'")]
    MissingColumn(String),
}

/// Parse `source` according to `kind`.
pub fn parse(source: &str, kind: SourceKind) -> Result<Table, ParseError> {
    match kind {
        SourceKind::Delimited => parse_delimited(source),
        SourceKind::Markup => parse_markup(source),
        SourceKind::JsonEnvelope => parse_envelope(source),
    }
}
