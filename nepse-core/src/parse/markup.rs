//! HTML extraction: the live trading table and company detail figures.
//!
//! Only the `Symbol` and `LTP` columns are kept from the trading table.
//! Their positions are found from the header row, so extra or reordered
//! columns on the page are tolerated.

use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use super::ParseError;
use crate::table::{Row, Table, TRADING_HEADER};

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("static selector is valid")
}

fn cell_text(cell: ElementRef<'_>) -> String {
    cell.text().collect::<String>().trim().to_string()
}

fn find_column(header: &[String], name: &str) -> Option<usize> {
    header.iter().position(|h| h.trim().eq_ignore_ascii_case(name))
}

/// Extract `["Symbol", "LTP"]` rows from the first table in `source`.
///
/// Returns [`ParseError::TableNotFound`] when the document has no table.
/// When the header lacks either column the result is an empty table and the
/// caller decides how to report it.
pub fn parse_markup(source: &str) -> Result<Table, ParseError> {
    let document = Html::parse_document(source);
    let table_sel = selector("table");
    let row_sel = selector("tr");
    let cell_sel = selector("th, td");

    let table = document
        .select(&table_sel)
        .next()
        .ok_or(ParseError::TableNotFound)?;

    let mut rows = table
        .select(&row_sel)
        .map(|tr| tr.select(&cell_sel).map(cell_text).collect::<Vec<_>>());

    let Some(header) = rows.next() else {
        debug!("trading table has no rows");
        return Ok(Table::default());
    };

    let (Some(symbol_idx), Some(ltp_idx)) =
        (find_column(&header, "symbol"), find_column(&header, "ltp"))
    else {
        debug!(?header, "trading table header lacks Symbol or LTP");
        return Ok(Table::default());
    };

    let needed = symbol_idx.max(ltp_idx);
    let data: Vec<Row> = rows
        .filter(|cells| cells.len() > needed)
        .map(|cells| vec![cells[symbol_idx].clone(), cells[ltp_idx].clone()])
        .collect();

    Ok(Table::with_header(TRADING_HEADER, data))
}

/// Figures read from a company detail page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompanyFields {
    pub eps: Option<String>,
    pub book_value: Option<String>,
}

/// Read the EPS and book value shown on a company detail page.
///
/// Each figure is the cell right after its label, in the first table row
/// that has a cell containing the label. The fiscal-year note following
/// the EPS figure (`31.75 (FY:080-081, Q:1)`) is dropped.
pub fn parse_company_page(source: &str) -> CompanyFields {
    let document = Html::parse_document(source);
    CompanyFields {
        eps: labelled_value(&document, "EPS").map(|v| match v.split_once('(') {
            Some((figure, _)) => figure.trim().to_string(),
            None => v,
        }),
        book_value: labelled_value(&document, "Book Value"),
    }
}

fn labelled_value(document: &Html, label: &str) -> Option<String> {
    let row_sel = selector("tr");

    let cells = document
        .select(&row_sel)
        // Innermost rows only; an outer layout row would match on nested text.
        .filter(|tr| tr.select(&row_sel).next().is_none())
        .map(row_cells)
        .find(|cells| cells.iter().any(|c| c.contains(label)))?;

    let at = cells.iter().position(|c| c.contains(label))?;
    cells.get(at + 1).filter(|v| !v.is_empty()).cloned()
}

fn row_cells(tr: ElementRef<'_>) -> Vec<String> {
    tr.children()
        .filter_map(ElementRef::wrap)
        .filter(|e| matches!(e.value().name(), "td" | "th"))
        .map(|cell| cell.text().flat_map(str::split_whitespace).collect::<Vec<_>>().join(" "))
        .collect()
}
