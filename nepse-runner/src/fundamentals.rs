//! Fundamentals scrape: EPS and book value for every traded symbol.
//!
//! Symbols come from the cached trading snapshot. Each symbol's company
//! detail page is fetched on a bounded worker pool. A page that cannot be
//! fetched, or that lacks a figure, yields [`NOT_AVAILABLE`] for it, so the
//! output always has one row per symbol. Rows are sorted by symbol.

use std::time::Duration;

use nepse_core::parse::parse_company_page;
use nepse_core::table::{cell, columns};
use nepse_core::{CacheEnvelope, FundamentalsRecord};
use rayon::prelude::*;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::{CompanyPagesConfig, HttpConfig};
use crate::source::{http_client, FetchError, HttpSource, TextSource};

/// Cell text for a figure the company page did not provide.
pub const NOT_AVAILABLE: &str = "N/A";

#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("trading snapshot lists no symbols")]
    NoSymbols,

    #[error("cannot start {workers} scrape workers: {reason}")]
    Pool { workers: usize, reason: String },
}

/// Distinct symbols of a trading snapshot, sorted.
pub fn symbols_from_snapshot(envelope: &CacheEnvelope) -> Vec<String> {
    let mut symbols: Vec<String> = envelope
        .data
        .data_rows()
        .iter()
        .filter_map(|row| cell(row, columns::SYMBOL))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();
    symbols.sort();
    symbols.dedup();
    symbols
}

/// Turn one company page into a fundamentals row.
pub fn record_from_page(symbol: &str, page: &str) -> FundamentalsRecord {
    let fields = parse_company_page(page);
    FundamentalsRecord {
        symbol: symbol.to_string(),
        eps: fields.eps.unwrap_or_else(|| NOT_AVAILABLE.to_string()),
        book_value: fields.book_value.unwrap_or_else(|| NOT_AVAILABLE.to_string()),
    }
}

fn unavailable(symbol: &str) -> FundamentalsRecord {
    FundamentalsRecord {
        symbol: symbol.to_string(),
        eps: NOT_AVAILABLE.to_string(),
        book_value: NOT_AVAILABLE.to_string(),
    }
}

/// Scrape every symbol with at most `workers` fetches in flight.
///
/// `fetch` returns the company page for a symbol.
pub fn scrape_with<F>(
    symbols: &[String],
    workers: usize,
    fetch: F,
) -> Result<Vec<FundamentalsRecord>, ScrapeError>
where
    F: Fn(&str) -> Result<String, FetchError> + Sync,
{
    if symbols.is_empty() {
        return Err(ScrapeError::NoSymbols);
    }

    let workers = workers.max(1);
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .build()
        .map_err(|e| ScrapeError::Pool {
            workers,
            reason: e.to_string(),
        })?;

    let mut records: Vec<FundamentalsRecord> = pool.install(|| {
        symbols
            .par_iter()
            .map(|symbol| match fetch(symbol) {
                Ok(page) => {
                    let record = record_from_page(symbol, &page);
                    debug!(%symbol, eps = %record.eps, book_value = %record.book_value, "scraped");
                    record
                }
                Err(e) => {
                    warn!(%symbol, error = %e, "company page unavailable");
                    unavailable(symbol)
                }
            })
            .collect()
    });

    records.sort_by(|a, b| a.symbol.cmp(&b.symbol));
    Ok(records)
}

/// Company page scraper over HTTP.
pub struct FundamentalsScraper {
    client: reqwest::blocking::Client,
    config: CompanyPagesConfig,
}

impl FundamentalsScraper {
    pub fn new(client: reqwest::blocking::Client, config: CompanyPagesConfig) -> Self {
        Self { client, config }
    }

    /// Build a scraper with its own client, using the page timeout.
    pub fn from_config(config: &CompanyPagesConfig, http: &HttpConfig) -> Result<Self, FetchError> {
        let client = http_client(&HttpConfig {
            timeout_secs: config.timeout_secs,
            ..http.clone()
        })?;
        Ok(Self::new(client, config.clone()))
    }

    pub fn scrape(&self, symbols: &[String]) -> Result<Vec<FundamentalsRecord>, ScrapeError> {
        let delay = Duration::from_millis(self.config.request_delay_ms);
        info!(
            symbols = symbols.len(),
            workers = self.config.workers,
            "scraping company pages"
        );

        scrape_with(symbols, self.config.workers, |symbol| {
            if !delay.is_zero() {
                std::thread::sleep(delay);
            }
            HttpSource::new(self.client.clone(), self.config.page_url(symbol)).fetch()
        })
    }
}
