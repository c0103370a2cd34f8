//! The merge run: fetch the three inputs in parallel, then join them.
//!
//! The trading snapshot is mandatory. Dividends and fundamentals are
//! enrichment: when either cannot be fetched or parsed the run continues
//! with an empty lookup and the affected columns show the placeholder.

use chrono::{DateTime, Utc};
use nepse_core::dividends::{self, aggregate};
use nepse_core::fundamentals::{self, FundamentalsMap};
use nepse_core::{merge, parse, DividendMap, FileStore, OutputSchema, SourceKind, Table};
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::{PipelineConfig, TradingSource};
use crate::snapshot::{Origin, SnapshotError, SnapshotLoader};
use crate::source::{http_client, FallbackChain, FetchError, HttpSource, TextSource};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Trading(#[from] SnapshotError),

    #[error("cannot set up data sources: {0}")]
    Setup(#[from] FetchError),
}

/// Output of one merge run.
#[derive(Debug, Clone, Serialize)]
pub struct MergedTable {
    pub table: Table,
    pub schema: OutputSchema,
    /// When the trading snapshot was taken: the publisher's timestamp for an
    /// envelope source, the fetch time for a scraped page.
    pub snapshot_at: DateTime<Utc>,
    pub origin: Origin,
}

pub struct Pipeline {
    snapshot: SnapshotLoader,
    dividends: Box<dyn TextSource>,
    fundamentals: Option<Box<dyn TextSource>>,
    schema: OutputSchema,
}

impl Pipeline {
    pub fn new(
        snapshot: SnapshotLoader,
        dividends: Box<dyn TextSource>,
        fundamentals: Option<Box<dyn TextSource>>,
        schema: OutputSchema,
    ) -> Self {
        Self {
            snapshot,
            dividends,
            fundamentals,
            schema,
        }
    }

    /// Wire a pipeline from configuration: file-backed cache, HTTP and file
    /// sources. `force` skips the trading cache freshness check.
    pub fn from_config(config: &PipelineConfig, force: bool) -> Result<Self, PipelineError> {
        let client = http_client(&config.http)?;

        let (trading, kind): (Box<dyn TextSource>, SourceKind) = match &config.trading.source {
            TradingSource::Scrape { url } if config.offline => {
                warn!(%url, "offline, live trading page will not be scraped");
                (Box::new(FallbackChain::new(Vec::new())), SourceKind::Markup)
            }
            TradingSource::Scrape { url } => (
                Box::new(HttpSource::new(client.clone(), url.clone())),
                SourceKind::Markup,
            ),
            TradingSource::Envelope { locations } => (
                Box::new(FallbackChain::from_locations(locations, &client, config.offline)),
                SourceKind::JsonEnvelope,
            ),
        };

        let snapshot = SnapshotLoader::new(
            Box::new(FileStore::new(config.trading.cache_path.clone())),
            trading,
            kind,
        )
        .with_calendar(config.calendar.clone())
        .with_policy(config.freshness.clone())
        .serve_stale_on_error(config.trading.serve_stale_on_error)
        .force(force);

        let dividends = FallbackChain::from_locations(&config.dividends, &client, config.offline);
        let fundamentals = config.schema.needs_fundamentals().then(|| -> Box<dyn TextSource> {
            Box::new(FallbackChain::from_locations(
                &config.fundamentals,
                &client,
                config.offline,
            ))
        });

        Ok(Self::new(snapshot, Box::new(dividends), fundamentals, config.schema))
    }

    pub fn snapshot(&self) -> &SnapshotLoader {
        &self.snapshot
    }

    /// Run the three fetches concurrently and merge once all have finished.
    pub fn run(&self, now: DateTime<Utc>) -> Result<MergedTable, PipelineError> {
        let (snapshot, (dividends, fundamentals)) = rayon::join(
            || self.snapshot.load(now),
            || rayon::join(|| self.load_dividends(), || self.load_fundamentals()),
        );
        let snapshot = snapshot?;

        let table = merge(&snapshot.envelope.data, &dividends, &fundamentals, self.schema);
        info!(
            rows = table.data_len(),
            origin = ?snapshot.origin,
            dividend_symbols = dividends.len(),
            fundamentals_symbols = fundamentals.len(),
            "merged screener table"
        );

        Ok(MergedTable {
            table,
            schema: self.schema,
            snapshot_at: snapshot.envelope.timestamp,
            origin: snapshot.origin,
        })
    }

    fn load_dividends(&self) -> DividendMap {
        let records = self
            .dividends
            .fetch()
            .map_err(|e| e.to_string())
            .and_then(|text| parse(&text, SourceKind::Delimited).map_err(|e| e.to_string()))
            .and_then(|table| dividends::records_from_table(&table).map_err(|e| e.to_string()));

        match records {
            Ok(records) => aggregate(&records),
            Err(error) => {
                warn!(source = %self.dividends.name(), %error, "dividends unavailable, columns will be empty");
                DividendMap::new()
            }
        }
    }

    fn load_fundamentals(&self) -> FundamentalsMap {
        let Some(source) = &self.fundamentals else {
            return FundamentalsMap::new();
        };

        let records = source
            .fetch()
            .map_err(|e| e.to_string())
            .and_then(|text| parse(&text, SourceKind::Delimited).map_err(|e| e.to_string()))
            .and_then(|table| fundamentals::records_from_table(&table).map_err(|e| e.to_string()));

        match records {
            Ok(records) => fundamentals::build(records),
            Err(error) => {
                warn!(source = %source.name(), %error, "fundamentals unavailable, columns will be empty");
                FundamentalsMap::new()
            }
        }
    }
}
