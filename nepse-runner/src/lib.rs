//! NEPSE Runner: configuration, data sources, snapshot caching and the merge run.
//!
//! This crate builds on `nepse-core` to provide:
//! - TOML pipeline configuration with defaults for the public data sources
//! - File and HTTP text sources with ordered local-then-remote fallback
//! - Trading snapshot resolution with market-aware caching and stale fallback
//! - The parallel fan-in pipeline producing the merged screener table
//! - Rate-limited dispatch of the upstream refresh workflows
//! - The fundamentals scrape over company detail pages

pub mod config;
pub mod fundamentals;
pub mod pipeline;
pub mod snapshot;
pub mod source;
pub mod trigger;

pub use config::{
    CompanyPagesConfig, ConfigError, HttpConfig, Location, PipelineConfig, TradingConfig,
    TradingSource, TriggerConfig,
};
pub use fundamentals::{symbols_from_snapshot, FundamentalsScraper, ScrapeError, NOT_AVAILABLE};
pub use pipeline::{MergedTable, Pipeline, PipelineError};
pub use snapshot::{CacheStatus, Origin, Snapshot, SnapshotError, SnapshotLoader};
pub use source::{FallbackChain, FetchError, FileSource, HttpSource, TextSource};
pub use trigger::{check_cooldown, CooldownActive, TriggerError, WorkflowTrigger};

#[cfg(test)]
mod send_sync_checks {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn pipeline_is_send_sync() {
        assert_send::<Pipeline>();
        assert_sync::<Pipeline>();
        assert_send::<SnapshotLoader>();
        assert_sync::<SnapshotLoader>();
        assert_send::<FundamentalsScraper>();
        assert_sync::<FundamentalsScraper>();
    }

    #[test]
    fn errors_are_send() {
        assert_send::<PipelineError>();
        assert_send::<SnapshotError>();
        assert_send::<FetchError>();
        assert_send::<TriggerError>();
        assert_send::<ConfigError>();
        assert_send::<ScrapeError>();
    }

    #[test]
    fn config_types_are_send_sync() {
        assert_send::<PipelineConfig>();
        assert_sync::<PipelineConfig>();
        assert_send::<MergedTable>();
        assert_sync::<MergedTable>();
    }
}
