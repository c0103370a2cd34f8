//! Trading snapshot resolution with market-aware caching.
//!
//! Resolution policy:
//! 1. If the cached envelope is fresh (and not forced) → serve it
//! 2. Otherwise fetch, parse and cache a new snapshot → serve it
//! 3. If the fetch fails and a stale envelope exists → serve it, with a warning
//! 4. Otherwise → fail with the fetch error
//!
//! A failed cache write never fails the run; the fresh data is still served.
//! A fetched document with no data rows counts as a failed fetch, so it never
//! replaces a cached snapshot.
//!
//! A published envelope keeps its own timestamp; the fetch time is used only
//! for scraped pages and envelopes without one.

use chrono::{DateTime, Duration, Utc};
use nepse_core::{
    is_fresh, parse, parse_published, CacheEnvelope, CacheStore, FreshnessPolicy, MarketCalendar,
    MarketSession, ParseError, SourceKind,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::source::{FetchError, TextSource};

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("trading snapshot fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("trading snapshot is unreadable: {0}")]
    Parse(#[from] ParseError),
}

/// Where a served snapshot came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    /// A cached envelope within its staleness threshold.
    Cache,
    /// Fetched during this run.
    Fresh,
    /// An expired cached envelope, served because the fetch failed.
    Stale,
}

#[derive(Debug, Clone)]
pub struct Snapshot {
    pub envelope: CacheEnvelope,
    pub origin: Origin,
}

/// Cache state as seen at a given instant.
#[derive(Debug, Clone, Serialize)]
pub struct CacheStatus {
    pub timestamp: DateTime<Utc>,
    pub age_minutes: i64,
    pub session: MarketSession,
    pub threshold_minutes: i64,
    pub fresh: bool,
    pub rows: usize,
}

/// Resolves the trading snapshot from a cache store and a fetch source.
pub struct SnapshotLoader {
    store: Box<dyn CacheStore>,
    source: Box<dyn TextSource>,
    kind: SourceKind,
    calendar: MarketCalendar,
    policy: FreshnessPolicy,
    serve_stale_on_error: bool,
    force: bool,
}

impl SnapshotLoader {
    /// `kind` is the format `source` returns: markup for a scraped page,
    /// envelope for a published cache file.
    pub fn new(store: Box<dyn CacheStore>, source: Box<dyn TextSource>, kind: SourceKind) -> Self {
        Self {
            store,
            source,
            kind,
            calendar: MarketCalendar::default(),
            policy: FreshnessPolicy::default(),
            serve_stale_on_error: true,
            force: false,
        }
    }

    pub fn with_calendar(mut self, calendar: MarketCalendar) -> Self {
        self.calendar = calendar;
        self
    }

    pub fn with_policy(mut self, policy: FreshnessPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn serve_stale_on_error(mut self, enabled: bool) -> Self {
        self.serve_stale_on_error = enabled;
        self
    }

    /// Skip the freshness check and always fetch.
    pub fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    /// Resolve the snapshot to serve at `now`.
    pub fn load(&self, now: DateTime<Utc>) -> Result<Snapshot, SnapshotError> {
        let cached = self.read_cache();

        if let Some(envelope) = &cached {
            if !self.force && is_fresh(envelope.timestamp, now, &self.calendar, &self.policy) {
                debug!(cached_at = %envelope.timestamp, "serving cached trading snapshot");
                return Ok(Snapshot {
                    envelope: envelope.clone(),
                    origin: Origin::Cache,
                });
            }
        }

        match self.fetch_fresh(now) {
            Ok(envelope) => {
                if let Err(e) = self.store.write(&envelope) {
                    warn!(error = %e, "failed to write trading cache, serving fresh data anyway");
                }
                info!(
                    source = %self.source.name(),
                    rows = envelope.data.data_len(),
                    taken_at = %envelope.timestamp,
                    "fetched fresh trading snapshot"
                );
                if !is_fresh(envelope.timestamp, now, &self.calendar, &self.policy) {
                    warn!(taken_at = %envelope.timestamp, "published trading snapshot is already stale");
                }
                Ok(Snapshot {
                    envelope,
                    origin: Origin::Fresh,
                })
            }
            Err(e) => match cached {
                Some(envelope) if self.serve_stale_on_error => {
                    warn!(
                        error = %e,
                        cached_at = %envelope.timestamp,
                        "trading fetch failed, serving stale cache"
                    );
                    Ok(Snapshot {
                        envelope,
                        origin: Origin::Stale,
                    })
                }
                _ => Err(e),
            },
        }
    }

    /// Describe the cached envelope without fetching.
    pub fn status(&self, now: DateTime<Utc>) -> Option<CacheStatus> {
        let envelope = self.read_cache()?;
        let session = self.calendar.session_at(now);
        Some(CacheStatus {
            timestamp: envelope.timestamp,
            age_minutes: now.signed_duration_since(envelope.timestamp).num_minutes(),
            session,
            threshold_minutes: self.policy.threshold(session).num_minutes(),
            fresh: is_fresh(envelope.timestamp, now, &self.calendar, &self.policy),
            rows: envelope.data.data_len(),
        })
    }

    /// Time left before the cached envelope goes stale, if it is fresh now.
    pub fn remaining(&self, now: DateTime<Utc>) -> Option<Duration> {
        let status = self.status(now)?;
        status
            .fresh
            .then(|| Duration::minutes(status.threshold_minutes - status.age_minutes.max(0)))
    }

    fn read_cache(&self) -> Option<CacheEnvelope> {
        match self.store.read() {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, "trading cache unreadable, treating as miss");
                None
            }
        }
    }

    fn fetch_fresh(&self, now: DateTime<Utc>) -> Result<CacheEnvelope, SnapshotError> {
        let text = self.source.fetch()?;
        let (taken_at, table) = match self.kind {
            SourceKind::JsonEnvelope => {
                let published = parse_published(&text)?;
                if published.timestamp.is_none() {
                    debug!("published envelope has no usable timestamp, stamping with fetch time");
                }
                (published.timestamp, published.data)
            }
            kind => (None, parse(&text, kind)?),
        };
        if table.data_len() == 0 {
            return Err(ParseError::TableNotFound.into());
        }
        Ok(CacheEnvelope::new(taken_at.unwrap_or(now), table))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use nepse_core::table::TRADING_HEADER;
    use nepse_core::{MemoryStore, Table};

    struct Page(Option<&'static str>);

    impl TextSource for Page {
        fn name(&self) -> String {
            "page".into()
        }

        fn fetch(&self) -> Result<String, FetchError> {
            self.0.map(str::to_string).ok_or(FetchError::NoSources)
        }
    }

    const PAGE: &str = "<table><tr><th>Symbol</th><th>LTP</th></tr><tr><td>ABC</td><td>101</td></tr></table>";

    /// 12:00 NPT on a Sunday, market open.
    fn noon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 5, 6, 15, 0).unwrap()
    }

    fn cached(minutes_ago: i64) -> CacheEnvelope {
        CacheEnvelope::new(
            noon() - Duration::minutes(minutes_ago),
            Table::with_header(TRADING_HEADER, vec![vec!["ABC".into(), "99".into()]]),
        )
    }

    fn loader(store: MemoryStore, page: Option<&'static str>) -> SnapshotLoader {
        SnapshotLoader::new(Box::new(store), Box::new(Page(page)), SourceKind::Markup)
    }

    #[test]
    fn fresh_cache_is_served_without_fetch() {
        let snap = loader(MemoryStore::with_envelope(cached(4)), None)
            .load(noon())
            .unwrap();
        assert_eq!(snap.origin, Origin::Cache);
        assert_eq!(snap.envelope.data.data_rows()[0][1], "99");
    }

    #[test]
    fn stale_cache_triggers_fetch() {
        let snap = loader(MemoryStore::with_envelope(cached(6)), Some(PAGE))
            .load(noon())
            .unwrap();
        assert_eq!(snap.origin, Origin::Fresh);
        assert_eq!(snap.envelope.timestamp, noon());
        assert_eq!(snap.envelope.data.data_rows()[0][1], "101");
    }

    #[test]
    fn force_bypasses_fresh_cache() {
        let snap = loader(MemoryStore::with_envelope(cached(1)), Some(PAGE))
            .force(true)
            .load(noon())
            .unwrap();
        assert_eq!(snap.origin, Origin::Fresh);
    }

    #[test]
    fn failed_fetch_serves_stale() {
        let snap = loader(MemoryStore::with_envelope(cached(60)), None)
            .load(noon())
            .unwrap();
        assert_eq!(snap.origin, Origin::Stale);
    }

    #[test]
    fn failed_fetch_without_stale_fallback_errors() {
        let err = loader(MemoryStore::with_envelope(cached(60)), None)
            .serve_stale_on_error(false)
            .load(noon())
            .unwrap_err();
        assert!(matches!(err, SnapshotError::Fetch(_)));
    }

    #[test]
    fn page_without_trading_columns_is_table_not_found() {
        let err = loader(MemoryStore::new(), Some("<table><tr><th>Name</th></tr></table>"))
            .load(noon())
            .unwrap_err();
        assert!(matches!(err, SnapshotError::Parse(ParseError::TableNotFound)));
    }

    fn envelope_loader(store: MemoryStore, document: &'static str) -> SnapshotLoader {
        SnapshotLoader::new(Box::new(store), Box::new(Page(Some(document))), SourceKind::JsonEnvelope)
    }

    #[test]
    fn empty_envelope_keeps_good_cache() {
        let store = MemoryStore::with_envelope(cached(30));
        let l = envelope_loader(store, r#"{"timestamp":"2025-01-01T00:00:00"}"#);

        let snap = l.load(noon()).unwrap();
        assert_eq!(snap.origin, Origin::Stale);
        assert_eq!(snap.envelope, cached(30));

        let later = l.load(noon() + Duration::minutes(3)).unwrap();
        assert_eq!(later.origin, Origin::Stale);
        assert_eq!(later.envelope.data.data_len(), 1);
        assert_eq!(l.status(noon()).unwrap().rows, 1);
    }

    #[test]
    fn empty_envelope_without_cache_errors() {
        let header_only = r#"{"timestamp":"2025-01-05T06:10:00","data":[["Symbol","LTP"]]}"#;
        let err = envelope_loader(MemoryStore::new(), header_only)
            .load(noon())
            .unwrap_err();
        assert!(matches!(err, SnapshotError::Parse(ParseError::TableNotFound)));
    }

    #[test]
    fn published_timestamp_is_kept() {
        let l = envelope_loader(
            MemoryStore::new(),
            r#"{"timestamp":"2025-01-01T09:00:00Z","data":[["Symbol","LTP"],["ABC","101"]]}"#,
        );
        let four_days_old = Utc.with_ymd_and_hms(2025, 1, 1, 9, 0, 0).unwrap();

        let snap = l.load(noon()).unwrap();
        assert_eq!(snap.origin, Origin::Fresh);
        assert_eq!(snap.envelope.timestamp, four_days_old);

        // Cached under the publisher's time, so it is already stale.
        let status = l.status(noon()).unwrap();
        assert_eq!(status.timestamp, four_days_old);
        assert!(!status.fresh);
        assert_eq!(l.load(noon() + Duration::minutes(1)).unwrap().origin, Origin::Fresh);
    }

    #[test]
    fn envelope_without_timestamp_uses_fetch_time() {
        let snap = envelope_loader(MemoryStore::new(), r#"{"data":[["Symbol","LTP"],["ABC","101"]]}"#)
            .load(noon())
            .unwrap();
        assert_eq!(snap.envelope.timestamp, noon());
    }

    #[test]
    fn status_reports_age_and_threshold() {
        let l = loader(MemoryStore::with_envelope(cached(3)), None);
        let status = l.status(noon()).unwrap();
        assert_eq!(status.age_minutes, 3);
        assert_eq!(status.session, MarketSession::Open);
        assert_eq!(status.threshold_minutes, 5);
        assert!(status.fresh);
        assert_eq!(l.remaining(noon()), Some(Duration::minutes(2)));
        assert!(loader(MemoryStore::new(), None).status(noon()).is_none());
    }
}
