//! Market-hours-aware cache freshness.
//!
//! Outside trading hours the source has no new prices, so a cached scrape
//! stays good for most of a day. During the session it goes stale within
//! minutes. The session is judged in exchange-local time.

use chrono::{DateTime, Datelike, Duration, FixedOffset, Timelike, Utc, Weekday};
use serde::{Deserialize, Serialize};

/// Exchange-local clock and trading hours.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketCalendar {
    /// Offset of exchange-local time from UTC, in minutes (+05:45 is 345).
    pub utc_offset_minutes: i32,
    /// First local hour of the session (inclusive).
    pub open_hour: u32,
    /// Local hour at which the session ends (exclusive).
    pub close_hour: u32,
    /// Weekdays on which the session runs at all.
    pub trading_days: Vec<Weekday>,
}

impl Default for MarketCalendar {
    fn default() -> Self {
        Self {
            utc_offset_minutes: 5 * 60 + 45,
            open_hour: 11,
            close_hour: 15,
            trading_days: vec![
                Weekday::Sun,
                Weekday::Mon,
                Weekday::Tue,
                Weekday::Wed,
                Weekday::Thu,
                Weekday::Fri,
                Weekday::Sat,
            ],
        }
    }
}

/// Whether the market is trading at a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketSession {
    Open,
    Closed,
}

impl MarketCalendar {
    /// Exchange-local offset. Out-of-range offsets fall back to UTC.
    pub fn offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.utc_offset_minutes * 60)
            .unwrap_or_else(|| FixedOffset::east_opt(0).expect("zero offset is valid"))
    }

    /// Session state at `now`.
    pub fn session_at(&self, now: DateTime<Utc>) -> MarketSession {
        let local = now.with_timezone(&self.offset());
        if !self.trading_days.contains(&local.weekday()) {
            return MarketSession::Closed;
        }
        let hour = local.hour();
        if hour >= self.open_hour && hour < self.close_hour {
            MarketSession::Open
        } else {
            MarketSession::Closed
        }
    }
}

/// Maximum cache ages per session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FreshnessPolicy {
    /// Staleness threshold while the session is open.
    pub open_max_age_minutes: i64,
    /// Staleness threshold while the market is closed.
    pub closed_max_age_minutes: i64,
    /// How far in the future a cache timestamp may be and still count as fresh.
    pub max_clock_skew_minutes: i64,
}

impl Default for FreshnessPolicy {
    fn default() -> Self {
        Self {
            open_max_age_minutes: 5,
            closed_max_age_minutes: 18 * 60,
            max_clock_skew_minutes: 5,
        }
    }
}

impl FreshnessPolicy {
    /// Staleness threshold for a session.
    pub fn threshold(&self, session: MarketSession) -> Duration {
        match session {
            MarketSession::Open => Duration::minutes(self.open_max_age_minutes),
            MarketSession::Closed => Duration::minutes(self.closed_max_age_minutes),
        }
    }
}

/// Decide whether a cache written at `cached_at` can still be served at `now`.
pub fn is_fresh(
    cached_at: DateTime<Utc>,
    now: DateTime<Utc>,
    calendar: &MarketCalendar,
    policy: &FreshnessPolicy,
) -> bool {
    let age = now.signed_duration_since(cached_at);
    if age < Duration::zero() {
        return -age <= Duration::minutes(policy.max_clock_skew_minutes);
    }
    age < policy.threshold(calendar.session_at(now))
}
