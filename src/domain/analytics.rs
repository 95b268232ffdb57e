//! Aggregate metrics kept per ad and the CTR computation.

use std::collections::HashMap;

use crate::domain::cache_key::AggregateKey;
use crate::infrastructure::cache::CacheError;

pub const FIELD_CLICKS: &str = "clicks";
pub const FIELD_IMPRESSION: &str = "impression";
pub const FIELD_TIMEFRAME: &str = "timeframe";
pub const FIELD_PLAYBACK_TIME: &str = "playbacktime";

/// Contents of the stats record (`time-<id>`).
///
/// Overwritten on every event; it reflects the most recent event only.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdStats {
    pub impression: f64,
    pub timeframe: f64,
    pub playback_time: f64,
}

impl AdStats {
    pub fn from_playback(playback_time: f64, timeframe: f64) -> Self {
        Self {
            impression: playback_time / timeframe,
            timeframe,
            playback_time,
        }
    }

    /// Hash fields written to the cache.
    pub fn to_fields(&self) -> [(&'static str, String); 3] {
        [
            (FIELD_IMPRESSION, self.impression.to_string()),
            (FIELD_TIMEFRAME, self.timeframe.to_string()),
            (FIELD_PLAYBACK_TIME, self.playback_time.to_string()),
        ]
    }

    /// Parses a stats record read from the cache.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Malformed`] if any field is missing or not a number.
    pub fn from_fields(ad_id: i64, fields: &HashMap<String, String>) -> Result<Self, CacheError> {
        let key = AggregateKey::stats(ad_id);
        Ok(Self {
            impression: parse_field(&key, fields, FIELD_IMPRESSION)?,
            timeframe: parse_field(&key, fields, FIELD_TIMEFRAME)?,
            playback_time: parse_field(&key, fields, FIELD_PLAYBACK_TIME)?,
        })
    }
}

/// Parses the `clicks` field of a counter record.
///
/// # Errors
///
/// Returns [`CacheError::Malformed`] if the field is missing or not an integer.
pub fn parse_clicks(ad_id: i64, fields: &HashMap<String, String>) -> Result<i64, CacheError> {
    parse_field(&AggregateKey::counter(ad_id), fields, FIELD_CLICKS)
}

fn parse_field<T: std::str::FromStr>(
    key: &AggregateKey,
    fields: &HashMap<String, String>,
    name: &'static str,
) -> Result<T, CacheError> {
    fields
        .get(name)
        .and_then(|raw| raw.trim().parse().ok())
        .ok_or_else(|| CacheError::Malformed {
            key: key.to_string(),
            field: name,
        })
}

/// Click-through rate: `max(0, floor(clicks / impression * 100))`.
///
/// Returns `None` when the impression is zero, negative or not finite; the
/// metric is then unavailable rather than infinite.
pub fn compute_ctr(clicks: i64, impression: f64) -> Option<i64> {
    if !impression.is_finite() || impression <= 0.0 {
        return None;
    }

    let ctr = (clicks as f64 / impression * 100.0).floor();
    if !ctr.is_finite() {
        return None;
    }

    Some((ctr as i64).max(0))
}

/// Metrics served by the analytics endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct AdAnalytics {
    pub ad_id: i64,
    pub clicks: i64,
    pub impression: f64,
    pub ctr: i64,
}

/// One row of the rebuild query: durable click count plus latest stats.
#[derive(Debug, Clone, PartialEq)]
pub struct RebuildRow {
    pub ad_id: i64,
    pub clicks: i64,
    pub playback_time: f64,
    pub timeframe: f64,
}

impl RebuildRow {
    pub fn stats(&self) -> AdStats {
        AdStats::from_playback(self.playback_time, self.timeframe)
    }
}
