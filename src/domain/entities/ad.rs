//! Ad entity and counter reconciliation rules.

/// An ad as stored in `metadata_ads`.
///
/// Ads are created out-of-band; the pipeline only mutates `clicks`.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct AdRecord {
    pub id: i64,
    pub image_url: String,
    pub target_url: String,
    pub clicks: i64,
}

/// How a flush writes the cache counter into `metadata_ads.clicks`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FlushPolicy {
    /// Last writer wins: the store counter becomes the cache value.
    #[default]
    Overwrite,
    /// The store counter never decreases.
    Monotonic,
}

impl std::str::FromStr for FlushPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "overwrite" => Ok(FlushPolicy::Overwrite),
            "monotonic" => Ok(FlushPolicy::Monotonic),
            other => Err(format!(
                "unknown flush policy '{other}' (expected 'overwrite' or 'monotonic')"
            )),
        }
    }
}

/// Result of reconciling one ad's counter into the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileOutcome {
    /// Store value before the write; `None` if the row was inserted.
    pub previous: Option<i64>,
    /// Store value after the write.
    pub written: i64,
}

impl ReconcileOutcome {
    /// True when the cache snapshot was behind the committed store counter.
    pub fn is_conflict(&self, cache_clicks: i64) -> bool {
        self.previous.is_some_and(|prev| prev > cache_clicks)
    }

    /// Applies `policy` to a store value and a cache snapshot.
    pub fn resolve(previous: Option<i64>, cache_clicks: i64, policy: FlushPolicy) -> Self {
        let written = match (policy, previous) {
            (FlushPolicy::Monotonic, Some(prev)) => prev.max(cache_clicks),
            _ => cache_clicks,
        };
        Self { previous, written }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flush_policy_parse() {
        assert_eq!("overwrite".parse::<FlushPolicy>(), Ok(FlushPolicy::Overwrite));
        assert_eq!("MONOTONIC".parse::<FlushPolicy>(), Ok(FlushPolicy::Monotonic));
        assert!("additive".parse::<FlushPolicy>().is_err());
    }

    #[test]
    fn test_resolve_overwrite_can_regress() {
        let outcome = ReconcileOutcome::resolve(Some(10), 7, FlushPolicy::Overwrite);
        assert_eq!(outcome.written, 7);
        assert!(outcome.is_conflict(7));
    }

    #[test]
    fn test_resolve_monotonic_keeps_store_progress() {
        let outcome = ReconcileOutcome::resolve(Some(10), 7, FlushPolicy::Monotonic);
        assert_eq!(outcome.written, 10);
        assert!(outcome.is_conflict(7));

        let outcome = ReconcileOutcome::resolve(None, 7, FlushPolicy::Monotonic);
        assert_eq!(outcome.written, 7);
        assert!(!outcome.is_conflict(7));
    }
}
