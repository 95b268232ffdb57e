//! Per-ad reconciliation state between the aggregate cache and the store.
//!
//! ```text
//!   Cold ──ingest──▶ HotUnflushed ──flush/rebuild──▶ Reconciled
//!                        ▲                               │
//!                        └──────────── ingest ───────────┘
//! ```
//!
//! There is no terminal state. The tracker is process-local and advisory:
//! it feeds the health endpoint and logs, never correctness decisions.

use std::collections::HashMap;
use std::sync::Mutex;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    #[default]
    Cold,
    HotUnflushed,
    Reconciled,
}

impl SyncState {
    pub fn on_ingest(self) -> Self {
        SyncState::HotUnflushed
    }

    /// Rebuild may reconcile an ad this process never ingested, so `Cold`
    /// moves straight to `Reconciled` as well.
    pub fn on_reconcile(self) -> Self {
        SyncState::Reconciled
    }
}

/// Upper bound on tracked ads. Ad ids come from clients, so the map must
/// not grow with them.
pub const DEFAULT_CAPACITY: usize = 100_000;

/// Number of tracked ads in each state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncSummary {
    pub hot_unflushed: usize,
    pub reconciled: usize,
    /// State changes dropped because the tracker was full.
    pub untracked: u64,
}

#[derive(Debug, Default)]
struct States {
    by_ad: HashMap<i64, SyncState>,
    reconciled: usize,
    untracked: u64,
}

/// Bounded map of ad id to [`SyncState`].
///
/// When full, `Reconciled` entries are dropped to make room; they read as
/// `Cold` afterwards. If every entry is `HotUnflushed`, the new ad is not
/// tracked and only counted in [`SyncSummary::untracked`].
#[derive(Debug)]
pub struct SyncTracker {
    states: Mutex<States>,
    capacity: usize,
}

impl Default for SyncTracker {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl SyncTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            states: Mutex::new(States::default()),
            capacity: capacity.max(1),
        }
    }

    pub fn state(&self, ad_id: i64) -> SyncState {
        self.with_states(|s| s.by_ad.get(&ad_id).copied().unwrap_or_default())
    }

    pub fn mark_ingested(&self, ad_id: i64) {
        self.transition(ad_id, SyncState::on_ingest);
    }

    pub fn mark_reconciled(&self, ad_id: i64) {
        self.transition(ad_id, SyncState::on_reconcile);
    }

    pub fn summary(&self) -> SyncSummary {
        self.with_states(|s| SyncSummary {
            hot_unflushed: s.by_ad.len() - s.reconciled,
            reconciled: s.reconciled,
            untracked: s.untracked,
        })
    }

    fn transition(&self, ad_id: i64, f: impl FnOnce(SyncState) -> SyncState) {
        let capacity = self.capacity;
        self.with_states(|s| {
            if !s.by_ad.contains_key(&ad_id) && s.by_ad.len() >= capacity {
                if s.reconciled == 0 {
                    s.untracked += 1;
                    return;
                }
                s.by_ad.retain(|_, state| *state != SyncState::Reconciled);
                s.reconciled = 0;
            }

            let entry = s.by_ad.entry(ad_id).or_default();
            let before = *entry;
            *entry = f(before);

            match (before == SyncState::Reconciled, *entry == SyncState::Reconciled) {
                (false, true) => s.reconciled += 1,
                (true, false) => s.reconciled -= 1,
                _ => {}
            }
        });
    }

    fn with_states<T>(&self, f: impl FnOnce(&mut States) -> T) -> T {
        // A poisoned map only ever holds plain enums, so the data is still usable.
        let mut guard = self
            .states
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut guard)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle() {
        let tracker = SyncTracker::new();
        assert_eq!(tracker.state(1), SyncState::Cold);

        tracker.mark_ingested(1);
        assert_eq!(tracker.state(1), SyncState::HotUnflushed);

        tracker.mark_reconciled(1);
        assert_eq!(tracker.state(1), SyncState::Reconciled);

        tracker.mark_ingested(1);
        assert_eq!(tracker.state(1), SyncState::HotUnflushed);
    }

    #[test]
    fn test_rebuild_reconciles_cold_ads() {
        assert_eq!(SyncState::Cold.on_reconcile(), SyncState::Reconciled);
    }

    #[test]
    fn test_summary_counts() {
        let tracker = SyncTracker::new();
        tracker.mark_ingested(1);
        tracker.mark_ingested(2);
        tracker.mark_reconciled(2);
        tracker.mark_reconciled(3);

        assert_eq!(
            tracker.summary(),
            SyncSummary {
                hot_unflushed: 1,
                reconciled: 2,
                untracked: 0,
            }
        );
    }

    #[test]
    fn test_full_tracker_drops_reconciled_first() {
        let tracker = SyncTracker::with_capacity(3);
        tracker.mark_ingested(1);
        tracker.mark_ingested(2);
        tracker.mark_reconciled(3);

        tracker.mark_ingested(4);

        assert_eq!(tracker.state(3), SyncState::Cold);
        assert_eq!(tracker.state(4), SyncState::HotUnflushed);
        assert_eq!(
            tracker.summary(),
            SyncSummary {
                hot_unflushed: 3,
                reconciled: 0,
                untracked: 0,
            }
        );
    }

    #[test]
    fn test_unseen_ids_cannot_grow_a_full_tracker() {
        let tracker = SyncTracker::with_capacity(100);
        for ad_id in 0..10_000 {
            tracker.mark_ingested(ad_id);
        }

        let summary = tracker.summary();
        assert_eq!(summary.hot_unflushed, 100);
        assert_eq!(summary.untracked, 9_900);
        assert_eq!(tracker.state(9_999), SyncState::Cold);

        // Known ads keep moving through their states.
        tracker.mark_reconciled(0);
        assert_eq!(tracker.state(0), SyncState::Reconciled);
        tracker.mark_ingested(10_000);
        assert_eq!(tracker.state(10_000), SyncState::HotUnflushed);
        assert_eq!(tracker.summary().hot_unflushed, 100);
    }
}
