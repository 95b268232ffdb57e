//! Repository trait for ad metadata and the denormalized click counter.

use crate::domain::entities::{AdRecord, FlushPolicy, ReconcileOutcome};
use crate::error::AppError;
use async_trait::async_trait;

/// Repository interface for `metadata_ads`.
///
/// Every counter mutation is serialized per ad id by the implementation
/// (transaction + per-ad lock), so a concurrent increment from the click
/// worker and an overwrite from the flush never interleave.
///
/// # Implementations
///
/// - [`crate::infrastructure::persistence::PgAdRepository`] - PostgreSQL implementation
/// - [`crate::infrastructure::persistence::MemoryStore`] - In-process implementation
/// - Test mocks available with `cfg(test)`
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AdRepository: Send + Sync {
    /// Lists every ad ordered by id.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Unavailable`] or [`AppError::Internal`] on database errors.
    async fn list_ads(&self) -> Result<Vec<AdRecord>, AppError>;

    /// Finds a single ad.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Internal`] on database errors.
    async fn find_ad(&self, ad_id: i64) -> Result<Option<AdRecord>, AppError>;

    /// Adds one to `clicks` inside its own transaction.
    ///
    /// # Returns
    ///
    /// `Ok(false)` if no ad with this id exists (nothing was changed).
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction could not be committed; it is
    /// rolled back in that case.
    async fn increment_clicks(&self, ad_id: i64) -> Result<bool, AppError>;

    /// Writes a cache counter snapshot into the store (insert-if-absent).
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction could not be committed.
    async fn reconcile_clicks(
        &self,
        ad_id: i64,
        cache_clicks: i64,
        policy: FlushPolicy,
    ) -> Result<ReconcileOutcome, AppError>;

    /// Connectivity check for health reporting.
    async fn ping(&self) -> Result<(), AppError>;
}
