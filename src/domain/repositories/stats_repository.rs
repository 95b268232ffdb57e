//! Repository trait for persisted click rows.

use crate::domain::analytics::RebuildRow;
use crate::domain::entities::ClickRow;
use crate::error::AppError;
use async_trait::async_trait;

/// Repository interface for `ads_clicks`.
///
/// # Implementations
///
/// - [`crate::infrastructure::persistence::PgStatsRepository`] - PostgreSQL implementation
/// - [`crate::infrastructure::persistence::MemoryStore`] - In-process implementation
/// - Test mocks available with `cfg(test)`
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StatsRepository: Send + Sync {
    /// Appends one click row.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Unavailable`] if the store cannot be reached and
    /// [`AppError::Internal`] on other database errors.
    async fn record_click(&self, row: &ClickRow) -> Result<(), AppError>;

    /// Per-ad click counts joined with ad metadata, for cache rebuilds.
    ///
    /// Only rows with a timeframe are considered. `timeframe` and
    /// `playback_time` are taken from the most recent click. With
    /// `ad_id = Some(id)` only that ad is returned. Rows are ordered by ad id.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Internal`] on database errors.
    async fn rebuild_rows(&self, ad_id: Option<i64>) -> Result<Vec<RebuildRow>, AppError>;
}
