//! PostgreSQL implementation of the ad repository.

use async_trait::async_trait;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;

use crate::domain::entities::{AdRecord, FlushPolicy, ReconcileOutcome};
use crate::domain::repositories::AdRepository;
use crate::error::AppError;
use crate::utils::deadline::with_deadline;

/// PostgreSQL repository for `metadata_ads`.
///
/// Counter mutations take `pg_advisory_xact_lock(ad_id)` first, which
/// serializes the click worker's increments against flush overwrites for
/// the same ad for the lifetime of the transaction. An uncommitted
/// transaction is rolled back when dropped.
pub struct PgAdRepository {
    pool: Arc<PgPool>,
    timeout: Duration,
}

impl PgAdRepository {
    /// Creates a new repository; every call is bounded by `timeout`.
    pub fn new(pool: Arc<PgPool>, timeout: Duration) -> Self {
        Self { pool, timeout }
    }
}

#[async_trait]
impl AdRepository for PgAdRepository {
    async fn list_ads(&self) -> Result<Vec<AdRecord>, AppError> {
        with_deadline(
            self.timeout,
            "list_ads",
            sqlx::query_as::<_, AdRecord>(
                r#"
                SELECT id, image_url, target_url, clicks
                FROM metadata_ads
                ORDER BY id
                "#,
            )
            .fetch_all(self.pool.as_ref()),
        )
        .await
    }

    async fn find_ad(&self, ad_id: i64) -> Result<Option<AdRecord>, AppError> {
        with_deadline(
            self.timeout,
            "find_ad",
            sqlx::query_as::<_, AdRecord>(
                r#"
                SELECT id, image_url, target_url, clicks
                FROM metadata_ads
                WHERE id = $1
                "#,
            )
            .bind(ad_id)
            .fetch_optional(self.pool.as_ref()),
        )
        .await
    }

    async fn increment_clicks(&self, ad_id: i64) -> Result<bool, AppError> {
        with_deadline(self.timeout, "increment_clicks", async {
            let mut tx = self.pool.begin().await?;

            sqlx::query("SELECT pg_advisory_xact_lock($1)")
                .bind(ad_id)
                .execute(&mut *tx)
                .await?;

            let result = sqlx::query("UPDATE metadata_ads SET clicks = clicks + 1 WHERE id = $1")
                .bind(ad_id)
                .execute(&mut *tx)
                .await?;

            tx.commit().await?;
            Ok::<_, sqlx::Error>(result.rows_affected() > 0)
        })
        .await
    }

    async fn reconcile_clicks(
        &self,
        ad_id: i64,
        cache_clicks: i64,
        policy: FlushPolicy,
    ) -> Result<ReconcileOutcome, AppError> {
        with_deadline(self.timeout, "reconcile_clicks", async {
            let mut tx = self.pool.begin().await?;

            sqlx::query("SELECT pg_advisory_xact_lock($1)")
                .bind(ad_id)
                .execute(&mut *tx)
                .await?;

            let previous: Option<i64> =
                sqlx::query_scalar("SELECT clicks FROM metadata_ads WHERE id = $1 FOR UPDATE")
                    .bind(ad_id)
                    .fetch_optional(&mut *tx)
                    .await?;

            let outcome = ReconcileOutcome::resolve(previous, cache_clicks, policy);

            sqlx::query(
                r#"
                INSERT INTO metadata_ads (id, clicks)
                VALUES ($1, $2)
                ON CONFLICT (id) DO UPDATE SET clicks = EXCLUDED.clicks
                "#,
            )
            .bind(ad_id)
            .bind(outcome.written)
            .execute(&mut *tx)
            .await?;

            tx.commit().await?;
            Ok::<_, sqlx::Error>(outcome)
        })
        .await
    }

    async fn ping(&self) -> Result<(), AppError> {
        with_deadline(self.timeout, "ping", async {
            sqlx::query("SELECT 1")
                .execute(self.pool.as_ref())
                .await
                .map(|_| ())
        })
        .await
    }
}
