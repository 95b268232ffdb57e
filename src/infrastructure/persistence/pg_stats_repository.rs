//! PostgreSQL implementation of the click-row repository.

use async_trait::async_trait;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;

use crate::domain::analytics::RebuildRow;
use crate::domain::entities::ClickRow;
use crate::domain::repositories::StatsRepository;
use crate::error::AppError;
use crate::utils::deadline::with_deadline;

/// PostgreSQL repository for `ads_clicks`.
pub struct PgStatsRepository {
    pool: Arc<PgPool>,
    timeout: Duration,
}

impl PgStatsRepository {
    /// Creates a new repository; every call is bounded by `timeout`.
    pub fn new(pool: Arc<PgPool>, timeout: Duration) -> Self {
        Self { pool, timeout }
    }
}

#[derive(sqlx::FromRow)]
struct AggregateRow {
    ad_id: i64,
    clicks: i64,
    playback_time: Option<f64>,
    timeframe: Option<f64>,
}

#[async_trait]
impl StatsRepository for PgStatsRepository {
    async fn record_click(&self, row: &ClickRow) -> Result<(), AppError> {
        with_deadline(self.timeout, "record_click", async {
            sqlx::query(
                r#"
                INSERT INTO ads_clicks (id, ip, "timestamp", timeframe, playback_time)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(row.ad_id)
            .bind(&row.ip)
            .bind(row.timestamp)
            .bind(row.timeframe)
            .bind(row.playback_time)
            .execute(self.pool.as_ref())
            .await
            .map(|_| ())
        })
        .await
    }

    async fn rebuild_rows(&self, ad_id: Option<i64>) -> Result<Vec<RebuildRow>, AppError> {
        let rows = with_deadline(
            self.timeout,
            "rebuild_rows",
            sqlx::query_as::<_, AggregateRow>(
                r#"
                SELECT
                    c.id AS ad_id,
                    COUNT(*) AS clicks,
                    (ARRAY_AGG(c.playback_time ORDER BY c."timestamp" DESC, c.row_id DESC))[1] AS playback_time,
                    (ARRAY_AGG(c.timeframe ORDER BY c."timestamp" DESC, c.row_id DESC))[1] AS timeframe
                FROM ads_clicks c
                JOIN metadata_ads m ON m.id = c.id
                WHERE c.timeframe IS NOT NULL
                  AND c.playback_time IS NOT NULL
                  AND ($1::bigint IS NULL OR c.id = $1)
                GROUP BY c.id
                ORDER BY c.id
                "#,
            )
            .bind(ad_id)
            .fetch_all(self.pool.as_ref()),
        )
        .await?;

        Ok(rows
            .into_iter()
            .filter_map(|r| {
                Some(RebuildRow {
                    ad_id: r.ad_id,
                    clicks: r.clicks,
                    playback_time: r.playback_time?,
                    timeframe: r.timeframe?,
                })
            })
            .collect())
    }
}
