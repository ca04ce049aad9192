//! Relational sink: one row per day with headline stats and full ranking
//! tables as JSONB, for dashboards that want queryable history instead of
//! per-period artifacts.

use anyhow::{Context, Result};
use sqlx::PgPool;
use tracing::info;

use crate::analytics::models::DailyMetrics;

pub struct PostgresSink {
    pool: PgPool,
}

impl PostgresSink {
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPool::connect(database_url)
            .await
            .context("failed to connect to metrics database")?;
        Ok(Self { pool })
    }

    pub async fn init(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS metrics (
                date TEXT NOT NULL,
                stats JSONB NOT NULL,
                files_by_download JSONB NOT NULL,
                locations JSONB NOT NULL,
                referrers JSONB NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_metrics_date ON metrics(date)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Insert one row per day. Reruns for the same period append; the table
    /// keeps full history and readers aggregate by date.
    pub async fn insert_daily(&self, days: &[DailyMetrics]) -> Result<()> {
        for day in days {
            sqlx::query(
                r#"
                INSERT INTO metrics (date, stats, files_by_download, locations, referrers)
                VALUES ($1, $2::jsonb, $3::jsonb, $4::jsonb, $5::jsonb)
                "#,
            )
            .bind(&day.date)
            .bind(serde_json::to_string(&day.stats)?)
            .bind(serde_json::to_string(&day.files_by_download)?)
            .bind(serde_json::to_string(&day.locations)?)
            .bind(serde_json::to_string(&day.referrers)?)
            .execute(&self.pool)
            .await
            .with_context(|| format!("failed to insert metrics for {}", day.date))?;
        }
        info!(days = days.len(), "stored daily metrics");
        Ok(())
    }
}
