//! SQLite-backed [`SessionStore`]

use async_trait::async_trait;
use sqlx::SqlitePool;
use tracing::debug;

use super::{Measurement, MeasurementRow, NewSessionHeader, SessionHeader, SessionStore};
use crate::Result;

#[derive(Debug, Clone)]
pub struct SqliteSessionStore {
    pool: SqlitePool,
}

impl SqliteSessionStore {
    /// Wrap a pool whose schema was created by [`super::init`]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl SessionStore for SqliteSessionStore {
    async fn create_session_header(&self, header: &NewSessionHeader) -> Result<i64> {
        let id = sqlx::query(
            "INSERT INTO sessions (first_name, last_name, client_id) VALUES (?, ?, ?)",
        )
        .bind(&header.first_name)
        .bind(&header.last_name)
        .bind(&header.client_id)
        .execute(&self.pool)
        .await?
        .last_insert_rowid();

        debug!("Created session header {}", id);
        Ok(id)
    }

    async fn append_measurement(&self, row: &MeasurementRow) -> Result<()> {
        let k = &row.kpis;
        sqlx::query(
            r#"
            INSERT INTO measurements (
                session_id, session_time, emotion, emotion_score,
                engagement_val, engagement_lbl,
                satisfaction_val, satisfaction_lbl,
                trust_val, trust_lbl,
                loyalty_val, loyalty_lbl,
                opinion_val, opinion_lbl
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(row.session_id)
        .bind(i64::try_from(row.session_time_seconds).unwrap_or(i64::MAX))
        .bind(&row.emotion)
        .bind(row.confidence_score)
        .bind(i64::from(k.engagement))
        .bind(&k.engagement_label)
        .bind(i64::from(k.satisfaction))
        .bind(&k.satisfaction_label)
        .bind(i64::from(k.trust))
        .bind(&k.trust_label)
        .bind(i64::from(k.loyalty))
        .bind(&k.loyalty_label)
        .bind(i64::from(k.opinion))
        .bind(&k.opinion_label)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_session_headers(&self) -> Result<Vec<SessionHeader>> {
        let headers = sqlx::query_as::<_, SessionHeader>(
            "SELECT id, first_name, last_name, client_id, created_at FROM sessions ORDER BY id DESC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(headers)
    }

    async fn get_session_header(&self, id: i64) -> Result<Option<SessionHeader>> {
        let header = sqlx::query_as::<_, SessionHeader>(
            "SELECT id, first_name, last_name, client_id, created_at FROM sessions WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(header)
    }

    async fn list_measurements(&self, session_id: i64) -> Result<Vec<Measurement>> {
        let rows = sqlx::query_as::<_, Measurement>(
            r#"
            SELECT id, session_id, session_time, emotion, emotion_score,
                   engagement_val, engagement_lbl,
                   satisfaction_val, satisfaction_lbl,
                   trust_val, trust_lbl,
                   loyalty_val, loyalty_lbl,
                   opinion_val, opinion_lbl,
                   created_at
            FROM measurements
            WHERE session_id = ?
            ORDER BY session_time ASC, id ASC
            "#,
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn delete_session_header(&self, id: i64) -> Result<()> {
        self.delete_session_headers(&[id]).await?;
        Ok(())
    }

    async fn delete_session_headers(&self, ids: &[i64]) -> Result<u64> {
        let mut tx = self.pool.begin().await?;
        let mut deleted = 0;

        for id in ids {
            // Explicit child delete keeps this correct even with foreign keys off
            sqlx::query("DELETE FROM measurements WHERE session_id = ?")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            deleted += sqlx::query("DELETE FROM sessions WHERE id = ?")
                .bind(id)
                .execute(&mut *tx)
                .await?
                .rows_affected();
        }

        tx.commit().await?;
        debug!("Deleted {} session header(s)", deleted);
        Ok(deleted)
    }
}
