//! Session and measurement persistence
//!
//! [`SessionStore`] is the seam between the live services and durable
//! storage. [`SqliteSessionStore`] is the production implementation.

pub mod init;
mod sqlite;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::events::StartSession;
use crate::kpi::KpiSnapshot;
use crate::Result;

pub use sqlite::SqliteSessionStore;

/// Persisted session header (one per recorded take)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct SessionHeader {
    pub id: i64,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub client_id: Option<String>,
    pub created_at: Option<chrono::NaiveDateTime>,
}

/// Fields supplied when a take starts
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSessionHeader {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub client_id: Option<String>,
}

impl From<StartSession> for NewSessionHeader {
    fn from(start: StartSession) -> Self {
        Self {
            first_name: start.first_name,
            last_name: start.last_name,
            client_id: start.client_id,
        }
    }
}

/// KPI sample to append for a recording session
#[derive(Debug, Clone, PartialEq)]
pub struct MeasurementRow {
    pub session_id: i64,
    pub session_time_seconds: u64,
    pub emotion: String,
    pub confidence_score: f64,
    pub kpis: KpiSnapshot,
}

/// Stored KPI sample, as returned to the admin UI
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Measurement {
    pub id: i64,
    pub session_id: i64,
    pub session_time: i64,
    pub emotion: String,
    pub emotion_score: f64,
    pub engagement_val: i64,
    pub engagement_lbl: String,
    pub satisfaction_val: i64,
    pub satisfaction_lbl: String,
    pub trust_val: i64,
    pub trust_lbl: String,
    pub loyalty_val: i64,
    pub loyalty_lbl: String,
    pub opinion_val: i64,
    pub opinion_lbl: String,
    pub created_at: Option<chrono::NaiveDateTime>,
}

/// Durable storage for session headers and their KPI samples
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Insert a header and return its id
    async fn create_session_header(&self, header: &NewSessionHeader) -> Result<i64>;

    /// Append one KPI sample
    async fn append_measurement(&self, row: &MeasurementRow) -> Result<()>;

    /// All headers, newest (highest id) first
    async fn list_session_headers(&self) -> Result<Vec<SessionHeader>>;

    /// One header, `None` if absent
    async fn get_session_header(&self, id: i64) -> Result<Option<SessionHeader>>;

    /// Samples of one session ordered by session time
    async fn list_measurements(&self, session_id: i64) -> Result<Vec<Measurement>>;

    /// Delete a header and its samples. Deleting a missing id succeeds.
    async fn delete_session_header(&self, id: i64) -> Result<()>;

    /// Delete several headers, returning how many existed
    async fn delete_session_headers(&self, ids: &[i64]) -> Result<u64>;
}
