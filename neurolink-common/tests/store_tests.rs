//! Integration tests for the SQLite session store
//!
//! Covers header creation/listing order, measurement ordering, not-found
//! lookups and cascading deletes.

use neurolink_common::db::init::{init_database, init_memory_database};
use neurolink_common::db::{MeasurementRow, NewSessionHeader, SessionStore, SqliteSessionStore};
use neurolink_common::kpi::{KpiEngine, NoNoise};

async fn memory_store() -> SqliteSessionStore {
    SqliteSessionStore::new(init_memory_database().await.expect("memory database"))
}

fn header(first: &str, client: &str) -> NewSessionHeader {
    NewSessionHeader {
        first_name: Some(first.to_string()),
        last_name: Some("Doe".to_string()),
        client_id: Some(client.to_string()),
    }
}

fn row(session_id: i64, t: u64, emotion: &str, score: f64) -> MeasurementRow {
    MeasurementRow {
        session_id,
        session_time_seconds: t,
        emotion: emotion.to_string(),
        confidence_score: score,
        kpis: KpiEngine::default().compute(emotion, score, &mut NoNoise),
    }
}

#[tokio::test]
async fn test_headers_listed_newest_first() {
    let store = memory_store().await;

    let a = store.create_session_header(&header("Ann", "c1")).await.unwrap();
    let b = store.create_session_header(&header("Bob", "c2")).await.unwrap();
    assert!(b > a);

    let headers = store.list_session_headers().await.unwrap();
    let ids: Vec<i64> = headers.iter().map(|h| h.id).collect();
    assert_eq!(ids, vec![b, a]);
    assert_eq!(headers[0].first_name.as_deref(), Some("Bob"));
    assert_eq!(headers[1].client_id.as_deref(), Some("c1"));
    assert!(headers[0].created_at.is_some());
}

#[tokio::test]
async fn test_get_missing_header_is_none() {
    let store = memory_store().await;
    assert!(store.get_session_header(42).await.unwrap().is_none());
}

#[tokio::test]
async fn test_measurements_ordered_by_session_time() {
    let store = memory_store().await;
    let id = store.create_session_header(&header("Ann", "c1")).await.unwrap();

    store.append_measurement(&row(id, 2, "sad", 40.0)).await.unwrap();
    store.append_measurement(&row(id, 0, "happy", 90.0)).await.unwrap();
    store.append_measurement(&row(id, 1, "neutral", 10.0)).await.unwrap();

    let rows = store.list_measurements(id).await.unwrap();
    let times: Vec<i64> = rows.iter().map(|m| m.session_time).collect();
    assert_eq!(times, vec![0, 1, 2]);

    let first = &rows[0];
    assert_eq!(first.emotion, "happy");
    assert_eq!(first.emotion_score, 90.0);
    assert_eq!(first.engagement_val, 90);
    assert_eq!(first.engagement_lbl, "strong");
    assert_eq!(first.opinion_val, first.satisfaction_val);
}

#[tokio::test]
async fn test_measurement_requires_existing_session() {
    let store = memory_store().await;
    let result = store.append_measurement(&row(999, 0, "happy", 50.0)).await;
    assert!(result.is_err(), "foreign key should reject orphan rows");
}

#[tokio::test]
async fn test_delete_removes_header_and_measurements() {
    let store = memory_store().await;
    let keep = store.create_session_header(&header("Keep", "c1")).await.unwrap();
    let gone = store.create_session_header(&header("Gone", "c2")).await.unwrap();
    store.append_measurement(&row(gone, 0, "happy", 80.0)).await.unwrap();
    store.append_measurement(&row(keep, 0, "sad", 20.0)).await.unwrap();

    store.delete_session_header(gone).await.unwrap();

    assert!(store.get_session_header(gone).await.unwrap().is_none());
    assert!(store.list_measurements(gone).await.unwrap().is_empty());
    assert_eq!(store.list_measurements(keep).await.unwrap().len(), 1);

    // Deleting again is not an error
    store.delete_session_header(gone).await.unwrap();
}

#[tokio::test]
async fn test_bulk_delete_counts_existing_only() {
    let store = memory_store().await;
    let a = store.create_session_header(&header("A", "c1")).await.unwrap();
    let b = store.create_session_header(&header("B", "c2")).await.unwrap();
    let c = store.create_session_header(&header("C", "c3")).await.unwrap();

    let deleted = store.delete_session_headers(&[a, c, 1234]).await.unwrap();
    assert_eq!(deleted, 2);

    let remaining: Vec<i64> = store
        .list_session_headers()
        .await
        .unwrap()
        .iter()
        .map(|h| h.id)
        .collect();
    assert_eq!(remaining, vec![b]);
}

#[tokio::test]
async fn test_file_database_created_and_reopened() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("nested").join("neurolink.db");

    let pool = init_database(&db_path).await.unwrap();
    assert!(db_path.exists(), "database file should be created");
    let store = SqliteSessionStore::new(pool);
    let id = store.create_session_header(&header("Ann", "c1")).await.unwrap();
    store.pool().close().await;

    let reopened = SqliteSessionStore::new(init_database(&db_path).await.unwrap());
    let found = reopened.get_session_header(id).await.unwrap();
    assert_eq!(found.and_then(|h| h.first_name).as_deref(), Some("Ann"));
}
