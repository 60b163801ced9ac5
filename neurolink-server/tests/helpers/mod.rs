//! Shared test doubles for neurolink-server integration tests
//!
//! - FixedClassifier: returns the same detection for every frame
//! - RecordingStore: in-memory store that records appends and can be told
//!   to fail header inserts, deletes or appends for chosen sessions
//! - png_data_uri: generated camera frame

#![allow(dead_code)]

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::{ImageFormat, RgbImage};
use neurolink_common::db::{Measurement, MeasurementRow, NewSessionHeader, SessionHeader, SessionStore};
use neurolink_common::{Error, FaceRegion, Result};
use neurolink_server::classifier::{EmotionClassifier, RawDetection};
use neurolink_server::frames::DecodedFrame;
use std::collections::{HashMap, HashSet};
use std::io::Cursor;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Classifier double returning a fixed detection
pub struct FixedClassifier {
    detection: RawDetection,
}

impl FixedClassifier {
    pub fn new(emotion: &str, score: f64, region: Option<FaceRegion>) -> Self {
        let mut scores = HashMap::new();
        scores.insert(emotion.to_string(), score);
        Self {
            detection: RawDetection {
                dominant_emotion: emotion.to_string(),
                scores,
                face_region: region,
            },
        }
    }
}

#[async_trait]
impl EmotionClassifier for FixedClassifier {
    async fn classify(&self, _frame: &DecodedFrame) -> Result<RawDetection> {
        Ok(self.detection.clone())
    }
}

/// Store double keeping everything in memory
#[derive(Default)]
pub struct RecordingStore {
    next_id: AtomicI64,
    headers: Mutex<Vec<NewSessionHeader>>,
    rows: Mutex<Vec<MeasurementRow>>,
    fail_headers: AtomicBool,
    fail_deletes: AtomicBool,
    fail_appends_for: Mutex<HashSet<i64>>,
}

impl RecordingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_headers(&self) {
        self.fail_headers.store(true, Ordering::SeqCst);
    }

    pub fn fail_deletes(&self) {
        self.fail_deletes.store(true, Ordering::SeqCst);
    }

    pub fn fail_appends_for(&self, session_id: i64) {
        self.fail_appends_for.lock().unwrap().insert(session_id);
    }

    pub fn header_count(&self) -> usize {
        self.headers.lock().unwrap().len()
    }

    pub fn rows(&self) -> Vec<MeasurementRow> {
        self.rows.lock().unwrap().clone()
    }

    pub fn rows_for(&self, session_id: i64) -> Vec<MeasurementRow> {
        self.rows()
            .into_iter()
            .filter(|r| r.session_id == session_id)
            .collect()
    }
}

#[async_trait]
impl SessionStore for RecordingStore {
    async fn create_session_header(&self, header: &NewSessionHeader) -> Result<i64> {
        if self.fail_headers.load(Ordering::SeqCst) {
            return Err(Error::Internal("header insert failed".to_string()));
        }
        self.headers.lock().unwrap().push(header.clone());
        Ok(self.next_id.fetch_add(1, Ordering::SeqCst) + 1)
    }

    async fn append_measurement(&self, row: &MeasurementRow) -> Result<()> {
        if self.fail_appends_for.lock().unwrap().contains(&row.session_id) {
            return Err(Error::Internal("append failed".to_string()));
        }
        self.rows.lock().unwrap().push(row.clone());
        Ok(())
    }

    async fn list_session_headers(&self) -> Result<Vec<SessionHeader>> {
        Ok(Vec::new())
    }

    async fn get_session_header(&self, _id: i64) -> Result<Option<SessionHeader>> {
        Ok(None)
    }

    async fn list_measurements(&self, _session_id: i64) -> Result<Vec<Measurement>> {
        Ok(Vec::new())
    }

    async fn delete_session_header(&self, _id: i64) -> Result<()> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(Error::Internal("delete failed".to_string()));
        }
        Ok(())
    }

    async fn delete_session_headers(&self, _ids: &[i64]) -> Result<u64> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(Error::Internal("bulk delete failed".to_string()));
        }
        Ok(0)
    }
}

/// Solid-color PNG of the given size as a data URI
pub fn png_data_uri(width: u32, height: u32) -> String {
    let img = RgbImage::from_pixel(width, height, image::Rgb([200, 160, 140]));
    let mut bytes = Cursor::new(Vec::new());
    img.write_to(&mut bytes, ImageFormat::Png).unwrap();
    format!("data:image/png;base64,{}", STANDARD.encode(bytes.into_inner()))
}

/// Poll `condition` until it holds or two seconds pass
pub async fn wait_until<F>(mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    for _ in 0..200 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}
