//! Wire message types exchanged with browser clients

use serde::{Deserialize, Serialize};

use crate::kpi::KpiSnapshot;
use crate::smoothing::FaceRegion;

/// Identity supplied by the client when a recording starts
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartSession {
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub client_id: Option<String>,
}

/// Client → server control messages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientMessage {
    /// Begin a fresh recorded take
    Start(StartSession),

    /// Stop recording (no-op when idle)
    Stop,

    /// One camera frame as a data URI (`data:image/jpeg;base64,...`)
    #[serde(rename_all = "camelCase")]
    Frame { encoded_image: String },
}

/// Server → client snapshot pushed once per tick
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename = "metricsUpdate", rename_all = "camelCase")]
pub struct MetricsUpdate {
    pub emotion: String,
    pub face_coords: Option<FaceRegion>,
    pub metrics: KpiSnapshot,
    pub session_time_seconds: u64,
    pub is_recording: bool,
}
