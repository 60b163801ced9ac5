//! neurolink-server library - live emotion KPI service
//!
//! Camera frames arrive over WebSocket and are classified by an external
//! emotion classifier. A one-second broadcast tick turns the latest
//! classification into KPI snapshots for every connected client and
//! persists samples of recording sessions. An admin HTTP API serves the
//! persisted sessions.

use axum::{routing::get, Router};
use neurolink_common::config::ServiceConfig;
use neurolink_common::db::SessionStore;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod classification;
pub mod classifier;
pub mod error;
pub mod frames;
pub mod pipeline;
pub mod registry;
pub mod scheduler;

use classification::SharedClassification;
use classifier::EmotionClassifier;
use pipeline::FramePipeline;
use registry::SessionRegistry;

/// Application state shared across HTTP and WebSocket handlers
#[derive(Clone)]
pub struct AppState {
    pub registry: SessionRegistry,
    pub classification: SharedClassification,
    pub pipeline: FramePipeline,
    pub store: Arc<dyn SessionStore>,
    /// Frames classified concurrently per connection
    pub max_inflight_frames: usize,
    /// Outbound snapshot queue depth per connection
    pub outbound_queue: usize,
}

impl AppState {
    /// Wire the live components around `store` and `classifier`
    pub fn new(
        store: Arc<dyn SessionStore>,
        classifier: Arc<dyn EmotionClassifier>,
        config: &ServiceConfig,
    ) -> Self {
        let registry = SessionRegistry::new(Arc::clone(&store), config.smoothing.alpha);
        let classification = SharedClassification::new();
        let pipeline = FramePipeline::new(
            classifier,
            classification.clone(),
            registry.clone(),
            config.frames.max_frame_bytes,
        );

        Self {
            registry,
            classification,
            pipeline,
            store,
            max_inflight_frames: config.frames.max_inflight_per_connection,
            outbound_queue: config.broadcast.outbound_queue,
        }
    }
}

/// Build application router
///
/// Admin routes are served both at the root and under `/api`.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/ws", get(api::ws_handler))
        .merge(api::health_routes())
        .merge(api::session_routes())
        .nest("/api", api::session_routes())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
