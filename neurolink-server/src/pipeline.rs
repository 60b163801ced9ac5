//! Per-frame decode → classify → publish
//!
//! Each frame is processed independently. Decoding runs on the blocking
//! pool, classification on the classifier port; the result replaces the
//! shared classification when it completes (last writer wins). Any failure
//! drops the frame and leaves the shared classification untouched.

use neurolink_common::{Error, Result};
use std::sync::Arc;
use tracing::debug;

use crate::classification::SharedClassification;
use crate::classifier::EmotionClassifier;
use crate::frames::{decode_data_uri, DecodedFrame};
use crate::registry::{ConnectionId, SessionRegistry};

/// What happened to one frame
#[derive(Debug, Clone, PartialEq)]
pub enum FrameOutcome {
    /// Classification written to the shared cell with this sequence number
    Published(u64),
    /// Decode or classifier failure; nothing written
    Dropped,
    /// The connection closed while the frame was in flight
    Discarded,
}

#[derive(Clone)]
pub struct FramePipeline {
    classifier: Arc<dyn EmotionClassifier>,
    classification: SharedClassification,
    registry: SessionRegistry,
    max_frame_bytes: usize,
}

impl FramePipeline {
    pub fn new(
        classifier: Arc<dyn EmotionClassifier>,
        classification: SharedClassification,
        registry: SessionRegistry,
        max_frame_bytes: usize,
    ) -> Self {
        Self {
            classifier,
            classification,
            registry,
            max_frame_bytes,
        }
    }

    async fn decode(&self, encoded_image: String) -> Result<DecodedFrame> {
        let max = self.max_frame_bytes;
        tokio::task::spawn_blocking(move || decode_data_uri(&encoded_image, max))
            .await
            .map_err(|e| Error::Internal(format!("frame decode task failed: {}", e)))?
    }

    /// Process one frame uploaded by `connection`
    pub async fn process(&self, connection: ConnectionId, encoded_image: String) -> FrameOutcome {
        let frame = match self.decode(encoded_image).await {
            Ok(frame) => frame,
            Err(e) => {
                debug!("Dropping frame from {}: {}", connection, e);
                return FrameOutcome::Dropped;
            }
        };

        let detection = match self.classifier.classify(&frame).await {
            Ok(detection) => detection,
            Err(e) => {
                debug!("Dropping frame from {}: {}", connection, e);
                return FrameOutcome::Dropped;
            }
        };

        if !self.registry.contains(connection).await {
            debug!("Discarding classification for closed connection {}", connection);
            return FrameOutcome::Discarded;
        }

        let confidence = detection.dominant_score();
        let face = detection
            .face_region
            .and_then(|r| r.filter_degenerate(frame.width, frame.height));

        let sequence = self
            .classification
            .publish(detection.dominant_emotion, confidence, face);
        FrameOutcome::Published(sequence)
    }
}
