//! Process-wide "latest classification" cell
//!
//! Every successfully classified frame, from any connection, replaces the
//! whole value. Readers always observe a complete value: writes go through
//! a `watch` channel, which swaps the value under its own lock.

use neurolink_common::FaceRegion;
use std::sync::Arc;
use tokio::sync::watch;

/// Emotion label reported before any frame has been classified
pub const INITIAL_EMOTION: &str = "neutral";

/// Most recent classification result
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    /// Dominant emotion label
    pub emotion: String,
    /// Classifier confidence for the dominant emotion (0-100)
    pub confidence_score: f64,
    /// Face box, `None` when no usable face was detected
    pub face_region: Option<FaceRegion>,
    /// Incremented on every publish; 0 for the initial value
    pub sequence: u64,
}

impl Default for Classification {
    fn default() -> Self {
        Self {
            emotion: INITIAL_EMOTION.to_string(),
            confidence_score: 0.0,
            face_region: None,
            sequence: 0,
        }
    }
}

/// Single-slot, last-writer-wins cell shared by frame workers and the tick loop
#[derive(Debug, Clone)]
pub struct SharedClassification {
    tx: Arc<watch::Sender<Classification>>,
}

impl Default for SharedClassification {
    fn default() -> Self {
        Self::new()
    }
}

impl SharedClassification {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(Classification::default());
        Self { tx: Arc::new(tx) }
    }

    /// Replace the current value, returning the assigned sequence number
    pub fn publish(&self, emotion: String, confidence_score: f64, face_region: Option<FaceRegion>) -> u64 {
        let mut sequence = 0;
        self.tx.send_modify(|current| {
            sequence = current.sequence + 1;
            *current = Classification {
                emotion,
                confidence_score,
                face_region,
                sequence,
            };
        });
        sequence
    }

    /// Copy of the current value
    pub fn latest(&self) -> Classification {
        self.tx.borrow().clone()
    }
}
