//! Live connection registry
//!
//! One [`Session`] per open connection, created on open and dropped on close.
//! A session is mutated only by its own connection's control messages
//! (`start`/`stop`) and by the broadcast tick.
//!
//! Session lifecycle:
//! ```text
//!   open ──► Idle ──start──► Recording ──stop──► Idle
//!                   ▲            │
//!                   └──start─────┘   (restart = fresh take)
//!   close (any state) ──► removed
//! ```

use neurolink_common::db::{NewSessionHeader, SessionStore};
use neurolink_common::events::MetricsUpdate;
use neurolink_common::{CoordinateSmoother, FaceRegion};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex, MutexGuard};
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Opaque per-connection handle
pub type ConnectionId = Uuid;

/// Consecutive face-less classifications after which the smoothed box is dropped
pub const MAX_MISSED_DETECTIONS: u32 = 5;

/// Per-connection state
#[derive(Debug)]
pub struct Session {
    pub id: ConnectionId,
    pub recording: bool,
    pub elapsed_seconds: u64,
    /// Set on transition to recording
    pub started_at: Option<Instant>,
    /// Header id of the current take, once its insert succeeded
    pub persisted_session_id: Option<i64>,
    /// When the last sample of the current take was dispatched
    pub last_persist_at: Option<Instant>,
    pub smoother: CoordinateSmoother,
    /// Sequence of the last classification fed to the smoother
    pub(crate) last_classification: u64,
    pub(crate) missed_detections: u32,
    /// Bumped on every `start`; ties header inserts to their take
    take: u64,
    outbound: mpsc::Sender<MetricsUpdate>,
    /// In-flight persistence, aborted when the session is dropped
    pub(crate) persistence: JoinSet<()>,
}

impl Session {
    fn new(id: ConnectionId, outbound: mpsc::Sender<MetricsUpdate>, smoothing_alpha: f64) -> Self {
        Self {
            id,
            recording: false,
            elapsed_seconds: 0,
            started_at: None,
            persisted_session_id: None,
            last_persist_at: None,
            smoother: CoordinateSmoother::new(smoothing_alpha),
            last_classification: 0,
            missed_detections: 0,
            take: 0,
            outbound,
            persistence: JoinSet::new(),
        }
    }

    pub(crate) fn outbound(&self) -> &mpsc::Sender<MetricsUpdate> {
        &self.outbound
    }

    /// Feed a classification to the smoother once; repeated ticks over the
    /// same classification leave the box untouched.
    pub(crate) fn observe_face(&mut self, sequence: u64, face: Option<FaceRegion>) -> Option<FaceRegion> {
        if sequence == self.last_classification {
            return self.smoother.current();
        }
        self.last_classification = sequence;

        if face.is_some() {
            self.missed_detections = 0;
        } else {
            self.missed_detections += 1;
            if self.missed_detections >= MAX_MISSED_DETECTIONS {
                self.smoother.reset();
                return None;
            }
        }
        self.smoother.update(face)
    }

    /// Drop finished persistence tasks
    pub(crate) fn reap_persistence(&mut self) {
        while let Some(result) = self.persistence.try_join_next() {
            if let Err(e) = result {
                if e.is_panic() {
                    warn!("Persistence task for {} panicked", self.id);
                }
            }
        }
    }

    fn view(&self) -> SessionView {
        SessionView {
            id: self.id,
            recording: self.recording,
            elapsed_seconds: self.elapsed_seconds,
            persisted_session_id: self.persisted_session_id,
            last_persist_at: self.last_persist_at,
            face_region: self.smoother.current(),
            take: self.take,
        }
    }
}

/// Read-only copy of a session's observable state
#[derive(Debug, Clone, PartialEq)]
pub struct SessionView {
    pub id: ConnectionId,
    pub recording: bool,
    pub elapsed_seconds: u64,
    pub persisted_session_id: Option<i64>,
    pub last_persist_at: Option<Instant>,
    pub face_region: Option<FaceRegion>,
    pub take: u64,
}

/// Owned, synchronized table of live sessions
#[derive(Clone)]
pub struct SessionRegistry {
    sessions: Arc<Mutex<HashMap<ConnectionId, Session>>>,
    store: Arc<dyn SessionStore>,
    smoothing_alpha: f64,
}

impl SessionRegistry {
    pub fn new(store: Arc<dyn SessionStore>, smoothing_alpha: f64) -> Self {
        Self {
            sessions: Arc::new(Mutex::new(HashMap::new())),
            store,
            smoothing_alpha,
        }
    }

    /// Allocate an idle session for a newly opened connection
    ///
    /// Returns `false` (and leaves the existing entry alone) if the id is
    /// already registered.
    pub async fn register(&self, id: ConnectionId, outbound: mpsc::Sender<MetricsUpdate>) -> bool {
        let mut sessions = self.sessions.lock().await;
        if sessions.contains_key(&id) {
            warn!("Connection {} already registered", id);
            return false;
        }
        sessions.insert(id, Session::new(id, outbound, self.smoothing_alpha));
        info!("Connection {} opened ({} active)", id, sessions.len());
        true
    }

    /// Remove a closed connection's session, abandoning its in-flight
    /// persistence. Returns whether the session existed.
    pub async fn unregister(&self, id: ConnectionId) -> bool {
        let removed = {
            let mut sessions = self.sessions.lock().await;
            let removed = sessions.remove(&id);
            if removed.is_some() {
                info!("Connection {} closed ({} active)", id, sessions.len());
            }
            removed
        };
        // Dropping the JoinSet aborts pending inserts
        removed.is_some()
    }

    /// Begin a fresh recorded take
    ///
    /// Resets elapsed time, forgets the previous take's header id and
    /// requests a new header from the store. If the insert fails the session
    /// still records live, but no samples are persisted for this take.
    /// Returns `false` if the connection is not registered.
    pub async fn start(&self, id: ConnectionId, header: NewSessionHeader, now: Instant) -> bool {
        let take = {
            let mut sessions = self.sessions.lock().await;
            let Some(session) = sessions.get_mut(&id) else {
                debug!("start from unknown connection {}", id);
                return false;
            };
            session.recording = true;
            session.elapsed_seconds = 0;
            session.started_at = Some(now);
            session.persisted_session_id = None;
            session.last_persist_at = None;
            session.take += 1;
            session.take
        };
        info!("Connection {} started recording (take {})", id, take);

        // Lock released: the insert must not stall the tick or other connections
        match self.store.create_session_header(&header).await {
            Ok(db_id) => {
                let mut sessions = self.sessions.lock().await;
                match sessions.get_mut(&id) {
                    Some(session) if session.take == take => {
                        session.persisted_session_id = Some(db_id);
                        debug!("Connection {} take {} persisted as session {}", id, take, db_id);
                    }
                    _ => debug!("Discarding header {} for superseded take of {}", db_id, id),
                }
            }
            Err(e) => {
                warn!("Failed to create session header for {}: {}", id, e);
            }
        }
        true
    }

    /// Stop recording; a no-op when idle. Returns whether the connection is registered.
    pub async fn stop(&self, id: ConnectionId) -> bool {
        let mut sessions = self.sessions.lock().await;
        match sessions.get_mut(&id) {
            Some(session) => {
                if session.recording {
                    session.recording = false;
                    info!(
                        "Connection {} stopped recording after {}s",
                        id, session.elapsed_seconds
                    );
                }
                true
            }
            None => false,
        }
    }

    pub async fn contains(&self, id: ConnectionId) -> bool {
        self.sessions.lock().await.contains_key(&id)
    }

    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    pub async fn session(&self, id: ConnectionId) -> Option<SessionView> {
        self.sessions.lock().await.get(&id).map(Session::view)
    }

    /// Exclusive access for the tick loop
    pub(crate) async fn lock(&self) -> MutexGuard<'_, HashMap<ConnectionId, Session>> {
        self.sessions.lock().await
    }
}
