//! Broadcast scheduler
//!
//! A single periodic task that, once per tick, fans the shared
//! classification out to every registered session:
//! 1. recompute KPIs from the latest classification
//! 2. advance elapsed time of recording sessions (wall-clock delta)
//! 3. append a measurement when the session is recording, has a persisted
//!    header, and the persistence interval has passed
//! 4. offer a `metricsUpdate` to the connection's outbound queue
//!
//! Persistence is fire-and-forget: inserts run as tasks owned by the
//! session and failures are only logged. Outbound sends never wait.

use neurolink_common::db::{MeasurementRow, SessionStore};
use neurolink_common::events::MetricsUpdate;
use neurolink_common::kpi::{KpiEngine, NoiseSource};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::classification::SharedClassification;
use crate::registry::SessionRegistry;

/// Counters for one tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Sessions addressed this tick
    pub sessions: usize,
    /// Snapshots queued for delivery
    pub sent: usize,
    /// Snapshots dropped because a client queue was full or closed
    pub dropped: usize,
    /// Measurement inserts dispatched
    pub persisted: usize,
}

pub struct BroadcastScheduler {
    registry: SessionRegistry,
    classification: SharedClassification,
    store: Arc<dyn SessionStore>,
    engine: KpiEngine,
    noise: Box<dyn NoiseSource>,
    tick_period: Duration,
    persist_interval: Duration,
}

impl BroadcastScheduler {
    pub fn new(
        registry: SessionRegistry,
        classification: SharedClassification,
        store: Arc<dyn SessionStore>,
        engine: KpiEngine,
        noise: Box<dyn NoiseSource>,
    ) -> Self {
        Self {
            registry,
            classification,
            store,
            engine,
            noise,
            tick_period: Duration::from_secs(1),
            persist_interval: Duration::from_secs(1),
        }
    }

    pub fn with_tick_period(mut self, period: Duration) -> Self {
        self.tick_period = period;
        self
    }

    pub fn with_persist_interval(mut self, interval: Duration) -> Self {
        self.persist_interval = interval;
        self
    }

    /// Run one tick at `now`
    pub async fn tick(&mut self, now: Instant) -> TickReport {
        let latest = self.classification.latest();
        let mut report = TickReport::default();
        let mut sessions = self.registry.lock().await;

        for session in sessions.values_mut() {
            report.sessions += 1;
            session.reap_persistence();

            let kpis = self
                .engine
                .compute(&latest.emotion, latest.confidence_score, self.noise.as_mut());

            if session.recording {
                if let Some(started_at) = session.started_at {
                    session.elapsed_seconds = now.saturating_duration_since(started_at).as_secs();
                }
            }

            let face_coords = session.observe_face(latest.sequence, latest.face_region);

            if session.recording {
                if let Some(db_id) = session.persisted_session_id {
                    let due = session
                        .last_persist_at
                        .map_or(true, |last| now.saturating_duration_since(last) >= self.persist_interval);
                    if due {
                        session.last_persist_at = Some(now);
                        let row = MeasurementRow {
                            session_id: db_id,
                            session_time_seconds: session.elapsed_seconds,
                            emotion: latest.emotion.clone(),
                            confidence_score: latest.confidence_score,
                            kpis: kpis.clone(),
                        };
                        let store = Arc::clone(&self.store);
                        let connection = session.id;
                        session.persistence.spawn(async move {
                            if let Err(e) = store.append_measurement(&row).await {
                                warn!(
                                    "Failed to persist measurement for {} (session {}): {}",
                                    connection, row.session_id, e
                                );
                            }
                        });
                        report.persisted += 1;
                    }
                }
            }

            let update = MetricsUpdate {
                emotion: latest.emotion.clone(),
                face_coords,
                metrics: kpis,
                session_time_seconds: session.elapsed_seconds,
                is_recording: session.recording,
            };

            match session.outbound().try_send(update) {
                Ok(()) => report.sent += 1,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    debug!("Outbound queue full for {}, dropping snapshot", session.id);
                    report.dropped += 1;
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    debug!("Outbound queue closed for {}", session.id);
                    report.dropped += 1;
                }
            }
        }

        report
    }

    /// Tick every period until `shutdown` turns true or its sender is dropped
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        let mut interval = time::interval(self.tick_period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            "Broadcast scheduler started ({}ms tick, {}ms persist interval)",
            self.tick_period.as_millis(),
            self.persist_interval.as_millis()
        );

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    // The deadline lags real time when the runtime is late
                    let report = self.tick(Instant::now()).await;
                    if report.sessions > 0 {
                        debug!(
                            "Tick: {} sessions, {} sent, {} dropped, {} persisted",
                            report.sessions, report.sent, report.dropped, report.persisted
                        );
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("Broadcast scheduler stopped");
    }
}
