//! Session controller
//!
//! Owns the session task. The task samples frames on one interval and counts
//! seconds on another; both stop when the controller ends the session.

use std::sync::Arc;
use std::time::Duration;

use alerting::RuleConfig;
use camera_capture::{CameraConfig, CameraError, FrameSource};
use chrono::Utc;
use inference_engine::ObjectDetector;
use proctoring::{ProctorConfig, ProctorModule};
use serde::{Deserialize, Serialize};
use storage::{Repository, SessionRecord};
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval, interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::{LiveStatus, Session, SessionDescriptor, SessionError, SessionPhase, SessionRequest};

/// Session runtime configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Frame sampling period (ms)
    pub sample_interval_ms: u64,
    pub camera: CameraConfig,
    pub proctor: ProctorConfig,
    pub rules: RuleConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            sample_interval_ms: 100,
            camera: CameraConfig::default(),
            proctor: ProctorConfig::default(),
            rules: RuleConfig::default(),
        }
    }
}

struct ActiveSession {
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<Session>,
}

/// Drives one session from start to record
pub struct SessionController {
    config: SessionConfig,
    detector: Option<Arc<dyn ObjectDetector>>,
    store: Arc<Repository>,
    phase: SessionPhase,
    status: Arc<watch::Sender<LiveStatus>>,
    active: Option<ActiveSession>,
    /// Record produced but not yet stored
    unsaved: Option<SessionRecord>,
}

impl SessionController {
    /// `detector` is `None` when no model could be loaded
    pub fn new(
        config: SessionConfig,
        detector: Option<Arc<dyn ObjectDetector>>,
        store: Arc<Repository>,
    ) -> Self {
        let (status, _) = watch::channel(LiveStatus::default());
        Self {
            config,
            detector,
            store,
            phase: SessionPhase::Idle,
            status: Arc::new(status),
            active: None,
            unsaved: None,
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// Latest published status
    pub fn live_status(&self) -> LiveStatus {
        self.status.borrow().clone()
    }

    /// Receive status updates as they are published
    pub fn subscribe(&self) -> watch::Receiver<LiveStatus> {
        self.status.subscribe()
    }

    /// Validate, acquire the capture source, and start sampling.
    ///
    /// Any error leaves the controller idle, so `start` can be retried.
    pub fn start<F>(&mut self, request: SessionRequest, acquire: F) -> Result<(), SessionError>
    where
        F: FnOnce(&CameraConfig) -> Result<Box<dyn FrameSource>, CameraError>,
    {
        if self.phase != SessionPhase::Idle {
            return Err(SessionError::InvalidState {
                action: "start",
                phase: self.phase,
            });
        }

        let descriptor = SessionDescriptor::from_request(request)?;
        let source = acquire(&self.config.camera).map_err(|e| {
            warn!("Capture source unavailable, staying idle: {}", e);
            SessionError::Device(e)
        })?;

        let mut session = Session::new(self.config.rules.clone());
        session.start(descriptor)?;
        self.status.send_replace(session.live_status());

        let module = ProctorModule::new(self.config.proctor.clone(), self.detector.clone());
        if !module.objects_enabled() {
            warn!("Object detection unavailable; monitoring faces and pose only");
        }

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let task = tokio::spawn(run_session(
            session,
            source,
            module,
            Duration::from_millis(self.config.sample_interval_ms.max(1)),
            shutdown_rx,
            Arc::clone(&self.status),
        ));

        self.active = Some(ActiveSession {
            shutdown: shutdown_tx,
            task,
        });
        self.phase = SessionPhase::Running;
        Ok(())
    }

    /// Stop sampling, release the source, and persist the record.
    ///
    /// Returns `Ok(None)` if the session already ended. If the record cannot
    /// be stored the session stays running with its record kept, and the next
    /// `end` retries the write.
    pub async fn end(&mut self) -> Result<Option<SessionRecord>, SessionError> {
        match self.phase {
            SessionPhase::Idle => return Err(SessionError::NotStarted),
            SessionPhase::Ended => return Ok(None),
            SessionPhase::Running => {}
        }

        if let Some(active) = self.active.take() {
            // The task may already have stopped on its own
            let _ = active.shutdown.send(());
            let mut session = active.task.await.map_err(|e| {
                error!("Session task did not finish cleanly: {}", e);
                self.phase = SessionPhase::Ended;
                SessionError::Task(e.to_string())
            })?;

            self.unsaved = session.end(Utc::now())?;
            self.status.send_replace(session.live_status());
        }

        let Some(record) = self.unsaved.take() else {
            self.phase = SessionPhase::Ended;
            return Ok(None);
        };

        if let Err(e) = self.store.append(record.clone()) {
            error!("Failed to store session record {}, keeping it for retry: {}", record.id, e);
            self.unsaved = Some(record);
            return Err(e.into());
        }

        self.phase = SessionPhase::Ended;
        metrics::counter!("proctor_sessions_completed_total").increment(1);
        metrics::histogram!("proctor_session_seconds").record(record.duration as f64);
        Ok(Some(record))
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        if let Some(active) = self.active.take() {
            warn!("Session controller dropped while running; abandoning session");
            active.task.abort();
        }
    }
}

async fn run_session(
    mut session: Session,
    mut source: Box<dyn FrameSource>,
    mut module: ProctorModule,
    sample_period: Duration,
    mut shutdown: oneshot::Receiver<()>,
    status: Arc<watch::Sender<LiveStatus>>,
) -> Session {
    let mut sampler = interval(sample_period);
    sampler.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let second = Duration::from_secs(1);
    let mut clock = interval_at(Instant::now() + second, second);

    info!("Sampling every {:?}", sample_period);

    loop {
        tokio::select! {
            biased;

            _ = &mut shutdown => break,

            _ = clock.tick() => {
                session.tick_second();
                status.send_replace(session.live_status());
            }

            _ = sampler.tick() => {
                if !source.is_ready() {
                    metrics::counter!("proctor_ticks_skipped_total").increment(1);
                    continue;
                }

                let frame = match source.capture() {
                    Ok(frame) => frame,
                    Err(e) => {
                        warn!("Frame capture failed, skipping tick: {}", e);
                        metrics::counter!("proctor_ticks_skipped_total").increment(1);
                        continue;
                    }
                };

                let detection = module.analyze(frame).await;
                metrics::counter!("proctor_ticks_total").increment(1);
                session.on_detection(detection);
                status.send_replace(session.live_status());
            }
        }
    }

    source.release();
    debug!("Capture source released after {} ticks", module.ticks());
    session
}
