//! Exam Session Lifecycle
//!
//! `Idle -> Running -> Ended`. While running, one task samples frames at a
//! fixed cadence, feeds detections through the alert rules, and counts
//! elapsed seconds. Ending the session writes exactly one `SessionRecord`.

mod controller;
mod descriptor;
mod state;

pub use controller::{SessionConfig, SessionController};
pub use descriptor::{SessionDescriptor, SessionRequest};
pub use state::{LiveStatus, Session, SessionPhase};

use camera_capture::CameraError;
use storage::StorageError;
use thiserror::Error;

/// Session lifecycle errors
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Invalid session details: {0}")]
    Validation(String),

    #[error("Capture device unavailable: {0}")]
    Device(#[from] CameraError),

    #[error("Cannot {action} a session that is {phase}")]
    InvalidState {
        action: &'static str,
        phase: SessionPhase,
    },

    #[error("Session was never started")]
    NotStarted,

    #[error("Failed to persist session record: {0}")]
    Storage(#[from] StorageError),

    #[error("Session task failed: {0}")]
    Task(String),
}
