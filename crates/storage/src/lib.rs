//! Storage Layer
//!
//! Holds the `exam_sessions` collection: one `SessionRecord` per completed
//! session, append-only, optionally mirrored to a JSON file.

mod record;
mod repository;

pub use record::SessionRecord;
pub use repository::{Repository, COLLECTION};

use thiserror::Error;

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
    #[error("Store lock poisoned: {0}")]
    Lock(String),
}
