use std::path::PathBuf;

use thiserror::Error;

use crate::models::{PhotoId, PinId};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Pin not found: {0}")]
    PinNotFound(PinId),

    #[error("Photo not found: {0}")]
    PhotoNotFound(PhotoId),

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Corrupt store index: {0}")]
    Corrupt(#[from] serde_json::Error),

    #[error("Store at {} is in use by another process", .0.display())]
    Locked(PathBuf),

    #[error("Store schema version {0} is newer than this build supports")]
    UnsupportedSchema(u32),

    /// The disk tier failed to commit. The store refuses further writes.
    #[error("Fatal store failure: {0}")]
    Fatal(String),

    #[error("Store unavailable after an earlier fatal failure: {0}")]
    Unavailable(String),

    #[error("Store writer has shut down")]
    Closed,
}

impl StoreError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.into(),
            source,
        }
    }

    /// True for failures that mean the backing storage can no longer be trusted.
    pub fn is_fatal(&self) -> bool {
        matches!(self, StoreError::Fatal(_) | StoreError::Unavailable(_))
    }
}
