use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Malformed network event: {0}")]
    MalformedEvent(String),

    #[error("Invalid session state: {0}")]
    InvalidState(String),

    #[error("No session data found: {0}")]
    NotFound(String),

    #[error("Corrupt session data in {}: {reason}", path.display())]
    CorruptData { path: PathBuf, reason: String },

    #[error("Failed to write session {session_id}: {source}")]
    SessionWrite {
        session_id: String,
        #[source]
        source: Box<Error>,
    },

    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),
}

impl Error {
    pub(crate) fn corrupt(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Error::CorruptData {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
