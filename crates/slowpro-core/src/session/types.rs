use crate::record::RequestRecord;
use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Format of session ids, derived from the capture start time
pub const SESSION_ID_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Identifier of one capture run.
///
/// Ids are local start timestamps, so lexical order is chronological.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn from_start(started_at: DateTime<Local>) -> Self {
        Self(started_at.format(SESSION_ID_FORMAT).to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Session-level metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionInfo {
    pub session_id: SessionId,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl SessionInfo {
    /// Start a new session now
    pub fn start() -> Self {
        let now = Local::now();
        Self {
            session_id: SessionId::from_start(now),
            started_at: now.with_timezone(&Utc),
            ended_at: None,
        }
    }
}

/// The self-describing persisted form of one domain partition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionDocument {
    pub session_id: SessionId,
    pub domain: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub records: Vec<RequestRecord>,
}

/// A serialization of a session partition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionFormat {
    Json,
    Csv,
}

impl SessionFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            SessionFormat::Json => "json",
            SessionFormat::Csv => "csv",
        }
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "json" => Some(SessionFormat::Json),
            "csv" => Some(SessionFormat::Csv),
            _ => None,
        }
    }
}

/// A persisted `domain/sessionId` partition discovered on disk
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PartitionRef {
    pub domain: String,
    pub session_id: SessionId,
    pub json_path: Option<PathBuf>,
    pub csv_path: Option<PathBuf>,
}

impl PartitionRef {
    /// Preferred file for reading: the JSON form when present
    pub fn primary_path(&self) -> Option<&PathBuf> {
        self.json_path.as_ref().or(self.csv_path.as_ref())
    }

    pub fn formats(&self) -> Vec<SessionFormat> {
        let mut formats = Vec::new();
        if self.json_path.is_some() {
            formats.push(SessionFormat::Json);
        }
        if self.csv_path.is_some() {
            formats.push(SessionFormat::Csv);
        }
        formats
    }
}
