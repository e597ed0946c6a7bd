use super::ResourceType;
use crate::session::SessionId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

/// Collaborator-assigned identifier correlating all events of one exchange
pub type RequestId = String;

/// Milliseconds on the browser's monotonic clock
pub type MonotonicMs = f64;

/// Domain recorded for URLs without a usable host
pub const UNKNOWN_DOMAIN: &str = "unknown";

/// A single observed network exchange.
///
/// Records are produced by the correlator and are immutable once emitted.
/// Field order is the column order of the tabular session form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestRecord {
    pub request_id: RequestId,
    pub url: String,
    pub domain: String,
    pub method: String,
    pub resource_type: ResourceType,
    pub mime_type: Option<String>,
    pub start_time: MonotonicMs,
    pub end_time: Option<MonotonicMs>,
    pub status_code: Option<u16>,
    pub encoded_body_size: Option<u64>,
    pub duration_ms: Option<f64>,
    pub failed: bool,
    pub error_text: Option<String>,
    pub session_id: SessionId,
    pub captured_at: DateTime<Utc>,
}

/// Terminal state a record was emitted from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestOutcome {
    Complete,
    Failed,
    Abandoned,
}

impl RequestRecord {
    pub fn outcome(&self) -> RequestOutcome {
        if self.failed {
            RequestOutcome::Failed
        } else if self.end_time.is_none() {
            RequestOutcome::Abandoned
        } else {
            RequestOutcome::Complete
        }
    }

    /// HTTP-level error (status >= 400). Independent of transport failure.
    pub fn is_http_error(&self) -> bool {
        self.status_code.is_some_and(|status| status >= 400)
    }

    /// Check the record-level invariants
    pub fn validate(&self) -> Result<(), String> {
        if self.domain.is_empty() {
            return Err(format!("request {} has an empty domain", self.request_id));
        }
        if self.duration_ms != duration_between(self.start_time, self.end_time) {
            return Err(format!(
                "request {} has inconsistent duration {:?} for start={} end={:?}",
                self.request_id, self.duration_ms, self.start_time, self.end_time
            ));
        }
        if self.failed && (self.status_code.is_some() || self.error_text.is_none()) {
            return Err(format!(
                "failed request {} must have no status and an error text",
                self.request_id
            ));
        }
        Ok(())
    }
}

/// Duration between two monotonic instants, clamped at zero
pub fn duration_between(start: MonotonicMs, end: Option<MonotonicMs>) -> Option<f64> {
    end.map(|end| (end - start).max(0.0))
}

/// Derive the partition domain from a URL.
///
/// Scheme-less inputs are treated as `https://`. Falls back to
/// [`UNKNOWN_DOMAIN`] when no host can be extracted, so the result is
/// never empty.
pub fn domain_of(url: &str) -> String {
    let candidate = if url.contains("://") {
        url.to_string()
    } else {
        format!("https://{}", url)
    };

    match Url::parse(&candidate) {
        Ok(parsed) => match parsed.host_str() {
            Some(host) if !host.is_empty() => host.trim_matches(['[', ']']).to_lowercase(),
            _ => UNKNOWN_DOMAIN.to_string(),
        },
        Err(e) => {
            tracing::debug!("Failed to parse URL {}: {}", url, e);
            UNKNOWN_DOMAIN.to_string()
        }
    }
}
