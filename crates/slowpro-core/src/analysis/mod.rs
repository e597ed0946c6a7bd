mod aggregate;
mod groups;
mod ranking;

pub use aggregate::{AggregateOptions, Aggregator, DEFAULT_TOP_N};
pub use groups::{median, percentile};

use crate::record::{RequestRecord, ResourceType};
use crate::session::SessionId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Report input: statistics over a set of request records.
///
/// Field names and nesting are consumed by the dashboard renderer and
/// must stay stable. Averages, rates and percentiles are `null` when
/// there is nothing to average.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateStats {
    pub global: GlobalStats,
    pub domains: BTreeMap<String, GroupStats>,
    pub resource_types: BTreeMap<String, GroupStats>,
    pub status_codes: BTreeMap<String, usize>,
    pub slowest_requests: Vec<RequestSummary>,
    pub largest_requests: Vec<RequestSummary>,
    pub failed_requests: Vec<FailedRequest>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalStats {
    pub total_requests: usize,
    pub total_domains: usize,
    pub total_sessions: usize,
    pub completed_requests: usize,
    pub failed_requests: usize,
    pub abandoned_requests: usize,
    pub http_errors: usize,
    pub failure_rate: Option<f64>,
    pub avg_duration_ms: Option<f64>,
    pub min_duration_ms: Option<f64>,
    pub max_duration_ms: Option<f64>,
    pub median_duration_ms: Option<f64>,
    pub duration_percentiles: Option<DurationPercentiles>,
    pub total_bytes: u64,
    pub avg_size_bytes: Option<f64>,
}

/// Statistics for one domain or resource type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupStats {
    pub requests: usize,
    pub failures: usize,
    pub abandoned: usize,
    pub http_errors: usize,
    pub failure_rate: Option<f64>,
    pub avg_duration_ms: Option<f64>,
    pub min_duration_ms: Option<f64>,
    pub max_duration_ms: Option<f64>,
    pub median_duration_ms: Option<f64>,
    pub total_bytes: u64,
}

/// Nearest-rank duration percentiles
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DurationPercentiles {
    pub p50: f64,
    pub p90: f64,
    pub p95: f64,
    pub p99: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestSummary {
    pub request_id: String,
    pub url: String,
    pub domain: String,
    pub method: String,
    pub resource_type: ResourceType,
    pub status_code: Option<u16>,
    pub duration_ms: Option<f64>,
    pub encoded_body_size: Option<u64>,
    pub start_time: f64,
    pub session_id: SessionId,
}

impl From<&RequestRecord> for RequestSummary {
    fn from(record: &RequestRecord) -> Self {
        Self {
            request_id: record.request_id.clone(),
            url: record.url.clone(),
            domain: record.domain.clone(),
            method: record.method.clone(),
            resource_type: record.resource_type,
            status_code: record.status_code,
            duration_ms: record.duration_ms,
            encoded_body_size: record.encoded_body_size,
            start_time: record.start_time,
            session_id: record.session_id.clone(),
        }
    }
}

/// A transport-level failure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedRequest {
    pub request_id: String,
    pub url: String,
    pub domain: String,
    pub method: String,
    pub resource_type: ResourceType,
    pub error_text: String,
    pub start_time: f64,
    pub session_id: SessionId,
}

pub trait Analyzer {
    type Output;

    fn analyze(&self, records: &[RequestRecord]) -> Self::Output;
}
