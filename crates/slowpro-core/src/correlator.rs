use crate::event::{EventPayload, NetworkEvent};
use crate::record::{
    MonotonicMs, RequestId, RequestRecord, ResourceType, domain_of, duration_between,
};
use crate::session::SessionId;
use chrono::Utc;
use std::collections::HashMap;

/// Partial state of an in-flight request
#[derive(Debug, Clone)]
struct PartialRequest {
    url: String,
    method: String,
    resource_type: ResourceType,
    start_time: MonotonicMs,
    status_code: Option<u16>,
    mime_type: Option<String>,
    header_length: Option<u64>,
}

/// Per-request correlation state.
///
/// `Complete` and `Failed` carry no data: the record has already been
/// emitted and only the id is retained so late events can be ignored.
#[derive(Debug, Clone)]
enum RequestState {
    Pending(PartialRequest),
    HeadersReceived(PartialRequest),
    Complete,
    Failed,
}

/// Counters reported at the end of a capture session
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CorrelatorStats {
    pub completed: usize,
    pub failed: usize,
    pub abandoned: usize,
    pub ignored_duplicates: usize,
    pub ignored_unknown: usize,
    pub ignored_late: usize,
}

impl CorrelatorStats {
    pub fn emitted(&self) -> usize {
        self.completed + self.failed + self.abandoned
    }
}

/// Assembles normalized network events into request records.
///
/// One correlator serves one capture session. Every request id observed
/// through a `RequestSent` yields exactly one record: either when its
/// completion event arrives or, for requests still open, on [`flush`].
///
/// [`flush`]: RequestCorrelator::flush
pub struct RequestCorrelator {
    session_id: SessionId,
    requests: HashMap<RequestId, RequestState>,
    stats: CorrelatorStats,
}

impl RequestCorrelator {
    pub fn new(session_id: SessionId) -> Self {
        Self {
            session_id,
            requests: HashMap::new(),
            stats: CorrelatorStats::default(),
        }
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    /// Fold one event into the correlation state.
    ///
    /// Returns the finished record when the event completes a request.
    pub fn apply(&mut self, event: NetworkEvent) -> Option<RequestRecord> {
        let NetworkEvent {
            request_id,
            timestamp,
            payload,
        } = event;

        match payload {
            EventPayload::RequestSent {
                url,
                method,
                resource_type,
                ..
            } => {
                if self.requests.contains_key(&request_id) {
                    tracing::debug!("Ignoring duplicate request: {}", request_id);
                    self.stats.ignored_duplicates += 1;
                    return None;
                }
                tracing::debug!("Request: {} {} ({})", method, url, request_id);
                self.requests.insert(
                    request_id,
                    RequestState::Pending(PartialRequest {
                        url,
                        method,
                        resource_type,
                        start_time: timestamp,
                        status_code: None,
                        mime_type: None,
                        header_length: None,
                    }),
                );
                None
            }
            EventPayload::ResponseReceived {
                status,
                mime_type,
                encoded_length,
            } => {
                let Some(state) = self.requests.get_mut(&request_id) else {
                    self.stats.ignored_unknown += 1;
                    return None;
                };
                match state {
                    RequestState::Pending(partial) => {
                        let mut partial = partial.clone();
                        partial.status_code = Some(status);
                        if partial.resource_type == ResourceType::Other
                            && let Some(refined) = mime_type.as_deref().and_then(ResourceType::from_mime)
                        {
                            partial.resource_type = refined;
                        }
                        partial.mime_type = mime_type;
                        partial.header_length = encoded_length;
                        *state = RequestState::HeadersReceived(partial);
                    }
                    _ => {
                        tracing::debug!("Ignoring response for request not pending: {}", request_id);
                        self.stats.ignored_late += 1;
                    }
                }
                None
            }
            EventPayload::BodyReceived { encoded_length } => {
                let partial = self.take_open(&request_id, RequestState::Complete)?;
                self.stats.completed += 1;
                let size = encoded_length.or(partial.header_length);
                Some(self.finish(request_id, partial, Some(timestamp), size, None))
            }
            EventPayload::LoadFailed { error_text, .. } => {
                let mut partial = self.take_open(&request_id, RequestState::Failed)?;
                self.stats.failed += 1;
                partial.status_code = None;
                let error_text = if error_text.is_empty() {
                    "unknown error".to_string()
                } else {
                    error_text
                };
                Some(self.finish(request_id, partial, Some(timestamp), None, Some(error_text)))
            }
        }
    }

    /// Finalize every request still open as abandoned and clear all state.
    ///
    /// Records are returned in start order.
    pub fn flush(&mut self) -> Vec<RequestRecord> {
        let mut open: Vec<(RequestId, PartialRequest)> = self
            .requests
            .drain()
            .filter_map(|(id, state)| match state {
                RequestState::Pending(partial) | RequestState::HeadersReceived(partial) => {
                    Some((id, partial))
                }
                RequestState::Complete | RequestState::Failed => None,
            })
            .collect();

        open.sort_by(|(a_id, a), (b_id, b)| {
            a.start_time
                .total_cmp(&b.start_time)
                .then_with(|| a_id.cmp(b_id))
        });

        if !open.is_empty() {
            tracing::info!("Finalizing {} abandoned requests", open.len());
        }
        self.stats.abandoned += open.len();

        open.into_iter()
            .map(|(id, mut partial)| {
                partial.status_code = None;
                self.finish(id, partial, None, None, None)
            })
            .collect()
    }

    /// Number of requests not yet finalized
    pub fn in_flight(&self) -> usize {
        self.requests
            .values()
            .filter(|state| {
                matches!(
                    state,
                    RequestState::Pending(_) | RequestState::HeadersReceived(_)
                )
            })
            .count()
    }

    pub fn stats(&self) -> &CorrelatorStats {
        &self.stats
    }

    /// Move an open request into a terminal state, returning its partial data
    fn take_open(&mut self, request_id: &str, terminal: RequestState) -> Option<PartialRequest> {
        let Some(state) = self.requests.get_mut(request_id) else {
            self.stats.ignored_unknown += 1;
            return None;
        };
        match std::mem::replace(state, terminal) {
            RequestState::Pending(partial) | RequestState::HeadersReceived(partial) => Some(partial),
            previous => {
                tracing::debug!("Ignoring event for finished request: {}", request_id);
                *state = previous;
                self.stats.ignored_late += 1;
                None
            }
        }
    }

    fn finish(
        &self,
        request_id: RequestId,
        partial: PartialRequest,
        end_time: Option<MonotonicMs>,
        encoded_body_size: Option<u64>,
        error_text: Option<String>,
    ) -> RequestRecord {
        RequestRecord {
            domain: domain_of(&partial.url),
            duration_ms: duration_between(partial.start_time, end_time),
            failed: error_text.is_some(),
            request_id,
            url: partial.url,
            method: partial.method,
            resource_type: partial.resource_type,
            mime_type: partial.mime_type,
            start_time: partial.start_time,
            end_time,
            status_code: partial.status_code,
            encoded_body_size,
            error_text,
            session_id: self.session_id.clone(),
            captured_at: Utc::now(),
        }
    }
}
