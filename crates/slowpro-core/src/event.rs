use crate::record::{MonotonicMs, RequestId, ResourceType};
use std::collections::HashMap;

/// Lifecycle stage of a network event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    RequestSent,
    ResponseReceived,
    BodyReceived,
    LoadFailed,
}

/// Kind-specific fields of a normalized event
#[derive(Debug, Clone, PartialEq)]
pub enum EventPayload {
    RequestSent {
        url: String,
        method: String,
        resource_type: ResourceType,
        headers: HashMap<String, String>,
    },
    ResponseReceived {
        status: u16,
        mime_type: Option<String>,
        encoded_length: Option<u64>,
    },
    BodyReceived {
        encoded_length: Option<u64>,
    },
    LoadFailed {
        error_text: String,
        canceled: bool,
    },
}

/// A normalized network lifecycle notification
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkEvent {
    pub request_id: RequestId,
    pub timestamp: MonotonicMs,
    pub payload: EventPayload,
}

impl NetworkEvent {
    pub fn kind(&self) -> EventKind {
        match self.payload {
            EventPayload::RequestSent { .. } => EventKind::RequestSent,
            EventPayload::ResponseReceived { .. } => EventKind::ResponseReceived,
            EventPayload::BodyReceived { .. } => EventKind::BodyReceived,
            EventPayload::LoadFailed { .. } => EventKind::LoadFailed,
        }
    }

    pub fn request_sent(
        request_id: impl Into<RequestId>,
        timestamp: MonotonicMs,
        method: impl Into<String>,
        url: impl Into<String>,
        resource_type: ResourceType,
    ) -> Self {
        Self {
            request_id: request_id.into(),
            timestamp,
            payload: EventPayload::RequestSent {
                url: url.into(),
                method: method.into(),
                resource_type,
                headers: HashMap::new(),
            },
        }
    }

    pub fn response_received(
        request_id: impl Into<RequestId>,
        timestamp: MonotonicMs,
        status: u16,
        mime_type: Option<&str>,
        encoded_length: Option<u64>,
    ) -> Self {
        Self {
            request_id: request_id.into(),
            timestamp,
            payload: EventPayload::ResponseReceived {
                status,
                mime_type: mime_type.map(str::to_string),
                encoded_length,
            },
        }
    }

    pub fn body_received(
        request_id: impl Into<RequestId>,
        timestamp: MonotonicMs,
        encoded_length: Option<u64>,
    ) -> Self {
        Self {
            request_id: request_id.into(),
            timestamp,
            payload: EventPayload::BodyReceived { encoded_length },
        }
    }

    pub fn load_failed(
        request_id: impl Into<RequestId>,
        timestamp: MonotonicMs,
        error_text: impl Into<String>,
    ) -> Self {
        Self {
            request_id: request_id.into(),
            timestamp,
            payload: EventPayload::LoadFailed {
                error_text: error_text.into(),
                canceled: false,
            },
        }
    }
}
