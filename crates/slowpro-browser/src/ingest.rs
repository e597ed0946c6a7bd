use serde::Deserialize;
use serde_json::Value;
use slowpro_core::event::{EventPayload, NetworkEvent};
use slowpro_core::record::{MonotonicMs, ResourceType};
use slowpro_core::{Error, Result};
use std::collections::HashMap;

pub const REQUEST_WILL_BE_SENT: &str = "Network.requestWillBeSent";
pub const RESPONSE_RECEIVED: &str = "Network.responseReceived";
pub const LOADING_FINISHED: &str = "Network.loadingFinished";
pub const LOADING_FAILED: &str = "Network.loadingFailed";

const NETWORK_SCHEMES: [&str; 4] = ["http", "https", "ws", "wss"];

/// A DevTools protocol notification as it comes off the wire
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawCdpEvent {
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

impl RawCdpEvent {
    pub fn new(method: impl Into<String>, params: Value) -> Self {
        Self {
            method: method.into(),
            params,
        }
    }
}

/// Translate a raw event into a [`NetworkEvent`].
///
/// Irrelevant and malformed events both yield `None`; malformed ones are
/// logged.
pub fn normalize(raw: &RawCdpEvent) -> Option<NetworkEvent> {
    match try_normalize(raw) {
        Ok(event) => event,
        Err(e) => {
            tracing::warn!("Dropping {} event: {}", raw.method, e);
            None
        }
    }
}

/// Like [`normalize`] but surfaces malformed events as
/// [`Error::MalformedEvent`]
pub fn try_normalize(raw: &RawCdpEvent) -> Result<Option<NetworkEvent>> {
    let params = &raw.params;

    let payload = match raw.method.as_str() {
        REQUEST_WILL_BE_SENT => {
            let request = params.get("request").ok_or_else(|| malformed("missing request"))?;
            let url = str_field(request, "url").ok_or_else(|| malformed("missing request.url"))?;
            if !is_network_url(url) {
                tracing::debug!("Ignoring non-network request {}", truncate(url));
                return Ok(None);
            }

            // Chrome reuses the request id for each redirect hop; the
            // correlator keeps the first hop and drops later ones as duplicates.
            if params.get("redirectResponse").is_some() {
                tracing::debug!(
                    "Redirect hop for request {} to {}",
                    str_field(params, "requestId").unwrap_or("?"),
                    truncate(url)
                );
            }

            let resource_type = str_field(params, "type")
                .map(ResourceType::from_devtools)
                .unwrap_or(ResourceType::Other);

            EventPayload::RequestSent {
                url: url.to_string(),
                method: str_field(request, "method").unwrap_or("GET").to_string(),
                resource_type,
                headers: headers(request.get("headers")),
            }
        }
        RESPONSE_RECEIVED => {
            let response = params.get("response").ok_or_else(|| malformed("missing response"))?;
            let status = response
                .get("status")
                .and_then(Value::as_f64)
                .and_then(|s| u16::try_from(s as i64).ok())
                .ok_or_else(|| malformed("missing response.status"))?;

            EventPayload::ResponseReceived {
                status,
                mime_type: str_field(response, "mimeType")
                    .filter(|m| !m.is_empty())
                    .map(str::to_string),
                encoded_length: length_field(response, "encodedDataLength"),
            }
        }
        LOADING_FINISHED => EventPayload::BodyReceived {
            encoded_length: length_field(params, "encodedDataLength"),
        },
        LOADING_FAILED => EventPayload::LoadFailed {
            error_text: str_field(params, "errorText").unwrap_or_default().to_string(),
            canceled: params.get("canceled").and_then(Value::as_bool).unwrap_or(false),
        },
        _ => return Ok(None),
    };

    let request_id = str_field(params, "requestId")
        .filter(|id| !id.is_empty())
        .ok_or_else(|| malformed("missing requestId"))?;
    let timestamp = params
        .get("timestamp")
        .and_then(Value::as_f64)
        .filter(|t| t.is_finite())
        .ok_or_else(|| malformed(format!("request {} has no timestamp", request_id)))?;

    Ok(Some(NetworkEvent {
        request_id: request_id.to_string(),
        timestamp: seconds_to_ms(timestamp),
        payload,
    }))
}

/// CDP monotonic timestamps are seconds
fn seconds_to_ms(seconds: f64) -> MonotonicMs {
    seconds * 1000.0
}

fn is_network_url(url: &str) -> bool {
    url::Url::parse(url)
        .map(|parsed| NETWORK_SCHEMES.contains(&parsed.scheme()))
        .unwrap_or(false)
}

fn str_field<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value.get(key).and_then(Value::as_str)
}

/// CDP reports lengths as doubles; negative means unknown
fn length_field(value: &Value, key: &str) -> Option<u64> {
    value
        .get(key)
        .and_then(Value::as_f64)
        .filter(|len| *len >= 0.0)
        .map(|len| len as u64)
}

fn headers(value: Option<&Value>) -> HashMap<String, String> {
    let Some(Value::Object(map)) = value else {
        return HashMap::new();
    };
    map.iter()
        .map(|(name, value)| {
            let value = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (name.clone(), value)
        })
        .collect()
}

fn truncate(url: &str) -> &str {
    match url.char_indices().nth(80) {
        Some((idx, _)) => &url[..idx],
        None => url,
    }
}

fn malformed(reason: impl Into<String>) -> Error {
    Error::MalformedEvent(reason.into())
}
