//! JSON-RPC client with bounded fixed-delay retry.
//!
//! Every API response is one of two envelopes:
//! `{"result": {"data": ..., "total": N}}` or `{"error": {"message": ...}}`.
//! Error envelopes are transient: the call is retried and, once attempts run
//! out, degrades to `Ok(None)`. Anything else is a protocol change and fails
//! immediately.

use std::cell::Cell;
use std::thread;

use serde::Serialize;
use serde_json::Value;

use crate::config::{RetryPolicy, API_HEADERS, JSONRPC_VERSION};
use crate::error::{HarvesterError, Result};
use crate::http::Transport;

/// Longest body excerpt kept in a protocol error.
const PROTOCOL_EXCERPT_CHARS: usize = 200;

#[derive(Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'a str,
    method: &'a str,
    params: &'a Value,
    id: String,
}

/// Payload of a success envelope.
#[derive(Debug, Clone, PartialEq)]
pub struct RpcData {
    /// `result.data`.
    pub data: Value,

    /// `result.total`, when the method reports one.
    pub total: Option<u64>,
}

impl RpcData {
    /// `data` as an array, or an empty slice for any other shape.
    #[must_use]
    pub fn items(&self) -> &[Value] {
        self.data.as_array().map(Vec::as_slice).unwrap_or(&[])
    }
}

#[derive(Debug, PartialEq)]
enum Envelope {
    Success(RpcData),
    Failure(String),
}

fn excerpt(body: &str) -> String {
    body.chars().take(PROTOCOL_EXCERPT_CHARS).collect()
}

/// `total` arrives as a number or as a numeric string.
fn parse_total(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn parse_envelope(method: &str, body: &str) -> Result<Envelope> {
    let protocol = || HarvesterError::Protocol {
        method: method.to_string(),
        body: excerpt(body),
    };

    let value: Value = serde_json::from_str(body).map_err(|_| protocol())?;

    if let Some(result) = value.get("result") {
        if let Some(data) = result.get("data") {
            return Ok(Envelope::Success(RpcData {
                data: data.clone(),
                total: result.get("total").and_then(parse_total),
            }));
        }
    }

    if let Some(message) = value.get("error").and_then(|e| e.get("message")) {
        let message = match message {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        return Ok(Envelope::Failure(message));
    }

    Err(protocol())
}

/// One logical call per invocation; no knowledge of pagination.
pub struct RpcClient<T> {
    transport: T,
    url: String,
    retry: RetryPolicy,
    next_id: Cell<u64>,
}

impl<T: Transport> RpcClient<T> {
    pub fn new(transport: T, url: impl Into<String>, retry: RetryPolicy) -> Self {
        Self {
            transport,
            url: url.into(),
            retry,
            next_id: Cell::new(1),
        }
    }

    /// Perform `method` with `params`.
    ///
    /// # Returns
    /// * `Ok(Some(data))` on a success envelope
    /// * `Ok(None)` when every attempt got an error envelope
    /// * `Err(_)` on transport failure or an unrecognized envelope
    pub fn call(&self, method: &str, params: &Value) -> Result<Option<RpcData>> {
        let id = self.next_id.get();
        self.next_id.set(id + 1);

        let body = serde_json::to_string(&RpcRequest {
            jsonrpc: JSONRPC_VERSION,
            method,
            params,
            id: id.to_string(),
        })?;

        let max_attempts = self.retry.max_attempts;
        for attempt in 1..=max_attempts {
            let response = self.transport.post(&self.url, API_HEADERS, &body)?;

            match parse_envelope(method, &response)? {
                Envelope::Success(data) => return Ok(Some(data)),
                Envelope::Failure(message) => {
                    tracing::warn!(method, attempt, max_attempts, %message, "API returned error");
                    if attempt < max_attempts && !self.retry.delay.is_zero() {
                        thread::sleep(self.retry.delay);
                    }
                }
            }
        }

        tracing::error!(method, max_attempts, "giving up, returning empty result");
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::mock::ScriptedTransport;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn client(transport: &ScriptedTransport) -> RpcClient<&ScriptedTransport> {
        RpcClient::new(transport, "http://api.test/", RetryPolicy::immediate(5))
    }

    #[test]
    fn test_success_envelope() {
        let transport = ScriptedTransport::new();
        transport.respond(json!({"result": {"data": [{"id": 1}], "total": "7"}}));

        let data = client(&transport).call("m", &json!({})).unwrap().unwrap();
        assert_eq!(data.items().len(), 1);
        assert_eq!(data.total, Some(7));
    }

    #[test]
    fn test_request_shape() {
        let transport = ScriptedTransport::new();
        transport.respond(json!({"result": {"data": []}}));

        client(&transport)
            .call("bankGeo/getObjectsByFilter", &json!({"limit": 25}))
            .unwrap();

        let bodies = transport.json_bodies();
        assert_eq!(bodies[0]["jsonrpc"], "2.0");
        assert_eq!(bodies[0]["method"], "bankGeo/getObjectsByFilter");
        assert_eq!(bodies[0]["params"]["limit"], 25);
        assert!(bodies[0]["id"].is_string());
        assert_eq!(transport.urls(), vec!["http://api.test/".to_string()]);
    }

    #[test]
    fn test_error_then_success_retries() {
        let transport = ScriptedTransport::new();
        transport
            .respond(json!({"error": {"message": "Too many requests"}}))
            .respond(json!({"result": {"data": {"id": 3}}}));

        let data = client(&transport).call("m", &json!({})).unwrap();
        assert_eq!(data.map(|d| d.data), Some(json!({"id": 3})));
        assert_eq!(transport.call_count(), 2);
    }

    #[test]
    fn test_exhaustion_degrades_to_empty() {
        let transport = ScriptedTransport::new();
        for _ in 0..5 {
            transport.respond(json!({"error": {"message": "busy"}}));
        }

        let data = client(&transport).call("m", &json!({})).unwrap();
        assert_eq!(data, None);
        assert_eq!(transport.call_count(), 5);
    }

    #[test]
    fn test_malformed_envelope_is_fatal() {
        let transport = ScriptedTransport::new();
        transport.respond(json!({"result": {"items": []}}));

        let err = client(&transport).call("m", &json!({})).unwrap_err();
        assert!(matches!(err, HarvesterError::Protocol { .. }));
        assert_eq!(transport.call_count(), 1);
    }

    #[test]
    fn test_non_json_body_is_protocol_error() {
        let transport = ScriptedTransport::new();
        transport.respond_raw("<html>502 Bad Gateway</html>");

        let err = client(&transport).call("m", &json!({})).unwrap_err();
        match err {
            HarvesterError::Protocol { method, body } => {
                assert_eq!(method, "m");
                assert!(body.contains("502"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_transport_failure_propagates() {
        let transport = ScriptedTransport::new();
        transport.fail(HarvesterError::Connection {
            url: "http://api.test/".into(),
            message: "refused".into(),
        });

        let err = client(&transport).call("m", &json!({})).unwrap_err();
        assert!(err.is_connection());
    }

    #[test]
    fn test_ids_increment() {
        let transport = ScriptedTransport::new();
        transport
            .respond(json!({"result": {"data": []}}))
            .respond(json!({"result": {"data": []}}));
        let client = client(&transport);
        client.call("a", &json!({})).unwrap();
        client.call("b", &json!({})).unwrap();
        let bodies = transport.json_bodies();
        assert_ne!(bodies[0]["id"], bodies[1]["id"]);
    }
}
