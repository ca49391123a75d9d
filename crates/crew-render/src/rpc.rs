//! JSON-RPC 2.0 client for remote-rendered nodes.
//!
//! The remote side exposes a single method, `Render(url, params)`, whose
//! result is the page body as a string.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::Deserialize;
use serde_json::{Value, json};
use thiserror::Error;

/// A boxed future that is Send.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

const RENDER_METHOD: &str = "Render";
const TIMEOUT_SECONDS: u64 = 30;

/// Errors from a remote render call.
#[derive(Debug, Error)]
pub enum RpcError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("endpoint answered HTTP {status}")]
    Status { status: u16 },

    #[error("malformed response: {message}")]
    Protocol { message: String },

    #[error("remote error {code}: {message}")]
    Remote { code: i64, message: String },

    #[error("result is not a string (got {found})")]
    ResultType { found: &'static str },
}

/// Something that can render a page remotely.
pub trait RemoteRender: Send + Sync {
    fn render<'a>(
        &'a self,
        endpoint: &'a str,
        url: &'a str,
        params: &'a HashMap<String, String>,
    ) -> BoxFuture<'a, Result<String, RpcError>>;
}

/// JSON-RPC over HTTP POST.
#[derive(Debug)]
pub struct JsonRpcRenderer {
    client: reqwest::Client,
    next_id: AtomicU64,
}

impl JsonRpcRenderer {
    pub fn new() -> Result<Self, RpcError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(TIMEOUT_SECONDS))
            .build()?;
        Ok(Self::with_client(client))
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self {
            client,
            next_id: AtomicU64::new(1),
        }
    }
}

impl RemoteRender for JsonRpcRenderer {
    fn render<'a>(
        &'a self,
        endpoint: &'a str,
        url: &'a str,
        params: &'a HashMap<String, String>,
    ) -> BoxFuture<'a, Result<String, RpcError>> {
        Box::pin(async move {
            let id = self.next_id.fetch_add(1, Ordering::Relaxed);
            let request = json!({
                "jsonrpc": "2.0",
                "method": RENDER_METHOD,
                "params": [url, params],
                "id": id,
            });

            tracing::debug!(endpoint, url, id, "remote render");
            let response = self.client.post(endpoint).json(&request).send().await?;
            let status = response.status();
            let body: Value = response.json().await.map_err(|e| {
                if status.is_success() {
                    RpcError::Protocol {
                        message: e.to_string(),
                    }
                } else {
                    RpcError::Status {
                        status: status.as_u16(),
                    }
                }
            })?;
            parse_response(body)
        })
    }
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RemoteFault>,
}

#[derive(Debug, Deserialize)]
struct RemoteFault {
    code: i64,
    message: String,
}

/// Extract the string result from a JSON-RPC response object.
pub fn parse_response(body: Value) -> Result<String, RpcError> {
    let envelope: Envelope = serde_json::from_value(body).map_err(|e| RpcError::Protocol {
        message: e.to_string(),
    })?;

    if let Some(fault) = envelope.error {
        return Err(RpcError::Remote {
            code: fault.code,
            message: fault.message,
        });
    }
    match envelope.result {
        Some(Value::String(s)) => Ok(s),
        Some(other) => Err(RpcError::ResultType {
            found: type_name(&other),
        }),
        None => Err(RpcError::Protocol {
            message: "neither result nor error present".into(),
        }),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_result() {
        let body = json!({"jsonrpc": "2.0", "result": "<h1>Hello</h1>", "id": 1});
        assert_eq!(parse_response(body).unwrap(), "<h1>Hello</h1>");
    }

    #[test]
    fn test_remote_error() {
        let body = json!({"jsonrpc": "2.0", "error": {"code": -32601, "message": "Method not found"}, "id": 1});
        assert!(matches!(
            parse_response(body).unwrap_err(),
            RpcError::Remote { code: -32601, .. }
        ));
    }

    #[test]
    fn test_non_string_result() {
        let body = json!({"jsonrpc": "2.0", "result": {"html": "x"}, "id": 1});
        assert!(matches!(
            parse_response(body).unwrap_err(),
            RpcError::ResultType { found: "object" }
        ));
    }

    #[test]
    fn test_empty_envelope() {
        let body = json!({"jsonrpc": "2.0", "id": 1});
        assert!(matches!(parse_response(body).unwrap_err(), RpcError::Protocol { .. }));
    }
}
