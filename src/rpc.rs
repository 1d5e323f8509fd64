//! JSON-RPC client
//!
//! Thin wrapper over reqwest that turns every failure mode into a tagged
//! outcome instead of an error. Callers race each call against an explicit
//! timeout; a call that misses its deadline is abandoned and reported as
//! `Timeout` (the underlying request may still complete, its result is
//! discarded).

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// A single JSON-RPC 2.0 request
#[derive(Debug, Clone, Serialize)]
pub struct RpcRequest {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: String,
    pub params: Value,
}

impl RpcRequest {
    pub fn new(id: u64, method: impl Into<String>, params: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            method: method.into(),
            params,
        }
    }
}

/// A single JSON-RPC 2.0 response
#[derive(Debug, Clone, Deserialize)]
pub struct RpcResponse {
    #[serde(default)]
    pub id: Option<u64>,

    #[serde(default)]
    pub result: Option<Value>,

    #[serde(default)]
    pub error: Option<Value>,
}

/// Tagged outcome of one RPC call
///
/// Replaces throw/catch-style handling: the caller always gets a value and
/// decides what a failure means for the candidate at hand.
#[derive(Debug, Clone)]
pub enum CallOutcome<T> {
    /// Response arrived in time and parsed
    Ok(T),

    /// Deadline elapsed before a response arrived
    Timeout,

    /// Connection, HTTP or payload-shape failure
    Failed(String),
}

/// JSON-RPC client shared by all probes of a run
///
/// reqwest clients pool connections internally; cloning is cheap.
#[derive(Debug, Clone)]
pub struct RpcClient {
    http: reqwest::Client,
}

impl RpcClient {
    pub fn new() -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .pool_max_idle_per_host(4)
            .build()?;
        Ok(Self { http })
    }

    /// Issue a single call, racing the response against `timeout`
    pub async fn call(
        &self,
        url: &str,
        method: &str,
        params: Value,
        timeout: Duration,
    ) -> CallOutcome<RpcResponse> {
        let request = RpcRequest::new(1, method, params);

        let send = async {
            let response = self
                .http
                .post(url)
                .json(&request)
                .send()
                .await
                .map_err(|e| e.to_string())?;
            response
                .json::<RpcResponse>()
                .await
                .map_err(|e| e.to_string())
        };

        match tokio::time::timeout(timeout, send).await {
            Ok(Ok(response)) => CallOutcome::Ok(response),
            Ok(Err(e)) => {
                debug!("RPC call {} to {} failed: {}", method, url, e);
                CallOutcome::Failed(e)
            }
            Err(_) => CallOutcome::Timeout,
        }
    }

    /// Plain GET returning a JSON body, for non-RPC directory listings
    pub async fn get_json(&self, url: &str, timeout: Duration) -> CallOutcome<Value> {
        let send = async {
            let response = self.http.get(url).send().await.map_err(|e| e.to_string())?;
            response.json::<Value>().await.map_err(|e| e.to_string())
        };

        match tokio::time::timeout(timeout, send).await {
            Ok(Ok(value)) => CallOutcome::Ok(value),
            Ok(Err(e)) => {
                debug!("GET {} failed: {}", url, e);
                CallOutcome::Failed(e)
            }
            Err(_) => CallOutcome::Timeout,
        }
    }

    /// Issue several calls as one batched request
    ///
    /// Responses come back in arbitrary order; match them to requests by id.
    pub async fn call_batch(
        &self,
        url: &str,
        requests: &[RpcRequest],
        timeout: Duration,
    ) -> CallOutcome<Vec<RpcResponse>> {
        let send = async {
            let response = self
                .http
                .post(url)
                .json(requests)
                .send()
                .await
                .map_err(|e| e.to_string())?;
            response
                .json::<Vec<RpcResponse>>()
                .await
                .map_err(|e| e.to_string())
        };

        match tokio::time::timeout(timeout, send).await {
            Ok(Ok(responses)) => CallOutcome::Ok(responses),
            Ok(Err(e)) => {
                debug!("Batched RPC call to {} failed: {}", url, e);
                CallOutcome::Failed(e)
            }
            Err(_) => CallOutcome::Timeout,
        }
    }
}

/// Find the successful result for a given request id in a batch response
pub fn batch_result(responses: &[RpcResponse], id: u64) -> Option<&Value> {
    responses
        .iter()
        .find(|r| r.id == Some(id))
        .filter(|r| r.error.is_none())
        .and_then(|r| r.result.as_ref())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_wire_shape() {
        let request = RpcRequest::new(1, "eth_blockNumber", json!([]));
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["jsonrpc"], "2.0");
        assert_eq!(value["id"], 1);
        assert_eq!(value["method"], "eth_blockNumber");
        assert_eq!(value["params"], json!([]));
    }

    #[test]
    fn test_response_with_error_payload() {
        let raw = r#"{"jsonrpc":"2.0","id":1,"error":{"code":-32601,"message":"not found"}}"#;
        let response: RpcResponse = serde_json::from_str(raw).unwrap();
        assert!(response.result.is_none());
        assert!(response.error.is_some());
    }

    #[test]
    fn test_batch_result_matches_by_id() {
        let raw = r#"[
            {"jsonrpc":"2.0","id":2,"result":"0x1"},
            {"jsonrpc":"2.0","id":1,"result":"0x10"}
        ]"#;
        let responses: Vec<RpcResponse> = serde_json::from_str(raw).unwrap();

        assert_eq!(batch_result(&responses, 1), Some(&json!("0x10")));
        assert_eq!(batch_result(&responses, 2), Some(&json!("0x1")));
        assert_eq!(batch_result(&responses, 3), None);
    }

    #[test]
    fn test_batch_result_skips_errored_entry() {
        let raw = r#"[{"jsonrpc":"2.0","id":1,"result":"0x10","error":{"code":1}}]"#;
        let responses: Vec<RpcResponse> = serde_json::from_str(raw).unwrap();
        assert_eq!(batch_result(&responses, 1), None);
    }
}
