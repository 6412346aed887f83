//! HTTP executor gateway client
//!
//! - `GET  {base}/status`  → `{"byK": bool, "byTime": bool, "sumHandle"?: "0x…", "error"?: "…"}`
//! - `POST {base}/execute` `{"decryptedAmount": "…", "minOut": "…"}` → execution result or
//!   `{"error": "…", "code"?: "…", "details"?: "…"}`
//!
//! The gateway reports its own RPC trouble in-band: a 200 status carrying `error`, or a 4xx
//! whose reason is not a ledger revert. Both count as transport failures, as do connection
//! failures, timeouts and 5xx. A 4xx is a rejection only when it names a ledger `code` or
//! carries a revert reason.

use super::client::{ExecutorClient, KeeperError};
use crate::ledger::types::u128_string;
use crate::ledger::{EncryptedHandle, ExecutionResult, LedgerError, Readiness};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    #[serde(rename = "byK")]
    pub by_k: bool,
    pub by_time: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sum_handle: Option<EncryptedHandle>,
    /// Set by the gateway when it could not reach the chain; the flags are then meaningless
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteRequest {
    #[serde(with = "u128_string")]
    pub decrypted_amount: u128,
    #[serde(with = "u128_string")]
    pub min_out: u128,
}

#[derive(Debug, Clone, Deserialize)]
struct ErrorBody {
    error: String,
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    details: Option<String>,
}

const REVERT_PREFIX: &str = "Contract revert: ";

/// Ledger code for a revert reason, or `None` when the reason is not a revert at all
fn revert_code(reason: &str) -> Option<String> {
    let (reason, reverted) = match reason.strip_prefix(REVERT_PREFIX) {
        Some(inner) => (inner, true),
        None => (reason, false),
    };

    let exact = [
        LedgerError::NotReady,
        LedgerError::NoOpenBatch,
        LedgerError::AlreadyInBatch,
        LedgerError::IntentInactive,
        LedgerError::NoActiveIntent,
        LedgerError::Unauthorized,
        LedgerError::UnknownPair,
    ];
    if let Some(err) = exact.iter().find(|e| e.to_string() == reason) {
        return Some(err.code().to_string());
    }
    if reason.starts_with("swap failed") {
        return Some("SwapFailed".to_string());
    }
    if reason.starts_with("invalid proof") {
        return Some("InvalidProof".to_string());
    }

    reverted.then(|| "Reverted".to_string())
}

/// Map an HTTP status and body to the keeper's view of the outcome
pub fn classify_response<T: DeserializeOwned>(status: u16, body: &str) -> Result<T, KeeperError> {
    match status {
        200..=299 => serde_json::from_str(body)
            .map_err(|e| KeeperError::Transport(format!("malformed response: {}", e))),
        400..=499 => match serde_json::from_str::<ErrorBody>(body) {
            Ok(err) => match err.code.or_else(|| revert_code(&err.error)) {
                Some(code) => Err(KeeperError::Rejected { code, reason: err.error }),
                None => Err(KeeperError::Transport(match err.details {
                    Some(details) if details != err.error => {
                        format!("gateway error: {} ({})", err.error, details)
                    }
                    _ => format!("gateway error: {}", err.error),
                })),
            },
            Err(_) => Err(KeeperError::Transport(format!("HTTP {} without error body", status))),
        },
        _ => Err(KeeperError::Transport(format!("HTTP {}", status))),
    }
}

/// Like `classify_response`, but a status reply carrying `error` is a transport failure
pub fn classify_status(status: u16, body: &str) -> Result<StatusResponse, KeeperError> {
    let reply: StatusResponse = classify_response(status, body)?;
    match reply.error {
        Some(error) => Err(KeeperError::Transport(format!("gateway status error: {}", error))),
        None => Ok(reply),
    }
}

pub struct HttpExecutorClient {
    base_url: String,
    client: reqwest::Client,
}

impl HttpExecutorClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, KeeperError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| KeeperError::Transport(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    async fn read(response: reqwest::Response) -> Result<(u16, String), KeeperError> {
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| KeeperError::Transport(e.to_string()))?;
        Ok((status, body))
    }

    async fn status(&self) -> Result<StatusResponse, KeeperError> {
        let response = self
            .client
            .get(format!("{}/status", self.base_url))
            .send()
            .await
            .map_err(|e| KeeperError::Transport(e.to_string()))?;
        let (status, body) = Self::read(response).await?;
        classify_status(status, &body)
    }
}

#[async_trait]
impl ExecutorClient for HttpExecutorClient {
    async fn is_ready(&self) -> Result<Readiness, KeeperError> {
        let status = self.status().await?;
        Ok(Readiness {
            by_count: status.by_k,
            by_time: status.by_time,
        })
    }

    async fn pending_sum(&self) -> Result<Option<EncryptedHandle>, KeeperError> {
        Ok(self.status().await?.sum_handle)
    }

    async fn execute_if_ready(
        &self,
        amount_in: u128,
        min_amount_out: u128,
    ) -> Result<ExecutionResult, KeeperError> {
        let request = ExecuteRequest {
            decrypted_amount: amount_in,
            min_out: min_amount_out,
        };
        let response = self
            .client
            .post(format!("{}/execute", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| KeeperError::Transport(e.to_string()))?;
        let (status, body) = Self::read(response).await?;
        classify_response(status, &body)
    }

    fn describe(&self) -> String {
        self.base_url.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve one canned HTTP response and hand back the raw request
    async fn serve_once(status_line: &'static str, body: &'static str) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                request.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&request).to_string();
                if let Some(header_end) = text.find("\r\n\r\n") {
                    let content_length = text[..header_end]
                        .lines()
                        .find_map(|l| {
                            let lower = l.to_ascii_lowercase();
                            lower.strip_prefix("content-length:").map(|v| v.trim().parse::<usize>().unwrap())
                        })
                        .unwrap_or(0);
                    if request.len() >= header_end + 4 + content_length || n == 0 {
                        break;
                    }
                }
                if n == 0 {
                    break;
                }
            }

            let response = format!(
                "HTTP/1.1 {}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                status_line,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
            String::from_utf8_lossy(&request).to_string()
        });

        (format!("http://{}/api", addr), handle)
    }

    #[test]
    fn test_classify_success_and_rejection() {
        let readiness: StatusResponse = classify_response(200, r#"{"byK":true,"byTime":false}"#).unwrap();
        assert!(readiness.by_k);
        assert_eq!(readiness.sum_handle, None);

        let rejected = classify_response::<ExecutionResult>(400, r#"{"error":"not ready","code":"NotReady"}"#);
        assert_eq!(
            rejected,
            Err(KeeperError::Rejected { code: "NotReady".to_string(), reason: "not ready".to_string() })
        );

        let no_code = classify_response::<ExecutionResult>(409, r#"{"error":"no open batch"}"#);
        assert!(matches!(no_code, Err(KeeperError::Rejected { ref code, .. }) if code == "NoOpenBatch"));

        let reverted = classify_response::<ExecutionResult>(
            400,
            r#"{"error":"Contract revert: not ready","details":"execution reverted"}"#,
        );
        assert!(matches!(reverted, Err(KeeperError::Rejected { ref code, .. }) if code == "NotReady"));

        let slippage = classify_response::<ExecutionResult>(
            400,
            r#"{"error":"Contract revert: swap failed: insufficient output amount (280 < 290)"}"#,
        );
        assert!(matches!(slippage, Err(KeeperError::Rejected { ref code, .. }) if code == "SwapFailed"));

        let foreign = classify_response::<ExecutionResult>(400, r#"{"error":"Contract revert: paused"}"#);
        assert!(matches!(foreign, Err(KeeperError::Rejected { ref code, .. }) if code == "Reverted"));
    }

    #[test]
    fn test_gateway_rpc_errors_are_transport() {
        let status = classify_status(200, r#"{"byK":false,"byTime":false,"error":"connect ECONNREFUSED"}"#);
        assert!(matches!(status, Err(KeeperError::Transport(ref msg)) if msg.contains("ECONNREFUSED")));

        let healthy = classify_status(200, r#"{"byK":true,"byTime":false}"#).unwrap();
        assert!(healthy.by_k);
        assert_eq!(healthy.error, None);

        let timeout = classify_response::<ExecutionResult>(
            400,
            r#"{"error":"network timeout","details":"request timed out after 30000ms"}"#,
        );
        assert!(matches!(timeout, Err(KeeperError::Transport(ref msg)) if msg.contains("network timeout")));

        let unconfigured = classify_response::<ExecutionResult>(400, r#"{"error":"RPC URL not configured"}"#);
        assert!(unconfigured.unwrap_err().is_transport());
    }

    #[test]
    fn test_classify_transport_failures() {
        assert!(classify_response::<StatusResponse>(502, "Bad Gateway").unwrap_err().is_transport());
        assert!(classify_response::<StatusResponse>(404, "<html>").unwrap_err().is_transport());
        assert!(classify_response::<StatusResponse>(200, "not json").unwrap_err().is_transport());
    }

    #[test]
    fn test_execute_request_wire_format() {
        let request = ExecuteRequest {
            decrypted_amount: 1_000_000_000_000_000_000,
            min_out: 0,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["decryptedAmount"], "1000000000000000000");
        assert_eq!(json["minOut"], "0");
    }

    #[tokio::test]
    async fn test_status_over_http() {
        let (base, server) = serve_once("200 OK", r#"{"byK":false,"byTime":true}"#).await;
        let client = HttpExecutorClient::new(&base, Duration::from_secs(5)).unwrap();

        let readiness = client.is_ready().await.unwrap();
        assert_eq!(readiness, Readiness { by_count: false, by_time: true });

        let request = server.await.unwrap();
        assert!(request.starts_with("GET /api/status"));
    }

    #[tokio::test]
    async fn test_execute_over_http() {
        let (base, server) = serve_once(
            "200 OK",
            r#"{"count":3,"amountIn":"300","amountOut":"300","fee":"0"}"#,
        )
        .await;
        let client = HttpExecutorClient::new(&base, Duration::from_secs(5)).unwrap();

        let result = client.execute_if_ready(300, 290).await.unwrap();
        assert_eq!(result, ExecutionResult { count: 3, amount_in: 300, amount_out: 300, fee: 0 });

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /api/execute"));
        assert!(request.contains(r#""decryptedAmount":"300""#));
    }

    #[tokio::test]
    async fn test_status_error_over_http_is_transport() {
        let (base, server) = serve_once(
            "200 OK",
            r#"{"block":0,"byK":false,"byTime":false,"error":"RPC URL not configured"}"#,
        )
        .await;
        let client = HttpExecutorClient::new(&base, Duration::from_secs(5)).unwrap();

        assert!(client.is_ready().await.unwrap_err().is_transport());
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_connection_refused_is_transport() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = HttpExecutorClient::new(&format!("http://{}", addr), Duration::from_secs(2)).unwrap();
        assert!(client.is_ready().await.unwrap_err().is_transport());
    }
}
