//! HTTP GET tool — fetches a URL and returns the status and body text.

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use streambot_core::error::ToolError;
use streambot_core::tool::{Tool, ToolArguments};
use tracing::debug;

const DEFAULT_MAX_CHARS: usize = 4000;
const TIMEOUT_SECS: u64 = 15;

pub struct HttpGetTool {
    client: reqwest::Client,
}

impl HttpGetTool {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(TIMEOUT_SECS))
            .build()
            .unwrap_or_default();
        Self { client }
    }
}

impl Default for HttpGetTool {
    fn default() -> Self {
        Self::new()
    }
}

/// Keep at most `max_chars` characters, marking the cut.
fn truncate_chars(body: &str, max_chars: usize) -> String {
    match body.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}\n...[truncated]", &body[..cut]),
        None => body.to_string(),
    }
}

#[async_trait]
impl Tool for HttpGetTool {
    fn name(&self) -> &str {
        "http_get"
    }

    fn description(&self) -> &str {
        "Fetch a web page or API endpoint with HTTP GET. Returns the status code \
         and the (possibly truncated) response body."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "url": {
                    "type": "string",
                    "description": "The http:// or https:// URL to fetch"
                },
                "max_chars": {
                    "type": "integer",
                    "description": "Maximum body characters to return (default 4000)"
                }
            },
            "required": ["url"]
        })
    }

    async fn execute(&self, arguments: ToolArguments) -> Result<String, ToolError> {
        let url = arguments
            .get("url")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'url' argument".into()))?;

        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(ToolError::InvalidArguments(
                "URL must start with http:// or https://".into(),
            ));
        }

        let max_chars = arguments
            .get("max_chars")
            .and_then(Value::as_u64)
            .map(|n| n as usize)
            .unwrap_or(DEFAULT_MAX_CHARS);

        debug!(url, "Fetching URL");

        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                ToolError::Timeout {
                    tool_name: "http_get".into(),
                    timeout_secs: TIMEOUT_SECS,
                }
            } else {
                ToolError::ExecutionFailed {
                    tool_name: "http_get".into(),
                    reason: e.to_string(),
                }
            }
        })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| ToolError::ExecutionFailed {
            tool_name: "http_get".into(),
            reason: format!("failed to read body: {e}"),
        })?;

        Ok(format!("status: {}\n\n{}", status.as_u16(), truncate_chars(&body, max_chars)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn args(value: Value) -> ToolArguments {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        assert_eq!(truncate_chars("hello", 10), "hello");
        assert_eq!(truncate_chars("你好世界", 2), "你好\n...[truncated]");
    }

    #[tokio::test]
    async fn missing_url_rejected() {
        let err = HttpGetTool::new().execute(ToolArguments::new()).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }

    #[tokio::test]
    async fn non_http_scheme_rejected() {
        let err = HttpGetTool::new()
            .execute(args(serde_json::json!({"url": "file:///etc/passwd"})))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }

    #[tokio::test]
    async fn fetches_local_server() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 2048];
            let _ = socket.read(&mut buf).await.unwrap();
            socket
                .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 11\r\nConnection: close\r\n\r\nhello world")
                .await
                .unwrap();
        });

        let out = HttpGetTool::new()
            .execute(args(serde_json::json!({"url": format!("http://{addr}/"), "max_chars": 5})))
            .await
            .unwrap();
        assert!(out.starts_with("status: 200"));
        assert!(out.contains("hello\n...[truncated]"));
    }

    #[tokio::test]
    async fn unreachable_host_is_execution_failure() {
        // Bind then drop to get a port nobody listens on
        let port = {
            let l = TcpListener::bind("127.0.0.1:0").await.unwrap();
            l.local_addr().unwrap().port()
        };
        let err = HttpGetTool::new()
            .execute(args(serde_json::json!({"url": format!("http://127.0.0.1:{port}/")})))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::ExecutionFailed { .. }));
    }
}
