//! HTTP transport over reqwest.

use super::{Method, Transport, TransportError};
use async_trait::async_trait;
use serde_json::Value;

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_connect() {
            TransportError::ConnectionFailed(e.to_string())
        } else {
            TransportError::RequestFailed(e.to_string())
        }
    }
}

/// JSON-over-HTTP transport.
///
/// URLs are used as given; pair it with a `StoreConfig` whose `base_url`
/// is absolute.
#[derive(Debug, Clone, Default)]
pub struct HttpTransport {
    http: reqwest::Client,
}

impl HttpTransport {
    /// Create a transport with a default client.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a preconfigured client (headers, timeouts, auth).
    pub fn with_client(http: reqwest::Client) -> Self {
        Self { http }
    }

    async fn send(
        &self,
        method: Method,
        url: &str,
        body: Option<Value>,
    ) -> Result<Value, TransportError> {
        tracing::debug!("{} {}", method, url);

        let request = match method {
            Method::Get => self.http.get(url),
            Method::Post => self.http.post(url),
            Method::Patch => self.http.patch(url),
            Method::Delete => self.http.delete(url),
        };
        let request = match body {
            Some(body) => request.json(&body),
            None => request,
        };

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status {
                method,
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_slice(&bytes).map_err(|e| TransportError::InvalidBody(e.to_string()))
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, url: &str) -> Result<Value, TransportError> {
        self.send(Method::Get, url, None).await
    }

    async fn post(&self, url: &str, body: Value) -> Result<Value, TransportError> {
        self.send(Method::Post, url, Some(body)).await
    }

    async fn patch(&self, url: &str, body: Value) -> Result<Value, TransportError> {
        self.send(Method::Patch, url, Some(body)).await
    }

    async fn delete(&self, url: &str) -> Result<Value, TransportError> {
        self.send(Method::Delete, url, None).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve one canned HTTP response on a local port.
    async fn serve_once(status_line: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }
            let response = format!(
                "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status_line,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
        });

        format!("http://{}", addr)
    }

    // ===========================================
    // HTTP Round Trip Tests
    // ===========================================

    #[tokio::test]
    async fn get_parses_json_body() {
        let base = serve_once("200 OK", r#"{"id":1,"name":"a"}"#).await;
        let transport = HttpTransport::new();

        let body = transport.get(&format!("{}/resource/1", base)).await.unwrap();

        assert_eq!(body, json!({"id": 1, "name": "a"}));
    }

    #[tokio::test]
    async fn empty_body_is_null() {
        let base = serve_once("204 No Content", "").await;
        let transport = HttpTransport::new();

        let body = transport.delete(&format!("{}/resource/1", base)).await.unwrap();

        assert_eq!(body, Value::Null);
    }

    // ===========================================
    // Error Condition Tests
    // ===========================================

    #[tokio::test]
    async fn non_success_status_is_an_error() {
        let base = serve_once("404 Not Found", "{}").await;
        let transport = HttpTransport::new();
        let url = format!("{}/resource/9", base);

        let result = transport.get(&url).await;

        assert_eq!(
            result,
            Err(TransportError::Status {
                method: Method::Get,
                url,
                status: 404,
            })
        );
    }

    #[tokio::test]
    async fn invalid_json_is_an_error() {
        let base = serve_once("200 OK", "not json").await;
        let transport = HttpTransport::new();

        let result = transport.get(&format!("{}/resource", base)).await;

        assert!(matches!(result, Err(TransportError::InvalidBody(_))));
    }

    #[tokio::test]
    async fn unreachable_server_fails() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let transport = HttpTransport::new();

        let result = transport.get(&format!("http://{}/resource", addr)).await;

        assert!(matches!(
            result,
            Err(TransportError::ConnectionFailed(_) | TransportError::RequestFailed(_))
        ));
    }
}
