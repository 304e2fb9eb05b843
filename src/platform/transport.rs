//! HTTP transport collaborator
//!
//! The engine only needs GET and POST with caller-configured timeouts; the
//! trait keeps the network stack replaceable in tests.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use crate::error::UnsigError;

/// Minimal HTTP capability consumed by the cache, resolver, and remote client.
#[async_trait]
pub trait Transport: Send + Sync {
    /// `GET url` returning the status code and body text.
    async fn get(&self, url: &str) -> Result<(u16, String), UnsigError>;

    /// `POST url` with a JSON body and extra headers, returning the status
    /// code and body text.
    async fn post_json(
        &self,
        url: &str,
        headers: &[(String, String)],
        body: String,
    ) -> Result<(u16, String), UnsigError>;
}

/// Default transport backed by a shared `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// Client with default timeouts (5 s connect, 10 s read).
    pub fn new() -> Result<Self, UnsigError> {
        Self::with_timeouts(Duration::from_secs(5), Duration::from_secs(10))
    }

    pub fn with_timeouts(connect: Duration, read: Duration) -> Result<Self, UnsigError> {
        let client = Client::builder()
            .connect_timeout(connect)
            .timeout(read)
            .user_agent("Mozilla/5.0")
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, url: &str) -> Result<(u16, String), UnsigError> {
        let response = self.client.get(url).send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok((status, body))
    }

    async fn post_json(
        &self,
        url: &str,
        headers: &[(String, String)],
        body: String,
    ) -> Result<(u16, String), UnsigError> {
        let mut request = self
            .client
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body);
        for (name, value) in headers {
            request = request.header(name, value);
        }

        let response = request.send().await?;
        let status = response.status().as_u16();
        let text = response.text().await?;
        Ok((status, text))
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_get_returns_status_and_body() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/script.js")
            .with_status(200)
            .with_body("var a=1;")
            .create_async()
            .await;

        let transport = HttpTransport::new().unwrap();
        let (status, body) = transport
            .get(&format!("{}/script.js", server.url()))
            .await
            .unwrap();

        assert_eq!(status, 200);
        assert_eq!(body, "var a=1;");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_get_passes_through_error_status() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/gone.js")
            .with_status(404)
            .create_async()
            .await;

        let transport = HttpTransport::new().unwrap();
        let (status, _) = transport
            .get(&format!("{}/gone.js", server.url()))
            .await
            .unwrap();
        assert_eq!(status, 404);
    }

    #[tokio::test]
    async fn test_post_json_sends_headers_and_body() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/decode")
            .match_header("authorization", "Bearer token123")
            .match_header("content-type", "application/json")
            .match_body(r#"{"k":"v"}"#)
            .with_status(200)
            .with_body(r#"{"ok":true}"#)
            .create_async()
            .await;

        let transport = HttpTransport::new().unwrap();
        let headers = vec![("Authorization".to_string(), "Bearer token123".to_string())];
        let (status, body) = transport
            .post_json(
                &format!("{}/decode", server.url()),
                &headers,
                r#"{"k":"v"}"#.to_string(),
            )
            .await
            .unwrap();

        assert_eq!(status, 200);
        assert_eq!(body, r#"{"ok":true}"#);
        mock.assert_async().await;
    }
}
