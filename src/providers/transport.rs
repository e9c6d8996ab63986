use crate::core::error::AgoraError;
use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    /// `Value::Null` for GET
    pub body: Value,
}

#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    /// Header names are lowercased
    pub headers: HashMap<String, String>,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_lowercase()).map(|v| v.as_str())
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_str(&self.body)
    }
}

/// Fetch-like transport every adapter sends through.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, AgoraError>;
}

pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self, AgoraError> {
        let client = Client::builder().build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, AgoraError> {
        let mut builder = match request.method {
            HttpMethod::Get => self.client.get(&request.url),
            HttpMethod::Post => self
                .client
                .post(&request.url)
                .header("Content-Type", "application/json")
                .json(&request.body),
        };

        for (key, value) in &request.headers {
            builder = builder.header(key, value);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_lowercase(), v.to_string()))
            })
            .collect();
        let body = response.text().await?;

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

/// Per-adapter request builder: base URL, auth and fixed headers.
#[derive(Clone)]
pub struct HttpClient {
    base_url: String,
    auth_header: Option<(String, String)>,
    extra_headers: HashMap<String, String>,
    transport: Arc<dyn HttpTransport>,
}

impl HttpClient {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        base_url: String,
        auth_header: Option<(String, String)>,
        extra_headers: Option<HashMap<String, String>>,
    ) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            auth_header,
            extra_headers: extra_headers.unwrap_or_default(),
            transport,
        }
    }

    pub fn url(&self, path: &str) -> Result<String, AgoraError> {
        let raw = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        let url = Url::parse(&raw)
            .map_err(|e| AgoraError::Config(format!("Invalid URL '{}': {}", raw, e)))?;
        Ok(url.into())
    }

    fn headers(&self) -> Vec<(String, String)> {
        let mut headers = Vec::with_capacity(self.extra_headers.len() + 1);
        if let Some((key, value)) = &self.auth_header {
            headers.push((key.clone(), value.clone()));
        }
        for (key, value) in &self.extra_headers {
            headers.push((key.clone(), value.clone()));
        }
        headers
    }

    pub async fn post<T: Serialize + ?Sized>(
        &self,
        path: &str,
        payload: &T,
    ) -> Result<HttpResponse, AgoraError> {
        let url = self.url(path)?;
        tracing::debug!(path, "POST {}", self.base_url);
        self.transport
            .send(HttpRequest {
                method: HttpMethod::Post,
                url,
                headers: self.headers(),
                body: serde_json::to_value(payload)?,
            })
            .await
    }

    pub async fn get(&self, path: &str) -> Result<HttpResponse, AgoraError> {
        let url = self.url(path)?;
        tracing::debug!(path, "GET {}", self.base_url);
        self.transport
            .send(HttpRequest {
                method: HttpMethod::Get,
                url,
                headers: self.headers(),
                body: Value::Null,
            })
            .await
    }
}

#[cfg(test)]
pub mod testing {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Scripted transport that records every request it sees.
    #[derive(Default)]
    pub struct MockTransport {
        responses: Mutex<VecDeque<Result<HttpResponse, AgoraError>>>,
        requests: Mutex<Vec<HttpRequest>>,
    }

    impl MockTransport {
        pub fn new() -> Arc<Self> {
            Arc::new(Self::default())
        }

        pub fn push_json(&self, status: u16, body: Value) {
            self.push_response(status, &[], body);
        }

        pub fn push_response(&self, status: u16, headers: &[(&str, &str)], body: Value) {
            self.responses.lock().unwrap().push_back(Ok(HttpResponse {
                status,
                headers: headers
                    .iter()
                    .map(|(k, v)| (k.to_lowercase(), v.to_string()))
                    .collect(),
                body: body.to_string(),
            }));
        }

        pub fn push_error(&self, err: AgoraError) {
            self.responses.lock().unwrap().push_back(Err(err));
        }

        pub fn requests(&self) -> Vec<HttpRequest> {
            self.requests.lock().unwrap().clone()
        }

        pub fn call_count(&self) -> usize {
            self.requests.lock().unwrap().len()
        }

        pub fn last_body(&self) -> Value {
            self.requests
                .lock()
                .unwrap()
                .last()
                .map(|r| r.body.clone())
                .expect("no request was sent")
        }
    }

    #[async_trait]
    impl HttpTransport for MockTransport {
        async fn send(&self, request: HttpRequest) -> Result<HttpResponse, AgoraError> {
            self.requests.lock().unwrap().push(request);
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(AgoraError::Network("no scripted response".into())))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::MockTransport;
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn post_joins_path_and_adds_headers() {
        let transport = MockTransport::new();
        transport.push_json(200, json!({"ok": true}));

        let mut headers = HashMap::new();
        headers.insert("x-extra".to_string(), "1".to_string());
        let client = HttpClient::new(
            transport.clone(),
            "https://example.test/v1/".to_string(),
            Some(("Authorization".to_string(), "Bearer k".to_string())),
            Some(headers),
        );

        let response = client.post("chat", &json!({"a": 1})).await.unwrap();
        assert!(response.is_success());

        let request = &transport.requests()[0];
        assert_eq!(request.method, HttpMethod::Post);
        assert_eq!(request.url, "https://example.test/v1/chat");
        assert!(
            request
                .headers
                .contains(&("Authorization".to_string(), "Bearer k".to_string()))
        );
        assert!(
            request
                .headers
                .contains(&("x-extra".to_string(), "1".to_string()))
        );
        assert_eq!(request.body, json!({"a": 1}));
    }

    #[tokio::test]
    async fn get_sends_no_body() {
        let transport = MockTransport::new();
        transport.push_json(200, json!({"data": []}));
        let client = HttpClient::new(
            transport.clone(),
            "https://example.test/v1".to_string(),
            None,
            None,
        );

        client.get("/models").await.unwrap();
        let request = &transport.requests()[0];
        assert_eq!(request.method, HttpMethod::Get);
        assert_eq!(request.url, "https://example.test/v1/models");
        assert_eq!(request.body, Value::Null);
    }

    #[tokio::test]
    async fn connection_errors_do_not_echo_the_url() {
        let transport = ReqwestTransport::new().unwrap();
        let err = transport
            .send(HttpRequest {
                method: HttpMethod::Post,
                url: "http://127.0.0.1:1/v1beta/models/m:generateContent?key=SUPERSECRETKEY"
                    .to_string(),
                headers: Vec::new(),
                body: json!({}),
            })
            .await
            .unwrap_err();

        assert!(matches!(err, AgoraError::Network(_)));
        assert!(!err.to_string().contains("SUPERSECRETKEY"));
        assert!(!err.to_string().contains("127.0.0.1"));
    }

    #[test]
    fn header_lookup_is_case_insensitive() {
        let mut headers = HashMap::new();
        headers.insert("retry-after".to_string(), "4".to_string());
        let response = HttpResponse {
            status: 429,
            headers,
            body: String::new(),
        };
        assert_eq!(response.header("Retry-After"), Some("4"));
        assert!(!response.is_success());
    }
}
