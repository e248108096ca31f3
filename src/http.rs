//! HTTP access to the gateway.
//!
//! Two layers:
//! - [`Transport`]: pure exchange. Every HTTP status comes back as data; only
//!   a missing response is an error.
//! - [`ApiClient`]: attaches the bearer credential, classifies failures into
//!   [`ApiError`] and, in [`ApiClient::execute`], sends the client to the
//!   login route on authentication failure.

use crate::error::ApiError;
use crate::navigation::Route;
use crate::session::SessionContext;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Patch,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }
}

/// A request relative to the gateway base URL
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl HttpRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::Delete, path)
    }

    pub fn post<B: Serialize>(path: impl Into<String>, body: &B) -> Result<Self, ApiError> {
        Self::new(Method::Post, path).with_body(body)
    }

    pub fn patch<B: Serialize>(path: impl Into<String>, body: &B) -> Result<Self, ApiError> {
        Self::new(Method::Patch, path).with_body(body)
    }

    fn with_body<B: Serialize>(mut self, body: &B) -> Result<Self, ApiError> {
        let value = serde_json::to_value(body).map_err(|e| ApiError::Decode(e.to_string()))?;
        self.body = Some(value);
        Ok(self)
    }

    pub fn with_query(mut self, pairs: Vec<(String, String)>) -> Self {
        self.query = pairs;
        self
    }

    /// First header value with this name, compared case-insensitively
    #[cfg(test)]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        serde_json::from_str(&self.body).map_err(|e| ApiError::Decode(e.to_string()))
    }
}

/// No response was received (refused, DNS, timeout, broken body).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct TransportError(pub String);

/// Trait for transports to allow mocking and abstraction
pub trait Transport: Send + Sync {
    fn send(&self, base_url: &str, request: &HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// Join the base URL and a relative path with exactly one slash.
pub fn join_url(base_url: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

pub struct UreqTransport {
    agent: ureq::Agent,
}

impl UreqTransport {
    pub fn new(timeout: Duration) -> Self {
        Self {
            agent: ureq::AgentBuilder::new().timeout(timeout).build(),
        }
    }
}

impl Transport for UreqTransport {
    fn send(&self, base_url: &str, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        let url = join_url(base_url, &request.path);

        let mut req = self.agent.request(request.method.as_str(), &url);
        for (key, value) in &request.query {
            req = req.query(key, value);
        }
        for (name, value) in &request.headers {
            req = req.set(name, value);
        }

        let resp = match &request.body {
            Some(body) => req
                .set("Content-Type", "application/json")
                .send_json(body.clone()),
            None => req.call(),
        };

        match resp {
            Ok(r) => {
                let status = r.status();
                let body = r
                    .into_string()
                    .map_err(|e| TransportError(format!("Failed to read body: {}", e)))?;
                Ok(HttpResponse { status, body })
            }
            Err(ureq::Error::Status(code, r)) => {
                let body = r.into_string().unwrap_or_default();
                Ok(HttpResponse { status: code, body })
            }
            Err(ureq::Error::Transport(t)) => Err(TransportError(t.to_string())),
        }
    }
}

/// The configured client every module calls through.
pub struct ApiClient {
    base_url: String,
    transport: Box<dyn Transport>,
    session: SessionContext,
}

impl ApiClient {
    pub fn new(base_url: &str, transport: Box<dyn Transport>, session: SessionContext) -> Self {
        Self {
            base_url: base_url.to_string(),
            transport,
            session,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    /// Attach the credential, send, classify. Never navigates.
    pub fn dispatch(&self, mut request: HttpRequest) -> Result<HttpResponse, ApiError> {
        let token = self.session.access_token();
        if let Some(token) = &token {
            request
                .headers
                .push(("Authorization".to_string(), format!("Bearer {}", token)));
        }

        let method = request.method.as_str();
        tracing::debug!(method, path = %request.path, authenticated = token.is_some(), "request");
        self.session
            .record(|j| j.request(method, &request.path, token.is_some()));

        let started = Instant::now();
        match self.transport.send(&self.base_url, &request) {
            Ok(response) => {
                let duration_ms = started.elapsed().as_millis() as u64;
                tracing::debug!(method, path = %request.path, status = response.status, duration_ms, "response");
                self.session
                    .record(|j| j.response(method, &request.path, response.status, duration_ms));
                if response.is_success() {
                    Ok(response)
                } else {
                    Err(ApiError::classify(response.status, &response.body))
                }
            }
            Err(e) => {
                tracing::debug!(method, path = %request.path, "network error: {}", e);
                self.session
                    .record(|j| j.network_error(method, &request.path, &e.0));
                Err(ApiError::Network(e.0))
            }
        }
    }

    /// [`dispatch`](Self::dispatch), then redirect to login on 401.
    /// The failure is always returned to the caller.
    pub fn execute(&self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
        let result = self.dispatch(request);
        if let Err(err) = &result {
            if err.is_unauthorized() {
                tracing::warn!("authentication failed, redirecting to {}", Route::Login);
                self.session.navigate(Route::Login);
            }
        }
        result
    }

    pub fn fetch_json<T: DeserializeOwned>(&self, request: HttpRequest) -> Result<T, ApiError> {
        self.execute(request)?.json()
    }

    /// For endpoints whose success body is ignored
    pub fn send_unit(&self, request: HttpRequest) -> Result<(), ApiError> {
        self.execute(request).map(|_| ())
    }
}
