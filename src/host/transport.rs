//! Transport Layer for the Job Client
//!
//! Abstracts HTTP for testability. Provides:
//! - Transport trait: one request in, one status + body out
//! - MockTransport: routes requests to an in-process MockService
//! - HttpTransport: blocking reqwest client for production

use std::io;
use std::time::Duration;

use pcats_protocol::{Endpoint, FieldValue, MultipartForm, Verb};
use tracing::debug;

use crate::mock::MockService;

/// A request against one logical endpoint
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub endpoint: Endpoint,
    pub headers: Vec<(String, String)>,
    pub form: Option<MultipartForm>,
}

impl HttpRequest {
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            headers: Vec::new(),
            form: None,
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_form(mut self, form: MultipartForm) -> Self {
        self.form = Some(form);
        self
    }

    /// Value of the first header called `name` (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Status code and raw body of a response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// 200 with a JSON-serialized body
    pub fn json<T: serde::Serialize>(value: &T) -> Result<Self, serde_json::Error> {
        Ok(Self::new(200, serde_json::to_vec(value)?))
    }

    /// The service answers 200 and nothing else on success.
    pub fn is_ok(&self) -> bool {
        self.status == 200
    }
}

/// Transport trait for talking to the service
pub trait Transport: Send + Sync {
    /// Execute a request and return the response, whatever its status code
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// Transport errors
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("HTTP error: {0}")]
    Other(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else if e.is_connect() {
            Self::ConnectionFailed(e.to_string())
        } else if e.is_builder() || e.is_request() {
            Self::InvalidRequest(e.to_string())
        } else {
            Self::Other(e.to_string())
        }
    }
}

/// Mock transport for testing - routes directly to an in-process MockService
pub struct MockTransport {
    service: MockService,
}

impl MockTransport {
    /// Create a new mock transport with a fresh mock service
    pub fn new() -> Self {
        Self {
            service: MockService::new(),
        }
    }

    /// Create a mock transport with a pre-configured service
    pub fn with_service(service: MockService) -> Self {
        Self { service }
    }

    /// Get a reference to the underlying mock service for test configuration
    pub fn service(&self) -> &MockService {
        &self.service
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for MockTransport {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        self.service.handle(request)
    }
}

/// HTTP transport configuration
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Service base URL, without trailing slash
    pub base_url: String,
    /// TCP connect timeout
    pub connect_timeout: Duration,
    /// Whole-request timeout (None = wait as long as the server takes)
    pub request_timeout: Option<Duration>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            base_url: pcats_protocol::DEFAULT_BASE_URL.to_string(),
            connect_timeout: Duration::from_secs(30),
            request_timeout: None,
        }
    }
}

/// HTTP transport for production use
///
/// Sends blocking requests with reqwest. Multipart file parts own their file
/// handles, so a handle lives exactly as long as the request that reads it.
pub struct HttpTransport {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl HttpTransport {
    /// Create a new HTTP transport with the given configuration
    pub fn new(config: HttpConfig) -> Result<Self, TransportError> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(concat!("pcats-client/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Absolute URL of an endpoint
    pub fn url(&self, endpoint: &Endpoint) -> String {
        format!("{}{}", self.base_url, endpoint.path())
    }

    /// Build the reqwest multipart body
    fn build_form(form: &MultipartForm) -> Result<reqwest::blocking::multipart::Form, TransportError> {
        let mut multipart = reqwest::blocking::multipart::Form::new();
        for (name, value) in form.fields() {
            multipart = match value {
                FieldValue::Text(text) | FieldValue::FileRef(text) => {
                    multipart.text(name.clone(), text.clone())
                }
                FieldValue::File(path) => multipart.file(name.clone(), path)?,
            };
        }
        Ok(multipart)
    }
}

impl Transport for HttpTransport {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        let url = self.url(&request.endpoint);
        debug!(endpoint = request.endpoint.name(), %url, "sending request");

        let mut builder = match request.endpoint.verb() {
            Verb::Get => self.client.get(&url),
            Verb::Post => self.client.post(&url),
        };

        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        if let Some(ref form) = request.form {
            builder = builder.multipart(Self::build_form(form)?);
        }

        let response = builder.send()?;
        let status = response.status().as_u16();
        let body = response.bytes()?.to_vec();

        debug!(endpoint = request.endpoint.name(), status, bytes = body.len(), "received response");
        Ok(HttpResponse { status, body })
    }
}
