use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use bytes::Bytes;
use intruder_core::ParsedRequest;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_LENGTH};

use crate::ErrorCategory;

#[derive(Debug, Clone)]
pub struct DispatchSettings {
    pub request_timeout: Duration,
    /// Scheme used for origin-form targets resolved through the `Host` header.
    pub default_scheme: String,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(90),
            default_scheme: "http".to_string(),
        }
    }
}

/// A response as received from the target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpExchange {
    pub status: u16,
    pub reason: String,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchError {
    pub category: ErrorCategory,
    pub message: String,
}

impl DispatchError {
    pub fn new(category: ErrorCategory, message: impl Into<String>) -> Self {
        Self {
            category,
            message: message.into(),
        }
    }
}

/// Sends one generated request. Exactly one attempt, no retries.
#[async_trait::async_trait]
pub trait Dispatcher: Send + Sync {
    async fn dispatch(&self, request: &ParsedRequest) -> Result<HttpExchange, DispatchError>;
}

/// Renders a response into displayable raw text.
pub trait ResponseFormatter: Send + Sync {
    fn format(&self, exchange: &HttpExchange) -> String;
}

/// Status line, headers, blank line, body. Bodies that are not UTF-8 are
/// wrapped as `<BINARY_DATA>base64</BINARY_DATA>`.
#[derive(Debug, Default, Clone, Copy)]
pub struct RawResponseFormatter;

impl ResponseFormatter for RawResponseFormatter {
    fn format(&self, exchange: &HttpExchange) -> String {
        let mut text = format!("HTTP/1.1 {} {}\n", exchange.status, exchange.reason);
        for (name, value) in &exchange.headers {
            text.push_str(name);
            text.push_str(": ");
            text.push_str(value);
            text.push('\n');
        }
        text.push('\n');
        match std::str::from_utf8(&exchange.body) {
            Ok(body) => text.push_str(body),
            Err(_) => {
                text.push_str("<BINARY_DATA>");
                text.push_str(&STANDARD.encode(&exchange.body));
                text.push_str("</BINARY_DATA>");
            }
        }
        text
    }
}

/// Live dispatcher. Redirects are not followed and certificate checks are
/// off: targets are testing endpoints under the operator's control.
#[derive(Debug, Clone)]
pub struct ReqwestDispatcher {
    client: reqwest::Client,
    settings: DispatchSettings,
}

impl ReqwestDispatcher {
    pub fn new(settings: DispatchSettings) -> Result<Self, DispatchError> {
        let client = reqwest::Client::builder()
            .timeout(settings.request_timeout)
            .redirect(reqwest::redirect::Policy::none())
            .danger_accept_invalid_certs(true)
            .build()
            .map_err(|err| DispatchError::new(ErrorCategory::Unclassified, err.to_string()))?;
        Ok(Self { client, settings })
    }

    fn build_headers(request: &ParsedRequest) -> Result<HeaderMap, DispatchError> {
        let mut headers = HeaderMap::new();
        for (name, value) in &request.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|err| DispatchError::new(ErrorCategory::Unclassified, err.to_string()))?;
            // The body is re-sized by substitution; the client computes its own length.
            if name == CONTENT_LENGTH {
                continue;
            }
            let value = HeaderValue::from_str(value)
                .map_err(|err| DispatchError::new(ErrorCategory::Unclassified, err.to_string()))?;
            headers.insert(name, value);
        }
        Ok(headers)
    }
}

#[async_trait::async_trait]
impl Dispatcher for ReqwestDispatcher {
    async fn dispatch(&self, request: &ParsedRequest) -> Result<HttpExchange, DispatchError> {
        let url = request
            .target_url(&self.settings.default_scheme)
            .map_err(|err| DispatchError::new(ErrorCategory::Url, err.to_string()))?;
        let method = reqwest::Method::from_bytes(request.method.as_bytes())
            .map_err(|err| DispatchError::new(ErrorCategory::Unclassified, err.to_string()))?;
        let headers = Self::build_headers(request)?;

        let mut builder = self.client.request(method, url).headers(headers);
        if !request.body.is_empty() {
            builder = builder.body(request.body.clone());
        }

        let response = builder.send().await.map_err(map_reqwest_error)?;
        let status = response.status();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();
        let body = response.bytes().await.map_err(map_reqwest_error)?;

        Ok(HttpExchange {
            status: status.as_u16(),
            reason: status.canonical_reason().unwrap_or_default().to_string(),
            headers,
            body,
        })
    }
}

fn map_reqwest_error(err: reqwest::Error) -> DispatchError {
    let category = if err.is_timeout() {
        ErrorCategory::Timeout
    } else if err.is_connect() {
        ErrorCategory::Connection
    } else if err.is_builder() {
        ErrorCategory::Url
    } else if err.is_redirect() || err.is_status() || err.is_request() || err.is_body() || err.is_decode()
    {
        ErrorCategory::Http
    } else {
        ErrorCategory::Unclassified
    };
    DispatchError::new(category, err.to_string())
}
