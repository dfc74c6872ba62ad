use crate::config::ScraperConfig;
use crate::utils::snippet;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde_json::Value;
use std::error::Error as StdError;
use std::time::Duration;
use tracing::debug;

/// Max characters of a response body quoted in an error message.
const BODY_SNIPPET_CHARS: usize = 200;

// ── Request / response ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FetchRequest {
    pub method: Method,
    pub url: String,
    pub payload: Option<Value>,
}

impl FetchRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self { method: Method::Get, url: url.into(), payload: None }
    }

    pub fn post_json(url: impl Into<String>, payload: Value) -> Self {
        Self { method: Method::Post, url: url.into(), payload: Some(payload) }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParsedBody {
    Json(Value),
    Text(String),
}

impl ParsedBody {
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            ParsedBody::Json(v) => Some(v),
            ParsedBody::Text(_) => None,
        }
    }

    pub fn into_text(self) -> String {
        match self {
            ParsedBody::Json(v) => v.to_string(),
            ParsedBody::Text(t) => t,
        }
    }
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{}", describe(.status, .message))]
pub struct TransportError {
    pub status: Option<u16>,
    pub message: String,
}

fn describe(status: &Option<u16>, message: &str) -> String {
    match status {
        Some(code) => format!("HTTP {}: {}", code, message),
        None => message.to_string(),
    }
}

/// Text fragments that point at the proxy/gateway rather than the origin.
const PROXY_MARKERS: [&str; 7] = [
    "proxy",
    "tunnel",
    "upstream",
    "gateway",
    "connection reset",
    "econnreset",
    "socket hang up",
];

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self { status: None, message: message.into() }
    }

    pub fn with_status(status: u16, message: impl Into<String>) -> Self {
        Self { status: Some(status), message: message.into() }
    }

    pub fn is_server_error(&self) -> bool {
        matches!(self.status, Some(500..=599))
    }

    pub fn is_proxy_related(&self) -> bool {
        let msg = self.message.to_lowercase();
        PROXY_MARKERS.iter().any(|m| msg.contains(m))
    }

    fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return Self::new(format!("request timed out: {}", error_chain(&err)));
        }
        Self {
            status: err.status().map(|s| s.as_u16()),
            message: error_chain(&err),
        }
    }
}

/// reqwest's Display hides the interesting part (proxy/tunnel failures) in `source()`.
fn error_chain(err: &dyn StdError) -> String {
    let mut msg = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        msg.push_str(": ");
        msg.push_str(&cause.to_string());
        source = cause.source();
    }
    msg
}

// ── Transport seam ────────────────────────────────────────────────────────────

/// One outbound request, no retries.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn fetch(&self, request: &FetchRequest, via_proxy: bool) -> Result<ParsedBody, TransportError>;

    /// Whether a proxy endpoint is configured for this run.
    fn has_proxy(&self) -> bool;
}

// ── reqwest transport ─────────────────────────────────────────────────────────

pub struct HttpClient {
    direct: reqwest::Client,
    proxied: Option<reqwest::Client>,
}

impl HttpClient {
    pub fn new(config: &ScraperConfig) -> Result<Self> {
        let direct = Self::builder(config)
            .no_proxy()
            .build()
            .context("Failed to build HTTP client")?;

        let proxied = match config.proxy_url.as_deref().map(str::trim) {
            Some(proxy_url) if !proxy_url.is_empty() => {
                let proxy = reqwest::Proxy::all(proxy_url)
                    .with_context(|| format!("Invalid proxy URL {}", proxy_url))?;
                Some(
                    Self::builder(config)
                        .proxy(proxy)
                        .build()
                        .context("Failed to build proxied HTTP client")?,
                )
            }
            _ => None,
        };

        Ok(Self { direct, proxied })
    }

    fn builder(config: &ScraperConfig) -> reqwest::ClientBuilder {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/json, text/html;q=0.9, */*;q=0.8"),
        );

        reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .gzip(true)
            // Accept cookies so session-based pages work
            .cookie_store(true)
    }
}

#[async_trait]
impl Transport for HttpClient {
    async fn fetch(&self, request: &FetchRequest, via_proxy: bool) -> Result<ParsedBody, TransportError> {
        let client = match (&self.proxied, via_proxy) {
            (Some(proxied), true) => proxied,
            _ => &self.direct,
        };
        debug!("{:?} {} (proxy: {})", request.method, request.url, via_proxy && self.proxied.is_some());

        let mut builder = match request.method {
            Method::Get => client.get(&request.url),
            Method::Post => client.post(&request.url),
        };
        if let Some(payload) = &request.payload {
            builder = builder.json(payload);
        }

        let resp = builder.send().await.map_err(TransportError::from_reqwest)?;
        let status = resp.status();
        let content_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let body = resp.text().await.map_err(TransportError::from_reqwest)?;

        if !status.is_success() {
            return Err(TransportError::with_status(
                status.as_u16(),
                format!(
                    "{} returned {}: {}",
                    request.url,
                    status,
                    snippet(&body, BODY_SNIPPET_CHARS)
                ),
            ));
        }

        match content_type.as_deref() {
            Some(ct) if ct.to_ascii_lowercase().contains("json") => serde_json::from_str(&body)
                .map(ParsedBody::Json)
                .map_err(|e| {
                    TransportError::with_status(
                        status.as_u16(),
                        format!(
                            "invalid body for content-type {}: {} (body starts: {:?})",
                            ct,
                            e,
                            snippet(&body, BODY_SNIPPET_CHARS)
                        ),
                    )
                }),
            _ => Ok(ParsedBody::Text(body)),
        }
    }

    fn has_proxy(&self) -> bool {
        self.proxied.is_some()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
