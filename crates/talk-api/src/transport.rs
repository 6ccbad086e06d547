//! HTTP transport.
//!
//! [`TransportClient`] is the seam between the protocol code and the network.
//! [`HttpTransport`] implements it with reqwest; tests substitute scripted
//! clients.

use crate::{ApiResponse, TransportResult};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::fmt;
use std::time::Duration;
use talk_config_and_utils::ApiConfig;
use tracing::debug;
use url::Url;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// How body fields are put on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyEncoding {
    Json,
    /// `application/x-www-form-urlencoded`; object and array values are
    /// JSON-encoded into a single field.
    Form,
}

impl BodyEncoding {
    pub fn content_type(self) -> &'static str {
        match self {
            Self::Json => "application/json",
            Self::Form => "application/x-www-form-urlencoded",
        }
    }
}

/// One outgoing POST request.
#[derive(Clone)]
pub struct ApiRequest {
    pub url: String,
    pub encoding: BodyEncoding,
    pub body: Map<String, Value>,
    /// Caller headers; they replace baseline headers of the same name.
    pub headers: Vec<(String, String)>,
    pub accept_gzip: bool,
}

impl ApiRequest {
    pub fn post(url: impl Into<String>, encoding: BodyEncoding) -> Self {
        Self {
            url: url.into(),
            encoding,
            body: Map::new(),
            headers: Vec::new(),
            accept_gzip: false,
        }
    }

    pub fn field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.body.insert(key.into(), value.into());
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn gzip(mut self) -> Self {
        self.accept_gzip = true;
        self
    }

    /// Header value by case-insensitive name.
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .rev()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Encode the body fields.
    pub fn encode_body(&self) -> TransportResult<String> {
        match self.encoding {
            BodyEncoding::Json => Ok(serde_json::to_string(&self.body)?),
            BodyEncoding::Form => {
                let mut serializer = url::form_urlencoded::Serializer::new(String::new());
                for (key, value) in &self.body {
                    serializer.append_pair(key, &form_value(value)?);
                }
                Ok(serializer.finish())
            }
        }
    }
}

// Field names only; bodies and headers can carry credentials.
impl fmt::Debug for ApiRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiRequest")
            .field("url", &redact_query(&self.url))
            .field("encoding", &self.encoding)
            .field("fields", &self.body.keys().collect::<Vec<_>>())
            .field(
                "headers",
                &self.headers.iter().map(|(k, _)| k).collect::<Vec<_>>(),
            )
            .field("accept_gzip", &self.accept_gzip)
            .finish()
    }
}

fn redact_query(url: &str) -> &str {
    url.split('?').next().unwrap_or(url)
}

fn form_value(value: &Value) -> TransportResult<String> {
    Ok(match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(_) | Value::Object(_) => serde_json::to_string(value)?,
    })
}

/// Headers every request starts from.
pub fn baseline_headers(config: &ApiConfig, encoding: BodyEncoding) -> Vec<(String, String)> {
    vec![
        ("User-Agent".to_string(), config.user_agent()),
        ("A".to_string(), config.platform_tag()),
        ("Content-Type".to_string(), encoding.content_type().to_string()),
    ]
}

/// Overlay `overrides` on `baseline`, matching names case-insensitively.
pub fn merge_headers(
    baseline: Vec<(String, String)>,
    overrides: &[(String, String)],
) -> Vec<(String, String)> {
    let mut merged = baseline;
    for (name, value) in overrides {
        merged.retain(|(existing, _)| !existing.eq_ignore_ascii_case(name));
        merged.push((name.clone(), value.clone()));
    }
    merged
}

/// Executes a single request. Implementations do not retry.
#[async_trait]
pub trait TransportClient: Send + Sync {
    /// Send `request` and decode the body. Non-2xx statuses are not errors.
    async fn execute(&self, request: ApiRequest) -> TransportResult<ApiResponse>;
}

/// reqwest-backed transport.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    config: ApiConfig,
}

impl HttpTransport {
    pub fn new(config: ApiConfig) -> TransportResult<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self { client, config })
    }

    /// Final header list for `request`.
    pub fn headers_for(&self, request: &ApiRequest) -> Vec<(String, String)> {
        let mut overrides = request.headers.clone();
        if request.accept_gzip && request.header_value("Accept-Encoding").is_none() {
            overrides.push(("Accept-Encoding".to_string(), "gzip".to_string()));
        }
        merge_headers(baseline_headers(&self.config, request.encoding), &overrides)
    }
}

#[async_trait]
impl TransportClient for HttpTransport {
    async fn execute(&self, request: ApiRequest) -> TransportResult<ApiResponse> {
        let url = Url::parse(&request.url)?;
        let headers = self.headers_for(&request);

        let mut builder = self.client.post(url.clone()).body(request.encode_body()?);
        for (name, value) in &headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder.send().await?;
        let http_status = response.status().as_u16();
        let text = response.text().await?;
        let decoded = ApiResponse::from_body(&text);

        debug!(
            endpoint = %redact_query(url.as_str()),
            http_status,
            summary = %decoded.summary(),
            "request completed"
        );
        Ok(decoded)
    }
}
