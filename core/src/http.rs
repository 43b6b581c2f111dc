//! HTTP transport types and the blocking transport used by the client.
//!
//! # Design
//! Requests and responses are plain data. `Client::build_request` produces an
//! `HttpRequest` and `Client::parse_response` consumes an `HttpResponse`
//! without touching the network. The one blocking call in between goes
//! through the `Transport` trait, so tests can substitute a recording fake
//! and production code uses `UreqTransport`.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ApiError;

/// HTTP method for a request. Only the four verbs the API uses exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    /// Wire name of the method.
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
        }
    }

    /// Whether a JSON body is sent with this method.
    pub fn carries_body(self) -> bool {
        matches!(self, HttpMethod::Post | HttpMethod::Put)
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "get" => Ok(HttpMethod::Get),
            "post" => Ok(HttpMethod::Post),
            "put" => Ok(HttpMethod::Put),
            "delete" => Ok(HttpMethod::Delete),
            _ => Err(ApiError::Configuration(format!("Unsupported HTTP method: {s}"))),
        }
    }
}

/// An HTTP request described as plain data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    /// Absolute URL including the encoded query string.
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

impl HttpRequest {
    /// First header value with the given name, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// An HTTP response described as plain data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

/// Executes one request and returns the raw response.
///
/// Implementations must return non-2xx responses as `Ok` data and reserve
/// `Err` for transport failures, which are reported as `ApiError::Network`.
pub trait Transport {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, ApiError>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, ApiError> {
        (**self).send(request)
    }
}

/// Blocking transport backed by `ureq`.
///
/// A fresh agent is built per call, so no connection is shared between
/// requests. `open_timeout` bounds connection establishment and `timeout`
/// bounds the whole round trip. Redirects are never followed: a 3xx comes
/// back as data, and the credential headers never reach another host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UreqTransport {
    timeout: Duration,
    open_timeout: Duration,
}

impl UreqTransport {
    pub fn new(timeout: Duration, open_timeout: Duration) -> Self {
        Self {
            timeout,
            open_timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn open_timeout(&self) -> Duration {
        self.open_timeout
    }

    fn agent(&self) -> ureq::Agent {
        ureq::Agent::config_builder()
            .http_status_as_error(false)
            .max_redirects(0)
            .timeout_connect(Some(self.open_timeout))
            .timeout_global(Some(self.timeout))
            .build()
            .new_agent()
    }
}

impl Transport for UreqTransport {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, ApiError> {
        let agent = self.agent();
        let url = request.url.as_str();

        let result = match request.method {
            HttpMethod::Get => apply_headers(agent.get(url), &request.headers).call(),
            HttpMethod::Delete => apply_headers(agent.delete(url), &request.headers).call(),
            HttpMethod::Post => {
                let builder = apply_headers(agent.post(url), &request.headers);
                match request.body.as_deref() {
                    Some(body) => builder.send(body.as_bytes()),
                    None => builder.send_empty(),
                }
            }
            HttpMethod::Put => {
                let builder = apply_headers(agent.put(url), &request.headers);
                match request.body.as_deref() {
                    Some(body) => builder.send(body.as_bytes()),
                    None => builder.send_empty(),
                }
            }
        };

        let mut response = result.map_err(network_error)?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.as_str().to_string(), value.to_string()))
            })
            .collect();
        let bytes = response.body_mut().read_to_vec().map_err(network_error)?;

        Ok(HttpResponse {
            status,
            headers,
            body: String::from_utf8_lossy(&bytes).into_owned(),
        })
    }
}

fn apply_headers<B>(
    mut builder: ureq::RequestBuilder<B>,
    headers: &[(String, String)],
) -> ureq::RequestBuilder<B> {
    for (name, value) in headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    builder
}

fn network_error(err: ureq::Error) -> ApiError {
    tracing::warn!(error = %err, "transport failure");
    ApiError::Network(err.to_string())
}
