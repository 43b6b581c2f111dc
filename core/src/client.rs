//! Authenticated request pipeline for the Neofin API.
//!
//! # Design
//! `Client` owns an immutable `Config` and a `Transport`. A call is split
//! into three steps: `build_request` (URL, headers, JSON body), one blocking
//! `Transport::send`, and `parse_response` (lenient JSON parse followed by
//! status classification). `build_request` and `parse_response` are pure,
//! so they are tested without a network.

use std::collections::BTreeMap;

use serde_json::Value;
use url::Url;

use crate::config::Config;
use crate::error::{classify, ApiError};
use crate::http::{HttpMethod, HttpRequest, HttpResponse, Transport, UreqTransport};
use crate::resources::{Billings, Customers, Webhooks};
use crate::USER_AGENT;

/// Query parameters. Order is irrelevant to the API; the map keeps the
/// encoded query string deterministic.
pub type Query = BTreeMap<String, String>;

pub const API_KEY_HEADER: &str = "api-key";
pub const SECRET_KEY_HEADER: &str = "secret-key";

/// Blocking client for the Neofin API.
#[derive(Debug, Clone)]
pub struct Client<T = UreqTransport> {
    config: Config,
    transport: T,
}

impl Client<UreqTransport> {
    /// Build a client that talks HTTP through `ureq`, using the configured
    /// timeouts. Fails if either credential is empty.
    pub fn new(config: Config) -> Result<Self, ApiError> {
        let transport = UreqTransport::new(config.timeout(), config.open_timeout());
        Self::with_transport(config, transport)
    }
}

impl<T: Transport> Client<T> {
    /// Build a client on a custom transport. Fails if either credential is
    /// empty.
    pub fn with_transport(config: Config, transport: T) -> Result<Self, ApiError> {
        config.validate()?;
        Ok(Self { config, transport })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn billings(&self) -> Billings<'_, T> {
        Billings::new(self)
    }

    pub fn customers(&self) -> Customers<'_, T> {
        Customers::new(self)
    }

    pub fn webhooks(&self) -> Webhooks<'_, T> {
        Webhooks::new(self)
    }

    /// Execute one API call and classify the response.
    ///
    /// Returns the parsed body on 2xx (an empty object when the body is
    /// empty). Non-2xx statuses come back as the matching `ApiError`
    /// variant, transport failures as `ApiError::Network`.
    pub fn request(
        &self,
        method: HttpMethod,
        path: &str,
        query: &Query,
        body: Option<&Value>,
    ) -> Result<Value, ApiError> {
        let request = self.build_request(method, path, query, body)?;
        tracing::debug!(method = %request.method, url = %request.url, "sending request");
        let response = self.transport.send(&request)?;
        tracing::debug!(status = response.status, url = %request.url, "received response");
        self.parse_response(response)
    }

    /// Same as `request`, with the method given by name. Unknown names fail
    /// with a configuration error before anything is sent.
    pub fn request_named(
        &self,
        method: &str,
        path: &str,
        query: &Query,
        body: Option<&Value>,
    ) -> Result<Value, ApiError> {
        self.request(method.parse()?, path, query, body)
    }

    /// Resolve the URL and attach authentication headers and the JSON body.
    ///
    /// The body is only serialized for POST and PUT; it is dropped for GET
    /// and DELETE.
    pub fn build_request(
        &self,
        method: HttpMethod,
        path: &str,
        query: &Query,
        body: Option<&Value>,
    ) -> Result<HttpRequest, ApiError> {
        let url = self.resolve_url(path, query)?;

        let mut headers = vec![
            (API_KEY_HEADER.to_string(), self.config.api_key().to_string()),
            (SECRET_KEY_HEADER.to_string(), self.config.secret_key().to_string()),
            ("accept".to_string(), "application/json".to_string()),
            ("user-agent".to_string(), USER_AGENT.to_string()),
        ];

        let body = match body {
            Some(value) if method.carries_body() => {
                let json = serde_json::to_string(value)
                    .map_err(|e| ApiError::Configuration(format!("request body is not valid JSON: {e}")))?;
                headers.push(("content-type".to_string(), "application/json".to_string()));
                Some(json)
            }
            _ => None,
        };

        Ok(HttpRequest {
            method,
            url: url.to_string(),
            headers,
            body,
        })
    }

    /// Parse the body leniently and classify by status.
    ///
    /// An empty body parses to `Null`. A body that is not JSON is kept as a
    /// JSON string so upstream error pages never fail the caller.
    pub fn parse_response(&self, response: HttpResponse) -> Result<Value, ApiError> {
        let body = parse_body(&response.body, response.status);
        classify(response.status, body)
    }

    fn resolve_url(&self, path: &str, query: &Query) -> Result<Url, ApiError> {
        let mut url = Url::parse(self.config.base_url()).map_err(|e| {
            ApiError::Configuration(format!("invalid base URL '{}': {e}", self.config.base_url()))
        })?;
        url.set_path(path);
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query.iter());
        }
        Ok(url)
    }
}

fn parse_body(raw: &str, status: u16) -> Value {
    if raw.is_empty() {
        return Value::Null;
    }
    match serde_json::from_str(raw) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(status, error = %e, "response body is not JSON, keeping raw text");
            Value::String(raw.to_string())
        }
    }
}
