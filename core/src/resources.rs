//! Per-resource convenience wrappers over `Client::request`.
//!
//! Each wrapper maps its arguments to a method, path, query and body.
//! Argument checks fail with `ApiError::Configuration` before the request is
//! built.

use serde::Serialize;
use serde_json::{json, Value};
use url::Url;

use crate::client::{Client, Query};
use crate::error::ApiError;
use crate::http::{HttpMethod, Transport};

const BILLING_PATH: &str = "/billing";
const CUSTOMER_PATH: &str = "/customer/";
const WEBHOOK_PATH: &str = "/webhook";

fn to_body<B: Serialize + ?Sized>(value: &B) -> Result<Value, ApiError> {
    serde_json::to_value(value)
        .map_err(|e| ApiError::Configuration(format!("request body is not valid JSON: {e}")))
}

fn require_non_empty(name: &str, value: &str) -> Result<(), ApiError> {
    if value.trim().is_empty() {
        return Err(ApiError::Configuration(format!("{name} cannot be empty")));
    }
    Ok(())
}

/// Percent-encode `value` as exactly one path segment, so `/`, `?` and `#`
/// inside an id cannot reach another endpoint. Dot segments are refused
/// outright: URL normalization would resolve them against the parent path.
fn segment(name: &str, value: &str) -> Result<String, ApiError> {
    require_non_empty(name, value)?;
    if value == "." || value == ".." {
        return Err(ApiError::Configuration(format!("{name} cannot be '{value}'")));
    }
    let invalid = || ApiError::Configuration(format!("{name} cannot be used in a URL path"));
    let mut scratch = Url::parse("http://localhost/").map_err(|_| invalid())?;
    scratch
        .path_segments_mut()
        .map_err(|()| invalid())?
        .pop_if_empty()
        .push(value);
    Ok(scratch.path().trim_start_matches('/').to_string())
}

fn with_filter(query: &Query, key: &str, value: &str) -> Query {
    let mut merged = query.clone();
    merged.insert(key.to_string(), value.to_string());
    merged
}

/// `/billing` endpoints.
#[derive(Debug, Clone, Copy)]
pub struct Billings<'a, T> {
    client: &'a Client<T>,
}

impl<'a, T: Transport> Billings<'a, T> {
    pub(crate) fn new(client: &'a Client<T>) -> Self {
        Self { client }
    }

    fn get_request(&self, path: &str, query: &Query) -> Result<Value, ApiError> {
        self.client.request(HttpMethod::Get, path, query, None)
    }

    fn put_request(&self, path: &str, body: &Value) -> Result<Value, ApiError> {
        self.client
            .request(HttpMethod::Put, path, &Query::new(), Some(body))
    }

    /// Queue up to 50 billings. The API acknowledges the batch; it does not
    /// return the created billings.
    pub fn create<B: Serialize>(&self, billings: &[B]) -> Result<Value, ApiError> {
        let body = json!({ "billings": to_body(billings)? });
        self.client
            .request(HttpMethod::Post, BILLING_PATH, &Query::new(), Some(&body))
    }

    pub fn get(&self, integration_identifier: &str) -> Result<Value, ApiError> {
        let id = segment("integration_identifier", integration_identifier)?;
        self.get_request(
            &format!("{BILLING_PATH}/integration/{id}"),
            &Query::new(),
        )
    }

    pub fn update<A: Serialize + ?Sized>(
        &self,
        billing_number: &str,
        attributes: &A,
    ) -> Result<Value, ApiError> {
        let number = segment("billing_number", billing_number)?;
        self.put_request(&format!("{BILLING_PATH}/{number}"), &to_body(attributes)?)
    }

    pub fn mark_as_paid(&self, billing_number: &str) -> Result<Value, ApiError> {
        let number = segment("billing_number", billing_number)?;
        self.put_request(&format!("{BILLING_PATH}/paid/{number}"), &json!({}))
    }

    /// Only pending or overdue billings can be cancelled.
    pub fn cancel(&self, billing_number: &str) -> Result<Value, ApiError> {
        let number = segment("billing_number", billing_number)?;
        self.put_request(&format!("{BILLING_PATH}/cancel/{number}"), &json!({}))
    }

    /// Attach a DANFE PDF, already base64-encoded, to a billing.
    pub fn upload_nf(&self, billing_number: &str, nf_file_base64: &str) -> Result<Value, ApiError> {
        let number = segment("billing_number", billing_number)?;
        self.put_request(
            &format!("{BILLING_PATH}/nfupload/{number}"),
            &json!({ "nf_file": nf_file_base64 }),
        )
    }

    pub fn list(&self, query: &Query) -> Result<Value, ApiError> {
        self.get_request(BILLING_PATH, query)
    }

    pub fn list_by_integration_identifier(
        &self,
        integration_identifier: &str,
        query: &Query,
    ) -> Result<Value, ApiError> {
        self.list(&with_filter(query, "integration_identifier", integration_identifier))
    }

    pub fn list_by_status(&self, status: &str, query: &Query) -> Result<Value, ApiError> {
        self.list(&with_filter(query, "status", status))
    }

    /// Installments paid from `start_paid_at_date` onwards (ISO 8601), up to
    /// `end_paid_at_date` when given.
    pub fn list_by_payment_date(
        &self,
        start_paid_at_date: &str,
        end_paid_at_date: Option<&str>,
        query: &Query,
    ) -> Result<Value, ApiError> {
        require_non_empty("start_paid_at_date", start_paid_at_date)?;
        let mut query = with_filter(query, "start_paid_at_date", start_paid_at_date);
        if let Some(end) = end_paid_at_date {
            query.insert("end_paid_at_date".to_string(), end.to_string());
        }
        self.get_request(&format!("{BILLING_PATH}/installment/by_payment_date"), &query)
    }
}

/// `/customer/` endpoints.
#[derive(Debug, Clone, Copy)]
pub struct Customers<'a, T> {
    client: &'a Client<T>,
}

impl<'a, T: Transport> Customers<'a, T> {
    pub(crate) fn new(client: &'a Client<T>) -> Self {
        Self { client }
    }

    /// Create or update up to 50 customers in one batch.
    pub fn upsert<C: Serialize>(&self, customers: &[C]) -> Result<Value, ApiError> {
        let body = json!({ "customers": to_body(customers)? });
        self.client
            .request(HttpMethod::Post, CUSTOMER_PATH, &Query::new(), Some(&body))
    }

    pub fn get(&self, document_number: &str) -> Result<Value, ApiError> {
        let document = segment("document_number", document_number)?;
        self.client.request(
            HttpMethod::Get,
            &format!("{CUSTOMER_PATH}{document}"),
            &Query::new(),
            None,
        )
    }

    pub fn list(&self, query: &Query) -> Result<Value, ApiError> {
        self.client.request(HttpMethod::Get, CUSTOMER_PATH, query, None)
    }
}

/// `/webhook` registration endpoint.
#[derive(Debug, Clone, Copy)]
pub struct Webhooks<'a, T> {
    client: &'a Client<T>,
}

impl<'a, T: Transport> Webhooks<'a, T> {
    pub(crate) fn new(client: &'a Client<T>) -> Self {
        Self { client }
    }

    /// Subscribe `destination` to `topic` (e.g. `payments/created`).
    pub fn register(&self, topic: &str, destination: &str) -> Result<Value, ApiError> {
        require_non_empty("topic", topic)?;
        if !destination.starts_with("https://") {
            return Err(ApiError::Configuration(
                "Webhook destination URL must use HTTPS".to_string(),
            ));
        }
        let body = json!({ "topic": topic, "destination": destination });
        self.client
            .request(HttpMethod::Post, WEBHOOK_PATH, &Query::new(), Some(&body))
    }
}
