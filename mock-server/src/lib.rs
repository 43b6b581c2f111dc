use std::{collections::HashMap, sync::Arc};

use axum::{
    extract::{Path, Query, Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tokio::{net::TcpListener, sync::RwLock};
use uuid::Uuid;

pub const DEFAULT_API_KEY: &str = "test_api_key";
pub const DEFAULT_SECRET_KEY: &str = "test_secret_key";

fn pending() -> String {
    "pending".to_string()
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Billing {
    #[serde(default)]
    pub billing_number: String,
    pub integration_identifier: String,
    pub amount: i64,
    #[serde(default = "pending")]
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nf_file: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Deserialize)]
pub struct WebhookRegistration {
    pub topic: String,
    pub destination: String,
}

#[derive(Default)]
pub struct Store {
    pub billings: HashMap<String, Billing>,
    pub customers: HashMap<String, Value>,
    pub webhooks: Vec<(String, String)>,
}

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<RwLock<Store>>,
    pub api_key: String,
    pub secret_key: String,
}

type ApiResult = Result<Json<Value>, (StatusCode, Json<Value>)>;

fn reject(status: StatusCode, body: Value) -> (StatusCode, Json<Value>) {
    (status, Json(body))
}

pub fn app() -> Router {
    app_with_credentials(DEFAULT_API_KEY, DEFAULT_SECRET_KEY)
}

pub fn app_with_credentials(api_key: &str, secret_key: &str) -> Router {
    let state = AppState {
        db: Arc::new(RwLock::new(Store::default())),
        api_key: api_key.to_string(),
        secret_key: secret_key.to_string(),
    };
    Router::new()
        .route("/billing", get(list_billings).post(create_billings))
        .route("/billing/integration/{id}", get(get_billing))
        .route("/billing/installment/by_payment_date", get(list_by_payment_date))
        .route("/billing/paid/{number}", put(mark_as_paid))
        .route("/billing/cancel/{number}", put(cancel_billing))
        .route("/billing/nfupload/{number}", put(upload_nf))
        .route("/billing/{number}", put(update_billing))
        .route("/customer/", get(list_customers).post(upsert_customers))
        .route("/customer/{document}", get(get_customer))
        .route("/webhook", post(register_webhook))
        .route("/status/{code}", get(fixed_status))
        .route("/redirect", get(redirect))
        .layer(middleware::from_fn_with_state(state.clone(), require_credentials))
        .with_state(state)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

async fn require_credentials(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let headers = request.headers();
    if header_str(headers, "api-key") != Some(state.api_key.as_str())
        || header_str(headers, "secret-key") != Some(state.secret_key.as_str())
    {
        tracing::info!("rejecting request with bad credentials");
        return reject(StatusCode::UNAUTHORIZED, json!({"message": "Unauthorized"})).into_response();
    }
    next.run(request).await
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

fn billing_not_found() -> (StatusCode, Json<Value>) {
    reject(StatusCode::NOT_FOUND, json!({"message": "Billing not found"}))
}

fn detail(status: StatusCode, detail: String) -> (StatusCode, Json<Value>) {
    reject(status, json!({"errors": [{"detail": detail}]}))
}

async fn create_billings(State(state): State<AppState>, Json(input): Json<Value>) -> ApiResult {
    let Some(items) = input.get("billings").and_then(Value::as_array) else {
        return Err(reject(StatusCode::BAD_REQUEST, json!({"error": "billings must be an array"})));
    };
    let mut parsed = Vec::with_capacity(items.len());
    for item in items {
        let mut billing: Billing = serde_json::from_value(item.clone())
            .map_err(|e| detail(StatusCode::UNPROCESSABLE_ENTITY, e.to_string()))?;
        billing.billing_number = Uuid::new_v4().simple().to_string();
        parsed.push(billing);
    }
    let mut db = state.db.write().await;
    for billing in parsed {
        db.billings.insert(billing.billing_number.clone(), billing);
    }
    Ok(Json(json!({"message": "Billings successfully queued.", "errors": {}})))
}

async fn list_billings(
    State(state): State<AppState>,
    Query(filters): Query<HashMap<String, String>>,
) -> Json<Value> {
    let db = state.db.read().await;
    let billings: Vec<&Billing> = db
        .billings
        .values()
        .filter(|b| filters.get("status").map_or(true, |s| &b.status == s))
        .filter(|b| {
            filters
                .get("integration_identifier")
                .map_or(true, |id| &b.integration_identifier == id)
        })
        .collect();
    Json(json!({ "billings": billings }))
}

async fn get_billing(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult {
    let db = state.db.read().await;
    let found = db
        .billings
        .values()
        .find(|b| b.integration_identifier == id)
        .map(|b| Json(json!(b)));
    found.ok_or_else(billing_not_found)
}

async fn list_by_payment_date(
    State(state): State<AppState>,
    Query(filters): Query<HashMap<String, String>>,
) -> ApiResult {
    if !filters.contains_key("start_paid_at_date") {
        return Err(detail(
            StatusCode::BAD_REQUEST,
            "start_paid_at_date is required".to_string(),
        ));
    }
    let db = state.db.read().await;
    let paid: Vec<&Billing> = db.billings.values().filter(|b| b.status == "paid").collect();
    Ok(Json(json!({ "installments": paid })))
}

async fn update_billing(
    State(state): State<AppState>,
    Path(number): Path<String>,
    Json(attributes): Json<Map<String, Value>>,
) -> ApiResult {
    let mut db = state.db.write().await;
    let billing = db.billings.get_mut(&number).ok_or_else(billing_not_found)?;
    for (key, value) in attributes {
        match key.as_str() {
            "amount" => {
                billing.amount = value.as_i64().ok_or_else(|| {
                    detail(StatusCode::UNPROCESSABLE_ENTITY, "amount must be an integer".to_string())
                })?;
            }
            "billing_number" | "status" => {}
            _ => {
                billing.extra.insert(key, value);
            }
        }
    }
    Ok(Json(json!({"message": "Billing successfully updated."})))
}

async fn mark_as_paid(State(state): State<AppState>, Path(number): Path<String>) -> ApiResult {
    let mut db = state.db.write().await;
    let billing = db.billings.get_mut(&number).ok_or_else(billing_not_found)?;
    billing.status = "paid".to_string();
    Ok(Json(json!({"message": "Billing marked as paid."})))
}

async fn cancel_billing(State(state): State<AppState>, Path(number): Path<String>) -> ApiResult {
    let mut db = state.db.write().await;
    let billing = db.billings.get_mut(&number).ok_or_else(billing_not_found)?;
    if billing.status != "pending" && billing.status != "overdue" {
        return Err(detail(
            StatusCode::BAD_REQUEST,
            format!("Billing with status '{}' cannot be cancelled", billing.status),
        ));
    }
    billing.status = "cancelled".to_string();
    Ok(Json(json!({"message": "Billing cancelled."})))
}

async fn upload_nf(
    State(state): State<AppState>,
    Path(number): Path<String>,
    Json(input): Json<Value>,
) -> ApiResult {
    let Some(nf_file) = input.get("nf_file").and_then(Value::as_str) else {
        return Err(reject(StatusCode::BAD_REQUEST, json!({"error": "nf_file is required"})));
    };
    let mut db = state.db.write().await;
    let billing = db.billings.get_mut(&number).ok_or_else(billing_not_found)?;
    billing.nf_file = Some(nf_file.to_string());
    Ok(Json(json!({"message": "NF uploaded."})))
}

async fn upsert_customers(State(state): State<AppState>, Json(input): Json<Value>) -> ApiResult {
    let Some(items) = input.get("customers").and_then(Value::as_array) else {
        return Err(reject(StatusCode::BAD_REQUEST, json!({"error": "customers must be an array"})));
    };
    let mut db = state.db.write().await;
    for item in items {
        let Some(document) = item.get("document").and_then(Value::as_str) else {
            return Err(detail(StatusCode::UNPROCESSABLE_ENTITY, "document is required".to_string()));
        };
        db.customers.insert(document.to_string(), item.clone());
    }
    Ok(Json(json!({"message": "Customers successfully queued.", "errors": {}})))
}

async fn list_customers(State(state): State<AppState>) -> Json<Value> {
    let db = state.db.read().await;
    let customers: Vec<&Value> = db.customers.values().collect();
    Json(json!({ "customers": customers }))
}

async fn get_customer(State(state): State<AppState>, Path(document): Path<String>) -> ApiResult {
    let db = state.db.read().await;
    let found = db.customers.get(&document).cloned();
    found
        .map(Json)
        .ok_or_else(|| reject(StatusCode::NOT_FOUND, json!({"message": "Customer not found"})))
}

async fn register_webhook(
    State(state): State<AppState>,
    Json(input): Json<WebhookRegistration>,
) -> Json<Value> {
    state.db.write().await.webhooks.push((input.topic, input.destination));
    Json(json!({"message": "Webhook registered."}))
}

/// Answers with the requested status and a plain-text body, for exercising
/// client-side classification of arbitrary codes and non-JSON bodies.
async fn fixed_status(Path(code): Path<u16>) -> Response {
    match StatusCode::from_u16(code) {
        Ok(status) => (status, format!("upstream answered {code}")).into_response(),
        Err(_) => StatusCode::BAD_REQUEST.into_response(),
    }
}

/// Answers 302 pointing at `to` (default `/billing`).
async fn redirect(Query(params): Query<HashMap<String, String>>) -> Response {
    let location = params.get("to").map_or("/billing", String::as_str);
    (StatusCode::FOUND, [(header::LOCATION, location.to_string())]).into_response()
}
