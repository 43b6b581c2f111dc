//! End-to-end tests against the live mock server.
//!
//! # Design
//! Starts the mock server on a random port, then drives the client over real
//! HTTP through `UreqTransport`. Checks authentication headers, JSON bodies,
//! query encoding and status classification together.

use std::time::{Duration, Instant};

use neofin::{ApiError, Client, Config, ErrorKind, HttpMethod, Query};
use serde_json::json;

/// Start the mock server on a background runtime and return its base URL.
fn start_server() -> String {
    let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = std_listener.local_addr().unwrap();
    std_listener.set_nonblocking(true).unwrap();

    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let listener = tokio::net::TcpListener::from_std(std_listener).unwrap();
            mock_server::run(listener).await
        })
        .unwrap();
    });

    format!("http://{addr}")
}

fn client(base_url: &str) -> Client {
    let config = Config::new(mock_server::DEFAULT_API_KEY, mock_server::DEFAULT_SECRET_KEY)
        .with_base_url(base_url)
        .with_timeout(Duration::from_secs(10))
        .with_open_timeout(Duration::from_secs(5));
    Client::new(config).unwrap()
}

#[test]
fn billing_lifecycle() {
    let base_url = start_server();
    let client = client(&base_url);
    let billings = client.billings();

    // Step 1: queue a billing.
    let reply = billings
        .create(&[json!({
            "integration_identifier": "myapp-test-billing-id",
            "amount": 15000,
            "type": "pix",
            "recipients": ["financeiro@exemploempresa.com"]
        })])
        .unwrap();
    assert_eq!(
        reply,
        json!({"message": "Billings successfully queued.", "errors": {}})
    );

    // Step 2: fetch it back.
    let billing = billings.get("myapp-test-billing-id").unwrap();
    assert_eq!(billing["status"], "pending");
    assert_eq!(billing["amount"], 15000);
    let number = billing["billing_number"].as_str().unwrap().to_string();

    // Step 3: update the amount.
    billings.update(&number, &json!({"amount": 12000})).unwrap();
    let billing = billings.get("myapp-test-billing-id").unwrap();
    assert_eq!(billing["amount"], 12000);

    // Step 4: upload the NF and mark as paid.
    billings.upload_nf(&number, "JVBERi0xLjQ=").unwrap();
    billings.mark_as_paid(&number).unwrap();

    // Step 5: a paid billing cannot be cancelled; message comes from errors[0].detail.
    let err = billings.cancel(&number).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Client);
    assert_eq!(err.status(), Some(400));
    assert_eq!(err.message(), "Billing with status 'paid' cannot be cancelled");

    // Step 6: filtered listings.
    let paid = billings.list_by_status("paid", &Query::new()).unwrap();
    assert_eq!(paid["billings"].as_array().unwrap().len(), 1);
    let pending = billings.list_by_status("pending", &Query::new()).unwrap();
    assert!(pending["billings"].as_array().unwrap().is_empty());
    let installments = billings
        .list_by_payment_date("2024-01-01", None, &Query::new())
        .unwrap();
    assert_eq!(installments["installments"].as_array().unwrap().len(), 1);
}

#[test]
fn put_to_unknown_billing_is_not_found() {
    let base_url = start_server();
    let err = client(&base_url)
        .request(
            HttpMethod::Put,
            "/billing/does-not-exist",
            &Query::new(),
            Some(&json!({"amount": 12000})),
        )
        .unwrap_err();

    assert_eq!(
        err,
        ApiError::NotFound {
            message: "Billing not found".to_string(),
            status: 404,
            body: json!({"message": "Billing not found"}),
        }
    );
}

#[test]
fn customers_round_trip() {
    let base_url = start_server();
    let client = client(&base_url);

    client
        .customers()
        .upsert(&[json!({"document": "12345678000199", "name": "Empresa Exemplo Ltda"})])
        .unwrap();
    let customer = client.customers().get("12345678000199").unwrap();
    assert_eq!(customer["name"], "Empresa Exemplo Ltda");

    let err = client.customers().get("00000000000").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(err.message(), "Customer not found");

    let listed = client.customers().list(&Query::new()).unwrap();
    assert_eq!(listed["customers"].as_array().unwrap().len(), 1);
}

#[test]
fn webhook_registration() {
    let base_url = start_server();
    let reply = client(&base_url)
        .webhooks()
        .register("payments/created", "https://example.test/hooks/neofin")
        .unwrap();
    assert_eq!(reply["message"], "Webhook registered.");
}

#[test]
fn wrong_credentials_are_authentication_error() {
    let base_url = start_server();
    let config = Config::new("wrong", "credentials").with_base_url(&base_url);
    let err = Client::new(config)
        .unwrap()
        .billings()
        .list(&Query::new())
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Authentication);
    assert_eq!(err.message(), "Unauthorized");
    assert_eq!(err.status(), Some(401));
}

#[test]
fn plain_text_error_bodies_are_kept_verbatim() {
    let base_url = start_server();
    let client = client(&base_url);

    let err = client
        .request(HttpMethod::Get, "/status/503", &Query::new(), None)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Server);
    assert_eq!(err.message(), "upstream answered 503");
    assert_eq!(err.body(), Some(&json!("upstream answered 503")));

    let err = client
        .request(HttpMethod::Get, "/status/418", &Query::new(), None)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Client);
}

#[test]
fn unreachable_host_is_network_error() {
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let err = client(&format!("http://127.0.0.1:{port}"))
        .billings()
        .list(&Query::new())
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Network);
    assert_eq!(err.status(), None);
}

#[test]
fn redirect_is_returned_unclassified() {
    let base_url = start_server();
    let err = client(&base_url)
        .request(HttpMethod::Get, "/redirect", &Query::new(), None)
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Unclassified);
    assert_eq!(err.status(), Some(302));
    assert_eq!(err.to_string(), "Unhandled HTTP status code: 302 - API Error Status 302");
}

#[test]
fn redirect_to_other_host_does_not_forward_credentials() {
    let base_url = start_server();
    let other = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    other.set_nonblocking(true).unwrap();
    let target = format!("http://{}/x", other.local_addr().unwrap());

    let mut query = Query::new();
    query.insert("to".to_string(), target);
    let err = client(&base_url)
        .request(HttpMethod::Get, "/redirect", &query, None)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unclassified);

    // Nothing ever connected to the redirect target.
    let accepted = other.accept();
    assert!(
        matches!(&accepted, Err(e) if e.kind() == std::io::ErrorKind::WouldBlock),
        "redirect target was contacted: {accepted:?}"
    );
}

#[test]
fn silent_server_times_out_as_network_error() {
    // Bound but never read from: the connection is accepted by the kernel
    // and no response ever arrives.
    let silent = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let base_url = format!("http://{}", silent.local_addr().unwrap());

    let config = Config::new(mock_server::DEFAULT_API_KEY, mock_server::DEFAULT_SECRET_KEY)
        .with_base_url(base_url)
        .with_timeout(Duration::from_millis(200))
        .with_open_timeout(Duration::from_millis(200));
    let client = Client::new(config).unwrap();
    assert_eq!(client.transport().timeout(), Duration::from_millis(200));
    assert_eq!(client.transport().open_timeout(), Duration::from_millis(200));

    let started = Instant::now();
    let err = client.billings().list(&Query::new()).unwrap_err();
    let elapsed = started.elapsed();

    assert_eq!(err.kind(), ErrorKind::Network);
    assert!(elapsed < Duration::from_secs(5), "took {elapsed:?}");
    drop(silent);
}
