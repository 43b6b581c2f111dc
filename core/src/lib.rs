//! Blocking client for the Neofin billing API.
//!
//! # Overview
//! Builds authenticated JSON requests, executes them with a single blocking
//! round trip, and classifies responses into a typed `ApiError` taxonomy.
//! Independently, `webhook` verifies HMAC-SHA256 signatures on inbound
//! webhook notifications.
//!
//! # Design
//! - `Client` owns an immutable `Config` and a `Transport`; no state is
//!   shared between calls and nothing is retried or cached.
//! - Each call is `build_request` (pure) → `Transport::send` (blocking) →
//!   `parse_response` (pure), so the I/O boundary is explicit.
//! - Configuration is passed explicitly. `ClientFactory` holds a default
//!   configuration for applications that want one, without a global.
//!
//! ```no_run
//! use neofin::{Client, Config, Environment};
//!
//! let config = Config::new("api-key", "secret-key").with_environment(Environment::Production);
//! let client = Client::new(config)?;
//! let billing = client.billings().get("myapp-billing-1")?;
//! println!("{}", billing["status"]);
//! # Ok::<(), neofin::ApiError>(())
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod resources;
pub mod webhook;

pub use client::{Client, Query};
pub use config::{ClientFactory, Config, ConfigOverrides, Environment};
pub use error::{classify, classify_error, extract_message, ApiError, ErrorKind};
pub use http::{HttpMethod, HttpRequest, HttpResponse, Transport, UreqTransport};
pub use resources::{Billings, Customers, Webhooks};
pub use webhook::{verify, WebhookValidator, SIGNATURE_HEADER};

/// Crate version, as published.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// `User-Agent` sent with every request.
pub const USER_AGENT: &str = concat!("neofin-rust/", env!("CARGO_PKG_VERSION"));
