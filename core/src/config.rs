//! Client configuration: credentials, environment and timeouts.
//!
//! # Design
//! `Config` is a plain value. It is built once, optionally adjusted through
//! explicit setters or a typed `ConfigOverrides` merge, and then handed to
//! `Client::new`, which takes ownership. There is no process-wide default;
//! `ClientFactory` is an ordinary value the application owns and passes
//! around.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::client::Client;
use crate::error::ApiError;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_OPEN_TIMEOUT: Duration = Duration::from_secs(30);

pub const ENV_API_KEY: &str = "NEOFIN_API_KEY";
pub const ENV_SECRET_KEY: &str = "NEOFIN_SECRET_KEY";
pub const ENV_ENVIRONMENT: &str = "NEOFIN_ENVIRONMENT";
pub const ENV_TIMEOUT: &str = "NEOFIN_TIMEOUT";
pub const ENV_OPEN_TIMEOUT: &str = "NEOFIN_OPEN_TIMEOUT";

/// Deployment target. Each variant is bound to a fixed base endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Sandbox,
    Production,
}

impl Environment {
    pub const ALL: [Environment; 2] = [Environment::Sandbox, Environment::Production];

    pub fn name(self) -> &'static str {
        match self {
            Environment::Sandbox => "sandbox",
            Environment::Production => "production",
        }
    }

    pub fn base_url(self) -> &'static str {
        match self {
            Environment::Sandbox => "https://api.sandbox.neofin.services/",
            Environment::Production => "https://api.neofin.services/",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Environment {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Environment::ALL
            .into_iter()
            .find(|env| env.name().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| {
                let valid: Vec<&str> = Environment::ALL.iter().map(|env| env.name()).collect();
                ApiError::Configuration(format!(
                    "Invalid environment: {s}. Valid environments are: {}",
                    valid.join(", ")
                ))
            })
    }
}

/// Settings for one client.
#[derive(Clone, PartialEq, Eq)]
pub struct Config {
    api_key: String,
    secret_key: String,
    environment: Environment,
    base_url: String,
    timeout: Duration,
    open_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        let environment = Environment::default();
        Self {
            api_key: String::new(),
            secret_key: String::new(),
            environment,
            base_url: environment.base_url().to_string(),
            timeout: DEFAULT_TIMEOUT,
            open_timeout: DEFAULT_OPEN_TIMEOUT,
        }
    }
}

// Credentials stay out of logs and panic messages.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("api_key", &redact(&self.api_key))
            .field("secret_key", &redact(&self.secret_key))
            .field("environment", &self.environment)
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .field("open_timeout", &self.open_timeout)
            .finish()
    }
}

fn redact(value: &str) -> &'static str {
    if value.is_empty() {
        "<empty>"
    } else {
        "<redacted>"
    }
}

impl Config {
    pub fn new(api_key: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            secret_key: secret_key.into(),
            ..Self::default()
        }
    }

    /// Read settings from `NEOFIN_*` process environment variables.
    pub fn from_env() -> Result<Self, ApiError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read settings through `lookup`, keeping defaults for absent keys.
    ///
    /// Timeouts are whole seconds. Unparseable values are configuration
    /// errors; credentials are not validated until a client is built.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ApiError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(api_key) = lookup(ENV_API_KEY) {
            config.api_key = api_key;
        }
        if let Some(secret_key) = lookup(ENV_SECRET_KEY) {
            config.secret_key = secret_key;
        }
        if let Some(environment) = lookup(ENV_ENVIRONMENT) {
            config.set_environment_name(&environment)?;
        }
        if let Some(raw) = lookup(ENV_TIMEOUT) {
            config.timeout = parse_seconds(ENV_TIMEOUT, &raw)?;
        }
        if let Some(raw) = lookup(ENV_OPEN_TIMEOUT) {
            config.open_timeout = parse_seconds(ENV_OPEN_TIMEOUT, &raw)?;
        }
        Ok(config)
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn secret_key(&self) -> &str {
        &self.secret_key
    }

    pub fn environment(&self) -> Environment {
        self.environment
    }

    /// Base endpoint every request path is resolved against.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn open_timeout(&self) -> Duration {
        self.open_timeout
    }

    pub fn set_api_key(&mut self, api_key: impl Into<String>) {
        self.api_key = api_key.into();
    }

    pub fn set_secret_key(&mut self, secret_key: impl Into<String>) {
        self.secret_key = secret_key.into();
    }

    /// Switch environment and re-derive the base URL from it.
    ///
    /// Any custom base URL set with `with_base_url` is discarded.
    pub fn set_environment(&mut self, environment: Environment) {
        self.environment = environment;
        self.base_url = environment.base_url().to_string();
    }

    /// Like `set_environment`, parsing the name first. On error the
    /// configuration is left untouched.
    pub fn set_environment_name(&mut self, name: &str) -> Result<(), ApiError> {
        let environment = name.parse()?;
        self.set_environment(environment);
        Ok(())
    }

    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    pub fn set_open_timeout(&mut self, open_timeout: Duration) {
        self.open_timeout = open_timeout;
    }

    pub fn with_environment(mut self, environment: Environment) -> Self {
        self.set_environment(environment);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_open_timeout(mut self, open_timeout: Duration) -> Self {
        self.open_timeout = open_timeout;
        self
    }

    /// Point the client at a different host, e.g. a local mock server.
    /// The environment keeps its value.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Copy of `self` with every field set in `overrides` replaced.
    pub fn merged(&self, overrides: &ConfigOverrides) -> Self {
        let mut config = self.clone();
        if let Some(api_key) = &overrides.api_key {
            config.api_key.clone_from(api_key);
        }
        if let Some(secret_key) = &overrides.secret_key {
            config.secret_key.clone_from(secret_key);
        }
        if let Some(environment) = overrides.environment {
            config.set_environment(environment);
        }
        if let Some(timeout) = overrides.timeout {
            config.timeout = timeout;
        }
        if let Some(open_timeout) = overrides.open_timeout {
            config.open_timeout = open_timeout;
        }
        config
    }

    /// Fails when either credential is empty or cannot be sent as an HTTP
    /// header value.
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.api_key.is_empty() {
            return Err(ApiError::Configuration("API Key is missing.".to_string()));
        }
        if self.secret_key.is_empty() {
            return Err(ApiError::Configuration("Secret Key is missing.".to_string()));
        }
        check_header_value("API Key", &self.api_key)?;
        check_header_value("Secret Key", &self.secret_key)
    }
}

/// Control characters other than tab would split or corrupt the header line.
fn check_header_value(name: &str, value: &str) -> Result<(), ApiError> {
    if value.bytes().any(|b| (b < 0x20 && b != b'\t') || b == 0x7f) {
        return Err(ApiError::Configuration(format!(
            "{name} contains characters not allowed in an HTTP header."
        )));
    }
    Ok(())
}

fn parse_seconds(key: &str, raw: &str) -> Result<Duration, ApiError> {
    raw.trim()
        .parse::<u64>()
        .map(Duration::from_secs)
        .map_err(|e| ApiError::Configuration(format!("{key} must be a whole number of seconds: {e}")))
}

/// Per-client overrides applied on top of a base `Config`.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ConfigOverrides {
    pub api_key: Option<String>,
    pub secret_key: Option<String>,
    pub environment: Option<Environment>,
    pub timeout: Option<Duration>,
    pub open_timeout: Option<Duration>,
}

impl fmt::Debug for ConfigOverrides {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigOverrides")
            .field("api_key", &self.api_key.as_deref().map(redact))
            .field("secret_key", &self.secret_key.as_deref().map(redact))
            .field("environment", &self.environment)
            .field("timeout", &self.timeout)
            .field("open_timeout", &self.open_timeout)
            .finish()
    }
}

impl ConfigOverrides {
    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn secret_key(mut self, secret_key: impl Into<String>) -> Self {
        self.secret_key = Some(secret_key.into());
        self
    }

    pub fn environment(mut self, environment: Environment) -> Self {
        self.environment = Some(environment);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn open_timeout(mut self, open_timeout: Duration) -> Self {
        self.open_timeout = Some(open_timeout);
        self
    }
}

/// Owns the default `Config` an application hands out to new clients.
#[derive(Debug, Clone, Default)]
pub struct ClientFactory {
    config: Config,
}

impl ClientFactory {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Adjust the held configuration in place.
    pub fn configure<F>(&mut self, f: F)
    where
        F: FnOnce(&mut Config),
    {
        f(&mut self.config);
    }

    /// Discard the held configuration and start over from defaults.
    pub fn reset(&mut self) {
        self.config = Config::default();
    }

    /// Build a client from a copy of the held configuration with
    /// `overrides` applied. The held configuration is not modified.
    pub fn client(&self, overrides: &ConfigOverrides) -> Result<Client, ApiError> {
        Client::new(self.config.merged(overrides))
    }
}
