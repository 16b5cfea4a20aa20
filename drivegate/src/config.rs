//! Application configuration management.
//!
//! Configuration is loaded from a YAML file with environment variable overrides. The file path
//! defaults to `config.yaml` but can be specified via `-f` or the `DRIVEGATE_CONFIG` environment
//! variable. A missing file is not an error: every field has a default, and the required Google
//! client credentials usually arrive through the environment.
//!
//! ## Loading Priority
//!
//! Sources are merged in the following order (later sources override earlier ones):
//!
//! 1. **YAML config file** - Base configuration (default: `config.yaml`)
//! 2. **Prefixed environment variables** - `DRIVEGATE_` variables, with `__` separating nested
//!    keys (`DRIVEGATE_GOOGLE__TOKEN_URL` sets `google.token_url`)
//! 3. **Deployment variables** - `CLIENT_ID`, `CLIENT_SECRET`, `REDIRECT_URI` and
//!    `REFRESH_TOKEN`, either bare or with a `GOOGLE_` prefix, map onto the `google` section
//!
//! ## Environment Variable Examples
//!
//! ```bash
//! # Google OAuth application credentials
//! GOOGLE_CLIENT_ID="1234.apps.googleusercontent.com"
//! GOOGLE_CLIENT_SECRET="..."
//!
//! # Refresh token copied from the server log after a successful code exchange
//! REFRESH_TOKEN="1//0g..."
//!
//! # Override server port and CORS origin
//! DRIVEGATE_PORT=8080
//! DRIVEGATE_CORS__ALLOWED_ORIGIN="https://app.example.com"
//! ```

use axum::http::HeaderValue;
use clap::Parser;
use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::{Deserialize, Serialize};
use std::{fmt, time::Duration};
use url::Url;

/// Variables accepted without the `DRIVEGATE_` prefix, mapped into the `google` section.
const DEPLOYMENT_VARS: [&str; 4] = ["CLIENT_ID", "CLIENT_SECRET", "REDIRECT_URI", "REFRESH_TOKEN"];

/// The deployed front end. Default redirect target and default CORS origin.
pub const DEFAULT_REDIRECT_URI: &str = "https://monitoring-github-io-rho.vercel.app";

/// Simple CLI args - just for specifying config file
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file
    #[arg(short = 'f', long, env = "DRIVEGATE_CONFIG", default_value = "config.yaml")]
    pub config: String,

    /// Validate configuration and exit without starting the server.
    #[arg(long)]
    pub validate: bool,
}

/// Main application configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// HTTP server host to bind to (e.g., "0.0.0.0" for all interfaces)
    pub host: String,
    /// HTTP server port to bind to
    pub port: u16,
    /// Enable OpenTelemetry OTLP export for distributed tracing
    pub enable_otel_export: bool,
    /// Identity provider and storage API settings
    pub google: GoogleConfig,
    /// CORS headers attached to every response
    pub cors: CorsConfig,
    /// Limits applied to the upload endpoint
    pub uploads: UploadConfig,
}

/// Google OAuth client and Drive API settings.
#[derive(Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct GoogleConfig {
    /// OAuth client id of the Google Cloud application
    pub client_id: String,
    /// OAuth client secret of the Google Cloud application
    pub client_secret: String,
    /// Redirect URI used when a code exchange request doesn't carry one
    pub redirect_uri: String,
    /// Long-lived refresh token of the single authorized account.
    ///
    /// Uploads are rejected with 401 until this is set.
    pub refresh_token: Option<String>,
    /// OAuth token endpoint (code exchange and refresh)
    pub token_url: Url,
    /// Root of the Google APIs the Drive client talks to; uploads go to `upload/drive/v3/files`
    /// below it. Must end with `/`.
    pub drive_root_url: Url,
    /// Timeout applied to every outbound request
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
}

impl fmt::Debug for GoogleConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GoogleConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("redirect_uri", &self.redirect_uri)
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .field("token_url", &self.token_url.as_str())
            .field("drive_root_url", &self.drive_root_url.as_str())
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

/// CORS configuration. A single fixed origin is allowed.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct CorsConfig {
    /// Value of `Access-Control-Allow-Origin`
    pub allowed_origin: String,
}

/// Upload endpoint limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct UploadConfig {
    /// Maximum size of the `pdfFile` part in bytes (default: 25 MiB)
    pub max_file_size: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            enable_otel_export: false,
            google: GoogleConfig::default(),
            cors: CorsConfig::default(),
            uploads: UploadConfig::default(),
        }
    }
}

impl Default for GoogleConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            redirect_uri: DEFAULT_REDIRECT_URI.to_string(),
            refresh_token: None,
            token_url: Url::parse("https://oauth2.googleapis.com/token").expect("static URL is valid"),
            drive_root_url: Url::parse("https://www.googleapis.com/").expect("static URL is valid"),
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origin: DEFAULT_REDIRECT_URI.to_string(),
        }
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_file_size: 25 * 1024 * 1024,
        }
    }
}

/// Reasons a loaded configuration is rejected.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("google.client_id is not configured. Set GOOGLE_CLIENT_ID or CLIENT_ID.")]
    MissingClientId,
    #[error("google.client_secret is not configured. Set GOOGLE_CLIENT_SECRET or CLIENT_SECRET.")]
    MissingClientSecret,
    #[error("google.redirect_uri cannot be empty")]
    EmptyRedirectUri,
    #[error("cors.allowed_origin '{0}' is not a valid header value")]
    InvalidOrigin(String),
    #[error("uploads.max_file_size must be greater than zero")]
    ZeroUploadLimit,
    #[error("google.drive_root_url '{0}' must end with '/'")]
    DriveRootWithoutSlash(String),
}

impl Config {
    /// Load configuration from the file named in `args` and the environment, then validate it.
    pub fn load(args: &Args) -> Result<Self, figment::Error> {
        let mut config: Self = Self::figment(args).extract()?;

        // An empty REFRESH_TOKEN variable means "not configured"
        if config.google.refresh_token.as_deref().is_some_and(|t| t.trim().is_empty()) {
            config.google.refresh_token = None;
        }

        config.validate().map_err(|e| figment::Error::from(e.to_string()))?;
        Ok(config)
    }

    pub fn figment(args: &Args) -> Figment {
        Figment::new()
            .merge(Yaml::file(&args.config))
            .merge(Env::prefixed("DRIVEGATE_").ignore(&["CONFIG"]).split("__"))
            // Bare deployment variables, optionally GOOGLE_ prefixed
            .merge(deployment_env(Env::prefixed("GOOGLE_")))
            .merge(deployment_env(Env::raw()))
    }

    /// Validate the configuration for consistency and required fields
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.google.client_id.trim().is_empty() {
            return Err(ConfigError::MissingClientId);
        }
        if self.google.client_secret.trim().is_empty() {
            return Err(ConfigError::MissingClientSecret);
        }
        if self.google.redirect_uri.trim().is_empty() {
            return Err(ConfigError::EmptyRedirectUri);
        }
        if HeaderValue::from_str(&self.cors.allowed_origin).is_err() {
            return Err(ConfigError::InvalidOrigin(self.cors.allowed_origin.clone()));
        }
        if self.uploads.max_file_size == 0 {
            return Err(ConfigError::ZeroUploadLimit);
        }
        if !self.google.drive_root_url.as_str().ends_with('/') {
            return Err(ConfigError::DriveRootWithoutSlash(self.google.drive_root_url.to_string()));
        }
        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn deployment_env(env: Env) -> Env {
    env.only(&DEPLOYMENT_VARS)
        .map(|key| format!("google.{}", key.as_str().to_ascii_lowercase()).into())
}
