//! External collaborator abstraction layer
//!
//! This module defines the `IdentityProvider` trait (OAuth2 code exchange and token refresh)
//! and the `FileStorage` trait (create-file against a cloud storage API). The Google
//! implementations live in [`google`]: the token endpoint is called with `reqwest`, Drive through
//! the generated `google-drive3` client. Tests substitute in-process stubs.
//!
//! Providers are immutable after construction. Everything that varies per request (redirect
//! URI, access token) is passed in as an argument, so concurrent requests never share
//! credential state.

use async_trait::async_trait;
use axum::http::StatusCode;
use bytes::Bytes;
use std::{fmt, sync::Arc, time::Duration};

use crate::config::Config;

pub mod google;

/// Create the identity provider from configuration
pub fn create_identity_provider(config: &Config, http: reqwest::Client) -> Arc<dyn IdentityProvider> {
    Arc::new(google::GoogleOAuth::new(&config.google, http))
}

/// Create the file storage from configuration
pub fn create_file_storage(config: &Config) -> anyhow::Result<Arc<dyn FileStorage>> {
    Ok(Arc::new(google::GoogleDrive::new(&config.google)?))
}

/// Install the process-wide rustls provider used by both HTTP stacks. Installing twice is harmless.
pub(crate) fn install_crypto_provider() {
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();
}

/// Build the HTTP client used for the token endpoint.
pub fn build_http_client(timeout: Duration) -> anyhow::Result<reqwest::Client> {
    install_crypto_provider();

    Ok(reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("drivegate/", env!("CARGO_PKG_VERSION")))
        .build()?)
}

/// Result type for provider operations
pub type Result<T> = std::result::Result<T, ProviderError>;

/// Errors returned by external collaborators
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// The provider answered with a non-success status
    #[error("{message}")]
    Rejected { status: StatusCode, message: String },

    /// The request never produced a response (DNS, TLS, timeout, ...)
    #[error("{0}")]
    Transport(#[from] reqwest::Error),

    /// A success response that doesn't contain what we asked for
    #[error("{0}")]
    InvalidResponse(String),

    /// The outbound request body could not be built
    #[error("failed to encode request: {0}")]
    Encoding(String),

    /// The Drive client failed before an API answer was available (connection, I/O, timeout)
    #[error("{0}")]
    Unavailable(String),
}

/// Tokens returned by a successful authorization-code exchange.
#[derive(Clone)]
pub struct TokenPair {
    pub access_token: String,
    /// Only issued on the first consent (or when `prompt=consent` was requested)
    pub refresh_token: Option<String>,
    pub expires_in: Option<u64>,
    pub scope: Option<String>,
}

/// The credential set used for storage calls made on behalf of one request.
#[derive(Clone)]
pub struct AccessCredentials {
    pub access_token: String,
    pub expires_in: Option<u64>,
}

impl fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenPair")
            .field("has_refresh_token", &self.refresh_token.is_some())
            .field("expires_in", &self.expires_in)
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}

impl fmt::Debug for AccessCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessCredentials")
            .field("expires_in", &self.expires_in)
            .finish_non_exhaustive()
    }
}

/// A complete upload. Only constructed once the file, its name and the folder are all known.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub file_bytes: Bytes,
    pub file_name: String,
    pub folder_id: String,
}

/// What the storage API reports about the created file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadResult {
    pub file_id: String,
    /// Absent when the storage API doesn't return one; relayed as-is
    pub web_view_link: Option<String>,
}

/// OAuth2 identity provider
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Exchange a single-use authorization code for tokens.
    ///
    /// `redirect_uri` must match the one used when the code was issued.
    async fn exchange_code(&self, code: &str, redirect_uri: &str) -> Result<TokenPair>;

    /// Obtain a fresh access token from a long-lived refresh token.
    async fn refresh_access_token(&self, refresh_token: &str) -> Result<AccessCredentials>;
}

/// Cloud file storage
#[async_trait]
pub trait FileStorage: Send + Sync {
    /// Create a file in `request.folder_id`. Every call creates a new remote file.
    async fn create_file(&self, credentials: &AccessCredentials, request: UploadRequest) -> Result<UploadResult>;
}
