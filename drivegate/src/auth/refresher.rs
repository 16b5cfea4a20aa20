use std::{fmt, sync::Arc};

use tracing::{info, instrument, warn};

use crate::providers::{AccessCredentials, IdentityProvider, ProviderError};

/// Why no access token could be obtained
#[derive(Debug, thiserror::Error)]
pub enum RefreshError {
    #[error("No refresh token configured. Authorize first and set REFRESH_TOKEN from the server log.")]
    NotConfigured,

    #[error("Failed to refresh access token: {0}. Re-authorization is required.")]
    ReauthorizationRequired(#[source] ProviderError),
}

/// Trades the configured refresh token for a fresh access token.
///
/// The refresh token is set once from configuration and never changed by this process.
#[derive(Clone)]
pub struct AccessTokenRefresher {
    provider: Arc<dyn IdentityProvider>,
    refresh_token: Option<String>,
}

impl fmt::Debug for AccessTokenRefresher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessTokenRefresher")
            .field("configured", &self.is_configured())
            .finish_non_exhaustive()
    }
}

impl AccessTokenRefresher {
    pub fn new(provider: Arc<dyn IdentityProvider>, refresh_token: Option<String>) -> Self {
        Self { provider, refresh_token }
    }

    pub fn is_configured(&self) -> bool {
        self.refresh_token.is_some()
    }

    /// Request a new access token. Called once per upload; nothing is cached.
    #[instrument(skip_all)]
    pub async fn refresh(&self) -> Result<AccessCredentials, RefreshError> {
        let refresh_token = self.refresh_token.as_deref().ok_or(RefreshError::NotConfigured)?;

        match self.provider.refresh_access_token(refresh_token).await {
            Ok(credentials) => {
                info!("Access token refreshed successfully");
                Ok(credentials)
            }
            Err(e) => {
                warn!(error = %e, "Refresh token was rejected");
                Err(RefreshError::ReauthorizationRequired(e))
            }
        }
    }
}
