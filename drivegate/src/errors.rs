use crate::auth::RefreshError;
use crate::providers::ProviderError;
use axum::{
    Json,
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error as ThisError;

#[derive(ThisError, Debug)]
pub enum Error {
    /// Malformed or incomplete client input
    #[error("{message}")]
    InvalidRequest { message: String, missing: Vec<&'static str> },

    /// Endpoint only accepts POST and OPTIONS
    #[error("Method {method} not allowed")]
    MethodNotAllowed { method: Method },

    /// No usable refresh credential
    #[error("Not authorized: {0}")]
    NotAuthorized(#[from] RefreshError),

    /// Identity provider rejected the authorization code
    #[error("Token exchange failed: {0}")]
    TokenExchangeFailed(#[source] ProviderError),

    /// Storage API rejected the create-file call
    #[error("Upload failed: {0}")]
    UploadFailed(#[source] ProviderError),

    /// Uploaded file exceeds the configured limit
    #[error("File exceeds the maximum allowed size of {limit} bytes")]
    PayloadTooLarge { limit: u64 },

    /// Whole request body exceeds the route's body limit
    #[error("Request body exceeds the maximum allowed size of {limit} bytes")]
    RequestTooLarge { limit: u64 },
}

/// JSON body returned for every failure.
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ErrorBody {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Error {
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Error::InvalidRequest {
            message: message.into(),
            missing: Vec::new(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::InvalidRequest { .. } => StatusCode::BAD_REQUEST,
            Error::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
            Error::NotAuthorized(_) => StatusCode::UNAUTHORIZED,
            Error::TokenExchangeFailed(_) | Error::UploadFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::PayloadTooLarge { .. } | Error::RequestTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
        }
    }

    /// Builds the caller-facing body. Upstream messages are relayed in `error`, internal
    /// details are not.
    pub fn body(&self) -> ErrorBody {
        let (message, error) = match self {
            Error::InvalidRequest { message, missing } => {
                let error = (!missing.is_empty()).then(|| format!("missing: {}", missing.join(", ")));
                (message.clone(), error)
            }
            Error::MethodNotAllowed { .. } => ("Method Not Allowed".to_string(), None),
            Error::NotAuthorized(e) => ("Google Drive authorization required.".to_string(), Some(e.to_string())),
            Error::TokenExchangeFailed(e) => ("Failed to exchange authorization code.".to_string(), Some(e.to_string())),
            Error::UploadFailed(e) => ("Failed to upload file to Google Drive.".to_string(), Some(e.to_string())),
            Error::PayloadTooLarge { .. } | Error::RequestTooLarge { .. } => (self.to_string(), None),
        };
        ErrorBody { message, error }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        match &self {
            Error::TokenExchangeFailed(_) | Error::UploadFailed(_) => {
                tracing::error!("Request failed: {:#}", self);
            }
            Error::NotAuthorized(_) => {
                tracing::warn!("Authorization check failed: {}", self);
            }
            Error::InvalidRequest { .. }
            | Error::MethodNotAllowed { .. }
            | Error::PayloadTooLarge { .. }
            | Error::RequestTooLarge { .. } => {
                tracing::debug!("Client error: {}", self);
            }
        }

        (self.status_code(), Json(self.body())).into_response()
    }
}

/// Type alias for handler results
pub type Result<T> = std::result::Result<T, Error>;
