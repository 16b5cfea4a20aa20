//! HTTP request handlers for the two endpoints.
//!
//! # Handler Modules
//!
//! - [`oauth`]: Authorization-code exchange
//! - [`uploads`]: Multipart upload forwarded to Google Drive
//!
//! # Error Handling
//!
//! Handlers return [`crate::errors::Error`], which converts to the matching status code and a
//! JSON body with `message` and, for upstream failures, the provider's `error` text.

use axum::http::{Method, StatusCode};

use crate::errors::Error;

pub mod oauth;
pub mod uploads;

/// `OPTIONS` on either endpoint. CORS headers are attached by the router.
pub async fn preflight() -> StatusCode {
    StatusCode::OK
}

/// Any method other than `POST` and `OPTIONS`.
pub async fn method_not_allowed(method: Method) -> Error {
    Error::MethodNotAllowed { method }
}
