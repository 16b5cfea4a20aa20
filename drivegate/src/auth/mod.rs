//! Authorization against the storage API.
//!
//! The service acts for exactly one account: the one whose refresh token is configured in
//! `google.refresh_token`. There are no user sessions. Every upload first trades that refresh
//! token for a short-lived access token through the [`AccessTokenRefresher`], and the resulting
//! [`AccessCredentials`](crate::providers::AccessCredentials) are handed to the storage call for
//! that one request. Access tokens are never cached between requests.
//!
//! # Modules
//!
//! - [`refresher`]: The pre-flight refresh performed by the upload handler

pub mod refresher;

pub use refresher::{AccessTokenRefresher, RefreshError};
