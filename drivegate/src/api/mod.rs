//! API layer for HTTP request handling and data models.
//!
//! This module contains the two endpoints, organized into:
//!
//! - **[`handlers`]**: Axum route handlers
//! - **[`models`]**: Request/response data structures
//!
//! # API Structure
//!
//! - **Code exchange** (`/api/exchange-code`): one-time OAuth2 authorization of the account
//! - **Upload** (`/api/upload-to-drive`): multipart PDF upload forwarded to Google Drive
//!
//! Both accept `POST` and `OPTIONS` only. OpenAPI documentation is served at
//! `/api/openapi.json`.

pub mod handlers;
pub mod models;
