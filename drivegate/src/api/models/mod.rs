//! Request and response bodies of the HTTP API.

pub mod oauth;
pub mod uploads;
