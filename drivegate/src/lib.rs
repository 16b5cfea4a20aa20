//! # drivegate: OAuth2 code exchange and Google Drive uploads
//!
//! `drivegate` is a small HTTP service that lets a browser front end store files in the Google
//! Drive of one pre-authorized account without ever holding Google credentials itself.
//!
//! ## Endpoints
//!
//! - `POST /api/exchange-code` trades a one-time authorization code for tokens. The tokens are
//!   written to the server log, where the operator picks up the refresh token and configures it
//!   as `REFRESH_TOKEN`. The caller only gets an acknowledgement.
//! - `POST /api/upload-to-drive` accepts a `multipart/form-data` body with a `pdfFile` part and
//!   `fileName`/`folderId` fields, refreshes an access token from the configured refresh token and
//!   creates the file in the given Drive folder.
//!
//! Both answer `OPTIONS` with an empty 200 and every other method with 405. Every response carries
//! the same fixed CORS headers.
//!
//! ## Architecture
//!
//! The HTTP layer is [Axum](https://github.com/tokio-rs/axum). Outbound calls go through two
//! traits in [`providers`]: [`providers::IdentityProvider`] (code exchange and refresh) and
//! [`providers::FileStorage`] (create file). The token endpoint is called with `reqwest`, Drive
//! through the generated `google-drive3` client; tests substitute in-process stubs.
//!
//! No credential state is shared between requests. The refresh token is fixed at startup, each
//! upload refreshes its own access token, and the redirect URI of an exchange travels as an
//! argument.
//!
//! ## Quick Start
//!
//! ```no_run
//! use clap::Parser;
//! use drivegate::{Application, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let args = drivegate::config::Args::parse();
//!     let config = Config::load(&args)?;
//!     drivegate::telemetry::init_telemetry(config.enable_otel_export)?;
//!
//!     Application::new(config)?
//!         .serve(async {
//!             let _ = tokio::signal::ctrl_c().await;
//!         })
//!         .await
//! }
//! ```
//!
//! See the [`config`] module for configuration options.
pub mod api;
pub mod auth;
pub mod config;
pub mod errors;
mod openapi;
pub mod providers;
pub mod telemetry;

#[cfg(test)]
pub mod test_utils;

pub use config::Config;

use crate::{
    auth::AccessTokenRefresher,
    openapi::ApiDoc,
    providers::{FileStorage, IdentityProvider},
};
use axum::{
    Json, Router,
    extract::DefaultBodyLimit,
    http::{HeaderValue, header},
    routing::{get, post},
};
use bon::Builder;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::{set_header::SetResponseHeaderLayer, trace::TraceLayer};
use tracing::{debug, info, warn};
use utoipa::OpenApi;

/// Value of `Access-Control-Allow-Methods` on every response
pub const ALLOWED_METHODS: &str = "POST, OPTIONS";
/// Value of `Access-Control-Allow-Headers` on every response
pub const ALLOWED_HEADERS: &str = "Content-Type";

/// Application state shared across all request handlers
#[derive(Clone, Builder)]
pub struct AppState {
    pub config: Config,
    pub identity: Arc<dyn IdentityProvider>,
    pub refresher: AccessTokenRefresher,
    pub storage: Arc<dyn FileStorage>,
}

impl AppState {
    /// Wire the Google providers from configuration.
    pub fn from_config(config: Config) -> anyhow::Result<Self> {
        let http = providers::build_http_client(config.google.request_timeout)?;
        let identity = providers::create_identity_provider(&config, http);
        let storage = providers::create_file_storage(&config)?;
        let refresher = AccessTokenRefresher::new(identity.clone(), config.google.refresh_token.clone());

        Ok(Self::builder()
            .config(config)
            .identity(identity)
            .refresher(refresher)
            .storage(storage)
            .build())
    }
}

/// Build the application router with both endpoints, the OpenAPI document and middleware.
pub fn build_router(state: AppState) -> anyhow::Result<Router> {
    use api::handlers::{method_not_allowed, oauth, preflight, uploads};

    let body_limit = usize::try_from(uploads::body_limit(state.config.uploads.max_file_size)).unwrap_or(usize::MAX);
    let origin: HeaderValue = state.config.cors.allowed_origin.parse()?;

    let router = Router::new()
        .route(
            "/api/exchange-code",
            post(oauth::exchange_code).options(preflight).fallback(method_not_allowed),
        )
        .route(
            "/api/upload-to-drive",
            post(uploads::upload_to_drive)
                .options(preflight)
                .fallback(method_not_allowed)
                .layer(DefaultBodyLimit::max(body_limit)),
        )
        .route("/api/openapi.json", get(|| async { Json(ApiDoc::openapi()) }))
        .with_state(state)
        // Fixed CORS headers on every response, errors and 405s included
        .layer(SetResponseHeaderLayer::overriding(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin))
        .layer(SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static(ALLOWED_METHODS),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static(ALLOWED_HEADERS),
        ))
        .layer(TraceLayer::new_for_http());

    Ok(router)
}

/// Owns the router and configuration for the lifetime of the process.
///
/// [`Application::new`] wires providers and routes; [`Application::serve`] binds the listener and
/// runs until the shutdown future resolves.
pub struct Application {
    router: Router,
    config: Config,
}

impl Application {
    pub fn new(config: Config) -> anyhow::Result<Self> {
        debug!("Starting drivegate with configuration: {:#?}", config);

        if config.google.refresh_token.is_none() {
            warn!("REFRESH_TOKEN is not set. Uploads will return 401 until an authorization code is exchanged and the logged refresh token is configured.");
        }

        let state = AppState::from_config(config.clone())?;
        let router = build_router(state)?;

        Ok(Self { router, config })
    }

    #[cfg(test)]
    pub fn into_test_server(self) -> axum_test::TestServer {
        axum_test::TestServer::new(self.router).expect("Failed to create test server")
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!("drivegate listening on http://{}", bind_addr);

        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("Shutting down telemetry...");
        telemetry::shutdown_telemetry();

        Ok(())
    }
}
