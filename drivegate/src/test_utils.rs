//! Test utilities: configuration, stub providers, log capture and a router-backed test server.

use crate::config::{Config, CorsConfig, GoogleConfig, UploadConfig};
use crate::providers::{
    AccessCredentials, FileStorage, IdentityProvider, ProviderError, Result, TokenPair, UploadRequest, UploadResult,
};
use crate::{AppState, auth::AccessTokenRefresher};
use async_trait::async_trait;
use axum::http::StatusCode;
use axum_test::TestServer;
use std::sync::{
    Arc, Mutex,
    atomic::{AtomicU64, AtomicUsize, Ordering},
};

pub const TEST_ORIGIN: &str = "https://app.example.com";
pub const TEST_REDIRECT_URI: &str = "https://app.example.com/oauth/callback";

pub fn create_test_config() -> Config {
    Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        enable_otel_export: false,
        google: GoogleConfig {
            client_id: "test-client-id".to_string(),
            client_secret: "test-client-secret".to_string(),
            redirect_uri: TEST_REDIRECT_URI.to_string(),
            refresh_token: Some("1//test-refresh-token".to_string()),
            ..Default::default()
        },
        cors: CorsConfig {
            allowed_origin: TEST_ORIGIN.to_string(),
        },
        uploads: UploadConfig {
            max_file_size: 1024 * 1024,
        },
    }
}

/// Build state around the given stubs. The refresher uses `config.google.refresh_token`.
pub fn create_test_state(config: Config, identity: Arc<StubIdentityProvider>, storage: Arc<SequentialStorage>) -> AppState {
    let refresher = AccessTokenRefresher::new(identity.clone(), config.google.refresh_token.clone());
    AppState::builder()
        .config(config)
        .identity(identity)
        .refresher(refresher)
        .storage(storage)
        .build()
}

pub fn create_test_server(state: AppState) -> TestServer {
    let router = crate::build_router(state).expect("Failed to build router");
    TestServer::new(router).expect("Failed to create test server")
}

/// Log output written while a [`capture_logs`] guard is alive.
#[derive(Clone, Default)]
pub struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl std::io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Send this thread's tracing output to a buffer. The guard is thread-local, so tests using
/// it run on the current-thread runtime.
pub fn capture_logs() -> (CapturedLogs, tracing::subscriber::DefaultGuard) {
    let logs = CapturedLogs::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::DEBUG)
        .finish();
    (logs, tracing::subscriber::set_default(subscriber))
}

fn rejected(message: &str) -> ProviderError {
    ProviderError::Rejected {
        status: StatusCode::BAD_REQUEST,
        message: message.to_string(),
    }
}

/// Identity provider that returns fixed tokens, or a fixed error.
#[derive(Default)]
pub struct StubIdentityProvider {
    exchange_error: Option<String>,
    refresh_error: Option<String>,
    omit_refresh_token: bool,
    exchange_calls: AtomicUsize,
    refresh_calls: AtomicUsize,
    last_redirect_uri: Mutex<Option<String>>,
    last_refresh_token: Mutex<Option<String>>,
}

impl StubIdentityProvider {
    pub fn rejecting_exchange(message: &str) -> Self {
        Self {
            exchange_error: Some(message.to_string()),
            ..Default::default()
        }
    }

    /// Exchanges succeed but carry no refresh token, as on a repeat consent.
    pub fn without_refresh_token() -> Self {
        Self {
            omit_refresh_token: true,
            ..Default::default()
        }
    }

    pub fn rejecting_refresh(message: &str) -> Self {
        Self {
            refresh_error: Some(message.to_string()),
            ..Default::default()
        }
    }

    pub fn exchange_calls(&self) -> usize {
        self.exchange_calls.load(Ordering::SeqCst)
    }

    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn last_redirect_uri(&self) -> Option<String> {
        self.last_redirect_uri.lock().unwrap().clone()
    }

    pub fn last_refresh_token(&self) -> Option<String> {
        self.last_refresh_token.lock().unwrap().clone()
    }
}

#[async_trait]
impl IdentityProvider for StubIdentityProvider {
    async fn exchange_code(&self, _code: &str, redirect_uri: &str) -> Result<TokenPair> {
        self.exchange_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_redirect_uri.lock().unwrap() = Some(redirect_uri.to_string());

        if let Some(message) = &self.exchange_error {
            return Err(rejected(message));
        }
        Ok(TokenPair {
            access_token: "stub-access-token".to_string(),
            refresh_token: (!self.omit_refresh_token).then(|| "stub-refresh-token".to_string()),
            expires_in: Some(3599),
            scope: Some("https://www.googleapis.com/auth/drive.file".to_string()),
        })
    }

    async fn refresh_access_token(&self, refresh_token: &str) -> Result<AccessCredentials> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_refresh_token.lock().unwrap() = Some(refresh_token.to_string());

        if let Some(message) = &self.refresh_error {
            return Err(rejected(message));
        }
        Ok(AccessCredentials {
            access_token: "stub-access-token".to_string(),
            expires_in: Some(3599),
        })
    }
}

/// Storage that allocates sequential ids starting at `file456`, or fails every call.
pub struct SequentialStorage {
    next_id: AtomicU64,
    error: Option<String>,
    uploads: Mutex<Vec<(String, UploadRequest)>>,
}

impl Default for SequentialStorage {
    fn default() -> Self {
        Self {
            next_id: AtomicU64::new(456),
            error: None,
            uploads: Mutex::new(Vec::new()),
        }
    }
}

impl SequentialStorage {
    pub fn rejecting(message: &str) -> Self {
        Self {
            error: Some(message.to_string()),
            ..Default::default()
        }
    }

    /// Every create-file call seen so far, with the access token it carried.
    pub fn uploads(&self) -> Vec<(String, UploadRequest)> {
        self.uploads.lock().unwrap().clone()
    }
}

#[async_trait]
impl FileStorage for SequentialStorage {
    async fn create_file(&self, credentials: &AccessCredentials, request: UploadRequest) -> Result<UploadResult> {
        self.uploads
            .lock()
            .unwrap()
            .push((credentials.access_token.clone(), request));

        if let Some(message) = &self.error {
            return Err(ProviderError::Rejected {
                status: StatusCode::FORBIDDEN,
                message: message.clone(),
            });
        }

        let id = format!("file{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        Ok(UploadResult {
            web_view_link: Some(format!("https://example/view/{id}")),
            file_id: id,
        })
    }
}
