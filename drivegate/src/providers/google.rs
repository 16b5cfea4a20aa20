//! Google OAuth2 and Drive v3 implementations
//!
//! The token endpoint is a plain form POST over `reqwest`. Drive goes through the generated
//! `google-drive3` client, with a hub built per upload around that request's access token.
//! Endpoints come from [`GoogleConfig`] so tests can aim them at a local mock server.

use anyhow::Context;
use async_trait::async_trait;
use google_drive3 as drive3;
use reqwest::{StatusCode, header::CONTENT_TYPE};
use serde::Deserialize;
use std::{io::Cursor, time::Duration};
use tracing::{debug, instrument};
use url::Url;

use crate::config::GoogleConfig;
use crate::providers::{
    AccessCredentials, FileStorage, IdentityProvider, ProviderError, Result, TokenPair, UploadRequest, UploadResult,
};

/// Every upload is typed as PDF regardless of content.
pub const UPLOAD_MIME_TYPE: mime::Mime = mime::APPLICATION_PDF;

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";
const DRIVE_FIELDS: &str = "id,webViewLink";

/// Google's OAuth2 token endpoint
pub struct GoogleOAuth {
    http: reqwest::Client,
    token_url: Url,
    client_id: String,
    client_secret: String,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: Option<u64>,
    scope: Option<String>,
}

/// RFC 6749 §5.2 error document
#[derive(Deserialize, Default)]
struct OAuthErrorResponse {
    error: Option<String>,
    error_description: Option<String>,
}

impl GoogleOAuth {
    pub fn new(config: &GoogleConfig, http: reqwest::Client) -> Self {
        Self {
            http,
            token_url: config.token_url.clone(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
        }
    }

    async fn request_token(&self, grant: &[(&str, &str)]) -> Result<TokenResponse> {
        let mut params = vec![
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
        ];
        params.extend_from_slice(grant);
        let body = serde_urlencoded::to_string(&params).map_err(|e| ProviderError::Encoding(e.to_string()))?;

        let response = self
            .http
            .post(self.token_url.clone())
            .header(CONTENT_TYPE, FORM_CONTENT_TYPE)
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ProviderError::Rejected {
                status,
                message: oauth_error_message(status, &text),
            });
        }

        response
            .json::<TokenResponse>()
            .await
            .map_err(|e| ProviderError::InvalidResponse(format!("malformed token response: {e}")))
    }
}

#[async_trait]
impl IdentityProvider for GoogleOAuth {
    #[instrument(skip_all, fields(redirect_uri = %redirect_uri))]
    async fn exchange_code(&self, code: &str, redirect_uri: &str) -> Result<TokenPair> {
        let token = self
            .request_token(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", redirect_uri),
            ])
            .await?;

        debug!(has_refresh_token = token.refresh_token.is_some(), "Authorization code exchanged");

        Ok(TokenPair {
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            expires_in: token.expires_in,
            scope: token.scope,
        })
    }

    #[instrument(skip_all)]
    async fn refresh_access_token(&self, refresh_token: &str) -> Result<AccessCredentials> {
        let token = self
            .request_token(&[("grant_type", "refresh_token"), ("refresh_token", refresh_token)])
            .await?;

        Ok(AccessCredentials {
            access_token: token.access_token,
            expires_in: token.expires_in,
        })
    }
}

fn oauth_error_message(status: StatusCode, body: &str) -> String {
    let parsed: OAuthErrorResponse = serde_json::from_str(body).unwrap_or_default();
    parsed
        .error_description
        .filter(|d| !d.is_empty())
        .or(parsed.error)
        .unwrap_or_else(|| format!("token endpoint returned {status}"))
}

type DriveConnector = drive3::hyper_rustls::HttpsConnector<drive3::hyper_util::client::legacy::connect::HttpConnector>;

/// Google Drive v3 through `google-drive3`
pub struct GoogleDrive {
    client: drive3::common::Client<DriveConnector>,
    root_url: String,
    timeout: Duration,
}

impl GoogleDrive {
    pub fn new(config: &GoogleConfig) -> anyhow::Result<Self> {
        super::install_crypto_provider();

        let connector = drive3::hyper_rustls::HttpsConnectorBuilder::new()
            .with_native_roots()
            .context("load native root certificates")?
            .https_or_http()
            .enable_http1()
            .build();
        let client = drive3::hyper_util::client::legacy::Client::builder(drive3::hyper_util::rt::TokioExecutor::new())
            .build(connector);

        Ok(Self {
            client,
            root_url: config.drive_root_url.to_string(),
            timeout: config.request_timeout,
        })
    }

    /// A hub that authenticates with one request's access token and nothing else.
    fn hub(&self, credentials: &AccessCredentials) -> drive3::DriveHub<DriveConnector> {
        let mut hub = drive3::DriveHub::new(self.client.clone(), credentials.access_token.clone());
        hub.root_url(self.root_url.clone());
        hub.base_url(format!("{}drive/v3/", self.root_url));
        hub
    }
}

#[async_trait]
impl FileStorage for GoogleDrive {
    #[instrument(skip_all, fields(file_name = %request.file_name, folder_id = %request.folder_id, size = request.file_bytes.len()))]
    async fn create_file(&self, credentials: &AccessCredentials, request: UploadRequest) -> Result<UploadResult> {
        let UploadRequest {
            file_bytes,
            file_name,
            folder_id,
        } = request;

        let metadata = drive3::api::File {
            name: Some(file_name),
            parents: Some(vec![folder_id]),
            mime_type: Some(UPLOAD_MIME_TYPE.essence_str().to_string()),
            ..Default::default()
        };

        let hub = self.hub(credentials);
        let upload = hub
            .files()
            .create(metadata)
            .supports_all_drives(true)
            .param("fields", DRIVE_FIELDS)
            .upload(Cursor::new(file_bytes), UPLOAD_MIME_TYPE);

        let (_, created) = tokio::time::timeout(self.timeout, upload)
            .await
            .map_err(|_| ProviderError::Unavailable(format!("Drive upload timed out after {:?}", self.timeout)))?
            .map_err(drive_error)?;

        let file_id = created
            .id
            .ok_or_else(|| ProviderError::InvalidResponse("Drive response did not include a file id".to_string()))?;

        debug!(file_id = %file_id, "Drive file created");

        Ok(UploadResult {
            file_id,
            web_view_link: created.web_view_link,
        })
    }
}

/// The Google API error document carries `error.code` and `error.message`.
fn drive_error(e: drive3::Error) -> ProviderError {
    match e {
        drive3::Error::BadRequest(document) => {
            let status = document["error"]["code"]
                .as_u64()
                .and_then(|code| u16::try_from(code).ok())
                .and_then(|code| StatusCode::from_u16(code).ok())
                .unwrap_or(StatusCode::BAD_REQUEST);
            let message = document["error"]["message"]
                .as_str()
                .map(str::to_string)
                .unwrap_or_else(|| format!("Drive API returned {status}"));
            ProviderError::Rejected { status, message }
        }
        drive3::Error::Failure(response) => {
            let status = StatusCode::from_u16(response.status().as_u16()).unwrap_or(StatusCode::BAD_GATEWAY);
            ProviderError::Rejected {
                status,
                message: format!("Drive API returned {status}"),
            }
        }
        drive3::Error::JsonDecodeError(_, e) => ProviderError::InvalidResponse(format!("malformed Drive response: {e}")),
        other => ProviderError::Unavailable(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::build_http_client;
    use bytes::Bytes;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{body_string_contains, header, header_exists, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn google_config(server: &MockServer) -> GoogleConfig {
        GoogleConfig {
            client_id: "client-id".to_string(),
            client_secret: "client-secret".to_string(),
            token_url: format!("{}/token", server.uri()).parse().unwrap(),
            drive_root_url: format!("{}/", server.uri()).parse().unwrap(),
            ..Default::default()
        }
    }

    fn http() -> reqwest::Client {
        build_http_client(Duration::from_secs(5)).unwrap()
    }

    fn credentials() -> AccessCredentials {
        AccessCredentials {
            access_token: "ya29.access".to_string(),
            expires_in: Some(3599),
        }
    }

    fn upload(content: &'static [u8]) -> UploadRequest {
        UploadRequest {
            file_bytes: Bytes::from_static(content),
            file_name: "report.pdf".to_string(),
            folder_id: "folder123".to_string(),
        }
    }

    #[tokio::test]
    async fn test_exchange_code_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(header("content-type", FORM_CONTENT_TYPE))
            .and(body_string_contains("grant_type=authorization_code"))
            .and(body_string_contains("code=4%2F0Aabc"))
            .and(body_string_contains("redirect_uri=https%3A%2F%2Fapp.example.com"))
            .and(body_string_contains("client_secret=client-secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "ya29.new",
                "refresh_token": "1//refresh",
                "expires_in": 3599,
                "scope": "https://www.googleapis.com/auth/drive.file",
                "token_type": "Bearer"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let oauth = GoogleOAuth::new(&google_config(&server), http());
        let tokens = oauth.exchange_code("4/0Aabc", "https://app.example.com").await.unwrap();

        assert_eq!(tokens.access_token, "ya29.new");
        assert_eq!(tokens.refresh_token.as_deref(), Some("1//refresh"));
        assert_eq!(tokens.expires_in, Some(3599));
    }

    #[tokio::test]
    async fn test_exchange_code_rejected_uses_error_description() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": "invalid_grant",
                "error_description": "Bad Request"
            })))
            .mount(&server)
            .await;

        let oauth = GoogleOAuth::new(&google_config(&server), http());
        let err = oauth.exchange_code("expired", "https://app.example.com").await.unwrap_err();

        match err {
            ProviderError::Rejected { status, message } => {
                assert_eq!(status, StatusCode::BAD_REQUEST);
                assert_eq!(message, "Bad Request");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_refresh_access_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("grant_type=refresh_token"))
            .and(body_string_contains("refresh_token=1%2F%2Frefresh"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "ya29.refreshed",
                "expires_in": 3599
            })))
            .mount(&server)
            .await;

        let oauth = GoogleOAuth::new(&google_config(&server), http());
        let credentials = oauth.refresh_access_token("1//refresh").await.unwrap();

        assert_eq!(credentials.access_token, "ya29.refreshed");
        assert_eq!(credentials.expires_in, Some(3599));
    }

    #[tokio::test]
    async fn test_refresh_rejected_without_description() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({ "error": "invalid_grant" })))
            .mount(&server)
            .await;

        let oauth = GoogleOAuth::new(&google_config(&server), http());
        let err = oauth.refresh_access_token("revoked").await.unwrap_err();
        assert_eq!(err.to_string(), "invalid_grant");
    }

    #[tokio::test]
    async fn test_token_endpoint_non_json_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(503).set_body_string("upstream unavailable"))
            .mount(&server)
            .await;

        let oauth = GoogleOAuth::new(&google_config(&server), http());
        let err = oauth.refresh_access_token("1//refresh").await.unwrap_err();
        assert!(err.to_string().contains("503"));
    }

    #[tokio::test]
    async fn test_create_file_uploads_into_folder() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/upload/drive/v3/files"))
            .and(query_param("uploadType", "multipart"))
            .and(query_param("fields", "id,webViewLink"))
            .and(header("authorization", "Bearer ya29.access"))
            .and(header_exists("content-type"))
            .and(body_string_contains(r#""name":"report.pdf""#))
            .and(body_string_contains(r#""parents":["folder123"]"#))
            .and(body_string_contains(r#""mimeType":"application/pdf""#))
            .and(body_string_contains("%PDF-1.4 demo"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "file456",
                "webViewLink": "https://example/view/file456"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let drive = GoogleDrive::new(&google_config(&server)).unwrap();
        let result = drive.create_file(&credentials(), upload(b"%PDF-1.4 demo")).await.unwrap();

        assert_eq!(
            result,
            UploadResult {
                file_id: "file456".to_string(),
                web_view_link: Some("https://example/view/file456".to_string()),
            }
        );
    }

    #[tokio::test]
    async fn test_create_file_api_error_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/upload/drive/v3/files"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "error": { "code": 404, "message": "File not found: folder123.", "errors": [] }
            })))
            .mount(&server)
            .await;

        let drive = GoogleDrive::new(&google_config(&server)).unwrap();
        let err = drive.create_file(&credentials(), upload(b"data")).await.unwrap_err();
        assert_eq!(err.to_string(), "File not found: folder123.");
    }

    #[tokio::test]
    async fn test_create_file_without_id_is_invalid() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/upload/drive/v3/files"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "kind": "drive#file" })))
            .mount(&server)
            .await;

        let drive = GoogleDrive::new(&google_config(&server)).unwrap();
        let err = drive.create_file(&credentials(), upload(b"data")).await.unwrap_err();
        assert!(matches!(err, ProviderError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn test_create_file_non_json_error_keeps_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/upload/drive/v3/files"))
            .respond_with(ResponseTemplate::new(503).set_body_string("backend error"))
            .mount(&server)
            .await;

        let drive = GoogleDrive::new(&google_config(&server)).unwrap();
        let err = drive.create_file(&credentials(), upload(b"data")).await.unwrap_err();

        match err {
            ProviderError::Rejected { status, .. } => assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_create_file_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/upload/drive/v3/files"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
            .mount(&server)
            .await;

        let mut config = google_config(&server);
        config.request_timeout = Duration::from_millis(100);
        let drive = GoogleDrive::new(&config).unwrap();

        let err = drive.create_file(&credentials(), upload(b"data")).await.unwrap_err();
        assert!(matches!(err, ProviderError::Unavailable(_)));
    }
}
