use crate::api::models::oauth::{ExchangeCodeRequest, ExchangeCodeResponse};
use crate::errors::{Error, Result};
use crate::AppState;
use axum::{Json, body::Bytes, extract::State};
use tracing::{info, instrument, warn};

const MISSING_CODE_MESSAGE: &str = "Authorization code is missing in the request body.";

#[utoipa::path(
    post,
    path = "/api/exchange-code",
    tag = "oauth",
    summary = "Exchange authorization code",
    description = "Exchange a one-time OAuth2 authorization code for tokens. Tokens are written to the \
                   server log for the operator and never returned to the caller.",
    request_body = ExchangeCodeRequest,
    responses(
        (status = 200, description = "Tokens exchanged", body = ExchangeCodeResponse),
        (status = 400, description = "Missing authorization code or malformed body"),
        (status = 405, description = "Method not allowed"),
        (status = 500, description = "Identity provider rejected the exchange")
    )
)]
#[instrument(skip_all)]
pub async fn exchange_code(State(state): State<AppState>, body: Bytes) -> Result<Json<ExchangeCodeResponse>> {
    let request = parse_request(&body)?;

    let code = request.code.filter(|c| !c.is_empty()).ok_or_else(|| Error::InvalidRequest {
        message: MISSING_CODE_MESSAGE.to_string(),
        missing: vec!["code"],
    })?;

    let redirect_uri = request
        .redirect_uri
        .filter(|uri| !uri.is_empty())
        .unwrap_or_else(|| state.config.google.redirect_uri.clone());

    let tokens = state
        .identity
        .exchange_code(&code, &redirect_uri)
        .await
        .map_err(Error::TokenExchangeFailed)?;

    // The log stream is how the operator retrieves the refresh token for REFRESH_TOKEN.
    info!("Successfully exchanged authorization code for tokens.");
    info!(access_token = %tokens.access_token, expires_in = ?tokens.expires_in, "Access Token");
    match &tokens.refresh_token {
        Some(refresh_token) => info!(refresh_token = %refresh_token, "Refresh Token"),
        None => warn!("Identity provider issued no refresh token; revoke access and authorize again with consent"),
    }

    Ok(Json(ExchangeCodeResponse {
        message: "Tokens exchanged successfully!".to_string(),
    }))
}

/// An empty body reads as `{}` so that it fails on the missing code, not on syntax.
fn parse_request(body: &[u8]) -> Result<ExchangeCodeRequest> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(ExchangeCodeRequest::default());
    }
    serde_json::from_slice(body).map_err(|e| Error::invalid_request(format!("Request body must be a JSON object: {e}")))
}
