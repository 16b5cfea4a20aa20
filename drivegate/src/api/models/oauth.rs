use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Body of `POST /api/exchange-code`.
///
/// Both fields are optional at the type level so a missing `code` can be reported as a
/// 400 with a readable message instead of a deserialization failure.
#[derive(Debug, Default, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExchangeCodeRequest {
    /// Authorization code returned to the redirect URI
    pub code: Option<String>,
    /// Redirect URI the code was issued for. Falls back to the configured default.
    pub redirect_uri: Option<String>,
}

/// Acknowledgement of a successful exchange. Tokens are deliberately not included.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct ExchangeCodeResponse {
    pub message: String,
}
