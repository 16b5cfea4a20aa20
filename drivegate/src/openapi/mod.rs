//! OpenAPI document for the two endpoints, served at `/api/openapi.json`.

use utoipa::OpenApi;

use crate::api::{
    handlers,
    models::{oauth, uploads},
};
use crate::errors::ErrorBody;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "drivegate",
        description = "OAuth2 code exchange and Google Drive upload for a single authorized account"
    ),
    paths(handlers::oauth::exchange_code, handlers::uploads::upload_to_drive),
    components(schemas(
        oauth::ExchangeCodeRequest,
        oauth::ExchangeCodeResponse,
        uploads::UploadResponse,
        ErrorBody
    )),
    tags(
        (name = "oauth", description = "Authorization-code exchange"),
        (name = "uploads", description = "File upload to Google Drive")
    )
)]
pub struct ApiDoc;
