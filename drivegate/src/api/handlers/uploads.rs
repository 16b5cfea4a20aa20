use crate::api::models::uploads::{FILE_FIELD, FILE_NAME_FIELD, FOLDER_ID_FIELD, UploadResponse};
use crate::errors::{Error, Result};
use crate::providers::UploadRequest;
use crate::AppState;
use axum::{
    Json,
    extract::{FromRequest, Multipart, Request, State, multipart::Field, multipart::MultipartError},
    http::StatusCode,
};
use bytes::{Bytes, BytesMut};
use tracing::{debug, info, instrument, warn};

const MISSING_FIELDS_MESSAGE: &str = "Missing file, fileName, or folderId in the request.";

/// Room for multipart boundaries and the text fields on top of the file itself.
pub const MULTIPART_OVERHEAD: u64 = 64 * 1024;

/// Largest request body the upload route reads.
pub fn body_limit(max_file_size: u64) -> u64 {
    max_file_size.saturating_add(MULTIPART_OVERHEAD)
}

#[utoipa::path(
    post,
    path = "/api/upload-to-drive",
    tag = "uploads",
    summary = "Upload a file to Google Drive",
    description = "Accepts a multipart/form-data body with a `pdfFile` part and the text fields \
                   `fileName` and `folderId`. A `fileName` field overrides the part's file name. \
                   The file is created in the given folder of the authorized account.",
    request_body(
        content_type = "multipart/form-data",
        description = "Fields: pdfFile (binary), fileName (text, optional when the part has a file name), folderId (text)"
    ),
    responses(
        (status = 200, description = "File created", body = UploadResponse),
        (status = 400, description = "Missing fields or malformed multipart body"),
        (status = 401, description = "No usable refresh token; authorize again"),
        (status = 405, description = "Method not allowed"),
        (status = 413, description = "File or whole request body exceeds the configured size limit"),
        (status = 500, description = "Storage API rejected the upload")
    )
)]
#[instrument(skip_all)]
pub async fn upload_to_drive(State(state): State<AppState>, request: Request) -> Result<Json<UploadResponse>> {
    // Authorization is checked before the body is read, so a caller without credentials
    // never gets a parse error instead of 401.
    let credentials = state.refresher.refresh().await?;

    let multipart = Multipart::from_request(request, &state)
        .await
        .map_err(|e| Error::invalid_request(format!("Expected a multipart/form-data body: {}", e.body_text())))?;

    let upload = read_upload_form(multipart, state.config.uploads.max_file_size).await?;
    info!(
        file_name = %upload.file_name,
        folder_id = %upload.folder_id,
        size = upload.file_bytes.len(),
        "Uploading file to Google Drive"
    );

    let result = state
        .storage
        .create_file(&credentials, upload)
        .await
        .map_err(Error::UploadFailed)?;

    info!(file_id = %result.file_id, "File uploaded successfully");
    Ok(Json(result.into()))
}

/// Fields collected while the multipart body streams in.
#[derive(Default)]
struct PendingUpload {
    file_bytes: Option<Bytes>,
    file_name: Option<String>,
    folder_id: Option<String>,
}

impl PendingUpload {
    fn missing(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.file_bytes.is_none() {
            missing.push(FILE_FIELD);
        }
        if self.file_name.as_deref().is_none_or(str::is_empty) {
            missing.push(FILE_NAME_FIELD);
        }
        if self.folder_id.as_deref().is_none_or(str::is_empty) {
            missing.push(FOLDER_ID_FIELD);
        }
        missing
    }

    fn complete(self) -> Result<UploadRequest> {
        let missing = self.missing();
        match (self.file_bytes, self.file_name, self.folder_id) {
            (Some(file_bytes), Some(file_name), Some(folder_id)) if missing.is_empty() => Ok(UploadRequest {
                file_bytes,
                file_name,
                folder_id,
            }),
            _ => Err(Error::InvalidRequest {
                message: MISSING_FIELDS_MESSAGE.to_string(),
                missing,
            }),
        }
    }
}

/// Walk every part of the form. Later values of a field replace earlier ones, so a
/// `fileName` text field sent after the file part overrides the part's own file name.
async fn read_upload_form(mut multipart: Multipart, max_file_size: u64) -> Result<UploadRequest> {
    let mut pending = PendingUpload::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, max_file_size))?
    {
        let field_name = field.name().unwrap_or("").to_string();

        match field_name.as_str() {
            FILE_FIELD => {
                if let Some(name) = field.file_name().filter(|n| !n.is_empty()) {
                    pending.file_name = Some(name.to_string());
                }
                pending.file_bytes = Some(read_file(field, max_file_size).await?);
            }
            FILE_NAME_FIELD => {
                pending.file_name = Some(field.text().await.map_err(|e| multipart_error(e, max_file_size))?);
            }
            FOLDER_ID_FIELD => {
                pending.folder_id = Some(field.text().await.map_err(|e| multipart_error(e, max_file_size))?);
            }
            other => {
                debug!(field = other, "Ignoring unknown multipart field");
            }
        }
    }

    pending.complete()
}

async fn read_file(mut field: Field<'_>, max_file_size: u64) -> Result<Bytes> {
    let mut buffer = BytesMut::new();

    while let Some(chunk) = field.chunk().await.map_err(|e| multipart_error(e, max_file_size))? {
        if (buffer.len() + chunk.len()) as u64 > max_file_size {
            warn!(limit = max_file_size, "Rejecting upload over the size limit");
            return Err(Error::PayloadTooLarge { limit: max_file_size });
        }
        buffer.extend_from_slice(&chunk);
    }

    Ok(buffer.freeze())
}

/// The body limit can trip on any part, so an overflow here is reported against the whole body.
fn multipart_error(e: MultipartError, max_file_size: u64) -> Error {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return Error::RequestTooLarge {
            limit: body_limit(max_file_size),
        };
    }
    Error::invalid_request(format!("Failed to parse multipart data: {}", e.body_text()))
}
