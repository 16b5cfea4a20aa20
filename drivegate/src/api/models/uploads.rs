use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::providers::UploadResult;

/// Multipart field carrying the binary file
pub const FILE_FIELD: &str = "pdfFile";
/// Multipart field overriding the destination file name
pub const FILE_NAME_FIELD: &str = "fileName";
/// Multipart field naming the destination Drive folder
pub const FOLDER_ID_FIELD: &str = "folderId";

/// Created file, relayed from the storage API.
#[derive(Debug, Deserialize, Serialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub file_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub web_view_link: Option<String>,
}

impl From<UploadResult> for UploadResponse {
    fn from(result: UploadResult) -> Self {
        Self {
            file_id: result.file_id,
            web_view_link: result.web_view_link,
        }
    }
}
