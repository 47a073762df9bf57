use axum::{
    extract::{multipart::MultipartError, Multipart, State},
    http::HeaderMap,
    Json,
};
use serde::Serialize;

use super::{tag_request, AppState};
use crate::database::document_repository::ApplicationDocument;
use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::services::document_upload::UploadInput;

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub success: bool,
    pub data: ApplicationDocument,
}

fn multipart_error(err: MultipartError) -> AppError {
    AppError::invalid_field("file", err.body_text())
}

async fn read_upload(mut multipart: Multipart) -> AppResult<UploadInput> {
    let mut input = UploadInput::default();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        match field.name() {
            Some("file") => {
                input.file_name = field.file_name().map(str::to_string);
                input.content_type = field.content_type().map(str::to_string);
                input.bytes = field.bytes().await.map_err(multipart_error)?.to_vec();
            }
            Some("application_id") => {
                input.application_id = Some(field.text().await.map_err(multipart_error)?);
            }
            Some("document_type") => {
                input.document_type = Some(field.text().await.map_err(multipart_error)?);
            }
            _ => {}
        }
    }

    Ok(input)
}

/// POST /api/documents/upload (multipart: file, application_id, document_type)
pub async fn upload_document(
    user: AuthUser,
    State(state): State<AppState>,
    headers: HeaderMap,
    multipart: Multipart,
) -> AppResult<Json<UploadResponse>> {
    let input = read_upload(multipart).await.map_err(tag_request(&headers))?;
    let document = state
        .uploads
        .upload(&user, input)
        .await
        .map_err(tag_request(&headers))?;

    Ok(Json(UploadResponse {
        success: true,
        data: document,
    }))
}
