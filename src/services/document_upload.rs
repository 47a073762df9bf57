//! Document uploads
//!
//! Type, size and MIME policy is enforced here regardless of what the client
//! checked. Each (application, type) slot holds one document; a new upload
//! replaces the row and then removes the superseded object.

use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::database::document_repository::{ApplicationDocument, DocumentType, NewDocument};
use crate::database::repository::{ApplicationRepository, DocumentRepository};
use crate::error::{AppError, AppErrorKind, AppResult, ValidationError};
use crate::middleware::auth::AuthUser;
use crate::services::application::ensure_editable;
use crate::storage::ObjectStorage;

/// One multipart upload, already read off the wire
#[derive(Debug, Clone, Default)]
pub struct UploadInput {
    pub application_id: Option<String>,
    pub document_type: Option<String>,
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// Keep letters, digits, dot, dash and underscore; anything else becomes `_`
pub fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name).trim();
    let cleaned: String = base
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || ".-_".contains(c) { c } else { '_' })
        .collect();
    if cleaned.trim_matches(['.', '_']).is_empty() {
        "document".to_string()
    } else {
        cleaned
    }
}

pub fn storage_key(user_id: Uuid, document_type: DocumentType, file_name: &str) -> String {
    format!(
        "{}/{}/{}_{}",
        user_id,
        document_type,
        Utc::now().timestamp_millis(),
        sanitize_file_name(file_name)
    )
}

/// Validated upload ready to be stored
#[derive(Debug)]
struct CheckedUpload {
    application_id: Uuid,
    document_type: DocumentType,
    file_name: String,
    mime_type: String,
    bytes: Vec<u8>,
}

fn check(input: UploadInput) -> AppResult<CheckedUpload> {
    let document_type: DocumentType = input
        .document_type
        .as_deref()
        .ok_or_else(|| AppError::missing_field("document_type"))?
        .parse()
        .map_err(|reason: String| AppError::invalid_field("document_type", reason))?;

    let raw_id = input
        .application_id
        .as_deref()
        .map(str::trim)
        .ok_or_else(|| AppError::missing_field("application_id"))?;
    let application_id = Uuid::parse_str(raw_id)
        .map_err(|e| AppError::invalid_field("application_id", format!("must be a UUID: {}", e)))?;

    if input.bytes.is_empty() {
        return Err(AppError::missing_field("file"));
    }

    let size = input.bytes.len() as u64;
    if size > document_type.max_size() {
        return Err(AppError::new(AppErrorKind::Validation(
            ValidationError::FileTooLarge {
                document_type: document_type.to_string(),
                size,
                max: document_type.max_size(),
            },
        )));
    }

    let mime_type = input.content_type.unwrap_or_default();
    if !document_type.allows_mime_type(&mime_type) {
        return Err(AppError::new(AppErrorKind::Validation(
            ValidationError::UnsupportedMimeType {
                document_type: document_type.to_string(),
                mime_type,
            },
        )));
    }

    Ok(CheckedUpload {
        application_id,
        document_type,
        file_name: input.file_name.unwrap_or_else(|| "document".to_string()),
        mime_type,
        bytes: input.bytes,
    })
}

pub struct DocumentUploadService {
    applications: Arc<dyn ApplicationRepository>,
    documents: Arc<dyn DocumentRepository>,
    storage: Arc<dyn ObjectStorage>,
}

impl DocumentUploadService {
    pub fn new(
        applications: Arc<dyn ApplicationRepository>,
        documents: Arc<dyn DocumentRepository>,
        storage: Arc<dyn ObjectStorage>,
    ) -> Self {
        Self {
            applications,
            documents,
            storage,
        }
    }

    pub async fn upload(&self, user: &AuthUser, input: UploadInput) -> AppResult<ApplicationDocument> {
        let upload = check(input)?;

        let application = self
            .applications
            .find_by_id(upload.application_id)
            .await?
            .ok_or_else(|| AppError::not_found("Application", upload.application_id))?;
        if application.user_id != user.user_id {
            return Err(AppError::not_owner("Application", upload.application_id));
        }
        ensure_editable(&application)?;

        let key = storage_key(user.user_id, upload.document_type, &upload.file_name);
        let file_size = upload.bytes.len() as i64;
        self.storage
            .upload(&key, upload.bytes, &upload.mime_type)
            .await?;

        let replacement = match self
            .documents
            .replace(NewDocument {
                application_id: upload.application_id,
                user_id: user.user_id,
                document_type: upload.document_type,
                file_name: upload.file_name,
                file_path: key.clone(),
                file_size,
                mime_type: upload.mime_type,
            })
            .await
        {
            Ok(replacement) => replacement,
            Err(e) => {
                warn!(key = %key, error = %e, "document metadata write failed, removing object");
                if let Err(cleanup) = self.storage.remove(&key).await {
                    warn!(key = %key, error = %cleanup, "failed to remove orphaned object");
                }
                return Err(e.into());
            }
        };

        if let Some(previous) = &replacement.previous {
            if previous.file_path != key {
                if let Err(e) = self.storage.remove(&previous.file_path).await {
                    warn!(key = %previous.file_path, error = %e, "failed to remove replaced object");
                }
            }
        }

        info!(
            application_id = %upload.application_id,
            user_id = %user.user_id,
            document_type = %upload.document_type,
            key = %key,
            replaced = replacement.previous.is_some(),
            "📎 document uploaded"
        );
        Ok(replacement.document)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(document_type: &str, content_type: &str, size: usize) -> UploadInput {
        UploadInput {
            application_id: Some(Uuid::new_v4().to_string()),
            document_type: Some(document_type.to_string()),
            file_name: Some("scan.pdf".to_string()),
            content_type: Some(content_type.to_string()),
            bytes: vec![1; size],
        }
    }

    fn status(result: AppResult<CheckedUpload>) -> u16 {
        result.unwrap_err().status_code()
    }

    #[test]
    fn accepts_within_policy() {
        assert!(check(input("photo", "image/jpeg", 1024 * 1024)).is_ok());
        assert!(check(input("passport", "application/pdf", 2 * 1024 * 1024)).is_ok());
        assert!(check(input("other", "image/jpeg", 10)).is_ok());
    }

    #[test]
    fn rejects_outside_policy() {
        assert_eq!(status(check(input("visa", "image/jpeg", 10))), 400);
        assert_eq!(status(check(input("photo", "image/jpeg", 1024 * 1024 + 1))), 400);
        assert_eq!(status(check(input("photo", "image/png", 10))), 400);
        assert_eq!(status(check(input("passport", "image/jpeg", 10))), 400);
        assert_eq!(status(check(input("passport", "application/pdf", 0))), 400);

        let mut bad_id = input("photo", "image/jpeg", 10);
        bad_id.application_id = Some("not-a-uuid".to_string());
        assert_eq!(status(check(bad_id)), 400);
    }

    #[test]
    fn sanitizes_file_names() {
        assert_eq!(sanitize_file_name("my passport (1).pdf"), "my_passport__1_.pdf");
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name("C:\\scans\\me.jpg"), "me.jpg");
        assert_eq!(sanitize_file_name("..."), "document");
    }

    #[test]
    fn storage_key_layout() {
        let user = Uuid::new_v4();
        let key = storage_key(user, DocumentType::Photo, "me.jpg");
        let parts: Vec<&str> = key.split('/').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], user.to_string());
        assert_eq!(parts[1], "photo");
        let (millis, name) = parts[2].split_once('_').unwrap();
        assert!(millis.parse::<i64>().is_ok());
        assert_eq!(name, "me.jpg");
    }

    #[test]
    fn application_id_is_trimmed_and_parsed() {
        let id = Uuid::new_v4();
        let mut padded = input("photo", "image/jpeg", 10);
        padded.application_id = Some(format!(" {} ", id));
        assert_eq!(check(padded).unwrap().application_id, id);

        let mut truncated = input("photo", "image/jpeg", 10);
        truncated.application_id = Some("6f1c1a52-0a4e-4bd4-9d3b".to_string());
        assert_eq!(status(check(truncated)), 400);
    }
}
