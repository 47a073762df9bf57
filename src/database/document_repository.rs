use crate::database::error::DatabaseError;
use crate::database::repository::DocumentRepository;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use std::str::FromStr;
use uuid::Uuid;

const MIB: u64 = 1024 * 1024;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "document_type", rename_all = "snake_case")]
pub enum DocumentType {
    Photo,
    Passport,
    Other,
}

impl DocumentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentType::Photo => "photo",
            DocumentType::Passport => "passport",
            DocumentType::Other => "other",
        }
    }

    /// Upper bound on upload size in bytes
    pub fn max_size(&self) -> u64 {
        match self {
            DocumentType::Photo => MIB,
            DocumentType::Passport | DocumentType::Other => 2 * MIB,
        }
    }

    pub fn allowed_mime_types(&self) -> &'static [&'static str] {
        match self {
            DocumentType::Photo => &["image/jpeg"],
            DocumentType::Passport => &["application/pdf"],
            DocumentType::Other => &["application/pdf", "image/jpeg"],
        }
    }

    pub fn allows_mime_type(&self, mime_type: &str) -> bool {
        let essence = mime_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_lowercase();
        self.allowed_mime_types().contains(&essence.as_str())
    }
}

impl std::fmt::Display for DocumentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for DocumentType {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "photo" => Ok(DocumentType::Photo),
            "passport" => Ok(DocumentType::Passport),
            "other" => Ok(DocumentType::Other),
            other => Err(format!(
                "'{}' is not one of photo, passport, other",
                other
            )),
        }
    }
}

/// Uploaded document metadata
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationDocument {
    pub id: Uuid,
    pub application_id: Uuid,
    pub user_id: Uuid,
    pub document_type: DocumentType,
    pub file_name: String,
    pub file_path: String,
    pub file_size: i64,
    pub mime_type: String,
    pub uploaded_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewDocument {
    pub application_id: Uuid,
    pub user_id: Uuid,
    pub document_type: DocumentType,
    pub file_name: String,
    pub file_path: String,
    pub file_size: i64,
    pub mime_type: String,
}

impl NewDocument {
    pub fn into_document(self) -> ApplicationDocument {
        ApplicationDocument {
            id: Uuid::new_v4(),
            application_id: self.application_id,
            user_id: self.user_id,
            document_type: self.document_type,
            file_name: self.file_name,
            file_path: self.file_path,
            file_size: self.file_size,
            mime_type: self.mime_type,
            uploaded_at: Utc::now(),
        }
    }
}

/// Outcome of replacing the (application, type) slot
#[derive(Debug, Clone)]
pub struct DocumentReplacement {
    pub document: ApplicationDocument,
    /// Row that previously occupied the slot, if any
    pub previous: Option<ApplicationDocument>,
}

const DOCUMENT_COLUMNS: &str = "id, application_id, user_id, document_type, file_name, \
     file_path, file_size, mime_type, uploaded_at";

/// Postgres-backed document repository
pub struct PgDocumentRepository {
    pool: PgPool,
}

impl PgDocumentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DocumentRepository for PgDocumentRepository {
    async fn replace(&self, document: NewDocument) -> Result<DocumentReplacement, DatabaseError> {
        let mut tx = self.pool.begin().await.map_err(DatabaseError::from_sqlx)?;

        let previous = sqlx::query_as::<_, ApplicationDocument>(&format!(
            "DELETE FROM application_documents
             WHERE application_id = $1 AND document_type = $2
             RETURNING {}",
            DOCUMENT_COLUMNS
        ))
        .bind(document.application_id)
        .bind(document.document_type)
        .fetch_optional(&mut *tx)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        let inserted = sqlx::query_as::<_, ApplicationDocument>(&format!(
            "INSERT INTO application_documents
             (application_id, user_id, document_type, file_name, file_path, file_size, mime_type)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING {}",
            DOCUMENT_COLUMNS
        ))
        .bind(document.application_id)
        .bind(document.user_id)
        .bind(document.document_type)
        .bind(&document.file_name)
        .bind(&document.file_path)
        .bind(document.file_size)
        .bind(&document.mime_type)
        .fetch_one(&mut *tx)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        tx.commit().await.map_err(DatabaseError::from_sqlx)?;

        Ok(DocumentReplacement {
            document: inserted,
            previous,
        })
    }

    async fn list_for_application(
        &self,
        application_id: Uuid,
    ) -> Result<Vec<ApplicationDocument>, DatabaseError> {
        sqlx::query_as::<_, ApplicationDocument>(&format!(
            "SELECT {} FROM application_documents
             WHERE application_id = $1
             ORDER BY document_type ASC",
            DOCUMENT_COLUMNS
        ))
        .bind(application_id)
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }
}
