use crate::database::error::DatabaseError;
use crate::database::repository::SnapshotRepository;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

/// Signed link to one uploaded document, frozen into the snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentUrl {
    #[serde(rename = "type")]
    pub document_type: String,
    pub name: String,
    pub url: String,
}

/// Immutable record of an application as submitted
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationSnapshot {
    pub id: Uuid,
    pub application_id: Uuid,
    pub payment_id: Option<Uuid>,
    pub snapshot_data: Json<serde_json::Value>,
    pub document_urls: Json<Vec<DocumentUrl>>,
    pub submitted_at: DateTime<Utc>,
    pub submitted_by: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewSnapshot {
    pub application_id: Uuid,
    pub payment_id: Option<Uuid>,
    pub snapshot_data: serde_json::Value,
    pub document_urls: Vec<DocumentUrl>,
    pub submitted_at: DateTime<Utc>,
    pub submitted_by: Uuid,
}

const SNAPSHOT_COLUMNS: &str = "id, application_id, payment_id, snapshot_data, document_urls, \
     submitted_at, submitted_by, created_at";

/// Postgres-backed snapshot repository
pub struct PgSnapshotRepository {
    pool: PgPool,
}

impl PgSnapshotRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SnapshotRepository for PgSnapshotRepository {
    async fn upsert(&self, snapshot: NewSnapshot) -> Result<ApplicationSnapshot, DatabaseError> {
        sqlx::query_as::<_, ApplicationSnapshot>(&format!(
            "INSERT INTO application_snapshots
             (application_id, payment_id, snapshot_data, document_urls, submitted_at, submitted_by)
             VALUES ($1, $2, $3, $4, $5, $6)
             ON CONFLICT (application_id) DO UPDATE SET
                payment_id = EXCLUDED.payment_id,
                snapshot_data = EXCLUDED.snapshot_data,
                document_urls = EXCLUDED.document_urls,
                submitted_at = EXCLUDED.submitted_at,
                submitted_by = EXCLUDED.submitted_by
             RETURNING {}",
            SNAPSHOT_COLUMNS
        ))
        .bind(snapshot.application_id)
        .bind(snapshot.payment_id)
        .bind(Json(&snapshot.snapshot_data))
        .bind(Json(&snapshot.document_urls))
        .bind(snapshot.submitted_at)
        .bind(snapshot.submitted_by)
        .fetch_one(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    async fn find_by_application(
        &self,
        application_id: Uuid,
    ) -> Result<Option<ApplicationSnapshot>, DatabaseError> {
        sqlx::query_as::<_, ApplicationSnapshot>(&format!(
            "SELECT {} FROM application_snapshots WHERE application_id = $1",
            SNAPSHOT_COLUMNS
        ))
        .bind(application_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_url_uses_type_key() {
        let url = DocumentUrl {
            document_type: "photo".to_string(),
            name: "me.jpg".to_string(),
            url: "https://storage/signed".to_string(),
        };
        let json = serde_json::to_value(&url).unwrap();
        assert_eq!(json["type"], "photo");
        assert_eq!(json["name"], "me.jpg");
    }
}
