//! Repository seams
//!
//! Each table has a trait with a Postgres implementation next to its entity and
//! an in-memory implementation in [`crate::database::memory`]. Conditional
//! writes return `None` (or `false`) when the row is absent or the guard did
//! not hold; callers decide whether that is a conflict or a no-op.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::database::application_repository::{ApplicationDraft, VisaApplication};
use crate::database::document_repository::{
    ApplicationDocument, DocumentReplacement, NewDocument,
};
use crate::database::error::DatabaseError;
use crate::database::payment_repository::{CaptureRecord, NewPayment, Payment};
use crate::database::snapshot_repository::{ApplicationSnapshot, NewSnapshot};

#[async_trait]
pub trait ApplicationRepository: Send + Sync {
    async fn create(&self, application: &VisaApplication) -> Result<VisaApplication, DatabaseError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<VisaApplication>, DatabaseError>;

    /// Merge `draft` into the row only while it is an unlocked draft
    async fn update_draft(
        &self,
        id: Uuid,
        draft: &ApplicationDraft,
    ) -> Result<Option<VisaApplication>, DatabaseError>;

    /// Delete only while it is an unlocked draft
    async fn delete_draft(&self, id: Uuid) -> Result<bool, DatabaseError>;

    /// draft → submitted with lock and timestamp in one write; `None` if the
    /// row was no longer an unlocked draft
    async fn mark_submitted(
        &self,
        id: Uuid,
        submitted_at: DateTime<Utc>,
    ) -> Result<Option<VisaApplication>, DatabaseError>;
}

#[async_trait]
pub trait PaymentRepository: Send + Sync {
    async fn insert_pending(&self, payment: NewPayment) -> Result<Payment, DatabaseError>;

    async fn find_by_order_id(&self, order_id: &str) -> Result<Option<Payment>, DatabaseError>;

    async fn find_completed_for_application(
        &self,
        application_id: Uuid,
    ) -> Result<Option<Payment>, DatabaseError>;

    /// pending/failed/completed → completed
    async fn mark_completed(
        &self,
        order_id: &str,
        capture: &CaptureRecord,
    ) -> Result<Option<Payment>, DatabaseError>;

    /// pending/failed → failed
    async fn mark_failed(&self, order_id: &str) -> Result<Option<Payment>, DatabaseError>;

    /// failed → pending (payer re-approved); pending stays pending
    async fn mark_approved(&self, order_id: &str) -> Result<Option<Payment>, DatabaseError>;

    /// completed → refunded, looked up by capture id
    async fn mark_refunded(
        &self,
        capture_id: &str,
        refunded_at: DateTime<Utc>,
    ) -> Result<Option<Payment>, DatabaseError>;

    /// Atomically flip `thank_you_email_sent`; true for exactly one caller
    async fn claim_thank_you_email(&self, order_id: &str) -> Result<bool, DatabaseError>;
}

#[async_trait]
pub trait DocumentRepository: Send + Sync {
    /// Delete any row for the same (application, type) and insert this one
    async fn replace(&self, document: NewDocument) -> Result<DocumentReplacement, DatabaseError>;

    async fn list_for_application(
        &self,
        application_id: Uuid,
    ) -> Result<Vec<ApplicationDocument>, DatabaseError>;
}

#[async_trait]
pub trait SnapshotRepository: Send + Sync {
    /// Insert or overwrite the snapshot keyed by application id
    async fn upsert(&self, snapshot: NewSnapshot) -> Result<ApplicationSnapshot, DatabaseError>;

    async fn find_by_application(
        &self,
        application_id: Uuid,
    ) -> Result<Option<ApplicationSnapshot>, DatabaseError>;
}
