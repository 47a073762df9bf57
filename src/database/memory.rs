//! In-memory repositories
//!
//! Used when the service runs with `SKIP_EXTERNALS=true` and by the test
//! suites. Conditional writes follow the same guards as the SQL versions.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::database::application_repository::{ApplicationDraft, ApplicationStatus, VisaApplication};
use crate::database::document_repository::{
    ApplicationDocument, DocumentReplacement, DocumentType, NewDocument,
};
use crate::database::error::{DatabaseError, DatabaseErrorKind};
use crate::database::payment_repository::{CaptureRecord, NewPayment, Payment, PaymentStatus};
use crate::database::repository::{
    ApplicationRepository, DocumentRepository, PaymentRepository, SnapshotRepository,
};
use crate::database::snapshot_repository::{ApplicationSnapshot, NewSnapshot};

#[derive(Default)]
pub struct InMemoryStore {
    applications: Mutex<HashMap<Uuid, VisaApplication>>,
    payments: Mutex<HashMap<String, Payment>>,
    documents: Mutex<HashMap<(Uuid, DocumentType), ApplicationDocument>>,
    snapshots: Mutex<HashMap<Uuid, ApplicationSnapshot>>,
    fail_document_writes: AtomicBool,
    fail_snapshot_writes: AtomicBool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent document writes fail, to exercise cleanup paths
    pub fn set_fail_document_writes(&self, fail: bool) {
        self.fail_document_writes.store(fail, Ordering::SeqCst);
    }

    /// Make subsequent snapshot writes fail
    pub fn set_fail_snapshot_writes(&self, fail: bool) {
        self.fail_snapshot_writes.store(fail, Ordering::SeqCst);
    }

    /// Insert a fully-formed application row as-is
    pub async fn put_application(&self, application: VisaApplication) {
        self.applications
            .lock()
            .await
            .insert(application.id, application);
    }

    pub async fn documents_for(&self, application_id: Uuid) -> Vec<ApplicationDocument> {
        self.documents
            .lock()
            .await
            .values()
            .filter(|d| d.application_id == application_id)
            .cloned()
            .collect()
    }

    pub async fn payment_count(&self) -> usize {
        self.payments.lock().await.len()
    }

    fn injected_failure(flag: &AtomicBool, operation: &str) -> Result<(), DatabaseError> {
        if flag.load(Ordering::SeqCst) {
            return Err(DatabaseError::unknown(format!(
                "injected failure during {}",
                operation
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl ApplicationRepository for InMemoryStore {
    async fn create(&self, application: &VisaApplication) -> Result<VisaApplication, DatabaseError> {
        let mut applications = self.applications.lock().await;
        if applications.contains_key(&application.id) {
            return Err(DatabaseError::new(DatabaseErrorKind::UniqueViolation {
                constraint: Some("visa_applications_pkey".to_string()),
            }));
        }
        applications.insert(application.id, application.clone());
        Ok(application.clone())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<VisaApplication>, DatabaseError> {
        Ok(self.applications.lock().await.get(&id).cloned())
    }

    async fn update_draft(
        &self,
        id: Uuid,
        draft: &ApplicationDraft,
    ) -> Result<Option<VisaApplication>, DatabaseError> {
        let mut applications = self.applications.lock().await;
        match applications.get_mut(&id) {
            Some(application) if application.is_editable() => {
                draft.apply_to(application);
                Ok(Some(application.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn delete_draft(&self, id: Uuid) -> Result<bool, DatabaseError> {
        let mut applications = self.applications.lock().await;
        let editable = applications
            .get(&id)
            .map(VisaApplication::is_editable)
            .unwrap_or(false);
        if editable {
            applications.remove(&id);
        }
        Ok(editable)
    }

    async fn mark_submitted(
        &self,
        id: Uuid,
        submitted_at: DateTime<Utc>,
    ) -> Result<Option<VisaApplication>, DatabaseError> {
        let mut applications = self.applications.lock().await;
        match applications.get_mut(&id) {
            Some(application) if application.is_editable() => {
                application.status = ApplicationStatus::Submitted;
                application.submitted_at = Some(submitted_at);
                application.is_locked = true;
                application.updated_at = Utc::now();
                Ok(Some(application.clone()))
            }
            _ => Ok(None),
        }
    }
}

impl InMemoryStore {
    async fn transition(
        &self,
        order_id: &str,
        next: PaymentStatus,
        update: impl FnOnce(&mut Payment),
    ) -> Option<Payment> {
        let mut payments = self.payments.lock().await;
        let payment = payments.get_mut(order_id)?;
        if !payment.status.can_transition_to(next) {
            return None;
        }
        payment.status = next;
        update(payment);
        payment.updated_at = Utc::now();
        Some(payment.clone())
    }
}

#[async_trait]
impl PaymentRepository for InMemoryStore {
    async fn insert_pending(&self, payment: NewPayment) -> Result<Payment, DatabaseError> {
        let mut payments = self.payments.lock().await;
        if payments.contains_key(&payment.paypal_order_id) {
            return Err(DatabaseError::new(DatabaseErrorKind::UniqueViolation {
                constraint: Some("payments_paypal_order_id_key".to_string()),
            }));
        }
        let row = payment.into_pending();
        payments.insert(row.paypal_order_id.clone(), row.clone());
        Ok(row)
    }

    async fn find_by_order_id(&self, order_id: &str) -> Result<Option<Payment>, DatabaseError> {
        Ok(self.payments.lock().await.get(order_id).cloned())
    }

    async fn find_completed_for_application(
        &self,
        application_id: Uuid,
    ) -> Result<Option<Payment>, DatabaseError> {
        Ok(self
            .payments
            .lock()
            .await
            .values()
            .filter(|p| {
                p.application_id == Some(application_id) && p.status == PaymentStatus::Completed
            })
            .max_by_key(|p| p.captured_at)
            .cloned())
    }

    async fn mark_completed(
        &self,
        order_id: &str,
        capture: &CaptureRecord,
    ) -> Result<Option<Payment>, DatabaseError> {
        Ok(self
            .transition(order_id, PaymentStatus::Completed, |payment| {
                if capture.capture_id.is_some() {
                    payment.paypal_capture_id = capture.capture_id.clone();
                }
                if capture.payer_email.is_some() {
                    payment.payer_email = capture.payer_email.clone();
                }
                if capture.payer_name.is_some() {
                    payment.payer_name = capture.payer_name.clone();
                }
                if payment.captured_at.is_none() {
                    payment.captured_at = Some(capture.captured_at);
                }
            })
            .await)
    }

    async fn mark_failed(&self, order_id: &str) -> Result<Option<Payment>, DatabaseError> {
        Ok(self
            .transition(order_id, PaymentStatus::Failed, |_| {})
            .await)
    }

    async fn mark_approved(&self, order_id: &str) -> Result<Option<Payment>, DatabaseError> {
        Ok(self
            .transition(order_id, PaymentStatus::Pending, |_| {})
            .await)
    }

    async fn mark_refunded(
        &self,
        capture_id: &str,
        refunded_at: DateTime<Utc>,
    ) -> Result<Option<Payment>, DatabaseError> {
        let order_id = {
            let payments = self.payments.lock().await;
            payments
                .values()
                .find(|p| p.paypal_capture_id.as_deref() == Some(capture_id))
                .map(|p| p.paypal_order_id.clone())
        };
        let order_id = match order_id {
            Some(order_id) => order_id,
            None => return Ok(None),
        };

        Ok(self
            .transition(&order_id, PaymentStatus::Refunded, |payment| {
                if payment.refunded_at.is_none() {
                    payment.refunded_at = Some(refunded_at);
                }
            })
            .await)
    }

    async fn claim_thank_you_email(&self, order_id: &str) -> Result<bool, DatabaseError> {
        let mut payments = self.payments.lock().await;
        match payments.get_mut(order_id) {
            Some(payment) if !payment.thank_you_email_sent => {
                payment.thank_you_email_sent = true;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[async_trait]
impl DocumentRepository for InMemoryStore {
    async fn replace(&self, document: NewDocument) -> Result<DocumentReplacement, DatabaseError> {
        Self::injected_failure(&self.fail_document_writes, "document insert")?;

        let document = document.into_document();
        let previous = self
            .documents
            .lock()
            .await
            .insert((document.application_id, document.document_type), document.clone());

        Ok(DocumentReplacement { document, previous })
    }

    async fn list_for_application(
        &self,
        application_id: Uuid,
    ) -> Result<Vec<ApplicationDocument>, DatabaseError> {
        let mut documents = self.documents_for(application_id).await;
        documents.sort_by_key(|d| d.document_type.as_str());
        Ok(documents)
    }
}

#[async_trait]
impl SnapshotRepository for InMemoryStore {
    async fn upsert(&self, snapshot: NewSnapshot) -> Result<ApplicationSnapshot, DatabaseError> {
        Self::injected_failure(&self.fail_snapshot_writes, "snapshot upsert")?;

        let mut snapshots = self.snapshots.lock().await;
        let id = snapshots
            .get(&snapshot.application_id)
            .map(|s| s.id)
            .unwrap_or_else(Uuid::new_v4);
        let row = ApplicationSnapshot {
            id,
            application_id: snapshot.application_id,
            payment_id: snapshot.payment_id,
            snapshot_data: sqlx::types::Json(snapshot.snapshot_data),
            document_urls: sqlx::types::Json(snapshot.document_urls),
            submitted_at: snapshot.submitted_at,
            submitted_by: snapshot.submitted_by,
            created_at: Utc::now(),
        };
        snapshots.insert(row.application_id, row.clone());
        Ok(row)
    }

    async fn find_by_application(
        &self,
        application_id: Uuid,
    ) -> Result<Option<ApplicationSnapshot>, DatabaseError> {
        Ok(self.snapshots.lock().await.get(&application_id).cloned())
    }
}
