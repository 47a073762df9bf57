//! Final application submission
//!
//! Submission re-checks eligibility from the stored row, freezes a snapshot
//! with signed document links, then flips the row to submitted and locked in a
//! single conditional write. The snapshot is written first and separately; a
//! failed snapshot is logged and does not block the submission.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::database::application_repository::{ApplicationStatus, VisaApplication};
use crate::database::repository::{
    ApplicationRepository, DocumentRepository, PaymentRepository, SnapshotRepository,
};
use crate::database::snapshot_repository::{DocumentUrl, NewSnapshot};
use crate::error::{AppError, AppErrorKind, AppResult, DomainError};
use crate::middleware::auth::AuthUser;
use crate::services::application::ensure_editable;
use crate::services::eligibility::{self, EligibilityInput};
use crate::services::notification::{Notification, NotificationDispatcher};
use crate::storage::ObjectStorage;

/// Signed document links in the snapshot stay valid for 30 days
pub const DOCUMENT_URL_TTL: Duration = Duration::from_secs(30 * 24 * 60 * 60);

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionResult {
    pub success: bool,
    pub application_id: Uuid,
    pub snapshot_created: bool,
    pub locked: bool,
}

pub struct SubmissionService {
    applications: Arc<dyn ApplicationRepository>,
    documents: Arc<dyn DocumentRepository>,
    payments: Arc<dyn PaymentRepository>,
    snapshots: Arc<dyn SnapshotRepository>,
    storage: Arc<dyn ObjectStorage>,
    notifications: Arc<NotificationDispatcher>,
}

impl SubmissionService {
    pub fn new(
        applications: Arc<dyn ApplicationRepository>,
        documents: Arc<dyn DocumentRepository>,
        payments: Arc<dyn PaymentRepository>,
        snapshots: Arc<dyn SnapshotRepository>,
        storage: Arc<dyn ObjectStorage>,
        notifications: Arc<NotificationDispatcher>,
    ) -> Self {
        Self {
            applications,
            documents,
            payments,
            snapshots,
            storage,
            notifications,
        }
    }

    pub async fn submit(&self, user: &AuthUser, application_id: Uuid) -> AppResult<SubmissionResult> {
        let application = self
            .applications
            .find_by_id(application_id)
            .await?
            .ok_or_else(|| AppError::not_found("Application", application_id))?;
        if application.user_id != user.user_id {
            return Err(AppError::not_owner("Application", application_id));
        }
        ensure_editable(&application)?;

        let verdict = eligibility::evaluate(&EligibilityInput {
            nationality: application.nationality.clone(),
            nationality_by_birth: application.nationality_by_birth,
            passport_place_of_issue: application.passport_place_of_issue.clone(),
            country_of_birth: application.country_of_birth.clone(),
        });
        if !verdict.eligible {
            info!(application_id = %application_id, "submission blocked by eligibility rule");
            return Err(AppError::new(AppErrorKind::Domain(DomainError::Ineligible {
                reason: verdict.error.unwrap_or_default(),
            })));
        }

        let submitted_at = Utc::now();
        let snapshot_created = self
            .write_snapshot(&application, user.user_id, submitted_at)
            .await;

        let submitted = self
            .applications
            .mark_submitted(application_id, submitted_at)
            .await?
            .ok_or_else(|| {
                warn!(application_id = %application_id, "lost submission race");
                AppError::new(AppErrorKind::Domain(DomainError::Locked {
                    application_id: application_id.to_string(),
                }))
            })?;

        info!(
            application_id = %application_id,
            user_id = %user.user_id,
            snapshot_created,
            "🔒 application submitted"
        );

        let mut notifications = vec![Notification::AdminSubmissionNotice {
            application: submitted.clone(),
        }];
        match submitted.email.clone().or_else(|| user.email.clone()) {
            Some(to) => notifications.push(Notification::SubmissionConfirmation {
                application: submitted.clone(),
                to,
            }),
            None => warn!(application_id = %application_id, "no applicant email for confirmation"),
        }
        self.notifications.dispatch(notifications).await;

        Ok(SubmissionResult {
            success: true,
            application_id,
            snapshot_created,
            locked: submitted.is_locked,
        })
    }

    /// Best-effort snapshot; returns whether it was stored
    async fn write_snapshot(
        &self,
        application: &VisaApplication,
        submitted_by: Uuid,
        submitted_at: DateTime<Utc>,
    ) -> bool {
        let document_urls = self.sign_documents(application.id).await;

        let payment_id = match self
            .payments
            .find_completed_for_application(application.id)
            .await
        {
            Ok(payment) => payment.map(|p| p.id),
            Err(e) => {
                warn!(application_id = %application.id, error = %e, "could not look up payment for snapshot");
                None
            }
        };

        let mut frozen = application.clone();
        frozen.status = ApplicationStatus::Submitted;
        frozen.is_locked = true;
        frozen.submitted_at = Some(submitted_at);
        let snapshot_data = match serde_json::to_value(&frozen) {
            Ok(value) => value,
            Err(e) => {
                error!(application_id = %application.id, error = %e, "failed to serialize snapshot");
                return false;
            }
        };

        match self
            .snapshots
            .upsert(NewSnapshot {
                application_id: application.id,
                payment_id,
                snapshot_data,
                document_urls,
                submitted_at,
                submitted_by,
            })
            .await
        {
            Ok(_) => true,
            Err(e) => {
                error!(application_id = %application.id, error = %e, "snapshot write failed");
                false
            }
        }
    }

    async fn sign_documents(&self, application_id: Uuid) -> Vec<DocumentUrl> {
        let documents = match self.documents.list_for_application(application_id).await {
            Ok(documents) => documents,
            Err(e) => {
                warn!(application_id = %application_id, error = %e, "could not list documents for snapshot");
                return Vec::new();
            }
        };

        let mut urls = Vec::with_capacity(documents.len());
        for document in documents {
            match self
                .storage
                .signed_url(&document.file_path, DOCUMENT_URL_TTL)
                .await
            {
                Ok(url) => urls.push(DocumentUrl {
                    document_type: document.document_type.to_string(),
                    name: document.file_name,
                    url,
                }),
                Err(e) => {
                    warn!(key = %document.file_path, error = %e, "skipping unsignable document");
                }
            }
        }
        urls
    }
}
