//! Draft applications written by the form wizard

use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::database::application_repository::{ApplicationDraft, VisaApplication};
use crate::database::repository::ApplicationRepository;
use crate::error::{AppError, AppErrorKind, AppResult, DomainError};
use crate::middleware::auth::AuthUser;

/// Reject a non-draft or locked application
pub fn ensure_editable(application: &VisaApplication) -> AppResult<()> {
    if application.is_locked {
        return Err(AppError::new(AppErrorKind::Domain(DomainError::Locked {
            application_id: application.id.to_string(),
        })));
    }
    if !application.is_editable() {
        return Err(AppError::new(AppErrorKind::Domain(DomainError::NotDraft {
            application_id: application.id.to_string(),
            status: application.status.to_string(),
        })));
    }
    Ok(())
}

pub struct ApplicationService {
    applications: Arc<dyn ApplicationRepository>,
}

impl ApplicationService {
    pub fn new(applications: Arc<dyn ApplicationRepository>) -> Self {
        Self { applications }
    }

    pub async fn create(&self, user: &AuthUser, draft: ApplicationDraft) -> AppResult<VisaApplication> {
        let mut application = VisaApplication::new_draft(user.user_id);
        draft.apply_to(&mut application);
        if application.email.is_none() {
            application.email = user.email.clone();
        }
        let created = self.applications.create(&application).await?;
        info!(application_id = %created.id, user_id = %user.user_id, "draft created");
        Ok(created)
    }

    /// Owner-only read
    pub async fn get(&self, user: &AuthUser, id: Uuid) -> AppResult<VisaApplication> {
        let application = self
            .applications
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::not_found("Application", id))?;
        if application.user_id != user.user_id {
            return Err(AppError::not_owner("Application", id));
        }
        Ok(application)
    }

    pub async fn update(
        &self,
        user: &AuthUser,
        id: Uuid,
        draft: ApplicationDraft,
    ) -> AppResult<VisaApplication> {
        let current = self.get(user, id).await?;
        ensure_editable(&current)?;

        // The guarded write catches a submission that lands in between.
        self.applications
            .update_draft(id, &draft)
            .await?
            .ok_or_else(|| locked(id))
    }

    pub async fn delete(&self, user: &AuthUser, id: Uuid) -> AppResult<()> {
        let current = self.get(user, id).await?;
        ensure_editable(&current)?;

        if !self.applications.delete_draft(id).await? {
            return Err(locked(id));
        }
        info!(application_id = %id, user_id = %user.user_id, "draft deleted");
        Ok(())
    }
}

fn locked(id: Uuid) -> AppError {
    AppError::new(AppErrorKind::Domain(DomainError::Locked {
        application_id: id.to_string(),
    }))
}
