use axum::{
    body::Bytes,
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use super::{json_body, tag_request, AppState};
use crate::database::application_repository::{ApplicationDraft, VisaApplication};
use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::services::eligibility::{self, EligibilityInput, EligibilityResult};
use crate::services::submission::SubmissionResult;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitRequest {
    pub application_id: Uuid,
}

fn path_id(id: Result<Path<Uuid>, PathRejection>) -> AppResult<Uuid> {
    id.map(|Path(id)| id)
        .map_err(|rejection| AppError::invalid_field("id", rejection.body_text()))
}

/// POST /api/eligibility
///
/// Advisory check for the wizard; submission evaluates the same rule again.
pub async fn check_eligibility(
    headers: HeaderMap,
    body: Result<Json<EligibilityInput>, JsonRejection>,
) -> AppResult<Json<EligibilityResult>> {
    let input = json_body(body).map_err(tag_request(&headers))?;
    Ok(Json(eligibility::evaluate(&input)))
}

/// POST /api/applications/submit
pub async fn submit_application(
    user: AuthUser,
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<SubmitRequest>, JsonRejection>,
) -> AppResult<Json<SubmissionResult>> {
    let request = json_body(body).map_err(tag_request(&headers))?;
    let result = state
        .submissions
        .submit(&user, request.application_id)
        .await
        .map_err(tag_request(&headers))?;
    Ok(Json(result))
}

/// POST /api/applications
pub async fn create_draft(
    user: AuthUser,
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<(StatusCode, Json<VisaApplication>)> {
    // The wizard may create an empty draft before the first step is filled in.
    let draft = if body.is_empty() {
        ApplicationDraft::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| tag_request(&headers)(AppError::invalid_field("body", e.to_string())))?
    };
    let application = state
        .applications
        .create(&user, draft)
        .await
        .map_err(tag_request(&headers))?;
    Ok((StatusCode::CREATED, Json(application)))
}

/// GET /api/applications/{id}
pub async fn get_draft(
    user: AuthUser,
    State(state): State<AppState>,
    headers: HeaderMap,
    id: Result<Path<Uuid>, PathRejection>,
) -> AppResult<Json<VisaApplication>> {
    let id = path_id(id).map_err(tag_request(&headers))?;
    let application = state
        .applications
        .get(&user, id)
        .await
        .map_err(tag_request(&headers))?;
    Ok(Json(application))
}

/// PATCH /api/applications/{id}
pub async fn update_draft(
    user: AuthUser,
    State(state): State<AppState>,
    headers: HeaderMap,
    id: Result<Path<Uuid>, PathRejection>,
    body: Result<Json<ApplicationDraft>, JsonRejection>,
) -> AppResult<Json<VisaApplication>> {
    let id = path_id(id).map_err(tag_request(&headers))?;
    let draft = json_body(body).map_err(tag_request(&headers))?;
    let application = state
        .applications
        .update(&user, id, draft)
        .await
        .map_err(tag_request(&headers))?;
    Ok(Json(application))
}

/// DELETE /api/applications/{id}
pub async fn delete_draft(
    user: AuthUser,
    State(state): State<AppState>,
    headers: HeaderMap,
    id: Result<Path<Uuid>, PathRejection>,
) -> AppResult<StatusCode> {
    let id = path_id(id).map_err(tag_request(&headers))?;
    state
        .applications
        .delete(&user, id)
        .await
        .map_err(tag_request(&headers))?;
    Ok(StatusCode::NO_CONTENT)
}
