mod common;

use common::{user, TestApp, ADMIN_EMAIL};
use evisa_backend::database::application_repository::ApplicationStatus;
use evisa_backend::database::repository::{ApplicationRepository, SnapshotRepository};
use evisa_backend::error::ErrorCode;
use evisa_backend::middleware::auth::AuthUser;
use evisa_backend::payments::types::VisaType;
use evisa_backend::services::document_upload::UploadInput;
use evisa_backend::services::payment_order::CreateOrderInput;
use evisa_backend::storage::ObjectStorage;
use uuid::Uuid;

fn upload(application_id: Uuid, document_type: &str, file_name: &str, content_type: &str) -> UploadInput {
    UploadInput {
        application_id: Some(application_id.to_string()),
        document_type: Some(document_type.to_string()),
        file_name: Some(file_name.to_string()),
        content_type: Some(content_type.to_string()),
        bytes: vec![0xFF; 2048],
    }
}

async fn paid_for(app: &TestApp, applicant: &AuthUser, application_id: Uuid) -> Uuid {
    let (created, _) = app
        .state
        .orders
        .create_order(
            applicant,
            CreateOrderInput {
                visa_type: VisaType::Tourist,
                duration: "30 days".to_string(),
                nationality: Some("FR".to_string()),
                application_id: Some(application_id),
            },
        )
        .await
        .unwrap();
    app.state
        .captures
        .capture(applicant, &created.order_id)
        .await
        .unwrap()
        .id
}

#[tokio::test]
async fn submit_locks_snapshots_and_notifies() {
    let app = TestApp::new();
    let applicant = user();
    let draft = app.seed_draft(&applicant).await;
    let payment_id = paid_for(&app, &applicant, draft.id).await;
    app.state
        .uploads
        .upload(&applicant, upload(draft.id, "photo", "face.jpg", "image/jpeg"))
        .await
        .unwrap();
    app.state
        .uploads
        .upload(&applicant, upload(draft.id, "passport", "passport.pdf", "application/pdf"))
        .await
        .unwrap();

    let result = app.state.submissions.submit(&applicant, draft.id).await.unwrap();
    assert!(result.success);
    assert!(result.snapshot_created);
    assert!(result.locked);
    assert_eq!(result.application_id, draft.id);

    let stored = app.store.find_by_id(draft.id).await.unwrap().unwrap();
    assert_eq!(stored.status, ApplicationStatus::Submitted);
    assert!(stored.is_locked);
    assert!(stored.submitted_at.is_some());

    let snapshot = app.store.find_by_application(draft.id).await.unwrap().unwrap();
    assert_eq!(snapshot.payment_id, Some(payment_id));
    assert_eq!(snapshot.submitted_by, applicant.user_id);
    assert_eq!(snapshot.snapshot_data.0["status"], "submitted");
    assert_eq!(snapshot.snapshot_data.0["surname"], "Dupont");
    let mut types: Vec<_> = snapshot
        .document_urls
        .0
        .iter()
        .map(|d| d.document_type.clone())
        .collect();
    types.sort();
    assert_eq!(types, vec!["passport", "photo"]);

    // payment: thank-you + admin; submission: admin + applicant confirmation
    assert_eq!(app.email.sent_to(ADMIN_EMAIL).await, 2);
    assert_eq!(app.email.sent_to("jean.dupont@example.com").await, 1);
}

#[tokio::test]
async fn second_submission_conflicts_without_changes() {
    let app = TestApp::new();
    let applicant = user();
    let draft = app.seed_draft(&applicant).await;

    app.state.submissions.submit(&applicant, draft.id).await.unwrap();
    let first = app.store.find_by_id(draft.id).await.unwrap().unwrap();
    let emails = app.email.sent().await.len();

    let err = app
        .state
        .submissions
        .submit(&applicant, draft.id)
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 409);

    let second = app.store.find_by_id(draft.id).await.unwrap().unwrap();
    assert_eq!(first, second);
    assert_eq!(app.email.sent().await.len(), emails);
}

#[tokio::test]
async fn ineligible_applicant_is_rejected_and_left_as_draft() {
    let app = TestApp::new();
    let applicant = user();
    let mut draft = common::eligible_draft(applicant.user_id);
    draft.nationality = Some("India".to_string());
    draft.passport_place_of_issue = Some("New Delhi, India".to_string());
    app.store.put_application(draft.clone()).await;

    let err = app
        .state
        .submissions
        .submit(&applicant, draft.id)
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 422);
    assert_eq!(err.error_code(), ErrorCode::IneligibleApplicant);

    let stored = app.store.find_by_id(draft.id).await.unwrap().unwrap();
    assert_eq!(stored.status, ApplicationStatus::Draft);
    assert!(!stored.is_locked);
    assert!(app.store.find_by_application(draft.id).await.unwrap().is_none());
}

#[tokio::test]
async fn naturalised_indian_citizen_may_submit() {
    let app = TestApp::new();
    let applicant = user();
    let mut draft = common::eligible_draft(applicant.user_id);
    draft.nationality = Some("Indian".to_string());
    draft.nationality_by_birth = Some(false);
    draft.passport_place_of_issue = Some("Bharat".to_string());
    app.store.put_application(draft.clone()).await;

    let result = app.state.submissions.submit(&applicant, draft.id).await.unwrap();
    assert!(result.locked);
}

#[tokio::test]
async fn foreign_and_unknown_applications_are_not_touched() {
    let app = TestApp::new();
    let owner = user();
    let intruder = user();
    let draft = app.seed_draft(&owner).await;

    let err = app
        .state
        .submissions
        .submit(&intruder, draft.id)
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 403);

    let err = app
        .state
        .submissions
        .submit(&owner, Uuid::new_v4())
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 404);

    let stored = app.store.find_by_id(draft.id).await.unwrap().unwrap();
    assert_eq!(stored, draft);
    assert!(app.email.sent().await.is_empty());
}

#[tokio::test]
async fn snapshot_failure_does_not_block_submission() {
    let app = TestApp::new();
    let applicant = user();
    let draft = app.seed_draft(&applicant).await;
    app.store.set_fail_snapshot_writes(true);

    let result = app.state.submissions.submit(&applicant, draft.id).await.unwrap();
    assert!(result.success);
    assert!(!result.snapshot_created);
    assert!(result.locked);

    let stored = app.store.find_by_id(draft.id).await.unwrap().unwrap();
    assert_eq!(stored.status, ApplicationStatus::Submitted);
}

#[tokio::test]
async fn unsignable_documents_are_left_out_of_the_snapshot() {
    let app = TestApp::new();
    let applicant = user();
    let draft = app.seed_draft(&applicant).await;
    let photo = app
        .state
        .uploads
        .upload(&applicant, upload(draft.id, "photo", "face.jpg", "image/jpeg"))
        .await
        .unwrap();
    app.state
        .uploads
        .upload(&applicant, upload(draft.id, "passport", "passport.pdf", "application/pdf"))
        .await
        .unwrap();
    app.storage.remove(&photo.file_path).await.unwrap();

    let result = app.state.submissions.submit(&applicant, draft.id).await.unwrap();
    assert!(result.snapshot_created);

    let snapshot = app.store.find_by_application(draft.id).await.unwrap().unwrap();
    assert_eq!(snapshot.document_urls.0.len(), 1);
    assert_eq!(snapshot.document_urls.0[0].document_type, "passport");
    assert!(snapshot.payment_id.is_none());
}

#[tokio::test]
async fn confirmation_falls_back_to_token_email() {
    let app = TestApp::new();
    let applicant = user();
    let mut draft = common::eligible_draft(applicant.user_id);
    draft.email = None;
    app.store.put_application(draft.clone()).await;

    app.state.submissions.submit(&applicant, draft.id).await.unwrap();
    assert_eq!(app.email.sent_to("applicant@example.com").await, 1);
    assert_eq!(app.email.sent_to(ADMIN_EMAIL).await, 1);
}

#[tokio::test]
async fn locked_application_rejects_edits() {
    let app = TestApp::new();
    let applicant = user();
    let draft = app.seed_draft(&applicant).await;
    app.state.submissions.submit(&applicant, draft.id).await.unwrap();

    let err = app
        .state
        .applications
        .update(&applicant, draft.id, Default::default())
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 409);

    let err = app
        .state
        .applications
        .delete(&applicant, draft.id)
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 409);
    assert!(app.store.find_by_id(draft.id).await.unwrap().is_some());
}
