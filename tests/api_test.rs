mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::{body_json, json_request, multipart_upload, token_for, user, TestApp, ADMIN_EMAIL};
use serde_json::json;

const JPEG: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, 0x4A, 0x46, 0x49, 0x46];

fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {}", token));
    }
    builder.body(Body::empty()).unwrap()
}

#[tokio::test]
async fn protected_routes_require_a_bearer_token() {
    let app = TestApp::new();
    let body = json!({ "visaType": "tourist", "duration": "30 days" });

    let response = app
        .send(json_request("POST", "/api/paypal/create-order", None, &body))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(response.headers().contains_key("x-request-id"));
    let error = body_json(response).await;
    assert_eq!(error["code"], "UNAUTHORIZED");
    assert!(error["requestId"].is_string());

    let response = app
        .send(json_request("POST", "/api/paypal/create-order", Some("not-a-jwt"), &body))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(app.gateway.orders_created(), 0);
}

#[tokio::test]
async fn full_journey_from_draft_to_submission() {
    let app = TestApp::new();
    let applicant = user();
    let token = token_for(&applicant);

    let response = app
        .send(json_request(
            "POST",
            "/api/applications",
            Some(&token),
            &json!({
                "surname": "Dupont",
                "givenName": "Jean",
                "nationality": "France",
                "nationalityByBirth": true,
                "passportPlaceOfIssue": "Paris",
                "email": "jean.dupont@example.com"
            }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let draft = body_json(response).await;
    let application_id = draft["id"].as_str().unwrap().to_string();
    assert_eq!(draft["status"], "draft");
    assert_eq!(draft["givenName"], "Jean");
    assert_eq!(draft["email"], "jean.dupont@example.com");

    let response = app
        .send(json_request(
            "POST",
            "/api/paypal/create-order",
            Some(&token),
            &json!({
                "visaType": "tourist",
                "duration": "30 days",
                "nationality": "FR",
                "applicationId": application_id
            }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let order = body_json(response).await;
    assert_eq!(order["success"], true);
    assert_eq!(order["currency"], "EUR");
    assert_eq!(order["amount"], "39.90");
    let order_id = order["orderId"].as_str().unwrap().to_string();

    let response = app
        .send(json_request(
            "POST",
            "/api/paypal/capture-order",
            Some(&token),
            &json!({ "orderId": order_id }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let capture = body_json(response).await;
    assert_eq!(capture["payment"]["status"], "completed");

    let response = app
        .send(multipart_upload(&token, &application_id, "photo", "face.jpg", "image/jpeg", JPEG))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .send(json_request(
            "POST",
            "/api/applications/submit",
            Some(&token),
            &json!({ "applicationId": application_id }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await,
        json!({
            "success": true,
            "applicationId": application_id,
            "snapshotCreated": true,
            "locked": true
        })
    );

    let response = app
        .send(get(&format!("/api/applications/{}", application_id), Some(&token)))
        .await;
    let stored = body_json(response).await;
    assert_eq!(stored["status"], "submitted");
    assert_eq!(stored["isLocked"], true);

    let response = app
        .send(json_request(
            "PATCH",
            &format!("/api/applications/{}", application_id),
            Some(&token),
            &json!({ "surname": "Martin" }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(response).await["code"], "APPLICATION_LOCKED");

    assert_eq!(app.email.sent_to(ADMIN_EMAIL).await, 2);
}

#[tokio::test]
async fn draft_crud_is_owner_scoped() {
    let app = TestApp::new();
    let owner = user();
    let intruder = user();
    let token = token_for(&owner);

    let response = app
        .send(
            Request::builder()
                .method("POST")
                .uri("/api/applications")
                .header("authorization", format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let draft = body_json(response).await;
    assert_eq!(draft["email"], "applicant@example.com");
    let uri = format!("/api/applications/{}", draft["id"].as_str().unwrap());

    let response = app
        .send(json_request("PATCH", &uri, Some(&token), &json!({ "surname": "Dupont" })))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["surname"], "Dupont");

    let response = app.send(get(&uri, Some(&token_for(&intruder)))).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app.send(get("/api/applications/not-a-uuid", Some(&token))).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .send(
            Request::builder()
                .method("DELETE")
                .uri(&uri)
                .header("authorization", format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app.send(get(&uri, Some(&token))).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn eligibility_endpoint_is_advisory() {
    let app = TestApp::new();

    let response = app
        .send(json_request(
            "POST",
            "/api/eligibility",
            None,
            &json!({
                "nationality": "India",
                "nationalityByBirth": true,
                "passportPlaceOfIssue": "Mumbai, India"
            }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let verdict = body_json(response).await;
    assert_eq!(verdict["eligible"], false);
    assert!(verdict["error"].as_str().unwrap().contains("not eligible"));

    let response = app
        .send(json_request(
            "POST",
            "/api/eligibility",
            None,
            &json!({ "nationality": "Japan", "passportPlaceOfIssue": "Tokyo" }),
        ))
        .await;
    assert_eq!(body_json(response).await["eligible"], true);
}

#[tokio::test]
async fn public_config_exposes_only_client_id_and_mode() {
    let app = TestApp::new();
    let response = app.send(get("/api/paypal/config", None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await,
        json!({ "clientId": "public-client-id", "mode": "sandbox" })
    );
}

#[tokio::test]
async fn health_endpoints_respond_with_request_id() {
    let app = TestApp::new();

    let response = app.send(get("/health", None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));
    let health = body_json(response).await;
    // no database pool in tests
    assert_eq!(health["status"], "Degraded");

    let response = app.send(get("/health/live", None)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.send(get("/", None)).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn malformed_json_is_a_validation_error() {
    let app = TestApp::new();
    let token = token_for(&user());
    let response = app
        .send(
            Request::builder()
                .method("POST")
                .uri("/api/paypal/capture-order")
                .header("authorization", format!("Bearer {}", token))
                .header("content-type", "application/json")
                .header("x-request-id", "req-fixed-1")
                .body(Body::from("{\"orderId\":"))
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(response.headers()["x-request-id"], "req-fixed-1");
    let error = body_json(response).await;
    assert_eq!(error["code"], "VALIDATION_ERROR");
    assert_eq!(error["requestId"], "req-fixed-1");
}

#[tokio::test]
async fn unknown_visa_type_never_reaches_the_processor() {
    let app = TestApp::new();
    let token = token_for(&user());
    let response = app
        .send(json_request(
            "POST",
            "/api/paypal/create-order",
            Some(&token),
            &json!({ "visaType": "student", "duration": "30 days" }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "VALIDATION_ERROR");
    assert_eq!(app.gateway.orders_created(), 0);
}
