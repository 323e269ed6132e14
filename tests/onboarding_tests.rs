mod common;

use mentorlink::models::{OnboardingKind, OnboardingStatus};
use mentorlink::{onboarding, AppError};
use serde_json::{json, Value};
use wiremock::matchers::{body_json, body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::*;

const REQUEST_ID: &str = "9e8d7c6b-5a49-4382-a1b0-c9d8e7f6a5b4";

#[tokio::test]
async fn latest_request_is_picked_across_tables() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/candidate_onboarding_requests"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([onboarding_row(
            REQUEST_ID,
            "rejected",
            "2024-01-05T08:00:00Z"
        )])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/mentor_onboarding_requests"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([onboarding_row(
            OTHER_ID,
            "pending",
            "2024-02-05T08:00:00Z"
        )])))
        .mount(&server)
        .await;

    let backend = signed_in(anonymous(&server));
    let latest = onboarding::latest_for_user(&backend, user_id())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(latest.kind, Some(OnboardingKind::Mentor));
    assert_eq!(latest.status, OnboardingStatus::Pending);
}

#[tokio::test]
async fn approval_stamps_the_request_and_grants_the_role() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/mentor_onboarding_requests"))
        .and(query_param("id", format!("eq.{}", REQUEST_ID)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([onboarding_row(
            REQUEST_ID,
            "pending",
            "2024-02-05T08:00:00Z"
        )])))
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/mentor_onboarding_requests"))
        .and(body_partial_json(json!({ "status": "approved", "admin_notes": "welcome" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "id": REQUEST_ID,
            "user_id": USER_ID,
            "data": {},
            "status": "approved",
            "created_at": "2024-02-05T08:00:00Z",
            "reviewed_at": "2024-02-06T08:00:00Z",
            "admin_notes": "welcome"
        }])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/user_roles"))
        .and(query_param("role", "eq.mentor"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/user_roles"))
        .and(body_json(json!({ "user_id": USER_ID, "role": "mentor" })))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let request = onboarding::approve(
        &privileged(&server),
        OnboardingKind::Mentor,
        REQUEST_ID.parse().unwrap(),
        Some("welcome"),
    )
    .await
    .unwrap();
    assert_eq!(request.status, OnboardingStatus::Approved);
    assert!(request.reviewed_at.is_some());
}

#[tokio::test]
async fn reviewed_request_cannot_be_reviewed_again() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/candidate_onboarding_requests"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([onboarding_row(
            REQUEST_ID,
            "approved",
            "2024-02-05T08:00:00Z"
        )])))
        .mount(&server)
        .await;

    let err = onboarding::reject(
        &privileged(&server),
        OnboardingKind::Candidate,
        REQUEST_ID.parse().unwrap(),
        None,
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::InvalidTransition { .. }));
}

#[tokio::test]
async fn rejection_without_notes_keeps_stored_notes() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/mentor_onboarding_requests"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([onboarding_row(
            REQUEST_ID,
            "pending",
            "2024-02-05T08:00:00Z"
        )])))
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/mentor_onboarding_requests"))
        .and(query_param("id", format!("eq.{}", REQUEST_ID)))
        .and(body_partial_json(json!({ "status": "rejected" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "id": REQUEST_ID,
            "user_id": USER_ID,
            "data": {},
            "status": "rejected",
            "created_at": "2024-02-05T08:00:00Z",
            "reviewed_at": "2024-02-06T08:00:00Z",
            "admin_notes": "asked for references"
        }])))
        .expect(1)
        .mount(&server)
        .await;

    let request = onboarding::reject(
        &privileged(&server),
        OnboardingKind::Mentor,
        REQUEST_ID.parse().unwrap(),
        None,
    )
    .await
    .unwrap();
    assert_eq!(request.status, OnboardingStatus::Rejected);

    let requests = server.received_requests().await.unwrap();
    let patch = requests
        .iter()
        .find(|r| r.method.to_string() == "PATCH")
        .unwrap();
    let body: Value = serde_json::from_slice(&patch.body).unwrap();
    assert!(body.get("admin_notes").is_none());
}

#[tokio::test]
async fn submit_files_a_pending_request() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/candidate_onboarding_requests"))
        .and(body_json(json!({
            "user_id": USER_ID,
            "data": { "goals": "learn rust" },
            "status": "pending"
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([onboarding_row(
            REQUEST_ID,
            "pending",
            "2024-02-05T08:00:00Z"
        )])))
        .expect(1)
        .mount(&server)
        .await;

    let backend = signed_in(anonymous(&server));
    let request = onboarding::submit(&backend, OnboardingKind::Candidate, json!({ "goals": "learn rust" }))
        .await
        .unwrap();
    assert_eq!(request.kind, Some(OnboardingKind::Candidate));
}
