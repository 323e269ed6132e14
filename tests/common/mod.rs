#![allow(dead_code)]

use mentorlink::auth::{Session, User};
use mentorlink::{AppConfig, Backend};
use serde_json::{json, Value};
use uuid::Uuid;
use wiremock::MockServer;

pub const USER_ID: &str = "0b1f4c9e-2b7a-4d2f-8f61-3b9f2a1e5c77";
pub const OTHER_ID: &str = "7f1c8a3e-64d4-4a47-9a0a-9d4b54bb8f01";
pub const ACCESS_TOKEN: &str = "user-access-token";

pub fn user_id() -> Uuid {
    Uuid::parse_str(USER_ID).unwrap()
}

pub fn other_id() -> Uuid {
    Uuid::parse_str(OTHER_ID).unwrap()
}

pub fn anonymous(server: &MockServer) -> Backend {
    Backend::new(AppConfig::new(&server.uri(), "anon-key").unwrap()).unwrap()
}

pub fn privileged(server: &MockServer) -> Backend {
    Backend::new(
        AppConfig::new(&server.uri(), "anon-key")
            .unwrap()
            .with_service_role_key("service-key"),
    )
    .unwrap()
}

pub fn signed_in(backend: Backend) -> Backend {
    backend.auth.set_session(Session {
        access_token: ACCESS_TOKEN.to_string(),
        refresh_token: "refresh".to_string(),
        expires_in: 3600,
        token_type: "bearer".to_string(),
        user: User {
            id: USER_ID.to_string(),
            email: Some("ada@example.com".to_string()),
            email_confirmed_at: Some("2024-03-01T10:00:00Z".to_string()),
            user_metadata: json!({ "full_name": "Ada Lovelace" }),
            created_at: None,
            last_sign_in_at: None,
        },
    });
    backend
}

pub fn auth_user(id: &str, email: &str) -> Value {
    json!({
        "id": id,
        "email": email,
        "email_confirmed_at": "2024-03-01T10:00:00Z",
        "user_metadata": { "full_name": "Ada Lovelace" }
    })
}

pub fn onboarding_row(id: &str, status: &str, created_at: &str) -> Value {
    json!({
        "id": id,
        "user_id": USER_ID,
        "data": {},
        "status": status,
        "created_at": created_at
    })
}

pub fn mentorship_row(id: &str, status: &str) -> Value {
    json!({
        "id": id,
        "candidate_id": USER_ID,
        "mentor_id": OTHER_ID,
        "message": "Could you help me with Rust?",
        "status": status,
        "created_at": "2024-03-01T10:00:00Z"
    })
}
