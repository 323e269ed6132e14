use mentorlink_functions::{FunctionOptions, FunctionsClient, FunctionsError};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct SeedResponse {
    user_id: String,
    created: bool,
}

fn setup_client(server_uri: &str) -> FunctionsClient {
    FunctionsClient::new(server_uri, "fake-api-key", reqwest::Client::new())
}

#[tokio::test]
async fn test_invoke_without_body() {
    let server = MockServer::start().await;
    let client = setup_client(&server.uri());

    Mock::given(method("POST"))
        .and(path("/functions/v1/seed-super-admin"))
        .and(header("apikey", "fake-api-key"))
        .and(header("Authorization", "Bearer fake-api-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "user_id": "admin-id",
            "created": false
        })))
        .expect(1)
        .mount(&server)
        .await;

    let response: SeedResponse = client
        .invoke::<SeedResponse, Value>("seed-super-admin", None, None)
        .await
        .unwrap();

    assert_eq!(
        response,
        SeedResponse {
            user_id: "admin-id".to_string(),
            created: false
        }
    );
}

#[tokio::test]
async fn test_invoke_with_body_and_user_token() {
    let server = MockServer::start().await;
    let client = setup_client(&server.uri());
    let body = json!({ "name": "test", "count": 5 });

    Mock::given(method("POST"))
        .and(path("/functions/v1/echo"))
        .and(header("Authorization", "Bearer user-token"))
        .and(header("x-region", "eu"))
        .and(body_json(&body))
        .respond_with(ResponseTemplate::new(200).set_body_json(&body))
        .mount(&server)
        .await;

    let options = FunctionOptions::new()
        .with_auth("user-token")
        .with_header("x-region", "eu");
    let echoed: Value = client
        .invoke("echo", Some(body.clone()), Some(options))
        .await
        .unwrap();

    assert_eq!(echoed, body);
}

#[tokio::test]
async fn test_invoke_error_with_details() {
    let server = MockServer::start().await;
    let client = setup_client(&server.uri());

    Mock::given(method("POST"))
        .and(path("/functions/v1/seed-super-admin"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "error": "SUPER_ADMIN_PASSWORD is not configured"
        })))
        .mount(&server)
        .await;

    let result = client
        .invoke::<SeedResponse, Value>("seed-super-admin", None, None)
        .await;

    match result {
        Err(FunctionsError::FunctionError {
            status, message, ..
        }) => {
            assert_eq!(status, 500);
            assert_eq!(message, "SUPER_ADMIN_PASSWORD is not configured");
        }
        other => panic!("unexpected result: {:?}", other),
    }
}

#[tokio::test]
async fn test_invoke_error_status_only() {
    let server = MockServer::start().await;
    let client = setup_client(&server.uri());

    Mock::given(method("POST"))
        .and(path("/functions/v1/broken"))
        .respond_with(ResponseTemplate::new(502).set_body_string("Bad Gateway"))
        .mount(&server)
        .await;

    match client.invoke::<Value, Value>("broken", None, None).await {
        Err(FunctionsError::FunctionError {
            status,
            message,
            details,
        }) => {
            assert_eq!(status, 502);
            assert_eq!(message, "Bad Gateway");
            assert!(details.is_none());
        }
        other => panic!("unexpected result: {:?}", other),
    }
}
