//! Table client for the Mentorlink data API
//!
//! Builds PostgREST-style requests against `/rest/v1/<table>`:
//!
//! - Query API (`select`, `insert`, `update`, `upsert`, `delete`)
//! - Equality filters (`eq`)
//! - Ordering and limits
//! - RPC function calls

use log::debug;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use thiserror::Error;
use url::Url;

/// Structured error body returned by the data API
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct PostgrestApiErrorDetails {
    pub code: Option<String>,
    pub message: Option<String>,
    pub details: Option<String>,
    pub hint: Option<String>,
}

impl fmt::Display for PostgrestApiErrorDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(code) = &self.code {
            parts.push(format!("Code: {}", code));
        }
        if let Some(message) = &self.message {
            parts.push(format!("Message: {}", message));
        }
        if let Some(details) = &self.details {
            parts.push(format!("Details: {}", details));
        }
        if let Some(hint) = &self.hint {
            parts.push(format!("Hint: {}", hint));
        }
        write!(f, "{}", parts.join(", "))
    }
}

#[derive(Error, Debug)]
pub enum PostgrestError {
    #[error("API error: {details} (Status: {status})")]
    ApiError {
        details: PostgrestApiErrorDetails,
        status: StatusCode,
    },

    #[error("API error (unparsed): {message} (Status: {status})")]
    UnparsedApiError { message: String, status: StatusCode },

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("URL parse error: {0}")]
    UrlParseError(#[from] url::ParseError),

    #[error("JSON serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("Deserialization error: {0}")]
    DeserializationError(String),
}

impl PostgrestError {
    /// The human readable part of the error, without status decoration.
    pub fn message(&self) -> String {
        match self {
            PostgrestError::ApiError { details, .. } => details
                .message
                .clone()
                .unwrap_or_else(|| details.to_string()),
            PostgrestError::UnparsedApiError { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, PostgrestError>;

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

async fn error_from_response(response: Response) -> PostgrestError {
    let status = response.status();
    let error_text = response
        .text()
        .await
        .unwrap_or_else(|_| "Failed to read error response".to_string());

    match serde_json::from_str::<PostgrestApiErrorDetails>(&error_text) {
        Ok(details) => PostgrestError::ApiError { details, status },
        Err(_) => PostgrestError::UnparsedApiError {
            message: error_text,
            status,
        },
    }
}

/// Request builder for one table (or one RPC function)
#[derive(Clone)]
pub struct PostgrestClient {
    base_url: String,
    table: String,
    http_client: Client,
    headers: HeaderMap,
    query_params: Vec<(String, String)>,
    rpc_params: Option<Value>,
}

impl PostgrestClient {
    pub fn new(base_url: &str, api_key: &str, table: &str, http_client: Client) -> Self {
        let mut headers = HeaderMap::new();
        if let Ok(key) = HeaderValue::from_str(api_key) {
            headers.insert("apikey", key);
        }
        headers.insert("Content-Type", HeaderValue::from_static("application/json"));

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            table: table.to_string(),
            http_client,
            headers,
            query_params: Vec::new(),
            rpc_params: None,
        }
    }

    /// Creates a client that calls the stored procedure `function_name`.
    pub fn rpc(
        base_url: &str,
        api_key: &str,
        function_name: &str,
        params: Value,
        http_client: Client,
    ) -> Self {
        let mut client = Self::new(base_url, api_key, function_name, http_client);
        client.rpc_params = Some(params);
        client
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn with_header(mut self, key: &str, value: &str) -> Result<Self> {
        let header_value = HeaderValue::from_str(value).map_err(|_| {
            PostgrestError::InvalidParameters(format!("Invalid header value: {}", value))
        })?;
        let header_name = HeaderName::from_bytes(key.as_bytes()).map_err(|_| {
            PostgrestError::InvalidParameters(format!("Invalid header name: {}", key))
        })?;

        self.headers.insert(header_name, header_value);
        Ok(self)
    }

    /// Sends requests as the holder of `token` so row-level security applies
    /// to that user.
    pub fn with_auth(self, token: &str) -> Result<Self> {
        self.with_header("Authorization", &format!("Bearer {}", token))
    }

    fn set_param(mut self, key: &str, value: String) -> Self {
        self.query_params.retain(|(k, _)| k != key);
        self.query_params.push((key.to_string(), value));
        self
    }

    fn push_param(mut self, key: &str, value: String) -> Self {
        self.query_params.push((key.to_string(), value));
        self
    }

    pub fn select(self, columns: &str) -> Self {
        self.set_param("select", columns.to_string())
    }

    pub fn eq(self, column: &str, value: &str) -> Self {
        self.push_param(column, format!("eq.{}", value))
    }

    pub fn order(self, column: &str, order: SortOrder) -> Self {
        let direction = match order {
            SortOrder::Ascending => "asc",
            SortOrder::Descending => "desc",
        };
        self.set_param("order", format!("{}.{}", column, direction))
    }

    pub fn limit(self, count: u32) -> Self {
        self.set_param("limit", count.to_string())
    }

    /// Columns that identify a conflicting row for `upsert`.
    pub fn on_conflict(self, columns: &str) -> Self {
        self.set_param("on_conflict", columns.to_string())
    }

    fn build_url(&self) -> Result<Url> {
        let path = if self.rpc_params.is_some() {
            format!("{}/rest/v1/rpc/{}", self.base_url, self.table)
        } else {
            format!("{}/rest/v1/{}", self.base_url, self.table)
        };
        let mut url = Url::parse(&path)?;
        if !self.query_params.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in &self.query_params {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }

    /// Runs the query and deserializes every row.
    pub async fn execute<T: DeserializeOwned>(&self) -> Result<Vec<T>> {
        let url = self.build_url()?;
        debug!("GET {}", url);

        let response = self
            .http_client
            .get(url)
            .headers(self.headers.clone())
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        response
            .json::<Vec<T>>()
            .await
            .map_err(|e| PostgrestError::DeserializationError(e.to_string()))
    }

    /// Runs the query limited to one row.
    pub async fn execute_one<T: DeserializeOwned>(&self) -> Result<Option<T>> {
        let rows = self.clone().limit(1).execute::<T>().await?;
        Ok(rows.into_iter().next())
    }

    async fn mutate<B: Serialize + ?Sized>(
        &self,
        method: Method,
        prefer: &'static str,
        body: Option<&B>,
    ) -> Result<Value> {
        let url = self.build_url()?;
        debug!("{} {}", method, url);

        let mut headers = self.headers.clone();
        headers.insert(HeaderName::from_static("prefer"), HeaderValue::from_static(prefer));

        let mut request = self.http_client.request(method, url).headers(headers);
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = request.send().await?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        let body_text = response.text().await.map_err(|e| {
            PostgrestError::DeserializationError(format!("Failed to read response body: {}", e))
        })?;

        // 204 No Content and friends
        if body_text.trim().is_empty() {
            return Ok(Value::Array(Vec::new()));
        }

        serde_json::from_str::<Value>(&body_text)
            .map_err(|e| PostgrestError::DeserializationError(e.to_string()))
    }

    /// Inserts one row or an array of rows; returns the stored representation.
    pub async fn insert<T: Serialize + ?Sized>(&self, values: &T) -> Result<Value> {
        self.mutate(Method::POST, "return=representation", Some(values))
            .await
    }

    /// Updates every row matched by the filters.
    pub async fn update<T: Serialize + ?Sized>(&self, values: &T) -> Result<Value> {
        if self.query_params.iter().all(|(k, _)| k == "select") {
            return Err(PostgrestError::InvalidParameters(
                "update without a filter is refused".to_string(),
            ));
        }
        self.mutate(Method::PATCH, "return=representation", Some(values))
            .await
    }

    /// Inserts, merging into rows that conflict on the primary key or on
    /// the columns given to [`PostgrestClient::on_conflict`].
    pub async fn upsert<T: Serialize + ?Sized>(&self, values: &T) -> Result<Value> {
        self.mutate(
            Method::POST,
            "return=representation,resolution=merge-duplicates",
            Some(values),
        )
        .await
    }

    /// Deletes every row matched by the filters.
    pub async fn delete(&self) -> Result<Value> {
        if self.query_params.iter().all(|(k, _)| k == "select") {
            return Err(PostgrestError::InvalidParameters(
                "delete without a filter is refused".to_string(),
            ));
        }
        self.mutate::<Value>(Method::DELETE, "return=representation", None)
            .await
    }

    /// Calls the stored procedure this client was created for.
    pub async fn call_rpc<T: DeserializeOwned>(&self) -> Result<T> {
        let params = self.rpc_params.as_ref().ok_or_else(|| {
            PostgrestError::InvalidParameters(
                "Client was not created for RPC. Use PostgrestClient::rpc().".to_string(),
            )
        })?;
        let url = self.build_url()?;
        debug!("POST {}", url);

        let response = self
            .http_client
            .post(url)
            .headers(self.headers.clone())
            .json(params)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        let body_text = response.text().await?;
        let body = if body_text.trim().is_empty() {
            "null"
        } else {
            body_text.as_str()
        };
        serde_json::from_str::<T>(body).map_err(|e| {
            PostgrestError::DeserializationError(format!(
                "Failed to deserialize RPC response: {}",
                e
            ))
        })
    }
}

/// Deserializes the array returned by a mutation into typed rows.
pub fn rows<T: DeserializeOwned>(value: Value) -> Result<Vec<T>> {
    match value {
        Value::Null => Ok(Vec::new()),
        Value::Array(_) => Ok(serde_json::from_value(value)?),
        single => Ok(vec![serde_json::from_value(single)?]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, header_exists, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[derive(Deserialize, Debug, PartialEq)]
    struct Row {
        id: i64,
        status: String,
    }

    #[tokio::test]
    async fn test_select_with_filters_and_order() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/rest/v1/mentorship_requests"))
            .and(query_param("select", "id,status"))
            .and(query_param("mentor_id", "eq.m1"))
            .and(query_param("order", "created_at.desc"))
            .and(header("apikey", "fake-key"))
            .and(header("Authorization", "Bearer user-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                { "id": 1, "status": "pending" },
                { "id": 2, "status": "accepted" }
            ])))
            .mount(&mock_server)
            .await;

        let client = PostgrestClient::new(
            &mock_server.uri(),
            "fake-key",
            "mentorship_requests",
            reqwest::Client::new(),
        )
        .with_auth("user-token")
        .unwrap();

        let rows = client
            .select("id,status")
            .eq("mentor_id", "m1")
            .order("created_at", SortOrder::Descending)
            .execute::<Row>()
            .await
            .unwrap();

        assert_eq!(
            rows,
            vec![
                Row { id: 1, status: "pending".to_string() },
                Row { id: 2, status: "accepted".to_string() },
            ]
        );
    }

    #[tokio::test]
    async fn test_execute_one_limits_to_a_single_row() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/rest/v1/profiles"))
            .and(query_param("limit", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&mock_server)
            .await;

        let client =
            PostgrestClient::new(&mock_server.uri(), "fake-key", "profiles", reqwest::Client::new());
        let row = client.select("*").execute_one::<Value>().await.unwrap();
        assert!(row.is_none());
    }

    #[tokio::test]
    async fn test_upsert_sends_merge_preference() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/rest/v1/learning_progress"))
            .and(query_param("on_conflict", "user_id,skill_name"))
            .and(header_exists("Prefer"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!([
                { "id": 7, "status": "ok" }
            ])))
            .mount(&mock_server)
            .await;

        let client = PostgrestClient::new(
            &mock_server.uri(),
            "fake-key",
            "learning_progress",
            reqwest::Client::new(),
        );
        let value = client
            .on_conflict("user_id,skill_name")
            .upsert(&json!({ "skill_name": "rust" }))
            .await
            .unwrap();

        let stored: Vec<Row> = rows(value).unwrap();
        assert_eq!(stored[0].id, 7);
    }

    #[tokio::test]
    async fn test_delete_with_empty_body() {
        let mock_server = MockServer::start().await;

        Mock::given(method("DELETE"))
            .and(path("/rest/v1/profiles"))
            .and(query_param("id", "eq.u1"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&mock_server)
            .await;

        let client =
            PostgrestClient::new(&mock_server.uri(), "fake-key", "profiles", reqwest::Client::new());
        let value = client.eq("id", "u1").delete().await.unwrap();
        assert_eq!(value, json!([]));
    }

    #[tokio::test]
    async fn test_unfiltered_delete_is_refused() {
        let client =
            PostgrestClient::new("http://localhost:1", "fake-key", "profiles", reqwest::Client::new());
        assert!(matches!(
            client.delete().await,
            Err(PostgrestError::InvalidParameters(_))
        ));
    }

    #[tokio::test]
    async fn test_api_error_details() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/rest/v1/user_roles"))
            .respond_with(ResponseTemplate::new(409).set_body_json(json!({
                "code": "23505",
                "message": "duplicate key value violates unique constraint",
                "details": null,
                "hint": null
            })))
            .mount(&mock_server)
            .await;

        let client =
            PostgrestClient::new(&mock_server.uri(), "fake-key", "user_roles", reqwest::Client::new());
        let err = client.insert(&json!({ "role": "mentor" })).await.unwrap_err();

        match &err {
            PostgrestError::ApiError { details, status } => {
                assert_eq!(*status, StatusCode::CONFLICT);
                assert_eq!(details.code.as_deref(), Some("23505"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(err.message(), "duplicate key value violates unique constraint");
    }

    #[tokio::test]
    async fn test_rpc() {
        let mock_server = MockServer::start().await;

        let params = json!({ "user_id": "u1" });
        Mock::given(method("POST"))
            .and(path("/rest/v1/rpc/delete_user"))
            .and(body_json(&params))
            .respond_with(ResponseTemplate::new(204))
            .mount(&mock_server)
            .await;

        let client = PostgrestClient::rpc(
            &mock_server.uri(),
            "fake-key",
            "delete_user",
            params.clone(),
            reqwest::Client::new(),
        );
        let result = client.call_rpc::<Value>().await.unwrap();
        assert_eq!(result, Value::Null);
    }
}
