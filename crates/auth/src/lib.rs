//! Mentorlink auth client
//!
//! Talks to the hosted auth service: sign up, sign in, session handling and
//! password recovery for end users, plus [`AdminAuth`] for the service-role
//! user management endpoints.

use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use log::{debug, warn};
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::{Arc, RwLock};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

const CLIENT_INFO: &str = concat!("mentorlink-auth/", env!("CARGO_PKG_VERSION"));

/// Errors returned by the auth service client
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("API error: {0}")]
    ApiError(String),

    #[error("Authentication error: {0}")]
    AuthenticationError(String),

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("JSON serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Missing session")]
    MissingSession,

    #[error("Admin client not initialised")]
    MissingAdmin,

    #[error("Invalid token: {0}")]
    InvalidToken(String),
}

pub type Result<T> = std::result::Result<T, AuthError>;

/// An account as reported by the auth service
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub email_confirmed_at: Option<String>,
    #[serde(default)]
    pub user_metadata: Value,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub last_sign_in_at: Option<String>,
}

impl User {
    /// Whether the account's email address has been confirmed.
    pub fn is_confirmed(&self) -> bool {
        self.email_confirmed_at.is_some()
    }

    /// Reads a string field out of `user_metadata`.
    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.user_metadata.get(key).and_then(Value::as_str)
    }
}

/// A signed-in session
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
    pub token_type: String,
    pub user: User,
}

/// Claims carried by an access token
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Claims {
    pub sub: String,
    pub exp: i64,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
}

impl Session {
    /// Decodes the access token claims without checking the signature.
    ///
    /// Signature verification belongs to the backend; this is only used to
    /// read the expiry and subject locally.
    pub fn claims(&self) -> Result<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.insecure_disable_signature_validation();
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();

        decode::<Claims>(&self.access_token, &DecodingKey::from_secret(&[]), &validation)
            .map(|data| data.claims)
            .map_err(|e| AuthError::InvalidToken(e.to_string()))
    }

    /// True when the token's `exp` lies in the past. Opaque tokens are never
    /// considered expired; the backend will reject them if they are.
    pub fn is_expired(&self) -> bool {
        match self.claims() {
            Ok(claims) => {
                let now = SystemTime::now()
                    .duration_since(UNIX_EPOCH)
                    .map(|d| d.as_secs() as i64)
                    .unwrap_or(0);
                now >= claims.exp
            }
            Err(_) => false,
        }
    }
}

/// Response of the sign-up endpoint.
///
/// When email confirmation is enabled the service answers with the bare user,
/// otherwise with a full session.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum SignUpResponse {
    Session(Session),
    User(User),
}

impl SignUpResponse {
    pub fn user(&self) -> &User {
        match self {
            SignUpResponse::Session(session) => &session.user,
            SignUpResponse::User(user) => user,
        }
    }

    pub fn session(&self) -> Option<&Session> {
        match self {
            SignUpResponse::Session(session) => Some(session),
            SignUpResponse::User(_) => None,
        }
    }
}

/// Attributes a signed-in user may change on their own account
#[derive(Debug, Clone, Default, Serialize)]
pub struct UserAttributes {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Attributes accepted by the admin create/update endpoints
#[derive(Debug, Clone, Default, Serialize)]
pub struct AdminUserAttributes {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_metadata: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email_confirm: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct UserList {
    #[serde(default)]
    users: Vec<User>,
}

/// Client options
#[derive(Debug, Clone)]
pub struct AuthOptions {
    /// Keep the session returned by sign-in/sign-up in memory.
    pub persist_session: bool,
}

impl Default for AuthOptions {
    fn default() -> Self {
        Self {
            persist_session: true,
        }
    }
}

async fn api_error(response: Response) -> AuthError {
    let status = response.status();
    let text = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<Value>(&text)
        .ok()
        .and_then(|body| {
            ["msg", "message", "error_description", "error"]
                .iter()
                .find_map(|key| body.get(*key).and_then(Value::as_str).map(str::to_string))
        })
        .unwrap_or(text);
    debug!("auth request failed with status {}: {}", status, message);
    if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::BAD_REQUEST {
        AuthError::AuthenticationError(message)
    } else {
        AuthError::ApiError(message)
    }
}

/// Auth client for end-user operations
pub struct Auth {
    url: String,
    key: String,
    http_client: Client,
    options: AuthOptions,
    current_session: Arc<RwLock<Option<Session>>>,
    admin: Option<AdminAuth>,
}

/// Admin client for the service-role user management API.
///
/// Only ever construct this on trusted machines: the service-role key
/// bypasses row-level security.
pub struct AdminAuth {
    url: String,
    service_role_key: String,
    http_client: Client,
}

impl AdminAuth {
    pub fn new(url: &str, service_role_key: &str, http_client: Client) -> Self {
        Self {
            url: url.trim_end_matches('/').to_string(),
            service_role_key: service_role_key.to_string(),
            http_client,
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/auth/v1/admin{}", self.url, path)
    }

    fn request(&self, method: reqwest::Method, url: &str) -> reqwest::RequestBuilder {
        self.http_client
            .request(method, url)
            .header("apikey", &self.service_role_key)
            .header("Authorization", format!("Bearer {}", self.service_role_key))
            .header("X-Client-Info", CLIENT_INFO)
    }

    /// Fetches a single account by id.
    pub async fn get_user_by_id(&self, user_id: &str) -> Result<User> {
        let url = self.endpoint(&format!("/users/{}", user_id));
        let response = self.request(reqwest::Method::GET, &url).send().await?;

        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        Ok(response.json::<User>().await?)
    }

    /// Lists one page of accounts. Pages start at 1.
    pub async fn list_users(&self, page: Option<u32>, per_page: Option<u32>) -> Result<Vec<User>> {
        let url = format!(
            "{}?page={}&per_page={}",
            self.endpoint("/users"),
            page.unwrap_or(1),
            per_page.unwrap_or(50)
        );
        let response = self.request(reqwest::Method::GET, &url).send().await?;

        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        let list = response.json::<UserList>().await?;
        Ok(list.users)
    }

    /// Creates an account.
    pub async fn create_user(&self, attributes: &AdminUserAttributes) -> Result<User> {
        let url = self.endpoint("/users");
        let response = self
            .request(reqwest::Method::POST, &url)
            .json(attributes)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        Ok(response.json::<User>().await?)
    }

    /// Updates an account.
    pub async fn update_user_by_id(
        &self,
        user_id: &str,
        attributes: &AdminUserAttributes,
    ) -> Result<User> {
        let url = self.endpoint(&format!("/users/{}", user_id));
        let response = self
            .request(reqwest::Method::PUT, &url)
            .json(attributes)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        Ok(response.json::<User>().await?)
    }

    /// Deletes an account.
    pub async fn delete_user(&self, user_id: &str) -> Result<()> {
        let url = self.endpoint(&format!("/users/{}", user_id));
        let response = self.request(reqwest::Method::DELETE, &url).send().await?;

        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        Ok(())
    }
}

impl Auth {
    pub fn new(url: &str, key: &str, http_client: Client, options: AuthOptions) -> Self {
        Self {
            url: url.trim_end_matches('/').to_string(),
            key: key.to_string(),
            http_client,
            options,
            current_session: Arc::new(RwLock::new(None)),
            admin: None,
        }
    }

    /// Enables the admin API with a service-role key.
    pub fn init_admin(&mut self, service_role_key: &str) -> &Self {
        self.admin = Some(AdminAuth::new(
            &self.url,
            service_role_key,
            self.http_client.clone(),
        ));
        self
    }

    pub fn admin(&self) -> Option<&AdminAuth> {
        self.admin.as_ref()
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/auth/v1{}", self.url, path)
    }

    fn store_session(&self, session: &Session) {
        if !self.options.persist_session {
            return;
        }
        match self.current_session.write() {
            Ok(mut guard) => *guard = Some(session.clone()),
            Err(_) => warn!("session lock poisoned, session not stored"),
        }
    }

    fn bearer(&self) -> Result<String> {
        self.get_session()
            .map(|s| s.access_token)
            .ok_or(AuthError::MissingSession)
    }

    /// Registers a new account. `metadata` lands in `user_metadata`.
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: Option<Value>,
    ) -> Result<SignUpResponse> {
        let mut payload = serde_json::json!({
            "email": email,
            "password": password,
        });
        if let Some(data) = metadata {
            payload["data"] = data;
        }

        let response = self
            .http_client
            .post(self.endpoint("/signup"))
            .header("apikey", &self.key)
            .header("X-Client-Info", CLIENT_INFO)
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        let result: SignUpResponse = response.json().await?;
        if let Some(session) = result.session() {
            self.store_session(session);
        }

        Ok(result)
    }

    /// Signs in with email and password and keeps the session.
    pub async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session> {
        let payload = serde_json::json!({
            "email": email,
            "password": password,
        });

        let response = self
            .http_client
            .post(self.endpoint("/token?grant_type=password"))
            .header("apikey", &self.key)
            .header("X-Client-Info", CLIENT_INFO)
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        let session: Session = response.json().await?;
        self.store_session(&session);

        Ok(session)
    }

    /// The session currently held in memory, if any.
    pub fn get_session(&self) -> Option<Session> {
        self.current_session
            .read()
            .ok()
            .and_then(|guard| guard.clone())
    }

    /// Replaces the in-memory session, e.g. one restored from storage.
    pub fn set_session(&self, session: Session) {
        if let Ok(mut guard) = self.current_session.write() {
            *guard = Some(session);
        }
    }

    /// Exchanges the refresh token for a new session.
    pub async fn refresh_session(&self) -> Result<Session> {
        let session = self.get_session().ok_or(AuthError::MissingSession)?;

        let response = self
            .http_client
            .post(self.endpoint("/token?grant_type=refresh_token"))
            .header("apikey", &self.key)
            .header("X-Client-Info", CLIENT_INFO)
            .json(&serde_json::json!({ "refresh_token": session.refresh_token }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        let new_session: Session = response.json().await?;
        self.store_session(&new_session);

        Ok(new_session)
    }

    /// Signs out. The local session is cleared even when the server call fails.
    pub async fn sign_out(&self) -> Result<()> {
        let token = self.bearer()?;

        let result = self
            .http_client
            .post(self.endpoint("/logout"))
            .header("apikey", &self.key)
            .header("Authorization", format!("Bearer {}", token))
            .send()
            .await;

        if let Ok(mut guard) = self.current_session.write() {
            *guard = None;
        }

        let response = result?;
        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        Ok(())
    }

    /// Sends a password recovery email.
    pub async fn reset_password_for_email(
        &self,
        email: &str,
        redirect_to: Option<&str>,
    ) -> Result<()> {
        let mut url = self.endpoint("/recover");
        if let Some(redirect) = redirect_to {
            url = format!("{}?redirect_to={}", url, urlencoding::encode(redirect));
        }

        let response = self
            .http_client
            .post(&url)
            .header("apikey", &self.key)
            .header("X-Client-Info", CLIENT_INFO)
            .json(&serde_json::json!({ "email": email }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        Ok(())
    }

    /// Updates the signed-in user's own account.
    pub async fn update_user(&self, attributes: &UserAttributes) -> Result<User> {
        let token = self.bearer()?;

        let response = self
            .http_client
            .put(self.endpoint("/user"))
            .header("apikey", &self.key)
            .header("Authorization", format!("Bearer {}", token))
            .json(attributes)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        Ok(response.json::<User>().await?)
    }
}
