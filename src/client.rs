//! Backend wrapper shared by every feature module.

use std::sync::Arc;

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use mentorlink_auth::{AdminAuth, Auth, AuthError, AuthOptions, Session};
use mentorlink_functions::FunctionsClient;
use mentorlink_postgrest::PostgrestClient;

use crate::config::AppConfig;
use crate::error::{AppError, Result};

/// Holds the sub-clients and the signed-in session.
///
/// Cloning is cheap; clones share the session.
#[derive(Clone)]
pub struct Backend {
    config: Arc<AppConfig>,
    http_client: Client,
    pub auth: Arc<Auth>,
    pub functions: Arc<FunctionsClient>,
}

impl Backend {
    pub fn new(config: AppConfig) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        let http_client = builder.build()?;

        let mut auth = Auth::new(
            config.base_url(),
            &config.anon_key,
            http_client.clone(),
            AuthOptions::default(),
        );
        if let Some(key) = &config.service_role_key {
            auth.init_admin(key);
        }

        let functions = FunctionsClient::new(config.base_url(), &config.anon_key, http_client.clone());

        tracing::debug!(url = %config.url, admin = config.service_role_key.is_some(), "backend client initialised");

        Ok(Self {
            config: Arc::new(config),
            http_client,
            auth: Arc::new(auth),
            functions: Arc::new(functions),
        })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(AppConfig::from_env()?)
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn session(&self) -> Option<Session> {
        self.auth.get_session()
    }

    /// Id of the signed-in user.
    pub fn current_user_id(&self) -> Result<Uuid> {
        let session = self.session().ok_or(AppError::MissingSession)?;
        Uuid::parse_str(&session.user.id)
            .map_err(|_| AuthError::InvalidToken(format!("user id is not a UUID: {}", session.user.id)).into())
    }

    /// Table client acting as the signed-in user, or anonymously when there
    /// is no session.
    pub fn from(&self, table: &str) -> Result<PostgrestClient> {
        let client = PostgrestClient::new(
            self.config.base_url(),
            &self.config.anon_key,
            table,
            self.http_client.clone(),
        );
        match self.session() {
            Some(session) => Ok(client.with_auth(&session.access_token)?),
            None => Ok(client),
        }
    }

    /// Table client for admin tooling: uses the service-role key when one is
    /// configured, otherwise falls back to the signed-in user and relies on
    /// row-level security granting admins access.
    pub fn privileged_from(&self, table: &str) -> Result<PostgrestClient> {
        match &self.config.service_role_key {
            Some(key) => Ok(PostgrestClient::new(
                self.config.base_url(),
                key,
                table,
                self.http_client.clone(),
            )
            .with_auth(key)?),
            None => self.from(table),
        }
    }

    /// Stored procedure call as the signed-in user.
    pub fn rpc(&self, function: &str, params: Value) -> Result<PostgrestClient> {
        let client = PostgrestClient::rpc(
            self.config.base_url(),
            &self.config.anon_key,
            function,
            params,
            self.http_client.clone(),
        );
        match self.session() {
            Some(session) => Ok(client.with_auth(&session.access_token)?),
            None => Ok(client),
        }
    }

    /// The service-role auth API.
    pub fn admin(&self) -> Result<&AdminAuth> {
        self.auth
            .admin()
            .ok_or(AppError::Auth(AuthError::MissingAdmin))
    }

    /// Invokes a serverless function, forwarding the user's token when signed in.
    pub async fn invoke<R: DeserializeOwned, B: Serialize>(
        &self,
        function: &str,
        body: Option<B>,
    ) -> Result<R> {
        let options = self
            .session()
            .map(|s| mentorlink_functions::FunctionOptions::new().with_auth(&s.access_token));
        Ok(self.functions.invoke(function, body, options).await?)
    }
}
