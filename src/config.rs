//! Configuration for the Mentorlink client

use std::time::Duration;
use url::Url;

use crate::error::{AppError, Result};

/// Account provisioned by the seed function
#[derive(Debug, Clone, PartialEq)]
pub struct SuperAdminSeed {
    pub email: String,
    pub password: String,
    pub full_name: String,
}

impl Default for SuperAdminSeed {
    fn default() -> Self {
        Self {
            email: "superadmin@mentorlink.app".to_string(),
            password: String::new(),
            full_name: "Super Admin".to_string(),
        }
    }
}

/// Connection settings for the hosted backend
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Project URL, e.g. `https://xyz.supabase.co`
    pub url: Url,

    /// Public key; requests made with it are subject to row-level security
    pub anon_key: String,

    /// Service-role key for admin tooling. Never ship this to end users.
    pub service_role_key: Option<String>,

    /// The request timeout
    pub request_timeout: Option<Duration>,

    /// Where password reset emails send the user back to
    pub password_reset_redirect: Option<String>,

    pub super_admin: SuperAdminSeed,
}

impl AppConfig {
    /// Creates a configuration, validating the URL and key.
    pub fn new(url_str: &str, anon_key: &str) -> Result<Self> {
        let url = Url::parse(url_str)?;
        if anon_key.is_empty() {
            return Err(AppError::Config("anon_key cannot be empty".to_string()));
        }
        Ok(Self {
            url,
            anon_key: anon_key.to_string(),
            service_role_key: None,
            request_timeout: Some(Duration::from_secs(30)),
            password_reset_redirect: None,
            super_admin: SuperAdminSeed::default(),
        })
    }

    /// Reads the configuration from environment variables.
    ///
    /// `MENTORLINK_URL` takes precedence over `SUPABASE_URL`. Optional:
    /// `SUPABASE_SERVICE_ROLE_KEY`, `REQUEST_TIMEOUT_SECS`,
    /// `PASSWORD_RESET_REDIRECT`, `SUPER_ADMIN_EMAIL`, `SUPER_ADMIN_PASSWORD`,
    /// `SUPER_ADMIN_NAME`.
    pub fn from_env() -> Result<Self> {
        let url = std::env::var("MENTORLINK_URL")
            .or_else(|_| std::env::var("SUPABASE_URL"))
            .map_err(|_| AppError::Config("SUPABASE_URL environment variable not found".to_string()))?;
        let anon_key = std::env::var("SUPABASE_ANON_KEY").map_err(|_| {
            AppError::Config("SUPABASE_ANON_KEY environment variable not found".to_string())
        })?;

        let mut config = Self::new(&url, &anon_key)?;

        if let Ok(key) = std::env::var("SUPABASE_SERVICE_ROLE_KEY") {
            config = config.with_service_role_key(&key);
        }
        if let Ok(secs) = std::env::var("REQUEST_TIMEOUT_SECS") {
            let secs: u64 = secs.parse().map_err(|_| {
                AppError::Config(format!("REQUEST_TIMEOUT_SECS is not a number: {}", secs))
            })?;
            config = config.with_request_timeout(Some(Duration::from_secs(secs)));
        }
        if let Ok(redirect) = std::env::var("PASSWORD_RESET_REDIRECT") {
            config.password_reset_redirect = Some(redirect);
        }

        let mut seed = SuperAdminSeed::default();
        if let Ok(email) = std::env::var("SUPER_ADMIN_EMAIL") {
            seed.email = email;
        }
        if let Ok(password) = std::env::var("SUPER_ADMIN_PASSWORD") {
            seed.password = password;
        }
        if let Ok(name) = std::env::var("SUPER_ADMIN_NAME") {
            seed.full_name = name;
        }
        config.super_admin = seed;

        Ok(config)
    }

    pub fn with_service_role_key(mut self, key: &str) -> Self {
        self.service_role_key = (!key.is_empty()).then(|| key.to_string());
        self
    }

    pub fn with_request_timeout(mut self, value: Option<Duration>) -> Self {
        self.request_timeout = value;
        self
    }

    pub fn with_super_admin(mut self, seed: SuperAdminSeed) -> Self {
        self.super_admin = seed;
        self
    }

    /// The project URL without a trailing slash.
    pub fn base_url(&self) -> &str {
        self.url.as_str().trim_end_matches('/')
    }
}
