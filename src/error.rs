//! Error handling for the Mentorlink client

use thiserror::Error;

use mentorlink_auth::AuthError;
use mentorlink_functions::FunctionsError;
use mentorlink_postgrest::PostgrestError;

/// Unified error type for application operations
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    #[error("Database error: {0}")]
    Postgrest(#[from] PostgrestError),

    #[error("Function error: {0}")]
    Function(#[from] FunctionsError),

    #[error("Network request error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("URL parsing error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("JSON serialization/deserialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Not signed in")]
    MissingSession,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Cannot change status from {from} to {to}")]
    InvalidTransition { from: String, to: String },
}

impl AppError {
    /// Message suitable for a toast: the backend's own wording when it sent
    /// one, otherwise the error's display form.
    pub fn user_message(&self) -> String {
        match self {
            AppError::Auth(AuthError::ApiError(msg))
            | AppError::Auth(AuthError::AuthenticationError(msg)) => msg.clone(),
            AppError::Postgrest(err) => err.message(),
            AppError::Function(FunctionsError::FunctionError { message, .. }) => message.clone(),
            AppError::Validation(msg) => msg.clone(),
            other => other.to_string(),
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut messages: Vec<String> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errs)| {
                errs.iter().map(move |e| match &e.message {
                    Some(msg) => msg.to_string(),
                    None => format!("{} is invalid", field),
                })
            })
            .collect();
        messages.sort();
        AppError::Validation(messages.join("; "))
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
