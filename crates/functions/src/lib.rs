//! Serverless function client for the Mentorlink backend
//!
//! Invokes functions deployed under `/functions/v1/<name>`.

use log::debug;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use thiserror::Error;
use url::Url;

/// Error body conventionally returned by functions
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct FunctionErrorDetails {
    #[serde(alias = "error")]
    pub message: Option<String>,
    pub code: Option<String>,
}

#[derive(Debug, Error)]
pub enum FunctionsError {
    #[error("Request error: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("URL parse error: {0}")]
    UrlError(#[from] url::ParseError),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Function error (status {status}): {message}")]
    FunctionError {
        status: u16,
        message: String,
        details: Option<FunctionErrorDetails>,
    },
}

pub type Result<T> = std::result::Result<T, FunctionsError>;

/// Per-call options
#[derive(Debug, Clone, Default)]
pub struct FunctionOptions {
    pub headers: Option<HashMap<String, String>>,
    /// Bearer token sent instead of the API key, e.g. a user's access token.
    pub authorization: Option<String>,
}

impl FunctionOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_header(mut self, key: &str, value: &str) -> Self {
        self.headers
            .get_or_insert_with(HashMap::new)
            .insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_auth(mut self, token: &str) -> Self {
        self.authorization = Some(token.to_string());
        self
    }
}

/// Function invocation client
pub struct FunctionsClient {
    base_url: String,
    api_key: String,
    http_client: Client,
}

impl FunctionsClient {
    pub fn new(base_url: &str, api_key: &str, http_client: Client) -> Self {
        Self {
            base_url: base_url.to_string(),
            api_key: api_key.to_string(),
            http_client,
        }
    }

    fn function_url(&self, function_name: &str) -> Result<Url> {
        let mut url = Url::parse(&self.base_url)?;
        url.path_segments_mut()
            .map_err(|_| FunctionsError::UrlError(url::ParseError::RelativeUrlWithCannotBeABaseBase))?
            .pop_if_empty()
            .push("functions")
            .push("v1")
            .push(function_name);
        Ok(url)
    }

    /// Invokes `function_name` with an optional JSON body.
    pub async fn invoke<R: DeserializeOwned, B: Serialize>(
        &self,
        function_name: &str,
        body: Option<B>,
        options: Option<FunctionOptions>,
    ) -> Result<R> {
        let url = self.function_url(function_name)?;
        let opts = options.unwrap_or_default();
        let token = opts.authorization.as_deref().unwrap_or(&self.api_key);
        debug!("invoking function {}", function_name);

        let mut request = self
            .http_client
            .post(url)
            .header("apikey", &self.api_key)
            .header("Authorization", format!("Bearer {}", token));

        if let Some(headers) = opts.headers {
            for (key, value) in headers {
                request = request.header(key, value);
            }
        }

        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let details = serde_json::from_str::<FunctionErrorDetails>(&text).ok();
            let message = details
                .as_ref()
                .and_then(|d| d.message.clone())
                .unwrap_or(text);
            return Err(FunctionsError::FunctionError {
                status: status.as_u16(),
                message,
                details,
            });
        }

        let text = response.text().await?;
        let value: Value = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text)?
        };
        Ok(serde_json::from_value(value)?)
    }
}
