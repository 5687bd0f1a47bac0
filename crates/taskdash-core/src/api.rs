//! HTTP client for the task backend.

use std::time::Duration;

use anyhow::Context;
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument, warn};

use crate::config::Config;
use crate::task::{Credentials, Health, LoginResponse, RegisterResponse, Task, TaskInput, User};

pub const DEFAULT_API_BASE: &str = "http://localhost:8080/api";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The request never produced a response (connect failure, timeout).
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unauthorized: {message}")]
    Unauthorized { message: String },

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("not logged in")]
    MissingToken,
}

impl ApiError {
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, ApiError::Unauthorized { .. } | ApiError::MissingToken)
    }
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

#[derive(Debug, Clone, serde::Serialize, Deserialize)]
struct TokenBody {
    token: String,
}

#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed building HTTP client for task API")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: None,
        })
    }

    pub fn from_config(cfg: &Config) -> anyhow::Result<Self> {
        let base = cfg
            .get("api.base")
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string());
        let timeout_secs = match cfg.get("api.timeout") {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .with_context(|| format!("invalid api.timeout: {raw}"))?,
            None => DEFAULT_TIMEOUT_SECS,
        };
        debug!(base = %base, timeout_secs, "configured API client");
        Self::new(&base, Duration::from_secs(timeout_secs))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn set_token(&mut self, token: Option<String>) {
        self.token = token;
    }

    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    #[instrument(skip(self))]
    pub async fn health(&self) -> Result<Health, ApiError> {
        let request = self.request(Method::GET, "/health");
        self.send_json(request).await
    }

    #[instrument(skip(self, password))]
    pub async fn register(&self, login: &str, password: &str) -> Result<RegisterResponse, ApiError> {
        let body = Credentials {
            login: login.to_string(),
            password: password.to_string(),
        };
        let request = self.request(Method::POST, "/register").json(&body);
        self.send_json(request).await
    }

    #[instrument(skip(self, password))]
    pub async fn login(&self, login: &str, password: &str) -> Result<LoginResponse, ApiError> {
        let body = Credentials {
            login: login.to_string(),
            password: password.to_string(),
        };
        let request = self.request(Method::POST, "/login").json(&body);
        self.send_json(request).await
    }

    /// Exchanges the current token for a fresh one.
    #[instrument(skip(self))]
    pub async fn refresh_token(&self) -> Result<String, ApiError> {
        let token = self.token.clone().ok_or(ApiError::MissingToken)?;
        let request = self
            .request(Method::POST, "/refresh")
            .json(&TokenBody { token });
        let body: TokenBody = self.send_json(request).await?;
        Ok(body.token)
    }

    #[instrument(skip(self))]
    pub async fn me(&self) -> Result<User, ApiError> {
        let request = self.authed(Method::GET, "/me")?;
        self.send_json(request).await
    }

    #[instrument(skip(self))]
    pub async fn list_tasks(&self) -> Result<Vec<Task>, ApiError> {
        let request = self.authed(Method::GET, "/tasks")?;
        let tasks: Vec<Task> = self.send_json(request).await?;
        debug!(count = tasks.len(), "fetched tasks");
        Ok(tasks)
    }

    #[instrument(skip(self))]
    pub async fn get_task(&self, id: &str) -> Result<Task, ApiError> {
        let request = self.authed(Method::GET, &format!("/tasks/{id}"))?;
        self.send_json(request).await
    }

    #[instrument(skip(self, input), fields(title = %input.title))]
    pub async fn create_task(&self, input: &TaskInput) -> Result<Task, ApiError> {
        let request = self.authed(Method::POST, "/tasks")?.json(input);
        self.send_json(request).await
    }

    #[instrument(skip(self, input))]
    pub async fn update_task(&self, id: &str, input: &TaskInput) -> Result<Task, ApiError> {
        let request = self.authed(Method::PUT, &format!("/tasks/{id}"))?.json(input);
        self.send_json(request).await
    }

    #[instrument(skip(self))]
    pub async fn toggle_task(&self, id: &str) -> Result<Task, ApiError> {
        let request = self.authed(Method::PUT, &format!("/tasks/{id}/toggle"))?;
        self.send_json(request).await
    }

    #[instrument(skip(self))]
    pub async fn delete_task(&self, id: &str) -> Result<(), ApiError> {
        let request = self.authed(Method::DELETE, &format!("/tasks/{id}"))?;
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let text = response.text().await.unwrap_or_default();
        Err(error_for_status(status, &text))
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{path}", self.base_url);
        debug!(method = %method, url = %url, "API request");
        self.client.request(method, url)
    }

    fn authed(&self, method: Method, path: &str) -> Result<RequestBuilder, ApiError> {
        let token = self.token.as_deref().ok_or(ApiError::MissingToken)?;
        Ok(self.request(method, path).bearer_auth(token))
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ApiError> {
        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(error_for_status(status, &text));
        }

        serde_json::from_str(&text).map_err(|err| {
            warn!(error = %err, body = %text, "failed to parse API response");
            ApiError::Decode(err)
        })
    }
}

fn error_for_status(status: StatusCode, body: &str) -> ApiError {
    let message = serde_json::from_str::<ErrorBody>(body)
        .map(|parsed| parsed.error)
        .unwrap_or_else(|_| {
            let trimmed = body.trim();
            if trimmed.is_empty() {
                status
                    .canonical_reason()
                    .unwrap_or("request failed")
                    .to_string()
            } else {
                trimmed.to_string()
            }
        });

    if status == StatusCode::UNAUTHORIZED {
        ApiError::Unauthorized { message }
    } else {
        ApiError::Api {
            status: status.as_u16(),
            message,
        }
    }
}

#[cfg(test)]
mod tests {
    use reqwest::StatusCode;

    use super::{ApiError, error_for_status};

    #[test]
    fn json_error_body_becomes_message() {
        let err = error_for_status(StatusCode::BAD_REQUEST, r#"{"error":"title is required"}"#);
        match err {
            ApiError::Api { status, message } => {
                assert_eq!(status, 400);
                assert_eq!(message, "title is required");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn unauthorized_is_an_auth_failure() {
        let err = error_for_status(StatusCode::UNAUTHORIZED, "");
        assert!(err.is_auth_failure());
        assert_eq!(err.to_string(), "unauthorized: Unauthorized");

        let err = error_for_status(StatusCode::INTERNAL_SERVER_ERROR, "boom");
        assert!(!err.is_auth_failure());
        assert_eq!(err.to_string(), "API error: 500 - boom");
    }
}
