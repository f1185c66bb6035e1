//! Collaborator ports and their HTTP implementation.

use std::time::Duration;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use tracing::debug;

use super::types::{
    Ack, AdvanceRequest, AdvanceResponse, AssetRequest, AssetResponse, InitSessionResponse,
    SessionRequest,
};
use crate::error::GuidanceError;
use crate::session::SessionId;
use crate::Result;

/// Remote service that generates and paces steps.
#[async_trait]
pub trait StepService: Send + Sync {
    /// Fetch (or create) the caller's session.
    async fn init_session(&self) -> Result<InitSessionResponse>;

    /// Destroy a session and its answers.
    async fn clear_session(&self, session_id: &SessionId) -> Result<()>;

    /// Submit an answer and receive the next step.
    async fn advance(&self, request: &AdvanceRequest) -> Result<AdvanceResponse>;

    /// Ask for the final analysis of a completed session.
    async fn analyze(&self, session_id: &SessionId) -> Result<()>;
}

/// Remote service that turns an option label into a media reference.
#[async_trait]
pub trait AssetResolver: Send + Sync {
    async fn resolve(&self, option_label: &str) -> Result<String>;
}

/// Step service and asset resolver over HTTP/JSON.
#[derive(Clone)]
pub struct HttpStepService {
    base_url: String,
    token: Option<String>,
    client: reqwest::Client,
}

impl HttpStepService {
    /// Create a client for the API rooted at `base_url`.
    pub fn new(base_url: impl Into<String>, token: Option<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GuidanceError::Transport(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
            client,
        })
    }

    /// The API root.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        debug!("API request: POST {}", url);

        let mut req = self.client.post(&url).json(body);
        if let Some(ref token) = self.token {
            req = req.bearer_auth(token);
        }

        let response = req.send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(GuidanceError::Http {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response.json::<T>().await?)
    }
}

impl std::fmt::Debug for HttpStepService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpStepService")
            .field("base_url", &self.base_url)
            .field("authenticated", &self.token.is_some())
            .finish()
    }
}

fn ack_to_result(ack: Ack, what: &str) -> Result<()> {
    if ack.success {
        Ok(())
    } else {
        Err(GuidanceError::Rejected(
            ack.message.unwrap_or_else(|| format!("{} failed", what)),
        ))
    }
}

#[async_trait]
impl StepService for HttpStepService {
    async fn init_session(&self) -> Result<InitSessionResponse> {
        self.post("/test/session", &serde_json::json!({})).await
    }

    async fn clear_session(&self, session_id: &SessionId) -> Result<()> {
        let body = SessionRequest {
            session_id: session_id.clone(),
        };
        let ack: Ack = self.post("/test/session/clear", &body).await?;
        ack_to_result(ack, "clear session")
    }

    async fn advance(&self, request: &AdvanceRequest) -> Result<AdvanceResponse> {
        self.post("/test/step", request).await
    }

    async fn analyze(&self, session_id: &SessionId) -> Result<()> {
        let body = SessionRequest {
            session_id: session_id.clone(),
        };
        let ack: Ack = self.post("/test/analyze", &body).await?;
        ack_to_result(ack, "analysis")
    }
}

#[async_trait]
impl AssetResolver for HttpStepService {
    async fn resolve(&self, option_label: &str) -> Result<String> {
        let body = AssetRequest {
            option_label: option_label.to_string(),
        };
        let resp: AssetResponse = self.post("/test/option-image", &body).await?;
        match resp.resolved_url {
            Some(url) if resp.success && !url.is_empty() => Ok(url),
            _ => Err(GuidanceError::Rejected(format!(
                "no asset for option '{}'",
                option_label
            ))),
        }
    }
}
