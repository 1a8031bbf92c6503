//! Additional-details lookup service.
//!
//! - [`AdditionalDetailsLookup`] is the seam the flow calls through
//! - [`HttpAdditionalDetailsLookup`] talks to the REST endpoint
//! - tests script their own implementations

use crate::config::LookupConfig;
use crate::snapshot::LookupRequest;
use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LookupError {
    #[error("lookup endpoint is not configured")]
    NotConfigured,

    #[error("lookup request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("lookup returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("lookup response is not valid JSON: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

/// Resolves the raw additional-details payload for a complete snapshot.
///
/// The returned value is either the dual-state shape or the configuration
/// array; see [`crate::details`]. Errors are recovered by the caller.
#[async_trait]
pub trait AdditionalDetailsLookup: Send + Sync {
    async fn fetch(&self, request: &LookupRequest) -> Result<Value, LookupError>;
}

/// JSON-over-HTTP lookup client.
#[derive(Debug, Clone)]
pub struct HttpAdditionalDetailsLookup {
    client: reqwest::Client,
    url: String,
    api_token: Option<String>,
}

impl HttpAdditionalDetailsLookup {
    pub fn new(base_url: &str, path: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: format!(
                "{}/{}",
                base_url.trim_end_matches('/'),
                path.trim_start_matches('/')
            ),
            api_token: None,
        }
    }

    pub fn from_config(cfg: &LookupConfig) -> Result<Self, LookupError> {
        let base_url = cfg.base_url.as_deref().ok_or(LookupError::NotConfigured)?;
        let lookup = Self::new(base_url, &cfg.path);
        Ok(match &cfg.api_token {
            Some(token) => lookup.with_api_token(token.clone()),
            None => lookup,
        })
    }

    pub fn with_api_token(mut self, token: impl Into<String>) -> Self {
        self.api_token = Some(token.into());
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl AdditionalDetailsLookup for HttpAdditionalDetailsLookup {
    async fn fetch(&self, request: &LookupRequest) -> Result<Value, LookupError> {
        let mut builder = self.client.post(&self.url).json(request);
        if let Some(token) = &self.api_token {
            builder = builder.bearer_auth(token);
        }

        let response = builder.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(LookupError::Status {
                status: status.as_u16(),
                body,
            });
        }

        if body.trim().is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_str(&body).map_err(LookupError::Decode)
    }
}
