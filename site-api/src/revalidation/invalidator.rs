use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use url::Url;

#[derive(Error, Debug)]
pub enum InvalidationError {
    #[error("page cache request failed: {0}")]
    ReqwestError(#[from] reqwest::Error),
    #[error("page cache responded with status {0}")]
    Status(http::StatusCode),
}

/// Capability to drop one page from the site's rendered-page cache.
#[async_trait]
pub trait PageInvalidator: Send + Sync {
    fn name(&self) -> &'static str;

    async fn invalidate(&self, path: &str) -> Result<(), InvalidationError>;
}

/// Records invalidations in the log only. Used when no page cache is wired up.
pub struct LogInvalidator;

#[async_trait]
impl PageInvalidator for LogInvalidator {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn invalidate(&self, path: &str) -> Result<(), InvalidationError> {
        tracing::info!(path, "Invalidating page");
        Ok(())
    }
}

#[derive(Serialize)]
struct InvalidatePayload<'a> {
    path: &'a str,
}

/// Forwards each path to the rendering frontend's cache endpoint.
pub struct WebhookInvalidator {
    client: reqwest::Client,
    url: Url,
    token: Option<String>,
}

impl WebhookInvalidator {
    pub fn new(client: reqwest::Client, url: Url, token: Option<String>) -> Self {
        Self { client, url, token }
    }
}

#[async_trait]
impl PageInvalidator for WebhookInvalidator {
    fn name(&self) -> &'static str {
        "webhook"
    }

    async fn invalidate(&self, path: &str) -> Result<(), InvalidationError> {
        let mut request = self
            .client
            .post(self.url.clone())
            .json(&InvalidatePayload { path });
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(InvalidationError::Status(response.status()));
        }
        Ok(())
    }
}
