use media::config::{CmsConfig, MediaConfig};
use serde::Deserialize;
use thiserror::Error;
use url::Url;

pub const ENV_STOCK_BACKEND_URL: &str = "STOCK_BACKEND_URL";
pub const ENV_CMS_URL: &str = "CMS_URL";
pub const ENV_MEDIA_URL: &str = "MEDIA_URL";
pub const ENV_CMS_API_TOKEN: &str = "CMS_API_TOKEN";
pub const ENV_REVALIDATION_SECRET: &str = "REVALIDATION_SECRET";

pub const DEFAULT_SYMBOL: &str = "DGXX";

#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Port cannot be 0")]
    InvalidPort,

    #[error("Default stock symbol cannot be empty")]
    EmptyDefaultSymbol,

    #[error("Media prefix must be a root-relative path below /: {0}")]
    InvalidLocalPrefix(String),

    #[error("CMS page size cannot be 0")]
    InvalidPageSize,

    #[error("{var} is not a valid URL: {reason}")]
    InvalidEnvUrl { var: &'static str, reason: String },
}

/// Site API configuration
///
/// Upstream URLs are optional: a missing URL only fails the requests that
/// need it, never startup.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Config {
    /// Main listener for incoming requests
    pub listener: Listener,
    /// Admin listener for health and readiness probes
    pub admin_listener: Listener,
    #[serde(default)]
    pub upstreams: Upstreams,
    #[serde(default)]
    pub media: MediaConfig,
    #[serde(default)]
    pub cms: CmsConfig,
    #[serde(default)]
    pub stock: StockConfig,
    #[serde(default)]
    pub revalidation: RevalidationConfig,
}

impl Config {
    /// Validates the site API configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.listener.validate()?;
        self.admin_listener.validate()?;

        if self.stock.default_symbol.trim().is_empty() {
            return Err(ValidationError::EmptyDefaultSymbol);
        }

        if !self.media.local_prefix.starts_with('/') || self.media.normalized_prefix().is_empty()
        {
            return Err(ValidationError::InvalidLocalPrefix(
                self.media.local_prefix.clone(),
            ));
        }

        if self.cms.page_size == 0 {
            return Err(ValidationError::InvalidPageSize);
        }

        Ok(())
    }

    /// Overrides upstream URLs and secrets from environment-style variables.
    ///
    /// Empty values are ignored. `lookup` is usually `std::env::var(..).ok()`.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<(), ValidationError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());
        let parse_url = |var: &'static str, value: String| {
            Url::parse(value.trim()).map_err(|e| ValidationError::InvalidEnvUrl {
                var,
                reason: e.to_string(),
            })
        };

        if let Some(value) = lookup(ENV_STOCK_BACKEND_URL) {
            self.upstreams.stock_backend_url = Some(parse_url(ENV_STOCK_BACKEND_URL, value)?);
        }
        if let Some(value) = lookup(ENV_CMS_URL) {
            self.upstreams.cms_url = Some(parse_url(ENV_CMS_URL, value)?);
        }
        if let Some(value) = lookup(ENV_MEDIA_URL) {
            self.upstreams.media_url = Some(parse_url(ENV_MEDIA_URL, value)?);
        }
        if let Some(value) = lookup(ENV_CMS_API_TOKEN) {
            self.upstreams.cms_token = Some(value);
        }
        if let Some(value) = lookup(ENV_REVALIDATION_SECRET) {
            self.revalidation.secret = Some(value);
        }

        Ok(())
    }
}

/// Network listener configuration
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Listener {
    /// Host address to bind to (e.g., "0.0.0.0" or "127.0.0.1")
    pub host: String,
    /// Port number to listen on
    pub port: u16,
}

impl Listener {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.port == 0 {
            return Err(ValidationError::InvalidPort);
        }
        Ok(())
    }
}

/// Base URLs of the services this API talks to
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct Upstreams {
    /// Stock ticker backend serving `/api/live-stock` and `/api/stock`
    pub stock_backend_url: Option<Url>,
    /// Headless CMS; its host is also a media host
    pub cms_url: Option<Url>,
    /// Dedicated media host the media proxy fetches from
    pub media_url: Option<Url>,
    /// Bearer token for CMS REST reads
    pub cms_token: Option<String>,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct StockConfig {
    #[serde(default = "default_symbol")]
    pub default_symbol: String,
}

impl Default for StockConfig {
    fn default() -> Self {
        Self {
            default_symbol: default_symbol(),
        }
    }
}

fn default_symbol() -> String {
    DEFAULT_SYMBOL.to_string()
}

/// What to do when no revalidation secret is configured
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SecretPolicy {
    /// Accept unauthenticated revalidation requests
    #[default]
    AllowOpen,
    /// Refuse revalidation until a secret is configured
    RequireSecret,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum InvalidatorConfig {
    /// Only log the paths that would be invalidated
    #[default]
    Log,
    /// POST each path to the page cache's revalidation endpoint
    Webhook { url: Url, token: Option<String> },
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct RevalidationConfig {
    pub secret: Option<String>,
    #[serde(default)]
    pub secret_policy: SecretPolicy,
    #[serde(default)]
    pub invalidator: InvalidatorConfig,
}
