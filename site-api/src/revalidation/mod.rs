//! Cache invalidation for CMS change notifications.
//!
//! A notification names the content model that changed. The model is looked
//! up in [`MODEL_ROUTES`] to find the pages that render it, and each page is
//! handed to the configured [`PageInvalidator`].

pub mod invalidator;

use crate::config::{InvalidatorConfig, RevalidationConfig, SecretPolicy};
use crate::errors::SiteApiError;
use crate::metrics_defs::PATHS_INVALIDATED;
use invalidator::{LogInvalidator, PageInvalidator, WebhookInvalidator};
use serde_json::Value;
use shared::counter;
use std::fmt;
use std::sync::Arc;

/// Placeholder replaced by the entry id in detail-page templates.
const ENTRY_ID: &str = "{id}";

/// Pages refreshed when the notification does not name a model.
pub const DEFAULT_PATHS: &[&str] = &["/", "/investor-relations", "/press-releases"];

pub struct ModelRoute {
    /// Model names, singular and plural, lowercase
    pub models: &'static [&'static str],
    /// Paths to invalidate, in order. Templates containing `{id}` are only
    /// used when the notification carries an entry id.
    pub paths: &'static [&'static str],
}

pub const MODEL_ROUTES: &[ModelRoute] = &[
    ModelRoute {
        models: &["press-release", "press-releases"],
        paths: &["/press-releases", "/investor-relations", "/press-releases/{id}"],
    },
    ModelRoute {
        models: &["sec-filing", "sec-filings"],
        paths: &["/investor-relations", "/investor-relations/sec-filings"],
    },
    ModelRoute {
        models: &["event", "events"],
        paths: &["/investor-relations", "/investor-relations/events"],
    },
    ModelRoute {
        models: &["news", "news-article", "news-articles"],
        paths: &["/news", "/news/{id}"],
    },
    ModelRoute {
        models: &["homepage", "home-page"],
        paths: &["/"],
    },
    ModelRoute {
        models: &["team-member", "team-members"],
        paths: &["/about", "/about/leadership"],
    },
    ModelRoute {
        models: &["faq", "faqs"],
        paths: &["/investor-relations/faq"],
    },
    ModelRoute {
        models: &["site-setting", "site-settings", "global"],
        paths: &["/", "/investor-relations", "/press-releases", "/news", "/about"],
    },
];

/// CMS entry identifier; numeric for most models but accepted as text too.
#[derive(Clone, Debug, PartialEq)]
pub enum EntryId {
    Number(i64),
    Text(String),
}

impl EntryId {
    /// Reads an id from any JSON scalar. Numbers that don't fit an `i64`
    /// keep their JSON text; booleans, null and containers yield `None`.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => Some(match n.as_i64() {
                Some(i) => EntryId::Number(i),
                None => EntryId::Text(n.to_string()),
            }),
            Value::String(s) => Some(EntryId::Text(s.clone())),
            _ => None,
        }
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryId::Number(n) => write!(f, "{n}"),
            EntryId::Text(s) => write!(f, "{s}"),
        }
    }
}

/// A change notification after the model name has been normalized.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Notification {
    pub model: Option<String>,
    pub entry_id: Option<EntryId>,
}

impl Notification {
    pub fn new(model: Option<&str>, entry_id: Option<EntryId>) -> Self {
        let model = model
            .map(|m| m.trim().to_lowercase())
            .filter(|m| !m.is_empty());
        Self { model, entry_id }
    }
}

/// Resolves the ordered list of paths to invalidate for a notification.
///
/// No model yields [`DEFAULT_PATHS`]; an unknown model yields nothing.
pub fn paths_for(notification: &Notification) -> Vec<String> {
    let Some(model) = notification.model.as_deref() else {
        return DEFAULT_PATHS.iter().map(|p| p.to_string()).collect();
    };

    let Some(route) = MODEL_ROUTES.iter().find(|r| r.models.contains(&model)) else {
        return Vec::new();
    };

    route
        .paths
        .iter()
        .filter_map(|template| {
            if !template.contains(ENTRY_ID) {
                return Some(template.to_string());
            }
            let id = notification.entry_id.as_ref()?.to_string();
            (!id.is_empty()).then(|| template.replace(ENTRY_ID, &id))
        })
        .collect()
}

pub struct RevalidationGateway {
    secret: Option<String>,
    policy: SecretPolicy,
    invalidator: Arc<dyn PageInvalidator>,
}

impl RevalidationGateway {
    pub fn new(
        secret: Option<String>,
        policy: SecretPolicy,
        invalidator: Arc<dyn PageInvalidator>,
    ) -> Self {
        Self {
            secret: secret.filter(|s| !s.is_empty()),
            policy,
            invalidator,
        }
    }

    pub fn from_config(config: &RevalidationConfig, client: reqwest::Client) -> Self {
        let invalidator: Arc<dyn PageInvalidator> = match &config.invalidator {
            InvalidatorConfig::Log => Arc::new(LogInvalidator),
            InvalidatorConfig::Webhook { url, token } => Arc::new(WebhookInvalidator::new(
                client,
                url.clone(),
                token.clone(),
            )),
        };

        let gateway = Self::new(config.secret.clone(), config.secret_policy, invalidator);
        if gateway.secret.is_none() && gateway.policy == SecretPolicy::AllowOpen {
            tracing::warn!("No revalidation secret configured, the endpoint accepts any caller");
        }
        gateway
    }

    /// Checks the secret presented by the caller.
    pub fn authorize(&self, presented: Option<&str>) -> Result<(), SiteApiError> {
        match (&self.secret, self.policy) {
            (Some(expected), _) if presented == Some(expected.as_str()) => Ok(()),
            (Some(_), _) => Err(SiteApiError::Unauthorized),
            (None, SecretPolicy::AllowOpen) => {
                tracing::warn!("Revalidation accepted without a secret");
                Ok(())
            }
            (None, SecretPolicy::RequireSecret) => {
                Err(SiteApiError::MissingConfig("REVALIDATION_SECRET"))
            }
        }
    }

    /// Invalidates every page affected by the notification and returns the
    /// paths that were invalidated successfully, in order.
    pub async fn revalidate(&self, notification: &Notification) -> Vec<String> {
        let mut invalidated = Vec::new();

        for path in paths_for(notification) {
            match self.invalidator.invalidate(&path).await {
                Ok(()) => invalidated.push(path),
                Err(e) => {
                    tracing::error!(
                        path = %path,
                        invalidator = self.invalidator.name(),
                        error = %e,
                        "Failed to invalidate page"
                    );
                }
            }
        }

        counter!(PATHS_INVALIDATED).increment(invalidated.len() as u64);
        tracing::info!(
            model = ?notification.model,
            entry = ?notification.entry_id,
            paths = ?invalidated,
            "Revalidated pages"
        );

        invalidated
    }
}
