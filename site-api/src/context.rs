use crate::config::{Config, ENV_CMS_URL, ENV_MEDIA_URL, ENV_STOCK_BACKEND_URL};
use crate::errors::{Result, SiteApiError};
use crate::revalidation::RevalidationGateway;
use media::{CmsClient, MediaFetcher, MediaHosts, Rewriter};
use url::Url;

/// Everything a request handler needs, built once at startup.
///
/// Missing upstreams are kept as `None` so that only the endpoints that
/// depend on them fail.
pub struct AppContext {
    pub config: Config,
    pub client: reqwest::Client,
    pub rewriter: Rewriter,
    pub media: Option<MediaFetcher>,
    pub cms: Option<CmsClient>,
    pub revalidation: RevalidationGateway,
}

impl AppContext {
    pub fn new(config: Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("sitegate/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| SiteApiError::InternalError(format!("Failed to build HTTP client: {e}")))?;

        let upstreams = &config.upstreams;
        let hosts = MediaHosts::new(upstreams.cms_url.as_ref(), upstreams.media_url.as_ref());
        let rewriter = Rewriter::new(
            hosts,
            config.media.normalized_prefix(),
            upstreams.cms_url.clone(),
        );

        let media = upstreams
            .media_url
            .clone()
            .map(|base| MediaFetcher::new(client.clone(), base));
        let cms = upstreams.cms_url.clone().map(|base| {
            CmsClient::new(
                client.clone(),
                base,
                upstreams.cms_token.clone(),
                config.cms.page_size,
            )
        });

        for (var, configured) in [
            (ENV_STOCK_BACKEND_URL, upstreams.stock_backend_url.is_some()),
            (ENV_CMS_URL, cms.is_some()),
            (ENV_MEDIA_URL, media.is_some()),
        ] {
            if !configured {
                tracing::warn!(variable = var, "Upstream not configured, dependent endpoints will fail");
            }
        }

        let revalidation = RevalidationGateway::from_config(&config.revalidation, client.clone());

        Ok(Self {
            config,
            client,
            rewriter,
            media,
            cms,
            revalidation,
        })
    }

    pub fn stock_backend(&self) -> Result<&Url> {
        self.config
            .upstreams
            .stock_backend_url
            .as_ref()
            .ok_or(SiteApiError::MissingConfig(ENV_STOCK_BACKEND_URL))
    }
}
