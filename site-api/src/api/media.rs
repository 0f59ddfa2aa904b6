use crate::api::utils::{HandlerBody, ensure_method};
use crate::config::ENV_MEDIA_URL;
use crate::context::AppContext;
use crate::errors::{Result, SiteApiError};
use crate::metrics_defs::UPSTREAM_DURATION;
use http::Method;
use hyper::Response;
use media::MediaError;
use shared::histogram;
use shared::http::{add_via_header, full_body};
use std::time::Instant;

/// Streams a media asset from the media host back to the client.
///
/// `remainder` is the request path after the local media prefix.
pub async fn proxy_media(
    ctx: &AppContext,
    method: &Method,
    remainder: Option<&str>,
) -> Result<Response<HandlerBody>> {
    ensure_method(method, &[Method::GET])?;

    let fetcher = ctx
        .media
        .as_ref()
        .ok_or(SiteApiError::MissingConfig(ENV_MEDIA_URL))?;

    let started = Instant::now();
    let result = fetcher.fetch(remainder.unwrap_or_default()).await;
    histogram!(UPSTREAM_DURATION, "upstream" => "media").record(started.elapsed().as_secs_f64());

    let asset = result.map_err(|e| match e {
        MediaError::InvalidPath(path) => {
            tracing::debug!(path, "Rejected media path");
            SiteApiError::BadRequest("Invalid media path".into())
        }
        MediaError::UpstreamStatus(status) => SiteApiError::Upstream {
            status,
            error: "Failed to fetch media".into(),
            message: None,
        },
        other => SiteApiError::upstream("Failed to proxy media", Some(other.to_string())),
    })?;

    let headers = asset.headers();
    let mut response = Response::new(full_body(asset.body));
    *response.headers_mut() = headers;
    add_via_header(response.headers_mut(), asset.version);
    Ok(response)
}
