use crate::api::utils::{HandlerBody, ensure_method};
use crate::config::ENV_CMS_URL;
use crate::context::AppContext;
use crate::errors::{Result, SiteApiError};
use crate::metrics_defs::UPSTREAM_DURATION;
use http::{Method, StatusCode};
use hyper::Response;
use serde::Serialize;
use serde_json::Value;
use shared::histogram;
use shared::http::make_json_response;
use std::time::Instant;

#[derive(Serialize)]
struct CollectionResponse {
    data: Vec<Value>,
}

fn is_collection_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
}

/// `GET /api/cms/{collection}`: every entry of a CMS collection, with media
/// references rewritten to the local media proxy.
pub async fn read_collection(
    ctx: &AppContext,
    method: &Method,
    collection: Option<&str>,
) -> Result<Response<HandlerBody>> {
    ensure_method(method, &[Method::GET])?;

    let collection = collection
        .filter(|c| is_collection_name(c))
        .ok_or_else(|| SiteApiError::BadRequest("Invalid collection name".into()))?;
    let cms = ctx
        .cms
        .as_ref()
        .ok_or(SiteApiError::MissingConfig(ENV_CMS_URL))?;

    let started = Instant::now();
    let mut data = cms.fetch_collection(collection).await;
    histogram!(UPSTREAM_DURATION, "upstream" => "cms").record(started.elapsed().as_secs_f64());

    for entry in &mut data {
        ctx.rewriter.rewrite_media_urls(entry);
    }

    Ok(make_json_response(StatusCode::OK, &CollectionResponse { data }))
}
