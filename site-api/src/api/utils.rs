use crate::errors::{Result, SiteApiError};
use http::header::{CACHE_CONTROL, HeaderMap, HeaderValue};
use http::{Method, StatusCode, Uri};
use http_body_util::BodyExt;
use http_body_util::combinators::BoxBody;
use hyper::Response;
use hyper::body::{Body, Bytes};
use shared::http::full_body;
use std::fmt::Display;

pub type HandlerBody = BoxBody<Bytes, SiteApiError>;

/// First value of a query parameter, percent-decoded.
pub fn query_param(uri: &Uri, key: &str) -> Option<String> {
    let query = uri.query()?;
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.into_owned())
}

/// Header value as a string, ignoring values that aren't valid UTF-8.
pub fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

pub fn ensure_method(method: &Method, allowed: &[Method]) -> Result<()> {
    if allowed.contains(method) {
        Ok(())
    } else {
        Err(SiteApiError::MethodNotAllowed)
    }
}

/// Reads the whole request body.
pub async fn read_body<B>(body: B) -> Result<Bytes>
where
    B: Body + Send,
    B::Error: Display,
{
    let collected = body
        .collect()
        .await
        .map_err(|e| SiteApiError::RequestBodyError(e.to_string()))?;
    Ok(collected.to_bytes())
}

/// A 200 JSON response that passes already-encoded bytes through untouched.
pub fn json_passthrough(bytes: Bytes, cache_control: &'static str) -> Response<HandlerBody> {
    let mut response = Response::new(full_body(bytes));
    *response.status_mut() = StatusCode::OK;
    let headers = response.headers_mut();
    headers.insert(
        http::header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    headers.insert(CACHE_CONTROL, HeaderValue::from_static(cache_control));
    response
}
