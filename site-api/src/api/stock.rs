//! Pass-through proxy for the stock ticker backend.
//!
//! Requests are forwarded with caching disabled; the cache policy of the
//! response is decided here, not by the backend.

use crate::api::utils::{HandlerBody, ensure_method, json_passthrough, query_param};
use crate::context::AppContext;
use crate::errors::{Result, SiteApiError};
use crate::metrics_defs::UPSTREAM_DURATION;
use chrono::NaiveDate;
use http::header::{CACHE_CONTROL, PRAGMA};
use http::{Method, StatusCode, Uri};
use hyper::Response;
use hyper::body::Bytes;
use serde::de::IgnoredAny;
use shared::histogram;
use std::time::Instant;
use url::Url;

const LIVE_CACHE_CONTROL: &str = "public, max-age=30, s-maxage=60, stale-while-revalidate=30";
// Quotes for past dates never change.
const HISTORICAL_CACHE_CONTROL: &str = "public, max-age=3600, s-maxage=86400";

const LIVE_FAILURE: &str = "Failed to fetch live stock data";
const HISTORICAL_FAILURE: &str = "Failed to fetch stock data";

/// `GET /api/live-stock?symbol=`
pub async fn live_quote(ctx: &AppContext, method: &Method, uri: &Uri) -> Result<Response<HandlerBody>> {
    ensure_method(method, &[Method::GET])?;
    let symbol = requested_symbol(uri, &ctx.config.stock.default_symbol);
    let url = backend_url(ctx.stock_backend()?, "api/live-stock", &[("symbol", symbol.as_str())])?;

    let (status, body) = forward(ctx, url, LIVE_FAILURE).await?;
    if !status.is_success() {
        return Err(SiteApiError::upstream(
            LIVE_FAILURE,
            Some(format!("Backend responded with {status}")),
        ));
    }

    ensure_json(&body, LIVE_FAILURE)?;
    Ok(json_passthrough(body, LIVE_CACHE_CONTROL))
}

/// `GET /api/stock?symbol=&date=YYYY-MM-DD`
pub async fn historical_quote(
    ctx: &AppContext,
    method: &Method,
    uri: &Uri,
) -> Result<Response<HandlerBody>> {
    ensure_method(method, &[Method::GET])?;

    let date = query_param(uri, "date")
        .filter(|d| !d.is_empty())
        .ok_or_else(|| SiteApiError::BadRequest("Date parameter is required".into()))?;
    if !is_valid_date(&date) {
        return Err(SiteApiError::BadRequest(
            "Invalid date format. Use YYYY-MM-DD".into(),
        ));
    }

    let symbol = requested_symbol(uri, &ctx.config.stock.default_symbol);
    let url = backend_url(
        ctx.stock_backend()?,
        "api/stock",
        &[("symbol", symbol.as_str()), ("date", date.as_str())],
    )?;

    let (status, body) = forward(ctx, url, HISTORICAL_FAILURE).await?;
    if status == StatusCode::NOT_FOUND {
        return Err(SiteApiError::NotFound(format!(
            "No stock data available for {date}"
        )));
    }
    if !status.is_success() {
        return Err(SiteApiError::upstream(
            HISTORICAL_FAILURE,
            Some(format!("Backend responded with {status}")),
        ));
    }

    ensure_json(&body, HISTORICAL_FAILURE)?;
    Ok(json_passthrough(body, HISTORICAL_CACHE_CONTROL))
}

fn requested_symbol(uri: &Uri, default: &str) -> String {
    query_param(uri, "symbol")
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| default.to_string())
        .to_uppercase()
}

fn is_valid_date(date: &str) -> bool {
    let shaped = date.len() == 10
        && date.bytes().enumerate().all(|(i, b)| match i {
            4 | 7 => b == b'-',
            _ => b.is_ascii_digit(),
        });
    shaped && NaiveDate::parse_from_str(date, "%Y-%m-%d").is_ok()
}

fn backend_url(base: &Url, path: &str, params: &[(&str, &str)]) -> Result<Url> {
    let raw = format!("{}/{path}", base.as_str().trim_end_matches('/'));
    let mut url = Url::parse(&raw)
        .map_err(|e| SiteApiError::InternalError(format!("Invalid stock backend URL: {e}")))?;
    url.query_pairs_mut().extend_pairs(params);
    Ok(url)
}

/// Sends one uncached GET to the backend. Network failures are final.
async fn forward(ctx: &AppContext, url: Url, failure: &str) -> Result<(StatusCode, Bytes)> {
    tracing::debug!(url = %url, "Forwarding to stock backend");
    let started = Instant::now();

    let result = async {
        let response = ctx
            .client
            .get(url)
            .header(CACHE_CONTROL, "no-store")
            .header(PRAGMA, "no-cache")
            .send()
            .await?;
        let status = response.status();
        let body = response.bytes().await?;
        Ok::<_, reqwest::Error>((status, body))
    }
    .await;

    histogram!(UPSTREAM_DURATION, "upstream" => "stock").record(started.elapsed().as_secs_f64());
    result.map_err(|e| SiteApiError::upstream(failure, Some(e.to_string())))
}

fn ensure_json(body: &[u8], failure: &str) -> Result<()> {
    serde_json::from_slice::<IgnoredAny>(body)
        .map(|_| ())
        .map_err(|e| SiteApiError::upstream(failure, Some(e.to_string())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutils::{body_json, test_context};
    use serde_json::json;
    use shared::testutils::{MockUpstream, bytes_response, json_response};

    async fn backend() -> MockUpstream {
        MockUpstream::start(|req| match (req.uri.path(), req.query_param("date").as_deref()) {
            ("/api/live-stock", _) => json_response(200, json!({"symbol": "DGXX", "price": 2.31})),
            ("/api/stock", Some("2024-01-01")) => json_response(404, json!({"detail": "none"})),
            ("/api/stock", Some("2024-01-02")) => {
                json_response(200, json!({"close": 24.5, "volume": 1200}))
            }
            ("/api/stock", Some("2024-01-03")) => bytes_response(200, None, b"<html>"),
            _ => json_response(503, json!({})),
        })
        .await
    }

    fn uri(s: &str) -> Uri {
        s.parse().unwrap()
    }

    #[tokio::test]
    async fn test_live_quote_symbol() {
        let upstream = backend().await;
        let base = upstream.base_url();
        let ctx = test_context(|c| c.upstreams.stock_backend_url = Some(base.parse().unwrap()));

        let response = live_quote(&ctx, &Method::GET, &uri("/api/live-stock"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(CACHE_CONTROL).unwrap(),
            LIVE_CACHE_CONTROL
        );
        assert_eq!(
            body_json(response).await,
            json!({"symbol": "DGXX", "price": 2.31})
        );

        live_quote(&ctx, &Method::GET, &uri("/api/live-stock?symbol=dgxx"))
            .await
            .unwrap();

        let requests = upstream.requests();
        assert_eq!(requests[0].query_param("symbol").as_deref(), Some("DGXX"));
        assert_eq!(requests[1].query_param("symbol").as_deref(), Some("DGXX"));
        assert_eq!(requests[0].headers.get("cache-control").unwrap(), "no-store");
        assert_eq!(requests[0].headers.get("pragma").unwrap(), "no-cache");
    }

    #[tokio::test]
    async fn test_historical_quote() {
        let upstream = backend().await;
        let base = upstream.base_url();
        let ctx = test_context(|c| c.upstreams.stock_backend_url = Some(base.parse().unwrap()));

        let err = historical_quote(&ctx, &Method::GET, &uri("/api/stock?symbol=DGXX"))
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_json(err.into_response()).await,
            json!({"error": "Date parameter is required"})
        );

        for bad in ["2024-1-01", "01-01-2024", "2024-02-30", "yesterday"] {
            let err = historical_quote(&ctx, &Method::GET, &uri(&format!("/api/stock?date={bad}")))
                .await
                .unwrap_err();
            assert_eq!(err.status(), StatusCode::BAD_REQUEST, "{bad}");
        }

        let err = historical_quote(&ctx, &Method::GET, &uri("/api/stock?date=2024-01-01"))
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            body_json(err.into_response()).await,
            json!({"error": "No stock data available for 2024-01-01"})
        );

        let response = historical_quote(&ctx, &Method::GET, &uri("/api/stock?date=2024-01-02"))
            .await
            .unwrap();
        assert_eq!(
            response.headers().get(CACHE_CONTROL).unwrap(),
            HISTORICAL_CACHE_CONTROL
        );
        assert_eq!(
            body_json(response).await,
            json!({"close": 24.5, "volume": 1200})
        );

        // validation failures never reach the backend
        assert_eq!(upstream.requests().len(), 2);
    }

    #[tokio::test]
    async fn test_backend_failures() {
        let upstream = backend().await;
        let base = upstream.base_url();
        let ctx = test_context(|c| c.upstreams.stock_backend_url = Some(base.parse().unwrap()));

        let err = historical_quote(&ctx, &Method::GET, &uri("/api/stock?date=2024-01-04"))
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(err.into_response()).await;
        assert_eq!(body["error"], HISTORICAL_FAILURE);
        assert!(body["message"].as_str().unwrap().contains("503"));

        let err = historical_quote(&ctx, &Method::GET, &uri("/api/stock?date=2024-01-03"))
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let err = live_quote(&ctx, &Method::POST, &uri("/api/live-stock"))
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn test_missing_backend() {
        let ctx = test_context(|_| {});
        let err = live_quote(&ctx, &Method::GET, &uri("/api/live-stock"))
            .await
            .unwrap_err();
        assert!(matches!(err, SiteApiError::MissingConfig("STOCK_BACKEND_URL")));

        let unreachable =
            test_context(|c| c.upstreams.stock_backend_url = Some("http://127.0.0.1:9".parse().unwrap()));
        let response = live_quote(&unreachable, &Method::GET, &uri("/api/live-stock"))
            .await
            .unwrap_err()
            .into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert_eq!(body["error"], LIVE_FAILURE);
        assert!(body.get("message").is_some());
    }

    #[test]
    fn test_backend_url() {
        let base: Url = "http://stock:8000/".parse().unwrap();
        let url = backend_url(&base, "api/stock", &[("symbol", "DGXX"), ("date", "2024-01-02")]).unwrap();
        assert_eq!(
            url.as_str(),
            "http://stock:8000/api/stock?symbol=DGXX&date=2024-01-02"
        );
    }
}
