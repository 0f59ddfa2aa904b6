use crate::api::utils::{HandlerBody, ensure_method, header_str, query_param, read_body};
use crate::context::AppContext;
use crate::errors::Result;
use crate::revalidation::{EntryId, Notification};
use chrono::{SecondsFormat, Utc};
use http::{Method, StatusCode};
use hyper::body::Body;
use hyper::{Request, Response};
use serde::Serialize;
use serde_json::Value;
use shared::http::make_json_response;
use std::fmt::Display;

pub const SECRET_HEADER: &str = "x-revalidation-secret";

/// Fields read from the notification body.
#[derive(Debug, Default, PartialEq)]
struct RevalidateRequest {
    model: Option<String>,
    entry_id: Option<EntryId>,
}

#[derive(Debug, Serialize)]
struct RevalidateResponse {
    revalidated: bool,
    paths: Vec<String>,
    timestamp: String,
}

/// Handles a CMS change notification. `GET` behaves like `POST`.
pub async fn revalidate<B>(ctx: &AppContext, req: Request<B>) -> Result<Response<HandlerBody>>
where
    B: Body + Send,
    B::Error: Display,
{
    ensure_method(req.method(), &[Method::POST, Method::GET])?;

    let (parts, body) = req.into_parts();
    let secret = query_param(&parts.uri, "secret")
        .filter(|s| !s.is_empty())
        .or_else(|| {
            header_str(&parts.headers, SECRET_HEADER)
                .filter(|s| !s.is_empty())
                .map(String::from)
        });
    ctx.revalidation.authorize(secret.as_deref())?;

    let bytes = read_body(body).await?;
    let payload = parse_payload(&bytes);
    let model = payload
        .model
        .filter(|m| !m.trim().is_empty())
        .or_else(|| query_param(&parts.uri, "model"));

    let notification = Notification::new(model.as_deref(), payload.entry_id);
    let paths = ctx.revalidation.revalidate(&notification).await;

    Ok(make_json_response(
        StatusCode::OK,
        &RevalidateResponse {
            revalidated: true,
            paths,
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        },
    ))
}

/// A missing or unparseable body is treated as an empty notification. Each
/// field is read on its own, so a malformed entry id never hides the model.
fn parse_payload(bytes: &[u8]) -> RevalidateRequest {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return RevalidateRequest::default();
    }
    let value: Value = match serde_json::from_slice(bytes) {
        Ok(value) => value,
        Err(e) => {
            tracing::debug!(error = %e, "Ignoring malformed revalidation payload");
            return RevalidateRequest::default();
        }
    };

    RevalidateRequest {
        model: value.get("model").and_then(Value::as_str).map(String::from),
        entry_id: value.pointer("/entry/id").and_then(EntryId::from_json),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::SiteApiError;
    use crate::config::SecretPolicy;
    use crate::revalidation::RevalidationGateway;
    use crate::testutils::{RecordingInvalidator, body_json, test_context};
    use std::sync::Arc;
    use http_body_util::Full;
    use hyper::body::Bytes;
    use serde_json::json;

    fn request(method: Method, uri: &str, body: &'static str) -> Request<Full<Bytes>> {
        Request::builder()
            .method(method)
            .uri(uri)
            .body(Full::new(Bytes::from_static(body.as_bytes())))
            .unwrap()
    }

    #[tokio::test]
    async fn test_revalidate_press_release() {
        let ctx = test_context(|c| c.revalidation.secret = Some("s3cret".into()));
        let req = request(
            Method::POST,
            "/api/revalidate?secret=s3cret",
            r#"{"model": "press-release", "entry": {"id": 42}}"#,
        );

        let response = revalidate(&ctx, req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["revalidated"], true);
        assert_eq!(
            body["paths"],
            json!(["/press-releases", "/investor-relations", "/press-releases/42"])
        );
        let timestamp = body["timestamp"].as_str().unwrap();
        assert!(chrono::DateTime::parse_from_rfc3339(timestamp).is_ok());
    }

    #[tokio::test]
    async fn test_secret_sources() {
        let ctx = test_context(|c| c.revalidation.secret = Some("s3cret".into()));

        let req = Request::builder()
            .method(Method::POST)
            .uri("/api/revalidate")
            .header(SECRET_HEADER, "s3cret")
            .body(Full::new(Bytes::from_static(b"{}")))
            .unwrap();
        assert!(revalidate(&ctx, req).await.is_ok());

        let err = revalidate(&ctx, request(Method::POST, "/api/revalidate?secret=nope", "{}"))
            .await
            .unwrap_err();
        assert!(matches!(err, SiteApiError::Unauthorized));
        assert_eq!(
            body_json(err.into_response()).await,
            json!({"error": "Invalid secret"})
        );
    }

    #[tokio::test]
    async fn test_default_and_unknown_models() {
        let ctx = test_context(|_| {});

        let body = body_json(
            revalidate(&ctx, request(Method::GET, "/api/revalidate", ""))
                .await
                .unwrap(),
        )
        .await;
        assert_eq!(
            body["paths"],
            json!(["/", "/investor-relations", "/press-releases"])
        );

        let body = body_json(
            revalidate(&ctx, request(Method::POST, "/api/revalidate", "not json"))
                .await
                .unwrap(),
        )
        .await;
        assert_eq!(body["paths"].as_array().unwrap().len(), 3);

        let body = body_json(
            revalidate(&ctx, request(Method::GET, "/api/revalidate?model=Unknown", ""))
                .await
                .unwrap(),
        )
        .await;
        assert_eq!(body["revalidated"], true);
        assert_eq!(body["paths"], json!([]));

        let body = body_json(
            revalidate(&ctx, request(Method::GET, "/api/revalidate?model=%20FAQ%20", ""))
                .await
                .unwrap(),
        )
        .await;
        assert_eq!(body["paths"], json!(["/investor-relations/faq"]));
    }

    #[test]
    fn test_parse_payload_fields_independently() {
        assert_eq!(
            parse_payload(br#"{"model": "sec-filing", "entry": {"id": 4.5}}"#),
            RevalidateRequest {
                model: Some("sec-filing".into()),
                entry_id: Some(EntryId::Text("4.5".into())),
            }
        );
        assert_eq!(
            parse_payload(br#"{"model": "news", "entry": {"id": true}}"#),
            RevalidateRequest {
                model: Some("news".into()),
                entry_id: None,
            }
        );
        assert_eq!(
            parse_payload(br#"{"model": 7, "entry": {"id": 3}}"#),
            RevalidateRequest {
                model: None,
                entry_id: Some(EntryId::Number(3)),
            }
        );
        assert_eq!(parse_payload(b"[1, 2]"), RevalidateRequest::default());
        assert_eq!(parse_payload(b"  \n"), RevalidateRequest::default());
    }

    #[tokio::test]
    async fn test_malformed_entry_keeps_model() {
        let ctx = test_context(|_| {});

        let body = body_json(
            revalidate(
                &ctx,
                request(
                    Method::POST,
                    "/api/revalidate",
                    r#"{"model": "sec-filing", "entry": {"id": 4.5}}"#,
                ),
            )
            .await
            .unwrap(),
        )
        .await;
        assert_eq!(
            body["paths"],
            json!(["/investor-relations", "/investor-relations/sec-filings"])
        );

        let body = body_json(
            revalidate(
                &ctx,
                request(
                    Method::POST,
                    "/api/revalidate",
                    r#"{"model": "press-release", "entry": {"id": 18446744073709551615}}"#,
                ),
            )
            .await
            .unwrap(),
        )
        .await;
        assert_eq!(
            body["paths"],
            json!([
                "/press-releases",
                "/investor-relations",
                "/press-releases/18446744073709551615"
            ])
        );
    }

    #[tokio::test]
    async fn test_empty_values_fall_through() {
        let ctx = test_context(|c| c.revalidation.secret = Some("s3cret".into()));

        let req = Request::builder()
            .method(Method::POST)
            .uri("/api/revalidate?secret=&model=faq")
            .header(SECRET_HEADER, "s3cret")
            .body(Full::new(Bytes::from_static(br#"{"model": ""}"#)))
            .unwrap();
        let body = body_json(revalidate(&ctx, req).await.unwrap()).await;
        assert_eq!(body["paths"], json!(["/investor-relations/faq"]));

        let err = revalidate(&ctx, request(Method::POST, "/api/revalidate?secret=", "{}"))
            .await
            .unwrap_err();
        assert!(matches!(err, SiteApiError::Unauthorized));
    }

    #[tokio::test]
    async fn test_rejected_secret_invalidates_nothing() {
        let recorder = Arc::new(RecordingInvalidator::default());
        let mut ctx = test_context(|_| {});
        ctx.revalidation = RevalidationGateway::new(
            Some("s3cret".into()),
            SecretPolicy::AllowOpen,
            recorder.clone(),
        );

        let err = revalidate(
            &ctx,
            request(
                Method::POST,
                "/api/revalidate?secret=wrong",
                r#"{"model": "press-release", "entry": {"id": 42}}"#,
            ),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
        assert!(recorder.paths().is_empty());

        revalidate(
            &ctx,
            request(
                Method::POST,
                "/api/revalidate?secret=s3cret",
                r#"{"model": "press-release", "entry": {"id": 42}}"#,
            ),
        )
        .await
        .unwrap();
        assert_eq!(
            recorder.paths(),
            vec!["/press-releases", "/investor-relations", "/press-releases/42"]
        );
    }

    #[tokio::test]
    async fn test_rejects_other_methods() {
        let ctx = test_context(|_| {});
        let err = revalidate(&ctx, request(Method::PUT, "/api/revalidate", ""))
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::METHOD_NOT_ALLOWED);
    }
}
