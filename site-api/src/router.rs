use crate::api;
use crate::api::utils::HandlerBody;
use crate::context::AppContext;
use crate::errors::Result;
use crate::metrics_defs::{REQUEST_DURATION, REQUESTS};
use http::StatusCode;
use hyper::body::Body;
use hyper::{Request, Response};
use routing::{Route, RouteTable};
use shared::http::make_error_response;
use shared::{counter, histogram};
use std::fmt::Display;
use std::sync::Arc;
use std::time::Instant;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Endpoint {
    Media,
    LiveStock,
    Stock,
    Revalidate,
    CmsCollection,
}

impl Endpoint {
    pub fn name(&self) -> &'static str {
        match self {
            Endpoint::Media => "media",
            Endpoint::LiveStock => "live_stock",
            Endpoint::Stock => "stock",
            Endpoint::Revalidate => "revalidate",
            Endpoint::CmsCollection => "cms_collection",
        }
    }
}

/// Dispatches requests to the endpoint handlers
#[derive(Clone)]
pub struct Router {
    ctx: Arc<AppContext>,
    routes: Arc<RouteTable<Endpoint>>,
}

impl Router {
    pub fn new(ctx: Arc<AppContext>) -> Self {
        let media_route = format!("{}/*", ctx.rewriter.local_prefix());
        let routes = RouteTable::new(vec![
            Route::new("/api/live-stock", Endpoint::LiveStock),
            Route::new("/api/stock", Endpoint::Stock),
            Route::new("/api/revalidate", Endpoint::Revalidate),
            Route::new("/api/cms/{collection}", Endpoint::CmsCollection),
            Route::new(&media_route, Endpoint::Media),
        ]);

        Self {
            ctx,
            routes: Arc::new(routes),
        }
    }

    /// Routes a request and always produces a response; handler errors are
    /// turned into their JSON error body here.
    pub async fn route<B>(&self, req: Request<B>) -> Response<HandlerBody>
    where
        B: Body + Send,
        B::Error: Display,
    {
        let started = Instant::now();

        let Some((endpoint, param)) = self.routes.resolve(&req).map(|m| {
            let param = m
                .splat()
                .or_else(|| m.params.get("collection").copied())
                .map(String::from);
            (*m.action, param)
        }) else {
            tracing::debug!(method = %req.method(), path = %req.uri().path(), "No route matched");
            let response = make_error_response(StatusCode::NOT_FOUND);
            record(started, "unmatched", response.status());
            return response;
        };

        let response = match self.dispatch(endpoint, param.as_deref(), req).await {
            Ok(response) => response,
            Err(e) => {
                tracing::debug!(endpoint = endpoint.name(), error = %e, "Request failed");
                e.into_response()
            }
        };

        record(started, endpoint.name(), response.status());
        response
    }

    async fn dispatch<B>(
        &self,
        endpoint: Endpoint,
        param: Option<&str>,
        req: Request<B>,
    ) -> Result<Response<HandlerBody>>
    where
        B: Body + Send,
        B::Error: Display,
    {
        let ctx = &self.ctx;
        match endpoint {
            Endpoint::Media => api::media::proxy_media(ctx, req.method(), param).await,
            Endpoint::LiveStock => api::stock::live_quote(ctx, req.method(), req.uri()).await,
            Endpoint::Stock => api::stock::historical_quote(ctx, req.method(), req.uri()).await,
            Endpoint::Revalidate => api::revalidate::revalidate(ctx, req).await,
            Endpoint::CmsCollection => api::cms::read_collection(ctx, req.method(), param).await,
        }
    }
}

fn record(started: Instant, route: &'static str, status: StatusCode) {
    let status = status.as_str().to_string();
    counter!(REQUESTS, "route" => route, "status" => status.clone()).increment(1);
    histogram!(REQUEST_DURATION, "route" => route, "status" => status)
        .record(started.elapsed().as_secs_f64());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutils::{body_json, test_context};
    use http::Method;
    use http_body_util::Empty;
    use hyper::body::Bytes;
    use serde_json::json;
    use shared::testutils::{MockUpstream, bytes_response, json_response};

    fn request(method: Method, uri: &str) -> Request<Empty<Bytes>> {
        Request::builder()
            .method(method)
            .uri(uri)
            .body(Empty::new())
            .unwrap()
    }

    #[tokio::test]
    async fn test_routes_to_endpoints() {
        let upstream = MockUpstream::start(|req| match req.uri.path() {
            "/api/live-stock" => json_response(200, json!({"price": 1})),
            "/uploads/a.png" => bytes_response(200, Some("image/png"), b"png"),
            _ => json_response(404, json!({})),
        })
        .await;
        let base = upstream.base_url();
        let router = Router::new(Arc::new(test_context(|c| {
            c.upstreams.stock_backend_url = Some(base.parse().unwrap());
            c.upstreams.media_url = Some(base.parse().unwrap());
        })));

        let response = router
            .route(request(Method::GET, "/api/live-stock?symbol=abc"))
            .await;
        assert_eq!(response.status(), StatusCode::OK);

        let response = router
            .route(request(Method::GET, "/api/media/uploads/a.png"))
            .await;
        assert_eq!(response.status(), StatusCode::OK);

        let response = router.route(request(Method::GET, "/api/media")).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = router.route(request(Method::GET, "/api/stock")).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = router.route(request(Method::DELETE, "/api/live-stock")).await;
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);

        let response = router.route(request(Method::GET, "/api/revalidate")).await;
        assert_eq!(response.status(), StatusCode::OK);

        assert_eq!(
            upstream.requests()[0].query_param("symbol").as_deref(),
            Some("ABC")
        );
    }

    #[tokio::test]
    async fn test_unmatched_and_unconfigured() {
        let router = Router::new(Arc::new(test_context(|_| {})));

        let response = router.route(request(Method::GET, "/api/unknown")).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await, json!({"error": "Not Found"}));

        let response = router.route(request(Method::GET, "/api/live-stock")).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body_json(response).await,
            json!({"error": "Server configuration error"})
        );

        let response = router.route(request(Method::GET, "/api/cms/events")).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
