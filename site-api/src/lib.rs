//! HTTP API of the corporate site: media proxy, stock quote proxy, CMS
//! collection reads and cache revalidation.

pub mod api;
pub mod config;
pub mod context;
pub mod errors;
pub mod metrics_defs;
pub mod revalidation;
pub mod router;

#[cfg(test)]
mod testutils;

use crate::api::utils::HandlerBody;
use crate::context::AppContext;
use crate::errors::SiteApiError;
use crate::router::Router;
use hyper::body::Incoming;
use hyper::service::Service;
use hyper::{Request, Response};
use shared::admin_service::AdminService;
use shared::http::run_http_service;
use std::pin::Pin;
use std::sync::Arc;

pub async fn run(config: config::Config) -> Result<(), SiteApiError> {
    let context = Arc::new(AppContext::new(config.clone())?);
    let service = SiteApiService {
        router: Router::new(context),
    };

    let api_task = run_http_service(&config.listener.host, config.listener.port, service);
    let admin_task = run_http_service(
        &config.admin_listener.host,
        config.admin_listener.port,
        AdminService::<_, SiteApiError>::new(|| true),
    );

    tokio::try_join!(api_task, admin_task)?;
    Ok(())
}

struct SiteApiService {
    router: Router,
}

impl Service<Request<Incoming>> for SiteApiService {
    type Response = Response<HandlerBody>;
    type Error = SiteApiError;
    type Future =
        Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send + 'static>>;

    fn call(&self, req: Request<Incoming>) -> Self::Future {
        let router = self.router.clone();
        Box::pin(async move { Ok(router.route(req).await) })
    }
}
