use crate::api::utils::HandlerBody;
use crate::config::Config;
use crate::context::AppContext;
use crate::revalidation::invalidator::{InvalidationError, PageInvalidator};
use async_trait::async_trait;
use http_body_util::BodyExt;
use hyper::Response;
use std::sync::Mutex;

/// Context with no upstreams configured; `configure` fills in what a test needs.
pub fn test_context<F>(configure: F) -> AppContext
where
    F: FnOnce(&mut Config),
{
    let mut config: Config = serde_yaml::from_str(
        r#"
listener: {host: "127.0.0.1", port: 3000}
admin_listener: {host: "127.0.0.1", port: 3001}
"#,
    )
    .unwrap();
    configure(&mut config);
    AppContext::new(config).unwrap()
}

pub async fn body_json(response: Response<HandlerBody>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Invalidator that records every path. `/investor-relations/faq` always fails.
#[derive(Default)]
pub struct RecordingInvalidator {
    paths: Mutex<Vec<String>>,
}

impl RecordingInvalidator {
    pub fn paths(&self) -> Vec<String> {
        self.paths.lock().unwrap().clone()
    }
}

#[async_trait]
impl PageInvalidator for RecordingInvalidator {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn invalidate(&self, path: &str) -> Result<(), InvalidationError> {
        if path == "/investor-relations/faq" {
            return Err(InvalidationError::Status(http::StatusCode::BAD_GATEWAY));
        }
        self.paths.lock().unwrap().push(path.to_string());
        Ok(())
    }
}
