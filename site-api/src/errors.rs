use crate::api::utils::HandlerBody;
use http::StatusCode;
use hyper::Response;
use shared::http::make_error_body_response;
use thiserror::Error;

/// Result type alias for site-api operations
pub type Result<T, E = SiteApiError> = std::result::Result<T, E>;

/// Errors that can occur while handling a site API request
#[derive(Error, Debug)]
pub enum SiteApiError {
    /// Missing or malformed client input
    #[error("{0}")]
    BadRequest(String),

    #[error("Invalid secret")]
    Unauthorized,

    #[error("{0}")]
    NotFound(String),

    #[error("Method not allowed")]
    MethodNotAllowed,

    /// Upstream failure; `status` is what the client receives
    #[error("{error}")]
    Upstream {
        status: StatusCode,
        error: String,
        message: Option<String>,
    },

    /// A required upstream URL or secret is not configured. Holds the variable name.
    #[error("Missing configuration: {0}")]
    MissingConfig(&'static str),

    #[error("Failed to read request body: {0}")]
    RequestBodyError(String),

    #[error("Internal error: {0}")]
    InternalError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SiteApiError {
    /// An upstream failure answered with a 500.
    pub fn upstream(error: &str, message: Option<String>) -> Self {
        SiteApiError::Upstream {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            error: error.to_string(),
            message,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            SiteApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            SiteApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            SiteApiError::NotFound(_) => StatusCode::NOT_FOUND,
            SiteApiError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            SiteApiError::Upstream { status, .. } => *status,
            SiteApiError::MissingConfig(_)
            | SiteApiError::RequestBodyError(_)
            | SiteApiError::InternalError(_)
            | SiteApiError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Converts the error into the JSON body sent to the client.
    ///
    /// Internal details (missing variable names, I/O errors) are logged and
    /// never exposed.
    pub fn into_response(self) -> Response<HandlerBody> {
        let status = self.status();
        match &self {
            SiteApiError::MissingConfig(var) => {
                tracing::error!(variable = var, "Required configuration is not set");
                make_error_body_response(status, "Server configuration error", None)
            }
            SiteApiError::Upstream { error, message, .. } => {
                tracing::warn!(status = %status, error = %error, message = ?message, "Upstream failure");
                make_error_body_response(status, error, message.as_deref())
            }
            SiteApiError::RequestBodyError(_)
            | SiteApiError::InternalError(_)
            | SiteApiError::Io(_) => {
                tracing::error!(error = %self, "Request failed");
                make_error_body_response(status, "Internal server error", None)
            }
            SiteApiError::BadRequest(msg) | SiteApiError::NotFound(msg) => {
                make_error_body_response(status, msg, None)
            }
            SiteApiError::Unauthorized | SiteApiError::MethodNotAllowed => {
                make_error_body_response(status, &self.to_string(), None)
            }
        }
    }
}
