use http::StatusCode;

#[derive(thiserror::Error, Debug)]
pub enum MediaError {
    #[error("invalid media path: {0}")]
    InvalidPath(String),
    #[error("invalid upstream URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("upstream responded with status {0}")]
    UpstreamStatus(StatusCode),
    #[error("upstream request failed: {0}")]
    ReqwestError(#[from] reqwest::Error),
    #[error("upstream response could not be decoded: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("page fetch task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}
