use crate::errors::MediaError;
use bytes::Bytes;
use http::header::{ACCEPT, CACHE_CONTROL, CONTENT_DISPOSITION, CONTENT_TYPE, HeaderMap, HeaderValue};
use http::Version;
use percent_encoding::percent_decode_str;
use url::Url;

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";
// Published media is content-addressed and never changes in place.
const IMMUTABLE_CACHE_CONTROL: &str = "public, max-age=31536000, immutable";

#[derive(Clone, Debug, PartialEq)]
pub enum Disposition {
    Inline,
    Attachment { filename: String },
}

impl Disposition {
    fn for_asset(content_type: &str, remainder: &str) -> Self {
        if content_type.to_ascii_lowercase().contains("pdf") {
            Disposition::Inline
        } else {
            let last = remainder.rsplit('/').next().unwrap_or(remainder);
            let filename = percent_decode_str(last)
                .decode_utf8_lossy()
                .replace('"', "");
            Disposition::Attachment { filename }
        }
    }

    fn header_value(&self) -> HeaderValue {
        match self {
            Disposition::Inline => HeaderValue::from_static("inline"),
            Disposition::Attachment { filename } => {
                HeaderValue::from_str(&format!("attachment; filename=\"{filename}\""))
                    .unwrap_or_else(|_| HeaderValue::from_static("attachment"))
            }
        }
    }
}

/// A media asset read in full from the upstream media host.
#[derive(Debug)]
pub struct MediaAsset {
    pub content_type: String,
    pub disposition: Disposition,
    pub version: Version,
    pub body: Bytes,
}

impl MediaAsset {
    /// Headers for the response sent back to the client.
    pub fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        let content_type = HeaderValue::from_str(&self.content_type)
            .unwrap_or_else(|_| HeaderValue::from_static(DEFAULT_CONTENT_TYPE));
        headers.insert(CONTENT_TYPE, content_type);
        headers.insert(CONTENT_DISPOSITION, self.disposition.header_value());
        headers.insert(
            CACHE_CONTROL,
            HeaderValue::from_static(IMMUTABLE_CACHE_CONTROL),
        );
        headers
    }
}

/// `.` or `..`, also when percent-encoded (`%2e%2e`, `.%2E`).
fn is_dot_segment(segment: &str) -> bool {
    let decoded = percent_decode_str(segment).decode_utf8_lossy();
    decoded == "." || decoded == ".."
}

/// Resolves local media paths back to the media host and fetches them.
#[derive(Clone)]
pub struct MediaFetcher {
    client: reqwest::Client,
    media_base: Url,
}

impl MediaFetcher {
    pub fn new(client: reqwest::Client, media_base: Url) -> Self {
        Self { client, media_base }
    }

    /// Upstream URL for the path remainder after the local prefix.
    pub fn upstream_url(&self, remainder: &str) -> Result<Url, MediaError> {
        let segments: Vec<&str> = remainder.split('/').filter(|s| !s.is_empty()).collect();

        if segments.is_empty() {
            return Err(MediaError::InvalidPath("empty media path".into()));
        }
        if segments.iter().any(|s| is_dot_segment(s)) {
            return Err(MediaError::InvalidPath(remainder.to_string()));
        }

        let url = format!(
            "{}/{}",
            self.media_base.as_str().trim_end_matches('/'),
            segments.join("/")
        );
        let url = Url::parse(&url)?;
        if !url
            .path()
            .starts_with(self.media_base.path().trim_end_matches('/'))
        {
            return Err(MediaError::InvalidPath(remainder.to_string()));
        }
        Ok(url)
    }

    /// Fetches the asset once. A non-2xx upstream status is returned as
    /// `MediaError::UpstreamStatus` so the caller can mirror it.
    pub async fn fetch(&self, remainder: &str) -> Result<MediaAsset, MediaError> {
        let url = self.upstream_url(remainder)?;
        tracing::debug!(url = %url, "Fetching media");

        let response = self
            .client
            .get(url)
            .header(ACCEPT, "*/*")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(MediaError::UpstreamStatus(status));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or(DEFAULT_CONTENT_TYPE)
            .to_string();
        let version = response.version();
        let body = response.bytes().await?;

        Ok(MediaAsset {
            disposition: Disposition::for_asset(&content_type, remainder),
            content_type,
            version,
            body,
        })
    }
}
