use serde::Deserialize;

pub const DEFAULT_LOCAL_PREFIX: &str = "/api/media";
pub const DEFAULT_PAGE_SIZE: u32 = 100;

/// Where rewritten media references live on this site.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct MediaConfig {
    /// Root-relative prefix for proxied media, e.g. `/api/media`
    #[serde(default = "default_local_prefix")]
    pub local_prefix: String,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            local_prefix: default_local_prefix(),
        }
    }
}

impl MediaConfig {
    /// The prefix without a trailing slash.
    pub fn normalized_prefix(&self) -> &str {
        self.local_prefix.trim_end_matches('/')
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct CmsConfig {
    /// Entries requested per page when reading a collection
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

impl Default for CmsConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
        }
    }
}

fn default_local_prefix() -> String {
    DEFAULT_LOCAL_PREFIX.to_string()
}

fn default_page_size() -> u32 {
    DEFAULT_PAGE_SIZE
}
