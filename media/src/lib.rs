//! Media URL normalization and the media/CMS upstream clients.

pub mod cms;
pub mod config;
pub mod errors;
pub mod fetcher;
pub mod hosts;
pub mod rewrite;

pub use cms::CmsClient;
pub use errors::MediaError;
pub use fetcher::{MediaAsset, MediaFetcher};
pub use hosts::MediaHosts;
pub use rewrite::Rewriter;
