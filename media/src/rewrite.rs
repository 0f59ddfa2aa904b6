//! Maps CMS media references onto local proxy paths.
//!
//! A reference is classified into one of three outcomes:
//!
//! ```text
//! https://cms.example.com/uploads/a.png?x=1  -> /api/media/uploads/a.png   (allowlisted host)
//! /uploads/a.png                             -> /api/media/uploads/a.png   (root-relative)
//! https://youtube.com/watch?v=1              -> unchanged                  (third party)
//! ```

use crate::hosts::MediaHosts;
use serde_json::Value;
use url::Url;

/// Result of trying to parse a reference as an absolute URL.
#[derive(Debug, PartialEq)]
pub enum ParsedReference<'a> {
    Absolute(Url),
    Relative(&'a str),
}

impl<'a> ParsedReference<'a> {
    pub fn parse(reference: &'a str) -> Self {
        match Url::parse(reference) {
            Ok(url) => ParsedReference::Absolute(url),
            Err(_) => ParsedReference::Relative(reference),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Rewriter {
    hosts: MediaHosts,
    local_prefix: String,
    content_base: Option<Url>,
}

impl Rewriter {
    pub fn new(hosts: MediaHosts, local_prefix: &str, content_base: Option<Url>) -> Self {
        Self {
            hosts,
            local_prefix: local_prefix.trim_end_matches('/').to_string(),
            content_base,
        }
    }

    pub fn local_prefix(&self) -> &str {
        &self.local_prefix
    }

    pub fn hosts(&self) -> &MediaHosts {
        &self.hosts
    }

    /// Rewrites a media reference to its local proxy path.
    ///
    /// Returns `None` for absent or empty input. Never fails: anything that is
    /// neither an allowlisted URL nor a root-relative path passes through.
    pub fn to_local_media_url(&self, reference: Option<&str>) -> Option<String> {
        let reference = reference.filter(|r| !r.is_empty())?;

        let rewritten = match ParsedReference::parse(reference) {
            ParsedReference::Absolute(url) if self.hosts.is_media_url(&url) => {
                format!("{}{}", self.local_prefix, url.path())
            }
            ParsedReference::Absolute(_) => reference.to_string(),
            // Any root-relative path is proxied, not only `/uploads/...`
            ParsedReference::Relative(path) if path.starts_with('/') => {
                format!("{}{}", self.local_prefix, path)
            }
            ParsedReference::Relative(other) => other.to_string(),
        };

        Some(rewritten)
    }

    /// Resolves a CMS-relative path against the content base URL.
    pub fn to_absolute_url(&self, path: Option<&str>) -> Option<String> {
        let path = path?;

        if let ParsedReference::Absolute(_) = ParsedReference::parse(path) {
            return Some(path.to_string());
        }

        match &self.content_base {
            Some(base) => Some(format!(
                "{}/{}",
                base.as_str().trim_end_matches('/'),
                path.trim_start_matches('/')
            )),
            None => {
                tracing::warn!(path, "No content base URL configured, leaving path relative");
                Some(path.to_string())
            }
        }
    }

    /// Rewrites every string field named `url` in a CMS payload, at any depth.
    pub fn rewrite_media_urls(&self, value: &mut Value) {
        match value {
            Value::Object(map) => {
                for (key, field) in map.iter_mut() {
                    match field {
                        Value::String(s) if key == "url" => {
                            if let Some(local) = self.to_local_media_url(Some(s.as_str())) {
                                *s = local;
                            }
                        }
                        other => self.rewrite_media_urls(other),
                    }
                }
            }
            Value::Array(items) => items.iter_mut().for_each(|v| self.rewrite_media_urls(v)),
            _ => {}
        }
    }
}
