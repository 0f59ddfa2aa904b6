use url::Url;

/// Hostnames whose URLs are served through the local media proxy.
///
/// Derived once from the content (CMS) base URL and the dedicated media base
/// URL. Either may be absent, in which case it simply contributes no host.
#[derive(Clone, Debug, Default)]
pub struct MediaHosts {
    hosts: Vec<String>,
}

impl MediaHosts {
    pub fn new(content_base: Option<&Url>, media_base: Option<&Url>) -> Self {
        let mut hosts: Vec<String> = Vec::with_capacity(2);
        for host in [content_base, media_base]
            .into_iter()
            .flatten()
            .filter_map(|url| url.host_str())
        {
            let host = host.to_ascii_lowercase();
            if !hosts.contains(&host) {
                hosts.push(host);
            }
        }

        Self { hosts }
    }

    pub fn contains(&self, host: &str) -> bool {
        self.hosts.iter().any(|h| h.eq_ignore_ascii_case(host))
    }

    /// Returns true if the URL points at one of the allowlisted hosts.
    pub fn is_media_url(&self, url: &Url) -> bool {
        url.host_str().is_some_and(|host| self.contains(host))
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.hosts.iter().map(String::as_str)
    }
}
