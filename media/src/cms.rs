use crate::errors::MediaError;
use serde::Deserialize;
use serde_json::Value;
use tokio::task::JoinSet;
use url::Url;

/// Upper bound on pages read for a single collection.
const MAX_PAGES: u32 = 50;

#[derive(Deserialize)]
struct CollectionPage {
    #[serde(default)]
    data: Vec<Value>,
    #[serde(default)]
    meta: PageMeta,
}

#[derive(Deserialize, Default)]
struct PageMeta {
    pagination: Option<Pagination>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Pagination {
    page_count: u32,
}

/// Reads whole collections from the headless CMS REST API.
#[derive(Clone)]
pub struct CmsClient {
    client: reqwest::Client,
    base_url: Url,
    token: Option<String>,
    page_size: u32,
}

impl CmsClient {
    pub fn new(
        client: reqwest::Client,
        base_url: Url,
        token: Option<String>,
        page_size: u32,
    ) -> Self {
        Self {
            client,
            base_url,
            token,
            page_size,
        }
    }

    fn collection_url(&self, collection: &str) -> String {
        format!(
            "{}/api/{}",
            self.base_url.as_str().trim_end_matches('/'),
            collection
        )
    }

    /// Returns every entry of the collection in page order.
    ///
    /// The first page is read to learn the page count, the remaining pages are
    /// requested concurrently. Any failure yields an empty list rather than
    /// partial data.
    pub async fn fetch_collection(&self, collection: &str) -> Vec<Value> {
        match self.try_fetch_collection(collection).await {
            Ok(entries) => entries,
            Err(e) => {
                tracing::error!(collection, error = %e, "Failed to read CMS collection");
                Vec::new()
            }
        }
    }

    async fn try_fetch_collection(&self, collection: &str) -> Result<Vec<Value>, MediaError> {
        let url = self.collection_url(collection);
        let first = fetch_page(
            self.client.clone(),
            url.clone(),
            self.token.clone(),
            1,
            self.page_size,
        )
        .await?;

        let mut page_count = first
            .meta
            .pagination
            .as_ref()
            .map_or(1, |p| p.page_count.max(1));
        if page_count > MAX_PAGES {
            tracing::warn!(collection, page_count, "Collection truncated to {MAX_PAGES} pages");
            page_count = MAX_PAGES;
        }

        let mut join_set = JoinSet::new();
        for page in 2..=page_count {
            let client = self.client.clone();
            let url = url.clone();
            let token = self.token.clone();
            let page_size = self.page_size;
            join_set.spawn(async move {
                fetch_page(client, url, token, page, page_size)
                    .await
                    .map(|p| (page, p.data))
            });
        }

        let mut pages = vec![(1, first.data)];
        while let Some(joined) = join_set.join_next().await {
            pages.push(joined??);
        }
        pages.sort_by_key(|(page, _)| *page);

        Ok(pages.into_iter().flat_map(|(_, data)| data).collect())
    }
}

async fn fetch_page(
    client: reqwest::Client,
    url: String,
    token: Option<String>,
    page: u32,
    page_size: u32,
) -> Result<CollectionPage, MediaError> {
    let mut request = client.get(&url).query(&[
        ("pagination[page]", page),
        ("pagination[pageSize]", page_size),
    ]);
    if let Some(token) = token {
        request = request.bearer_auth(token);
    }

    let response = request.send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(MediaError::UpstreamStatus(status));
    }

    let bytes = response.bytes().await?;
    Ok(serde_json::from_slice(&bytes)?)
}
