use async_trait::async_trait;
use authorlink_core::ServiceConfig;
use serde_json::Value;
use tracing::debug;

use crate::error::{Result, ScienceError};
use crate::http::{DiskCache, RateLimitedClient};
use crate::identifiers::normalize_identifier;
use crate::sources::{ContributorDirectory, ContributorProfile};

/// Guards against a `links.next` chain that never ends.
const MAX_PAGES: usize = 50;

/// OSF API v2 contributor directory.
pub struct OsfDirectory {
    client: RateLimitedClient,
    cache: Option<DiskCache>,
    base_url: String,
}

impl OsfDirectory {
    pub fn new(config: &ServiceConfig, user_agent: &str) -> Result<Self> {
        Ok(Self {
            client: RateLimitedClient::new("osf", config, user_agent)?,
            cache: DiskCache::for_service("osf", config),
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub async fn fetch_user(&self, contributor_id: &str) -> Result<ContributorProfile> {
        let key = format!("user:{contributor_id}");
        if let Some(cache) = &self.cache
            && let Some(cached) = cache.get::<ContributorProfile>(&key).await
        {
            return Ok(cached);
        }

        let url = format!(
            "{}/users/{}/",
            self.base_url,
            urlencoding::encode(contributor_id)
        );
        let val: Value = self.client.get_json(&url).await?;
        let profile = parse_user(contributor_id, &val["data"])?;

        if let Some(cache) = &self.cache {
            cache.set(&key, &profile).await;
        }
        Ok(profile)
    }

    pub async fn fetch_contributor_ids(&self, preprint_id: &str) -> Result<Vec<String>> {
        let mut url = Some(format!(
            "{}/preprints/{}/contributors/?page%5Bsize%5D=100",
            self.base_url,
            urlencoding::encode(preprint_id)
        ));
        let mut ids = Vec::new();
        let mut pages = 0usize;

        while let Some(page_url) = url.take() {
            pages += 1;
            if pages > MAX_PAGES {
                return Err(ScienceError::ApiError(
                    "osf".to_string(),
                    format!("contributor list of {preprint_id} exceeds {MAX_PAGES} pages"),
                ));
            }
            let val: Value = self.client.get_json(&page_url).await?;
            ids.extend(parse_contributor_page(&val));
            url = val["links"]["next"].as_str().map(ToOwned::to_owned);
        }

        debug!(preprint_id, count = ids.len(), "fetched OSF contributors");
        Ok(ids)
    }
}

#[async_trait]
impl ContributorDirectory for OsfDirectory {
    fn name(&self) -> &str {
        "osf"
    }

    async fn contributors(&self, preprint_id: &str) -> Result<Vec<String>> {
        self.fetch_contributor_ids(preprint_id).await
    }

    async fn contributor(&self, contributor_id: &str) -> Result<ContributorProfile> {
        self.fetch_user(contributor_id).await
    }
}

/// User ids of bibliographic contributors on one page of a contributor listing.
fn parse_contributor_page(val: &Value) -> Vec<String> {
    val["data"]
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter(|item| item["attributes"]["bibliographic"].as_bool().unwrap_or(true))
                .filter_map(|item| {
                    item["relationships"]["users"]["data"]["id"]
                        .as_str()
                        .or_else(|| item["embeds"]["users"]["data"]["id"].as_str())
                })
                .map(ToOwned::to_owned)
                .collect()
        })
        .unwrap_or_default()
}

fn parse_user(contributor_id: &str, data: &Value) -> Result<ContributorProfile> {
    let attributes = &data["attributes"];
    let full_name = attributes["full_name"]
        .as_str()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .ok_or_else(|| {
            ScienceError::Parse(format!("OSF user {contributor_id} has no full_name"))
        })?
        .to_string();
    let identifier = normalize_identifier(attributes["social"]["orcid"].as_str());

    Ok(ContributorProfile {
        contributor_id: contributor_id.to_string(),
        full_name,
        identifier,
    })
}
