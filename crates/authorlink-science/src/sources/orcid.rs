use async_trait::async_trait;
use authorlink_core::ServiceConfig;
use serde_json::Value;
use tracing::debug;

use crate::error::{Result, ScienceError};
use crate::http::{DiskCache, RateLimitedClient};
use crate::identifiers::orcid::Orcid;
use crate::sources::{RegistryPerson, ResearcherRegistry};

/// Candidates requested per name search. Anything above one is ambiguous
/// anyway, so a small page is enough to tell.
const SEARCH_ROWS: u32 = 5;

/// ORCID public API v3.0.
pub struct OrcidRegistry {
    client: RateLimitedClient,
    cache: Option<DiskCache>,
    base_url: String,
}

impl OrcidRegistry {
    pub fn new(config: &ServiceConfig, user_agent: &str) -> Result<Self> {
        Ok(Self {
            client: RateLimitedClient::new("orcid", config, user_agent)?,
            cache: DiskCache::for_service("orcid", config),
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub async fn fetch_person(&self, orcid: &Orcid) -> Result<RegistryPerson> {
        let key = format!("person:{}", orcid.normalized);
        if let Some(cache) = &self.cache
            && let Some(cached) = cache.get::<RegistryPerson>(&key).await
        {
            return Ok(cached);
        }

        let url = format!("{}/{}/person", self.base_url, orcid.normalized);
        let val: Value = self.client.get_json(&url).await?;
        let person = parse_person(&orcid.normalized, &val);

        if let Some(cache) = &self.cache {
            cache.set(&key, &person).await;
        }
        Ok(person)
    }

    pub async fn search(&self, family_name: &str, given_name: &str) -> Result<Vec<String>> {
        let query = name_query(family_name, given_name).ok_or_else(|| {
            ScienceError::Parse("name search needs a family name".to_string())
        })?;
        let key = format!("search:{query}");
        if let Some(cache) = &self.cache
            && let Some(cached) = cache.get::<Vec<String>>(&key).await
        {
            return Ok(cached);
        }

        let url = format!(
            "{}/expanded-search/?q={}&rows={SEARCH_ROWS}",
            self.base_url,
            urlencoding::encode(&query)
        );
        let val: Value = self.client.get_json(&url).await?;
        let candidates = parse_search(&val);
        debug!(query = %query, candidates = candidates.len(), "ORCID name search");

        if let Some(cache) = &self.cache {
            cache.set(&key, &candidates).await;
        }
        Ok(candidates)
    }
}

#[async_trait]
impl ResearcherRegistry for OrcidRegistry {
    fn name(&self) -> &str {
        "orcid"
    }

    async fn person(&self, identifier: &str) -> Result<RegistryPerson> {
        let orcid = Orcid::parse(identifier)?;
        self.fetch_person(&orcid).await
    }

    async fn search_by_name(&self, family_name: &str, given_name: &str) -> Result<Vec<String>> {
        self.search(family_name, given_name).await
    }
}

fn name_query(family_name: &str, given_name: &str) -> Option<String> {
    let family = family_name.trim();
    if family.is_empty() {
        return None;
    }
    let given = given_name.trim();
    let mut query = format!("family-name:{}", quote(family));
    if !given.is_empty() {
        query.push_str(&format!(" AND given-names:{}", quote(given)));
    }
    Some(query)
}

fn quote(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

fn parse_person(identifier: &str, val: &Value) -> RegistryPerson {
    let name = &val["name"];
    let given_name = name["given-names"]["value"]
        .as_str()
        .unwrap_or_default()
        .trim()
        .to_string();
    let family_name = name["family-name"]["value"]
        .as_str()
        .unwrap_or_default()
        .trim()
        .to_string();

    let emails = val["emails"]["email"].as_array();
    let email = emails
        .and_then(|list| {
            list.iter()
                .find(|e| e["primary"].as_bool() == Some(true))
                .or_else(|| list.first())
        })
        .and_then(|e| e["email"].as_str())
        .map(str::trim)
        .filter(|e| !e.is_empty())
        .map(ToOwned::to_owned);

    RegistryPerson {
        identifier: identifier.to_string(),
        given_name,
        family_name,
        email,
    }
}

/// Distinct, checksum-valid identifiers in response order.
fn parse_search(val: &Value) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    let results = val["expanded-result"].as_array();
    for item in results.into_iter().flatten() {
        let Some(orcid) = item["orcid-id"].as_str().and_then(|id| Orcid::parse(id).ok()) else {
            continue;
        };
        if !out.contains(&orcid.normalized) {
            out.push(orcid.normalized);
        }
    }
    out
}
