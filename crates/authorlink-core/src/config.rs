use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::models::MentionSource;

/// Root application configuration, loaded from `~/.config/authorlink/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Contact address sent in the user agent of every external call.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub polite_email: Option<String>,
    pub matching: MatchingConfig,
    pub email: EmailConfig,
    pub precedence: PrecedenceConfig,
    #[serde(deserialize_with = "platform_section")]
    pub platform: ServiceConfig,
    #[serde(deserialize_with = "registry_section")]
    pub registry: ServiceConfig,
    pub pipeline: PipelineConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    /// Largest normalized edit distance at which two full names still match.
    pub max_name_distance: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmailConfig {
    /// Minimum length-adjusted score for a pool email to be assigned.
    pub min_score: f64,
    /// Exponent applied to `len(surname) / len(local_part)`.
    pub length_ratio_weight: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PrecedenceConfig {
    pub identifier: Vec<MentionSource>,
    pub email: Vec<MentionSource>,
}

/// Connection settings for one external service. Fields missing from a
/// config section fall back to that service's own defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub base_url: String,
    /// Minimum gap between two requests, shared by every task.
    pub min_interval_ms: u64,
    pub max_retries: u32,
    pub backoff_base_ms: u64,
    pub timeout_secs: u64,
    /// Zero disables the on-disk response cache.
    pub cache_ttl_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Preprints with external calls in flight at once.
    pub max_in_flight: usize,
    /// Consecutive preprints whose required lookups all failed before the run aborts.
    pub max_consecutive_failures: usize,
    /// Query the registry by name for authors nobody else identified.
    pub name_lookup: bool,
    /// Skip every network lookup.
    pub offline: bool,
}

// ─── Defaults ──────────────────────────────────────────────

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            polite_email: None,
            matching: MatchingConfig::default(),
            email: EmailConfig::default(),
            precedence: PrecedenceConfig::default(),
            platform: ServiceConfig::platform(),
            registry: ServiceConfig::registry(),
            pipeline: PipelineConfig::default(),
        }
    }
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            max_name_distance: 0.2,
        }
    }
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            min_score: 0.5,
            length_ratio_weight: 1.0,
        }
    }
}

impl Default for PrecedenceConfig {
    fn default() -> Self {
        Self {
            identifier: vec![
                MentionSource::Platform,
                MentionSource::Xml,
                MentionSource::PdfText,
                MentionSource::NameLookup,
            ],
            email: vec![
                MentionSource::Xml,
                MentionSource::Registry,
                MentionSource::PdfText,
            ],
        }
    }
}

impl ServiceConfig {
    /// OSF API v2 contributor directory.
    pub fn platform() -> Self {
        Self {
            base_url: "https://api.osf.io/v2".to_string(),
            min_interval_ms: 200,
            max_retries: 3,
            backoff_base_ms: 500,
            timeout_secs: 30,
            cache_ttl_secs: 7 * 24 * 3600,
        }
    }

    /// ORCID public API v3.0; published limit is 24 requests per second.
    pub fn registry() -> Self {
        Self {
            base_url: "https://pub.orcid.org/v3.0".to_string(),
            min_interval_ms: 50,
            max_retries: 3,
            backoff_base_ms: 500,
            timeout_secs: 30,
            cache_ttl_secs: 7 * 24 * 3600,
        }
    }
}

/// A `[platform]` or `[registry]` section as written, before defaults.
#[derive(Deserialize)]
struct ServiceSection {
    base_url: Option<String>,
    min_interval_ms: Option<u64>,
    max_retries: Option<u32>,
    backoff_base_ms: Option<u64>,
    timeout_secs: Option<u64>,
    cache_ttl_secs: Option<u64>,
}

impl ServiceSection {
    fn over(self, base: ServiceConfig) -> ServiceConfig {
        ServiceConfig {
            base_url: self.base_url.unwrap_or(base.base_url),
            min_interval_ms: self.min_interval_ms.unwrap_or(base.min_interval_ms),
            max_retries: self.max_retries.unwrap_or(base.max_retries),
            backoff_base_ms: self.backoff_base_ms.unwrap_or(base.backoff_base_ms),
            timeout_secs: self.timeout_secs.unwrap_or(base.timeout_secs),
            cache_ttl_secs: self.cache_ttl_secs.unwrap_or(base.cache_ttl_secs),
        }
    }
}

fn platform_section<'de, D>(deserializer: D) -> std::result::Result<ServiceConfig, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(ServiceSection::deserialize(deserializer)?.over(ServiceConfig::platform()))
}

fn registry_section<'de, D>(deserializer: D) -> std::result::Result<ServiceConfig, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(ServiceSection::deserialize(deserializer)?.over(ServiceConfig::registry()))
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_in_flight: 4,
            max_consecutive_failures: 5,
            name_lookup: true,
            offline: false,
        }
    }
}

// ─── Load / Save ───────────────────────────────────────────

impl AppConfig {
    /// Standard config file path: `~/.config/authorlink/config.toml`
    pub fn config_path() -> PathBuf {
        // Allow override via env var
        if let Ok(path) = std::env::var("AUTHORLINK_CONFIG") {
            return PathBuf::from(path);
        }

        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("authorlink")
            .join("config.toml")
    }

    /// Load config from disk, falling back to defaults if file doesn't exist.
    pub fn load() -> Result<Self> {
        let path = Self::config_path();
        let mut config = Self::load_from(&path)?;
        if let Ok(email) = std::env::var("AUTHORLINK_POLITE_EMAIL")
            && !email.trim().is_empty()
        {
            config.polite_email = Some(email.trim().to_string());
        }
        Ok(config)
    }

    /// Load config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save config to the standard path.
    pub fn save(&self) -> Result<()> {
        let path = Self::config_path();
        self.save_to(&path)
    }

    /// Save config to a specific path.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let toml_str = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_str)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        unit_interval("matching.max_name_distance", self.matching.max_name_distance)?;
        unit_interval("email.min_score", self.email.min_score)?;
        if !self.email.length_ratio_weight.is_finite() || self.email.length_ratio_weight < 0.0 {
            return Err(CoreError::ConfigError(
                "email.length_ratio_weight must be a non-negative number".to_string(),
            ));
        }
        precedence_list("precedence.identifier", &self.precedence.identifier)?;
        precedence_list("precedence.email", &self.precedence.email)?;
        if self.pipeline.max_in_flight == 0 {
            return Err(CoreError::ConfigError(
                "pipeline.max_in_flight must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn user_agent(&self) -> String {
        let version = env!("CARGO_PKG_VERSION");
        match &self.polite_email {
            Some(email) => format!("authorlink/{version} (mailto:{email})"),
            None => format!("authorlink/{version}"),
        }
    }
}

fn unit_interval(name: &str, value: f64) -> Result<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(CoreError::ConfigError(format!(
            "{name} must be within [0, 1], got {value}"
        )))
    }
}

fn precedence_list(name: &str, list: &[MentionSource]) -> Result<()> {
    if list.is_empty() {
        return Err(CoreError::ConfigError(format!("{name} must not be empty")));
    }
    let mut seen = HashSet::new();
    for source in list {
        if !seen.insert(source) {
            return Err(CoreError::ConfigError(format!(
                "{name} lists {source} more than once"
            )));
        }
    }
    Ok(())
}
