//! Engine and filter source configuration.

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};

/// Default MatchCache capacity (number of entries).
pub const DEFAULT_CACHE_CAPACITY: usize = 10_000;

/// Default cap on wildcard + regex rules.
pub const DEFAULT_MAX_PATTERN_RULES: usize = 25_000;

/// Filter lists are re-downloaded after this long (3 days).
pub const DEFAULT_UPDATE_INTERVAL: Duration = Duration::from_secs(3 * 24 * 60 * 60);

/// The remote domain list is re-downloaded after this long (12 hours).
pub const DEFAULT_REMOTE_DOMAINS_INTERVAL: Duration = Duration::from_secs(12 * 60 * 60);

/// Network timeout for a single list download.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// What to do with a blocked top-level navigation that carries no redirect target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MainFramePolicy {
    /// Allow the navigation so the user never lands on a blank page
    #[default]
    Balanced,
    /// Block it; the caller renders a placeholder page
    Strict,
}

/// Configuration for a [`ClassificationEngine`](crate::ClassificationEngine).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum number of memoized verdicts; 0 disables the cache
    pub cache_capacity: usize,
    /// URLs shorter than this are allowed without inspection
    pub min_url_length: usize,
    pub main_frame_policy: MainFramePolicy,
    /// Cap on wildcard + regex rules; the excess is dropped and counted
    pub max_pattern_rules: usize,
    pub bloom_false_positive_rate: f64,
    /// Added to the built-in critical allowlist
    pub extra_critical_domains: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            min_url_length: 12,
            main_frame_policy: MainFramePolicy::Balanced,
            max_pattern_rules: DEFAULT_MAX_PATTERN_RULES,
            bloom_false_positive_rate: 0.001,
            extra_critical_domains: Vec::new(),
        }
    }
}

impl EngineConfig {
    /// Load from a JSON file; missing fields take their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_cache_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = capacity;
        self
    }

    pub fn with_main_frame_policy(mut self, policy: MainFramePolicy) -> Self {
        self.main_frame_policy = policy;
        self
    }

    pub fn with_max_pattern_rules(mut self, max: usize) -> Self {
        self.max_pattern_rules = max;
        self
    }

    pub fn with_critical_domain(mut self, domain: impl Into<String>) -> Self {
        self.extra_critical_domains.push(domain.into());
        self
    }

    fn validate(&self) -> Result<()> {
        let p = self.bloom_false_positive_rate;
        if !(p > 0.0 && p < 1.0) {
            return Err(Error::Config(format!(
                "bloom_false_positive_rate must be in (0, 1), got {}",
                p
            )));
        }
        Ok(())
    }
}

/// One named filter list.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FilterListConfig {
    /// Stable name; also names the cache file
    pub name: String,
    pub url: String,
    /// Copy shipped with the application, used when nothing else is available
    #[serde(default)]
    pub bundled_path: Option<PathBuf>,
    /// Inline bundled copy; takes precedence over `bundled_path`
    #[serde(default)]
    pub bundled_text: Option<String>,
}

impl FilterListConfig {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            bundled_path: None,
            bundled_text: None,
        }
    }

    pub fn with_bundled_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.bundled_path = Some(path.into());
        self
    }

    pub fn with_bundled_text(mut self, text: impl Into<String>) -> Self {
        self.bundled_text = Some(text.into());
        self
    }
}

/// Configuration for a [`FilterSource`](crate::FilterSource).
#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    /// Application-private directory holding one cache file per list
    pub cache_dir: PathBuf,
    #[serde(default)]
    pub lists: Vec<FilterListConfig>,
    /// Hosts-file style supplement refreshed on its own interval
    #[serde(default)]
    pub remote_domains: Option<FilterListConfig>,
    #[serde(default = "default_update_interval", with = "duration_secs")]
    pub update_interval: Duration,
    #[serde(default = "default_remote_domains_interval", with = "duration_secs")]
    pub remote_domains_interval: Duration,
    #[serde(default = "default_timeout", with = "duration_secs")]
    pub timeout: Duration,
}

fn default_update_interval() -> Duration {
    DEFAULT_UPDATE_INTERVAL
}

fn default_remote_domains_interval() -> Duration {
    DEFAULT_REMOTE_DOMAINS_INTERVAL
}

fn default_timeout() -> Duration {
    DEFAULT_TIMEOUT
}

mod duration_secs {
    use serde::{Deserialize, Deserializer};
    use std::time::Duration;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

impl SourceConfig {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            lists: Vec::new(),
            remote_domains: None,
            update_interval: DEFAULT_UPDATE_INTERVAL,
            remote_domains_interval: DEFAULT_REMOTE_DOMAINS_INTERVAL,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Load from a JSON file. Intervals and timeout are given in seconds.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_list(mut self, list: FilterListConfig) -> Self {
        self.lists.push(list);
        self
    }

    pub fn with_remote_domains(mut self, list: FilterListConfig) -> Self {
        self.remote_domains = Some(list);
        self
    }

    pub fn with_update_interval(mut self, interval: Duration) -> Self {
        self.update_interval = interval;
        self
    }

    pub fn with_remote_domains_interval(mut self, interval: Duration) -> Self {
        self.remote_domains_interval = interval;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn validate(&self) -> Result<()> {
        let mut seen = std::collections::HashSet::new();
        for list in self.lists.iter().chain(self.remote_domains.iter()) {
            if list.name.trim().is_empty() {
                return Err(Error::Config("filter list name is empty".to_string()));
            }
            if !seen.insert(list.name.as_str()) {
                return Err(Error::Config(format!("duplicate filter list name: {}", list.name)));
            }
        }
        Ok(())
    }
}
