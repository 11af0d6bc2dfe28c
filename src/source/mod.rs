//! Filter list acquisition: remote download, on-disk cache, bundled fallback.
//!
//! Each configured list is resolved independently. A list that fails to
//! download falls back to its cached copy, then to its bundled copy; a list
//! with none of the three is reported as [`ListOrigin::Missing`] and simply
//! contributes no rules.

mod fetch;

pub use fetch::{FetchOutcome, Fetcher, HttpFetcher};

use parking_lot::Mutex;
use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::time::{Duration, SystemTime};

use crate::config::{FilterListConfig, SourceConfig};
use crate::error::Result;
use crate::metadata::RefreshLedger;

/// Ledger file name inside the cache directory.
const LEDGER_FILE: &str = "refresh.json";

/// Where a list's text came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ListOrigin {
    /// Fresh download
    Remote,
    /// Server answered 304; the cached copy is current
    Unchanged,
    /// Cached copy from an earlier download
    Cache,
    /// Copy shipped with the application
    Bundled,
    /// Nothing available
    Missing,
    /// Text handed directly to the engine
    Inline,
}

impl ListOrigin {
    /// True when the list is stale beyond what a cache would give.
    pub fn is_degraded(&self) -> bool {
        matches!(self, ListOrigin::Bundled | ListOrigin::Missing)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ListOrigin::Remote => "remote",
            ListOrigin::Unchanged => "unchanged",
            ListOrigin::Cache => "cache",
            ListOrigin::Bundled => "bundled",
            ListOrigin::Missing => "missing",
            ListOrigin::Inline => "inline",
        }
    }
}

/// Resolved text of one named list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterText {
    pub name: String,
    pub text: Option<String>,
    pub origin: ListOrigin,
}

impl FilterText {
    pub fn inline(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            text: Some(text.into()),
            origin: ListOrigin::Inline,
        }
    }
}

/// Retrieves filter lists and keeps the on-disk cache and refresh ledger.
pub struct FilterSource {
    config: SourceConfig,
    fetcher: Box<dyn Fetcher>,
    ledger: Mutex<RefreshLedger>,
}

impl FilterSource {
    /// Create a source that downloads over HTTP.
    pub fn new(config: SourceConfig) -> Self {
        let fetcher = HttpFetcher::new(config.timeout);
        Self::with_fetcher(config, fetcher)
    }

    /// Create a source with a custom fetcher.
    pub fn with_fetcher(config: SourceConfig, fetcher: impl Fetcher + 'static) -> Self {
        let ledger_path = config.cache_dir.join(LEDGER_FILE);
        let ledger = RefreshLedger::load(&ledger_path).unwrap_or_else(|e| {
            log::warn!("Ignoring unreadable refresh ledger {:?}: {}", ledger_path, e);
            RefreshLedger::default()
        });
        Self {
            config,
            fetcher: Box::new(fetcher),
            ledger: Mutex::new(ledger),
        }
    }

    pub fn config(&self) -> &SourceConfig {
        &self.config
    }

    /// Cache file for a list; the name is reduced to a safe file name.
    pub fn cache_path(&self, name: &str) -> PathBuf {
        let safe: String = name
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.config.cache_dir.join(format!("{}.txt", safe))
    }

    /// Resolve every list without touching the network.
    pub fn load_local(&self) -> Vec<FilterText> {
        self.config
            .lists
            .iter()
            .map(|list| self.load_list_local(list))
            .collect()
    }

    /// Download every list, falling back per list on failure.
    ///
    /// Only an unusable cache directory is an error.
    pub fn refresh(&self) -> Result<Vec<FilterText>> {
        fs::create_dir_all(&self.config.cache_dir)?;
        let texts = self
            .config
            .lists
            .iter()
            .map(|list| self.refresh_list(list))
            .collect();
        self.save_ledger();
        Ok(texts)
    }

    /// Cached or bundled copy of the remote domain list.
    pub fn load_remote_domains_local(&self) -> Option<FilterText> {
        self.config
            .remote_domains
            .as_ref()
            .map(|list| self.load_list_local(list))
    }

    /// Download the remote domain list. `Ok(None)` when none is configured.
    pub fn refresh_remote_domains(&self) -> Result<Option<FilterText>> {
        let Some(list) = self.config.remote_domains.as_ref() else {
            return Ok(None);
        };
        fs::create_dir_all(&self.config.cache_dir)?;
        let text = self.refresh_list(list);
        self.save_ledger();
        Ok(Some(text))
    }

    /// True if any list is older than the update interval.
    pub fn needs_update(&self) -> bool {
        let ledger = self.ledger.lock();
        self.config
            .lists
            .iter()
            .any(|list| ledger.needs_update(&list.name, self.config.update_interval))
    }

    pub fn remote_domains_need_update(&self) -> bool {
        match &self.config.remote_domains {
            Some(list) => self
                .ledger
                .lock()
                .needs_update(&list.name, self.config.remote_domains_interval),
            None => false,
        }
    }

    /// Time of the last successful refresh of a list.
    pub fn last_refreshed(&self, name: &str) -> Option<SystemTime> {
        self.ledger.lock().last_updated(name)
    }

    /// Time until the next list falls due; zero if one already is.
    pub fn time_until_update(&self) -> Option<Duration> {
        let ledger = self.ledger.lock();
        let now = SystemTime::now();
        self.config
            .lists
            .iter()
            .map(|list| match ledger.last_updated(&list.name) {
                Some(last) => {
                    let elapsed = now.duration_since(last).unwrap_or_default();
                    self.config.update_interval.saturating_sub(elapsed)
                }
                None => Duration::ZERO,
            })
            .min()
    }

    fn refresh_list(&self, list: &FilterListConfig) -> FilterText {
        let cache_path = self.cache_path(&list.name);
        let etag = if cache_path.exists() {
            self.ledger.lock().etag(&list.name).map(str::to_string)
        } else {
            None
        };

        match self.fetcher.fetch(&list.url, etag.as_deref()) {
            Ok(FetchOutcome::Fetched { body, etag }) => {
                // The ETag is only valid next to the body it was served with.
                let etag = match self.write_cache(&list.name, &body) {
                    Ok(()) => etag,
                    Err(e) => {
                        log::warn!("Failed to cache filter list {}: {}", list.name, e);
                        None
                    }
                };
                self.ledger.lock().record(&list.name, etag);
                log::info!("Refreshed filter list {} ({} bytes)", list.name, body.len());
                FilterText {
                    name: list.name.clone(),
                    text: Some(body),
                    origin: ListOrigin::Remote,
                }
            }
            Ok(FetchOutcome::NotModified) => match self.read_cache(&list.name) {
                Some(text) => {
                    self.ledger.lock().record(&list.name, etag);
                    log::debug!("Filter list {} unchanged", list.name);
                    FilterText {
                        name: list.name.clone(),
                        text: Some(text),
                        origin: ListOrigin::Unchanged,
                    }
                }
                None => {
                    // Cache vanished; the ETag is worthless without it.
                    self.ledger.lock().forget_etag(&list.name);
                    self.load_list_local(list)
                }
            },
            Err(e) => {
                log::warn!("Failed to download filter list {}: {}", list.name, e);
                self.load_list_local(list)
            }
        }
    }

    fn load_list_local(&self, list: &FilterListConfig) -> FilterText {
        let (text, origin) = match self.read_cache(&list.name) {
            Some(text) => (Some(text), ListOrigin::Cache),
            None => match self.read_bundled(list) {
                Some(text) => (Some(text), ListOrigin::Bundled),
                None => {
                    log::warn!("Filter list {} has no cached or bundled copy", list.name);
                    (None, ListOrigin::Missing)
                }
            },
        };
        FilterText {
            name: list.name.clone(),
            text,
            origin,
        }
    }

    fn read_cache(&self, name: &str) -> Option<String> {
        let path = self.cache_path(name);
        match fs::read_to_string(&path) {
            Ok(text) => Some(text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => {
                log::warn!("Failed to read cached list {:?}: {}", path, e);
                None
            }
        }
    }

    fn read_bundled(&self, list: &FilterListConfig) -> Option<String> {
        if let Some(text) = &list.bundled_text {
            return Some(text.clone());
        }
        let path = list.bundled_path.as_ref()?;
        match fs::read_to_string(path) {
            Ok(text) => Some(text),
            Err(e) => {
                log::warn!("Failed to read bundled list {:?}: {}", path, e);
                None
            }
        }
    }

    /// Write to a temp file, then rename, so readers never see a partial list.
    fn write_cache(&self, name: &str, body: &str) -> Result<()> {
        let path = self.cache_path(name);
        let temp_path = path.with_extension("txt.tmp");
        {
            let mut file = fs::File::create(&temp_path)?;
            file.write_all(body.as_bytes())?;
            file.sync_all()?;
        }
        fs::rename(&temp_path, &path)?;
        log::debug!("Cached filter list {} to {:?}", name, path);
        Ok(())
    }

    fn save_ledger(&self) {
        let path = self.config.cache_dir.join(LEDGER_FILE);
        if let Err(e) = self.ledger.lock().save(&path) {
            log::warn!("Failed to save refresh ledger {:?}: {}", path, e);
        }
    }
}
