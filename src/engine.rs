//! Classification engine with hot reload support.
//!
//! The engine holds the last published rule database behind an atomic
//! pointer. Classification reads that pointer without locking; builds happen
//! off the read path and are published by a single swap, after which the
//! verdict cache is cleared.

use arc_swap::{ArcSwap, ArcSwapOption};
use parking_lot::Mutex;
use serde::Serialize;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::cache::{CacheStats, MatchCache};
use crate::compiler::RuleCompiler;
use crate::config::{EngineConfig, MainFramePolicy};
use crate::database::{ListStatus, RuleCounts, RuleDatabase};
use crate::decision::Decision;
use crate::error::{Error, Result};
use crate::heuristic;
use crate::remote_domains::RemoteDomainSet;
use crate::request::{
    extract_redirect_target, is_exempt_scheme, ClassificationRequest, RequestContext,
};
use crate::source::{FilterSource, FilterText, ListOrigin};

/// Coarse health of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineStatus {
    /// No database published yet; every request is allowed
    Uninitialized,
    Ready,
    /// Published, but at least one list is bundled-only or missing
    Degraded,
}

impl EngineStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EngineStatus::Uninitialized => "uninitialized",
            EngineStatus::Ready => "ready",
            EngineStatus::Degraded => "degraded",
        }
    }
}

/// Counters and build report for display or telemetry.
#[derive(Debug, Clone, Serialize)]
pub struct EngineStats {
    pub status: EngineStatus,
    pub rules: RuleCounts,
    pub remote_domains: usize,
    pub cache: CacheStats,
    pub blocked_total: u64,
    pub generation: u64,
    pub lists: Vec<ListStatus>,
}

/// What a request is evaluated against. Replaced wholesale on publish.
struct Snapshot {
    database: Arc<RuleDatabase>,
    remote: Arc<RemoteDomainSet>,
    generation: u64,
}

/// Decides whether a request is an ad or tracker.
///
/// One instance is owned by the host application and shared (typically in an
/// `Arc`) with every interception callback.
///
/// # Example
/// ```
/// use adgate::{ClassificationEngine, Decision, EngineConfig};
///
/// let engine = ClassificationEngine::new(EngineConfig::default());
/// assert_eq!(
///     engine.should_block("https://ad.doubleclick.net/x.js", Some("https://news.example/"), false),
///     Decision::Allow // not initialized yet
/// );
///
/// engine.load_rules("||doubleclick.net^\n");
/// assert_eq!(
///     engine.should_block("https://ad.doubleclick.net/x.js", Some("https://news.example/"), false),
///     Decision::Block
/// );
/// ```
pub struct ClassificationEngine {
    config: EngineConfig,
    compiler: RuleCompiler,
    source: Option<FilterSource>,
    current: ArcSwapOption<Snapshot>,
    /// Latest remote set, kept so a later database publish picks it up
    remote: ArcSwap<RemoteDomainSet>,
    cache: Option<MatchCache>,
    /// Serializes publishers; never taken on the read path
    publish_lock: Mutex<u64>,
    /// Held for the duration of a network refresh
    refresh_lock: Mutex<()>,
    blocked_total: AtomicU64,
}

impl ClassificationEngine {
    /// Engine without a filter source; rules are supplied via [`load_rules`](Self::load_rules).
    pub fn new(config: EngineConfig) -> Self {
        Self::build(config, None)
    }

    /// Engine that loads and refreshes its lists from `source`.
    pub fn with_source(config: EngineConfig, source: FilterSource) -> Self {
        Self::build(config, Some(source))
    }

    fn build(config: EngineConfig, source: Option<FilterSource>) -> Self {
        Self {
            compiler: RuleCompiler::new(&config),
            cache: MatchCache::new(config.cache_capacity),
            config,
            source,
            current: ArcSwapOption::empty(),
            remote: ArcSwap::from_pointee(RemoteDomainSet::new()),
            publish_lock: Mutex::new(0),
            refresh_lock: Mutex::new(()),
            blocked_total: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn source(&self) -> Option<&FilterSource> {
        self.source.as_ref()
    }

    /// Classify a request. Never fails; unknown or broken input is allowed.
    pub fn should_block(&self, url: &str, page_url: Option<&str>, is_main_frame: bool) -> Decision {
        let mut request = ClassificationRequest::new(url);
        request.page_url = page_url;
        request.is_main_frame = is_main_frame;
        self.classify(&request)
    }

    /// Classify a request described by a [`ClassificationRequest`].
    pub fn classify(&self, request: &ClassificationRequest<'_>) -> Decision {
        let Some(snapshot) = self.current.load_full() else {
            return Decision::Allow;
        };

        if request.url.len() < self.config.min_url_length || is_exempt_scheme(request.url) {
            return Decision::Allow;
        }

        let blocked = match panic::catch_unwind(AssertUnwindSafe(|| {
            self.evaluate_cached(&snapshot, request)
        })) {
            Ok(blocked) => blocked,
            Err(_) => {
                log::warn!("Classification panicked for {}; allowing", request.url);
                false
            }
        };
        if !blocked {
            return Decision::Allow;
        }

        let decision = self.apply_main_frame_policy(request);
        if decision.is_blocking() {
            self.blocked_total.fetch_add(1, Ordering::Relaxed);
        }
        decision
    }

    fn evaluate_cached(&self, snapshot: &Snapshot, request: &ClassificationRequest<'_>) -> bool {
        let Some(cache) = &self.cache else {
            return Self::evaluate(snapshot, request);
        };

        let key = MatchCache::key(request.url, request.page_url);
        if let Some(blocked) = cache.get(&key, snapshot.generation) {
            return blocked;
        }
        let blocked = Self::evaluate(snapshot, request);
        cache.insert(key, snapshot.generation, blocked);
        blocked
    }

    /// The rule pipeline. Order matters: allow stages run before block stages.
    fn evaluate(snapshot: &Snapshot, request: &ClassificationRequest<'_>) -> bool {
        let Some(ctx) = RequestContext::parse(request) else {
            return false;
        };
        let db = &snapshot.database;
        let host = ctx.host.as_str();

        if db.is_critical(host) || db.is_exception(host) {
            return false;
        }

        // Host rules never apply to a site's own resources.
        if ctx.first_party {
            return db.matches_path(&ctx) || db.matches_first_party_path(&ctx);
        }

        if db.is_domain_blocked(host) || db.matches_scoped_domain(&ctx) {
            return true;
        }

        if snapshot.remote.contains(host)
            || db.matches_path(&ctx)
            || db.matches_first_party_path(&ctx)
            || Self::is_cname_cloaked(snapshot, host)
        {
            return true;
        }

        if !heuristic::passes_keyword_gate(&ctx.url_lower) {
            return false;
        }

        db.matches_pattern(&ctx) || heuristic::is_likely_ad(host, &ctx.path_lower, &ctx.url_lower)
    }

    /// A first label known to alias a tracker that is itself blocked.
    fn is_cname_cloaked(snapshot: &Snapshot, host: &str) -> bool {
        snapshot.database.cname_targets(host).is_some_and(|targets| {
            targets.iter().any(|target| {
                snapshot.database.is_domain_blocked(target) || snapshot.remote.contains(target)
            })
        })
    }

    fn apply_main_frame_policy(&self, request: &ClassificationRequest<'_>) -> Decision {
        if !request.is_main_frame {
            return Decision::Block;
        }
        if let Some(target) = extract_redirect_target(request.url) {
            return Decision::Redirect(target);
        }
        match self.config.main_frame_policy {
            MainFramePolicy::Balanced => Decision::Allow,
            MainFramePolicy::Strict => Decision::Block,
        }
    }

    /// True once a database has been published.
    pub fn is_ready(&self) -> bool {
        self.current.load().is_some()
    }

    pub fn status(&self) -> EngineStatus {
        let current = self.current.load();
        match &*current {
            None => EngineStatus::Uninitialized,
            Some(snapshot) if snapshot.database.lists().iter().any(|l| l.origin.is_degraded()) => {
                EngineStatus::Degraded
            }
            Some(_) => EngineStatus::Ready,
        }
    }

    /// Generation of the published snapshot; 0 before the first publish.
    pub fn generation(&self) -> u64 {
        (*self.current.load()).as_ref().map_or(0, |s| s.generation)
    }

    /// The published database, for inspection.
    pub fn database(&self) -> Option<Arc<RuleDatabase>> {
        (*self.current.load()).as_ref().map(|s| s.database.clone())
    }

    pub fn stats(&self) -> EngineStats {
        let current = self.current.load_full();
        let (rules, lists, generation) = match &current {
            Some(s) => (s.database.counts(), s.database.lists().to_vec(), s.generation),
            None => (RuleCounts::default(), Vec::new(), 0),
        };
        EngineStats {
            status: self.status(),
            rules,
            remote_domains: self.remote.load().len(),
            cache: self.cache.as_ref().map(MatchCache::stats).unwrap_or_default(),
            blocked_total: self.blocked_total.load(Ordering::Relaxed),
            generation,
            lists,
        }
    }

    /// Compile `text` as a single list and publish it.
    pub fn load_rules(&self, text: &str) -> RuleCounts {
        let db = self.compiler.compile_text(text);
        let counts = db.counts();
        self.publish(db);
        counts
    }

    /// Compile several named lists and publish the result.
    pub fn load_lists(&self, lists: &[FilterText]) -> RuleCounts {
        let db = self.compiler.compile_lists(lists);
        let counts = db.counts();
        self.publish(db);
        counts
    }

    /// Replace the remote domain set. Returns the number of domains loaded.
    ///
    /// The rule database is left as is; only the snapshot is re-published.
    pub fn load_remote_domains(&self, text: &str) -> usize {
        let set = Arc::new(RemoteDomainSet::parse(text));
        let count = set.len();

        let mut generation = self.publish_lock.lock();
        self.remote.store(set.clone());
        if let Some(current) = self.current.load_full() {
            *generation += 1;
            self.current.store(Some(Arc::new(Snapshot {
                database: current.database.clone(),
                remote: set,
                generation: *generation,
            })));
            self.clear_cache();
        }
        drop(generation);

        log::info!("Loaded {} remote domains", count);
        count
    }

    fn publish(&self, database: RuleDatabase) {
        let mut generation = self.publish_lock.lock();
        *generation += 1;
        self.current.store(Some(Arc::new(Snapshot {
            database: Arc::new(database),
            remote: self.remote.load_full(),
            generation: *generation,
        })));
        self.clear_cache();
        log::info!("Published rule database generation {}", *generation);
    }

    fn clear_cache(&self) {
        if let Some(cache) = &self.cache {
            cache.clear();
        }
    }

    /// Build from cached or bundled lists without touching the network.
    pub fn initialize(&self) -> Result<()> {
        let source = self.source.as_ref().ok_or(Error::NoSource)?;

        let lists = source.load_local();
        let counts = self.load_lists(&lists);
        if counts.total() == 0 && lists.iter().all(|l| l.origin == ListOrigin::Missing) {
            log::error!("Initial build found no filter lists; run a refresh to download them");
        }

        if let Some(FilterText {
            text: Some(text), ..
        }) = source.load_remote_domains_local()
        {
            self.load_remote_domains(&text);
        }
        Ok(())
    }

    /// Download all lists and rebuild. Returns `false` if no source is
    /// configured, another refresh is running, or the cache directory is
    /// unusable; the published database is kept in those cases.
    pub fn refresh(&self) -> bool {
        let Some(source) = &self.source else {
            return false;
        };
        let Some(_guard) = self.refresh_lock.try_lock() else {
            log::debug!("Refresh already in progress");
            return false;
        };

        let lists = match source.refresh() {
            Ok(lists) => lists,
            Err(e) => {
                log::warn!("Filter refresh failed: {}", e);
                return false;
            }
        };

        if self.is_ready() && lists.iter().all(|l| l.origin == ListOrigin::Unchanged) {
            log::info!("Filter lists unchanged; keeping current database");
            return true;
        }

        self.load_lists(&lists);
        true
    }

    /// Download the remote domain list and swap it in.
    pub fn refresh_remote_domains(&self) -> bool {
        let Some(source) = &self.source else {
            return false;
        };
        match source.refresh_remote_domains() {
            Ok(Some(FilterText {
                text: Some(text), ..
            })) => {
                self.load_remote_domains(&text);
                true
            }
            Ok(_) => false,
            Err(e) => {
                log::warn!("Remote domain refresh failed: {}", e);
                false
            }
        }
    }

    /// Run whichever refreshes are due. Returns whether any ran successfully.
    pub fn refresh_if_needed(&self) -> bool {
        let Some(source) = &self.source else {
            return false;
        };
        let mut refreshed = false;
        if source.needs_update() || !self.is_ready() {
            refreshed |= self.refresh();
        }
        if source.remote_domains_need_update() {
            refreshed |= self.refresh_remote_domains();
        }
        refreshed
    }
}
