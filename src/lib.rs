//! Adgate - request classification for ad and tracker blocking.
//!
//! This crate decides, for each outgoing browser request, whether it should be
//! allowed, blocked, or redirected. Rules come from Adblock-Plus-style filter
//! lists that are compiled into an immutable, query-optimized database.
//!
//! # Features
//!
//! - **Domain blocking**: Bloom-filter pre-check backed by a reversed-label trie
//! - **Exceptions and allowlist**: `@@` rules plus a critical-domain allowlist
//!   (payments, captchas, sign-in) that always wins
//! - **Path, wildcard and regex rules** with `$third-party`, `$domain=` and
//!   resource-type options
//! - **CNAME uncloaking** of trackers aliased behind first-party subdomains
//! - **Keyword-gated heuristics** as a final catch-all
//! - **Hot reload**: rebuilt databases are published atomically; in-flight
//!   queries keep the old one
//! - **Remote lists**: ETag-aware downloads with cache and bundled fallback
//!
//! # Quick Start
//!
//! ```
//! use adgate::{ClassificationEngine, Decision, EngineConfig};
//!
//! let engine = ClassificationEngine::new(EngineConfig::default());
//! engine.load_rules("||doubleclick.net^\n@@||cdn.example.com^\n/ads/\n");
//!
//! let decision = engine.should_block(
//!     "https://ad.doubleclick.net/x.js",
//!     Some("https://news.example/"),
//!     false,
//! );
//! assert_eq!(decision, Decision::Block);
//! ```
//!
//! # Filter Lists
//!
//! For applications that download lists, configure a [`FilterSource`]:
//!
//! ```no_run
//! use adgate::{ClassificationEngine, EngineConfig, FilterListConfig, FilterSource, SourceConfig};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let source = FilterSource::new(
//!     SourceConfig::new("/var/cache/adgate")
//!         .with_list(FilterListConfig::new("easylist", "https://easylist.to/easylist/easylist.txt")),
//! );
//! let engine = Arc::new(ClassificationEngine::with_source(EngineConfig::default(), source));
//!
//! // Build from cached or bundled copies, then keep lists fresh in the background
//! engine.initialize()?;
//! let _scheduler = adgate::RefreshScheduler::spawn(engine.clone(), Duration::from_secs(900))?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Matching Order
//!
//! 1. Not initialized, too short, `data:`/`blob:` → allow
//! 2. Cached verdict
//! 3. Critical allowlist, then `@@` exceptions → allow
//! 4. First-party requests: only path rules and known first-party ad paths
//! 5. Domain rules, remote domain set, path rules, CNAME aliases → block
//! 6. Keyword gate; then wildcard/regex rules and heuristics
//!
//! A blocked main-frame navigation is turned into a redirect when the URL
//! carries a destination, otherwise [`MainFramePolicy`] decides.

mod builtin;
mod cache;
mod database;
mod decision;
mod engine;
mod error;
mod metadata;
mod pattern_store;
mod remote_domains;
mod request;
mod rule_type;
mod scheduler;

pub mod bloom;
pub mod compiler;
pub mod config;
pub mod heuristic;
pub mod rule;
pub mod source;
pub mod trie;

// Re-export core types
pub use decision::Decision;
pub use error::{Error, Result, RuleParseError};
pub use rule_type::RuleKind;

// Re-export engine
pub use engine::{ClassificationEngine, EngineStats, EngineStatus};
pub use scheduler::{RefreshScheduler, SchedulerHandle};

// Re-export configuration
pub use config::{EngineConfig, FilterListConfig, MainFramePolicy, SourceConfig};

// Re-export building blocks for advanced usage
pub use bloom::BloomFilter;
pub use cache::{CacheStats, MatchCache};
pub use compiler::RuleCompiler;
pub use database::{ListStatus, RuleCounts, RuleDatabase, RuleDatabaseBuilder};
pub use remote_domains::RemoteDomainSet;
pub use request::{extract_redirect_target, ClassificationRequest, RequestContext};
pub use trie::DomainTrie;

// Re-export list acquisition
pub use metadata::{ListMetadata, RefreshLedger};
pub use source::{FetchOutcome, Fetcher, FilterSource, FilterText, HttpFetcher, ListOrigin};
