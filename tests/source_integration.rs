//! Integration tests for filter list acquisition and engine refresh.

use adgate::{
    ClassificationEngine, Decision, EngineConfig, EngineStatus, Error, FetchOutcome, Fetcher,
    FilterListConfig, FilterSource, ListOrigin, Result, SourceConfig,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fs;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// In-memory fetcher whose responses can be changed between refreshes.
#[derive(Clone, Default)]
struct FakeFetcher {
    bodies: Arc<Mutex<HashMap<String, (String, String)>>>,
    requests: Arc<Mutex<Vec<(String, Option<String>)>>>,
}

impl FakeFetcher {
    fn serve(&self, url: &str, body: &str, etag: &str) {
        self.bodies
            .lock()
            .insert(url.to_string(), (body.to_string(), etag.to_string()));
    }

    fn go_offline(&self, url: &str) {
        self.bodies.lock().remove(url);
    }

    fn request_count(&self) -> usize {
        self.requests.lock().len()
    }

    fn last_etag(&self) -> Option<String> {
        self.requests.lock().last().and_then(|(_, etag)| etag.clone())
    }
}

impl Fetcher for FakeFetcher {
    fn fetch(&self, url: &str, etag: Option<&str>) -> Result<FetchOutcome> {
        self.requests
            .lock()
            .push((url.to_string(), etag.map(str::to_string)));
        match self.bodies.lock().get(url) {
            None => Err(Error::Download(format!("connection refused: {}", url))),
            Some((_, current)) if Some(current.as_str()) == etag => Ok(FetchOutcome::NotModified),
            Some((body, current)) => Ok(FetchOutcome::Fetched {
                body: body.clone(),
                etag: Some(current.clone()),
            }),
        }
    }
}

const LIST_A: &str = "https://lists.example/a.txt";
const LIST_B: &str = "https://lists.example/b.txt";
const HOSTS: &str = "https://lists.example/hosts";

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn source_config(dir: &TempDir) -> SourceConfig {
    SourceConfig::new(dir.path())
        .with_list(FilterListConfig::new("list-a", LIST_A))
        .with_list(
            FilterListConfig::new("list-b", LIST_B).with_bundled_text("||bundled-b.example^\n"),
        )
        .with_remote_domains(FilterListConfig::new("hosts", HOSTS))
}

fn engine(dir: &TempDir, fetcher: &FakeFetcher) -> ClassificationEngine {
    init_logger();
    let source = FilterSource::with_fetcher(source_config(dir), fetcher.clone());
    ClassificationEngine::with_source(EngineConfig::default(), source)
}

#[test]
fn test_refresh_builds_database() {
    let dir = TempDir::new().unwrap();
    let fetcher = FakeFetcher::default();
    fetcher.serve(LIST_A, "||list-a.example^\n", "a1");
    fetcher.serve(LIST_B, "||list-b.example^\n", "b1");
    let engine = engine(&dir, &fetcher);

    assert!(engine.refresh());
    assert_eq!(engine.status(), EngineStatus::Ready);
    assert_eq!(
        engine.should_block("https://x.list-a.example/p.js", None, false),
        Decision::Block
    );
    assert_eq!(
        engine.should_block("https://x.list-b.example/p.js", None, false),
        Decision::Block
    );
    assert!(dir.path().join("list-a.txt").exists());
    assert!(dir.path().join("refresh.json").exists());
}

#[test]
fn test_partial_failure_falls_back_per_list() {
    let dir = TempDir::new().unwrap();
    let fetcher = FakeFetcher::default();
    fetcher.serve(LIST_A, "||list-a.example^\n", "a1");
    let engine = engine(&dir, &fetcher);

    assert!(engine.refresh());
    let stats = engine.stats();
    assert_eq!(stats.lists[0].origin, ListOrigin::Remote);
    assert_eq!(stats.lists[1].origin, ListOrigin::Bundled);
    assert_eq!(stats.status, EngineStatus::Degraded);
    assert_eq!(
        engine.should_block("https://bundled-b.example/x.js", None, false),
        Decision::Block
    );

    // List A goes offline; its cached copy keeps its rules alive.
    fetcher.go_offline(LIST_A);
    fetcher.serve(LIST_B, "||list-b.example^\n", "b1");
    assert!(engine.refresh());
    let stats = engine.stats();
    assert_eq!(stats.lists[0].origin, ListOrigin::Cache);
    assert_eq!(stats.lists[1].origin, ListOrigin::Remote);
    assert_eq!(stats.status, EngineStatus::Ready);
    assert_eq!(
        engine.should_block("https://list-a.example/x.js", None, false),
        Decision::Block
    );
}

#[test]
fn test_etag_round_trip_skips_rebuild() {
    let dir = TempDir::new().unwrap();
    let fetcher = FakeFetcher::default();
    fetcher.serve(LIST_A, "||list-a.example^\n", "a1");
    fetcher.serve(LIST_B, "||list-b.example^\n", "b1");
    let engine = engine(&dir, &fetcher);

    assert!(engine.refresh());
    let generation = engine.generation();

    assert!(engine.refresh());
    assert_eq!(fetcher.last_etag().as_deref(), Some("b1"));
    assert_eq!(engine.generation(), generation);
}

#[test]
fn test_changed_content_invalidates_cached_verdicts() {
    let dir = TempDir::new().unwrap();
    let fetcher = FakeFetcher::default();
    fetcher.serve(LIST_A, "||widgets.example^\n", "a1");
    fetcher.serve(LIST_B, "! empty\n", "b1");
    let engine = engine(&dir, &fetcher);
    assert!(engine.refresh());

    let url = "https://widgets.example/embed.js";
    assert_eq!(engine.should_block(url, Some("https://blog.example/"), false), Decision::Block);

    fetcher.serve(LIST_A, "! widgets are fine now\n", "a2");
    assert!(engine.refresh());
    assert_eq!(engine.should_block(url, Some("https://blog.example/"), false), Decision::Allow);
}

#[test]
fn test_initialize_from_cache_after_restart() {
    let dir = TempDir::new().unwrap();
    let fetcher = FakeFetcher::default();
    fetcher.serve(LIST_A, "||list-a.example^\n", "a1");
    fetcher.serve(LIST_B, "||list-b.example^\n", "b1");
    fetcher.serve(HOSTS, "0.0.0.0 remote-host.example\n", "h1");
    {
        let engine = engine(&dir, &fetcher);
        assert!(engine.refresh());
        assert!(engine.refresh_remote_domains());
    }

    let offline = FakeFetcher::default();
    let engine = engine(&dir, &offline);
    engine.initialize().unwrap();
    assert_eq!(offline.request_count(), 0);
    assert_eq!(engine.status(), EngineStatus::Ready);
    assert_eq!(engine.stats().remote_domains, 1);
    assert_eq!(
        engine.should_block("https://list-a.example/x.js", None, false),
        Decision::Block
    );
    assert_eq!(
        engine.should_block("https://cdn.remote-host.example/x.js", None, false),
        Decision::Block
    );
    assert!(!engine.source().unwrap().needs_update());
}

#[test]
fn test_initialize_with_nothing_available() {
    let dir = TempDir::new().unwrap();
    let engine = engine(&dir, &FakeFetcher::default());
    engine.initialize().unwrap();

    assert!(engine.is_ready());
    assert_eq!(engine.status(), EngineStatus::Degraded);
    let stats = engine.stats();
    assert_eq!(stats.lists[0].origin, ListOrigin::Missing);
    assert_eq!(stats.lists[1].origin, ListOrigin::Bundled);
}

#[test]
fn test_refresh_if_needed_respects_intervals() {
    let dir = TempDir::new().unwrap();
    let fetcher = FakeFetcher::default();
    fetcher.serve(LIST_A, "||list-a.example^\n", "a1");
    fetcher.serve(LIST_B, "||list-b.example^\n", "b1");
    fetcher.serve(HOSTS, "remote-host.example\n", "h1");
    let engine = engine(&dir, &fetcher);

    assert!(engine.refresh_if_needed());
    let requests = fetcher.request_count();
    assert_eq!(requests, 3);

    assert!(!engine.refresh_if_needed());
    assert_eq!(fetcher.request_count(), requests);
}

#[test]
fn test_remote_domains_swap_keeps_rule_database() {
    let dir = TempDir::new().unwrap();
    let fetcher = FakeFetcher::default();
    fetcher.serve(LIST_A, "||list-a.example^\n", "a1");
    fetcher.serve(HOSTS, "0.0.0.0 first.example\n", "h1");
    let engine = engine(&dir, &fetcher);
    assert!(engine.refresh());
    let database = engine.database().unwrap();

    assert!(engine.refresh_remote_domains());
    assert!(Arc::ptr_eq(&database, &engine.database().unwrap()));
    assert_eq!(engine.should_block("https://first.example/x.js", None, false), Decision::Block);

    fetcher.serve(HOSTS, "0.0.0.0 second.example\n", "h2");
    assert!(engine.refresh_remote_domains());
    assert_eq!(engine.should_block("https://first.example/x.js", None, false), Decision::Allow);
    assert_eq!(engine.should_block("https://second.example/x.js", None, false), Decision::Block);
}

#[test]
fn test_unusable_cache_dir_keeps_database() {
    let dir = TempDir::new().unwrap();
    let blocker = dir.path().join("not-a-dir");
    fs::write(&blocker, "file in the way").unwrap();

    let fetcher = FakeFetcher::default();
    fetcher.serve(LIST_A, "||list-a.example^\n", "a1");
    let source = FilterSource::with_fetcher(
        SourceConfig::new(&blocker).with_list(FilterListConfig::new("list-a", LIST_A)),
        fetcher,
    );
    let engine = ClassificationEngine::with_source(EngineConfig::default(), source);
    engine.load_rules("||manual.example^\n");

    assert!(!engine.refresh());
    assert_eq!(engine.should_block("https://manual.example/x.js", None, false), Decision::Block);
}

#[test]
fn test_source_config_json_round() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("source.json");
    fs::write(
        &path,
        format!(
            r#"{{"cache_dir": {:?}, "lists": [{{"name": "a", "url": "{}"}}], "update_interval": 60}}"#,
            dir.path().join("cache"),
            LIST_A
        ),
    )
    .unwrap();

    let config = SourceConfig::from_json_file(&path).unwrap();
    assert_eq!(config.update_interval, Duration::from_secs(60));
    assert!(config.remote_domains.is_none());
}
