//! Pipeline tests: bootstrap, collection, and dispatch against in-memory
//! mocks. No network, no database files.

use std::sync::Arc;

use github_client::PullRequest;
use vulnwatch_common::{Config, Severity};
use vulnwatch_engine::bootstrap::seed_catalog;
use vulnwatch_engine::collector::UpdateCollector;
use vulnwatch_engine::dispatcher::Dispatcher;
use vulnwatch_engine::refcache::ReferenceCache;
use vulnwatch_engine::sources::VulnSource;
use vulnwatch_engine::testing::{
    make_record, test_config, MemoryStore, MockPrLister, MockSource, RecordingPusher,
};

fn as_sources(mocks: &[Arc<MockSource>]) -> Vec<Arc<dyn VulnSource>> {
    mocks.iter().map(|m| m.clone() as Arc<dyn VulnSource>).collect()
}

struct Harness {
    store: Arc<MemoryStore>,
    pusher: Arc<RecordingPusher>,
    lister: Arc<MockPrLister>,
    dispatcher: Dispatcher,
}

impl Harness {
    fn new(sources: &[Arc<MockSource>], lister: MockPrLister, config: &Config) -> Self {
        let store = Arc::new(MemoryStore::new());
        let pusher = Arc::new(RecordingPusher::new());
        let lister = Arc::new(lister);
        let dispatcher = Dispatcher::new(
            store.clone(),
            &as_sources(sources),
            pusher.clone(),
            pusher.clone(),
            lister.clone(),
            config,
        );
        Self {
            store,
            pusher,
            lister,
            dispatcher,
        }
    }
}

// ---------------------------------------------------------------------------
// Bootstrap
// ---------------------------------------------------------------------------

#[tokio::test]
async fn bootstrap_seeds_catalog_without_pushing() {
    let s1 = Arc::new(MockSource::new("one").with_pages(vec![vec![
        make_record("one-1", Severity::High, &["web"]),
        make_record("one-2", Severity::Low, &[]),
    ]]));
    let s2 = Arc::new(
        MockSource::new("two").with_pages(vec![vec![make_record("two-1", Severity::Critical, &[])]]),
    );
    let store = Arc::new(MemoryStore::new());

    seed_catalog(&as_sources(&[s1, s2]), store.clone())
        .await
        .unwrap();

    assert_eq!(store.len(), 3);
    for key in ["one-1", "one-2", "two-1"] {
        assert!(!store.stored(key).unwrap().pushed, "{key} must not be pushed");
    }
}

#[tokio::test]
async fn bootstrap_is_idempotent_per_key() {
    let source = Arc::new(
        MockSource::new("one").with_pages(vec![vec![make_record("k", Severity::Low, &[])]]),
    );
    let store = Arc::new(MemoryStore::new());

    seed_catalog(&as_sources(&[source.clone()]), store.clone())
        .await
        .unwrap();
    seed_catalog(&as_sources(&[source]), store.clone())
        .await
        .unwrap();

    assert_eq!(store.len(), 1);
}

#[tokio::test]
async fn bootstrap_clamps_to_three_pages() {
    let pages: Vec<Vec<_>> = (1..=5)
        .map(|p| vec![make_record(&format!("k{p}"), Severity::Low, &[])])
        .collect();
    let source = Arc::new(MockSource::new("one").with_pages(pages).reporting_pages(5));
    let store = Arc::new(MemoryStore::new());

    seed_catalog(&as_sources(&[source.clone()]), store.clone())
        .await
        .unwrap();

    let mut fetched = source.fetched_pages();
    fetched.sort_unstable();
    assert_eq!(fetched, vec![1, 2, 3]);
    assert_eq!(store.len(), 3);
}

#[tokio::test]
async fn bootstrap_fails_on_zero_pages() {
    let empty = Arc::new(MockSource::new("empty"));
    let store = Arc::new(MemoryStore::new());

    let err = seed_catalog(&as_sources(&[empty]), store).await.unwrap_err();
    assert!(err.to_string().contains("zero pages"), "got: {err:#}");
}

#[tokio::test]
async fn bootstrap_fails_on_fetch_error() {
    let broken = Arc::new(MockSource::new("broken").failing_page_count());
    let store = Arc::new(MemoryStore::new());

    assert!(seed_catalog(&as_sources(&[broken]), store).await.is_err());
}

// ---------------------------------------------------------------------------
// Collection
// ---------------------------------------------------------------------------

#[tokio::test]
async fn collector_early_stops_on_unchanged_page() {
    let store = Arc::new(MemoryStore::new());

    // Page 2's record is already cataloged unchanged; page 3 would be new
    // but must never be reached.
    let known = make_record("old", Severity::Medium, &["web"]);
    let source = Arc::new(
        MockSource::new("one")
            .with_pages(vec![
                vec![make_record("fresh", Severity::High, &[])],
                vec![known.clone()],
                vec![make_record("unreached", Severity::Critical, &[])],
            ])
            .reporting_pages(5),
    );

    let seeder = UpdateCollector::new(
        vec![Arc::new(
            MockSource::new("seed").with_pages(vec![vec![known]]),
        )],
        store.clone(),
    );
    seeder.collect().await.unwrap();

    let collector = UpdateCollector::new(as_sources(&[source.clone()]), store.clone());
    let found = collector.collect().await.unwrap();

    assert_eq!(source.fetched_pages(), vec![1, 2]);
    let keys: Vec<&str> = found.iter().map(|r| r.unique_key.as_str()).collect();
    assert_eq!(keys, vec!["fresh"]);
    assert!(store.stored("unreached").is_none());
}

#[tokio::test]
async fn collector_persists_even_non_notify_worthy_records() {
    let store = Arc::new(MemoryStore::new());

    let mut original = make_record("k", Severity::Low, &["web"]);
    original.title = "original".to_string();
    let seeder = UpdateCollector::new(
        vec![Arc::new(MockSource::new("seed").with_pages(vec![vec![original]]))],
        store.clone(),
    );
    seeder.collect().await.unwrap();

    let mut revised = make_record("k", Severity::Low, &["web"]);
    revised.title = "revised".to_string();
    let collector = UpdateCollector::new(
        vec![Arc::new(MockSource::new("one").with_pages(vec![vec![revised]]))],
        store.clone(),
    );
    let found = collector.collect().await.unwrap();

    assert!(found.is_empty());
    assert_eq!(store.stored("k").unwrap().title, "revised");
}

#[tokio::test]
async fn collector_error_aborts_the_tick() {
    let store = Arc::new(MemoryStore::new());
    let ok = Arc::new(
        MockSource::new("ok").with_pages(vec![vec![make_record("k", Severity::Low, &[])]]),
    );
    let broken = Arc::new(MockSource::new("broken").failing_page_count());

    let collector = UpdateCollector::new(as_sources(&[ok, broken]), store);
    assert!(collector.collect().await.is_err());
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

#[tokio::test]
async fn dispatch_delivers_once_per_key_across_ticks() {
    let source = Arc::new(MockSource::new("mock"));
    let config = test_config();
    let h = Harness::new(&[source.clone()], MockPrLister::new(vec![]), &config);

    let collector = UpdateCollector::new(
        vec![Arc::new(
            MockSource::new("mock")
                .with_pages(vec![vec![make_record("k", Severity::High, &["web"])]]),
        )],
        h.store.clone(),
    );
    let found = collector.collect().await.unwrap();
    assert_eq!(found.len(), 1);

    let mut refs = ReferenceCache::new();
    h.dispatcher.dispatch(found, &mut refs).await;
    assert_eq!(h.pusher.markdown_sent().len(), 1);
    assert_eq!(h.pusher.raw_sent().len(), 1);
    assert!(h.store.stored("k").unwrap().pushed);

    // Next tick: a new tag makes the record notify-worthy again, but the
    // pushed guard must hold.
    let collector = UpdateCollector::new(
        vec![Arc::new(
            MockSource::new("mock")
                .with_pages(vec![vec![make_record("k", Severity::High, &["web", "poc"])]]),
        )],
        h.store.clone(),
    );
    let found = collector.collect().await.unwrap();
    assert_eq!(found.len(), 1);

    let mut refs = ReferenceCache::new();
    h.dispatcher.dispatch(found, &mut refs).await;
    assert_eq!(h.pusher.markdown_sent().len(), 1);
    assert_eq!(h.pusher.raw_sent().len(), 1);
    assert!(h.store.stored("k").unwrap().pushed);
}

#[tokio::test]
async fn dispatch_applies_valuableness_filter() {
    let source = Arc::new(
        MockSource::new("mock").valuable_when(|r| r.severity >= Severity::High),
    );
    let config = test_config();
    let h = Harness::new(&[source], MockPrLister::new(vec![]), &config);

    let detector_feed = UpdateCollector::new(
        vec![Arc::new(MockSource::new("mock").with_pages(vec![vec![
            make_record("noise", Severity::Low, &[]),
            make_record("signal", Severity::Critical, &[]),
        ]]))],
        h.store.clone(),
    );
    let found = detector_feed.collect().await.unwrap();
    assert_eq!(found.len(), 2);

    let mut refs = ReferenceCache::new();
    h.dispatcher.dispatch(found, &mut refs).await;

    let titles: Vec<String> = h.pusher.markdown_sent().into_iter().map(|(t, _)| t).collect();
    assert_eq!(titles, vec!["vuln signal"]);
    assert!(!h.store.stored("noise").unwrap().pushed);
}

#[tokio::test]
async fn no_filter_overrides_valuableness() {
    let source = Arc::new(MockSource::new("mock").valuable_when(|_| false));
    let mut config = test_config();
    config.no_filter = true;
    let h = Harness::new(&[source], MockPrLister::new(vec![]), &config);

    let feed = UpdateCollector::new(
        vec![Arc::new(
            MockSource::new("mock").with_pages(vec![vec![make_record("k", Severity::Low, &[])]]),
        )],
        h.store.clone(),
    );
    let found = feed.collect().await.unwrap();

    let mut refs = ReferenceCache::new();
    h.dispatcher.dispatch(found, &mut refs).await;
    assert_eq!(h.pusher.markdown_sent().len(), 1);
}

#[tokio::test]
async fn cve_suppression_skips_without_marking_pushed() {
    let s1 = Arc::new(MockSource::new("one"));
    let s2 = Arc::new(MockSource::new("two"));
    let mut config = test_config();
    config.enable_cve_filter = true;
    let h = Harness::new(&[s1, s2], MockPrLister::new(vec![]), &config);

    let mut first = make_record("one-k", Severity::High, &[]);
    first.source = "one".to_string();
    first.cve = "CVE-2099-0001".to_string();
    let mut second = make_record("two-k", Severity::High, &[]);
    second.source = "two".to_string();
    second.cve = "CVE-2099-0001".to_string();

    let feed = UpdateCollector::new(
        vec![
            Arc::new(MockSource::new("one").with_pages(vec![vec![first]])),
            Arc::new(MockSource::new("two").with_pages(vec![vec![second.clone()]])),
        ],
        h.store.clone(),
    );
    let found = feed.collect().await.unwrap();
    let mut ordered: Vec<_> = found;
    ordered.sort_by(|a, b| a.unique_key.cmp(&b.unique_key));

    let mut refs = ReferenceCache::new();
    h.dispatcher.dispatch(ordered, &mut refs).await;

    // First record delivered; the second shares its CVE and is suppressed.
    assert_eq!(h.pusher.markdown_sent().len(), 1);
    assert!(h.store.stored("one-k").unwrap().pushed);
    assert!(
        !h.store.stored("two-k").unwrap().pushed,
        "suppressed record must stay eligible"
    );

    // A later tick sees it again: still suppressed, still not pushed.
    let mut refs = ReferenceCache::new();
    h.dispatcher.dispatch(vec![second], &mut refs).await;
    assert_eq!(h.pusher.markdown_sent().len(), 1);
    assert!(!h.store.stored("two-k").unwrap().pushed);
}

#[tokio::test]
async fn mark_pushed_failure_suppresses_delivery() {
    let source = Arc::new(MockSource::new("mock"));
    let config = test_config();
    let h = Harness::new(&[source], MockPrLister::new(vec![]), &config);

    let feed = UpdateCollector::new(
        vec![Arc::new(
            MockSource::new("mock").with_pages(vec![vec![make_record("k", Severity::High, &[])]]),
        )],
        h.store.clone(),
    );
    let found = feed.collect().await.unwrap();

    h.store.fail_set_pushed(true);
    let mut refs = ReferenceCache::new();
    h.dispatcher.dispatch(found, &mut refs).await;

    assert_eq!(h.pusher.total_sends(), 0);
    assert!(!h.store.stored("k").unwrap().pushed);
}

// ---------------------------------------------------------------------------
// Reference enrichment
// ---------------------------------------------------------------------------

fn pr(title: &str, url: &str) -> PullRequest {
    PullRequest {
        title: title.to_string(),
        body: None,
        html_url: url.to_string(),
    }
}

#[tokio::test]
async fn enrichment_merges_matching_links_uniquely() {
    let source = Arc::new(MockSource::new("mock"));
    let config = test_config();
    let lister = MockPrLister::new(vec![
        pr("Add CVE-2099-0001 template", "https://prs/1"),
        pr("CVE-2099-0001 checks", "https://prs/2"),
        pr("Unrelated", "https://prs/3"),
    ]);
    let h = Harness::new(&[source], lister, &config);

    let mut record = make_record("k", Severity::High, &[]);
    record.cve = "CVE-2099-0001".to_string();
    record.references = vec!["https://prs/1".to_string()];

    let feed = UpdateCollector::new(
        vec![Arc::new(MockSource::new("mock").with_pages(vec![vec![record]]))],
        h.store.clone(),
    );
    let found = feed.collect().await.unwrap();

    let mut refs = ReferenceCache::new();
    h.dispatcher.dispatch(found, &mut refs).await;

    assert_eq!(
        h.store.stored("k").unwrap().references,
        vec!["https://prs/1", "https://prs/2"]
    );
    let (_, body) = h.pusher.markdown_sent().remove(0);
    assert!(body.contains("https://prs/2"));
}

#[tokio::test]
async fn enrichment_fetch_failure_degrades_and_is_not_cached() {
    let source = Arc::new(MockSource::new("mock"));
    let config = test_config();
    let h = Harness::new(&[source], MockPrLister::failing(), &config);

    let mut a = make_record("a", Severity::High, &[]);
    a.cve = "CVE-2099-0001".to_string();
    let mut b = make_record("b", Severity::High, &[]);
    b.cve = "CVE-2099-0002".to_string();

    let feed = UpdateCollector::new(
        vec![Arc::new(MockSource::new("mock").with_pages(vec![vec![a, b]]))],
        h.store.clone(),
    );
    let found = feed.collect().await.unwrap();

    let mut refs = ReferenceCache::new();
    h.dispatcher.dispatch(found, &mut refs).await;

    // Both delivered despite the outage, one populate attempt per record.
    assert_eq!(h.pusher.markdown_sent().len(), 2);
    assert_eq!(h.lister.calls(), 2);
    assert!(h.store.stored("a").unwrap().references.is_empty());
}

#[tokio::test]
async fn no_reference_search_skips_enrichment() {
    let source = Arc::new(MockSource::new("mock"));
    let mut config = test_config();
    config.no_reference_search = true;
    let lister = MockPrLister::new(vec![pr("CVE-2099-0001", "https://prs/1")]);
    let h = Harness::new(&[source], lister, &config);

    let mut record = make_record("k", Severity::High, &[]);
    record.cve = "CVE-2099-0001".to_string();

    let feed = UpdateCollector::new(
        vec![Arc::new(MockSource::new("mock").with_pages(vec![vec![record]]))],
        h.store.clone(),
    );
    let found = feed.collect().await.unwrap();

    let mut refs = ReferenceCache::new();
    h.dispatcher.dispatch(found, &mut refs).await;

    assert_eq!(h.lister.calls(), 0);
    assert_eq!(h.pusher.markdown_sent().len(), 1);
    assert!(h.store.stored("k").unwrap().references.is_empty());
}
