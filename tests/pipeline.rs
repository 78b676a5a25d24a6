//! End-to-end pipeline runs against in-process fakes.
//!
//! Every collaborator of [`Harvester`] is replaced: pages come from a map,
//! storage is in memory, notifications are recorded.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use tokio::sync::Barrier;

use bridge_harvester::classify::FixedClock;
use bridge_harvester::models::{BridgeRecord, Category};
use bridge_harvester::notify::{FETCH_FAILED_MESSAGE, NEW_BRIDGES_TITLE};
use bridge_harvester::pipeline::Harvester;
use bridge_harvester::runner::{RunCoordinator, TriggerOutcome};
use bridge_harvester::store::{CategoryDocument, InMemoryStore, RecordStore};
use bridge_harvester::traits::{Notifier, PageFetcher};

const FP: &str = "0123456789ABCDEF0123456789ABCDEF01234567";

fn obfs4(host: &str) -> String {
    format!("obfs4 {host}:443 {FP} cert=abc iat-mode=0")
}

fn webtunnel(host: &str) -> String {
    format!("webtunnel {host}:443 {FP} url=https://example.test/path ver=0.0.1")
}

fn page(lines: &[String]) -> String {
    let body: Vec<String> = lines.iter().map(|l| format!("<div>{l}</div>")).collect();
    format!("<html><body>{}</body></html>", body.join("\n"))
}

// ============ Fakes ============

struct MapFetcher {
    pages: HashMap<String, String>,
}

#[async_trait]
impl PageFetcher for MapFetcher {
    async fn fetch(&self, url: &str) -> Result<String> {
        match self.pages.get(url) {
            Some(text) => Ok(text.clone()),
            None => bail!("connection refused: {}", url),
        }
    }
}

#[derive(Default)]
struct RecordingNotifier {
    sent: Mutex<Vec<String>>,
    fail: bool,
}

impl RecordingNotifier {
    fn failing() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    fn messages(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send_message(&self, text: &str) -> Result<()> {
        self.sent.lock().unwrap().push(text.to_string());
        if self.fail {
            bail!("telegram unavailable");
        }
        Ok(())
    }
}

/// Reads from an inner store but refuses every append to one category.
struct RejectingStore {
    inner: InMemoryStore,
    reject: Category,
}

#[async_trait]
impl RecordStore for RejectingStore {
    async fn read_all(&self) -> Result<BTreeMap<Category, CategoryDocument>> {
        self.inner.read_all().await
    }

    async fn append(&self, category: Category, record: &BridgeRecord) -> Result<()> {
        if category == self.reject {
            bail!("disk full");
        }
        self.inner.append(category, record).await
    }
}

/// A store whose reads always fail; appends still land in `inner`.
struct UnreadableStore {
    inner: InMemoryStore,
}

#[async_trait]
impl RecordStore for UnreadableStore {
    async fn read_all(&self) -> Result<BTreeMap<Category, CategoryDocument>> {
        bail!("database is locked")
    }

    async fn append(&self, category: Category, record: &BridgeRecord) -> Result<()> {
        self.inner.append(category, record).await
    }
}

/// Serves one page, but only after the test passes the barrier.
struct GatedFetcher {
    gate: Arc<Barrier>,
    text: String,
}

#[async_trait]
impl PageFetcher for GatedFetcher {
    async fn fetch(&self, _url: &str) -> Result<String> {
        self.gate.wait().await;
        Ok(self.text.clone())
    }
}

fn urls() -> BTreeMap<Category, String> {
    Category::ALL
        .iter()
        .map(|c| (*c, format!("https://bridges.test/{}", c)))
        .collect()
}

fn fetcher(pages: &[(Category, String)]) -> Arc<MapFetcher> {
    let urls = urls();
    Arc::new(MapFetcher {
        pages: pages
            .iter()
            .map(|(c, text)| (urls[c].clone(), text.clone()))
            .collect(),
    })
}

fn harvester(
    fetcher: Arc<MapFetcher>,
    store: Arc<dyn RecordStore>,
    notifier: Arc<RecordingNotifier>,
) -> Harvester {
    let clock = FixedClock(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap());
    Harvester::new(urls(), fetcher, store, notifier)
        .with_clock(Arc::new(clock))
        .with_notify_delay(Duration::ZERO)
}

// ============ Tests ============

#[tokio::test]
async fn test_second_run_reports_only_duplicates() {
    let lines = vec![obfs4("1.2.3.4"), obfs4("5.6.7.8")];
    let fetcher = fetcher(&[(Category::Obfs4Ipv4, page(&lines))]);
    let store = Arc::new(InMemoryStore::new());
    let notifier = Arc::new(RecordingNotifier::default());
    let h = harvester(fetcher, store.clone(), notifier);

    let first = h.run_once().await.unwrap();
    assert_eq!(first.new_bridges[&Category::Obfs4Ipv4], lines);
    assert!(first.duplicate_bridges.is_empty());
    assert_eq!(store.lines(Category::Obfs4Ipv4), lines);

    // addedAt comes from the injected clock at classification time
    let docs = store.read_all().await.unwrap();
    let stored = &docs[&Category::Obfs4Ipv4].bridges;
    assert_eq!(stored.len(), 2);
    for entry in stored {
        assert_eq!(entry["addedAt"], "2024-05-01T12:00:00.000Z");
        assert_eq!(entry["cert"], "abc");
        assert_eq!(entry["iat-mode"], "0");
    }

    let second = h.run_once().await.unwrap();
    assert!(second.new_bridges.is_empty());
    assert_eq!(second.duplicate_bridges[&Category::Obfs4Ipv4], lines);
    assert_eq!(store.len(), 2);
}

#[tokio::test]
async fn test_known_line_is_duplicate_and_repeat_within_run() {
    let a = obfs4("1.2.3.4");
    let b = obfs4("5.6.7.8");
    let x = obfs4("9.9.9.9");

    let store = Arc::new(InMemoryStore::new());
    store.seed(
        Category::Obfs4Ipv4,
        vec![serde_json::json!({ "bridge": x.clone() })],
    );

    // b appears on two pages; the second sighting is a duplicate
    let fetcher = fetcher(&[
        (Category::Obfs4Ipv4, page(&[a.clone(), b.clone(), x.clone()])),
        (Category::Obfs4Ipv6, page(&[b.clone()])),
    ]);
    let h = harvester(fetcher, store.clone(), Arc::new(RecordingNotifier::default()));

    let report = h.run_once().await.unwrap();
    assert_eq!(report.new_bridges[&Category::Obfs4Ipv4], vec![a.clone(), b.clone()]);
    assert_eq!(report.duplicate_bridges[&Category::Obfs4Ipv4], vec![x.clone(), b.clone()]);
    assert_eq!(store.lines(Category::Obfs4Ipv4), vec![x, a, b]);
}

#[tokio::test]
async fn test_no_lines_sends_single_failure_message() {
    let fetcher = fetcher(&[(Category::Obfs4Ipv4, "<html>nothing here</html>".to_string())]);
    let store = Arc::new(InMemoryStore::new());
    let notifier = Arc::new(RecordingNotifier::default());
    let h = harvester(fetcher, store.clone(), notifier.clone());

    let report = h.run_once().await.unwrap();
    assert!(report.is_empty());
    assert!(store.is_empty());
    assert_eq!(notifier.messages(), vec![FETCH_FAILED_MESSAGE.to_string()]);
}

#[tokio::test]
async fn test_unreachable_pages_are_skipped() {
    // Only one of four pages answers
    let fetcher = fetcher(&[(Category::WebtunnelIpv4, page(&[webtunnel("7.7.7.7")]))]);
    let h = harvester(
        fetcher,
        Arc::new(InMemoryStore::new()),
        Arc::new(RecordingNotifier::default()),
    );

    let report = h.run_once().await.unwrap();
    assert_eq!(report.new_count(), 1);
    assert_eq!(
        report.new_bridges[&Category::WebtunnelIpv4],
        vec![webtunnel("7.7.7.7")]
    );
}

#[tokio::test]
async fn test_ipv6_lines_land_in_ipv6_categories() {
    let v6 = obfs4("[2001:db8::1]");
    let fetcher = fetcher(&[(Category::Obfs4Ipv6, page(&[v6.clone()]))]);
    let store = Arc::new(InMemoryStore::new());
    let h = harvester(fetcher, store.clone(), Arc::new(RecordingNotifier::default()));

    let report = h.run_once().await.unwrap();
    assert_eq!(report.new_bridges[&Category::Obfs4Ipv6], vec![v6.clone()]);
    assert_eq!(store.lines(Category::Obfs4Ipv6), vec![v6]);
}

#[tokio::test]
async fn test_malformed_lines_reported_and_notified() {
    let good = obfs4("1.2.3.4");
    let bad = obfs4("bridge.example");
    let fetcher = fetcher(&[(Category::Obfs4Ipv4, page(&[good.clone(), bad.clone()]))]);
    let store = Arc::new(InMemoryStore::new());
    let notifier = Arc::new(RecordingNotifier::default());
    let h = harvester(fetcher, store.clone(), notifier.clone());

    let report = h.run_once().await.unwrap();
    assert_eq!(report.malformed_bridges, vec![bad.clone()]);
    assert_eq!(store.lines(Category::Obfs4Ipv4), vec![good]);

    let messages = notifier.messages();
    let last = messages.last().unwrap();
    assert!(last.starts_with("<b>Malformed Bridges Found:</b>"));
    assert!(last.contains(&bad));
}

#[tokio::test]
async fn test_notification_order() {
    let known = obfs4("9.9.9.9");
    let store = Arc::new(InMemoryStore::new());
    store.seed(
        Category::Obfs4Ipv4,
        vec![serde_json::json!({ "bridge": known.clone() })],
    );

    let fetcher = fetcher(&[(
        Category::Obfs4Ipv4,
        page(&[obfs4("1.2.3.4"), known, obfs4("not-an-ip")]),
    )]);
    let notifier = Arc::new(RecordingNotifier::default());
    let h = harvester(fetcher, store, notifier.clone());

    h.run_once().await.unwrap();

    let messages = notifier.messages();
    assert_eq!(messages.len(), 3);
    assert!(messages[0].starts_with(&format!("<b>{}:</b>", NEW_BRIDGES_TITLE)));
    assert!(messages[0].contains("<b>OBFS4 IPV4:</b>"));
    assert!(messages[1].starts_with("<b>Duplicate Bridges Found:</b>"));
    assert!(messages[2].starts_with("<b>Malformed Bridges Found:</b>"));
}

#[tokio::test]
async fn test_notifier_failure_does_not_fail_run() {
    let fetcher = fetcher(&[(Category::Obfs4Ipv4, page(&[obfs4("1.2.3.4")]))]);
    let store = Arc::new(InMemoryStore::new());
    let notifier = Arc::new(RecordingNotifier::failing());
    let h = harvester(fetcher, store.clone(), notifier.clone());

    let report = h.run_once().await.unwrap();
    assert_eq!(report.new_count(), 1);
    assert_eq!(store.len(), 1);
    assert_eq!(notifier.messages().len(), 1);
}

#[tokio::test]
async fn test_append_failure_fails_run_after_notifying() {
    let fetcher = fetcher(&[
        (Category::Obfs4Ipv4, page(&[obfs4("1.2.3.4")])),
        (Category::WebtunnelIpv4, page(&[webtunnel("7.7.7.7")])),
    ]);
    let store = Arc::new(RejectingStore {
        inner: InMemoryStore::new(),
        reject: Category::WebtunnelIpv4,
    });
    let notifier = Arc::new(RecordingNotifier::default());
    let h = harvester(fetcher, store.clone(), notifier.clone());

    let err = h.run_once().await.unwrap_err();
    assert!(format!("{:#}", err).contains("disk full"));

    // The other category was still stored and announced
    assert_eq!(store.inner.lines(Category::Obfs4Ipv4), vec![obfs4("1.2.3.4")]);
    let messages = notifier.messages();
    assert_eq!(messages.len(), 1);
    assert!(messages[0].contains(&obfs4("1.2.3.4")));
    assert!(!messages[0].contains("webtunnel"));
}

#[tokio::test]
async fn test_coordinator_reports_busy_while_running() {
    let fetcher = fetcher(&[(Category::Obfs4Ipv4, page(&[obfs4("1.2.3.4")]))]);
    let h = harvester(
        fetcher,
        Arc::new(InMemoryStore::new()),
        Arc::new(RecordingNotifier::default()),
    );
    let coordinator = RunCoordinator::new();

    let guard = coordinator.try_acquire().unwrap();
    assert!(matches!(coordinator.trigger(&h).await, TriggerOutcome::Busy));
    assert!(coordinator.last_outcome().await.is_none());
    drop(guard);

    match coordinator.trigger(&h).await {
        TriggerOutcome::Completed { report, .. } => assert_eq!(report.new_count(), 1),
        other => panic!("expected completed run, got {:?}", other),
    }
    assert!(!coordinator.is_running());
    assert!(coordinator.last_outcome().await.is_some());
}

#[tokio::test]
async fn test_coordinator_records_failed_run() {
    let fetcher = fetcher(&[(Category::Obfs4Ipv4, page(&[obfs4("1.2.3.4")]))]);
    let store = Arc::new(RejectingStore {
        inner: InMemoryStore::new(),
        reject: Category::Obfs4Ipv4,
    });
    let h = harvester(fetcher, store, Arc::new(RecordingNotifier::default()));
    let coordinator = RunCoordinator::new();

    let outcome = coordinator.trigger(&h).await;
    assert!(matches!(outcome, TriggerOutcome::Failed { .. }));
    assert!(!coordinator.is_running());
}

#[tokio::test]
async fn test_unreadable_store_starts_with_nothing_known() {
    let line = obfs4("1.2.3.4");
    let fetcher = fetcher(&[(Category::Obfs4Ipv4, page(&[line.clone()]))]);
    let store = Arc::new(UnreadableStore {
        inner: InMemoryStore::new(),
    });
    let notifier = Arc::new(RecordingNotifier::default());
    let h = harvester(fetcher, store.clone(), notifier.clone());

    let report = h.run_once().await.unwrap();
    assert_eq!(report.new_bridges[&Category::Obfs4Ipv4], vec![line.clone()]);
    assert_eq!(store.inner.lines(Category::Obfs4Ipv4), vec![line.clone()]);

    let messages = notifier.messages();
    assert_eq!(messages.len(), 1);
    assert!(messages[0].contains(&line));
}

#[tokio::test]
async fn test_concurrent_triggers_run_once() {
    let gate = Arc::new(Barrier::new(2));
    let fetcher = Arc::new(GatedFetcher {
        gate: Arc::clone(&gate),
        text: page(&[obfs4("1.2.3.4")]),
    });
    let urls = BTreeMap::from([(Category::Obfs4Ipv4, "https://bridges.test/a".to_string())]);
    let store = Arc::new(InMemoryStore::new());
    let h = Harvester::new(
        urls,
        fetcher,
        store.clone(),
        Arc::new(RecordingNotifier::default()),
    )
    .with_notify_delay(Duration::ZERO);
    let coordinator = RunCoordinator::new();

    // The winning run blocks in its fetch until the third branch releases it
    let (first, second, _) = tokio::join!(coordinator.trigger(&h), coordinator.trigger(&h), async {
        gate.wait().await;
    });

    let outcomes = [first, second];
    let busy = outcomes
        .iter()
        .filter(|o| matches!(o, TriggerOutcome::Busy))
        .count();
    let completed = outcomes
        .iter()
        .filter(|o| matches!(o, TriggerOutcome::Completed { .. }))
        .count();
    assert_eq!(busy, 1);
    assert_eq!(completed, 1);
    assert_eq!(store.len(), 1);
    assert!(!coordinator.is_running());
}
