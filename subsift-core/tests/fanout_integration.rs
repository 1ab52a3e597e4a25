//! Integration tests for the fan-out and batch pipeline.
//!
//! Real source implementations are pointed at a local wiremock server; mock
//! sources and sinks cover the failure paths. Nothing here touches the
//! network.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::json;
use subsift_core::sources::{AnubisSource, CrtShSource, HackerTargetSource};
use subsift_core::{
    BatchConfig, BatchEvent, BatchRunner, CoreError, EngineConfig, FanoutAggregator, JobTracker,
    LookupMode, ProgressCallback, SharedSource, Sink, Source,
};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn engine_config() -> EngineConfig {
    EngineConfig {
        requests_per_second: 0.0,
        source_timeout_secs: 5,
        ..Default::default()
    }
}

fn set(items: &[&str]) -> BTreeSet<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Counts calls and returns `www.` and `api.` under the key.
struct CountingSource {
    calls: AtomicUsize,
}

#[async_trait]
impl Source for CountingSource {
    fn name(&self) -> &str {
        "counting"
    }

    async fn fetch(&self, key: &str) -> Result<BTreeSet<String>, CoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok([format!("www.{key}"), format!("api.{key}")].into())
    }
}

/// Returns the same hostnames for any key.
struct FixedSource;

#[async_trait]
impl Source for FixedSource {
    fn name(&self) -> &str {
        "fixed"
    }

    async fn fetch(&self, _key: &str) -> Result<BTreeSet<String>, CoreError> {
        Ok(set(&["shop.example.net", "Example.ORG", "10.0.0.9"]))
    }
}

/// Always fails.
struct BrokenSource;

#[async_trait]
impl Source for BrokenSource {
    fn name(&self) -> &str {
        "broken"
    }

    async fn fetch(&self, _key: &str) -> Result<BTreeSet<String>, CoreError> {
        Err(CoreError::Parse("unexpected body".into()))
    }
}

/// Stores appended results and fails (or panics) for chosen keys.
#[derive(Default)]
struct FlakySink {
    fail_on: Option<String>,
    panic_on: Option<String>,
    stored: Mutex<Vec<(String, BTreeSet<String>)>>,
}

#[async_trait]
impl Sink for FlakySink {
    fn destination(&self) -> String {
        "flaky".into()
    }

    async fn append(&self, key: &str, results: &BTreeSet<String>) -> subsift_core::Result<()> {
        if self.fail_on.as_deref() == Some(key) {
            return Err(CoreError::Sink(format!("disk full while writing {key}")));
        }
        if self.panic_on.as_deref() == Some(key) {
            panic!("sink bug on {key}");
        }
        self.stored
            .lock()
            .expect("lock")
            .push((key.to_string(), results.clone()));
        Ok(())
    }
}

#[derive(Default)]
struct ProgressJob {
    last: Mutex<(usize, usize)>,
    status: Mutex<String>,
}

impl JobTracker for ProgressJob {
    fn mark_running(&self, _total: usize) {
        *self.status.lock().expect("lock") = "running".into();
    }

    fn set_progress(&self, completed: usize, total: usize) {
        *self.last.lock().expect("lock") = (completed, total);
    }

    fn mark_completed(&self) {
        *self.status.lock().expect("lock") = "completed".into();
    }

    fn mark_failed(&self, error: &str) {
        *self.status.lock().expect("lock") = format!("failed: {error}");
    }
}

#[tokio::test]
async fn real_sources_against_mock_server() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .and(query_param("q", "%.example.com"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"name_value": "www.example.com\n*.cdn.example.com", "common_name": "example.com"},
            {"name_value": "phish.example.net", "common_name": "phish.example.net"}
        ])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/hostsearch/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("www.example.com,10.0.0.1\nmail.example.com,10.0.0.2"),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/anubis/subdomains/example.com"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let config = engine_config();
    let sources: Vec<SharedSource> = vec![
        Arc::new(CrtShSource::new(&config).expect("crt.sh").with_base_url(server.uri())),
        Arc::new(
            HackerTargetSource::new(&config)
                .expect("hackertarget")
                .with_base_url(server.uri()),
        ),
        Arc::new(AnubisSource::new(&config).expect("anubis").with_base_url(server.uri())),
    ];
    let aggregator = FanoutAggregator::new(sources, LookupMode::Subdomain, config);

    let found = aggregator.process("example.com").await;
    assert_eq!(
        found,
        set(&[
            "cdn.example.com",
            "example.com",
            "mail.example.com",
            "www.example.com"
        ])
    );

    // Same mocked responses, same output.
    assert_eq!(aggregator.process("example.com").await, found);
}

#[tokio::test]
async fn broken_source_leaves_other_contributions_intact() {
    let counting = Arc::new(CountingSource {
        calls: AtomicUsize::new(0),
    });
    let with_broken = FanoutAggregator::new(
        vec![counting.clone(), Arc::new(BrokenSource)],
        LookupMode::Subdomain,
        engine_config(),
    );
    let alone = FanoutAggregator::new(vec![counting], LookupMode::Subdomain, engine_config());

    assert_eq!(
        with_broken.process("example.org").await,
        alone.process("example.org").await
    );
}

#[tokio::test]
async fn persistence_failure_on_one_key_does_not_stop_batch() {
    let events: Arc<Mutex<Vec<BatchEvent>>> = Arc::new(Mutex::new(Vec::new()));
    let recorder = Arc::clone(&events);
    let callback: ProgressCallback = Arc::new(move |event| {
        if let Ok(mut guard) = recorder.lock() {
            guard.push(event);
        }
    });

    let source = Arc::new(CountingSource {
        calls: AtomicUsize::new(0),
    });
    let aggregator = FanoutAggregator::new(vec![source], LookupMode::Subdomain, engine_config())
        .with_callback(callback);
    let runner = BatchRunner::new(aggregator, BatchConfig::default());

    let sink = FlakySink {
        fail_on: Some("two.com".into()),
        ..Default::default()
    };
    let job = ProgressJob::default();
    let keys: Vec<String> = ["one.com", "two.com", "three.com"]
        .iter()
        .map(|s| s.to_string())
        .collect();

    let results = runner.run(&keys, &sink, Some(&job)).await.expect("batch");

    let stored = sink.stored.lock().expect("lock");
    let stored_keys: BTreeSet<&str> = stored.iter().map(|(k, _)| k.as_str()).collect();
    assert_eq!(stored_keys, ["one.com", "three.com"].into_iter().collect());
    assert!(results.contains("www.one.com"));
    assert!(results.contains("api.three.com"));

    assert_eq!(*job.last.lock().expect("lock"), (3, 3));
    assert_eq!(job.status.lock().expect("lock").as_str(), "completed");

    let events = events.lock().expect("lock");
    assert!(events.iter().any(|e| matches!(
        e,
        BatchEvent::KeyFailed { key, .. } if key == "two.com"
    )));
    assert!(events.contains(&BatchEvent::Progress {
        completed: 3,
        total: 3
    }));
}

#[tokio::test]
async fn panicking_sink_is_absorbed() {
    let source = Arc::new(CountingSource {
        calls: AtomicUsize::new(0),
    });
    let runner = BatchRunner::new(
        FanoutAggregator::new(vec![source], LookupMode::Subdomain, engine_config()),
        BatchConfig::default(),
    );
    let sink = FlakySink {
        panic_on: Some("b.com".into()),
        ..Default::default()
    };
    let keys: Vec<String> = vec!["a.com".into(), "b.com".into(), "c.com".into()];

    let results = runner.run(&keys, &sink, None).await.expect("batch");
    assert_eq!(results.len(), 6);
    assert_eq!(sink.stored.lock().expect("lock").len(), 2);
}

#[tokio::test]
async fn oversized_batch_rejected_before_any_source_is_queried() {
    let source = Arc::new(CountingSource {
        calls: AtomicUsize::new(0),
    });
    let runner = BatchRunner::new(
        FanoutAggregator::new(vec![source.clone()], LookupMode::Subdomain, engine_config()),
        BatchConfig::default(),
    );
    let job = ProgressJob::default();
    let keys: Vec<String> = (0..15_001).map(|i| format!("host{i}.example.com")).collect();

    let err = runner
        .run(&keys, &FlakySink::default(), Some(&job))
        .await
        .unwrap_err();

    assert!(matches!(err, CoreError::InvalidBatch(_)));
    assert_eq!(source.calls.load(Ordering::SeqCst), 0);
    assert!(job.status.lock().expect("lock").starts_with("failed"));
}

#[tokio::test]
async fn reverse_ip_batch_skips_domain_keys() {
    let counting = Arc::new(CountingSource {
        calls: AtomicUsize::new(0),
    });
    let runner = BatchRunner::new(
        FanoutAggregator::new(
            vec![counting.clone(), Arc::new(FixedSource)],
            LookupMode::ReverseIp,
            engine_config(),
        ),
        BatchConfig::default(),
    );
    let keys: Vec<String> = vec!["10.0.0.1".into(), "example.com".into()];

    let results = runner
        .run(&keys, &FlakySink::default(), None)
        .await
        .expect("batch");
    assert_eq!(counting.calls.load(Ordering::SeqCst), 1);
    // Names echoed under an IP are not hostnames and get dropped.
    assert_eq!(results, set(&["example.org", "shop.example.net"]));
}

#[tokio::test]
#[ignore] // Requires network access to public lookup services
async fn live_lookup_returns_subdomains() {
    let found = subsift_core::lookup("example.com", LookupMode::Subdomain, &EngineConfig::default())
        .await
        .expect("lookup");
    assert!(found.iter().all(|name| name.ends_with("example.com")));
}
