use crate::storage_config;
use async_trait::async_trait;
use flipharvest::config::{DiscoveryConfig, RemoteConfig, StorageBackend};
use flipharvest::harvest::Discovery;
use flipharvest::remote::{build_http_client, HttpProber, Probe, Prober};
use flipharvest::storage::{open_discovery_stores, MAX_ITER_KEY};
use flipharvest::{HarvestError, HarvestRecord, ProbeOutcome};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

fn discovery_config(workers: usize, total: u64) -> DiscoveryConfig {
    DiscoveryConfig {
        workers,
        total_iterations: total,
        buffer_limit: 1,
        max_consecutive_failures: 10,
        ..DiscoveryConfig::default()
    }
}

/// Prober that finds a relevant document for every identifier
struct AlwaysRelevant;

#[async_trait]
impl Prober for AlwaysRelevant {
    async fn probe(&self, identifier: u64) -> Probe {
        Probe {
            url: format!("https://h.example/display/{}", identifier),
            outcome: ProbeOutcome::Relevant(format!("Document {}", identifier)),
        }
    }
}

/// Prober whose first call is held until the second call has returned
struct GatedProber {
    calls: AtomicUsize,
    release: Notify,
}

#[async_trait]
impl Prober for GatedProber {
    async fn probe(&self, identifier: u64) -> Probe {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call == 0 {
            self.release.notified().await;
        } else if call == 1 {
            self.release.notify_one();
        }
        Probe {
            url: format!("https://h.example/display/{}", identifier),
            outcome: ProbeOutcome::Relevant(format!("Document {}", identifier)),
        }
    }
}

#[tokio::test]
async fn test_out_of_order_completion_keeps_highest_checkpoint() {
    let dir = TempDir::new().unwrap();
    let stores = open_discovery_stores(&storage_config(dir.path(), StorageBackend::Json)).unwrap();
    stores.checkpoints.advance(MAX_ITER_KEY, 5).unwrap();

    let prober = Arc::new(GatedProber {
        calls: AtomicUsize::new(0),
        release: Notify::new(),
    });
    let report = Discovery::new(discovery_config(2, 8), prober, stores.clone())
        .run(CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.relevant, 2);
    assert_eq!(report.checkpoint, 7);
    assert_eq!(stores.checkpoints.read(MAX_ITER_KEY).unwrap(), Some(7));

    // Index 6 was held back, so it landed after index 7
    let indices: Vec<u64> = stores.records.load().unwrap().iter().map(|r| r.iter()).collect();
    assert_eq!(indices, vec![7, 6]);

    // The progress file on disk agrees
    let on_disk: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(dir.path().join("progress.json")).unwrap())
            .unwrap();
    assert_eq!(on_disk["max_iter"], 7);
}

#[tokio::test]
async fn test_rerun_from_checkpoint_adds_nothing() {
    let dir = TempDir::new().unwrap();
    let config = storage_config(dir.path(), StorageBackend::Json);

    let stores = open_discovery_stores(&config).unwrap();
    Discovery::new(discovery_config(4, 12), Arc::new(AlwaysRelevant), stores)
        .run(CancellationToken::new())
        .await
        .unwrap();

    // Reopen from disk as a restarted process would
    let stores = open_discovery_stores(&config).unwrap();
    let report = Discovery::new(discovery_config(4, 12), Arc::new(AlwaysRelevant), stores.clone())
        .run(CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.start_index, 12);
    assert_eq!(report.attempted, 0);
    assert_eq!(stores.records.count().unwrap(), 12);
    assert_eq!(stores.checkpoints.read(MAX_ITER_KEY).unwrap(), Some(11));
}

#[tokio::test]
async fn test_http_discovery_records_titles() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/html; charset=utf-8")
                .set_body_string("<html><head><title> Fizyka 8 </title></head></html>"),
        )
        .mount(&server)
        .await;

    let remote = RemoteConfig {
        display_url: format!("{}/display/{{id}}", server.uri()),
        ..RemoteConfig::default()
    };
    let prober = HttpProber::new(build_http_client(&remote, 4).unwrap(), &remote, vec![]);

    let dir = TempDir::new().unwrap();
    let stores = open_discovery_stores(&storage_config(dir.path(), StorageBackend::Json)).unwrap();
    let config = DiscoveryConfig {
        max_id: 50,
        buffer_limit: 4,
        ..discovery_config(4, 10)
    };
    let report = Discovery::new(config, Arc::new(prober), stores.clone())
        .run(CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.relevant, 10);
    let records = stores.records.load().unwrap();
    assert_eq!(records.len(), 10);
    for record in &records {
        let item = record.as_discovered().unwrap();
        assert_eq!(item.title, "Fizyka 8");
        assert!(item.source_url.starts_with(&format!("{}/display/", server.uri())));
    }
}

#[tokio::test]
async fn test_bulk_rejection_aborts_and_keeps_fault_audit() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let remote = RemoteConfig {
        display_url: format!("{}/display/{{id}}", server.uri()),
        ..RemoteConfig::default()
    };
    let prober = HttpProber::new(build_http_client(&remote, 4).unwrap(), &remote, vec![]);

    let dir = TempDir::new().unwrap();
    let stores = open_discovery_stores(&storage_config(dir.path(), StorageBackend::Json)).unwrap();
    let config = DiscoveryConfig {
        buffer_limit: 50,
        ..discovery_config(4, 1_000)
    };
    let result = Discovery::new(config, Arc::new(prober), stores.clone())
        .run(CancellationToken::new())
        .await;

    assert!(matches!(result, Err(HarvestError::FailureThreshold { .. })));

    // Dispatch stopped shortly after the tenth failure
    let requests = server.received_requests().await.unwrap();
    assert!(requests.len() >= 10);
    assert!(requests.len() < 1_000);

    // Every completed probe was flushed as a fault despite the abort
    let records = stores.records.load().unwrap();
    assert_eq!(records.len(), requests.len());
    assert!(records
        .iter()
        .all(|r| matches!(r, HarvestRecord::Fault(f) if f.error == "HTTP 403")));
    assert_eq!(stores.checkpoints.read(MAX_ITER_KEY).unwrap(), Some(-1));
}

#[tokio::test]
async fn test_not_found_is_silent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let remote = RemoteConfig {
        display_url: format!("{}/display/{{id}}", server.uri()),
        ..RemoteConfig::default()
    };
    let prober = HttpProber::new(build_http_client(&remote, 4).unwrap(), &remote, vec![]);

    let dir = TempDir::new().unwrap();
    let stores = open_discovery_stores(&storage_config(dir.path(), StorageBackend::Json)).unwrap();

    // Far more misses than the failure threshold: none of them count
    let report = Discovery::new(discovery_config(4, 40), Arc::new(prober), stores.clone())
        .run(CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.not_found, 40);
    assert_eq!(stores.records.count().unwrap(), 0);
}
