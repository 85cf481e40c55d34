use crate::storage_config;
use flipharvest::config::{RemoteConfig, RetrievalConfig, StorageBackend, StorageConfig};
use flipharvest::harvest::{Discovery, Retrieval};
use flipharvest::remote::{build_http_client, HttpPageFetcher, HttpProber, PageUrlScheme};
use flipharvest::storage::{open_discovery_stores, open_retrieval_stores, StoreError};
use flipharvest::{DiscoveredItem, FaultRecord, HarvestRecord};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn retrieval_config() -> RetrievalConfig {
    RetrievalConfig {
        workers: 4,
        delay_ms: 0,
        ..RetrievalConfig::default()
    }
}

fn page_template(server: &MockServer) -> String {
    format!("{}/book/getImage/bookId:{{book}}/pageNo:{{page}}", server.uri())
}

async fn mount_page(server: &MockServer, book: &str, page: u32, expected: u64) {
    Mock::given(method("GET"))
        .and(path(format!("/book/getImage/bookId:{}/pageNo:{}", book, page)))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "image/jpeg")
                .set_body_bytes(format!("{}:{}", book, page).into_bytes()),
        )
        .expect(expected)
        .mount(server)
        .await;
}

fn retrieval(server: &MockServer, storage: &StorageConfig) -> Retrieval {
    let client = build_http_client(&RemoteConfig::default(), 4).unwrap();
    Retrieval::new(
        retrieval_config(),
        &storage.downloads_dir,
        PageUrlScheme::new(page_template(server)),
        Arc::new(HttpPageFetcher::new(client)),
        open_retrieval_stores(storage).unwrap(),
    )
}

fn seed_results(storage: &StorageConfig, records: &[HarvestRecord]) {
    open_discovery_stores(storage).unwrap().records.append(records).unwrap();
}

fn item(iter: u64, book: &str, title: &str) -> HarvestRecord {
    HarvestRecord::Discovered(DiscoveredItem::new(
        iter,
        format!("https://flipbook.example/display/{}", book),
        title,
    ))
}

fn page_file(storage: &StorageConfig, dir: &str, page: u32) -> std::path::PathBuf {
    Path::new(&storage.downloads_dir)
        .join(dir)
        .join(format!("page_{:04}.jpg", page))
}

#[tokio::test]
async fn test_retry_exhaustion_ends_item() {
    let server = MockServer::start().await;
    mount_page(&server, "500", 1, 1).await;
    mount_page(&server, "500", 2, 1).await;
    Mock::given(method("GET"))
        .and(path("/book/getImage/bookId:500/pageNo:3"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/book/getImage/bookId:500/pageNo:4"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let storage = storage_config(dir.path(), StorageBackend::Json);
    seed_results(&storage, &[item(4, "500", "Historia 6")]);

    let report = retrieval(&server, &storage)
        .run(CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.pages_fetched, 2);
    assert_eq!(report.items_completed, 1);
    assert_eq!(std::fs::read(page_file(&storage, "4_Historia_6", 2)).unwrap(), b"500:2");
    assert!(!page_file(&storage, "4_Historia_6", 3).exists());

    let progress: serde_json::Value = serde_json::from_str(
        &std::fs::read_to_string(&storage.retrieval_checkpoint_path).unwrap(),
    )
    .unwrap();
    assert_eq!(progress["4"], 2);
}

#[tokio::test]
async fn test_resume_skips_completed_pages() {
    let server = MockServer::start().await;
    mount_page(&server, "77", 1, 0).await;
    mount_page(&server, "77", 2, 0).await;
    mount_page(&server, "77", 3, 1).await;
    mount_page(&server, "77", 4, 1).await;

    let dir = TempDir::new().unwrap();
    let storage = storage_config(dir.path(), StorageBackend::Json);
    seed_results(&storage, &[item(9, "77", "Atlas")]);
    std::fs::write(&storage.retrieval_checkpoint_path, r#"{"9": 2}"#).unwrap();

    let report = retrieval(&server, &storage)
        .run(CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.pages_fetched, 2);
    assert!(!page_file(&storage, "9_Atlas", 1).exists());
    assert!(page_file(&storage, "9_Atlas", 4).exists());
}

#[tokio::test]
async fn test_fault_records_are_not_retrieved() {
    let server = MockServer::start().await;
    mount_page(&server, "1", 1, 1).await;

    let dir = TempDir::new().unwrap();
    let storage = storage_config(dir.path(), StorageBackend::Json);
    seed_results(
        &storage,
        &[
            HarvestRecord::Fault(FaultRecord::new(
                0,
                "https://flipbook.example/display/2",
                "Request timeout",
            )),
            item(1, "1", "Chemia"),
        ],
    );

    let report = retrieval(&server, &storage)
        .run(CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.items, 1);
    assert_eq!(report.faults_skipped, 1);
    assert_eq!(report.pages_fetched, 1);
}

#[test]
fn test_retrieval_requires_discovery_results() {
    let dir = TempDir::new().unwrap();
    let storage = storage_config(dir.path(), StorageBackend::Json);

    let result = open_retrieval_stores(&storage);

    assert!(matches!(result, Err(StoreError::MissingCollection(_))));
    assert!(!Path::new(&storage.retrieval_checkpoint_path).exists());
}

#[tokio::test]
async fn test_sqlite_end_to_end() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/display/0"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/html")
                .set_body_string("<html><head><title>Geografia 1</title></head></html>"),
        )
        .mount(&server)
        .await;
    for page in 1..=3 {
        mount_page(&server, "0", page, 3).await;
    }

    let dir = TempDir::new().unwrap();
    let storage = storage_config(dir.path(), StorageBackend::Sqlite);

    // Only identifier 0 can be sampled, so every task finds the same book
    let remote = RemoteConfig {
        display_url: format!("{}/display/{{id}}", server.uri()),
        ..RemoteConfig::default()
    };
    let prober = HttpProber::new(build_http_client(&remote, 2).unwrap(), &remote, vec![]);
    let discovery_config = flipharvest::config::DiscoveryConfig {
        workers: 2,
        total_iterations: 3,
        max_id: 0,
        ..Default::default()
    };
    let discovered = Discovery::new(
        discovery_config,
        Arc::new(prober),
        open_discovery_stores(&storage).unwrap(),
    )
    .run(CancellationToken::new())
    .await
    .unwrap();
    assert_eq!(discovered.relevant, 3);
    assert_eq!(discovered.checkpoint, 2);

    let report = retrieval(&server, &storage)
        .run(CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.items, 3);
    assert_eq!(report.pages_fetched, 9);
    for iter in 0..3 {
        let dir = format!("{}_Geografia_1", iter);
        assert!(page_file(&storage, &dir, 3).exists());
    }

    let stores = open_retrieval_stores(&storage).unwrap();
    let progress = stores.checkpoints.entries().unwrap();
    assert_eq!(progress.len(), 3);
    assert!(progress.values().all(|page| *page == 3));
    assert!(!Path::new(&storage.results_path).exists());
}
