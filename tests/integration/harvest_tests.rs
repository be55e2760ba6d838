//! End-to-end harvest runs against a mock shop

use humidor::config::{
    ConnectorConfig, FieldSelectors, HarvestConfig, TransportConfig,
};
use humidor::harvest::{FanOut, Orchestrator, SelectorConnector};
use humidor::store::{FsStore, RecordStore};
use humidor::{HarvestError, IdentityKey, ResilientTransport};
use std::collections::BTreeMap;
use std::sync::Arc;
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn listing(items: &[&str], has_next: bool) -> String {
    let items: String = items
        .iter()
        .map(|href| {
            format!(
                r#"<div class="item"><a class="item-link" href="{}">item</a></div>"#,
                href
            )
        })
        .collect();
    let next = if has_next {
        r##"<nav><a class="pagination-next" href="#">next</a></nav>"##
    } else {
        ""
    };
    format!(
        r#"<html><body><div class="results">{}</div>{}</body></html>"#,
        items, next
    )
}

fn item_page(name: &str, price: &str) -> String {
    format!(
        r#"<html><body>
            <h1 class="product-title">{}</h1>
            <span class="brand">Casa Test</span>
            <span class="price">{}</span>
        </body></html>"#,
        name, price
    )
}

fn connector_config(base_url: &str) -> ConnectorConfig {
    ConnectorConfig {
        name: "mock-shop".to_string(),
        listing_url: format!("{}/list?page={{page}}", base_url),
        item_link: "div.results div.item a.item-link".to_string(),
        next_page: Some("a.pagination-next".to_string()),
        skip_patterns: vec!["humidor".to_string(), "sample".to_string()],
        headers: BTreeMap::new(),
        fields: FieldSelectors {
            name: Some("h1.product-title".to_string()),
            brand: Some("span.brand".to_string()),
            price: Some("span.price".to_string()),
            ..Default::default()
        },
    }
}

fn harvest_config() -> HarvestConfig {
    HarvestConfig {
        page_min: 1,
        page_max: 0,
        limit: 50,
        concurrency: 2,
        page_delay_ms: 0,
    }
}

fn build_orchestrator(
    base_url: &str,
    store: FsStore,
) -> Orchestrator<SelectorConnector, FsStore> {
    let transport = TransportConfig {
        initial_delay_ms: 5,
        backoff_ms: 5,
        max_attempts: 3,
        timeout_secs: 5,
        user_agent: "humidor-test/1.0".to_string(),
    };
    let transport = ResilientTransport::from_config(&transport).expect("Failed to build transport");
    let connector = SelectorConnector::new(
        &connector_config(base_url),
        Arc::new(transport),
        FanOut::new(2),
    )
    .expect("Connector config should be valid");

    Orchestrator::new(connector, store, harvest_config())
}

async fn mount_shop(mock_server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/list"))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_string(listing(
            &["/cigars/robusto", "/cigars/toro", "/cigars/humidor-deluxe"],
            true,
        )))
        .mount(mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/list"))
        .and(query_param("page", "2"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(listing(&["/cigars/corona"], false)),
        )
        .mount(mock_server)
        .await;

    // The first request for the robusto is rate limited
    Mock::given(method("GET"))
        .and(path("/cigars/robusto"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(1)
        .mount(mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/cigars/robusto"))
        .respond_with(ResponseTemplate::new(200).set_body_string(item_page("Robusto", "12,50 EUR")))
        .mount(mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/cigars/toro"))
        .respond_with(ResponseTemplate::new(200).set_body_string(item_page("Toro", "14.00")))
        .mount(mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/cigars/corona"))
        .respond_with(ResponseTemplate::new(200).set_body_string(item_page("Corona", "9,90")))
        .mount(mock_server)
        .await;
}

#[tokio::test]
async fn test_full_harvest_two_pages() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();
    mount_shop(&mock_server).await;

    // Skipped links must never be fetched
    Mock::given(method("GET"))
        .and(path("/cigars/humidor-deluxe"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().expect("Failed to create temp dir");
    let store = FsStore::new(dir.path(), IdentityKey::Url).expect("Failed to open store");
    let orchestrator = build_orchestrator(&base_url, store);

    let summary = orchestrator.run().await.expect("Harvest should succeed");

    assert_eq!(summary.pages, 2);
    assert_eq!(summary.records_written, 3);
    assert_eq!(summary.task_failures, 0);
    assert_eq!(summary.field_warnings, 0);

    let stored = orchestrator
        .store()
        .read_bulk(10, 0)
        .expect("Failed to read store");
    assert_eq!(stored.next_page, 0);

    let mut names: Vec<_> = stored.records.iter().map(|r| r.name.clone()).collect();
    names.sort();
    assert_eq!(names, vec!["Corona", "Robusto", "Toro"]);

    let robusto = orchestrator.store().seek("Robusto").expect("Robusto stored");
    assert_eq!(robusto.price, 12.5);
    assert_eq!(robusto.brand, "Casa Test");
    assert_eq!(robusto.url, format!("{}/cigars/robusto", base_url));
}

#[tokio::test]
async fn test_harvest_is_idempotent() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();
    mount_shop(&mock_server).await;

    let dir = TempDir::new().expect("Failed to create temp dir");

    let first = build_orchestrator(
        &base_url,
        FsStore::new(dir.path(), IdentityKey::Url).unwrap(),
    );
    first.run().await.expect("First harvest should succeed");
    let snapshot = read_files(dir.path());

    let second = build_orchestrator(
        &base_url,
        FsStore::new(dir.path(), IdentityKey::Url).unwrap(),
    );
    second.run().await.expect("Second harvest should succeed");

    assert_eq!(snapshot.len(), 3);
    assert_eq!(read_files(dir.path()), snapshot);
}

#[tokio::test]
async fn test_missing_item_is_a_task_failure() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    Mock::given(method("GET"))
        .and(path("/list"))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_string(listing(
            &["/cigars/robusto", "/cigars/gone"],
            false,
        )))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/cigars/robusto"))
        .respond_with(ResponseTemplate::new(200).set_body_string(item_page("Robusto", "n/a")))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/cigars/gone"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().expect("Failed to create temp dir");
    let store = FsStore::new(dir.path(), IdentityKey::Url).unwrap();
    let orchestrator = build_orchestrator(&base_url, store);

    let summary = orchestrator.run().await.expect("Harvest should succeed");

    assert_eq!(summary.pages, 1);
    assert_eq!(summary.records_written, 1);
    assert_eq!(summary.task_failures, 1);
    // "n/a" is not a price
    assert_eq!(summary.field_warnings, 1);

    let robusto = orchestrator.store().seek("Robusto").unwrap();
    assert_eq!(robusto.warnings.len(), 1);
    assert_eq!(robusto.warnings[0].field, "price");
}

#[tokio::test]
async fn test_unreadable_listing_is_fatal() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    Mock::given(method("GET"))
        .and(path("/list"))
        .respond_with(ResponseTemplate::new(500).set_body_string("database down"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().expect("Failed to create temp dir");
    let store = FsStore::new(dir.path(), IdentityKey::Url).unwrap();
    let orchestrator = build_orchestrator(&base_url, store);

    let result = orchestrator.run().await;

    assert!(matches!(result, Err(HarvestError::FatalPage { page: 1, .. })));
    assert!(orchestrator.store().read_bulk(10, 0).unwrap().records.is_empty());
}

/// Reads every stored document, sorted by file name
fn read_files(dir: &std::path::Path) -> Vec<(String, Vec<u8>)> {
    let mut files: Vec<_> = std::fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
        .map(|path| {
            (
                path.file_name().unwrap().to_string_lossy().into_owned(),
                std::fs::read(&path).unwrap(),
            )
        })
        .collect();
    files.sort();
    files
}
