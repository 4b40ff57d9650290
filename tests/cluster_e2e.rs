//! End-to-end test: one node serving two shards, driven over HTTP.
//!
//! The node calls itself through the same peer protocol it would use for any
//! other server, so this covers the HTTP client and pool, the execution manager,
//! the executor, the merger and the admin surface together.

use search_cluster::config::{NodeConfig, ServerLayout};
use search_cluster::executor::protocol::ClusterReadResponse;
use search_cluster::metrics::MethodCallSnapshot;
use search_cluster::node::Node;
use search_cluster::routing::types::{Server, Shard};
use search_cluster::search::types::SearchResponse;
use search_cluster::status::protocol::CancelResponse;

use serde_json::{Value, json};

async fn start_node() -> (String, Node) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let mut config = NodeConfig::default();
    config.bind = addr;
    config.backpressure.enabled = false;
    config.layout = vec![ServerLayout {
        server: Server::from(addr),
        shards: vec![Shard::new("docs", "0"), Shard::new("docs", "1")],
    }];

    let node = Node::start(config);
    let app = node.router();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{}", addr), node)
}

async fn index(http: &reqwest::Client, base: &str, shard: &str, id: &str, text: &str) {
    let resp = http
        .post(format!("{}/shards/docs/{}/documents", base, shard))
        .json(&json!({"id": id, "text": text}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::CREATED);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_search_and_admin_surface_over_http() {
    // ARRANGE
    let (base, node) = start_node().await;
    let http = reqwest::Client::new();
    index(&http, &base, "0", "d1", "rust async runtime").await;
    index(&http, &base, "0", "d2", "rust borrow checker").await;
    index(&http, &base, "1", "d3", "async rust executor").await;
    index(&http, &base, "1", "d4", "garbage collector").await;

    // ACT: search
    let resp = http
        .post(format!("{}/search/docs", base))
        .json(&json!({"uuid": "e2e-1", "query": {"text": "rust async", "limit": 10}}))
        .send()
        .await
        .unwrap();

    // ASSERT
    assert_eq!(resp.status(), reqwest::StatusCode::OK);
    let found: SearchResponse = resp.json().await.unwrap();
    let ids: Vec<_> = found.hits.iter().map(|h| h.id.as_str()).collect();
    assert_eq!(ids, vec!["d1", "d3", "d2"]);
    assert_eq!(found.total_results, 3);
    assert_eq!(found.shards_answered, 2);

    // ACT + ASSERT: the finished query is visible in the registry
    let ids: Vec<String> = http
        .get(format!("{}/queries/docs/ids", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(ids, vec!["e2e-1".to_string()]);

    let status: Value = http
        .get(format!("{}/queries/docs/e2e-1", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(status["state"], "COMPLETE");

    // ACT + ASSERT: cancelling a finished query is a no-op
    let cancel: CancelResponse = http
        .post(format!("{}/queries/docs/e2e-1/cancel", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(cancel.cancelled, 0);

    // ACT + ASSERT: the executor was timed
    let metrics: Vec<MethodCallSnapshot> = http
        .get(format!("{}/internal/metrics", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(
        metrics
            .iter()
            .any(|m| m.name == "read_indexes_async" && m.invokes >= 1)
    );

    node.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_cluster_reads_of_builtin_commands() {
    // ARRANGE
    let (base, node) = start_node().await;
    let http = reqwest::Client::new();
    let local = base.trim_start_matches("http://").to_string();

    // ACT
    let shards: ClusterReadResponse = http
        .get(format!("{}/cluster/shards/docs", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let servers: ClusterReadResponse = http
        .get(format!("{}/cluster/servers/docs", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    // ASSERT
    assert!(shards.failures.is_empty());
    assert_eq!(shards.values.len(), 2);
    assert_eq!(shards.values["docs/0"], json!(local));
    assert_eq!(shards.values["docs/1"], json!(local));

    assert!(servers.failures.is_empty());
    assert_eq!(servers.values.len(), 1);
    assert_eq!(servers.values[&local]["shards"], 2);

    node.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_search_on_unknown_table_is_not_found() {
    // ARRANGE
    let (base, node) = start_node().await;
    let http = reqwest::Client::new();

    // ACT
    let resp = http
        .post(format!("{}/search/missing", base))
        .json(&json!({"query": {"text": "rust"}}))
        .send()
        .await
        .unwrap();

    // ASSERT
    assert_eq!(resp.status(), reqwest::StatusCode::NOT_FOUND);
    let body: Value = resp.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("missing"));

    node.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_documents_for_unserved_shards_are_rejected() {
    // ARRANGE
    let (base, node) = start_node().await;
    let http = reqwest::Client::new();

    // ACT
    let resp = http
        .post(format!("{}/shards/docs/7/documents", base))
        .json(&json!({"id": "d9", "text": "rust everywhere"}))
        .send()
        .await
        .unwrap();

    // ASSERT
    assert_eq!(resp.status(), reqwest::StatusCode::NOT_FOUND);
    let body: Value = resp.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("docs/7"));
    assert_eq!(node.index.document_count(&Shard::new("docs", "7")), 0);

    node.shutdown().await;
}
