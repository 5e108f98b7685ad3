//! Collector and relay wired together over one on-disk store.

mod common;

use std::sync::Arc;
use std::time::Duration;

use pc_collector::{Collector, HttpUpstream};
use pc_core::config::Config;
use pc_server::AppContext;
use pc_store::FsStore;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::SAMPLE_SYNC;

#[tokio::test]
async fn collected_fragments_are_relayed() {
    let upstream_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/sync"))
        .respond_with(ResponseTemplate::new(200).set_body_string(SAMPLE_SYNC))
        .mount(&upstream_server)
        .await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/\d+/(start|full|delta)$"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"payload".to_vec()))
        .mount(&upstream_server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(FsStore::open(dir.path()).await.unwrap());
    let upstream = HttpUpstream::new(upstream_server.uri(), Duration::from_secs(2)).unwrap();
    let cancel = CancellationToken::new();

    let mut collector = Collector::bootstrap(Arc::new(upstream), store.clone(), cancel.clone())
        .await
        .unwrap();
    for _ in 0..3 {
        for handle in collector.tick() {
            handle.await.unwrap().unwrap();
        }
    }
    assert_eq!(collector.cursor(), 103);

    let mut config = Config::default();
    config.delay.fragments = 2;
    let ctx = AppContext::new(config, store, cancel.clone());
    let listener = pc_server::bind("127.0.0.1", 0).await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = tokio::spawn(pc_server::serve(ctx, listener, cancel.clone()));

    let client = reqwest::Client::new();

    let resp = client.get(format!("http://{addr}/102/delta")).send().await.unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(&resp.bytes().await.unwrap()[..], b"payload");

    let resp = client.get(format!("http://{addr}/99/start")).send().await.unwrap();
    assert_eq!(resp.status(), 200);

    let resp = client.get(format!("http://{addr}/103/full")).send().await.unwrap();
    assert_eq!(resp.status(), 404);

    // current = 102, delay 2 -> resume at 100.
    let delayed: serde_json::Value = client
        .get(format!("http://{addr}/current/sync?path=/"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(delayed["fragment"], 100);
    assert_eq!(delayed["tick"], 5000);
    assert_eq!(delayed["token_redirect"], "../");

    cancel.cancel();
    server.await.unwrap().unwrap();
}

#[tokio::test]
async fn collector_run_loop_stops_on_cancel() {
    let upstream_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/sync"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"{"fragment": 10, "tick": 0, "tps": 64, "keyframe_interval": 1,
                "signup_fragment": 9}"#,
        ))
        .mount(&upstream_server)
        .await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/\d+/(start|full|delta)$"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"p".to_vec()))
        .mount(&upstream_server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(FsStore::open(dir.path()).await.unwrap());
    let upstream = HttpUpstream::new(upstream_server.uri(), Duration::from_secs(2)).unwrap();
    let cancel = CancellationToken::new();

    let collector = Collector::bootstrap(Arc::new(upstream), store, cancel.clone())
        .await
        .unwrap();
    let stats = collector.stats();
    let handle = tokio::spawn(collector.run());

    tokio::time::sleep(Duration::from_millis(1500)).await;
    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("collector drains after cancel")
        .unwrap();

    assert!(stats.stored() >= 2);
    assert_eq!(
        std::fs::read_to_string(dir.path().join("current")).unwrap(),
        (10 + stats.stored() / 2 - 1).to_string()
    );
}
