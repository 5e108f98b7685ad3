//! Shared test harness for integration tests.
//!
//! Provides [`TestHarness`] which wraps an in-memory fragment store, a
//! default config and the relay's [`AppContext`]. [`TestHarness::with_server`]
//! starts axum on a random port for HTTP-level testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tokio_util::sync::CancellationToken;

use pc_core::config::Config;
use pc_core::SyncRecord;
use pc_server::{build_router, AppContext};
use pc_store::{FragmentStore, MemoryStore};

/// Upstream sync JSON used across tests: anchor 100, tick 5000, 30 tps.
pub const SAMPLE_SYNC: &str = r#"{
    "tick": 5000,
    "endtick": 5090,
    "rtdelay": 1.2,
    "fragment": 100,
    "signup_fragment": 99,
    "tps": 30,
    "keyframe_interval": 3,
    "map": "de_mirage",
    "protocol": 5
}"#;

pub fn sample_sync() -> SyncRecord {
    SyncRecord::from_json(SAMPLE_SYNC.as_bytes()).expect("sample sync parses")
}

/// Test harness wrapping an [`AppContext`] backed by a [`MemoryStore`].
pub struct TestHarness {
    pub ctx: AppContext,
    pub store: Arc<MemoryStore>,
}

impl TestHarness {
    /// Harness with default configuration and an empty store.
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Self {
        let store = Arc::new(MemoryStore::new());
        let ctx = AppContext::new(config, store.clone(), CancellationToken::new());
        Self { ctx, store }
    }

    /// Store the sample sync record and, optionally, a current pointer.
    pub async fn seed(&self, current: Option<u64>) {
        self.store.put_sync(&sample_sync()).await.expect("put sync");
        if let Some(n) = current {
            self.store.set_current(n).await.expect("set current");
        }
    }

    pub fn router(&self) -> Router {
        build_router(self.ctx.clone())
    }

    /// Start an axum server on a random port and return the harness together
    /// with the bound socket address.
    pub async fn with_server() -> (Self, SocketAddr) {
        Self::with_server_config(Config::default()).await
    }

    pub async fn with_server_config(config: Config) -> (Self, SocketAddr) {
        let harness = Self::with_config(config);
        let app = harness.router();

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind random port");
        let addr = listener.local_addr().expect("failed to get local addr");

        tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        (harness, addr)
    }
}
