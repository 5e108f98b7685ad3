//! Application context shared across route handlers via axum state.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use pc_core::config::Config;
use pc_core::DelayPlanner;
use pc_store::FragmentStore;

/// Central state handed to every handler. Cheap to clone.
#[derive(Clone)]
pub struct AppContext {
    /// Read side of the fragment store.
    pub store: Arc<dyn FragmentStore>,
    /// Delayed-start planner built from `delay` config.
    pub planner: DelayPlanner,
    /// Immutable configuration snapshot.
    pub config: Arc<Config>,
    /// Cancelled on shutdown; aborts catch-up waits.
    pub shutdown: CancellationToken,
}

impl AppContext {
    pub fn new(config: Config, store: Arc<dyn FragmentStore>, shutdown: CancellationToken) -> Self {
        Self {
            store,
            planner: DelayPlanner::from(&config.delay),
            config: Arc::new(config),
            shutdown,
        }
    }

    /// Whether to re-read the buffer after a catch-up wait.
    pub fn revalidate(&self) -> bool {
        self.config.delay.revalidate
    }
}
