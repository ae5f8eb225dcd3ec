use crate::config::Config;
use crate::matching::store::RunStore;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    /// Recent runs, kept for CSV download. Evicts oldest past `RUN_RETENTION`.
    pub runs: RunStore,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let runs = RunStore::new(config.run_retention);
        Self { config, runs }
    }
}
