use std::sync::Arc;

use wavebatch_pipeline::PipelineContext;

use crate::config::AppConfig;

/// Shared application state available to all Axum handlers via
/// `State<AppState>`. Cheaply cloneable.
#[derive(Clone)]
pub struct AppState {
    /// Pipeline collaborators (record store, generation service,
    /// retry/timeout tunables). The sweep task holds its own clone.
    pub pipeline: PipelineContext,
    /// Server configuration.
    pub config: Arc<AppConfig>,
}
