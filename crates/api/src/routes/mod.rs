//! Route definitions.
//!
//! ```text
//! GET  /                    -> liveness probe (plain text)
//! GET  /app                 -> batch submission form (HTML)
//! POST /generate-batch      -> run the submission orchestrator
//! POST /webhooks/wavespeed  -> completion webhook (always 200)
//! ```

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::{app_form, generate, health, webhook};
use crate::state::AppState;

/// Build the full route tree.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(health::liveness))
        .route("/app", get(app_form::app_form))
        .route("/generate-batch", post(generate::generate_batch))
        .route("/webhooks/wavespeed", post(webhook::wavespeed_webhook))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
