//! Core error taxonomy shared across the workspace.

/// Domain-level errors produced by pure core logic and surfaced by the
/// HTTP layer.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// Input failed validation (bad dimensions, empty prompt, ...).
    #[error("Validation error: {0}")]
    Validation(String),
}
