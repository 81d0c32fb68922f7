//! Liveness probe.

/// GET / -- plain-text liveness check.
///
/// Deliberately touches no collaborators: a 200 here means the process
/// is up and serving, nothing more.
pub async fn liveness() -> &'static str {
    "wavebatch: ok"
}
