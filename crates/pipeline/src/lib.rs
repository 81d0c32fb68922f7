//! Batch lifecycle orchestration: submission, event reconciliation,
//! and the periodic convergence sweep.
//!
//! Consistency model: the record store is the single source of truth,
//! shared between the webhook path and the sweep with no in-process
//! lock. Every mutation re-reads the record immediately before writing
//! and every merge is idempotent, so a lost update window is corrected
//! on the next event or sweep cycle rather than corrupting state.

pub mod context;
pub mod error;
pub mod reconcile;
pub mod submit;
pub mod sweep;

pub use context::PipelineContext;
pub use error::PipelineError;
pub use reconcile::{finalize_if_done, reconcile};
pub use submit::{submit_batch, BatchRequest, SubmittedBatch};
