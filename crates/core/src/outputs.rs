//! Append-only accumulation of generated output references.
//!
//! The accumulator performs no deduplication: the reconciler guards it
//! by checking `seen_ids` membership first, so it runs at most once per
//! distinct sub-job completion.

/// Append newly discovered output references to an existing ordered
/// list. Existing entries come first and are never reordered.
pub fn accumulate_outputs(existing: &[String], new: &[String]) -> Vec<String> {
    let mut merged = Vec::with_capacity(existing.len() + new.len());
    merged.extend_from_slice(existing);
    merged.extend_from_slice(new);
    merged
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
