//! Idempotent merge of delimited identifier sets.
//!
//! The record store keeps `Seen IDs` and `Failed IDs` as comma-delimited
//! strings. These helpers move between that serialization and a native
//! set. Membership is all that matters; serialization order is
//! irrelevant to correctness (the `BTreeSet` just gives a stable one).

use std::collections::BTreeSet;

/// Parse a comma-delimited identifier string into a set.
///
/// Entries are trimmed; empty entries are dropped, so `""` and
/// `"a,,b, "` parse to what you would expect.
pub fn parse_id_set(raw: &str) -> BTreeSet<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .collect()
}

/// Merge a candidate identifier into an existing delimited set.
///
/// Inserting an identifier that is already a member is a no-op, which
/// makes repeated delivery of the same completion event harmless.
pub fn merge_id_set(existing: &str, candidate: &str) -> BTreeSet<String> {
    let mut set = parse_id_set(existing);
    set.insert(candidate.trim().to_string());
    set
}

/// Serialize a set back to its comma-delimited stored form.
pub fn join_id_set(set: &BTreeSet<String>) -> String {
    set.iter().cloned().collect::<Vec<_>>().join(",")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
