//! Bucket list comparison with readable diffs.

use std::collections::BTreeMap;

use tessera_types::{Bucket, Id};

/// Describes how `actual` differs from `expected`, keyed by bucket id.
///
/// Returns `None` when both lists hold the same buckets (order ignored).
pub fn diff_buckets(expected: &[Bucket], actual: &[Bucket]) -> Option<String> {
    let expected: BTreeMap<Id, &Bucket> = expected.iter().map(|b| (b.id, b)).collect();
    let actual: BTreeMap<Id, &Bucket> = actual.iter().map(|b| (b.id, b)).collect();

    let mut lines = Vec::new();
    for (id, want) in &expected {
        match actual.get(id) {
            None => lines.push(format!("- missing {id}: {want:?}")),
            Some(got) if got != want => {
                lines.push(format!("~ {id}:\n    want {want:?}\n    got  {got:?}"));
            },
            Some(_) => {},
        }
    }
    for (id, got) in &actual {
        if !expected.contains_key(id) {
            lines.push(format!("+ unexpected {id}: {got:?}"));
        }
    }

    if lines.is_empty() { None } else { Some(lines.join("\n")) }
}

/// Asserts that `actual` holds exactly the `expected` buckets.
///
/// # Panics
///
/// Panics with a per-bucket diff when the lists differ.
#[track_caller]
pub fn verify_buckets(expected: &[Bucket], actual: &[Bucket]) {
    if let Some(diff) = diff_buckets(expected, actual) {
        panic!("bucket lists differ:\n{diff}");
    }
}
