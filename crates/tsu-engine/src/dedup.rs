//! Cross-source merge and per-store diff, both keyed by fingerprint.

use std::collections::HashSet;

use tsu_core::{Certificate, Fingerprint};

/// Merge per-source batches into one candidate pool.
///
/// Batches are concatenated in order and reduced to unique fingerprints;
/// the first occurrence wins, so its `origin` is the one reported.
pub fn merge_candidates<I>(batches: I) -> Vec<Certificate>
where
    I: IntoIterator,
    I::Item: IntoIterator<Item = Certificate>,
{
    let mut seen = HashSet::new();
    batches
        .into_iter()
        .flatten()
        .filter(|c| seen.insert(c.fingerprint.clone()))
        .collect()
}

/// Split `candidates` against a store's `current` listing.
///
/// Returns `(to_add, already_present)`, each in candidate order.
pub fn diff<'a>(
    current: &[Certificate],
    candidates: &'a [Certificate],
) -> (Vec<&'a Certificate>, Vec<&'a Certificate>) {
    let present: HashSet<&Fingerprint> = current.iter().map(|c| &c.fingerprint).collect();
    candidates
        .iter()
        .partition(|c| !present.contains(&c.fingerprint))
}
