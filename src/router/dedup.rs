//! Evidence deduplication

use std::collections::HashSet;

use super::evidence::EvidenceItem;
use crate::config::MIN_REDUNDANCY_THRESHOLD;

/// Lowercased content with runs of whitespace collapsed.
pub fn normalize(content: &str) -> String {
    content
        .split_whitespace()
        .map(|word| word.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ")
}

fn tokens(content: &str) -> HashSet<String> {
    content
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect()
}

/// Token Jaccard similarity in `[0, 1]`.
pub fn jaccard(a: &str, b: &str) -> f32 {
    let a = tokens(a);
    let b = tokens(b);
    let union = a.union(&b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(&b).count() as f32 / union as f32
}

struct Fingerprint {
    normalized: String,
    tokens: HashSet<String>,
}

impl Fingerprint {
    fn of(item: &EvidenceItem) -> Self {
        Self {
            normalized: normalize(&item.content),
            tokens: tokens(&item.content),
        }
    }

    fn duplicates(&self, other: &Fingerprint, threshold: f32) -> bool {
        if self.normalized == other.normalized {
            return true;
        }
        let union = self.tokens.union(&other.tokens).count();
        if union == 0 {
            return false;
        }
        let shared = self.tokens.intersection(&other.tokens).count();
        shared as f32 / union as f32 >= threshold
    }
}

/// Drop near-duplicate evidence.
///
/// Items are visited from highest to lowest score (ties in input order) and
/// kept unless they duplicate an item already kept. Survivors are returned in
/// their original relative order. `threshold` is raised to
/// [`MIN_REDUNDANCY_THRESHOLD`] when lower.
pub fn dedup(items: Vec<EvidenceItem>, threshold: f32) -> Vec<EvidenceItem> {
    if items.len() < 2 {
        return items;
    }
    let threshold = threshold.clamp(MIN_REDUNDANCY_THRESHOLD, 1.0);

    let fingerprints: Vec<Fingerprint> = items.iter().map(Fingerprint::of).collect();

    let mut by_score: Vec<usize> = (0..items.len()).collect();
    by_score.sort_by(|&a, &b| items[b].rank().total_cmp(&items[a].rank()));

    let mut keep = vec![false; items.len()];
    let mut kept: Vec<usize> = Vec::with_capacity(items.len());
    for idx in by_score {
        let duplicate = kept
            .iter()
            .any(|&k| fingerprints[idx].duplicates(&fingerprints[k], threshold));
        if !duplicate {
            keep[idx] = true;
            kept.push(idx);
        }
    }

    items
        .into_iter()
        .zip(keep)
        .filter_map(|(item, keep)| keep.then_some(item))
        .collect()
}
