//! Cross-source result fusion and confidence scoring.

use std::collections::HashMap;

use kuroibara_types::{Tier, UniversalEntry, normalize_title};

use crate::fingerprint::fingerprint;

/// Fraction of `{title, description, cover, genres, year, authors}` present
/// on `entry`. Title is always present, so the denominator is 6.
#[must_use]
pub fn field_completeness(entry: &UniversalEntry) -> f64 {
    let mut present = 1.0; // title
    if entry.description.is_some() {
        present += 1.0;
    }
    if entry.cover_url.is_some() {
        present += 1.0;
    }
    if !entry.genres.is_empty() {
        present += 1.0;
    }
    if entry.year.is_some() {
        present += 1.0;
    }
    if !entry.authors.is_empty() {
        present += 1.0;
    }
    present / 6.0
}

/// Per-source-origin confidence: tier weight × field completeness × an
/// exact-title-match boost, clipped to `[0, 1]`.
#[must_use]
pub fn score_origin(tier: Tier, entry: &UniversalEntry, query: &str) -> f64 {
    let completeness = field_completeness(entry);
    let boost = if normalize_title(&entry.title) == normalize_title(query) {
        1.1
    } else {
        1.0
    };
    (tier.weight() * completeness * boost).clamp(0.0, 1.0)
}

struct Merged {
    entry: UniversalEntry,
    best_tier: Tier,
}

fn merge_into(base: &mut Merged, mut other: UniversalEntry, other_tier: Tier) {
    if other.title != base.entry.title {
        base.entry.alternative_titles.insert(other.title.clone());
    }
    base.entry.alternative_titles.append(&mut other.alternative_titles);

    for genre in &other.genres {
        base.entry.add_genre(genre);
    }

    base.entry.nsfw = base.entry.nsfw || other.nsfw;
    for origin in other.source_origins.drain(..) {
        match base
            .entry
            .source_origins
            .iter_mut()
            .find(|o| o.source_id == origin.source_id)
        {
            Some(existing) if origin.confidence > existing.confidence => *existing = origin,
            Some(_) => {}
            None => base.entry.source_origins.push(origin),
        }
    }

    if other_tier.weight() > base.best_tier.weight() {
        if other.description.is_some() {
            base.entry.description = other.description;
        }
        if other.cover_url.is_some() {
            base.entry.cover_url = other.cover_url;
        }
        base.best_tier = other_tier;
    } else {
        base.entry.description = base.entry.description.take().or(other.description);
        base.entry.cover_url = base.entry.cover_url.take().or(other.cover_url);
    }

    if base.entry.year.is_none() {
        base.entry.year = other.year;
    }
    if base.entry.rating.is_none() {
        base.entry.rating = other.rating;
    }
    base.entry.popularity_rank = match (base.entry.popularity_rank, other.popularity_rank) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (Some(a), None) => Some(a),
        (None, b) => b,
    };
    if base.entry.authors.is_empty() {
        base.entry.authors = other.authors;
    }

    base.entry.data_completeness = field_completeness(&base.entry);
}

/// Fuse entries collected from every consulted tier into deduplicated
/// [`UniversalEntry`] records, scoring each contributing source-origin
/// against `query` before merging.
#[must_use]
pub fn fuse(tiered_entries: Vec<(Tier, UniversalEntry)>, query: &str) -> Vec<UniversalEntry> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut merged: Vec<Merged> = Vec::new();

    for (tier, mut entry) in tiered_entries {
        let completeness = field_completeness(&entry);
        entry.data_completeness = completeness;
        for origin in &mut entry.source_origins {
            origin.confidence = score_origin(tier, &entry, query);
        }

        let key = fingerprint(&entry);
        match index.get(&key) {
            Some(&idx) => merge_into(&mut merged[idx], entry, tier),
            None => {
                index.insert(key, merged.len());
                merged.push(Merged {
                    entry,
                    best_tier: tier,
                });
            }
        }
    }

    merged.into_iter().map(|m| m.entry).collect()
}

/// Rank fused entries: max source-origin confidence descending, then
/// data-completeness descending, then title ascending.
pub fn rank(entries: &mut [UniversalEntry]) {
    entries.sort_by(|a, b| {
        b.max_confidence()
        .partial_cmp(&a.max_confidence())
        .unwrap_or(std::cmp::Ordering::Equal)
        .then_with(|| {
            b.data_completeness
            .partial_cmp(&a.data_completeness)
            .unwrap_or(std::cmp::Ordering::Equal)
        })
        .then_with(|| a.title.cmp(&b.title))
    });
}
