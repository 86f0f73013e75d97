//! Canned manga catalog data used as `MockSource`'s default responses.

use kuroibara_types::{Author, ChapterRef, EntryStatus, EntryType, SourceOrigin, UniversalEntry};

/// A small, deterministic catalog entry used by default-constructed mock
/// sources: a single in-progress manga with three chapters.
#[must_use]
pub fn sample_entry(source_id: &'static str, native_id: &str) -> UniversalEntry {
    UniversalEntry {
        id: format!("{source_id}:{native_id}"),
        title: "Iron Blossom".to_string(),
        alternative_titles: ["鉄の花"].into_iter().map(str::to_string).collect(),
        description: Some(
            "A blacksmith's daughter inherits a war she never asked for.".to_string(),
        ),
        cover_url: Some(format!("https://{source_id}.example/covers/{native_id}.jpg")),
        entry_type: EntryType::Manga,
        status: EntryStatus::Ongoing,
        year: Some(2019),
        nsfw: false,
        genres: ["Action", "Drama"].into_iter().map(str::to_string).collect(),
        authors: vec![Author {
            name: "Rin Asakawa".to_string(),
            role: "story and art".to_string(),
        }],
        rating: Some(8.2),
        popularity_rank: Some(412),
        source_origins: vec![SourceOrigin {
            source_id: source_id.to_string(),
            source_native_id: native_id.to_string(),
            confidence: 1.0,
            nsfw: false,
        }],
        data_completeness: 1.0,
    }
}

/// Three sequential chapters for [`sample_entry`].
#[must_use]
pub fn sample_chapters(source_id: &'static str, native_id: &str) -> Vec<ChapterRef> {
    ["1", "2", "3"]
        .into_iter()
        .map(|number| ChapterRef {
            source_id: source_id.to_string(),
            source_native_id: format!("{native_id}-ch{number}"),
            manga_native_id: native_id.to_string(),
            chapter_number: number.to_string(),
            volume: None,
            title: Some(format!("Chapter {number}")),
            language: "en".to_string(),
            release_date: None,
            page_count: Some(18),
        })
        .collect()
}

/// Four page image URLs for a chapter.
#[must_use]
pub fn sample_pages(source_id: &'static str, chapter_native_id: &str) -> Vec<String> {
    (1..=4)
        .map(|n| format!("https://{source_id}.example/pages/{chapter_native_id}/{n}.jpg"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_entry_satisfies_universal_entry_invariants() {
        let entry = sample_entry("mangadex", "abc-123");
        assert!(entry.invariants_hold());
        assert_eq!(entry.max_confidence(), 1.0);
    }

    #[test]
    fn sample_chapters_are_uniquely_identified() {
        let chapters = sample_chapters("mangadex", "abc-123");
        assert_eq!(chapters.len(), 3);
        let mut ids: Vec<_> = chapters.iter().map(ChapterRef::identity).collect();
        ids.dedup();
        assert_eq!(ids.len(), 3);
    }

    #[test]
    fn sample_pages_are_distinct_urls() {
        let pages = sample_pages("mangadex", "abc-123-ch1");
        assert_eq!(pages.len(), 4);
        assert!(pages.windows(2).all(|w| w[0] != w[1]));
    }
}
