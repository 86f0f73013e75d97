//! Cross-source deduplication fingerprint.

use kuroibara_types::{UniversalEntry, normalize_title};

/// Fingerprint used to collapse entries from different sources into one
/// [`UniversalEntry`]: normalized title plus release year, when known.
#[must_use]
pub fn fingerprint(entry: &UniversalEntry) -> String {
    match entry.year {
        Some(year) => format!("{}|{year}", normalize_title(&entry.title)),
        None => normalize_title(&entry.title),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kuroibara_types::{EntryStatus, EntryType};

    fn entry(title: &str, year: Option<i32>) -> UniversalEntry {
        UniversalEntry {
            id: "x".to_string(),
            title: title.to_string(),
            alternative_titles: Default::default(),
            description: None,
            cover_url: None,
            entry_type: EntryType::Manga,
            status: EntryStatus::Unknown,
            year,
            nsfw: false,
            genres: Default::default(),
            authors: Vec::new(),
            rating: None,
            popularity_rank: None,
            source_origins: Vec::new(),
            data_completeness: 0.0,
        }
    }

    #[test]
    fn same_title_and_year_collide_regardless_of_punctuation() {
        let a = fingerprint(&entry("One Piece", Some(1997)));
        let b = fingerprint(&entry("one piece!", Some(1997)));
        assert_eq!(a, b);
    }

    #[test]
    fn different_years_do_not_collide() {
        let a = fingerprint(&entry("One Piece", Some(1997)));
        let b = fingerprint(&entry("One Piece", Some(1999)));
        assert_ne!(a, b);
    }
}
