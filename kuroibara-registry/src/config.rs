//! Source configuration file format: the on-disk shape merged
//! from the built-in and community config directories at startup.
//!
//! Each file is a single JSON object describing one source. `adapter_kind`
//! selects how the rest of the document is interpreted: `"custom"` sources
//! carry only identity fields plus a `custom_factory` class name resolved
//! against a [`crate::factory::CustomFactoryRegistry`]; `"generic"` and
//! `"javascript"` sources additionally carry `url_templates` and either
//! `selectors` (HTML) or `json_paths` (JSON API), which the
//! [`crate::generic_adapter::GenericAdapter`] interprets directly.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use kuroibara_types::{AdapterKind, Capability, ProxyConfig, RateConfig};
use serde::{Deserialize, Serialize};

/// A fallback chain of extraction expressions for one field: the first
/// expression to yield a non-empty result wins.
pub type FallbackChain = Vec<String>;

/// URL templates for the four capability operations, with `{query}`,
/// `{page}`, and `{native_id}` placeholders substituted by the adapter.
/// Resolved against `base_origin` when not already absolute.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UrlTemplates {
    /// Template for `Search(query, page, limit)`.
    pub search: Option<String>,
    /// Template for `Details(native_id)`.
    pub details: Option<String>,
    /// Template for `Chapters(native_id)`.
    pub chapters: Option<String>,
    /// Template for `Pages(chapter_native_id)`.
    pub pages: Option<String>,
}

/// CSS-selector extraction rules for an HTML-format generic adapter
///. Every expression is either a bare CSS selector (the element's
/// trimmed text content) or `selector::attr(name)` (the named attribute).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SelectorMap {
    /// CSS selector for the repeating search-result container. Required.
    pub search_items: String,
    /// Fallback chain for the result title, relative to each item. Required.
    pub title: FallbackChain,
    /// Fallback chain for the result's native-id-bearing link. Required.
    pub link: FallbackChain,
    /// Fallback chain for the cover image URL.
    #[serde(default)]
    pub cover: FallbackChain,
    /// Fallback chain for the synopsis/description.
    #[serde(default)]
    pub description: FallbackChain,
    /// Fallback chain whose mere presence flags the entry NSFW.
    #[serde(default)]
    pub nsfw_indicator: FallbackChain,
    /// Fallback chain for a numeric rating.
    #[serde(default)]
    pub ratings: FallbackChain,
    /// Fallback chain for chapter rows on a details page.
    #[serde(default)]
    pub chapters: FallbackChain,
    /// Fallback chain for page image URLs on a chapter page.
    #[serde(default)]
    pub pages: FallbackChain,
}

impl SelectorMap {
    /// Required-key presence check run at load time.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        !self.search_items.trim().is_empty() && !self.title.is_empty() && !self.link.is_empty()
    }
}

/// Dot/bracket JSON-path extraction rules for a JSON-API-format generic
/// adapter, the API-response analogue of [`SelectorMap`]. Paths are
/// evaluated by [`crate::json_path`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JsonPathMap {
    /// Path to the array of search-result items in the response body. Required.
    pub search_items: String,
    /// Fallback chain for the title, relative to each item. Required.
    pub title: FallbackChain,
    /// Fallback chain for the native-id-bearing field. Required.
    pub link: FallbackChain,
    /// Fallback chain for the cover image URL.
    #[serde(default)]
    pub cover: FallbackChain,
    /// Fallback chain for the synopsis/description.
    #[serde(default)]
    pub description: FallbackChain,
    /// Fallback chain for a boolean/string NSFW indicator field.
    #[serde(default)]
    pub nsfw_indicator: FallbackChain,
    /// Fallback chain for a numeric rating.
    #[serde(default)]
    pub ratings: FallbackChain,
    /// Fallback chain to the chapter array on a details response.
    #[serde(default)]
    pub chapters: FallbackChain,
    /// Fallback chain to the page-url array on a chapter response.
    #[serde(default)]
    pub pages: FallbackChain,
}

impl JsonPathMap {
    /// Required-key presence check, mirroring [`SelectorMap::is_valid`].
    #[must_use]
    pub fn is_valid(&self) -> bool {
        !self.search_items.trim().is_empty() && !self.title.is_empty() && !self.link.is_empty()
    }
}

/// Either extraction scheme a generic/javascript adapter can use,
/// depending on whether the source returns HTML or JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionConfig {
    /// CSS-selector extraction over an HTML response.
    Html(SelectorMap),
    /// JSON-path extraction over a JSON response.
    Json(JsonPathMap),
}

/// One source's on-disk configuration entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfigFile {
    /// Stable unique identifier, e.g. `"mangadex"`.
    pub id: String,
    /// Human-readable display name.
    pub name: String,
    /// Base origin, e.g. `"https://api.mangadex.org"`.
    pub base_origin: String,
    /// Fallback tier.
    pub tier: kuroibara_types::Tier,
    /// Declared capabilities.
    pub capabilities: Vec<Capability>,
    /// How the source is implemented.
    pub adapter_kind: AdapterKind,
    /// Dispatch priority; lower values are tried first within a tier.
    #[serde(default)]
    pub priority: i32,
    /// Whether the source may legitimately return NSFW-flagged entries.
    #[serde(default)]
    pub supports_nsfw: bool,
    /// Whether outbound calls must route through the Challenge Solver.
    #[serde(default)]
    pub requires_solver: bool,
    /// Class name resolved via [`crate::factory::CustomFactoryRegistry`].
    /// Required (and only meaningful) for `adapter_kind = "custom"`.
    #[serde(default)]
    pub custom_factory: Option<String>,
    /// Per-operation URL templates. Required for `generic`/`javascript`.
    #[serde(default)]
    pub url_templates: UrlTemplates,
    /// Extraction rules. Required for `generic`/`javascript`.
    #[serde(default)]
    pub extraction: Option<ExtractionConfig>,
    /// Extra headers sent with every request (e.g. an API key).
    #[serde(default)]
    pub headers: HashMap<String, String>,
    /// Rate Controller configuration for this source. Falls back to the process default
    /// (`KuroibaraConfig::default_rate`) when omitted.
    #[serde(default)]
    pub rate: Option<RateConfig>,
    /// Proxy Pool configuration for this source. An absent or empty entry
    /// list means direct connections only.
    #[serde(default)]
    pub proxy: ProxyConfig,
}

/// Why a [`SourceConfigFile`] was rejected at load time.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// The file's contents did not parse as a `SourceConfigFile`.
    #[error("{path}: malformed source config: {message}")]
    Malformed {
        /// Path of the offending file.
        path: String,
        /// Serde error text.
        message: String,
    },
    /// The entry parsed but failed a semantic check (missing required
    /// selector/path keys, custom kind without a factory name, etc.).
    #[error("{id}: {message}")]
    Invalid {
        /// The entry's declared id.
        id: String,
        /// Human-readable validation failure.
        message: String,
    },
}

/// Validate a parsed entry against its adapter-kind-specific requirements.
/// Called by both the directory loader and anyone constructing a
/// `SourceConfigFile` programmatically.
pub fn validate(entry: &SourceConfigFile) -> Result<(), ConfigError> {
    match entry.adapter_kind {
        AdapterKind::Custom => {
            if entry.custom_factory.as_deref().unwrap_or("").trim().is_empty() {
                return Err(ConfigError::Invalid {
                    id: entry.id.clone(),
                    message: "custom adapter_kind requires custom_factory".to_string(),
                });
            }
        }
        AdapterKind::Generic | AdapterKind::JavaScript => match &entry.extraction {
            Some(ExtractionConfig::Html(m)) if m.is_valid() => {}
            Some(ExtractionConfig::Json(m)) if m.is_valid() => {}
            Some(_) => {
                return Err(ConfigError::Invalid {
                    id: entry.id.clone(),
                    message: "extraction config missing required search_items/title/link".to_string(),
                });
            }
            None => {
                return Err(ConfigError::Invalid {
                    id: entry.id.clone(),
                    message: "generic/javascript adapter_kind requires an extraction config".to_string(),
                });
            }
        },
    }
    if entry.url_templates.search.is_none() && entry.adapter_kind != AdapterKind::Custom {
        return Err(ConfigError::Invalid {
            id: entry.id.clone(),
            message: "missing url_templates.search".to_string(),
        });
    }
    Ok(())
}

/// Parse and validate one config file's contents.
///
/// # Errors
/// Returns [`ConfigError::Malformed`] on a JSON parse failure or
/// [`ConfigError::Invalid`] when semantic validation fails.
pub fn parse_source_config(path: &str, contents: &str) -> Result<SourceConfigFile, ConfigError> {
    let entry: SourceConfigFile = serde_json::from_str(contents).map_err(|e| ConfigError::Malformed {
        path: path.to_string(),
        message: e.to_string(),
    })?;
    validate(&entry)?;
    Ok(entry)
}

/// Load every `*.json` file directly inside `dir` as a source config.
///
/// A directory that does not exist yields no entries (the
/// built-in set is allowed to have no community overlay) and any file that
/// fails to parse or validate is skipped rather than aborting the load;
/// callers that want to surface skip reasons can inspect the returned
/// error list.
#[must_use]
pub fn load_dir(dir: &Path) -> (Vec<SourceConfigFile>, Vec<ConfigError>) {
    let mut entries = Vec::new();
    let mut errors = Vec::new();
    let Ok(read_dir) = fs::read_dir(dir) else {
        return (entries, errors);
    };
    let mut paths: Vec<_> = read_dir.filter_map(|e| e.ok().map(|e| e.path())).collect();
    paths.sort();
    for path in paths {
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        let path_str = path.display().to_string();
        match fs::read_to_string(&path) {
            Ok(contents) => match parse_source_config(&path_str, &contents) {
                Ok(entry) => entries.push(entry),
                Err(e) => errors.push(e),
            },
            Err(e) => errors.push(ConfigError::Malformed { path: path_str, message: e.to_string() }),
        }
    }
    (entries, errors)
}

/// Merge built-in and community entries, community winning on a duplicate
/// `id`.
#[must_use]
pub fn merge(built_in: Vec<SourceConfigFile>, community: Vec<SourceConfigFile>) -> Vec<SourceConfigFile> {
    let mut by_id: HashMap<String, SourceConfigFile> =
    built_in.into_iter().map(|e| (e.id.clone(), e)).collect();
    for entry in community {
        by_id.insert(entry.id.clone(), entry);
    }
    let mut merged: Vec<SourceConfigFile> = by_id.into_values().collect();
    merged.sort_by(|a, b| a.id.cmp(&b.id));
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    fn generic_json(id: &str) -> String {
        format!(
            r#"{{
 "id": "{id}",
 "name": "Example",
 "base_origin": "https://example.test",
 "tier": "Primary",
 "capabilities": ["Search", "Details"],
 "adapter_kind": "Generic",
 "url_templates": {{"search": "/search?q={{query}}&page={{page}}"}},
 "extraction": {{"html": {{
 "search_items": "div.result",
 "title": ["h3.title"],
 "link": ["a.title::attr(href)"]
 }}}}
 }}"#
        )
    }

    #[test]
    fn parses_a_well_formed_generic_entry() {
        let entry = parse_source_config("test", &generic_json("mangadex")).unwrap();
        assert_eq!(entry.id, "mangadex");
        assert!(matches!(entry.adapter_kind, AdapterKind::Generic));
    }

    #[test]
    fn rejects_generic_entry_missing_required_selector_keys() {
        let bad = r#"{
 "id": "broken",
 "name": "Broken",
 "base_origin": "https://example.test",
 "tier": "Primary",
 "capabilities": ["Search"],
 "adapter_kind": "Generic",
 "url_templates": {"search": "/search"},
 "extraction": {"html": {"search_items": "", "title": [], "link": []}}
 }"#;
        assert!(matches!(parse_source_config("test", bad), Err(ConfigError::Invalid {.. })));
    }

    #[test]
    fn rejects_custom_entry_without_a_factory_name() {
        let bad = r#"{
 "id": "custom-src",
 "name": "Custom",
 "base_origin": "https://example.test",
 "tier": "Secondary",
 "capabilities": ["Search"],
 "adapter_kind": "Custom"
 }"#;
        assert!(matches!(parse_source_config("test", bad), Err(ConfigError::Invalid {.. })));
    }

    #[test]
    fn malformed_json_is_reported_as_malformed() {
        assert!(matches!(parse_source_config("test", "{not json"), Err(ConfigError::Malformed {.. })));
    }

    #[test]
    fn community_entries_win_merge_on_duplicate_id() {
        let mut built_in: SourceConfigFile = serde_json::from_str(&generic_json("mangadex")).unwrap();
        built_in.priority = 0;
        let mut community: SourceConfigFile = serde_json::from_str(&generic_json("mangadex")).unwrap();
        community.priority = 99;
        let merged = merge(vec![built_in], vec![community]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].priority, 99);
    }

    #[test]
    fn load_dir_skips_invalid_files_without_failing() {
        let dir = std::env::temp_dir().join(format!("kuroibara-registry-test-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("good.json"), generic_json("good-source")).unwrap();
        fs::write(dir.join("bad.json"), "{not json").unwrap();
        let (entries, errors) = load_dir(&dir);
        fs::remove_dir_all(&dir).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].id, "good-source");
        assert_eq!(errors.len(), 1);
    }
}
