//! The Generic Adapter: a config-driven [`Source`] implementation
//! for HTML- and JSON-API-backed sources with no adapter code of their own.
//!
//! This is the innermost layer of the middleware onion built by
//! [`kuroibara_middleware::SourceBuilder`]. It reads the proxy and
//! solver-token task-locals those outer layers set up ([`current_proxy`],
//! [`current_solved_token`]) rather than taking them as parameters, since
//! the [`Source`] trait's capability methods take no transport context.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use kuroibara_core::source::{
    ChaptersProvider, DetailsProvider, PagesProvider, ProbeProvider, SearchProvider, Source,
};
use kuroibara_middleware::{current_proxy, current_solved_token};
use kuroibara_types::{
    Author, ChapterRef, EntryStatus, EntryType, KuroibaraError, ProxyEntry, ProxyKind,
    SearchRequest, SearchResultPage, SourceAttribution, SourceDescriptor, SourceOrigin, UniversalEntry,
};
use reqwest::Client;
use url::Url;

use crate::config::{ExtractionConfig, SourceConfigFile, UrlTemplates};
use crate::{html, json_path};

/// Fixed confidence assigned to every entry a generic adapter returns: it
/// has no relevance-ranking signal of its own, unlike a hand-written
/// adapter that can expose a search engine's native score.
const GENERIC_ADAPTER_CONFIDENCE: f64 = 0.75;

const CHALLENGE_MARKERS: [&str; 3] = ["cf-browser-verification", "just a moment", "checking your browser"];

fn looks_like_challenge(status: u16, body: &str) -> bool {
    if status == 403 {
        return true;
    }
    let lower = body.to_ascii_lowercase();
    CHALLENGE_MARKERS.iter().any(|m| lower.contains(m))
}

fn data_completeness(entry: &UniversalEntry) -> f64 {
    let fields = [
        true,
        entry.description.is_some(),
        entry.cover_url.is_some(),
        !entry.genres.is_empty(),
        entry.year.is_some(),
        !entry.authors.is_empty(),
    ];
    fields.iter().filter(|f| **f).count() as f64 / fields.len() as f64
}

fn build_proxy(entry: &ProxyEntry) -> Result<reqwest::Proxy, KuroibaraError> {
    let scheme = match entry.kind {
        ProxyKind::Http => "http",
        ProxyKind::Https => "https",
        ProxyKind::Socks4 => "socks4",
        ProxyKind::Socks5 => "socks5",
    };
    let url = if entry.endpoint.contains("://") {
        entry.endpoint.clone()
    } else {
        format!("{scheme}://{}", entry.endpoint)
    };
    let mut proxy = reqwest::Proxy::all(&url)
    .map_err(|e| KuroibaraError::transport(entry.id.clone(), format!("invalid proxy endpoint: {e}")))?;
    if let Some(creds) = &entry.credentials {
        if let Some((user, pass)) = creds.split_once(':') {
            proxy = proxy.basic_auth(user, pass);
        }
    }
    Ok(proxy)
}

/// Config-driven [`Source`] for one generic or javascript-variant entry.
pub struct GenericAdapter {
    descriptor: Arc<SourceDescriptor>,
    /// `descriptor.id`, leaked once at construction to satisfy
    /// `Source::name`'s `&'static str` return (one source per process
    /// lifetime, loaded once at registry startup).
    name: &'static str,
    url_templates: UrlTemplates,
    extraction: ExtractionConfig,
    headers: HashMap<String, String>,
    direct_client: Client,
    proxy_clients: RwLock<HashMap<String, Client>>,
}

impl GenericAdapter {
    /// Build a `GenericAdapter` from a validated config entry.
    ///
    /// # Errors
    /// Returns [`KuroibaraError::InvalidArgument`] if `config` has no
    /// extraction rules (callers should validate with
    /// [`crate::config::validate`] before reaching this point).
    pub fn new(descriptor: Arc<SourceDescriptor>, config: &SourceConfigFile) -> Result<Self, KuroibaraError> {
        let extraction = config.extraction.clone().ok_or_else(|| {
            KuroibaraError::InvalidArgument(format!("{}: generic adapter requires an extraction config", descriptor.id))
        })?;
        let direct_client = Client::builder()
        .build()
        .map_err(|e| KuroibaraError::transport(descriptor.id.clone(), e.to_string()))?;
        let name: &'static str = Box::leak(descriptor.id.clone().into_boxed_str());
        Ok(Self {
            descriptor,
            name,
            url_templates: config.url_templates.clone(),
            extraction,
            headers: config.headers.clone(),
            direct_client,
            proxy_clients: RwLock::new(HashMap::new()),
        })
    }

    fn client_for(&self, proxy: Option<&ProxyEntry>) -> Result<Client, KuroibaraError> {
        let Some(entry) = proxy else {
            return Ok(self.direct_client.clone());
        };
        if let Some(client) = self.proxy_clients.read().unwrap().get(&entry.id) {
            return Ok(client.clone());
        }
        let client = Client::builder()
        .proxy(build_proxy(entry)?)
        .build()
        .map_err(|e| KuroibaraError::transport(self.descriptor.id.clone(), e.to_string()))?;
        self.proxy_clients.write().unwrap().insert(entry.id.clone(), client.clone());
        Ok(client)
    }

    fn resolve_url(&self, template: &str, vars: &[(&str, &str)]) -> Result<String, KuroibaraError> {
        let mut out = template.to_string();
        for (key, value) in vars {
            out = out.replace(
                &format!("{{{key}}}"),
                &url::form_urlencoded::byte_serialize(value.as_bytes()).collect::<String>(),
            );
        }
        if out.starts_with("http://") || out.starts_with("https://") {
            return Ok(out);
        }
        let base = Url::parse(&self.descriptor.base_origin)
        .map_err(|e| KuroibaraError::parse(self.descriptor.id.clone(), format!("invalid base_origin: {e}")))?;
        base.join(&out)
        .map(|u| u.to_string())
        .map_err(|e| KuroibaraError::parse(self.descriptor.id.clone(), format!("invalid resolved url: {e}")))
    }

    async fn fetch(&self, url: &str) -> Result<String, KuroibaraError> {
        let proxy_entry = current_proxy();
        let client = self.client_for(proxy_entry.as_ref())?;
        let mut req = client.get(url);
        for (name, value) in &self.headers {
            req = req.header(name.as_str(), value.as_str());
        }
        if let Some(token) = current_solved_token() {
            req = req.header("x-kuroibara-solver-token", token);
        }
        let resp = req
        .send()
        .await
        .map_err(|e| KuroibaraError::transport(self.descriptor.id.clone(), e.to_string()))?;
        let status = resp.status();
        let body = resp
        .text()
        .await
        .map_err(|e| KuroibaraError::transport(self.descriptor.id.clone(), e.to_string()))?;
        if looks_like_challenge(status.as_u16(), &body) {
            return Err(KuroibaraError::BotChallenge { source: self.descriptor.id.clone() });
        }
        if !status.is_success() {
            return Err(KuroibaraError::transport(self.descriptor.id.clone(), format!("http {status}")));
        }
        Ok(body)
    }

    fn entry_from_html(&self, item: scraper::ElementRef<'_>, selectors: &crate::config::SelectorMap, native_id: &str) -> Option<UniversalEntry> {
        let title = html::extract_first(item, &selectors.title)?;
        let description = html::extract_first(item, &selectors.description);
        let cover_url = html::extract_first(item, &selectors.cover);
        let nsfw = html::any_present(item, &selectors.nsfw_indicator);
        let rating = html::extract_first(item, &selectors.ratings).and_then(|s| s.parse::<f64>().ok());
        Some(self.build_entry(title, description, cover_url, nsfw, rating, native_id))
    }

    fn entry_from_json(&self, item: &serde_json::Value, paths: &crate::config::JsonPathMap, native_id: &str) -> Option<UniversalEntry> {
        let title = json_path::extract_first(item, &paths.title)?;
        let description = json_path::extract_first(item, &paths.description);
        let cover_url = json_path::extract_first(item, &paths.cover);
        let nsfw = json_path::any_present(item, &paths.nsfw_indicator);
        let rating = json_path::extract_first(item, &paths.ratings).and_then(|s| s.parse::<f64>().ok());
        Some(self.build_entry(title, description, cover_url, nsfw, rating, native_id))
    }

    fn build_entry(
        &self,
        title: String,
        description: Option<String>,
        cover_url: Option<String>,
        nsfw: bool,
        rating: Option<f64>,
        native_id: &str,
    ) -> UniversalEntry {
        let origin = SourceOrigin {
            source_id: self.descriptor.id.clone(),
            source_native_id: native_id.to_string(),
            confidence: GENERIC_ADAPTER_CONFIDENCE,
            nsfw,
        };
        let mut entry = UniversalEntry {
            id: format!("{}:{}", self.descriptor.id, native_id),
            title,
            alternative_titles: Default::default(),
            description,
            cover_url,
            entry_type: EntryType::Unknown,
            status: EntryStatus::Unknown,
            year: None,
            nsfw,
            genres: Default::default(),
            authors: Vec::<Author>::new(),
            rating,
            popularity_rank: None,
            source_origins: vec![origin],
            data_completeness: 0.0,
        };
        entry.data_completeness = data_completeness(&entry);
        entry
    }
}

impl Source for GenericAdapter {
    fn name(&self) -> &'static str {
        self.name
    }

    fn descriptor(&self) -> Arc<SourceDescriptor> {
        Arc::clone(&self.descriptor)
    }

    fn as_search_provider(&self) -> Option<&dyn SearchProvider> {
        self.descriptor
        .supports(kuroibara_types::Capability::Search)
        .then_some(self as &dyn SearchProvider)
    }

    fn as_details_provider(&self) -> Option<&dyn DetailsProvider> {
        self.descriptor
        .supports(kuroibara_types::Capability::Details)
        .then_some(self as &dyn DetailsProvider)
    }

    fn as_chapters_provider(&self) -> Option<&dyn ChaptersProvider> {
        self.descriptor
        .supports(kuroibara_types::Capability::Chapters)
        .then_some(self as &dyn ChaptersProvider)
    }

    fn as_pages_provider(&self) -> Option<&dyn PagesProvider> {
        self.descriptor
        .supports(kuroibara_types::Capability::Pages)
        .then_some(self as &dyn PagesProvider)
    }

    fn as_probe_provider(&self) -> Option<&dyn ProbeProvider> {
        Some(self as &dyn ProbeProvider)
    }
}

#[async_trait]
impl SearchProvider for GenericAdapter {
    async fn search(&self, request: &SearchRequest) -> Result<SearchResultPage, KuroibaraError> {
        let template = self.url_templates.search.as_deref().ok_or_else(|| {
            KuroibaraError::unsupported("search")
        })?;
        let url = self.resolve_url(
            template,
            &[("query", request.query.as_str()), ("page", &request.page.to_string())],
        )?;
        let body = self.fetch(&url).await?;

        let mut results = Vec::new();
        match &self.extraction {
            ExtractionConfig::Html(selectors) => {
                let scrubbed = html::scrub(&body);
                let doc = html::parse_document(&scrubbed);
                for item in html::select_items(&doc, &selectors.search_items) {
                    let Some(native_id) = html::extract_first(item, &selectors.link) else { continue };
                    if let Some(entry) = self.entry_from_html(item, selectors, &native_id) {
                        results.push(entry);
                    }
                }
            }
            ExtractionConfig::Json(paths) => {
                let root: serde_json::Value = serde_json::from_str(&body)
                .map_err(|e| KuroibaraError::parse(self.descriptor.id.clone(), e.to_string()))?;
                for item in json_path::select_items(&root, &paths.search_items) {
                    let Some(native_id) = json_path::extract_first(item, &paths.link) else { continue };
                    if let Some(entry) = self.entry_from_json(item, paths, &native_id) {
                        results.push(entry);
                    }
                }
            }
        }

        let total_estimate = results.len();
        let confidence_min = results.iter().map(UniversalEntry::max_confidence).fold(f64::MAX, f64::min);
        let confidence_max = results.iter().map(UniversalEntry::max_confidence).fold(0.0, f64::max);
        let sources = if results.is_empty() {
            Vec::new()
        } else {
            vec![SourceAttribution {
                name: self.descriptor.name.clone(),
                tier: self.descriptor.tier,
                count: results.len(),
                confidence_min,
                confidence_max,
            }]
        };
        Ok(SearchResultPage {
            results,
            total_estimate,
            page: request.page,
            page_size: request.page_size,
            has_next: false,
            sources,
            failures: Vec::new(),
            cache_hit: false,
            source_latencies_ms: Vec::new(),
        })
    }
}

#[async_trait]
impl DetailsProvider for GenericAdapter {
    async fn details(&self, native_id: &str) -> Result<UniversalEntry, KuroibaraError> {
        let template = self.url_templates.details.as_deref().ok_or_else(|| KuroibaraError::unsupported("details"))?;
        let url = self.resolve_url(template, &[("native_id", native_id)])?;
        let body = self.fetch(&url).await?;
        match &self.extraction {
            ExtractionConfig::Html(selectors) => {
                let scrubbed = html::scrub(&body);
                let doc = html::parse_document(&scrubbed);
                self.entry_from_html(doc.root_element(), selectors, native_id)
            }
            ExtractionConfig::Json(paths) => {
                let root: serde_json::Value = serde_json::from_str(&body)
                .map_err(|e| KuroibaraError::parse(self.descriptor.id.clone(), e.to_string()))?;
                self.entry_from_json(&root, paths, native_id)
            }
        }
        .ok_or_else(|| KuroibaraError::parse(self.descriptor.id.clone(), "details page missing required title field"))
    }
}

#[async_trait]
impl ChaptersProvider for GenericAdapter {
    async fn chapters(&self, native_id: &str) -> Result<Vec<ChapterRef>, KuroibaraError> {
        let template = self.url_templates.chapters.as_deref().ok_or_else(|| KuroibaraError::unsupported("chapters"))?;
        let url = self.resolve_url(template, &[("native_id", native_id)])?;
        let body = self.fetch(&url).await?;
        let identifiers = match &self.extraction {
            ExtractionConfig::Html(selectors) => {
                let scrubbed = html::scrub(&body);
                let doc = html::parse_document(&scrubbed);
                html::extract_all(doc.root_element(), &selectors.chapters)
            }
            ExtractionConfig::Json(paths) => {
                let root: serde_json::Value = serde_json::from_str(&body)
                .map_err(|e| KuroibaraError::parse(self.descriptor.id.clone(), e.to_string()))?;
                json_path::extract_all(&root, &paths.chapters)
            }
        };
        Ok(identifiers
            .into_iter()
            .enumerate()
            .map(|(idx, source_native_id)| ChapterRef {
                source_id: self.descriptor.id.clone(),
                source_native_id,
                manga_native_id: native_id.to_string(),
                chapter_number: (idx + 1).to_string(),
                volume: None,
                title: None,
                language: "en".to_string(),
                release_date: None,
                page_count: None,
            })
            .collect())
    }
}

#[async_trait]
impl PagesProvider for GenericAdapter {
    async fn pages(&self, chapter_native_id: &str) -> Result<Vec<String>, KuroibaraError> {
        let template = self.url_templates.pages.as_deref().ok_or_else(|| KuroibaraError::unsupported("pages"))?;
        let url = self.resolve_url(template, &[("native_id", chapter_native_id)])?;
        let body = self.fetch(&url).await?;
        let raw = match &self.extraction {
            ExtractionConfig::Html(selectors) => {
                let scrubbed = html::scrub(&body);
                let doc = html::parse_document(&scrubbed);
                html::extract_all(doc.root_element(), &selectors.pages)
            }
            ExtractionConfig::Json(paths) => {
                let root: serde_json::Value = serde_json::from_str(&body)
                .map_err(|e| KuroibaraError::parse(self.descriptor.id.clone(), e.to_string()))?;
                json_path::extract_all(&root, &paths.pages)
            }
        };
        raw.into_iter().map(|url| self.resolve_url(&url, &[])).collect()
    }
}

#[async_trait]
impl ProbeProvider for GenericAdapter {
    async fn probe(&self) -> Result<(), KuroibaraError> {
        let template = self
        .url_templates
        .search
        .as_deref()
        .or(self.url_templates.details.as_deref())
        .ok_or_else(|| KuroibaraError::unsupported("probe"))?;
        let url = self.resolve_url(template, &[("query", ""), ("page", "1"), ("native_id", "")])?;
        self.fetch(&url).await.map(|_| ())
    }
}
