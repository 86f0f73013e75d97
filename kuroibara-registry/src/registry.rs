//! The Source Adapter Registry: loads built-in and community source
//! configuration, resolves each entry to a usable raw [`Source`], and
//! reports (rather than builds middleware around) the result — composing
//! the health gate, proxy, solver, and rate-limit layers around each raw
//! source is the embedding application's job via
//! [`kuroibara_middleware::SourceBuilder`].

use std::path::Path;
use std::sync::Arc;

use kuroibara_core::source::Source;
use kuroibara_types::{AdapterKind, CapabilitySet, ProxyConfig, RateConfig, SourceDescriptor};

use crate::config::{self, ConfigError, SourceConfigFile};
use crate::factory::CustomFactoryRegistry;
use crate::generic_adapter::GenericAdapter;

/// One source resolved by the registry.
pub struct LoadedSource {
    /// The source's immutable identity.
    pub descriptor: Arc<SourceDescriptor>,
    /// The raw adapter, or `None` when the source could not be built.
    pub source: Option<Arc<dyn Source>>,
    /// Why `source` is `None` (requires a solver that isn't configured, an
    /// unresolved custom factory, or a construction error). `None` means
    /// the source loaded successfully.
    pub disabled_reason: Option<String>,
    /// This source's Rate Controller configuration, or `None` to use the process default.
    pub rate: Option<RateConfig>,
    /// This source's Proxy Pool configuration.
    pub proxy: ProxyConfig,
}

impl LoadedSource {
    /// Whether this entry produced a usable adapter.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.source.is_some()
    }
}

fn descriptor_from(entry: &SourceConfigFile) -> Arc<SourceDescriptor> {
    Arc::new(SourceDescriptor {
        id: entry.id.clone(),
        name: entry.name.clone(),
        base_origin: entry.base_origin.clone(),
        tier: entry.tier,
        capabilities: CapabilitySet::new(entry.capabilities.iter().copied()),
        adapter_kind: entry.adapter_kind,
        priority: entry.priority,
        supports_nsfw: entry.supports_nsfw,
        requires_solver: entry.requires_solver,
        config: serde_json::to_value(entry).ok(),
    })
}

fn build_source(
    entry: &SourceConfigFile,
    descriptor: Arc<SourceDescriptor>,
    factories: &CustomFactoryRegistry,
) -> Result<Arc<dyn Source>, String> {
    match entry.adapter_kind {
        AdapterKind::Custom => {
            let class_name = entry.custom_factory.as_deref().unwrap_or("");
            let factory = factories
            .get(class_name)
            .ok_or_else(|| format!("no custom factory registered under '{class_name}'"))?;
            factory.build(descriptor).map_err(|e| e.to_string())
        }
        AdapterKind::Generic | AdapterKind::JavaScript => {
            GenericAdapter::new(descriptor, entry).map(|a| Arc::new(a) as Arc<dyn Source>).map_err(|e| e.to_string())
        }
    }
}

/// Load the merged built-in + community source configuration and resolve
/// every entry to a [`LoadedSource`].
///
/// Invalid config files never block startup (they are reported
/// in the returned [`ConfigError`] list and otherwise ignored), and a
/// `requires_solver` entry with `solver_configured = false` loads with
/// `disabled_reason` set rather than being dropped, so callers can still
/// see it in admin/status listings.
#[must_use]
pub fn load(
    built_in_dir: &Path,
    community_dir: &Path,
    factories: &CustomFactoryRegistry,
    solver_configured: bool,
) -> (Vec<LoadedSource>, Vec<ConfigError>) {
    let (built_in, mut errors) = config::load_dir(built_in_dir);
    let (community, community_errors) = config::load_dir(community_dir);
    errors.extend(community_errors);

    let merged = config::merge(built_in, community);
    let mut loaded = Vec::with_capacity(merged.len());
    for entry in &merged {
        let descriptor = descriptor_from(entry);
        let rate = entry.rate;
        let proxy = entry.proxy.clone();
        if entry.requires_solver && !solver_configured {
            loaded.push(LoadedSource {
                descriptor,
                source: None,
                disabled_reason: Some("requires_solver is set but no Challenge Solver is configured".to_string()),
                rate,
                proxy,
            });
            continue;
        }
        match build_source(entry, Arc::clone(&descriptor), factories) {
            Ok(source) => loaded.push(LoadedSource { descriptor, source: Some(source), disabled_reason: None, rate, proxy }),
            Err(message) => loaded.push(LoadedSource { descriptor, source: None, disabled_reason: Some(message), rate, proxy }),
        }
    }
    (loaded, errors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::Arc as StdArc;

    use kuroibara_mock::MockSourceBuilder;

    struct AlwaysMockFactory;

    impl crate::factory::CustomFactory for AlwaysMockFactory {
        fn build(&self, descriptor: StdArc<SourceDescriptor>) -> Result<StdArc<dyn Source>, kuroibara_types::KuroibaraError> {
            Ok(MockSourceBuilder::new("custom-src").descriptor((*descriptor).clone()).build())
        }
    }

    fn write_config(dir: &Path, file: &str, contents: &str) {
        fs::create_dir_all(dir).unwrap();
        fs::write(dir.join(file), contents).unwrap();
    }

    #[test]
    fn generic_entries_load_and_custom_entries_resolve_via_factory() {
        let root = std::env::temp_dir().join(format!("kuroibara-registry-load-test-{}", std::process::id()));
        let built_in = root.join("built_in");
        let community = root.join("community");
        write_config(
            &built_in,
            "mangadex.json",
            r#"{
 "id": "mangadex", "name": "MangaDex", "base_origin": "https://api.mangadex.org",
 "tier": "Primary", "capabilities": ["Search"], "adapter_kind": "Generic",
 "url_templates": {"search": "/search?q={query}"},
 "extraction": {"html": {"search_items": "div.r", "title": ["h3"], "link": ["a::attr(href)"]}}
 }"#,
        );
        write_config(
            &built_in,
            "legacy-scans.json",
            r#"{
 "id": "legacy-scans", "name": "Legacy Scans", "base_origin": "https://legacy.test",
 "tier": "Secondary", "capabilities": ["Search"], "adapter_kind": "Custom",
 "custom_factory": "AlwaysMockFactory"
 }"#,
        );
        write_config(
            &built_in,
            "js-source.json",
            r#"{
 "id": "js-source", "name": "JS Source", "base_origin": "https://js.test",
 "tier": "Tertiary", "capabilities": ["Search"], "adapter_kind": "JavaScript",
 "requires_solver": true,
 "url_templates": {"search": "/search?q={query}"},
 "extraction": {"html": {"search_items": "div.r", "title": ["h3"], "link": ["a::attr(href)"]}}
 }"#,
        );

        let mut factories = CustomFactoryRegistry::new();
        factories.register("AlwaysMockFactory", StdArc::new(AlwaysMockFactory));

        let (loaded, errors) = load(&built_in, &community, &factories, false);
        fs::remove_dir_all(&root).unwrap();

        assert!(errors.is_empty());
        assert_eq!(loaded.len(), 3);

        let mangadex = loaded.iter().find(|l| l.descriptor.id == "mangadex").unwrap();
        assert!(mangadex.is_enabled());

        let legacy = loaded.iter().find(|l| l.descriptor.id == "legacy-scans").unwrap();
        assert!(legacy.is_enabled());

        let js = loaded.iter().find(|l| l.descriptor.id == "js-source").unwrap();
        assert!(!js.is_enabled());
        assert!(js.disabled_reason.as_deref().unwrap().contains("Challenge Solver"));
    }

    #[test]
    fn an_unregistered_custom_factory_disables_rather_than_panics() {
        let root = std::env::temp_dir().join(format!("kuroibara-registry-missing-factory-{}", std::process::id()));
        write_config(
            &root,
            "orphan.json",
            r#"{
 "id": "orphan", "name": "Orphan", "base_origin": "https://orphan.test",
 "tier": "Secondary", "capabilities": ["Search"], "adapter_kind": "Custom",
 "custom_factory": "NoSuchFactory"
 }"#,
        );
        let empty = root.join("empty");
        let (loaded, _) = load(&root, &empty, &CustomFactoryRegistry::new(), false);
        fs::remove_dir_all(&root).unwrap();
        assert_eq!(loaded.len(), 1);
        assert!(!loaded[0].is_enabled());
        assert!(loaded[0].disabled_reason.as_deref().unwrap().contains("NoSuchFactory"));
    }
}
