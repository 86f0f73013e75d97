//! Custom-adapter resolution by factory class name.

use std::collections::HashMap;
use std::sync::Arc;

use kuroibara_core::source::Source;
use kuroibara_types::{KuroibaraError, SourceDescriptor};

/// Builds a hand-written [`Source`] implementation for one `custom`-kind
/// config entry. The embedding application registers one factory per class
/// name it supports; the registry never constructs custom adapters itself.
pub trait CustomFactory: Send + Sync {
    /// Build the source adapter described by `descriptor`.
    ///
    /// # Errors
    /// Returns a [`KuroibaraError`] if the descriptor's `config` blob is
    /// missing fields this factory requires.
    fn build(&self, descriptor: Arc<SourceDescriptor>) -> Result<Arc<dyn Source>, KuroibaraError>;
}

/// Name-keyed registry of [`CustomFactory`] implementations, consulted
/// when loading a `custom_factory`-tagged config entry.
#[derive(Default)]
pub struct CustomFactoryRegistry {
    factories: HashMap<String, Arc<dyn CustomFactory>>,
}

impl CustomFactoryRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `factory` under `class_name`, as referenced by a config
    /// entry's `custom_factory` field.
    pub fn register(&mut self, class_name: impl Into<String>, factory: Arc<dyn CustomFactory>) {
        self.factories.insert(class_name.into(), factory);
    }

    /// Look up the factory registered under `class_name`.
    #[must_use]
    pub fn get(&self, class_name: &str) -> Option<Arc<dyn CustomFactory>> {
        self.factories.get(class_name).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kuroibara_mock::MockSourceBuilder;

    struct EchoFactory;

    impl CustomFactory for EchoFactory {
        fn build(&self, descriptor: Arc<SourceDescriptor>) -> Result<Arc<dyn Source>, KuroibaraError> {
            Ok(MockSourceBuilder::new("custom-src").descriptor((*descriptor).clone()).build())
        }
    }

    #[test]
    fn registers_and_resolves_a_factory_by_name() {
        let mut registry = CustomFactoryRegistry::new();
        registry.register("EchoFactory", Arc::new(EchoFactory));
        assert!(registry.get("EchoFactory").is_some());
        assert!(registry.get("NoSuchFactory").is_none());
    }
}
