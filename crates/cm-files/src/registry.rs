//! Provider registry

use std::sync::Arc;

use crate::provider::FileServiceProvider;

/// Set of configured providers plus the default every operation routes to
#[derive(Clone)]
pub struct ProviderRegistry {
    providers: Vec<Arc<dyn FileServiceProvider>>,
    default_provider: Arc<dyn FileServiceProvider>,
}

impl ProviderRegistry {
    pub fn new(default_provider: Arc<dyn FileServiceProvider>) -> Self {
        Self {
            providers: vec![default_provider.clone()],
            default_provider,
        }
    }

    /// Register an additional provider
    pub fn register(mut self, provider: Arc<dyn FileServiceProvider>) -> Self {
        self.providers.push(provider);
        self
    }

    /// Provider handling the next operation. Always the default one.
    pub fn select(&self) -> &Arc<dyn FileServiceProvider> {
        &self.default_provider
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn FileServiceProvider>> {
        self.providers.iter().find(|p| p.name() == name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.names())
            .field("default", &self.default_provider.name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::MemoryFileServiceProvider;

    #[test]
    fn test_select_returns_default() {
        let registry = ProviderRegistry::new(Arc::new(MemoryFileServiceProvider::named("primary")))
            .register(Arc::new(MemoryFileServiceProvider::named("archive")));

        assert_eq!(registry.select().name(), "primary");
        assert_eq!(registry.names(), vec!["primary", "archive"]);
        assert_eq!(registry.get("archive").map(|p| p.name()), Some("archive"));
        assert!(registry.get("s3").is_none());
    }
}
