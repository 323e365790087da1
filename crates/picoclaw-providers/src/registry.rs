use std::collections::HashMap;
use std::sync::Arc;

use crate::provider::ChatProvider;

/// Keyed map from canonical provider name to adapter instance.
///
/// Populated once at startup from configuration. A missing provider is not
/// an error here — the fallback engine treats it as missing credentials and
/// moves on down the chain.
#[derive(Default)]
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn ChatProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, provider: Arc<dyn ChatProvider>) {
        let name = name.into();
        tracing::info!(provider = %name, "registered LLM provider");
        self.providers.insert(name, provider);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn ChatProvider>> {
        self.providers.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.providers.contains_key(name)
    }

    /// Registered provider names, for startup logging.
    pub fn names(&self) -> Vec<&str> {
        self.providers.keys().map(String::as_str).collect()
    }
}
