//! Ordered provider registry: priority order drives the cascading strategy,
//! and is the tie-breaker `alexandria-merge` uses when two providers report
//! the same field with equal confidence (spec §4.2).

use std::sync::Arc;

use crate::traits::MetadataProvider;

pub struct ProviderRegistry {
    providers: Vec<Arc<dyn MetadataProvider>>,
}

impl ProviderRegistry {
    pub fn new(providers: Vec<Arc<dyn MetadataProvider>>) -> Self {
        Self { providers }
    }

    pub fn providers(&self) -> &[Arc<dyn MetadataProvider>] {
        &self.providers
    }

    pub fn by_name(&self, name: &str) -> Option<&Arc<dyn MetadataProvider>> {
        self.providers.iter().find(|p| p.name() == name)
    }
}
