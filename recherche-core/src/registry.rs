//! Provider registry and the static tier-to-provider table.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::RechercheError;
use crate::provider::RechercheProvider;
use crate::types::QualityTier;

impl QualityTier {
    /// Provider names this tier runs, in invocation order.
    #[must_use]
    pub const fn provider_names(self) -> &'static [&'static str] {
        match self {
            Self::Standard => &["dataforseo"],
            Self::Premium => &["google_places"],
            Self::Komplett => &["google_places", "dataforseo"],
        }
    }
}

/// Registry mapping provider names to driver instances.
///
/// Rebuilt from runtime credentials at the start of every worker iteration
/// so that admin-updated API keys take effect without a restart.
#[derive(Default)]
pub struct ProviderRegistry {
    providers: HashMap<&'static str, Arc<dyn RechercheProvider>>,
}

impl ProviderRegistry {
    /// Empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a driver under its own name. Idempotent: re-registering a
    /// name replaces the previous instance.
    pub fn register(&mut self, provider: Arc<dyn RechercheProvider>) {
        tracing::debug!(provider = provider.name(), "provider registered");
        self.providers.insert(provider.name(), provider);
    }

    /// Driver instances for a quality tier, in tier order.
    ///
    /// Unregistered names configured for the tier are skipped with a
    /// warning; the lookup fails only when the registered subset is empty.
    ///
    /// # Errors
    /// `NoProviderAvailable` when none of the tier's providers are
    /// registered.
    pub fn providers_for(
        &self,
        tier: QualityTier,
    ) -> Result<Vec<Arc<dyn RechercheProvider>>, RechercheError> {
        let required = tier.provider_names();
        let mut selected = Vec::with_capacity(required.len());
        for name in required {
            match self.providers.get(name) {
                Some(p) => selected.push(Arc::clone(p)),
                None => {
                    tracing::warn!(provider = name, tier = %tier, "provider not registered");
                }
            }
        }
        if selected.is_empty() {
            return Err(RechercheError::NoProviderAvailable {
                tier: tier.as_str().to_string(),
                required: required.iter().map(ToString::to_string).collect(),
            });
        }
        Ok(selected)
    }

    /// Names of all registered providers, sorted for stable logging.
    #[must_use]
    pub fn available(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.providers.keys().copied().collect();
        names.sort_unstable();
        names
    }

    /// Whether no provider is registered at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}
