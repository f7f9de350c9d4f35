//! Application state for the HTTP server

use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::config::{Capability, ProviderConfig, ProviderOptions};
use crate::error::Result;
use crate::searcher::DeepSearcher;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    /// Active searcher; replaced wholesale on reconfiguration
    searcher: RwLock<DeepSearcher>,
    /// Serializes reconfigurations so concurrent updates are not lost
    reconfigure: Mutex<()>,
}

impl AppState {
    /// Create state from an initial configuration
    pub fn new(config: ProviderConfig) -> Result<Self> {
        Ok(Self::from_searcher(DeepSearcher::from_config(config)?))
    }

    /// Wrap an existing searcher
    pub fn from_searcher(searcher: DeepSearcher) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                searcher: RwLock::new(searcher),
                reconfigure: Mutex::new(()),
            }),
        }
    }

    /// Current searcher; in-flight requests keep the one they started with
    pub fn searcher(&self) -> DeepSearcher {
        self.inner.searcher.read().clone()
    }

    /// Select a provider and swap in a new registry
    ///
    /// The new provider is constructed before the swap, so a bad selection leaves the
    /// running configuration untouched.
    pub async fn set_provider_config(
        &self,
        capability: &str,
        provider: &str,
        options: ProviderOptions,
    ) -> Result<()> {
        let capability: Capability = capability.parse()?;
        let _guard = self.inner.reconfigure.lock().await;

        let registry = self
            .searcher()
            .registry()
            .with_provider(capability, provider, options)?;
        registry.resolve(capability).await?;

        *self.inner.searcher.write() = DeepSearcher::new(registry);
        tracing::info!("Provider for '{}' set to {}", capability, provider);
        Ok(())
    }
}
