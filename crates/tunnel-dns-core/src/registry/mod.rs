//! Plugin-based registry
//!
//! The registry allows line sources and DNS updaters to be registered
//! dynamically at runtime, avoiding hardcoded if-else chains.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use tunnel_dns_core::Registry;
//!
//! let registry = Registry::new();
//! tunnel_dns_process::register(&registry);
//! tunnel_dns_cloudflare::register(&registry);
//!
//! let source = registry.create_line_source(&config.tunnel)?;
//! let updater = registry.create_updater(&config.provider)?;
//! ```

use crate::config::{ProviderConfig, TunnelConfig};
use crate::error::{Error, Result};
use crate::traits::{DnsUpdater, DnsUpdaterFactory, LineSource, LineSourceFactory};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

/// Registry of line source and DNS updater factories
///
/// ## Thread Safety
///
/// The registry uses interior mutability with RwLock, allowing concurrent
/// reads and exclusive writes.
#[derive(Default)]
pub struct Registry {
    /// Registered DNS updater factories
    updaters: RwLock<HashMap<String, Box<dyn DnsUpdaterFactory>>>,

    /// Registered line source factories
    line_sources: RwLock<HashMap<String, Box<dyn LineSourceFactory>>>,
}

impl Registry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a DNS updater factory
    ///
    /// # Parameters
    ///
    /// - `name`: Provider type name (e.g., "cloudflare")
    /// - `factory`: Factory object for creating updater instances
    pub fn register_updater(&self, name: impl Into<String>, factory: Box<dyn DnsUpdaterFactory>) {
        let mut updaters = self.updaters.write().unwrap_or_else(PoisonError::into_inner);
        updaters.insert(name.into(), factory);
    }

    /// Register a line source factory
    ///
    /// # Parameters
    ///
    /// - `name`: Line source type name (e.g., "process")
    /// - `factory`: Factory object for creating line source instances
    pub fn register_line_source(
        &self,
        name: impl Into<String>,
        factory: Box<dyn LineSourceFactory>,
    ) {
        let mut sources = self
            .line_sources
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        sources.insert(name.into(), factory);
    }

    /// Create a DNS updater from configuration
    ///
    /// # Returns
    ///
    /// - `Ok(Box<dyn DnsUpdater>)`: Created updater instance
    /// - `Err(Error)`: If the provider type is not registered or creation fails
    pub fn create_updater(&self, config: &ProviderConfig) -> Result<Box<dyn DnsUpdater>> {
        let provider_type = config.type_name();
        let updaters = self.updaters.read().unwrap_or_else(PoisonError::into_inner);

        let factory = updaters
            .get(provider_type)
            .ok_or_else(|| Error::config(format!("Unknown provider type: {}", provider_type)))?;

        factory.create(config)
    }

    /// Create a line source from configuration
    ///
    /// # Returns
    ///
    /// - `Ok(Box<dyn LineSource>)`: Created line source instance
    /// - `Err(Error)`: If the source type is not registered or creation fails
    pub fn create_line_source(&self, config: &TunnelConfig) -> Result<Box<dyn LineSource>> {
        let source_type = config.type_name();
        let sources = self
            .line_sources
            .read()
            .unwrap_or_else(PoisonError::into_inner);

        let factory = sources
            .get(source_type)
            .ok_or_else(|| Error::config(format!("Unknown line source type: {}", source_type)))?;

        factory.create(config)
    }

    /// List all registered provider types
    pub fn list_updaters(&self) -> Vec<String> {
        let updaters = self.updaters.read().unwrap_or_else(PoisonError::into_inner);
        updaters.keys().cloned().collect()
    }

    /// List all registered line source types
    pub fn list_line_sources(&self) -> Vec<String> {
        let sources = self
            .line_sources
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        sources.keys().cloned().collect()
    }

    /// Check if a provider type is registered
    pub fn has_updater(&self, name: &str) -> bool {
        let updaters = self.updaters.read().unwrap_or_else(PoisonError::into_inner);
        updaters.contains_key(name)
    }

    /// Check if a line source type is registered
    pub fn has_line_source(&self, name: &str) -> bool {
        let sources = self
            .line_sources
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        sources.contains_key(name)
    }
}
