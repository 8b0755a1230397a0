//! Capability provider registry.
//!
//! Maps each `CapabilityKind` to the provider backing it. The relay looks
//! capabilities up here at session start; registration happens once during
//! startup from configuration.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::capability::kinds::CapabilityKind;
use crate::capability::mock::{MockCapability, MockConfig};
use crate::capability::traits::SharedCapability;
use crate::error::{Error, Result};

// ─────────────────────────────────────────────────────────────────
// Capability Factory
// ─────────────────────────────────────────────────────────────────

/// Factory for creating capability providers by name.
pub struct CapabilityFactory;

impl CapabilityFactory {
    /// Provider names this build can create.
    pub const PROVIDERS: &'static [&'static str] = &["mock"];

    /// Create a capability of the given kind from the named provider.
    pub fn create(provider: &str, kind: CapabilityKind) -> Result<SharedCapability> {
        Self::create_with_mock_config(provider, kind, MockConfig::default())
    }

    /// Create a capability, passing mock configuration through when the
    /// provider is the mock one.
    pub fn create_with_mock_config(
        provider: &str,
        kind: CapabilityKind,
        mock_config: MockConfig,
    ) -> Result<SharedCapability> {
        match provider {
            "mock" => Ok(Arc::new(MockCapability::with_config(kind, mock_config))),
            other => Err(Error::NotSupported(format!(
                "Unknown capability provider '{}'. Valid: {}",
                other,
                Self::PROVIDERS.join(", ")
            ))),
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Capability Registry
// ─────────────────────────────────────────────────────────────────

/// Registry of capability providers keyed by kind.
pub struct CapabilityRegistry {
    capabilities: RwLock<HashMap<CapabilityKind, SharedCapability>>,
}

impl CapabilityRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            capabilities: RwLock::new(HashMap::new()),
        }
    }

    /// Create a registry with every kind backed by the named provider.
    pub fn with_provider(provider: &str) -> Result<Self> {
        let registry = Self::new();
        for kind in CapabilityKind::all() {
            registry.register(provider, *kind)?;
        }
        Ok(registry)
    }

    /// Register a provider for a kind, replacing any existing one.
    pub fn register(&self, provider: &str, kind: CapabilityKind) -> Result<()> {
        let capability = CapabilityFactory::create(provider, kind)?;
        self.register_arc(kind, capability);
        Ok(())
    }

    /// Register a pre-built capability instance.
    ///
    /// Use this for providers that need constructor arguments beyond the
    /// provider name (e.g. a mock with failure injection).
    pub fn register_arc(&self, kind: CapabilityKind, capability: SharedCapability) {
        let provider = capability.provider().to_string();
        self.capabilities.write().insert(kind, capability);

        tracing::info!(
            capability = %kind,
            provider = %provider,
            "Capability registered"
        );
    }

    /// Remove the provider for a kind.
    pub fn unregister(&self, kind: CapabilityKind) {
        self.capabilities.write().remove(&kind);
    }

    /// Look up the provider for a kind.
    pub fn get(&self, kind: CapabilityKind) -> Option<SharedCapability> {
        self.capabilities.read().get(&kind).cloned()
    }

    /// Look up the provider for a kind, failing if none is registered.
    pub fn require(&self, kind: CapabilityKind) -> Result<SharedCapability> {
        self.get(kind).ok_or_else(|| Error::CapabilityNotRegistered {
            name: kind.slug().to_string(),
        })
    }

    /// All kinds with a registered provider.
    pub fn registered_kinds(&self) -> Vec<CapabilityKind> {
        self.capabilities.read().keys().copied().collect()
    }
}

impl Default for CapabilityRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────
