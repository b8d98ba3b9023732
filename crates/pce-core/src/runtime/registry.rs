// crates/pce-core/src/runtime/registry.rs
// ============================================================================
// Module: PCE Plugin Registry
// Description: Per-domain capability registration and lookup.
// Purpose: Dispatch merge, value, decision, adaptation, and probe capabilities.
// Dependencies: crate::interfaces
// ============================================================================

//! ## Overview
//! The registry maps domain dispatch keys to capability sets. Registration
//! happens at boot; the registry is read-mostly afterwards. A domain may
//! register any subset of the capabilities; the pipeline falls back to core
//! defaults for missing ones.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::interfaces::AdaptPlugin;
use crate::interfaces::DecisionPlugin;
use crate::interfaces::ImpactProbe;
use crate::interfaces::StateMerge;
use crate::interfaces::ValuePlugin;

// ============================================================================
// SECTION: Capability Set
// ============================================================================

/// Capability set registered for one domain.
#[derive(Clone, Default)]
pub struct DomainPlugins {
    /// Deterministic state merge.
    pub merge: Option<Arc<dyn StateMerge>>,
    /// Value scoring.
    pub value: Option<Arc<dyn ValuePlugin>>,
    /// Deliberation.
    pub decide: Option<Arc<dyn DecisionPlugin>>,
    /// Adaptive feedback application.
    pub adapt: Option<Arc<dyn AdaptPlugin>>,
    /// Observed-impact probe.
    pub probe: Option<Arc<dyn ImpactProbe>>,
}

impl DomainPlugins {
    /// Creates an empty capability set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the merge capability.
    #[must_use]
    pub fn with_merge(mut self, merge: Arc<dyn StateMerge>) -> Self {
        self.merge = Some(merge);
        self
    }

    /// Sets the value capability.
    #[must_use]
    pub fn with_value(mut self, value: Arc<dyn ValuePlugin>) -> Self {
        self.value = Some(value);
        self
    }

    /// Sets the decision capability.
    #[must_use]
    pub fn with_decide(mut self, decide: Arc<dyn DecisionPlugin>) -> Self {
        self.decide = Some(decide);
        self
    }

    /// Sets the adaptation capability.
    #[must_use]
    pub fn with_adapt(mut self, adapt: Arc<dyn AdaptPlugin>) -> Self {
        self.adapt = Some(adapt);
        self
    }

    /// Sets the probe capability.
    #[must_use]
    pub fn with_probe(mut self, probe: Arc<dyn ImpactProbe>) -> Self {
        self.probe = Some(probe);
        self
    }
}

// ============================================================================
// SECTION: Registry
// ============================================================================

/// Per-domain plugin registry.
#[derive(Clone, Default)]
pub struct PluginRegistry {
    /// Capability sets keyed by domain dispatch key.
    domains: BTreeMap<String, DomainPlugins>,
}

impl PluginRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a capability set for a domain, replacing any previous one.
    pub fn register(&mut self, domain: impl Into<String>, plugins: DomainPlugins) {
        self.domains.insert(domain.into(), plugins);
    }

    /// Returns the registered domains.
    #[must_use]
    pub fn domains(&self) -> Vec<&str> {
        self.domains.keys().map(String::as_str).collect()
    }

    /// Returns the merge capability for a domain.
    #[must_use]
    pub fn merge_for(&self, domain: &str) -> Option<Arc<dyn StateMerge>> {
        self.domains.get(domain).and_then(|set| set.merge.clone())
    }

    /// Returns the value capability for a domain.
    #[must_use]
    pub fn value_for(&self, domain: &str) -> Option<Arc<dyn ValuePlugin>> {
        self.domains.get(domain).and_then(|set| set.value.clone())
    }

    /// Returns the decision capability for a domain.
    #[must_use]
    pub fn decide_for(&self, domain: &str) -> Option<Arc<dyn DecisionPlugin>> {
        self.domains.get(domain).and_then(|set| set.decide.clone())
    }

    /// Returns the adaptation capability for a domain.
    #[must_use]
    pub fn adapt_for(&self, domain: &str) -> Option<Arc<dyn AdaptPlugin>> {
        self.domains.get(domain).and_then(|set| set.adapt.clone())
    }

    /// Returns the probe capability for a domain.
    #[must_use]
    pub fn probe_for(&self, domain: &str) -> Option<Arc<dyn ImpactProbe>> {
        self.domains.get(domain).and_then(|set| set.probe.clone())
    }
}
