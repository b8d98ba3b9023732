// crates/pce-plugins/src/lib.rs
// ============================================================================
// Module: PCE Plugins Library
// Description: Domain plugin implementations and registry assembly.
// Purpose: Register assistant, robotics, and trader capabilities at boot.
// Dependencies: pce-core
// ============================================================================

//! ## Overview
//! Domain plugins for the cognition engine: the assistant bandit with its
//! time-boxed OpenRouter reply adapter, the robotics twin plus rover tabular Q
//! policy, and the trader gate chain. [`builtin_registry`] assembles the boot
//! registry consumed by the server.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod assistant;
pub mod openrouter;
pub mod robotics;
pub mod trader;

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use pce_core::PluginRegistry;
use pce_core::ReplyProvider;
use pce_core::runtime::DomainPlugins;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use assistant::ASSISTANT_DOMAIN;
pub use assistant::AssistantPlugin;
pub use assistant::AssistantSettings;
pub use openrouter::OpenRouterReplyProvider;
pub use openrouter::OpenRouterSettings;
pub use robotics::ROBOTICS_DOMAIN;
pub use robotics::ROVER_ACTIONS;
pub use robotics::RoboticsPlugin;
pub use trader::TRADER_DOMAIN;
pub use trader::TraderPlugin;

// ============================================================================
// SECTION: Registry Assembly
// ============================================================================

/// Builds the boot plugin registry with every built-in domain registered.
#[must_use]
pub fn builtin_registry(
    assistant_settings: AssistantSettings,
    reply: Option<Arc<dyn ReplyProvider>>,
) -> PluginRegistry {
    let mut registry = PluginRegistry::new();

    let assistant = Arc::new(AssistantPlugin::new(assistant_settings, reply));
    registry.register(
        ASSISTANT_DOMAIN,
        DomainPlugins::new()
            .with_merge(assistant.clone())
            .with_value(assistant.clone())
            .with_decide(assistant.clone())
            .with_adapt(assistant),
    );

    let robotics = Arc::new(RoboticsPlugin::new());
    registry.register(
        ROBOTICS_DOMAIN,
        DomainPlugins::new()
            .with_merge(robotics.clone())
            .with_decide(robotics.clone())
            .with_adapt(robotics.clone())
            .with_probe(robotics),
    );

    let trader = Arc::new(TraderPlugin::new());
    registry.register(
        TRADER_DOMAIN,
        DomainPlugins::new()
            .with_merge(trader.clone())
            .with_value(trader.clone())
            .with_decide(trader),
    );

    registry
}
