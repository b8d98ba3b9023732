// crates/pce-plugins/src/trader.rs
// ============================================================================
// Module: Trader Domain Plugin
// Description: Market signal merge and the macro/model/guardrails gate chain.
// Purpose: Deliberate trade actions behind ordered strategy gates.
// Dependencies: pce-core
// ============================================================================

//! ## Overview
//! The trader plugin runs an ordered gate chain per market signal: the MACRO
//! regime gate, the MODEL signal-strength gate, and the GUARDRAILS exposure
//! gate. The first blocking gate wins and the plan degrades to hold. Trader UI
//! controls (pause, resume, reset, config) stay trader-local; the core only
//! ingests `market_signal` events.

// ============================================================================
// SECTION: Imports
// ============================================================================

use async_trait::async_trait;
use pce_core::Decision;
use pce_core::DecisionInputs;
use pce_core::DecisionPlugin;
use pce_core::MergeOutcome;
use pce_core::NormalizedEvent;
use pce_core::PluginError;
use pce_core::StateMerge;
use pce_core::StateSnapshot;
use pce_core::ValueAssessment;
use pce_core::ValuePlugin;
use pce_core::core::ActionMetadata;
use pce_core::core::ActionPlan;
use pce_core::runtime::value::default_assessment;
use serde_json::json;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Dispatch key for the trader domain.
pub const TRADER_DOMAIN: &str = "trader";

/// Minimum absolute model signal the MODEL gate requires.
const MODEL_SIGNAL_FLOOR: f64 = 0.2;

/// Trade size as a fraction of the book per unit of signal.
const TRADE_SIZE_PER_SIGNAL: f64 = 0.1;

/// Value floor below which the chain degrades to hold.
const VALUE_FLOOR: f64 = 0.4;
/// Coherence floor below which the chain degrades to hold.
const CCI_FLOOR: f64 = 0.55;

/// Recognized macro bias labels.
const MACRO_BIASES: [&str; 3] = ["bull", "bear", "neutral"];

// ============================================================================
// SECTION: Plugin
// ============================================================================

/// Trader domain plugin.
#[derive(Debug, Default, Clone, Copy)]
pub struct TraderPlugin;

impl TraderPlugin {
    /// Creates the plugin.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl StateMerge for TraderPlugin {
    fn merge(&self, mut state: StateSnapshot, event: &NormalizedEvent) -> MergeOutcome {
        let mut violations = Vec::new();
        if event.event_type == "market_signal" {
            let mut trader = state.trader();
            let signal = event.payload.number_field("signal").unwrap_or(0.0);
            if !(-1.0..=1.0).contains(&signal) {
                violations.push("signal_clamped".to_string());
            }
            trader.model_signal = signal.clamp(-1.0, 1.0);
            if let Some(bias) = event.payload.string_field("bias")
                && MACRO_BIASES.contains(&bias)
            {
                trader.macro_bias = bias.to_string();
            }
            if let Some(exposure) = event.payload.number_field("exposure") {
                trader.exposure = exposure.clamp(0.0, 1.0);
            }
            if let Some(halted) = event.payload.bool_field("halted") {
                trader.halted = halted;
            }
            state.set_trader(&trader);
        }
        MergeOutcome { state, violations }
    }
}

impl ValuePlugin for TraderPlugin {
    fn value_score(
        &self,
        state: &StateSnapshot,
        event: &NormalizedEvent,
    ) -> Result<ValueAssessment, PluginError> {
        let mut assessment = default_assessment(state, event);
        let trader = state.trader();
        if trader.exposure > trader.max_exposure {
            assessment.violations.push("exposure_breach".to_string());
            assessment.score = (assessment.score - 0.3).clamp(0.0, 1.0);
        }
        Ok(assessment)
    }
}

#[async_trait]
impl DecisionPlugin for TraderPlugin {
    async fn decide(
        &self,
        state: StateSnapshot,
        inputs: DecisionInputs<'_>,
    ) -> Result<Decision, PluginError> {
        let trader = state.trader();
        let signal = trader.model_signal;
        let trade_size = TRADE_SIZE_PER_SIGNAL * signal.abs();

        let mut chain = Vec::new();
        let mut blocked_by = None;

        let macro_pass = trader.macro_bias != "bear";
        chain.push(gate_entry("MACRO", macro_pass));
        if !macro_pass {
            blocked_by.get_or_insert("MACRO");
        }

        let model_pass = signal.abs() >= MODEL_SIGNAL_FLOOR;
        chain.push(gate_entry("MODEL", model_pass));
        if !model_pass {
            blocked_by.get_or_insert("MODEL");
        }

        let guardrails_pass =
            !trader.halted && trader.exposure + trade_size <= trader.max_exposure;
        chain.push(gate_entry("GUARDRAILS", guardrails_pass));
        if !guardrails_pass {
            blocked_by.get_or_insert("GUARDRAILS");
        }

        let override_reason = if inputs.value_score < VALUE_FLOOR {
            Some("value_floor")
        } else if inputs.cci.cci < CCI_FLOOR {
            Some("cci_floor")
        } else {
            None
        };

        let mut metadata = ActionMetadata::default();
        metadata.explain_de("gate_chain", json!(chain));
        if let Some(gate) = blocked_by {
            metadata.explain_de("gate_blocked", json!(gate));
        }
        if let Some(reason) = override_reason {
            metadata.explain_de("override_reason", json!(reason));
        }

        let (action_type, priority, expected_impact) =
            if override_reason.is_some() || blocked_by.is_some() {
                ("trade.hold".to_string(), 1, 0.5)
            } else if signal > 0.0 {
                ("trade.buy".to_string(), 4, 0.55 + 0.25 * signal.abs())
            } else {
                ("trade.sell".to_string(), 4, 0.55 + 0.25 * signal.abs())
            };
        metadata.explain_de(
            "final_profile",
            json!(blocked_by.map_or("EXECUTE", |gate| gate)),
        );

        let symbol =
            inputs.event.payload.string_field("symbol").unwrap_or("unknown").to_string();
        let plan = ActionPlan {
            action_type,
            domain: TRADER_DOMAIN.to_string(),
            priority,
            rationale: format!("signal {signal:.2} on {symbol}"),
            expected_impact: expected_impact.clamp(0.0, 1.0),
            requires_approval: false,
            metadata: ActionMetadata { subject: Some(symbol), ..metadata },
        };
        Ok(Decision { state, plan })
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Formats one gate chain entry for the explanation bag.
fn gate_entry(gate: &str, passed: bool) -> String {
    format!("{gate}:{}", if passed { "pass" } else { "block" })
}
