// crates/pce-plugins/src/assistant.rs
// ============================================================================
// Module: Assistant Domain Plugin
// Description: Epsilon-greedy profile bandit with session memory and LLM reply.
// Purpose: Deliberate assistant turns and adapt per-session memory.
// Dependencies: pce-core, rand, sha2
// ============================================================================

//! ## Overview
//! The assistant plugin selects a reply profile (`P0`..`P3`) via an
//! epsilon-greedy bandit, applies the deterministic floor override, assembles
//! the prompt with per-session memory hints, and calls the time-boxed reply
//! provider. Provider failures substitute a fallback reply with a sanitized
//! reason in the explanation bag; the pipeline never blocks on the provider
//! past its deadline.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use async_trait::async_trait;
use pce_core::AdaptPlugin;
use pce_core::ArmStats;
use pce_core::Decision;
use pce_core::DecisionInputs;
use pce_core::DecisionPlugin;
use pce_core::MergeOutcome;
use pce_core::NormalizedEvent;
use pce_core::PluginError;
use pce_core::ReplyProvider;
use pce_core::ReplyRequest;
use pce_core::StateMerge;
use pce_core::StateSnapshot;
use pce_core::ValueAssessment;
use pce_core::ValuePlugin;
use pce_core::core::ActionMetadata;
use pce_core::core::ActionPlan;
use pce_core::runtime::decay_epsilon;
use pce_core::runtime::remember;
use pce_core::runtime::value::default_assessment;
use serde_json::json;
use sha2::Digest;
use sha2::Sha256;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Dispatch key for the assistant domain.
pub const ASSISTANT_DOMAIN: &str = "assistant";

/// Reply profiles ordered safest-first.
pub const PROFILES: [&str; 4] = ["P0", "P1", "P2", "P3"];

/// Prefix length of the hex prompt hash recorded in the explanation bag.
const PROMPT_HASH_LEN: usize = 16;

// ============================================================================
// SECTION: Settings
// ============================================================================

/// Assistant plugin settings resolved from configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AssistantSettings {
    /// Value score below which the safest profile is forced.
    pub value_floor: f64,
    /// Coherence index below which the safest profile is forced.
    pub cci_floor: f64,
    /// Starting exploration rate.
    pub epsilon_start: f64,
    /// Exploration floor.
    pub epsilon_min: f64,
    /// Multiplicative epsilon decay per decision.
    pub epsilon_decay: f64,
}

impl Default for AssistantSettings {
    fn default() -> Self {
        Self {
            value_floor: 0.4,
            cci_floor: 0.55,
            epsilon_start: 1.0,
            epsilon_min: 0.05,
            epsilon_decay: 0.9995,
        }
    }
}

// ============================================================================
// SECTION: Plugin
// ============================================================================

/// Assistant domain plugin.
pub struct AssistantPlugin {
    /// Plugin settings.
    settings: AssistantSettings,
    /// Optional time-boxed reply provider.
    reply: Option<Arc<dyn ReplyProvider>>,
}

impl AssistantPlugin {
    /// Creates a plugin with the given settings and optional provider.
    #[must_use]
    pub fn new(settings: AssistantSettings, reply: Option<Arc<dyn ReplyProvider>>) -> Self {
        Self { settings, reply }
    }

    /// Returns the scheduling priority for a profile.
    fn profile_priority(profile: &str) -> i64 {
        match profile {
            "P0" => 1,
            "P1" => 2,
            "P2" => 3,
            _ => 4,
        }
    }

    /// Returns the expected impact for a profile.
    fn profile_impact(profile: &str) -> f64 {
        match profile {
            "P0" => 0.45,
            "P1" => 0.6,
            "P2" => 0.7,
            _ => 0.8,
        }
    }

    /// Selects a profile with an epsilon-greedy draw over the arm stats.
    fn select_profile(
        arms: &std::collections::BTreeMap<String, ArmStats>,
        epsilon: f64,
    ) -> (String, bool) {
        let explore = rand::random::<f64>() < epsilon;
        if explore {
            let index = usize::from(rand::random::<u16>()) % PROFILES.len();
            return (PROFILES[index].to_string(), true);
        }
        let best = arms
            .iter()
            .fold(None::<(&String, f64)>, |best, (profile, stats)| match best {
                Some((_, reward)) if reward >= stats.mean_reward => best,
                _ => Some((profile, stats.mean_reward)),
            })
            .map(|(profile, _)| profile.clone());
        (best.unwrap_or_else(|| "P1".to_string()), false)
    }
}

impl StateMerge for AssistantPlugin {
    fn merge(&self, mut state: StateSnapshot, event: &NormalizedEvent) -> MergeOutcome {
        if event.event_type == "observation.assistant.v1"
            && let Some(session_id) = &event.payload.session_id
        {
            let mut assistant = state.assistant();
            assistant.sessions.entry(session_id.clone()).or_default();
            state.set_assistant(&assistant);
        }
        MergeOutcome { state, violations: Vec::new() }
    }
}

impl ValuePlugin for AssistantPlugin {
    fn value_score(
        &self,
        state: &StateSnapshot,
        event: &NormalizedEvent,
    ) -> Result<ValueAssessment, PluginError> {
        if let Some(hint) = event.payload.number_field("value_hint") {
            let mut assessment = default_assessment(state, event);
            assessment.score = hint.clamp(0.0, 1.0);
            return Ok(assessment);
        }
        Ok(default_assessment(state, event))
    }
}

#[async_trait]
impl DecisionPlugin for AssistantPlugin {
    async fn decide(
        &self,
        mut state: StateSnapshot,
        inputs: DecisionInputs<'_>,
    ) -> Result<Decision, PluginError> {
        if inputs.event.event_type == "feedback.assistant.v1" {
            let plan = ActionPlan {
                action_type: "feedback.ack".to_string(),
                domain: ASSISTANT_DOMAIN.to_string(),
                priority: 1,
                rationale: "feedback recorded into session memory".to_string(),
                expected_impact: 0.5,
                requires_approval: false,
                metadata: ActionMetadata::default(),
            };
            return Ok(Decision { state, plan });
        }

        let mut assistant = state.assistant();
        let epsilon = assistant.epsilon.unwrap_or(self.settings.epsilon_start);

        let (bandit_profile, explored) = Self::select_profile(&assistant.arms, epsilon);
        let override_reason = if inputs.value_score < self.settings.value_floor {
            Some("value_floor")
        } else if inputs.cci.cci < self.settings.cci_floor {
            Some("cci_floor")
        } else {
            None
        };
        let final_profile =
            if override_reason.is_some() { PROFILES[0].to_string() } else { bandit_profile.clone() };

        assistant.epsilon = Some(decay_epsilon(
            epsilon,
            self.settings.epsilon_decay,
            self.settings.epsilon_min,
        ));
        assistant.arms.entry(final_profile.clone()).or_default().pulls += 1;

        let session_id = inputs.event.payload.session_id.clone();
        let (preferences, avoid) = session_id
            .as_ref()
            .and_then(|id| assistant.sessions.get(id))
            .map(|memory| (memory.preferences.clone(), memory.avoid.clone()))
            .unwrap_or_default();
        if let Some(id) = &session_id {
            assistant.sessions.entry(id.clone()).or_default().last_profile =
                Some(final_profile.clone());
        }

        let text = inputs.event.payload.string_field("text").unwrap_or("").to_string();
        let prompt = format!("[{final_profile}] {text}");
        let prompt_hash = hex_digest(&prompt);

        let mut metadata = ActionMetadata::default();
        metadata.explain_de("selected_by_bandit", json!(bandit_profile));
        metadata.explain_de("explored", json!(explored));
        metadata.explain_de("final_profile", json!(final_profile));
        metadata.explain_de("prompt_hash", json!(prompt_hash));
        if let Some(reason) = override_reason {
            metadata.explain_de("override_reason", json!(reason));
        }
        if !preferences.is_empty() {
            metadata.explain_de("preference_hints", json!(preferences));
        }
        if !avoid.is_empty() {
            metadata.explain_de("avoid_hints", json!(avoid));
        }

        match &self.reply {
            Some(provider) => {
                let request = ReplyRequest {
                    prompt,
                    preferences: preferences.clone(),
                    avoid: avoid.clone(),
                };
                match provider.reply(&request).await {
                    Ok(reply) => {
                        metadata.explain_de("reply", json!(reply.text));
                        metadata.explain_de("final_decoding", json!(reply.decoding));
                    }
                    Err(err) => {
                        tracing::warn!(error = %err, "reply provider failed; using fallback");
                        metadata.explain_de("reply", json!(fallback_reply(&text)));
                        metadata.explain_de("final_decoding", json!("fallback"));
                        metadata.explain_de("openrouter_error", json!(err.sanitized_label()));
                    }
                }
            }
            None => {
                metadata.explain_de("reply", json!(fallback_reply(&text)));
                metadata.explain_de("final_decoding", json!("fallback"));
            }
        }

        state.set_assistant(&assistant);
        let plan = ActionPlan {
            action_type: "assistant.reply".to_string(),
            domain: ASSISTANT_DOMAIN.to_string(),
            priority: Self::profile_priority(&final_profile),
            rationale: format!("assistant reply with profile {final_profile}"),
            expected_impact: Self::profile_impact(&final_profile),
            requires_approval: false,
            metadata,
        };
        Ok(Decision { state, plan })
    }
}

impl AdaptPlugin for AssistantPlugin {
    fn adapt(
        &self,
        mut state: StateSnapshot,
        event: &NormalizedEvent,
    ) -> Result<StateSnapshot, PluginError> {
        if event.event_type != "feedback.assistant.v1" {
            return Ok(state);
        }
        let Some(session_id) = event.payload.session_id.clone() else {
            return Ok(state);
        };
        let reward = event.payload.number_field("reward").unwrap_or(0.0);
        let notes = event.payload.string_field("notes").map(ToString::to_string);

        let mut assistant = state.assistant();
        let memory = assistant.sessions.entry(session_id).or_default();
        if let Some(notes) = notes {
            if reward > 0.0 {
                remember(&mut memory.preferences, notes);
            } else if reward < 0.0 {
                remember(&mut memory.avoid, notes);
            }
        }

        if let Some(profile) = memory.last_profile.clone() {
            let stats = assistant.arms.entry(profile).or_default();
            let pulls = stats.pulls.max(1);
            let normalized = (reward.clamp(-1.0, 1.0) + 1.0) / 2.0;
            stats.mean_reward += (normalized - stats.mean_reward) / pulls as f64;
        }
        state.set_assistant(&assistant);
        Ok(state)
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Builds the deterministic fallback reply used when the provider is absent
/// or fails.
fn fallback_reply(text: &str) -> String {
    let summary: String = text.chars().take(80).collect();
    format!("Noted: {summary}")
}

/// Returns a short hex SHA-256 digest of the prompt.
fn hex_digest(prompt: &str) -> String {
    let digest = Sha256::digest(prompt.as_bytes());
    let mut hex = String::with_capacity(PROMPT_HASH_LEN);
    for byte in digest.iter().take(PROMPT_HASH_LEN / 2) {
        hex.push_str(&format!("{byte:02x}"));
    }
    hex
}
