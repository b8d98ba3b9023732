// crates/pce-plugins/src/robotics.rs
// ============================================================================
// Module: Robotics Domain Plugin
// Description: Twin merge, purchase lifecycle, and rover tabular Q policy.
// Purpose: Maintain the digital twin and deliberate rover movement.
// Dependencies: pce-core, rand
// ============================================================================

//! ## Overview
//! The robotics plugin owns two concerns behind one dispatch key. The
//! engineering twin merges project events (goal, parts, budget, purchase
//! lifecycle, tests), with bill-of-materials cycles detected defensively and
//! dropped. The rover runs a tabular Q policy over discretized telemetry
//! cells, exploring epsilon-greedily and learning from reward events.
//!
//! # Invariants
//! - A pending purchase never changes the twin; debits apply only when the
//!   approval gate synthesizes the completion event.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;

use async_trait::async_trait;
use pce_core::AdaptPlugin;
use pce_core::Decision;
use pce_core::DecisionInputs;
use pce_core::DecisionPlugin;
use pce_core::ImpactProbe;
use pce_core::MergeOutcome;
use pce_core::NormalizedEvent;
use pce_core::PluginError;
use pce_core::StateMerge;
use pce_core::StateSnapshot;
use pce_core::core::ActionMetadata;
use pce_core::core::ActionPlan;
use pce_core::core::ApprovalId;
use pce_core::core::AuditEntry;
use pce_core::core::ComponentNode;
use pce_core::core::PurchaseEntry;
use pce_core::core::RoboticsTwin;
use pce_core::core::TestRecord;
use pce_core::runtime::decay_epsilon;
use pce_core::runtime::greedy_action;
use pce_core::runtime::q_update;
use serde_json::json;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Dispatch key for the robotics domain.
pub const ROBOTICS_DOMAIN: &str = "os.robotics";

/// Rover action set; `S` (stop) is the safest variant.
pub const ROVER_ACTIONS: [&str; 4] = ["FWD", "L", "R", "S"];

/// Q-learning step size.
pub const ALPHA: f64 = 0.2;
/// Q-learning discount factor.
pub const GAMMA: f64 = 0.95;
/// Rover exploration floor.
pub const EPSILON_MIN: f64 = 0.05;
/// Rover multiplicative epsilon decay.
pub const EPSILON_DECAY: f64 = 0.9995;

/// Value floor below which the rover holds still.
const VALUE_FLOOR: f64 = 0.4;
/// Coherence floor below which the rover holds still.
const CCI_FLOOR: f64 = 0.55;

// ============================================================================
// SECTION: Plugin
// ============================================================================

/// Robotics domain plugin.
#[derive(Debug, Default, Clone, Copy)]
pub struct RoboticsPlugin;

impl RoboticsPlugin {
    /// Creates the plugin.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl StateMerge for RoboticsPlugin {
    #[allow(
        clippy::too_many_lines,
        reason = "One arm per twin event keeps the merge rules auditable in one place."
    )]
    fn merge(&self, mut state: StateSnapshot, event: &NormalizedEvent) -> MergeOutcome {
        let mut violations = Vec::new();
        let mut os = state.pce_os();
        match event.event_type.as_str() {
            "project.goal.defined" => {
                let goal = event.payload.string_field("goal").unwrap_or("unspecified");
                os.twin.phase = "DESIGN".to_string();
                audit(&mut os.twin, event, format!("goal defined: {goal}"));
                state.set_pce_os(&os);
            }
            "part.candidate.added" => {
                let part_id =
                    event.payload.string_field("part_id").unwrap_or("unknown").to_string();
                let cost = event.payload.number_field("cost").unwrap_or(0.0).max(0.0);
                let depends_on = event
                    .payload
                    .field("depends_on")
                    .and_then(|value| value.as_array())
                    .map(|items| {
                        items
                            .iter()
                            .filter_map(|item| item.as_str().map(ToString::to_string))
                            .collect::<Vec<_>>()
                    })
                    .unwrap_or_default();
                let name = event
                    .payload
                    .string_field("name")
                    .map_or_else(|| part_id.clone(), ToString::to_string);
                let mut node = ComponentNode { id: part_id.clone(), name, cost, depends_on };
                os.twin.components.insert(part_id.clone(), node.clone());
                if closes_cycle(&os.twin, &part_id) {
                    node.depends_on.clear();
                    os.twin.components.insert(part_id.clone(), node);
                    violations.push("bom_cycle".to_string());
                    audit(&mut os.twin, event, format!("cycle dropped for part {part_id}"));
                } else {
                    audit(&mut os.twin, event, format!("part candidate added: {part_id}"));
                }
                state.set_pce_os(&os);
            }
            "budget.updated" => {
                let amount = event.payload.number_field("amount").unwrap_or(0.0);
                if amount < 0.0 {
                    violations.push("budget_clamped".to_string());
                }
                os.twin.budget_total = amount.max(0.0);
                os.twin.budget_remaining = amount.max(0.0);
                audit(&mut os.twin, event, format!("budget updated: {}", amount.max(0.0)));
                state.set_pce_os(&os);
            }
            "purchase.completed" | "budget_commit.completed" => {
                let cost = event.payload.number_field("cost").unwrap_or(0.0);
                let item = event.payload.string_field("item").unwrap_or("unknown").to_string();
                let approval_id =
                    event.payload.string_field("approval_id").map(ApprovalId::new);
                os.twin.budget_remaining -= cost;
                os.twin.purchase_history.push(PurchaseEntry {
                    item: item.clone(),
                    cost,
                    ts: event.ts,
                    approval_id,
                });
                audit(&mut os.twin, event, format!("purchase completed: {item} ({cost})"));
                state.set_pce_os(&os);
            }
            "purchase.rejected" | "budget_commit.rejected" => {
                let item = event.payload.string_field("item").unwrap_or("unknown");
                audit(&mut os.twin, event, format!("purchase rejected: {item}"));
                state.set_pce_os(&os);
            }
            "test.result.recorded" => {
                let name = event.payload.string_field("name").unwrap_or("unnamed").to_string();
                let passed = event.payload.bool_field("passed").unwrap_or(false);
                os.twin.tests.push(TestRecord { name, passed, ts: event.ts });
                state.set_pce_os(&os);
            }
            "robot_telemetry" => {
                let cell = telemetry_cell(event);
                let mut robotics = state.robotics();
                robotics.rover.last_state = Some(cell);
                state.set_robotics(&robotics);
            }
            // purchase.requested deliberately leaves the twin untouched.
            _ => {}
        }
        MergeOutcome { state, violations }
    }
}

#[async_trait]
impl DecisionPlugin for RoboticsPlugin {
    async fn decide(
        &self,
        state: StateSnapshot,
        inputs: DecisionInputs<'_>,
    ) -> Result<Decision, PluginError> {
        match inputs.event.event_type.as_str() {
            "purchase.requested" => Ok(purchase_plan(state, inputs)),
            "robot_telemetry" => Ok(rover_plan(state, inputs)),
            _ => {
                let plan = ActionPlan {
                    action_type: "twin.update".to_string(),
                    domain: ROBOTICS_DOMAIN.to_string(),
                    priority: 2,
                    rationale: format!("twin updated by {}", inputs.event.event_type),
                    expected_impact: 0.6,
                    requires_approval: false,
                    metadata: ActionMetadata::default(),
                };
                Ok(Decision { state, plan })
            }
        }
    }
}

impl AdaptPlugin for RoboticsPlugin {
    fn adapt(
        &self,
        mut state: StateSnapshot,
        event: &NormalizedEvent,
    ) -> Result<StateSnapshot, PluginError> {
        if event.event_type != "reward.rover.v1" {
            return Ok(state);
        }
        let reward = event.payload.number_field("reward").unwrap_or(0.0);
        let from = event.payload.string_field("state").unwrap_or("cell_0_0").to_string();
        let action = event.payload.string_field("action").unwrap_or("S").to_string();
        let next = event.payload.string_field("next_state").unwrap_or("cell_0_0").to_string();
        let done = event.payload.bool_field("done").unwrap_or(false);

        let mut robotics = state.robotics();
        q_update(&mut robotics.rover.q, &from, &action, reward, &next, ALPHA, GAMMA);
        robotics.rover.stats.total_reward += reward;
        robotics.rover.stats.last_reward = reward;
        if done {
            robotics.rover.stats.episodes += 1;
            robotics.rover.last_state = None;
            robotics.rover.last_action = None;
        }
        robotics.rover.epsilon =
            decay_epsilon(robotics.rover.epsilon, EPSILON_DECAY, EPSILON_MIN);
        state.set_robotics(&robotics);
        Ok(state)
    }
}

impl ImpactProbe for RoboticsPlugin {
    fn observe_impact(&self, state: &StateSnapshot, plan: &ActionPlan) -> Option<f64> {
        if plan.action_type == "rover.move" {
            let last_reward = state.robotics().rover.stats.last_reward;
            return Some((0.5 + last_reward / 10.0).clamp(0.0, 1.0));
        }
        None
    }
}

// ============================================================================
// SECTION: Deliberation Helpers
// ============================================================================

/// Builds the gated purchase plan for a purchase request.
fn purchase_plan(state: StateSnapshot, inputs: DecisionInputs<'_>) -> Decision {
    let item = inputs.event.payload.string_field("item").unwrap_or("unknown").to_string();
    let projected_cost = inputs.event.payload.number_field("projected_cost").unwrap_or(0.0);
    let risk = inputs
        .event
        .payload
        .string_field("risk_level")
        .unwrap_or("MEDIUM")
        .to_string();

    let mut metadata = ActionMetadata {
        risk: Some(risk),
        projected_cost: Some(projected_cost),
        subject: Some(item.clone()),
        ..ActionMetadata::default()
    };
    metadata.explain_de("final_profile", json!("GATED"));

    let plan = ActionPlan {
        action_type: "purchase".to_string(),
        domain: ROBOTICS_DOMAIN.to_string(),
        priority: 5,
        rationale: format!("purchase requested: {item}"),
        expected_impact: 0.7,
        requires_approval: true,
        metadata,
    };
    Decision { state, plan }
}

/// Builds the rover movement plan from the tabular policy.
fn rover_plan(mut state: StateSnapshot, inputs: DecisionInputs<'_>) -> Decision {
    let mut robotics = state.robotics();
    let cell = robotics.rover.last_state.clone().unwrap_or_else(|| telemetry_cell(inputs.event));

    if !robotics.rover.running {
        let plan = ActionPlan {
            action_type: "rover.idle".to_string(),
            domain: ROBOTICS_DOMAIN.to_string(),
            priority: 1,
            rationale: "rover loop stopped".to_string(),
            expected_impact: 0.5,
            requires_approval: false,
            metadata: ActionMetadata::default(),
        };
        return Decision { state, plan };
    }

    let explore = rand::random::<f64>() < robotics.rover.epsilon;
    let bandit_action = if explore {
        let index = usize::from(rand::random::<u16>()) % ROVER_ACTIONS.len();
        ROVER_ACTIONS[index].to_string()
    } else {
        greedy_action(&robotics.rover.q, &cell).unwrap_or_else(|| "FWD".to_string())
    };

    let override_reason = if inputs.value_score < VALUE_FLOOR {
        Some("value_floor")
    } else if inputs.cci.cci < CCI_FLOOR {
        Some("cci_floor")
    } else {
        None
    };
    let action =
        if override_reason.is_some() { "S".to_string() } else { bandit_action.clone() };

    robotics.rover.epsilon = decay_epsilon(robotics.rover.epsilon, EPSILON_DECAY, EPSILON_MIN);
    robotics.rover.last_action = Some(action.clone());
    state.set_robotics(&robotics);

    let mut metadata = ActionMetadata::default();
    metadata.explain_de("selected_by_bandit", json!(bandit_action));
    metadata.explain_de("explored", json!(explore));
    metadata.explain_de("final_profile", json!(action));
    if let Some(reason) = override_reason {
        metadata.explain_de("override_reason", json!(reason));
    }

    let plan = ActionPlan {
        action_type: "rover.move".to_string(),
        domain: ROBOTICS_DOMAIN.to_string(),
        priority: 3,
        rationale: format!("rover {action} from {cell}"),
        expected_impact: 0.55,
        requires_approval: false,
        metadata,
    };
    Decision { state, plan }
}

// ============================================================================
// SECTION: Twin Helpers
// ============================================================================

/// Appends an audit line to the twin.
fn audit(twin: &mut RoboticsTwin, event: &NormalizedEvent, entry: String) {
    twin.audit_trail.push(AuditEntry { ts: event.ts, entry });
}

/// Discretizes telemetry coordinates into a policy cell key.
fn telemetry_cell(event: &NormalizedEvent) -> String {
    let x = event.payload.number_field("x").unwrap_or(0.0).floor();
    let y = event.payload.number_field("y").unwrap_or(0.0).floor();
    format!("cell_{x}_{y}")
}

/// Returns true when the newly inserted part closes a dependency cycle.
///
/// The walk follows `depends_on` edges from the new part; revisiting the part
/// means the adjacency list now contains a cycle through it.
fn closes_cycle(twin: &RoboticsTwin, part_id: &str) -> bool {
    let mut visited = BTreeSet::new();
    let mut stack: Vec<String> = twin
        .components
        .get(part_id)
        .map(|node| node.depends_on.clone())
        .unwrap_or_default();
    while let Some(current) = stack.pop() {
        if current == part_id {
            return true;
        }
        if visited.insert(current.clone()) {
            if let Some(node) = twin.components.get(&current) {
                stack.extend(node.depends_on.iter().cloned());
            }
        }
    }
    false
}
