use crate::error::*;
use serde::{Deserialize, Serialize};
use std::path::Path;

//
// Target priority.
//

pub const DEFAULT_HEALTH_EXPONENT: f32 = 0.5;
pub const DEFAULT_HARASS_HEALTH_EXPONENT: f32 = 0.4;
pub const DEFAULT_PROXIMITY_DECAY: f32 = 0.9;
pub const DEFAULT_PROXIMITY_WEIGHT: f32 = 50.0;
pub const DEFAULT_STATIONARY_PROXIMITY: f32 = 0.001;
pub const DEFAULT_MIN_RANGE_DIFFERENCE: f32 = 2.0;
pub const DEFAULT_DECOY_FRESHNESS_TICKS: u32 = 1;
pub const DEFAULT_MELEE_RANGE: f32 = 1.0;
pub const DEFAULT_STRUCTURE_DIVISOR: f32 = 100.0;

/// Named constants of the target evaluator. Every multiplier is applied to
/// the raw score independently of the others.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PriorityWeights {
    /// Fractional power applied to `1 + health + shield` in combat scoring.
    pub health_exponent: f32,
    /// Fractional power applied to `1 + health + shield` in harass scoring.
    pub harass_health_exponent: f32,
    /// Per-tile decay of the proximity term outside weapon range.
    pub proximity_decay: f32,
    /// Weight of the proximity term relative to the damage exchange.
    pub proximity_weight: f32,
    /// Proximity of out-of-range targets for attackers that cannot move.
    pub stationary_proximity: f32,
    /// Targets whose range exceeds `attacker range - this` are rejected by `FILTER_HIGH_RANGE`.
    pub min_range_difference: f32,
    /// Ticks a detection decoy stays worth shooting after it was last seen.
    pub decoy_freshness_ticks: u32,
    /// Units whose maximum range is above this are treated as ranged.
    pub melee_range: f32,
    pub invisible_multiplier: f32,
    pub flying_detector_multiplier: f32,
    pub minion_multiplier: f32,
    pub shield_structure_multiplier: f32,
    pub non_threatening_multiplier: f32,
    pub builder_multiplier: f32,
    pub repairer_multiplier: f32,
    pub refinery_worker_multiplier: f32,
    /// Divisor applied to scores of structures that neither shoot nor work.
    pub structure_divisor: f32,
}

impl Default for PriorityWeights {
    fn default() -> Self {
        PriorityWeights {
            health_exponent: DEFAULT_HEALTH_EXPONENT,
            harass_health_exponent: DEFAULT_HARASS_HEALTH_EXPONENT,
            proximity_decay: DEFAULT_PROXIMITY_DECAY,
            proximity_weight: DEFAULT_PROXIMITY_WEIGHT,
            stationary_proximity: DEFAULT_STATIONARY_PROXIMITY,
            min_range_difference: DEFAULT_MIN_RANGE_DIFFERENCE,
            decoy_freshness_ticks: DEFAULT_DECOY_FRESHNESS_TICKS,
            melee_range: DEFAULT_MELEE_RANGE,
            invisible_multiplier: 2.0,
            flying_detector_multiplier: 2.0,
            minion_multiplier: 0.1,
            shield_structure_multiplier: 0.1,
            non_threatening_multiplier: 0.5,
            builder_multiplier: 2.0,
            repairer_multiplier: 2.0,
            refinery_worker_multiplier: 0.5,
            structure_divisor: DEFAULT_STRUCTURE_DIVISOR,
        }
    }
}

//
// Behavior controller.
//

pub const DEFAULT_ENGAGEMENT_RANGE: f32 = 12.0;
pub const DEFAULT_FOCUS_FIRE_TOLERANCE: f32 = 0.1;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BehaviorConfig {
    /// Targets within this distance of a unit count as "in sight".
    pub engagement_range: f32,
    /// Fraction of the best aggregate score within which focus-fire candidates are considered equal.
    pub focus_fire_tolerance: f32,
    /// Whether melee-target engagements may retreat while reloading.
    pub kite: bool,
}

impl Default for BehaviorConfig {
    fn default() -> Self {
        BehaviorConfig {
            engagement_range: DEFAULT_ENGAGEMENT_RANGE,
            focus_fire_tolerance: DEFAULT_FOCUS_FIRE_TOLERANCE,
            kite: true,
        }
    }
}

//
// Harass controller.
//

pub const DEFAULT_HARASS_COMMAND_INTERVAL: u32 = 2;
pub const DEFAULT_REPULSION_WEIGHT: f32 = 1.5;
pub const DEFAULT_WAYPOINT_DISTANCE: f32 = 5.0;
pub const DEFAULT_MIN_WAYPOINT_DISTANCE: f32 = 2.0;
pub const DEFAULT_DANGER_MARGIN: f32 = 0.5;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HarassConfig {
    /// Minimum ticks between two commands to the same unit.
    pub command_interval: u32,
    pub repulsion_weight: f32,
    /// Distance of the projected waypoint along the steering vector.
    pub waypoint_distance: f32,
    /// Shortest waypoint distance tried before giving up on the steering vector.
    pub min_waypoint_distance: f32,
    /// A threat this far inside its own range triggers the flee planner.
    pub danger_margin: f32,
}

impl Default for HarassConfig {
    fn default() -> Self {
        HarassConfig {
            command_interval: DEFAULT_HARASS_COMMAND_INTERVAL,
            repulsion_weight: DEFAULT_REPULSION_WEIGHT,
            waypoint_distance: DEFAULT_WAYPOINT_DISTANCE,
            min_waypoint_distance: DEFAULT_MIN_WAYPOINT_DISTANCE,
            danger_margin: DEFAULT_DANGER_MARGIN,
        }
    }
}

//
// Flee planner.
//

pub const DEFAULT_FLEE_GRID_SIZE: usize = 50;
pub const DEFAULT_SAFE_HOP_RADIUS: f32 = 2.0;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FleeConfig {
    /// Width and height of the influence grid in tiles.
    pub grid_size: usize,
    /// Scale of the threat cost each hostile adds at the centre of its reach.
    pub threat_decay: f32,
    /// The waypoint is the earliest path cell within this distance of the safe goal.
    pub safe_hop_radius: f32,
}

impl Default for FleeConfig {
    fn default() -> Self {
        FleeConfig {
            grid_size: DEFAULT_FLEE_GRID_SIZE,
            threat_decay: 1.0,
            safe_hop_radius: DEFAULT_SAFE_HOP_RADIUS,
        }
    }
}

//
// Search backends.
//

pub const DEFAULT_SEARCH_TIME_BUDGET_MS: u64 = 100;
pub const DEFAULT_ALPHA_BETA_MAX_DEPTH: u32 = 6;
pub const DEFAULT_UCT_MAX_TRAVERSALS: u32 = 5000;
pub const DEFAULT_UCT_EXPLORATION: f32 = 1.6;
pub const DEFAULT_MOVE_DURATION: f32 = 1.0;
pub const DEFAULT_MAX_JOINT_MOVES: usize = 64;

/// Parameters of the simulated combat both search backends share.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SearchModelConfig {
    /// Simulated seconds a single move order takes.
    pub move_duration: f32,
    /// Upper bound on joint moves generated per ply.
    pub max_joint_moves: usize,
    /// Units whose nearest enemy is further than their range plus this never consider moving back.
    pub engage_slack: f32,
}

impl Default for SearchModelConfig {
    fn default() -> Self {
        SearchModelConfig {
            move_duration: DEFAULT_MOVE_DURATION,
            max_joint_moves: DEFAULT_MAX_JOINT_MOVES,
            engage_slack: 2.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AlphaBetaConfig {
    pub time_budget_ms: u64,
    pub max_depth: u32,
    pub turn_ownership: bool,
    /// Only the closest enemy in range may be attacked.
    pub closest_enemy: bool,
    /// Only the enemy in range with the fewest hit points may be attacked.
    pub weakest_enemy: bool,
    /// Only the enemy in range with the highest target priority may be attacked.
    pub highest_priority: bool,
    pub model: SearchModelConfig,
}

impl Default for AlphaBetaConfig {
    fn default() -> Self {
        AlphaBetaConfig {
            time_budget_ms: DEFAULT_SEARCH_TIME_BUDGET_MS,
            max_depth: DEFAULT_ALPHA_BETA_MAX_DEPTH,
            turn_ownership: false,
            closest_enemy: false,
            weakest_enemy: false,
            highest_priority: false,
            model: SearchModelConfig::default(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UctConfig {
    pub time_budget_ms: u64,
    pub max_traversals: u32,
    pub exploration: f32,
    /// Prune retreat moves for units nowhere near an enemy.
    pub consider_distance: bool,
    pub turn_ownership: bool,
    /// Simulated seconds a playout runs past the node it starts from.
    pub playout_horizon: f32,
    /// Seed of the playout random number generator.
    pub seed: u64,
    pub model: SearchModelConfig,
}

impl Default for UctConfig {
    fn default() -> Self {
        UctConfig {
            time_budget_ms: DEFAULT_SEARCH_TIME_BUDGET_MS,
            max_traversals: DEFAULT_UCT_MAX_TRAVERSALS,
            exploration: DEFAULT_UCT_EXPLORATION,
            consider_distance: true,
            turn_ownership: false,
            playout_horizon: 8.0,
            seed: 0,
            model: SearchModelConfig {
                max_joint_moves: 32,
                ..SearchModelConfig::default()
            },
        }
    }
}

//
// Cross-tick context.
//

pub const DEFAULT_PRUNE_INTERVAL: u32 = 64;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ContextConfig {
    /// Ticks between sweeps that evict bookkeeping for units no longer in the squad.
    pub prune_interval: u32,
}

impl Default for ContextConfig {
    fn default() -> Self {
        ContextConfig {
            prune_interval: DEFAULT_PRUNE_INTERVAL,
        }
    }
}

//
// Top level.
//

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchBackend {
    AlphaBeta,
    Uct,
    #[default]
    BehaviorTree,
    Harass,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MicroConfig {
    pub backend: SearchBackend,
    pub priority: PriorityWeights,
    pub behavior: BehaviorConfig,
    pub harass: HarassConfig,
    pub flee: FleeConfig,
    pub alpha_beta: AlphaBetaConfig,
    pub uct: UctConfig,
    pub context: ContextConfig,
}

impl MicroConfig {
    pub fn from_json_str(data: &str) -> Result<MicroConfig, MicroError> {
        let config: MicroConfig = serde_json::from_str(data)?;

        config.validate()?;

        Ok(config)
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<MicroConfig, MicroError> {
        let data = std::fs::read_to_string(path)?;

        MicroConfig::from_json_str(&data)
    }

    pub fn validate(&self) -> Result<(), MicroError> {
        if self.flee.grid_size < 3 {
            return Err(MicroError::Config(format!("flee grid must be at least 3 tiles, got {}", self.flee.grid_size)));
        }

        if self.harass.min_waypoint_distance <= 0.0 || self.harass.min_waypoint_distance > self.harass.waypoint_distance {
            return Err(MicroError::Config(format!(
                "harass waypoint distances must satisfy 0 < min ({}) <= max ({})",
                self.harass.min_waypoint_distance, self.harass.waypoint_distance
            )));
        }

        if !(0.0..=1.0).contains(&self.behavior.focus_fire_tolerance) {
            return Err(MicroError::Config(format!(
                "focus fire tolerance must be within [0, 1], got {}",
                self.behavior.focus_fire_tolerance
            )));
        }

        for (name, model) in [("alpha_beta", &self.alpha_beta.model), ("uct", &self.uct.model)] {
            if model.move_duration <= 0.0 || model.max_joint_moves == 0 {
                return Err(MicroError::Config(format!("{} search needs a positive move duration and joint move cap", name)));
            }
        }

        Ok(())
    }
}
