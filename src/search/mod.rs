pub mod alphabeta;
pub mod state;
pub mod uct;

use crate::config::*;
use crate::unit::*;
use std::time::Duration;

pub use self::alphabeta::AlphaBetaSearch;
pub use self::state::{CombatState, SearchRules, SearchUnit, Side};
pub use self::uct::UctSearch;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ActionKind {
    Attack,
    /// Step directly away from the nearest enemy.
    MoveBack,
    /// Step directly toward the nearest enemy.
    MoveForward,
}

/// One friendly unit's part of a search result.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SearchAction {
    pub unit: UnitTag,
    pub kind: ActionKind,
    pub target: Option<UnitTag>,
    pub position: Point2,
}

impl SearchAction {
    pub fn to_command(&self) -> Option<UnitCommand> {
        match self.kind {
            ActionKind::Attack => self.target.map(|target| UnitCommand::attack(self.unit, target)),
            ActionKind::MoveBack | ActionKind::MoveForward => Some(UnitCommand::move_to(self.unit, self.position)),
        }
    }
}

/// Joint action for the friendly side. An empty move changes nothing.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Move {
    pub actions: Vec<SearchAction>,
}

impl Move {
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn to_commands(&self) -> Vec<UnitCommand> {
        self.actions.iter().filter_map(SearchAction::to_command).collect()
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct SearchStats {
    /// Positions evaluated (alpha-beta) or tree nodes allocated (UCT).
    pub nodes: u64,
    /// Deepest completed iteration (alpha-beta).
    pub depth: u32,
    /// Completed selection-playout-backpropagation rounds (UCT).
    pub traversals: u64,
    pub elapsed: Duration,
    /// Evaluation of the chosen move: score for alpha-beta, estimated win value for UCT.
    pub score: f32,
    /// The deadline cut the search short.
    pub timed_out: bool,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct SearchOutcome {
    pub best_move: Move,
    pub stats: SearchStats,
}

/// An adversarial search over a `CombatState`, bounded by its own wall-clock budget.
pub trait SearchStrategy {
    fn name(&self) -> &'static str;

    /// Best friendly joint move from `root`. Returns an empty move when the
    /// friendly side has no legal action.
    fn search(&mut self, root: &CombatState) -> SearchOutcome;

    fn rules(&self) -> &SearchRules;
}

pub fn strategy_for(config: &MicroConfig) -> Option<Box<dyn SearchStrategy>> {
    match config.backend {
        SearchBackend::AlphaBeta => Some(Box::new(AlphaBetaSearch::new(&config.alpha_beta))),
        SearchBackend::Uct => Some(Box::new(UctSearch::new(&config.uct))),
        SearchBackend::BehaviorTree | SearchBackend::Harass => None,
    }
}
