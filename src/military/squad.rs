use super::behavior::*;
use super::context::*;
use super::harass::*;
use super::priority::*;
use crate::config::*;
use crate::error::*;
use crate::game::{dispatch, CommandSink, GameView};
use crate::search::*;
use crate::unit::*;
use itertools::Itertools;
use log::*;
use std::time::Duration;

/// Units farther than this (squared) from a regroup point walk there; nearer units attack-move.
pub const REGROUP_MOVE_DISTANCE_SQ: f32 = 16.0;

/// Allowed overrun of a search backend's wall-clock budget before it is reported.
pub const SEARCH_OVERRUN_TOLERANCE: Duration = Duration::from_millis(20);

/// A combat group: its roster, its targets, its order and the micro state
/// carried between ticks.
pub struct Squad {
    name: String,
    units: Vec<UnitTag>,
    targets: Vec<UnitTag>,
    order: Order,
    config: MicroConfig,
    context: MicroContext,
    behavior: BehaviorController,
    harass: HarassController,
    strategy: Option<Box<dyn SearchStrategy>>,
    last_backend: Option<SearchBackend>,
    last_search: Option<SearchStats>,
}

impl Squad {
    pub fn new(name: &str, config: MicroConfig) -> Squad {
        Squad {
            name: name.to_string(),
            units: Vec::new(),
            targets: Vec::new(),
            order: Order::default(),
            config,
            context: MicroContext::new(),
            behavior: BehaviorController::default(),
            harass: HarassController,
            strategy: None,
            last_backend: None,
            last_search: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn units(&self) -> &[UnitTag] {
        &self.units
    }

    pub fn targets(&self) -> &[UnitTag] {
        &self.targets
    }

    pub fn order(&self) -> &Order {
        &self.order
    }

    pub fn config(&self) -> &MicroConfig {
        &self.config
    }

    pub fn context(&self) -> &MicroContext {
        &self.context
    }

    /// Statistics of the most recent search backend run, if any.
    pub fn last_search_stats(&self) -> Option<&SearchStats> {
        self.last_search.as_ref()
    }

    /// Replaces the roster. Duplicate tags are dropped, first occurrence wins.
    pub fn set_units(&mut self, units: &[UnitTag]) {
        self.units = units.iter().copied().unique().collect();
    }

    pub fn set_targets(&mut self, targets: &[UnitTag]) {
        self.targets = targets.iter().copied().unique().collect();
    }

    pub fn set_order(&mut self, order: Order) {
        self.order = order;
    }

    pub fn set_config(&mut self, config: MicroConfig) {
        self.config = config;
        self.strategy = None;
        self.last_backend = None;
    }

    pub fn describe_state(&self) -> String {
        format!(
            "Squad {} - {:?} - {} units - {} targets - {:?}",
            self.name,
            self.config.backend,
            self.units.len(),
            self.targets.len(),
            self.order.order_type
        )
    }

    //
    // Snapshot resolution.
    //

    fn resolve_units(&self, game: &dyn GameView) -> Vec<Combatant> {
        self.units
            .iter()
            .filter_map(|tag| match game.unit(*tag) {
                Some(unit) => Some(unit),
                None => {
                    warn!("Squad {} skipping unit: {}", self.name, MicroError::InvalidUnit(*tag));
                    None
                }
            })
            .collect()
    }

    /// Visible targets, without placeholders and, when harassing, without structures that cannot fight back.
    fn resolve_targets(&self, game: &dyn GameView) -> Vec<Combatant> {
        let harassing = self.config.backend == SearchBackend::Harass;

        self.targets
            .iter()
            .filter_map(|tag| match game.unit(*tag) {
                Some(target) => Some(target),
                None => {
                    warn!("Squad {} skipping target: {}", self.name, MicroError::InvalidTarget(*tag));
                    None
                }
            })
            .filter(|target| !target.is_placeholder())
            .filter(|target| !(harassing && target.is_passive_structure()))
            .collect()
    }

    //
    // Execution.
    //

    /// Runs one micro pass with the configured backend and issues the resulting
    /// commands. Returns how many commands reached the sink.
    pub fn execute(&mut self, game: &dyn GameView, sink: &mut dyn CommandSink) -> usize {
        let tick = game.game_tick();

        self.context.prune(&self.units, tick, self.config.context.prune_interval);

        let units = self.resolve_units(game);

        if units.is_empty() {
            return 0;
        }

        let targets = self.resolve_targets(game);
        let backend = self.config.backend;

        if self.last_backend != Some(backend) {
            info!("Squad {} using {:?} micro", self.name, backend);

            self.strategy = strategy_for(&self.config);
            self.last_backend = Some(backend);
        }

        let commands = match backend {
            SearchBackend::Harass => self.harass.decide(game, &units, &targets, &self.order, &self.config, &self.context),
            SearchBackend::AlphaBeta | SearchBackend::Uct => self.search(game, &units, &targets),
            SearchBackend::BehaviorTree => self
                .behavior
                .decide(game, &units, &targets, &self.order, &self.config, &mut self.context),
        };

        self.issue(game, sink, &commands, &units, &targets)
    }

    fn search(&mut self, game: &dyn GameView, units: &[Combatant], targets: &[Combatant]) -> Vec<UnitCommand> {
        let budget = Duration::from_millis(match self.config.backend {
            SearchBackend::Uct => self.config.uct.time_budget_ms,
            _ => self.config.alpha_beta.time_budget_ms,
        });

        let Some(strategy) = self.strategy.as_mut() else {
            return Vec::new();
        };

        let roster: Vec<UnitTag> = units.iter().map(|unit| unit.tag).collect();
        self.context.turn_ownership_mut().sync(&roster);

        let evaluator = TargetEvaluator::new(game, &self.config.priority, self.order.order_type);
        let ownership = self.context.turn_ownership();
        let root = CombatState::new(game, &evaluator, units, targets, |tag| ownership.has_acted(tag));

        let outcome = strategy.search(&root);

        if outcome.stats.elapsed > budget + SEARCH_OVERRUN_TOLERANCE {
            warn!(
                "Squad {} {} search overran its budget: {:?} of {:?}",
                self.name,
                strategy.name(),
                outcome.stats.elapsed,
                budget
            );
        }

        if strategy.rules().turn_ownership {
            for action in &outcome.best_move.actions {
                self.context.turn_ownership_mut().mark_acted(action.unit);
            }
        }

        if outcome.best_move.is_empty() {
            debug!("Squad {} {} search found no legal move", self.name, strategy.name());
        }

        let commands = outcome.best_move.to_commands();

        self.last_search = Some(outcome.stats);

        commands
    }

    /// Sends every command that addresses a resolved unit and target, skipping
    /// attacks identical to the one already in progress.
    fn issue(&mut self, game: &dyn GameView, sink: &mut dyn CommandSink, commands: &[UnitCommand], units: &[Combatant], targets: &[Combatant]) -> usize {
        let tick = game.game_tick();
        let mut issued = 0;

        for command in commands {
            if let Err(err) = validate_command(command, units, targets) {
                warn!("Squad {} dropping {}: {}", self.name, command.action, err);
                continue;
            }

            if !self.context.should_issue(command) {
                trace!("Squad {} unit {} already executing {}", self.name, command.unit, command.action);
                continue;
            }

            dispatch(sink, command);

            self.context.record_command(command, tick);

            issued += 1;
        }

        issued
    }

    /// Gathers the squad at `position`. Returns how many commands were issued.
    pub fn regroup(&mut self, game: &dyn GameView, sink: &mut dyn CommandSink, position: Point2) -> usize {
        let units = self.resolve_units(game);

        let commands: Vec<UnitCommand> = units
            .iter()
            .map(|unit| {
                if unit.position.distance_sq(position) > REGROUP_MOVE_DISTANCE_SQ {
                    UnitCommand::move_to(unit.tag, position)
                } else {
                    UnitCommand::new(unit.tag, PrimitiveAction::AttackMove(position))
                }
            })
            .collect();

        self.issue(game, sink, &commands, &units, &[])
    }

    //
    // Metrics.
    //

    pub fn average_squad_speed(&self, game: &dyn GameView) -> f32 {
        average_speed(&self.resolve_units(game))
    }

    pub fn average_targets_speed(&self, game: &dyn GameView) -> f32 {
        average_speed(&self.resolve_targets(game))
    }

    /// Damage potential of the squad against its targets.
    pub fn squad_power(&self, game: &dyn GameView) -> f32 {
        group_power(game, &self.resolve_units(game), &self.resolve_targets(game))
    }

    /// Damage potential of the targets against the squad.
    pub fn targets_power(&self, game: &dyn GameView) -> f32 {
        group_power(game, &self.resolve_targets(game), &self.resolve_units(game))
    }
}

fn validate_command(command: &UnitCommand, units: &[Combatant], targets: &[Combatant]) -> MicroResult<()> {
    if !units.iter().any(|unit| unit.tag == command.unit) {
        return Err(MicroError::InvalidUnit(command.unit));
    }

    if let PrimitiveAction::Attack(target) = command.action {
        if !targets.iter().any(|candidate| candidate.tag == target) {
            return Err(MicroError::InvalidTarget(target));
        }
    }

    Ok(())
}

fn average_speed(units: &[Combatant]) -> f32 {
    if units.is_empty() {
        0.0
    } else {
        units.iter().map(|unit| unit.speed).sum::<f32>() / units.len() as f32
    }
}

/// Σ sqrt(hit points) × mean dps against the opposing group.
fn group_power(game: &dyn GameView, group: &[Combatant], opponents: &[Combatant]) -> f32 {
    if opponents.is_empty() {
        return 0.0;
    }

    group
        .iter()
        .map(|unit| {
            let dps = opponents.iter().map(|opponent| game.dps(unit, opponent)).sum::<f32>() / opponents.len() as f32;

            unit.hit_points().sqrt() * dps
        })
        .sum()
}
