use super::*;
use crate::config::*;
use crate::game::GameView;
use crate::military::priority::*;
use crate::unit::*;
use itertools::Itertools;
use std::rc::Rc;

/// Shortest simulated duration of any action, so the clock always advances.
pub const MIN_ACTION_DURATION: f32 = 0.05;

/// Tolerance used when comparing simulated times.
const TIME_EPSILON: f32 = 1.0e-4;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Side {
    Friendly,
    Hostile,
}

impl Side {
    pub fn opponent(self) -> Side {
        match self {
            Side::Friendly => Side::Hostile,
            Side::Hostile => Side::Friendly,
        }
    }
}

/// Move-generation switches shared by both backends.
#[derive(Clone, Debug, Default)]
pub struct SearchRules {
    pub model: SearchModelConfig,
    pub turn_ownership: bool,
    pub consider_distance: bool,
    pub closest_enemy: bool,
    pub weakest_enemy: bool,
    pub highest_priority: bool,
}

impl SearchRules {
    pub fn from_alpha_beta(config: &AlphaBetaConfig) -> SearchRules {
        SearchRules {
            model: config.model.clone(),
            turn_ownership: config.turn_ownership,
            consider_distance: false,
            closest_enemy: config.closest_enemy,
            weakest_enemy: config.weakest_enemy,
            highest_priority: config.highest_priority,
        }
    }

    pub fn from_uct(config: &UctConfig) -> SearchRules {
        SearchRules {
            model: config.model.clone(),
            turn_ownership: config.turn_ownership,
            consider_distance: config.consider_distance,
            ..Default::default()
        }
    }

    fn restricts_attacks(&self) -> bool {
        self.closest_enemy || self.weakest_enemy || self.highest_priority
    }
}

/// A unit inside the simulation.
#[derive(Clone, Debug, PartialEq)]
pub struct SearchUnit {
    pub tag: UnitTag,
    pub side: Side,
    pub position: Point2,
    pub hit_points: f32,
    pub speed: f32,
    pub weapon_period: f32,
    /// Simulated time at which the weapon can fire again.
    pub weapon_ready_at: f32,
    /// Simulated time at which the current action completes.
    pub busy_until: f32,
    /// Already acted in the current resolution window.
    pub has_acted: bool,
}

impl SearchUnit {
    pub fn is_alive(&self) -> bool {
        self.hit_points > 0.0
    }
}

/// One unit's part of a joint move, addressed by index into the state.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct UnitAction {
    pub unit: usize,
    pub kind: ActionKind,
    pub target: Option<usize>,
    pub destination: Point2,
}

/// Simultaneous actions of every unit of one side that acts this ply. Empty is a pass.
pub type JointMove = Vec<UnitAction>;

/// Per-pair tables computed once per search from game queries.
#[derive(Debug)]
struct PairTable {
    count: usize,
    range: Vec<f32>,
    dps: Vec<f32>,
    priority: Vec<f32>,
    best_dps: Vec<f32>,
    max_range: Vec<f32>,
    initial_strength: [f32; 2],
    initial_hit_strength: [f32; 2],
}

impl PairTable {
    fn at(&self, values: &[f32], attacker: usize, target: usize) -> f32 {
        values[attacker * self.count + target]
    }
}

fn side_index(side: Side) -> usize {
    match side {
        Side::Friendly => 0,
        Side::Hostile => 1,
    }
}

/// Duration-aware combat simulation. Friendly units come first, hostile units after.
#[derive(Clone, Debug)]
pub struct CombatState {
    time: f32,
    units: Vec<SearchUnit>,
    table: Rc<PairTable>,
    last_side: Option<Side>,
}

impl CombatState {
    pub fn new<F>(game: &dyn GameView, evaluator: &TargetEvaluator, friendly: &[Combatant], hostile: &[Combatant], has_acted: F) -> CombatState
    where
        F: Fn(UnitTag) -> bool,
    {
        let combatants: Vec<(&Combatant, Side)> = friendly
            .iter()
            .map(|unit| (unit, Side::Friendly))
            .chain(hostile.iter().map(|unit| (unit, Side::Hostile)))
            .collect();

        let count = combatants.len();
        let mut range = vec![0.0; count * count];
        let mut dps = vec![0.0; count * count];
        let mut priority = vec![0.0; count * count];

        for (i, (attacker, attacker_side)) in combatants.iter().enumerate() {
            for (j, (target, target_side)) in combatants.iter().enumerate() {
                if attacker_side == target_side {
                    continue;
                }

                range[i * count + j] = game.attack_range(attacker, target);
                dps[i * count + j] = game.dps(attacker, target);
                priority[i * count + j] = evaluator.priority(attacker, target, PriorityMode::empty());
            }
        }

        let best_dps = (0..count)
            .map(|i| (0..count).map(|j| dps[i * count + j]).fold(0.0, f32::max))
            .collect();

        let max_range = (0..count)
            .map(|i| (0..count).map(|j| range[i * count + j]).fold(0.0, f32::max))
            .collect();

        let units: Vec<SearchUnit> = combatants
            .iter()
            .map(|(unit, side)| SearchUnit {
                tag: unit.tag,
                side: *side,
                position: unit.position,
                hit_points: unit.hit_points(),
                speed: unit.speed.max(0.0),
                weapon_period: unit.weapon_period.max(MIN_ACTION_DURATION),
                weapon_ready_at: unit.weapon_cooldown.max(0.0),
                busy_until: 0.0,
                has_acted: *side == Side::Friendly && has_acted(unit.tag),
            })
            .collect();

        let mut state = CombatState {
            time: 0.0,
            units,
            table: Rc::new(PairTable {
                count,
                range,
                dps,
                priority,
                best_dps,
                max_range,
                initial_strength: [0.0; 2],
                initial_hit_strength: [0.0; 2],
            }),
            last_side: None,
        };

        let initial_strength = [state.strength(Side::Friendly), state.strength(Side::Hostile)];
        let initial_hit_strength = [state.hit_strength(Side::Friendly), state.hit_strength(Side::Hostile)];

        if let Some(table) = Rc::get_mut(&mut state.table) {
            table.initial_strength = initial_strength;
            table.initial_hit_strength = initial_hit_strength;
        }

        state
    }

    pub fn time(&self) -> f32 {
        self.time
    }

    pub fn units(&self) -> &[SearchUnit] {
        &self.units
    }

    fn alive(&self, side: Side) -> impl Iterator<Item = (usize, &SearchUnit)> {
        self.units
            .iter()
            .enumerate()
            .filter(move |(_, unit)| unit.side == side && unit.is_alive())
    }

    pub fn is_terminal(&self) -> bool {
        self.alive(Side::Friendly).next().is_none() || self.alive(Side::Hostile).next().is_none()
    }

    //
    // Evaluation.
    //

    /// Lifetime damage: the sum of `sqrt(hit points) * dps` over living units.
    pub fn strength(&self, side: Side) -> f32 {
        self.alive(side)
            .map(|(index, unit)| unit.hit_points.sqrt() * self.table.best_dps[index])
            .sum()
    }

    fn hit_strength(&self, side: Side) -> f32 {
        self.alive(side).map(|(_, unit)| unit.hit_points.sqrt()).sum()
    }

    /// Friendly strength minus hostile strength.
    pub fn evaluate(&self) -> f32 {
        self.strength(Side::Friendly) - self.strength(Side::Hostile)
    }

    fn remaining_fraction(&self, side: Side) -> f32 {
        let index = side_index(side);

        if self.table.initial_strength[index] > 0.0 {
            self.strength(side) / self.table.initial_strength[index]
        } else if self.table.initial_hit_strength[index] > 0.0 {
            self.hit_strength(side) / self.table.initial_hit_strength[index]
        } else {
            0.0
        }
    }

    /// Evaluation mapped to `[0, 1]`, where 1 means the hostile side is wiped out
    /// without friendly losses.
    pub fn win_value(&self) -> f32 {
        (0.5 + 0.5 * (self.remaining_fraction(Side::Friendly) - self.remaining_fraction(Side::Hostile))).clamp(0.0, 1.0)
    }

    //
    // Turn order.
    //

    fn is_ready(&self, unit: &SearchUnit) -> bool {
        unit.is_alive() && unit.busy_until <= self.time + TIME_EPSILON
    }

    /// Side owning a unit whose action has completed. When both do, the side
    /// that did not move last goes first.
    pub fn side_to_move(&self) -> Option<Side> {
        let friendly = self.alive(Side::Friendly).any(|(_, unit)| self.is_ready(unit));
        let hostile = self.alive(Side::Hostile).any(|(_, unit)| self.is_ready(unit));

        match (friendly, hostile) {
            (true, true) => Some(self.last_side.map(Side::opponent).unwrap_or(Side::Friendly)),
            (true, false) => Some(Side::Friendly),
            (false, true) => Some(Side::Hostile),
            (false, false) => None,
        }
    }

    fn ready_units(&self, side: Side) -> Vec<usize> {
        self.alive(side)
            .filter(|(_, unit)| self.is_ready(unit))
            .map(|(index, _)| index)
            .collect()
    }

    /// Ready units allowed to act. With turn ownership, units that already acted
    /// in this window wait until every ready unit able to act has had its turn.
    fn eligible_units(&self, side: Side, rules: &SearchRules) -> Vec<usize> {
        let ready = self.ready_units(side);

        if !rules.turn_ownership {
            return ready;
        }

        let fresh: Vec<usize> = ready
            .iter()
            .copied()
            .filter(|index| !self.units[*index].has_acted && !self.unit_options(*index, rules).is_empty())
            .collect();

        if fresh.is_empty() {
            ready
        } else {
            fresh
        }
    }

    fn advance_clock(&mut self) {
        let next = self
            .units
            .iter()
            .filter(|unit| unit.is_alive())
            .map(|unit| unit.busy_until)
            .fold(f32::INFINITY, f32::min);

        if next.is_finite() && next > self.time {
            self.time = next;
        }
    }

    //
    // Move generation.
    //

    fn nearest_enemy(&self, index: usize) -> Option<(usize, f32)> {
        let unit = &self.units[index];

        self.alive(unit.side.opponent())
            .map(|(enemy, other)| (enemy, unit.position.distance(other.position)))
            .min_by(|(_, a), (_, b)| a.total_cmp(b))
    }

    fn attack_options(&self, index: usize, rules: &SearchRules) -> Vec<UnitAction> {
        let unit = &self.units[index];

        if unit.weapon_ready_at > self.time + TIME_EPSILON {
            return Vec::new();
        }

        let table = &self.table;

        let in_range: Vec<(usize, f32)> = self
            .alive(unit.side.opponent())
            .filter(|(enemy, _)| table.at(&table.dps, index, *enemy) > 0.0)
            .map(|(enemy, other)| (enemy, unit.position.distance(other.position)))
            .filter(|(enemy, distance)| *distance <= table.at(&table.range, index, *enemy))
            .collect();

        let targets: Vec<usize> = if rules.restricts_attacks() {
            let mut chosen = Vec::new();

            if rules.closest_enemy {
                chosen.extend(in_range.iter().min_by(|a, b| a.1.total_cmp(&b.1)).map(|(enemy, _)| *enemy));
            }

            if rules.weakest_enemy {
                chosen.extend(
                    in_range
                        .iter()
                        .min_by(|a, b| self.units[a.0].hit_points.total_cmp(&self.units[b.0].hit_points))
                        .map(|(enemy, _)| *enemy),
                );
            }

            if rules.highest_priority {
                chosen.extend(
                    in_range
                        .iter()
                        .max_by(|a, b| table.at(&table.priority, index, a.0).total_cmp(&table.at(&table.priority, index, b.0)))
                        .map(|(enemy, _)| *enemy),
                );
            }

            chosen.into_iter().unique().collect()
        } else {
            in_range.iter().map(|(enemy, _)| *enemy).collect()
        };

        targets
            .into_iter()
            .map(|target| UnitAction {
                unit: index,
                kind: ActionKind::Attack,
                target: Some(target),
                destination: self.units[target].position,
            })
            .collect()
    }

    fn movement_options(&self, index: usize, rules: &SearchRules) -> Vec<UnitAction> {
        let unit = &self.units[index];

        if unit.speed <= 0.0 {
            return Vec::new();
        }

        let Some((enemy, distance)) = self.nearest_enemy(index) else {
            return Vec::new();
        };

        let step = unit.speed * rules.model.move_duration;
        let enemy_position = self.units[enemy].position;
        let mut options = Vec::with_capacity(2);

        if distance > TIME_EPSILON {
            options.push(UnitAction {
                unit: index,
                kind: ActionKind::MoveForward,
                target: None,
                destination: unit.position.towards(enemy_position, step.min(distance)),
            });
        }

        let far_away = distance > self.table.max_range[index] + rules.model.engage_slack;

        if !(rules.consider_distance && far_away) {
            options.push(UnitAction {
                unit: index,
                kind: ActionKind::MoveBack,
                target: None,
                destination: unit.position.away_from(enemy_position, step),
            });
        }

        options
    }

    /// Attacks first, then forward, then back.
    pub fn unit_options(&self, index: usize, rules: &SearchRules) -> Vec<UnitAction> {
        let mut options = self.attack_options(index, rules);
        options.extend(self.movement_options(index, rules));
        options
    }

    /// Joint moves of every eligible unit, capped at `max_joint_moves`. Moves
    /// are generated by increasing total option rank: first every unit's
    /// preferred option, then each single unit deviating by one rank, and so
    /// on. Empty when no eligible unit has a legal option.
    pub fn joint_moves(&self, side: Side, rules: &SearchRules) -> Vec<JointMove> {
        let per_unit: Vec<Vec<UnitAction>> = self
            .eligible_units(side, rules)
            .into_iter()
            .map(|index| self.unit_options(index, rules))
            .filter(|options| !options.is_empty())
            .collect();

        if per_unit.is_empty() {
            return Vec::new();
        }

        let sizes: Vec<usize> = per_unit.iter().map(|options| options.len()).collect();

        ranked_combinations(&sizes, rules.model.max_joint_moves.max(1))
            .into_iter()
            .map(|ranks| ranks.iter().enumerate().map(|(unit, rank)| per_unit[unit][*rank]).collect())
            .collect()
    }

    /// Deterministic playout policy: shoot the highest priority target in range,
    /// otherwise advance on the nearest enemy.
    pub fn scripted_move(&self, side: Side, rules: &SearchRules) -> JointMove {
        let table = &self.table;

        self.eligible_units(side, rules)
            .into_iter()
            .filter_map(|index| {
                let options = self.unit_options(index, rules);

                let attack = options
                    .iter()
                    .filter(|option| option.kind == ActionKind::Attack)
                    .max_by(|a, b| {
                        let a = a.target.map(|target| table.at(&table.priority, index, target)).unwrap_or(0.0);
                        let b = b.target.map(|target| table.at(&table.priority, index, target)).unwrap_or(0.0);
                        a.total_cmp(&b)
                    })
                    .copied();

                attack.or_else(|| options.iter().find(|option| option.kind == ActionKind::MoveForward).copied())
            })
            .collect()
    }

    //
    // Transitions.
    //

    /// Applies `joint` for `side`, lets ready units without an action wait for
    /// their next event, then advances the clock to the next completion.
    pub fn apply(&mut self, side: Side, joint: &[UnitAction], rules: &SearchRules) {
        let eligible = self.eligible_units(side, rules);
        let time = self.time;

        for action in joint {
            match action.kind {
                ActionKind::Attack => {
                    let Some(target) = action.target else {
                        continue;
                    };

                    let period = self.units[action.unit].weapon_period;
                    let damage = self.table.at(&self.table.dps, action.unit, target) * period;

                    self.units[target].hit_points -= damage;

                    let unit = &mut self.units[action.unit];
                    unit.weapon_ready_at = time + period;
                    unit.busy_until = time + period.max(MIN_ACTION_DURATION);
                }
                ActionKind::MoveBack | ActionKind::MoveForward => {
                    let unit = &mut self.units[action.unit];
                    unit.position = action.destination;
                    unit.busy_until = time + rules.model.move_duration.max(MIN_ACTION_DURATION);
                }
            }

            self.units[action.unit].has_acted = true;
        }

        for index in eligible {
            if joint.iter().any(|action| action.unit == index) {
                continue;
            }

            let unit = &mut self.units[index];

            unit.busy_until = if unit.weapon_ready_at > time + TIME_EPSILON {
                unit.weapon_ready_at
            } else {
                time + rules.model.move_duration.max(MIN_ACTION_DURATION)
            };
        }

        let all_acted = self
            .units
            .iter()
            .filter(|unit| unit.side == side && unit.is_alive())
            .all(|unit| unit.has_acted);

        if all_acted {
            for unit in self.units.iter_mut().filter(|unit| unit.side == side) {
                unit.has_acted = false;
            }
        }

        self.last_side = Some(side);
        self.advance_clock();
    }

    pub fn pass(&mut self, side: Side, rules: &SearchRules) {
        self.apply(side, &[], rules);
    }

    pub fn to_move(&self, joint: &[UnitAction]) -> Move {
        Move {
            actions: joint
                .iter()
                .map(|action| SearchAction {
                    unit: self.units[action.unit].tag,
                    kind: action.kind,
                    target: action.target.map(|target| self.units[target].tag),
                    position: action.destination,
                })
                .collect(),
        }
    }
}

/// Index tuples into option lists of the given sizes, ordered by the sum of
/// their indices and limited to `cap` entries.
fn ranked_combinations(sizes: &[usize], cap: usize) -> Vec<Vec<usize>> {
    // Largest rank sum still reachable from each position onwards.
    let mut slack = vec![0; sizes.len() + 1];
    for position in (0..sizes.len()).rev() {
        slack[position] = slack[position + 1] + sizes[position].saturating_sub(1);
    }

    let mut output = Vec::new();
    let mut current = Vec::with_capacity(sizes.len());

    for total in 0..=slack[0] {
        fill_ranks(sizes, &slack, total, &mut current, &mut output, cap);

        if output.len() >= cap {
            break;
        }
    }

    output
}

fn fill_ranks(sizes: &[usize], slack: &[usize], remaining: usize, current: &mut Vec<usize>, output: &mut Vec<Vec<usize>>, cap: usize) {
    if output.len() >= cap {
        return;
    }

    let position = current.len();

    if position == sizes.len() {
        if remaining == 0 {
            output.push(current.clone());
        }
        return;
    }

    let lowest = remaining.saturating_sub(slack[position + 1]);
    let highest = remaining.min(sizes[position].saturating_sub(1));

    for rank in lowest..=highest {
        current.push(rank);
        fill_ranks(sizes, slack, remaining - rank, current, output, cap);
        current.pop();

        if output.len() >= cap {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::*;

    fn duel(friendly_x: f32, enemy_x: f32) -> ScenarioWorld {
        ScenarioWorld::new(vec![
            ScenarioUnit::new(
                Combatant {
                    tag: UnitTag(1),
                    position: Point2::new(friendly_x, 0.0),
                    health: 100.0,
                    health_max: 100.0,
                    speed: 2.25,
                    weapon_period: 1.0,
                    flags: UnitFlags::COMBAT,
                    ..Default::default()
                },
                WeaponProfile::new(6.0, 10.0),
            ),
            ScenarioUnit::new(
                Combatant {
                    tag: UnitTag(2),
                    alliance: Alliance::Enemy,
                    position: Point2::new(enemy_x, 0.0),
                    health: 100.0,
                    health_max: 100.0,
                    weapon_period: 1.0,
                    flags: UnitFlags::COMBAT,
                    ..Default::default()
                },
                WeaponProfile::new(1.0, 20.0),
            ),
        ])
    }

    fn state_of(world: &ScenarioWorld) -> CombatState {
        let weights = PriorityWeights::default();
        let evaluator = TargetEvaluator::new(world, &weights, OrderType::Attack);
        let friendly = vec![world.unit(UnitTag(1)).unwrap()];
        let hostile = vec![world.unit(UnitTag(2)).unwrap()];

        CombatState::new(world, &evaluator, &friendly, &hostile, |_| false)
    }

    #[test]
    fn friendly_side_moves_first_and_sides_alternate() {
        let world = duel(0.0, 5.0);
        let rules = SearchRules::default();
        let mut state = state_of(&world);

        assert_eq!(state.side_to_move(), Some(Side::Friendly));

        let moves = state.joint_moves(Side::Friendly, &rules);
        assert_eq!(moves[0][0].kind, ActionKind::Attack);
        assert_eq!(moves.len(), 3);

        state.apply(Side::Friendly, &moves[0], &rules);
        assert_eq!(state.side_to_move(), Some(Side::Hostile));
        assert_eq!(state.units()[1].hit_points, 90.0);
    }

    #[test]
    fn stationary_side_without_options_passes_and_time_advances() {
        let world = duel(0.0, 5.0);
        let rules = SearchRules::default();
        let mut state = state_of(&world);

        let attack = state.joint_moves(Side::Friendly, &rules)[0].clone();
        state.apply(Side::Friendly, &attack, &rules);

        assert!(state.joint_moves(Side::Hostile, &rules).is_empty());
        state.pass(Side::Hostile, &rules);

        assert_eq!(state.time(), 1.0);
        assert_eq!(state.side_to_move(), Some(Side::Friendly));
    }

    #[test]
    fn evaluation_rewards_damage_dealt() {
        let world = duel(0.0, 5.0);
        let rules = SearchRules::default();
        let mut state = state_of(&world);
        let before = state.evaluate();
        let win_before = state.win_value();

        let attack = state.joint_moves(Side::Friendly, &rules)[0].clone();
        state.apply(Side::Friendly, &attack, &rules);

        assert!(state.evaluate() > before);
        assert!(state.win_value() > win_before);
        assert_eq!(win_before, 0.5);
    }

    #[test]
    fn consider_distance_prunes_retreats_far_from_enemies() {
        let world = duel(0.0, 30.0);
        let rules = SearchRules {
            consider_distance: true,
            ..Default::default()
        };
        let state = state_of(&world);

        let options = state.unit_options(0, &rules);

        assert_eq!(options.len(), 1);
        assert_eq!(options[0].kind, ActionKind::MoveForward);
        assert_eq!(options[0].destination, Point2::new(2.25, 0.0));
    }

    #[test]
    fn capped_joint_moves_still_vary_every_unit() {
        let mut units = Vec::new();

        for i in 0..8 {
            for (tag, alliance, x) in [(i + 1, Alliance::Own, 0.0), (i + 101, Alliance::Enemy, 7.0)] {
                units.push(ScenarioUnit::new(
                    Combatant {
                        tag: UnitTag(tag),
                        alliance,
                        position: Point2::new(x, i as f32),
                        health: 45.0,
                        health_max: 45.0,
                        speed: 2.25,
                        weapon_period: 1.0,
                        flags: UnitFlags::COMBAT,
                        ..Default::default()
                    },
                    WeaponProfile::new(6.0, 10.0),
                ));
            }
        }

        let world = ScenarioWorld::new(units);
        let weights = PriorityWeights::default();
        let evaluator = TargetEvaluator::new(&world, &weights, OrderType::Attack);
        let friendly: Vec<Combatant> = world.tags_of(Alliance::Own).into_iter().filter_map(|tag| world.unit(tag)).collect();
        let hostile: Vec<Combatant> = world.tags_of(Alliance::Enemy).into_iter().filter_map(|tag| world.unit(tag)).collect();
        let state = CombatState::new(&world, &evaluator, &friendly, &hostile, |_| false);

        let rules = SearchRules::from_alpha_beta(&AlphaBetaConfig::default());
        let moves = state.joint_moves(Side::Friendly, &rules);

        assert_eq!(moves.len(), rules.model.max_joint_moves);
        assert!(moves.iter().all(|joint| joint.len() == 8));

        for unit in 0..8 {
            let kinds: Vec<ActionKind> = moves.iter().map(|joint| joint[unit].kind).unique().collect();
            assert_eq!(kinds.len(), 2, "unit {} only tried {:?}", unit, kinds);
        }

        assert!(moves[0].iter().all(|action| action.kind == ActionKind::MoveForward));
    }

    #[test]
    fn ranked_combinations_grow_by_total_rank() {
        assert_eq!(
            ranked_combinations(&[2, 3], 10),
            vec![vec![0, 0], vec![0, 1], vec![1, 0], vec![0, 2], vec![1, 1], vec![1, 2]]
        );
        assert_eq!(ranked_combinations(&[3, 3, 3], 4), vec![vec![0, 0, 0], vec![0, 0, 1], vec![0, 1, 0], vec![1, 0, 0]]);
        assert_eq!(ranked_combinations(&[1], 5), vec![vec![0]]);
    }

    #[test]
    fn turn_ownership_skips_units_that_already_acted() {
        let mut world = duel(0.0, 5.0);
        let mut second = world.units[0].clone();
        second.unit.tag = UnitTag(3);
        world.add_unit(second);

        let weights = PriorityWeights::default();
        let evaluator = TargetEvaluator::new(&world, &weights, OrderType::Attack);
        let friendly = vec![world.unit(UnitTag(1)).unwrap(), world.unit(UnitTag(3)).unwrap()];
        let hostile = vec![world.unit(UnitTag(2)).unwrap()];
        let state = CombatState::new(&world, &evaluator, &friendly, &hostile, |tag| tag == UnitTag(1));

        let rules = SearchRules {
            turn_ownership: true,
            ..Default::default()
        };

        let moves = state.joint_moves(Side::Friendly, &rules);
        assert!(moves.iter().all(|joint| joint.len() == 1 && joint[0].unit == 1));

        let unrestricted = state.joint_moves(Side::Friendly, &SearchRules::default());
        assert!(unrestricted.iter().all(|joint| joint.len() == 2));
    }
}
