use super::context::*;
use super::priority::*;
use crate::config::*;
use crate::findnearest::*;
use crate::game::GameView;
use crate::unit::*;
use log::*;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Status {
    Success,
    Failure,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Condition {
    /// A target is within engagement range.
    EnemyInSight,
    /// The best target in sight can shoot beyond melee range.
    EnemyRanged,
    /// A neutral pickup is visible.
    PickupInSight,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Task {
    /// Shoot the squad's shared focus target.
    FocusFire,
    /// Shoot the best target, backing away while reloading if it could close in.
    Kite,
    GoToPickup,
    GoToObjective,
}

/// Decision tree evaluated top-down once per unit per tick.
#[derive(Clone, Debug, PartialEq)]
pub enum BehaviorNode {
    /// Succeeds on the first child that succeeds.
    Selector(Vec<BehaviorNode>),
    /// Fails on the first child that fails.
    Sequence(Vec<BehaviorNode>),
    Condition(Condition),
    Task(Task),
}

impl BehaviorNode {
    /// Engage what is in sight, otherwise collect pickups, otherwise head for the objective.
    pub fn skirmisher() -> BehaviorNode {
        BehaviorNode::Selector(vec![
            BehaviorNode::Sequence(vec![
                BehaviorNode::Condition(Condition::EnemyInSight),
                BehaviorNode::Selector(vec![
                    BehaviorNode::Sequence(vec![
                        BehaviorNode::Condition(Condition::EnemyRanged),
                        BehaviorNode::Task(Task::FocusFire),
                    ]),
                    BehaviorNode::Task(Task::Kite),
                ]),
            ]),
            BehaviorNode::Sequence(vec![
                BehaviorNode::Condition(Condition::PickupInSight),
                BehaviorNode::Task(Task::GoToPickup),
            ]),
            BehaviorNode::Task(Task::GoToObjective),
        ])
    }

    pub fn tick(&self, blackboard: &mut UnitBlackboard) -> Status {
        let success = match self {
            BehaviorNode::Selector(children) => children.iter().any(|child| child.tick(blackboard) == Status::Success),
            BehaviorNode::Sequence(children) => children.iter().all(|child| child.tick(blackboard) == Status::Success),
            BehaviorNode::Condition(condition) => blackboard.check(*condition),
            BehaviorNode::Task(task) => blackboard.run(*task),
        };

        if success {
            Status::Success
        } else {
            Status::Failure
        }
    }
}

/// Everything a single unit's tree evaluation reads, plus the action it produces.
pub struct UnitBlackboard<'a> {
    game: &'a dyn GameView,
    config: &'a BehaviorConfig,
    unit: &'a Combatant,
    target: Option<&'a Combatant>,
    target_ranged: bool,
    focus_target: Option<&'a Combatant>,
    pickup: Option<Point2>,
    objective: Point2,
    kite_phase: KitePhase,
    action: Option<PrimitiveAction>,
}

impl<'a> UnitBlackboard<'a> {
    fn check(&self, condition: Condition) -> bool {
        match condition {
            Condition::EnemyInSight => self.target.is_some(),
            Condition::EnemyRanged => self.target.is_some() && self.target_ranged,
            Condition::PickupInSight => self.pickup.is_some(),
        }
    }

    fn run(&mut self, task: Task) -> bool {
        match task {
            Task::FocusFire => match self.focus_target.or(self.target) {
                Some(target) => {
                    self.engage(target);
                    true
                }
                None => false,
            },
            Task::Kite => match self.target {
                Some(target) => {
                    self.kite(target);
                    true
                }
                None => false,
            },
            Task::GoToPickup => match self.pickup {
                Some(pickup) => {
                    self.action = Some(PrimitiveAction::MoveTo(pickup));
                    true
                }
                None => false,
            },
            Task::GoToObjective => {
                self.action = Some(PrimitiveAction::MoveTo(self.objective));
                true
            }
        }
    }

    fn engage(&mut self, target: &Combatant) {
        let range = self.game.attack_range(self.unit, target);

        if self.unit.position.distance(target.position) > range {
            self.kite_phase = KitePhase::Approaching;
            self.action = Some(PrimitiveAction::MoveTo(target.position));
        } else {
            self.kite_phase = KitePhase::Firing;
            self.action = Some(PrimitiveAction::Attack(target.tag));
        }
    }

    fn kite(&mut self, target: &Combatant) {
        let distance = self.unit.position.distance(target.position);
        let range = self.game.attack_range(self.unit, target);
        let time_to_enter = ((distance - range) / self.unit.safe_speed()).max(0.0);

        // Step back whenever the weapon stays down longer than it takes to get back into range.
        if self.config.kite && target.is_combat() && time_to_enter < self.unit.weapon_cooldown {
            self.kite_phase = KitePhase::Retreating;
            self.action = Some(PrimitiveAction::MoveTo(self.unit.position + (self.unit.position - target.position)));
        } else {
            self.engage(target);
        }
    }
}

/// Per-unit fallback controller sharing one focus target across the squad.
pub struct BehaviorController {
    tree: BehaviorNode,
}

impl Default for BehaviorController {
    fn default() -> Self {
        BehaviorController::new(BehaviorNode::skirmisher())
    }
}

impl BehaviorController {
    pub fn new(tree: BehaviorNode) -> BehaviorController {
        BehaviorController { tree }
    }

    pub fn decide(
        &self,
        game: &dyn GameView,
        units: &[Combatant],
        targets: &[Combatant],
        order: &Order,
        config: &MicroConfig,
        context: &mut MicroContext,
    ) -> Vec<UnitCommand> {
        let evaluator = TargetEvaluator::new(game, &config.priority, order.order_type);
        let behavior = &config.behavior;

        let focus = select_focus_target(&evaluator, units, targets, behavior, context.focus_target());

        if focus.map(|target| target.tag) != context.focus_target() {
            debug!("Squad focus target changed to {:?}", focus.map(|target| target.tag));
        }

        context.set_focus_target(focus.map(|target| target.tag));

        let pickups = game.pickups();

        let mut commands = Vec::with_capacity(units.len());

        for unit in units {
            let in_sight: Vec<Combatant> = targets
                .iter()
                .filter(|target| unit.position.distance(target.position) <= behavior.engagement_range)
                .copied()
                .collect();

            let target = evaluator.best_target(unit, &in_sight, PriorityMode::empty()).map(|(target, _)| target);

            let mut blackboard = UnitBlackboard {
                game,
                config: behavior,
                unit,
                target,
                target_ranged: target.map(|target| evaluator.is_ranged(target)).unwrap_or(false),
                focus_target: focus.filter(|focus| evaluator.priority(unit, focus, PriorityMode::empty()) > 0.0),
                pickup: pickups.iter().find_nearest_linear(unit.position).copied(),
                objective: order.position,
                kite_phase: context.kite_phase(unit.tag),
                action: None,
            };

            if self.tree.tick(&mut blackboard) == Status::Failure {
                warn!("Behavior tree produced no decision for unit {}", unit.tag);
            }

            context.set_kite_phase(unit.tag, blackboard.kite_phase);

            if let Some(action) = blackboard.action {
                commands.push(UnitCommand::new(unit.tag, action));
            }
        }

        commands
    }
}

/// Target with the highest priority summed over the squad. Candidates within
/// `focus_fire_tolerance` of the best resolve to the current focus target if it
/// is among them, then to the fewest hit points, then to target order.
pub fn select_focus_target<'t>(
    evaluator: &TargetEvaluator,
    units: &[Combatant],
    targets: &'t [Combatant],
    config: &BehaviorConfig,
    current: Option<UnitTag>,
) -> Option<&'t Combatant> {
    let scored: Vec<(&Combatant, f32)> = targets
        .iter()
        .filter(|target| units.iter().any(|unit| unit.position.distance(target.position) <= config.engagement_range))
        .map(|target| {
            let total: f32 = units
                .iter()
                .map(|unit| evaluator.priority(unit, target, PriorityMode::empty()))
                .sum();

            (target, total)
        })
        .collect();

    let best = scored.iter().map(|(_, score)| *score).fold(0.0, f32::max);

    if best <= 0.0 {
        return None;
    }

    let threshold = best * (1.0 - config.focus_fire_tolerance);
    let near_best = scored.iter().filter(|(_, score)| *score >= threshold).map(|(target, _)| *target);

    if let Some(current) = near_best.clone().find(|target| Some(target.tag) == current) {
        return Some(current);
    }

    near_best.min_by(|a, b| a.hit_points().total_cmp(&b.hit_points()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::*;

    fn stalker(tag: u64, x: f32, cooldown: f32) -> ScenarioUnit {
        ScenarioUnit::new(
            Combatant {
                tag: UnitTag(tag),
                position: Point2::new(x, 0.0),
                health: 80.0,
                health_max: 80.0,
                shield: 80.0,
                shield_max: 80.0,
                speed: 4.13,
                weapon_cooldown: cooldown,
                weapon_period: 1.34,
                flags: UnitFlags::COMBAT,
                ..Default::default()
            },
            WeaponProfile::new(6.0, 9.7),
        )
    }

    fn zealot(tag: u64, x: f32, health: f32) -> ScenarioUnit {
        ScenarioUnit::new(
            Combatant {
                tag: UnitTag(tag),
                alliance: Alliance::Enemy,
                position: Point2::new(x, 0.0),
                health,
                health_max: 100.0,
                speed: 3.15,
                weapon_period: 0.86,
                flags: UnitFlags::COMBAT,
                ..Default::default()
            },
            WeaponProfile::new(0.1, 18.6),
        )
    }

    fn decide(world: &ScenarioWorld, units: &[u64], targets: &[u64]) -> Vec<UnitCommand> {
        let units: Vec<Combatant> = units.iter().filter_map(|tag| world.unit(UnitTag(*tag))).collect();
        let targets: Vec<Combatant> = targets.iter().filter_map(|tag| world.unit(UnitTag(*tag))).collect();
        let order = Order::new(OrderType::Attack, Point2::new(50.0, 0.0), 5.0);
        let mut context = MicroContext::new();

        BehaviorController::default().decide(world, &units, &targets, &order, &MicroConfig::default(), &mut context)
    }

    #[test]
    fn attacks_in_range_with_ready_weapon_instead_of_kiting() {
        let world = ScenarioWorld::new(vec![stalker(1, 0.0, 0.0), zealot(2, 1.0, 100.0)]);

        assert_eq!(decide(&world, &[1], &[2]), vec![UnitCommand::attack(UnitTag(1), UnitTag(2))]);
    }

    #[test]
    fn retreats_from_melee_while_reloading() {
        let world = ScenarioWorld::new(vec![stalker(1, 0.0, 1.0), zealot(2, 2.0, 100.0)]);

        let commands = decide(&world, &[1], &[2]);

        assert_eq!(commands, vec![UnitCommand::move_to(UnitTag(1), Point2::new(-2.0, 0.0))]);
    }

    #[test]
    fn steps_back_from_melee_in_range_while_reloading() {
        let world = ScenarioWorld::new(vec![stalker(1, 0.0, 0.5), zealot(2, 5.0, 100.0)]);

        assert_eq!(decide(&world, &[1], &[2]), vec![UnitCommand::move_to(UnitTag(1), Point2::new(-5.0, 0.0))]);
    }

    #[test]
    fn closes_in_when_reload_ends_before_reaching_range() {
        let world = ScenarioWorld::new(vec![stalker(1, 0.0, 0.2), zealot(2, 10.0, 100.0)]);

        assert_eq!(decide(&world, &[1], &[2]), vec![UnitCommand::move_to(UnitTag(1), Point2::new(10.0, 0.0))]);
    }

    #[test]
    fn never_kites_away_from_harmless_units() {
        let mut world = ScenarioWorld::new(vec![stalker(1, 0.0, 1.0), zealot(2, 2.0, 100.0)]);
        world.unit_mut(UnitTag(2)).unwrap().flags = UnitFlags::WORKER;

        assert_eq!(decide(&world, &[1], &[2]), vec![UnitCommand::attack(UnitTag(1), UnitTag(2))]);
    }

    #[test]
    fn ranged_targets_draw_focus_fire_on_the_weakest() {
        let mut world = ScenarioWorld::new(vec![stalker(1, 0.0, 0.0), stalker(2, 0.0, 0.0), stalker(3, 5.0, 0.0), stalker(4, 5.0, 0.0)]);
        for tag in [3, 4] {
            world.unit_mut(UnitTag(tag)).unwrap().alliance = Alliance::Enemy;
        }
        world.unit_mut(UnitTag(4)).unwrap().shield = 70.0;

        let commands = decide(&world, &[1, 2], &[3, 4]);

        assert_eq!(
            commands,
            vec![UnitCommand::attack(UnitTag(1), UnitTag(4)), UnitCommand::attack(UnitTag(2), UnitTag(4))]
        );
    }

    #[test]
    fn without_enemies_units_collect_pickups_then_head_for_the_objective() {
        let mut world = ScenarioWorld::new(vec![stalker(1, 0.0, 0.0), zealot(2, 40.0, 100.0)]);
        world.pickups = vec![Point2::new(8.0, 8.0), Point2::new(3.0, 0.0)];

        assert_eq!(decide(&world, &[1], &[2]), vec![UnitCommand::move_to(UnitTag(1), Point2::new(3.0, 0.0))]);

        world.pickups.clear();
        assert_eq!(decide(&world, &[1], &[2]), vec![UnitCommand::move_to(UnitTag(1), Point2::new(50.0, 0.0))]);
    }

    #[test]
    fn focus_target_sticks_while_near_best() {
        let world = ScenarioWorld::new(vec![stalker(1, 0.0, 0.0), zealot(2, 3.0, 100.0), zealot(3, 3.0, 99.0)]);
        let weights = PriorityWeights::default();
        let evaluator = TargetEvaluator::new(&world, &weights, OrderType::Attack);
        let units = vec![world.unit(UnitTag(1)).unwrap()];
        let targets = vec![world.unit(UnitTag(2)).unwrap(), world.unit(UnitTag(3)).unwrap()];
        let config = BehaviorConfig::default();

        let fresh = select_focus_target(&evaluator, &units, &targets, &config, None).unwrap();
        assert_eq!(fresh.tag, UnitTag(3));

        let kept = select_focus_target(&evaluator, &units, &targets, &config, Some(UnitTag(2))).unwrap();
        assert_eq!(kept.tag, UnitTag(2));
    }
}
