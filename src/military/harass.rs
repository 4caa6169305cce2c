use super::context::*;
use super::flee::*;
use super::priority::*;
use super::threatmap::ThreatSource;
use crate::config::*;
use crate::game::GameView;
use crate::unit::*;
use log::*;

/// A hostile able to damage the harassing unit within about a second.
#[derive(Clone, Copy, Debug)]
struct Threat {
    position: Point2,
    range: f32,
    speed: f32,
    dps: f32,
    distance: f32,
}

impl Threat {
    fn reach(&self) -> f32 {
        self.range + self.speed
    }

    fn as_source(&self) -> ThreatSource {
        ThreatSource {
            position: self.position,
            radius: self.reach(),
            dps: self.dps,
        }
    }
}

/// Hit-and-run controller steering each unit with attraction to its target or
/// objective and repulsion from nearby threats. Units are throttled to one
/// command per `command_interval` ticks.
#[derive(Default)]
pub struct HarassController;

impl HarassController {
    pub fn decide(
        &self,
        game: &dyn GameView,
        units: &[Combatant],
        targets: &[Combatant],
        order: &Order,
        config: &MicroConfig,
        context: &MicroContext,
    ) -> Vec<UnitCommand> {
        let tick = game.game_tick();
        let evaluator = TargetEvaluator::new(game, &config.priority, order.order_type);

        let candidates: Vec<Combatant> = targets.iter().filter(|target| order.contains(target.position)).copied().collect();

        units
            .iter()
            .filter(|unit| {
                let ready = context.can_command(unit.tag, tick, config.harass.command_interval);

                if !ready {
                    trace!("Harass unit {} throttled at tick {}", unit.tag, tick);
                }

                ready
            })
            .map(|unit| {
                let target = evaluator
                    .best_harass_target(unit, &candidates, PriorityMode::empty())
                    .map(|(target, _)| target);

                let action = self.decide_unit(game, unit, target, targets, order, config);

                UnitCommand::new(unit.tag, action)
            })
            .collect()
    }

    fn decide_unit(
        &self,
        game: &dyn GameView,
        unit: &Combatant,
        target: Option<&Combatant>,
        hostiles: &[Combatant],
        order: &Order,
        config: &MicroConfig,
    ) -> PrimitiveAction {
        let threats = find_threats(game, unit, hostiles);

        if target.is_none() && threats.is_empty() {
            return PrimitiveAction::MoveTo(order.position);
        }

        if let Some(target) = target {
            let in_range = unit.position.distance(target.position) <= game.attack_range(unit, target);

            if in_range && unit.weapon_ready() {
                return PrimitiveAction::Attack(target.tag);
            }
        }

        let in_danger = threats
            .iter()
            .any(|threat| threat.distance <= threat.range + config.harass.danger_margin);

        if in_danger {
            let sources: Vec<ThreatSource> = threats.iter().map(Threat::as_source).collect();

            let outcome = plan_flee(game, unit, &sources, order.position, &config.flee);

            trace!("Harass unit {} in danger, fleeing to {:?}", unit.tag, outcome);

            return PrimitiveAction::MoveTo(outcome.position());
        }

        let direction = steering_direction(game, unit, target, &threats, order, &config.harass);

        match project_waypoint(game, unit.position, direction, &config.harass) {
            Some(waypoint) => PrimitiveAction::MoveTo(waypoint),
            None => PrimitiveAction::MoveTo(order.position),
        }
    }
}

fn find_threats(game: &dyn GameView, unit: &Combatant, hostiles: &[Combatant]) -> Vec<Threat> {
    hostiles
        .iter()
        .filter_map(|hostile| {
            let dps = game.dps(hostile, unit);

            if dps <= 0.0 {
                return None;
            }

            let threat = Threat {
                position: hostile.position,
                range: game.attack_range(hostile, unit),
                speed: hostile.speed,
                dps,
                distance: unit.position.distance(hostile.position),
            };

            if threat.reach() >= threat.distance {
                Some(threat)
            } else {
                None
            }
        })
        .collect()
}

fn steering_direction(
    game: &dyn GameView,
    unit: &Combatant,
    target: Option<&Combatant>,
    threats: &[Threat],
    order: &Order,
    config: &HarassConfig,
) -> Point2 {
    let attraction = match target {
        Some(target) => {
            let range = game.attack_range(unit, target);

            if unit.position.distance(target.position) > range {
                (target.position - unit.position).normalized()
            } else {
                (unit.position - target.position).normalized()
            }
        }
        None => (order.position - unit.position).normalized(),
    };

    let repulsion = threats.iter().fold(Point2::ZERO, |total, threat| {
        let reach = threat.reach().max(EPSILON);
        let proximity = ((reach - threat.distance) / reach).max(0.0);

        total + (unit.position - threat.position).normalized() * (config.repulsion_weight * proximity)
    });

    (attraction + repulsion).normalized()
}

/// Point along `direction` at `waypoint_distance`, shrinking one tile at a time
/// down to `min_waypoint_distance` until the point is pathable.
fn project_waypoint(game: &dyn GameView, origin: Point2, direction: Point2, config: &HarassConfig) -> Option<Point2> {
    if direction.is_zero() {
        return None;
    }

    let mut distance = config.waypoint_distance;

    while distance >= config.min_waypoint_distance - EPSILON {
        let candidate = origin + direction * distance;

        if game.is_pathable(candidate) {
            return Some(candidate);
        }

        distance -= 1.0;
    }

    None
}
