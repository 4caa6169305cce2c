use super::threatmap::*;
use crate::config::FleeConfig;
use crate::game::GameView;
use crate::unit::*;
use log::*;
use pathfinding::prelude::bfs;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum FleeOutcome {
    /// First hop toward the nearest safe cell.
    Waypoint(Point2),
    /// No safe cell is reachable inside the grid.
    Fallback(Point2),
}

impl FleeOutcome {
    pub fn position(&self) -> Point2 {
        match self {
            FleeOutcome::Waypoint(position) | FleeOutcome::Fallback(position) => *position,
        }
    }
}

/// Finds a waypoint out of the threat field around `unit`.
///
/// Runs a breadth-first search over the 8-connected influence grid, so every
/// step costs the same and ties resolve in insertion order. The first pathable
/// zero-threat cell reached is the goal. The returned waypoint is the earliest
/// cell on the path that already lies within `safe_hop_radius` of that goal.
pub fn plan_flee(game: &dyn GameView, unit: &Combatant, threats: &[ThreatSource], fallback: Point2, config: &FleeConfig) -> FleeOutcome {
    let grid = InfluenceGrid::build(game, unit.position, config.grid_size, threats, config.threat_decay);
    let start = grid.center();

    let path = bfs(&start, |cell| grid.neighbours(*cell), |cell| grid.is_safe(*cell));

    let Some(path) = path else {
        debug!("Flee planner found no safe cell around {} for {}, falling back to {}", unit.position, unit.tag, fallback);

        return FleeOutcome::Fallback(fallback);
    };

    let Some(goal) = path.last().copied() else {
        return FleeOutcome::Fallback(fallback);
    };

    let hop = path
        .iter()
        .skip(1)
        .rev()
        .take_while(|cell| cell.distance(goal) <= config.safe_hop_radius)
        .last()
        .copied()
        .unwrap_or(goal);

    trace!("Flee path for {} has {} cells, hop {:?} towards goal {:?}", unit.tag, path.len(), hop, goal);

    FleeOutcome::Waypoint(grid.cell_to_world(hop))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::*;

    fn runner() -> Combatant {
        Combatant {
            tag: UnitTag(1),
            position: Point2::new(0.5, 0.5),
            speed: 4.0,
            flags: UnitFlags::COMBAT,
            ..Default::default()
        }
    }

    fn threat_at(x: f32, y: f32, radius: f32) -> ThreatSource {
        ThreatSource {
            position: Point2::new(x, y),
            radius,
            dps: 10.0,
        }
    }

    fn small_grid() -> FleeConfig {
        FleeConfig {
            grid_size: 21,
            ..Default::default()
        }
    }

    #[test]
    fn unthreatened_unit_stays_put() {
        let world = ScenarioWorld::new(Vec::new());
        let unit = runner();

        let outcome = plan_flee(&world, &unit, &[], Point2::new(20.0, 20.0), &small_grid());

        assert_eq!(outcome, FleeOutcome::Waypoint(unit.position));
    }

    #[test]
    fn waypoint_is_near_a_safe_cell_and_pathable() {
        let world = ScenarioWorld::new(Vec::new());
        let unit = runner();
        let threat = threat_at(0.5, 0.5, 4.0);

        let outcome = plan_flee(&world, &unit, &[threat], Point2::new(20.0, 20.0), &small_grid());

        let FleeOutcome::Waypoint(waypoint) = outcome else {
            panic!("expected a waypoint, got {:?}", outcome);
        };

        assert!(world.is_pathable(waypoint));

        let grid = InfluenceGrid::build(&world, unit.position, 21, &[threat], 1.0);
        let hop = grid.world_to_cell(waypoint);
        let nearest_safe = (0..21)
            .flat_map(|y| (0..21).map(move |x| GridCell::new(x, y)))
            .filter(|cell| grid.is_safe(*cell))
            .map(|cell| cell.distance(hop))
            .fold(f32::MAX, f32::min);

        assert!(nearest_safe <= 2.0, "waypoint {} is {} from safety", waypoint, nearest_safe);
        assert!(waypoint.distance(unit.position) > 0.0);
    }

    #[test]
    fn waypoint_never_lands_on_blocked_tiles() {
        let mut world = ScenarioWorld::new(Vec::new());
        for y in -10..=10 {
            for x in -10..=0 {
                if x < -1 || y != 0 {
                    world.block_tile(x, y);
                }
            }
        }
        let unit = runner();
        let threat = threat_at(1.5, 0.5, 5.0);

        let outcome = plan_flee(&world, &unit, &[threat], Point2::new(20.0, 20.0), &small_grid());

        assert!(world.is_pathable(outcome.position()));
    }

    #[test]
    fn fully_threatened_grid_falls_back_to_order_position() {
        let world = ScenarioWorld::new(Vec::new());
        let unit = runner();
        let fallback = Point2::new(40.0, 40.0);

        let outcome = plan_flee(&world, &unit, &[threat_at(0.5, 0.5, 30.0)], fallback, &small_grid());

        assert_eq!(outcome, FleeOutcome::Fallback(fallback));
    }
}
