use crate::config::PriorityWeights;
use crate::game::GameView;
use crate::unit::*;
use bitflags::bitflags;

bitflags! {
    /// Extra rejection rules for a single scoring call.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct PriorityMode: u8 {
        /// Reject targets that nearly match or outrange the attacker.
        const FILTER_HIGH_RANGE = 1;
        /// Reject targets outside the attacker's weapon range.
        const ONLY_IN_RANGE     = 1 << 1;
    }
}

/// Score the harass variant returns for targets that must never be engaged.
pub const HARASS_VETO: f32 = -1.0;

/// Scores hostile units as attack targets for one friendly attacker.
///
/// Scores are non-negative in the combat variant and strictly decreasing in the
/// target's remaining hit points. A score of zero means the target is only picked
/// when nothing else is available.
pub struct TargetEvaluator<'a> {
    game: &'a dyn GameView,
    weights: &'a PriorityWeights,
    order_type: OrderType,
}

impl<'a> TargetEvaluator<'a> {
    pub fn new(game: &'a dyn GameView, weights: &'a PriorityWeights, order_type: OrderType) -> TargetEvaluator<'a> {
        TargetEvaluator {
            game,
            weights,
            order_type,
        }
    }

    pub fn weights(&self) -> &PriorityWeights {
        self.weights
    }

    /// General combat priority of `target` for `attacker`.
    pub fn priority(&self, attacker: &Combatant, target: &Combatant, mode: PriorityMode) -> f32 {
        self.score(attacker, target, mode, self.weights.health_exponent)
    }

    /// Hit-and-run priority. Returns `HARASS_VETO` for ranged targets that can
    /// hurt the attacker and cannot be outrun.
    pub fn harass_priority(&self, attacker: &Combatant, target: &Combatant, mode: PriorityMode) -> f32 {
        if self.is_rejected(target) || self.game.dps(attacker, target) <= 0.0 {
            return 0.0;
        }

        let target_dps = self.game.dps(target, attacker);

        if self.is_ranged(target) && target_dps > 0.0 && target.speed >= attacker.speed {
            return HARASS_VETO;
        }

        self.score(attacker, target, mode, self.weights.harass_health_exponent)
    }

    pub fn is_ranged(&self, unit: &Combatant) -> bool {
        self.game.max_range(unit) > self.weights.melee_range
    }

    /// Highest scoring target. Zero-scored targets are only returned when every
    /// candidate scores zero; vetoed targets are never returned.
    pub fn best_target<'t>(&self, attacker: &Combatant, targets: &'t [Combatant], mode: PriorityMode) -> Option<(&'t Combatant, f32)> {
        self.best_by(targets, |target| self.priority(attacker, target, mode))
    }

    pub fn best_harass_target<'t>(&self, attacker: &Combatant, targets: &'t [Combatant], mode: PriorityMode) -> Option<(&'t Combatant, f32)> {
        self.best_by(targets, |target| self.harass_priority(attacker, target, mode))
    }

    fn best_by<'t, F>(&self, targets: &'t [Combatant], scorer: F) -> Option<(&'t Combatant, f32)>
    where
        F: Fn(&Combatant) -> f32,
    {
        let mut best: Option<(&'t Combatant, f32)> = None;

        for target in targets {
            let score = scorer(target);

            if score < 0.0 {
                continue;
            }

            match best {
                Some((_, best_score)) if score <= best_score => {}
                _ => best = Some((target, score)),
            }
        }

        best
    }

    fn is_rejected(&self, target: &Combatant) -> bool {
        if target.flags.intersects(UnitFlags::UNTARGETABLE | UnitFlags::STATUS_IMMUNE) {
            return true;
        }

        if target.display == DisplayType::Hidden {
            return true;
        }

        if target.flags.contains(UnitFlags::DETECTION_DECOY)
            && target.last_seen_tick.saturating_add(self.weights.decoy_freshness_ticks) < self.game.game_tick()
        {
            return true;
        }

        false
    }

    fn score(&self, attacker: &Combatant, target: &Combatant, mode: PriorityMode, health_exponent: f32) -> f32 {
        let weights = self.weights;

        if self.is_rejected(target) {
            return 0.0;
        }

        let attacker_range = self.game.attack_range(attacker, target);

        if mode.contains(PriorityMode::FILTER_HIGH_RANGE) {
            let target_range = self.game.attack_range(target, attacker);

            if target_range + weights.min_range_difference > attacker_range {
                return 0.0;
            }
        }

        let attacker_dps = self.game.dps(attacker, target);

        if attacker_dps <= 0.0 {
            return 0.0;
        }

        let distance = attacker.position.distance(target.position);

        let proximity = if distance <= attacker_range {
            1.0
        } else if mode.contains(PriorityMode::ONLY_IN_RANGE) {
            return 0.0;
        } else if attacker.speed <= 0.0 {
            weights.stationary_proximity
        } else {
            weights.proximity_decay.powf(distance - attacker_range)
        };

        let health = 1.0 / (1.0 + target.hit_points().max(0.0)).powf(health_exponent);

        let invisible = if target.cloak == CloakState::CloakedDetected || target.flags.contains(UnitFlags::BURROWED) {
            weights.invisible_multiplier
        } else {
            1.0
        };

        if !target.flags.intersects(UnitFlags::COMBAT | UnitFlags::WORKER | UnitFlags::STATIC_DEFENSE) {
            return weights.proximity_weight * proximity * health * invisible / weights.structure_divisor;
        }

        let target_dps = self.game.dps(target, attacker);

        let mut modifier = invisible;

        if target.is_worker() && self.order_type != OrderType::Defend {
            modifier *= match target.activity {
                WorkerActivity::Building => weights.builder_multiplier,
                WorkerActivity::Repairing => weights.repairer_multiplier,
                WorkerActivity::EnteringRefinery => weights.refinery_worker_multiplier,
                WorkerActivity::None => 1.0,
            };
        }

        // Static defenses flip the harmless penalty: one that shoots back is the lower priority.
        let harmless = target_dps <= 0.0;
        if target.is_static_defense() {
            if !harmless {
                modifier *= weights.non_threatening_multiplier;
            }
        } else if harmless {
            modifier *= weights.non_threatening_multiplier;
        }

        if target.is_flying() && target.is_detector() {
            modifier *= weights.flying_detector_multiplier;
        }

        if target.flags.contains(UnitFlags::MINION) {
            modifier *= weights.minion_multiplier;
        }

        if target.flags.contains(UnitFlags::SHIELD_STRUCTURE) {
            modifier *= weights.shield_structure_multiplier;
        }

        (target_dps + attacker_dps + weights.proximity_weight * proximity) * health * modifier
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::*;

    fn marine(tag: u64, x: f32) -> ScenarioUnit {
        ScenarioUnit::new(
            Combatant {
                tag: UnitTag(tag),
                alliance: Alliance::Own,
                position: Point2::new(x, 0.0),
                health: 45.0,
                health_max: 45.0,
                speed: 3.15,
                weapon_period: 0.61,
                flags: UnitFlags::COMBAT,
                ..Default::default()
            },
            WeaponProfile::new(5.0, 9.8),
        )
    }

    fn zergling(tag: u64, x: f32, health: f32) -> ScenarioUnit {
        ScenarioUnit::new(
            Combatant {
                tag: UnitTag(tag),
                alliance: Alliance::Enemy,
                position: Point2::new(x, 0.0),
                health,
                health_max: 35.0,
                speed: 4.13,
                weapon_period: 0.497,
                flags: UnitFlags::COMBAT,
                ..Default::default()
            },
            WeaponProfile::new(0.1, 10.0),
        )
    }

    fn score(world: &ScenarioWorld, attacker: u64, target: u64, mode: PriorityMode) -> f32 {
        let weights = PriorityWeights::default();
        let evaluator = TargetEvaluator::new(world, &weights, OrderType::Attack);
        let attacker = world.unit(UnitTag(attacker)).unwrap();
        let target = world.unit(UnitTag(target)).unwrap();

        evaluator.priority(&attacker, &target, mode)
    }

    #[test]
    fn untargetable_and_hidden_targets_score_zero() {
        let mut world = ScenarioWorld::new(vec![marine(1, 0.0), zergling(2, 3.0, 35.0), zergling(3, 3.0, 35.0)]);
        world.unit_mut(UnitTag(2)).unwrap().flags |= UnitFlags::UNTARGETABLE;
        world.unit_mut(UnitTag(3)).unwrap().display = DisplayType::Hidden;

        assert_eq!(score(&world, 1, 2, PriorityMode::empty()), 0.0);
        assert_eq!(score(&world, 1, 3, PriorityMode::empty()), 0.0);
    }

    #[test]
    fn zero_damage_target_scores_zero() {
        let mut world = ScenarioWorld::new(vec![marine(1, 0.0), zergling(2, 3.0, 35.0)]);
        world.set_weapon(UnitTag(1), None);

        assert_eq!(score(&world, 1, 2, PriorityMode::empty()), 0.0);
    }

    #[test]
    fn stale_decoy_scores_zero() {
        let mut world = ScenarioWorld::new(vec![marine(1, 0.0), zergling(2, 3.0, 35.0)]);
        world.set_tick(10);
        {
            let decoy = world.unit_mut(UnitTag(2)).unwrap();
            decoy.flags = UnitFlags::DETECTION_DECOY | UnitFlags::BUILDING;
            decoy.last_seen_tick = 8;
        }
        assert_eq!(score(&world, 1, 2, PriorityMode::empty()), 0.0);

        world.unit_mut(UnitTag(2)).unwrap().last_seen_tick = 9;
        assert!(score(&world, 1, 2, PriorityMode::empty()) > 0.0);
    }

    #[test]
    fn score_strictly_decreases_with_health() {
        let world = ScenarioWorld::new(vec![
            marine(1, 0.0),
            zergling(2, 3.0, 5.0),
            zergling(3, 3.0, 20.0),
            zergling(4, 3.0, 35.0),
        ]);

        let low = score(&world, 1, 2, PriorityMode::empty());
        let mid = score(&world, 1, 3, PriorityMode::empty());
        let high = score(&world, 1, 4, PriorityMode::empty());

        assert!(low > mid);
        assert!(mid > high);
    }

    #[test]
    fn score_does_not_increase_with_distance() {
        let world = ScenarioWorld::new(vec![
            marine(1, 0.0),
            zergling(2, 4.0, 35.0),
            zergling(3, 6.0, 35.0),
            zergling(4, 9.0, 35.0),
            zergling(5, 15.0, 35.0),
        ]);

        let scores: Vec<f32> = (2..=5).map(|tag| score(&world, 1, tag, PriorityMode::empty())).collect();

        for pair in scores.windows(2) {
            assert!(pair[0] >= pair[1], "{:?}", scores);
        }
    }

    #[test]
    fn mode_flags_reject_out_of_range_and_outranging_targets() {
        let world = ScenarioWorld::new(vec![marine(1, 0.0), zergling(2, 8.0, 35.0), marine(3, 4.0)]);

        assert_eq!(score(&world, 1, 2, PriorityMode::ONLY_IN_RANGE), 0.0);
        assert!(score(&world, 1, 2, PriorityMode::empty()) > 0.0);

        // Equal range is within the minimum range difference.
        assert_eq!(score(&world, 1, 3, PriorityMode::FILTER_HIGH_RANGE), 0.0);
    }

    #[test]
    fn stationary_attacker_keeps_a_small_floor_out_of_range() {
        let mut world = ScenarioWorld::new(vec![marine(1, 0.0), zergling(2, 30.0, 35.0)]);
        let moving = score(&world, 1, 2, PriorityMode::empty());

        world.unit_mut(UnitTag(1)).unwrap().speed = 0.0;
        let stationary = score(&world, 1, 2, PriorityMode::empty());

        assert!(stationary > 0.0);
        assert!(stationary < moving);
    }

    #[test]
    fn harass_vetoes_ranged_targets_that_cannot_be_outrun() {
        let world = ScenarioWorld::new(vec![marine(1, 0.0), marine(2, 6.0), zergling(3, 6.0, 35.0)]);
        let weights = PriorityWeights::default();
        let evaluator = TargetEvaluator::new(&world, &weights, OrderType::Harass);
        let attacker = world.unit(UnitTag(1)).unwrap();
        let ranged = world.unit(UnitTag(2)).unwrap();
        let melee = world.unit(UnitTag(3)).unwrap();

        assert_eq!(evaluator.harass_priority(&attacker, &ranged, PriorityMode::empty()), HARASS_VETO);
        assert!(evaluator.harass_priority(&attacker, &melee, PriorityMode::empty()) > 0.0);

        let targets = [ranged, melee];
        let (best, _) = evaluator.best_harass_target(&attacker, &targets, PriorityMode::empty()).unwrap();
        assert_eq!(best.tag, UnitTag(3));
    }

    #[test]
    fn unarmed_attacker_scores_zero_even_against_vetoed_targets() {
        let mut world = ScenarioWorld::new(vec![marine(1, 0.0), marine(2, 6.0)]);
        world.set_weapon(UnitTag(1), None);
        {
            let ranged = world.unit_mut(UnitTag(2)).unwrap();
            ranged.alliance = Alliance::Enemy;
            ranged.speed = 5.0;
        }

        let weights = PriorityWeights::default();
        let evaluator = TargetEvaluator::new(&world, &weights, OrderType::Harass);
        let attacker = world.unit(UnitTag(1)).unwrap();
        let ranged = world.unit(UnitTag(2)).unwrap();

        assert_eq!(evaluator.priority(&attacker, &ranged, PriorityMode::empty()), 0.0);
        assert_eq!(evaluator.harass_priority(&attacker, &ranged, PriorityMode::empty()), 0.0);
    }

    #[test]
    fn building_workers_are_preferred_unless_defending() {
        let mut world = ScenarioWorld::new(vec![marine(1, 0.0), zergling(2, 3.0, 35.0), zergling(3, 3.0, 35.0)]);
        for tag in [2, 3] {
            let worker = world.unit_mut(UnitTag(tag)).unwrap();
            worker.flags = UnitFlags::WORKER;
        }
        world.unit_mut(UnitTag(3)).unwrap().activity = WorkerActivity::Building;

        let weights = PriorityWeights::default();
        let attacker = world.unit(UnitTag(1)).unwrap();
        let idle = world.unit(UnitTag(2)).unwrap();
        let builder = world.unit(UnitTag(3)).unwrap();

        let attacking = TargetEvaluator::new(&world, &weights, OrderType::Attack);
        assert!(attacking.priority(&attacker, &builder, PriorityMode::empty()) > attacking.priority(&attacker, &idle, PriorityMode::empty()));

        let defending = TargetEvaluator::new(&world, &weights, OrderType::Defend);
        assert_eq!(
            defending.priority(&attacker, &builder, PriorityMode::empty()),
            defending.priority(&attacker, &idle, PriorityMode::empty())
        );
    }

    #[test]
    fn passive_structures_rank_below_units() {
        let mut world = ScenarioWorld::new(vec![marine(1, 0.0), zergling(2, 3.0, 35.0), zergling(3, 3.0, 35.0)]);
        world.unit_mut(UnitTag(3)).unwrap().flags = UnitFlags::BUILDING;

        assert!(score(&world, 1, 2, PriorityMode::empty()) > score(&world, 1, 3, PriorityMode::empty()));
    }
}
