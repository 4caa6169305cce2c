use crate::unit::*;
use log::*;
use std::collections::{HashMap, HashSet};

/// Phase of a unit's engagement against a melee target.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum KitePhase {
    /// Closing distance to the target.
    #[default]
    Approaching,
    /// Backing off while the weapon reloads.
    Retreating,
    /// In range with a ready weapon.
    Firing,
}

/// Which squad units have already acted in the current search resolution window.
#[derive(Clone, Debug, Default)]
pub struct TurnOwnership {
    acted: HashSet<UnitTag>,
    roster_size: usize,
}

impl TurnOwnership {
    /// Resets the acted set when the roster size changed since the last tick or
    /// when every unit of the roster has acted.
    pub fn sync(&mut self, roster: &[UnitTag]) {
        if roster.len() != self.roster_size {
            if !self.acted.is_empty() {
                debug!("Roster changed from {} to {} units, resetting turn ownership", self.roster_size, roster.len());
            }

            self.acted.clear();
            self.roster_size = roster.len();
        }

        self.acted.retain(|tag| roster.contains(tag));

        if !roster.is_empty() && roster.iter().all(|tag| self.acted.contains(tag)) {
            self.acted.clear();
        }
    }

    pub fn has_acted(&self, tag: UnitTag) -> bool {
        self.acted.contains(&tag)
    }

    pub fn mark_acted(&mut self, tag: UnitTag) {
        self.acted.insert(tag);
    }

    pub fn acted_count(&self) -> usize {
        self.acted.len()
    }
}

/// Per-unit bookkeeping that survives between ticks. Entries for units that
/// have left the squad are tolerated and evicted by `prune`.
#[derive(Clone, Debug, Default)]
pub struct MicroContext {
    last_command_tick: HashMap<UnitTag, u32>,
    last_action: HashMap<UnitTag, PrimitiveAction>,
    kite_phases: HashMap<UnitTag, KitePhase>,
    focus_target: Option<UnitTag>,
    turn_ownership: TurnOwnership,
    last_prune_tick: u32,
}

impl MicroContext {
    pub fn new() -> MicroContext {
        MicroContext::default()
    }

    pub fn last_command_tick(&self, unit: UnitTag) -> Option<u32> {
        self.last_command_tick.get(&unit).copied()
    }

    /// True once `interval` ticks have passed since the unit's last command.
    pub fn can_command(&self, unit: UnitTag, tick: u32, interval: u32) -> bool {
        match self.last_command_tick(unit) {
            Some(last) => tick >= last.saturating_add(interval),
            None => true,
        }
    }

    pub fn last_action(&self, unit: UnitTag) -> Option<PrimitiveAction> {
        self.last_action.get(&unit).copied()
    }

    /// Attacks on the same target are not repeated; doing so would restart the
    /// weapon swing. Every other action is always issued.
    pub fn should_issue(&self, command: &UnitCommand) -> bool {
        match command.action {
            PrimitiveAction::Attack(_) => self.last_action(command.unit) != Some(command.action),
            _ => true,
        }
    }

    pub fn record_command(&mut self, command: &UnitCommand, tick: u32) {
        self.last_command_tick.insert(command.unit, tick);
        self.last_action.insert(command.unit, command.action);
    }

    pub fn kite_phase(&self, unit: UnitTag) -> KitePhase {
        self.kite_phases.get(&unit).copied().unwrap_or_default()
    }

    pub fn set_kite_phase(&mut self, unit: UnitTag, phase: KitePhase) {
        let previous = self.kite_phases.insert(unit, phase);

        if previous.unwrap_or_default() != phase {
            trace!("Unit {} kite phase {:?} -> {:?}", unit, previous.unwrap_or_default(), phase);
        }
    }

    pub fn focus_target(&self) -> Option<UnitTag> {
        self.focus_target
    }

    pub fn set_focus_target(&mut self, target: Option<UnitTag>) {
        self.focus_target = target;
    }

    pub fn turn_ownership(&self) -> &TurnOwnership {
        &self.turn_ownership
    }

    pub fn turn_ownership_mut(&mut self) -> &mut TurnOwnership {
        &mut self.turn_ownership
    }

    /// Evicts entries of units outside `roster`, at most once per `interval` ticks.
    pub fn prune(&mut self, roster: &[UnitTag], tick: u32, interval: u32) {
        if tick < self.last_prune_tick.saturating_add(interval) {
            return;
        }

        self.last_prune_tick = tick;

        let before = self.last_command_tick.len() + self.last_action.len() + self.kite_phases.len();

        self.last_command_tick.retain(|tag, _| roster.contains(tag));
        self.last_action.retain(|tag, _| roster.contains(tag));
        self.kite_phases.retain(|tag, _| roster.contains(tag));

        let after = self.last_command_tick.len() + self.last_action.len() + self.kite_phases.len();

        if after < before {
            debug!("Pruned {} stale micro context entries at tick {}", before - after, tick);
        }
    }

    pub fn tracked_units(&self) -> usize {
        self.last_command_tick.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_interval_is_enforced() {
        let mut context = MicroContext::new();
        let command = UnitCommand::move_to(UnitTag(1), Point2::ZERO);

        assert!(context.can_command(UnitTag(1), 10, 2));
        context.record_command(&command, 10);

        assert!(!context.can_command(UnitTag(1), 10, 2));
        assert!(!context.can_command(UnitTag(1), 11, 2));
        assert!(context.can_command(UnitTag(1), 12, 2));
    }

    #[test]
    fn repeated_attacks_are_suppressed_but_moves_are_not() {
        let mut context = MicroContext::new();
        let attack = UnitCommand::attack(UnitTag(1), UnitTag(9));
        let other_attack = UnitCommand::attack(UnitTag(1), UnitTag(8));
        let step = UnitCommand::move_to(UnitTag(1), Point2::new(1.0, 1.0));

        context.record_command(&attack, 1);
        assert!(!context.should_issue(&attack));
        assert!(context.should_issue(&other_attack));

        context.record_command(&step, 2);
        assert!(context.should_issue(&step));
        assert!(context.should_issue(&attack));
    }

    #[test]
    fn prune_evicts_departed_units_lazily() {
        let mut context = MicroContext::new();
        for tag in [1, 2, 3] {
            context.record_command(&UnitCommand::move_to(UnitTag(tag), Point2::ZERO), 0);
        }

        context.prune(&[UnitTag(1)], 10, 64);
        assert_eq!(context.tracked_units(), 3);

        context.prune(&[UnitTag(1)], 64, 64);
        assert_eq!(context.tracked_units(), 1);
    }

    #[test]
    fn turn_ownership_resets_on_roster_change_and_full_coverage() {
        let roster = [UnitTag(1), UnitTag(2)];
        let mut turns = TurnOwnership::default();

        turns.sync(&roster);
        turns.mark_acted(UnitTag(1));
        turns.sync(&roster);
        assert!(turns.has_acted(UnitTag(1)));

        turns.mark_acted(UnitTag(2));
        turns.sync(&roster);
        assert_eq!(turns.acted_count(), 0);

        turns.mark_acted(UnitTag(1));
        turns.sync(&[UnitTag(1), UnitTag(2), UnitTag(3)]);
        assert_eq!(turns.acted_count(), 0);
    }
}
