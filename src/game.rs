use crate::unit::*;

/// Read-only observation of the game for the current tick.
pub trait GameView {
    fn game_tick(&self) -> u32;

    /// Snapshot of a unit, or `None` if the handle is stale or the unit is not visible.
    fn unit(&self, tag: UnitTag) -> Option<Combatant>;

    fn is_pathable(&self, position: Point2) -> bool;

    /// Weapon range of `attacker` against `target`, including both radii.
    fn attack_range(&self, attacker: &Combatant, target: &Combatant) -> f32;

    fn dps(&self, attacker: &Combatant, target: &Combatant) -> f32;

    fn max_range(&self, unit: &Combatant) -> f32;

    /// Visible neutral resources that can be collected by walking over them.
    fn pickups(&self) -> Vec<Point2>;
}

pub trait CommandSink {
    fn issue_attack(&mut self, unit: UnitTag, target: UnitTag);

    fn issue_move(&mut self, unit: UnitTag, position: Point2);

    fn issue_attack_move(&mut self, unit: UnitTag, position: Point2);

    fn issue_stop(&mut self, unit: UnitTag);
}

pub fn dispatch(sink: &mut dyn CommandSink, command: &UnitCommand) {
    match command.action {
        PrimitiveAction::Attack(target) => sink.issue_attack(command.unit, target),
        PrimitiveAction::MoveTo(position) => sink.issue_move(command.unit, position),
        PrimitiveAction::AttackMove(position) => sink.issue_attack_move(command.unit, position),
        PrimitiveAction::Stop => sink.issue_stop(command.unit),
    }
}
