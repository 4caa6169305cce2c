//! In-memory game view and command recorder used by tests and the benchmark tool.

use crate::error::*;
use crate::game::*;
use crate::unit::*;
use log::*;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeaponProfile {
    pub range: f32,
    pub dps: f32,
    pub hits_ground: bool,
    pub hits_air: bool,
}

impl Default for WeaponProfile {
    fn default() -> Self {
        WeaponProfile {
            range: 0.0,
            dps: 0.0,
            hits_ground: true,
            hits_air: true,
        }
    }
}

impl WeaponProfile {
    pub fn new(range: f32, dps: f32) -> WeaponProfile {
        WeaponProfile {
            range,
            dps,
            ..Default::default()
        }
    }

    pub fn can_hit(&self, target: &Combatant) -> bool {
        if target.is_flying() {
            self.hits_air
        } else {
            self.hits_ground
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScenarioUnit {
    pub unit: Combatant,
    #[serde(default)]
    pub weapon: Option<WeaponProfile>,
}

impl ScenarioUnit {
    pub fn new(unit: Combatant, weapon: WeaponProfile) -> ScenarioUnit {
        ScenarioUnit { unit, weapon: Some(weapon) }
    }

    pub fn unarmed(unit: Combatant) -> ScenarioUnit {
        ScenarioUnit { unit, weapon: None }
    }
}

/// A self-contained battlefield. Tiles are unit squares; a position is
/// pathable unless its tile is listed in `blocked` or lies outside `bounds`.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenarioWorld {
    pub tick: u32,
    pub units: Vec<ScenarioUnit>,
    pub pickups: Vec<Point2>,
    pub blocked: Vec<(i32, i32)>,
    /// Inclusive lower and exclusive upper corner of the playable area.
    pub bounds: Option<(Point2, Point2)>,
    pub order: Option<Order>,
    #[serde(skip)]
    blocked_tiles: HashSet<(i32, i32)>,
    #[serde(skip)]
    index: HashMap<UnitTag, usize>,
    #[serde(skip)]
    orders: HashMap<UnitTag, PrimitiveAction>,
}

impl ScenarioWorld {
    pub fn new(units: Vec<ScenarioUnit>) -> ScenarioWorld {
        let mut world = ScenarioWorld {
            units,
            ..Default::default()
        };

        world.reindex();

        world
    }

    pub fn from_json_str(data: &str) -> Result<ScenarioWorld, MicroError> {
        let mut world: ScenarioWorld = serde_json::from_str(data)?;

        world.reindex();

        if world.index.len() != world.units.len() {
            return Err(MicroError::Scenario("unit tags must be unique".to_string()));
        }

        Ok(world)
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<ScenarioWorld, MicroError> {
        let data = std::fs::read_to_string(path)?;

        ScenarioWorld::from_json_str(&data)
    }

    fn reindex(&mut self) {
        self.index = self.units.iter().enumerate().map(|(index, entry)| (entry.unit.tag, index)).collect();
        self.blocked_tiles = self.blocked.iter().copied().collect();
    }

    fn entry(&self, tag: UnitTag) -> Option<&ScenarioUnit> {
        self.index.get(&tag).and_then(|index| self.units.get(*index))
    }

    fn weapon(&self, tag: UnitTag) -> Option<WeaponProfile> {
        self.entry(tag).and_then(|entry| entry.weapon)
    }

    pub fn unit_mut(&mut self, tag: UnitTag) -> Option<&mut Combatant> {
        let index = *self.index.get(&tag)?;

        self.units.get_mut(index).map(|entry| &mut entry.unit)
    }

    pub fn set_weapon(&mut self, tag: UnitTag, weapon: Option<WeaponProfile>) {
        if let Some(entry) = self.index.get(&tag).and_then(|index| self.units.get_mut(*index)) {
            entry.weapon = weapon;
        }
    }

    pub fn add_unit(&mut self, unit: ScenarioUnit) {
        self.units.push(unit);
        self.reindex();
    }

    pub fn remove_unit(&mut self, tag: UnitTag) {
        self.units.retain(|entry| entry.unit.tag != tag);
        self.orders.remove(&tag);
        self.reindex();
    }

    pub fn block_tile(&mut self, x: i32, y: i32) {
        self.blocked.push((x, y));
        self.blocked_tiles.insert((x, y));
    }

    pub fn set_tick(&mut self, tick: u32) {
        self.tick = tick;
    }

    pub fn tags_of(&self, alliance: Alliance) -> Vec<UnitTag> {
        self.units
            .iter()
            .filter(|entry| entry.unit.alive && entry.unit.alliance == alliance)
            .map(|entry| entry.unit.tag)
            .collect()
    }

    /// Order a unit is carrying out, kept until it completes or is replaced.
    pub fn standing_order(&self, tag: UnitTag) -> Option<PrimitiveAction> {
        self.orders.get(&tag).copied()
    }

    /// Advances the world by one tick. `commands` replace the standing orders of
    /// their units; every standing order is then carried out for one tick in tag order.
    pub fn step(&mut self, commands: &[UnitCommand]) {
        let seconds = 1.0 / TICKS_PER_SECOND;

        for entry in self.units.iter_mut() {
            entry.unit.weapon_cooldown = (entry.unit.weapon_cooldown - seconds).max(0.0);
        }

        for command in commands {
            if self.unit(command.unit).is_some() {
                self.orders.insert(command.unit, command.action);
            }
        }

        let mut standing: Vec<(UnitTag, PrimitiveAction)> = self.orders.iter().map(|(tag, action)| (*tag, *action)).collect();
        standing.sort_by_key(|(tag, _)| *tag);

        for (tag, action) in standing {
            if !self.advance(tag, action, seconds) {
                self.orders.remove(&tag);
            }
        }

        self.tick += 1;
    }

    /// Carries out one tick of a standing order. Returns false once the order is finished.
    fn advance(&mut self, tag: UnitTag, action: PrimitiveAction, seconds: f32) -> bool {
        let Some(unit) = self.unit(tag) else {
            return false;
        };

        let destination = match action {
            PrimitiveAction::MoveTo(position) | PrimitiveAction::AttackMove(position) => position,
            PrimitiveAction::Attack(target_tag) => {
                let Some(target) = self.unit(target_tag) else {
                    return false;
                };

                if unit.position.distance(target.position) > self.attack_range(&unit, &target) {
                    target.position
                } else {
                    if unit.weapon_ready() {
                        self.fire(&unit, &target);
                    }

                    return true;
                }
            }
            PrimitiveAction::Stop => return false,
        };

        let remaining = unit.position.distance(destination);

        if remaining <= EPSILON {
            return false;
        }

        let step = unit.speed * seconds;
        let next = if step >= remaining { destination } else { unit.position.towards(destination, step) };

        if self.is_pathable(next) {
            if let Some(unit) = self.unit_mut(tag) {
                unit.position = next;
            }
        }

        true
    }

    fn fire(&mut self, attacker: &Combatant, target: &Combatant) {
        let damage = self.dps(attacker, target) * attacker.weapon_period;
        let tick = self.tick;

        if let Some(target) = self.unit_mut(target.tag) {
            let absorbed = damage.min(target.shield);
            target.shield -= absorbed;
            target.health -= damage - absorbed;

            if target.health <= 0.0 {
                target.alive = false;
                debug!("Scenario unit {} destroyed at tick {}", target.tag, tick);
            }
        }

        if let Some(attacker) = self.unit_mut(attacker.tag) {
            attacker.weapon_cooldown = attacker.weapon_period;
        }
    }
}

impl GameView for ScenarioWorld {
    fn game_tick(&self) -> u32 {
        self.tick
    }

    fn unit(&self, tag: UnitTag) -> Option<Combatant> {
        self.entry(tag).map(|entry| entry.unit).filter(|unit| unit.alive)
    }

    fn is_pathable(&self, position: Point2) -> bool {
        if let Some((low, high)) = self.bounds {
            if position.x < low.x || position.y < low.y || position.x >= high.x || position.y >= high.y {
                return false;
            }
        }

        let tile = (position.x.floor() as i32, position.y.floor() as i32);

        !self.blocked_tiles.contains(&tile)
    }

    fn attack_range(&self, attacker: &Combatant, _target: &Combatant) -> f32 {
        self.weapon(attacker.tag).map(|weapon| weapon.range).unwrap_or(0.0)
    }

    fn dps(&self, attacker: &Combatant, target: &Combatant) -> f32 {
        self.weapon(attacker.tag)
            .filter(|weapon| weapon.can_hit(target))
            .map(|weapon| weapon.dps)
            .unwrap_or(0.0)
    }

    fn max_range(&self, unit: &Combatant) -> f32 {
        self.weapon(unit.tag).map(|weapon| weapon.range).unwrap_or(0.0)
    }

    fn pickups(&self) -> Vec<Point2> {
        self.pickups.clone()
    }
}

//
// Command recording.
//

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct IssuedCommand {
    pub tick: u32,
    pub command: UnitCommand,
}

/// Command sink that records every command with the tick it was issued on.
#[derive(Clone, Debug, Default)]
pub struct CommandLog {
    tick: u32,
    commands: Vec<IssuedCommand>,
}

impl CommandLog {
    pub fn new() -> CommandLog {
        CommandLog::default()
    }

    pub fn set_tick(&mut self, tick: u32) {
        self.tick = tick;
    }

    pub fn commands(&self) -> &[IssuedCommand] {
        &self.commands
    }

    pub fn at_tick(&self, tick: u32) -> Vec<UnitCommand> {
        self.commands.iter().filter(|issued| issued.tick == tick).map(|issued| issued.command).collect()
    }

    pub fn for_unit(&self, unit: UnitTag) -> impl Iterator<Item = &IssuedCommand> {
        self.commands.iter().filter(move |issued| issued.command.unit == unit)
    }

    fn record(&mut self, command: UnitCommand) {
        self.commands.push(IssuedCommand { tick: self.tick, command });
    }
}

impl CommandSink for CommandLog {
    fn issue_attack(&mut self, unit: UnitTag, target: UnitTag) {
        self.record(UnitCommand::attack(unit, target));
    }

    fn issue_move(&mut self, unit: UnitTag, position: Point2) {
        self.record(UnitCommand::move_to(unit, position));
    }

    fn issue_attack_move(&mut self, unit: UnitTag, position: Point2) {
        self.record(UnitCommand::new(unit, PrimitiveAction::AttackMove(position)));
    }

    fn issue_stop(&mut self, unit: UnitTag) {
        self.record(UnitCommand::new(unit, PrimitiveAction::Stop));
    }
}
