use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use shrinkwraprs::Shrinkwrap;
use std::fmt;
use std::ops::{Add, Mul, Sub};

/// Smallest positive value used in place of a zero distance or speed when
/// either appears as a denominator.
pub const EPSILON: f32 = 1.0e-4;

/// Simulation ticks per game second.
pub const TICKS_PER_SECOND: f32 = 22.4;

/// Stable identity of a game unit. Valid across ticks for as long as the unit
/// exists; the game never reuses a tag.
#[derive(Shrinkwrap, Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnitTag(pub u64);

impl fmt::Display for UnitTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

//
// Geometry.
//

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Point2 {
    pub x: f32,
    pub y: f32,
}

impl Point2 {
    pub const ZERO: Point2 = Point2 { x: 0.0, y: 0.0 };

    pub fn new(x: f32, y: f32) -> Point2 {
        Point2 { x, y }
    }

    pub fn distance_sq(self, other: Point2) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }

    pub fn distance(self, other: Point2) -> f32 {
        self.distance_sq(other).sqrt()
    }

    pub fn length(self) -> f32 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    /// Unit vector in the same direction. Vectors shorter than `EPSILON`
    /// normalize to zero rather than to NaN.
    pub fn normalized(self) -> Point2 {
        let length = self.length();

        if length < EPSILON {
            Point2::ZERO
        } else {
            Point2::new(self.x / length, self.y / length)
        }
    }

    /// Point `distance` units from `self` in the direction of `other`.
    pub fn towards(self, other: Point2, distance: f32) -> Point2 {
        self + (other - self).normalized() * distance
    }

    /// Point `distance` units from `self` directly away from `other`.
    pub fn away_from(self, other: Point2, distance: f32) -> Point2 {
        self + (self - other).normalized() * distance
    }

    pub fn is_zero(self) -> bool {
        self.x.abs() < EPSILON && self.y.abs() < EPSILON
    }
}

impl Add for Point2 {
    type Output = Point2;

    fn add(self, rhs: Point2) -> Point2 {
        Point2::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Point2 {
    type Output = Point2;

    fn sub(self, rhs: Point2) -> Point2 {
        Point2::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f32> for Point2 {
    type Output = Point2;

    fn mul(self, rhs: f32) -> Point2 {
        Point2::new(self.x * rhs, self.y * rhs)
    }
}

impl fmt::Display for Point2 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.1}, {:.1})", self.x, self.y)
    }
}

//
// Classification.
//

bitflags! {
    /// Unit-type classification and per-tick status bits.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct UnitFlags: u32 {
        const COMBAT           = 1;
        const WORKER           = 1 << 1;
        const BUILDING         = 1 << 2;
        const DETECTOR         = 1 << 3;
        const FLYING           = 1 << 4;
        const BURROWED         = 1 << 5;

        /// Building with a weapon (turret, cannon, spine).
        const STATIC_DEFENSE   = 1 << 6;
        /// Unit its owner respawns for free (interceptors, broodlings).
        const MINION           = 1 << 7;
        /// Structure that shelters other units; shooting it is mostly wasted.
        const SHIELD_STRUCTURE = 1 << 8;
        /// Building-placed detection decoy that is only worth shooting while freshly seen.
        const DETECTION_DECOY  = 1 << 9;
        /// Non-interactive placeholder (eggs, larvae).
        const PLACEHOLDER      = 1 << 10;
        /// Not targetable by game rules.
        const UNTARGETABLE     = 1 << 11;
        /// Under a status effect that prevents targeting it this tick.
        const STATUS_IMMUNE    = 1 << 12;
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Alliance {
    #[default]
    Own,
    Ally,
    Neutral,
    Enemy,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CloakState {
    #[default]
    NotCloaked,
    Cloaked,
    CloakedDetected,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DisplayType {
    #[default]
    Visible,
    /// Last known state of a unit no longer in vision.
    Snapshot,
    Hidden,
}

/// Economic action a hostile worker is currently performing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WorkerActivity {
    #[default]
    None,
    Building,
    Repairing,
    EnteringRefinery,
}

//
// Combatant.
//

/// Read-only snapshot of a game unit for the current tick.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Combatant {
    pub tag: UnitTag,
    pub alliance: Alliance,
    pub position: Point2,
    pub health: f32,
    pub health_max: f32,
    pub shield: f32,
    pub shield_max: f32,
    /// Seconds until the weapon can fire again.
    pub weapon_cooldown: f32,
    /// Full weapon period in seconds.
    pub weapon_period: f32,
    /// Movement speed in tiles per second.
    pub speed: f32,
    pub flags: UnitFlags,
    pub cloak: CloakState,
    pub display: DisplayType,
    pub activity: WorkerActivity,
    pub last_seen_tick: u32,
    pub alive: bool,
}

impl Default for Combatant {
    fn default() -> Self {
        Combatant {
            tag: UnitTag(0),
            alliance: Alliance::Own,
            position: Point2::ZERO,
            health: 1.0,
            health_max: 1.0,
            shield: 0.0,
            shield_max: 0.0,
            weapon_cooldown: 0.0,
            weapon_period: 1.0,
            speed: 0.0,
            flags: UnitFlags::empty(),
            cloak: CloakState::NotCloaked,
            display: DisplayType::Visible,
            activity: WorkerActivity::None,
            last_seen_tick: 0,
            alive: true,
        }
    }
}

impl Combatant {
    pub fn hit_points(&self) -> f32 {
        self.health + self.shield
    }

    pub fn is_combat(&self) -> bool {
        self.flags.contains(UnitFlags::COMBAT)
    }

    pub fn is_worker(&self) -> bool {
        self.flags.contains(UnitFlags::WORKER)
    }

    pub fn is_building(&self) -> bool {
        self.flags.contains(UnitFlags::BUILDING)
    }

    pub fn is_flying(&self) -> bool {
        self.flags.contains(UnitFlags::FLYING)
    }

    pub fn is_detector(&self) -> bool {
        self.flags.contains(UnitFlags::DETECTOR)
    }

    pub fn is_static_defense(&self) -> bool {
        self.flags.contains(UnitFlags::STATIC_DEFENSE)
    }

    /// Building that neither shoots nor shelters anything.
    pub fn is_passive_structure(&self) -> bool {
        self.is_building() && !self.flags.intersects(UnitFlags::STATIC_DEFENSE | UnitFlags::SHIELD_STRUCTURE)
    }

    pub fn is_placeholder(&self) -> bool {
        self.flags.contains(UnitFlags::PLACEHOLDER)
    }

    pub fn weapon_ready(&self) -> bool {
        self.weapon_cooldown <= 0.0
    }

    /// Speed clamped away from zero for use as a denominator.
    pub fn safe_speed(&self) -> f32 {
        self.speed.max(EPSILON)
    }
}

//
// Orders and actions.
//

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderType {
    #[default]
    Idle,
    Attack,
    Defend,
    Harass,
    Regroup,
}

/// The squad's current strategic directive.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub order_type: OrderType,
    pub position: Point2,
    pub radius: f32,
}

impl Order {
    pub fn new(order_type: OrderType, position: Point2, radius: f32) -> Order {
        Order {
            order_type,
            position,
            radius,
        }
    }

    pub fn contains(&self, position: Point2) -> bool {
        self.position.distance(position) <= self.radius
    }
}

/// The sole output of every strategy. Ownership passes to the command layer
/// as soon as it is dispatched.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum PrimitiveAction {
    Attack(UnitTag),
    MoveTo(Point2),
    AttackMove(Point2),
    Stop,
}

impl fmt::Display for PrimitiveAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrimitiveAction::Attack(target) => write!(f, "attack {}", target),
            PrimitiveAction::MoveTo(position) => write!(f, "move {}", position),
            PrimitiveAction::AttackMove(position) => write!(f, "attack-move {}", position),
            PrimitiveAction::Stop => write!(f, "stop"),
        }
    }
}

/// A primitive action bound to the friendly unit that should perform it.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct UnitCommand {
    pub unit: UnitTag,
    pub action: PrimitiveAction,
}

impl UnitCommand {
    pub fn new(unit: UnitTag, action: PrimitiveAction) -> UnitCommand {
        UnitCommand { unit, action }
    }

    pub fn attack(unit: UnitTag, target: UnitTag) -> UnitCommand {
        UnitCommand::new(unit, PrimitiveAction::Attack(target))
    }

    pub fn move_to(unit: UnitTag, position: Point2) -> UnitCommand {
        UnitCommand::new(unit, PrimitiveAction::MoveTo(position))
    }
}
