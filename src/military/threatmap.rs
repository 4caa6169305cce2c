use crate::game::GameView;
use crate::unit::*;
use lerp::Lerp;

/// Cost of a cell that cannot be walked on. Larger than any threat sum.
pub const IMPASSABLE_COST: f32 = 1.0e9;

/// Something the fleeing unit should keep away from.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ThreatSource {
    pub position: Point2,
    /// Distance at which the threat stops mattering (weapon range plus one second of movement).
    pub radius: f32,
    pub dps: f32,
}

impl ThreatSource {
    /// Threat cost at `distance`: `dps * (radius - distance)`, zero outside the radius.
    pub fn cost_at(&self, distance: f32) -> f32 {
        if self.radius <= 0.0 {
            return 0.0;
        }

        (self.dps * self.radius).lerp_bounded(0.0, distance / self.radius)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GridCell {
    pub x: i32,
    pub y: i32,
}

impl GridCell {
    pub fn new(x: i32, y: i32) -> GridCell {
        GridCell { x, y }
    }

    pub fn distance(self, other: GridCell) -> f32 {
        let dx = (self.x - other.x) as f32;
        let dy = (self.y - other.y) as f32;

        (dx * dx + dy * dy).sqrt()
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
struct InfluenceCell {
    pathable: bool,
    threat: f32,
}

/// Square scalar field centred on a unit. Cell `(x, y)` maps to the world
/// position `origin + (x - half, y - half)`.
pub struct InfluenceGrid {
    size: usize,
    origin: Point2,
    cells: Vec<InfluenceCell>,
}

impl InfluenceGrid {
    pub fn build(game: &dyn GameView, origin: Point2, size: usize, threats: &[ThreatSource], threat_scale: f32) -> InfluenceGrid {
        let size = size.max(1);

        let mut grid = InfluenceGrid {
            size,
            origin,
            cells: vec![InfluenceCell::default(); size * size],
        };

        for y in 0..size as i32 {
            for x in 0..size as i32 {
                let cell = GridCell::new(x, y);
                let world = grid.cell_to_world(cell);
                let index = grid.index(cell);

                grid.cells[index].pathable = game.is_pathable(world);
            }
        }

        for threat in threats {
            grid.add_threat(threat, threat_scale);
        }

        grid
    }

    fn add_threat(&mut self, threat: &ThreatSource, threat_scale: f32) {
        let center = self.world_to_cell(threat.position);
        let reach = threat.radius.ceil() as i32;

        for y in (center.y - reach)..=(center.y + reach) {
            for x in (center.x - reach)..=(center.x + reach) {
                let cell = GridCell::new(x, y);

                if !self.in_bounds(cell) {
                    continue;
                }

                let distance = self.cell_to_world(cell).distance(threat.position);

                if distance > threat.radius {
                    continue;
                }

                let index = self.index(cell);
                self.cells[index].threat += threat.cost_at(distance) * threat_scale;
            }
        }
    }

    fn index(&self, cell: GridCell) -> usize {
        cell.y as usize * self.size + cell.x as usize
    }

    fn half(&self) -> i32 {
        (self.size / 2) as i32
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn center(&self) -> GridCell {
        GridCell::new(self.half(), self.half())
    }

    pub fn in_bounds(&self, cell: GridCell) -> bool {
        cell.x >= 0 && cell.y >= 0 && (cell.x as usize) < self.size && (cell.y as usize) < self.size
    }

    pub fn cell_to_world(&self, cell: GridCell) -> Point2 {
        Point2::new(
            self.origin.x + (cell.x - self.half()) as f32,
            self.origin.y + (cell.y - self.half()) as f32,
        )
    }

    pub fn world_to_cell(&self, position: Point2) -> GridCell {
        GridCell::new(
            (position.x - self.origin.x).round() as i32 + self.half(),
            (position.y - self.origin.y).round() as i32 + self.half(),
        )
    }

    pub fn is_pathable(&self, cell: GridCell) -> bool {
        self.in_bounds(cell) && self.cells[self.index(cell)].pathable
    }

    /// Accumulated threat, or `IMPASSABLE_COST` for cells that cannot be entered.
    pub fn cost(&self, cell: GridCell) -> f32 {
        if !self.is_pathable(cell) {
            return IMPASSABLE_COST;
        }

        self.cells[self.index(cell)].threat
    }

    pub fn is_safe(&self, cell: GridCell) -> bool {
        self.cost(cell) <= 0.0
    }

    /// In-bounds pathable 8-neighbours in a fixed order.
    pub fn neighbours(&self, cell: GridCell) -> Vec<GridCell> {
        const OFFSETS: [(i32, i32); 8] = [(0, -1), (1, -1), (1, 0), (1, 1), (0, 1), (-1, 1), (-1, 0), (-1, -1)];

        OFFSETS
            .iter()
            .map(|(dx, dy)| GridCell::new(cell.x + dx, cell.y + dy))
            .filter(|neighbour| self.is_pathable(*neighbour))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::*;

    #[test]
    fn threat_cost_falls_off_linearly_to_the_radius() {
        let threat = ThreatSource {
            position: Point2::ZERO,
            radius: 4.0,
            dps: 10.0,
        };

        assert_eq!(threat.cost_at(0.0), 40.0);
        assert_eq!(threat.cost_at(2.0), 20.0);
        assert_eq!(threat.cost_at(4.0), 0.0);
        assert_eq!(threat.cost_at(9.0), 0.0);
    }

    #[test]
    fn grid_marks_blocked_tiles_with_sentinel_cost() {
        let mut world = ScenarioWorld::new(Vec::new());
        world.block_tile(11, 10);

        let grid = InfluenceGrid::build(&world, Point2::new(10.5, 10.5), 11, &[], 1.0);
        let center = grid.center();
        let blocked = GridCell::new(center.x + 1, center.y);

        assert_eq!(grid.cell_to_world(center), Point2::new(10.5, 10.5));
        assert_eq!(grid.cost(blocked), IMPASSABLE_COST);
        assert!(grid.is_safe(center));
        assert!(!grid.neighbours(center).contains(&blocked));
        assert_eq!(grid.neighbours(center).len(), 7);
    }

    #[test]
    fn threats_only_cover_cells_within_their_radius() {
        let world = ScenarioWorld::new(Vec::new());
        let threat = ThreatSource {
            position: Point2::new(0.0, 0.0),
            radius: 3.0,
            dps: 5.0,
        };

        let grid = InfluenceGrid::build(&world, Point2::ZERO, 21, &[threat], 1.0);
        let center = grid.center();

        assert_eq!(grid.cost(center), 15.0);
        assert!(grid.cost(GridCell::new(center.x + 2, center.y)) > 0.0);
        assert!(grid.is_safe(GridCell::new(center.x + 3, center.y)));
        assert!(grid.is_safe(GridCell::new(center.x + 5, center.y)));
    }
}
