//! Bombs, explosions and blast propagation

use super::grid::{Cell, GridMap, GridPos};
use super::player::{BombVariant, PlayerId};

/// Cardinal ray order: right, left, down, up
const DIRECTIONS: [(i32, i32); 4] = [(1, 0), (-1, 0), (0, 1), (0, -1)];

/// Live bomb on the grid
#[derive(Debug, Clone, PartialEq)]
pub struct Bomb {
    pub owner: PlayerId,
    pub variant: BombVariant,
    pub pos: GridPos,
    /// Ticks left before detonation
    pub fuse_ticks: u32,
    pub explosion_range: u32,
    pub exploded: bool,
}

impl Bomb {
    pub fn new(
        owner: PlayerId,
        variant: BombVariant,
        pos: GridPos,
        fuse_ticks: u32,
        explosion_range: u32,
    ) -> Self {
        Self {
            owner,
            variant,
            pos,
            fuse_ticks,
            explosion_range,
            exploded: false,
        }
    }

    /// Advance the fuse one tick, returns true once it has burned down
    pub fn update(&mut self) -> bool {
        if self.fuse_ticks == 0 {
            return !self.exploded;
        }
        self.fuse_ticks -= 1;
        false
    }
}

/// Visible blast produced by a detonation
#[derive(Debug, Clone, PartialEq)]
pub struct Explosion {
    pub variant: BombVariant,
    pub owner: PlayerId,
    /// Blast cells, origin first
    pub sectors: Vec<GridPos>,
    /// Blocks marked breaking by this blast, cleared on expiry
    pub destroy: Vec<GridPos>,
    pub ticks_remaining: u32,
}

impl Explosion {
    /// Detonate `bomb`, ray-casting its sectors against the grid
    pub fn from_bomb(bomb: &Bomb, visible_ticks: u32, grid: &mut GridMap) -> Self {
        let (sectors, destroy) = calculate_sectors(bomb.pos, bomb.explosion_range, grid);
        Self {
            variant: bomb.variant,
            owner: bomb.owner,
            sectors,
            destroy,
            ticks_remaining: visible_ticks,
        }
    }

    /// Advance one tick, returns true once the blast has faded
    pub fn update(&mut self) -> bool {
        if self.ticks_remaining == 0 {
            return true;
        }
        self.ticks_remaining -= 1;
        false
    }

    pub fn covers(&self, pos: GridPos) -> bool {
        self.sectors.contains(&pos)
    }

    /// Turn this blast's breaking blocks into floor
    pub fn clear_debris(&self, grid: &mut GridMap) {
        for &pos in &self.destroy {
            if grid.cell(pos) == Some(Cell::Breaking) {
                grid.clear(pos);
            }
        }
    }
}

/// Walk each cardinal direction up to `range` cells from `origin`.
///
/// Unbreakable and already-breaking cells stop the ray and are excluded.
/// A breakable cell is marked breaking, included, and stops the ray.
/// Floor and bomb cells are included and the ray continues.
/// Returns the sectors (origin first) and the cells marked breaking.
pub fn calculate_sectors(
    origin: GridPos,
    range: u32,
    grid: &mut GridMap,
) -> (Vec<GridPos>, Vec<GridPos>) {
    let mut sectors = vec![origin];
    let mut destroy = Vec::new();

    for (dx, dy) in DIRECTIONS {
        for i in 1..=range as i32 {
            let pos = origin.offset(dx * i, dy * i);
            match grid.cell(pos) {
                None | Some(Cell::Unbreakable) | Some(Cell::Breaking) => break,
                Some(Cell::Breakable) => {
                    grid.mark_breaking(pos);
                    sectors.push(pos);
                    destroy.push(pos);
                    break;
                }
                Some(Cell::Empty) | Some(Cell::Bomb) => sectors.push(pos),
            }
        }
    }

    (sectors, destroy)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::grid::builtin_layouts;

    fn grid(layout: usize) -> GridMap {
        let mut grid = GridMap::new(builtin_layouts(15, 11)).unwrap();
        grid.reset_to(layout);
        grid
    }

    fn cells(list: &[(i32, i32)]) -> Vec<GridPos> {
        list.iter().map(|&(x, y)| GridPos::new(x, y)).collect()
    }

    #[test]
    fn open_cross_reaches_full_range() {
        // (5, 1) in the "open" layout: row 1 and column 5 are clear
        let mut grid = grid(1);
        let (sectors, destroy) = calculate_sectors(GridPos::new(5, 1), 3, &mut grid);
        assert_eq!(
            sectors,
            cells(&[(5, 1), (6, 1), (7, 1), (8, 1), (4, 1), (3, 1), (2, 1), (5, 2), (5, 3), (5, 4)])
        );
        assert!(destroy.is_empty());
    }

    #[test]
    fn breakable_is_included_marked_and_stops_ray() {
        let mut grid = grid(1);
        let (sectors, destroy) = calculate_sectors(GridPos::new(7, 1), 1, &mut grid);
        assert!(sectors.contains(&GridPos::new(7, 2)));
        assert!(!sectors.contains(&GridPos::new(7, 3)));
        assert!(destroy.is_empty());

        // (7, 3) is breakable in this layout
        let (sectors, destroy) = calculate_sectors(GridPos::new(7, 2), 3, &mut grid);
        assert_eq!(destroy, cells(&[(7, 3)]));
        assert_eq!(sectors, cells(&[(7, 2), (7, 3), (7, 1)]));
        assert_eq!(grid.cell(GridPos::new(7, 3)), Some(Cell::Breaking));
    }

    #[test]
    fn unbreakable_and_breaking_cells_are_excluded() {
        let mut grid = grid(1);
        grid.mark_breaking(GridPos::new(3, 1));
        let (sectors, destroy) = calculate_sectors(GridPos::new(1, 1), 3, &mut grid);
        // Left and up hit the border, right stops before the breaking block
        assert_eq!(sectors, cells(&[(1, 1), (2, 1), (1, 2), (1, 3), (1, 4)]));
        assert!(destroy.is_empty());
    }

    #[test]
    fn rays_pass_over_bombs() {
        let mut grid = grid(1);
        grid.place_bomb(GridPos::new(3, 1));
        let (sectors, _) = calculate_sectors(GridPos::new(1, 1), 3, &mut grid);
        assert!(sectors.contains(&GridPos::new(3, 1)));
        assert!(sectors.contains(&GridPos::new(4, 1)));
    }

    #[test]
    fn sectors_are_deterministic() {
        let mut a = grid(0);
        let mut b = grid(0);
        let origin = GridPos::new(3, 3);
        assert_eq!(
            calculate_sectors(origin, 3, &mut a),
            calculate_sectors(origin, 3, &mut b)
        );
    }

    #[test]
    fn fuse_burns_down_exactly() {
        let mut bomb = Bomb::new(0, BombVariant::Type1, GridPos::new(1, 1), 3, 2);
        assert!(!bomb.update());
        assert!(!bomb.update());
        assert!(!bomb.update());
        assert!(bomb.update());
    }

    #[test]
    fn expiry_clears_only_own_breaking_blocks() {
        let mut grid = grid(1);
        let bomb = Bomb::new(0, BombVariant::Type1, GridPos::new(7, 2), 0, 3);
        let explosion = Explosion::from_bomb(&bomb, 2, &mut grid);
        assert_eq!(explosion.destroy, cells(&[(7, 3)]));
        assert!(explosion.covers(GridPos::new(7, 2)));

        let mut explosion = explosion;
        assert!(!explosion.update());
        assert!(!explosion.update());
        assert!(explosion.update());
        explosion.clear_debris(&mut grid);
        assert_eq!(grid.cell(GridPos::new(7, 3)), Some(Cell::Empty));
        assert_eq!(grid.cell(GridPos::new(4, 3)), Some(Cell::Breakable));
    }
}
