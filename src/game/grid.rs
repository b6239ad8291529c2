//! Tile terrain: cell codes, named layouts and the live arena matrix

use std::path::Path;

use serde::{Deserialize, Serialize, Serializer};

/// A discrete tile address (column, row). Serialized as `[x, y]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GridPos {
    pub x: i32,
    pub y: i32,
}

impl GridPos {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn offset(self, dx: i32, dy: i32) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }

    /// Chebyshev distance (max of the axis distances)
    pub fn chebyshev(self, other: GridPos) -> i32 {
        (self.x - other.x).abs().max((self.y - other.y).abs())
    }
}

impl Serialize for GridPos {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq([self.x, self.y])
    }
}

/// Terrain cell state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cell {
    Empty,
    Unbreakable,
    Breakable,
    /// Breakable block hit by a live explosion, cleared when it expires
    Breaking,
    Bomb,
}

impl Cell {
    /// Wire code used in snapshots and layout files
    pub const fn code(self) -> i8 {
        match self {
            Cell::Empty => 0,
            Cell::Unbreakable => 1,
            Cell::Breakable => 2,
            Cell::Breaking => -2,
            Cell::Bomb => 3,
        }
    }

    pub const fn from_code(code: i8) -> Option<Self> {
        match code {
            0 => Some(Cell::Empty),
            1 => Some(Cell::Unbreakable),
            2 => Some(Cell::Breakable),
            -2 => Some(Cell::Breaking),
            3 => Some(Cell::Bomb),
            _ => None,
        }
    }
}

impl Serialize for Cell {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i8(self.code())
    }
}

/// A pristine, named arena layout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    pub name: String,
    rows: Vec<Vec<Cell>>,
}

/// On-disk layout shape: `{"name": "...", "cells": [[1,1,...], ...]}`
#[derive(Debug, Deserialize)]
struct LayoutFile {
    name: String,
    cells: Vec<Vec<i8>>,
}

impl Layout {
    /// Build a layout from wire codes. Only empty, unbreakable and breakable
    /// cells may appear in a pristine layout.
    pub fn from_codes(name: impl Into<String>, codes: &[Vec<i8>]) -> Result<Self, LayoutError> {
        let name = name.into();
        let mut rows = Vec::with_capacity(codes.len());
        for (y, row) in codes.iter().enumerate() {
            let mut cells = Vec::with_capacity(row.len());
            for (x, &code) in row.iter().enumerate() {
                match Cell::from_code(code) {
                    Some(cell @ (Cell::Empty | Cell::Unbreakable | Cell::Breakable)) => {
                        cells.push(cell)
                    }
                    _ => {
                        return Err(LayoutError::InvalidCell {
                            layout: name,
                            x,
                            y,
                            code,
                        })
                    }
                }
            }
            rows.push(cells);
        }
        Ok(Self { name, rows })
    }

    pub fn width(&self) -> usize {
        self.rows.first().map_or(0, Vec::len)
    }

    pub fn height(&self) -> usize {
        self.rows.len()
    }

    fn validate(&self, width: usize, height: usize) -> Result<(), LayoutError> {
        if self.height() != height || self.rows.iter().any(|row| row.len() != width) {
            return Err(LayoutError::Dimensions {
                layout: self.name.clone(),
                expected: (width, height),
            });
        }
        for (y, row) in self.rows.iter().enumerate() {
            for (x, cell) in row.iter().enumerate() {
                let border = x == 0 || y == 0 || x == width - 1 || y == height - 1;
                if border && *cell != Cell::Unbreakable {
                    return Err(LayoutError::OpenBorder {
                        layout: self.name.clone(),
                        x,
                        y,
                    });
                }
            }
        }
        for (x, y) in [(1, 1), (width - 2, height - 2)] {
            if self.rows[y][x] != Cell::Empty {
                return Err(LayoutError::BlockedSpawn {
                    layout: self.name.clone(),
                    x,
                    y,
                });
            }
        }
        Ok(())
    }
}

const CLASSIC: [[i8; 15]; 11] = [
    [1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1],
    [1, 0, 0, 0, 0, 2, 0, 0, 2, 0, 0, 0, 2, 0, 1],
    [1, 0, 1, 0, 1, 0, 1, 0, 1, 0, 1, 0, 1, 0, 1],
    [1, 0, 0, 0, 2, 0, 0, 0, 2, 0, 0, 0, 2, 0, 1],
    [1, 0, 1, 0, 1, 2, 1, 0, 1, 0, 1, 0, 1, 0, 1],
    [1, 0, 0, 2, 0, 2, 0, 0, 2, 0, 0, 0, 2, 0, 1],
    [1, 0, 1, 0, 1, 0, 1, 0, 1, 0, 1, 0, 1, 0, 1],
    [1, 0, 0, 0, 0, 0, 0, 2, 2, 0, 0, 0, 2, 0, 1],
    [1, 0, 1, 2, 1, 0, 1, 0, 1, 0, 1, 2, 1, 0, 1],
    [1, 0, 0, 0, 0, 0, 0, 0, 2, 0, 0, 0, 2, 0, 1],
    [1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1],
];

const OPEN: [[i8; 15]; 11] = [
    [1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1],
    [1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1],
    [1, 0, 1, 0, 1, 0, 1, 0, 1, 0, 1, 0, 1, 0, 1],
    [1, 0, 0, 2, 2, 0, 0, 2, 0, 0, 0, 0, 0, 0, 1],
    [1, 0, 1, 2, 1, 0, 1, 0, 1, 0, 1, 0, 1, 0, 1],
    [1, 0, 0, 0, 2, 2, 0, 0, 0, 2, 0, 0, 0, 0, 1],
    [1, 0, 1, 0, 1, 0, 1, 0, 1, 0, 1, 0, 1, 0, 1],
    [1, 0, 0, 0, 2, 0, 0, 0, 0, 2, 0, 0, 0, 0, 1],
    [1, 0, 1, 0, 1, 0, 1, 0, 1, 0, 1, 0, 1, 0, 1],
    [1, 0, 0, 2, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1],
    [1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1],
];

const SCATTERED: [[i8; 15]; 11] = [
    [1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1],
    [1, 0, 0, 0, 0, 0, 2, 0, 0, 0, 0, 0, 0, 0, 1],
    [1, 0, 1, 0, 1, 2, 1, 0, 1, 2, 1, 0, 1, 0, 1],
    [1, 0, 0, 2, 0, 2, 0, 0, 0, 0, 0, 0, 0, 0, 1],
    [1, 0, 1, 0, 1, 0, 1, 0, 1, 0, 1, 0, 1, 0, 1],
    [1, 0, 0, 2, 0, 0, 0, 0, 0, 2, 0, 0, 0, 0, 1],
    [1, 0, 1, 0, 1, 0, 1, 0, 1, 0, 1, 0, 1, 0, 1],
    [1, 0, 0, 2, 0, 0, 2, 0, 2, 2, 0, 0, 0, 0, 1],
    [1, 0, 1, 0, 1, 0, 1, 0, 1, 0, 1, 0, 1, 0, 1],
    [1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1],
    [1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1],
];

fn from_table<const W: usize, const H: usize>(name: &str, table: &[[i8; W]; H]) -> Layout {
    let rows = table
        .iter()
        .map(|row| row.iter().filter_map(|&code| Cell::from_code(code)).collect())
        .collect();
    Layout {
        name: name.to_string(),
        rows,
    }
}

/// Border plus a pillar on every even (x, y); optionally sprinkled with crates
fn pillar_arena(name: &str, width: usize, height: usize, crates: bool) -> Layout {
    let (far_x, far_y) = (width - 2, height - 2);
    let near_spawn = |x: usize, y: usize| (x <= 2 && y <= 2) || (x >= far_x - 1 && y >= far_y - 1);

    let rows = (0..height)
        .map(|y| {
            (0..width)
                .map(|x| {
                    let border = x == 0 || y == 0 || x == width - 1 || y == height - 1;
                    if border || (x % 2 == 0 && y % 2 == 0 && !near_spawn(x, y)) {
                        Cell::Unbreakable
                    } else if crates && !near_spawn(x, y) && (x * 7 + y * 3) % 5 == 0 {
                        Cell::Breakable
                    } else {
                        Cell::Empty
                    }
                })
                .collect()
        })
        .collect();

    Layout {
        name: name.to_string(),
        rows,
    }
}

/// The stock rotation for a given arena size
pub fn builtin_layouts(width: usize, height: usize) -> Vec<Layout> {
    if (width, height) == (15, 11) {
        vec![
            from_table("classic", &CLASSIC),
            from_table("open", &OPEN),
            from_table("scattered", &SCATTERED),
        ]
    } else {
        vec![
            pillar_arena("pillars", width, height, false),
            pillar_arena("crates", width, height, true),
        ]
    }
}

/// Read a JSON list of named layouts
pub fn load_layouts(path: &Path) -> Result<Vec<Layout>, LayoutError> {
    let raw = std::fs::read_to_string(path).map_err(|e| LayoutError::Io(e.to_string()))?;
    let files: Vec<LayoutFile> =
        serde_json::from_str(&raw).map_err(|e| LayoutError::Parse(e.to_string()))?;
    files
        .into_iter()
        .map(|file| Layout::from_codes(file.name, &file.cells))
        .collect()
}

/// The live arena: a mutable copy of the current layout
#[derive(Debug, Clone)]
pub struct GridMap {
    width: usize,
    height: usize,
    layouts: Vec<Layout>,
    current: usize,
    cells: Vec<Cell>,
}

impl GridMap {
    /// Validate the rotation and load its first layout
    pub fn new(layouts: Vec<Layout>) -> Result<Self, LayoutError> {
        let first = layouts.first().ok_or(LayoutError::Empty)?;
        let (width, height) = (first.width(), first.height());
        if width < 5 || height < 5 {
            return Err(LayoutError::Dimensions {
                layout: first.name.clone(),
                expected: (width.max(5), height.max(5)),
            });
        }
        for layout in &layouts {
            layout.validate(width, height)?;
        }

        let mut grid = Self {
            width,
            height,
            layouts,
            current: 0,
            cells: Vec::new(),
        };
        grid.reset_to(0);
        Ok(grid)
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn layout_index(&self) -> usize {
        self.current
    }

    pub fn layout_count(&self) -> usize {
        self.layouts.len()
    }

    pub fn layout_name(&self) -> &str {
        &self.layouts[self.current].name
    }

    fn index(&self, pos: GridPos) -> Option<usize> {
        let in_bounds = pos.x >= 0
            && pos.y >= 0
            && (pos.x as usize) < self.width
            && (pos.y as usize) < self.height;
        in_bounds.then(|| pos.y as usize * self.width + pos.x as usize)
    }

    /// Cell at `pos`, `None` when out of bounds
    pub fn cell(&self, pos: GridPos) -> Option<Cell> {
        self.index(pos).map(|i| self.cells[i])
    }

    fn set(&mut self, pos: GridPos, cell: Cell) {
        if let Some(i) = self.index(pos) {
            self.cells[i] = cell;
        }
    }

    pub fn is_unbreakable(&self, pos: GridPos) -> bool {
        self.cell(pos) == Some(Cell::Unbreakable)
    }

    pub fn is_breakable(&self, pos: GridPos) -> bool {
        self.cell(pos) == Some(Cell::Breakable)
    }

    /// Whether a player may enter `pos`. Bomb cells stay open to a player
    /// whose grace cell is within one tile of them.
    pub fn is_walkable(&self, pos: GridPos, grace_cell: Option<GridPos>) -> bool {
        match self.cell(pos) {
            Some(Cell::Empty) => true,
            Some(Cell::Bomb) => grace_cell.is_some_and(|grace| grace.chebyshev(pos) <= 1),
            Some(Cell::Unbreakable | Cell::Breakable | Cell::Breaking) | None => false,
        }
    }

    pub fn mark_breaking(&mut self, pos: GridPos) {
        self.set(pos, Cell::Breaking);
    }

    pub fn place_bomb(&mut self, pos: GridPos) {
        self.set(pos, Cell::Bomb);
    }

    pub fn clear(&mut self, pos: GridPos) {
        self.set(pos, Cell::Empty);
    }

    /// Restore the pristine copy of a layout (index wraps)
    pub fn reset_to(&mut self, layout_index: usize) {
        self.current = layout_index % self.layouts.len();
        self.cells = self.layouts[self.current]
            .rows
            .iter()
            .flat_map(|row| row.iter().copied())
            .collect();
    }

    /// Advance the rotation and restore that layout
    pub fn next_layout(&mut self) {
        self.reset_to(self.current + 1);
    }

    /// Row-major matrix of wire codes
    pub fn rows(&self) -> Vec<Vec<Cell>> {
        self.cells.chunks(self.width).map(<[Cell]>::to_vec).collect()
    }
}

/// Layout validation/loading errors
#[derive(Debug, thiserror::Error)]
pub enum LayoutError {
    #[error("no layouts configured")]
    Empty,

    #[error("layout {layout:?} must be {}x{} and rectangular", .expected.0, .expected.1)]
    Dimensions {
        layout: String,
        expected: (usize, usize),
    },

    #[error("layout {layout:?} has non-wall border cell at ({x}, {y})")]
    OpenBorder { layout: String, x: usize, y: usize },

    #[error("layout {layout:?} blocks spawn corner ({x}, {y})")]
    BlockedSpawn { layout: String, x: usize, y: usize },

    #[error("layout {layout:?} has invalid cell code {code} at ({x}, {y})")]
    InvalidCell {
        layout: String,
        x: usize,
        y: usize,
        code: i8,
    },

    #[error("failed to read layouts: {0}")]
    Io(String),

    #[error("failed to parse layouts: {0}")]
    Parse(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stock() -> GridMap {
        GridMap::new(builtin_layouts(15, 11)).unwrap()
    }

    #[test]
    fn builtin_layouts_are_valid_for_any_size() {
        assert_eq!(stock().layout_count(), 3);
        let odd = GridMap::new(builtin_layouts(9, 7)).unwrap();
        assert_eq!((odd.width(), odd.height()), (9, 7));
        assert_eq!(odd.layout_count(), 2);
    }

    #[test]
    fn border_is_unbreakable_and_out_of_bounds_is_blocked() {
        let grid = stock();
        for x in 0..15 {
            assert!(grid.is_unbreakable(GridPos::new(x, 0)));
            assert!(grid.is_unbreakable(GridPos::new(x, 10)));
        }
        assert!(!grid.is_walkable(GridPos::new(-1, 3), None));
        assert!(!grid.is_walkable(GridPos::new(15, 3), None));
        assert_eq!(grid.cell(GridPos::new(3, 11)), None);
    }

    #[test]
    fn bomb_cells_only_open_to_nearby_grace() {
        let mut grid = stock();
        let bomb = GridPos::new(1, 1);
        grid.place_bomb(bomb);

        assert!(!grid.is_walkable(bomb, None));
        assert!(grid.is_walkable(bomb, Some(bomb)));
        assert!(grid.is_walkable(bomb, Some(GridPos::new(2, 2))));
        assert!(!grid.is_walkable(bomb, Some(GridPos::new(3, 1))));
    }

    #[test]
    fn breaking_cells_are_not_walkable() {
        let mut grid = stock();
        let crate_pos = GridPos::new(5, 1);
        assert!(grid.is_breakable(crate_pos));
        grid.mark_breaking(crate_pos);
        assert_eq!(grid.cell(crate_pos), Some(Cell::Breaking));
        assert!(!grid.is_walkable(crate_pos, Some(crate_pos)));
        grid.clear(crate_pos);
        assert!(grid.is_walkable(crate_pos, None));
    }

    #[test]
    fn rotation_wraps_and_restores_pristine_cells() {
        let mut grid = stock();
        grid.clear(GridPos::new(5, 1));
        grid.next_layout();
        grid.next_layout();
        grid.next_layout();
        assert_eq!(grid.layout_index(), 0);
        assert_eq!(grid.layout_name(), "classic");
        assert!(grid.is_breakable(GridPos::new(5, 1)));
    }

    #[test]
    fn layout_validation_catches_bad_maps() {
        let mut codes: Vec<Vec<i8>> = CLASSIC.iter().map(|r| r.to_vec()).collect();
        codes[0][4] = 0;
        let open = Layout::from_codes("leaky", &codes).unwrap();
        assert!(matches!(
            GridMap::new(vec![open]),
            Err(LayoutError::OpenBorder { x: 4, y: 0, .. })
        ));

        let mut codes: Vec<Vec<i8>> = CLASSIC.iter().map(|r| r.to_vec()).collect();
        codes[1][1] = 2;
        let blocked = Layout::from_codes("blocked", &codes).unwrap();
        assert!(matches!(
            GridMap::new(vec![blocked]),
            Err(LayoutError::BlockedSpawn { x: 1, y: 1, .. })
        ));

        let mut codes: Vec<Vec<i8>> = CLASSIC.iter().map(|r| r.to_vec()).collect();
        codes[3][3] = 3;
        assert!(matches!(
            Layout::from_codes("bomb", &codes),
            Err(LayoutError::InvalidCell { code: 3, .. })
        ));

        assert!(matches!(GridMap::new(Vec::new()), Err(LayoutError::Empty)));
    }

    #[test]
    fn mismatched_layout_sizes_are_rejected() {
        let mut layouts = builtin_layouts(15, 11);
        layouts.extend(builtin_layouts(9, 7));
        assert!(matches!(
            GridMap::new(layouts),
            Err(LayoutError::Dimensions { .. })
        ));
    }

    #[test]
    fn layouts_load_from_json() {
        let path = std::env::temp_dir().join(format!("layouts-{}.json", std::process::id()));
        let rows: Vec<Vec<i8>> = OPEN.iter().map(|r| r.to_vec()).collect();
        let json = serde_json::json!([{ "name": "custom", "cells": rows }]);
        std::fs::write(&path, json.to_string()).unwrap();

        let layouts = load_layouts(&path).unwrap();
        std::fs::remove_file(&path).ok();
        let grid = GridMap::new(layouts).unwrap();
        assert_eq!(grid.layout_name(), "custom");
        assert!(grid.is_breakable(GridPos::new(3, 3)));
    }

    #[test]
    fn snapshot_rows_serialize_as_codes() {
        let mut grid = stock();
        grid.place_bomb(GridPos::new(1, 1));
        grid.mark_breaking(GridPos::new(5, 1));
        let rows = serde_json::to_value(grid.rows()).unwrap();
        assert_eq!(rows[1][1], 3);
        assert_eq!(rows[1][5], -2);
        assert_eq!(rows[0][0], 1);
        assert_eq!(serde_json::to_string(&GridPos::new(4, 2)).unwrap(), "[4,2]");
    }
}
