//! Grid movement and collision constraints

use crate::config::GameSettings;
use crate::ws::protocol::ControllerInput;

use super::grid::{GridMap, GridPos};
use super::player::{Player, RenderGeometry};

/// Movement constants
#[derive(Debug, Clone, Copy)]
pub struct MovementRules {
    /// Grid units per tick
    pub speed: f32,
    /// Decimal places kept on positions
    pub precision: u32,
    /// Cross-axis slack snapped onto the grid line before moving
    pub tolerance: f32,
}

impl From<&GameSettings> for MovementRules {
    fn from(settings: &GameSettings) -> Self {
        Self {
            speed: settings.player_speed,
            precision: settings.precision,
            tolerance: settings.tolerance,
        }
    }
}

impl MovementRules {
    fn round(&self, value: f32) -> f32 {
        let scale = 10f32.powi(self.precision as i32);
        (value * scale).round() / scale
    }

    /// Whether `value` sits on a grid line, snapping it there when within tolerance
    fn align(&self, value: &mut f32) -> bool {
        if *value == value.floor() {
            return true;
        }
        let nearest = value.round();
        if self.tolerance > 0.0 && (*value - nearest).abs() <= self.tolerance {
            *value = nearest;
            return true;
        }
        false
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Up,
    Down,
    Left,
    Right,
}

/// Movement system for resolving controller input against the grid
pub struct MovementSystem;

impl MovementSystem {
    /// Move a player one tick. Each pressed direction is tried on its own
    /// axis; blocked moves leave the position unchanged.
    pub fn move_player(
        player: &mut Player,
        input: &ControllerInput,
        grid: &GridMap,
        rules: &MovementRules,
        geometry: &RenderGeometry,
    ) {
        Self::expire_grace(player);

        let steps = [
            (input.up, Step::Up),
            (input.down, Step::Down),
            (input.left, Step::Left),
            (input.right, Step::Right),
        ];
        for (_, step) in steps.into_iter().filter(|(pressed, _)| *pressed) {
            Self::try_step(player, step, grid, rules);
        }

        player.refresh_render_position(geometry);
    }

    /// Drop the bomb grace once the player is more than a tile away from it
    fn expire_grace(player: &mut Player) {
        if let Some(grace) = player.grace_cell {
            let far_x = (player.x - grace.x as f32).abs() > 1.0;
            let far_y = (player.y - grace.y as f32).abs() > 1.0;
            if far_x || far_y {
                player.grace_cell = None;
            }
        }
    }

    fn try_step(player: &mut Player, step: Step, grid: &GridMap, rules: &MovementRules) {
        match step {
            Step::Up | Step::Down => {
                let mut x = player.x;
                if !rules.align(&mut x) {
                    return;
                }
                let new_y = if step == Step::Up {
                    rules.round(player.y - rules.speed)
                } else {
                    rules.round(player.y + rules.speed)
                };
                // Probe the tile being entered, not the one being left
                let probe_y = if step == Step::Up {
                    new_y.floor()
                } else {
                    new_y.ceil()
                };
                let target = GridPos::new(x as i32, probe_y as i32);
                if grid.is_walkable(target, player.grace_cell) {
                    player.x = x;
                    player.y = new_y;
                }
            }
            Step::Left | Step::Right => {
                let mut y = player.y;
                if !rules.align(&mut y) {
                    return;
                }
                let new_x = if step == Step::Left {
                    rules.round(player.x - rules.speed)
                } else {
                    rules.round(player.x + rules.speed)
                };
                let probe_x = if step == Step::Left {
                    new_x.floor()
                } else {
                    new_x.ceil()
                };
                let target = GridPos::new(probe_x as i32, y as i32);
                if grid.is_walkable(target, player.grace_cell) {
                    player.x = new_x;
                    player.y = y;
                }
            }
        }
    }
}
