//! Player entity and spawn rules

use serde::Serialize;

use crate::config::DisplaySettings;

use super::grid::GridPos;

/// Seat number, 0 or 1
pub type PlayerId = u8;

/// Seats per arena
pub const MAX_PLAYERS: usize = 2;

/// Bomb flavour, fixed per seat and echoed in explosions for colouring
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BombVariant {
    #[serde(rename = "BOMB_TYPE_1")]
    Type1,
    #[serde(rename = "BOMB_TYPE_2")]
    Type2,
}

impl BombVariant {
    pub fn for_player(id: PlayerId) -> Self {
        if id == 0 {
            Self::Type1
        } else {
            Self::Type2
        }
    }
}

/// Spawn corner for a seat: top-left for 0, bottom-right for 1
pub fn spawn_corner(id: PlayerId, width: usize, height: usize) -> GridPos {
    if id == 0 {
        GridPos::new(1, 1)
    } else {
        GridPos::new(width as i32 - 2, height as i32 - 2)
    }
}

/// Maps grid units to view pixels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderGeometry {
    pub tile_size: f32,
    /// Pixels reserved above the arena for the HUD
    pub hud_height: f32,
}

impl RenderGeometry {
    pub fn to_pixels(&self, x: f32, y: f32) -> (f32, f32) {
        (x * self.tile_size, y * self.tile_size + self.hud_height)
    }
}

impl Default for RenderGeometry {
    fn default() -> Self {
        Self::from(&DisplaySettings::default())
    }
}

impl From<&DisplaySettings> for RenderGeometry {
    fn from(display: &DisplaySettings) -> Self {
        Self {
            tile_size: display.tile_size as f32,
            hud_height: display.hud_height as f32,
        }
    }
}

/// Player state in the arena (authoritative)
#[derive(Debug, Clone, PartialEq)]
pub struct Player {
    pub id: PlayerId,

    // Continuous position in grid units
    pub x: f32,
    pub y: f32,

    pub bomb_variant: BombVariant,
    /// Ticks until another bomb may be placed
    pub bomb_cooldown: u32,
    /// Cell of the bomb just dropped underfoot, walkable until the player leaves it
    pub grace_cell: Option<GridPos>,

    pixel: (f32, f32),
}

impl Player {
    pub fn spawn(id: PlayerId, corner: GridPos, geometry: &RenderGeometry) -> Self {
        let mut player = Self {
            id,
            x: corner.x as f32,
            y: corner.y as f32,
            bomb_variant: BombVariant::for_player(id),
            bomb_cooldown: 0,
            grace_cell: None,
            pixel: (0.0, 0.0),
        };
        player.refresh_render_position(geometry);
        player
    }

    /// Put the player back on its corner with fresh per-round state.
    /// The id and bomb variant are kept.
    pub fn respawn(&mut self, corner: GridPos, geometry: &RenderGeometry) {
        self.x = corner.x as f32;
        self.y = corner.y as f32;
        self.bomb_cooldown = 0;
        self.grace_cell = None;
        self.refresh_render_position(geometry);
    }

    pub fn can_place_bomb(&self) -> bool {
        self.bomb_cooldown == 0
    }

    /// Nearest cell, used for bomb placement and blast hits
    pub fn cell(&self) -> GridPos {
        GridPos::new(self.x.round() as i32, self.y.round() as i32)
    }

    pub fn refresh_render_position(&mut self, geometry: &RenderGeometry) {
        self.pixel = geometry.to_pixels(self.x, self.y);
    }

    /// Cached view-space position, top-left of the sprite
    pub fn render_position(&self) -> (f32, f32) {
        self.pixel
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn corners_depend_only_on_seat() {
        assert_eq!(spawn_corner(0, 15, 11), GridPos::new(1, 1));
        assert_eq!(spawn_corner(1, 15, 11), GridPos::new(13, 9));
    }

    #[test]
    fn respawn_keeps_identity_and_resets_round_state() {
        let geometry = RenderGeometry::default();
        let mut player = Player::spawn(1, GridPos::new(13, 9), &geometry);
        player.x = 7.35;
        player.y = 3.0;
        player.bomb_cooldown = 42;
        player.grace_cell = Some(GridPos::new(7, 3));

        player.respawn(GridPos::new(13, 9), &geometry);
        assert_eq!(player.id, 1);
        assert_eq!(player.bomb_variant, BombVariant::Type2);
        assert_eq!((player.x, player.y), (13.0, 9.0));
        assert!(player.can_place_bomb());
        assert_eq!(player.grace_cell, None);
    }

    #[test]
    fn render_position_tracks_grid_position_with_hud_offset() {
        let geometry = RenderGeometry {
            tile_size: 50.0,
            hud_height: 50.0,
        };
        let mut player = Player::spawn(0, GridPos::new(1, 1), &geometry);
        assert_eq!(player.render_position(), (50.0, 100.0));

        player.x = 2.5;
        player.refresh_render_position(&geometry);
        assert_eq!(player.render_position(), (125.0, 100.0));
    }

    #[test]
    fn cell_rounds_to_nearest() {
        let geometry = RenderGeometry::default();
        let mut player = Player::spawn(0, GridPos::new(1, 1), &geometry);
        player.x = 1.45;
        assert_eq!(player.cell(), GridPos::new(1, 1));
        player.x = 1.55;
        assert_eq!(player.cell(), GridPos::new(2, 1));
    }

    #[test]
    fn variants_serialize_with_wire_names() {
        assert_eq!(
            serde_json::to_string(&BombVariant::for_player(0)).unwrap(),
            "\"BOMB_TYPE_1\""
        );
        assert_eq!(
            serde_json::to_string(&BombVariant::for_player(1)).unwrap(),
            "\"BOMB_TYPE_2\""
        );
    }
}
