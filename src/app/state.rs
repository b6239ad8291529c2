//! Application state shared across routes

use std::sync::Arc;

use dashmap::DashMap;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::game::grid::{builtin_layouts, load_layouts, GridMap, LayoutError};
use crate::game::player::PlayerId;
use crate::game::{GameMatch, MatchHandle, Rules, World};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub game: MatchHandle,
    /// Seated connections
    pub sessions: Arc<DashMap<Uuid, PlayerId>>,
}

impl AppState {
    /// Build the arena from configuration. The returned match still has to be
    /// spawned by the caller.
    pub fn new(config: Config) -> Result<(Self, GameMatch), LayoutError> {
        let settings = &config.game;
        let layouts = match &settings.map_layouts_path {
            Some(path) => load_layouts(path)?,
            None => builtin_layouts(settings.grid_width, settings.grid_height),
        };
        let grid = GridMap::new(layouts)?;

        if (grid.width(), grid.height()) != (settings.grid_width, settings.grid_height) {
            warn!(
                width = grid.width(),
                height = grid.height(),
                "Layout file overrides configured grid size"
            );
        }
        info!(
            width = grid.width(),
            height = grid.height(),
            layouts = grid.layout_count(),
            "Arena loaded"
        );

        let world = World::new(grid, Rules::new(settings, &config.display));
        let (game_match, game) = GameMatch::new(world);

        let state = Self {
            config: Arc::new(config),
            game,
            sessions: Arc::new(DashMap::new()),
        };
        Ok((state, game_match))
    }
}
