//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

use serde::Serialize;

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Allowed client origins for CORS (comma-separated, `*` for any)
    pub client_origin: String,

    /// Simulation rules
    pub game: GameSettings,
    /// Rendering hints handed to views
    pub display: DisplaySettings,
}

/// What happens when a player runs out of lives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchEndPolicy {
    /// Freeze the arena and declare the opponent winner until a rematch is requested
    #[default]
    DeclareWinner,
    /// Restore every life and keep playing
    AutoReset,
}

impl FromStr for MatchEndPolicy {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "declare_winner" | "winner" => Ok(Self::DeclareWinner),
            "auto_reset" | "reset" => Ok(Self::AutoReset),
            _ => Err(()),
        }
    }
}

/// Simulation rules, fixed for the lifetime of the process
#[derive(Clone, Debug)]
pub struct GameSettings {
    pub grid_width: usize,
    pub grid_height: usize,
    /// Decimal places kept on continuous positions
    pub precision: u32,
    /// Cross-axis alignment slack; 0 means exactly aligned
    pub tolerance: f32,
    pub player_lives: u32,
    /// Grid units travelled per tick
    pub player_speed: f32,
    /// Seconds an explosion stays visible
    pub explosion_duration: f32,
    pub bomb_explosion_range: u32,
    /// Seconds between placement and detonation
    pub bomb_fuse: f32,
    /// Seconds before the same player may place again
    pub bomb_cooldown: f32,
    /// Live bombs allowed per player
    pub bomb_cap: u32,
    pub match_end_policy: MatchEndPolicy,
    /// Optional JSON file with named layouts replacing the built-in ones
    pub map_layouts_path: Option<PathBuf>,
}

impl Default for GameSettings {
    fn default() -> Self {
        Self {
            grid_width: 15,
            grid_height: 11,
            precision: 3,
            tolerance: 0.0,
            player_lives: 3,
            player_speed: 0.05,
            explosion_duration: 0.4,
            bomb_explosion_range: 2,
            bomb_fuse: 3.0,
            bomb_cooldown: 3.0,
            bomb_cap: 3,
            match_end_policy: MatchEndPolicy::default(),
            map_layouts_path: None,
        }
    }
}

/// RGB colour triple, serialized as `[r, g, b]`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Rgb(pub [u8; 3]);

impl FromStr for Rgb {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(',').map(str::trim).collect();
        if parts.len() != 3 {
            return Err(());
        }
        let mut rgb = [0u8; 3];
        for (slot, part) in rgb.iter_mut().zip(parts) {
            *slot = part.parse().map_err(|_| ())?;
        }
        Ok(Rgb(rgb))
    }
}

/// Display palette used by views
#[derive(Clone, Debug, Serialize)]
pub struct Palette {
    pub background: Rgb,
    pub grid: Rgb,
    pub breakable: Rgb,
    pub breaking: Rgb,
    pub bomb: Rgb,
    pub obstacle: Rgb,
    pub player: Rgb,
    pub player_2: Rgb,
    pub hud: Rgb,
    pub player1_explosion: Rgb,
    pub player2_explosion: Rgb,
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            background: Rgb([50, 150, 50]),
            grid: Rgb([200, 200, 200]),
            breakable: Rgb([139, 90, 43]),
            breaking: Rgb([255, 140, 0]),
            bomb: Rgb([30, 30, 30]),
            obstacle: Rgb([100, 100, 100]),
            player: Rgb([255, 0, 0]),
            player_2: Rgb([255, 255, 0]),
            hud: Rgb([0, 0, 0]),
            player1_explosion: Rgb([255, 200, 0]),
            player2_explosion: Rgb([160, 32, 240]),
        }
    }
}

/// Rendering hints; the server never reads these itself
#[derive(Clone, Debug, Serialize)]
pub struct DisplaySettings {
    pub tile_size: u32,
    pub hud_height: u32,
    pub colors: Palette,
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            tile_size: 50,
            hud_height: 50,
            colors: Palette::default(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Hosting platforms provide PORT, fall back to SERVER_ADDR or default
        let server_addr = if let Some(port) = lookup("PORT") {
            format!("0.0.0.0:{}", port)
        } else {
            lookup("SERVER_ADDR").unwrap_or_else(|| "0.0.0.0:8765".to_string())
        };

        let defaults = GameSettings::default();
        let game = GameSettings {
            grid_width: parse_or(&lookup, "GRID_WIDTH", defaults.grid_width)?,
            grid_height: parse_or(&lookup, "GRID_HEIGHT", defaults.grid_height)?,
            precision: parse_or(&lookup, "PRECISION", defaults.precision)?,
            tolerance: parse_or(&lookup, "TOLERANCE", defaults.tolerance)?,
            player_lives: parse_or(&lookup, "PLAYER_LIVES", defaults.player_lives)?,
            player_speed: parse_or(&lookup, "PLAYER_SPEED", defaults.player_speed)?,
            explosion_duration: parse_or(
                &lookup,
                "EXPLOSION_DURATION",
                defaults.explosion_duration,
            )?,
            bomb_explosion_range: parse_or(
                &lookup,
                "BOMB_EXPLOSION_RANGE",
                defaults.bomb_explosion_range,
            )?,
            bomb_fuse: parse_or(&lookup, "BOMB_FUSE", defaults.bomb_fuse)?,
            bomb_cooldown: parse_or(&lookup, "BOMB_COOLDOWN", defaults.bomb_cooldown)?,
            bomb_cap: parse_or(&lookup, "BOMB_CAP", defaults.bomb_cap)?,
            match_end_policy: parse_or(
                &lookup,
                "MATCH_END_POLICY",
                defaults.match_end_policy,
            )?,
            map_layouts_path: lookup("MAP_LAYOUTS_PATH").map(PathBuf::from),
        };
        game.validate()?;

        let palette = Palette::default();
        let display = DisplaySettings {
            tile_size: parse_or(&lookup, "TILE_SIZE", 50)?,
            hud_height: parse_or(&lookup, "HUD_HEIGHT", 50)?,
            colors: Palette {
                background: parse_or(&lookup, "BACKGROUND_COLOR", palette.background)?,
                grid: parse_or(&lookup, "GRID_COLOR", palette.grid)?,
                breakable: parse_or(&lookup, "BREAKABLE_COLOR", palette.breakable)?,
                breaking: parse_or(&lookup, "BREAKING_COLOR", palette.breaking)?,
                bomb: parse_or(&lookup, "BOMB_COLOR", palette.bomb)?,
                obstacle: parse_or(&lookup, "OBSTACLE_COLOR", palette.obstacle)?,
                player: parse_or(&lookup, "PLAYER_COLOR", palette.player)?,
                player_2: parse_or(&lookup, "PLAYER_2_COLOR", palette.player_2)?,
                hud: parse_or(&lookup, "HUD_COLOR", palette.hud)?,
                player1_explosion: parse_or(
                    &lookup,
                    "PLAYER1_EXPLOSION_COLOR",
                    palette.player1_explosion,
                )?,
                player2_explosion: parse_or(
                    &lookup,
                    "PLAYER2_EXPLOSION_COLOR",
                    palette.player2_explosion,
                )?,
            },
        };

        Ok(Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,
            log_level: lookup("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            client_origin: lookup("CLIENT_ORIGIN").unwrap_or_else(|| "*".to_string()),
            game,
            display,
        })
    }
}

impl GameSettings {
    /// Reject values the simulation cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.grid_width < 5 || self.grid_height < 5 {
            return Err(ConfigError::OutOfRange("GRID_WIDTH/GRID_HEIGHT must be at least 5"));
        }
        if self.precision > 6 {
            return Err(ConfigError::OutOfRange("PRECISION must be at most 6"));
        }
        if !(0.0..0.5).contains(&self.tolerance) {
            return Err(ConfigError::OutOfRange("TOLERANCE must be in [0, 0.5)"));
        }
        if self.player_lives == 0 {
            return Err(ConfigError::OutOfRange("PLAYER_LIVES must be positive"));
        }
        if !(self.player_speed > 0.0 && self.player_speed <= 1.0) {
            return Err(ConfigError::OutOfRange("PLAYER_SPEED must be in (0, 1]"));
        }
        // Players must land exactly on cell centres to turn
        let steps_per_cell = 1.0 / self.player_speed;
        if (steps_per_cell - steps_per_cell.round()).abs() > 1e-3 {
            return Err(ConfigError::OutOfRange(
                "PLAYER_SPEED must divide one cell into whole steps",
            ));
        }
        if self.bomb_explosion_range == 0 {
            return Err(ConfigError::OutOfRange("BOMB_EXPLOSION_RANGE must be positive"));
        }
        if self.bomb_cap == 0 {
            return Err(ConfigError::OutOfRange("BOMB_CAP must be positive"));
        }
        if self.bomb_fuse <= 0.0 || self.explosion_duration <= 0.0 || self.bomb_cooldown < 0.0 {
            return Err(ConfigError::OutOfRange("bomb timings must be positive"));
        }
        Ok(())
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value: raw }),
        None => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable {key}: {value:?}")]
    Invalid { key: &'static str, value: String },

    #[error("Configuration out of range: {0}")]
    OutOfRange(&'static str),

    #[error("Invalid server address format")]
    InvalidAddress,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let config = load(&[]).unwrap();
        assert_eq!(config.server_addr.port(), 8765);
        assert_eq!(config.game.grid_width, 15);
        assert_eq!(config.game.grid_height, 11);
        assert_eq!(config.game.player_lives, 3);
        assert_eq!(config.game.match_end_policy, MatchEndPolicy::DeclareWinner);
        assert_eq!(config.display.colors.background, Rgb([50, 150, 50]));
    }

    #[test]
    fn port_overrides_server_addr() {
        let config = load(&[("PORT", "9000"), ("SERVER_ADDR", "127.0.0.1:1")]).unwrap();
        assert_eq!(config.server_addr.port(), 9000);
    }

    #[test]
    fn game_values_are_parsed() {
        let config = load(&[
            ("PLAYER_LIVES", "5"),
            ("BOMB_EXPLOSION_RANGE", "3"),
            ("MATCH_END_POLICY", "auto_reset"),
            ("PLAYER_COLOR", "1, 2, 3"),
        ])
        .unwrap();
        assert_eq!(config.game.player_lives, 5);
        assert_eq!(config.game.bomb_explosion_range, 3);
        assert_eq!(config.game.match_end_policy, MatchEndPolicy::AutoReset);
        assert_eq!(config.display.colors.player, Rgb([1, 2, 3]));
    }

    #[test]
    fn malformed_values_name_the_variable() {
        let err = load(&[("PLAYER_LIVES", "many")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "PLAYER_LIVES", .. }));

        let err = load(&[("HUD_COLOR", "0,0")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "HUD_COLOR", .. }));
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        assert!(matches!(
            load(&[("PLAYER_LIVES", "0")]),
            Err(ConfigError::OutOfRange(_))
        ));
        assert!(matches!(
            load(&[("GRID_WIDTH", "3")]),
            Err(ConfigError::OutOfRange(_))
        ));
    }

    #[test]
    fn speed_must_reach_cell_centres() {
        assert!(matches!(
            load(&[("PLAYER_SPEED", "0.4")]),
            Err(ConfigError::OutOfRange(_))
        ));
        assert!(matches!(
            load(&[("PLAYER_SPEED", "0.3")]),
            Err(ConfigError::OutOfRange(_))
        ));
        for speed in ["0.1", "0.25", "0.5", "1"] {
            let config = load(&[("PLAYER_SPEED", speed)]).unwrap();
            assert_eq!(config.game.player_speed, speed.parse::<f32>().unwrap());
        }
    }
}
