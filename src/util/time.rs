//! Time utilities for game simulation

use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Get current Unix timestamp in fractional seconds (snapshot clock)
pub fn unix_secs_f64() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_secs_f64()
}

/// Server start time for uptime tracking
static SERVER_START: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();

/// Initialize server start time (call once at startup)
pub fn init_server_time() {
    SERVER_START.get_or_init(Instant::now);
}

/// Get server uptime in seconds
pub fn uptime_secs() -> u64 {
    SERVER_START
        .get()
        .map(|start| start.elapsed().as_secs())
        .unwrap_or(0)
}

/// Tick rate configuration
pub const SIMULATION_TPS: u32 = 60; // 60 ticks per second
pub const TICK_DURATION_MICROS: u64 = 1_000_000 / SIMULATION_TPS as u64;

/// Convert a duration in seconds to a whole number of simulation ticks.
///
/// A positive duration never collapses to zero ticks.
pub fn secs_to_ticks(secs: f32) -> u32 {
    if secs <= 0.0 {
        return 0;
    }
    ((secs * SIMULATION_TPS as f32).round() as u32).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fuse_of_three_seconds_is_180_ticks() {
        assert_eq!(secs_to_ticks(3.0), 180);
        assert_eq!(secs_to_ticks(0.4), 24);
    }

    #[test]
    fn non_positive_durations_are_zero_ticks() {
        assert_eq!(secs_to_ticks(0.0), 0);
        assert_eq!(secs_to_ticks(-1.0), 0);
    }

    #[test]
    fn tiny_durations_take_one_tick() {
        assert_eq!(secs_to_ticks(0.001), 1);
    }
}
