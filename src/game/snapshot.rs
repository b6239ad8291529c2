//! Snapshot building for network transmission

use crate::util::time::unix_secs_f64;
use crate::ws::protocol::{
    BombSnapshot, ExplosionSnapshot, GameEvent, PlayerSnapshot, ServerMsg, WorldSnapshot,
};

use super::world::World;

/// Serialize the full world state. Every view gets the same message.
pub fn build(world: &World, events: Vec<GameEvent>) -> ServerMsg {
    let players = world
        .players()
        .map(|p| {
            let (pixel_x, pixel_y) = p.render_position();
            PlayerSnapshot {
                id: p.id,
                x: p.x,
                y: p.y,
                pixel_x,
                pixel_y,
            }
        })
        .collect();

    let bombs = world
        .bombs()
        .iter()
        .map(|b| BombSnapshot {
            x: b.pos.x,
            y: b.pos.y,
            player_id: b.owner,
        })
        .collect();

    let explosions = world
        .explosions()
        .iter()
        .map(|e| ExplosionSnapshot {
            sectors: e.sectors.clone(),
            bomb_type: e.variant,
        })
        .collect();

    ServerMsg::Snapshot(Box::new(WorldSnapshot {
        tick: world.tick(),
        players,
        bombs,
        explosions,
        map: world.grid().rows(),
        map_name: world.grid().layout_name().to_string(),
        lives: world.lives(),
        phase: world.phase(),
        winner: world.winner(),
        events,
        timestamp: unix_secs_f64(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::grid::{builtin_layouts, GridMap};
    use crate::game::world::Rules;

    #[test]
    fn snapshot_matches_wire_shape() {
        let mut world = World::new(GridMap::new(builtin_layouts(15, 11)).unwrap(), Rules::default());
        world.join().unwrap();
        world.join().unwrap();
        let events = world.drain_events();

        let json = serde_json::to_value(build(&world, events)).unwrap();
        assert_eq!(json["type"], "snapshot");
        assert_eq!(json["players"][0]["id"], 0);
        assert_eq!(json["players"][0]["x"], 1.0);
        assert_eq!(json["players"][1]["x"], 13.0);
        assert_eq!(json["players"][0]["pixel_y"], 100.0);
        assert_eq!(json["lives"], serde_json::json!([3, 3]));
        assert_eq!(json["map"].as_array().unwrap().len(), 11);
        assert_eq!(json["map"][0][0], 1);
        assert_eq!(json["map_name"], "classic");
        assert_eq!(json["phase"], "in_progress");
        assert!(json["winner"].is_null());
        assert!(json["bombs"].as_array().unwrap().is_empty());
        assert!(json["timestamp"].as_f64().unwrap() > 0.0);
        assert_eq!(json["events"][0]["event_type"], "player_joined");
    }

    #[test]
    fn explosions_carry_sectors_and_bomb_type() {
        let mut world = World::new(GridMap::new(builtin_layouts(15, 11)).unwrap(), Rules::default());
        world.join().unwrap();
        world.join().unwrap();
        let place = crate::ws::protocol::ControllerInput {
            place_bomb: true,
            ..Default::default()
        };
        world.step(&[Some(place), None]);
        let json = serde_json::to_value(build(&world, Vec::new())).unwrap();
        assert_eq!(json["bombs"][0], serde_json::json!({"x": 1, "y": 1, "player_id": 0}));
        assert_eq!(json["map"][1][1], 3);

        for _ in 0..180 {
            world.step(&[None, None]);
        }
        let json = serde_json::to_value(build(&world, Vec::new())).unwrap();
        assert_eq!(json["explosions"][0]["bomb_type"], "BOMB_TYPE_1");
        assert_eq!(json["explosions"][0]["sectors"][0], serde_json::json!([1, 1]));
    }
}
