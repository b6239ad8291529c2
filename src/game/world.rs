//! The authoritative arena: every piece of simulation state and the tick step

use std::collections::VecDeque;

use thiserror::Error;
use tracing::{debug, info};

use crate::config::{DisplaySettings, GameSettings, MatchEndPolicy};
use crate::util::time::secs_to_ticks;
use crate::ws::protocol::{ControllerInput, GameEvent, MatchPhase};

use super::combat::{Bomb, Explosion};
use super::grid::{Cell, GridMap};
use super::movement::{MovementRules, MovementSystem};
use super::player::{spawn_corner, Player, PlayerId, RenderGeometry, MAX_PLAYERS};

/// Per-match constants, converted to ticks once at startup
#[derive(Debug, Clone, Copy)]
pub struct Rules {
    pub movement: MovementRules,
    pub geometry: RenderGeometry,
    pub starting_lives: u32,
    pub fuse_ticks: u32,
    pub cooldown_ticks: u32,
    pub explosion_ticks: u32,
    pub explosion_range: u32,
    /// Live bombs allowed per player
    pub bomb_cap: u32,
    pub match_end_policy: MatchEndPolicy,
}

impl Rules {
    pub fn new(game: &GameSettings, display: &DisplaySettings) -> Self {
        Self {
            movement: MovementRules::from(game),
            geometry: RenderGeometry::from(display),
            starting_lives: game.player_lives,
            fuse_ticks: secs_to_ticks(game.bomb_fuse),
            cooldown_ticks: secs_to_ticks(game.bomb_cooldown),
            explosion_ticks: secs_to_ticks(game.explosion_duration),
            explosion_range: game.bomb_explosion_range,
            bomb_cap: game.bomb_cap,
            match_end_policy: game.match_end_policy,
        }
    }
}

impl Default for Rules {
    fn default() -> Self {
        Self::new(&GameSettings::default(), &DisplaySettings::default())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum JoinError {
    #[error("Server full")]
    ServerFull,

    #[error("Match closed")]
    Closed,
}

/// Arena state (owned by the match task)
pub struct World {
    grid: GridMap,
    rules: Rules,
    players: [Option<Player>; MAX_PLAYERS],
    lives: [u32; MAX_PLAYERS],
    /// Live bombs per owner
    bomb_counts: [u32; MAX_PLAYERS],
    bombs: Vec<Bomb>,
    explosions: Vec<Explosion>,
    phase: MatchPhase,
    winner: Option<PlayerId>,
    tick: u64,
    events: Vec<GameEvent>,
}

impl World {
    pub fn new(grid: GridMap, rules: Rules) -> Self {
        Self {
            grid,
            rules,
            players: [None, None],
            lives: [0; MAX_PLAYERS],
            bomb_counts: [0; MAX_PLAYERS],
            bombs: Vec::new(),
            explosions: Vec::new(),
            phase: MatchPhase::Waiting,
            winner: None,
            tick: 0,
            events: Vec::new(),
        }
    }

    pub fn grid(&self) -> &GridMap {
        &self.grid
    }

    pub fn rules(&self) -> &Rules {
        &self.rules
    }

    pub fn players(&self) -> impl Iterator<Item = &Player> {
        self.players.iter().flatten()
    }

    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.get(id as usize).and_then(Option::as_ref)
    }

    pub fn player_count(&self) -> usize {
        self.players().count()
    }

    pub fn lives(&self) -> [u32; MAX_PLAYERS] {
        self.lives
    }

    pub fn bombs(&self) -> &[Bomb] {
        &self.bombs
    }

    pub fn explosions(&self) -> &[Explosion] {
        &self.explosions
    }

    pub fn phase(&self) -> MatchPhase {
        self.phase
    }

    pub fn winner(&self) -> Option<PlayerId> {
        self.winner
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Take the events buffered since the last drain
    pub fn drain_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.events)
    }

    /// Seat a new player in the lowest free slot
    pub fn join(&mut self) -> Result<PlayerId, JoinError> {
        let slot = self
            .players
            .iter()
            .position(Option::is_none)
            .ok_or(JoinError::ServerFull)?;
        let id = slot as PlayerId;

        let corner = spawn_corner(id, self.grid.width(), self.grid.height());
        self.players[slot] = Some(Player::spawn(id, corner, &self.rules.geometry));
        self.lives[slot] = self.rules.starting_lives;
        self.bomb_counts[slot] = 0;
        self.events.push(GameEvent::PlayerJoined { player_id: id });
        info!(player_id = id, x = corner.x, y = corner.y, "Player seated");

        if self.player_count() == MAX_PLAYERS {
            self.begin_match();
        }
        Ok(id)
    }

    /// Free a seat. The remaining player waits for a new opponent.
    pub fn leave(&mut self, id: PlayerId) {
        let slot = id as usize;
        if slot >= MAX_PLAYERS || self.players[slot].take().is_none() {
            return;
        }
        self.lives[slot] = 0;
        self.bomb_counts[slot] = 0;
        let grid = &mut self.grid;
        self.bombs.retain(|bomb| {
            if bomb.owner == id {
                grid.clear(bomb.pos);
            }
            bomb.owner != id
        });
        self.phase = MatchPhase::Waiting;
        self.winner = None;
        self.events.push(GameEvent::PlayerLeft { player_id: id });
        info!(player_id = id, "Player left arena");
    }

    /// Start a new match after a declared winner. Ignored in any other phase.
    pub fn rematch(&mut self, requested_by: PlayerId) -> bool {
        if self.phase != MatchPhase::Ended || self.player(requested_by).is_none() {
            return false;
        }
        info!(player_id = requested_by, "Rematch requested");
        self.begin_match();
        true
    }

    /// Fresh lives, current layout reloaded, everyone back on their corner
    fn begin_match(&mut self) {
        for (slot, player) in self.players.iter().enumerate() {
            if player.is_some() {
                self.lives[slot] = self.rules.starting_lives;
            }
        }
        self.winner = None;
        self.clear_round_state();
        self.grid.reset_to(self.grid.layout_index());
        self.phase = MatchPhase::InProgress;
        self.events.push(GameEvent::MatchStarted);
        info!(
            map = self.grid.layout_name(),
            lives = self.rules.starting_lives,
            "Match started"
        );
    }

    fn clear_round_state(&mut self) {
        let (width, height) = (self.grid.width(), self.grid.height());
        for player in self.players.iter_mut().flatten() {
            player.respawn(spawn_corner(player.id, width, height), &self.rules.geometry);
        }
        self.bombs.clear();
        self.explosions.clear();
        self.bomb_counts = [0; MAX_PLAYERS];
    }

    /// Re-seat players, drop bombs and explosions, rotate to the next layout
    pub fn reset_round(&mut self) {
        self.clear_round_state();
        self.grid.next_layout();
        self.events.push(GameEvent::RoundReset {
            map_index: self.grid.layout_index(),
            map_name: self.grid.layout_name().to_string(),
        });
        info!(
            map_index = self.grid.layout_index(),
            map = self.grid.layout_name(),
            "Round reset"
        );
    }

    /// Restore every seated player's lives, then reset the round
    pub fn reset_game(&mut self) {
        for (slot, player) in self.players.iter().enumerate() {
            if player.is_some() {
                self.lives[slot] = self.rules.starting_lives;
            }
        }
        self.events.push(GameEvent::GameReset);
        info!("All lives restored");
        self.reset_round();
    }

    /// Advance one tick with the latest input of each seat
    pub fn step(&mut self, inputs: &[Option<ControllerInput>; MAX_PLAYERS]) {
        self.tick += 1;
        if self.phase != MatchPhase::InProgress {
            // Blasts still fade and clear their debris while the arena is paused
            self.expire_explosions();
            return;
        }

        for player in self.players.iter_mut().flatten() {
            player.bomb_cooldown = player.bomb_cooldown.saturating_sub(1);
        }

        for (slot, input) in inputs.iter().enumerate() {
            let Some(input) = input else { continue };
            let Some(player) = self.players[slot].as_mut() else {
                continue;
            };
            MovementSystem::move_player(
                player,
                input,
                &self.grid,
                &self.rules.movement,
                &self.rules.geometry,
            );
            if input.place_bomb {
                self.place_bomb(slot as PlayerId);
            }
        }

        self.expire_explosions();
        let first_fresh = self.explosions.len();
        self.detonate_due_bombs();
        self.resolve_damage(first_fresh);
    }

    /// Drop a bomb on the player's nearest cell. Silently ignored when on
    /// cooldown, at the cap, or the cell is not free floor.
    fn place_bomb(&mut self, id: PlayerId) -> bool {
        let slot = id as usize;
        let Some(player) = self.players[slot].as_mut() else {
            return false;
        };
        if !player.can_place_bomb() || self.bomb_counts[slot] >= self.rules.bomb_cap {
            return false;
        }
        let pos = player.cell();
        if self.grid.cell(pos) != Some(Cell::Empty) {
            return false;
        }

        self.grid.place_bomb(pos);
        self.bombs.push(Bomb::new(
            id,
            player.bomb_variant,
            pos,
            self.rules.fuse_ticks,
            self.rules.explosion_range,
        ));
        self.bomb_counts[slot] += 1;
        player.grace_cell = Some(pos);
        player.bomb_cooldown = self.rules.cooldown_ticks;

        self.events.push(GameEvent::BombPlaced {
            player_id: id,
            x: pos.x,
            y: pos.y,
        });
        debug!(player_id = id, x = pos.x, y = pos.y, "Bomb placed");
        true
    }

    fn expire_explosions(&mut self) {
        let grid = &mut self.grid;
        self.explosions.retain_mut(|explosion| {
            if explosion.update() {
                explosion.clear_debris(grid);
                false
            } else {
                true
            }
        });
    }

    /// Detonate every bomb whose fuse ran out, plus any bomb caught in a blast
    fn detonate_due_bombs(&mut self) {
        let mut queue: VecDeque<(usize, bool)> = VecDeque::new();
        for (i, bomb) in self.bombs.iter_mut().enumerate() {
            if bomb.update() {
                bomb.exploded = true;
                queue.push_back((i, false));
            }
        }

        while let Some((i, chained)) = queue.pop_front() {
            let bomb = self.bombs[i].clone();
            self.grid.clear(bomb.pos);
            let owner = bomb.owner as usize;
            self.bomb_counts[owner] = self.bomb_counts[owner].saturating_sub(1);

            let explosion = Explosion::from_bomb(&bomb, self.rules.explosion_ticks, &mut self.grid);
            for (j, other) in self.bombs.iter_mut().enumerate() {
                if !other.exploded && explosion.covers(other.pos) {
                    other.exploded = true;
                    queue.push_back((j, true));
                }
            }

            self.events.push(GameEvent::BombExploded {
                player_id: bomb.owner,
                x: bomb.pos.x,
                y: bomb.pos.y,
                chained,
            });
            debug!(
                player_id = bomb.owner,
                x = bomb.pos.x,
                y = bomb.pos.y,
                sectors = explosion.sectors.len(),
                chained,
                "Bomb exploded"
            );
            self.explosions.push(explosion);
        }

        self.bombs.retain(|bomb| !bomb.exploded);
    }

    /// Apply this tick's blasts to players. Any hit costs one life and
    /// resets the round once; the fatal blasts stay visible afterwards.
    fn resolve_damage(&mut self, first_fresh: usize) {
        let fresh = &self.explosions[first_fresh..];
        if fresh.is_empty() {
            return;
        }

        // Owner of the first fresh blast covering each seat
        let mut hit: [Option<PlayerId>; MAX_PLAYERS] = [None; MAX_PLAYERS];
        for player in self.players.iter().flatten() {
            let cell = player.cell();
            hit[player.id as usize] = fresh
                .iter()
                .find(|explosion| explosion.covers(cell))
                .map(|explosion| explosion.owner);
        }
        if hit.iter().all(Option::is_none) {
            return;
        }

        let afterglow: Vec<Explosion> = fresh
            .iter()
            .cloned()
            .map(|mut explosion| {
                explosion.destroy.clear();
                explosion
            })
            .collect();

        for (slot, by) in hit
            .iter()
            .enumerate()
            .filter_map(|(slot, by)| by.map(|by| (slot, by)))
        {
            self.lives[slot] = self.lives[slot].saturating_sub(1);
            let player_id = slot as PlayerId;
            self.events.push(GameEvent::PlayerHit {
                player_id,
                by,
                lives_left: self.lives[slot],
            });
            info!(player_id, by, lives_left = self.lives[slot], "Player hit");
        }

        let knocked_out = self
            .players
            .iter()
            .enumerate()
            .any(|(slot, player)| player.is_some() && self.lives[slot] == 0);

        if !knocked_out {
            self.reset_round();
        } else {
            match self.rules.match_end_policy {
                MatchEndPolicy::AutoReset => self.reset_game(),
                MatchEndPolicy::DeclareWinner => {
                    let winner = self
                        .players()
                        .map(|player| player.id)
                        .find(|&id| self.lives[id as usize] > 0);
                    self.reset_round();
                    self.winner = winner;
                    self.phase = MatchPhase::Ended;
                    self.events.push(GameEvent::MatchEnded { winner });
                    info!(winner = ?winner, "Match ended");
                }
            }
        }

        self.explosions.extend(afterglow);
    }
}
