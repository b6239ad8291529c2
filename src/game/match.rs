//! Match task: owns the world and runs the authoritative tick loop

use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::util::time::{SIMULATION_TPS, TICK_DURATION_MICROS};
use crate::ws::protocol::{ControllerInput, MatchPhase, ServerMsg};

use super::player::{PlayerId, MAX_PLAYERS};
use super::snapshot;
use super::world::{JoinError, World};

/// Requests from connection tasks, applied at the start of the next tick
#[derive(Debug)]
pub enum MatchCommand {
    Join {
        conn_id: Uuid,
        reply: oneshot::Sender<Result<PlayerId, JoinError>>,
    },
    Input {
        player_id: PlayerId,
        controller: ControllerInput,
    },
    Rematch {
        player_id: PlayerId,
    },
    Leave {
        player_id: PlayerId,
    },
}

/// Summary published after every tick for HTTP readers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MatchStatus {
    pub tick: u64,
    pub players: usize,
    pub phase: MatchPhase,
}

/// Handle to the running match
#[derive(Clone)]
pub struct MatchHandle {
    command_tx: mpsc::Sender<MatchCommand>,
    snapshot_tx: broadcast::Sender<ServerMsg>,
    status: Arc<RwLock<MatchStatus>>,
    arena_size: (usize, usize),
}

impl MatchHandle {
    /// Ask for a seat. Resolves once the match task has processed the request.
    pub async fn join(&self, conn_id: Uuid) -> Result<PlayerId, JoinError> {
        let (reply, reply_rx) = oneshot::channel();
        self.command_tx
            .send(MatchCommand::Join { conn_id, reply })
            .await
            .map_err(|_| JoinError::Closed)?;
        reply_rx.await.map_err(|_| JoinError::Closed)?
    }

    /// Queue controller state for the next tick. Returns false once the match is gone.
    pub async fn send_input(&self, player_id: PlayerId, controller: ControllerInput) -> bool {
        self.command_tx
            .send(MatchCommand::Input {
                player_id,
                controller,
            })
            .await
            .is_ok()
    }

    pub async fn rematch(&self, player_id: PlayerId) -> bool {
        self.command_tx
            .send(MatchCommand::Rematch { player_id })
            .await
            .is_ok()
    }

    pub async fn leave(&self, player_id: PlayerId) {
        let _ = self
            .command_tx
            .send(MatchCommand::Leave { player_id })
            .await;
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ServerMsg> {
        self.snapshot_tx.subscribe()
    }

    pub fn status(&self) -> MatchStatus {
        *self.status.read()
    }

    /// Grid width and height in cells
    pub fn arena_size(&self) -> (usize, usize) {
        self.arena_size
    }
}

/// The authoritative game match
pub struct GameMatch {
    world: World,
    command_rx: mpsc::Receiver<MatchCommand>,
    snapshot_tx: broadcast::Sender<ServerMsg>,
    /// Latest controller state per seat; later frames overwrite earlier ones
    pending: [Option<ControllerInput>; MAX_PLAYERS],
    status: Arc<RwLock<MatchStatus>>,
}

impl GameMatch {
    pub fn new(world: World) -> (Self, MatchHandle) {
        let (command_tx, command_rx) = mpsc::channel(256);
        let (snapshot_tx, _) = broadcast::channel(64);
        let status = Arc::new(RwLock::new(MatchStatus {
            tick: world.tick(),
            players: world.player_count(),
            phase: world.phase(),
        }));

        let handle = MatchHandle {
            command_tx,
            snapshot_tx: snapshot_tx.clone(),
            status: status.clone(),
            arena_size: (world.grid().width(), world.grid().height()),
        };

        let game_match = Self {
            world,
            command_rx,
            snapshot_tx,
            pending: [None; MAX_PLAYERS],
            status,
        };

        (game_match, handle)
    }

    /// Run the authoritative tick loop until every handle is dropped
    pub async fn run(mut self) {
        info!(
            tps = SIMULATION_TPS,
            map = self.world.grid().layout_name(),
            "Match loop started"
        );

        let mut tick_interval = interval(Duration::from_micros(TICK_DURATION_MICROS));
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tick_interval.tick().await;
            if !self.tick() {
                break;
            }
        }

        info!(tick = self.world.tick(), "Match loop stopped");
    }

    /// Apply queued commands, step the world and broadcast a snapshot.
    /// Returns false once no handle can send commands any more.
    pub fn tick(&mut self) -> bool {
        let open = self.process_commands();

        let inputs = self.pending;
        // Held directions persist, a bomb request fires once
        for input in self.pending.iter_mut().flatten() {
            input.place_bomb = false;
        }

        self.world.step(&inputs);

        let events = self.world.drain_events();
        // No receivers just means no views are connected
        let _ = self.snapshot_tx.send(snapshot::build(&self.world, events));

        *self.status.write() = MatchStatus {
            tick: self.world.tick(),
            players: self.world.player_count(),
            phase: self.world.phase(),
        };

        open
    }

    fn process_commands(&mut self) -> bool {
        loop {
            match self.command_rx.try_recv() {
                Ok(command) => self.handle_command(command),
                Err(TryRecvError::Empty) => return true,
                Err(TryRecvError::Disconnected) => return false,
            }
        }
    }

    fn handle_command(&mut self, command: MatchCommand) {
        match command {
            MatchCommand::Join { conn_id, reply } => {
                let result = self.world.join();
                match result {
                    Ok(player_id) => {
                        self.pending[player_id as usize] = None;
                        info!(conn_id = %conn_id, player_id, "Connection seated");
                        if reply.send(result).is_err() {
                            // Connection went away while waiting
                            self.world.leave(player_id);
                        }
                    }
                    Err(e) => {
                        warn!(conn_id = %conn_id, error = %e, "Join rejected");
                        let _ = reply.send(result);
                    }
                }
            }
            MatchCommand::Input {
                player_id,
                controller,
            } => {
                if self.world.player(player_id).is_some() {
                    self.pending[player_id as usize] = Some(controller);
                }
            }
            MatchCommand::Rematch { player_id } => {
                if !self.world.rematch(player_id) {
                    debug!(player_id, "Rematch ignored");
                }
            }
            MatchCommand::Leave { player_id } => {
                if let Some(slot) = self.pending.get_mut(player_id as usize) {
                    *slot = None;
                }
                self.world.leave(player_id);
            }
        }
    }
}
