//! Room Actor
//!
//! One task per room owns the [`Room`] and runs its tick loop, zone
//! loop, command queue and teardown timers on a single `select!`, so the
//! room state is never touched from two places at once. Connections talk
//! to the room through a [`RoomHandle`].

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use futures_util::future::join_all;
use tokio::time::{interval, interval_at, sleep_until, timeout, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::core::rng::RoomRng;
use crate::game::events::GameEvent;
use crate::game::input::{apply_action, PlayerAction};
use crate::game::state::{RoomState, SessionId};
use crate::game::tick::{check_end_conditions, new_room_state, shrink, spawn_player, tick, RoomConfig};
use crate::network::protocol::{
    event_to_message, JoinedInfo, Outbound, RoomListing, RoomMetadata, ServerMessage,
};
use crate::network::replication::{FullState, StatePatch};

/// Capacity of a room's command queue.
const COMMAND_BUFFER: usize = 256;

/// How long teardown waits for space in a full outbound queue.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// Room lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomPhase {
    /// State built, loops not started.
    Created,
    /// Accepting players and simulating.
    Active,
    /// Match decided; simulating until teardown, no new players.
    Ending,
    /// Loops stopped.
    Disposed,
}

/// Room errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RoomError {
    /// Room is at capacity.
    #[error("Room is full")]
    Full,

    /// Room is ending and takes no new players.
    #[error("Room is not accepting players")]
    Locked,

    /// Room task has stopped.
    #[error("Room is closed")]
    Closed,

    /// Session already joined.
    #[error("Session {0} already in room")]
    AlreadyJoined(SessionId),
}

/// Published room status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoomStatus {
    /// Lifecycle phase.
    pub phase: RoomPhase,
    /// Connected clients.
    pub clients: usize,
}

// =============================================================================
// ROOM
// =============================================================================

/// A connection subscribed to the room.
struct Client {
    sender: mpsc::Sender<Outbound>,
    /// A patch was lost; the next flush sends a full `state` instead.
    needs_resync: bool,
}

/// A room: simulation state plus the connections subscribed to it.
pub struct Room {
    /// Room id.
    pub id: String,
    /// Room metadata.
    pub metadata: RoomMetadata,
    config: Arc<RoomConfig>,
    state: RoomState,
    phase: RoomPhase,
    clients: BTreeMap<SessionId, Client>,
    /// Last replicated capture; patches are diffed against it.
    last_snapshot: FullState,
    ever_joined: bool,
}

impl Room {
    /// Create a room and seed its weapons.
    pub fn new(id: String, metadata: RoomMetadata, config: Arc<RoomConfig>) -> Self {
        let rng = RoomRng::for_room(&id, &metadata.unique_id);
        let state = new_room_state(&config, rng);
        let last_snapshot = FullState::capture(&state);

        Self {
            id,
            metadata,
            config,
            state,
            phase: RoomPhase::Created,
            clients: BTreeMap::new(),
            last_snapshot,
            ever_joined: false,
        }
    }

    /// Start accepting players.
    pub fn activate(&mut self) {
        if self.phase == RoomPhase::Created {
            self.phase = RoomPhase::Active;
            info!("Room {} active", self.id);
        }
    }

    /// Current phase.
    pub fn phase(&self) -> RoomPhase {
        self.phase
    }

    /// Status for the registry.
    pub fn status(&self) -> RoomStatus {
        RoomStatus { phase: self.phase, clients: self.clients.len() }
    }

    /// Read access to the simulation.
    pub fn state(&self) -> &RoomState {
        &self.state
    }

    #[cfg(test)]
    pub(crate) fn state_mut(&mut self) -> &mut RoomState {
        &mut self.state
    }

    /// Every client left after at least one joined.
    pub fn is_abandoned(&self) -> bool {
        self.ever_joined && self.clients.is_empty()
    }

    /// Listing entry.
    pub fn listing(&self) -> RoomListing {
        RoomListing {
            room_id: self.id.clone(),
            name: self.metadata.name.clone(),
            clients: self.clients.len(),
            max_clients: self.config.max_clients,
            metadata: self.metadata.clone(),
        }
    }

    /// Add a connection and its player.
    ///
    /// The joining connection receives `joined`, a full `state`, the zone
    /// geometry and its ammo directly; everyone else sees the new player
    /// in a patch.
    pub fn join(
        &mut self,
        session_id: SessionId,
        sender: mpsc::Sender<Outbound>,
    ) -> Result<JoinedInfo, RoomError> {
        match self.phase {
            RoomPhase::Active => {}
            RoomPhase::Created | RoomPhase::Ending => return Err(RoomError::Locked),
            RoomPhase::Disposed => return Err(RoomError::Closed),
        }
        if self.clients.contains_key(&session_id) {
            return Err(RoomError::AlreadyJoined(session_id));
        }
        if self.clients.len() >= self.config.max_clients {
            return Err(RoomError::Full);
        }

        let position = spawn_player(&mut self.state, session_id.clone(), &self.config);
        self.flush_patch();

        let info = JoinedInfo {
            room_id: self.id.clone(),
            session_id: session_id.clone(),
            metadata: self.metadata.clone(),
        };
        let zone = self.last_snapshot.zone();
        let ammo = self.state.players.get(&session_id).map_or(0, |p| p.ammo);

        send_to(&sender, ServerMessage::Joined(info.clone()));
        let needs_resync = !send_to(&sender, ServerMessage::State(self.last_snapshot.clone()));
        send_to(&sender, ServerMessage::ZoneShrink(zone));
        send_to(&sender, ServerMessage::AmmoUpdate { player_id: session_id.clone(), ammo });

        self.clients.insert(session_id.clone(), Client { sender, needs_resync });
        self.ever_joined = true;
        info!(
            "Session {} joined room {} at ({:.0}, {:.0}), {} clients",
            session_id,
            self.id,
            position.x,
            position.y,
            self.clients.len()
        );
        Ok(info)
    }

    /// Remove a connection and its player, then re-check the win condition.
    pub fn leave(&mut self, session_id: &str) -> bool {
        let had_client = self.clients.remove(session_id).is_some();
        let had_player = self.state.remove_player(session_id).is_some();
        if !had_client && !had_player {
            return false;
        }
        info!("Session {} left room {}, {} clients", session_id, self.id, self.clients.len());

        if check_end_conditions(&mut self.state).is_some() {
            self.begin_ending();
        }
        let events = self.state.take_events();
        self.broadcast_events(&events);
        true
    }

    /// Apply one player action at room time `now_ms`.
    pub fn handle_action(&mut self, session_id: &str, action: PlayerAction, now_ms: u64) -> bool {
        if !matches!(self.phase, RoomPhase::Active | RoomPhase::Ending) {
            return false;
        }
        if !self.clients.contains_key(session_id) {
            debug!("Action from {} not in room {}", session_id, self.id);
            return false;
        }

        let applied = apply_action(&mut self.state, session_id, action, &self.config, now_ms);
        if !applied {
            debug!("Rejected action from {}", session_id);
        }
        let events = self.state.take_events();
        self.broadcast_events(&events);
        applied
    }

    /// Run one simulation tick and replicate the result.
    pub fn tick(&mut self, now_ms: u64) -> Option<SessionId> {
        if !matches!(self.phase, RoomPhase::Active | RoomPhase::Ending) {
            return None;
        }

        let result = tick(&mut self.state, &self.config, now_ms);

        #[cfg(feature = "debug-tracing")]
        tracing::trace!(
            "Room {} tick {}: {} players, {} bullets, {} weapons",
            self.id,
            self.state.tick,
            self.state.players.len(),
            self.state.bullets.len(),
            self.state.weapons.len()
        );

        self.broadcast_events(&result.events);
        self.flush_patch();

        if result.winner.is_some() {
            self.begin_ending();
        }
        result.winner
    }

    /// Advance the zone countdown by one second.
    pub fn shrink_step(&mut self) {
        if !matches!(self.phase, RoomPhase::Active | RoomPhase::Ending) {
            return;
        }
        let events = shrink(&mut self.state, &self.config);
        self.broadcast_events(&events);
        self.flush_patch();
    }

    /// Tell every client to refresh.
    pub fn force_refresh(&self) {
        info!("Room {} forcing refresh", self.id);
        self.broadcast(ServerMessage::ForceRefresh);
    }

    /// Close every connection, waiting up to [`CLOSE_TIMEOUT`] for space
    /// in each outbound queue.
    pub async fn disconnect_all(&mut self) {
        let clients = std::mem::take(&mut self.clients);
        let closes = clients.into_iter().map(|(session_id, client)| async move {
            match timeout(CLOSE_TIMEOUT, client.sender.send(Outbound::Close)).await {
                Ok(Ok(())) => {}
                Ok(Err(_)) => debug!("Connection {} already gone", session_id),
                Err(_) => warn!("Close for {} timed out", session_id),
            }
        });
        join_all(closes).await;
    }

    /// Stop the room and drop pending continuations.
    pub fn dispose(&mut self) {
        self.phase = RoomPhase::Disposed;
        self.state.deferred.clear();
        self.clients.clear();
        info!("Room {} disposed", self.id);
    }

    /// Send to every connection without waiting. Lost events are not
    /// retried.
    pub fn broadcast(&self, message: ServerMessage) {
        for (session_id, client) in &self.clients {
            if let Err(e) = client.sender.try_send(Outbound::Message(message.clone())) {
                warn!("Dropped message for {}: {}", session_id, e);
            }
        }
    }

    fn begin_ending(&mut self) {
        if self.phase == RoomPhase::Active {
            self.phase = RoomPhase::Ending;
            info!("Room {} ending", self.id);
        }
    }

    fn broadcast_events(&self, events: &[GameEvent]) {
        for event in events {
            self.broadcast(event_to_message(event));
        }
    }

    /// Broadcast what changed since the last capture.
    ///
    /// Patches only make sense on top of every earlier one, so a client
    /// whose queue was full gets the whole capture on its next flush.
    fn flush_patch(&mut self) {
        let snapshot = FullState::capture(&self.state);
        let patch =
            StatePatch::between(&self.last_snapshot, &snapshot).map(ServerMessage::StatePatch);

        for (session_id, client) in &mut self.clients {
            let message = match (&patch, client.needs_resync) {
                (_, true) => ServerMessage::State(snapshot.clone()),
                (Some(patch), false) => patch.clone(),
                (None, false) => continue,
            };
            match client.sender.try_send(Outbound::Message(message)) {
                Ok(()) => {
                    if client.needs_resync {
                        debug!("Resynced {} in room {}", session_id, self.id);
                        client.needs_resync = false;
                    }
                }
                Err(e) => {
                    if !client.needs_resync {
                        warn!("Dropped patch for {}: {}", session_id, e);
                        client.needs_resync = true;
                    }
                }
            }
        }
        self.last_snapshot = snapshot;
    }

    fn handle_command(&mut self, command: RoomCommand, now_ms: u64) {
        match command {
            RoomCommand::Join { session_id, sender, reply } => {
                let result = self.join(session_id, sender);
                if let Err(e) = &result {
                    debug!("Join to room {} refused: {}", self.id, e);
                }
                let _ = reply.send(result);
            }
            RoomCommand::Leave { session_id } => {
                self.leave(&session_id);
            }
            RoomCommand::Action { session_id, action } => {
                self.handle_action(&session_id, action, now_ms);
            }
        }
    }
}

fn send_to(sender: &mpsc::Sender<Outbound>, message: ServerMessage) -> bool {
    match sender.try_send(Outbound::Message(message)) {
        Ok(()) => true,
        Err(e) => {
            warn!("Dropped direct message: {}", e);
            false
        }
    }
}

// =============================================================================
// ACTOR
// =============================================================================

/// Commands a connection sends to its room.
#[derive(Debug)]
pub enum RoomCommand {
    /// Join with an outbound queue.
    Join {
        session_id: SessionId,
        sender: mpsc::Sender<Outbound>,
        reply: oneshot::Sender<Result<JoinedInfo, RoomError>>,
    },
    /// Leave (explicitly or on disconnect).
    Leave { session_id: SessionId },
    /// In-room action.
    Action { session_id: SessionId, action: PlayerAction },
}

/// Cloneable handle to a running room.
#[derive(Clone, Debug)]
pub struct RoomHandle {
    /// Room id.
    pub id: String,
    /// Room metadata.
    pub metadata: RoomMetadata,
    /// Capacity.
    pub max_clients: usize,
    commands: mpsc::Sender<RoomCommand>,
    status: watch::Receiver<RoomStatus>,
}

impl RoomHandle {
    /// Latest published status.
    pub fn status(&self) -> RoomStatus {
        *self.status.borrow()
    }

    /// Active and below capacity.
    pub fn is_joinable(&self) -> bool {
        let status = self.status();
        status.phase == RoomPhase::Active && status.clients < self.max_clients
    }

    /// Listing entry built from the published status.
    pub fn listing(&self) -> RoomListing {
        RoomListing {
            room_id: self.id.clone(),
            name: self.metadata.name.clone(),
            clients: self.status().clients,
            max_clients: self.max_clients,
            metadata: self.metadata.clone(),
        }
    }

    /// Join the room.
    pub async fn join(
        &self,
        session_id: SessionId,
        sender: mpsc::Sender<Outbound>,
    ) -> Result<JoinedInfo, RoomError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(RoomCommand::Join { session_id, sender, reply })
            .await
            .map_err(|_| RoomError::Closed)?;
        response.await.map_err(|_| RoomError::Closed)?
    }

    /// Leave the room. Ignored if the room is gone.
    pub async fn leave(&self, session_id: SessionId) {
        let _ = self.commands.send(RoomCommand::Leave { session_id }).await;
    }

    /// Forward an action. Ignored if the room is gone.
    pub async fn action(&self, session_id: SessionId, action: PlayerAction) {
        let _ = self.commands.send(RoomCommand::Action { session_id, action }).await;
    }

    /// Wait until the room reaches `phase`.
    pub async fn wait_for(&mut self, phase: RoomPhase) {
        while self.status.borrow().phase != phase {
            if self.status.changed().await.is_err() {
                return;
            }
        }
    }
}

/// Start the room's task and return a handle to it.
pub fn spawn_room(room: Room) -> RoomHandle {
    let (commands, command_rx) = mpsc::channel(COMMAND_BUFFER);
    let (status_tx, status) = watch::channel(room.status());

    let handle = RoomHandle {
        id: room.id.clone(),
        metadata: room.metadata.clone(),
        max_clients: room.config.max_clients,
        commands,
        status,
    };

    tokio::spawn(run_room(room, command_rx, status_tx));
    handle
}

/// Milliseconds since `start`.
fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

/// Resolves at `deadline`, or never when there is none.
async fn until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => sleep_until(at).await,
        None => std::future::pending().await,
    }
}

/// Room loop: ticks, zone steps, commands and teardown on one task.
async fn run_room(
    mut room: Room,
    mut commands: mpsc::Receiver<RoomCommand>,
    status: watch::Sender<RoomStatus>,
) {
    let start = Instant::now();
    let config = room.config.clone();

    let mut tick_interval = interval(config.tick_interval());
    tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let second = Duration::from_secs(1);
    let mut shrink_interval = interval_at(start + second, second);
    shrink_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut refresh_at: Option<Instant> = None;
    let mut close_at: Option<Instant> = None;

    room.activate();
    status.send_replace(room.status());

    loop {
        tokio::select! {
            _ = tick_interval.tick() => {
                room.tick(elapsed_ms(start));
            }
            _ = shrink_interval.tick() => {
                room.shrink_step();
            }
            command = commands.recv() => {
                match command {
                    Some(command) => room.handle_command(command, elapsed_ms(start)),
                    None => break,
                }
            }
            _ = until(refresh_at) => {
                room.force_refresh();
                refresh_at = None;
                close_at = Some(Instant::now() + config.disconnect_delay);
            }
            _ = until(close_at) => {
                room.disconnect_all().await;
                break;
            }
        }

        if room.phase() == RoomPhase::Ending && refresh_at.is_none() && close_at.is_none() {
            refresh_at = Some(Instant::now() + config.game_over_grace);
        }
        if room.is_abandoned() {
            info!("Room {} empty", room.id);
            break;
        }
        status.send_if_modified(|current| {
            let next = room.status();
            let changed = *current != next;
            *current = next;
            changed
        });
    }

    room.dispose();
    status.send_replace(room.status());
}
