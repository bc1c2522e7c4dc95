//! Connection Hub: per-client session state, routing, and the fan-out from
//! room broadcasts to individual WebSocket writer tasks. See §4.6.

use std::sync::Arc;
use std::time::Duration;

use dashmap::{DashMap, DashSet};
use tokio::sync::mpsc;
use tracing::warn;

use crate::model::{Player, Settings};
use crate::protocol::{self, ClientEvent, ClientId, RoomStateView, ServerEvent};
use crate::rate_limit::RateLimiter;
use crate::registry::RoomRegistry;
use crate::room::{RoomActor, RoomCommand, RoomHandle, RoomOutbound};
use crate::stats_sink::StatsSink;
use crate::track_source::TrackSource;

pub const TIME_SYNC_INTERVAL_MS: u64 = 5_000;
const SESSION_MAILBOX_CAPACITY: usize = 128;

/// Everything the hub needs to run one room: its message stream back to
/// clients, the registry of live rooms, and the collaborators every new
/// room is spawned with.
pub struct ConnectionHub {
    registry: Arc<RoomRegistry>,
    rate_limiter: Arc<RateLimiter>,
    track_source: Arc<dyn TrackSource>,
    stats_sink: Arc<dyn StatsSink>,
    senders: DashMap<ClientId, mpsc::Sender<ServerEvent>>,
    session_room: DashMap<ClientId, String>,
    session_auth: DashMap<ClientId, String>,
    room_members: DashMap<String, DashSet<ClientId>>,
    room_round: DashMap<String, u32>,
}

impl ConnectionHub {
    pub fn new(
        registry: Arc<RoomRegistry>,
        rate_limiter: Arc<RateLimiter>,
        track_source: Arc<dyn TrackSource>,
        stats_sink: Arc<dyn StatsSink>,
    ) -> Self {
        ConnectionHub {
            registry,
            rate_limiter,
            track_source,
            stats_sink,
            senders: DashMap::new(),
            session_room: DashMap::new(),
            session_auth: DashMap::new(),
            room_members: DashMap::new(),
            room_round: DashMap::new(),
        }
    }

    /// Registers a new connection and returns its session id plus the
    /// receiver half the websocket writer task should drain.
    pub fn connect(&self, auth_user_id: Option<String>) -> (ClientId, mpsc::Receiver<ServerEvent>) {
        let client_id = ClientId::new();
        let (tx, rx) = mpsc::channel(SESSION_MAILBOX_CAPACITY);
        self.senders.insert(client_id, tx);
        if let Some(user_id) = auth_user_id {
            self.session_auth.insert(client_id, user_id);
        }
        (client_id, rx)
    }

    /// Called when the websocket for `client_id` closes. The room keeps the
    /// seat warm for `RECONNECTION_WINDOW_MS`; the hub just stops trying to
    /// write to the dead socket.
    pub fn disconnect(&self, client_id: ClientId) {
        self.senders.remove(&client_id);
        self.session_auth.remove(&client_id);
        if let Some((_, room_code)) = self.session_room.remove(&client_id) {
            if let Some(handle) = self.registry.get(&room_code) {
                handle.send(RoomCommand::ClientDisconnected { client_id });
            }
        }
    }

    pub fn handle_message(self: &Arc<Self>, client_id: ClientId, event: ClientEvent) {
        if let ClientEvent::CreateRoom { pseudo, avatar_url, settings } = event {
            self.create_room(client_id, pseudo, avatar_url, settings);
            return;
        }

        if let Some(blocked) = self.check_rate_limit(client_id, &event) {
            self.reject(client_id, blocked);
            return;
        }

        let room_code = match &event {
            ClientEvent::JoinRoom { room_code, .. } => Some(room_code.clone()),
            _ => self.session_room.get(&client_id).map(|r| r.clone()),
        };
        let Some(room_code) = room_code else {
            self.reject(client_id, crate::error::GameError::PlayerNotInRoom);
            return;
        };
        let Some(handle) = self.registry.get(&room_code) else {
            self.reject(client_id, crate::error::GameError::RoomNotFound);
            return;
        };
        let is_join = matches!(event, ClientEvent::JoinRoom { .. });
        handle.send(RoomCommand::Client { client_id, event });
        if is_join {
            if let Some(user_id) = self.session_auth.get(&client_id).map(|r| r.clone()) {
                handle.send(RoomCommand::SetPlayerUserId { client_id, user_id });
            }
        }
    }

    fn create_room(self: &Arc<Self>, client_id: ClientId, pseudo: String, avatar_url: Option<String>, settings_patch: Option<crate::model::SettingsPatch>) {
        if !protocol::is_valid_pseudo(&pseudo) {
            self.reject(client_id, crate::error::GameError::InvalidPseudo);
            return;
        }
        let avatar = protocol::sanitize_avatar(avatar_url);
        let mut settings = Settings::default();
        if let Some(patch) = settings_patch {
            settings.apply_patch(patch);
        }
        let host = Player::new(client_id, pseudo, avatar, false);
        let code = self.registry.generate_code();
        let actor = RoomActor::new(code.clone(), host, settings);

        let view = RoomStateView {
            room_code: actor.room.code.clone(),
            host_client_id: actor.room.host_client_id,
            phase: actor.room.phase,
            players: actor.room.players.clone(),
            settings: actor.room.settings.clone(),
            current_round: actor.room.current_round,
            total_rounds: actor.room.total_rounds,
            paused: actor.room.paused,
            game_mode: actor.room.settings.game_mode,
        };

        let outbound: Arc<dyn RoomOutbound> = self.clone();
        let handle = crate::room::spawn_room(
            actor,
            outbound,
            self.track_source.clone(),
            self.stats_sink.clone(),
            self.rate_limiter.clone(),
        );
        if let Some(user_id) = self.session_auth.get(&client_id).map(|r| r.clone()) {
            handle.send(RoomCommand::SetPlayerUserId { client_id, user_id });
        }
        self.registry.insert(code.clone(), handle);
        self.session_room.insert(client_id, code.clone());
        self.room_members.entry(code.clone()).or_default().insert(client_id);

        if let Some(sender) = self.senders.get(&client_id) {
            let _ = sender.try_send(ServerEvent::RoomCreated {
                room_code: code,
                room_state: view,
            });
        }
    }

    fn check_rate_limit(&self, client_id: ClientId, event: &ClientEvent) -> Option<crate::error::GameError> {
        match event {
            ClientEvent::SendMessage { .. } if self.rate_limiter.check_chat(client_id) => {
                Some(crate::error::GameError::RateLimited)
            }
            ClientEvent::SendEmote { .. } if self.rate_limiter.check_emote(client_id) => {
                Some(crate::error::GameError::RateLimited)
            }
            ClientEvent::SubmitAnswer { .. } | ClientEvent::SubmitLyrics { .. } => {
                let room_code = self.session_room.get(&client_id)?;
                let round = self.room_round.get(room_code.as_str()).map(|r| *r).unwrap_or(0);
                if self.rate_limiter.answer_attempts_exceeded(client_id, &room_code, round) {
                    Some(crate::error::GameError::RateLimited)
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    fn reject(&self, client_id: ClientId, error: crate::error::GameError) {
        if let Some(sender) = self.senders.get(&client_id) {
            let _ = sender.try_send(error.into());
        }
    }

    /// Runs forever, pushing `time_sync` to every connected client and
    /// sweeping the rate limiter. Spawned once at startup.
    pub async fn run_background_ticks(self: Arc<Self>) {
        let mut tick = tokio::time::interval(Duration::from_millis(TIME_SYNC_INTERVAL_MS));
        let mut sweep_tick = tokio::time::interval(Duration::from_secs(60));
        loop {
            tokio::select! {
                _ = tick.tick() => {
                    let server_time = crate::clock::now_ms();
                    for entry in self.senders.iter() {
                        let _ = entry.value().try_send(ServerEvent::TimeSync { server_time });
                    }
                }
                _ = sweep_tick.tick() => {
                    self.rate_limiter.sweep();
                }
            }
        }
    }
}

#[async_trait::async_trait]
impl RoomOutbound for ConnectionHub {
    async fn send_to_client(&self, room_code: &str, client_id: ClientId, event: ServerEvent) {
        self.observe(room_code, Some(client_id), &event);
        if let Some(sender) = self.senders.get(&client_id) {
            if sender.try_send(event).is_err() {
                warn!(%client_id, room_code, "client channel full or closed, dropping message");
            }
        }
    }

    async fn broadcast(&self, room_code: &str, event: ServerEvent) {
        self.observe(room_code, None, &event);
        let Some(members) = self.room_members.get(room_code) else {
            return;
        };
        for member in members.iter() {
            let client_id: ClientId = *member;
            if let Some(sender) = self.senders.get(&client_id) {
                let _ = sender.try_send(event.clone());
            }
        }
    }

    async fn broadcast_except(&self, room_code: &str, except: ClientId, event: ServerEvent) {
        let Some(members) = self.room_members.get(room_code) else {
            return;
        };
        for member in members.iter() {
            let client_id: ClientId = *member;
            if client_id == except {
                continue;
            }
            if let Some(sender) = self.senders.get(&client_id) {
                let _ = sender.try_send(event.clone());
            }
        }
    }

    async fn room_closed(&self, room_code: &str) {
        self.registry.remove(room_code);
        self.room_round.remove(room_code);
        if let Some((_, members)) = self.room_members.remove(room_code) {
            for member in members.iter() {
                let client_id: ClientId = *member;
                self.session_room.remove(&client_id);
            }
        }
    }
}

impl ConnectionHub {
    /// Derives hub-side bookkeeping (room membership, current round) from
    /// the outbound event stream instead of duplicating Room Manager state.
    fn observe(&self, room_code: &str, direct_target: Option<ClientId>, event: &ServerEvent) {
        match event {
            ServerEvent::RoomJoined { .. } => {
                if let Some(client_id) = direct_target {
                    self.session_room.insert(client_id, room_code.to_string());
                    self.room_members.entry(room_code.to_string()).or_default().insert(client_id);
                }
            }
            ServerEvent::PlayerLeft { player_id, .. } | ServerEvent::PlayerKicked { player_id } => {
                if let Some(members) = self.room_members.get(room_code) {
                    members.remove(player_id);
                }
                if self.session_room.get(player_id).is_some_and(|r| r.as_str() == room_code) {
                    self.session_room.remove(player_id);
                }
            }
            ServerEvent::RoundStart(data) => {
                self.room_round.insert(room_code.to_string(), data.round_number);
            }
            _ => {}
        }
    }
}
