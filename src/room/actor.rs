use std::collections::HashMap;

use crate::clock::now_ms;
use crate::error::GameError;
use crate::model::round::{ContextualReaction, RoundData};
use crate::model::{Phase, Player, Round, Room, Settings};
use crate::protocol::{ClientEvent, ClientId, Podium, RoomStateView, ServerEvent};
use crate::track_source::Track;

use super::timer::TimerHandle;
use super::{Outbound, RoundTimerKind};

pub const COUNTDOWN_MS: i64 = 3_000;
pub const RECONNECTION_WINDOW_MS: u64 = 60_000;

/// Owns one room's authoritative state. Every method here is pure over
/// `&mut self` plus its arguments, returning the `Outbound` effects the
/// caller (the actor run loop in `super::run`) should perform. Keeping I/O
/// out of this type is what makes it unit-testable without a tokio runtime.
pub struct RoomActor {
    pub room: Room,
    pub round: Option<Round>,
    pub round_generation: u64,
    pub round_timer: TimerHandle,
    pub mode_timer: TimerHandle,
    pub reconnect_timers: HashMap<ClientId, TimerHandle>,
    /// Set while `room.paused` is true: milliseconds remaining in the round
    /// at the moment it was paused, used to rebase `start_ms`/`end_ms` on
    /// resume (see §4.5 Pause).
    pub paused_remaining_ms: Option<i64>,
}

impl RoomActor {
    pub fn new(code: String, host: Player, settings: Settings) -> Self {
        RoomActor {
            room: Room::new(code, host, settings),
            round: None,
            round_generation: 0,
            round_timer: TimerHandle::none(),
            mode_timer: TimerHandle::none(),
            reconnect_timers: HashMap::new(),
            paused_remaining_ms: None,
        }
    }

    /// Stamps the authenticated account id onto a player, if they're still
    /// in the room. Lets end-of-game stats recording find this player.
    pub(super) fn set_player_user_id(&mut self, client_id: ClientId, user_id: String) {
        if let Some(player) = self.room.player_mut(client_id) {
            player.user_id = Some(user_id);
        }
    }

    pub fn handle_client_event(&mut self, client_id: ClientId, event: ClientEvent) -> Vec<Outbound> {
        match event {
            ClientEvent::CreateRoom { .. } => {
                vec![self.reject(client_id, GameError::GameAlreadyStarted)]
            }
            ClientEvent::JoinRoom {
                pseudo,
                avatar_url,
                spectator,
                ..
            } => self.join_room(client_id, pseudo, avatar_url, spectator),
            ClientEvent::LeaveRoom => self.leave_room(client_id),
            ClientEvent::KickPlayer { player_id } => self.kick_player(client_id, player_id),
            ClientEvent::ToggleReady => self.toggle_ready(client_id),
            ClientEvent::UpdateSettings(patch) => self.update_settings(client_id, patch),
            ClientEvent::TogglePause => self.toggle_pause(client_id),
            ClientEvent::StartGame => self.start_game(client_id),
            ClientEvent::SubmitAnswer { answer, timestamp } => {
                self.submit_answer(client_id, answer, timestamp)
            }
            ClientEvent::RequestNextRound => self.request_next_round(client_id),
            ClientEvent::ReturnToLobby => self.return_to_lobby(client_id),
            ClientEvent::SendMessage { message } => self.send_message(client_id, message),
            ClientEvent::SendEmote { emote } => self.send_emote(client_id, emote),
            ClientEvent::BuzzerPress => self.buzzer_press(client_id),
            ClientEvent::ActivatePowerup { power_up } => self.activate_powerup(client_id, power_up),
            ClientEvent::JoinTeam { team_id } => self.join_team(client_id, team_id),
            ClientEvent::SubmitLyrics { answers, timestamp } => {
                self.submit_lyrics(client_id, answers, timestamp)
            }
        }
    }

    pub fn handle_disconnect(&mut self, client_id: ClientId) -> Vec<Outbound> {
        let Some(player) = self.room.player_mut(client_id) else {
            return vec![];
        };
        player.active = false;
        let mut out = vec![Outbound::ScheduleReconnectGrace {
            client_id,
            after: std::time::Duration::from_millis(RECONNECTION_WINDOW_MS),
        }];
        out.extend(self.broadcast_room_updated());
        out
    }

    pub fn handle_reconnect_grace_fired(&mut self, client_id: ClientId) -> Vec<Outbound> {
        let still_inactive = self.room.player(client_id).is_some_and(|p| !p.active);
        if !still_inactive {
            return vec![];
        }
        self.remove_player(client_id)
    }

    pub fn handle_track_fetched(&mut self, generation: u64, track: Option<Track>) -> Vec<Outbound> {
        if generation != self.round_generation {
            return vec![];
        }
        let track = track.unwrap_or_else(|| {
            crate::track_source::MockTrackSource::fallback_track(self.room.settings.genre.as_deref())
        });
        self.begin_round_with_track(track)
    }

    pub fn handle_round_timer(&mut self, generation: u64, kind: RoundTimerKind) -> Vec<Outbound> {
        if generation != self.round_generation {
            return vec![];
        }
        match kind {
            RoundTimerKind::RoundEnd => self.end_round(),
            RoundTimerKind::Reveal => self.after_reveal(),
            RoundTimerKind::Countdown => self.after_countdown(),
        }
    }

    pub fn handle_intro_timer(&mut self, generation: u64) -> Vec<Outbound> {
        let Some(Round::Intro(_, intro)) = &self.round else {
            return vec![];
        };
        if generation != intro.generation {
            return vec![];
        }
        self.advance_intro_tier()
    }

    pub fn handle_buzzer_timer(&mut self, generation: u64) -> Vec<Outbound> {
        let Some(Round::Buzzer(_, buzzer)) = &self.round else {
            return vec![];
        };
        if generation != buzzer.generation {
            return vec![];
        }
        self.release_buzzer_lock()
    }

    pub fn handle_mode_timer(&mut self, generation: u64) -> Vec<Outbound> {
        if generation != self.round_generation {
            return vec![];
        }
        self.reveal_lyrics()
    }

    pub(super) fn reject(&self, client_id: ClientId, error: GameError) -> Outbound {
        Outbound::ToClient(client_id, error.into())
    }

    pub(super) fn current_view(&self) -> RoomStateView {
        RoomStateView {
            room_code: self.room.code.clone(),
            host_client_id: self.room.host_client_id,
            phase: self.room.phase,
            players: self.room.players.clone(),
            settings: self.room.settings.clone(),
            current_round: self.room.current_round,
            total_rounds: self.room.total_rounds,
            paused: self.room.paused,
            game_mode: self.room.settings.game_mode,
        }
    }

    pub(super) fn broadcast_room_updated(&self) -> Vec<Outbound> {
        vec![Outbound::Broadcast(ServerEvent::RoomUpdated {
            room_state: self.current_view(),
        })]
    }

    /// Remove a player outright (grace expiry, explicit leave, kick).
    /// Handles host re-election, team cleanup, and room teardown.
    pub(super) fn remove_player(&mut self, client_id: ClientId) -> Vec<Outbound> {
        let was_present = self.room.players.iter().any(|p| p.id == client_id);
        if !was_present {
            return vec![];
        }
        self.room.players.retain(|p| p.id != client_id);
        self.reconnect_timers.remove(&client_id);

        let new_host = self.room.reelect_host_if_needed();

        let mut out = vec![Outbound::Broadcast(ServerEvent::PlayerLeft {
            player_id: client_id,
            new_host_id: new_host,
        })];

        if self.room.destroy_if_empty() {
            self.round_timer.cancel();
            self.mode_timer.cancel();
            out.push(Outbound::RoomClosed);
            return out;
        }

        if self.room.phase == Phase::Playing {
            out.extend(self.maybe_end_round_early());
        }
        out.extend(self.broadcast_room_updated());
        out
    }

    /// Builds the final `RoundData` used in the `round_start` broadcast.
    pub(super) fn round_data(&self) -> Option<RoundData> {
        let round = self.round.as_ref()?;
        let core = round.core();
        let hide_identity = matches!(round, Round::Timeline(..));
        Some(RoundData {
            round_number: self.room.current_round,
            total_rounds: self.room.total_rounds,
            preview_url: core.track.preview_url.clone(),
            start_timestamp: core.start_ms,
            duration_ms: core.end_ms - core.start_ms,
            track_title: if hide_identity { None } else { Some(core.track.title.clone()) },
            track_artist: if hide_identity { None } else { Some(core.track.artist.clone()) },
        })
    }

    pub(super) fn podium(&self) -> Vec<Podium> {
        let mut players: Vec<&Player> = self.room.players.iter().collect();
        players.sort_by(|a, b| self.rank_value(b).cmp(&self.rank_value(a)));
        players
            .into_iter()
            .take(3)
            .map(|p| Podium {
                player_id: p.id,
                pseudo: p.name.clone(),
                score: p.score,
            })
            .collect()
    }

    fn rank_value(&self, player: &Player) -> i64 {
        match self.room.settings.game_mode {
            crate::model::GameMode::Timeline => {
                if let (Some(teams), Some(team_id)) = (&self.room.teams, &player.team_id) {
                    teams
                        .iter()
                        .find(|t| &t.id == team_id)
                        .map(|t| t.timeline_cards.len() as i64)
                        .unwrap_or(0)
                } else {
                    player.timeline_cards.len() as i64
                }
            }
            _ => player.score,
        }
    }

    pub(super) fn now(&self) -> i64 {
        now_ms()
    }
}

pub(super) fn contextual_reaction_for(
    fastest_correct_ms: Option<i64>,
    anyone_found: bool,
    everyone_found: bool,
) -> Option<ContextualReaction> {
    if let Some(ms) = fastest_correct_ms
        && ms < 3_000
    {
        return Some(ContextualReaction::Insane);
    }
    if !anyone_found {
        return Some(ContextualReaction::Silence);
    }
    if everyone_found {
        return Some(ContextualReaction::Sweep);
    }
    None
}
