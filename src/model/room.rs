use serde::Serialize;

use super::player::Player;
use super::settings::Settings;
use super::team::Team;
use crate::protocol::ClientId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    Waiting,
    Countdown,
    Playing,
    Reveal,
    Finished,
}

/// Per-room lobby/game state that is *not* the current round. The round
/// itself lives alongside this in the room actor (`crate::room::RoomState`)
/// since it comes and goes across the game while this persists.
#[derive(Debug, Clone)]
pub struct Room {
    pub code: String,
    pub host_client_id: ClientId,
    pub phase: Phase,
    pub players: Vec<Player>,
    pub settings: Settings,
    pub current_round: u32,
    pub total_rounds: u32,
    pub paused: bool,
    pub teams: Option<Vec<Team>>,
    pub current_team_turn_id: Option<String>,
}

impl Room {
    pub fn new(code: String, host: Player, settings: Settings) -> Self {
        let total_rounds = settings.effective_total_rounds();
        Room {
            code,
            host_client_id: host.id,
            phase: Phase::Waiting,
            players: vec![host],
            settings,
            current_round: 0,
            total_rounds,
            paused: false,
            teams: None,
            current_team_turn_id: None,
        }
    }

    pub fn player(&self, id: ClientId) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }

    pub fn player_mut(&mut self, id: ClientId) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.id == id)
    }

    pub fn is_host(&self, id: ClientId) -> bool {
        self.host_client_id == id
    }

    pub fn active_participants(&self) -> impl Iterator<Item = &Player> {
        self.players.iter().filter(|p| p.is_active_participant())
    }

    /// Re-elect a host from the first remaining player, in room insertion
    /// order, if the current host is no longer present.
    pub fn reelect_host_if_needed(&mut self) -> Option<ClientId> {
        if self.players.iter().any(|p| p.id == self.host_client_id) {
            return None;
        }
        let new_host = self.players.first()?.id;
        self.host_client_id = new_host;
        Some(new_host)
    }

    pub fn destroy_if_empty(&self) -> bool {
        self.players.iter().all(|p| !p.active)
    }

    /// Reset all per-game state for `return_to_lobby`.
    pub fn reset_for_new_game(&mut self) {
        self.phase = Phase::Waiting;
        self.current_round = 0;
        self.paused = false;
        self.total_rounds = self.settings.effective_total_rounds();
        let lives = self.settings.elimination_lives;
        for p in &mut self.players {
            p.reset_game_state(lives);
        }
        if let Some(teams) = &mut self.teams {
            for t in teams {
                t.score = 0;
                t.timeline_cards.clear();
            }
        }
    }

    pub fn pause_votes(&self) -> usize {
        self.players
            .iter()
            .filter(|p| p.is_active_participant() && p.voted_pause)
            .count()
    }

    pub fn active_participant_count(&self) -> usize {
        self.players.iter().filter(|p| p.is_active_participant()).count()
    }
}
