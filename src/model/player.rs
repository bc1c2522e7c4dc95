use serde::{Deserialize, Serialize};

use crate::protocol::ClientId;

pub const MAX_POWER_UPS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PowerUp {
    /// Doubles points earned on the next correct answer.
    DoublePoints,
    /// Skips the wrong-answer cooldown for the next miss.
    Shield,
    /// On fully-found in first place, steals points from the leader.
    Steal,
}

/// A single timeline card held by a player (or a team) in timeline mode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelineCard {
    pub track_id: String,
    pub title: String,
    pub artist: String,
    pub release_year: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Player {
    /// Current session id; changes across reconnects.
    pub id: ClientId,
    pub user_id: Option<String>,
    pub name: String,
    pub avatar: Option<String>,
    pub ready: bool,
    pub active: bool,
    pub score: i64,
    pub streak: u32,
    pub found_artist: bool,
    pub found_title: bool,
    pub cooldown_until: Option<i64>,
    pub voted_pause: bool,
    pub timeline_cards: Vec<TimelineCard>,
    pub has_buzzed: bool,
    pub eliminated: bool,
    pub lives: u32,
    pub is_spectator: bool,
    pub team_id: Option<String>,
    pub power_ups: Vec<PowerUp>,
    pub active_power_up: Option<PowerUp>,
}

impl Player {
    pub fn new(id: ClientId, name: String, avatar: Option<String>, is_spectator: bool) -> Self {
        Player {
            id,
            user_id: None,
            name,
            avatar,
            ready: false,
            active: true,
            score: 0,
            streak: 0,
            found_artist: false,
            found_title: false,
            cooldown_until: None,
            voted_pause: false,
            timeline_cards: Vec::new(),
            has_buzzed: false,
            eliminated: false,
            lives: 0,
            is_spectator,
            team_id: None,
            power_ups: Vec::new(),
            active_power_up: None,
        }
    }

    pub fn fully_found(&self) -> bool {
        self.found_artist && self.found_title
    }

    /// True for players who can participate in the current round: connected,
    /// not eliminated, not a spectator.
    pub fn is_active_participant(&self) -> bool {
        self.active && !self.eliminated && !self.is_spectator
    }

    pub fn in_cooldown(&self, now_ms: i64) -> bool {
        self.cooldown_until.is_some_and(|until| now_ms < until)
    }

    /// Reset per-round flags. Called at the start of every round.
    pub fn reset_round_state(&mut self) {
        self.found_artist = false;
        self.found_title = false;
        self.cooldown_until = None;
        self.voted_pause = false;
        self.has_buzzed = false;
    }

    /// Reset per-game state. Called on `return_to_lobby`.
    pub fn reset_game_state(&mut self, settings_elimination_lives: u32) {
        self.score = 0;
        self.streak = 0;
        self.eliminated = false;
        self.lives = settings_elimination_lives;
        self.timeline_cards.clear();
        self.ready = false;
        self.reset_round_state();
    }

    pub fn add_power_up(&mut self, power_up: PowerUp) {
        if self.power_ups.len() < MAX_POWER_UPS {
            self.power_ups.push(power_up);
        }
    }

    pub fn consume_power_up(&mut self, power_up: PowerUp) -> bool {
        if let Some(idx) = self.power_ups.iter().position(|p| *p == power_up) {
            self.power_ups.remove(idx);
            self.active_power_up = Some(power_up);
            true
        } else {
            false
        }
    }
}

/// Insert `card` into `cards`, kept non-decreasing by `release_year`.
pub fn insert_sorted_card(cards: &mut Vec<TimelineCard>, card: TimelineCard) {
    let pos = cards
        .iter()
        .position(|c| c.release_year > card.release_year)
        .unwrap_or(cards.len());
    cards.insert(pos, card);
}
