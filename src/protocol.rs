//! The wire contract: one JSON object per WebSocket text frame, shaped as
//! `{"event": "...", "data": {...}}`. See §6 of the spec.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::fuzzy::MatchType;
use crate::model::round::{PlayerRoundSummary, RoundData};
use crate::model::{GameMode, Player, PowerUp, SettingsPatch};

/// A client's current session id. Changes across reconnects, unlike
/// `userId` which (when authenticated) survives them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(pub Uuid);

impl ClientId {
    pub fn new() -> Self {
        ClientId(Uuid::new_v4())
    }
}

impl Default for ClientId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ClientId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub const MAX_PSEUDO_LEN: usize = 20;
pub const MIN_PSEUDO_LEN: usize = 2;
pub const MAX_MESSAGE_LEN: usize = 200;
pub const MAX_ANSWER_LEN: usize = 100;
pub const MAX_AVATAR_URL_LEN: usize = 500;

const PSEUDO_BLACKLIST: &[char] = &['<', '>', '&', '"', '\''];

pub fn is_valid_pseudo(pseudo: &str) -> bool {
    let len = pseudo.chars().count();
    (MIN_PSEUDO_LEN..=MAX_PSEUDO_LEN).contains(&len)
        && !pseudo.chars().any(|c| PSEUDO_BLACKLIST.contains(&c))
}

pub fn is_valid_avatar_url(url: &str) -> bool {
    url.len() <= MAX_AVATAR_URL_LEN && (url.starts_with("http://") || url.starts_with("https://"))
}

/// Clamp an avatar URL to `None` if it fails validation, rather than
/// rejecting the whole request — a malformed avatar is not fatal.
pub fn sanitize_avatar(avatar: Option<String>) -> Option<String> {
    avatar.filter(|a| is_valid_avatar_url(a))
}

pub fn is_valid_message(message: &str) -> bool {
    !message.is_empty() && message.chars().count() <= MAX_MESSAGE_LEN
}

pub fn is_valid_answer(answer: &str) -> bool {
    answer.chars().count() <= MAX_ANSWER_LEN
}

// ---------------------------------------------------------------------
// C -> S
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientEvent {
    CreateRoom {
        pseudo: String,
        #[serde(default)]
        avatar_url: Option<String>,
        #[serde(default)]
        settings: Option<SettingsPatch>,
    },
    JoinRoom {
        room_code: String,
        pseudo: String,
        #[serde(default)]
        avatar_url: Option<String>,
        #[serde(default)]
        spectator: bool,
    },
    LeaveRoom,
    KickPlayer {
        player_id: ClientId,
    },
    ToggleReady,
    UpdateSettings(SettingsPatch),
    TogglePause,
    StartGame,
    SubmitAnswer {
        answer: String,
        timestamp: i64,
    },
    RequestNextRound,
    ReturnToLobby,
    SendMessage {
        message: String,
    },
    SendEmote {
        emote: String,
    },
    BuzzerPress,
    ActivatePowerup {
        power_up: PowerUp,
    },
    JoinTeam {
        team_id: String,
    },
    SubmitLyrics {
        answers: Vec<String>,
        timestamp: i64,
    },
}

// ---------------------------------------------------------------------
// S -> C
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct RoomStateView {
    pub room_code: String,
    pub host_client_id: ClientId,
    pub phase: crate::model::Phase,
    pub players: Vec<Player>,
    pub settings: crate::model::Settings,
    pub current_round: u32,
    pub total_rounds: u32,
    pub paused: bool,
    pub game_mode: GameMode,
}

#[derive(Debug, Clone, Serialize)]
pub struct Podium {
    pub player_id: ClientId,
    pub pseudo: String,
    pub score: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    RoomCreated {
        room_code: String,
        room_state: RoomStateView,
    },
    RoomJoined {
        room_state: RoomStateView,
    },
    RoomUpdated {
        room_state: RoomStateView,
    },
    PlayerJoined {
        player: Player,
    },
    PlayerLeft {
        player_id: ClientId,
        new_host_id: Option<ClientId>,
    },
    PlayerKicked {
        player_id: ClientId,
    },
    CountdownStart {
        countdown_ms: i64,
    },
    RoundStart(RoundData),
    AnswerResult {
        correct: bool,
        points_earned: i64,
        total_score: i64,
        streak: u32,
        found_part: Option<MatchType>,
        cooldown_until: Option<i64>,
        /// Revealed track, Timeline mode only — the answering player places
        /// a card blind and needs to know what they just placed without
        /// waiting for `round_end`.
        track_title: Option<String>,
        track_artist: Option<String>,
    },
    PlayerFound {
        player_id: ClientId,
        pseudo: String,
        position: u32,
        time_taken_ms: i64,
    },
    RoundEnd {
        results: Vec<PlayerRoundSummary>,
        reaction: Option<crate::model::round::ContextualReaction>,
        track_title: String,
        track_artist: String,
    },
    GameOver {
        final_scores: Vec<Podium>,
        podium: Vec<Podium>,
    },
    TimeSync {
        server_time: i64,
    },
    NewMessage {
        player_id: ClientId,
        pseudo: String,
        message: String,
        timestamp: i64,
    },
    EmoteReceived {
        player_id: ClientId,
        emote: String,
    },
    TimelineCardAdded {
        owner_id: String,
        track_id: String,
        title: String,
        artist: String,
        release_year: i32,
    },
    TimelineWinner {
        winner_id: String,
    },
    BuzzerLocked {
        player_id: ClientId,
        pseudo: String,
        buzzer_time_ms: i64,
    },
    BuzzerReleased,
    BuzzerTimeout,
    PlayerEliminated {
        player_id: ClientId,
        pseudo: String,
    },
    IntroTierUnlock {
        tier: usize,
        duration_ms: i64,
        phase: &'static str,
    },
    LyricsData {
        lyrics_text: String,
        blanks: Vec<crate::model::round::LyricsBlank>,
    },
    LyricsResult {
        player_id: ClientId,
        correct_count: usize,
        total: usize,
        points_earned: i64,
    },
    PowerupActivated {
        player_id: ClientId,
        power_up: PowerUp,
    },
    PowerupEarned {
        player_id: ClientId,
        power_up: PowerUp,
    },
    HintReceived {
        hint: String,
    },
    ContextualReaction {
        #[serde(rename = "type")]
        kind: crate::model::round::ContextualReaction,
    },
    Error {
        code: &'static str,
        message: String,
    },
}

impl From<crate::error::GameError> for ServerEvent {
    fn from(err: crate::error::GameError) -> Self {
        let payload = err.to_payload();
        ServerEvent::Error {
            code: payload.code,
            message: payload.message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn pseudo_validation_enforces_length_and_charset() {
        assert!(is_valid_pseudo("ab"));
        assert!(is_valid_pseudo(&"a".repeat(20)));
        assert!(!is_valid_pseudo("a"));
        assert!(!is_valid_pseudo(&"a".repeat(21)));
        assert!(!is_valid_pseudo("a<script>"));
    }

    #[test]
    fn avatar_url_must_be_http_and_bounded() {
        assert!(is_valid_avatar_url("https://example.com/a.png"));
        assert!(!is_valid_avatar_url("ftp://example.com/a.png"));
        assert!(!is_valid_avatar_url(&format!(
            "https://example.com/{}",
            "a".repeat(500)
        )));
    }

    #[test]
    fn client_event_deserializes_tagged_envelope() {
        let json = r#"{"event":"submit_answer","data":{"answer":"abba","timestamp":123}}"#;
        let parsed: ClientEvent = serde_json::from_str(json).unwrap();
        match parsed {
            ClientEvent::SubmitAnswer { answer, timestamp } => {
                assert_eq!(answer, "abba");
                assert_eq!(timestamp, 123);
            }
            other => panic!("unexpected variant: {other:?}"),
        }
    }
}
