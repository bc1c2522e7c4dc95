use std::collections::HashSet;

use serde::Serialize;

use crate::protocol::ClientId;
use crate::track_source::Track;

/// Tier durations (cumulative listen lengths from round start) for intro mode.
pub const INTRO_TIER_DURATIONS_MS: [i64; 6] = [2000, 4000, 6000, 10000, 20000, 30000];
pub const INTRO_GUESS_WINDOW_MS: i64 = 15_000;
pub const INTRO_TIER_MULTIPLIERS: [f64; 6] = [5.0, 3.0, 2.0, 1.5, 1.0, 0.5];

#[derive(Debug, Clone, Serialize)]
pub struct Attempt {
    pub player_id: ClientId,
    pub answer: String,
    pub correct: bool,
    pub elapsed_ms: i64,
    pub at_ms: i64,
}

/// Fields shared by every game mode's round state. Kept separate from the
/// mode-specific variants below so the compiler — not a convention — stops
/// `tier` from ever being read in a blind-test round.
#[derive(Debug, Clone)]
pub struct RoundCore {
    pub track: Track,
    pub start_ms: i64,
    pub end_ms: i64,
    /// Insertion order doubles as each player's 1-based finish position.
    pub players_who_found: Vec<ClientId>,
    pub player_round_points: std::collections::HashMap<ClientId, i64>,
    pub attempts: Vec<Attempt>,
}

impl RoundCore {
    pub fn new(track: Track, start_ms: i64, end_ms: i64) -> Self {
        RoundCore {
            track,
            start_ms,
            end_ms,
            players_who_found: Vec::new(),
            player_round_points: std::collections::HashMap::new(),
            attempts: Vec::new(),
        }
    }

    /// 1-based position if and when this player becomes fully found.
    pub fn position_of(&self, player: ClientId) -> Option<u32> {
        self.players_who_found
            .iter()
            .position(|&id| id == player)
            .map(|idx| idx as u32 + 1)
    }
}

#[derive(Debug, Clone, Default)]
pub struct BuzzerState {
    pub lock_holder: Option<ClientId>,
    pub buzzed: HashSet<ClientId>,
    /// Bumped every time the lock changes hands; guards the release timer
    /// against firing after a new lock (or round end) already moved on.
    pub generation: u64,
}

#[derive(Debug, Clone)]
pub struct IntroState {
    pub tier: usize,
    /// Each tier has a "listening" sub-phase followed by a "guessing"
    /// sub-phase; this flags which one the current tier is in.
    pub guessing_phase: bool,
    /// Monotonically increasing; timers check this to become a no-op after
    /// the tier has already advanced past what scheduled them.
    pub generation: u64,
}

impl Default for IntroState {
    fn default() -> Self {
        IntroState {
            tier: 0,
            guessing_phase: false,
            generation: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LyricsBlank {
    pub position: usize,
    pub answer: String,
}

#[derive(Debug, Clone, Default)]
pub struct LyricsState {
    pub lyrics_text: String,
    pub blanks: Vec<LyricsBlank>,
    pub revealed: bool,
    pub answered: HashSet<ClientId>,
}

#[derive(Debug, Clone, Default)]
pub struct TimelineState {
    /// Player ids (or team ids, serialized the same way) who already
    /// submitted this round — first-answer-only.
    pub answered: HashSet<String>,
}

/// Per-room round state, tagged by game mode. Only one `Round` exists per
/// room at a time; it is discarded at `end_round`.
#[derive(Debug, Clone)]
pub enum Round {
    BlindTest(RoundCore),
    Elimination(RoundCore),
    Buzzer(RoundCore, BuzzerState),
    Intro(RoundCore, IntroState),
    Lyrics(RoundCore, LyricsState),
    Timeline(RoundCore, TimelineState),
}

impl Round {
    pub fn core(&self) -> &RoundCore {
        match self {
            Round::BlindTest(c)
            | Round::Elimination(c)
            | Round::Buzzer(c, _)
            | Round::Intro(c, _)
            | Round::Lyrics(c, _)
            | Round::Timeline(c, _) => c,
        }
    }

    pub fn core_mut(&mut self) -> &mut RoundCore {
        match self {
            Round::BlindTest(c)
            | Round::Elimination(c)
            | Round::Buzzer(c, _)
            | Round::Intro(c, _)
            | Round::Lyrics(c, _)
            | Round::Timeline(c, _) => c,
        }
    }

    pub fn uses_free_text_answers(&self) -> bool {
        !matches!(self, Round::Timeline(..) | Round::Lyrics(..))
    }
}

/// Payload broadcast in `round_start`. Track title/artist are omitted in
/// timeline mode (the guess is the release year, not the identity).
#[derive(Debug, Clone, Serialize)]
pub struct RoundData {
    pub round_number: u32,
    pub total_rounds: u32,
    pub preview_url: Option<String>,
    pub start_timestamp: i64,
    pub duration_ms: i64,
    pub track_title: Option<String>,
    pub track_artist: Option<String>,
}

/// Per-player summary reported in `round_end`.
#[derive(Debug, Clone, Serialize)]
pub struct PlayerRoundSummary {
    pub player_id: ClientId,
    pub was_correct: bool,
    pub answered_in_ms: Option<i64>,
    pub points_earned: i64,
    pub total_score: i64,
    pub streak: u32,
    pub attempts_count: u32,
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextualReaction {
    Insane,
    Silence,
    Sweep,
}
