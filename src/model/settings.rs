use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GameMode {
    BlindTest,
    Timeline,
    Buzzer,
    Elimination,
    Intro,
    Lyrics,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    /// Score multiplier applied in the additive partial-credit rule.
    pub fn multiplier(self) -> f64 {
        match self {
            Difficulty::Easy => 0.75,
            Difficulty::Medium => 1.0,
            Difficulty::Hard => 1.5,
        }
    }
}

/// Per-room settings, clamped to their valid ranges on every update.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub total_rounds: u32,
    pub max_players: u32,
    pub round_duration_ms: i64,
    pub reveal_duration_ms: i64,
    pub wrong_answer_cooldown_ms: i64,
    pub genre: Option<String>,
    pub accept_artist_only: bool,
    pub accept_title_only: bool,
    pub game_mode: GameMode,
    pub timeline_cards_to_win: u32,
    pub buzzer_time_ms: i64,
    pub intro_tier_ms: i64,
    pub elimination_lives: u32,
    pub is_solo_mode: bool,
    pub enable_power_ups: bool,
    pub enable_teams: bool,
    pub progressive_audio: bool,
    pub difficulty: Difficulty,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            total_rounds: 10,
            max_players: 8,
            round_duration_ms: 30_000,
            reveal_duration_ms: 5_000,
            wrong_answer_cooldown_ms: 2_000,
            genre: None,
            accept_artist_only: false,
            accept_title_only: false,
            game_mode: GameMode::BlindTest,
            timeline_cards_to_win: 10,
            buzzer_time_ms: 8_000,
            intro_tier_ms: 2_000,
            elimination_lives: 3,
            is_solo_mode: false,
            enable_power_ups: false,
            enable_teams: false,
            progressive_audio: false,
            difficulty: Difficulty::Medium,
        }
    }
}

fn clamp_i64(value: i64, min: i64, max: i64) -> i64 {
    value.clamp(min, max)
}

fn clamp_u32(value: u32, min: u32, max: u32) -> u32 {
    value.clamp(min, max)
}

impl Settings {
    /// Clamp every numeric field to its valid range. Called after applying a
    /// partial update from `update_settings`.
    pub fn clamp(&mut self) {
        self.total_rounds = clamp_u32(self.total_rounds, 3, 30);
        self.max_players = clamp_u32(self.max_players, 2, 8);
        self.round_duration_ms = clamp_i64(self.round_duration_ms, 5_000, 120_000);
        self.reveal_duration_ms = clamp_i64(self.reveal_duration_ms, 2_000, 30_000);
        self.wrong_answer_cooldown_ms = clamp_i64(self.wrong_answer_cooldown_ms, 500, 10_000);
        self.timeline_cards_to_win = clamp_u32(self.timeline_cards_to_win, 3, 20);
        self.buzzer_time_ms = clamp_i64(self.buzzer_time_ms, 3_000, 15_000);
        self.intro_tier_ms = clamp_i64(self.intro_tier_ms, 1_000, 5_000);
        self.elimination_lives = clamp_u32(self.elimination_lives, 1, 5);
        if let Some(genre) = &self.genre
            && genre.chars().count() > 50
        {
            self.genre = Some(genre.chars().take(50).collect());
        }
    }

    pub fn min_players(&self) -> u32 {
        if self.is_solo_mode { 1 } else { 2 }
    }

    /// `currentRound` runs away to 999 for the open-ended modes.
    pub fn effective_total_rounds(&self) -> u32 {
        match self.game_mode {
            GameMode::Timeline | GameMode::Elimination => 999,
            _ => self.total_rounds,
        }
    }
}

/// Partial update payload for `update_settings`; `None` fields are left
/// untouched on the stored `Settings`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SettingsPatch {
    pub total_rounds: Option<u32>,
    pub max_players: Option<u32>,
    pub round_duration_ms: Option<i64>,
    pub reveal_duration_ms: Option<i64>,
    pub wrong_answer_cooldown_ms: Option<i64>,
    pub genre: Option<Option<String>>,
    pub accept_artist_only: Option<bool>,
    pub accept_title_only: Option<bool>,
    pub game_mode: Option<GameMode>,
    pub timeline_cards_to_win: Option<u32>,
    pub buzzer_time_ms: Option<i64>,
    pub intro_tier_ms: Option<i64>,
    pub elimination_lives: Option<u32>,
    pub is_solo_mode: Option<bool>,
    pub enable_power_ups: Option<bool>,
    pub enable_teams: Option<bool>,
    pub progressive_audio: Option<bool>,
    pub difficulty: Option<Difficulty>,
}

impl Settings {
    pub fn apply_patch(&mut self, patch: SettingsPatch) {
        macro_rules! apply {
            ($field:ident) => {
                if let Some(value) = patch.$field {
                    self.$field = value;
                }
            };
        }
        apply!(total_rounds);
        apply!(max_players);
        apply!(round_duration_ms);
        apply!(reveal_duration_ms);
        apply!(wrong_answer_cooldown_ms);
        apply!(genre);
        apply!(accept_artist_only);
        apply!(accept_title_only);
        apply!(game_mode);
        apply!(timeline_cards_to_win);
        apply!(buzzer_time_ms);
        apply!(intro_tier_ms);
        apply!(elimination_lives);
        apply!(is_solo_mode);
        apply!(enable_power_ups);
        apply!(enable_teams);
        apply!(progressive_audio);
        apply!(difficulty);
        self.clamp();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn clamps_out_of_range_values() {
        let mut s = Settings {
            total_rounds: 1000,
            round_duration_ms: 1,
            ..Settings::default()
        };
        s.clamp();
        assert_eq!(s.total_rounds, 30);
        assert_eq!(s.round_duration_ms, 5_000);
    }

    #[test]
    fn solo_mode_allows_single_player() {
        let mut s = Settings::default();
        assert_eq!(s.min_players(), 2);
        s.is_solo_mode = true;
        assert_eq!(s.min_players(), 1);
    }

    #[test]
    fn timeline_mode_runs_away_to_999_rounds() {
        let mut s = Settings {
            game_mode: GameMode::Timeline,
            ..Settings::default()
        };
        assert_eq!(s.effective_total_rounds(), 999);
        s.game_mode = GameMode::BlindTest;
        assert_eq!(s.effective_total_rounds(), s.total_rounds);
    }
}
