use crate::error::GameError;
use crate::model::{Phase, Round};
use crate::protocol::{ClientId, ServerEvent};
use crate::score;

use super::actor::RoomActor;
use super::Outbound;

const CLOCK_SKEW_TOLERANCE_MS: i64 = 2_000;

impl RoomActor {
    pub(super) fn submit_lyrics(&mut self, client_id: ClientId, answers: Vec<String>, timestamp: i64) -> Vec<Outbound> {
        if self.room.phase != Phase::Playing {
            return vec![self.reject(client_id, GameError::RoundExpired)];
        }
        let Some(player) = self.room.player(client_id) else {
            return vec![self.reject(client_id, GameError::PlayerNotInRoom)];
        };
        if !player.is_active_participant() {
            return vec![self.reject(client_id, GameError::PlayerNotInRoom)];
        }

        let Some(Round::Lyrics(core, state)) = &self.round else {
            return vec![self.reject(client_id, GameError::RoundExpired)];
        };
        if !state.revealed {
            return vec![self.reject(client_id, GameError::RoundExpired)];
        }
        if state.answered.contains(&client_id) {
            return vec![self.reject(client_id, GameError::AlreadyAnswered)];
        }

        let total = state.blanks.len();
        let correct_count = state
            .blanks
            .iter()
            .enumerate()
            .filter(|(i, blank)| {
                answers
                    .get(*i)
                    .is_some_and(|given| given.trim().eq_ignore_ascii_case(blank.answer.trim()))
            })
            .count();

        let (start_ms, end_ms, streak) = (core.start_ms, core.end_ms, player.streak);
        let duration_ms = end_ms - start_ms;
        let elapsed_ms = (timestamp - start_ms).clamp(-CLOCK_SKEW_TOLERANCE_MS, duration_ms + CLOCK_SKEW_TOLERANCE_MS).max(0);
        let full_score = score::calculate(elapsed_ms, duration_ms, streak, 4).total;
        let ratio = if total == 0 { 0.0 } else { correct_count as f64 / total as f64 };
        let points_earned = (full_score as f64 * ratio * self.room.settings.difficulty.multiplier()).floor() as i64;

        if let Some(Round::Lyrics(_, state)) = &mut self.round {
            state.answered.insert(client_id);
        }

        let mut out = Vec::new();
        if let Some(player) = self.room.player_mut(client_id) {
            player.score += points_earned;
            if total > 0 && correct_count == total {
                player.streak += 1;
            } else {
                player.streak = 0;
            }
        }

        out.push(Outbound::Broadcast(ServerEvent::LyricsResult {
            player_id: client_id,
            correct_count,
            total,
            points_earned,
        }));

        let all_answered = self
            .room
            .active_participants()
            .all(|p| match &self.round {
                Some(Round::Lyrics(_, state)) => state.answered.contains(&p.id),
                _ => false,
            });
        if all_answered {
            out.push(Outbound::CancelRoundTimer);
            out.push(Outbound::CancelModeTimer);
            out.extend(self.end_round());
        }
        out
    }
}
