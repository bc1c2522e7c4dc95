use crate::error::GameError;
use crate::fuzzy::{self, MatchType};
use crate::model::round::{Attempt, INTRO_GUESS_WINDOW_MS, INTRO_TIER_DURATIONS_MS, INTRO_TIER_MULTIPLIERS};
use crate::model::{GameMode, Phase, PowerUp, Round};
use crate::protocol::{self, ClientId, ServerEvent};
use crate::score;

use super::actor::RoomActor;
use super::{Outbound, RoundTimerKind};

/// Clock-skew clamp from §4.5: a client's claimed timestamp is trusted up
/// to 2s ahead of the server's own clock.
const CLOCK_SKEW_TOLERANCE_MS: i64 = 2_000;

impl RoomActor {
    pub(super) fn submit_answer(&mut self, client_id: ClientId, answer: String, timestamp: i64) -> Vec<Outbound> {
        if !protocol::is_valid_answer(&answer) {
            return vec![self.reject(client_id, GameError::ServerError)];
        }
        match &self.round {
            Some(Round::Timeline(..)) => {
                let Ok(index) = answer.trim().parse::<usize>() else {
                    return vec![self.reject(client_id, GameError::ServerError)];
                };
                self.submit_timeline_answer(client_id, index)
            }
            Some(Round::Lyrics(..)) => vec![self.reject(client_id, GameError::ServerError)],
            Some(_) => self.submit_free_text_answer(client_id, answer, timestamp),
            None => vec![self.reject(client_id, GameError::RoundExpired)],
        }
    }

    fn submit_free_text_answer(&mut self, client_id: ClientId, answer: String, timestamp: i64) -> Vec<Outbound> {
        if self.room.phase != Phase::Playing {
            return vec![self.reject(client_id, GameError::RoundExpired)];
        }
        let mode = self.room.settings.game_mode;

        if mode == GameMode::Buzzer {
            let Some(Round::Buzzer(_, buzzer)) = &self.round else {
                return vec![self.reject(client_id, GameError::RoundExpired)];
            };
            if buzzer.lock_holder != Some(client_id) {
                return vec![self.reject(client_id, GameError::NotYourTurn)];
            }
        }

        let Some(player) = self.room.player(client_id) else {
            return vec![self.reject(client_id, GameError::PlayerNotInRoom)];
        };
        if !player.is_active_participant() {
            return vec![self.reject(client_id, GameError::PlayerNotInRoom)];
        }
        if player.fully_found() {
            return vec![self.reject(client_id, GameError::AlreadyAnswered)];
        }
        let now = self.now();
        if player.in_cooldown(now) {
            return vec![self.reject(client_id, GameError::AnswerCooldown)];
        }

        let Some(round) = &self.round else {
            return vec![self.reject(client_id, GameError::RoundExpired)];
        };
        let core = round.core();
        if timestamp < core.start_ms || timestamp > core.end_ms {
            return vec![self.reject(client_id, GameError::RoundExpired)];
        }
        let effective_ts = timestamp.min(now + CLOCK_SKEW_TOLERANCE_MS);
        let elapsed_ms = effective_ts - core.start_ms;
        let duration_ms = core.end_ms - core.start_ms;

        let check = fuzzy::check(
            &answer,
            &core.track.title,
            &core.track.artist,
            self.room.settings.accept_artist_only,
            self.room.settings.accept_title_only,
        );

        let (already_had_artist, already_had_title) = {
            let p = self.room.player(client_id).unwrap();
            (p.found_artist, p.found_title)
        };

        let newly_artist = matches!(check.match_type, MatchType::Artist | MatchType::Both) && !already_had_artist;
        let newly_title = matches!(check.match_type, MatchType::Title | MatchType::Both) && !already_had_title;

        let mut out = Vec::new();

        if newly_artist || newly_title {
            let player = self.room.player_mut(client_id).unwrap();
            if newly_artist {
                player.found_artist = true;
            }
            if newly_title {
                player.found_title = true;
            }
            player.cooldown_until = None;
            let fully_found = player.fully_found();

            let position = if fully_found {
                player.streak += 1;
                let pos = self.round.as_ref().unwrap().core().players_who_found.len() as u32 + 1;
                self.round.as_mut().unwrap().core_mut().players_who_found.push(client_id);
                pos
            } else {
                10
            };

            let streak_for_score = self.room.player(client_id).unwrap().streak;
            let base = score::calculate(elapsed_ms, duration_ms, streak_for_score, position);

            let intro_mult = match &self.round {
                Some(Round::Intro(_, intro)) => INTRO_TIER_MULTIPLIERS[intro.tier.min(5)],
                _ => 1.0,
            };
            let difficulty_mult = self.room.settings.difficulty.multiplier();
            let active_power_up = self.room.player(client_id).unwrap().active_power_up;
            let double_points = active_power_up == Some(PowerUp::DoublePoints);
            let steal = active_power_up == Some(PowerUp::Steal);
            let power_up_mult = if double_points { 2.0 } else { 1.0 };
            if double_points {
                self.room.player_mut(client_id).unwrap().active_power_up = None;
            }

            let full_score = ((base.total as f64) * intro_mult * difficulty_mult * power_up_mult).floor() as i64;
            let mut points_earned = if matches!(check.match_type, MatchType::Both) {
                full_score
            } else {
                full_score / 2
            };

            if fully_found && position == 1 && steal {
                points_earned += self.apply_steal(client_id);
                self.room.player_mut(client_id).unwrap().active_power_up = None;
            }

            {
                let round = self.round.as_mut().unwrap();
                let core = round.core_mut();
                *core.player_round_points.entry(client_id).or_insert(0) += points_earned;
                core.attempts.push(Attempt {
                    player_id: client_id,
                    answer: answer.clone(),
                    correct: true,
                    elapsed_ms,
                    at_ms: now,
                });
            }

            let player = self.room.player_mut(client_id).unwrap();
            player.score += points_earned;
            let total_score = player.score;
            let streak = player.streak;
            let found_part = Some(if fully_found {
                MatchType::Both
            } else if newly_artist {
                MatchType::Artist
            } else {
                MatchType::Title
            });

            out.push(Outbound::ToClient(
                client_id,
                ServerEvent::AnswerResult {
                    correct: true,
                    points_earned,
                    total_score,
                    streak,
                    found_part,
                    cooldown_until: None,
                    track_title: None,
                    track_artist: None,
                },
            ));

            if fully_found {
                let time_taken_ms = elapsed_ms;
                out.push(Outbound::Broadcast(ServerEvent::PlayerFound {
                    player_id: client_id,
                    pseudo: player.name.clone(),
                    position,
                    time_taken_ms,
                }));
                if mode == GameMode::Buzzer {
                    out.push(Outbound::CancelRoundTimer);
                    out.push(Outbound::CancelBuzzerTimer);
                    out.extend(self.end_round());
                    return out;
                }
                out.extend(self.maybe_end_round_early());
            }
        } else {
            let duplicate = matches!(
                (check.match_type, already_had_artist, already_had_title),
                (MatchType::Artist, true, _) | (MatchType::Title, _, true) | (MatchType::Both, true, true)
            );

            {
                let round = self.round.as_mut().unwrap();
                round.core_mut().attempts.push(Attempt {
                    player_id: client_id,
                    answer: answer.clone(),
                    correct: false,
                    elapsed_ms,
                    at_ms: now,
                });
            }

            if duplicate {
                out.push(self.reject(client_id, GameError::AlreadyAnswered));
            } else {
                let shield = self.room.player(client_id).unwrap().active_power_up == Some(PowerUp::Shield);
                let cooldown_until = if shield {
                    self.room.player_mut(client_id).unwrap().active_power_up = None;
                    None
                } else {
                    let until = now + self.room.settings.wrong_answer_cooldown_ms;
                    self.room.player_mut(client_id).unwrap().cooldown_until = Some(until);
                    Some(until)
                };
                out.push(Outbound::ToClient(
                    client_id,
                    ServerEvent::AnswerResult {
                        correct: false,
                        points_earned: 0,
                        total_score: self.room.player(client_id).unwrap().score,
                        streak: self.room.player(client_id).unwrap().streak,
                        found_part: None,
                        cooldown_until,
                        track_title: None,
                        track_artist: None,
                    },
                ));

                if mode == GameMode::Buzzer {
                    out.extend(self.release_buzzer_lock());
                }
            }
        }

        out
    }

    /// Transfers `min(200, their_score)` from the highest-scoring other
    /// player to `thief`. Returns the amount transferred, to be folded
    /// into the thief's `points_earned` for this round.
    fn apply_steal(&mut self, thief: ClientId) -> i64 {
        let target = self
            .room
            .players
            .iter()
            .filter(|p| p.id != thief)
            .max_by_key(|p| p.score)
            .map(|p| (p.id, p.score));
        let Some((target_id, target_score)) = target else {
            return 0;
        };
        let amount = target_score.min(200).max(0);
        if amount > 0 {
            if let Some(victim) = self.room.player_mut(target_id) {
                victim.score -= amount;
            }
        }
        amount
    }

    pub(super) fn buzzer_press(&mut self, client_id: ClientId) -> Vec<Outbound> {
        if self.room.phase != Phase::Playing {
            return vec![self.reject(client_id, GameError::RoundExpired)];
        }
        let Some(Round::Buzzer(_, buzzer)) = &self.round else {
            return vec![self.reject(client_id, GameError::RoundExpired)];
        };
        if buzzer.lock_holder.is_some() {
            return vec![];
        }
        let Some(player) = self.room.player(client_id) else {
            return vec![self.reject(client_id, GameError::PlayerNotInRoom)];
        };
        if !player.is_active_participant() {
            return vec![self.reject(client_id, GameError::PlayerNotInRoom)];
        }

        let pseudo = player.name.clone();
        let buzzer_time_ms = self.room.settings.buzzer_time_ms;

        let Some(Round::Buzzer(_, buzzer)) = &mut self.round else {
            return vec![];
        };
        buzzer.lock_holder = Some(client_id);
        buzzer.buzzed.insert(client_id);
        buzzer.generation += 1;
        let generation = buzzer.generation;

        if let Some(player) = self.room.player_mut(client_id) {
            player.has_buzzed = true;
        }

        vec![
            Outbound::Broadcast(ServerEvent::BuzzerLocked {
                player_id: client_id,
                pseudo,
                buzzer_time_ms,
            }),
            Outbound::ScheduleBuzzerTimer {
                generation,
                after: std::time::Duration::from_millis(buzzer_time_ms as u64),
            },
        ]
    }

    pub(super) fn release_buzzer_lock(&mut self) -> Vec<Outbound> {
        let Some(Round::Buzzer(_, buzzer)) = &mut self.round else {
            return vec![];
        };
        buzzer.lock_holder = None;
        buzzer.generation += 1;

        let active_ids: Vec<ClientId> = self.room.active_participants().map(|p| p.id).collect();
        let Some(Round::Buzzer(_, buzzer)) = &self.round else {
            return vec![];
        };
        let all_buzzed = !active_ids.is_empty() && active_ids.iter().all(|id| buzzer.buzzed.contains(id));

        let mut out = vec![Outbound::Broadcast(ServerEvent::BuzzerReleased)];
        if all_buzzed {
            out.push(Outbound::Broadcast(ServerEvent::BuzzerTimeout));
            out.push(Outbound::CancelRoundTimer);
            out.extend(self.end_round());
        }
        out
    }

    pub(super) fn advance_intro_tier(&mut self) -> Vec<Outbound> {
        let Some(Round::Intro(_, intro)) = &mut self.round else {
            return vec![];
        };

        // Two sub-phases per tier: "listening" already elapsed to get here;
        // if we haven't yet emitted the guessing phase for this tier, do
        // that now, otherwise advance to the next tier's listening phase.
        if !intro.guessing_phase {
            intro.guessing_phase = true;
            intro.generation += 1;
            let generation = intro.generation;
            let tier = intro.tier;
            return vec![
                Outbound::Broadcast(ServerEvent::IntroTierUnlock {
                    tier,
                    duration_ms: INTRO_GUESS_WINDOW_MS,
                    phase: "guessing",
                }),
                Outbound::ScheduleIntroTimer {
                    generation,
                    after: std::time::Duration::from_millis(INTRO_GUESS_WINDOW_MS as u64),
                },
            ];
        }

        if intro.tier + 1 >= INTRO_TIER_DURATIONS_MS.len() {
            return self.end_round();
        }

        intro.tier += 1;
        intro.guessing_phase = false;
        intro.generation += 1;
        let generation = intro.generation;
        let tier = intro.tier;
        let duration_ms = INTRO_TIER_DURATIONS_MS[tier];
        vec![
            Outbound::Broadcast(ServerEvent::IntroTierUnlock {
                tier,
                duration_ms,
                phase: "listening",
            }),
            Outbound::ScheduleIntroTimer {
                generation,
                after: std::time::Duration::from_millis(duration_ms as u64),
            },
        ]
    }
}
