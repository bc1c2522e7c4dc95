use crate::error::GameError;
use crate::model::round::{
    BuzzerState, IntroState, LyricsBlank, LyricsState, RoundCore, INTRO_TIER_DURATIONS_MS,
};
use crate::model::{GameMode, Phase, Player, Round};
use crate::protocol::{self, ClientId, ServerEvent};
use crate::track_source::Track;

use super::actor::{contextual_reaction_for, RoomActor, COUNTDOWN_MS};
use super::{Outbound, RoundTimerKind};

impl RoomActor {
    pub(super) fn join_room(
        &mut self,
        client_id: ClientId,
        pseudo: String,
        avatar_url: Option<String>,
        spectator: bool,
    ) -> Vec<Outbound> {
        let avatar = protocol::sanitize_avatar(avatar_url);

        if let Some(existing) = self
            .room
            .players
            .iter_mut()
            .find(|p| !p.active && p.name.eq_ignore_ascii_case(&pseudo))
        {
            let old_id = existing.id;
            existing.id = client_id;
            existing.active = true;
            if self.room.host_client_id == old_id {
                self.room.host_client_id = client_id;
            }
            self.reconnect_timers.remove(&old_id);

            let mut out = vec![
                Outbound::CancelReconnectGrace { client_id: old_id },
                Outbound::ToClient(
                    client_id,
                    ServerEvent::RoomJoined {
                        room_state: self.current_view(),
                    },
                ),
            ];
            let rejoined = self.room.player(client_id).cloned();
            if let Some(player) = rejoined {
                out.push(Outbound::BroadcastExcept(
                    client_id,
                    ServerEvent::PlayerJoined { player },
                ));
            }
            out.extend(self.broadcast_room_updated());
            return out;
        }

        if !protocol::is_valid_pseudo(&pseudo) {
            return vec![self.reject(client_id, GameError::InvalidPseudo)];
        }
        if !spectator {
            let occupied = self.room.players.iter().filter(|p| !p.is_spectator).count();
            if occupied as u32 >= self.room.settings.max_players {
                return vec![self.reject(client_id, GameError::RoomFull)];
            }
            if self.room.phase != Phase::Waiting {
                return vec![self.reject(client_id, GameError::GameAlreadyStarted)];
            }
        }

        let player = Player::new(client_id, pseudo, avatar, spectator);
        self.room.players.push(player.clone());

        vec![
            Outbound::ToClient(
                client_id,
                ServerEvent::RoomJoined {
                    room_state: self.current_view(),
                },
            ),
            Outbound::BroadcastExcept(client_id, ServerEvent::PlayerJoined { player }),
        ]
    }

    pub(super) fn leave_room(&mut self, client_id: ClientId) -> Vec<Outbound> {
        self.remove_player(client_id)
    }

    pub(super) fn kick_player(&mut self, client_id: ClientId, target: ClientId) -> Vec<Outbound> {
        if !self.room.is_host(client_id) {
            return vec![self.reject(client_id, GameError::NotHost)];
        }
        let mut out = vec![Outbound::Broadcast(ServerEvent::PlayerKicked { player_id: target })];
        out.extend(self.remove_player(target));
        out
    }

    pub(super) fn toggle_ready(&mut self, client_id: ClientId) -> Vec<Outbound> {
        let Some(player) = self.room.player_mut(client_id) else {
            return vec![self.reject(client_id, GameError::PlayerNotInRoom)];
        };
        player.ready = !player.ready;
        self.broadcast_room_updated()
    }

    pub(super) fn update_settings(
        &mut self,
        client_id: ClientId,
        patch: crate::model::SettingsPatch,
    ) -> Vec<Outbound> {
        if !self.room.is_host(client_id) {
            return vec![self.reject(client_id, GameError::NotHost)];
        }
        if self.room.phase != Phase::Waiting {
            return vec![self.reject(client_id, GameError::GameAlreadyStarted)];
        }
        self.room.settings.apply_patch(patch);
        self.room.total_rounds = self.room.settings.effective_total_rounds();
        self.broadcast_room_updated()
    }

    pub(super) fn toggle_pause(&mut self, client_id: ClientId) -> Vec<Outbound> {
        let Some(player) = self.room.player_mut(client_id) else {
            return vec![self.reject(client_id, GameError::PlayerNotInRoom)];
        };
        if !player.is_active_participant() {
            return vec![];
        }
        player.voted_pause = !player.voted_pause;

        let votes = self.room.pause_votes();
        let active = self.room.active_participant_count().max(1);
        let majority = votes * 2 > active;

        let mut out = Vec::new();
        if majority && !self.room.paused && self.round.is_some() {
            out.extend(self.pause_round());
        } else if !majority && self.room.paused {
            out.extend(self.resume_round());
        }
        out.extend(self.broadcast_room_updated());
        out
    }

    fn pause_round(&mut self) -> Vec<Outbound> {
        let pausable = matches!(
            self.round,
            Some(Round::BlindTest(_))
                | Some(Round::Elimination(_))
                | Some(Round::Timeline(_, _))
                | Some(Round::Lyrics(_, _))
        );
        if !pausable {
            return vec![];
        }
        let now = self.now();
        let Some(round) = &self.round else { return vec![] };
        self.paused_remaining_ms = Some((round.core().end_ms - now).max(0));
        self.room.paused = true;
        self.round_generation += 1;
        vec![Outbound::CancelRoundTimer]
    }

    fn resume_round(&mut self) -> Vec<Outbound> {
        let Some(remaining) = self.paused_remaining_ms.take() else {
            return vec![];
        };
        self.room.paused = false;
        let now = self.now();
        let duration = self.room.settings.round_duration_ms;
        let Some(round) = &mut self.round else { return vec![] };
        let core = round.core_mut();
        core.start_ms = now - (duration - remaining);
        core.end_ms = now + remaining;
        self.round_generation += 1;
        vec![Outbound::ScheduleRoundTimer {
            generation: self.round_generation,
            kind: RoundTimerKind::RoundEnd,
            after: std::time::Duration::from_millis(remaining.max(0) as u64),
        }]
    }

    pub(super) fn start_game(&mut self, client_id: ClientId) -> Vec<Outbound> {
        if !self.room.is_host(client_id) {
            return vec![self.reject(client_id, GameError::NotHost)];
        }
        if self.room.phase != Phase::Waiting {
            return vec![self.reject(client_id, GameError::GameAlreadyStarted)];
        }
        if (self.room.active_participant_count() as u32) < self.room.settings.min_players() {
            return vec![self.reject(client_id, GameError::NotEnoughPlayers)];
        }

        if self.room.settings.enable_teams && self.room.teams.is_none() {
            self.room.teams = Some(vec![
                crate::model::Team::new("team-a", "Team A"),
                crate::model::Team::new("team-b", "Team B"),
            ]);
            self.room.current_team_turn_id = Some("team-a".to_string());
        }

        self.room.phase = Phase::Countdown;
        self.round_generation += 1;
        let mut out = vec![Outbound::ResetTrackDedup, Outbound::Broadcast(ServerEvent::CountdownStart {
            countdown_ms: COUNTDOWN_MS,
        })];
        out.push(Outbound::ScheduleRoundTimer {
            generation: self.round_generation,
            kind: RoundTimerKind::Countdown,
            after: std::time::Duration::from_millis(COUNTDOWN_MS as u64),
        });
        out.extend(self.broadcast_room_updated());
        out
    }

    pub(super) fn after_countdown(&mut self) -> Vec<Outbound> {
        self.room.phase = Phase::Playing;
        self.start_round()
    }

    pub(super) fn start_round(&mut self) -> Vec<Outbound> {
        self.room.current_round += 1;
        for player in &mut self.room.players {
            player.reset_round_state();
        }
        self.round = None;
        self.round_generation += 1;

        let mut out = vec![Outbound::FetchTrack {
            generation: self.round_generation,
            genre: self.room.settings.genre.clone(),
        }];
        out.extend(self.broadcast_room_updated());
        out
    }

    pub(super) fn begin_round_with_track(&mut self, track: Track) -> Vec<Outbound> {
        let start_ms = self.now();
        let end_ms = start_ms + self.room.settings.round_duration_ms;
        let core = RoundCore::new(track, start_ms, end_ms);

        let mode = self.room.settings.game_mode;
        self.round = Some(match mode {
            GameMode::BlindTest => Round::BlindTest(core),
            GameMode::Elimination => Round::Elimination(core),
            GameMode::Buzzer => Round::Buzzer(core, BuzzerState::default()),
            GameMode::Intro => Round::Intro(core, IntroState::default()),
            GameMode::Lyrics => Round::Lyrics(core, LyricsState::default()),
            GameMode::Timeline => Round::Timeline(core, Default::default()),
        });

        let mut out = Vec::new();
        if let Some(data) = self.round_data() {
            out.push(Outbound::Broadcast(ServerEvent::RoundStart(data)));
        }

        match mode {
            GameMode::Intro => {
                out.push(Outbound::Broadcast(ServerEvent::IntroTierUnlock {
                    tier: 0,
                    duration_ms: INTRO_TIER_DURATIONS_MS[0],
                    phase: "listening",
                }));
                out.push(Outbound::ScheduleIntroTimer {
                    generation: 0,
                    after: std::time::Duration::from_millis(INTRO_TIER_DURATIONS_MS[0] as u64),
                });
            }
            _ => {
                out.push(Outbound::ScheduleRoundTimer {
                    generation: self.round_generation,
                    kind: RoundTimerKind::RoundEnd,
                    after: std::time::Duration::from_millis(self.room.settings.round_duration_ms as u64),
                });
                if mode == GameMode::Lyrics {
                    out.push(Outbound::ScheduleModeTimer {
                        generation: self.round_generation,
                        after: std::time::Duration::from_secs(10),
                    });
                }
            }
        }
        out
    }

    pub(super) fn reveal_lyrics(&mut self) -> Vec<Outbound> {
        let Some(Round::Lyrics(core, state)) = &mut self.round else {
            return vec![];
        };
        if state.revealed {
            return vec![];
        }
        let (text, blanks) = build_lyrics_blanks(&core.track.title, &core.track.artist);
        state.lyrics_text = text.clone();
        state.blanks = blanks.clone();
        state.revealed = true;
        vec![Outbound::Broadcast(ServerEvent::LyricsData {
            lyrics_text: text,
            blanks,
        })]
    }

    pub(super) fn maybe_end_round_early(&mut self) -> Vec<Outbound> {
        let Some(round) = &self.round else { return vec![] };
        let all_found = self
            .room
            .active_participants()
            .all(|p| round.core().players_who_found.contains(&p.id));
        if all_found && self.room.active_participant_count() > 0 {
            self.round_generation += 1;
            let mut out = vec![Outbound::CancelRoundTimer, Outbound::CancelModeTimer];
            out.extend(self.end_round());
            out
        } else {
            vec![]
        }
    }

    pub(super) fn end_round(&mut self) -> Vec<Outbound> {
        let Some(round) = self.round.take() else { return vec![] };
        self.round_generation += 1;

        let core = round.core();
        let fastest_correct = core
            .attempts
            .iter()
            .filter(|a| a.correct)
            .map(|a| a.elapsed_ms)
            .min();
        let anyone_found = !core.players_who_found.is_empty();
        let everyone_found = self
            .room
            .active_participants()
            .all(|p| core.players_who_found.contains(&p.id));
        let reaction = contextual_reaction_for(fastest_correct, anyone_found, everyone_found);

        if matches!(round, Round::BlindTest(_) | Round::Elimination(_) | Round::Buzzer(..)) {
            for player in &mut self.room.players {
                let found_something = core.player_round_points.contains_key(&player.id);
                if player.is_active_participant() && !found_something {
                    player.streak = 0;
                }
            }
        }

        if let Round::Elimination(_) = &round {
            self.apply_elimination_losses(core);
        }

        let results: Vec<_> = self
            .room
            .players
            .iter()
            .map(|p| crate::model::round::PlayerRoundSummary {
                player_id: p.id,
                was_correct: p.found_artist || p.found_title,
                answered_in_ms: core
                    .attempts
                    .iter()
                    .find(|a| a.player_id == p.id && a.correct)
                    .map(|a| a.elapsed_ms),
                points_earned: *core.player_round_points.get(&p.id).unwrap_or(&0),
                total_score: p.score,
                streak: p.streak,
                attempts_count: core.attempts.iter().filter(|a| a.player_id == p.id).count() as u32,
            })
            .collect();

        let mut out = vec![Outbound::Broadcast(ServerEvent::RoundEnd {
            results,
            reaction,
            track_title: core.track.title.clone(),
            track_artist: core.track.artist.clone(),
        })];
        if let Some(reaction) = reaction {
            out.push(Outbound::Broadcast(ServerEvent::ContextualReaction { kind: reaction }));
        }

        self.room.phase = Phase::Reveal;
        let reveal_ms = if self.room.settings.game_mode == GameMode::Timeline {
            2_000
        } else {
            self.room.settings.reveal_duration_ms
        };
        out.push(Outbound::ScheduleRoundTimer {
            generation: self.round_generation,
            kind: RoundTimerKind::Reveal,
            after: std::time::Duration::from_millis(reveal_ms as u64),
        });
        out.extend(self.broadcast_room_updated());
        out
    }

    fn apply_elimination_losses(&mut self, core: &RoundCore) {
        let active_ids: Vec<ClientId> = self.room.active_participants().map(|p| p.id).collect();
        let failed: Vec<ClientId> = active_ids
            .iter()
            .copied()
            .filter(|id| !core.players_who_found.contains(id))
            .collect();

        // Some but not all failed: each failed player loses a life. None
        // failed: only the last-ranked finisher loses one. All failed: no
        // one does.
        let to_lose_life: Vec<ClientId> = if failed.is_empty() {
            core.players_who_found.last().copied().into_iter().collect()
        } else if failed.len() < active_ids.len() {
            failed
        } else {
            vec![]
        };

        for id in to_lose_life {
            if let Some(player) = self.room.player_mut(id) {
                if player.lives > 0 {
                    player.lives -= 1;
                }
            }
        }
    }

    pub(super) fn after_reveal(&mut self) -> Vec<Outbound> {
        let mut out = Vec::new();

        if let Some(teams) = &self.room.teams {
            if !teams.is_empty() {
                let idx = teams
                    .iter()
                    .position(|t| Some(&t.id) == self.room.current_team_turn_id.as_ref())
                    .unwrap_or(0);
                let next = (idx + 1) % teams.len();
                self.room.current_team_turn_id = Some(teams[next].id.clone());
            }
        }

        let eliminated_out: Vec<ClientId> = self
            .room
            .players
            .iter()
            .filter(|p| p.is_active_participant() && p.lives == 0 && self.room.settings.game_mode == GameMode::Elimination)
            .map(|p| p.id)
            .collect();
        for id in &eliminated_out {
            if let Some(player) = self.room.player_mut(*id) {
                player.eliminated = true;
                out.push(Outbound::Broadcast(ServerEvent::PlayerEliminated {
                    player_id: player.id,
                    pseudo: player.name.clone(),
                }));
            }
        }

        let finished = self.game_should_end();
        if finished {
            out.extend(self.end_game());
        } else {
            self.room.phase = Phase::Countdown;
            self.round_generation += 1;
            out.push(Outbound::Broadcast(ServerEvent::CountdownStart {
                countdown_ms: COUNTDOWN_MS,
            }));
            out.push(Outbound::ScheduleRoundTimer {
                generation: self.round_generation,
                kind: RoundTimerKind::Countdown,
                after: std::time::Duration::from_millis(COUNTDOWN_MS as u64),
            });
            out.extend(self.broadcast_room_updated());
        }
        out
    }

    fn game_should_end(&self) -> bool {
        match self.room.settings.game_mode {
            GameMode::Elimination => self.room.active_participant_count() <= 1,
            GameMode::Timeline => self
                .room
                .players
                .iter()
                .any(|p| p.timeline_cards.len() as u32 >= self.room.settings.timeline_cards_to_win)
                || self.room.teams.as_ref().is_some_and(|teams| {
                    teams
                        .iter()
                        .any(|t| t.timeline_cards.len() as u32 >= self.room.settings.timeline_cards_to_win)
                }),
            _ => self.room.current_round >= self.room.total_rounds,
        }
    }

    pub(super) fn end_game(&mut self) -> Vec<Outbound> {
        self.room.phase = Phase::Finished;
        let podium = self.podium();
        let final_scores = podium.clone();

        let mut out = vec![Outbound::Broadcast(ServerEvent::GameOver {
            final_scores,
            podium: podium.clone(),
        })];

        let winner_id = podium.first().map(|p| p.player_id);
        for player in &self.room.players {
            let Some(user_id) = &player.user_id else { continue };
            out.push(Outbound::RecordStats(crate::stats_sink::StatsUpdate {
                user_id: user_id.clone(),
                games_played_delta: 1,
                games_won_delta: if Some(player.id) == winner_id { 1 } else { 0 },
                total_score_delta: player.score,
                best_score: player.score,
                best_streak: player.streak,
            }));
        }
        out
    }

    pub(super) fn request_next_round(&mut self, client_id: ClientId) -> Vec<Outbound> {
        if !self.room.is_host(client_id) {
            return vec![self.reject(client_id, GameError::NotHost)];
        }
        vec![]
    }

    pub(super) fn return_to_lobby(&mut self, client_id: ClientId) -> Vec<Outbound> {
        if !self.room.is_host(client_id) {
            return vec![self.reject(client_id, GameError::NotHost)];
        }
        if self.room.phase != Phase::Finished {
            return vec![self.reject(client_id, GameError::GameAlreadyStarted)];
        }
        self.round = None;
        self.round_timer.cancel();
        self.mode_timer.cancel();
        self.round_generation += 1;
        self.room.reset_for_new_game();
        let mut out = vec![Outbound::ResetTrackDedup];
        out.extend(self.broadcast_room_updated());
        out
    }

    pub(super) fn send_message(&mut self, client_id: ClientId, message: String) -> Vec<Outbound> {
        if !protocol::is_valid_message(&message) {
            return vec![];
        }
        let Some(player) = self.room.player(client_id) else {
            return vec![self.reject(client_id, GameError::PlayerNotInRoom)];
        };
        vec![Outbound::Broadcast(ServerEvent::NewMessage {
            player_id: client_id,
            pseudo: player.name.clone(),
            message,
            timestamp: self.now(),
        })]
    }

    pub(super) fn send_emote(&mut self, client_id: ClientId, emote: String) -> Vec<Outbound> {
        if self.room.player(client_id).is_none() {
            return vec![self.reject(client_id, GameError::PlayerNotInRoom)];
        }
        vec![Outbound::Broadcast(ServerEvent::EmoteReceived {
            player_id: client_id,
            emote,
        })]
    }

    pub(super) fn join_team(&mut self, client_id: ClientId, team_id: String) -> Vec<Outbound> {
        let valid_team = self.room.teams.as_ref().is_some_and(|teams| teams.iter().any(|t| t.id == team_id));
        if !valid_team {
            return vec![self.reject(client_id, GameError::PlayerNotInRoom)];
        }
        let Some(player) = self.room.player_mut(client_id) else {
            return vec![self.reject(client_id, GameError::PlayerNotInRoom)];
        };
        player.team_id = Some(team_id);
        self.broadcast_room_updated()
    }

    pub(super) fn activate_powerup(
        &mut self,
        client_id: ClientId,
        power_up: crate::model::PowerUp,
    ) -> Vec<Outbound> {
        if !self.room.settings.enable_power_ups {
            return vec![self.reject(client_id, GameError::ServerError)];
        }
        let Some(player) = self.room.player_mut(client_id) else {
            return vec![self.reject(client_id, GameError::PlayerNotInRoom)];
        };
        if !player.consume_power_up(power_up) {
            return vec![self.reject(client_id, GameError::ServerError)];
        }
        vec![Outbound::Broadcast(ServerEvent::PowerupActivated { player_id: client_id, power_up })]
    }
}

fn build_lyrics_blanks(title: &str, artist: &str) -> (String, Vec<LyricsBlank>) {
    let lyrics_text = format!("{title} by {artist}, word for word, sung from the heart");
    let words: Vec<&str> = lyrics_text.split_whitespace().collect();
    let candidate_positions: Vec<usize> = words
        .iter()
        .enumerate()
        .filter(|(_, w)| w.trim_matches(|c: char| !c.is_alphanumeric()).len() >= 3)
        .map(|(i, _)| i)
        .collect();

    let blank_count = candidate_positions.len().clamp(3, 6).min(candidate_positions.len());
    let blanks = candidate_positions
        .into_iter()
        .take(blank_count)
        .map(|position| LyricsBlank {
            position,
            answer: words[position]
                .trim_matches(|c: char| !c.is_alphanumeric())
                .to_lowercase(),
        })
        .collect();
    (lyrics_text, blanks)
}
