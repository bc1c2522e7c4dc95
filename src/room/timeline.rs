use crate::error::GameError;
use crate::model::player::{insert_sorted_card, TimelineCard};
use crate::model::{Phase, Round};
use crate::protocol::{ClientId, ServerEvent};

use super::actor::RoomActor;
use super::Outbound;

impl RoomActor {
    pub(super) fn submit_timeline_answer(&mut self, client_id: ClientId, index: usize) -> Vec<Outbound> {
        if self.room.phase != Phase::Playing {
            return vec![self.reject(client_id, GameError::RoundExpired)];
        }
        let Some(Round::Timeline(core, _)) = &self.round else {
            return vec![self.reject(client_id, GameError::RoundExpired)];
        };
        let (track_id, title, artist, release_year) = (
            core.track.id.clone(),
            core.track.title.clone(),
            core.track.artist.clone(),
            core.track.release_year,
        );

        let Some(player) = self.room.player(client_id) else {
            return vec![self.reject(client_id, GameError::PlayerNotInRoom)];
        };
        if !player.is_active_participant() {
            return vec![self.reject(client_id, GameError::PlayerNotInRoom)];
        }

        let team_mode = self.room.settings.enable_teams;
        let answer_key = if team_mode {
            let Some(team_id) = player.team_id.clone() else {
                return vec![self.reject(client_id, GameError::PlayerNotInRoom)];
            };
            if Some(&team_id) != self.room.current_team_turn_id.as_ref() {
                return vec![self.reject(client_id, GameError::NotYourTurn)];
            }
            team_id
        } else {
            client_id.to_string()
        };

        let already_answered = match &self.round {
            Some(Round::Timeline(_, state)) => state.answered.contains(&answer_key),
            _ => true,
        };
        if already_answered {
            return vec![self.reject(client_id, GameError::AlreadyAnswered)];
        }

        let cards: Vec<TimelineCard> = if team_mode {
            self.room
                .teams
                .as_ref()
                .and_then(|teams| teams.iter().find(|t| t.id == answer_key))
                .map(|t| t.timeline_cards.clone())
                .unwrap_or_default()
        } else {
            player.timeline_cards.clone()
        };

        if index > cards.len() {
            return vec![self.reject(client_id, GameError::ServerError)];
        }
        let before = if index == 0 { i32::MIN } else { cards[index - 1].release_year };
        let after = if index == cards.len() { i32::MAX } else { cards[index].release_year };
        let correct = before <= release_year && release_year <= after;

        if let Some(Round::Timeline(_, state)) = &mut self.round {
            state.answered.insert(answer_key.clone());
        }

        let mut out = Vec::new();
        let new_card = TimelineCard {
            track_id,
            title,
            artist,
            release_year,
        };

        let mut winner = false;
        if correct {
            if team_mode {
                if let Some(teams) = &mut self.room.teams {
                    if let Some(team) = teams.iter_mut().find(|t| t.id == answer_key) {
                        insert_sorted_card(&mut team.timeline_cards, new_card.clone());
                        winner = team.timeline_cards.len() as u32 >= self.room.settings.timeline_cards_to_win;
                    }
                }
            } else if let Some(player) = self.room.player_mut(client_id) {
                insert_sorted_card(&mut player.timeline_cards, new_card.clone());
                winner = player.timeline_cards.len() as u32 >= self.room.settings.timeline_cards_to_win;
            }
            out.push(Outbound::Broadcast(ServerEvent::TimelineCardAdded {
                owner_id: answer_key.clone(),
                track_id: new_card.track_id.clone(),
                title: new_card.title.clone(),
                artist: new_card.artist.clone(),
                release_year: new_card.release_year,
            }));
            if winner {
                out.push(Outbound::Broadcast(ServerEvent::TimelineWinner { winner_id: answer_key.clone() }));
            }
        }

        let player = self.room.player(client_id).unwrap();
        out.push(Outbound::ToClient(
            client_id,
            ServerEvent::AnswerResult {
                correct,
                points_earned: 0,
                total_score: player.score,
                streak: player.streak,
                found_part: None,
                cooldown_until: None,
                track_title: Some(new_card.title.clone()),
                track_artist: Some(new_card.artist.clone()),
            },
        ));

        let should_end_round = if winner {
            true
        } else if team_mode {
            true
        } else {
            let active_ids: Vec<ClientId> = self.room.active_participants().map(|p| p.id).collect();
            match &self.round {
                Some(Round::Timeline(_, state)) => {
                    active_ids.iter().all(|id| state.answered.contains(&id.to_string()))
                }
                _ => false,
            }
        };

        if should_end_round {
            out.push(Outbound::CancelRoundTimer);
            out.extend(self.end_round());
        }
        out
    }
}
