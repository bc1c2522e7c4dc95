use crate::error::GameError;
use crate::model::{GameMode, Phase, Player, Settings};
use crate::protocol::{ClientEvent, ClientId, ServerEvent};
use crate::track_source::Track;

use super::actor::RoomActor;
use super::{Outbound, RoundTimerKind};

fn track(id: &str, title: &str, artist: &str) -> Track {
    Track {
        id: id.to_string(),
        title: title.to_string(),
        artist: artist.to_string(),
        preview_url: Some(format!("https://example.test/{id}.mp3")),
        album_cover: None,
        release_year: 1999,
    }
}

fn new_room(settings: Settings) -> (RoomActor, ClientId) {
    let host_id = ClientId::new();
    let host = Player::new(host_id, "Host".to_string(), None, false);
    (RoomActor::new("BT-TEST".to_string(), host, settings), host_id)
}

fn join(actor: &mut RoomActor, pseudo: &str) -> ClientId {
    let id = ClientId::new();
    actor.handle_client_event(
        id,
        ClientEvent::JoinRoom {
            room_code: "BT-TEST".to_string(),
            pseudo: pseudo.to_string(),
            avatar_url: None,
            spectator: false,
        },
    );
    id
}

fn find_round_start(effects: &[Outbound]) -> bool {
    effects
        .iter()
        .any(|e| matches!(e, Outbound::Broadcast(ServerEvent::RoundStart(_))))
}

#[test]
fn join_room_rejects_invalid_pseudo() {
    let (mut actor, _host) = new_room(Settings::default());
    let id = ClientId::new();
    let effects = actor.handle_client_event(
        id,
        ClientEvent::JoinRoom {
            room_code: "BT-TEST".to_string(),
            pseudo: "a".to_string(),
            avatar_url: None,
            spectator: false,
        },
    );
    assert!(matches!(
        effects.as_slice(),
        [Outbound::ToClient(_, ServerEvent::Error { code, .. })] if *code == GameError::InvalidPseudo.code()
    ));
}

#[test]
fn start_game_requires_host() {
    let (mut actor, _host) = new_room(Settings::default());
    let joiner = join(&mut actor, "Player2");
    let effects = actor.handle_client_event(joiner, ClientEvent::StartGame);
    assert!(matches!(
        effects.as_slice(),
        [Outbound::ToClient(_, ServerEvent::Error { code, .. })] if *code == GameError::NotHost.code()
    ));
}

#[test]
fn start_game_requires_min_players() {
    let (mut actor, host) = new_room(Settings::default());
    let effects = actor.handle_client_event(host, ClientEvent::StartGame);
    assert!(matches!(
        effects.as_slice(),
        [Outbound::ToClient(_, ServerEvent::Error { code, .. })] if *code == GameError::NotEnoughPlayers.code()
    ));
}

#[test]
fn full_blind_test_round_awards_points_and_ends_on_timer() {
    let (mut actor, host) = new_room(Settings::default());
    let guest = join(&mut actor, "Guest");

    actor.handle_client_event(host, ClientEvent::StartGame);
    assert_eq!(actor.room.phase, Phase::Countdown);

    let effects = actor.handle_round_timer(actor.round_generation, RoundTimerKind::Countdown);
    assert_eq!(actor.room.phase, Phase::Playing);
    assert!(effects.iter().any(|e| matches!(e, Outbound::FetchTrack { .. })));

    let generation = actor.round_generation;
    let effects = actor.handle_track_fetched(generation, Some(track("t1", "Shape of You", "Ed Sheeran")));
    assert!(find_round_start(&effects));

    let effects = actor.submit_answer(guest, "shape of you".to_string(), actor.now());
    let result = effects
        .iter()
        .find_map(|e| match e {
            Outbound::ToClient(_, ServerEvent::AnswerResult { correct, .. }) => Some(*correct),
            _ => None,
        })
        .expect("answer result sent");
    assert!(result);
    assert_eq!(actor.room.player(guest).unwrap().streak, 0, "title-only match isn't full credit yet");

    let effects = actor.submit_answer(guest, "ed sheeran".to_string(), actor.now());
    assert!(actor.room.player(guest).unwrap().fully_found());
    assert!(effects.iter().any(|e| matches!(e, Outbound::Broadcast(ServerEvent::PlayerFound { .. }))));

    let generation = actor.round_generation;
    let effects = actor.handle_round_timer(generation, RoundTimerKind::RoundEnd);
    assert!(effects.iter().any(|e| matches!(e, Outbound::Broadcast(ServerEvent::RoundEnd { .. }))));
    assert_eq!(actor.room.phase, Phase::Reveal);
}

#[test]
fn wrong_answer_applies_cooldown_then_blocks_resubmission() {
    let mut settings = Settings::default();
    settings.wrong_answer_cooldown_ms = 5_000;
    let (mut actor, host) = new_room(settings);
    let guest = join(&mut actor, "Guest");
    actor.handle_client_event(host, ClientEvent::StartGame);
    let gen = actor.round_generation;
    actor.handle_round_timer(gen, RoundTimerKind::Countdown);
    let gen = actor.round_generation;
    actor.handle_track_fetched(gen, Some(track("t1", "Shape of You", "Ed Sheeran")));

    let effects = actor.submit_answer(guest, "total nonsense".to_string(), actor.now());
    assert!(effects.iter().any(
        |e| matches!(e, Outbound::ToClient(_, ServerEvent::AnswerResult { correct: false, cooldown_until: Some(_), .. }))
    ));

    let effects = actor.submit_answer(guest, "shape of you".to_string(), actor.now());
    assert!(matches!(
        effects.as_slice(),
        [Outbound::ToClient(_, ServerEvent::Error { code, .. })] if *code == GameError::AnswerCooldown.code()
    ));
}

#[test]
fn reconnect_preserves_score_and_cancels_grace_timer() {
    let (mut actor, host) = new_room(Settings::default());
    let guest = join(&mut actor, "Guest");
    actor.room.player_mut(guest).unwrap().score = 4200;

    actor.handle_disconnect(guest);
    assert!(!actor.room.player(guest).unwrap().active);

    let new_id = ClientId::new();
    let effects = actor.handle_client_event(
        new_id,
        ClientEvent::JoinRoom {
            room_code: "BT-TEST".to_string(),
            pseudo: "GUEST".to_string(),
            avatar_url: None,
            spectator: false,
        },
    );
    assert!(effects.iter().any(|e| matches!(e, Outbound::CancelReconnectGrace { client_id } if *client_id == guest)));
    assert_eq!(actor.room.player(new_id).unwrap().score, 4200);
    assert!(actor.room.player(guest).is_none());
    let _ = host;
}

#[test]
fn buzzer_mode_locks_and_rejects_other_players() {
    let settings = Settings {
        game_mode: GameMode::Buzzer,
        ..Settings::default()
    };
    let (mut actor, host) = new_room(settings);
    let guest = join(&mut actor, "Guest");
    actor.handle_client_event(host, ClientEvent::StartGame);
    let gen = actor.round_generation;
    actor.handle_round_timer(gen, RoundTimerKind::Countdown);
    let gen = actor.round_generation;
    actor.handle_track_fetched(gen, Some(track("t1", "Shape of You", "Ed Sheeran")));

    let effects = actor.buzzer_press(guest);
    assert!(effects.iter().any(|e| matches!(e, Outbound::Broadcast(ServerEvent::BuzzerLocked { .. }))));

    let effects = actor.buzzer_press(host);
    assert!(effects.is_empty(), "second buzz while locked is a no-op");

    let effects = actor.submit_answer(host, "shape of you".to_string(), actor.now());
    assert!(matches!(
        effects.as_slice(),
        [Outbound::ToClient(_, ServerEvent::Error { code, .. })] if *code == GameError::NotYourTurn.code()
    ));
}

#[test]
fn timeline_mode_inserts_card_and_detects_winner() {
    let settings = Settings {
        game_mode: GameMode::Timeline,
        timeline_cards_to_win: 1,
        ..Settings::default()
    };
    let (mut actor, host) = new_room(settings);
    let _guest = join(&mut actor, "Guest");
    actor.handle_client_event(host, ClientEvent::StartGame);
    let gen = actor.round_generation;
    actor.handle_round_timer(gen, RoundTimerKind::Countdown);
    let gen = actor.round_generation;
    actor.handle_track_fetched(gen, Some(track("t1", "Some Song", "Some Artist")));

    // Host's timeline is empty, so index 0 is always the only valid slot.
    let effects = actor.submit_answer(host, "0".to_string(), actor.now());
    assert!(effects.iter().any(|e| matches!(e, Outbound::Broadcast(ServerEvent::TimelineCardAdded { .. }))));
    assert!(effects.iter().any(|e| matches!(e, Outbound::Broadcast(ServerEvent::TimelineWinner { .. }))));
    assert_eq!(actor.room.player(host).unwrap().timeline_cards.len(), 1);
}

#[test]
fn pause_requires_majority_vote() {
    let (mut actor, host) = new_room(Settings::default());
    let guest = join(&mut actor, "Guest");
    actor.handle_client_event(host, ClientEvent::StartGame);
    let gen = actor.round_generation;
    actor.handle_round_timer(gen, RoundTimerKind::Countdown);
    let gen = actor.round_generation;
    actor.handle_track_fetched(gen, Some(track("t1", "Shape of You", "Ed Sheeran")));

    actor.handle_client_event(host, ClientEvent::TogglePause);
    assert!(!actor.room.paused, "one of two votes isn't a majority");

    actor.handle_client_event(guest, ClientEvent::TogglePause);
    assert!(actor.room.paused);
    assert!(actor.paused_remaining_ms.is_some());
}
