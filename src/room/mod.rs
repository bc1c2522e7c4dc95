//! One room is one single-writer actor task, consuming its mailbox in
//! arrival order. See §5 Concurrency & Resource Model.

mod actor;
mod answer;
mod lifecycle;
mod lyrics;
mod timeline;
mod timer;

#[cfg(test)]
mod tests;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, instrument, warn};

pub use actor::RoomActor;

use crate::protocol::{ClientEvent, ClientId, ServerEvent};
use crate::rate_limit::RateLimiter;
use crate::stats_sink::{StatsSink, StatsUpdate};
use crate::track_source::{Track, TrackSource};

const MAILBOX_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundTimerKind {
    RoundEnd,
    Reveal,
    Countdown,
}

#[derive(Debug)]
pub enum RoomCommand {
    Client {
        client_id: ClientId,
        event: ClientEvent,
    },
    ClientDisconnected {
        client_id: ClientId,
    },
    TrackFetched {
        generation: u64,
        track: Option<Track>,
    },
    RoundTimerFired {
        generation: u64,
        kind: RoundTimerKind,
    },
    IntroTimerFired {
        generation: u64,
    },
    BuzzerTimerFired {
        generation: u64,
    },
    /// Generic round-scoped auxiliary timer, currently only the lyrics
    /// reveal-at-10s delay. Guarded by `round_generation` since at most
    /// one fires per round.
    ModeTimerFired {
        generation: u64,
    },
    ReconnectGraceFired {
        client_id: ClientId,
    },
    /// Sent right after a successful `CreateRoom`/`JoinRoom` once the hub
    /// has resolved the session's authenticated user id, if any.
    SetPlayerUserId {
        client_id: ClientId,
        user_id: String,
    },
}

/// Everything the actor's pure logic wants to happen in the outside world:
/// sends, broadcasts, timer (re)scheduling, and the one piece of I/O in
/// the hot path (track fetch), which re-enters via the mailbox.
#[derive(Debug)]
pub enum Outbound {
    ToClient(ClientId, ServerEvent),
    Broadcast(ServerEvent),
    BroadcastExcept(ClientId, ServerEvent),
    ScheduleRoundTimer {
        generation: u64,
        kind: RoundTimerKind,
        after: Duration,
    },
    CancelRoundTimer,
    ScheduleIntroTimer {
        generation: u64,
        after: Duration,
    },
    CancelIntroTimer,
    ScheduleBuzzerTimer {
        generation: u64,
        after: Duration,
    },
    CancelBuzzerTimer,
    ScheduleModeTimer {
        generation: u64,
        after: Duration,
    },
    CancelModeTimer,
    ScheduleReconnectGrace {
        client_id: ClientId,
        after: Duration,
    },
    CancelReconnectGrace {
        client_id: ClientId,
    },
    FetchTrack {
        generation: u64,
        genre: Option<String>,
    },
    RecordStats(StatsUpdate),
    /// Clears this room's per-session track dedup state. Emitted at game
    /// start and on return-to-lobby (§4.4(d)); keyed by room code so one
    /// room's reset can't clear another's recently-seen tracks.
    ResetTrackDedup,
    RoomClosed,
}

/// Routes a room actor's `ToClient`/`Broadcast` outbound events to actual
/// connections. Implemented by the Connection Hub; kept as a trait so the
/// actor's run loop (and its tests) don't depend on the Hub directly.
#[async_trait::async_trait]
pub trait RoomOutbound: Send + Sync {
    async fn send_to_client(&self, room_code: &str, client_id: ClientId, event: ServerEvent);
    async fn broadcast(&self, room_code: &str, event: ServerEvent);
    async fn broadcast_except(&self, room_code: &str, except: ClientId, event: ServerEvent);
    async fn room_closed(&self, room_code: &str);
}

#[derive(Clone)]
pub struct RoomHandle {
    sender: mpsc::Sender<RoomCommand>,
}

impl RoomHandle {
    pub fn send(&self, command: RoomCommand) {
        if self.sender.try_send(command).is_err() {
            warn!("room mailbox full or closed, dropping command");
        }
    }
}

/// Spawns the room's actor task and returns a handle to its mailbox.
pub fn spawn_room(
    actor: RoomActor,
    outbound: Arc<dyn RoomOutbound>,
    track_source: Arc<dyn TrackSource>,
    stats_sink: Arc<dyn StatsSink>,
    rate_limiter: Arc<RateLimiter>,
) -> RoomHandle {
    let (tx, rx) = mpsc::channel(MAILBOX_CAPACITY);
    let handle = RoomHandle { sender: tx.clone() };
    tokio::spawn(run(actor, rx, tx, outbound, track_source, stats_sink, rate_limiter));
    handle
}

#[instrument(skip_all, fields(room_code = %actor.room.code))]
async fn run(
    mut actor: RoomActor,
    mut mailbox: mpsc::Receiver<RoomCommand>,
    self_sender: mpsc::Sender<RoomCommand>,
    outbound: Arc<dyn RoomOutbound>,
    track_source: Arc<dyn TrackSource>,
    stats_sink: Arc<dyn StatsSink>,
    rate_limiter: Arc<RateLimiter>,
) {
    let room_code = actor.room.code.clone();
    while let Some(command) = mailbox.recv().await {
        let effects = match command {
            RoomCommand::Client { client_id, event } => actor.handle_client_event(client_id, event),
            RoomCommand::ClientDisconnected { client_id } => actor.handle_disconnect(client_id),
            RoomCommand::TrackFetched { generation, track } => {
                actor.handle_track_fetched(generation, track)
            }
            RoomCommand::RoundTimerFired { generation, kind } => {
                actor.handle_round_timer(generation, kind)
            }
            RoomCommand::IntroTimerFired { generation } => actor.handle_intro_timer(generation),
            RoomCommand::BuzzerTimerFired { generation } => actor.handle_buzzer_timer(generation),
            RoomCommand::ModeTimerFired { generation } => actor.handle_mode_timer(generation),
            RoomCommand::ReconnectGraceFired { client_id } => {
                actor.handle_reconnect_grace_fired(client_id)
            }
            RoomCommand::SetPlayerUserId { client_id, user_id } => {
                actor.set_player_user_id(client_id, user_id);
                Vec::new()
            }
        };

        let mut closed = false;
        for effect in effects {
            match effect {
                Outbound::ToClient(client_id, event) => {
                    outbound.send_to_client(&room_code, client_id, event).await;
                }
                Outbound::Broadcast(event) => {
                    outbound.broadcast(&room_code, event).await;
                }
                Outbound::BroadcastExcept(except, event) => {
                    outbound.broadcast_except(&room_code, except, event).await;
                }
                Outbound::ScheduleRoundTimer { generation, kind, after } => {
                    let sender = self_sender.clone();
                    actor.round_timer = timer::TimerHandle::schedule(after, async move {
                        let _ = sender.send(RoomCommand::RoundTimerFired { generation, kind }).await;
                    });
                }
                Outbound::CancelRoundTimer => actor.round_timer.cancel(),
                Outbound::ScheduleIntroTimer { generation, after } => {
                    let sender = self_sender.clone();
                    actor.mode_timer = timer::TimerHandle::schedule(after, async move {
                        let _ = sender.send(RoomCommand::IntroTimerFired { generation }).await;
                    });
                }
                Outbound::CancelIntroTimer => actor.mode_timer.cancel(),
                Outbound::ScheduleBuzzerTimer { generation, after } => {
                    let sender = self_sender.clone();
                    actor.mode_timer = timer::TimerHandle::schedule(after, async move {
                        let _ = sender.send(RoomCommand::BuzzerTimerFired { generation }).await;
                    });
                }
                Outbound::CancelBuzzerTimer => actor.mode_timer.cancel(),
                Outbound::ScheduleModeTimer { generation, after } => {
                    let sender = self_sender.clone();
                    actor.mode_timer = timer::TimerHandle::schedule(after, async move {
                        let _ = sender.send(RoomCommand::ModeTimerFired { generation }).await;
                    });
                }
                Outbound::CancelModeTimer => actor.mode_timer.cancel(),
                Outbound::ScheduleReconnectGrace { client_id, after } => {
                    let sender = self_sender.clone();
                    actor
                        .reconnect_timers
                        .insert(client_id, timer::TimerHandle::schedule(after, async move {
                            let _ = sender.send(RoomCommand::ReconnectGraceFired { client_id }).await;
                        }));
                }
                Outbound::CancelReconnectGrace { client_id } => {
                    if let Some(mut handle) = actor.reconnect_timers.remove(&client_id) {
                        handle.cancel();
                    }
                }
                Outbound::FetchTrack { generation, genre } => {
                    let sender = self_sender.clone();
                    let source = track_source.clone();
                    let session = room_code.clone();
                    tokio::spawn(async move {
                        let track = source.get_random_track(&session, genre.as_deref()).await;
                        let _ = sender.send(RoomCommand::TrackFetched { generation, track }).await;
                    });
                }
                Outbound::RecordStats(update) => {
                    let sink = stats_sink.clone();
                    tokio::spawn(async move { sink.record_game(update).await });
                }
                Outbound::ResetTrackDedup => {
                    let source = track_source.clone();
                    let session = room_code.clone();
                    tokio::spawn(async move { source.reset_session_state(&session).await });
                }
                Outbound::RoomClosed => {
                    outbound.room_closed(&room_code).await;
                    rate_limiter.clear_room(&room_code);
                    closed = true;
                }
            }
        }
        if closed {
            debug!("room actor shutting down");
            break;
        }
    }
}
