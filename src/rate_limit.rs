//! Sliding-window rate limiting, per §4.3. Two independent tables, both
//! swept every 60s by the caller (the Connection Hub owns the sweep timer).

use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::protocol::ClientId;

pub const MAX_ANSWER_ATTEMPTS_PER_ROUND: u32 = 50;

pub const CHAT_WINDOW: (u32, Duration) = (3, Duration::from_secs(1));
pub const EMOTE_WINDOW: (u32, Duration) = (5, Duration::from_secs(10));

#[derive(Debug, Clone, Copy)]
struct Window {
    first_request_at: Instant,
    count: u32,
}

/// Tracks request bursts per `(client, event name)` and per-round answer
/// attempt counts. Safe to share across rooms behind an `Arc` — every
/// operation is independently locked per-key via `dashmap`.
pub struct RateLimiter {
    windows: DashMap<(ClientId, &'static str), Window>,
    round_attempts: DashMap<(ClientId, String, u32), u32>,
}

impl RateLimiter {
    pub fn new() -> Self {
        RateLimiter {
            windows: DashMap::new(),
            round_attempts: DashMap::new(),
        }
    }

    /// Returns `true` if this request should be rejected as too frequent.
    pub fn check_window(&self, client: ClientId, event: &'static str, limit: u32, window: Duration) -> bool {
        let now = Instant::now();
        let mut entry = self.windows.entry((client, event)).or_insert(Window {
            first_request_at: now,
            count: 0,
        });

        if now.duration_since(entry.first_request_at) > window {
            entry.first_request_at = now;
            entry.count = 1;
            return false;
        }

        entry.count += 1;
        entry.count > limit
    }

    pub fn check_chat(&self, client: ClientId) -> bool {
        self.check_window(client, "chat", CHAT_WINDOW.0, CHAT_WINDOW.1)
    }

    pub fn check_emote(&self, client: ClientId) -> bool {
        self.check_window(client, "emote", EMOTE_WINDOW.0, EMOTE_WINDOW.1)
    }

    /// Increments and returns the new attempt count for `(client, room,
    /// round)`. Callers compare against `MAX_ANSWER_ATTEMPTS_PER_ROUND`.
    pub fn record_answer_attempt(&self, client: ClientId, room_code: &str, round: u32) -> u32 {
        let mut entry = self
            .round_attempts
            .entry((client, room_code.to_string(), round))
            .or_insert(0);
        *entry += 1;
        *entry
    }

    pub fn answer_attempts_exceeded(&self, client: ClientId, room_code: &str, round: u32) -> bool {
        self.record_answer_attempt(client, room_code, round) > MAX_ANSWER_ATTEMPTS_PER_ROUND
    }

    /// Drop stale entries. Called on a 60s tick by the hub; windows are
    /// tiny (≤10s) so anything older than a minute is safely dead.
    pub fn sweep(&self) {
        let now = Instant::now();
        let stale_window = Duration::from_secs(60);
        self.windows
            .retain(|_, w| now.duration_since(w.first_request_at) <= stale_window);
    }

    /// Drop per-round attempt counters for a room once it is torn down.
    pub fn clear_room(&self, room_code: &str) {
        self.round_attempts.retain(|(_, code, _), _| code != room_code);
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn client() -> ClientId {
        ClientId::new()
    }

    #[test]
    fn allows_up_to_the_limit_then_rejects() {
        let limiter = RateLimiter::new();
        let c = client();
        assert!(!limiter.check_chat(c));
        assert!(!limiter.check_chat(c));
        assert!(!limiter.check_chat(c));
        assert!(limiter.check_chat(c));
    }

    #[test]
    fn window_resets_after_expiry() {
        let limiter = RateLimiter::new();
        let c = client();
        assert!(!limiter.check_window(c, "test", 1, Duration::from_millis(10)));
        assert!(limiter.check_window(c, "test", 1, Duration::from_millis(10)));
        std::thread::sleep(Duration::from_millis(20));
        assert!(!limiter.check_window(c, "test", 1, Duration::from_millis(10)));
    }

    #[test]
    fn answer_attempts_are_scoped_per_round() {
        let limiter = RateLimiter::new();
        let c = client();
        for _ in 0..MAX_ANSWER_ATTEMPTS_PER_ROUND {
            assert!(!limiter.answer_attempts_exceeded(c, "ROOM", 1));
        }
        assert!(limiter.answer_attempts_exceeded(c, "ROOM", 1));
        // A new round resets the counter.
        assert!(!limiter.answer_attempts_exceeded(c, "ROOM", 2));
    }

    #[test]
    fn clear_room_drops_only_that_rooms_counters() {
        let limiter = RateLimiter::new();
        let c = client();
        limiter.record_answer_attempt(c, "ROOM-A", 1);
        limiter.record_answer_attempt(c, "ROOM-B", 1);
        limiter.clear_room("ROOM-A");
        assert_eq!(limiter.record_answer_attempt(c, "ROOM-A", 1), 1);
        assert_eq!(limiter.record_answer_attempt(c, "ROOM-B", 1), 2);
    }
}
