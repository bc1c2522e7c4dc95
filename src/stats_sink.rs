//! Fire-and-forget persistence of authenticated players' end-of-game
//! stats. The real store (a Prisma-equivalent database) is out of scope;
//! this is the write-only port the Room Manager calls into.

use async_trait::async_trait;

#[derive(Debug, Clone)]
pub struct StatsUpdate {
    pub user_id: String,
    pub games_played_delta: u32,
    pub games_won_delta: u32,
    pub total_score_delta: i64,
    pub best_score: i64,
    pub best_streak: u32,
}

#[async_trait]
pub trait StatsSink: Send + Sync {
    async fn record_game(&self, update: StatsUpdate);
}

/// Default when no persistence backend is configured. Every real call site
/// routes through here in this crate's current scope (§1 lists the actual
/// store as an external collaborator).
pub struct NoopStatsSink;

#[async_trait]
impl StatsSink for NoopStatsSink {
    async fn record_game(&self, _update: StatsUpdate) {}
}

/// Logs what would have been persisted, at `info` level. Useful for
/// running the server standalone without wiring a real store.
pub struct LoggingStatsSink;

#[async_trait]
impl StatsSink for LoggingStatsSink {
    async fn record_game(&self, update: StatsUpdate) {
        tracing::info!(
            user_id = %update.user_id,
            games_played_delta = update.games_played_delta,
            games_won_delta = update.games_won_delta,
            total_score_delta = update.total_score_delta,
            best_score = update.best_score,
            best_streak = update.best_streak,
            "recording end-of-game stats"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn noop_sink_accepts_any_update() {
        let sink = NoopStatsSink;
        sink.record_game(StatsUpdate {
            user_id: "u1".into(),
            games_played_delta: 1,
            games_won_delta: 1,
            total_score_delta: 1000,
            best_score: 1000,
            best_streak: 3,
        })
        .await;
    }
}
