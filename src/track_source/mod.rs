//! Abstract random-track fetch by genre, with per-session dedup. See §4.4.

mod http;
mod mock;

use std::collections::VecDeque;

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

pub use http::HttpTrackSource;
pub use mock::MockTrackSource;

/// Bound on each session's recently-seen LRU. A miss under race is
/// tolerable (§5 shared-resource policy); it is not a correctness property.
const RECENT_TRACKS_CAPACITY: usize = 500;

pub(crate) const ARTIST_BIAS_THRESHOLD: f64 = 0.8;

/// Per-genre curated popular-artist names, checked by fuzzy similarity
/// against a candidate's artist field (§4.4(b)). Shared by both
/// `TrackSource` implementations. Genre-only, no decade split — see
/// DESIGN.md.
pub(crate) const POPULAR_ARTISTS_BY_GENRE: &[(&str, &[&str])] = &[
    ("pop", &["Michael Jackson", "Madonna", "The Weeknd", "Taylor Swift", "Beyoncé"]),
    ("rock", &["Queen", "Nirvana", "AC/DC", "Led Zeppelin", "The Beatles"]),
    ("hip-hop", &["Eminem", "Kendrick Lamar", "The Notorious B.I.G.", "Jay-Z", "Drake"]),
    ("electronic", &["Daft Punk", "Deadmau5", "Kraftwerk", "Skrillex"]),
    ("jazz", &["Miles Davis", "Dave Brubeck", "John Coltrane", "Duke Ellington"]),
    ("soundtrack", &["John Williams", "Ennio Morricone", "Hans Zimmer", "Howard Shore"]),
];

/// Whether `artist` is a ≥ 0.8 fuzzy match for a curated popular name under
/// `genre`. Returns `true` (don't filter out) when `genre` has no curated
/// list — the bias only narrows genres it actually knows about.
pub(crate) fn is_popular_artist_for_genre(artist: &str, genre: &str) -> bool {
    use crate::fuzzy::similarity;
    let Some((_, popular)) = POPULAR_ARTISTS_BY_GENRE
        .iter()
        .find(|(g, _)| similarity(&g.to_lowercase(), &genre.to_lowercase()) >= ARTIST_BIAS_THRESHOLD)
    else {
        return true;
    };
    popular
        .iter()
        .any(|name| similarity(&name.to_lowercase(), &artist.to_lowercase()) >= ARTIST_BIAS_THRESHOLD)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Track {
    pub id: String,
    pub title: String,
    pub artist: String,
    pub preview_url: Option<String>,
    pub album_cover: Option<String>,
    pub release_year: i32,
}

#[async_trait]
pub trait TrackSource: Send + Sync {
    /// `session_id` namespaces the dedup set — the Room Manager passes its
    /// room code, since one `TrackSource` is shared process-wide across
    /// every concurrent room.
    async fn get_random_track(&self, session_id: &str, genre: Option<&str>) -> Option<Track>;

    /// Clears `session_id`'s dedup state. Called at game start and on
    /// `return_to_lobby`.
    async fn reset_session_state(&self, session_id: &str);
}

/// Recently-seen track ids, namespaced per session (room code) so one
/// room's dedup reset can't affect another's, even though both concrete
/// `TrackSource` implementations are shared by the whole process. Shared
/// by both implementations so dedup behavior (and its eviction policy) is
/// identical whichever one is backing a room.
#[derive(Default)]
pub(crate) struct RecentTracks {
    sessions: DashMap<String, VecDeque<String>>,
}

impl RecentTracks {
    pub(crate) fn new() -> Self {
        RecentTracks { sessions: DashMap::new() }
    }

    pub(crate) async fn contains(&self, session_id: &str, id: &str) -> bool {
        self.sessions
            .get(session_id)
            .is_some_and(|order| order.iter().any(|seen| seen == id))
    }

    pub(crate) async fn record(&self, session_id: &str, id: String) {
        let mut order = self.sessions.entry(session_id.to_string()).or_default();
        if order.len() >= RECENT_TRACKS_CAPACITY {
            order.pop_front();
        }
        order.push_back(id);
    }

    pub(crate) async fn clear(&self, session_id: &str) {
        if let Some(mut order) = self.sessions.get_mut(session_id) {
            order.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn recent_tracks_evicts_oldest_past_capacity() {
        let recent = RecentTracks::new();
        for i in 0..(RECENT_TRACKS_CAPACITY + 10) {
            recent.record("room-1", format!("track-{i}")).await;
        }
        assert!(!recent.contains("room-1", "track-0").await);
        assert!(recent.contains("room-1", &format!("track-{}", RECENT_TRACKS_CAPACITY + 9)).await);
    }

    #[tokio::test]
    async fn clear_empties_recent_set() {
        let recent = RecentTracks::new();
        recent.record("room-1", "a".into()).await;
        recent.clear("room-1").await;
        assert!(!recent.contains("room-1", "a").await);
    }

    #[tokio::test]
    async fn sessions_are_isolated() {
        let recent = RecentTracks::new();
        recent.record("room-1", "a".into()).await;
        assert!(!recent.contains("room-2", "a").await);
    }
}
