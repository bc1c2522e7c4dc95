use async_trait::async_trait;
use rand::seq::SliceRandom;

use super::{is_popular_artist_for_genre, RecentTracks, Track, TrackSource};
use crate::fuzzy::similarity;

/// Curated catalog used both as the always-available fallback and directly
/// in tests. Each entry carries a genre tag as a coarse bucket; within a
/// bucket, `bias_toward_popular_artists` narrows further per §4.4(b).
fn catalog() -> &'static [(&'static str, &'static str, &'static str, i32, &'static str)] {
    // (id, title, artist, release_year, genre)
    &[
        ("mock-001", "Billie Jean", "Michael Jackson", 1982, "pop"),
        ("mock-002", "Like a Prayer", "Madonna", 1989, "pop"),
        ("mock-003", "Starboy", "The Weeknd", 2016, "pop"),
        ("mock-004", "Blinding Lights", "The Weeknd", 2019, "pop"),
        ("mock-005", "Smells Like Teen Spirit", "Nirvana", 1991, "rock"),
        ("mock-006", "Bohemian Rhapsody", "Queen", 1975, "rock"),
        ("mock-007", "Back in Black", "AC/DC", 1980, "rock"),
        ("mock-008", "Juicy", "The Notorious B.I.G.", 1994, "hip-hop"),
        ("mock-009", "Lose Yourself", "Eminem", 2002, "hip-hop"),
        ("mock-010", "HUMBLE.", "Kendrick Lamar", 2017, "hip-hop"),
        ("mock-011", "One More Time", "Daft Punk", 2000, "electronic"),
        ("mock-012", "Strobe", "Deadmau5", 2009, "electronic"),
        ("mock-013", "Take Five", "Dave Brubeck", 1959, "jazz"),
        ("mock-014", "So What", "Miles Davis", 1959, "jazz"),
        (
            "mock-015",
            "The Good, the Bad and the Ugly",
            "Ennio Morricone",
            1966,
            "soundtrack",
        ),
        ("mock-016", "Duel of the Fates", "John Williams", 1999, "soundtrack"),
    ]
}

/// Narrows `candidates` to those whose artist is ≥ 0.8 similar to a
/// curated popular name for `genre`. Falls back to the unfiltered
/// `candidates` when the genre has no curated list, or when the bias
/// would empty the pool — the bias never starves a genre of results.
fn bias_toward_popular_artists<'a>(
    candidates: Vec<&'a (&'static str, &'static str, &'static str, i32, &'static str)>,
    genre: &str,
) -> Vec<&'a (&'static str, &'static str, &'static str, i32, &'static str)> {
    let biased: Vec<_> = candidates
        .iter()
        .filter(|(_, _, artist, _, _)| is_popular_artist_for_genre(artist, genre))
        .copied()
        .collect();
    if biased.is_empty() { candidates } else { biased }
}

fn candidates_for_genre(genre: Option<&str>) -> Vec<&'static (&'static str, &'static str, &'static str, i32, &'static str)> {
    let Some(wanted) = genre else {
        return catalog().iter().collect();
    };
    let by_bucket: Vec<_> = catalog()
        .iter()
        .filter(|(_, _, _, _, g)| similarity(&g.to_lowercase(), &wanted.to_lowercase()) >= 0.8)
        .collect();
    let by_bucket = if by_bucket.is_empty() { catalog().iter().collect() } else { by_bucket };
    bias_toward_popular_artists(by_bucket, wanted)
}

/// Always-available curated fallback. Used both as the built-in source
/// when no HTTP endpoint is configured and as the Room Manager's
/// degrade-to target when the configured source returns `None`.
pub struct MockTrackSource {
    recent: RecentTracks,
}

impl MockTrackSource {
    pub fn new() -> Self {
        MockTrackSource {
            recent: RecentTracks::new(),
        }
    }
}

impl Default for MockTrackSource {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTrackSource {
    /// Synchronous, dedup-free pick from the built-in catalog. Used by the
    /// Room Manager as the degrade target when a configured `TrackSource`
    /// returns `None` — no session state to thread through for a one-off
    /// fallback.
    pub fn fallback_track(genre: Option<&str>) -> Track {
        let pool = candidates_for_genre(genre);
        let chosen = pool.choose(&mut rand::thread_rng()).expect("catalog is never empty");
        Track {
            id: chosen.0.to_string(),
            title: chosen.1.to_string(),
            artist: chosen.2.to_string(),
            preview_url: None,
            album_cover: None,
            release_year: chosen.3,
        }
    }
}

#[async_trait]
impl TrackSource for MockTrackSource {
    async fn get_random_track(&self, session_id: &str, genre: Option<&str>) -> Option<Track> {
        let candidates = candidates_for_genre(genre);

        let mut unseen: Vec<_> = Vec::with_capacity(candidates.len());
        for entry in &candidates {
            if !self.recent.contains(session_id, entry.0).await {
                unseen.push(*entry);
            }
        }
        let pool = if unseen.is_empty() { candidates } else { unseen };

        let chosen = pool.choose(&mut rand::thread_rng())?;
        self.recent.record(session_id, chosen.0.to_string()).await;

        Some(Track {
            id: chosen.0.to_string(),
            title: chosen.1.to_string(),
            artist: chosen.2.to_string(),
            preview_url: None,
            album_cover: None,
            release_year: chosen.3,
        })
    }

    async fn reset_session_state(&self, session_id: &str) {
        self.recent.clear(session_id).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn returns_a_track_for_unknown_genre() {
        let source = MockTrackSource::new();
        let track = source.get_random_track("room-1", Some("nonexistent-genre")).await;
        assert!(track.is_some());
    }

    #[tokio::test]
    async fn reset_clears_dedup_so_tracks_can_repeat() {
        let source = MockTrackSource::new();
        let first = source.get_random_track("room-1", None).await.unwrap();
        source.reset_session_state("room-1").await;
        assert!(!source.recent.contains("room-1", &first.id).await);
    }

    #[tokio::test]
    async fn reset_is_scoped_to_its_own_session() {
        let source = MockTrackSource::new();
        let first = source.get_random_track("room-1", None).await.unwrap();
        source.reset_session_state("room-2").await;
        assert!(source.recent.contains("room-1", &first.id).await, "room-1's dedup survives room-2's reset");
    }

    #[tokio::test]
    async fn genre_filter_matches_case_insensitively() {
        let source = MockTrackSource::new();
        let track = source.get_random_track("room-1", Some("JAZZ")).await.unwrap();
        assert!(catalog()
            .iter()
            .any(|(id, _, _, _, genre)| *id == track.id && *genre == "jazz"));
    }

    #[test]
    fn popular_artist_bias_narrows_within_a_bucket() {
        let jazz: Vec<_> = catalog().iter().filter(|(_, _, _, _, g)| *g == "jazz").collect();
        let biased = bias_toward_popular_artists(jazz.clone(), "jazz");
        assert_eq!(biased.len(), jazz.len(), "every curated jazz entry is already a popular name");
    }

    #[test]
    fn popular_artist_bias_falls_back_when_nothing_matches() {
        let rock: Vec<_> = catalog().iter().filter(|(_, _, _, _, g)| *g == "rock").collect();
        let biased = bias_toward_popular_artists(rock.clone(), "unmapped-genre");
        assert_eq!(biased.len(), rock.len());
    }
}
