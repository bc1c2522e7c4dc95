use async_trait::async_trait;
use serde::Deserialize;

use super::{is_popular_artist_for_genre, RecentTracks, Track, TrackSource};

/// Adapter over an external music-catalog HTTP API. Speaks to whatever base
/// URL is configured (`--track-source-url`); the upstream catalog's
/// contents are out of scope here, only the shape of the response.
pub struct HttpTrackSource {
    client: reqwest::Client,
    base_url: String,
    recent: RecentTracks,
}

#[derive(Debug, Deserialize)]
struct CatalogResponse {
    id: String,
    title: String,
    artist: String,
    preview_url: Option<String>,
    album_cover: Option<String>,
    release_year: i32,
}

impl HttpTrackSource {
    pub fn new(base_url: impl Into<String>) -> Self {
        HttpTrackSource {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            recent: RecentTracks::new(),
        }
    }

    async fn fetch_one(&self, genre: Option<&str>) -> color_eyre::Result<Option<Track>> {
        let mut request = self.client.get(format!("{}/tracks/random", self.base_url));
        if let Some(genre) = genre {
            request = request.query(&[("genre", genre)]);
        }
        let response = request.send().await?.error_for_status()?;
        let body: Option<CatalogResponse> = response.json().await?;
        Ok(body.map(|c| Track {
            id: c.id,
            title: c.title,
            artist: c.artist,
            preview_url: c.preview_url,
            album_cover: c.album_cover,
            release_year: c.release_year,
        }))
    }
}

#[async_trait]
impl TrackSource for HttpTrackSource {
    async fn get_random_track(&self, session_id: &str, genre: Option<&str>) -> Option<Track> {
        // Retry a handful of times against the session dedup set and, when a
        // genre is given, the curated popular-artist bias (§4.4(b)) — the
        // upstream API has no "exclude" or "popular" parameter, so both
        // filters are applied client-side to whatever it returns.
        for _ in 0..5 {
            match self.fetch_one(genre).await {
                Ok(Some(track)) => {
                    let biased_out = genre.is_some_and(|g| !is_popular_artist_for_genre(&track.artist, g));
                    if biased_out {
                        continue;
                    }
                    if !self.recent.contains(session_id, &track.id).await {
                        self.recent.record(session_id, track.id.clone()).await;
                        return Some(track);
                    }
                }
                Ok(None) => return None,
                Err(err) => {
                    tracing::warn!(error = %err, "track source request failed");
                    return None;
                }
            }
        }
        None
    }

    async fn reset_session_state(&self, session_id: &str) {
        self.recent.clear(session_id).await;
    }
}
