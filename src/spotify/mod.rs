use anyhow::Result;
use async_trait::async_trait;
use rspotify::{
    model::{FullTrack, TimeRange},
    prelude::*,
    Token,
};
use serde::Serialize;

pub mod auth;
pub mod provider;

pub use provider::SpotifyConnector;

pub const TRACK_URL_PREFIX: &str = "https://open.spotify.com/track/";
pub const TRACK_URI_PREFIX: &str = "spotify:track:";

/// A catalog track reshaped into what the API hands out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Track {
    pub title: String,
    /// Comma-joined names when there are co-artists.
    pub artist: String,
    pub url: String,
    #[serde(skip)]
    pub provider_id: String,
}

impl Track {
    /// `https://open.spotify.com/track/{id}` -> `spotify:track:{id}`, nothing else touched.
    pub fn playable_uri(&self) -> String {
        self.url.replacen(TRACK_URL_PREFIX, TRACK_URI_PREFIX, 1)
    }
}

impl From<&FullTrack> for Track {
    fn from(track: &FullTrack) -> Self {
        Track {
            title: track.name.clone(),
            artist: track
                .artists
                .iter()
                .map(|a| a.name.clone())
                .collect::<Vec<_>>()
                .join(", "),
            url: track
                .external_urls
                .get("spotify")
                .cloned()
                .unwrap_or_default(),
            provider_id: track
                .id
                .as_ref()
                .map(|id| id.id().to_string())
                .unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtistSummary {
    pub id: String,
    pub name: String,
    pub genres: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedPlaylist {
    pub id: String,
    pub url: String,
}

/// The slice of the Spotify Web API the recommender consumes.
#[async_trait]
pub trait Provider: Send + Sync {
    async fn search_tracks_by_genre(&self, genre: &str, limit: u32) -> Result<Vec<Track>>;

    async fn artist_top_tracks(&self, artist_id: &str) -> Result<Vec<Track>>;

    async fn track(&self, track_id: &str) -> Result<Track>;

    async fn current_user_top_artists(
        &self,
        limit: u32,
        time_range: TimeRange,
    ) -> Result<Vec<ArtistSummary>>;

    async fn current_user_top_tracks(&self, limit: u32, time_range: TimeRange)
        -> Result<Vec<Track>>;

    async fn current_user_id(&self) -> Result<String>;

    async fn create_playlist(
        &self,
        user_id: &str,
        name: &str,
        public: bool,
        description: &str,
    ) -> Result<CreatedPlaylist>;

    async fn add_items_to_playlist(&self, playlist_id: &str, uris: &[String]) -> Result<()>;

    /// The token the client holds right now. It differs from the one the
    /// client was built with once an expired token has been refreshed.
    async fn current_token(&self) -> Option<Token> {
        None
    }
}

/// Builds providers and drives the authorization-code flow.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Client-credentials mode, no personalization.
    async fn public(&self) -> Result<Box<dyn Provider>>;

    async fn for_user(&self, token: Token) -> Result<Box<dyn Provider>>;

    fn authorize_url(&self, state: &str) -> Result<String>;

    async fn exchange_code(&self, code: &str) -> Result<Token>;
}
