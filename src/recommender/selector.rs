use anyhow::Result;
use rspotify::model::TimeRange;
use std::collections::HashSet;
use tracing::{debug, error};

use crate::emotion::Emotion;
use crate::error::{RecError, RecResult};
use crate::spotify::{ArtistSummary, Provider, Track};

/// Candidate cap for plain recommendations.
pub const RECOMMENDATION_CAP: usize = 10;
/// Candidate cap when the list feeds playlist assembly.
pub const PLAYLIST_CANDIDATE_CAP: usize = 30;

const PROFILE_FETCH_LIMIT: u32 = 10;
const MAX_PERSONAL_ARTISTS: usize = 5;
const TRACKS_PER_ARTIST: usize = 5;
const MAX_GENRES: usize = 5;
const GENRE_SEARCH_BATCH: u32 = 10;
const MAX_SEED_TRACKS: usize = 5;

/// Looked up when the listener has no top tracks of their own.
pub const FALLBACK_TRACK_ID: &str = "4uLU6hMCjMI75M1A2tKUQC";

/// Personalization signals pulled from the listener's history.
#[derive(Debug, Clone, Default)]
pub struct UserProfile {
    pub top_artists: Vec<ArtistSummary>,
    pub top_track_ids: Vec<String>,
    pub top_genres: HashSet<String>,
}

impl UserProfile {
    pub fn new(top_artists: Vec<ArtistSummary>, top_track_ids: Vec<String>) -> Self {
        let top_genres = top_artists
            .iter()
            .flat_map(|artist| artist.genres.iter().map(|g| g.to_lowercase()))
            .collect();
        UserProfile {
            top_artists,
            top_track_ids,
            top_genres,
        }
    }

    pub async fn fetch(provider: &dyn Provider) -> Result<Self> {
        let top_artists = provider
            .current_user_top_artists(PROFILE_FETCH_LIMIT, TimeRange::MediumTerm)
            .await?;
        let top_track_ids = provider
            .current_user_top_tracks(PROFILE_FETCH_LIMIT, TimeRange::MediumTerm)
            .await?
            .into_iter()
            .map(|track| track.provider_id)
            .filter(|id| !id.is_empty())
            .collect();
        Ok(UserProfile::new(top_artists, top_track_ids))
    }

    /// The emotion's genres the listener also plays, in the emotion's priority order.
    pub fn matched_genres(&self, emotion: Emotion) -> Vec<&'static str> {
        emotion
            .genres()
            .iter()
            .copied()
            .filter(|genre| self.top_genres.contains(*genre))
            .collect()
    }

    /// Top artists with at least one genre in the emotion's list.
    fn mood_artists(&self, emotion: Emotion) -> impl Iterator<Item = &ArtistSummary> {
        let mood = emotion.genres();
        self.top_artists.iter().filter(move |artist| {
            artist
                .genres
                .iter()
                .any(|g| mood.contains(&g.to_lowercase().as_str()))
        })
    }
}

/// Builds the candidate list for an emotion, one tier at a time: the listener's
/// own artists, then genre search, then direct track lookups.
pub struct Selector<'a> {
    provider: &'a dyn Provider,
    cap: usize,
}

impl<'a> Selector<'a> {
    pub fn new(provider: &'a dyn Provider, cap: usize) -> Self {
        Selector { provider, cap }
    }

    /// Any provider failure discards everything gathered so far.
    pub async fn select(
        &self,
        emotion: Emotion,
        profile: Option<&UserProfile>,
    ) -> RecResult<Vec<Track>> {
        match self.collect(emotion, profile).await {
            Ok(mut candidates) => {
                candidates.truncate(self.cap);
                Ok(candidates)
            }
            Err(e) => {
                error!("Error getting recommended songs for {emotion}: {e:#}");
                Err(RecError::ProviderRequest)
            }
        }
    }

    async fn collect(&self, emotion: Emotion, profile: Option<&UserProfile>) -> Result<Vec<Track>> {
        let mut candidates = Vec::new();

        let matched_genres = profile
            .map(|p| p.matched_genres(emotion))
            .unwrap_or_default();

        if let Some(profile) = profile {
            self.personal_artist_tier(emotion, profile, &mut candidates)
                .await?;
        }

        if candidates.len() < self.cap {
            let genres: Vec<&str> = if matched_genres.is_empty() {
                emotion.genres().to_vec()
            } else {
                matched_genres
            };
            self.genre_tier(&genres, &mut candidates).await?;
        }

        if candidates.len() < self.cap {
            self.track_lookup_tier(profile, &mut candidates).await?;
        }

        Ok(candidates)
    }

    async fn personal_artist_tier(
        &self,
        emotion: Emotion,
        profile: &UserProfile,
        candidates: &mut Vec<Track>,
    ) -> Result<()> {
        for artist in profile.mood_artists(emotion).take(MAX_PERSONAL_ARTISTS) {
            if candidates.len() >= self.cap {
                break;
            }
            debug!(artist = %artist.name, "fetching top tracks");
            let tracks = self.provider.artist_top_tracks(&artist.id).await?;
            candidates.extend(tracks.into_iter().take(TRACKS_PER_ARTIST));
        }
        Ok(())
    }

    async fn genre_tier(&self, genres: &[&str], candidates: &mut Vec<Track>) -> Result<()> {
        for genre in genres.iter().take(MAX_GENRES) {
            if candidates.len() >= self.cap {
                break;
            }
            let tracks = self
                .provider
                .search_tracks_by_genre(genre, GENRE_SEARCH_BATCH)
                .await?;
            debug!(genre = %genre, found = tracks.len(), "genre search");
            candidates.extend(tracks);
        }
        Ok(())
    }

    async fn track_lookup_tier(
        &self,
        profile: Option<&UserProfile>,
        candidates: &mut Vec<Track>,
    ) -> Result<()> {
        let seeds: Vec<&str> = match profile {
            Some(p) if !p.top_track_ids.is_empty() => p
                .top_track_ids
                .iter()
                .take(MAX_SEED_TRACKS)
                .map(String::as_str)
                .collect(),
            _ => vec![FALLBACK_TRACK_ID],
        };

        for id in seeds {
            candidates.push(self.provider.track(id).await?);
        }
        Ok(())
    }
}
