use anyhow::{anyhow, Result};
use rand::{seq::SliceRandom, Rng};
use std::collections::{HashMap, HashSet};
use tracing::{error, info};

use crate::emotion::Emotion;
use crate::error::{RecError, RecResult};
use crate::spotify::{Provider, Track};

pub const PLAYLIST_CAP: usize = 20;
const MAX_TRACKS_PER_ARTIST: usize = 3;

#[derive(Debug, Clone)]
pub struct Playlist {
    pub name: String,
    pub id: String,
    pub url: String,
    pub tracks: Vec<Track>,
}

/// Keeps the first three tracks of each artist, in input order.
pub fn balance_by_artist(candidates: &[Track]) -> Vec<Track> {
    let mut per_artist: HashMap<&str, usize> = HashMap::new();
    let mut balanced = Vec::new();
    for track in candidates {
        let count = per_artist.entry(track.artist.as_str()).or_insert(0);
        if *count < MAX_TRACKS_PER_ARTIST {
            *count += 1;
            balanced.push(track.clone());
        }
    }
    balanced
}

/// Balance, shuffle with `rng`, then emit at most one track per artist up to `cap`.
pub fn assemble<R: Rng + ?Sized>(candidates: &[Track], cap: usize, rng: &mut R) -> Vec<Track> {
    let mut balanced = balance_by_artist(candidates);
    balanced.shuffle(rng);

    let mut seen_artists = HashSet::new();
    let mut picked = Vec::new();
    for track in balanced {
        if picked.len() >= cap {
            break;
        }
        if seen_artists.insert(track.artist.clone()) {
            picked.push(track);
        }
    }
    picked
}

pub fn playlist_name(emotion: Emotion) -> String {
    format!("{} Vibes", emotion.title())
}

/// Creates the private playlist on the listener's account and fills it.
pub struct PlaylistPublisher<'a> {
    provider: &'a dyn Provider,
}

impl<'a> PlaylistPublisher<'a> {
    pub fn new(provider: &'a dyn Provider) -> Self {
        PlaylistPublisher { provider }
    }

    pub async fn publish(&self, emotion: Emotion, tracks: Vec<Track>) -> RecResult<Playlist> {
        match self.try_publish(emotion, tracks).await {
            Ok(playlist) => {
                info!(
                    name = %playlist.name,
                    id = %playlist.id,
                    tracks = playlist.tracks.len(),
                    "Playlist created"
                );
                Ok(playlist)
            }
            Err(e) => {
                error!("Error creating {emotion} playlist: {e:#}");
                Err(RecError::PlaylistCreation)
            }
        }
    }

    async fn try_publish(&self, emotion: Emotion, tracks: Vec<Track>) -> Result<Playlist> {
        if tracks.is_empty() {
            return Err(anyhow!("no tracks to add"));
        }

        let name = playlist_name(emotion);
        let description = format!("Songs picked for a {emotion} mood");
        let uris: Vec<String> = tracks.iter().map(Track::playable_uri).collect();

        let user_id = self.provider.current_user_id().await?;
        let created = self
            .provider
            .create_playlist(&user_id, &name, false, &description)
            .await?;
        self.provider
            .add_items_to_playlist(&created.id, &uris)
            .await?;

        Ok(Playlist {
            name,
            id: created.id,
            url: created.url,
            tracks,
        })
    }
}
