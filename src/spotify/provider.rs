use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use rspotify::{
    model::{
        ArtistId, Country, Market, PlayableId, PlaylistId, SearchResult, SearchType, TimeRange,
        TrackId, UserId,
    },
    prelude::*,
    AuthCodeSpotify, ClientCredsSpotify, Config as SpotifyConfig, Credentials, OAuth, Token,
};
use tracing::{debug, info};

use super::{ArtistSummary, Connector, CreatedPlaylist, Provider, Track};
use crate::config::Config;
use crate::spotify::auth::oauth_for;

/// Market used for artist top tracks when there is no user to infer it from.
const PUBLIC_MARKET: Market = Market::Country(Country::UnitedStates);

pub enum SpotifyProvider {
    Public(ClientCredsSpotify),
    User(AuthCodeSpotify),
}

/// Runs `$body` against whichever client backs the provider.
macro_rules! with_client {
    ($provider:expr, |$sp:ident| $body:expr) => {
        match $provider {
            SpotifyProvider::Public($sp) => $body,
            SpotifyProvider::User($sp) => $body,
        }
    };
}

impl SpotifyProvider {
    fn user(&self) -> Result<&AuthCodeSpotify> {
        match self {
            SpotifyProvider::User(sp) => Ok(sp),
            SpotifyProvider::Public(_) => Err(anyhow!(
                "operation requires a user-authenticated Spotify client"
            )),
        }
    }
}

#[async_trait]
impl Provider for SpotifyProvider {
    async fn search_tracks_by_genre(&self, genre: &str, limit: u32) -> Result<Vec<Track>> {
        let query = format!("genre:\"{genre}\"");
        debug!(%query, limit, "searching tracks");
        let result = with_client!(self, |sp| {
            sp.search(&query, SearchType::Track, None, None, Some(limit), None)
                .await?
        });

        let tracks = match result {
            SearchResult::Tracks(page) => page.items.iter().map(Track::from).collect(),
            _ => vec![],
        };
        Ok(tracks)
    }

    async fn artist_top_tracks(&self, artist_id: &str) -> Result<Vec<Track>> {
        let id = ArtistId::from_id(artist_id)?;
        let tracks = match self {
            SpotifyProvider::Public(sp) => sp.artist_top_tracks(id, Some(PUBLIC_MARKET)).await?,
            SpotifyProvider::User(sp) => sp.artist_top_tracks(id, Some(Market::FromToken)).await?,
        };
        Ok(tracks.iter().map(Track::from).collect())
    }

    async fn track(&self, track_id: &str) -> Result<Track> {
        let id = TrackId::from_id(track_id)?;
        let track = with_client!(self, |sp| sp.track(id, None).await?);
        Ok(Track::from(&track))
    }

    async fn current_user_top_artists(
        &self,
        limit: u32,
        time_range: TimeRange,
    ) -> Result<Vec<ArtistSummary>> {
        let page = self
            .user()?
            .current_user_top_artists_manual(Some(time_range), Some(limit), None)
            .await?;
        Ok(page
            .items
            .into_iter()
            .map(|artist| ArtistSummary {
                id: artist.id.id().to_string(),
                name: artist.name,
                genres: artist.genres,
            })
            .collect())
    }

    async fn current_user_top_tracks(
        &self,
        limit: u32,
        time_range: TimeRange,
    ) -> Result<Vec<Track>> {
        let page = self
            .user()?
            .current_user_top_tracks_manual(Some(time_range), Some(limit), None)
            .await?;
        Ok(page.items.iter().map(Track::from).collect())
    }

    async fn current_user_id(&self) -> Result<String> {
        let me = self.user()?.current_user().await?;
        Ok(me.id.id().to_string())
    }

    async fn create_playlist(
        &self,
        user_id: &str,
        name: &str,
        public: bool,
        description: &str,
    ) -> Result<CreatedPlaylist> {
        let user = UserId::from_id(user_id)?;
        let playlist = self
            .user()?
            .user_playlist_create(user, name, Some(public), Some(false), Some(description))
            .await?;
        Ok(CreatedPlaylist {
            id: playlist.id.id().to_string(),
            url: playlist
                .external_urls
                .get("spotify")
                .cloned()
                .unwrap_or_default(),
        })
    }

    async fn add_items_to_playlist(&self, playlist_id: &str, uris: &[String]) -> Result<()> {
        let playlist = PlaylistId::from_id(playlist_id)?;
        let items = uris
            .iter()
            .map(|uri| TrackId::from_uri(uri).map(|id| PlayableId::Track(id.into_static())))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        self.user()?
            .playlist_add_items(playlist, items, None)
            .await?;
        Ok(())
    }

    async fn current_token(&self) -> Option<Token> {
        self.user().ok()?.token.lock().await.ok()?.clone()
    }
}

pub struct SpotifyConnector {
    creds: Credentials,
    oauth: OAuth,
}

impl SpotifyConnector {
    pub fn new(config: &Config) -> Self {
        SpotifyConnector {
            creds: Credentials::new(&config.client_id, &config.client_secret),
            oauth: oauth_for(config),
        }
    }

    fn auth_code_client(&self, oauth: OAuth) -> AuthCodeSpotify {
        AuthCodeSpotify::new(self.creds.clone(), oauth)
    }
}

#[async_trait]
impl Connector for SpotifyConnector {
    async fn public(&self) -> Result<Box<dyn Provider>> {
        let spotify = ClientCredsSpotify::new(self.creds.clone());
        spotify
            .request_token()
            .await
            .context("client credentials token request failed")?;
        Ok(Box::new(SpotifyProvider::Public(spotify)))
    }

    async fn for_user(&self, token: Token) -> Result<Box<dyn Provider>> {
        if token.access_token.is_empty() {
            return Err(anyhow!("stored token has no access token"));
        }
        let sp_config = SpotifyConfig {
            token_refreshing: true,
            ..Default::default()
        };
        let spotify = AuthCodeSpotify::from_token_with_config(
            token,
            self.creds.clone(),
            self.oauth.clone(),
            sp_config,
        );
        Ok(Box::new(SpotifyProvider::User(spotify)))
    }

    fn authorize_url(&self, state: &str) -> Result<String> {
        let mut oauth = self.oauth.clone();
        oauth.state = state.to_string();
        let url = self.auth_code_client(oauth).get_authorize_url(false)?;
        Ok(url)
    }

    async fn exchange_code(&self, code: &str) -> Result<Token> {
        let spotify = self.auth_code_client(self.oauth.clone());
        spotify
            .request_token(code)
            .await
            .context("authorization code exchange failed")?;

        let token = spotify
            .token
            .lock()
            .await
            .map_err(|_| anyhow!("Spotify token lock poisoned"))?
            .clone()
            .context("Spotify returned no token")?;
        info!("Exchanged authorization code for user token");
        Ok(token)
    }
}
