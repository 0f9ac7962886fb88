use rspotify::Token;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::cache::TokenStore;
use crate::emotion::Emotion;
use crate::error::{RecError, RecResult};
use crate::spotify::{Connector, Provider, Track};

pub mod assembler;
pub mod selector;

use self::assembler::{assemble, Playlist, PlaylistPublisher, PLAYLIST_CAP};
use self::selector::{Selector, UserProfile, PLAYLIST_CANDIDATE_CAP, RECOMMENDATION_CAP};

/// A listener's token, plus the session it is stored under when it came from
/// the token store.
#[derive(Debug, Clone)]
pub struct Listener {
    pub token: Token,
    pub session: Option<String>,
}

impl Listener {
    pub fn stored(session: &str, token: Token) -> Self {
        Listener {
            token,
            session: Some(session.to_string()),
        }
    }

    /// A token handed over directly, with nowhere to write a refresh back to.
    pub fn bare(token: Token) -> Self {
        Listener {
            token,
            session: None,
        }
    }
}

/// Runs selection and playlist assembly against a provider picked per request.
pub struct Recommender {
    connector: Arc<dyn Connector>,
    tokens: Arc<dyn TokenStore>,
}

impl Recommender {
    pub fn new(connector: Arc<dyn Connector>, tokens: Arc<dyn TokenStore>) -> Self {
        Recommender { connector, tokens }
    }

    /// A user client when the listener's token is usable, otherwise the public
    /// client. The listener is handed back only in the first case.
    async fn provider_for(
        &self,
        listener: Option<Listener>,
    ) -> RecResult<(Box<dyn Provider>, Option<Listener>)> {
        if let Some(listener) = listener {
            match self.connector.for_user(listener.token.clone()).await {
                Ok(provider) => return Ok((provider, Some(listener))),
                Err(e) => {
                    warn!("Spotify user authentication failed, falling back to public client: {e:#}");
                }
            }
        }

        match self.connector.public().await {
            Ok(provider) => Ok((provider, None)),
            Err(e) => {
                error!("Spotify client initialization failed: {e:#}");
                Err(RecError::ProviderRequest)
            }
        }
    }

    /// rspotify refreshes an expired token in place. The new one is written
    /// back so the next request does not refresh again.
    async fn persist_refreshed(&self, listener: &Listener, provider: &dyn Provider) {
        let Some(session) = listener.session.as_deref() else {
            return;
        };
        let Some(current) = provider.current_token().await else {
            return;
        };
        if current.access_token == listener.token.access_token {
            return;
        }
        match self.tokens.put(session, &current).await {
            Ok(()) => info!("Stored refreshed user token"),
            Err(e) => warn!("Failed to store refreshed user token: {e:#}"),
        }
    }

    pub async fn recommend(
        &self,
        emotion: Emotion,
        listener: Option<Listener>,
    ) -> RecResult<Vec<Track>> {
        let (provider, listener) = self.provider_for(listener).await?;
        info!(%emotion, authenticated = listener.is_some(), "Recommending songs");

        let result = self
            .select(provider.as_ref(), emotion, listener.is_some())
            .await;
        if let Some(listener) = &listener {
            self.persist_refreshed(listener, provider.as_ref()).await;
        }
        result
    }

    async fn select(
        &self,
        provider: &dyn Provider,
        emotion: Emotion,
        authenticated: bool,
    ) -> RecResult<Vec<Track>> {
        let profile = if authenticated {
            match UserProfile::fetch(provider).await {
                Ok(profile) => Some(profile),
                Err(e) => {
                    error!("Error fetching listening history: {e:#}");
                    return Err(RecError::ProviderRequest);
                }
            }
        } else {
            None
        };

        Selector::new(provider, RECOMMENDATION_CAP)
            .select(emotion, profile.as_ref())
            .await
    }

    /// Needs a user token: the playlist is created on the listener's account.
    pub async fn create_playlist(&self, emotion: Emotion, listener: Listener) -> RecResult<Playlist> {
        let provider = match self.connector.for_user(listener.token.clone()).await {
            Ok(provider) => provider,
            Err(e) => {
                error!("Spotify user authentication failed: {e:#}");
                return Err(RecError::PlaylistCreation);
            }
        };
        info!(%emotion, "Generating playlist");

        let result = self.build_playlist(provider.as_ref(), emotion).await;
        self.persist_refreshed(&listener, provider.as_ref()).await;
        result
    }

    async fn build_playlist(&self, provider: &dyn Provider, emotion: Emotion) -> RecResult<Playlist> {
        let profile = UserProfile::fetch(provider).await.map_err(|e| {
            error!("Error fetching listening history: {e:#}");
            RecError::PlaylistCreation
        })?;

        let candidates = Selector::new(provider, PLAYLIST_CANDIDATE_CAP)
            .select(emotion, Some(&profile))
            .await
            .map_err(|_| RecError::PlaylistCreation)?;

        let tracks = assemble(&candidates, PLAYLIST_CAP, &mut rand::thread_rng());

        PlaylistPublisher::new(provider).publish(emotion, tracks).await
    }
}
