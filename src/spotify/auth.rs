use base64::Engine;
use chrono::{Duration, Utc};
use rand::Rng;
use rspotify::{scopes, OAuth, Token};
use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard},
    time::{Duration as StdDuration, Instant},
};
use tracing::debug;

use crate::config::Config;

/// Lifetime assumed for bare access tokens handed to us by the worker.
const BARE_TOKEN_LIFETIME_SECS: i64 = 3600;

/// How long a login may sit at Spotify's consent screen.
const LOGIN_STATE_TTL: StdDuration = StdDuration::from_secs(10 * 60);
const MAX_PENDING_LOGINS: usize = 1024;

pub fn oauth_for(config: &Config) -> OAuth {
    OAuth {
        redirect_uri: config.redirect_uri.clone(),
        scopes: scopes!(
            "user-top-read",
            "playlist-modify-private",
            "user-read-recently-played",
            "user-library-read"
        ),
        ..Default::default()
    }
}

/// Random URL-safe id. Used for session ids and for OAuth `state` values.
pub fn generate_session_id() -> String {
    let mut rng = rand::thread_rng();
    let bytes: Vec<u8> = (0..24).map(|_| rng.gen_range(0u8..=255u8)).collect();
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(&bytes)
}

/// Wraps an access token obtained elsewhere. There is no refresh token, so
/// once it expires the calls made with it fail.
pub fn token_from_access_token(access_token: &str) -> Token {
    let expires_in = Duration::seconds(BARE_TOKEN_LIFETIME_SECS);
    Token {
        access_token: access_token.to_string(),
        expires_in,
        expires_at: Some(Utc::now() + expires_in),
        refresh_token: None,
        ..Default::default()
    }
}

struct PendingLogin {
    session: String,
    started: Instant,
}

/// OAuth `state` values handed out by `/login`, each tied to the session it
/// was minted for. A state is good for one callback.
pub struct PendingLogins {
    states: Mutex<HashMap<String, PendingLogin>>,
    ttl: StdDuration,
}

impl Default for PendingLogins {
    fn default() -> Self {
        Self::with_ttl(LOGIN_STATE_TTL)
    }
}

impl PendingLogins {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ttl(ttl: StdDuration) -> Self {
        PendingLogins {
            states: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    fn states(&self) -> MutexGuard<'_, HashMap<String, PendingLogin>> {
        self.states.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Mints a fresh state for `session` and returns it.
    pub fn begin(&self, session: &str) -> String {
        let state = generate_session_id();
        let mut states = self.states();

        let ttl = self.ttl;
        states.retain(|_, login| login.started.elapsed() < ttl);
        if states.len() >= MAX_PENDING_LOGINS {
            let oldest = states
                .iter()
                .min_by_key(|(_, login)| login.started)
                .map(|(state, _)| state.clone());
            if let Some(oldest) = oldest {
                debug!("Pending logins full, dropping the oldest");
                states.remove(&oldest);
            }
        }

        states.insert(
            state.clone(),
            PendingLogin {
                session: session.to_string(),
                started: Instant::now(),
            },
        );
        state
    }

    /// Consumes `state` and returns the session it was minted for, unless it
    /// is unknown, already used or expired.
    pub fn complete(&self, state: &str) -> Option<String> {
        let login = self.states().remove(state)?;
        (login.started.elapsed() < self.ttl).then_some(login.session)
    }

    pub fn pending(&self) -> usize {
        self.states().len()
    }
}
