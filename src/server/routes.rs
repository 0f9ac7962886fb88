use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    Json,
};
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::session::{expired_session_cookie, session_cookie, Session};
use crate::app::App;
use crate::emotion::Emotion;
use crate::error::{RecError, RecResult};
use crate::recommender::{assembler::Playlist, Listener};
use crate::rendezvous::CallbackPayload;
use crate::spotify::auth::{generate_session_id, token_from_access_token};

/// Rendezvous key for callers that do not name a job.
pub const DEFAULT_JOB: &str = "default";

#[derive(Debug, Deserialize)]
pub struct EmotionParams {
    emotion: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct JobParams {
    job: Option<String>,
}

impl JobParams {
    fn key(&self) -> &str {
        self.job
            .as_deref()
            .filter(|job| !job.is_empty())
            .unwrap_or(DEFAULT_JOB)
    }
}

#[derive(Debug, Deserialize)]
pub struct StatusReport {
    status: String,
}

fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> RecResult<T> {
    match body {
        Ok(Json(value)) => Ok(value),
        Err(rejection) if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE => {
            Err(RecError::PayloadTooLarge)
        }
        Err(rejection) => Err(RecError::BadRequest(format!(
            "Invalid request body: {}",
            rejection.body_text()
        ))),
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

pub async fn index() -> Json<Value> {
    Json(json!({ "message": "Welcome to moodmix API" }))
}

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub async fn not_found() -> Response {
    (StatusCode::NOT_FOUND, Json(json!({ "error": "Not found" }))).into_response()
}

/// Starts a login from scratch: a new session cookie for this browser and a
/// one-time OAuth `state` tied to it.
pub async fn login(
    State(app): State<Arc<App>>,
    jar: CookieJar,
) -> RecResult<(CookieJar, Redirect)> {
    let session = generate_session_id();
    let state = app.logins.begin(&session);
    let url = app.connector.authorize_url(&state)?;
    info!(pending = app.logins.pending(), "Redirecting to Spotify authorization");
    Ok((jar.add(session_cookie(session)), Redirect::to(&url)))
}

pub async fn oauth_callback(
    State(app): State<Arc<App>>,
    session: Session,
    Query(params): Query<CallbackParams>,
) -> RecResult<Redirect> {
    let pending = non_empty(params.state).and_then(|state| app.logins.complete(&state));

    if let Some(reason) = params.error {
        warn!("Spotify authorization denied: {reason}");
        return Err(RecError::BadRequest(format!(
            "Spotify authorization failed: {reason}"
        )));
    }

    let Some(pending) = pending else {
        warn!("OAuth callback with an unknown or expired state");
        return Err(RecError::BadRequest(
            "Unknown or expired login state".to_string(),
        ));
    };
    if session.id() != Some(pending.as_str()) {
        warn!("OAuth callback from a browser that did not start the login");
        return Err(RecError::BadRequest(
            "Login was started from a different browser".to_string(),
        ));
    }
    let code = non_empty(params.code)
        .ok_or_else(|| RecError::BadRequest("Missing parameter: code".to_string()))?;

    let token = app.connector.exchange_code(&code).await.map_err(|e| {
        error!("Error exchanging authorization code: {e:#}");
        RecError::NotAuthenticated
    })?;
    app.tokens.put(&pending, &token).await?;
    info!("Stored user token");

    Ok(Redirect::to(&app.config.frontend_url))
}

pub async fn token(State(app): State<Arc<App>>, session: Session) -> RecResult<Json<Value>> {
    let id = session.id().ok_or(RecError::NotAuthenticated)?;
    match app.tokens.get(id).await? {
        Some(token) => Ok(Json(json!({ "access_token": token.access_token }))),
        None => Err(RecError::NotAuthenticated),
    }
}

pub async fn logout(
    State(app): State<Arc<App>>,
    session: Session,
    jar: CookieJar,
) -> RecResult<(CookieJar, Json<Value>)> {
    if let Some(id) = session.id() {
        app.tokens.delete(id).await?;
    }
    info!("Logged out");
    Ok((
        jar.remove(expired_session_cookie()),
        Json(json!({ "message": "Logged out" })),
    ))
}

/// The stored token for this browser's session. A token-store outage should
/// not block recommendations, so it reads as "no token".
async fn stored_listener(app: &App, session: &Session) -> Option<Listener> {
    let id = session.id()?;
    match app.tokens.get(id).await {
        Ok(token) => token.map(|token| Listener::stored(id, token)),
        Err(e) => {
            warn!("Token store unavailable, continuing unauthenticated: {e:#}");
            None
        }
    }
}

pub async fn recommend(
    State(app): State<Arc<App>>,
    session: Session,
    Query(params): Query<EmotionParams>,
) -> RecResult<Json<Value>> {
    let emotion = Emotion::parse(params.emotion.as_deref().unwrap_or(""))?;
    let listener = stored_listener(&app, &session).await;

    let tracks = app.recommender.recommend(emotion, listener).await?;
    if tracks.is_empty() {
        return Ok(Json(json!([{ "message": "No songs found" }])));
    }
    Ok(Json(json!(tracks)))
}

fn playlist_body(playlist: &Playlist) -> Value {
    json!({
        "message": format!("Playlist '{}' created", playlist.name),
        "playlist_url": playlist.url,
    })
}

pub async fn playlist(
    State(app): State<Arc<App>>,
    session: Session,
    Query(params): Query<EmotionParams>,
) -> RecResult<Json<Value>> {
    let emotion = Emotion::parse(params.emotion.as_deref().unwrap_or(""))?;
    let listener = stored_listener(&app, &session)
        .await
        .ok_or(RecError::NotAuthenticated)?;

    let playlist = app.recommender.create_playlist(emotion, listener).await?;
    Ok(Json(playlist_body(&playlist)))
}

pub async fn emotion_callback(
    State(app): State<Arc<App>>,
    Query(job): Query<JobParams>,
    body: Result<Json<CallbackPayload>, JsonRejection>,
) -> RecResult<Json<Value>> {
    let payload = json_body(body)?;
    app.callbacks.deliver(job.key(), payload);
    debug!(open_jobs = app.callbacks.slot_count(), "Emotion callback stored");
    Ok(Json(json!({ "status": "received" })))
}

pub async fn processing_status(
    State(app): State<Arc<App>>,
    Query(job): Query<JobParams>,
    body: Result<Json<StatusReport>, JsonRejection>,
) -> RecResult<Json<Value>> {
    let report = json_body(body)?;
    app.statuses.set(job.key(), &report.status);
    debug!(tracked = app.statuses.tracked(), "Worker status recorded");
    Ok(Json(json!({ "status": report.status })))
}

pub async fn status_check(
    State(app): State<Arc<App>>,
    Query(job): Query<JobParams>,
) -> Json<Value> {
    Json(json!({ "status": app.statuses.get(job.key()) }))
}

/// Long-polls for the worker's result, then turns it into a playlist.
pub async fn process_latest(
    State(app): State<Arc<App>>,
    session: Session,
    Query(job): Query<JobParams>,
) -> RecResult<Json<Value>> {
    let key = job.key();
    let payload = app.callbacks.wait(key).await?;
    app.statuses.clear(key);

    let emotion = Emotion::parse(&payload.emotion)?;
    info!(job = key, %emotion, "Emotion result received");

    let listener = match payload.access_token.as_deref().filter(|t| !t.is_empty()) {
        Some(access_token) => Some(Listener::bare(token_from_access_token(access_token))),
        None => stored_listener(&app, &session).await,
    };

    let playlist_created = match listener {
        Some(listener) => match app.recommender.create_playlist(emotion, listener).await {
            Ok(playlist) => playlist_body(&playlist),
            Err(e) => e.body(),
        },
        None => RecError::NotAuthenticated.body(),
    };

    Ok(Json(json!({
        "emotion": emotion,
        "playlist_created": playlist_created,
    })))
}
