use anyhow::{Context, Result};
use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;

use crate::app::App;

pub mod routes;
pub mod session;

/// Request bodies are small JSON documents from the worker.
pub const BODY_LIMIT: usize = 16 * 1024;

fn cors_layer(allowed_origin: &str) -> Result<CorsLayer> {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]);
    if allowed_origin == "*" {
        return Ok(layer.allow_origin(Any));
    }

    // Browsers only send the session cookie cross-origin to a named origin.
    let origin = HeaderValue::from_str(allowed_origin)
        .with_context(|| format!("CORS_ALLOWED_ORIGIN is not a valid origin: {allowed_origin}"))?;
    Ok(layer.allow_origin(origin).allow_credentials(true))
}

pub fn make_app(app: Arc<App>) -> Result<Router> {
    let cors = cors_layer(&app.config.allowed_origin)?;

    let router = Router::new()
        .route("/", get(routes::index))
        .route("/health", get(routes::health))
        .route("/login", get(routes::login))
        .route("/callback", get(routes::oauth_callback))
        .route("/token", get(routes::token))
        .route("/logout", post(routes::logout))
        .route("/recommend", get(routes::recommend))
        .route("/playlist", post(routes::playlist))
        .route("/emotion_callback", post(routes::emotion_callback))
        .route("/processing_status", post(routes::processing_status))
        .route("/status_check", get(routes::status_check))
        .route("/process_latest", post(routes::process_latest))
        .fallback(routes::not_found)
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(app);
    Ok(router)
}

pub async fn serve(app: Arc<App>) -> Result<()> {
    let bind_addr = app.config.bind_addr.clone();
    let router = make_app(app)?;

    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind {bind_addr}"))?;
    info!("Listening on http://{bind_addr}");

    axum::serve(listener, router)
        .await
        .context("HTTP server stopped")?;
    Ok(())
}
