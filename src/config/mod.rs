use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::time::Duration;

const DEFAULT_CALLBACK_TIMEOUT_SECS: u64 = 400;

#[derive(Debug, Clone)]
pub struct Config {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub redis_url: Option<String>,
    pub bind_addr: String,
    pub frontend_url: String,
    pub allowed_origin: String,
    pub callback_timeout: Duration,
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenv().ok(); // .env is optional, plain env vars work too

        let callback_timeout_secs = match std::env::var("CALLBACK_TIMEOUT_SECS") {
            Ok(raw) => raw
                .parse::<u64>()
                .with_context(|| format!("CALLBACK_TIMEOUT_SECS is not a number: {raw}"))?,
            Err(_) => DEFAULT_CALLBACK_TIMEOUT_SECS,
        };

        Ok(Config {
            client_id: std::env::var("SPOTIFY_CLIENT_ID")
                .context("SPOTIFY_CLIENT_ID is missing from .env or environment")?,
            client_secret: std::env::var("SPOTIFY_CLIENT_SECRET")
                .context("SPOTIFY_CLIENT_SECRET is missing from .env or environment")?,
            redirect_uri: std::env::var("SPOTIFY_REDIRECT_URI")
                .unwrap_or_else(|_| "http://127.0.0.1:8000/callback".to_string()),
            redis_url: std::env::var("REDIS_URL").ok().filter(|url| !url.is_empty()),
            bind_addr: std::env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:8000".to_string()),
            frontend_url: std::env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            allowed_origin: std::env::var("CORS_ALLOWED_ORIGIN").unwrap_or_else(|_| "*".to_string()),
            callback_timeout: Duration::from_secs(callback_timeout_secs),
        })
    }
}
