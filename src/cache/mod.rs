use anyhow::Result;
use async_trait::async_trait;
use redis::AsyncCommands;
use rspotify::Token;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::warn;

const TOKEN_KEY_PREFIX: &str = "moodmix:spotify_token";
const TOKEN_TTL_SECS: u64 = 3600 * 24;

/// Where user tokens live between requests, keyed by session id.
#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn get(&self, session: &str) -> Result<Option<Token>>;
    async fn put(&self, session: &str, token: &Token) -> Result<()>;
    async fn delete(&self, session: &str) -> Result<()>;
}

pub struct RedisTokenStore {
    client: redis::Client,
}

impl RedisTokenStore {
    pub fn new(redis_url: &str) -> Result<Self> {
        let client = redis::Client::open(redis_url)?;
        Ok(RedisTokenStore { client })
    }

    fn key(session: &str) -> String {
        format!("{TOKEN_KEY_PREFIX}:{session}")
    }

    pub async fn ping(&self) -> bool {
        match self.client.get_multiplexed_async_connection().await {
            Ok(mut conn) => {
                let result: std::result::Result<String, _> =
                    redis::cmd("PING").query_async(&mut conn).await;
                result.is_ok()
            }
            Err(_) => false,
        }
    }
}

#[async_trait]
impl TokenStore for RedisTokenStore {
    async fn get(&self, session: &str) -> Result<Option<Token>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let raw: Option<String> = conn.get(Self::key(session)).await?;
        let Some(raw) = raw else {
            return Ok(None);
        };
        match serde_json::from_str::<Token>(&raw) {
            Ok(token) => Ok(Some(token)),
            Err(e) => {
                warn!("Dropping unreadable cached token for session {session}: {e}");
                let _: () = conn.del(Self::key(session)).await?;
                Ok(None)
            }
        }
    }

    async fn put(&self, session: &str, token: &Token) -> Result<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let json = serde_json::to_string(token)?;
        let _: () = conn.set_ex(Self::key(session), json, TOKEN_TTL_SECS).await?;
        Ok(())
    }

    async fn delete(&self, session: &str) -> Result<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let _: () = conn.del(Self::key(session)).await?;
        Ok(())
    }
}

/// Process-local store, used when Redis is not configured or unreachable.
#[derive(Default)]
pub struct MemoryTokenStore {
    tokens: RwLock<HashMap<String, Token>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn get(&self, session: &str) -> Result<Option<Token>> {
        Ok(self.tokens.read().await.get(session).cloned())
    }

    async fn put(&self, session: &str, token: &Token) -> Result<()> {
        self.tokens
            .write()
            .await
            .insert(session.to_string(), token.clone());
        Ok(())
    }

    async fn delete(&self, session: &str) -> Result<()> {
        self.tokens.write().await.remove(session);
        Ok(())
    }
}
