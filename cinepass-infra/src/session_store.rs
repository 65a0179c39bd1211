use std::time::Duration;

use async_trait::async_trait;
use cinepass_domain::session::Session;
use cinepass_domain::store::SessionStore;
use cinepass_domain::{Error, Result};
use redis::AsyncCommands;
use tracing::debug;

/// Sessions live at `session:{token}` as JSON with a TTL; Redis expiry is
/// the only logout a forgotten token ever gets.
#[derive(Clone)]
pub struct RedisSessionStore {
    client: redis::Client,
}

impl RedisSessionStore {
    pub fn new(connection_string: &str) -> Result<Self> {
        let client = redis::Client::open(connection_string).map_err(Error::transient)?;
        Ok(Self { client })
    }

    async fn connection(&self) -> Result<redis::aio::MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(Error::transient)
    }

    fn key(token: &str) -> String {
        format!("session:{token}")
    }
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn put(&self, token: &str, session: &Session, ttl: Duration) -> Result<()> {
        let mut conn = self.connection().await?;
        let payload = serde_json::to_string(session)
            .map_err(|e| Error::Inconsistency(format!("session encode: {e}")))?;

        let _: () = conn
            .set_ex(Self::key(token), payload, ttl.as_secs())
            .await
            .map_err(Error::transient)?;

        debug!(user_id = %session.user_id, "session stored");
        Ok(())
    }

    async fn get(&self, token: &str) -> Result<Option<Session>> {
        let mut conn = self.connection().await?;
        let payload: Option<String> = conn.get(Self::key(token)).await.map_err(Error::transient)?;

        match payload {
            Some(json) => serde_json::from_str(&json)
                .map(Some)
                .map_err(|e| Error::Inconsistency(format!("session decode: {e}"))),
            None => Ok(None),
        }
    }

    async fn delete(&self, token: &str) -> Result<()> {
        let mut conn = self.connection().await?;
        let _: () = conn.del(Self::key(token)).await.map_err(Error::transient)?;
        Ok(())
    }

    async fn rotate(
        &self,
        old_token: &str,
        new_token: &str,
        ttl: Duration,
    ) -> Result<Option<Session>> {
        let Some(session) = self.get(old_token).await? else {
            return Ok(None);
        };

        let payload = serde_json::to_string(&session)
            .map_err(|e| Error::Inconsistency(format!("session encode: {e}")))?;

        let mut conn = self.connection().await?;
        let _: () = redis::pipe()
            .atomic()
            .del(Self::key(old_token))
            .set_ex(Self::key(new_token), payload, ttl.as_secs())
            .query_async(&mut conn)
            .await
            .map_err(Error::transient)?;

        Ok(Some(session))
    }
}
