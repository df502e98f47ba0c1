/// Redis key/value wrapper for the settings backend.
///
/// Every operation reports failure: callers that can degrade (loading
/// settings at startup) decide to fall back, while a save must never build
/// on a read that silently failed.
use redis::AsyncCommands;
use tracing::warn;

use crate::error::CommonError;

pub struct RedisKv {
    client: Option<redis::Client>,
}

impl RedisKv {
    /// Create a client for `url`. An absent or invalid URL yields a store
    /// whose operations all fail with `RedisUnavailable`.
    pub fn new(url: Option<&str>) -> Self {
        let client = url.and_then(|u| {
            redis::Client::open(u)
                .inspect_err(|e| warn!(error = %e, url = u, "failed to create redis client"))
                .ok()
        });
        Self { client }
    }

    /// Test the connection by sending a PING.
    pub async fn is_available(&self) -> bool {
        let Ok(mut conn) = self.connection().await else {
            return false;
        };
        let result: Result<String, _> = redis::cmd("PING").query_async(&mut conn).await;
        result.is_ok()
    }

    pub async fn get(&self, key: &str) -> Result<Option<String>, CommonError> {
        let mut conn = self.connection().await?;
        let value: Option<String> = conn
            .get(key)
            .await
            .inspect_err(|e| warn!(error = %e, key, "redis GET failed"))?;
        Ok(value)
    }

    /// Write every pair in one MULTI/EXEC transaction.
    pub async fn set_all(&self, pairs: &[(String, String)]) -> Result<(), CommonError> {
        let mut conn = self.connection().await?;
        let mut pipe = redis::pipe();
        pipe.atomic();
        for (key, value) in pairs {
            pipe.set(key, value).ignore();
        }
        let _: () = pipe
            .query_async(&mut conn)
            .await
            .inspect_err(|e| warn!(error = %e, keys = pairs.len(), "redis MULTI/EXEC failed"))?;
        Ok(())
    }

    async fn connection(&self) -> Result<redis::aio::MultiplexedConnection, CommonError> {
        let client = self.client.as_ref().ok_or(CommonError::RedisUnavailable)?;
        client
            .get_multiplexed_async_connection()
            .await
            .inspect_err(|e| warn!(error = %e, "redis connection failed"))
            .map_err(|_| CommonError::RedisUnavailable)
    }
}
