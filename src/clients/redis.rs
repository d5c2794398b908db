use async_trait::async_trait;
use redis::aio::ConnectionManager;

use crate::models::{EtlError, Result};
use crate::state::WatermarkStore;

/// Redis-backed watermark persistence. One fixed key for this pipeline
/// instance; the connection manager reconnects transparently.
#[derive(Clone)]
pub struct RedisClient {
    conn: ConnectionManager,
    key: String,
}

impl RedisClient {
    pub async fn new(redis_url: &str, key: &str) -> Result<Self> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| EtlError::Configuration(format!("Invalid Redis URL: {}", e)))?;
        let conn = client.get_connection_manager().await?;
        Ok(Self {
            conn,
            key: key.to_string(),
        })
    }
}

#[async_trait]
impl WatermarkStore for RedisClient {
    async fn load(&self) -> Result<Option<String>> {
        let mut conn = self.conn.clone();
        let value: Option<String> = redis::cmd("GET")
            .arg(&self.key)
            .query_async(&mut conn)
            .await
            .map_err(EtlError::Redis)?;
        Ok(value)
    }

    async fn store(&self, value: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        redis::cmd("SET")
            .arg(&self.key)
            .arg(value)
            .query_async::<_, ()>(&mut conn)
            .await
            .map_err(EtlError::Redis)?;
        tracing::debug!(key = %self.key, value = value, "Watermark persisted");
        Ok(())
    }
}
