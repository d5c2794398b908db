use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub pg_dsn: String,
    pub pg_max_connections: u32,
    pub redis_url: String,
    pub es_url: String,
    pub es_index: String,
    pub watermark_key: String,
    pub batch_size: i64,
    pub poll_interval_secs: u64,
    pub error_backoff_secs: u64,
    pub bulk_retry_attempts: u32,
    pub bulk_retry_delay_ms: u64,
    pub http_timeout_ms: u64,
}

impl Config {
    pub fn from_env() -> Self {
        let get = |k: &str| std::env::var(k).ok();

        // Explicit DSN wins; otherwise assemble it from the individual parts.
        let pg_dsn = get("PG_DSN").unwrap_or_else(|| {
            let user = get("PG_USER").unwrap_or_else(|| "postgres".to_string());
            let password = get("PG_PASSWORD").unwrap_or_else(|| "postgres".to_string());
            let host = get("PG_HOST").unwrap_or_else(|| "localhost".to_string());
            let port = get("PG_PORT").unwrap_or_else(|| "5432".to_string());
            let db = get("PG_DB").unwrap_or_else(|| "movies".to_string());
            format!("postgresql://{}:{}@{}:{}/{}", user, password, host, port, db)
        });
        let pg_max_connections: u32 = get("PG_MAX_CONNECTIONS").and_then(|s| s.parse().ok()).unwrap_or(5);
        let redis_url = get("REDIS_URL").unwrap_or_else(|| "redis://localhost:6379".to_string());
        let es_url = get("ES_URL").unwrap_or_else(|| "http://localhost:9200".to_string());
        let es_index = get("ES_INDEX").unwrap_or_else(|| "movies".to_string());
        let watermark_key = get("WATERMARK_KEY").unwrap_or_else(|| "etl:last_modified".to_string());
        let batch_size: i64 = get("BATCH_SIZE").and_then(|s| s.parse().ok()).unwrap_or(100);
        let poll_interval_secs: u64 = get("POLL_INTERVAL_SECS").and_then(|s| s.parse().ok()).unwrap_or(5);
        let error_backoff_secs: u64 = get("ERROR_BACKOFF_SECS").and_then(|s| s.parse().ok()).unwrap_or(10);
        let bulk_retry_attempts: u32 = get("BULK_RETRY_ATTEMPTS").and_then(|s| s.parse().ok()).unwrap_or(3);
        let bulk_retry_delay_ms: u64 = get("BULK_RETRY_DELAY_MS").and_then(|s| s.parse().ok()).unwrap_or(1000);
        let http_timeout_ms: u64 = get("HTTP_TIMEOUT_MS").and_then(|s| s.parse().ok()).unwrap_or(30000);

        Self {
            pg_dsn,
            pg_max_connections,
            redis_url,
            es_url,
            es_index,
            watermark_key,
            batch_size,
            poll_interval_secs,
            error_backoff_secs,
            bulk_retry_attempts,
            bulk_retry_delay_ms,
            http_timeout_ms,
        }
    }
}
