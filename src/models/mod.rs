pub mod record;

pub use record::*;

#[derive(Debug, thiserror::Error)]
pub enum EtlError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Watermark error: {0}")]
    Watermark(String),

    #[error("Search backend error: {0}")]
    Search(String),

    #[error("Sync error: {0}")]
    Sync(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

pub type Result<T> = std::result::Result<T, EtlError>;

/// Phases of one sync iteration. Every transition is logged; `Error` is
/// reachable from any phase before `Advancing`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    Idle,
    Extracting,
    Normalizing,
    Writing,
    Advancing,
    Error,
}

impl SyncPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncPhase::Idle => "idle",
            SyncPhase::Extracting => "extracting",
            SyncPhase::Normalizing => "normalizing",
            SyncPhase::Writing => "writing",
            SyncPhase::Advancing => "advancing",
            SyncPhase::Error => "error",
        }
    }
}
