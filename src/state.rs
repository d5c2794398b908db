use async_trait::async_trait;

use crate::models::Result;

/// Watermark value used when the pipeline has never synced; guarantees the
/// first extraction covers the whole dataset.
pub const EPOCH_WATERMARK: &str = "1970-01-01T00:00:00";

/// Persistence capability for the single watermark key. The concrete
/// key-value service stays swappable without touching the sync loop.
#[async_trait]
pub trait WatermarkStore: Send + Sync {
    /// Returns the last committed watermark, or `None` when the pipeline
    /// has never synced (or the key was manually reset).
    async fn load(&self) -> Result<Option<String>>;

    /// Durably replaces the watermark. Must return only after the value is
    /// persisted; the sync loop relies on this for crash safety.
    async fn store(&self, value: &str) -> Result<()>;
}
