use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDateTime;

use crate::clients::RecordSource;
use crate::config::Config;
use crate::load::Loader;
use crate::models::{EtlError, Result, SourceRecord, SyncPhase};
use crate::state::{WatermarkStore, EPOCH_WATERMARK};
use crate::transform::Transformer;

/// What a single iteration did, for the outer loop's sleep decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IterationOutcome {
    /// Nothing was extracted; sleep the poll interval.
    Idle,
    /// The watermark advanced; run the next iteration immediately.
    Synced {
        extracted: usize,
        written: usize,
        watermark: String,
    },
}

/// One sequential worker: extract, normalize, write, advance. The watermark
/// only ever moves after a fully successful write (or a batch where no
/// document survived normalization, which would otherwise stall forever).
pub struct SyncEngine {
    source: Arc<dyn RecordSource>,
    loader: Loader,
    watermark: Arc<dyn WatermarkStore>,
    cfg: Config,
}

impl SyncEngine {
    pub fn new(
        source: Arc<dyn RecordSource>,
        loader: Loader,
        watermark: Arc<dyn WatermarkStore>,
        cfg: Config,
    ) -> Self {
        Self {
            source,
            loader,
            watermark,
            cfg,
        }
    }

    fn transition(&self, phase: SyncPhase) {
        tracing::debug!(phase = phase.as_str(), "Sync phase entered");
    }

    fn format_watermark(ts: NaiveDateTime) -> String {
        ts.format("%Y-%m-%dT%H:%M:%S%.f").to_string()
    }

    fn max_modified(records: &[SourceRecord]) -> Option<NaiveDateTime> {
        records.iter().map(|r| r.modified).max()
    }

    async fn advance_watermark(&self, old: &str, new_ts: NaiveDateTime) -> Result<String> {
        self.transition(SyncPhase::Advancing);
        let new = Self::format_watermark(new_ts);
        self.watermark.store(&new).await?;
        tracing::info!(old = old, new = %new, "Watermark advanced");
        Ok(new)
    }

    /// Runs exactly one extract, normalize, write, advance pass. Errors
    /// leave the watermark untouched; the same batch is re-extracted on the
    /// next tick and re-sent as idempotent upserts.
    pub async fn run_iteration(&self) -> Result<IterationOutcome> {
        self.transition(SyncPhase::Extracting);
        // Re-read per iteration so external manual resets take effect.
        let since = self
            .watermark
            .load()
            .await?
            .unwrap_or_else(|| EPOCH_WATERMARK.to_string());

        let records = self.source.fetch_modified(&since, self.cfg.batch_size).await?;
        if records.is_empty() {
            tracing::debug!(since = %since, "No new records");
            return Ok(IterationOutcome::Idle);
        }
        let extracted = records.len();
        // Non-empty batch, so the maximum exists.
        let batch_max = Self::max_modified(&records)
            .ok_or_else(|| EtlError::Sync("empty batch has no maximum".to_string()))?;
        tracing::info!(since = %since, count = extracted, "Extracted batch");

        self.transition(SyncPhase::Normalizing);
        let mut documents = Vec::with_capacity(extracted);
        let mut rejected = 0usize;
        for record in &records {
            match Transformer::normalize(record) {
                Ok(doc) => documents.push(doc),
                Err(rejection) => {
                    rejected += 1;
                    tracing::warn!(
                        record_id = %rejection.record_id,
                        reason = %rejection.reason,
                        "Record rejected during normalization"
                    );
                }
            }
        }

        if documents.is_empty() {
            // Every record was invalid. Advancing past them anyway is what
            // keeps a permanently malformed row from deadlocking the sync.
            tracing::warn!(rejected = rejected, "No documents survived normalization");
            let watermark = self.advance_watermark(&since, batch_max).await?;
            self.transition(SyncPhase::Idle);
            return Ok(IterationOutcome::Synced {
                extracted,
                written: 0,
                watermark,
            });
        }

        self.transition(SyncPhase::Writing);
        let result = self.loader.write(&documents).await?;
        for failure in &result.failures {
            tracing::warn!(
                document_id = %failure.document_id,
                reason = %failure.reason,
                "Document rejected by destination"
            );
        }
        if !result.success {
            return Err(EtlError::Sync(format!(
                "Bulk write incomplete: {} of {} documents accepted",
                result.accepted,
                documents.len()
            )));
        }

        let watermark = self.advance_watermark(&since, batch_max).await?;
        tracing::info!(
            extracted = extracted,
            written = result.accepted,
            rejected = rejected,
            "Iteration complete"
        );
        self.transition(SyncPhase::Idle);
        Ok(IterationOutcome::Synced {
            extracted,
            written: result.accepted,
            watermark,
        })
    }

    /// Polls forever. Exits only with the host process; data and write
    /// errors are logged and retried after the error backoff.
    pub async fn run(&self) -> Result<()> {
        let poll = Duration::from_secs(self.cfg.poll_interval_secs);
        let backoff = Duration::from_secs(self.cfg.error_backoff_secs);
        loop {
            match self.run_iteration().await {
                Ok(IterationOutcome::Idle) => {
                    self.transition(SyncPhase::Idle);
                    tokio::time::sleep(poll).await;
                }
                Ok(IterationOutcome::Synced { .. }) => {
                    // More modifications may be pending; keep draining.
                }
                Err(e) => {
                    self.transition(SyncPhase::Error);
                    tracing::error!(error = %e, backoff_secs = self.cfg.error_backoff_secs, "Iteration failed");
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }
}
