use std::sync::Arc;
use std::time::Duration;

use crate::clients::SearchSink;
use crate::models::{BatchResult, DocumentFailure, NormalizedDocument, Result};

/// Serializes normalized documents into one idempotent bulk upsert,
/// classifies per-document and whole-batch failures, and retries transient
/// transport failures with a fixed delay.
pub struct Loader {
    sink: Arc<dyn SearchSink>,
    index: String,
    retry_attempts: u32,
    retry_delay: Duration,
}

impl Loader {
    pub fn new(sink: Arc<dyn SearchSink>, index: String, retry_attempts: u32, retry_delay: Duration) -> Self {
        Self {
            sink,
            index,
            retry_attempts: retry_attempts.max(1),
            retry_delay,
        }
    }

    /// Documents that cannot round-trip through serialization are excluded
    /// up front and reported as rejected; resending them would fail the
    /// same way every time.
    fn serialization_guard(
        documents: &[NormalizedDocument],
    ) -> (Vec<NormalizedDocument>, Vec<DocumentFailure>) {
        let mut serializable = Vec::with_capacity(documents.len());
        let mut failures = Vec::new();
        for doc in documents {
            let round_trip = serde_json::to_value(doc)
                .and_then(serde_json::from_value::<NormalizedDocument>);
            match round_trip {
                Ok(_) => serializable.push(doc.clone()),
                Err(e) => failures.push(DocumentFailure {
                    document_id: doc.id.clone(),
                    reason: format!("serialization error: {}", e),
                }),
            }
        }
        (serializable, failures)
    }

    pub async fn write(&self, documents: &[NormalizedDocument]) -> Result<BatchResult> {
        // Guard failures are recovered locally: reported for logging, but
        // like any other per-record validation error they never block
        // watermark advancement (resending would fail identically forever).
        let (serializable, mut failures) = Self::serialization_guard(documents);

        if serializable.is_empty() {
            return Ok(BatchResult {
                success: true,
                accepted: 0,
                failures,
            });
        }

        let mut attempt: u32 = 0;
        let response = loop {
            attempt += 1;
            match self.sink.bulk_upsert(&self.index, &serializable).await {
                Ok(response) => break response,
                Err(e) => {
                    if attempt >= self.retry_attempts {
                        tracing::error!(
                            index = %self.index,
                            attempts = attempt,
                            error = %e,
                            "Bulk write failed after exhausting retries"
                        );
                        return Ok(BatchResult {
                            success: false,
                            accepted: 0,
                            failures,
                        });
                    }
                    tracing::warn!(
                        index = %self.index,
                        attempt = attempt,
                        delay_ms = self.retry_delay.as_millis() as u64,
                        error = %e,
                        "Bulk write transport error; retrying"
                    );
                    tokio::time::sleep(self.retry_delay).await;
                }
            }
        };

        let mut accepted = 0usize;
        let mut destination_rejections = 0usize;
        if !response.errors {
            // Destination reported a clean batch; no per-item classification
            // needed.
            accepted = response.items.len();
        } else {
            for item in &response.items {
                if item.error.is_some() || item.status >= 300 {
                    destination_rejections += 1;
                    failures.push(DocumentFailure {
                        document_id: item.document_id.clone(),
                        reason: item
                            .error
                            .clone()
                            .unwrap_or_else(|| format!("status {}", item.status)),
                    });
                } else {
                    accepted += 1;
                }
            }
        }

        // Any destination-side rejection forces a replay of the watermark
        // range; prefer redundant re-delivery over silent loss.
        let success = destination_rejections == 0 && accepted == serializable.len();
        if success {
            if let Err(e) = self.sink.refresh(&self.index).await {
                // Documents are already durably indexed; visibility catches
                // up on the index's own refresh interval.
                tracing::warn!(index = %self.index, error = %e, "Post-batch refresh failed");
            }
        }

        Ok(BatchResult {
            success,
            accepted,
            failures,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::{BulkItemStatus, BulkResponse};
    use crate::models::EtlError;
    use async_trait::async_trait;
    use serde_json::Value;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FlakySink {
        failures_before_success: usize,
        calls: AtomicUsize,
        refreshes: AtomicUsize,
        reject_ids: Vec<String>,
        fail_refresh: bool,
    }

    impl FlakySink {
        fn new(failures_before_success: usize) -> Self {
            Self {
                failures_before_success,
                calls: AtomicUsize::new(0),
                refreshes: AtomicUsize::new(0),
                reject_ids: Vec::new(),
                fail_refresh: false,
            }
        }
    }

    #[async_trait]
    impl SearchSink for FlakySink {
        async fn bulk_upsert(
            &self,
            _index: &str,
            documents: &[NormalizedDocument],
        ) -> crate::models::Result<BulkResponse> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures_before_success {
                return Err(EtlError::Search("connection refused".to_string()));
            }
            let items = documents
                .iter()
                .map(|d| {
                    if self.reject_ids.contains(&d.id) {
                        BulkItemStatus {
                            document_id: d.id.clone(),
                            status: 400,
                            error: Some("mapper_parsing_exception".to_string()),
                        }
                    } else {
                        BulkItemStatus {
                            document_id: d.id.clone(),
                            status: 201,
                            error: None,
                        }
                    }
                })
                .collect();
            Ok(BulkResponse {
                errors: !self.reject_ids.is_empty(),
                items,
            })
        }

        async fn refresh(&self, _index: &str) -> crate::models::Result<()> {
            self.refreshes.fetch_add(1, Ordering::SeqCst);
            if self.fail_refresh {
                return Err(EtlError::Search("refresh timed out".to_string()));
            }
            Ok(())
        }

        async fn create_index(&self, _index: &str, _schema: &Value) -> crate::models::Result<()> {
            Ok(())
        }
    }

    fn doc(id: &str) -> NormalizedDocument {
        NormalizedDocument {
            id: id.to_string(),
            title: format!("title {}", id),
            description: String::new(),
            imdb_rating: None,
            genres: vec![],
            actors: vec![],
            writers: vec![],
            directors: vec![],
            actors_names: vec![],
            writers_names: vec![],
            directors_names: vec![],
        }
    }

    fn loader(sink: Arc<FlakySink>) -> Loader {
        Loader::new(sink, "movies".to_string(), 3, Duration::from_millis(1))
    }

    #[tokio::test]
    async fn retries_transient_failures_then_succeeds() {
        let sink = Arc::new(FlakySink::new(2));
        let result = loader(sink.clone()).write(&[doc("1"), doc("2")]).await.unwrap();
        assert!(result.success);
        assert_eq!(result.accepted, 2);
        assert_eq!(sink.calls.load(Ordering::SeqCst), 3);
        assert_eq!(sink.refreshes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn exhausted_retries_signal_total_failure() {
        let sink = Arc::new(FlakySink::new(10));
        let result = loader(sink.clone()).write(&[doc("1")]).await.unwrap();
        assert!(!result.success);
        assert_eq!(result.accepted, 0);
        assert_eq!(sink.calls.load(Ordering::SeqCst), 3);
        assert_eq!(sink.refreshes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn per_document_rejection_fails_the_batch() {
        let mut sink = FlakySink::new(0);
        sink.reject_ids = vec!["2".to_string()];
        let sink = Arc::new(sink);
        let result = loader(sink.clone()).write(&[doc("1"), doc("2")]).await.unwrap();
        assert!(!result.success);
        assert_eq!(result.accepted, 1);
        assert_eq!(result.failures.len(), 1);
        assert_eq!(result.failures[0].document_id, "2");
        assert_eq!(sink.refreshes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn clean_bulk_response_accepts_every_document() {
        let sink = Arc::new(FlakySink::new(0));
        let result = loader(sink.clone())
            .write(&[doc("1"), doc("2"), doc("3")])
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(result.accepted, 3);
        assert!(result.failures.is_empty());
    }

    #[tokio::test]
    async fn refresh_failure_does_not_fail_an_accepted_batch() {
        let mut sink = FlakySink::new(0);
        sink.fail_refresh = true;
        let sink = Arc::new(sink);
        let result = loader(sink.clone()).write(&[doc("1")]).await.unwrap();
        // The documents are already durably indexed; only visibility lags.
        assert!(result.success);
        assert_eq!(result.accepted, 1);
        assert!(result.failures.is_empty());
        assert_eq!(sink.refreshes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn empty_batch_is_a_trivial_success() {
        let sink = Arc::new(FlakySink::new(0));
        let result = loader(sink.clone()).write(&[]).await.unwrap();
        assert!(result.success);
        assert_eq!(result.accepted, 0);
        assert_eq!(sink.calls.load(Ordering::SeqCst), 0);
    }
}
