use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::Value;

use crate::models::{EtlError, NormalizedDocument, Result};

/// Status of one operation inside a bulk response.
#[derive(Debug, Clone)]
pub struct BulkItemStatus {
    pub document_id: String,
    pub status: u16,
    pub error: Option<String>,
}

/// Parsed destination response to one bulk call. The destination may accept
/// some operations and reject others.
#[derive(Debug, Clone)]
pub struct BulkResponse {
    pub errors: bool,
    pub items: Vec<BulkItemStatus>,
}

/// Destination index transport. One call per batch; retries belong to the
/// loader, not here.
#[async_trait]
pub trait SearchSink: Send + Sync {
    /// Submits one idempotent upsert per document, keyed by document id.
    async fn bulk_upsert(&self, index: &str, documents: &[NormalizedDocument]) -> Result<BulkResponse>;

    /// Forces the index to make prior writes visible to readers.
    async fn refresh(&self, index: &str) -> Result<()>;

    /// Create-or-replace of a named index with the given schema. Used only
    /// during explicit (re)initialization.
    async fn create_index(&self, index: &str, schema: &Value) -> Result<()>;
}

#[derive(Clone)]
pub struct ElasticsearchClient {
    client: Client,
    base_url: String,
}

impl ElasticsearchClient {
    pub fn new(base_url: String, timeout_ms: u64) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_millis(timeout_ms))
            .connect_timeout(std::time::Duration::from_millis(timeout_ms.min(10_000)))
            .build()
            .expect("Failed to create HTTP client");

        Self { client, base_url }
    }

    fn bulk_body(index: &str, documents: &[NormalizedDocument]) -> Result<String> {
        let mut body = String::new();
        for doc in documents {
            let action = serde_json::json!({ "index": { "_index": index, "_id": doc.id } });
            body.push_str(&serde_json::to_string(&action)?);
            body.push('\n');
            body.push_str(&serde_json::to_string(doc)?);
            body.push('\n');
        }
        Ok(body)
    }

    fn parse_bulk_response(raw: Value) -> BulkResponse {
        let errors = raw.get("errors").and_then(Value::as_bool).unwrap_or(false);
        let mut items = Vec::new();
        if let Some(raw_items) = raw.get("items").and_then(Value::as_array) {
            for item in raw_items {
                // Each item is keyed by the action type; we only send "index".
                let Some(op) = item.get("index") else { continue };
                let document_id = op
                    .get("_id")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                let status = op.get("status").and_then(Value::as_u64).unwrap_or(0) as u16;
                let error = op.get("error").map(|e| {
                    e.get("reason")
                        .and_then(Value::as_str)
                        .map(|s| s.to_string())
                        .unwrap_or_else(|| e.to_string())
                });
                items.push(BulkItemStatus {
                    document_id,
                    status,
                    error,
                });
            }
        }
        BulkResponse { errors, items }
    }
}

#[async_trait]
impl SearchSink for ElasticsearchClient {
    async fn bulk_upsert(&self, index: &str, documents: &[NormalizedDocument]) -> Result<BulkResponse> {
        let body = Self::bulk_body(index, documents)?;
        let url = format!("{}/_bulk", self.base_url);

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/x-ndjson")
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(EtlError::Search(format!(
                "Bulk request failed: status={} body={}",
                status,
                text.chars().take(200).collect::<String>()
            )));
        }

        let raw: Value = response.json().await?;
        Ok(Self::parse_bulk_response(raw))
    }

    async fn refresh(&self, index: &str) -> Result<()> {
        let url = format!("{}/{}/_refresh", self.base_url, index);
        let response = self.client.post(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(EtlError::Search(format!(
                "Refresh failed: status={} body={}",
                status,
                text.chars().take(200).collect::<String>()
            )));
        }
        Ok(())
    }

    async fn create_index(&self, index: &str, schema: &Value) -> Result<()> {
        // Drop any existing index first so re-initialization is idempotent.
        let url = format!("{}/{}", self.base_url, index);
        let delete = self.client.delete(&url).send().await?;
        if !delete.status().is_success() && delete.status() != StatusCode::NOT_FOUND {
            let status = delete.status();
            let text = delete.text().await.unwrap_or_default();
            return Err(EtlError::Search(format!(
                "Index delete failed: status={} body={}",
                status,
                text.chars().take(200).collect::<String>()
            )));
        }

        let create = self.client.put(&url).json(schema).send().await?;
        let status = create.status();
        if !status.is_success() {
            let text = create.text().await.unwrap_or_default();
            return Err(EtlError::Search(format!(
                "Index create failed: status={} body={}",
                status,
                text.chars().take(200).collect::<String>()
            )));
        }
        tracing::info!(index = index, "Index created");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_per_item_errors() {
        let raw = json!({
            "errors": true,
            "items": [
                { "index": { "_id": "1", "status": 201 } },
                { "index": { "_id": "2", "status": 400,
                    "error": { "type": "mapper_parsing_exception", "reason": "failed to parse" } } }
            ]
        });
        let parsed = ElasticsearchClient::parse_bulk_response(raw);
        assert!(parsed.errors);
        assert_eq!(parsed.items.len(), 2);
        assert!(parsed.items[0].error.is_none());
        assert_eq!(parsed.items[1].error.as_deref(), Some("failed to parse"));
    }

    #[test]
    fn bulk_body_pairs_action_and_source_lines() {
        let doc = NormalizedDocument {
            id: "42".into(),
            title: "Arrival".into(),
            description: String::new(),
            imdb_rating: Some(8.0),
            genres: vec!["Sci-Fi".into()],
            actors: vec![],
            writers: vec![],
            directors: vec![],
            actors_names: vec![],
            writers_names: vec![],
            directors_names: vec![],
        };
        let body = ElasticsearchClient::bulk_body("movies", &[doc]).unwrap();
        let lines: Vec<&str> = body.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains(r#""_id":"42""#));
        assert!(lines[1].contains(r#""title":"Arrival""#));
    }
}
