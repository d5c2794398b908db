use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Person entry exactly as the extraction query aggregates it. Either field
/// may be null in the source, so presence is enforced during normalization,
/// not here.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawPerson {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

/// One denormalized row from the source: the film work plus its collapsed
/// many-to-one associations. Owned transiently by the extractor, consumed
/// by the transformer.
#[derive(Debug, Clone)]
pub struct SourceRecord {
    pub id: String,
    pub title: Option<String>,
    pub description: Option<String>,
    /// Kept as raw text; coercion to a number is the transformer's job.
    pub rating: Option<String>,
    pub modified: NaiveDateTime,
    pub genres: Vec<String>,
    pub actors: Vec<RawPerson>,
    pub writers: Vec<RawPerson>,
    pub directors: Vec<RawPerson>,
}

/// Person as it appears in the destination document. Name is guaranteed
/// non-empty by normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssociatedPerson {
    pub id: String,
    pub name: String,
}

/// Destination-shape document for the search index. Immutable once built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizedDocument {
    pub id: String,
    pub title: String,
    pub description: String,
    pub imdb_rating: Option<f64>,
    pub genres: Vec<String>,
    pub actors: Vec<AssociatedPerson>,
    pub writers: Vec<AssociatedPerson>,
    pub directors: Vec<AssociatedPerson>,
    pub actors_names: Vec<String>,
    pub writers_names: Vec<String>,
    pub directors_names: Vec<String>,
}

/// Per-record validation failure raised by the transformer. Logged by the
/// caller and dropped; never aborts the batch.
#[derive(Debug, Clone)]
pub struct RecordRejection {
    pub record_id: String,
    pub reason: String,
}

/// Per-document failure reported by the loader, either from the
/// serialization guard or from the destination's per-operation status.
#[derive(Debug, Clone)]
pub struct DocumentFailure {
    pub document_id: String,
    pub reason: String,
}

/// Outcome of one bulk write. `success` is true only when every submitted
/// document was accepted; the sync loop uses it to gate watermark
/// advancement.
#[derive(Debug, Clone)]
pub struct BatchResult {
    pub success: bool,
    pub accepted: usize,
    pub failures: Vec<DocumentFailure>,
}
