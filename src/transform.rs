use crate::models::{
    AssociatedPerson, NormalizedDocument, RawPerson, RecordRejection, SourceRecord,
};

/// Pure conversion from source rows to destination documents. No I/O, no
/// shared state; per-record failures surface as `RecordRejection` and are
/// counted by the caller.
pub struct Transformer;

impl Transformer {
    /// Trims a string field; whitespace-only and the source's "N/A"
    /// placeholder both count as absent.
    fn clean(value: &str) -> Option<String> {
        let trimmed = value.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("n/a") {
            None
        } else {
            Some(trimmed.to_string())
        }
    }

    fn clean_opt(value: Option<&String>) -> Option<String> {
        value.and_then(|s| Self::clean(s))
    }

    /// A bad rating never fails the record; it just becomes null.
    fn coerce_rating(raw: Option<&String>) -> Option<f64> {
        Self::clean_opt(raw).and_then(|s| s.parse::<f64>().ok())
    }

    /// Keeps only entries with a non-empty cleaned name. A missing id is
    /// projected to an empty string rather than dropping the person.
    fn filter_persons(raw: &[RawPerson]) -> Vec<AssociatedPerson> {
        raw.iter()
            .filter_map(|p| {
                let name = Self::clean_opt(p.name.as_ref())?;
                Some(AssociatedPerson {
                    id: Self::clean_opt(p.id.as_ref()).unwrap_or_default(),
                    name,
                })
            })
            .collect()
    }

    pub fn normalize(record: &SourceRecord) -> Result<NormalizedDocument, RecordRejection> {
        let id = Self::clean(&record.id).ok_or_else(|| RecordRejection {
            record_id: record.id.clone(),
            reason: "missing identifier".to_string(),
        })?;
        let title = Self::clean_opt(record.title.as_ref()).ok_or_else(|| RecordRejection {
            record_id: id.clone(),
            reason: "missing title".to_string(),
        })?;

        let actors = Self::filter_persons(&record.actors);
        let writers = Self::filter_persons(&record.writers);
        let directors = Self::filter_persons(&record.directors);

        let names = |persons: &[AssociatedPerson]| -> Vec<String> {
            persons.iter().map(|p| p.name.clone()).collect()
        };
        let actors_names = names(&actors);
        let writers_names = names(&writers);
        let directors_names = names(&directors);

        Ok(NormalizedDocument {
            id,
            title,
            description: Self::clean_opt(record.description.as_ref()).unwrap_or_default(),
            imdb_rating: Self::coerce_rating(record.rating.as_ref()),
            genres: record.genres.iter().filter_map(|g| Self::clean(g)).collect(),
            actors,
            writers,
            directors,
            actors_names,
            writers_names,
            directors_names,
        })
    }
}
