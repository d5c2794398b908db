use serde_json::{json, Value};

/// Settings and mappings for the movies index. Applied only by explicit
/// `init-index` runs, never during steady-state sync.
pub fn movies_index_schema() -> Value {
    let person = json!({
        "type": "nested",
        "dynamic": "strict",
        "properties": {
            "id": { "type": "keyword" },
            "name": { "type": "text", "analyzer": "standard" }
        }
    });

    json!({
        "settings": {
            "refresh_interval": "1s",
            "number_of_shards": 1,
            "number_of_replicas": 0
        },
        "mappings": {
            "dynamic": "strict",
            "properties": {
                "id": { "type": "keyword" },
                "title": {
                    "type": "text",
                    "analyzer": "standard",
                    "fields": { "raw": { "type": "keyword" } }
                },
                "description": { "type": "text", "analyzer": "standard" },
                "imdb_rating": { "type": "float" },
                "genres": { "type": "keyword" },
                "actors": person,
                "writers": person,
                "directors": person,
                "actors_names": { "type": "text", "analyzer": "standard" },
                "writers_names": { "type": "text", "analyzer": "standard" },
                "directors_names": { "type": "text", "analyzer": "standard" }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_covers_every_document_field() {
        let schema = movies_index_schema();
        let props = &schema["mappings"]["properties"];
        for field in [
            "id",
            "title",
            "description",
            "imdb_rating",
            "genres",
            "actors",
            "writers",
            "directors",
            "actors_names",
            "writers_names",
            "directors_names",
        ] {
            assert!(!props[field].is_null(), "missing mapping for {field}");
        }
    }
}
