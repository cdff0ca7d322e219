use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

use tracing::debug;

use crate::Validatable;
use crate::catalog::{CatalogDocument, CatalogRecord, Representation};
use crate::error::{Result, SchemaError};

/// Where a catalog comes from
#[derive(Debug, Clone)]
pub enum CatalogSource {
    /// A JSON file on disk
    File(PathBuf),
    /// JSON text already in memory
    Inline(String),
}

/// Read-only lookup table built from a catalog document
///
/// Loaded once, then only queried. Nothing in the scene runtime mutates it.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    records: HashMap<String, CatalogRecord>,
}

impl Catalog {
    /// Build a catalog from a parsed document, checking the rules the
    /// JSON schema cannot express
    pub fn from_document(document: CatalogDocument) -> Result<Self> {
        let records = match document {
            CatalogDocument::List(records) => records,
            CatalogDocument::Keyed(map) => {
                let mut records = Vec::with_capacity(map.len());
                for (key, record) in map {
                    if key != record.id {
                        return Err(SchemaError::InvalidCatalog(format!(
                            "key '{}' does not match record id '{}'",
                            key, record.id
                        )));
                    }
                    records.push(record);
                }
                records
            }
        };

        Self::from_records(records)
    }

    pub fn from_records(records: Vec<CatalogRecord>) -> Result<Self> {
        let mut seen = HashSet::new();
        let mut table = HashMap::with_capacity(records.len());

        for record in records {
            validate_record(&record)?;
            if !seen.insert(record.id.clone()) {
                return Err(SchemaError::InvalidCatalog(format!(
                    "duplicate record id '{}'",
                    record.id
                )));
            }
            table.insert(record.id.clone(), record);
        }

        Ok(Self { records: table })
    }

    pub fn get(&self, id: &str) -> Option<&CatalogRecord> {
        self.records.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.records.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// All record ids, sorted
    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.records.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    /// Records of one category, sorted by id
    pub fn by_category(&self, category: &str) -> Vec<&CatalogRecord> {
        let mut found: Vec<&CatalogRecord> = self
            .records
            .values()
            .filter(|record| record.category == category)
            .collect();
        found.sort_by(|a, b| a.id.cmp(&b.id));
        found
    }

    /// Localized display name of a record
    ///
    /// Falls back to English, then to the first available entry, then to
    /// the record id. Returns None only for unknown ids.
    pub fn display_name(&self, id: &str, locale: &str) -> Option<&str> {
        let record = self.records.get(id)?;

        let text = record
            .i18n
            .iter()
            .find(|entry| entry.code == locale)
            .or_else(|| record.i18n.iter().find(|entry| entry.code == "en"))
            .or_else(|| record.i18n.first())
            .map(|entry| entry.text.as_str())
            .unwrap_or(record.id.as_str());

        Some(text)
    }

    /// First representation of a record that supports the body shape
    pub fn representation_for(&self, id: &str, body_shape: &str) -> Option<&Representation> {
        self.records
            .get(id)?
            .representations
            .iter()
            .find(|representation| representation.supports(body_shape))
    }

    /// Content hash of a file inside the representation for a body shape
    pub fn content_hash(&self, id: &str, body_shape: &str, file: &str) -> Option<&str> {
        self.representation_for(id, body_shape)?.hash_of(file)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CatalogRecord> {
        self.records.values()
    }

    /// Give up the lookup wrapper and keep the plain id -> record map
    pub fn into_map(self) -> HashMap<String, CatalogRecord> {
        self.records
    }
}

fn validate_record(record: &CatalogRecord) -> Result<()> {
    if record.id.trim().is_empty() {
        return Err(SchemaError::InvalidCatalog("record with empty id".to_string()));
    }

    if record.representations.is_empty() {
        return Err(SchemaError::InvalidCatalog(format!(
            "record '{}' has no representations",
            record.id
        )));
    }

    for representation in &record.representations {
        if representation.hash_of(&representation.main_file).is_none() {
            return Err(SchemaError::InvalidCatalog(format!(
                "record '{}': main file '{}' is not listed in contents",
                record.id, representation.main_file
            )));
        }
    }

    Ok(())
}

/// Fetch, validate and index a catalog
pub async fn load_catalog(source: &CatalogSource) -> Result<Catalog> {
    let content = match source {
        CatalogSource::File(path) => tokio::fs::read_to_string(path)
            .await
            .map_err(|e| SchemaError::IoError(path.display().to_string(), e))?,
        CatalogSource::Inline(json) => json.clone(),
    };

    let document = CatalogDocument::from_json_str(&content)?;
    let catalog = Catalog::from_document(document)?;

    debug!("Loaded catalog with {} records", catalog.len());

    Ok(catalog)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn record_json(id: &str, category: &str, i18n: &str) -> String {
        format!(
            r#"{{
                "id": "{id}",
                "category": "{category}",
                "representations": [
                    {{
                        "bodyShapes": ["BaseMale"],
                        "mainFile": "male.glb",
                        "contents": [{{"file": "male.glb", "hash": "QmMale"}}]
                    }},
                    {{
                        "bodyShapes": ["BaseFemale"],
                        "mainFile": "female.glb",
                        "contents": [
                            {{"file": "female.glb", "hash": "QmFemale"}},
                            {{"file": "thumb.png", "hash": "QmThumb"}}
                        ]
                    }}
                ],
                "i18n": {i18n}
            }}"#
        )
    }

    fn sample_catalog() -> String {
        format!(
            "[{}, {}, {}]",
            record_json("hat_1", "hat", r#"[{"code": "en", "text": "Hat"}, {"code": "es", "text": "Sombrero"}]"#),
            record_json("eyes_1", "eyes", r#"[{"code": "fr", "text": "Yeux"}]"#),
            record_json("hat_0", "hat", "[]"),
        )
    }

    #[tokio::test]
    async fn test_load_inline_catalog() {
        let catalog = load_catalog(&CatalogSource::Inline(sample_catalog()))
            .await
            .unwrap();

        assert_eq!(catalog.len(), 3);
        assert!(catalog.contains("hat_1"));
        assert_eq!(catalog.ids(), vec!["eyes_1", "hat_0", "hat_1"]);

        let hats: Vec<&str> = catalog.by_category("hat").iter().map(|r| r.id.as_str()).collect();
        assert_eq!(hats, vec!["hat_0", "hat_1"]);
    }

    #[tokio::test]
    async fn test_load_catalog_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(sample_catalog().as_bytes()).unwrap();

        let catalog = load_catalog(&CatalogSource::File(file.path().to_path_buf()))
            .await
            .unwrap();
        assert_eq!(catalog.get("eyes_1").map(|r| r.category.as_str()), Some("eyes"));
    }

    #[tokio::test]
    async fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = load_catalog(&CatalogSource::File(dir.path().join("missing.json"))).await;
        assert!(matches!(result, Err(SchemaError::IoError(_, _))));
    }

    #[test]
    fn test_display_name_fallbacks() {
        let document = CatalogDocument::from_json_str(&sample_catalog()).unwrap();
        let catalog = Catalog::from_document(document).unwrap();

        assert_eq!(catalog.display_name("hat_1", "es"), Some("Sombrero"));
        assert_eq!(catalog.display_name("hat_1", "de"), Some("Hat"));
        assert_eq!(catalog.display_name("eyes_1", "de"), Some("Yeux"));
        assert_eq!(catalog.display_name("hat_0", "en"), Some("hat_0"));
        assert_eq!(catalog.display_name("unknown", "en"), None);
    }

    #[test]
    fn test_representation_lookup() {
        let document = CatalogDocument::from_json_str(&sample_catalog()).unwrap();
        let catalog = Catalog::from_document(document).unwrap();

        let rep = catalog.representation_for("hat_1", "BaseFemale").unwrap();
        assert_eq!(rep.main_file, "female.glb");
        assert_eq!(catalog.content_hash("hat_1", "BaseFemale", "thumb.png"), Some("QmThumb"));
        assert_eq!(catalog.content_hash("hat_1", "BaseMale", "thumb.png"), None);
        assert!(catalog.representation_for("hat_1", "Robot").is_none());
    }

    #[test]
    fn test_duplicate_ids_are_rejected() {
        let json = format!(
            "[{}, {}]",
            record_json("dup", "hat", "[]"),
            record_json("dup", "hat", "[]")
        );
        let document = CatalogDocument::from_json_str(&json).unwrap();
        assert!(matches!(
            Catalog::from_document(document),
            Err(SchemaError::InvalidCatalog(_))
        ));
    }

    #[test]
    fn test_keyed_document_key_must_match_id() {
        let json = format!(r#"{{"other": {}}}"#, record_json("hat_1", "hat", "[]"));
        let document = CatalogDocument::from_json_str(&json).unwrap();
        assert!(matches!(
            Catalog::from_document(document),
            Err(SchemaError::InvalidCatalog(_))
        ));
    }

    #[test]
    fn test_main_file_must_be_in_contents() {
        let json = r#"[{
            "id": "broken",
            "category": "hat",
            "representations": [{
                "bodyShapes": ["BaseMale"],
                "mainFile": "missing.glb",
                "contents": [{"file": "other.glb", "hash": "Qm"}]
            }]
        }]"#;
        let document = CatalogDocument::from_json_str(json).unwrap();
        assert!(Catalog::from_document(document).is_err());
    }
}
