use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::Validatable;

/// A file shipped with a representation, addressed by content hash
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ContentEntry {
    /// File name as referenced by `mainFile`
    pub file: String,

    /// Content hash used to fetch the file
    pub hash: String,
}

/// How an item looks on a given set of body shapes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Representation {
    #[schemars(description = "Body shapes this representation applies to")]
    pub body_shapes: Vec<String>,

    #[schemars(description = "Model file to load, must be listed in contents")]
    pub main_file: String,

    pub contents: Vec<ContentEntry>,

    #[serde(default)]
    pub override_hides: Vec<String>,

    #[serde(default)]
    pub override_replaces: Vec<String>,
}

impl Representation {
    pub fn supports(&self, body_shape: &str) -> bool {
        self.body_shapes.iter().any(|shape| shape == body_shape)
    }

    pub fn hash_of(&self, file: &str) -> Option<&str> {
        self.contents
            .iter()
            .find(|entry| entry.file == file)
            .map(|entry| entry.hash.as_str())
    }
}

/// Display string for one locale
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct LocalizedText {
    /// Language code, e.g. "en" or "es"
    pub code: String,
    pub text: String,
}

/// One read-only entry of a static catalog (a wearable, an avatar part, ...)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
#[schemars(title = "Catalog Record")]
#[schemars(description = "Static metadata for an item that scenes can reference by id")]
pub struct CatalogRecord {
    #[schemars(description = "Unique id of the record")]
    pub id: String,

    #[serde(default)]
    pub description: String,

    #[schemars(description = "Category, e.g. 'hat', 'upper_body', 'eyes'")]
    pub category: String,

    #[serde(default)]
    pub rarity: Option<String>,

    #[serde(default)]
    pub tags: Vec<String>,

    #[serde(default)]
    pub hides: Vec<String>,

    #[serde(default)]
    pub replaces: Vec<String>,

    pub representations: Vec<Representation>,

    #[serde(default)]
    pub i18n: Vec<LocalizedText>,

    #[serde(default)]
    pub thumbnail: Option<String>,

    #[serde(default)]
    pub image: Option<String>,

    /// Epoch milliseconds
    #[serde(default)]
    pub created_at: u64,

    /// Epoch milliseconds
    #[serde(default)]
    pub updated_at: u64,
}

/// Top level shape of a catalog file
///
/// Either a plain array of records or an object keyed by record id.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
#[schemars(title = "Catalog")]
pub enum CatalogDocument {
    List(Vec<CatalogRecord>),
    Keyed(BTreeMap<String, CatalogRecord>),
}

impl CatalogDocument {
    pub fn len(&self) -> usize {
        match self {
            CatalogDocument::List(records) => records.len(),
            CatalogDocument::Keyed(records) => records.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Validatable for CatalogDocument {}

#[cfg(test)]
mod tests {
    use super::*;

    const HAT: &str = r#"{
        "id": "urn:catalog:base:red_cap",
        "description": "A red cap",
        "category": "hat",
        "tags": ["cap", "red"],
        "hides": ["hair"],
        "representations": [{
            "bodyShapes": ["BaseMale", "BaseFemale"],
            "mainFile": "red_cap.glb",
            "contents": [
                {"file": "red_cap.glb", "hash": "QmCap"},
                {"file": "red_cap.png", "hash": "QmCapTex"}
            ]
        }],
        "i18n": [{"code": "en", "text": "Red Cap"}],
        "createdAt": 1600000000000,
        "updatedAt": 1600000000001
    }"#;

    #[test]
    fn test_valid_list_document() {
        let json = format!("[{}]", HAT);
        let doc = CatalogDocument::from_json_str(&json).unwrap();

        assert_eq!(doc.len(), 1);
        match doc {
            CatalogDocument::List(records) => {
                let record = &records[0];
                assert_eq!(record.category, "hat");
                assert_eq!(record.rarity, None);
                assert_eq!(record.representations[0].main_file, "red_cap.glb");
                assert_eq!(record.representations[0].hash_of("red_cap.png"), Some("QmCapTex"));
                assert!(record.representations[0].supports("BaseFemale"));
            }
            CatalogDocument::Keyed(_) => panic!("expected a list document"),
        }
    }

    #[test]
    fn test_valid_keyed_document() {
        let json = format!(r#"{{"urn:catalog:base:red_cap": {}}}"#, HAT);
        let doc = CatalogDocument::from_json_str(&json).unwrap();
        assert!(matches!(doc, CatalogDocument::Keyed(ref records) if records.len() == 1));
    }

    #[test]
    fn test_record_missing_category_fails_validation() {
        let json = r#"[{"id": "x", "representations": []}]"#;
        assert!(CatalogDocument::from_json_str(json).is_err());
    }

    #[test]
    fn test_schema_generation() {
        let schema = CatalogDocument::schema_json().unwrap();
        assert!(schema.contains("Catalog Record"));
        assert!(schema.contains("mainFile"));
    }
}
