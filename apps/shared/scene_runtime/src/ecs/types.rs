//! Component schemas and query types
//!
//! Component types form a closed set: a value can only be attached once its
//! type has been declared in the [`ComponentRegistry`], and every value is
//! checked against the declared shape before it reaches the store.

use scene_protocol::EntityId;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::HashMap;

use crate::error::{EcsError, Result};

/// Schema for a component type
///
/// The schema defines the fields and their types for validation, plus an
/// optional default used by `mutate` when the entity has no instance yet.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ComponentSchema {
    /// Component type id (e.g., "Transform", "Health")
    pub name: String,
    /// Field definitions
    #[serde(default)]
    pub fields: HashMap<String, FieldType>,
    /// Value used when mutating a component that is not attached
    #[serde(default)]
    pub default: Option<Value>,
}

impl ComponentSchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: HashMap::new(),
            default: None,
        }
    }

    /// Add a field to the schema
    pub fn with_field(mut self, name: impl Into<String>, field_type: FieldType) -> Self {
        self.fields.insert(name.into(), field_type);
        self
    }

    /// Set the default value
    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    /// Validate component data against this schema
    ///
    /// A schema without fields accepts any JSON value. A schema with fields
    /// requires an object and checks the fields that are present.
    pub fn validate(&self, data: &Value) -> std::result::Result<(), String> {
        if self.fields.is_empty() {
            return Ok(());
        }

        let obj = data
            .as_object()
            .ok_or_else(|| format!("Component '{}' data must be an object", self.name))?;

        for (field_name, field_type) in &self.fields {
            if let Some(value) = obj.get(field_name) {
                field_type.validate(value).map_err(|e| {
                    format!("Component '{}' field '{}': {}", self.name, field_name, e)
                })?;
            }
        }

        Ok(())
    }
}

/// Field type for component schema validation
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FieldType {
    /// A number (f64)
    Number,
    /// A string
    String,
    /// A boolean
    Bool,
    /// A 2D vector { x, y }
    Vec2,
    /// A 3D vector { x, y, z }
    Vec3,
    /// A rotation quaternion { x, y, z, w }
    Quaternion,
    /// A color { r, g, b, a } (values 0-1) or hex string
    Color,
    /// An entity reference (u64 ID)
    Entity,
    /// An array of values
    Array {
        /// Element type
        element: Box<FieldType>,
    },
    /// A nested object with defined fields
    Object {
        /// Field definitions
        fields: HashMap<String, FieldType>,
    },
    /// Any JSON value (no validation)
    Any,
}

fn check_numeric_fields(value: &Value, keys: &[&str]) -> std::result::Result<(), String> {
    let expected = format!("expected an object with {} fields", keys.join(", "));
    let obj = value.as_object().ok_or_else(|| expected.clone())?;

    for key in keys {
        match obj.get(*key) {
            None => return Err(expected),
            Some(v) if !v.is_number() => return Err(format!("{} must be numbers", keys.join(", "))),
            Some(_) => {}
        }
    }

    Ok(())
}

impl FieldType {
    /// Validate a JSON value against this field type
    pub fn validate(&self, value: &Value) -> std::result::Result<(), String> {
        match self {
            FieldType::Number => {
                if !value.is_number() {
                    return Err("expected a number".to_string());
                }
            }
            FieldType::String => {
                if !value.is_string() {
                    return Err("expected a string".to_string());
                }
            }
            FieldType::Bool => {
                if !value.is_boolean() {
                    return Err("expected a boolean".to_string());
                }
            }
            FieldType::Vec2 => check_numeric_fields(value, &["x", "y"])?,
            FieldType::Vec3 => check_numeric_fields(value, &["x", "y", "z"])?,
            FieldType::Quaternion => check_numeric_fields(value, &["x", "y", "z", "w"])?,
            FieldType::Color => {
                // Accept either a hex string or an object with r, g, b, a
                if let Some(s) = value.as_str() {
                    if !s.starts_with('#') || (s.len() != 7 && s.len() != 9) {
                        return Err(
                            "expected a hex color string (#RRGGBB or #RRGGBBAA)".to_string()
                        );
                    }
                } else if let Some(obj) = value.as_object() {
                    if !obj.contains_key("r") || !obj.contains_key("g") || !obj.contains_key("b") {
                        return Err(
                            "expected an object with r, g, b fields (a is optional)".to_string()
                        );
                    }
                } else {
                    return Err("expected a hex string or { r, g, b, a } object".to_string());
                }
            }
            FieldType::Entity => {
                if !value.is_u64() {
                    return Err("expected an entity ID (number)".to_string());
                }
            }
            FieldType::Array { element } => {
                let arr = value
                    .as_array()
                    .ok_or_else(|| "expected an array".to_string())?;
                for (i, item) in arr.iter().enumerate() {
                    element
                        .validate(item)
                        .map_err(|e| format!("element [{}]: {}", i, e))?;
                }
            }
            FieldType::Object { fields } => {
                let obj = value
                    .as_object()
                    .ok_or_else(|| "expected an object".to_string())?;
                for (field_name, field_type) in fields {
                    if let Some(field_value) = obj.get(field_name) {
                        field_type
                            .validate(field_value)
                            .map_err(|e| format!("field '{}': {}", field_name, e))?;
                    }
                }
            }
            FieldType::Any => {}
        }
        Ok(())
    }
}

/// The declared component types of a world
#[derive(Clone, Debug, Default)]
pub struct ComponentRegistry {
    schemas: HashMap<String, ComponentSchema>,
}

impl ComponentRegistry {
    /// An empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry pre-filled with the built-in scene components
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        for schema in builtin_schemas() {
            registry.register(schema);
        }
        registry
    }

    /// Declare a component type, returning the schema it replaced
    pub fn register(&mut self, schema: ComponentSchema) -> Option<ComponentSchema> {
        self.schemas.insert(schema.name.clone(), schema)
    }

    pub fn get(&self, name: &str) -> Option<&ComponentSchema> {
        self.schemas.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.schemas.contains_key(name)
    }

    /// Declared type ids, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.schemas.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Check a value for a declared component type
    pub fn validate(&self, name: &str, value: &Value) -> Result<()> {
        let schema = self
            .schemas
            .get(name)
            .ok_or_else(|| EcsError::UnknownComponentType(name.to_string()))?;

        schema
            .validate(value)
            .map_err(|reason| EcsError::InvalidComponentValue {
                component: name.to_string(),
                reason,
            })
    }

    /// Default value of a declared type, if it has one
    pub fn default_for(&self, name: &str) -> Option<&Value> {
        self.schemas.get(name).and_then(|schema| schema.default.as_ref())
    }
}

fn vec3(x: f64, y: f64, z: f64) -> Value {
    json!({ "x": x, "y": y, "z": z })
}

fn builtin_schemas() -> Vec<ComponentSchema> {
    let shape_flags = |schema: ComponentSchema| {
        schema
            .with_field("visible", FieldType::Bool)
            .with_field("withCollisions", FieldType::Bool)
    };

    vec![
        ComponentSchema::new("Transform")
            .with_field("position", FieldType::Vec3)
            .with_field("rotation", FieldType::Quaternion)
            .with_field("scale", FieldType::Vec3)
            .with_default(json!({
                "position": vec3(0.0, 0.0, 0.0),
                "rotation": { "x": 0.0, "y": 0.0, "z": 0.0, "w": 1.0 },
                "scale": vec3(1.0, 1.0, 1.0),
            })),
        shape_flags(ComponentSchema::new("GLTFShape").with_field("src", FieldType::String)),
        shape_flags(ComponentSchema::new("BoxShape")),
        shape_flags(ComponentSchema::new("SphereShape")),
        ComponentSchema::new("TextShape")
            .with_field("value", FieldType::String)
            .with_field("fontSize", FieldType::Number)
            .with_field("color", FieldType::Color),
        ComponentSchema::new("Billboard")
            .with_field("x", FieldType::Bool)
            .with_field("y", FieldType::Bool)
            .with_field("z", FieldType::Bool),
        ComponentSchema::new("AvatarShape")
            .with_field("id", FieldType::String)
            .with_field("name", FieldType::String)
            .with_field("bodyShape", FieldType::String)
            .with_field(
                "wearables",
                FieldType::Array {
                    element: Box::new(FieldType::String),
                },
            ),
        ComponentSchema::new("OnPointerDown")
            .with_field("button", FieldType::String)
            .with_field("hoverText", FieldType::String)
            .with_field("distance", FieldType::Number),
    ]
}

/// Result of a query operation
///
/// Contains the entity ID and all requested component data.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct QueryResult {
    pub entity_id: EntityId,
    /// Component data (component_name -> JSON data)
    pub components: HashMap<String, Value>,
}

impl QueryResult {
    pub fn new(entity_id: EntityId) -> Self {
        Self {
            entity_id,
            components: HashMap::new(),
        }
    }

    /// Add component data to the result
    pub fn with_component(mut self, name: impl Into<String>, data: Value) -> Self {
        self.components.insert(name.into(), data);
        self
    }

    /// Get component data by name
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.components.get(name)
    }
}

/// Options for entity queries
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct QueryOptions {
    /// Components that entities must have
    pub with_components: Vec<String>,
    /// Components that entities must NOT have
    pub without_components: Vec<String>,
    /// Limit the number of results
    pub limit: Option<usize>,
}

impl QueryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a required component
    pub fn with(mut self, component: impl Into<String>) -> Self {
        self.with_components.push(component.into());
        self
    }

    /// Add an excluded component
    pub fn without(mut self, component: impl Into<String>) -> Self {
        self.without_components.push(component.into());
        self
    }

    /// Set the result limit
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_type_number_validation() {
        assert!(FieldType::Number.validate(&json!(42)).is_ok());
        assert!(FieldType::Number.validate(&json!(3.14)).is_ok());
        assert!(FieldType::Number.validate(&json!("hello")).is_err());
    }

    #[test]
    fn test_field_type_vec2_validation() {
        assert!(FieldType::Vec2.validate(&json!({"x": 1, "y": 2})).is_ok());
        assert!(FieldType::Vec2.validate(&json!({"x": 1})).is_err());
        assert!(FieldType::Vec2
            .validate(&json!({"x": "a", "y": "b"}))
            .is_err());
    }

    #[test]
    fn test_field_type_quaternion_validation() {
        assert!(FieldType::Quaternion
            .validate(&json!({"x": 0, "y": 0, "z": 0, "w": 1}))
            .is_ok());
        assert!(FieldType::Quaternion
            .validate(&json!({"x": 0, "y": 0, "z": 0}))
            .is_err());
    }

    #[test]
    fn test_field_type_color_validation() {
        assert!(FieldType::Color.validate(&json!("#FF0000")).is_ok());
        assert!(FieldType::Color.validate(&json!("#FF0000FF")).is_ok());
        assert!(FieldType::Color
            .validate(&json!({"r": 1, "g": 0, "b": 0}))
            .is_ok());
        assert!(FieldType::Color.validate(&json!("red")).is_err());
    }

    #[test]
    fn test_component_schema_validation() {
        let schema = ComponentSchema::new("Player")
            .with_field("health", FieldType::Number)
            .with_field("name", FieldType::String)
            .with_field("position", FieldType::Vec2);

        let valid_data = json!({
            "health": 100,
            "name": "Hero",
            "position": {"x": 0, "y": 0}
        });
        assert!(schema.validate(&valid_data).is_ok());

        // Missing fields are OK
        let partial_data = json!({"health": 50});
        assert!(schema.validate(&partial_data).is_ok());

        let invalid_data = json!({"health": "not a number"});
        assert!(schema.validate(&invalid_data).is_err());

        assert!(schema.validate(&json!(5)).is_err());
    }

    #[test]
    fn test_schema_without_fields_accepts_anything() {
        let schema = ComponentSchema::new("Tag");
        assert!(schema.validate(&json!(true)).is_ok());
        assert!(schema.validate(&json!([1, 2, 3])).is_ok());
    }

    #[test]
    fn test_builtin_registry() {
        let registry = ComponentRegistry::with_builtin();

        assert!(registry.contains("Transform"));
        assert!(registry.contains("AvatarShape"));
        assert!(registry.default_for("Transform").is_some());
        assert!(registry.default_for("BoxShape").is_none());

        assert!(registry
            .validate("TextShape", &json!({"value": "hi", "fontSize": 12}))
            .is_ok());
        assert!(matches!(
            registry.validate("TextShape", &json!({"fontSize": "big"})),
            Err(EcsError::InvalidComponentValue { .. })
        ));
        assert!(matches!(
            registry.validate("Nope", &json!({})),
            Err(EcsError::UnknownComponentType(_))
        ));
    }

    #[test]
    fn test_register_replaces_schema() {
        let mut registry = ComponentRegistry::new();
        assert!(registry.register(ComponentSchema::new("Health")).is_none());

        let replaced = registry.register(
            ComponentSchema::new("Health").with_field("hp", FieldType::Number),
        );
        assert!(replaced.is_some());
        assert!(registry.validate("Health", &json!({"hp": "x"})).is_err());
        assert_eq!(registry.names(), vec!["Health"]);
    }

    #[test]
    fn test_query_options_builder() {
        let opts = QueryOptions::new()
            .with("Transform")
            .with("Velocity")
            .without("Frozen")
            .limit(10);

        assert_eq!(opts.with_components, vec!["Transform", "Velocity"]);
        assert_eq!(opts.without_components, vec!["Frozen"]);
        assert_eq!(opts.limit, Some(10));
    }
}
