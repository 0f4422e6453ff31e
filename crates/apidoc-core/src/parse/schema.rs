use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::ref_resolve::definition_ref;

/// A JSON Schema type keyword value, as allowed by Swagger 2.0.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaType {
    String,
    Number,
    Integer,
    Boolean,
    Array,
    Object,
    File,
    Null,
}

/// The `type` field can be a single type or an array of types.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TypeSet {
    Single(SchemaType),
    Multiple(Vec<SchemaType>),
}

impl TypeSet {
    /// True when the set is exactly the given type.
    pub fn is(&self, ty: SchemaType) -> bool {
        match self {
            TypeSet::Single(t) => *t == ty,
            TypeSet::Multiple(types) => types.len() == 1 && types[0] == ty,
        }
    }
}

/// A reference or inline schema.
///
/// Swagger generators put `description` (and occasionally `readOnly`) next to
/// a `$ref`; those siblings are kept so convention markers survive a round trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SchemaOrRef {
    Ref {
        #[serde(rename = "$ref")]
        ref_path: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        description: Option<String>,
        #[serde(rename = "readOnly", skip_serializing_if = "Option::is_none")]
        read_only: Option<bool>,
    },
    Schema(Box<Schema>),
}

impl SchemaOrRef {
    /// A bare `{"$ref": "#/definitions/<name>"}`.
    pub fn reference(name: &str) -> Self {
        SchemaOrRef::Ref {
            ref_path: definition_ref(name),
            description: None,
            read_only: None,
        }
    }

    pub fn inline(schema: Schema) -> Self {
        SchemaOrRef::Schema(Box::new(schema))
    }

    pub fn description(&self) -> Option<&str> {
        match self {
            SchemaOrRef::Ref { description, .. } => description.as_deref(),
            SchemaOrRef::Schema(schema) => schema.description.as_deref(),
        }
    }

    pub fn set_description(&mut self, text: &str) {
        match self {
            SchemaOrRef::Ref { description, .. } => *description = Some(text.to_string()),
            SchemaOrRef::Schema(schema) => schema.description = Some(text.to_string()),
        }
    }

    pub fn set_read_only(&mut self, value: bool) {
        match self {
            SchemaOrRef::Ref { read_only, .. } => *read_only = Some(value),
            SchemaOrRef::Schema(schema) => schema.read_only = Some(value),
        }
    }

    pub fn as_schema(&self) -> Option<&Schema> {
        match self {
            SchemaOrRef::Schema(schema) => Some(schema),
            SchemaOrRef::Ref { .. } => None,
        }
    }
}

/// A Swagger 2.0 schema object.
///
/// Keywords that are not modelled explicitly (vendor extensions, `xml`,
/// `externalDocs`, ...) are kept in `extensions` and written back verbatim.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Schema {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub schema_type: Option<TypeSet>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(rename = "default", skip_serializing_if = "Option::is_none")]
    pub default_value: Option<serde_json::Value>,

    // Object properties
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub properties: IndexMap<String, SchemaOrRef>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,

    #[serde(
        rename = "additionalProperties",
        skip_serializing_if = "Option::is_none"
    )]
    pub additional_properties: Option<AdditionalProperties>,

    // Array items
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<SchemaOrRef>>,

    // Composition
    #[serde(rename = "allOf", default, skip_serializing_if = "Vec::is_empty")]
    pub all_of: Vec<SchemaOrRef>,

    /// Swagger 2.0 discriminators are a plain property name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discriminator: Option<String>,

    // Enum values
    #[serde(rename = "enum", default, skip_serializing_if = "Vec::is_empty")]
    pub enum_values: Vec<serde_json::Value>,

    // Numeric constraints
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minimum: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maximum: Option<f64>,
    #[serde(rename = "exclusiveMinimum", skip_serializing_if = "Option::is_none")]
    pub exclusive_minimum: Option<bool>,
    #[serde(rename = "exclusiveMaximum", skip_serializing_if = "Option::is_none")]
    pub exclusive_maximum: Option<bool>,

    // String constraints
    #[serde(rename = "minLength", skip_serializing_if = "Option::is_none")]
    pub min_length: Option<u64>,
    #[serde(rename = "maxLength", skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,

    // Array constraints
    #[serde(rename = "minItems", skip_serializing_if = "Option::is_none")]
    pub min_items: Option<u64>,
    #[serde(rename = "maxItems", skip_serializing_if = "Option::is_none")]
    pub max_items: Option<u64>,
    #[serde(rename = "uniqueItems", skip_serializing_if = "Option::is_none")]
    pub unique_items: Option<bool>,

    #[serde(rename = "readOnly", skip_serializing_if = "Option::is_none")]
    pub read_only: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub example: Option<serde_json::Value>,

    #[serde(flatten)]
    pub extensions: IndexMap<String, serde_json::Value>,
}

impl Schema {
    /// An object schema with the given properties.
    pub fn object(properties: IndexMap<String, SchemaOrRef>) -> Self {
        Schema {
            schema_type: Some(TypeSet::Single(SchemaType::Object)),
            properties,
            ..Schema::default()
        }
    }

    /// A typed scalar schema carrying an example value.
    pub fn scalar(ty: SchemaType, format: Option<&str>, example: serde_json::Value) -> Self {
        Schema {
            schema_type: Some(TypeSet::Single(ty)),
            format: format.map(str::to_string),
            example: Some(example),
            ..Schema::default()
        }
    }

    pub fn is_array(&self) -> bool {
        self.schema_type
            .as_ref()
            .is_some_and(|t| t.is(SchemaType::Array))
    }

    /// Objects are either typed `object` or untyped with properties.
    pub fn is_object(&self) -> bool {
        match &self.schema_type {
            Some(t) => t.is(SchemaType::Object),
            None => !self.properties.is_empty(),
        }
    }
}

/// `additionalProperties` can be a boolean or a schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AdditionalProperties {
    Bool(bool),
    Schema(Box<SchemaOrRef>),
}
