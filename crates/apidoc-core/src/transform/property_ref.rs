use crate::error::ResolveError;
use crate::parse::ref_resolve::{definition_ref, parse_ref_name};
use crate::parse::schema::{AdditionalProperties, SchemaOrRef};

/// How a schema slot (property, body parameter, response) points at a
/// named definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyRef {
    /// `{"$ref": "#/definitions/X"}`
    Direct(String),
    /// `{"type": "array", "items": {"$ref": "#/definitions/X"}}`
    ArrayOf(String),
    /// `{"type": "object", "additionalProperties": {"$ref": "#/definitions/X"}}`
    MapOf(String),
}

impl PropertyRef {
    /// Classify a slot. Scalars and inline objects carry no reference.
    pub fn of(slot: &SchemaOrRef) -> Result<Option<Self>, ResolveError> {
        let found = match slot {
            SchemaOrRef::Ref { ref_path, .. } => {
                Some(PropertyRef::Direct(parse_ref_name(ref_path)?.to_string()))
            }
            SchemaOrRef::Schema(schema) if schema.is_array() => match schema.items.as_deref() {
                Some(SchemaOrRef::Ref { ref_path, .. }) => {
                    Some(PropertyRef::ArrayOf(parse_ref_name(ref_path)?.to_string()))
                }
                _ => None,
            },
            SchemaOrRef::Schema(schema) if schema.is_object() && schema.properties.is_empty() => {
                match &schema.additional_properties {
                    Some(AdditionalProperties::Schema(inner)) => match &**inner {
                        SchemaOrRef::Ref { ref_path, .. } => {
                            Some(PropertyRef::MapOf(parse_ref_name(ref_path)?.to_string()))
                        }
                        SchemaOrRef::Schema(_) => None,
                    },
                    _ => None,
                }
            }
            SchemaOrRef::Schema(_) => None,
        };
        Ok(found)
    }

    /// Name of the referenced definition.
    pub fn name(&self) -> &str {
        match self {
            PropertyRef::Direct(name) | PropertyRef::ArrayOf(name) | PropertyRef::MapOf(name) => {
                name
            }
        }
    }

    /// Point `slot` at `new_name`, keeping its wrapping and sibling keywords.
    pub fn retarget(&self, slot: &mut SchemaOrRef, new_name: &str) {
        if let Some(ref_path) = ref_path_mut(slot) {
            log::debug!("retarget {self:?} -> {new_name}");
            *ref_path = definition_ref(new_name);
        }
    }
}

fn ref_path_mut(slot: &mut SchemaOrRef) -> Option<&mut String> {
    let schema = match slot {
        SchemaOrRef::Ref { ref_path, .. } => return Some(ref_path),
        SchemaOrRef::Schema(schema) => schema,
    };
    let inner = if schema.is_array() {
        schema.items.as_deref_mut()
    } else {
        match schema.additional_properties.as_mut() {
            Some(AdditionalProperties::Schema(inner)) => Some(&mut **inner),
            _ => None,
        }
    };
    match inner {
        Some(SchemaOrRef::Ref { ref_path, .. }) => Some(ref_path),
        _ => None,
    }
}
