use std::collections::HashSet;

use indexmap::IndexMap;

use super::schema::{Schema, SchemaOrRef};
use crate::error::ResolveError;

/// JSON pointer prefix of every definition reference.
pub const DEFINITIONS_PREFIX: &str = "#/definitions/";

/// Build the `$ref` string for a definition name.
pub fn definition_ref(name: &str) -> String {
    format!("{DEFINITIONS_PREFIX}{name}")
}

/// Parse a `$ref` path like `#/definitions/Foo` and extract the name.
pub fn parse_ref_name(ref_path: &str) -> Result<&str, ResolveError> {
    match ref_path.strip_prefix(DEFINITIONS_PREFIX) {
        Some(name) if !name.is_empty() && !name.contains('/') => Ok(name),
        _ => Err(ResolveError::InvalidRefFormat(ref_path.to_string())),
    }
}

/// Looks definitions up by name, following definition-level aliases
/// (`definitions.A = {"$ref": "#/definitions/B"}`) to the schema they name.
pub struct RefResolver<'a> {
    definitions: &'a IndexMap<String, SchemaOrRef>,
}

impl<'a> RefResolver<'a> {
    pub fn new(definitions: &'a IndexMap<String, SchemaOrRef>) -> Self {
        Self { definitions }
    }

    /// Resolve a `#/definitions/<name>` reference.
    pub fn resolve_ref(&self, ref_path: &str) -> Result<&'a Schema, ResolveError> {
        self.resolve(parse_ref_name(ref_path)?)
    }

    /// Resolve a definition by its bare name.
    pub fn resolve(&self, name: &str) -> Result<&'a Schema, ResolveError> {
        let mut visited: HashSet<&str> = HashSet::new();
        let mut current = name;
        loop {
            if !visited.insert(current) {
                return Err(ResolveError::CircularRef(name.to_string()));
            }
            match self.definitions.get(current) {
                Some(SchemaOrRef::Schema(schema)) => return Ok(&**schema),
                Some(SchemaOrRef::Ref { ref_path, .. }) => current = parse_ref_name(ref_path)?,
                None => return Err(ResolveError::RefTargetNotFound(definition_ref(current))),
            }
        }
    }
}
