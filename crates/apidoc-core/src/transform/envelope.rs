//! Wraps successful responses in the standard `success` envelope and moves
//! them to the status code of their verb.

use indexmap::{IndexMap, IndexSet};
use serde_json::json;

use crate::config::EnvelopeStyle;
use crate::error::ResolveError;
use crate::parse::operation::{HttpMethod, Operation};
use crate::parse::ref_resolve::{RefResolver, parse_ref_name};
use crate::parse::response::ResponseOrRef;
use crate::parse::schema::{Schema, SchemaOrRef, SchemaType};
use crate::parse::spec::SwaggerSpec;

use super::property_ref::PropertyRef;

/// Response key the upstream generator uses for every success.
pub const OK_STATUS: &str = "200";

/// Property holding the success block.
pub const SUCCESS_PROPERTY: &str = "success";

/// Placeholder example of the success message.
pub const MESSAGE_EXAMPLE: &str = "<response message>";

/// Status code and status name a verb's success is reported under.
/// Verbs without an entry keep their responses untouched.
pub fn success_status(method: HttpMethod) -> Option<(u16, &'static str)> {
    match method {
        HttpMethod::Get => Some((200, "OK")),
        HttpMethod::Post => Some((201, "CREATED")),
        HttpMethod::Put => Some((202, "UPDATED")),
        HttpMethod::Delete => Some((203, "DELETED")),
        HttpMethod::Patch | HttpMethod::Head | HttpMethod::Options => None,
    }
}

/// The `success` object: `status`, `code` and `message`, each with an example.
pub fn success_block(code: u16, status: &str) -> Schema {
    let mut properties = IndexMap::new();
    properties.insert(
        "status".to_string(),
        SchemaOrRef::inline(Schema::scalar(SchemaType::String, None, json!(status))),
    );
    properties.insert(
        "code".to_string(),
        SchemaOrRef::inline(Schema::scalar(SchemaType::Integer, Some("int32"), json!(code))),
    );
    properties.insert(
        "message".to_string(),
        SchemaOrRef::inline(Schema::scalar(
            SchemaType::String,
            None,
            json!(MESSAGE_EXAMPLE),
        )),
    );
    Schema::object(properties)
}

/// Envelope every operation's `200` response.
///
/// The definition each `200` schema points at is appended to `roots`, whether
/// or not the verb is wrapped.
pub fn wrap_responses(
    spec: &mut SwaggerSpec,
    style: EnvelopeStyle,
    results_property: &str,
    roots: &mut IndexSet<String>,
) -> Result<(), ResolveError> {
    let SwaggerSpec {
        paths, definitions, ..
    } = spec;
    for (template, item) in paths.iter_mut() {
        for (method, op) in item.operations_mut() {
            if wrap_operation(method, op, definitions, style, results_property, roots)? {
                log::debug!("wrapped {method} {template}");
            }
        }
    }
    Ok(())
}

fn wrap_operation(
    method: HttpMethod,
    op: &mut Operation,
    definitions: &mut IndexMap<String, SchemaOrRef>,
    style: EnvelopeStyle,
    results_property: &str,
    roots: &mut IndexSet<String>,
) -> Result<bool, ResolveError> {
    let Some(ResponseOrRef::Response(response)) = op.responses.get_mut(OK_STATUS) else {
        return Ok(false);
    };
    let Some(schema) = response.schema.as_mut() else {
        return Ok(false);
    };
    if let Some(found) = PropertyRef::of(schema)? {
        roots.insert(found.name().to_string());
    }
    let Some((code, status)) = success_status(method) else {
        return Ok(false);
    };

    let block = success_block(code, status);
    let applied = match style {
        EnvelopeStyle::Wrap => {
            let payload = std::mem::replace(schema, SchemaOrRef::inline(Schema::default()));
            let mut properties = IndexMap::new();
            properties.insert(SUCCESS_PROPERTY.to_string(), SchemaOrRef::inline(block));
            properties.insert(results_property.to_string(), payload);
            *schema = SchemaOrRef::inline(Schema::object(properties));
            true
        }
        EnvelopeStyle::Inline => inject_success(schema, definitions, block)?,
    };
    if !applied {
        return Ok(false);
    }

    if let Some(moved) = op.responses.shift_remove(OK_STATUS) {
        op.responses.insert(code.to_string(), moved);
    }
    Ok(true)
}

/// Add `success` to the object the response schema describes.
fn inject_success(
    schema: &mut SchemaOrRef,
    definitions: &mut IndexMap<String, SchemaOrRef>,
    block: Schema,
) -> Result<bool, ResolveError> {
    match schema {
        SchemaOrRef::Ref { ref_path, .. } => {
            let mut target = RefResolver::new(definitions).resolve_ref(ref_path)?.clone();
            let name = parse_ref_name(ref_path)?.to_string();
            target
                .properties
                .insert(SUCCESS_PROPERTY.to_string(), SchemaOrRef::inline(block));
            definitions.insert(name, SchemaOrRef::inline(target));
            Ok(true)
        }
        SchemaOrRef::Schema(inline) if inline.is_object() => {
            inline
                .properties
                .insert(SUCCESS_PROPERTY.to_string(), SchemaOrRef::inline(block));
            Ok(true)
        }
        SchemaOrRef::Schema(_) => {
            log::debug!("response schema is not an object; leaving it unwrapped");
            Ok(false)
        }
    }
}
