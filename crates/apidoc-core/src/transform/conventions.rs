//! Rewrites the collection-operator and identifier conventions that the
//! upstream generator leaves in path templates and parameter lists.

use indexmap::{IndexMap, IndexSet};

use crate::error::ResolveError;
use crate::parse::operation::PathItem;
use crate::parse::parameter::{Parameter, ParameterLocation, ParameterOrRef};

use super::property_ref::PropertyRef;

/// Prefix of every convention marker placed in a description.
pub const MARKER_PREFIX: &str = "atlas.api.";

/// Suffix of parameter names that address a resource nested under a composite key.
pub const NESTED_ID_SUFFIX: &str = "id.resource_id";

/// The same suffix as it ends a path template segment.
const NESTED_ID_SEGMENT_SUFFIX: &str = "id.resource_id}";

/// Replacement text for the identifier marker.
pub const IDENTIFIER_DESCRIPTION: &str = "The resource identifier.";

pub const FILTER_DESCRIPTION: &str = concat!(
    "A collection of response resources can be filtered by a logical expression ",
    "string that includes JSON tag references to values in each resource, literal ",
    "values, and logical operators. If a resource does not have the specified tag, ",
    "its value is assumed to be null.",
    "\n",
    "Literal values include numbers (integer and floating-point), and quoted ",
    "(both single- or double-quoted) literal strings, and “null”. The following ",
    "operators are commonly used in filter expressions:\n",
    " | Op | Description |\n",
    " | -- | ----------- |\n",
    " | == | Equal |\n",
    " | != | Not Equal |\n",
    " | > | Greater Than |\n",
    " |  >= | Greater Than or Equal To |\n",
    " | < | Less Than |\n",
    " | <= | Less Than or Equal To |\n",
    " | and | Logical AND |\n",
    " | ~ | Matches Regex |\n",
    " | !~ | Does Not Match Regex |\n",
    " | or | Logical OR |\n",
    " | not | Logical NOT |\n",
    " | () | Groupping Operators |\n",
);

pub const ORDER_BY_DESCRIPTION: &str = concat!(
    "A collection of response resources can be sorted by their JSON tags. For a ",
    "“flat” resource, the tag name is straightforward. If sorting is allowed on ",
    "non-flat hierarchical resources, the service should implement a qualified ",
    "naming scheme such as dot-qualification to reference data down the hierarchy. ",
    "If a resource does not have the specified tag, its value is assumed to be null.)",
    "\n\n",
    "Specify this parameter as a comma-separated list of JSON tag names. The sort ",
    "direction can be specified by a suffix separated by whitespace before the tag ",
    "name. The suffix “asc” sorts the data in ascending order. The suffix “desc” ",
    "sorts the data in descending order. If no suffix is specified the data is sorted ",
    "in ascending order.",
);

pub const FIELDS_DESCRIPTION: &str = concat!(
    "A collection of response resources can be transformed by specifying a set of JSON ",
    "tags to be returned. For a “flat” resource, the tag name is straightforward. If ",
    "field selection is allowed on non-flat hierarchical resources, the service should ",
    "implement a qualified naming scheme such as dot-qualification to reference data down ",
    "the hierarchy. If a resource does not have the specified tag, the tag does not appear ",
    "in the output resource.",
    "\n\n",
    "Specify this parameter as a comma-separated list of JSON tag names.",
);

pub const OFFSET_DESCRIPTION: &str = concat!(
    "The integer index (zero-origin) of the offset into a collection of resources. ",
    "If omitted or null the value is assumed to be “0”.",
);

pub const LIMIT_DESCRIPTION: &str = concat!(
    "The integer number of resources to be returned in the response. The ",
    "service may impose maximum value. If omitted the service may impose ",
    "a default value.",
);

pub const PAGE_TOKEN_DESCRIPTION: &str = concat!(
    "The service-defined string used to identify a page of resources. A null value ",
    "indicates the first page.",
);

/// The conventions a marker can name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Convention {
    Filtering,
    Sorting,
    FieldSelection,
    Paging,
    Identifier,
}

impl Convention {
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "filtering" => Some(Convention::Filtering),
            "sorting" => Some(Convention::Sorting),
            "field_selection" => Some(Convention::FieldSelection),
            "paging" => Some(Convention::Paging),
            "identifier" => Some(Convention::Identifier),
            _ => None,
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            Convention::Filtering => "filtering",
            Convention::Sorting => "sorting",
            Convention::FieldSelection => "field_selection",
            Convention::Paging => "paging",
            Convention::Identifier => "identifier",
        }
    }

    /// The full marker string, e.g. `atlas.api.paging`.
    pub fn marker(&self) -> String {
        format!("{MARKER_PREFIX}{}", self.tag())
    }

    /// Query parameters that replace a collection-operator parameter.
    fn canonical_parameters(&self) -> Vec<Parameter> {
        match self {
            Convention::Filtering => {
                vec![Parameter::query("_filter", "string", None, FILTER_DESCRIPTION)]
            }
            Convention::Sorting => {
                vec![Parameter::query("_order_by", "string", None, ORDER_BY_DESCRIPTION)]
            }
            Convention::FieldSelection => {
                vec![Parameter::query("_fields", "string", None, FIELDS_DESCRIPTION)]
            }
            Convention::Paging => vec![
                Parameter::query("_offset", "integer", Some("int32"), OFFSET_DESCRIPTION),
                Parameter::query("_limit", "integer", Some("int32"), LIMIT_DESCRIPTION),
                Parameter::query("_page_token", "string", None, PAGE_TOKEN_DESCRIPTION),
            ],
            Convention::Identifier => Vec::new(),
        }
    }
}

/// A convention marker found in a description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Marker {
    Known(Convention),
    Unrecognized(String),
}

impl Marker {
    /// `None` when the description is not a marker at all.
    pub fn parse(description: &str) -> Option<Marker> {
        let tag = description.strip_prefix(MARKER_PREFIX)?;
        Some(match Convention::from_tag(tag) {
            Some(convention) => Marker::Known(convention),
            None => Marker::Unrecognized(tag.to_string()),
        })
    }

    pub fn is_identifier(description: Option<&str>) -> bool {
        description.and_then(Marker::parse) == Some(Marker::Known(Convention::Identifier))
    }
}

/// Replace every `{...id.resource_id}` segment of a path template with `{id}`.
pub fn rewrite_path_template(template: &str) -> String {
    template
        .split('/')
        .map(|segment| {
            if segment.ends_with(NESTED_ID_SEGMENT_SUFFIX) {
                "{id}"
            } else {
                segment
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Rewrite every path template and parameter list in place.
///
/// Body-parameter references are appended to `roots`. Templates that collapse
/// onto the same key are merged operation by operation.
pub fn rewrite_paths(
    paths: &mut IndexMap<String, PathItem>,
    roots: &mut IndexSet<String>,
) -> Result<(), ResolveError> {
    for (template, mut item) in std::mem::take(paths) {
        item.parameters = rewrite_parameters(std::mem::take(&mut item.parameters), roots)?;
        for (_, op) in item.operations_mut() {
            op.parameters = rewrite_parameters(std::mem::take(&mut op.parameters), roots)?;
        }

        let rewritten = rewrite_path_template(&template);
        if rewritten != template {
            log::debug!("path {template} -> {rewritten}");
        }
        match paths.get_mut(&rewritten) {
            Some(existing) => {
                for method in existing.merge(item) {
                    log::warn!(
                        "{template} collapses onto {rewritten}; keeping its {method} operation"
                    );
                }
            }
            None => {
                paths.insert(rewritten, item);
            }
        }
    }
    Ok(())
}

/// Rewrite one parameter list. References to global parameters pass through.
pub fn rewrite_parameters(
    params: Vec<ParameterOrRef>,
    roots: &mut IndexSet<String>,
) -> Result<Vec<ParameterOrRef>, ResolveError> {
    let mut fixed = Vec::with_capacity(params.len());
    for param in params {
        match param {
            ParameterOrRef::Parameter(p) => {
                for rewritten in rewrite_parameter(p) {
                    record_body_ref(&rewritten, roots)?;
                    fixed.push(ParameterOrRef::Parameter(rewritten));
                }
            }
            reference @ ParameterOrRef::Ref { .. } => fixed.push(reference),
        }
    }
    Ok(fixed)
}

fn rewrite_parameter(mut param: Parameter) -> Vec<Parameter> {
    match param.description.as_deref().and_then(Marker::parse) {
        // The path template already carries `{id}`; an identifier anywhere
        // else is redundant. The path parameter itself only gets the text.
        Some(Marker::Known(Convention::Identifier)) => {
            if param.location != ParameterLocation::Path {
                log::debug!("dropping identifier parameter {}", param.name);
                return Vec::new();
            }
            param.description = Some(IDENTIFIER_DESCRIPTION.to_string());
        }
        Some(Marker::Known(convention)) => {
            log::debug!("expanding {} ({})", param.name, convention.marker());
            return convention.canonical_parameters();
        }
        // Only the four known conventions rewrite; other parameters pass through.
        Some(Marker::Unrecognized(tag)) => {
            log::warn!(
                "parameter {} carries unknown marker {MARKER_PREFIX}{tag}; left as is",
                param.name
            );
        }
        None => {}
    }

    if param.name.ends_with(NESTED_ID_SUFFIX) {
        log::debug!("renaming parameter {} -> id", param.name);
        param.name = "id".to_string();
    }
    vec![param]
}

fn record_body_ref(param: &Parameter, roots: &mut IndexSet<String>) -> Result<(), ResolveError> {
    if param.location != ParameterLocation::Body {
        return Ok(());
    }
    if let Some(schema) = &param.schema {
        if let Some(found) = PropertyRef::of(schema)? {
            roots.insert(found.name().to_string());
        }
    }
    Ok(())
}
