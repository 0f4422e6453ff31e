//! Read-only checks over the definition graph of a document.

use std::collections::{HashMap, HashSet, VecDeque};

use indexmap::{IndexMap, IndexSet};

use crate::parse::parameter::ParameterOrRef;
use crate::parse::ref_resolve::parse_ref_name;
use crate::parse::response::ResponseOrRef;
use crate::parse::schema::{AdditionalProperties, Schema, SchemaOrRef};
use crate::parse::spec::SwaggerSpec;

/// Every `$ref` in `slot`, depth first.
pub fn slot_refs<'s>(slot: &'s SchemaOrRef, out: &mut Vec<&'s str>) {
    match slot {
        SchemaOrRef::Ref { ref_path, .. } => out.push(ref_path),
        SchemaOrRef::Schema(schema) => schema_refs(schema, out),
    }
}

/// Every `$ref` below `schema`: properties, items, additionalProperties, allOf.
pub fn schema_refs<'s>(schema: &'s Schema, out: &mut Vec<&'s str>) {
    for prop in schema.properties.values() {
        slot_refs(prop, out);
    }
    if let Some(items) = &schema.items {
        slot_refs(items, out);
    }
    if let Some(AdditionalProperties::Schema(inner)) = &schema.additional_properties {
        slot_refs(inner, out);
    }
    for part in &schema.all_of {
        slot_refs(part, out);
    }
}

/// Definition references made outside `definitions`: operation and path-level
/// parameters, operation responses, global parameters and global responses.
pub fn document_refs(spec: &SwaggerSpec) -> Vec<&str> {
    let mut out = Vec::new();
    for item in spec.paths.values() {
        for param in &item.parameters {
            parameter_refs(param, &mut out);
        }
        for (_, op) in item.operations() {
            for param in &op.parameters {
                parameter_refs(param, &mut out);
            }
            for response in op.responses.values() {
                if let ResponseOrRef::Response(response) = response {
                    if let Some(schema) = &response.schema {
                        slot_refs(schema, &mut out);
                    }
                }
            }
        }
    }
    for param in spec.parameters.values() {
        if let Some(schema) = &param.schema {
            slot_refs(schema, &mut out);
        }
    }
    for response in spec.responses.values() {
        if let Some(schema) = &response.schema {
            slot_refs(schema, &mut out);
        }
    }
    out
}

fn parameter_refs<'s>(param: &'s ParameterOrRef, out: &mut Vec<&'s str>) {
    if let ParameterOrRef::Parameter(param) = param {
        if let Some(schema) = &param.schema {
            slot_refs(schema, out);
        }
    }
}

/// Definition name to the distinct definitions it references, in order.
/// Malformed references are left out.
fn definition_edges(definitions: &IndexMap<String, SchemaOrRef>) -> IndexMap<&str, Vec<&str>> {
    definitions
        .iter()
        .map(|(name, slot)| {
            let mut refs = Vec::new();
            slot_refs(slot, &mut refs);
            let mut targets: Vec<&str> = Vec::new();
            for target in refs.into_iter().filter_map(|r| parse_ref_name(r).ok()) {
                if !targets.contains(&target) {
                    targets.push(target);
                }
            }
            (name.as_str(), targets)
        })
        .collect()
}

/// References that are malformed or name a missing definition, deduplicated.
pub fn dangling_references(spec: &SwaggerSpec) -> Vec<String> {
    let mut refs = document_refs(spec);
    for slot in spec.definitions.values() {
        slot_refs(slot, &mut refs);
    }
    let dangling: IndexSet<&str> = refs
        .into_iter()
        .filter(|r| match parse_ref_name(r) {
            Ok(name) => !spec.definitions.contains_key(name),
            Err(_) => true,
        })
        .collect();
    dangling.into_iter().map(str::to_string).collect()
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Visit {
    InProgress,
    Done,
}

/// Reference cycles among definitions, one per back-edge found by a
/// depth-first walk in definition order. Each cycle starts at the definition
/// the back-edge returns to.
pub fn find_cycles(spec: &SwaggerSpec) -> Vec<Vec<String>> {
    let edges = definition_edges(&spec.definitions);
    let mut state: HashMap<&str, Visit> = HashMap::new();
    let mut stack: Vec<&str> = Vec::new();
    let mut cycles = Vec::new();
    for &name in edges.keys() {
        if !state.contains_key(name) {
            walk(name, &edges, &mut state, &mut stack, &mut cycles);
        }
    }
    cycles
}

fn walk<'s>(
    name: &'s str,
    edges: &IndexMap<&'s str, Vec<&'s str>>,
    state: &mut HashMap<&'s str, Visit>,
    stack: &mut Vec<&'s str>,
    cycles: &mut Vec<Vec<String>>,
) {
    state.insert(name, Visit::InProgress);
    stack.push(name);
    let targets = edges.get(name).map(Vec::as_slice).unwrap_or_default();
    for &next in targets {
        match state.get(next).copied() {
            None if edges.contains_key(next) => walk(next, edges, state, stack, cycles),
            Some(Visit::InProgress) => {
                if let Some(pos) = stack.iter().position(|n| *n == next) {
                    cycles.push(stack[pos..].iter().map(|n| n.to_string()).collect());
                }
            }
            _ => {}
        }
    }
    stack.pop();
    state.insert(name, Visit::Done);
}

/// Names reachable from `entries` by following references between
/// definitions. Entries that name no definition are left out.
pub fn reachable_definitions<'s>(
    definitions: &IndexMap<String, SchemaOrRef>,
    entries: impl IntoIterator<Item = &'s str>,
) -> HashSet<String> {
    let edges = definition_edges(definitions);
    let mut reached: HashSet<String> = HashSet::new();
    let mut queue: VecDeque<String> = entries.into_iter().map(str::to_string).collect();
    while let Some(name) = queue.pop_front() {
        let Some(targets) = edges.get(name.as_str()) else {
            continue;
        };
        if reached.contains(&name) {
            continue;
        }
        queue.extend(targets.iter().map(|t| t.to_string()));
        reached.insert(name);
    }
    reached
}

/// Definition names referenced directly from outside `definitions`.
pub fn entry_definitions(spec: &SwaggerSpec) -> Vec<String> {
    let names: IndexSet<&str> = document_refs(spec)
        .into_iter()
        .filter_map(|r| parse_ref_name(r).ok())
        .collect();
    names.into_iter().map(str::to_string).collect()
}

/// Definitions no operation or global parameter/response reaches.
pub fn unreachable_definitions(spec: &SwaggerSpec) -> Vec<String> {
    let entries = entry_definitions(spec);
    let reached = reachable_definitions(&spec.definitions, entries.iter().map(String::as_str));
    spec.definitions
        .keys()
        .filter(|name| !reached.contains(name.as_str()))
        .cloned()
        .collect()
}
