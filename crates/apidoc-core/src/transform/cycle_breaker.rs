//! Rewrites reference cycles in the definition graph into acyclic,
//! path-specific definitions.
//!
//! A walk starts at a used definition and follows property references
//! depth first, carrying the trace of definitions on the current path.
//! A property that points back into the trace is dropped, and the node is
//! re-emitted under a name built from the cycle it closes (deepest first,
//! joined with the separator): for `A -> B -> A` rooted at `A`, `B` becomes
//! `B_In_A` without its `a` property and `A.b` is retargeted to it.

use indexmap::{IndexMap, IndexSet};

use crate::error::ResolveError;
use crate::parse::ref_resolve::{RefResolver, parse_ref_name};
use crate::parse::schema::{AdditionalProperties, Schema, SchemaOrRef};

use super::analysis::slot_refs;
use super::conventions::{IDENTIFIER_DESCRIPTION, Marker};
use super::property_ref::PropertyRef;
use super::prune::DefinitionLedger;

pub struct CycleBreaker<'a> {
    definitions: &'a mut IndexMap<String, SchemaOrRef>,
    ledger: &'a mut DefinitionLedger,
    separator: &'a str,
    discovered: IndexSet<String>,
    unbroken: IndexSet<String>,
}

impl<'a> CycleBreaker<'a> {
    pub fn new(
        definitions: &'a mut IndexMap<String, SchemaOrRef>,
        ledger: &'a mut DefinitionLedger,
        separator: &'a str,
    ) -> Self {
        Self {
            definitions,
            ledger,
            separator,
            discovered: IndexSet::new(),
            unbroken: IndexSet::new(),
        }
    }

    /// Walk the graph below the definition `root`.
    pub fn break_cycles(&mut self, root: &str) -> Result<(), ResolveError> {
        let schema = self.resolve(root)?;
        if let Some(renamed) = self.visit(root, schema, &[])? {
            log::warn!("root {root} was flattened to {renamed}; keeping both");
            self.ledger.mark_used(root);
        }
        Ok(())
    }

    /// Definitions reached through references the property walk does not
    /// follow: inline nesting, `items`/`additionalProperties`/`allOf` of a
    /// definition, and alias targets. Drained on each call.
    pub fn take_discovered(&mut self) -> Vec<String> {
        std::mem::take(&mut self.discovered).into_iter().collect()
    }

    /// Cycles closed through a nested schema, as `"from -> to"`. These are
    /// queued like any other nested reference and stay in the document.
    pub fn into_unbroken(self) -> Vec<String> {
        self.unbroken.into_iter().collect()
    }

    fn resolve(&mut self, name: &str) -> Result<Schema, ResolveError> {
        if let Some(SchemaOrRef::Ref { ref_path, .. }) = self.definitions.get(name) {
            let target = parse_ref_name(ref_path)?.to_string();
            self.discovered.insert(target);
        }
        Ok(RefResolver::new(&*self.definitions).resolve(name)?.clone())
    }

    fn discover<'s>(
        &mut self,
        trace: &[String],
        refs: impl IntoIterator<Item = &'s str>,
    ) -> Result<(), ResolveError> {
        for ref_path in refs {
            let name = parse_ref_name(ref_path)?;
            if trace.iter().any(|n| n == name) {
                let owner = trace.last().map(String::as_str).unwrap_or(name);
                log::warn!("{owner} reaches {name} through a nested schema; cycle left in place");
                self.unbroken.insert(format!("{owner} -> {name}"));
            }
            if !self.discovered.contains(name) {
                log::debug!("queued {name}");
                self.discovered.insert(name.to_string());
            }
        }
        Ok(())
    }

    fn discover_structural(&mut self, trace: &[String], node: &Schema) -> Result<(), ResolveError> {
        let mut refs = Vec::new();
        if let Some(items) = &node.items {
            slot_refs(items, &mut refs);
        }
        if let Some(AdditionalProperties::Schema(inner)) = &node.additional_properties {
            slot_refs(inner, &mut refs);
        }
        for part in &node.all_of {
            slot_refs(part, &mut refs);
        }
        self.discover(trace, refs)
    }

    /// Rewrite `node` (the definition `name`) and everything below it.
    ///
    /// Returns the name the caller must now point at, or `None` when the
    /// caller's reference stays as it is.
    fn visit(
        &mut self,
        name: &str,
        mut node: Schema,
        ancestors: &[String],
    ) -> Result<Option<String>, ResolveError> {
        let mut trace = ancestors.to_vec();
        trace.push(name.to_string());

        self.discover_structural(&trace, &node)?;

        let mut flattened: Option<String> = None;
        let mut cycle_len = 0;
        let mut touched = false;
        let mut survivors = IndexMap::with_capacity(node.properties.len());

        for (prop_name, mut prop) in std::mem::take(&mut node.properties) {
            if Marker::is_identifier(prop.description()) {
                prop.set_description(IDENTIFIER_DESCRIPTION);
                if prop_name == "id" {
                    prop.set_read_only(true);
                }
                touched = true;
            }

            let Some(target) = PropertyRef::of(&prop)? else {
                let mut nested = Vec::new();
                slot_refs(&prop, &mut nested);
                self.discover(&trace, nested)?;
                survivors.insert(prop_name, prop);
                continue;
            };

            if let Some(pos) = trace.iter().position(|n| n == target.name()) {
                let cycle = &trace[pos..];
                log::debug!("back-edge {name}.{prop_name} -> {}", target.name());
                if cycle.len() > cycle_len {
                    cycle_len = cycle.len();
                    flattened = Some(
                        cycle
                            .iter()
                            .rev()
                            .map(String::as_str)
                            .collect::<Vec<_>>()
                            .join(self.separator),
                    );
                }
                continue;
            }

            let child = self.resolve(target.name())?;
            match self.visit(target.name(), child, &trace)? {
                Some(renamed) => {
                    target.retarget(&mut prop, &renamed);
                    if flattened.is_none() {
                        let prefix = format!("{}{}", target.name(), self.separator);
                        let inherited = renamed.strip_prefix(&prefix).unwrap_or(&renamed);
                        flattened = Some(inherited.to_string());
                    }
                }
                None => self.ledger.mark_used(target.name()),
            }
            survivors.insert(prop_name, prop);
        }
        node.properties = survivors;

        match flattened {
            Some(flat) => {
                node.required.retain(|r| node.properties.contains_key(r));
                log::debug!("staging {flat} for {name}");
                self.ledger.stage(&flat, node);
                Ok((flat != name).then_some(flat))
            }
            None => {
                if touched {
                    self.write_back(name, node);
                }
                self.ledger.mark_used(name);
                Ok(None)
            }
        }
    }

    fn write_back(&mut self, name: &str, node: Schema) {
        match self.definitions.get_mut(name) {
            Some(SchemaOrRef::Schema(existing)) => **existing = node,
            _ => log::debug!("{name} is an alias; identifier descriptions left on its target"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_SEPARATOR;

    fn definitions(json: &str) -> IndexMap<String, SchemaOrRef> {
        serde_json::from_str(json).unwrap()
    }

    fn run(
        defs: &mut IndexMap<String, SchemaOrRef>,
        roots: &[&str],
    ) -> Result<DefinitionLedger, ResolveError> {
        let mut ledger = DefinitionLedger::new();
        let mut breaker = CycleBreaker::new(defs, &mut ledger, DEFAULT_SEPARATOR);
        for root in roots {
            breaker.break_cycles(root)?;
        }
        Ok(ledger)
    }

    fn staged<'l>(ledger: &'l DefinitionLedger, name: &str) -> &'l Schema {
        &ledger.synthesized()[name].schema
    }

    fn target(slot: &SchemaOrRef) -> String {
        PropertyRef::of(slot).unwrap().unwrap().name().to_string()
    }

    #[test]
    fn self_reference_is_dropped_under_own_name() {
        let mut defs = definitions(
            r##"{
                "contactsNode": {
                    "type": "object",
                    "required": ["name", "parent"],
                    "properties": {
                        "name": {"type": "string"},
                        "parent": {"$ref": "#/definitions/contactsNode"}
                    }
                }
            }"##,
        );
        let ledger = run(&mut defs, &["contactsNode"]).unwrap();
        let draft = staged(&ledger, "contactsNode");
        assert_eq!(draft.properties.keys().collect::<Vec<_>>(), vec!["name"]);
        assert_eq!(draft.required, vec!["name"]);
        assert_eq!(ledger.synthesized().len(), 1);
        assert!(ledger.is_used("contactsNode"));
    }

    #[test]
    fn mutual_cycle_flattens_child_into_path_name() {
        let mut defs = definitions(
            r##"{
                "A": {"type": "object", "properties": {
                    "name": {"type": "string"},
                    "b": {"$ref": "#/definitions/B"}
                }},
                "B": {"type": "object", "properties": {
                    "a": {"$ref": "#/definitions/A"},
                    "label": {"type": "string"}
                }}
            }"##,
        );
        let ledger = run(&mut defs, &["A"]).unwrap();

        let flat = staged(&ledger, "B_In_A");
        assert_eq!(flat.properties.keys().collect::<Vec<_>>(), vec!["label"]);

        let head = staged(&ledger, "A");
        assert_eq!(target(&head.properties["b"]), "B_In_A");
        assert!(ledger.is_used("A"));
        assert!(ledger.is_used("B_In_A"));
        assert!(!ledger.is_used("B"));
        // Drafts do not leak into the document before finalization.
        assert!(!defs.contains_key("B_In_A"));
        assert_eq!(target(&defs["A"].as_schema().unwrap().properties["b"]), "B");
    }

    #[test]
    fn three_node_cycle_names_every_level() {
        let mut defs = definitions(
            r##"{
                "A": {"type": "object", "properties": {"b": {"$ref": "#/definitions/B"}}},
                "B": {"type": "object", "properties": {"c": {"$ref": "#/definitions/C"}}},
                "C": {"type": "object", "properties": {
                    "a": {"$ref": "#/definitions/A"},
                    "note": {"type": "string"}
                }}
            }"##,
        );
        let ledger = run(&mut defs, &["A"]).unwrap();
        assert_eq!(target(&staged(&ledger, "A").properties["b"]), "B_In_A");
        assert_eq!(
            target(&staged(&ledger, "B_In_A").properties["c"]),
            "C_In_B_In_A"
        );
        assert_eq!(
            staged(&ledger, "C_In_B_In_A")
                .properties
                .keys()
                .collect::<Vec<_>>(),
            vec!["note"]
        );
    }

    #[test]
    fn inner_cycle_does_not_rename_the_root() {
        // A -> B -> C -> B: the cycle closes at B, A keeps pointing at B.
        let mut defs = definitions(
            r##"{
                "A": {"type": "object", "properties": {"b": {"$ref": "#/definitions/B"}}},
                "B": {"type": "object", "properties": {"c": {"$ref": "#/definitions/C"}}},
                "C": {"type": "object", "properties": {"b": {"$ref": "#/definitions/B"}}}
            }"##,
        );
        let ledger = run(&mut defs, &["A"]).unwrap();
        assert!(ledger.is_used("A"));
        assert!(ledger.is_used("B"));
        assert_eq!(target(&staged(&ledger, "B").properties["c"]), "C_In_B");
        assert!(staged(&ledger, "C_In_B").properties.is_empty());
        assert!(!ledger.synthesized().contains_key("A"));
    }

    #[test]
    fn longest_back_edge_wins_and_first_longest_on_tie() {
        // C points back at both B (short cycle) and A (long cycle).
        let mut defs = definitions(
            r##"{
                "A": {"type": "object", "properties": {"b": {"$ref": "#/definitions/B"}}},
                "B": {"type": "object", "properties": {"c": {"$ref": "#/definitions/C"}}},
                "C": {"type": "object", "properties": {
                    "toB": {"$ref": "#/definitions/B"},
                    "toA": {"$ref": "#/definitions/A"},
                    "toAgain": {"$ref": "#/definitions/A"}
                }}
            }"##,
        );
        let ledger = run(&mut defs, &["A"]).unwrap();
        assert!(ledger.synthesized().contains_key("C_In_B_In_A"));
        assert!(!ledger.synthesized().contains_key("C_In_B"));
        assert!(staged(&ledger, "C_In_B_In_A").properties.is_empty());
    }

    #[test]
    fn local_back_edge_beats_inherited_name() {
        // B first inherits its own name from C, then closes A -> B -> A itself.
        let mut defs = definitions(
            r##"{
                "A": {"type": "object", "properties": {"b": {"$ref": "#/definitions/B"}}},
                "B": {"type": "object", "properties": {
                    "c": {"$ref": "#/definitions/C"},
                    "a": {"$ref": "#/definitions/A"}
                }},
                "C": {"type": "object", "properties": {"b": {"$ref": "#/definitions/B"}}}
            }"##,
        );
        let ledger = run(&mut defs, &["A"]).unwrap();
        let b = staged(&ledger, "B_In_A");
        assert_eq!(b.properties.keys().collect::<Vec<_>>(), vec!["c"]);
        assert_eq!(target(&b.properties["c"]), "C_In_B");
        assert_eq!(target(&staged(&ledger, "A").properties["b"]), "B_In_A");
    }

    #[test]
    fn array_and_map_wrapping_survive_retarget() {
        let mut defs = definitions(
            r##"{
                "contactsContact": {"type": "object", "properties": {
                    "groups": {"type": "array", "items": {"$ref": "#/definitions/contactsGroup"}},
                    "byName": {"type": "object", "additionalProperties": {"$ref": "#/definitions/contactsGroup"}}
                }},
                "contactsGroup": {"type": "object", "properties": {
                    "contacts": {"type": "array", "items": {"$ref": "#/definitions/contactsContact"}},
                    "name": {"type": "string"}
                }}
            }"##,
        );
        let ledger = run(&mut defs, &["contactsContact"]).unwrap();
        let head = staged(&ledger, "contactsContact");
        let groups = &head.properties["groups"];
        assert!(matches!(
            PropertyRef::of(groups).unwrap(),
            Some(PropertyRef::ArrayOf(name)) if name == "contactsGroup_In_contactsContact"
        ));
        assert!(matches!(
            PropertyRef::of(&head.properties["byName"]).unwrap(),
            Some(PropertyRef::MapOf(name)) if name == "contactsGroup_In_contactsContact"
        ));
        assert_eq!(
            staged(&ledger, "contactsGroup_In_contactsContact")
                .properties
                .keys()
                .collect::<Vec<_>>(),
            vec!["name"]
        );
    }

    #[test]
    fn identifier_marker_is_rewritten_and_id_is_read_only() {
        let mut defs = definitions(
            r##"{
                "contactsContact": {"type": "object", "properties": {
                    "id": {"$ref": "#/definitions/atlasrpcIdentifier", "description": "atlas.api.identifier"},
                    "owner_id": {"$ref": "#/definitions/atlasrpcIdentifier", "description": "atlas.api.identifier"}
                }},
                "atlasrpcIdentifier": {"type": "object", "properties": {"resource_id": {"type": "string"}}}
            }"##,
        );
        let ledger = run(&mut defs, &["contactsContact"]).unwrap();
        assert!(ledger.is_used("atlasrpcIdentifier"));
        assert!(ledger.synthesized().is_empty());

        let contact = defs["contactsContact"].as_schema().unwrap();
        let id = serde_json::to_value(&contact.properties["id"]).unwrap();
        assert_eq!(id["description"], IDENTIFIER_DESCRIPTION);
        assert_eq!(id["readOnly"], true);
        let owner = serde_json::to_value(&contact.properties["owner_id"]).unwrap();
        assert_eq!(owner["description"], IDENTIFIER_DESCRIPTION);
        assert!(owner.get("readOnly").is_none());
    }

    #[test]
    fn acyclic_graph_only_marks_usage() {
        let mut defs = definitions(
            r##"{
                "contactsContact": {"type": "object", "properties": {"email": {"$ref": "#/definitions/contactsEmail"}}},
                "contactsEmail": {"type": "object", "properties": {"address": {"type": "string"}}}
            }"##,
        );
        let before = defs.clone();
        let ledger = run(&mut defs, &["contactsContact"]).unwrap();
        assert_eq!(defs, before);
        assert!(ledger.synthesized().is_empty());
        assert!(ledger.is_used("contactsContact"));
        assert!(ledger.is_used("contactsEmail"));
    }

    #[test]
    fn unresolved_reference_fails_the_walk() {
        let mut defs = definitions(
            r##"{"A": {"type": "object", "properties": {"b": {"$ref": "#/definitions/Missing"}}}}"##,
        );
        assert!(matches!(
            run(&mut defs, &["A"]),
            Err(ResolveError::RefTargetNotFound(path)) if path == "#/definitions/Missing"
        ));
    }

    #[test]
    fn nested_and_structural_refs_are_queued() {
        let mut defs = definitions(
            r##"{
                "contactsList": {"type": "array", "items": {"$ref": "#/definitions/contactsContact"}},
                "contactsContact": {"type": "object", "properties": {
                    "address": {"type": "object", "properties": {"geo": {"$ref": "#/definitions/contactsGeo"}}}
                }},
                "contactsGeo": {"type": "object"},
                "contactsAlias": {"$ref": "#/definitions/contactsGeo"}
            }"##,
        );
        let mut ledger = DefinitionLedger::new();
        let mut breaker = CycleBreaker::new(&mut defs, &mut ledger, DEFAULT_SEPARATOR);
        breaker.break_cycles("contactsList").unwrap();
        assert_eq!(breaker.take_discovered(), vec!["contactsContact"]);
        breaker.break_cycles("contactsContact").unwrap();
        assert_eq!(breaker.take_discovered(), vec!["contactsGeo"]);
        breaker.break_cycles("contactsAlias").unwrap();
        assert_eq!(breaker.take_discovered(), vec!["contactsGeo"]);
        assert!(breaker.take_discovered().is_empty());
    }

    #[test]
    fn cycle_through_nested_object_is_reported() {
        let mut defs = definitions(
            r##"{
                "contactsContact": {"type": "object", "properties": {
                    "wrapper": {"type": "object", "properties": {"contact": {"$ref": "#/definitions/contactsContact"}}},
                    "name": {"type": "string"}
                }}
            }"##,
        );
        let mut ledger = DefinitionLedger::new();
        let mut breaker = CycleBreaker::new(&mut defs, &mut ledger, DEFAULT_SEPARATOR);
        breaker.break_cycles("contactsContact").unwrap();
        assert_eq!(breaker.take_discovered(), vec!["contactsContact"]);
        assert_eq!(
            breaker.into_unbroken(),
            vec!["contactsContact -> contactsContact"]
        );
        assert!(ledger.synthesized().is_empty());
    }
}
