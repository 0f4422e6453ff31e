//! Bookkeeping for definitions that survive normalization.

use std::collections::HashSet;

use indexmap::IndexMap;
use serde::Serialize;

use crate::parse::schema::{Schema, SchemaOrRef};

use super::analysis::reachable_definitions;

/// Lifecycle of a synthesized definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DefinitionState {
    /// Built during traversal, not yet visible in `definitions`.
    Draft,
    /// Written into `definitions`.
    Final,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SynthesizedDefinition {
    pub schema: Schema,
    pub state: DefinitionState,
}

/// Outcome of [`DefinitionLedger::finalize`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Finalized {
    pub promoted: Vec<String>,
    pub pruned: Vec<String>,
}

/// Tracks which definitions were reached and which were synthesized.
///
/// Drafts are kept apart from the document until [`finalize`](Self::finalize)
/// so that every branch of the traversal sees the original definitions.
#[derive(Debug, Default)]
pub struct DefinitionLedger {
    used: HashSet<String>,
    synthesized: IndexMap<String, SynthesizedDefinition>,
}

impl DefinitionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_used(&mut self, name: &str) {
        if !self.used.contains(name) {
            self.used.insert(name.to_string());
        }
    }

    pub fn is_used(&self, name: &str) -> bool {
        self.used.contains(name)
    }

    /// Record a draft. A later draft under the same name replaces the earlier one.
    pub fn stage(&mut self, name: &str, schema: Schema) {
        if self.synthesized.contains_key(name) {
            log::debug!("restaging {name}");
        }
        self.synthesized.insert(
            name.to_string(),
            SynthesizedDefinition {
                schema,
                state: DefinitionState::Draft,
            },
        );
        self.mark_used(name);
    }

    pub fn synthesized(&self) -> &IndexMap<String, SynthesizedDefinition> {
        &self.synthesized
    }

    /// Write every draft into `definitions`, then sweep: only definitions
    /// the walk marked and that `entries` still reach through the final
    /// references survive. Surviving definitions keep their relative order;
    /// new names are appended.
    ///
    /// A draft restaged under an existing name can leave the drafts its
    /// earlier version pointed at without any referrer. Those are discarded
    /// and reported neither as promoted nor as pruned.
    pub fn finalize(
        &mut self,
        definitions: &mut IndexMap<String, SchemaOrRef>,
        entries: &[String],
    ) -> Finalized {
        let mut staged = Vec::new();
        for (name, entry) in self.synthesized.iter_mut() {
            if entry.state == DefinitionState::Final {
                continue;
            }
            definitions.insert(name.clone(), SchemaOrRef::inline(entry.schema.clone()));
            entry.state = DefinitionState::Final;
            self.used.insert(name.clone());
            staged.push(name.clone());
        }

        let reached = reachable_definitions(definitions, entries.iter().map(String::as_str));
        let mut pruned = Vec::new();
        let mut orphaned = Vec::new();
        definitions.retain(|name, _| {
            if self.used.contains(name) && reached.contains(name) {
                return true;
            }
            if staged.contains(name) {
                orphaned.push(name.clone());
            } else {
                pruned.push(name.clone());
            }
            false
        });

        for name in &orphaned {
            log::debug!("discarded orphaned draft {name}");
            self.synthesized.shift_remove(name);
            self.used.remove(name);
        }
        for name in &pruned {
            log::debug!("pruned unreachable definition {name}");
        }
        let promoted = staged
            .into_iter()
            .filter(|name| !orphaned.contains(name))
            .collect();
        Finalized { promoted, pruned }
    }
}
