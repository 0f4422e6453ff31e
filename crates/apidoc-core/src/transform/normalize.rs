use indexmap::IndexSet;
use serde::Serialize;

use crate::config::{ApidocConfig, DEFAULT_RESULTS_PROPERTY, DEFAULT_SEPARATOR, EnvelopeStyle};
use crate::error::{ResolveError, TransformError};
use crate::parse::ref_resolve::parse_ref_name;
use crate::parse::spec::SwaggerSpec;

use super::analysis::{document_refs, entry_definitions};
use super::conventions::rewrite_paths;
use super::cycle_breaker::CycleBreaker;
use super::envelope::wrap_responses;
use super::prune::DefinitionLedger;

/// Options for the normalization pipeline.
#[derive(Debug, Clone)]
pub struct NormalizeOptions {
    pub envelope: EnvelopeStyle,
    pub results_property: String,
    pub separator: String,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self {
            envelope: EnvelopeStyle::default(),
            results_property: DEFAULT_RESULTS_PROPERTY.to_string(),
            separator: DEFAULT_SEPARATOR.to_string(),
        }
    }
}

impl NormalizeOptions {
    pub fn from_config(config: &ApidocConfig) -> Self {
        Self {
            envelope: config.envelope.style,
            results_property: config.envelope.results_property.clone(),
            separator: config.naming.separator.clone(),
        }
    }
}

/// What a normalization run did to the definitions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NormalizeReport {
    /// Definitions the walk started from, in first-recorded order.
    pub roots: Vec<String>,
    /// Definitions written by the cycle breaker.
    pub synthesized: Vec<String>,
    /// Definitions removed as unreachable.
    pub pruned: Vec<String>,
    /// Cycles closed through nested schemas, left in the document.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub unbroken: Vec<String>,
}

/// Normalize a spec with default options.
pub fn normalize(spec: &mut SwaggerSpec) -> Result<NormalizeReport, TransformError> {
    normalize_with_options(spec, &NormalizeOptions::default())
}

/// Rewrite conventions, envelope responses, break reference cycles and drop
/// unreachable definitions, in that order.
pub fn normalize_with_options(
    spec: &mut SwaggerSpec,
    options: &NormalizeOptions,
) -> Result<NormalizeReport, TransformError> {
    let mut roots = IndexSet::new();
    rewrite_paths(&mut spec.paths, &mut roots)?;
    wrap_responses(spec, options.envelope, &options.results_property, &mut roots)?;
    collect_remaining_refs(spec, &mut roots)?;
    log::info!(
        "{} operations, {} root definitions",
        spec.operation_count(),
        roots.len()
    );

    let mut ledger = DefinitionLedger::new();
    let mut breaker = CycleBreaker::new(&mut spec.definitions, &mut ledger, &options.separator);
    let mut walked = 0;
    while let Some(root) = roots.get_index(walked).cloned() {
        breaker.break_cycles(&root)?;
        roots.extend(breaker.take_discovered());
        walked += 1;
    }
    let unbroken = breaker.into_unbroken();

    let entries = entry_definitions(spec);
    let finalized = ledger.finalize(&mut spec.definitions, &entries);
    log::info!(
        "{} definitions synthesized, {} pruned, {} kept",
        finalized.promoted.len(),
        finalized.pruned.len(),
        spec.definitions.len()
    );

    Ok(NormalizeReport {
        roots: roots.into_iter().collect(),
        synthesized: finalized.promoted,
        pruned: finalized.pruned,
        unbroken,
    })
}

/// References of every other response and parameter, at any depth.
fn collect_remaining_refs(
    spec: &SwaggerSpec,
    roots: &mut IndexSet<String>,
) -> Result<(), ResolveError> {
    for ref_path in document_refs(spec) {
        let name = parse_ref_name(ref_path)?;
        if !roots.contains(name) {
            roots.insert(name.to_string());
        }
    }
    Ok(())
}
