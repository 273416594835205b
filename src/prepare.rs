//! Spec preparation: normalize, extract reused terms, finalize, assemble the reuse block
//!
//! Every call works on its own copy of the caller's spec, so preparing the same spec
//! twice (or from several threads) gives the same result and never mutates the input.

use indexmap::{IndexMap, IndexSet};
use log::debug;

use crate::ast::{Expr, Spec};
use crate::backend::{BackendDefinition, FinalizeContext};
use crate::error::CodegenResult;
use crate::reuse::{ReuseConfig, ReuseExtractor, ReusedTerm};
use crate::substitute::NameMap;

/// Per-call preparation options
#[derive(Debug, Clone, Default)]
pub struct PrepareOptions {
    /// Renaming applied to processed expressions and reused-term definitions
    pub name_map: NameMap,
}

impl PrepareOptions {
    pub fn with_name_map(name_map: NameMap) -> Self {
        Self { name_map }
    }
}

/// Result of one preparation pass
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedSpec {
    /// Processed expressions, in input order
    pub spec: Spec,
    /// Reused-term assignments in dependency order, one statement per line
    pub reuse_text: String,
    /// Where reused terms were hoisted from
    pub records: Vec<ReusedTerm>,
}

/// Runs the preparation pipeline for one backend and one model
#[derive(Debug, Clone)]
pub struct SpecPreparer<'a> {
    backend: &'a BackendDefinition,
    reuse: &'a ReuseConfig,
    declared: &'a Spec,
    reserved: &'a IndexSet<String>,
    auxiliary: &'a IndexSet<String>,
}

impl<'a> SpecPreparer<'a> {
    /// `reserved` holds every name the model declares; `auxiliary` the auxiliary functions
    pub fn new(
        backend: &'a BackendDefinition,
        reuse: &'a ReuseConfig,
        declared: &'a Spec,
        reserved: &'a IndexSet<String>,
        auxiliary: &'a IndexSet<String>,
    ) -> Self {
        Self {
            backend,
            reuse,
            declared,
            reserved,
            auxiliary,
        }
    }

    pub fn prepare(&self, spec: &Spec, options: &PrepareOptions) -> CodegenResult<PreparedSpec> {
        let hooks = &self.backend.hooks;
        debug!("preparing {} expression(s) for {}", spec.len(), self.backend.name);

        let working = hooks.normalize(spec.clone())?;
        let declared = hooks.normalize(self.declared.clone())?;

        let analysis = ReuseExtractor::new(self.reuse.clone())
            .with_declared(declared)
            .reserve(self.reserved.iter().cloned())
            .reserve(options.name_map.iter().map(|(_, to)| to.to_string()))
            .extract(&working)?;

        let context = FinalizeContext {
            name_map: &options.name_map,
            auxiliary: self.auxiliary,
            extra_argument: &self.backend.extra_argument,
        };
        let processed = hooks.finalize(analysis.processed, &context)?;
        let definitions = hooks.finalize(analysis.definitions, &context)?;

        let retained = reachable_terms(&processed, &definitions);
        let reuse_text: String = analysis
            .order
            .iter()
            .filter(|name| retained.contains(*name))
            .filter_map(|name| {
                definitions
                    .get(name)
                    .map(|expr| self.backend.assignment(name, expr))
            })
            .collect();
        debug!(
            "emitting {} of {} reused term definition(s)",
            retained.len(),
            definitions.len()
        );

        Ok(PreparedSpec {
            spec: processed,
            reuse_text,
            records: analysis.records,
        })
    }
}

/// Definitions referenced by the processed spec, directly or through other definitions
fn reachable_terms(processed: &Spec, definitions: &IndexMap<String, Expr>) -> IndexSet<String> {
    let mut retained = IndexSet::new();
    let mut pending: Vec<String> = processed
        .values()
        .flat_map(|expr| expr.identifiers())
        .collect();

    while let Some(name) = pending.pop() {
        if let Some(expr) = definitions.get(&name) {
            if retained.insert(name) {
                pending.extend(expr.identifiers());
            }
        }
    }
    retained
}
