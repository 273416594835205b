//! Reused-term extraction
//!
//! Finds subexpressions shared across a whole specification and hoists each into one
//! named definition. Two kinds of terms are hoisted:
//!
//! - declared terms, named up front by the model author, replaced wherever they occur;
//! - discovered terms, non-trivial subtrees that occur often enough to be worth a name.
//!
//! Expressions are assumed side-effect free, so hoisting never changes meaning.

use indexmap::{IndexMap, IndexSet};
use log::{debug, trace};
use serde::{Deserialize, Serialize};

use crate::ast::{Expr, Spec};
use crate::error::{CodegenError, CodegenResult, Phase};

/// Tuning for reused-term discovery
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReuseConfig {
    /// Discover shared subexpressions automatically; declared terms are always hoisted
    pub enabled: bool,
    pub min_occurrences: usize,
    /// Smallest subtree worth a temporary
    pub min_nodes: usize,
    pub max_terms: usize,
    /// Prefix of generated canonical names
    pub prefix: String,
}

impl Default for ReuseConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_occurrences: 2,
            min_nodes: 3,
            max_terms: 64,
            prefix: "rt_".to_string(),
        }
    }
}

/// Where a reused term was found and the name that now stands for it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReusedTerm {
    /// Spec entry (or enclosing reused term) containing the occurrence
    pub owner: String,
    /// Pre-order node index of the occurrence inside the owner's expression
    pub position: usize,
    pub canonical: String,
}

/// Everything the extractor learned about one specification
#[derive(Debug, Clone, PartialEq)]
pub struct ReuseAnalysis {
    pub records: Vec<ReusedTerm>,
    /// Input expressions with hoisted terms replaced by their canonical names
    pub processed: Spec,
    /// Canonical name to defining expression
    pub definitions: IndexMap<String, Expr>,
    /// Dependency order over every definition, including declared terms nobody used
    pub order: Vec<String>,
}

/// Joint common-subexpression detector over a set of named expressions
#[derive(Debug, Clone, Default)]
pub struct ReuseExtractor {
    config: ReuseConfig,
    declared: Spec,
    reserved: IndexSet<String>,
}

impl ReuseExtractor {
    pub fn new(config: ReuseConfig) -> Self {
        Self {
            config,
            declared: Spec::new(),
            reserved: IndexSet::new(),
        }
    }

    /// Terms named by the model author, `canonical name -> expression`
    pub fn with_declared(mut self, declared: Spec) -> Self {
        self.declared = declared;
        self
    }

    /// Names no canonical name may take
    pub fn reserve<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.reserved.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn extract(&self, spec: &Spec) -> CodegenResult<ReuseAnalysis> {
        for name in self.declared.keys() {
            if self.reserved.contains(name) || spec.contains_key(name) {
                return Err(CodegenError::collision(
                    name.as_str(),
                    "reused term name is already declared in the model",
                ));
            }
        }

        let mut declared_by_expr: IndexMap<Expr, String> = IndexMap::new();
        for (name, expr) in &self.declared {
            declared_by_expr
                .entry(expr.clone())
                .or_insert_with(|| name.clone());
        }

        let mut taken = self.reserved.clone();
        taken.extend(spec.keys().cloned());
        taken.extend(self.declared.keys().cloned());
        for expr in spec.values().chain(self.declared.values()) {
            taken.extend(expr.identifiers());
        }

        let mut extract = if self.config.enabled {
            self.candidates(spec, &declared_by_expr)
        } else {
            IndexSet::new()
        };

        let mut declared_definitions = IndexMap::new();
        for (name, expr) in &self.declared {
            declared_definitions.insert(
                name.clone(),
                substitute_declared(expr, &declared_by_expr, name),
            );
        }

        // A discovered term whose occurrences all sit inside one bigger hoisted term ends
        // up referenced once; drop those and rewrite again until every term pays off.
        let min_occurrences = self.config.min_occurrences.max(2);
        let (processed, names, definitions, records) = loop {
            let mut rewriter = Rewriter {
                declared: &declared_by_expr,
                extract: &extract,
                names: IndexMap::new(),
                definitions: declared_definitions.clone(),
                records: Vec::new(),
                taken: taken.clone(),
                prefix: &self.config.prefix,
                next_id: 0,
            };

            let mut processed = Spec::new();
            for (owner, expr) in spec {
                let mut position = 0;
                let rewritten = rewriter.rewrite(expr, owner, &mut position);
                processed.insert(owner.clone(), rewritten);
            }

            let refs = reference_counts(processed.values().chain(rewriter.definitions.values()));
            let underused: Vec<Expr> = rewriter
                .names
                .iter()
                .filter(|(_, name)| refs.get(*name).copied().unwrap_or(0) < min_occurrences)
                .map(|(expr, _)| expr.clone())
                .collect();

            if underused.is_empty() {
                let Rewriter { names, definitions, records, .. } = rewriter;
                break (processed, names, definitions, records);
            }
            for expr in &underused {
                extract.shift_remove(expr);
            }
        };

        let order = dependency_order(&definitions)?;
        debug!(
            "reuse extraction: {} declared, {} discovered, {} occurrences",
            self.declared.len(),
            names.len(),
            records.len()
        );

        Ok(ReuseAnalysis {
            records,
            processed,
            definitions,
            order,
        })
    }

    /// Shared subtrees worth hoisting, best first
    fn candidates(&self, spec: &Spec, declared: &IndexMap<Expr, String>) -> IndexSet<Expr> {
        let mut counts: IndexMap<&Expr, usize> = IndexMap::new();
        for expr in spec.values() {
            count_subexprs(expr, declared, &mut counts);
        }

        let mut ranked: Vec<(usize, usize, &Expr)> = counts
            .iter()
            .enumerate()
            .filter_map(|(first_seen, (expr, count))| {
                if *count < self.config.min_occurrences.max(2) || expr.is_trivial() {
                    return None;
                }
                let size = expr.size();
                if size < self.config.min_nodes {
                    return None;
                }
                // Saves `count - 1` re-emissions of the subtree.
                Some(((count - 1) * size, first_seen, *expr))
            })
            .collect();

        ranked.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));
        ranked.truncate(self.config.max_terms);
        ranked.into_iter().map(|(_, _, expr)| expr.clone()).collect()
    }
}

fn count_subexprs<'a>(
    expr: &'a Expr,
    declared: &IndexMap<Expr, String>,
    counts: &mut IndexMap<&'a Expr, usize>,
) {
    if declared.contains_key(expr) {
        return;
    }
    if !expr.is_trivial() {
        *counts.entry(expr).or_insert(0) += 1;
    }
    for child in expr.children() {
        count_subexprs(child, declared, counts);
    }
}

/// How often each identifier occurs across `exprs`
fn reference_counts<'a>(exprs: impl Iterator<Item = &'a Expr>) -> IndexMap<String, usize> {
    let mut counts = IndexMap::new();
    for expr in exprs {
        expr.walk(&mut |node| {
            if let Expr::Ident(name) = node {
                *counts.entry(name.clone()).or_insert(0) += 1;
            }
        });
    }
    counts
}

/// Replace occurrences of declared terms other than `skip` inside a declared definition
fn substitute_declared(expr: &Expr, declared: &IndexMap<Expr, String>, skip: &str) -> Expr {
    if let Some(name) = declared.get(expr) {
        if name != skip {
            return Expr::Ident(name.clone());
        }
    }
    match expr {
        Expr::Number(_) | Expr::Ident(_) => expr.clone(),
        Expr::Neg(inner) => Expr::Neg(Box::new(substitute_declared(inner, declared, skip))),
        Expr::Binary { op, lhs, rhs } => Expr::binary(
            *op,
            substitute_declared(lhs, declared, skip),
            substitute_declared(rhs, declared, skip),
        ),
        Expr::Call { name, args } => Expr::Call {
            name: name.clone(),
            args: args
                .iter()
                .map(|arg| substitute_declared(arg, declared, skip))
                .collect(),
        },
    }
}

struct Rewriter<'a> {
    declared: &'a IndexMap<Expr, String>,
    extract: &'a IndexSet<Expr>,
    names: IndexMap<Expr, String>,
    definitions: IndexMap<String, Expr>,
    records: Vec<ReusedTerm>,
    taken: IndexSet<String>,
    prefix: &'a str,
    next_id: usize,
}

impl<'a> Rewriter<'a> {
    fn rewrite(&mut self, expr: &Expr, owner: &str, position: &mut usize) -> Expr {
        let here = *position;
        let declared = self.declared;

        if let Some(name) = declared.get(expr) {
            *position = here + expr.size();
            self.record(owner, here, name);
            return Expr::Ident(name.clone());
        }

        if self.extract.contains(expr) {
            *position = here + expr.size();
            let name = match self.names.get(expr) {
                Some(name) => name.clone(),
                None => self.hoist(expr),
            };
            self.record(owner, here, &name);
            return Expr::Ident(name);
        }

        *position += 1;
        self.rebuild(expr, owner, position)
    }

    fn rebuild(&mut self, expr: &Expr, owner: &str, position: &mut usize) -> Expr {
        match expr {
            Expr::Number(_) | Expr::Ident(_) => expr.clone(),
            Expr::Neg(inner) => Expr::Neg(Box::new(self.rewrite(inner, owner, position))),
            Expr::Binary { op, lhs, rhs } => {
                let lhs = self.rewrite(lhs, owner, position);
                let rhs = self.rewrite(rhs, owner, position);
                Expr::binary(*op, lhs, rhs)
            }
            Expr::Call { name, args } => {
                let mut new_args = Vec::with_capacity(args.len());
                for arg in args {
                    new_args.push(self.rewrite(arg, owner, position));
                }
                Expr::Call {
                    name: name.clone(),
                    args: new_args,
                }
            }
        }
    }

    /// Name a discovered term and define it; nested terms are defined first
    fn hoist(&mut self, expr: &Expr) -> String {
        let name = self.fresh_name();
        self.names.insert(expr.clone(), name.clone());
        let mut position = 1;
        let rhs = self.rebuild(expr, &name, &mut position);
        trace!("hoisting {} = {}", name, rhs);
        self.definitions.insert(name.clone(), rhs);
        name
    }

    fn fresh_name(&mut self) -> String {
        loop {
            let candidate = format!("{}{}", self.prefix, self.next_id);
            self.next_id += 1;
            if self.taken.insert(candidate.clone()) {
                return candidate;
            }
        }
    }

    fn record(&mut self, owner: &str, position: usize, canonical: &str) {
        self.records.push(ReusedTerm {
            owner: owner.to_string(),
            position,
            canonical: canonical.to_string(),
        });
    }
}

/// Topological order of definitions: every name comes after the names it references
pub fn dependency_order(definitions: &IndexMap<String, Expr>) -> CodegenResult<Vec<String>> {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        Visiting,
        Done,
    }

    fn visit(
        name: &str,
        definitions: &IndexMap<String, Expr>,
        marks: &mut IndexMap<String, Mark>,
        order: &mut Vec<String>,
    ) -> CodegenResult<()> {
        match marks.get(name) {
            Some(Mark::Done) => return Ok(()),
            Some(Mark::Visiting) => {
                return Err(CodegenError::malformed(
                    name,
                    Phase::Extract,
                    "reused terms reference each other cyclically",
                ))
            }
            None => {}
        }
        let Some(expr) = definitions.get(name) else {
            return Ok(());
        };
        marks.insert(name.to_string(), Mark::Visiting);
        for dep in expr.identifiers() {
            if dep != name && definitions.contains_key(&dep) {
                visit(&dep, definitions, marks, order)?;
            } else if dep == name {
                return Err(CodegenError::malformed(
                    name,
                    Phase::Extract,
                    "reused term references itself",
                ));
            }
        }
        marks.insert(name.to_string(), Mark::Done);
        order.push(name.to_string());
        Ok(())
    }

    let mut marks = IndexMap::new();
    let mut order = Vec::with_capacity(definitions.len());
    for name in definitions.keys() {
        visit(name, definitions, &mut marks, &mut order)?;
    }
    Ok(order)
}
