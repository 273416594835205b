//! Backend definitions: per-target formatting rules, templates and spec hooks

use std::sync::Arc;

use indexmap::IndexSet;

use crate::ast::{BinOp, Expr, Spec};
use crate::error::{CodegenError, CodegenResult};
use crate::render::ExprRenderer;
use crate::substitute::{add_arg_to_calls, map_names, NameMap};
use crate::template::Template;

/// Inputs available to [`SpecHooks::finalize`]
#[derive(Debug, Clone, Copy)]
pub struct FinalizeContext<'a> {
    /// Renaming for this preparation pass, often empty
    pub name_map: &'a NameMap,
    /// Names of the model's auxiliary functions
    pub auxiliary: &'a IndexSet<String>,
    /// Literal appended to every auxiliary call
    pub extra_argument: &'a str,
}

/// Backend-specific spec rewriting around reused-term extraction.
///
/// Both steps default to passing the spec through unchanged.
pub trait SpecHooks: Send + Sync + std::fmt::Debug {
    /// Runs before extraction, on every expression of the spec
    fn normalize(&self, spec: Spec) -> CodegenResult<Spec> {
        Ok(spec)
    }

    /// Runs after extraction, on processed expressions and on reused-term definitions
    fn finalize(&self, spec: Spec, _context: &FinalizeContext<'_>) -> CodegenResult<Spec> {
        Ok(spec)
    }
}

/// Hooks that leave every spec as it is
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHooks;

impl SpecHooks for NoopHooks {}

/// Formatting rules and templates for one output language.
///
/// Built once per target and shared read-only by every generation call.
#[derive(Debug, Clone)]
pub struct BackendDefinition {
    pub name: String,
    /// Line comment marker
    pub comment: String,
    /// Declaration line, placeholders `name`, `slot`, `index`
    pub declaration: Template,
    /// Vector-field result line, placeholders `index`, `expr`
    pub output_line: Template,
    pub power_sign: String,
    pub not_equal_sign: String,
    pub end_statement: String,
    pub indent: String,
    /// Type spelled before a reused-term assignment, empty for untyped languages
    pub type_prefix: String,
    pub parameter_slot: String,
    pub state_slot: String,
    /// Implicit trailing parameter of every auxiliary function
    pub extra_argument: String,
    /// Names the generated functions use themselves; models may not declare them
    pub reserved: Vec<String>,
    pub vector_field_name: String,
    pub vector_field: Template,
    pub auxiliary: Template,
    pub hooks: Arc<dyn SpecHooks>,
}

impl BackendDefinition {
    pub fn renderer(&self) -> ExprRenderer {
        ExprRenderer::new(self.power_sign.as_str()).with_not_equal(&self.not_equal_sign)
    }

    pub fn render_expr(&self, expr: &Expr) -> String {
        self.renderer().render(expr)
    }

    /// One statement assigning `expr` to `name`, newline included
    pub fn assignment(&self, name: &str, expr: &Expr) -> String {
        format!(
            "{}{}{} = {}{}\n",
            self.indent,
            self.type_prefix,
            name,
            self.render_expr(expr),
            self.end_statement
        )
    }

    pub fn comment_line(&self, text: &str) -> String {
        format!("{} {}", self.comment, text)
    }
}

/// Reject conditional expressions, which have no straight-line spelling
pub fn reject_conditionals(owner: &str, expr: &Expr) -> CodegenResult<()> {
    match expr.find_call("if") {
        Some(_) => Err(CodegenError::unsupported(owner, "if")),
        None => Ok(()),
    }
}

/// Turn `pow(a, b)` calls into power operators so the backend's spelling applies
pub fn lower_pow_calls(expr: &Expr) -> Expr {
    match expr {
        Expr::Number(_) | Expr::Ident(_) => expr.clone(),
        Expr::Neg(inner) => Expr::Neg(Box::new(lower_pow_calls(inner))),
        Expr::Binary { op, lhs, rhs } => Expr::binary(*op, lower_pow_calls(lhs), lower_pow_calls(rhs)),
        Expr::Call { name, args } if name == "pow" && args.len() == 2 => {
            Expr::binary(BinOp::Pow, lower_pow_calls(&args[0]), lower_pow_calls(&args[1]))
        }
        Expr::Call { name, args } => Expr::Call {
            name: name.clone(),
            args: args.iter().map(lower_pow_calls).collect(),
        },
    }
}

/// Rename with the pass's name map, then thread the extra argument through auxiliary calls
pub fn rename_and_thread_calls(spec: Spec, context: &FinalizeContext<'_>) -> CodegenResult<Spec> {
    spec.into_iter()
        .map(|(name, expr)| {
            let expr = map_names(&expr, context.name_map)
                .and_then(|e| add_arg_to_calls(&e, context.auxiliary, context.extra_argument))
                .map_err(|err| err.with_owner(&name))?;
            Ok((name, expr))
        })
        .collect()
}
