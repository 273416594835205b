//! MATLAB target
//!
//! Vector fields become `function [vf_, y_] = vfield(vf_, t_, x_, p_)`, auxiliary functions
//! take their own arguments plus the parameter vector `p_`. Not-equal is spelled `~=`.

use std::sync::Arc;

use crate::ast::Spec;
use crate::backend::{
    lower_pow_calls, reject_conditionals, rename_and_thread_calls, BackendDefinition,
    FinalizeContext, SpecHooks,
};
use crate::error::CodegenResult;
use crate::template::Template;

const VECTOR_FIELD_TEMPLATE: &str = "\
function [vf_, y_] = {name}(vf_, t_, x_, p_)
% Vector field definition for model {specname}
% Generated by symcodegen for MATLAB target

{pardef}{vardef}
{start}{reuseterms}
{result}

{end}
";

const AUXILIARY_TEMPLATE: &str = "\
function y_ = {name}({args})
% Auxiliary function {name} for model {specname}
% Generated by symcodegen for MATLAB target

{pardef}
{reuseterms}
y_ = {result};

";

/// Straight-line MATLAB has no conditional expression; `pow` becomes `^`
#[derive(Debug, Clone, Copy, Default)]
pub struct MatlabHooks;

impl SpecHooks for MatlabHooks {
    fn normalize(&self, spec: Spec) -> CodegenResult<Spec> {
        spec.into_iter()
            .map(|(name, expr)| {
                reject_conditionals(&name, &expr)?;
                let lowered = lower_pow_calls(&expr);
                Ok((name, lowered))
            })
            .collect()
    }

    fn finalize(&self, spec: Spec, context: &FinalizeContext<'_>) -> CodegenResult<Spec> {
        rename_and_thread_calls(spec, context)
    }
}

/// The MATLAB backend definition
pub fn backend() -> CodegenResult<BackendDefinition> {
    Ok(BackendDefinition {
        name: "matlab".to_string(),
        comment: "%".to_string(),
        declaration: Template::new("matlab declaration", "\t{name} = {slot}_({index});\n")?,
        output_line: Template::new("matlab output line", "y_({index}) = {expr};")?,
        power_sign: "^".to_string(),
        not_equal_sign: "~=".to_string(),
        end_statement: ";".to_string(),
        indent: String::new(),
        type_prefix: String::new(),
        parameter_slot: "p".to_string(),
        state_slot: "x".to_string(),
        extra_argument: "p_".to_string(),
        reserved: ["vf_", "t_", "x_", "p_", "y_"].iter().map(|s| s.to_string()).collect(),
        vector_field_name: "vfield".to_string(),
        vector_field: Template::new("matlab vector field", VECTOR_FIELD_TEMPLATE)?,
        auxiliary: Template::new("matlab auxiliary function", AUXILIARY_TEMPLATE)?,
        hooks: Arc::new(MatlabHooks),
    })
}
