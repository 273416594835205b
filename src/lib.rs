//! Symbolic Model Code Generator
//!
//! This library turns the right-hand sides of an ODE model (parameters, state variables,
//! auxiliary functions) into standalone source code for a numerical target language.
//! Shared subexpressions are hoisted into reused-term definitions before the backend's
//! templates are filled in.
//!
//! # Example
//!
//! ```rust
//! use symcodegen::{generate_matlab, GeneratorConfig};
//!
//! let model = r#"{
//!     "name": "linear",
//!     "parameters": { "a": 1.0, "b": 2.0 },
//!     "variables": { "x": "a*x + b*y", "y": "b*x - a*y" }
//! }"#;
//! let generated = generate_matlab(model, &GeneratorConfig::default()).unwrap();
//! println!("{}", generated);
//! ```

pub mod ast;
pub mod lexer;
pub mod parser;
pub mod render;
pub mod substitute;
pub mod reuse;
pub mod template;
pub mod declare;
pub mod backend;
pub mod matlab;
pub mod prepare;
pub mod model;
pub mod codegen;
pub mod error;

pub use ast::{parse_spec, BinOp, Expr, Spec};
pub use parser::Parser;
pub use render::ExprRenderer;
pub use substitute::{add_arg_to_calls, map_names, NameMap};
pub use reuse::{ReuseAnalysis, ReuseConfig, ReuseExtractor, ReusedTerm};
pub use template::{RenderContext, Template};
pub use declare::define_many;
pub use backend::{BackendDefinition, FinalizeContext, NoopHooks, SpecHooks};
pub use prepare::{PrepareOptions, PreparedSpec, SpecPreparer};
pub use model::{AuxFunction, ModelSpec};
pub use codegen::{CodeGenerator, FunctionKind, GeneratedFunction, GeneratedModel, GeneratorConfig};
pub use error::{CodegenError, CodegenResult, Phase};

/// Main entry point: load a JSON model and generate all of its MATLAB functions
pub fn generate_matlab(model_json: &str, config: &GeneratorConfig) -> CodegenResult<GeneratedModel> {
    let model = ModelSpec::from_json(model_json)?;
    generate_model(&model, config)
}

/// Generate all MATLAB functions of an already built model
pub fn generate_model(model: &ModelSpec, config: &GeneratorConfig) -> CodegenResult<GeneratedModel> {
    let backend = matlab::backend()?;
    let generator = CodeGenerator::new(backend, model, config.clone())?;
    generator.generate()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_matlab_from_json() {
        let model = r#"{
            "name": "decay",
            "parameters": { "k": 0.5 },
            "variables": { "x": "-k*x" }
        }"#;
        let generated = generate_matlab(model, &GeneratorConfig::default()).unwrap();
        assert_eq!(generated.model, "decay");
        assert_eq!(generated.backend, "matlab");
        assert!(generated.to_string().contains("y_(1) = -k*x;"));
    }

    #[test]
    fn test_disabled_reuse_keeps_expressions_whole() {
        let model = r#"{
            "name": "m",
            "parameters": { "k": 1.0 },
            "variables": { "x": "k*(x + 1)", "y": "k*(x + 1) - y" }
        }"#;
        let mut config = GeneratorConfig::default();
        config.reuse.enabled = false;
        let generated = generate_matlab(model, &config).unwrap();
        let code = &generated.function("vfield").unwrap().code;
        assert!(!code.contains("reused term"));
        assert!(code.contains("y_(2) = k*(x + 1) - y;"));
    }
}
