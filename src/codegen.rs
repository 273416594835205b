//! Code generator for vector fields and auxiliary functions
//!
//! Turns a [`ModelSpec`] into backend source text by running each function's spec through
//! the preparation pipeline and filling the backend's templates.

use indexmap::IndexSet;
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::ast::Spec;
use crate::backend::BackendDefinition;
use crate::declare::define_many;
use crate::error::{CodegenError, CodegenResult};
use crate::model::{AuxFunction, ModelSpec};
use crate::prepare::{PrepareOptions, SpecPreparer};
use crate::reuse::ReuseConfig;
use crate::substitute::NameMap;
use crate::template::{RenderContext, Template};

/// Lines of generated text kept in a function summary
const SUMMARY_LINES: usize = 5;

/// Suffix that keeps auxiliary arguments clear of backend and model names
const ARGUMENT_SUFFIX: &str = "__";

/// Generator settings chosen by the caller
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    pub reuse: ReuseConfig,
}

/// Kind of a generated function
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FunctionKind {
    VectorField,
    Auxiliary,
}

/// One generated function
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedFunction {
    pub name: String,
    pub kind: FunctionKind,
    pub code: String,
    /// First few lines of `code`, for indexing and logs
    pub summary: String,
}

/// Every function generated for one model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedModel {
    pub model: String,
    pub backend: String,
    /// Auxiliary functions in declaration order, then the vector field
    pub functions: Vec<GeneratedFunction>,
}

impl GeneratedModel {
    pub fn function(&self, name: &str) -> Option<&GeneratedFunction> {
        self.functions.iter().find(|f| f.name == name)
    }

    /// Export as JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

impl std::fmt::Display for GeneratedModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for function in &self.functions {
            writeln!(f, "{}", function.code)?;
        }
        Ok(())
    }
}

/// Code generator for one model and one backend
pub struct CodeGenerator {
    backend: BackendDefinition,
    config: GeneratorConfig,
    model: ModelSpec,
    /// Model and backend names no generated name may take
    reserved: IndexSet<String>,
    auxiliary: IndexSet<String>,
    /// Fields shared by every template of this model
    context: RenderContext,
}

impl CodeGenerator {
    pub fn new(
        backend: BackendDefinition,
        model: &ModelSpec,
        config: GeneratorConfig,
    ) -> CodegenResult<Self> {
        model.validate()?;

        let declared = model.declared_names();
        for name in declared.iter().chain(model.reuse_terms.keys()) {
            if backend.reserved.contains(name) {
                return Err(CodegenError::collision(
                    name.as_str(),
                    format!("reserved by the {} backend", backend.name),
                ));
            }
        }

        let parameters: Vec<&String> = model.parameters.keys().collect();
        let variables: Vec<&String> = model.variables.keys().collect();
        let context = RenderContext::new()
            .with("specname", model.name.as_str())
            .with(
                "pardef",
                format!(
                    "\n{}\n\n{}",
                    backend.comment_line("Parameter definitions"),
                    define_many(&backend.declaration, &parameters, &backend.parameter_slot, 1)?
                ),
            )
            .with(
                "vardef",
                format!(
                    "\n{}\n\n{}",
                    backend.comment_line("Variable definitions"),
                    define_many(&backend.declaration, &variables, &backend.state_slot, 1)?
                ),
            )
            .with("start", code_insert(&backend, &model.code_insert_start))
            .with("end", code_insert(&backend, &model.code_insert_end));

        let mut reserved = declared;
        reserved.extend(backend.reserved.iter().cloned());

        Ok(Self {
            auxiliary: model.auxiliary_names(),
            backend,
            config,
            model: model.clone(),
            reserved,
            context,
        })
    }

    pub fn backend(&self) -> &BackendDefinition {
        &self.backend
    }

    fn preparer(&self) -> SpecPreparer<'_> {
        SpecPreparer::new(
            &self.backend,
            &self.config.reuse,
            &self.model.reuse_terms,
            &self.reserved,
            &self.auxiliary,
        )
    }

    /// Fill `template` from the model context overlaid with `call`
    fn render(&self, template: &Template, call: &RenderContext) -> CodegenResult<String> {
        template.render(&self.context.merged(call))
    }

    fn reuse_block(&self, reuse_text: &str) -> String {
        if reuse_text.is_empty() {
            return String::new();
        }
        format!(
            "{}\n{}\n",
            self.backend.comment_line("reused term definitions"),
            reuse_text.trim_end()
        )
    }

    /// Generate the vector field, assigning `spec[order[i]]` to output slot `i + 1`.
    ///
    /// Returns the code and the generated function's name.
    pub fn generate_vector_field<S: AsRef<str>>(
        &self,
        order: &[S],
        spec: &Spec,
    ) -> CodegenResult<(String, String)> {
        let mut selected = Spec::new();
        for name in order {
            let name = name.as_ref();
            let expr = spec.get(name).ok_or_else(|| CodegenError::undefined(name))?;
            if selected.insert(name.to_string(), expr.clone()).is_some() {
                return Err(CodegenError::collision(name, "listed twice in the output order"));
            }
        }

        let prepared = self.preparer().prepare(&selected, &PrepareOptions::default())?;

        let mut lines = Vec::with_capacity(prepared.spec.len());
        for (i, expr) in prepared.spec.values().enumerate() {
            let line = self.backend.output_line.render(
                &RenderContext::new()
                    .with("index", (i + 1).to_string())
                    .with("expr", self.backend.render_expr(expr)),
            )?;
            lines.push(line);
        }

        let name = self.backend.vector_field_name.clone();
        let call = RenderContext::new()
            .with("name", name.as_str())
            .with("result", lines.join("\n"))
            .with("reuseterms", self.reuse_block(&prepared.reuse_text));

        let code = self.render(&self.backend.vector_field, &call)?;
        debug!("generated vector field `{}` with {} output(s)", name, lines.len());
        Ok((code, name))
    }

    /// Generate one auxiliary function.
    ///
    /// Arguments are renamed with a `__` suffix inside the body and the signature, and the
    /// backend's extra argument is appended to the signature. Returns the code and its
    /// first lines as a summary.
    pub fn generate_auxiliary(&self, name: &str, aux: &AuxFunction) -> CodegenResult<(String, String)> {
        let name_map = NameMap::with_suffix(&aux.args, ARGUMENT_SUFFIX)?;
        let mut args = Vec::with_capacity(aux.args.len() + 1);
        for arg in &aux.args {
            let renamed = name_map.apply(arg);
            if self.reserved.contains(renamed) || aux.args.iter().any(|a| a == renamed) {
                return Err(CodegenError::collision(
                    renamed,
                    format!("argument `{}` of `{}` cannot be disambiguated", arg, name),
                ));
            }
            args.push(renamed.to_string());
        }
        args.push(self.backend.extra_argument.clone());

        let mut spec = Spec::new();
        spec.insert(name.to_string(), aux.body.clone());
        let prepared = self
            .preparer()
            .prepare(&spec, &PrepareOptions::with_name_map(name_map))?;
        let body = prepared
            .spec
            .get(name)
            .ok_or_else(|| CodegenError::undefined(name))?;

        let reuse = self.reuse_block(&prepared.reuse_text);
        let call = RenderContext::new()
            .with("name", name)
            .with("args", args.join(", "))
            .with(
                "reuseterms",
                if reuse.is_empty() { reuse } else { format!("\n{}", reuse) },
            )
            .with("result", self.backend.render_expr(body));

        let code = self.render(&self.backend.auxiliary, &call)?;
        let summary = summary(&code);
        debug!("generated auxiliary function `{}`", name);
        Ok((code, summary))
    }

    /// Generate every auxiliary function and the vector field of the model
    pub fn generate(&self) -> CodegenResult<GeneratedModel> {
        let mut functions = Vec::with_capacity(self.model.auxiliary.len() + 1);

        for (name, aux) in &self.model.auxiliary {
            let (code, summary) = self.generate_auxiliary(name, aux)?;
            functions.push(GeneratedFunction {
                name: name.clone(),
                kind: FunctionKind::Auxiliary,
                code,
                summary,
            });
        }

        let order: Vec<&String> = self.model.variables.keys().collect();
        let (code, name) = self.generate_vector_field(&order, &self.model.variables)?;
        functions.push(GeneratedFunction {
            summary: summary(&code),
            name,
            kind: FunctionKind::VectorField,
            code,
        });

        info!(
            "generated {} function(s) for model `{}` ({} backend)",
            functions.len(),
            self.model.name,
            self.backend.name
        );
        Ok(GeneratedModel {
            model: self.model.name.clone(),
            backend: self.backend.name.clone(),
            functions,
        })
    }
}

/// Verbatim user code wrapped in begin/end sentinel comments
fn code_insert(backend: &BackendDefinition, lines: &[String]) -> String {
    if lines.is_empty() {
        return String::new();
    }
    format!(
        "{}\n{}\n{}\n\n",
        backend.comment_line("Verbose code insert -- begin"),
        lines.join("\n"),
        backend.comment_line("Verbose code insert -- end")
    )
}

fn summary(code: &str) -> String {
    code.lines().take(SUMMARY_LINES).collect::<Vec<_>>().join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matlab;
    use pretty_assertions::assert_eq;

    fn linear_model() -> ModelSpec {
        ModelSpec::new("linear")
            .with_parameter("a", 1.0)
            .with_parameter("b", 2.0)
            .with_variable("x", "a*x + b*y")
            .unwrap()
            .with_variable("y", "b*x - a*y")
            .unwrap()
    }

    fn generator(model: &ModelSpec) -> CodeGenerator {
        CodeGenerator::new(matlab::backend().unwrap(), model, GeneratorConfig::default()).unwrap()
    }

    #[test]
    fn test_linear_vector_field() {
        let model = linear_model();
        let (code, name) = generator(&model)
            .generate_vector_field(&["x", "y"], &model.variables)
            .unwrap();

        assert_eq!(name, "vfield");
        assert_eq!(
            code,
            "function [vf_, y_] = vfield(vf_, t_, x_, p_)\n\
             % Vector field definition for model linear\n\
             % Generated by symcodegen for MATLAB target\n\
             \n\
             \n\
             % Parameter definitions\n\
             \n\
             \ta = p_(1);\n\
             \tb = p_(2);\n\
             \n\
             % Variable definitions\n\
             \n\
             \tx = x_(1);\n\
             \ty = x_(2);\n\
             \n\
             \n\
             y_(1) = a*x + b*y;\n\
             y_(2) = b*x - a*y;\n\
             \n\
             \n"
        );
        assert!(!code.contains("reused term"));
    }

    #[test]
    fn test_output_order_follows_caller() {
        let model = linear_model();
        let (code, _) = generator(&model)
            .generate_vector_field(&["y", "x"], &model.variables)
            .unwrap();
        assert!(code.contains("y_(1) = b*x - a*y;\ny_(2) = a*x + b*y;"));
    }

    #[test]
    fn test_reuse_block_emitted_before_result() {
        let model = ModelSpec::new("coupled")
            .with_parameter("k", 0.1)
            .with_variable("x", "k*(y - x) - x")
            .unwrap()
            .with_variable("y", "k*(y - x) + y")
            .unwrap();
        let (code, _) = generator(&model)
            .generate_vector_field(&["x", "y"], &model.variables)
            .unwrap();
        assert!(code.contains(
            "% reused term definitions\nrt_0 = k*(y - x);\n\ny_(1) = rt_0 - x;\ny_(2) = rt_0 + y;"
        ));
    }

    #[test]
    fn test_auxiliary_function() {
        let model = ModelSpec::new("m")
            .with_parameter("p", 3.0)
            .with_variable("x", "f(x) - x")
            .unwrap()
            .with_auxiliary("f", ["x"], "x*x + p")
            .unwrap();
        let gen = generator(&model);

        let (code, summary) = gen.generate_auxiliary("f", &model.auxiliary["f"]).unwrap();
        assert_eq!(
            code,
            "function y_ = f(x__, p_)\n\
             % Auxiliary function f for model m\n\
             % Generated by symcodegen for MATLAB target\n\
             \n\
             \n\
             % Parameter definitions\n\
             \n\
             \tp = p_(1);\n\
             \n\
             \n\
             y_ = x__*x__ + p;\n\
             \n"
        );
        assert_eq!(
            summary,
            "function y_ = f(x__, p_)\n% Auxiliary function f for model m\n\
             % Generated by symcodegen for MATLAB target\n\n"
        );

        let (vfield, _) = gen.generate_vector_field(&["x"], &model.variables).unwrap();
        assert!(vfield.contains("y_(1) = f(x, p_) - x;"));
    }

    #[test]
    fn test_auxiliary_with_reused_terms() {
        let model = ModelSpec::new("m")
            .with_auxiliary("g", ["u", "v"], "(u - v)^2 + (u - v)")
            .unwrap();
        let (code, _) = generator(&model)
            .generate_auxiliary("g", &model.auxiliary["g"])
            .unwrap();
        assert!(code.starts_with("function y_ = g(u__, v__, p_)\n"));
        assert!(code.contains("\n% reused term definitions\nrt_0 = u__ - v__;\n\ny_ = rt_0^2 + rt_0;\n"));
    }

    #[test]
    fn test_code_inserts_are_wrapped() {
        let model = linear_model().with_code_insert(vec!["disp(t_);".to_string()], Vec::new());
        let (code, _) = generator(&model)
            .generate_vector_field(&["x", "y"], &model.variables)
            .unwrap();
        assert!(code.contains(
            "% Verbose code insert -- begin\ndisp(t_);\n% Verbose code insert -- end\n\n\ny_(1)"
        ));
    }

    #[test]
    fn test_unknown_variable_in_order() {
        let model = linear_model();
        let err = generator(&model)
            .generate_vector_field(&["x", "z"], &model.variables)
            .unwrap_err();
        assert!(matches!(err, CodegenError::UndefinedName { ref name } if name == "z"));
    }

    #[test]
    fn test_auxiliary_without_arguments() {
        let model = ModelSpec::from_json(
            r#"{
                "name": "m",
                "parameters": { "k": 2.0 },
                "variables": { "x": "g() - x" },
                "auxiliary": { "g": { "args": [], "body": "k*2" } }
            }"#,
        )
        .unwrap();
        let gen = generator(&model);

        let (code, _) = gen.generate_auxiliary("g", &model.auxiliary["g"]).unwrap();
        assert!(code.starts_with("function y_ = g(p_)\n"));
        assert!(code.contains("y_ = k*2;"));

        let (vfield, _) = gen.generate_vector_field(&["x"], &model.variables).unwrap();
        assert!(vfield.contains("y_(1) = g(p_) - x;"));
    }

    #[test]
    fn test_not_equal_spelled_for_backend() {
        let model = ModelSpec::new("m")
            .with_variable("x", "(x != 1)*x")
            .unwrap();
        let (code, _) = generator(&model)
            .generate_vector_field(&["x"], &model.variables)
            .unwrap();
        assert!(code.contains("y_(1) = (x ~= 1)*x;"));
        assert!(!code.contains("!="));
    }

    #[test]
    fn test_argument_suffix_collision() {
        let model = ModelSpec::new("m")
            .with_parameter("x__", 1.0)
            .with_auxiliary("f", ["x"], "x + x__")
            .unwrap();
        let err = generator(&model)
            .generate_auxiliary("f", &model.auxiliary["f"])
            .unwrap_err();
        assert!(matches!(err, CodegenError::NameCollision { ref name, .. } if name == "x__"));
    }

    #[test]
    fn test_backend_reserved_name_rejected() {
        let model = ModelSpec::new("m").with_parameter("p_", 1.0);
        let err = CodeGenerator::new(matlab::backend().unwrap(), &model, GeneratorConfig::default())
            .err()
            .unwrap();
        assert!(matches!(err, CodegenError::NameCollision { .. }));
    }

    #[test]
    fn test_conditional_rejected_with_name() {
        let model = ModelSpec::new("m")
            .with_variable("x", "if(x > 1, 1, x)")
            .unwrap();
        let err = generator(&model).generate().unwrap_err();
        assert!(matches!(err, CodegenError::UnsupportedConstruct { ref name, .. } if name == "x"));
    }

    #[test]
    fn test_generate_whole_model() {
        let model = ModelSpec::new("m")
            .with_parameter("p", 3.0)
            .with_variable("x", "f(x) - x")
            .unwrap()
            .with_auxiliary("f", ["x"], "x*x + p")
            .unwrap();
        let generated = generator(&model).generate().unwrap();

        let names: Vec<_> = generated.functions.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["f", "vfield"]);
        assert_eq!(generated.function("vfield").unwrap().kind, FunctionKind::VectorField);

        let json = generated.to_json().unwrap();
        assert!(json.contains("\"kind\": \"auxiliary\""));
    }

    #[test]
    fn test_missing_placeholder_fails_loudly() {
        let mut backend = matlab::backend().unwrap();
        backend.vector_field = Template::new("broken", "{name}: {outputs}").unwrap();
        let model = linear_model();
        let gen = CodeGenerator::new(backend, &model, GeneratorConfig::default()).unwrap();
        let err = gen.generate().unwrap_err();
        assert!(matches!(
            err,
            CodegenError::MissingPlaceholder { ref placeholder, ref template }
                if placeholder == "outputs" && template == "broken"
        ));
    }

    #[test]
    fn test_call_fields_do_not_leak_into_base_context() {
        let model = ModelSpec::new("m")
            .with_variable("x", "-x")
            .unwrap()
            .with_auxiliary("f", ["u"], "u + 1")
            .unwrap();
        let gen = generator(&model);
        gen.generate().unwrap();
        assert_eq!(gen.context.get("name"), None);
        assert_eq!(gen.context.get("result"), None);
        assert_eq!(gen.context.get("specname"), Some("m"));
    }

    #[test]
    fn test_generation_is_repeatable() {
        let model = linear_model();
        let gen = generator(&model);
        assert_eq!(gen.generate().unwrap(), gen.generate().unwrap());
    }
}
