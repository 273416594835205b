//! Model specifications: the named tables a generator works from

use indexmap::{IndexMap, IndexSet};
use serde::Deserialize;

use crate::ast::{is_identifier, Expr, Spec};
use crate::error::{CodegenError, CodegenResult};

/// A user-defined helper function
#[derive(Debug, Clone, PartialEq)]
pub struct AuxFunction {
    pub args: Vec<String>,
    pub body: Expr,
}

impl AuxFunction {
    pub fn new<S: Into<String>>(args: impl IntoIterator<Item = S>, body: Expr) -> Self {
        Self {
            args: args.into_iter().map(Into::into).collect(),
            body,
        }
    }
}

/// Parameters, state variables, auxiliary functions and declared reused terms of one model
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelSpec {
    pub name: String,
    /// Parameter names with their nominal values, in parameter-vector order
    pub parameters: IndexMap<String, f64>,
    /// Right-hand side of each state variable, in state-vector order
    pub variables: Spec,
    pub auxiliary: IndexMap<String, AuxFunction>,
    /// Terms the author wants hoisted under a given name
    pub reuse_terms: Spec,
    /// Verbatim code placed before the vector field result
    pub code_insert_start: Vec<String>,
    /// Verbatim code placed after the vector field result
    pub code_insert_end: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ModelFile {
    name: String,
    #[serde(default)]
    parameters: IndexMap<String, f64>,
    #[serde(default)]
    variables: IndexMap<String, String>,
    #[serde(default)]
    auxiliary: IndexMap<String, AuxFile>,
    #[serde(default)]
    reuse_terms: IndexMap<String, String>,
    #[serde(default)]
    code_insert_start: Vec<String>,
    #[serde(default)]
    code_insert_end: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct AuxFile {
    #[serde(default)]
    args: Vec<String>,
    body: String,
}

impl ModelSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Load a model from JSON; expressions are given as text
    ///
    /// ```json
    /// {
    ///   "name": "linear",
    ///   "parameters": { "a": 1.0, "b": 2.0 },
    ///   "variables": { "x": "a*x + b*y", "y": "b*x - a*y" }
    /// }
    /// ```
    pub fn from_json(text: &str) -> CodegenResult<Self> {
        let file: ModelFile = serde_json::from_str(text)?;

        let mut model = ModelSpec::new(file.name);
        model.parameters = file.parameters;
        model.variables = parse_table(&file.variables)?;
        model.reuse_terms = parse_table(&file.reuse_terms)?;
        for (name, aux) in file.auxiliary {
            let body = parse_entry(&name, &aux.body)?;
            model.auxiliary.insert(name, AuxFunction::new(aux.args, body));
        }
        model.code_insert_start = file.code_insert_start;
        model.code_insert_end = file.code_insert_end;

        model.validate()?;
        Ok(model)
    }

    pub fn with_parameter(mut self, name: impl Into<String>, value: f64) -> Self {
        self.parameters.insert(name.into(), value);
        self
    }

    pub fn with_variable(mut self, name: impl Into<String>, rhs: &str) -> CodegenResult<Self> {
        let name = name.into();
        let expr = parse_entry(&name, rhs)?;
        self.variables.insert(name, expr);
        Ok(self)
    }

    pub fn with_auxiliary<S: Into<String>>(
        mut self,
        name: impl Into<String>,
        args: impl IntoIterator<Item = S>,
        body: &str,
    ) -> CodegenResult<Self> {
        let name = name.into();
        let body = parse_entry(&name, body)?;
        self.auxiliary.insert(name, AuxFunction::new(args, body));
        Ok(self)
    }

    pub fn with_reuse_term(mut self, name: impl Into<String>, term: &str) -> CodegenResult<Self> {
        let name = name.into();
        let expr = parse_entry(&name, term)?;
        self.reuse_terms.insert(name, expr);
        Ok(self)
    }

    pub fn with_code_insert(mut self, start: Vec<String>, end: Vec<String>) -> Self {
        self.code_insert_start = start;
        self.code_insert_end = end;
        self
    }

    /// Parameters, variables and auxiliary functions
    pub fn declared_names(&self) -> IndexSet<String> {
        self.parameters
            .keys()
            .chain(self.variables.keys())
            .chain(self.auxiliary.keys())
            .cloned()
            .collect()
    }

    pub fn auxiliary_names(&self) -> IndexSet<String> {
        self.auxiliary.keys().cloned().collect()
    }

    /// Check identifiers and that every name is declared once
    pub fn validate(&self) -> CodegenResult<()> {
        let mut seen: IndexMap<&str, &str> = IndexMap::new();
        let tables = [
            ("parameter", self.parameters.keys().collect::<Vec<_>>()),
            ("variable", self.variables.keys().collect()),
            ("auxiliary function", self.auxiliary.keys().collect()),
            ("reused term", self.reuse_terms.keys().collect()),
        ];

        for (kind, names) in &tables {
            for name in names {
                if !is_identifier(name) {
                    return Err(CodegenError::parse_error(format!(
                        "{} name `{}` is not an identifier",
                        kind, name
                    )));
                }
                if let Some(previous) = seen.insert(name.as_str(), *kind) {
                    return Err(CodegenError::collision(
                        name.as_str(),
                        format!("declared as both {} and {}", previous, kind),
                    ));
                }
            }
        }

        for (name, aux) in &self.auxiliary {
            let mut args = IndexSet::new();
            for arg in &aux.args {
                if !is_identifier(arg) {
                    return Err(CodegenError::parse_error(format!(
                        "argument `{}` of `{}` is not an identifier",
                        arg, name
                    )));
                }
                if !args.insert(arg) {
                    return Err(CodegenError::collision(
                        arg.as_str(),
                        format!("repeated argument of `{}`", name),
                    ));
                }
            }
        }

        Ok(())
    }
}

fn parse_entry(name: &str, text: &str) -> CodegenResult<Expr> {
    Expr::parse(text).map_err(|err| match err {
        CodegenError::ParseError { message } => {
            CodegenError::parse_error(format!("in `{}`: {}", name, message))
        }
        other => other,
    })
}

fn parse_table(table: &IndexMap<String, String>) -> CodegenResult<Spec> {
    table
        .iter()
        .map(|(name, text)| Ok((name.clone(), parse_entry(name, text)?)))
        .collect()
}
