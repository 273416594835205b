//! Literal text templates with named `{placeholder}` slots
//!
//! `{{` and `}}` produce literal braces. Rendering fails when a placeholder has no value,
//! so raw placeholder text never reaches generated code.

use indexmap::IndexMap;

use crate::error::{CodegenError, CodegenResult};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Placeholder(String),
}

/// A parsed template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    name: String,
    segments: Vec<Segment>,
}

impl Template {
    /// Parse `text`; `name` identifies the template in error messages
    pub fn new(name: impl Into<String>, text: &str) -> CodegenResult<Self> {
        let name = name.into();
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = text.chars().peekable();

        while let Some(c) = chars.next() {
            match c {
                '{' if chars.peek() == Some(&'{') => {
                    chars.next();
                    literal.push('{');
                }
                '}' if chars.peek() == Some(&'}') => {
                    chars.next();
                    literal.push('}');
                }
                '{' => {
                    let mut key = String::new();
                    loop {
                        match chars.next() {
                            Some('}') => break,
                            Some(c) if c.is_ascii_alphanumeric() || c == '_' => key.push(c),
                            _ => {
                                return Err(CodegenError::parse_error(format!(
                                    "bad placeholder `{{{}` in template `{}`",
                                    key, name
                                )))
                            }
                        }
                    }
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Placeholder(key));
                }
                '}' => {
                    return Err(CodegenError::parse_error(format!(
                        "unmatched `}}` in template `{}`",
                        name
                    )))
                }
                c => literal.push(c),
            }
        }
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(Self { name, segments })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Placeholder keys in order of appearance, repeats included
    pub fn placeholders(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|seg| match seg {
            Segment::Placeholder(key) => Some(key.as_str()),
            Segment::Literal(_) => None,
        })
    }

    pub fn render(&self, context: &RenderContext) -> CodegenResult<String> {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Placeholder(key) => {
                    let value = context
                        .get(key)
                        .ok_or_else(|| CodegenError::missing_placeholder(key.as_str(), self.name.as_str()))?;
                    out.push_str(value);
                }
            }
        }
        Ok(out)
    }
}

/// Placeholder name to rendered text fragment
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderContext {
    values: IndexMap<String, String>,
}

impl RenderContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Fresh context holding `self` overlaid with `overrides`; neither input changes
    pub fn merged(&self, overrides: &RenderContext) -> RenderContext {
        let mut values = self.values.clone();
        for (key, value) in &overrides.values {
            values.insert(key.clone(), value.clone());
        }
        RenderContext { values }
    }
}
