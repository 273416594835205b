//! Error types for the symbolic code generator

use thiserror::Error;

/// Result type for code generation operations
pub type CodegenResult<T> = Result<T, CodegenError>;

/// Stage of spec preparation or rendering in which an error was raised
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Normalize,
    Extract,
    Finalize,
    Render,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Normalize => write!(f, "normalization"),
            Phase::Extract => write!(f, "reused-term extraction"),
            Phase::Finalize => write!(f, "finalization"),
            Phase::Render => write!(f, "rendering"),
        }
    }
}

/// Code generation errors
#[derive(Debug, Error)]
pub enum CodegenError {
    #[error("Lexer error at position {position}: {message}")]
    LexerError { position: usize, message: String },

    #[error("Parser error: {message}")]
    ParseError { message: String },

    #[error("Unsupported construct `{construct}` in `{name}`")]
    UnsupportedConstruct { name: String, construct: String },

    #[error("Malformed expression `{name}` during {phase}: {message}")]
    MalformedExpression {
        name: String,
        phase: Phase,
        message: String,
    },

    #[error("Template `{template}` references missing placeholder `{placeholder}`")]
    MissingPlaceholder { placeholder: String, template: String },

    #[error("Name collision on `{name}`: {message}")]
    NameCollision { name: String, message: String },

    #[error("Undefined name: {name}")]
    UndefinedName { name: String },

    #[error("Invalid model JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl CodegenError {
    pub fn parse_error(msg: impl Into<String>) -> Self {
        CodegenError::ParseError { message: msg.into() }
    }

    pub fn unsupported(name: impl Into<String>, construct: impl Into<String>) -> Self {
        CodegenError::UnsupportedConstruct {
            name: name.into(),
            construct: construct.into(),
        }
    }

    pub fn malformed(name: impl Into<String>, phase: Phase, msg: impl Into<String>) -> Self {
        CodegenError::MalformedExpression {
            name: name.into(),
            phase,
            message: msg.into(),
        }
    }

    pub fn missing_placeholder(placeholder: impl Into<String>, template: impl Into<String>) -> Self {
        CodegenError::MissingPlaceholder {
            placeholder: placeholder.into(),
            template: template.into(),
        }
    }

    pub fn collision(name: impl Into<String>, msg: impl Into<String>) -> Self {
        CodegenError::NameCollision {
            name: name.into(),
            message: msg.into(),
        }
    }

    pub fn undefined(name: impl Into<String>) -> Self {
        CodegenError::UndefinedName { name: name.into() }
    }

    /// Attach the owning spec entry to an error raised without one
    pub(crate) fn with_owner(self, owner: &str) -> Self {
        match self {
            CodegenError::MalformedExpression { name, phase, message } if name.is_empty() => {
                CodegenError::MalformedExpression {
                    name: owner.to_string(),
                    phase,
                    message,
                }
            }
            CodegenError::UnsupportedConstruct { name, construct } if name.is_empty() => {
                CodegenError::UnsupportedConstruct {
                    name: owner.to_string(),
                    construct,
                }
            }
            other => other,
        }
    }
}
