use thiserror::Error;

use crate::token::Position;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Every failure of the pipeline. There is no recoverable class: the first
/// error aborts the whole compilation.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum Error {
    #[error(transparent)]
    Lex(#[from] LexError),
    #[error(transparent)]
    Syntax(#[from] SyntaxError),
    #[error(transparent)]
    Semantic(#[from] SemanticError),
    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl Error {
    pub fn category(&self) -> &'static str {
        match self {
            Error::Lex(_) => "lexical error",
            Error::Syntax(_) => "syntax error",
            Error::Semantic(_) => "semantic error",
            Error::Backend(_) => "backend error",
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Error::Lex(e) => &e.message,
            Error::Syntax(e) => &e.message,
            Error::Semantic(e) => &e.message,
            Error::Backend(e) => &e.message,
        }
    }

    pub fn position(&self) -> Option<Position> {
        match self {
            Error::Lex(e) => Some(e.pos),
            Error::Syntax(e) => Some(e.pos),
            Error::Semantic(e) => e.pos,
            Error::Backend(_) => None,
        }
    }
}

/// Raised only for unterminated string literals.
#[derive(Clone, Debug, PartialEq, Error)]
#[error("{pos}: {message}")]
pub struct LexError {
    pub message: String,
    pub pos: Position,
}

#[derive(Clone, Debug, PartialEq, Error)]
#[error("{pos}: {message}")]
pub struct SyntaxError {
    pub message: String,
    pub pos: Position,
    /// The full text of the offending line, without its line break.
    pub source_line: String,
}

#[derive(Clone, Debug, PartialEq, Error)]
#[error("{message}")]
pub struct SemanticError {
    pub message: String,
    pub pos: Option<Position>,
}

impl SemanticError {
    pub fn new(message: impl Into<String>) -> SemanticError {
        SemanticError {
            message: message.into(),
            pos: None,
        }
    }

    pub fn at(pos: Position, message: impl Into<String>) -> SemanticError {
        SemanticError {
            message: message.into(),
            pos: Some(pos),
        }
    }
}

/// Verification, object emission or link failure, with whatever text the
/// external tool produced.
#[derive(Clone, Debug, PartialEq, Error)]
#[error("{message}")]
pub struct BackendError {
    pub message: String,
}

impl BackendError {
    pub fn new(message: impl Into<String>) -> BackendError {
        BackendError {
            message: message.into(),
        }
    }
}

/// Shorthand for `Err(SemanticError::at(..).into())`.
macro_rules! semantic {
    ($pos:expr, $($fmt:tt)+) => {
        Err($crate::error::Error::Semantic($crate::error::SemanticError::at(
            $pos,
            format!($($fmt)+),
        )))
    };
}
pub(crate) use semantic;
