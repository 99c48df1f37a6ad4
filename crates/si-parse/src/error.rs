//! Parse-time and name-resolution error types.
//!
//! `ParseError` covers lexical and syntactic failures; `ResolveError` covers
//! the surface-to-typed transform's name lookups (undefined identifier,
//! redeclaration, alias resolving to nothing). Both carry a [`Position`] so
//! the CLI can print `file:line:column: message` without re-deriving context.

use si_core::error::CoreError;
use si_core::Position;
use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum ParseError {
    #[error("{pos}: unterminated string literal")]
    UnterminatedString { pos: Position },

    #[error("{pos}: unterminated character literal")]
    UnterminatedChar { pos: Position },

    #[error("{pos}: unterminated block comment")]
    UnterminatedComment { pos: Position },

    #[error("{pos}: unexpected token {found:?}, expected {expected}")]
    UnexpectedToken {
        pos: Position,
        found: String,
        expected: String,
    },

    #[error("{pos}: unexpected end of input, expected {expected}")]
    UnexpectedEof { pos: Position, expected: String },

    #[error("{pos}: invalid number literal {text:?}")]
    InvalidNumber { pos: Position, text: String },
}

#[derive(Debug, Error, Clone)]
pub enum ResolveError {
    #[error("{pos}: undefined variable: {name}")]
    UndefinedVariable { pos: Position, name: String },

    #[error("{pos}: undefined function: {name}")]
    UndefinedFunction { pos: Position, name: String },

    #[error("{pos}: undefined type: {name}")]
    UndefinedType { pos: Position, name: String },

    #[error("{pos}: redeclaration of {name}")]
    Redeclaration { pos: Position, name: String },

    #[error("{pos}: alias cycle detected for type {name}")]
    AliasCycle { pos: Position, name: String },
}

impl ResolveError {
    /// Attaches a position to a position-less [`CoreError`] raised while
    /// mutating the scope arena during the surface-to-typed transform.
    pub fn from_core(err: CoreError, pos: Position) -> ResolveError {
        match err {
            CoreError::Redeclaration { name } => ResolveError::Redeclaration { pos, name },
            CoreError::UndefinedVariable { name } => ResolveError::UndefinedVariable { pos, name },
            CoreError::UndefinedType { name } => ResolveError::UndefinedType { pos, name },
            CoreError::UndefinedFunction { name } => ResolveError::UndefinedFunction { pos, name },
            CoreError::AliasCycle { name } => ResolveError::AliasCycle { pos, name },
            CoreError::ScopeNotFound { id } => ResolveError::UndefinedType {
                pos,
                name: format!("<scope {id}>"),
            },
        }
    }
}
