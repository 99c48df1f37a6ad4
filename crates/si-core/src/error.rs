//! Core error types: failures that can occur while building and querying
//! the scope arena and type definition tables.
//!
//! Uses `thiserror` for structured, matchable error variants, matching the
//! convention every crate in this workspace follows for its own error enum.

use thiserror::Error;

use crate::id::ScopeId;

/// Errors produced while resolving names or mutating the scope arena.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    /// A name was declared twice in the same lexical scope.
    #[error("redeclaration of {name}")]
    Redeclaration { name: String },

    /// A variable reference could not be resolved in the enclosing scope chain.
    #[error("undefined variable: {name}")]
    UndefinedVariable { name: String },

    /// An alias name could not be resolved to a type definition.
    #[error("undefined type: {name}")]
    UndefinedType { name: String },

    /// A function name could not be resolved.
    #[error("undefined function: {name}")]
    UndefinedFunction { name: String },

    /// An alias chain resolves back to itself without reaching a basic type.
    #[error("alias cycle detected for type {name}")]
    AliasCycle { name: String },

    /// A scope ID did not correspond to any scope in the arena.
    #[error("scope not found: {id}", id = id.0)]
    ScopeNotFound { id: ScopeId },
}
