//! Shared data model for the SI compiler: source positions, the type
//! system, the operator vocabulary, and the scope/symbol arena.
//!
//! This crate has no knowledge of lexing, parsing or code generation -- it
//! is the vocabulary those stages share.

pub mod error;
pub mod id;
pub mod ops;
pub mod scope;
pub mod source;
pub mod types;

pub use error::CoreError;
pub use id::{BlockId, FuncId, ScopeId, TypeDefId, VarId};
pub use ops::{ArithOp, BitOp, CmpOp, LogicOp, ShiftOp, UnaryOp};
pub use scope::{Function, Scope, ScopeArena, TypeDef, Variable};
pub use source::{Position, SourceFile};
pub use types::{BasicType, Fields, Type};
