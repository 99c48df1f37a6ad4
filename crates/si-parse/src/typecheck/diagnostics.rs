//! Type-checking diagnostics.

use si_core::Position;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum TypeError {
    #[error("{pos}: type mismatch: expected {expected}, found {found}")]
    Mismatch {
        pos: Position,
        expected: String,
        found: String,
    },

    #[error("{pos}: incompatible types {lhs} and {rhs}")]
    Incompatible {
        pos: Position,
        lhs: String,
        rhs: String,
    },

    #[error("{pos}: illegal cast from {from} to {to}")]
    IllegalCast {
        pos: Position,
        from: String,
        to: String,
    },

    #[error("{pos}: expression is not assignable")]
    NotLValue { pos: Position },

    #[error("{pos}: NULL has no type; cast it explicitly")]
    UntypedNull { pos: Position },

    #[error("{pos}: call to {name} expects {expected} argument(s), found {found}")]
    WrongArgCount {
        pos: Position,
        name: String,
        expected: usize,
        found: usize,
    },

    #[error("{pos}: argument {index} of {name}: expected {expected}, found {found}")]
    ArgTypeMismatch {
        pos: Position,
        name: String,
        index: usize,
        expected: String,
        found: String,
    },

    #[error("{pos}: condition must be bool, found {found}")]
    NonBoolCondition { pos: Position, found: String },

    #[error("{pos}: {found} is not a struct or pointer-to-struct")]
    NotAStruct { pos: Position, found: String },

    #[error("{pos}: {ty} has no field named {field}")]
    UndefinedField {
        pos: Position,
        ty: String,
        field: String,
    },

    #[error("{pos}: cannot index into {found}")]
    NotIndexable { pos: Position, found: String },

    #[error("{pos}: cannot dereference {found}")]
    NotAPointer { pos: Position, found: String },

    #[error("{pos}: break outside of a loop")]
    BreakOutsideLoop { pos: Position },

    #[error("{pos}: continue outside of a loop")]
    ContinueOutsideLoop { pos: Position },

    #[error("{pos}: function {function} does not return a value on every path")]
    MissingReturn { pos: Position, function: String },

    #[error("{pos}: void value used where a value is required")]
    VoidValueUsed { pos: Position },
}
