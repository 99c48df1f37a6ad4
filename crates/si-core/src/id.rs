//! Stable ID newtypes for the scope arena and type/function tables.
//!
//! All IDs are distinct newtype wrappers over `u32`, providing type safety
//! so that a `ScopeId` cannot be accidentally used where a `TypeDefId` is
//! expected.

use std::fmt;

/// Stable identifier for a [`crate::scope::Scope`] inside a [`crate::scope::ScopeArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(pub u32);

/// Identifier for a named type definition (`type T Alias;` / `type struct {...} Name;`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeDefId(pub u32);

/// Identifier for a function, local or global.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FuncId(pub u32);

/// Identifier for a local variable or parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VarId(pub u32);

/// Identifier for a basic block materialized during lowering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockId(pub u32);

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for TypeDefId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for FuncId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for VarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_prints_inner_value() {
        assert_eq!(format!("{}", ScopeId(7)), "7");
        assert_eq!(format!("{}", TypeDefId(3)), "3");
        assert_eq!(format!("{}", FuncId(1)), "1");
        assert_eq!(format!("{}", VarId(0)), "0");
        assert_eq!(format!("{}", BlockId(42)), "42");
    }

    #[test]
    fn id_types_are_distinct_at_the_type_level() {
        // Same inner value, different newtypes -- this is a compile-time
        // guarantee; the assertion below just documents the intent.
        let scope = ScopeId(1);
        let ty = TypeDefId(1);
        assert_eq!(scope.0, ty.0);
    }
}
