//! Operator vocabulary shared between the parser's expression grammar and
//! the IR emitter's per-op lowering.
//!
//! Grouped the same way the expression precedence ladder in spec.md groups
//! them: arithmetic, comparison, logic, shift. Operators do not carry type
//! information themselves -- the IR emitter selects integer vs. float
//! instructions (and signed predicates) from the operand types at lowering
//! time, the same "typed by operands, not by annotation" approach LLVM IR
//! itself uses.

use std::fmt;

/// Binary arithmetic operators.
///
/// # Lowering
/// Integer operands: `add`/`sub`/`mul`/`sdiv`/`srem`. Float operands:
/// `fadd`/`fsub`/`fmul`/`fdiv`/`frem`. `Add`/`Sub` on a pointer operand
/// lower to GEP-style pointer arithmetic instead (see spec.md §4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

/// Unary arithmetic/logical operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    /// `-e`: subtract-from-zero.
    Neg,
    /// `!e`: boolean not, `icmp eq 0`.
    Not,
    /// `~e`: bitwise not, `xor -1`.
    BitNot,
    /// `*e`: pointer dereference (loads one level).
    Deref,
    /// `&e`: address-of; `e` must be an lvalue.
    AddrOf,
    /// `++e`: pre-increment.
    PreInc,
    /// `--e`: pre-decrement.
    PreDec,
    /// `e++`: post-increment (yields prior value).
    PostInc,
    /// `e--`: post-decrement (yields prior value).
    PostDec,
}

/// Comparison operators. Result type is always `bool`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

/// Binary bitwise logic operators (`& | ^` on integers).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BitOp {
    And,
    Or,
    Xor,
}

/// Short-circuiting logical operators (`&& ||` on bools).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicOp {
    And,
    Or,
}

/// Bit shift operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShiftOp {
    /// `<<`: `shl`.
    Shl,
    /// `>>`: `ashr` (arithmetic, sign-extending -- SI has no unsigned types).
    Shr,
}

impl fmt::Display for ArithOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ArithOp::Add => "+",
            ArithOp::Sub => "-",
            ArithOp::Mul => "*",
            ArithOp::Div => "/",
            ArithOp::Rem => "%",
        };
        write!(f, "{s}")
    }
}

impl fmt::Display for CmpOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CmpOp::Eq => "==",
            CmpOp::Ne => "!=",
            CmpOp::Lt => "<",
            CmpOp::Le => "<=",
            CmpOp::Gt => ">",
            CmpOp::Ge => ">=",
        };
        write!(f, "{s}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arith_op_display() {
        assert_eq!(ArithOp::Add.to_string(), "+");
        assert_eq!(ArithOp::Rem.to_string(), "%");
    }

    #[test]
    fn cmp_op_display() {
        assert_eq!(CmpOp::Le.to_string(), "<=");
        assert_eq!(CmpOp::Ne.to_string(), "!=");
    }
}
