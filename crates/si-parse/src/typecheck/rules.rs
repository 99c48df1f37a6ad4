//! Operator type rules: what a binary/unary operator accepts and what it
//! produces, given the already-inferred operand types.

use si_core::{ArithOp, BasicType, BitOp, CmpOp, LogicOp, Position, ShiftOp, Type, TypeDefId, UnaryOp};

use super::diagnostics::TypeError;

type Resolve<'a> = dyn Fn(TypeDefId) -> Type + 'a;

fn unwrap<'a>(ty: &Type, resolve: &Resolve<'a>) -> Type {
    match ty {
        Type::Alias { def, .. } => unwrap(&resolve(*def), resolve),
        other => other.clone(),
    }
}

fn wider_int(a: BasicType, b: BasicType) -> BasicType {
    if a.int_rank() >= b.int_rank() {
        a
    } else {
        b
    }
}

fn display(ty: &Type) -> String {
    ty.display_name()
}

/// The `TypeDefId` a type names at the top level, if it's an alias. Two
/// operands where either side is an alias and the two don't name the *same*
/// alias are incompatible even when their unwrapped shapes match -- `hello`
/// (an alias of `i64`) and a bare `i64` compare unequal even though both
/// unwrap to `i64`.
fn alias_def(ty: &Type) -> Option<TypeDefId> {
    match ty {
        Type::Alias { def, .. } => Some(*def),
        _ => None,
    }
}

/// Rejects operand pairs where one side is an alias and the other isn't the
/// *same* alias, before either side gets unwrapped to its underlying shape.
fn incompatible_by_alias_identity(lt: &Type, rt: &Type) -> bool {
    let ld = alias_def(lt);
    let rd = alias_def(rt);
    (ld.is_some() || rd.is_some()) && ld != rd
}

pub fn arith_result(
    op: ArithOp,
    lt: &Type,
    rt: &Type,
    pos: &Position,
    resolve: &Resolve,
) -> Result<Type, TypeError> {
    if incompatible_by_alias_identity(lt, rt) {
        return Err(TypeError::Incompatible {
            pos: pos.clone(),
            lhs: display(lt),
            rhs: display(rt),
        });
    }
    let l = unwrap(lt, resolve);
    let r = unwrap(rt, resolve);
    match (&l, &r) {
        (Type::Basic(a), Type::Basic(b)) if a.is_int() && b.is_int() => {
            Ok(Type::Basic(wider_int(*a, *b)))
        }
        (Type::Basic(a), Type::Basic(b)) if a.is_float() && b.is_float() => {
            let wider = if a.size_in_bytes() >= b.size_in_bytes() { *a } else { *b };
            Ok(Type::Basic(wider))
        }
        // Pointer arithmetic: pointer +/- integer yields the same pointer type.
        (Type::Pointer(_), Type::Basic(b))
            if b.is_int() && matches!(op, ArithOp::Add | ArithOp::Sub) =>
        {
            Ok(l.clone())
        }
        (Type::Basic(a), Type::Pointer(_)) if a.is_int() && matches!(op, ArithOp::Add) => {
            Ok(r.clone())
        }
        _ => Err(TypeError::Incompatible {
            pos: pos.clone(),
            lhs: display(&l),
            rhs: display(&r),
        }),
    }
}

pub fn cmp_result(
    _op: CmpOp,
    lt: &Type,
    rt: &Type,
    pos: &Position,
    resolve: &Resolve,
) -> Result<Type, TypeError> {
    if incompatible_by_alias_identity(lt, rt) {
        return Err(TypeError::Incompatible {
            pos: pos.clone(),
            lhs: display(lt),
            rhs: display(rt),
        });
    }
    let l = unwrap(lt, resolve);
    let r = unwrap(rt, resolve);
    let comparable = match (&l, &r) {
        (Type::Basic(a), Type::Basic(b)) => (a.is_int() && b.is_int()) || (a.is_float() && b.is_float()),
        (Type::Pointer(_), Type::Pointer(_)) => true,
        _ => false,
    };
    if comparable {
        Ok(Type::Basic(BasicType::Bool))
    } else {
        Err(TypeError::Incompatible {
            pos: pos.clone(),
            lhs: display(&l),
            rhs: display(&r),
        })
    }
}

pub fn logic_result(
    _op: LogicOp,
    lt: &Type,
    rt: &Type,
    pos: &Position,
    resolve: &Resolve,
) -> Result<Type, TypeError> {
    let l = unwrap(lt, resolve);
    let r = unwrap(rt, resolve);
    if l.is_bool() && r.is_bool() {
        Ok(Type::Basic(BasicType::Bool))
    } else {
        Err(TypeError::Mismatch {
            pos: pos.clone(),
            expected: "bool".into(),
            found: format!("{} and {}", display(&l), display(&r)),
        })
    }
}

pub fn bit_result(
    _op: BitOp,
    lt: &Type,
    rt: &Type,
    pos: &Position,
    resolve: &Resolve,
) -> Result<Type, TypeError> {
    if incompatible_by_alias_identity(lt, rt) {
        return Err(TypeError::Incompatible {
            pos: pos.clone(),
            lhs: display(lt),
            rhs: display(rt),
        });
    }
    let l = unwrap(lt, resolve);
    let r = unwrap(rt, resolve);
    match (&l, &r) {
        (Type::Basic(a), Type::Basic(b)) if a.is_int() && b.is_int() => {
            Ok(Type::Basic(wider_int(*a, *b)))
        }
        _ => Err(TypeError::Incompatible {
            pos: pos.clone(),
            lhs: display(&l),
            rhs: display(&r),
        }),
    }
}

pub fn shift_result(
    _op: ShiftOp,
    lt: &Type,
    rt: &Type,
    pos: &Position,
    resolve: &Resolve,
) -> Result<Type, TypeError> {
    if incompatible_by_alias_identity(lt, rt) {
        return Err(TypeError::Incompatible {
            pos: pos.clone(),
            lhs: display(lt),
            rhs: display(rt),
        });
    }
    let l = unwrap(lt, resolve);
    let r = unwrap(rt, resolve);
    match (&l, &r) {
        (Type::Basic(a), Type::Basic(b)) if a.is_int() && b.is_int() => Ok(l.clone()),
        _ => Err(TypeError::Incompatible {
            pos: pos.clone(),
            lhs: display(&l),
            rhs: display(&r),
        }),
    }
}

pub fn unary_result(
    op: UnaryOp,
    operand: &Type,
    operand_is_lvalue: bool,
    pos: &Position,
    resolve: &Resolve,
) -> Result<Type, TypeError> {
    let t = unwrap(operand, resolve);
    match op {
        UnaryOp::Neg => {
            if t.is_int() || t.is_float() {
                Ok(operand.clone())
            } else {
                Err(TypeError::Mismatch {
                    pos: pos.clone(),
                    expected: "numeric operand".into(),
                    found: display(&t),
                })
            }
        }
        UnaryOp::Not => {
            if t.is_bool() {
                Ok(Type::Basic(BasicType::Bool))
            } else {
                Err(TypeError::Mismatch {
                    pos: pos.clone(),
                    expected: "bool".into(),
                    found: display(&t),
                })
            }
        }
        UnaryOp::BitNot => {
            if t.is_int() {
                Ok(operand.clone())
            } else {
                Err(TypeError::Mismatch {
                    pos: pos.clone(),
                    expected: "integer operand".into(),
                    found: display(&t),
                })
            }
        }
        UnaryOp::Deref => match &t {
            Type::Pointer(inner) => Ok((**inner).clone()),
            _ => Err(TypeError::NotAPointer {
                pos: pos.clone(),
                found: display(&t),
            }),
        },
        UnaryOp::AddrOf => {
            if operand_is_lvalue {
                Ok(Type::pointer(operand.clone()))
            } else {
                Err(TypeError::NotLValue { pos: pos.clone() })
            }
        }
        UnaryOp::PreInc | UnaryOp::PreDec => {
            if !operand_is_lvalue {
                return Err(TypeError::NotLValue { pos: pos.clone() });
            }
            if t.is_int() || t.is_pointer() {
                Ok(operand.clone())
            } else {
                Err(TypeError::Mismatch {
                    pos: pos.clone(),
                    expected: "integer or pointer operand".into(),
                    found: display(&t),
                })
            }
        }
        UnaryOp::PostInc | UnaryOp::PostDec => {
            unreachable!("postfix inc/dec are checked via TypedExpr::PostfixInc/Dec, not Unary")
        }
    }
}
