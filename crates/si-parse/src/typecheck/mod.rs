//! Type checking over the name-resolved [`TypedModule`].
//!
//! Rather than annotate a `Type` onto every node during the transform, this
//! module infers the type of each expression on demand, bottom-up, the same
//! way the transform resolved names: one recursive walk, no separate
//! mutable annotation pass. Integer and float literals (and `NULL`) start
//! out *untyped* -- [`Inferred::UntypedInt`] / `UntypedFloat` / `UntypedNull`
//! -- and only settle on a concrete `Type` once they meet a concrete operand,
//! an assignment target, a call argument slot, or (for `NULL`) an explicit
//! cast. An untyped `NULL` that never meets a cast is a [`TypeError`].

pub mod coercion;
pub mod diagnostics;
pub mod rules;

pub use diagnostics::TypeError;

use si_core::{BasicType, Position, ScopeArena, Type};

use crate::ast::BinOp;
use crate::typed::{TypedExpr, TypedFunction, TypedModule, TypedStmt};

#[derive(Debug, Clone)]
enum Inferred {
    Concrete(Type),
    UntypedInt,
    UntypedFloat,
    UntypedNull,
}

fn require_concrete(inferred: Inferred, pos: &Position) -> Result<Type, TypeError> {
    match inferred {
        Inferred::Concrete(t) => Ok(t),
        Inferred::UntypedInt => Ok(Type::Basic(BasicType::I64)),
        Inferred::UntypedFloat => Ok(Type::Basic(BasicType::F64)),
        Inferred::UntypedNull => Err(TypeError::UntypedNull { pos: pos.clone() }),
    }
}

/// Settles an untyped literal against a concrete `anchor` type when the
/// kinds are compatible, otherwise falls back to the default concrete type.
fn default_against(anchor: &Type, inferred: Inferred, pos: &Position) -> Result<Type, TypeError> {
    match inferred {
        Inferred::Concrete(t) => Ok(t),
        Inferred::UntypedInt => {
            if anchor.is_int() {
                Ok(anchor.clone())
            } else if anchor.is_pointer() {
                Ok(Type::Basic(BasicType::I64))
            } else {
                Ok(Type::Basic(BasicType::I64))
            }
        }
        Inferred::UntypedFloat => {
            if anchor.is_float() {
                Ok(anchor.clone())
            } else {
                Ok(Type::Basic(BasicType::F64))
            }
        }
        Inferred::UntypedNull => {
            if anchor.is_pointer() {
                Ok(anchor.clone())
            } else {
                Err(TypeError::UntypedNull { pos: pos.clone() })
            }
        }
    }
}

fn coerce_pair(
    li: Inferred,
    ri: Inferred,
    pos: &Position,
) -> Result<(Type, Type), TypeError> {
    match (li, ri) {
        (Inferred::Concrete(l), r) => {
            let rt = default_against(&l, r, pos)?;
            Ok((l, rt))
        }
        (l, Inferred::Concrete(r)) => {
            let lt = default_against(&r, l, pos)?;
            Ok((lt, r))
        }
        (l, r) => Ok((require_concrete(l, pos)?, require_concrete(r, pos)?)),
    }
}

fn is_lvalue(e: &TypedExpr) -> bool {
    matches!(
        e,
        TypedExpr::Var(..)
            | TypedExpr::Unary(si_core::UnaryOp::Deref, ..)
            | TypedExpr::Index(..)
            | TypedExpr::Field(..)
    )
}

fn infer_expr(scopes: &ScopeArena, e: &TypedExpr) -> Result<Inferred, TypeError> {
    let resolve = scopes.resolver();
    match e {
        TypedExpr::Int(_, _) => Ok(Inferred::UntypedInt),
        TypedExpr::Float(_, _) => Ok(Inferred::UntypedFloat),
        TypedExpr::Char(_, _) => Ok(Inferred::Concrete(Type::Basic(BasicType::I8))),
        TypedExpr::Bool(_, _) => Ok(Inferred::Concrete(Type::Basic(BasicType::Bool))),
        TypedExpr::Str(_, _) => Ok(Inferred::Concrete(Type::pointer(Type::Basic(BasicType::I8)))),
        TypedExpr::Null(_) => Ok(Inferred::UntypedNull),
        TypedExpr::Var(id, _) => Ok(Inferred::Concrete(scopes.variable(*id).ty.clone())),
        TypedExpr::Binary(op, lhs, rhs, pos) => {
            let li = infer_expr(scopes, lhs)?;
            let ri = infer_expr(scopes, rhs)?;
            match op {
                BinOp::Arith(a) => {
                    let (lt, rt) = coerce_pair(li, ri, pos)?;
                    Ok(Inferred::Concrete(rules::arith_result(*a, &lt, &rt, pos, &resolve)?))
                }
                BinOp::Cmp(c) => {
                    let (lt, rt) = coerce_pair(li, ri, pos)?;
                    Ok(Inferred::Concrete(rules::cmp_result(*c, &lt, &rt, pos, &resolve)?))
                }
                BinOp::Logic(lg) => {
                    let lt = require_concrete(li, pos)?;
                    let rt = require_concrete(ri, pos)?;
                    Ok(Inferred::Concrete(rules::logic_result(*lg, &lt, &rt, pos, &resolve)?))
                }
                BinOp::Bit(b) => {
                    let (lt, rt) = coerce_pair(li, ri, pos)?;
                    Ok(Inferred::Concrete(rules::bit_result(*b, &lt, &rt, pos, &resolve)?))
                }
                BinOp::Shift(s) => {
                    let (lt, rt) = coerce_pair(li, ri, pos)?;
                    Ok(Inferred::Concrete(rules::shift_result(*s, &lt, &rt, pos, &resolve)?))
                }
            }
        }
        TypedExpr::Unary(op, inner, pos) => {
            let it = infer_expr(scopes, inner)?;
            let lvalue = is_lvalue(inner);
            let t = require_concrete(it, pos)?;
            Ok(Inferred::Concrete(rules::unary_result(*op, &t, lvalue, pos, &resolve)?))
        }
        TypedExpr::Cast(ty, inner, pos) => {
            let it = infer_expr(scopes, inner)?;
            match it {
                Inferred::UntypedNull => Ok(Inferred::Concrete(ty.clone())),
                other => {
                    let from = require_concrete(other, pos)?;
                    if coercion::cast_allowed(&from, ty, &resolve) {
                        Ok(Inferred::Concrete(ty.clone()))
                    } else {
                        Err(TypeError::IllegalCast {
                            pos: pos.clone(),
                            from: from.display_name(),
                            to: ty.display_name(),
                        })
                    }
                }
            }
        }
        TypedExpr::Call(fid, args, pos) => {
            let f = scopes.function(*fid);
            let min = f.params.len();
            if (!f.variadic && args.len() != min) || (f.variadic && args.len() < min) {
                return Err(TypeError::WrongArgCount {
                    pos: pos.clone(),
                    name: f.name.clone(),
                    expected: min,
                    found: args.len(),
                });
            }
            for (i, (arg, (_, pty))) in args.iter().zip(f.params.iter()).enumerate() {
                let ai = infer_expr(scopes, arg)?;
                let at = default_against(pty, ai, pos)?;
                if !coercion::assignable(&at, pty, &resolve) {
                    return Err(TypeError::ArgTypeMismatch {
                        pos: pos.clone(),
                        name: f.name.clone(),
                        index: i,
                        expected: pty.display_name(),
                        found: at.display_name(),
                    });
                }
            }
            for extra in args.iter().skip(min) {
                infer_expr(scopes, extra)?;
            }
            Ok(Inferred::Concrete(f.return_type.clone()))
        }
        TypedExpr::Index(base, idx, pos) => {
            let bt = require_concrete(infer_expr(scopes, base)?, pos)?;
            let it = require_concrete(infer_expr(scopes, idx)?, pos)?;
            if !it.is_int() {
                return Err(TypeError::Mismatch {
                    pos: pos.clone(),
                    expected: "integer index".into(),
                    found: it.display_name(),
                });
            }
            match unwrap(&bt, &resolve) {
                Type::Array { element, .. } => Ok(Inferred::Concrete(*element)),
                Type::Pointer(inner) => Ok(Inferred::Concrete(*inner)),
                other => Err(TypeError::NotIndexable {
                    pos: pos.clone(),
                    found: other.display_name(),
                }),
            }
        }
        TypedExpr::Field(base, name, pos) => {
            let bt = require_concrete(infer_expr(scopes, base)?, pos)?;
            match unwrap(&bt, &resolve) {
                Type::Struct(fields) => fields
                    .get(name)
                    .cloned()
                    .map(Inferred::Concrete)
                    .ok_or_else(|| TypeError::UndefinedField {
                        pos: pos.clone(),
                        ty: bt.display_name(),
                        field: name.clone(),
                    }),
                other => Err(TypeError::NotAStruct {
                    pos: pos.clone(),
                    found: other.display_name(),
                }),
            }
        }
        TypedExpr::SizeOfType(_, _) => Ok(Inferred::Concrete(Type::Basic(BasicType::I64))),
        TypedExpr::SizeOfExpr(inner, pos) => {
            // The operand's type isn't used for anything beyond validating
            // that it type-checks; `sizeof` reports only the static size.
            infer_expr(scopes, inner)?;
            let _ = pos;
            Ok(Inferred::Concrete(Type::Basic(BasicType::I64)))
        }
        TypedExpr::PostfixInc(inner, pos) | TypedExpr::PostfixDec(inner, pos) => {
            if !is_lvalue(inner) {
                return Err(TypeError::NotLValue { pos: pos.clone() });
            }
            let t = require_concrete(infer_expr(scopes, inner)?, pos)?;
            if t.is_int() || t.is_pointer() {
                Ok(Inferred::Concrete(t))
            } else {
                Err(TypeError::Mismatch {
                    pos: pos.clone(),
                    expected: "integer or pointer operand".into(),
                    found: t.display_name(),
                })
            }
        }
    }
}

fn unwrap(ty: &Type, resolve: &dyn Fn(si_core::TypeDefId) -> Type) -> Type {
    match ty {
        Type::Alias { def, .. } => unwrap(&resolve(*def), resolve),
        other => other.clone(),
    }
}

fn check_stmts(
    scopes: &ScopeArena,
    stmts: &[TypedStmt],
    return_ty: &Type,
    in_loop: bool,
) -> Result<(), TypeError> {
    for s in stmts {
        check_stmt(scopes, s, return_ty, in_loop)?;
    }
    Ok(())
}

fn check_stmt(
    scopes: &ScopeArena,
    stmt: &TypedStmt,
    return_ty: &Type,
    in_loop: bool,
) -> Result<(), TypeError> {
    let resolve = scopes.resolver();
    match stmt {
        TypedStmt::Decl { var, init, pos } => {
            if let Some(init) = init {
                let var_ty = scopes.variable(*var).ty.clone();
                let it = infer_expr(scopes, init)?;
                let at = default_against(&var_ty, it, pos)?;
                if !coercion::assignable(&at, &var_ty, &resolve) {
                    return Err(TypeError::Mismatch {
                        pos: pos.clone(),
                        expected: var_ty.display_name(),
                        found: at.display_name(),
                    });
                }
            }
            Ok(())
        }
        TypedStmt::Assign { lhs, rhs, pos } => {
            if !is_lvalue(lhs) {
                return Err(TypeError::NotLValue { pos: pos.clone() });
            }
            let lt = require_concrete(infer_expr(scopes, lhs)?, pos)?;
            let ri = infer_expr(scopes, rhs)?;
            let rt = default_against(&lt, ri, pos)?;
            if !coercion::assignable(&rt, &lt, &resolve) {
                return Err(TypeError::Mismatch {
                    pos: pos.clone(),
                    expected: lt.display_name(),
                    found: rt.display_name(),
                });
            }
            Ok(())
        }
        TypedStmt::Expr(e) => {
            infer_expr(scopes, e)?;
            Ok(())
        }
        TypedStmt::Return(e, pos) => {
            if return_ty.is_void() {
                if e.is_some() {
                    return Err(TypeError::Mismatch {
                        pos: pos.clone(),
                        expected: "void".into(),
                        found: "a value".into(),
                    });
                }
                return Ok(());
            }
            let Some(e) = e else {
                return Err(TypeError::Mismatch {
                    pos: pos.clone(),
                    expected: return_ty.display_name(),
                    found: "void".into(),
                });
            };
            let it = infer_expr(scopes, e)?;
            let at = default_against(return_ty, it, pos)?;
            if !coercion::assignable(&at, return_ty, &resolve) {
                return Err(TypeError::Mismatch {
                    pos: pos.clone(),
                    expected: return_ty.display_name(),
                    found: at.display_name(),
                });
            }
            Ok(())
        }
        TypedStmt::Compound(_, stmts) => check_stmts(scopes, stmts, return_ty, in_loop),
        TypedStmt::If {
            cond,
            then_branch,
            else_branch,
            pos,
        } => {
            check_condition(scopes, cond, pos)?;
            check_stmt(scopes, then_branch, return_ty, in_loop)?;
            if let Some(eb) = else_branch {
                check_stmt(scopes, eb, return_ty, in_loop)?;
            }
            Ok(())
        }
        TypedStmt::While { cond, body, pos } => {
            check_condition(scopes, cond, pos)?;
            check_stmt(scopes, body, return_ty, true)
        }
        TypedStmt::For {
            init,
            cond,
            post,
            body,
            pos,
            ..
        } => {
            if let Some(init) = init {
                check_stmt(scopes, init, return_ty, in_loop)?;
            }
            if let Some(cond) = cond {
                check_condition(scopes, cond, pos)?;
            }
            if let Some(post) = post {
                check_stmt(scopes, post, return_ty, true)?;
            }
            check_stmt(scopes, body, return_ty, true)
        }
        TypedStmt::Break(pos) => {
            if in_loop {
                Ok(())
            } else {
                Err(TypeError::BreakOutsideLoop { pos: pos.clone() })
            }
        }
        TypedStmt::Continue(pos) => {
            if in_loop {
                Ok(())
            } else {
                Err(TypeError::ContinueOutsideLoop { pos: pos.clone() })
            }
        }
    }
}

fn check_condition(scopes: &ScopeArena, cond: &TypedExpr, pos: &Position) -> Result<(), TypeError> {
    let t = require_concrete(infer_expr(scopes, cond)?, pos)?;
    if t.is_bool() {
        Ok(())
    } else {
        Err(TypeError::NonBoolCondition {
            pos: pos.clone(),
            found: t.display_name(),
        })
    }
}

fn stmt_always_returns(s: &TypedStmt) -> bool {
    match s {
        TypedStmt::Return(..) => true,
        TypedStmt::Compound(_, stmts) => always_returns(stmts),
        TypedStmt::If {
            then_branch,
            else_branch: Some(eb),
            ..
        } => stmt_always_returns(then_branch) && stmt_always_returns(eb),
        _ => false,
    }
}

fn always_returns(stmts: &[TypedStmt]) -> bool {
    stmts.last().is_some_and(stmt_always_returns)
}

fn check_function(tm: &TypedModule, f: &TypedFunction) -> Result<(), TypeError> {
    let return_ty = tm.scopes.function(f.id).return_type.clone();
    if let Some(body) = &f.body {
        check_stmts(&tm.scopes, body, &return_ty, false)?;
        if !return_ty.is_void() && !always_returns(body) {
            return Err(TypeError::MissingReturn {
                pos: f.pos.clone(),
                function: f.name.clone(),
            });
        }
    }
    Ok(())
}

/// Type-checks every function body in `tm`, stopping at the first error.
pub fn check_module(tm: &TypedModule) -> Result<(), TypeError> {
    for f in &tm.functions {
        check_function(tm, f)?;
    }
    Ok(())
}

/// Re-infers the concrete type of an already-checked expression, for
/// codegen's use. Callers are expected to run this only after
/// [`check_module`] has accepted the surrounding module.
pub fn type_of(scopes: &ScopeArena, e: &TypedExpr) -> Result<Type, TypeError> {
    require_concrete(infer_expr(scopes, e)?, e.pos())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::lex;
    use crate::parser::Parser;
    use crate::transform::transform_module;

    fn check(src: &str) -> Result<(), TypeError> {
        let (_, toks) = lex("t.si", src).unwrap();
        let module = Parser::new(&toks).parse_module().unwrap();
        let tm = transform_module(&module).unwrap();
        check_module(&tm)
    }

    #[test]
    fn simple_function_type_checks() {
        assert!(check("i64 main() { i64 x = 1 + 2; return x; }").is_ok());
    }

    #[test]
    fn mismatched_return_type_is_an_error() {
        let err = check("bool main() { return 1; }").unwrap_err();
        // untyped int 1 defaults to i64, incompatible with bool
        assert!(matches!(err, TypeError::Mismatch { .. }));
    }

    #[test]
    fn missing_return_on_some_paths_is_an_error() {
        let err = check("i64 f(bool c) { if (c) { return 1; } }").unwrap_err();
        assert!(matches!(err, TypeError::MissingReturn { .. }));
    }

    #[test]
    fn return_covered_by_if_else_is_ok() {
        assert!(check("i64 f(bool c) { if (c) { return 1; } else { return 0; } }").is_ok());
    }

    #[test]
    fn untyped_null_without_cast_is_an_error() {
        let err = check("i64 main() { i8 *p = NULL; return 0; }");
        assert!(err.is_err());
    }

    #[test]
    fn null_with_explicit_cast_is_ok() {
        assert!(check("i64 main() { i8 *p = (i8*)NULL; return 0; }").is_ok());
    }

    #[test]
    fn break_outside_loop_is_an_error() {
        let err = check("i64 main() { break; return 0; }").unwrap_err();
        assert!(matches!(err, TypeError::BreakOutsideLoop { .. }));
    }

    #[test]
    fn break_inside_while_is_ok() {
        assert!(check("i64 main() { while (true) { break; } return 0; }").is_ok());
    }

    #[test]
    fn non_bool_condition_is_an_error() {
        let err = check("i64 main() { if (1) { return 1; } return 0; }").unwrap_err();
        assert!(matches!(err, TypeError::NonBoolCondition { .. }));
    }

    #[test]
    fn calling_with_wrong_arg_count_is_an_error() {
        let err = check("i64 f(i64 x) { return x; } i64 main() { return f(); }").unwrap_err();
        assert!(matches!(err, TypeError::WrongArgCount { .. }));
    }

    #[test]
    fn illegal_cast_struct_to_int_is_an_error() {
        let err = check(
            "type struct { i64 a, } S; i64 main() { S s; i64 x = (i64)s; return x; }",
        );
        assert!(err.is_err());
    }
}
