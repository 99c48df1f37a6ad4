//! Assignability and explicit-cast legality.
//!
//! SI has no implicit numeric widening and no implicit `NULL` typing: an
//! assignment or argument pass is legal only when the two types are
//! structurally equal (alias-transparent, via [`Type::equals`]); anywhere a
//! different type is wanted, the source must say so with a cast. Casts
//! themselves are restricted to the five conversions spec.md lists, plus the
//! always-legal alias/underlying-basic-type pair (already covered by
//! `Type::equals` unwrapping the alias before the cast kind is even
//! consulted).

use si_core::{Type, TypeDefId};

type Resolve<'a> = dyn Fn(TypeDefId) -> Type + 'a;

pub fn assignable(from: &Type, to: &Type, resolve: &Resolve) -> bool {
    from.equals(to, resolve)
}

fn unwrap(ty: &Type, resolve: &Resolve) -> Type {
    match ty {
        Type::Alias { def, .. } => unwrap(&resolve(*def), resolve),
        other => other.clone(),
    }
}

/// Whether an explicit `(to)expr` cast from `from` to `to` is legal.
/// Equal types are always legal (a cast that changes nothing).
pub fn cast_allowed(from: &Type, to: &Type, resolve: &Resolve) -> bool {
    if from.equals(to, resolve) {
        return true;
    }
    let f = unwrap(from, resolve);
    let t = unwrap(to, resolve);
    match (&f, &t) {
        (Type::Basic(a), Type::Basic(b)) => (a.is_int() && b.is_int())
            || (a.is_float() && b.is_float())
            || (a.is_int() && b.is_float())
            || (a.is_float() && b.is_int()),
        (Type::Basic(a), Type::Pointer(_)) if a.is_int() => true,
        (Type::Pointer(_), Type::Basic(b)) if b.is_int() => true,
        (Type::Pointer(_), Type::Pointer(_)) => true,
        _ => false,
    }
}
