//! The SI type system.
//!
//! Provides the complete set of types used in SI programs: the eight basic
//! types, transparent aliases, pointers, fixed-size arrays, and structs.
//! Unlike a nominal type system, equality here is always structural (modulo
//! alias unwrap) -- there is no `TypeId` registry, so two independently
//! constructed `Type::Struct` values with the same field names, types and
//! order compare equal.

use indexmap::IndexMap;

use crate::id::TypeDefId;

/// The eight scalar/primitive kinds SI exposes directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BasicType {
    Void,
    Bool,
    I8,
    I16,
    I32,
    I64,
    F32,
    F64,
}

impl BasicType {
    pub fn size_in_bytes(self) -> u64 {
        match self {
            BasicType::Void => 0,
            BasicType::Bool => 1,
            BasicType::I8 => 1,
            BasicType::I16 => 2,
            BasicType::I32 => 4,
            BasicType::I64 => 8,
            BasicType::F32 => 4,
            BasicType::F64 => 8,
        }
    }

    pub fn is_int(self) -> bool {
        matches!(
            self,
            BasicType::I8 | BasicType::I16 | BasicType::I32 | BasicType::I64
        )
    }

    pub fn is_float(self) -> bool {
        matches!(self, BasicType::F32 | BasicType::F64)
    }

    pub fn name(self) -> &'static str {
        match self {
            BasicType::Void => "void",
            BasicType::Bool => "bool",
            BasicType::I8 => "i8",
            BasicType::I16 => "i16",
            BasicType::I32 => "i32",
            BasicType::I64 => "i64",
            BasicType::F32 => "f32",
            BasicType::F64 => "f64",
        }
    }

    /// Integer width rank used to decide safe widening direction for casts.
    /// Higher rank = wider. Only meaningful when `is_int()` is true.
    pub fn int_rank(self) -> u8 {
        match self {
            BasicType::I8 => 0,
            BasicType::I16 => 1,
            BasicType::I32 => 2,
            BasicType::I64 => 3,
            _ => 0,
        }
    }
}

/// A field of a struct type: name plus declared type, in declaration order.
pub type Fields = IndexMap<String, Type>;

/// The SI type grammar: basic, alias, pointer, array, struct.
///
/// `Alias` carries the `TypeDefId` of the defining `type` declaration so
/// [`Type::equals`] can unwrap it without a separate lookup table threaded
/// through every call site; the id is resolved back to its target type via
/// the [`crate::scope::ScopeArena`] that owns the compilation's type
/// definitions.
#[derive(Debug, Clone, PartialEq)]
pub enum Type {
    Basic(BasicType),
    Alias { name: String, def: TypeDefId },
    Pointer(Box<Type>),
    Array { length: u64, element: Box<Type> },
    Struct(Fields),
}

impl Type {
    pub fn pointer(inner: Type) -> Type {
        Type::Pointer(Box::new(inner))
    }

    pub fn is_bool(&self) -> bool {
        matches!(self, Type::Basic(BasicType::Bool))
    }

    pub fn is_int(&self) -> bool {
        matches!(self, Type::Basic(b) if b.is_int())
    }

    pub fn is_float(&self) -> bool {
        matches!(self, Type::Basic(b) if b.is_float())
    }

    pub fn is_pointer(&self) -> bool {
        matches!(self, Type::Pointer(_))
    }

    pub fn is_aggregate(&self) -> bool {
        matches!(self, Type::Array { .. } | Type::Struct(_))
    }

    pub fn is_void(&self) -> bool {
        matches!(self, Type::Basic(BasicType::Void))
    }

    /// Unwraps transparent aliases down to their non-alias target, resolving
    /// through `resolve` (typically `ScopeArena::alias_target`). Returns a
    /// borrowed reference to avoid cloning struct/array payloads on the hot
    /// path of every binary-op type check.
    pub fn unwrap_alias<'a>(&'a self, resolve: &'a dyn Fn(TypeDefId) -> &'a Type) -> &'a Type {
        match self {
            Type::Alias { def, .. } => resolve(*def).unwrap_alias(resolve),
            other => other,
        }
    }

    /// Structural equality, alias-transparent: two types are equal if their
    /// alias-unwrapped forms are equal. Structs are equal iff fields compare
    /// pairwise equal by name, type and order.
    pub fn equals(&self, other: &Type, resolve: &dyn Fn(TypeDefId) -> Type) -> bool {
        // Short-circuit on identical alias ids before unwrapping: a struct
        // that reaches itself again through a pointer field (a linked list's
        // `Node *next`) would otherwise unwrap the same alias forever.
        if let (Type::Alias { def: d1, .. }, Type::Alias { def: d2, .. }) = (self, other) {
            if d1 == d2 {
                return true;
            }
        }
        let a = unwrap_owned(self, resolve);
        let b = unwrap_owned(other, resolve);
        match (&a, &b) {
            (Type::Basic(x), Type::Basic(y)) => x == y,
            (Type::Pointer(x), Type::Pointer(y)) => x.equals(y, resolve),
            (
                Type::Array {
                    length: l1,
                    element: e1,
                },
                Type::Array {
                    length: l2,
                    element: e2,
                },
            ) => l1 == l2 && e1.equals(e2, resolve),
            (Type::Struct(f1), Type::Struct(f2)) => {
                f1.len() == f2.len()
                    && f1
                        .iter()
                        .zip(f2.iter())
                        .all(|((n1, t1), (n2, t2))| n1 == n2 && t1.equals(t2, resolve))
            }
            _ => false,
        }
    }

    /// Compile-time size in bytes; arrays are length * element size, structs
    /// are the sum of field sizes with no padding (current design).
    pub fn size_in_bytes(&self, resolve: &dyn Fn(TypeDefId) -> Type) -> u64 {
        match unwrap_owned(self, resolve) {
            Type::Basic(b) => b.size_in_bytes(),
            Type::Alias { .. } => unreachable!("unwrap_owned already removed aliases"),
            Type::Pointer(_) => 8,
            Type::Array { length, element } => length * element.size_in_bytes(resolve),
            Type::Struct(fields) => fields.values().map(|t| t.size_in_bytes(resolve)).sum(),
        }
    }

    pub fn display_name(&self) -> String {
        match self {
            Type::Basic(b) => b.name().to_string(),
            Type::Alias { name, .. } => name.clone(),
            Type::Pointer(inner) => format!("{}*", inner.display_name()),
            Type::Array { length, element } => format!("{}[{}]", element.display_name(), length),
            Type::Struct(_) => "struct".to_string(),
        }
    }
}

fn unwrap_owned(ty: &Type, resolve: &dyn Fn(TypeDefId) -> Type) -> Type {
    match ty {
        Type::Alias { def, .. } => unwrap_owned(&resolve(*def), resolve),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_aliases(_: TypeDefId) -> Type {
        unreachable!("test fixtures contain no aliases")
    }

    #[test]
    fn basic_sizes_match_spec() {
        assert_eq!(BasicType::I8.size_in_bytes(), 1);
        assert_eq!(BasicType::I16.size_in_bytes(), 2);
        assert_eq!(BasicType::I32.size_in_bytes(), 4);
        assert_eq!(BasicType::I64.size_in_bytes(), 8);
        assert_eq!(BasicType::F32.size_in_bytes(), 4);
        assert_eq!(BasicType::F64.size_in_bytes(), 8);
        assert_eq!(BasicType::Bool.size_in_bytes(), 1);
        assert_eq!(Type::pointer(Type::Basic(BasicType::I8)).size_in_bytes(&no_aliases), 8);
    }

    #[test]
    fn array_size_is_length_times_element() {
        let arr = Type::Array {
            length: 6,
            element: Box::new(Type::Basic(BasicType::I64)),
        };
        assert_eq!(arr.size_in_bytes(&no_aliases), 48);
    }

    #[test]
    fn struct_size_is_sum_of_fields_no_padding() {
        let mut fields = Fields::new();
        fields.insert("data".into(), Type::Basic(BasicType::I64));
        fields.insert("next".into(), Type::pointer(Type::Basic(BasicType::I8)));
        let s = Type::Struct(fields);
        assert_eq!(s.size_in_bytes(&no_aliases), 16);
    }

    #[test]
    fn equals_is_reflexive_symmetric_transitive_for_structs() {
        let mut f1 = Fields::new();
        f1.insert("x".into(), Type::Basic(BasicType::I64));
        let a = Type::Struct(f1.clone());
        let b = Type::Struct(f1.clone());
        let c = Type::Struct(f1);

        assert!(a.equals(&a, &no_aliases));
        assert_eq!(a.equals(&b, &no_aliases), b.equals(&a, &no_aliases));
        assert!(a.equals(&b, &no_aliases) && b.equals(&c, &no_aliases));
        assert!(a.equals(&c, &no_aliases));
    }

    #[test]
    fn struct_field_order_matters() {
        let mut f1 = Fields::new();
        f1.insert("x".into(), Type::Basic(BasicType::I32));
        f1.insert("y".into(), Type::Basic(BasicType::I32));
        let mut f2 = Fields::new();
        f2.insert("y".into(), Type::Basic(BasicType::I32));
        f2.insert("x".into(), Type::Basic(BasicType::I32));
        assert!(!Type::Struct(f1).equals(&Type::Struct(f2), &no_aliases));
    }

    #[test]
    fn equals_preserved_across_alias_wrap() {
        let target = Type::Basic(BasicType::I64);
        let alias = Type::Alias {
            name: "hello".into(),
            def: TypeDefId(0),
        };
        let resolve = |_: TypeDefId| Type::Basic(BasicType::I64);
        assert!(alias.equals(&target, &resolve));
        assert!(target.equals(&alias, &resolve));
    }

    #[test]
    fn predicates() {
        assert!(Type::Basic(BasicType::Bool).is_bool());
        assert!(Type::Basic(BasicType::I32).is_int());
        assert!(Type::Basic(BasicType::F64).is_float());
        assert!(Type::pointer(Type::Basic(BasicType::I8)).is_pointer());
        assert!(Type::Struct(Fields::new()).is_aggregate());
        assert!(Type::Basic(BasicType::Void).is_void());
    }
}

/// Property tests for the invariants spec'd on `Type::equals`: reflexive
/// and symmetric for arbitrary (possibly empty, possibly field-name
/// colliding) struct shapes, not just the hand-picked cases above.
#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn no_aliases(_: TypeDefId) -> Type {
        unreachable!("generated fixtures contain no aliases")
    }

    fn basic_type() -> impl Strategy<Value = BasicType> {
        prop_oneof![
            Just(BasicType::Void),
            Just(BasicType::Bool),
            Just(BasicType::I8),
            Just(BasicType::I16),
            Just(BasicType::I32),
            Just(BasicType::I64),
            Just(BasicType::F32),
            Just(BasicType::F64),
        ]
    }

    fn struct_of(fields: Vec<(String, BasicType)>) -> Type {
        let mut f = Fields::new();
        for (name, bt) in fields {
            f.insert(name, Type::Basic(bt));
        }
        Type::Struct(f)
    }

    proptest! {
        #[test]
        fn equals_is_reflexive_for_arbitrary_structs(
            names in prop::collection::vec("[a-z]{1,4}", 0..4),
            types in prop::collection::vec(basic_type(), 0..4),
        ) {
            let n = names.len().min(types.len());
            let s = struct_of(names.into_iter().zip(types).take(n).collect());
            prop_assert!(s.equals(&s, &no_aliases));
        }

        #[test]
        fn equals_is_symmetric_for_arbitrary_struct_pairs(
            names_a in prop::collection::vec("[a-z]{1,4}", 0..4),
            types_a in prop::collection::vec(basic_type(), 0..4),
            names_b in prop::collection::vec("[a-z]{1,4}", 0..4),
            types_b in prop::collection::vec(basic_type(), 0..4),
        ) {
            let na = names_a.len().min(types_a.len());
            let nb = names_b.len().min(types_b.len());
            let a = struct_of(names_a.into_iter().zip(types_a).take(na).collect());
            let b = struct_of(names_b.into_iter().zip(types_b).take(nb).collect());
            prop_assert_eq!(a.equals(&b, &no_aliases), b.equals(&a, &no_aliases));
        }
    }
}
