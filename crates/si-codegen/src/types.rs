//! `si_core::Type` -> textual LLVM type mapping.
//!
//! A struct created via `type struct {...} Name;` lowers to a named LLVM
//! type (`%struct.Name`), declared once at module level by
//! [`struct_type_decls`]; every other use site (a field, a pointer, an
//! array element, a parameter) references it by name rather than
//! re-expanding its body. This is required, not just tidy, for a
//! self-referential struct (`Node { i64 data; Node *next; }`): LLVM's
//! anonymous literal aggregate syntax has no way to name itself from
//! inside its own definition, so `Node *next` can only be expressed as
//! `%struct.Node*`, a reference to the named type, not as a literal
//! `{..., {...}*}` expanded in place (which would recurse forever). A
//! struct type that never flows through a `type` alias (there is no
//! surface syntax for that in SI, but the `Type` grammar technically
//! allows it) still falls back to an anonymous literal.

use si_core::{BasicType, ScopeArena, Type};

pub fn llvm_type(ty: &Type, scopes: &ScopeArena) -> String {
    let resolve = scopes.resolver();
    match ty {
        Type::Basic(b) => basic_llvm_type(*b).to_string(),
        Type::Alias { name, def } => {
            if matches!(resolve(*def), Type::Struct(_)) {
                named_struct_type(name)
            } else {
                llvm_type(&resolve(*def), scopes)
            }
        }
        Type::Pointer(inner) => format!("{}*", llvm_type(inner, scopes)),
        Type::Array { length, element } => {
            format!("[{} x {}]", length, llvm_type(element, scopes))
        }
        Type::Struct(fields) => {
            let parts: Vec<String> = fields.values().map(|t| llvm_type(t, scopes)).collect();
            format!("{{{}}}", parts.join(", "))
        }
    }
}

/// The named LLVM type a struct alias lowers to (`Node` -> `%struct.Node`).
pub fn named_struct_type(name: &str) -> String {
    format!("%struct.{name}")
}

/// `%struct.<Name> = type {...}` for every alias in `scopes` that resolves
/// to a struct, in declaration order. Emitted once at the top of the
/// module, before any function refers to the name.
pub fn struct_type_decls(scopes: &ScopeArena) -> Vec<String> {
    scopes
        .type_defs()
        .filter_map(|(_, td)| match &td.target {
            Type::Struct(fields) => {
                let parts: Vec<String> = fields.values().map(|t| llvm_type(t, scopes)).collect();
                Some(format!(
                    "{} = type {{{}}}",
                    named_struct_type(&td.alias_name),
                    parts.join(", ")
                ))
            }
            _ => None,
        })
        .collect()
}

pub fn basic_llvm_type(b: BasicType) -> &'static str {
    match b {
        BasicType::Void => "void",
        BasicType::Bool => "i1",
        BasicType::I8 => "i8",
        BasicType::I16 => "i16",
        BasicType::I32 => "i32",
        BasicType::I64 => "i64",
        BasicType::F32 => "float",
        BasicType::F64 => "double",
    }
}

pub fn is_aggregate(ty: &Type, scopes: &ScopeArena) -> bool {
    let resolve = scopes.resolver();
    match ty {
        Type::Alias { def, .. } => is_aggregate(&resolve(*def), scopes),
        Type::Struct(_) | Type::Array { .. } => true,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use si_core::{Fields, ScopeArena};

    #[test]
    fn self_referential_struct_lowers_pointer_field_by_name_not_by_expansion() {
        let mut scopes = ScopeArena::new();
        let root = scopes.root();
        let id = scopes.reserve_type_def(root, "Node".to_string()).unwrap();
        let mut fields = Fields::new();
        fields.insert("data".to_string(), Type::Basic(BasicType::I64));
        fields.insert(
            "next".to_string(),
            Type::pointer(Type::Alias { name: "Node".to_string(), def: id }),
        );
        scopes.set_type_def_target(id, Type::Struct(fields));

        let node_alias = Type::Alias { name: "Node".to_string(), def: id };
        assert_eq!(llvm_type(&node_alias, &scopes), "%struct.Node");
        assert_eq!(
            llvm_type(&Type::pointer(node_alias), &scopes),
            "%struct.Node*"
        );

        let decls = struct_type_decls(&scopes);
        assert_eq!(decls, vec!["%struct.Node = type {i64, %struct.Node*}".to_string()]);
    }

    #[test]
    fn anonymous_struct_not_behind_an_alias_still_lowers_to_a_literal() {
        let scopes = ScopeArena::new();
        let mut fields = Fields::new();
        fields.insert("x".to_string(), Type::Basic(BasicType::I32));
        let ty = Type::Struct(fields);
        assert_eq!(llvm_type(&ty, &scopes), "{i32}");
    }
}
