//! Surface-to-typed transform: resolves every name in an [`ast::Module`]
//! against a fresh [`ScopeArena`] and produces a [`TypedModule`].
//!
//! Two passes over the top-level declarations, mirroring a single
//! left-to-right read of the source: first every `type` declaration is
//! registered (so a later declaration, or a function body, can name an
//! earlier alias), then every function's signature is registered globally,
//! and only then are function bodies walked and lowered to [`TypedStmt`]/
//! [`TypedExpr`] trees. A type alias may only reference names already
//! declared above it -- there is no forward reference between aliases, so
//! the only possible "cycle" is a `type Name Name;` self-reference, caught
//! directly rather than via a general graph search.

use si_core::{Function, ScopeArena, ScopeId, Type, Variable};

use crate::ast::{self, Decl, Expr, FunctionDecl, Literal, Module, Stmt, TypeExpr};
use crate::error::ResolveError;
use crate::typed::{TypedExpr, TypedFunction, TypedModule, TypedStmt};

type TResult<T> = Result<T, ResolveError>;

pub fn transform_module(module: &Module) -> TResult<TypedModule> {
    let mut scopes = ScopeArena::new();
    let root = scopes.root();

    for decl in &module.decls {
        if let Decl::TypeDef(td) = decl {
            register_type_def(&mut scopes, root, td)?;
        }
    }

    for decl in &module.decls {
        if let Decl::Function(f) = decl {
            register_function_signature(&mut scopes, root, f)?;
        }
    }

    let mut functions = Vec::new();
    for decl in &module.decls {
        if let Decl::Function(f) = decl {
            functions.push(lower_function(&mut scopes, root, f)?);
        }
    }

    Ok(TypedModule { scopes, functions })
}

fn register_type_def(
    scopes: &mut ScopeArena,
    scope: ScopeId,
    td: &ast::TypeDefDecl,
) -> TResult<()> {
    if let TypeExpr::Named(target_name) = &td.target {
        if target_name == &td.name {
            return Err(ResolveError::AliasCycle {
                pos: td.pos.clone(),
                name: td.name.clone(),
            });
        }
    }
    let id = scopes
        .reserve_type_def(scope, td.name.clone())
        .map_err(|e| ResolveError::from_core(e, td.pos.clone()))?;
    let target = resolve_type_expr(scopes, scope, &td.target, &td.pos)?;
    scopes.set_type_def_target(id, target);
    Ok(())
}

fn resolve_type_expr(
    scopes: &ScopeArena,
    scope: ScopeId,
    te: &TypeExpr,
    pos: &si_core::Position,
) -> TResult<Type> {
    match te {
        TypeExpr::Basic(b) => Ok(Type::Basic(*b)),
        TypeExpr::Named(name) => {
            let id = scopes
                .find_type_def_by_alias(scope, name)
                .ok_or_else(|| ResolveError::UndefinedType {
                    pos: pos.clone(),
                    name: name.clone(),
                })?;
            Ok(Type::Alias {
                name: name.clone(),
                def: id,
            })
        }
        TypeExpr::Pointer(inner) => {
            Ok(Type::pointer(resolve_type_expr(scopes, scope, inner, pos)?))
        }
        TypeExpr::Array(len, inner) => Ok(Type::Array {
            length: *len,
            element: Box::new(resolve_type_expr(scopes, scope, inner, pos)?),
        }),
        TypeExpr::Struct(fields) => {
            let mut out = si_core::Fields::new();
            for (name, fty) in fields {
                out.insert(name.clone(), resolve_type_expr(scopes, scope, fty, pos)?);
            }
            Ok(Type::Struct(out))
        }
    }
}

fn register_function_signature(
    scopes: &mut ScopeArena,
    scope: ScopeId,
    f: &FunctionDecl,
) -> TResult<()> {
    let return_type = resolve_type_expr(scopes, scope, &f.return_ty, &f.pos)?;
    let mut params = Vec::new();
    for p in &f.params {
        params.push((
            p.name.clone(),
            resolve_type_expr(scopes, scope, &p.ty, &f.pos)?,
        ));
    }
    scopes
        .add_function(Function {
            name: f.name.clone(),
            return_type,
            params,
            variadic: f.variadic,
            only_declare: f.body.is_none(),
        })
        .map_err(|e| ResolveError::from_core(e, f.pos.clone()))?;
    Ok(())
}

fn lower_function(
    scopes: &mut ScopeArena,
    module_scope: ScopeId,
    f: &FunctionDecl,
) -> TResult<TypedFunction> {
    let (id, _) = scopes
        .find_function(&f.name)
        .expect("signature registered in the previous pass");
    let fn_scope = scopes.push_child(module_scope);
    scopes.set_current_function(fn_scope, id);

    let mut param_ids = Vec::new();
    for p in &f.params {
        let ty = resolve_type_expr(scopes, fn_scope, &p.ty, &f.pos)?;
        let vid = scopes
            .add_local(
                fn_scope,
                Variable {
                    name: p.name.clone(),
                    ty,
                    storage: String::new(),
                    is_param: true,
                    pos: f.pos.clone(),
                },
            )
            .map_err(|e| ResolveError::from_core(e, f.pos.clone()))?;
        param_ids.push(vid);
    }

    let body = match &f.body {
        None => None,
        Some(stmts) => Some(lower_stmts(scopes, fn_scope, stmts)?),
    };

    Ok(TypedFunction {
        id,
        name: f.name.clone(),
        scope: fn_scope,
        params: param_ids,
        body,
        pos: f.pos.clone(),
    })
}

fn lower_stmts(scopes: &mut ScopeArena, scope: ScopeId, stmts: &[Stmt]) -> TResult<Vec<TypedStmt>> {
    stmts.iter().map(|s| lower_stmt(scopes, scope, s)).collect()
}

fn lower_stmt(scopes: &mut ScopeArena, scope: ScopeId, stmt: &Stmt) -> TResult<TypedStmt> {
    match stmt {
        Stmt::Decl { ty, name, init, pos } => {
            let resolved = resolve_type_expr(scopes, scope, ty, pos)?;
            let init = init
                .as_ref()
                .map(|e| lower_expr(scopes, scope, e))
                .transpose()?;
            let vid = scopes
                .add_local(
                    scope,
                    Variable {
                        name: name.clone(),
                        ty: resolved,
                        storage: String::new(),
                        is_param: false,
                        pos: pos.clone(),
                    },
                )
                .map_err(|e| ResolveError::from_core(e, pos.clone()))?;
            Ok(TypedStmt::Decl {
                var: vid,
                init,
                pos: pos.clone(),
            })
        }
        Stmt::Assign { lhs, rhs, pos } => Ok(TypedStmt::Assign {
            lhs: lower_expr(scopes, scope, lhs)?,
            rhs: lower_expr(scopes, scope, rhs)?,
            pos: pos.clone(),
        }),
        Stmt::Expr(e) => Ok(TypedStmt::Expr(lower_expr(scopes, scope, e)?)),
        Stmt::Return(e, pos) => Ok(TypedStmt::Return(
            e.as_ref().map(|e| lower_expr(scopes, scope, e)).transpose()?,
            pos.clone(),
        )),
        Stmt::Compound(stmts) => {
            let child = scopes.push_child(scope);
            Ok(TypedStmt::Compound(child, lower_stmts(scopes, child, stmts)?))
        }
        Stmt::If {
            cond,
            then_branch,
            else_branch,
            pos,
        } => Ok(TypedStmt::If {
            cond: lower_expr(scopes, scope, cond)?,
            then_branch: Box::new(lower_stmt(scopes, scope, then_branch)?),
            else_branch: else_branch
                .as_ref()
                .map(|s| lower_stmt(scopes, scope, s))
                .transpose()?
                .map(Box::new),
            pos: pos.clone(),
        }),
        Stmt::While { cond, body, pos } => Ok(TypedStmt::While {
            cond: lower_expr(scopes, scope, cond)?,
            body: Box::new(lower_stmt(scopes, scope, body)?),
            pos: pos.clone(),
        }),
        Stmt::For {
            init,
            cond,
            post,
            body,
            pos,
        } => {
            let for_scope = scopes.push_child(scope);
            let init = init
                .as_ref()
                .map(|s| lower_stmt(scopes, for_scope, s))
                .transpose()?
                .map(Box::new);
            let cond = cond
                .as_ref()
                .map(|e| lower_expr(scopes, for_scope, e))
                .transpose()?;
            let post = post
                .as_ref()
                .map(|s| lower_stmt(scopes, for_scope, s))
                .transpose()?
                .map(Box::new);
            let body = Box::new(lower_stmt(scopes, for_scope, body)?);
            Ok(TypedStmt::For {
                scope: for_scope,
                init,
                cond,
                post,
                body,
                pos: pos.clone(),
            })
        }
        Stmt::Break(pos) => Ok(TypedStmt::Break(pos.clone())),
        Stmt::Continue(pos) => Ok(TypedStmt::Continue(pos.clone())),
    }
}

fn lower_expr(scopes: &mut ScopeArena, scope: ScopeId, expr: &Expr) -> TResult<TypedExpr> {
    match expr {
        Expr::Literal(lit, pos) => Ok(match lit {
            Literal::Int(v) => TypedExpr::Int(*v, pos.clone()),
            Literal::Float(v) => TypedExpr::Float(*v, pos.clone()),
            Literal::Char(v) => TypedExpr::Char(*v, pos.clone()),
            Literal::Str(v) => TypedExpr::Str(v.clone(), pos.clone()),
            Literal::Bool(v) => TypedExpr::Bool(*v, pos.clone()),
            Literal::Null => TypedExpr::Null(pos.clone()),
        }),
        Expr::Name(name, pos) => {
            if let Some((vid, _)) = scopes.find_variable(scope, name) {
                Ok(TypedExpr::Var(vid, pos.clone()))
            } else {
                Err(ResolveError::UndefinedVariable {
                    pos: pos.clone(),
                    name: name.clone(),
                })
            }
        }
        Expr::Binary(op, lhs, rhs, pos) => Ok(TypedExpr::Binary(
            *op,
            Box::new(lower_expr(scopes, scope, lhs)?),
            Box::new(lower_expr(scopes, scope, rhs)?),
            pos.clone(),
        )),
        Expr::Unary(op, e, pos) => Ok(TypedExpr::Unary(
            *op,
            Box::new(lower_expr(scopes, scope, e)?),
            pos.clone(),
        )),
        Expr::Cast(ty, e, pos) => Ok(TypedExpr::Cast(
            resolve_type_expr(scopes, scope, ty, pos)?,
            Box::new(lower_expr(scopes, scope, e)?),
            pos.clone(),
        )),
        Expr::Call(callee, args, pos) => {
            let name = match &**callee {
                Expr::Name(name, _) => name.clone(),
                other => {
                    return Err(ResolveError::UndefinedFunction {
                        pos: other.pos().clone(),
                        name: "<non-name call target>".into(),
                    })
                }
            };
            let (id, _) =
                scopes
                    .find_function(&name)
                    .ok_or_else(|| ResolveError::UndefinedFunction {
                        pos: pos.clone(),
                        name: name.clone(),
                    })?;
            let args = args
                .iter()
                .map(|a| lower_expr(scopes, scope, a))
                .collect::<TResult<Vec<_>>>()?;
            Ok(TypedExpr::Call(id, args, pos.clone()))
        }
        Expr::Index(base, idx, pos) => Ok(TypedExpr::Index(
            Box::new(lower_expr(scopes, scope, base)?),
            Box::new(lower_expr(scopes, scope, idx)?),
            pos.clone(),
        )),
        Expr::Field(base, name, pos) => Ok(TypedExpr::Field(
            Box::new(lower_expr(scopes, scope, base)?),
            name.clone(),
            pos.clone(),
        )),
        Expr::ArrowField(base, name, pos) => {
            // `s->f` desugars to `(*s).f`: the transform inserts the deref
            // explicitly so typecheck only ever has to handle `Field`.
            let deref = TypedExpr::Unary(
                si_core::UnaryOp::Deref,
                Box::new(lower_expr(scopes, scope, base)?),
                pos.clone(),
            );
            Ok(TypedExpr::Field(Box::new(deref), name.clone(), pos.clone()))
        }
        Expr::SizeOfType(ty, pos) => Ok(TypedExpr::SizeOfType(
            resolve_type_expr(scopes, scope, ty, pos)?,
            pos.clone(),
        )),
        Expr::SizeOfExpr(e, pos) => Ok(TypedExpr::SizeOfExpr(
            Box::new(lower_expr(scopes, scope, e)?),
            pos.clone(),
        )),
        Expr::PostfixInc(e, pos) => Ok(TypedExpr::PostfixInc(
            Box::new(lower_expr(scopes, scope, e)?),
            pos.clone(),
        )),
        Expr::PostfixDec(e, pos) => Ok(TypedExpr::PostfixDec(
            Box::new(lower_expr(scopes, scope, e)?),
            pos.clone(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::lex;
    use crate::parser::Parser;

    fn transform(src: &str) -> TypedModule {
        let (_, toks) = lex("t.si", src).unwrap();
        let module = Parser::new(&toks).parse_module().unwrap();
        transform_module(&module).unwrap()
    }

    #[test]
    fn resolves_function_and_variable() {
        let tm = transform("i64 main() { i64 x = 1; return x; }");
        assert_eq!(tm.functions.len(), 1);
        let f = &tm.functions[0];
        assert_eq!(f.body.as_ref().unwrap().len(), 2);
    }

    #[test]
    fn undefined_variable_is_an_error() {
        let (_, toks) = lex("t.si", "i64 main() { return y; }").unwrap();
        let module = Parser::new(&toks).parse_module().unwrap();
        let err = transform_module(&module).unwrap_err();
        assert!(matches!(err, ResolveError::UndefinedVariable { .. }));
    }

    #[test]
    fn type_alias_self_reference_is_a_cycle() {
        let (_, toks) = lex("t.si", "type hello hello; i64 main() { return 0; }").unwrap();
        let module = Parser::new(&toks).parse_module().unwrap();
        let err = transform_module(&module).unwrap_err();
        assert!(matches!(err, ResolveError::AliasCycle { .. }));
    }

    #[test]
    fn redeclaration_in_same_block_is_an_error() {
        let (_, toks) =
            lex("t.si", "i64 main() { i64 x = 1; i64 x = 2; return 0; }").unwrap();
        let module = Parser::new(&toks).parse_module().unwrap();
        let err = transform_module(&module).unwrap_err();
        assert!(matches!(err, ResolveError::Redeclaration { .. }));
    }

    #[test]
    fn arrow_field_desugars_to_deref_then_field() {
        let tm = transform(
            "type struct { i64 data, } Node; i64 main() { Node *p; return p->data; }",
        );
        let f = &tm.functions[0];
        match &f.body.as_ref().unwrap()[1] {
            TypedStmt::Return(Some(TypedExpr::Field(base, name, _)), _) => {
                assert_eq!(name, "data");
                assert!(matches!(**base, TypedExpr::Unary(si_core::UnaryOp::Deref, _, _)));
            }
            _ => panic!("expected return of a field access"),
        }
    }

    #[test]
    fn forward_referencing_function_is_allowed() {
        // Functions are registered globally before any body is lowered, so
        // `main` can call `helper` even though `helper` appears later.
        let tm = transform("i64 main() { return helper(); } i64 helper() { return 1; }");
        assert_eq!(tm.functions.len(), 2);
    }
}
