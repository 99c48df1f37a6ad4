//! Lowers a type-checked [`TypedModule`] to textual LLVM IR.
//!
//! Every local variable gets its own `alloca` at the point of declaration
//! (including function parameters, copied in at entry); reads go through a
//! `load`, writes through a `store`. This is deliberately the same shape
//! `clang -O0` itself produces -- no SSA/phi construction here, since turning
//! that into registers is `mem2reg`'s job and optimization passes are out of
//! scope. `break`/`continue` resolve against an explicit stack of
//! (continue-label, break-label) pairs pushed per loop, rather than indexing
//! into a flat block list, so nested loops can't desynchronize.

use std::fmt::Write as _;

use si_core::{ArithOp, BasicType, BitOp, CmpOp, LogicOp, ScopeArena, ShiftOp, Type, UnaryOp};
use si_parse::ast::BinOp;
use si_parse::typecheck::type_of;
use si_parse::{TypedExpr, TypedFunction, TypedModule, TypedStmt};

use crate::error::CodegenError;
use crate::types::{is_aggregate, llvm_type, struct_type_decls};

/// The result of lowering one expression: its runtime operand text, its
/// static type, and -- when the expression is addressable -- the register
/// holding its address, for assignment, `&`, and aggregate copies to use.
#[derive(Debug, Clone)]
struct Value {
    ir: String,
    ty: Type,
    storage: Option<String>,
}

struct LoopLabels {
    continue_label: String,
    break_label: String,
}

pub fn emit_module(tm: &TypedModule) -> Result<String, CodegenError> {
    let mut out = String::new();
    let mut strings: Vec<(String, Vec<u8>)> = Vec::new();
    let mut memcpy_declared = false;
    let mut body = String::new();

    for decl in struct_type_decls(&tm.scopes) {
        writeln!(out, "{decl}").unwrap();
    }

    for f in &tm.functions {
        let func = tm.scopes.function(f.id);
        if func.only_declare {
            continue;
        }
        let text = emit_function(tm, f, &mut strings, &mut memcpy_declared)?;
        writeln!(body, "{text}").unwrap();
    }

    for f in &tm.functions {
        let func = tm.scopes.function(f.id);
        if func.only_declare {
            writeln!(out, "{}", declare_signature(func, &tm.scopes)).unwrap();
        }
    }
    if memcpy_declared {
        writeln!(
            out,
            "declare void @llvm.memcpy.p0i8.p0i8.i64(i8*, i8*, i64, i1)"
        )
        .unwrap();
    }
    for (name, bytes) in &strings {
        writeln!(out, "{}", string_global(name, bytes)).unwrap();
    }
    out.push('\n');
    out.push_str(&body);
    Ok(out)
}

fn declare_signature(func: &si_core::Function, scopes: &ScopeArena) -> String {
    let ret = llvm_type(&func.return_type, scopes);
    let mut params: Vec<String> = func
        .params
        .iter()
        .map(|(_, t)| llvm_type(t, scopes))
        .collect();
    if func.variadic {
        params.push("...".to_string());
    }
    format!("declare {} @{}({})", ret, func.name, params.join(", "))
}

fn string_global(name: &str, bytes: &[u8]) -> String {
    let escaped: String = bytes
        .iter()
        .chain(std::iter::once(&0u8))
        .map(|b| format!("\\{b:02X}"))
        .collect();
    format!(
        "@{} = private unnamed_addr constant [{} x i8] c\"{}\"",
        name,
        bytes.len() + 1,
        escaped
    )
}

struct FuncEmitter<'a> {
    scopes: &'a ScopeArena,
    return_ty: Type,
    lines: Vec<String>,
    tmp: u32,
    blocks: u32,
    var_alloca: std::collections::HashMap<si_core::VarId, String>,
    loop_stack: Vec<LoopLabels>,
    terminated: bool,
    strings: &'a mut Vec<(String, Vec<u8>)>,
    memcpy_declared: &'a mut bool,
}

fn emit_function(
    tm: &TypedModule,
    f: &TypedFunction,
    strings: &mut Vec<(String, Vec<u8>)>,
    memcpy_declared: &mut bool,
) -> Result<String, CodegenError> {
    let func = tm.scopes.function(f.id);
    let mut fe = FuncEmitter {
        scopes: &tm.scopes,
        return_ty: func.return_type.clone(),
        lines: Vec::new(),
        tmp: 0,
        blocks: 0,
        var_alloca: std::collections::HashMap::new(),
        loop_stack: Vec::new(),
        terminated: false,
        strings,
        memcpy_declared,
    };

    fe.start_block("entry");
    for (var, (_, pty)) in f.params.iter().zip(func.params.iter()) {
        let llty = llvm_type(pty, fe.scopes);
        let ptr = fe.new_tmp();
        fe.emit(format!("{ptr} = alloca {llty}"));
        fe.emit(format!("store {llty} %arg.{var}, {llty}* {ptr}"));
        fe.var_alloca.insert(*var, ptr);
    }

    for s in f.body.as_ref().expect("only_declare functions are filtered out") {
        fe.emit_stmt(s)?;
    }
    if !fe.terminated {
        if func.return_type.is_void() {
            fe.emit("ret void".to_string());
        } else {
            return Err(CodegenError::IRInvariant(format!(
                "function {} fell off the end without a terminator",
                func.name
            )));
        }
    }

    let ret_llty = llvm_type(&func.return_type, fe.scopes);
    let params: Vec<String> = f
        .params
        .iter()
        .zip(func.params.iter())
        .map(|(var, (_, pty))| format!("{} %arg.{}", llvm_type(pty, fe.scopes), var))
        .collect();
    let mut out = String::new();
    writeln!(out, "define {} @{}({}) {{", ret_llty, func.name, params.join(", ")).unwrap();
    for line in &fe.lines {
        writeln!(out, "{line}").unwrap();
    }
    write!(out, "}}").unwrap();
    Ok(out)
}

impl<'a> FuncEmitter<'a> {
    fn new_tmp(&mut self) -> String {
        self.tmp += 1;
        format!("%t{}", self.tmp)
    }

    fn new_label(&mut self, prefix: &str) -> String {
        self.blocks += 1;
        format!("{prefix}.{}", self.blocks)
    }

    fn emit(&mut self, line: String) {
        self.lines.push(format!("  {line}"));
    }

    fn start_block(&mut self, label: &str) {
        self.lines.push(format!("{label}:"));
        self.terminated = false;
    }

    fn br(&mut self, label: &str) {
        if !self.terminated {
            self.emit(format!("br label %{label}"));
            self.terminated = true;
        }
    }

    fn terminate_with(&mut self, line: String) {
        self.emit(line);
        self.terminated = true;
    }

    fn resolver(&self) -> impl Fn(si_core::TypeDefId) -> Type + '_ {
        self.scopes.resolver()
    }

    fn unwrap_owned(&self, ty: &Type) -> Type {
        let resolve = self.resolver();
        match ty {
            Type::Alias { def, .. } => {
                let target = resolve(*def);
                self.unwrap_owned(&target)
            }
            other => other.clone(),
        }
    }

    // -- coercion --------------------------------------------------------

    fn coerce_to(&mut self, v: &Value, target: &Type) -> Result<Value, CodegenError> {
        let from_llty = llvm_type(&v.ty, self.scopes);
        let to_llty = llvm_type(target, self.scopes);
        if from_llty == to_llty {
            return Ok(Value {
                ir: v.ir.clone(),
                ty: target.clone(),
                storage: v.storage.clone(),
            });
        }
        let from = self.unwrap_owned(&v.ty);
        let to = self.unwrap_owned(target);
        let t = self.new_tmp();
        let instr = match (&from, &to) {
            (Type::Basic(a), Type::Basic(b)) if a.is_int() && b.is_int() => {
                if a.int_rank() < b.int_rank() || matches!(a, BasicType::Bool) {
                    format!("{t} = zext {from_llty} {} to {to_llty}", v.ir)
                } else {
                    format!("{t} = trunc {from_llty} {} to {to_llty}", v.ir)
                }
            }
            (Type::Basic(a), Type::Basic(b)) if a.is_float() && b.is_float() => {
                if matches!(a, BasicType::F32) {
                    format!("{t} = fpext {from_llty} {} to {to_llty}", v.ir)
                } else {
                    format!("{t} = fptrunc {from_llty} {} to {to_llty}", v.ir)
                }
            }
            (Type::Basic(a), Type::Basic(b)) if a.is_int() && b.is_float() => {
                format!("{t} = sitofp {from_llty} {} to {to_llty}", v.ir)
            }
            (Type::Basic(a), Type::Basic(b)) if a.is_float() && b.is_int() => {
                format!("{t} = fptosi {from_llty} {} to {to_llty}", v.ir)
            }
            (Type::Basic(a), Type::Pointer(_)) if a.is_int() => {
                format!("{t} = inttoptr {from_llty} {} to {to_llty}", v.ir)
            }
            (Type::Pointer(_), Type::Basic(b)) if b.is_int() => {
                format!("{t} = ptrtoint {from_llty} {} to {to_llty}", v.ir)
            }
            (Type::Pointer(_), Type::Pointer(_)) => {
                format!("{t} = bitcast {from_llty} {} to {to_llty}", v.ir)
            }
            _ => {
                return Err(CodegenError::IRInvariant(format!(
                    "no coercion from {from_llty} to {to_llty}"
                )))
            }
        };
        self.emit(instr);
        Ok(Value {
            ir: t,
            ty: target.clone(),
            storage: None,
        })
    }

    fn type_of(&self, e: &TypedExpr) -> Result<Type, CodegenError> {
        Ok(type_of(self.scopes, e)?)
    }

    fn intern_string(&mut self, bytes: &[u8]) -> String {
        if let Some((name, _)) = self.strings.iter().find(|(_, b)| b == bytes) {
            return name.clone();
        }
        let name = format!(".str.{}", self.strings.len());
        self.strings.push((name.clone(), bytes.to_vec()));
        name
    }

    fn emit_memcpy(&mut self, dst: &str, dst_llty: &str, src: &str, src_llty: &str, size: u64) {
        *self.memcpy_declared = true;
        let d8 = self.new_tmp();
        self.emit(format!("{d8} = bitcast {dst_llty}* {dst} to i8*"));
        let s8 = self.new_tmp();
        self.emit(format!("{s8} = bitcast {src_llty}* {src} to i8*"));
        self.emit(format!(
            "call void @llvm.memcpy.p0i8.p0i8.i64(i8* {d8}, i8* {s8}, i64 {size}, i1 false)"
        ));
    }

    // -- expressions -------------------------------------------------------

    fn emit_expr(&mut self, e: &TypedExpr) -> Result<Value, CodegenError> {
        match e {
            TypedExpr::Int(v, _) => {
                let ty = self.type_of(e)?;
                Ok(Value { ir: v.to_string(), ty, storage: None })
            }
            TypedExpr::Float(v, _) => {
                let ty = self.type_of(e)?;
                let text = if v.fract() == 0.0 {
                    format!("{v:.1}")
                } else {
                    format!("{v}")
                };
                Ok(Value { ir: text, ty, storage: None })
            }
            TypedExpr::Char(b, _) => Ok(Value {
                ir: (*b as i64).to_string(),
                ty: Type::Basic(BasicType::I8),
                storage: None,
            }),
            TypedExpr::Bool(b, _) => Ok(Value {
                ir: if *b { "1".into() } else { "0".into() },
                ty: Type::Basic(BasicType::Bool),
                storage: None,
            }),
            TypedExpr::Str(bytes, _) => {
                let name = self.intern_string(bytes);
                let len = bytes.len() + 1;
                let t = self.new_tmp();
                self.emit(format!(
                    "{t} = getelementptr inbounds [{len} x i8], [{len} x i8]* @{name}, i64 0, i64 0"
                ));
                Ok(Value {
                    ir: t,
                    ty: Type::pointer(Type::Basic(BasicType::I8)),
                    storage: None,
                })
            }
            TypedExpr::Null(pos) => Err(CodegenError::IRInvariant(format!(
                "{pos}: NULL reached codegen without an enclosing cast"
            ))),
            TypedExpr::Var(id, _) => {
                let ptr = self
                    .var_alloca
                    .get(id)
                    .cloned()
                    .ok_or_else(|| CodegenError::IRInvariant("variable used before its alloca".into()))?;
                let ty = self.scopes.variable(*id).ty.clone();
                if is_aggregate(&ty, self.scopes) {
                    Ok(Value { ir: ptr.clone(), ty, storage: Some(ptr) })
                } else {
                    let llty = llvm_type(&ty, self.scopes);
                    let t = self.new_tmp();
                    self.emit(format!("{t} = load {llty}, {llty}* {ptr}"));
                    Ok(Value { ir: t, ty, storage: Some(ptr) })
                }
            }
            TypedExpr::Binary(BinOp::Logic(op), lhs, rhs, _) => self.emit_short_circuit(*op, lhs, rhs),
            TypedExpr::Binary(op, lhs, rhs, pos) => {
                let lv = self.emit_expr(lhs)?;
                let rv = self.emit_expr(rhs)?;
                let result_ty = self.type_of(e)?;
                match op {
                    BinOp::Arith(a) => self.emit_arith(*a, &lv, &rv, &result_ty, pos),
                    BinOp::Cmp(c) => self.emit_cmp(*c, &lv, &rv),
                    BinOp::Bit(b) => self.emit_bit(*b, &lv, &rv, &result_ty),
                    BinOp::Shift(s) => self.emit_shift(*s, &lv, &rv, &result_ty),
                    BinOp::Logic(_) => unreachable!("handled above"),
                }
            }
            TypedExpr::Unary(op, inner, pos) => self.emit_unary(*op, inner, pos),
            TypedExpr::Cast(ty, inner, _) => {
                if matches!(**inner, TypedExpr::Null(_)) {
                    return Ok(Value { ir: "null".into(), ty: ty.clone(), storage: None });
                }
                let v = self.emit_expr(inner)?;
                self.coerce_to(&v, ty)
            }
            TypedExpr::Call(fid, args, _) => {
                let func = self.scopes.function(*fid).clone();
                let mut arg_strs = Vec::new();
                for a in args {
                    let v = self.emit_expr(a)?;
                    arg_strs.push(format!("{} {}", llvm_type(&v.ty, self.scopes), v.ir));
                }
                let ret_llty = llvm_type(&func.return_type, self.scopes);
                if func.return_type.is_void() {
                    self.emit(format!("call void @{}({})", func.name, arg_strs.join(", ")));
                    Ok(Value { ir: String::new(), ty: func.return_type, storage: None })
                } else {
                    let t = self.new_tmp();
                    self.emit(format!(
                        "{t} = call {ret_llty} @{}({})",
                        func.name,
                        arg_strs.join(", ")
                    ));
                    Ok(Value { ir: t, ty: func.return_type, storage: None })
                }
            }
            TypedExpr::Index(base, idx, pos) => self.emit_index(base, idx, pos),
            TypedExpr::Field(base, name, pos) => self.emit_field(base, name, pos),
            TypedExpr::SizeOfType(ty, _) => {
                let size = ty.size_in_bytes(&self.resolver());
                Ok(Value { ir: size.to_string(), ty: Type::Basic(BasicType::I64), storage: None })
            }
            TypedExpr::SizeOfExpr(inner, _) => {
                let ty = type_of(self.scopes, inner)?;
                let size = ty.size_in_bytes(&self.resolver());
                Ok(Value { ir: size.to_string(), ty: Type::Basic(BasicType::I64), storage: None })
            }
            TypedExpr::PostfixInc(inner, pos) => self.emit_postfix(inner, pos, true),
            TypedExpr::PostfixDec(inner, pos) => self.emit_postfix(inner, pos, false),
        }
    }

    fn emit_short_circuit(
        &mut self,
        op: LogicOp,
        lhs: &TypedExpr,
        rhs: &TypedExpr,
    ) -> Result<Value, CodegenError> {
        let lv = self.emit_expr(lhs)?;
        let result = self.new_tmp();
        self.emit(format!("{result} = alloca i1"));
        self.emit(format!("store i1 {}, i1* {result}", lv.ir));
        let rhs_label = self.new_label("logic.rhs");
        let end_label = self.new_label("logic.end");
        match op {
            LogicOp::And => self.emit(format!(
                "br i1 {}, label %{rhs_label}, label %{end_label}",
                lv.ir
            )),
            LogicOp::Or => self.emit(format!(
                "br i1 {}, label %{end_label}, label %{rhs_label}",
                lv.ir
            )),
        }
        self.terminated = true;
        self.start_block(&rhs_label);
        let rv = self.emit_expr(rhs)?;
        self.emit(format!("store i1 {}, i1* {result}", rv.ir));
        self.br(&end_label);
        self.start_block(&end_label);
        let t = self.new_tmp();
        self.emit(format!("{t} = load i1, i1* {result}"));
        Ok(Value { ir: t, ty: Type::Basic(BasicType::Bool), storage: None })
    }

    fn emit_arith(
        &mut self,
        op: ArithOp,
        lv: &Value,
        rv: &Value,
        result_ty: &Type,
        pos: &si_core::Position,
    ) -> Result<Value, CodegenError> {
        if lv.ty.is_pointer() || rv.ty.is_pointer() {
            let (ptr_val, int_val, negate) = if lv.ty.is_pointer() {
                (lv, rv, matches!(op, ArithOp::Sub))
            } else {
                (rv, lv, false)
            };
            let inner = match self.unwrap_owned(&ptr_val.ty) {
                Type::Pointer(inner) => *inner,
                _ => {
                    return Err(CodegenError::IRInvariant(format!(
                        "{pos}: pointer arithmetic on a non-pointer operand"
                    )))
                }
            };
            let elem_llty = llvm_type(&inner, self.scopes);
            let ptr_llty = llvm_type(&ptr_val.ty, self.scopes);
            let idx = if negate {
                let t = self.new_tmp();
                self.emit(format!("{t} = sub i64 0, {}", int_val.ir));
                t
            } else {
                int_val.ir.clone()
            };
            let t = self.new_tmp();
            self.emit(format!(
                "{t} = getelementptr inbounds {elem_llty}, {ptr_llty} {}, i64 {idx}",
                ptr_val.ir
            ));
            return Ok(Value { ir: t, ty: result_ty.clone(), storage: None });
        }
        let l2 = self.coerce_to(lv, result_ty)?;
        let r2 = self.coerce_to(rv, result_ty)?;
        let llty = llvm_type(result_ty, self.scopes);
        let is_float = result_ty.is_float();
        let opname = match (op, is_float) {
            (ArithOp::Add, false) => "add",
            (ArithOp::Add, true) => "fadd",
            (ArithOp::Sub, false) => "sub",
            (ArithOp::Sub, true) => "fsub",
            (ArithOp::Mul, false) => "mul",
            (ArithOp::Mul, true) => "fmul",
            (ArithOp::Div, false) => "sdiv",
            (ArithOp::Div, true) => "fdiv",
            (ArithOp::Rem, false) => "srem",
            (ArithOp::Rem, true) => "frem",
        };
        let t = self.new_tmp();
        self.emit(format!("{t} = {opname} {llty} {}, {}", l2.ir, r2.ir));
        Ok(Value { ir: t, ty: result_ty.clone(), storage: None })
    }

    fn emit_cmp(&mut self, op: CmpOp, lv: &Value, rv: &Value) -> Result<Value, CodegenError> {
        let common = if lv.ty.is_pointer() || rv.ty.is_pointer() {
            if lv.ty.is_pointer() { lv.ty.clone() } else { rv.ty.clone() }
        } else {
            let a = self.unwrap_owned(&lv.ty);
            let b = self.unwrap_owned(&rv.ty);
            match (&a, &b) {
                (Type::Basic(x), Type::Basic(y)) if x.is_float() || y.is_float() => {
                    if x.size_in_bytes() >= y.size_in_bytes() { a } else { b }
                }
                (Type::Basic(x), Type::Basic(y)) => {
                    if x.int_rank() >= y.int_rank() { a } else { b }
                }
                _ => a,
            }
        };
        let l2 = self.coerce_to(lv, &common)?;
        let r2 = self.coerce_to(rv, &common)?;
        let llty = llvm_type(&common, self.scopes);
        let is_float = common.is_float();
        let pred = match (op, is_float) {
            (CmpOp::Eq, false) => "eq",
            (CmpOp::Eq, true) => "oeq",
            (CmpOp::Ne, false) => "ne",
            (CmpOp::Ne, true) => "one",
            (CmpOp::Lt, false) => "slt",
            (CmpOp::Lt, true) => "olt",
            (CmpOp::Le, false) => "sle",
            (CmpOp::Le, true) => "ole",
            (CmpOp::Gt, false) => "sgt",
            (CmpOp::Gt, true) => "ogt",
            (CmpOp::Ge, false) => "sge",
            (CmpOp::Ge, true) => "oge",
        };
        let kind = if is_float { "fcmp" } else { "icmp" };
        let t = self.new_tmp();
        self.emit(format!("{t} = {kind} {pred} {llty} {}, {}", l2.ir, r2.ir));
        Ok(Value { ir: t, ty: Type::Basic(BasicType::Bool), storage: None })
    }

    fn emit_bit(&mut self, op: BitOp, lv: &Value, rv: &Value, result_ty: &Type) -> Result<Value, CodegenError> {
        let l2 = self.coerce_to(lv, result_ty)?;
        let r2 = self.coerce_to(rv, result_ty)?;
        let llty = llvm_type(result_ty, self.scopes);
        let opname = match op {
            BitOp::And => "and",
            BitOp::Or => "or",
            BitOp::Xor => "xor",
        };
        let t = self.new_tmp();
        self.emit(format!("{t} = {opname} {llty} {}, {}", l2.ir, r2.ir));
        Ok(Value { ir: t, ty: result_ty.clone(), storage: None })
    }

    fn emit_shift(&mut self, op: ShiftOp, lv: &Value, rv: &Value, result_ty: &Type) -> Result<Value, CodegenError> {
        let l2 = self.coerce_to(lv, result_ty)?;
        let r2 = self.coerce_to(rv, result_ty)?;
        let llty = llvm_type(result_ty, self.scopes);
        let opname = match op {
            ShiftOp::Shl => "shl",
            ShiftOp::Shr => "ashr",
        };
        let t = self.new_tmp();
        self.emit(format!("{t} = {opname} {llty} {}, {}", l2.ir, r2.ir));
        Ok(Value { ir: t, ty: result_ty.clone(), storage: None })
    }

    fn emit_unary(&mut self, op: UnaryOp, inner: &TypedExpr, pos: &si_core::Position) -> Result<Value, CodegenError> {
        match op {
            UnaryOp::Neg => {
                let v = self.emit_expr(inner)?;
                let llty = llvm_type(&v.ty, self.scopes);
                let t = self.new_tmp();
                if v.ty.is_float() {
                    self.emit(format!("{t} = fneg {llty} {}", v.ir));
                } else {
                    self.emit(format!("{t} = sub {llty} 0, {}", v.ir));
                }
                Ok(Value { ir: t, ty: v.ty, storage: None })
            }
            UnaryOp::Not => {
                let v = self.emit_expr(inner)?;
                let t = self.new_tmp();
                self.emit(format!("{t} = xor i1 {}, 1", v.ir));
                Ok(Value { ir: t, ty: Type::Basic(BasicType::Bool), storage: None })
            }
            UnaryOp::BitNot => {
                let v = self.emit_expr(inner)?;
                let llty = llvm_type(&v.ty, self.scopes);
                let t = self.new_tmp();
                self.emit(format!("{t} = xor {llty} {}, -1", v.ir));
                Ok(Value { ir: t, ty: v.ty, storage: None })
            }
            UnaryOp::Deref => {
                let v = self.emit_expr(inner)?;
                let pointee = match self.unwrap_owned(&v.ty) {
                    Type::Pointer(inner) => *inner,
                    _ => return Err(CodegenError::IRInvariant(format!("{pos}: deref of non-pointer"))),
                };
                if is_aggregate(&pointee, self.scopes) {
                    Ok(Value { ir: v.ir.clone(), ty: pointee, storage: Some(v.ir) })
                } else {
                    let llty = llvm_type(&pointee, self.scopes);
                    let t = self.new_tmp();
                    self.emit(format!("{t} = load {llty}, {llty}* {}", v.ir));
                    Ok(Value { ir: t, ty: pointee, storage: Some(v.ir) })
                }
            }
            UnaryOp::AddrOf => {
                let v = self.emit_expr(inner)?;
                let ptr = v
                    .storage
                    .ok_or_else(|| CodegenError::IRInvariant(format!("{pos}: & of a non-lvalue")))?;
                Ok(Value { ir: ptr, ty: Type::pointer(v.ty), storage: None })
            }
            UnaryOp::PreInc | UnaryOp::PreDec => {
                let v = self.emit_expr(inner)?;
                let ptr = v
                    .storage
                    .clone()
                    .ok_or_else(|| CodegenError::IRInvariant(format!("{pos}: ++/-- of a non-lvalue")))?;
                let new_val = self.step(&v, matches!(op, UnaryOp::PreInc))?;
                let llty = llvm_type(&v.ty, self.scopes);
                self.emit(format!("store {llty} {}, {llty}* {ptr}", new_val.ir));
                Ok(Value { ir: new_val.ir, ty: v.ty, storage: Some(ptr) })
            }
            UnaryOp::PostInc | UnaryOp::PostDec => {
                unreachable!("postfix forms are TypedExpr::PostfixInc/Dec, not Unary")
            }
        }
    }

    fn step(&mut self, v: &Value, inc: bool) -> Result<Value, CodegenError> {
        let llty = llvm_type(&v.ty, self.scopes);
        let t = self.new_tmp();
        if v.ty.is_pointer() {
            let inner = match self.unwrap_owned(&v.ty) {
                Type::Pointer(inner) => *inner,
                _ => unreachable!(),
            };
            let elem_llty = llvm_type(&inner, self.scopes);
            let idx = if inc { "1" } else { "-1" };
            self.emit(format!(
                "{t} = getelementptr inbounds {elem_llty}, {llty} {}, i64 {idx}",
                v.ir
            ));
        } else if v.ty.is_float() {
            let op = if inc { "fadd" } else { "fsub" };
            self.emit(format!("{t} = {op} {llty} {}, 1.0", v.ir));
        } else {
            let op = if inc { "add" } else { "sub" };
            self.emit(format!("{t} = {op} {llty} {}, 1", v.ir));
        }
        Ok(Value { ir: t, ty: v.ty.clone(), storage: None })
    }

    fn emit_postfix(&mut self, inner: &TypedExpr, pos: &si_core::Position, inc: bool) -> Result<Value, CodegenError> {
        let v = self.emit_expr(inner)?;
        let ptr = v
            .storage
            .clone()
            .ok_or_else(|| CodegenError::IRInvariant(format!("{pos}: ++/-- of a non-lvalue")))?;
        let new_val = self.step(&v, inc)?;
        let llty = llvm_type(&v.ty, self.scopes);
        self.emit(format!("store {llty} {}, {llty}* {ptr}", new_val.ir));
        Ok(Value { ir: v.ir, ty: v.ty, storage: None })
    }

    fn emit_index(&mut self, base: &TypedExpr, idx: &TypedExpr, pos: &si_core::Position) -> Result<Value, CodegenError> {
        let base_v = self.emit_expr(base)?;
        let idx_v = self.emit_expr(idx)?;
        let idx_v = self.coerce_to(&idx_v, &Type::Basic(BasicType::I64))?;
        match self.unwrap_owned(&base_v.ty) {
            Type::Array { element, .. } => {
                let ptr = base_v
                    .storage
                    .ok_or_else(|| CodegenError::IRInvariant(format!("{pos}: indexed array has no storage")))?;
                let arr_llty = llvm_type(&base_v.ty, self.scopes);
                let t = self.new_tmp();
                self.emit(format!(
                    "{t} = getelementptr inbounds {arr_llty}, {arr_llty}* {ptr}, i64 0, i64 {}",
                    idx_v.ir
                ));
                self.load_or_keep(t, *element)
            }
            Type::Pointer(inner) => {
                let elem_llty = llvm_type(&inner, self.scopes);
                let ptr_llty = llvm_type(&base_v.ty, self.scopes);
                let t = self.new_tmp();
                self.emit(format!(
                    "{t} = getelementptr inbounds {elem_llty}, {ptr_llty} {}, i64 {}",
                    base_v.ir, idx_v.ir
                ));
                self.load_or_keep(t, *inner)
            }
            other => Err(CodegenError::IRInvariant(format!(
                "{pos}: cannot index into {}",
                other.display_name()
            ))),
        }
    }

    fn emit_field(&mut self, base: &TypedExpr, name: &str, pos: &si_core::Position) -> Result<Value, CodegenError> {
        let base_v = self.emit_expr(base)?;
        let ptr = base_v
            .storage
            .clone()
            .ok_or_else(|| CodegenError::IRInvariant(format!("{pos}: field access on a non-lvalue")))?;
        match self.unwrap_owned(&base_v.ty) {
            Type::Struct(fields) => {
                let index = fields
                    .get_index_of(name)
                    .ok_or_else(|| CodegenError::IRInvariant(format!("{pos}: no field {name}")))?;
                let field_ty = fields[index].clone();
                let struct_llty = llvm_type(&base_v.ty, self.scopes);
                let t = self.new_tmp();
                self.emit(format!(
                    "{t} = getelementptr inbounds {struct_llty}, {struct_llty}* {ptr}, i32 0, i32 {index}"
                ));
                self.load_or_keep(t, field_ty)
            }
            other => Err(CodegenError::IRInvariant(format!(
                "{pos}: {} is not a struct",
                other.display_name()
            ))),
        }
    }

    fn load_or_keep(&mut self, ptr: String, ty: Type) -> Result<Value, CodegenError> {
        if is_aggregate(&ty, self.scopes) {
            Ok(Value { ir: ptr.clone(), ty, storage: Some(ptr) })
        } else {
            let llty = llvm_type(&ty, self.scopes);
            let t = self.new_tmp();
            self.emit(format!("{t} = load {llty}, {llty}* {ptr}"));
            Ok(Value { ir: t, ty, storage: Some(ptr) })
        }
    }

    // -- statements --------------------------------------------------------

    fn emit_stmt(&mut self, stmt: &TypedStmt) -> Result<(), CodegenError> {
        match stmt {
            TypedStmt::Decl { var, init, .. } => {
                let ty = self.scopes.variable(*var).ty.clone();
                let llty = llvm_type(&ty, self.scopes);
                let ptr = self.new_tmp();
                self.emit(format!("{ptr} = alloca {llty}"));
                self.var_alloca.insert(*var, ptr.clone());
                if let Some(init) = init {
                    let v = self.emit_expr(init)?;
                    let coerced = self.coerce_to(&v, &ty)?;
                    self.store_into(&ptr, &llty, &coerced, &ty)?;
                }
                Ok(())
            }
            TypedStmt::Assign { lhs, rhs, pos } => {
                let lv = self.emit_expr(lhs)?;
                let ptr = lv
                    .storage
                    .clone()
                    .ok_or_else(|| CodegenError::IRInvariant(format!("{pos}: assignment target has no storage")))?;
                let rv = self.emit_expr(rhs)?;
                let coerced = self.coerce_to(&rv, &lv.ty)?;
                let llty = llvm_type(&lv.ty, self.scopes);
                self.store_into(&ptr, &llty, &coerced, &lv.ty)
            }
            TypedStmt::Expr(e) => {
                self.emit_expr(e)?;
                Ok(())
            }
            TypedStmt::Return(e, _) => {
                match e {
                    Some(e) => {
                        let v = self.emit_expr(e)?;
                        let rt = self.return_ty.clone();
                        let coerced = self.coerce_to(&v, &rt)?;
                        let llty = llvm_type(&rt, self.scopes);
                        self.terminate_with(format!("ret {llty} {}", coerced.ir));
                    }
                    None => self.terminate_with("ret void".to_string()),
                }
                Ok(())
            }
            TypedStmt::Compound(_, stmts) => {
                for s in stmts {
                    self.emit_stmt(s)?;
                }
                Ok(())
            }
            TypedStmt::If { cond, then_branch, else_branch, .. } => {
                let cv = self.emit_expr(cond)?;
                let then_l = self.new_label("if.then");
                let merge_l = self.new_label("if.end");
                let else_l = if else_branch.is_some() {
                    self.new_label("if.else")
                } else {
                    merge_l.clone()
                };
                self.terminate_with(format!("br i1 {}, label %{then_l}, label %{else_l}", cv.ir));
                self.start_block(&then_l);
                self.emit_stmt(then_branch)?;
                self.br(&merge_l);
                if let Some(eb) = else_branch {
                    self.start_block(&else_l);
                    self.emit_stmt(eb)?;
                    self.br(&merge_l);
                }
                self.start_block(&merge_l);
                Ok(())
            }
            TypedStmt::While { cond, body, .. } => {
                let cond_l = self.new_label("while.cond");
                let body_l = self.new_label("while.body");
                let end_l = self.new_label("while.end");
                self.br(&cond_l);
                self.start_block(&cond_l);
                let cv = self.emit_expr(cond)?;
                self.terminate_with(format!("br i1 {}, label %{body_l}, label %{end_l}", cv.ir));
                self.start_block(&body_l);
                self.loop_stack.push(LoopLabels { continue_label: cond_l.clone(), break_label: end_l.clone() });
                self.emit_stmt(body)?;
                self.loop_stack.pop();
                self.br(&cond_l);
                self.start_block(&end_l);
                Ok(())
            }
            TypedStmt::For { init, cond, post, body, .. } => {
                if let Some(i) = init {
                    self.emit_stmt(i)?;
                }
                let cond_l = self.new_label("for.cond");
                let body_l = self.new_label("for.body");
                let post_l = self.new_label("for.post");
                let end_l = self.new_label("for.end");
                self.br(&cond_l);
                self.start_block(&cond_l);
                if let Some(c) = cond {
                    let cv = self.emit_expr(c)?;
                    self.terminate_with(format!("br i1 {}, label %{body_l}, label %{end_l}", cv.ir));
                } else {
                    self.br(&body_l);
                }
                self.start_block(&body_l);
                self.loop_stack.push(LoopLabels { continue_label: post_l.clone(), break_label: end_l.clone() });
                self.emit_stmt(body)?;
                self.loop_stack.pop();
                self.br(&post_l);
                self.start_block(&post_l);
                if let Some(p) = post {
                    self.emit_stmt(p)?;
                }
                self.br(&cond_l);
                self.start_block(&end_l);
                Ok(())
            }
            TypedStmt::Break(pos) => {
                let label = self
                    .loop_stack
                    .last()
                    .ok_or_else(|| CodegenError::IRInvariant(format!("{pos}: break outside a loop")))?
                    .break_label
                    .clone();
                self.terminate_with(format!("br label %{label}"));
                Ok(())
            }
            TypedStmt::Continue(pos) => {
                let label = self
                    .loop_stack
                    .last()
                    .ok_or_else(|| CodegenError::IRInvariant(format!("{pos}: continue outside a loop")))?
                    .continue_label
                    .clone();
                self.terminate_with(format!("br label %{label}"));
                Ok(())
            }
        }
    }

    fn store_into(&mut self, ptr: &str, llty: &str, value: &Value, ty: &Type) -> Result<(), CodegenError> {
        if is_aggregate(ty, self.scopes) {
            let src = value
                .storage
                .clone()
                .unwrap_or_else(|| value.ir.clone());
            let size = ty.size_in_bytes(&self.resolver());
            self.emit_memcpy(ptr, llty, &src, llty, size);
        } else {
            self.emit(format!("store {llty} {}, {llty}* {ptr}", value.ir));
        }
        Ok(())
    }
}
