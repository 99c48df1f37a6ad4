//! Recursive-descent parser with two-token lookahead.
//!
//! Composite operators (`++`, `--`, `->`, `==`, `!=`, `<=`, `>=`, `&&`, `||`,
//! `<<`, `>>`) arrive from the lexer as two adjacent `Punct` tokens; each
//! precedence-level function merges the pair it cares about itself rather
//! than relying on a separate re-lexing pass, keeping the lexer
//! context-free as spec.md §4.1 requires.
//!
//! Casts are disambiguated from a parenthesized expression by trying to
//! parse `"(" Type ")"` and then checking whether the following token can
//! start a primary expression; if not, the attempt backtracks and `(...)`
//! is reparsed as a grouped expression.

use si_core::{ArithOp, BitOp, CmpOp, LogicOp, Position, ShiftOp, UnaryOp};

use crate::ast::*;
use crate::error::ParseError;
use crate::lexer::{Token, TokenKind};

pub struct Parser<'a> {
    toks: &'a [Token],
    pos: usize,
}

type PResult<T> = Result<T, ParseError>;

impl<'a> Parser<'a> {
    pub fn new(toks: &'a [Token]) -> Self {
        Parser { toks, pos: 0 }
    }

    pub fn parse_module(mut self) -> PResult<Module> {
        let mut decls = Vec::new();
        while !self.at_eof() {
            decls.push(self.parse_decl()?);
        }
        Ok(Module { decls })
    }

    // -- token stream plumbing --------------------------------------------

    fn cur(&self) -> &Token {
        &self.toks[self.pos.min(self.toks.len() - 1)]
    }

    fn at(&self, offset: usize) -> Option<&Token> {
        self.toks.get(self.pos + offset)
    }

    fn at_eof(&self) -> bool {
        self.cur().kind == TokenKind::Eof
    }

    fn pos_here(&self) -> Position {
        self.cur().pos.clone()
    }

    fn bump(&mut self) -> Token {
        let t = self.cur().clone();
        if self.pos < self.toks.len() - 1 {
            self.pos += 1;
        }
        t
    }

    fn is_punct(&self, s: &str) -> bool {
        self.cur().kind == TokenKind::Punct && self.cur().value == s
    }

    fn is_punct_at(&self, offset: usize, s: &str) -> bool {
        self.at(offset)
            .is_some_and(|t| t.kind == TokenKind::Punct && t.value == s)
    }

    fn is_keyword(&self, s: &str) -> bool {
        self.cur().kind == TokenKind::Keyword && self.cur().value == s
    }

    fn expect_punct(&mut self, s: &str) -> PResult<Position> {
        if self.is_punct(s) {
            Ok(self.bump().pos)
        } else {
            Err(ParseError::UnexpectedToken {
                pos: self.pos_here(),
                found: self.cur().value.clone(),
                expected: format!("'{s}'"),
            })
        }
    }

    fn expect_keyword(&mut self, s: &str) -> PResult<Position> {
        if self.is_keyword(s) {
            Ok(self.bump().pos)
        } else {
            Err(ParseError::UnexpectedToken {
                pos: self.pos_here(),
                found: self.cur().value.clone(),
                expected: format!("'{s}'"),
            })
        }
    }

    fn expect_ident(&mut self) -> PResult<(String, Position)> {
        if self.cur().kind == TokenKind::Ident {
            let t = self.bump();
            Ok((t.value, t.pos))
        } else {
            Err(ParseError::UnexpectedToken {
                pos: self.pos_here(),
                found: self.cur().value.clone(),
                expected: "identifier".into(),
            })
        }
    }

    /// Two adjacent `Punct` tokens whose concatenated text is `op`.
    fn match_composite(&mut self, op: &str) -> bool {
        let (a, b) = op.split_at(1);
        if self.is_punct(a) && self.is_punct_at(1, b) {
            self.bump();
            self.bump();
            true
        } else {
            false
        }
    }

    fn peek_composite(&self, op: &str) -> bool {
        let (a, b) = op.split_at(1);
        self.is_punct(a) && self.is_punct_at(1, b)
    }

    // -- declarations -------------------------------------------------------

    fn parse_decl(&mut self) -> PResult<Decl> {
        if self.is_keyword("type") {
            return self.parse_type_def().map(Decl::TypeDef);
        }
        self.parse_function().map(Decl::Function)
    }

    fn parse_type_def(&mut self) -> PResult<TypeDefDecl> {
        let pos = self.expect_keyword("type")?;
        let target = self.parse_type()?;
        let (name, _) = self.expect_ident()?;
        self.expect_punct(";")?;
        Ok(TypeDefDecl { target, name, pos })
    }

    fn parse_function(&mut self) -> PResult<FunctionDecl> {
        let pos = self.pos_here();
        let return_ty = self.parse_type()?;
        let (name, _) = self.expect_ident()?;
        self.expect_punct("(")?;
        let (params, variadic) = self.parse_params()?;
        self.expect_punct(")")?;
        let body = if self.is_punct(";") {
            self.bump();
            None
        } else {
            Some(self.parse_block_stmts()?)
        };
        Ok(FunctionDecl {
            return_ty,
            name,
            params,
            variadic,
            body,
            pos,
        })
    }

    fn parse_params(&mut self) -> PResult<(Vec<Param>, bool)> {
        let mut params = Vec::new();
        let mut variadic = false;
        if self.is_punct(")") {
            return Ok((params, variadic));
        }
        loop {
            if self.is_punct(".") && self.is_punct_at(1, ".") && self.is_punct_at(2, ".") {
                self.bump();
                self.bump();
                self.bump();
                variadic = true;
                break;
            }
            let ty = self.parse_type()?;
            let (name, _) = self.expect_ident()?;
            let ty = self.parse_trailing_array_suffix(ty)?;
            params.push(Param { ty, name });
            if self.is_punct(",") {
                self.bump();
            } else {
                break;
            }
        }
        Ok((params, variadic))
    }

    // -- types ----------------------------------------------------------

    fn starts_type(&self) -> bool {
        self.cur().kind == TokenKind::BasicType
            || self.cur().kind == TokenKind::Ident
            || self.is_keyword("struct")
    }

    fn parse_type(&mut self) -> PResult<TypeExpr> {
        let mut base = self.parse_base_type()?;
        loop {
            if self.is_punct("*") {
                self.bump();
                base = TypeExpr::Pointer(Box::new(base));
            } else if self.is_punct("[") {
                self.bump();
                let n = self.expect_number()?;
                self.expect_punct("]")?;
                base = TypeExpr::Array(n, Box::new(base));
            } else {
                break;
            }
        }
        Ok(base)
    }

    /// C-style array declarators attach `[N]` after the identifier rather
    /// than the type (`i64 a[10];`, not `i64[10] a;`); wrap `base` in as
    /// many `Array` layers as bracket pairs follow the name, outermost last
    /// so `a[2][3]` reads as "array of 2 arrays of 3".
    fn parse_trailing_array_suffix(&mut self, base: TypeExpr) -> PResult<TypeExpr> {
        let mut dims = Vec::new();
        while self.is_punct("[") {
            self.bump();
            dims.push(self.expect_number()?);
            self.expect_punct("]")?;
        }
        let mut ty = base;
        for n in dims.into_iter().rev() {
            ty = TypeExpr::Array(n, Box::new(ty));
        }
        Ok(ty)
    }

    fn expect_number(&mut self) -> PResult<u64> {
        if self.cur().kind == TokenKind::Number {
            let t = self.bump();
            t.value
                .parse::<u64>()
                .map_err(|_| ParseError::InvalidNumber {
                    pos: t.pos.clone(),
                    text: t.value,
                })
        } else {
            Err(ParseError::UnexpectedToken {
                pos: self.pos_here(),
                found: self.cur().value.clone(),
                expected: "array length".into(),
            })
        }
    }

    fn parse_base_type(&mut self) -> PResult<TypeExpr> {
        if self.cur().kind == TokenKind::BasicType {
            let t = self.bump();
            Ok(TypeExpr::Basic(basic_type_from_name(&t.value)))
        } else if self.is_keyword("struct") {
            self.bump();
            self.expect_punct("{")?;
            let mut fields = Vec::new();
            while !self.is_punct("}") {
                let fty = self.parse_type()?;
                let (fname, _) = self.expect_ident()?;
                fields.push((fname, fty));
                self.expect_punct(",")?;
            }
            self.expect_punct("}")?;
            Ok(TypeExpr::Struct(fields))
        } else if self.cur().kind == TokenKind::Ident {
            let (name, _) = self.expect_ident()?;
            Ok(TypeExpr::Named(name))
        } else {
            Err(ParseError::UnexpectedToken {
                pos: self.pos_here(),
                found: self.cur().value.clone(),
                expected: "type".into(),
            })
        }
    }

    // -- statements ----------------------------------------------------

    fn parse_block_stmts(&mut self) -> PResult<Vec<Stmt>> {
        self.expect_punct("{")?;
        let mut stmts = Vec::new();
        while !self.is_punct("}") {
            stmts.push(self.parse_stmt()?);
        }
        self.expect_punct("}")?;
        Ok(stmts)
    }

    fn parse_stmt(&mut self) -> PResult<Stmt> {
        let pos = self.pos_here();
        if self.is_punct("{") {
            return Ok(Stmt::Compound(self.parse_block_stmts()?));
        }
        if self.is_keyword("if") {
            return self.parse_if();
        }
        if self.is_keyword("while") {
            return self.parse_while();
        }
        if self.is_keyword("for") {
            return self.parse_for();
        }
        if self.is_keyword("return") {
            self.bump();
            if self.is_punct(";") {
                self.bump();
                return Ok(Stmt::Return(None, pos));
            }
            let e = self.parse_expr()?;
            self.expect_punct(";")?;
            return Ok(Stmt::Return(Some(e), pos));
        }
        if self.is_keyword("break") {
            self.bump();
            self.expect_punct(";")?;
            return Ok(Stmt::Break(pos));
        }
        if self.is_keyword("continue") {
            self.bump();
            self.expect_punct(";")?;
            return Ok(Stmt::Continue(pos));
        }
        // Declaration vs. assignment/expression: a declaration starts with a
        // type (BasicType, `struct`, or an Ident that is followed by another
        // Ident -- `Foo x` -- as opposed to `x = ...` or `x;`).
        if self.looks_like_decl() {
            return self.parse_decl_stmt();
        }
        let e = self.parse_expr()?;
        if self.is_punct("=") {
            self.bump();
            let rhs = self.parse_expr()?;
            self.expect_punct(";")?;
            return Ok(Stmt::Assign { lhs: e, rhs, pos });
        }
        self.expect_punct(";")?;
        Ok(Stmt::Expr(e))
    }

    fn looks_like_decl(&self) -> bool {
        if self.cur().kind == TokenKind::BasicType || self.is_keyword("struct") {
            return true;
        }
        if self.cur().kind == TokenKind::Ident {
            // `Name x` (possibly `Name* x`, `Name[n] x`) declares `x` of
            // type `Name`; `Name = ...` / `Name(...)`  / `Name;` do not.
            let mut i = 1;
            while self.is_punct_at(i, "*") {
                i += 1;
            }
            while self.is_punct_at(i, "[") {
                i += 1;
                while !self.is_punct_at(i, "]") {
                    i += 1;
                }
                i += 1;
            }
            return self.at(i).is_some_and(|t| t.kind == TokenKind::Ident);
        }
        false
    }

    fn parse_decl_stmt(&mut self) -> PResult<Stmt> {
        let pos = self.pos_here();
        let ty = self.parse_type()?;
        let (name, _) = self.expect_ident()?;
        let ty = self.parse_trailing_array_suffix(ty)?;
        let init = if self.is_punct("=") {
            self.bump();
            Some(self.parse_expr()?)
        } else {
            None
        };
        self.expect_punct(";")?;
        Ok(Stmt::Decl {
            ty,
            name,
            init,
            pos,
        })
    }

    fn parse_if(&mut self) -> PResult<Stmt> {
        let pos = self.expect_keyword("if")?;
        self.expect_punct("(")?;
        let cond = self.parse_expr()?;
        self.expect_punct(")")?;
        let then_branch = Box::new(self.parse_stmt()?);
        let else_branch = if self.is_keyword("else") {
            self.bump();
            Some(Box::new(self.parse_stmt()?))
        } else {
            None
        };
        Ok(Stmt::If {
            cond,
            then_branch,
            else_branch,
            pos,
        })
    }

    fn parse_while(&mut self) -> PResult<Stmt> {
        let pos = self.expect_keyword("while")?;
        self.expect_punct("(")?;
        let cond = self.parse_expr()?;
        self.expect_punct(")")?;
        let body = Box::new(self.parse_stmt()?);
        Ok(Stmt::While { cond, body, pos })
    }

    fn parse_for(&mut self) -> PResult<Stmt> {
        let pos = self.expect_keyword("for")?;
        self.expect_punct("(")?;
        let init = if self.is_punct(";") {
            None
        } else {
            Some(Box::new(self.parse_for_clause_stmt()?))
        };
        self.expect_punct(";")?;
        let cond = if self.is_punct(";") {
            None
        } else {
            Some(self.parse_expr()?)
        };
        self.expect_punct(";")?;
        let post = if self.is_punct(";") {
            None
        } else {
            Some(Box::new(self.parse_for_clause_stmt()?))
        };
        // Deliberate quirk (spec.md §9): the post-clause is followed by a
        // trailing semicolon inside the header too.
        self.expect_punct(";")?;
        self.expect_punct(")")?;
        let body = Box::new(self.parse_stmt()?);
        Ok(Stmt::For {
            init,
            cond,
            post,
            body,
            pos,
        })
    }

    /// A single init/post clause inside a `for` header: a declaration or an
    /// assignment/expression, without the statement's own terminating `;`
    /// (the `for` grammar supplies that separately).
    fn parse_for_clause_stmt(&mut self) -> PResult<Stmt> {
        let pos = self.pos_here();
        if self.looks_like_decl() {
            let ty = self.parse_type()?;
            let (name, _) = self.expect_ident()?;
            let init = if self.is_punct("=") {
                self.bump();
                Some(self.parse_expr()?)
            } else {
                None
            };
            return Ok(Stmt::Decl {
                ty,
                name,
                init,
                pos,
            });
        }
        let e = self.parse_expr()?;
        if self.is_punct("=") {
            self.bump();
            let rhs = self.parse_expr()?;
            return Ok(Stmt::Assign { lhs: e, rhs, pos });
        }
        Ok(Stmt::Expr(e))
    }

    // -- expressions: precedence ladder, low to high --------------------

    fn parse_expr(&mut self) -> PResult<Expr> {
        self.parse_logical_or()
    }

    fn parse_logical_or(&mut self) -> PResult<Expr> {
        let mut lhs = self.parse_logical_and()?;
        while self.peek_composite("||") {
            let pos = self.pos_here();
            self.match_composite("||");
            let rhs = self.parse_logical_and()?;
            lhs = Expr::Binary(BinOp::Logic(LogicOp::Or), Box::new(lhs), Box::new(rhs), pos);
        }
        Ok(lhs)
    }

    fn parse_logical_and(&mut self) -> PResult<Expr> {
        let mut lhs = self.parse_bit_or()?;
        while self.peek_composite("&&") {
            let pos = self.pos_here();
            self.match_composite("&&");
            let rhs = self.parse_bit_or()?;
            lhs = Expr::Binary(BinOp::Logic(LogicOp::And), Box::new(lhs), Box::new(rhs), pos);
        }
        Ok(lhs)
    }

    fn parse_bit_or(&mut self) -> PResult<Expr> {
        let mut lhs = self.parse_bit_xor()?;
        while self.is_punct("|") && !self.is_punct_at(1, "|") {
            let pos = self.bump().pos;
            let rhs = self.parse_bit_xor()?;
            lhs = Expr::Binary(BinOp::Bit(BitOp::Or), Box::new(lhs), Box::new(rhs), pos);
        }
        Ok(lhs)
    }

    fn parse_bit_xor(&mut self) -> PResult<Expr> {
        let mut lhs = self.parse_bit_and()?;
        while self.is_punct("^") {
            let pos = self.bump().pos;
            let rhs = self.parse_bit_and()?;
            lhs = Expr::Binary(BinOp::Bit(BitOp::Xor), Box::new(lhs), Box::new(rhs), pos);
        }
        Ok(lhs)
    }

    fn parse_bit_and(&mut self) -> PResult<Expr> {
        let mut lhs = self.parse_equality()?;
        while self.is_punct("&") && !self.is_punct_at(1, "&") {
            let pos = self.bump().pos;
            let rhs = self.parse_equality()?;
            lhs = Expr::Binary(BinOp::Bit(BitOp::And), Box::new(lhs), Box::new(rhs), pos);
        }
        Ok(lhs)
    }

    fn parse_equality(&mut self) -> PResult<Expr> {
        let mut lhs = self.parse_comparison()?;
        loop {
            let op = if self.peek_composite("==") {
                Some(CmpOp::Eq)
            } else if self.peek_composite("!=") {
                Some(CmpOp::Ne)
            } else {
                None
            };
            let Some(op) = op else { break };
            let pos = self.pos_here();
            self.bump();
            self.bump();
            let rhs = self.parse_comparison()?;
            lhs = Expr::Binary(BinOp::Cmp(op), Box::new(lhs), Box::new(rhs), pos);
        }
        Ok(lhs)
    }

    fn parse_comparison(&mut self) -> PResult<Expr> {
        let mut lhs = self.parse_shift()?;
        loop {
            let op = if self.peek_composite("<=") {
                Some((CmpOp::Le, 2))
            } else if self.peek_composite(">=") {
                Some((CmpOp::Ge, 2))
            } else if self.is_punct("<") && !self.is_punct_at(1, "<") {
                Some((CmpOp::Lt, 1))
            } else if self.is_punct(">") && !self.is_punct_at(1, ">") {
                Some((CmpOp::Gt, 1))
            } else {
                None
            };
            let Some((op, n)) = op else { break };
            let pos = self.pos_here();
            for _ in 0..n {
                self.bump();
            }
            let rhs = self.parse_shift()?;
            lhs = Expr::Binary(BinOp::Cmp(op), Box::new(lhs), Box::new(rhs), pos);
        }
        Ok(lhs)
    }

    fn parse_shift(&mut self) -> PResult<Expr> {
        let mut lhs = self.parse_additive()?;
        loop {
            let op = if self.peek_composite("<<") {
                Some(ShiftOp::Shl)
            } else if self.peek_composite(">>") {
                Some(ShiftOp::Shr)
            } else {
                None
            };
            let Some(op) = op else { break };
            let pos = self.pos_here();
            self.bump();
            self.bump();
            let rhs = self.parse_additive()?;
            lhs = Expr::Binary(BinOp::Shift(op), Box::new(lhs), Box::new(rhs), pos);
        }
        Ok(lhs)
    }

    fn parse_additive(&mut self) -> PResult<Expr> {
        let mut lhs = self.parse_multiplicative()?;
        loop {
            let op = if self.is_punct("+") && !self.is_punct_at(1, "+") {
                Some(ArithOp::Add)
            } else if self.is_punct("-") && !self.is_punct_at(1, "-") && !self.is_punct_at(1, ">") {
                Some(ArithOp::Sub)
            } else {
                None
            };
            let Some(op) = op else { break };
            let pos = self.bump().pos;
            let rhs = self.parse_multiplicative()?;
            lhs = Expr::Binary(BinOp::Arith(op), Box::new(lhs), Box::new(rhs), pos);
        }
        Ok(lhs)
    }

    fn parse_multiplicative(&mut self) -> PResult<Expr> {
        let mut lhs = self.parse_cast()?;
        loop {
            let op = if self.is_punct("*") {
                Some(ArithOp::Mul)
            } else if self.is_punct("/") {
                Some(ArithOp::Div)
            } else if self.is_punct("%") {
                Some(ArithOp::Rem)
            } else {
                None
            };
            let Some(op) = op else { break };
            let pos = self.bump().pos;
            let rhs = self.parse_cast()?;
            lhs = Expr::Binary(BinOp::Arith(op), Box::new(lhs), Box::new(rhs), pos);
        }
        Ok(lhs)
    }

    fn parse_cast(&mut self) -> PResult<Expr> {
        if self.is_punct("(") {
            let save = self.pos;
            let pos = self.pos_here();
            self.bump();
            if self.starts_type() {
                if let Ok(ty) = self.parse_type() {
                    if self.is_punct(")") {
                        self.bump();
                        if self.can_start_primary() {
                            let operand = self.parse_cast()?;
                            return Ok(Expr::Cast(ty, Box::new(operand), pos));
                        }
                    }
                }
            }
            self.pos = save;
        }
        self.parse_prefix()
    }

    fn can_start_primary(&self) -> bool {
        match self.cur().kind {
            TokenKind::Ident
            | TokenKind::Number
            | TokenKind::Char
            | TokenKind::StringStart
            | TokenKind::Null => true,
            TokenKind::Keyword => matches!(self.cur().value.as_str(), "true" | "false" | "sizeof"),
            TokenKind::Punct => matches!(self.cur().value.as_str(), "(" | "!" | "~" | "+" | "-" | "*" | "&"),
            _ => false,
        }
    }

    fn parse_prefix(&mut self) -> PResult<Expr> {
        if self.match_composite("++") {
            let pos = self.pos_here();
            let e = self.parse_prefix()?;
            return Ok(Expr::Unary(UnaryOp::PreInc, Box::new(e), pos));
        }
        if self.match_composite("--") {
            let pos = self.pos_here();
            let e = self.parse_prefix()?;
            return Ok(Expr::Unary(UnaryOp::PreDec, Box::new(e), pos));
        }
        if self.is_punct("+") {
            self.bump();
            return self.parse_prefix();
        }
        if self.is_punct("-") {
            let pos = self.bump().pos;
            let e = self.parse_prefix()?;
            return Ok(Expr::Unary(UnaryOp::Neg, Box::new(e), pos));
        }
        if self.is_punct("!") {
            let pos = self.bump().pos;
            let e = self.parse_prefix()?;
            return Ok(Expr::Unary(UnaryOp::Not, Box::new(e), pos));
        }
        if self.is_punct("~") {
            let pos = self.bump().pos;
            let e = self.parse_prefix()?;
            return Ok(Expr::Unary(UnaryOp::BitNot, Box::new(e), pos));
        }
        if self.is_punct("*") {
            let pos = self.bump().pos;
            let e = self.parse_prefix()?;
            return Ok(Expr::Unary(UnaryOp::Deref, Box::new(e), pos));
        }
        if self.is_punct("&") {
            let pos = self.bump().pos;
            let e = self.parse_prefix()?;
            return Ok(Expr::Unary(UnaryOp::AddrOf, Box::new(e), pos));
        }
        if self.is_keyword("sizeof") {
            let pos = self.bump().pos;
            self.expect_punct("(")?;
            if self.starts_type() {
                let save = self.pos;
                if let Ok(ty) = self.parse_type() {
                    if self.is_punct(")") {
                        self.bump();
                        return Ok(Expr::SizeOfType(ty, pos));
                    }
                }
                self.pos = save;
            }
            let e = self.parse_expr()?;
            self.expect_punct(")")?;
            return Ok(Expr::SizeOfExpr(Box::new(e), pos));
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> PResult<Expr> {
        let mut e = self.parse_primary()?;
        loop {
            if self.match_composite("++") {
                e = Expr::PostfixInc(Box::new(e), self.pos_here());
            } else if self.match_composite("--") {
                e = Expr::PostfixDec(Box::new(e), self.pos_here());
            } else if self.is_punct("[") {
                let pos = self.bump().pos;
                let idx = self.parse_expr()?;
                self.expect_punct("]")?;
                e = Expr::Index(Box::new(e), Box::new(idx), pos);
            } else if self.is_punct(".") {
                let pos = self.bump().pos;
                let (name, _) = self.expect_ident()?;
                e = Expr::Field(Box::new(e), name, pos);
            } else if self.match_composite("->") {
                let pos = self.pos_here();
                let (name, _) = self.expect_ident()?;
                e = Expr::ArrowField(Box::new(e), name, pos);
            } else if self.is_punct("(") {
                let pos = self.bump().pos;
                let mut args = Vec::new();
                if !self.is_punct(")") {
                    loop {
                        args.push(self.parse_expr()?);
                        if self.is_punct(",") {
                            self.bump();
                        } else {
                            break;
                        }
                    }
                }
                self.expect_punct(")")?;
                e = Expr::Call(Box::new(e), args, pos);
            } else {
                break;
            }
        }
        Ok(e)
    }

    fn parse_primary(&mut self) -> PResult<Expr> {
        let pos = self.pos_here();
        match self.cur().kind {
            TokenKind::Number => {
                let t = self.bump();
                if t.value.contains('.') {
                    let v: f64 = t.value.parse().map_err(|_| ParseError::InvalidNumber {
                        pos: t.pos.clone(),
                        text: t.value.clone(),
                    })?;
                    Ok(Expr::Literal(Literal::Float(v), pos))
                } else {
                    let v: i64 = t.value.parse().map_err(|_| ParseError::InvalidNumber {
                        pos: t.pos.clone(),
                        text: t.value.clone(),
                    })?;
                    Ok(Expr::Literal(Literal::Int(v), pos))
                }
            }
            TokenKind::Char => {
                let t = self.bump();
                let inner = &t.value[1..t.value.len() - 1];
                let byte = decode_char_literal(inner);
                Ok(Expr::Literal(Literal::Char(byte), pos))
            }
            TokenKind::Null => {
                self.bump();
                Ok(Expr::Literal(Literal::Null, pos))
            }
            TokenKind::Keyword if self.cur().value == "true" => {
                self.bump();
                Ok(Expr::Literal(Literal::Bool(true), pos))
            }
            TokenKind::Keyword if self.cur().value == "false" => {
                self.bump();
                Ok(Expr::Literal(Literal::Bool(false), pos))
            }
            TokenKind::StringStart => self.parse_string_literal(pos),
            TokenKind::Ident => {
                let (name, p) = self.expect_ident()?;
                Ok(Expr::Name(name, p))
            }
            TokenKind::Punct if self.cur().value == "(" => {
                self.bump();
                let e = self.parse_expr()?;
                self.expect_punct(")")?;
                Ok(e)
            }
            _ => Err(ParseError::UnexpectedToken {
                pos,
                found: self.cur().value.clone(),
                expected: "expression".into(),
            }),
        }
    }

    fn parse_string_literal(&mut self, pos: Position) -> PResult<Expr> {
        self.bump(); // StringStart
        let mut bytes = Vec::new();
        loop {
            match self.cur().kind {
                TokenKind::Chars => {
                    bytes.extend_from_slice(self.bump().value.as_bytes());
                }
                TokenKind::Escaped => {
                    let raw = self.bump().value;
                    decode_escape(&raw, &mut bytes);
                }
                TokenKind::StringEnd => {
                    self.bump();
                    break;
                }
                _ => {
                    return Err(ParseError::UnexpectedEof {
                        pos: self.pos_here(),
                        expected: "string contents".into(),
                    })
                }
            }
        }
        Ok(Expr::Literal(Literal::Str(bytes), pos))
    }
}

fn basic_type_from_name(name: &str) -> si_core::BasicType {
    use si_core::BasicType::*;
    match name {
        "void" => Void,
        "bool" => Bool,
        "i8" => I8,
        "i16" => I16,
        "i32" => I32,
        "i64" => I64,
        "f32" => F32,
        "f64" => F64,
        _ => unreachable!("lexer only emits BasicType for this fixed set"),
    }
}

/// Decodes a `\X` escape (as produced by the `Escaped` token) onto `out`.
/// Recognizes `\n \r \t \" \\ \0`; anything else is kept literally as the
/// two source characters, per spec.md §4.3.
fn decode_escape(raw: &str, out: &mut Vec<u8>) {
    let c = raw.as_bytes().get(1).copied().unwrap_or(b'\\');
    match c {
        b'n' => out.push(b'\n'),
        b'r' => out.push(b'\r'),
        b't' => out.push(b'\t'),
        b'"' => out.push(b'"'),
        b'\\' => out.push(b'\\'),
        b'0' => out.push(0),
        _ => {
            out.push(b'\\');
            out.push(c);
        }
    }
}

fn decode_char_literal(inner: &str) -> u8 {
    if let Some(stripped) = inner.strip_prefix('\\') {
        let mut buf = Vec::new();
        decode_escape(&format!("\\{stripped}"), &mut buf);
        buf.first().copied().unwrap_or(0)
    } else {
        inner.as_bytes().first().copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::lex;

    fn parse(src: &str) -> Module {
        let (_, toks) = lex("t.si", src).unwrap();
        Parser::new(&toks).parse_module().unwrap()
    }

    #[test]
    fn parses_external_declaration_with_variadic() {
        let m = parse("i64 printf(i8 *fmt, ...);");
        assert_eq!(m.decls.len(), 1);
        match &m.decls[0] {
            Decl::Function(f) => {
                assert_eq!(f.name, "printf");
                assert!(f.variadic);
                assert!(f.body.is_none());
                assert_eq!(f.params.len(), 1);
            }
            _ => panic!("expected function"),
        }
    }

    #[test]
    fn parses_type_alias_and_struct_def() {
        let m = parse("type i64 hello; type struct { i64 data, hello* next, } Node;");
        assert_eq!(m.decls.len(), 2);
        assert!(matches!(&m.decls[0], Decl::TypeDef(t) if t.name == "hello"));
        match &m.decls[1] {
            Decl::TypeDef(t) => {
                assert_eq!(t.name, "Node");
                match &t.target {
                    TypeExpr::Struct(fields) => assert_eq!(fields.len(), 2),
                    _ => panic!("expected struct"),
                }
            }
            _ => panic!("expected typedef"),
        }
    }

    #[test]
    fn parses_main_with_if_and_return() {
        let m = parse("i64 main() { if (1 < 2) return 1; else return 0; }");
        match &m.decls[0] {
            Decl::Function(f) => {
                assert_eq!(f.body.as_ref().unwrap().len(), 1);
                assert!(matches!(f.body.as_ref().unwrap()[0], Stmt::If { .. }));
            }
            _ => panic!(),
        }
    }

    #[test]
    fn parses_for_loop_with_trailing_post_semicolon() {
        let m = parse("i64 main() { for (i64 x = 0; x < 10; x++;) { } return 0; }");
        match &m.decls[0] {
            Decl::Function(f) => {
                assert!(matches!(f.body.as_ref().unwrap()[0], Stmt::For { .. }));
            }
            _ => panic!(),
        }
    }

    #[test]
    fn parses_cast_expression() {
        let m = parse("i64 main() { hello a = (hello)10; return 0; }");
        match &m.decls[0] {
            Decl::Function(f) => match &f.body.as_ref().unwrap()[0] {
                Stmt::Decl { init: Some(e), .. } => {
                    assert!(matches!(e, Expr::Cast(TypeExpr::Named(n), _, _) if n == "hello"));
                }
                _ => panic!("expected decl with init"),
            },
            _ => panic!(),
        }
    }

    #[test]
    fn parses_pointer_and_array_suffixes() {
        let m = parse("i64 main() { i64 *p; i64 a[10]; return 0; }");
        match &m.decls[0] {
            Decl::Function(f) => {
                let body = f.body.as_ref().unwrap();
                assert!(matches!(body[0], Stmt::Decl { ty: TypeExpr::Pointer(_), .. }));
                assert!(matches!(body[1], Stmt::Decl { ty: TypeExpr::Array(10, _), .. }));
            }
            _ => panic!(),
        }
    }

    #[test]
    fn parses_postfix_chain_call_index_field() {
        let m = parse("i64 main() { a.b[0](1, 2); return 0; }");
        match &m.decls[0] {
            Decl::Function(f) => {
                assert!(matches!(f.body.as_ref().unwrap()[0], Stmt::Expr(Expr::Call(..))));
            }
            _ => panic!(),
        }
    }
}
