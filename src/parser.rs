use std::collections::HashSet;

use crate::{
    ast::{
        BinaryOp, Callee, EnumDecl, Expr, ExprKind, FunctionDecl, Param, Program, Stmt,
        StmtKind, StructDecl, UnaryOp, VarDecl,
    },
    bigint::BigInt,
    bounds,
    error::{Error, Result, SemanticError, SyntaxError},
    lexer,
    stdlib,
    token::{Position, Token, TokenKind},
    types::VarType,
};

/// Lexes and parses a whole program.
pub fn parse_program(src: &str) -> Result<Program> {
    let tokens = lexer::lex(src)?;
    let program = Parser::new(src, tokens, SymbolTable::default()).parse_program()?;
    tracing::debug!(statements = program.statements.len(), "parsed program");
    Ok(program)
}

/// Lexes and parses a single expression, which must span the whole input.
pub fn parse_expr(src: &str) -> Result<Expr> {
    let tokens = lexer::lex(src)?;
    Parser::new(src, tokens, SymbolTable::default()).parse_standalone_expr()
}

/// Names declared so far. There is no separate resolution pass: these sets
/// grow as declarations are parsed, so a name is only known after its
/// declaration.
#[derive(Clone, Debug, Default)]
struct SymbolTable {
    structs: HashSet<String>,
    enums: HashSet<String>,
    /// Top-level variable names, kept to reject redeclarations. Whether a
    /// variable reference is global or local is settled by the code
    /// generator's scope stack.
    globals: HashSet<String>,
    /// Lexical nesting depth; zero at the top level.
    depth: usize,
}

struct Parser<'src> {
    src: &'src str,
    tokens: Vec<Token>,
    cursor: usize,
    symbols: SymbolTable,
    entry_point: Option<String>,
}

impl Parser<'_> {
    fn parse_program(mut self) -> Result<Program> {
        let mut statements = Vec::new();
        while !self.is(TokenKind::Eof) {
            statements.push(self.parse_statement()?);
        }
        Ok(Program {
            statements,
            entry_point: self.entry_point,
        })
    }

    fn parse_standalone_expr(mut self) -> Result<Expr> {
        let expr = self.parse_expr()?;
        self.consume(TokenKind::Eof, "end of expression")?;
        Ok(expr)
    }

    fn parse_statement(&mut self) -> Result<Stmt> {
        let token = self.peek().clone();
        let pos = token.pos;
        let kind = match token.kind {
            TokenKind::Builtin if token.lexeme == "entrypoint" => {
                self.advance();
                if let Some(existing) = &self.entry_point {
                    return Err(SemanticError::at(
                        pos,
                        format!(
                            "multiple entry points: `{existing}` is already marked with \
                             @entrypoint"
                        ),
                    )
                    .into());
                }
                if !self.is(TokenKind::Func) {
                    return Err(self.error_at_current("expected `func` after @entrypoint"));
                }
                let function = self.parse_function(true)?;
                self.entry_point = Some(function.name.clone());
                StmtKind::Function(function)
            }
            TokenKind::Func => StmtKind::Function(self.parse_function(false)?),
            TokenKind::Struct => StmtKind::Struct(self.parse_struct()?),
            TokenKind::Enum => StmtKind::Enum(self.parse_enum()?),
            TokenKind::Return => {
                self.advance();
                let value = if self.is(TokenKind::Semicolon) {
                    None
                } else {
                    Some(self.parse_expr()?)
                };
                self.terminator()?;
                StmtKind::Return(value)
            }
            TokenKind::If => {
                self.advance();
                return self.parse_if(pos);
            }
            TokenKind::While => self.parse_while()?,
            TokenKind::For => self.parse_for()?,
            TokenKind::Var | TokenKind::Const => {
                let decl = self.parse_var_decl()?;
                self.terminator()?;
                StmtKind::VarDecl(decl)
            }
            TokenKind::Stop => {
                self.advance();
                self.terminator()?;
                StmtKind::Break
            }
            TokenKind::Next => {
                self.advance();
                self.terminator()?;
                StmtKind::Continue
            }
            TokenKind::Identifier if self.is_assignment_ahead() => {
                let assign = self.parse_assignment()?;
                self.terminator()?;
                return Ok(assign);
            }
            _ => {
                let expr = self.parse_expr()?;
                let kind = if self.take(TokenKind::Equals) {
                    let ExprKind::Member { object, member } = expr.kind else {
                        return Err(self.error_at(&token, "invalid assignment target"));
                    };
                    let value = self.parse_expr()?;
                    StmtKind::MemberAssign {
                        object: *object,
                        member,
                        value,
                    }
                } else {
                    StmtKind::Expr(expr)
                };
                self.terminator()?;
                kind
            }
        };
        Ok(Stmt { kind, pos })
    }

    fn parse_function(&mut self, is_entry: bool) -> Result<FunctionDecl> {
        self.consume(TokenKind::Func, "`func`")?;
        let name = self.parse_ident("function name")?;
        self.consume(TokenKind::LParen, "`(` after function name")?;
        let mut params = Vec::new();
        if !self.is(TokenKind::RParen) {
            loop {
                let name = self.parse_ident("parameter name")?;
                self.consume(TokenKind::Colon, "`:` after parameter name")?;
                let (ty, type_name) = self.parse_type()?;
                params.push(Param {
                    name,
                    ty,
                    type_name,
                });
                if !self.take(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.consume(TokenKind::RParen, "`)` after parameters")?;
        let (return_ty, return_type_name) = if self.take(TokenKind::Colon) {
            self.parse_type()?
        } else {
            (VarType::Void, None)
        };
        let body = self.scoped(|p| p.parse_body(&[TokenKind::End]))?;
        self.consume(TokenKind::End, "`end` to close the function")?;
        Ok(FunctionDecl {
            name,
            params,
            return_ty,
            return_type_name,
            body,
            is_entry,
        })
    }

    fn parse_struct(&mut self) -> Result<StructDecl> {
        self.consume(TokenKind::Struct, "`struct`")?;
        let name = self.parse_ident("struct name")?;
        self.symbols.structs.insert(name.clone());

        let mut fields = Vec::new();
        let mut methods = Vec::new();
        while !self.is(TokenKind::End) {
            if self.is(TokenKind::Func) {
                methods.push(self.parse_function(false)?);
                continue;
            }
            if self.is(TokenKind::Eof) {
                return Err(self.error_at_current("expected `end` to close the struct"));
            }
            let field = self.parse_ident("field name or `func`")?;
            self.consume(TokenKind::Colon, "`:` after field name")?;
            let (ty, type_name) = self.parse_type()?;
            self.terminator()?;
            fields.push(Param {
                name: field,
                ty,
                type_name,
            });
        }
        self.consume(TokenKind::End, "`end` to close the struct")?;
        Ok(StructDecl {
            name,
            fields,
            methods,
        })
    }

    fn parse_enum(&mut self) -> Result<EnumDecl> {
        self.consume(TokenKind::Enum, "`enum`")?;
        let name = self.parse_ident("enum name")?;
        self.symbols.enums.insert(name.clone());

        let mut members: Vec<(String, Expr)> = Vec::new();
        while !self.is(TokenKind::End) {
            let token = self.peek().clone();
            let member = self.parse_ident("enum member")?;
            let value = if self.take(TokenKind::Equals) {
                self.parse_expr()?
            } else {
                Self::next_enum_value(&name, members.last(), token.pos)
            };
            members.push((member, value));
            if !self.take(TokenKind::Comma) {
                break;
            }
        }
        self.consume(TokenKind::End, "`end` to close the enum")?;
        Ok(EnumDecl { name, members })
    }

    /// Synthesizes `previous + 1`, folding it when the previous value is a
    /// plain literal.
    fn next_enum_value(enum_name: &str, previous: Option<&(String, Expr)>, pos: Position) -> Expr {
        let Some((previous_name, previous_value)) = previous else {
            return Expr::new(ExprKind::Int(BigInt::zero()), pos);
        };
        if let ExprKind::Int(value) = &previous_value.kind {
            if let Some(v) = value.to_i128().and_then(|v| v.checked_add(1)) {
                return Expr::new(ExprKind::Int(BigInt::from(v)), pos);
            }
        }
        let previous = ExprKind::EnumValue {
            enum_name: enum_name.to_owned(),
            member: previous_name.clone(),
        };
        let kind = ExprKind::Binary {
            op: BinaryOp::Add,
            lhs: Expr::new(previous, pos).boxed(),
            rhs: Expr::new(ExprKind::Int(BigInt::from(1i64)), pos).boxed(),
        };
        Expr::new(kind, pos)
    }

    /// Parses the rest of an `if` (or `elseif`) after its keyword. An
    /// `elseif` becomes a nested `if` in the else branch; the innermost one
    /// consumes the shared `end`.
    fn parse_if(&mut self, pos: Position) -> Result<Stmt> {
        let condition = self.parse_expr()?;
        self.consume(TokenKind::Then, "`then` after the condition")?;
        let then_branch = self.scoped(|p| {
            p.parse_body(&[TokenKind::Elseif, TokenKind::Else, TokenKind::End])
        })?;

        let else_branch = match self.peek().kind {
            TokenKind::Elseif => {
                let elseif = self.advance();
                Some(Box::new(self.parse_if(elseif.pos)?))
            }
            TokenKind::Else => {
                let else_token = self.advance();
                let body = self.scoped(|p| p.parse_body(&[TokenKind::End]))?;
                self.consume(TokenKind::End, "`end` to close the if")?;
                Some(Box::new(Stmt {
                    kind: StmtKind::Block(body),
                    pos: else_token.pos,
                }))
            }
            _ => {
                self.consume(TokenKind::End, "`end` to close the if")?;
                None
            }
        };

        Ok(Stmt {
            kind: StmtKind::If {
                condition,
                then_branch,
                else_branch,
            },
            pos,
        })
    }

    fn parse_while(&mut self) -> Result<StmtKind> {
        self.consume(TokenKind::While, "`while`")?;
        let condition = self.parse_expr()?;
        self.consume(TokenKind::Do, "`do` after the loop condition")?;
        let body = self.scoped(|p| p.parse_body(&[TokenKind::End]))?;
        self.consume(TokenKind::End, "`end` to close the loop")?;
        Ok(StmtKind::While { condition, body })
    }

    fn parse_for(&mut self) -> Result<StmtKind> {
        self.consume(TokenKind::For, "`for`")?;
        self.scoped(|p| {
            p.consume(TokenKind::LParen, "`(` after `for`")?;

            let init_pos = p.peek().pos;
            let init = match p.peek().kind {
                TokenKind::Var | TokenKind::Const => StmtKind::VarDecl(p.parse_var_decl()?),
                TokenKind::Identifier if p.check_next(TokenKind::Colon) => {
                    StmtKind::VarDecl(p.parse_binding(false)?)
                }
                _ => p.parse_assignment()?.kind,
            };
            p.consume(TokenKind::Semicolon, "`;` after the loop initializer")?;
            let condition = p.parse_expr()?;
            p.consume(TokenKind::Semicolon, "`;` after the loop condition")?;
            let increment = p.parse_assignment()?;
            p.consume(TokenKind::RParen, "`)` to close the loop header")?;

            p.consume(TokenKind::Do, "`do` after the loop header")?;
            let body = p.parse_body(&[TokenKind::End])?;
            p.consume(TokenKind::End, "`end` to close the loop")?;

            Ok(StmtKind::For {
                init: Box::new(Stmt {
                    kind: init,
                    pos: init_pos,
                }),
                condition,
                increment: Box::new(increment),
                body,
            })
        })
    }

    fn parse_var_decl(&mut self) -> Result<VarDecl> {
        let keyword = self.advance();
        self.parse_binding(keyword.kind == TokenKind::Const)
    }

    /// Parses `name [: type] [= initializer]`.
    fn parse_binding(&mut self, is_const: bool) -> Result<VarDecl> {
        let name_token = self.peek().clone();
        let name = self.parse_ident("variable name")?;

        let annotation = if self.take(TokenKind::Colon) {
            Some(self.parse_type()?)
        } else {
            None
        };
        let initializer = if self.take(TokenKind::Equals) {
            Some(self.parse_expr()?)
        } else {
            None
        };

        let (ty, type_name) = match (annotation, &initializer) {
            (Some(annotation), _) => annotation,
            (None, Some(init)) => infer_type(init),
            (None, None) => {
                let what = if is_const { "constant" } else { "variable" };
                return Err(self.error_at(
                    &name_token,
                    &format!("{what} `{name}` needs a type annotation or an initializer"),
                ));
            }
        };
        if is_const && initializer.is_none() {
            return Err(self.error_at(
                &name_token,
                &format!("constant `{name}` must be initialized"),
            ));
        }

        if self.symbols.depth == 0 && !self.symbols.globals.insert(name.clone()) {
            return Err(self.error_at(
                &name_token,
                &format!("global variable `{name}` is already declared"),
            ));
        }

        Ok(VarDecl {
            name,
            ty,
            is_const,
            initializer,
            type_name,
        })
    }

    /// Parses `name = expr`, `name++`, `name--` and compound assignments,
    /// desugaring the latter into a plain assignment.
    fn parse_assignment(&mut self) -> Result<Stmt> {
        let name_token = self.peek().clone();
        let target = self.parse_ident("assignment target")?;
        let pos = name_token.pos;
        let variable = || Expr::new(ExprKind::Variable(target.clone()), pos).boxed();
        let one = || Expr::new(ExprKind::Int(BigInt::from(1i64)), pos).boxed();

        let op_token = self.advance();
        let value = match op_token.kind {
            TokenKind::Equals => self.parse_expr()?,
            TokenKind::PlusPlus | TokenKind::MinusMinus => {
                let op = if op_token.kind == TokenKind::PlusPlus {
                    BinaryOp::Add
                } else {
                    BinaryOp::Sub
                };
                let kind = ExprKind::Binary {
                    op,
                    lhs: variable(),
                    rhs: one(),
                };
                Expr::new(kind, pos)
            }
            TokenKind::PlusEq | TokenKind::MinusEq | TokenKind::StarEq | TokenKind::SlashEq => {
                let op = match op_token.kind {
                    TokenKind::PlusEq => BinaryOp::Add,
                    TokenKind::MinusEq => BinaryOp::Sub,
                    TokenKind::StarEq => BinaryOp::Mul,
                    _ => BinaryOp::Div,
                };
                let rhs = self.parse_expr()?;
                let kind = ExprKind::Binary {
                    op,
                    lhs: variable(),
                    rhs: rhs.boxed(),
                };
                Expr::new(kind, pos)
            }
            _ => return Err(self.error_at(&op_token, "expected an assignment operator")),
        };

        Ok(Stmt {
            kind: StmtKind::Assign { target, value },
            pos,
        })
    }

    /// Parses statements until one of `terminators` is current. Does **NOT**
    /// consume the terminator.
    fn parse_body(&mut self, terminators: &[TokenKind]) -> Result<Vec<Stmt>> {
        let mut body = Vec::new();
        while !terminators.contains(&self.peek().kind) {
            if self.is(TokenKind::Eof) {
                return Err(self.error_at_current("expected `end` before the end of the file"));
            }
            body.push(self.parse_statement()?);
        }
        Ok(body)
    }

    fn parse_type(&mut self) -> Result<(VarType, Option<String>)> {
        let token = self.advance();
        if let Some(ty) = VarType::from_keyword(token.kind) {
            return Ok((ty, None));
        }
        if token.kind == TokenKind::Identifier && self.symbols.structs.contains(&token.lexeme) {
            return Ok((VarType::Struct, Some(token.lexeme)));
        }
        Err(self.error_at(&token, &format!("expected a type, found {}", describe(&token))))
    }

    fn parse_ident(&mut self, what: &str) -> Result<String> {
        Ok(self.consume(TokenKind::Identifier, what)?.lexeme)
    }

    fn parse_expr(&mut self) -> Result<Expr> {
        let mut expr = self.parse_binary(0)?;
        while self.is(TokenKind::As) {
            let as_token = self.advance();
            let (ty, _) = self.parse_type()?;
            if ty == VarType::Struct {
                return Err(self.error_at(&as_token, "cannot cast to a struct type"));
            }
            let pos = expr.pos;
            expr = Expr::new(
                ExprKind::Cast {
                    expr: expr.boxed(),
                    ty,
                },
                pos,
            );
        }
        Ok(expr)
    }

    /// Precedence climbing: an operator is only consumed if it binds at least
    /// as tightly as `min_prec`, and its right operand is parsed one level
    /// tighter, which makes every level left associative.
    fn parse_binary(&mut self, min_prec: u8) -> Result<Expr> {
        let mut lhs = self.parse_unary()?;
        while let Some((op, prec)) = Self::binary_operator(self.peek().kind) {
            if prec < min_prec {
                break;
            }
            self.advance();
            let rhs = self.parse_binary(prec + 1)?;
            let pos = lhs.pos;
            lhs = Expr::new(
                ExprKind::Binary {
                    op,
                    lhs: lhs.boxed(),
                    rhs: rhs.boxed(),
                },
                pos,
            );
        }
        Ok(lhs)
    }

    fn binary_operator(kind: TokenKind) -> Option<(BinaryOp, u8)> {
        let op = match kind {
            TokenKind::OrOr => (BinaryOp::Or, 1),
            TokenKind::AndAnd => (BinaryOp::And, 2),
            TokenKind::Pipe => (BinaryOp::BitOr, 3),
            TokenKind::Caret => (BinaryOp::BitXor, 4),
            TokenKind::Amp => (BinaryOp::BitAnd, 5),
            TokenKind::EqEq => (BinaryOp::Eq, 6),
            TokenKind::NotEq => (BinaryOp::NotEq, 6),
            TokenKind::Less => (BinaryOp::Less, 7),
            TokenKind::Greater => (BinaryOp::Greater, 7),
            TokenKind::LessEq => (BinaryOp::LessEq, 7),
            TokenKind::GreaterEq => (BinaryOp::GreaterEq, 7),
            TokenKind::Shl => (BinaryOp::Shl, 8),
            TokenKind::Shr => (BinaryOp::Shr, 8),
            TokenKind::Plus => (BinaryOp::Add, 9),
            TokenKind::Minus => (BinaryOp::Sub, 9),
            TokenKind::Star => (BinaryOp::Mul, 10),
            TokenKind::Slash => (BinaryOp::Div, 10),
            TokenKind::Percent => (BinaryOp::Mod, 10),
            _ => return None,
        };
        Some(op)
    }

    fn parse_unary(&mut self) -> Result<Expr> {
        let op = match self.peek().kind {
            TokenKind::Bang => UnaryOp::Not,
            TokenKind::Minus => UnaryOp::Neg,
            TokenKind::Tilde => UnaryOp::BitNot,
            _ => return self.parse_postfix(),
        };
        let token = self.advance();
        let expr = self.parse_unary()?;
        Ok(Expr::new(
            ExprKind::Unary {
                op,
                expr: expr.boxed(),
            },
            token.pos,
        ))
    }

    fn parse_postfix(&mut self) -> Result<Expr> {
        let mut expr = self.parse_primary()?;
        loop {
            let pos = expr.pos;
            if self.take(TokenKind::Dot) {
                let member = self.parse_ident("member name after `.`")?;
                let kind = match expr.kind {
                    ExprKind::Module(path) if stdlib::is_module(&format!("{path}.{member}")) => {
                        ExprKind::Module(format!("{path}.{member}"))
                    }
                    kind => ExprKind::Member {
                        object: Expr::new(kind, pos).boxed(),
                        member,
                    },
                };
                expr = Expr::new(kind, pos);
            } else if self.take(TokenKind::LParen) {
                let args = self.parse_args()?;
                let callee = match expr.kind {
                    ExprKind::Variable(name) => Callee::Named(name),
                    kind => Callee::Expr(Expr::new(kind, pos).boxed()),
                };
                expr = Expr::new(ExprKind::Call { callee, args }, pos);
            } else {
                return Ok(expr);
            }
        }
    }

    /// Parses call arguments after the opening parenthesis, consuming the
    /// closing one.
    fn parse_args(&mut self) -> Result<Vec<Expr>> {
        let mut args = Vec::new();
        if !self.is(TokenKind::RParen) {
            loop {
                args.push(self.parse_expr()?);
                if !self.take(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.consume(TokenKind::RParen, "`)` to close the argument list")?;
        Ok(args)
    }

    fn parse_primary(&mut self) -> Result<Expr> {
        let token = self.advance();
        let kind = match token.kind {
            TokenKind::Number => match BigInt::parse_literal(&token.lexeme) {
                Ok(value) => ExprKind::Int(value),
                Err(error) => return Err(self.error_at(&token, &error.to_string())),
            },
            TokenKind::Float => {
                let Ok(value) = token.lexeme.replace('_', "").parse::<f64>() else {
                    let message = format!("invalid float literal `{}`", token.lexeme);
                    return Err(self.error_at(&token, &message));
                };
                ExprKind::Float {
                    value,
                    ty: VarType::Float64,
                }
            }
            TokenKind::String => ExprKind::String(token.lexeme),
            TokenKind::FormatString => self.parse_format(&token)?,
            TokenKind::True => ExprKind::Bool(true),
            TokenKind::False => ExprKind::Bool(false),
            TokenKind::Identifier => self.parse_identifier_expr(&token)?,
            TokenKind::Builtin if token.lexeme != "entrypoint" => {
                self.consume(TokenKind::LParen, "`(` after builtin name")?;
                let args = self.parse_args()?;
                ExprKind::Call {
                    callee: Callee::Named(format!("@{}", token.lexeme)),
                    args,
                }
            }
            TokenKind::LParen => {
                let expr = self.parse_expr()?;
                self.consume(TokenKind::RParen, "`)` to close the parenthesis")?;
                return Ok(expr);
            }
            TokenKind::Unknown => {
                let message = format!("unexpected character `{}`", token.lexeme);
                return Err(self.error_at(&token, &message));
            }
            _ => {
                let message = format!("unexpected {} in expression", describe(&token));
                return Err(self.error_at(&token, &message));
            }
        };
        Ok(Expr::new(kind, token.pos))
    }

    fn parse_identifier_expr(&mut self, token: &Token) -> Result<ExprKind> {
        let name = &token.lexeme;
        if self.symbols.enums.contains(name) && self.is(TokenKind::Dot) {
            self.advance();
            let member = self.parse_ident("enum member after `.`")?;
            return Ok(ExprKind::EnumValue {
                enum_name: name.clone(),
                member,
            });
        }
        if self.symbols.structs.contains(name) && self.is(TokenKind::LBrace) {
            self.advance();
            let mut fields = Vec::new();
            if !self.is(TokenKind::RBrace) {
                loop {
                    let field = self.parse_ident("field name")?;
                    self.consume(TokenKind::Colon, "`:` after field name")?;
                    fields.push((field, self.parse_expr()?));
                    if !self.take(TokenKind::Comma) {
                        break;
                    }
                }
            }
            self.consume(TokenKind::RBrace, "`}` to close the struct literal")?;
            return Ok(ExprKind::StructLiteral {
                name: name.clone(),
                fields,
            });
        }
        if stdlib::is_module(name) {
            return Ok(ExprKind::Module(name.clone()));
        }
        Ok(ExprKind::Variable(name.clone()))
    }

    /// Splits a format string into literal segments and placeholders. Each
    /// placeholder is lexed and parsed on its own by a nested parser that
    /// shares the declarations seen so far.
    fn parse_format(&mut self, token: &Token) -> Result<ExprKind> {
        let mut segments = Vec::new();
        let mut args = Vec::new();
        let mut current = String::new();
        let mut chars = token.lexeme.chars();

        while let Some(c) = chars.next() {
            match c {
                '\\' => match chars.clone().next() {
                    Some(brace @ ('{' | '}')) => {
                        chars.next();
                        current.push(brace);
                    }
                    _ => current.push('\\'),
                },
                '{' => {
                    let mut inner = String::new();
                    let mut closed = false;
                    for c in chars.by_ref() {
                        if c == '}' {
                            closed = true;
                            break;
                        }
                        inner.push(c);
                    }
                    if !closed {
                        return Err(self.error_at(token, "unclosed `{` in format string"));
                    }
                    args.push(self.parse_placeholder(token, &inner)?);
                    segments.push(std::mem::take(&mut current));
                }
                c => current.push(c),
            }
        }
        segments.push(current);
        Ok(ExprKind::Format { segments, args })
    }

    fn parse_placeholder(&self, token: &Token, inner: &str) -> Result<Expr> {
        let nested = || -> Result<Expr> {
            let tokens = lexer::lex(inner)?;
            let mut expr = Parser::new(inner, tokens, self.symbols.clone()).parse_standalone_expr()?;
            relocate(&mut expr, token.pos);
            Ok(expr)
        };
        nested().map_err(|error| {
            let message = format!("in format placeholder `{{{inner}}}`: {}", error.message());
            self.error_at(token, &message)
        })
    }

    /// Consumes the `;` which ends a statement, anchoring a missing one at
    /// the last consumed token.
    fn terminator(&mut self) -> Result<()> {
        if self.take(TokenKind::Semicolon) {
            return Ok(());
        }
        let last = self.previous().clone();
        let message = format!("expected `;` after {}", describe(&last));
        Err(self.error_at(&last, &message))
    }

    fn is_assignment_ahead(&self) -> bool {
        matches!(
            self.tokens.get(self.cursor + 1).map(|t| t.kind),
            Some(
                TokenKind::Equals
                    | TokenKind::PlusPlus
                    | TokenKind::MinusMinus
                    | TokenKind::PlusEq
                    | TokenKind::MinusEq
                    | TokenKind::StarEq
                    | TokenKind::SlashEq
            )
        )
    }
}

impl Parser<'_> {
    fn new(src: &str, tokens: Vec<Token>, symbols: SymbolTable) -> Parser<'_> {
        debug_assert!(tokens.last().is_some_and(Token::is_eof));
        Parser {
            src,
            tokens,
            cursor: 0,
            symbols,
            entry_point: None,
        }
    }

    /// Runs `f` one lexical level deeper, restoring the depth even when `f`
    /// fails.
    fn scoped<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        self.symbols.depth += 1;
        let res = f(self);
        self.symbols.depth -= 1;
        res
    }

    /// Returns the current token.
    fn peek(&self) -> &Token {
        let last = self.tokens.len() - 1;
        &self.tokens[self.cursor.min(last)]
    }

    /// Returns the last consumed token.
    fn previous(&self) -> &Token {
        &self.tokens[self.cursor.saturating_sub(1)]
    }

    /// Returns the current token and advances. Never moves past the end of
    /// file token.
    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if !token.is_eof() {
            self.cursor += 1;
        }
        token
    }

    /// Checks whether the current token matches the given one.
    fn is(&self, expect: TokenKind) -> bool {
        self.peek().kind == expect
    }

    /// Checks the token after the current one.
    fn check_next(&self, expect: TokenKind) -> bool {
        self.tokens
            .get(self.cursor + 1)
            .is_some_and(|t| t.kind == expect)
    }

    /// Advances if the current token matches the provided one, returning true.
    /// If not, returns false and doesn't advance.
    fn take(&mut self, expect: TokenKind) -> bool {
        if self.is(expect) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Advances if the current token matches the provided one. If not, fails
    /// with an error describing what was expected.
    fn consume(&mut self, expect: TokenKind, what: &str) -> Result<Token> {
        if self.is(expect) {
            return Ok(self.advance());
        }
        let message = format!("expected {what}, found {}", describe(self.peek()));
        Err(self.error_at_current(&message))
    }

    fn error_at_current(&self, message: &str) -> Error {
        self.error_at(self.peek(), message)
    }

    fn error_at(&self, token: &Token, message: &str) -> Error {
        let source_line = self
            .src
            .lines()
            .nth(token.pos.line.saturating_sub(1) as usize)
            .unwrap_or_default()
            .to_owned();
        SyntaxError {
            message: message.to_owned(),
            pos: token.pos,
            source_line,
        }
        .into()
    }
}

/// Infers the type of an un-annotated declaration from its initializer.
fn infer_type(init: &Expr) -> (VarType, Option<String>) {
    match &init.kind {
        ExprKind::Module(path) => (VarType::Module, Some(path.clone())),
        ExprKind::Int(value) => (bounds::narrowest_signed(value), None),
        ExprKind::Unary {
            op: UnaryOp::Neg,
            expr,
        } => match &expr.kind {
            ExprKind::Int(value) => (bounds::narrowest_signed(&-value), None),
            ExprKind::Float { ty, .. } => (*ty, None),
            _ => (VarType::Int32, None),
        },
        ExprKind::String(_) | ExprKind::Format { .. } => (VarType::String, None),
        ExprKind::Bool(_) => (VarType::Uint0, None),
        ExprKind::Float { ty, .. } => (*ty, None),
        ExprKind::StructLiteral { name, .. } => (VarType::Struct, Some(name.clone())),
        _ => (VarType::Int32, None),
    }
}

/// Moves every node of a placeholder expression onto the position of the
/// enclosing format string.
fn relocate(expr: &mut Expr, pos: Position) {
    expr.pos = pos;
    match &mut expr.kind {
        ExprKind::Binary { lhs, rhs, .. } => {
            relocate(lhs, pos);
            relocate(rhs, pos);
        }
        ExprKind::Unary { expr, .. } | ExprKind::Cast { expr, .. } => relocate(expr, pos),
        ExprKind::Member { object, .. } => relocate(object, pos),
        ExprKind::Call { callee, args } => {
            if let Callee::Expr(callee) = callee {
                relocate(callee, pos);
            }
            args.iter_mut().for_each(|arg| relocate(arg, pos));
        }
        ExprKind::Format { args, .. } => args.iter_mut().for_each(|arg| relocate(arg, pos)),
        ExprKind::StructLiteral { fields, .. } => {
            fields.iter_mut().for_each(|(_, value)| relocate(value, pos));
        }
        ExprKind::Int(_)
        | ExprKind::Float { .. }
        | ExprKind::String(_)
        | ExprKind::Bool(_)
        | ExprKind::Variable(_)
        | ExprKind::Module(_)
        | ExprKind::EnumValue { .. } => {}
    }
}

fn describe(token: &Token) -> String {
    match token.kind {
        TokenKind::Eof => "end of file".to_owned(),
        TokenKind::Identifier => format!("identifier `{}`", token.lexeme),
        TokenKind::Number | TokenKind::Float => format!("number `{}`", token.lexeme),
        TokenKind::String => format!("string {:?}", token.lexeme),
        TokenKind::FormatString => "format string".to_owned(),
        TokenKind::Builtin => format!("`@{}`", token.lexeme),
        _ => format!("`{}`", token.lexeme),
    }
}

#[cfg(test)]
mod tests {
    use crate::util::test_utils::tree_tests;

    tree_tests!(
        use parser;

        fn test_precedence() {
            let expr = "1 + 2 * 3 - 4";
            let tree_ok = "
                binary Sub
                  binary Add
                    int 1
                    binary Mul
                      int 2
                      int 3
                  int 4
            ";
        }

        fn test_left_associativity() {
            let expr = "a - b - c";
            let tree_ok = "
                binary Sub
                  binary Sub
                    ident a
                    ident b
                  ident c
            ";
        }

        fn test_logical_and_bitwise_levels() {
            let expr = "a || b && c | d ^ e & f == g < h << i";
            let tree_ok = "
                binary Or
                  ident a
                  binary And
                    ident b
                    binary BitOr
                      ident c
                      binary BitXor
                        ident d
                        binary BitAnd
                          ident e
                          binary Eq
                            ident f
                            binary Less
                              ident g
                              binary Shl
                                ident h
                                ident i
            ";
        }

        fn test_cast_binds_loosest() {
            let expr = "a + b as int64";
            let tree_ok = "
                cast int64
                  binary Add
                    ident a
                    ident b
            ";
        }

        fn test_unary_and_parens() {
            let expr = "-(a + 1) * !b + ~c";
            let tree_ok = "
                binary Add
                  binary Mul
                    unary Neg
                      binary Add
                        ident a
                        int 1
                    unary Not
                      ident b
                  unary BitNot
                    ident c
            ";
        }

        fn test_literals() {
            let expr = r#"f(0x1F, 0b1010, 1_000, 2.5, "hi", true)"#;
            let tree_ok = r#"
                call f
                  int 31
                  int 10
                  int 1000
                  float 2.5: float64
                  string "hi"
                  bool true
            "#;
        }

        fn test_module_member_call() {
            let expr = r#"std.io.println("x")"#;
            let tree_ok = r#"
                call
                  member println
                    module std.io
                  string "x"
            "#;
        }

        fn test_method_call_and_builtin() {
            let expr = "@dec(p.sum(1))";
            let tree_ok = "
                call @dec
                  call
                    member sum
                      ident p
                    int 1
            ";
        }

        fn test_format_string() {
            let expr = r"`x = {x + 1}, \{y\} {f(2)}!`";
            let tree_ok = r#"
                format "x = {}, {y} {}!"
                  binary Add
                    ident x
                    int 1
                  call f
                    int 2
            "#;
        }

        fn test_unclosed_format_placeholder() {
            let expr = "`value {x`";
            let expected_errors = &["1:1: unclosed `{` in format string"];
        }

        fn test_bad_format_placeholder() {
            let expr = "`value {x +}`";
            let expected_errors = &[
                "1:1: in format placeholder `{x +}`: unexpected end of file in expression",
            ];
        }

        fn test_invalid_literal_digit() {
            let expr = "0b102";
            let expected_errors = &["1:1: invalid digit `2` for base 2 in integer literal `0b102`"];
        }

        fn test_unknown_character() {
            let expr = "a + #";
            let expected_errors = &["1:5: unexpected character `#`"];
        }
    );

    tree_tests!(
        use parser;

        fn test_var_and_const_declarations() {
            let program = "
                var x: int8 = 5;
                const small = 100;
                const medium = 200;
                const negative = -129;
                const flag = true;
                const name = \"n\";
                const ratio = 0.5;
                const io = std.io;
                var big: uint64;
            ";
            let tree_ok = r#"
                var x: int8
                  int 5
                const small: int8
                  int 100
                const medium: int16
                  int 200
                const negative: int16
                  unary Neg
                    int 129
                const flag: uint0
                  bool true
                const name: string
                  string "n"
                const ratio: float64
                  float 0.5: float64
                const io: module std.io
                  module std.io
                var big: uint64
            "#;
        }

        fn test_function_with_if_chain() {
            let program = "
                @entrypoint
                func main(a: int32, b: float64): int32
                    if (a > 1) then
                        return 1;
                    elseif (a == 0) then
                        return 2;
                    else
                        return 3;
                    end
                end
            ";
            let tree_ok = "
                entrypoint main
                func main(a: int32, b: float64): int32 @entrypoint
                  if
                    binary Greater
                      ident a
                      int 1
                    then
                      return
                        int 1
                    else
                      if
                        binary Eq
                          ident a
                          int 0
                        then
                          return
                            int 2
                        else
                          block
                            return
                              int 3
            ";
        }

        fn test_loops_and_assignments() {
            let program = "
                func count()
                    var total: int32 = 0;
                    for (i: int8 = 0; i < 10; i++) do
                        if (i == 5) then STOP; end
                        total += i;
                        NEXT;
                    end
                    while (total > 0) do
                        total--;
                    end
                end
            ";
            let tree_ok = "
                func count(): void
                  var total: int32
                    int 0
                  for
                    var i: int8
                      int 0
                    binary Less
                      ident i
                      int 10
                    assign i
                      binary Add
                        ident i
                        int 1
                    do
                      if
                        binary Eq
                          ident i
                          int 5
                        then
                          STOP
                      assign total
                        binary Add
                          ident total
                          ident i
                      NEXT
                  while
                    binary Greater
                      ident total
                      int 0
                    do
                      assign total
                        binary Sub
                          ident total
                          int 1
            ";
        }

        fn test_enum_and_struct() {
            let program = "
                enum Color RED, GREEN = 5, BLUE end
                struct Point
                    x: int32;
                    y: int32;
                    func sum(): int32
                        return self.x + self.y;
                    end
                end
                var p: Point = Point { x: 1, y: Color.BLUE };
                p.x = 3;
            ";
            let tree_ok = "
                enum Color
                  RED
                    int 0
                  GREEN
                    int 5
                  BLUE
                    int 6
                struct Point
                  field x: int32
                  field y: int32
                  func sum(): int32
                    return
                      binary Add
                        member x
                          ident self
                        member y
                          ident self
                var p: Point
                  struct Point
                    field x
                      int 1
                    field y
                      enum Color.BLUE
                assign .x
                  ident p
                  int 3
            ";
        }

        fn test_enum_member_after_computed_value() {
            let program = "enum Flags A = 1 << 2, B end";
            let tree_ok = "
                enum Flags
                  A
                    binary Shl
                      int 1
                      int 2
                  B
                    binary Add
                      enum Flags.A
                      int 1
            ";
        }

        fn test_missing_semicolon_is_anchored_at_last_token() {
            let program = "var x: int8 = 5\nvar y: int8 = 6;";
            let expected_errors = &["1:15: expected `;` after number `5`"];
        }

        fn test_missing_end() {
            let program = "func f()\n  return;\n";
            let expected_errors = &["3:1: expected `end` before the end of the file"];
        }

        fn test_duplicate_entry_point() {
            let program = "
                @entrypoint
                func a() end
                @entrypoint
                func b() end
            ";
            let expected_errors = &[
                "4:17: multiple entry points: `a` is already marked with @entrypoint",
            ];
        }

        fn test_untyped_uninitialized_variable() {
            let program = "var x;";
            let expected_errors = &["1:5: variable `x` needs a type annotation or an initializer"];
        }

        fn test_duplicate_global() {
            let program = "var x: int8 = 1; var x: int8 = 2;";
            let expected_errors = &["1:22: global variable `x` is already declared"];
        }

        fn test_unknown_type() {
            let program = "var p: Point;";
            let expected_errors = &["1:8: expected a type, found identifier `Point`"];
        }

        fn test_invalid_assignment_target() {
            let program = "f() = 3;";
            let expected_errors = &["1:1: invalid assignment target"];
        }
    );
}
