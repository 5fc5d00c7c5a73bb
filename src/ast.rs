// program   ::= stmt*
// stmt      ::= '@entrypoint' function
//             | function
//             | 'struct' ID (ID ':' type ';' | function)* 'end'
//             | 'enum' ID [member (',' member)*] 'end'
//             | ('var' | 'const') ID [':' type] ['=' expr] ';'
//             | 'return' [expr] ';'
//             | 'if' '(' expr ')' 'then' stmt* ('elseif' '(' expr ')' 'then' stmt*)*
//               ['else' stmt*] 'end'
//             | 'while' '(' expr ')' 'do' stmt* 'end'
//             | 'for' '(' decl ';' expr ';' update ')' 'do' stmt* 'end'
//             | 'STOP' ';' | 'NEXT' ';'
//             | ID ('=' | '+=' | '-=' | '*=' | '/=') expr ';'
//             | ID ('++' | '--') ';'
//             | expr '.' ID '=' expr ';'
//             | expr ';'
// function  ::= 'func' ID '(' [ID ':' type (',' ID ':' type)*] ')' [':' type] stmt* 'end'
// member    ::= ID ['=' expr]
// expr      ::= binary ['as' type]
// binary    ::= unary (binop unary)*
// unary     ::= ('!' | '-' | '~') unary | postfix
// postfix   ::= primary ('.' ID | '(' [expr (',' expr)*] ')')*
// primary   ::= INT | FLOAT | STRING | FORMAT | 'true' | 'false' | ID | BUILTIN
//             | ID '{' [ID ':' expr (',' ID ':' expr)*] '}'
//             | '(' expr ')'

// Precedence, loosest first
//
// as
// ||
// &&
// |
// ^
// &
// == !=
// < > <= >=
// << >>
// + -
// * / %
// ! - ~

use crate::{bigint::BigInt, token::Position, types::VarType};

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Program {
    pub statements: Vec<Stmt>,
    /// Name of the function marked with `@entrypoint`, if any.
    pub entry_point: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Stmt {
    pub kind: StmtKind,
    pub pos: Position,
}

#[derive(Clone, Debug, PartialEq)]
pub enum StmtKind {
    VarDecl(VarDecl),
    Assign {
        target: String,
        value: Expr,
    },
    /// `object.member = value`
    MemberAssign {
        object: Expr,
        member: String,
        value: Expr,
    },
    Block(Vec<Stmt>),
    If {
        condition: Expr,
        then_branch: Vec<Stmt>,
        /// Either a [`StmtKind::Block`] or, for `elseif`, a nested
        /// [`StmtKind::If`].
        else_branch: Option<Box<Stmt>>,
    },
    While {
        condition: Expr,
        body: Vec<Stmt>,
    },
    For {
        init: Box<Stmt>,
        condition: Expr,
        increment: Box<Stmt>,
        body: Vec<Stmt>,
    },
    Function(FunctionDecl),
    Return(Option<Expr>),
    Break,
    Continue,
    Enum(EnumDecl),
    Struct(StructDecl),
    Expr(Expr),
}

impl StmtKind {
    /// Declarations are hoisted by the code generator and never become part
    /// of an implicit entry function.
    pub fn is_declaration(&self) -> bool {
        matches!(
            self,
            StmtKind::VarDecl(_) | StmtKind::Function(_) | StmtKind::Enum(_) | StmtKind::Struct(_)
        )
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct VarDecl {
    pub name: String,
    pub ty: VarType,
    pub is_const: bool,
    pub initializer: Option<Expr>,
    /// Set when `ty` is [`VarType::Struct`] or [`VarType::Module`].
    pub type_name: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Param {
    pub name: String,
    pub ty: VarType,
    pub type_name: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct FunctionDecl {
    pub name: String,
    pub params: Vec<Param>,
    pub return_ty: VarType,
    pub return_type_name: Option<String>,
    pub body: Vec<Stmt>,
    pub is_entry: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct EnumDecl {
    pub name: String,
    /// Members in declaration order. Implicit values are synthesized by the
    /// parser as `previous + 1`.
    pub members: Vec<(String, Expr)>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct StructDecl {
    pub name: String,
    pub fields: Vec<Param>,
    pub methods: Vec<FunctionDecl>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub pos: Position,
}

impl Expr {
    pub fn new(kind: ExprKind, pos: Position) -> Expr {
        Expr { kind, pos }
    }

    pub fn boxed(self) -> Box<Expr> {
        Box::new(self)
    }

    pub fn is_literal(&self) -> bool {
        matches!(
            self.kind,
            ExprKind::Int(_) | ExprKind::Float { .. } | ExprKind::String(_) | ExprKind::Bool(_)
        )
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum ExprKind {
    Int(BigInt),
    Float {
        value: f64,
        ty: VarType,
    },
    String(String),
    Bool(bool),
    /// Backtick string. `segments` has exactly one more element than `args`,
    /// the literal text around each placeholder.
    Format {
        segments: Vec<String>,
        args: Vec<Expr>,
    },
    Variable(String),
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        expr: Box<Expr>,
    },
    Call {
        callee: Callee,
        args: Vec<Expr>,
    },
    Cast {
        expr: Box<Expr>,
        ty: VarType,
    },
    /// A standard library module path such as `std.io`.
    Module(String),
    Member {
        object: Box<Expr>,
        member: String,
    },
    EnumValue {
        enum_name: String,
        member: String,
    },
    StructLiteral {
        name: String,
        fields: Vec<(String, Expr)>,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub enum Callee {
    /// A plain function name, or `@name` for compiler builtins.
    Named(String),
    /// A resolved callee such as `value.method` or `std.io.println`.
    Expr(Box<Expr>),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BinaryOp {
    Or,
    And,
    BitOr,
    BitXor,
    BitAnd,
    Eq,
    NotEq,
    Less,
    Greater,
    LessEq,
    GreaterEq,
    Shl,
    Shr,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

impl BinaryOp {
    pub fn is_comparison(self) -> bool {
        use BinaryOp::*;
        matches!(self, Eq | NotEq | Less | Greater | LessEq | GreaterEq)
    }

    pub fn is_logical(self) -> bool {
        matches!(self, BinaryOp::Or | BinaryOp::And)
    }

    pub fn is_bitwise(self) -> bool {
        use BinaryOp::*;
        matches!(self, BitOr | BitXor | BitAnd | Shl | Shr)
    }

    pub fn symbol(self) -> &'static str {
        use BinaryOp::*;
        match self {
            Or => "||",
            And => "&&",
            BitOr => "|",
            BitXor => "^",
            BitAnd => "&",
            Eq => "==",
            NotEq => "!=",
            Less => "<",
            Greater => ">",
            LessEq => "<=",
            GreaterEq => ">=",
            Shl => "<<",
            Shr => ">>",
            Add => "+",
            Sub => "-",
            Mul => "*",
            Div => "/",
            Mod => "%",
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
    BitNot,
}
