use std::fmt;

#[derive(Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub lexeme: String,
    pub pos: Position,
}

impl Token {
    pub fn new(kind: TokenKind, lexeme: impl Into<String>, pos: Position) -> Token {
        Token {
            kind,
            lexeme: lexeme.into(),
            pos,
        }
    }

    pub fn is_eof(&self) -> bool {
        self.kind == TokenKind::Eof
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Token({}, {:?}, {})", self.kind, self.lexeme, self.pos)
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.kind.has_payload() {
            write!(f, "{}({:?})", self.kind, self.lexeme)
        } else {
            write!(f, "{}", self.kind)
        }
    }
}

/// A 1-based source position.
#[derive(Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Position {
    pub line: u32,
    pub column: u32,
}

impl Position {
    pub const fn new(line: u32, column: u32) -> Position {
        Position { line, column }
    }
}

impl fmt::Debug for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Position({self})")
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Func,
    End,
    Return,
    If,
    Then,
    Elseif,
    Else,
    While,
    Do,
    For,
    Var,
    Const,
    /// `STOP`, leaves the innermost loop.
    Stop,
    /// `NEXT`, jumps to the next iteration of the innermost loop.
    Next,
    Enum,
    Struct,
    As,
    True,
    False,

    Bool,
    Int4,
    Int8,
    Int12,
    Int16,
    Int24,
    Int32,
    Int48,
    Int64,
    Uint0,
    Uint4,
    Uint8,
    Uint12,
    Uint16,
    Uint24,
    Uint32,
    Uint48,
    Uint64,
    Float32,
    Float64,
    TyString,
    Void,

    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    /// `=`
    Equals,
    EqEq,
    NotEq,
    Less,
    LessEq,
    Greater,
    GreaterEq,
    AndAnd,
    OrOr,
    Bang,
    Amp,
    Pipe,
    Caret,
    Tilde,
    Shl,
    Shr,
    PlusPlus,
    MinusMinus,
    PlusEq,
    MinusEq,
    StarEq,
    SlashEq,

    LParen,
    RParen,
    LBrace,
    RBrace,
    Comma,
    Colon,
    Semicolon,
    Dot,

    Identifier,
    Number,
    Float,
    String,
    /// A backtick-delimited string with `{expr}` placeholders.
    FormatString,
    /// `@name`; the lexeme holds the name without the `@`.
    Builtin,

    Unknown,
    Eof,
}

impl TokenKind {
    /// Whether the lexeme is meaningful for this kind, i.e. it is not fully
    /// determined by the kind itself.
    pub fn has_payload(self) -> bool {
        matches!(
            self,
            TokenKind::Identifier
                | TokenKind::Number
                | TokenKind::Float
                | TokenKind::String
                | TokenKind::FormatString
                | TokenKind::Builtin
                | TokenKind::Unknown
        )
    }

    pub fn is_type_keyword(self) -> bool {
        use TokenKind::*;
        matches!(
            self,
            Bool | Int4
                | Int8
                | Int12
                | Int16
                | Int24
                | Int32
                | Int48
                | Int64
                | Uint0
                | Uint4
                | Uint8
                | Uint12
                | Uint16
                | Uint24
                | Uint32
                | Uint48
                | Uint64
                | Float32
                | Float64
                | TyString
                | Void
        )
    }

    pub const fn name(self) -> &'static str {
        use TokenKind::*;
        match self {
            Func => "FUNC",
            End => "END",
            Return => "RETURN",
            If => "IF",
            Then => "THEN",
            Elseif => "ELSEIF",
            Else => "ELSE",
            While => "WHILE",
            Do => "DO",
            For => "FOR",
            Var => "VAR",
            Const => "CONST",
            Stop => "STOP",
            Next => "NEXT",
            Enum => "ENUM",
            Struct => "STRUCT",
            As => "AS",
            True => "TRUE",
            False => "FALSE",
            Bool => "BOOL",
            Int4 => "INT4",
            Int8 => "INT8",
            Int12 => "INT12",
            Int16 => "INT16",
            Int24 => "INT24",
            Int32 => "INT32",
            Int48 => "INT48",
            Int64 => "INT64",
            Uint0 => "UINT0",
            Uint4 => "UINT4",
            Uint8 => "UINT8",
            Uint12 => "UINT12",
            Uint16 => "UINT16",
            Uint24 => "UINT24",
            Uint32 => "UINT32",
            Uint48 => "UINT48",
            Uint64 => "UINT64",
            Float32 => "FLOAT32",
            Float64 => "FLOAT64",
            TyString => "STRING_TYPE",
            Void => "VOID",
            Plus => "PLUS",
            Minus => "MINUS",
            Star => "STAR",
            Slash => "SLASH",
            Percent => "PERCENT",
            Equals => "EQUALS",
            EqEq => "EQ_EQ",
            NotEq => "NOT_EQ",
            Less => "LESS",
            LessEq => "LESS_EQ",
            Greater => "GREATER",
            GreaterEq => "GREATER_EQ",
            AndAnd => "AND_AND",
            OrOr => "OR_OR",
            Bang => "BANG",
            Amp => "AMP",
            Pipe => "PIPE",
            Caret => "CARET",
            Tilde => "TILDE",
            Shl => "SHL",
            Shr => "SHR",
            PlusPlus => "PLUS_PLUS",
            MinusMinus => "MINUS_MINUS",
            PlusEq => "PLUS_EQ",
            MinusEq => "MINUS_EQ",
            StarEq => "STAR_EQ",
            SlashEq => "SLASH_EQ",
            LParen => "LPAREN",
            RParen => "RPAREN",
            LBrace => "LBRACE",
            RBrace => "RBRACE",
            Comma => "COMMA",
            Colon => "COLON",
            Semicolon => "SEMICOLON",
            Dot => "DOT",
            Identifier => "IDENTIFIER",
            Number => "NUMBER",
            Float => "FLOAT",
            String => "STRING",
            FormatString => "FORMAT_STRING",
            Builtin => "BUILTIN",
            Unknown => "UNKNOWN",
            Eof => "END_OF_FILE",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Keywords are case sensitive: `STOP` and `NEXT` are only recognized in
/// upper case, everything else in lower case.
pub static KEYWORDS: phf::Map<&'static str, TokenKind> = phf::phf_map! {
    "func" => TokenKind::Func,
    "end" => TokenKind::End,
    "return" => TokenKind::Return,
    "if" => TokenKind::If,
    "then" => TokenKind::Then,
    "elseif" => TokenKind::Elseif,
    "else" => TokenKind::Else,
    "while" => TokenKind::While,
    "do" => TokenKind::Do,
    "for" => TokenKind::For,
    "var" => TokenKind::Var,
    "const" => TokenKind::Const,
    "STOP" => TokenKind::Stop,
    "NEXT" => TokenKind::Next,
    "enum" => TokenKind::Enum,
    "struct" => TokenKind::Struct,
    "as" => TokenKind::As,
    "true" => TokenKind::True,
    "false" => TokenKind::False,
    "bool" => TokenKind::Bool,
    "int4" => TokenKind::Int4,
    "int8" => TokenKind::Int8,
    "int12" => TokenKind::Int12,
    "int16" => TokenKind::Int16,
    "int24" => TokenKind::Int24,
    "int32" => TokenKind::Int32,
    "int48" => TokenKind::Int48,
    "int64" => TokenKind::Int64,
    "uint0" => TokenKind::Uint0,
    "uint4" => TokenKind::Uint4,
    "uint8" => TokenKind::Uint8,
    "uint12" => TokenKind::Uint12,
    "uint16" => TokenKind::Uint16,
    "uint24" => TokenKind::Uint24,
    "uint32" => TokenKind::Uint32,
    "uint48" => TokenKind::Uint48,
    "uint64" => TokenKind::Uint64,
    "float32" => TokenKind::Float32,
    "float64" => TokenKind::Float64,
    "string" => TokenKind::TyString,
    "void" => TokenKind::Void,
};
