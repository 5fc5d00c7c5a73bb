use std::{iter::Peekable, str::Chars};

use crate::{
    error::LexError,
    token::{Position, Token, TokenKind, KEYWORDS},
};

pub const SUGGESTED_TOKENS_CAPACITY: usize = 1_024;

/// Lexes the provided source, producing a token sequence which always ends
/// with a [`TokenKind::Eof`] token.
///
/// Unrecognized characters become [`TokenKind::Unknown`] tokens so that the
/// parser can report them in context. The only lexical failure is an
/// unterminated string literal.
pub fn lex(src: &str) -> Result<Vec<Token>, LexError> {
    let mut tokens = Vec::with_capacity(SUGGESTED_TOKENS_CAPACITY.min(src.len() / 2 + 1));
    Lexer::new(src).lex(&mut tokens)?;
    tracing::trace!(count = tokens.len(), "lexed source");
    Ok(tokens)
}

struct Lexer<'src> {
    iter: Peekable<Chars<'src>>,
    /// Second character of lookahead, only used for `.5` and `1e+5` shapes.
    rest: Chars<'src>,
    line: u32,
    column: u32,
    start: Position,
    lexeme: String,
}

impl Lexer<'_> {
    fn lex(mut self, tokens: &mut Vec<Token>) -> Result<(), LexError> {
        loop {
            self.skip_trivia();
            self.mark();
            let kind = self.scan_token_kind()?;
            let is_eof = kind == TokenKind::Eof;
            let lexeme = std::mem::take(&mut self.lexeme);
            tokens.push(Token::new(kind, lexeme, self.start));
            if is_eof {
                return Ok(());
            }
        }
    }

    /// Tries to scan the current character.
    fn scan_token_kind(&mut self) -> Result<TokenKind, LexError> {
        use TokenKind::*;
        let kind = match self.advance() {
            '\0' => Eof,
            '+' => match self.peek() {
                '+' => self.advance_with(PlusPlus),
                '=' => self.advance_with(PlusEq),
                _ => Plus,
            },
            '-' => match self.peek() {
                '-' => self.advance_with(MinusMinus),
                '=' => self.advance_with(MinusEq),
                _ => Minus,
            },
            '*' => match self.peek() {
                '=' => self.advance_with(StarEq),
                _ => Star,
            },
            '/' => match self.peek() {
                '=' => self.advance_with(SlashEq),
                _ => Slash,
            },
            '%' => Percent,
            '=' => match self.peek() {
                '=' => self.advance_with(EqEq),
                _ => Equals,
            },
            '!' => match self.peek() {
                '=' => self.advance_with(NotEq),
                _ => Bang,
            },
            '<' => match self.peek() {
                '=' => self.advance_with(LessEq),
                '<' => self.advance_with(Shl),
                _ => Less,
            },
            '>' => match self.peek() {
                '=' => self.advance_with(GreaterEq),
                '>' => self.advance_with(Shr),
                _ => Greater,
            },
            '&' => match self.peek() {
                '&' => self.advance_with(AndAnd),
                _ => Amp,
            },
            '|' => match self.peek() {
                '|' => self.advance_with(OrOr),
                _ => Pipe,
            },
            '^' => Caret,
            '~' => Tilde,
            '(' => LParen,
            ')' => RParen,
            '{' => LBrace,
            '}' => RBrace,
            ',' => Comma,
            ':' => Colon,
            ';' => Semicolon,
            '.' => Dot,
            '"' => return self.string(),
            '`' => return self.format_string(),
            '@' => self.builtin(),
            c if is_identifier_start(c) => self.identifier_or_keyword(),
            c if c.is_ascii_digit() => self.number(c),
            _ => Unknown,
        };
        Ok(kind)
    }

    fn skip_trivia(&mut self) {
        loop {
            match self.peek() {
                c if c.is_whitespace() => {
                    self.bump();
                }
                '/' if self.peek_second() == '/' => {
                    while !matches!(self.peek(), '\n' | '\0') {
                        self.bump();
                    }
                }
                '/' if self.peek_second() == '*' => self.block_comment(),
                _ => return,
            }
        }
    }

    /// An unterminated block comment silently runs to the end of the input.
    fn block_comment(&mut self) {
        let start = Position::new(self.line, self.column);
        self.bump();
        self.bump();
        loop {
            match self.bump() {
                '*' if self.peek() == '/' => {
                    self.bump();
                    return;
                }
                '\0' => {
                    tracing::warn!(%start, "block comment is never closed");
                    return;
                }
                _ => {}
            }
        }
    }

    fn string(&mut self) -> Result<TokenKind, LexError> {
        self.lexeme.clear();
        loop {
            match self.bump() {
                '\0' => return Err(self.error("unterminated string literal")),
                '"' => return Ok(TokenKind::String),
                '\\' => {
                    let escaped = self.bump();
                    match escaped {
                        'n' => self.lexeme.push('\n'),
                        't' => self.lexeme.push('\t'),
                        '\\' => self.lexeme.push('\\'),
                        '"' => self.lexeme.push('"'),
                        '\0' => return Err(self.error("unterminated string literal")),
                        other => {
                            self.lexeme.push('\\');
                            self.lexeme.push(other);
                        }
                    }
                }
                c => self.lexeme.push(c),
            }
        }
    }

    /// Like [`Lexer::string`], but `\{` and `\}` are kept verbatim so that
    /// the parser can tell literal braces apart from placeholders.
    fn format_string(&mut self) -> Result<TokenKind, LexError> {
        self.lexeme.clear();
        loop {
            match self.bump() {
                '\0' => return Err(self.error("unterminated format string literal")),
                '`' => return Ok(TokenKind::FormatString),
                '\\' => {
                    let escaped = self.bump();
                    match escaped {
                        'n' => self.lexeme.push('\n'),
                        't' => self.lexeme.push('\t'),
                        '\\' => self.lexeme.push('\\'),
                        '"' => self.lexeme.push('"'),
                        '`' => self.lexeme.push('`'),
                        '\0' => return Err(self.error("unterminated format string literal")),
                        other => {
                            self.lexeme.push('\\');
                            self.lexeme.push(other);
                        }
                    }
                }
                c => self.lexeme.push(c),
            }
        }
    }

    fn builtin(&mut self) -> TokenKind {
        if !is_identifier_start(self.peek()) {
            return TokenKind::Unknown;
        }
        self.lexeme.clear();
        while is_identifier_continue(self.peek()) {
            self.advance();
        }
        TokenKind::Builtin
    }

    fn identifier_or_keyword(&mut self) -> TokenKind {
        while is_identifier_continue(self.peek()) {
            self.advance();
        }
        KEYWORDS
            .get(self.lexeme.as_str())
            .copied()
            .unwrap_or(TokenKind::Identifier)
    }

    fn number(&mut self, first: char) -> TokenKind {
        if first == '0' && matches!(self.peek(), 'x' | 'X' | 'b' | 'B') {
            self.advance();
            // Invalid digits are kept in the lexeme and reported by the
            // literal parser, which knows the radix.
            while is_identifier_continue(self.peek()) {
                self.advance();
            }
            return TokenKind::Number;
        }

        let mut kind = TokenKind::Number;
        self.digits();
        if self.peek() == '.' && self.peek_second().is_ascii_digit() {
            kind = TokenKind::Float;
            self.advance();
            self.digits();
        }
        if matches!(self.peek(), 'e' | 'E') {
            let second = self.peek_second();
            let signed = matches!(second, '+' | '-');
            if second.is_ascii_digit() || (signed && self.peek_third().is_ascii_digit()) {
                kind = TokenKind::Float;
                self.advance();
                if signed {
                    self.advance();
                }
                self.digits();
            }
        }
        kind
    }

    fn digits(&mut self) {
        while matches!(self.peek(), '0'..='9' | '_') {
            self.advance();
        }
    }
}

impl Lexer<'_> {
    fn new(src: &str) -> Lexer<'_> {
        Lexer {
            iter: src.chars().peekable(),
            rest: src.chars(),
            line: 1,
            column: 1,
            start: Position::new(1, 1),
            lexeme: String::new(),
        }
    }

    /// Marks the start of a new token.
    fn mark(&mut self) {
        self.start = Position::new(self.line, self.column);
        self.lexeme.clear();
    }

    /// Consumes the next character, recording it in the current lexeme.
    fn advance(&mut self) -> char {
        let c = self.bump();
        if c != '\0' {
            self.lexeme.push(c);
        }
        c
    }

    /// Advances and returns the provided value.
    fn advance_with<T>(&mut self, value: T) -> T {
        self.advance();
        value
    }

    /// Consumes the next character without recording it.
    fn bump(&mut self) -> char {
        let Some(c) = self.iter.next() else {
            return '\0';
        };
        self.rest.next();
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        c
    }

    fn peek(&mut self) -> char {
        self.iter.peek().copied().unwrap_or('\0')
    }

    fn peek_second(&self) -> char {
        self.rest.clone().nth(1).unwrap_or('\0')
    }

    fn peek_third(&self) -> char {
        self.rest.clone().nth(2).unwrap_or('\0')
    }

    fn error(&self, message: &str) -> LexError {
        LexError {
            message: message.to_owned(),
            pos: self.start,
        }
    }
}

fn is_identifier_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_identifier_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn kinds(src: &str) -> Vec<(TokenKind, String)> {
        lex(src)
            .expect("lexes")
            .into_iter()
            .map(|t| (t.kind, t.lexeme))
            .collect()
    }

    macro_rules! cases {
        ($($kind:ident $(($lexeme:expr))?),* $(,)?) => {
            vec![$((TokenKind::$kind, cases!(@lexeme $($lexeme)?))),*]
        };
        (@lexeme $lexeme:expr) => { String::from($lexeme) };
        (@lexeme) => { String::new() };
    }

    #[test]
    fn test_declaration_with_comment() {
        let lexed: Vec<_> = lex("var x: int8 = 5; // comment\n")
            .unwrap()
            .into_iter()
            .map(|t| t.to_string())
            .collect();
        assert_eq!(
            lexed,
            [
                "VAR",
                "IDENTIFIER(\"x\")",
                "COLON",
                "INT8",
                "EQUALS",
                "NUMBER(\"5\")",
                "SEMICOLON",
                "END_OF_FILE",
            ]
        );
    }

    #[test]
    fn test_operators() {
        let lexed = kinds("+ ++ += - -- -= * *= / /= % == = != ! < <= << > >= >> && & || | ^ ~");
        let ops: Vec<_> = lexed.into_iter().map(|(k, _)| k).collect();
        use TokenKind::*;
        assert_eq!(
            ops,
            [
                Plus, PlusPlus, PlusEq, Minus, MinusMinus, MinusEq, Star, StarEq, Slash, SlashEq,
                Percent, EqEq, Equals, NotEq, Bang, Less, LessEq, Shl, Greater, GreaterEq, Shr,
                AndAnd, Amp, OrOr, Pipe, Caret, Tilde, Eof,
            ]
        );
    }

    #[test]
    fn test_numbers() {
        assert_eq!(
            kinds("1_000 0x1F 0b1010 3.25 1e5 2E-3 7.x"),
            cases![
                Number("1_000"),
                Number("0x1F"),
                Number("0b1010"),
                Float("3.25"),
                Float("1e5"),
                Float("2E-3"),
                Number("7"),
                Dot("."),
                Identifier("x"),
                Eof,
            ]
        );
    }

    #[test]
    fn test_keywords_are_case_sensitive() {
        assert_eq!(
            kinds("STOP stop NEXT Next func FUNC"),
            cases![
                Stop("STOP"),
                Identifier("stop"),
                Next("NEXT"),
                Identifier("Next"),
                Func("func"),
                Identifier("FUNC"),
                Eof,
            ]
        );
    }

    #[test]
    fn test_strings() {
        assert_eq!(
            kinds(r#""a\nb" "q\"q" "back\\slash" "raw\q""#),
            cases![
                String("a\nb"),
                String("q\"q"),
                String("back\\slash"),
                String("raw\\q"),
                Eof,
            ]
        );
    }

    #[test]
    fn test_format_string_keeps_brace_escapes() {
        assert_eq!(
            kinds(r"`x = {x} \{literal\}\n`"),
            cases![FormatString("x = {x} \\{literal\\}\n"), Eof]
        );
    }

    #[test]
    fn test_builtins_and_unknown() {
        assert_eq!(
            kinds("@entrypoint @dec(1) # @ $"),
            cases![
                Builtin("entrypoint"),
                Builtin("dec"),
                LParen("("),
                Number("1"),
                RParen(")"),
                Unknown("#"),
                Unknown("@"),
                Unknown("$"),
                Eof,
            ]
        );
    }

    #[test]
    fn test_comments_produce_no_tokens() {
        assert_eq!(
            kinds("a /* multi\nline */ b // trailing\nc"),
            cases![Identifier("a"), Identifier("b"), Identifier("c"), Eof]
        );
        assert_eq!(kinds("a /* never closed"), cases![Identifier("a"), Eof]);
    }

    #[test]
    fn test_positions() {
        let tokens = lex("var x\n  = `a\nb` y").unwrap();
        let positions: Vec<_> = tokens.iter().map(|t| (t.kind, t.pos)).collect();
        assert_eq!(
            positions,
            [
                (TokenKind::Var, Position::new(1, 1)),
                (TokenKind::Identifier, Position::new(1, 5)),
                (TokenKind::Equals, Position::new(2, 3)),
                (TokenKind::FormatString, Position::new(2, 5)),
                (TokenKind::Identifier, Position::new(3, 4)),
                (TokenKind::Eof, Position::new(3, 5)),
            ]
        );
    }

    #[test]
    fn test_unterminated_strings() {
        let error = lex("var s = \"oops").unwrap_err();
        assert_eq!(error.message, "unterminated string literal");
        assert_eq!(error.pos, Position::new(1, 9));

        let error = lex("`never {closed}").unwrap_err();
        assert_eq!(error.message, "unterminated format string literal");
        assert_eq!(error.pos, Position::new(1, 1));
    }
}
