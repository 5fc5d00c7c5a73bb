use std::fmt::Write;

use yansi::{Color, Style};

use crate::error::Error;

/// Message fragments mapped to a hint, first match wins.
const SUGGESTIONS: &[(&str, &str)] = &[
    ("expected `;`", "add a `;` at the end of the statement"),
    ("expected `end`", "close the block with `end`"),
    ("unterminated", "close the string literal with its matching quote"),
    ("unclosed `{`", "close the placeholder with `}`, or escape the brace as `\\{`"),
    ("out of bounds", "use a wider type, or convert explicitly with `as`"),
    ("out of range", "integer literals must fit in 64 signed bits"),
    ("is constant", "declare it with `var` instead of `const`"),
    ("uint0", "`uint0` values are always 0 and can't be assigned"),
    ("unknown variable", "declare the variable before its first use"),
    ("unknown function", "declare the function before calling it, or check its spelling"),
    ("cannot cast", "only numeric, boolean and string conversions are allowed"),
    ("missing return", "end the function with a `return` statement"),
    ("multiple entry points", "mark a single function with @entrypoint"),
    ("argument", "check the number of arguments at the call site"),
    ("expected a type", "declare the struct before using it as a type"),
    ("compile-time constant", "initialize globals with literals, enum values or modules"),
    ("clang", "install clang or make sure it is on the PATH"),
];

/// Picks a hint for a diagnostic by looking at its message.
pub fn suggestion(message: &str) -> Option<&'static str> {
    SUGGESTIONS
        .iter()
        .find(|(pattern, _)| message.contains(pattern))
        .map(|&(_, hint)| hint)
}

struct Painter {
    colored: bool,
}

impl Painter {
    fn paint(&self, style: Style, text: impl std::fmt::Display) -> String {
        if self.colored {
            style.paint(text).to_string()
        } else {
            text.to_string()
        }
    }
}

/// Renders `error` as a multi-line diagnostic: a boxed header, the `-->`
/// position line, the offending source line with a caret under the column,
/// and a suggestion when one applies.
pub fn render(error: &Error, src: &str, path: Option<&str>, colored: bool) -> String {
    let p = Painter { colored };
    let red = Style::new(Color::Red).bold();
    let blue = Style::new(Color::Blue).bold();
    let mut out = String::new();

    let header = format!("{}: {}", error.category(), error.message());
    let width = header.chars().count() + 2;
    let rule = "─".repeat(width);
    _ = writeln!(out, "{}", p.paint(red, format_args!("╭{rule}╮")));
    _ = writeln!(
        out,
        "{} {} {}",
        p.paint(red, "│"),
        p.paint(Style::default().bold(), &header),
        p.paint(red, "│")
    );
    _ = writeln!(out, "{}", p.paint(red, format_args!("╰{rule}╯")));

    if let Some(pos) = error.position() {
        let location = match path {
            Some(path) => format!("{path}:{pos}"),
            None => pos.to_string(),
        };
        let line_no = pos.line.to_string();
        let gutter = " ".repeat(line_no.len());
        _ = writeln!(out, "{gutter}{} {location}", p.paint(blue, "-->"));

        let source_line = match error {
            Error::Syntax(e) => Some(e.source_line.as_str()),
            _ => src.lines().nth(pos.line.saturating_sub(1) as usize),
        };
        if let Some(source_line) = source_line {
            let bar = p.paint(blue, "|");
            _ = writeln!(out, "{gutter} {bar}");
            _ = writeln!(out, "{} {bar} {source_line}", p.paint(blue, &line_no));
            let padding: String = source_line
                .chars()
                .take(pos.column.saturating_sub(1) as usize)
                .map(|c| if c == '\t' { '\t' } else { ' ' })
                .collect();
            _ = writeln!(out, "{gutter} {bar} {padding}{}", p.paint(red, "^"));
        }
    }

    if let Some(hint) = suggestion(error.message()) {
        _ = writeln!(
            out,
            "{} {hint}",
            p.paint(Style::new(Color::Green).bold(), "possible fix:")
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::{LexError, SemanticError, SyntaxError},
        token::Position,
    };
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_render_syntax_error() {
        let error = Error::Syntax(SyntaxError {
            message: "expected `;` after number `5`".into(),
            pos: Position::new(1, 15),
            source_line: "var x: int8 = 5".into(),
        });
        let rendered = render(&error, "var x: int8 = 5\n", Some("main.fl"), false);
        let expected = indoc! {"
            ╭─────────────────────────────────────────────╮
            │ syntax error: expected `;` after number `5` │
            ╰─────────────────────────────────────────────╯
             --> main.fl:1:15
              |
            1 | var x: int8 = 5
              |               ^
            possible fix: add a `;` at the end of the statement
        "};
        assert_eq!(rendered, expected);
    }

    #[test]
    fn test_render_semantic_error_uses_source_text() {
        let error = Error::Semantic(SemanticError::at(
            Position::new(2, 5),
            "cannot assign to `x`: it is constant",
        ));
        let rendered = render(&error, "const x = 1;\n    x = 2;\n", None, false);
        assert!(rendered.contains(" --> 2:5\n"), "{rendered}");
        assert!(rendered.contains("2 |     x = 2;\n"), "{rendered}");
        assert!(rendered.contains("  |     ^\n"), "{rendered}");
        assert!(rendered.ends_with("possible fix: declare it with `var` instead of `const`\n"));
    }

    #[test]
    fn test_render_without_position() {
        let error = Error::Semantic(SemanticError::new("nothing to see"));
        let rendered = render(&error, "", None, false);
        assert_eq!(rendered.lines().count(), 3);
        assert!(!rendered.contains("-->"));
    }

    #[test]
    fn test_colored_render_has_escapes() {
        let error = Error::Lex(LexError {
            message: "unterminated string literal".into(),
            pos: Position::new(1, 1),
        });
        assert!(render(&error, "\"abc", None, true).contains('\u{1b}'));
    }

    #[test]
    fn test_suggestions() {
        assert_eq!(
            suggestion("value 300 is out of bounds for int8 [-128, 127]"),
            Some("use a wider type, or convert explicitly with `as`")
        );
        assert_eq!(suggestion("something else entirely"), None);
    }
}
