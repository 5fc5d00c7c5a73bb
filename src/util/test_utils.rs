use crate::{
    codegen::{self, interface::CompileOptions},
    error::Error,
    parser,
    util::fmt::tree,
};

/// Formats an error the way the tree tests expect: `line:column: message`,
/// or just the message when there is no position.
pub fn format_error(error: &Error) -> String {
    match error.position() {
        Some(pos) => format!("{pos}: {}", error.message()),
        None => error.message().to_owned(),
    }
}

/// Each variant contains the input.
pub enum Test {
    ParserProgram(&'static str),
    ParserExpr(&'static str),
    CodegenProgram(&'static str),
}

pub enum Assertion {
    TreeOk(&'static str),
    /// Every fragment must appear in the output, in order.
    IrContains(&'static [&'static str]),
    ExpectedErrors(&'static [&'static str]),
}

/// Runs the pipeline up to the stage named by `test`, returning the rendered
/// output (AST tree or IR) and the formatted errors.
#[track_caller]
pub fn run_pipeline(test: Test) -> (String, Vec<String>) {
    let (output, error) = match test {
        Test::ParserProgram(input) => match parser::parse_program(input) {
            Ok(program) => (tree::print_program_string(&program), None),
            Err(error) => (String::new(), Some(error)),
        },
        Test::ParserExpr(input) => match parser::parse_expr(input) {
            Ok(expr) => (tree::print_expr_string(&expr), None),
            Err(error) => (String::new(), Some(error)),
        },
        Test::CodegenProgram(input) => {
            let options = CompileOptions::default();
            match parser::parse_program(input).and_then(|p| codegen::generate(&p, &options)) {
                Ok(ir) => (ir, None),
                Err(error) => (String::new(), Some(error)),
            }
        }
    };
    (output, error.iter().map(format_error).collect())
}

#[track_caller]
pub fn run_assertion(assertion: Assertion, actual_output: &str, actual_errors: &[String]) {
    match assertion {
        Assertion::TreeOk(expected_tree) => {
            let expected_errors: &[&str] = &[];
            ::pretty_assertions::assert_eq!(actual_errors, expected_errors);
            ::pretty_assertions::assert_eq!(actual_output.trim(), expected_tree.trim());
        }
        Assertion::IrContains(fragments) => {
            let expected_errors: &[&str] = &[];
            ::pretty_assertions::assert_eq!(actual_errors, expected_errors);
            let mut rest = actual_output;
            for fragment in fragments {
                let Some(at) = rest.find(fragment) else {
                    panic!("missing IR fragment {fragment:?} in:\n{actual_output}");
                };
                rest = &rest[at + fragment.len()..];
            }
        }
        Assertion::ExpectedErrors(expected_errors) => {
            ::pretty_assertions::assert_eq!(actual_errors, expected_errors);
        }
    }
}

macro_rules! tree_tests {
    (
        use $test_kind:ident;

        $(
            fn $test_name:ident() {
                let $source_kind:ident = $source:expr;
                $($assertions_tt:tt)*
            }
        )*
    ) => {
        $(
            #[test]
            fn $test_name() {
                let test: crate::util::test_utils::Test =
                    tree_tests!(@@get_test($test_kind, $source_kind), $source);
                let (actual_output, actual_errors) =
                    crate::util::test_utils::run_pipeline(test);
                let ctx = (&actual_output, &actual_errors);
                tree_tests!(@@expand_assertions, ctx, [$($assertions_tt)*]);
            }
        )*
    };

    (@@expand_assertions, $ctx:expr, []) => {};
    (@@expand_assertions, $ctx:expr, [
        let $assertion:ident = $assertion_expected:expr;
        $($rest_assertions_tt:tt)*
    ]) => {
        crate::util::test_utils::run_assertion(
            tree_tests!(@@assertion, $assertion, $assertion_expected),
            $ctx.0,
            $ctx.1,
        );
        tree_tests!(@@expand_assertions, $ctx, [$($rest_assertions_tt)*]);
    };

    (@@assertion, tree_ok, $expected:expr) => {
        crate::util::test_utils::Assertion::TreeOk(::indoc::indoc! { $expected })
    };
    (@@assertion, ir_contains, $expected:expr) => {
        crate::util::test_utils::Assertion::IrContains($expected)
    };
    (@@assertion, expected_errors, $expected:expr) => {
        crate::util::test_utils::Assertion::ExpectedErrors($expected)
    };

    (@@get_test(parser, program), $source:expr) => {
        crate::util::test_utils::Test::ParserProgram($source)
    };
    (@@get_test(parser, expr), $source:expr) => {
        crate::util::test_utils::Test::ParserExpr($source)
    };
    (@@get_test(codegen, program), $source:expr) => {
        crate::util::test_utils::Test::CodegenProgram($source)
    };
}
pub(crate) use tree_tests;
