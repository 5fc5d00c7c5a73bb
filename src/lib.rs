/// The lexer takes the source input, mapping it into a sequence of tokens.
pub mod lexer;

/// The parser takes a sequence of tokens, mapping it into an AST. Names are
/// resolved against a symbol table as declarations are seen.
pub mod parser;

/// The code generator walks the AST, checks its semantics and lowers it into
/// textual LLVM IR.
pub mod codegen;

pub mod ast;
pub mod bigint;
pub mod bounds;
pub mod error;
pub mod stdlib;
pub mod token;
pub mod types;

pub mod util {
    pub mod fmt;
    #[cfg(test)]
    pub(crate) mod test_utils;
}

use crate::{codegen::interface::CompileOptions, error::Result};

/// Runs the whole front end over `src`, returning the IR module text.
pub fn compile_to_ir(src: &str, options: &CompileOptions) -> Result<String> {
    let program = parser::parse_program(src)?;
    let ir = codegen::generate(&program, options)?;
    tracing::debug!(bytes = ir.len(), target = %options.target, "generated IR");
    Ok(ir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::interface::Target;

    #[test]
    fn test_compile_to_ir_uses_target_triple() {
        let options = CompileOptions {
            target: Target::aarch64_darwin,
            stdlib: true,
        };
        let ir = compile_to_ir("func main(): int32 return 0; end", &options).unwrap();
        assert!(ir.contains("target triple = \"aarch64-apple-darwin\""));
        assert!(ir.contains("define i32 @main()"));
    }

    #[test]
    fn test_no_stdlib_makes_builtins_unknown() {
        let options = CompileOptions {
            stdlib: false,
            ..CompileOptions::default()
        };
        let error = compile_to_ir("println(\"hi\");", &options).unwrap_err();
        assert_eq!(error.message(), "unknown function `println`");
    }
}
