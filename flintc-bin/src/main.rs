use std::{
    fs,
    io::{self, IsTerminal, Write},
    path::{Path, PathBuf},
    process::ExitCode,
};

use anyhow::{Context, Result};
use clap::Parser;
use flint::{
    codegen::interface::{CompileOptions, Target},
    error::Error,
    lexer, parser,
    util::fmt::{error, tree},
};
use tracing::{info, Level};
use yansi::{Color, Style};

mod link;

/// Compiles a Flint source file into a native executable.
#[derive(Parser, Debug)]
#[command(name = "flintc", version, about, long_about = None)]
struct Cli {
    /// Source file to compile.
    input: PathBuf,

    /// Output executable. Defaults to the source file name without its
    /// extension.
    #[arg(short, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Target triple handed to the backend.
    #[arg(long, value_name = "TRIPLE", default_value_t = Target::host())]
    target: Target,

    /// Print the generated IR to stdout.
    #[arg(long)]
    ir: bool,

    /// Print the token stream and stop.
    #[arg(long)]
    tokens: bool,

    /// Print the syntax tree and stop.
    #[arg(long)]
    ast: bool,

    /// Write the IR to `<output>.ll` and stop before linking.
    #[arg(long)]
    emit_ir_only: bool,

    /// Keep the `.ll` file next to the executable.
    #[arg(long)]
    keep_ir: bool,

    /// Run the executable once it is built.
    #[arg(long)]
    run: bool,

    /// Print progress lines for every stage.
    #[arg(long)]
    verbose: bool,

    /// Leave standard library names unresolved and do not link libm.
    #[arg(long)]
    no_stdlib: bool,
}

impl Cli {
    fn output(&self) -> PathBuf {
        match &self.output {
            Some(output) => output.clone(),
            None if self.input.extension().is_some() => self.input.with_extension(""),
            None => self.input.with_extension("out"),
        }
    }

    fn ir_path(&self) -> PathBuf {
        self.output().with_extension("ll")
    }

    fn options(&self) -> CompileOptions {
        CompileOptions {
            target: self.target.clone(),
            stdlib: !self.no_stdlib,
        }
    }
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            _ = err.print();
            // `--help` and `--version` come through here too.
            return if err.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    tracing_subscriber::fmt()
        .with_max_level(if cli.verbose { Level::DEBUG } else { Level::WARN })
        .with_writer(io::stderr)
        .with_target(false)
        .without_time()
        .init();

    let src = match read_source(&cli.input) {
        Ok(src) => src,
        Err(err) => {
            report(&err, "", &cli.input);
            return ExitCode::FAILURE;
        }
    };

    match execute(&cli, &src) {
        Ok(code) => code,
        Err(err) => {
            report(&err, &src, &cli.input);
            ExitCode::FAILURE
        }
    }
}

fn read_source(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

fn execute(cli: &Cli, src: &str) -> Result<ExitCode> {
    let mut stdout = io::stdout().lock();

    if cli.tokens {
        let tokens = lexer::lex(src).map_err(Error::from)?;
        info!("lexed {} tokens", tokens.len());
        for token in &tokens {
            writeln!(stdout, "{}\t{token}", token.pos)?;
        }
    }
    if cli.ast {
        let program = parser::parse_program(src)?;
        info!("parsed {} top-level statements", program.statements.len());
        tree::print_program(&mut stdout, &program)?;
    }
    if cli.tokens || cli.ast {
        return Ok(ExitCode::SUCCESS);
    }

    let ir = flint::compile_to_ir(src, &cli.options())?;
    info!("generated IR for {}", cli.target);
    if cli.ir {
        stdout.write_all(ir.as_bytes())?;
    }

    let ir_path = cli.ir_path();
    write_output(&ir_path, &ir)?;
    info!("wrote IR to {}", ir_path.display());
    if cli.emit_ir_only {
        return Ok(ExitCode::SUCCESS);
    }

    let output = cli.output();
    let linked = link::link_exe(&ir_path, &output, &cli.target, !cli.no_stdlib);
    if !cli.keep_ir {
        _ = fs::remove_file(&ir_path);
    }
    linked?;
    info!("built {}", output.display());

    if cli.run {
        let code = link::run_exe(&output)?;
        return Ok(ExitCode::from(code));
    }
    Ok(ExitCode::SUCCESS)
}

fn write_output(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    fs::write(path, contents).with_context(|| format!("failed to write {}", path.display()))
}

fn report(err: &anyhow::Error, src: &str, path: &Path) {
    let colored = io::stderr().is_terminal();
    match err.downcast_ref::<Error>() {
        Some(err) => {
            let path = path.display().to_string();
            eprint!("{}", error::render(err, src, Some(&path), colored));
        }
        None => {
            let label = Style::new(Color::Red).bold().paint("error:");
            if colored {
                eprintln!("{label} {err:#}");
            } else {
                eprintln!("error: {err:#}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use assert_cmd::Command;
    use predicates::prelude::*;
    use tempfile::tempdir;

    fn flintc() -> Command {
        Command::cargo_bin("flintc").unwrap()
    }

    #[test]
    fn prints_tokens() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("main.fl");
        fs::write(&input, "var x = 1;\n").unwrap();

        flintc()
            .arg("--tokens")
            .arg(&input)
            .assert()
            .success()
            .stdout(predicate::str::contains("1:1\tVAR"))
            .stdout(predicate::str::contains("1:5\tIDENTIFIER(\"x\")"))
            .stdout(predicate::str::contains("1:9\tNUMBER(\"1\")"));
    }

    #[test]
    fn prints_ast() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("main.fl");
        fs::write(&input, "func main(): int32\n  return 0;\nend\n").unwrap();

        flintc()
            .arg("--ast")
            .arg(&input)
            .assert()
            .success()
            .stdout(predicate::str::contains("func main("));
    }

    #[test]
    fn emits_ir_file_only() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("main.fl");
        let output = dir.path().join("build").join("out.ll");
        fs::write(&input, "func main(): int32\n  return 7;\nend\n").unwrap();

        flintc()
            .arg("--emit-ir-only")
            .arg("-o")
            .arg(&output)
            .arg(&input)
            .assert()
            .success();

        let ir = fs::read_to_string(&output).unwrap();
        assert!(ir.contains("define i32 @main()"));
        assert!(ir.contains("ret i32 7"));
    }

    #[test]
    fn prints_ir_with_requested_target() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("main.fl");
        fs::write(&input, "println(\"hi\");\n").unwrap();

        flintc()
            .args(["--ir", "--emit-ir-only", "--target", "aarch64-apple-darwin"])
            .arg(&input)
            .assert()
            .success()
            .stdout(predicate::str::contains(
                "target triple = \"aarch64-apple-darwin\"",
            ))
            .stdout(predicate::str::contains("call void @flint.println("));
        assert!(dir.path().join("main.ll").exists());
    }

    #[test]
    fn reports_syntax_errors() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("bad.fl");
        fs::write(&input, "func main(\n").unwrap();

        flintc()
            .arg(&input)
            .assert()
            .code(1)
            .stderr(predicate::str::contains("syntax error"))
            .stderr(predicate::str::contains("-->"));
    }

    #[test]
    fn no_stdlib_rejects_builtins() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("main.fl");
        fs::write(&input, "println(\"hi\");\n").unwrap();

        flintc()
            .args(["--no-stdlib", "--emit-ir-only"])
            .arg(&input)
            .assert()
            .code(1)
            .stderr(predicate::str::contains("unknown function `println`"));
    }

    #[test]
    fn missing_file_fails() {
        let dir = tempdir().unwrap();

        flintc()
            .arg(dir.path().join("nope.fl"))
            .assert()
            .code(1)
            .stderr(predicate::str::contains("failed to read"));
    }

    #[test]
    fn unknown_flag_fails_with_one() {
        flintc().arg("--bogus").arg("x.fl").assert().code(1);
    }

    #[test]
    fn prints_version() {
        flintc()
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("flintc"));
    }
}
