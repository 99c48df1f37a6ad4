//! Command-line driver for the SI compiler.
//!
//! Runs the full pipeline -- lex, parse, resolve, type-check, lower to IR,
//! assemble with `clang`, run the produced binary -- on a single source
//! file, relaying its stdout on success and a diagnostic on failure.

use std::path::PathBuf;
use std::process;

use clap::Parser as ClapParser;
use thiserror::Error;
use tracing::{error, info, instrument};

use si_codegen::{clang_available, compile_and_run, compile_to_ir, CodegenError, CompileOptions};
use si_parse::{check_module, lex, transform_module, ParseError, Parser as SiParser, ResolveError, TypeError};

/// SI compiler: compile and run a single `.si` source file.
#[derive(ClapParser)]
#[command(name = "sic", about = "SI compiler")]
struct Cli {
    /// Path to the source file to compile and run.
    source: PathBuf,

    /// `clang` binary to invoke as the assembler/linker.
    #[arg(long, default_value = "clang")]
    clang: String,

    /// Keep the scratch directory (IR file and binary) instead of deleting it.
    #[arg(long)]
    keep_temp: bool,

    /// Print the generated LLVM IR to stdout instead of assembling and running it.
    #[arg(long)]
    emit_ir: bool,
}

/// Unifies every stage's error taxonomy behind the one thing the binary
/// actually needs: a message for stderr and an exit code.
#[derive(Debug, Error)]
enum CliError {
    #[error("failed to read '{path}': {source}")]
    ReadSource { path: PathBuf, source: std::io::Error },
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error(transparent)]
    Type(#[from] TypeError),
    #[error(transparent)]
    Codegen(#[from] CodegenError),
    #[error("'{0}' not found on PATH")]
    AssemblerMissing(String),
}

impl CliError {
    fn exit_code(&self) -> i32 {
        match self {
            CliError::ReadSource { .. } => 4,
            CliError::Parse(_) | CliError::Resolve(_) | CliError::Type(_) => 1,
            CliError::AssemblerMissing(_) => 2,
            CliError::Codegen(e) => match e {
                CodegenError::Backend(_) => 2,
                CodegenError::Runtime(_) => 3,
                CodegenError::Io(_) | CodegenError::WriteIr { .. } => 4,
                CodegenError::Resolve(_) | CodegenError::TypeCheck(_) | CodegenError::IRInvariant(_) => 1,
            },
        }
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    match run(&cli) {
        Ok(stdout) => {
            print!("{stdout}");
            process::exit(0);
        }
        Err(e) => {
            if let CliError::Codegen(CodegenError::Runtime(rt)) = &e {
                print!("{}", rt.stdout);
            }
            error!(error = %e, "compilation failed");
            eprintln!("error: {e}");
            process::exit(e.exit_code());
        }
    }
}

#[instrument(skip(cli), fields(source = %cli.source.display()))]
fn run(cli: &Cli) -> Result<String, CliError> {
    let src = std::fs::read_to_string(&cli.source)
        .map_err(|source| CliError::ReadSource { path: cli.source.clone(), source })?;
    let file_name = cli
        .source
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("<source>");

    let (_file, toks) = lex(file_name, &src)?;
    let module = SiParser::new(&toks).parse_module()?;
    let tm = transform_module(&module)?;
    check_module(&tm)?;
    info!("front end passed: lex, parse, resolve, type-check");

    if cli.emit_ir {
        return Ok(compile_to_ir(&tm)?);
    }

    if !clang_available(&cli.clang) {
        return Err(CliError::AssemblerMissing(cli.clang.clone()));
    }

    let options = CompileOptions {
        clang: cli.clang.clone(),
        basename: "out".to_string(),
        keep_temp: cli.keep_temp,
    };
    let result = compile_and_run(&tm, &options)?;
    info!(binary = %result.binary_path.display(), ms = result.compile_time_ms, "compiled and ran");
    Ok(result.stdout)
}
