//! Backend error taxonomy: IR generation, the `clang` invocation, and
//! running the produced binary are three different failure domains, each
//! with its own variant so the CLI can report them distinctly.

use si_parse::{ResolveError, TypeError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CodegenError {
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    TypeCheck(#[from] TypeError),

    #[error("internal code generation invariant violated: {0}")]
    IRInvariant(String),

    #[error("failed to write generated IR to {path}: {source}")]
    WriteIr {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

/// `clang` itself failed to assemble or link the generated IR.
#[derive(Debug, Error)]
#[error("clang failed (exit {exit_code:?}):\n{stderr}\n--- generated IR ---\n{ir}")]
pub struct BackendError {
    pub exit_code: Option<i32>,
    pub stderr: String,
    pub ir: String,
}

/// The compiled binary ran but exited non-zero.
#[derive(Debug, Error)]
#[error("program exited with status {exit_code}")]
pub struct RuntimeError {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}
