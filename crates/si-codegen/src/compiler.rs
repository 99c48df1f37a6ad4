//! Back-end driver: writes the emitted IR to a temp file, invokes `clang` to
//! assemble and link it, then runs the produced binary and captures its
//! stdout. The temp directory is scoped to the call (or, with
//! [`CompileOptions::keep_temp`], leaked on purpose for inspection) -- no
//! state outlives one [`compile`] invocation.

use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Instant;

use si_parse::TypedModule;
use tempfile::TempDir;
use tracing::{debug, info, instrument};

use crate::codegen::emit_module;
use crate::error::{BackendError, CodegenError, RuntimeError};

/// Options controlling the back-end driver.
#[derive(Debug, Clone)]
pub struct CompileOptions {
    /// Path (or bare name on `PATH`) of the `clang` binary to invoke.
    pub clang: String,
    /// Base name for the generated `.ll` file and linked binary.
    pub basename: String,
    /// Keep the scratch directory around instead of deleting it on drop.
    pub keep_temp: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        CompileOptions {
            clang: "clang".to_string(),
            basename: "out".to_string(),
            keep_temp: false,
        }
    }
}

/// Result of running a compiled program to completion.
#[derive(Debug, Clone)]
pub struct RunResult {
    /// Path to the linked binary (inside the scratch directory unless
    /// `keep_temp` was set, in which case it outlives this call).
    pub binary_path: PathBuf,
    /// The program's captured stdout.
    pub stdout: String,
    /// Wall-clock time spent assembling and linking, in milliseconds.
    pub compile_time_ms: u64,
}

/// Lower `tm` to IR, assemble and link it with `clang`, run the binary, and
/// return its stdout. Equivalent to the teacher's `compile` followed
/// immediately by execution, since SI has no standalone "produce a binary
/// and stop" CLI mode beyond `--emit-ir`.
#[instrument(skip(tm, options))]
pub fn compile_and_run(tm: &TypedModule, options: &CompileOptions) -> Result<RunResult, CodegenError> {
    let ir = emit_module(tm)?;
    let (binary_path, compile_time_ms, dir) = assemble(&ir, options)?;
    info!(binary = %binary_path.display(), "assembled binary");
    let stdout = run_binary(&binary_path)?;
    if options.keep_temp {
        let kept = dir.into_path();
        debug!(dir = %kept.display(), "kept scratch directory");
    }
    Ok(RunResult { binary_path, stdout, compile_time_ms })
}

/// Lower `tm` to IR text only, skipping `clang` entirely. Used by the
/// `--emit-ir` CLI path and by tests that only want to inspect the generated
/// module.
pub fn compile_to_ir(tm: &TypedModule) -> Result<String, CodegenError> {
    emit_module(tm)
}

/// Write `ir` to `<tmpdir>/<basename>.ll` and invoke `clang -Werror
/// -Wno-override-module -o <bin> <ll>`. Returns the binary path, elapsed
/// time, and the owning `TempDir` (kept alive by the caller until the binary
/// has run).
fn assemble(ir: &str, options: &CompileOptions) -> Result<(PathBuf, u64, TempDir), CodegenError> {
    let dir = tempfile::tempdir()?;
    let ll_path = dir.path().join(format!("{}.ll", options.basename));
    write_ir_file(&ll_path, ir)?;
    let bin_path = dir.path().join(&options.basename);

    let started = Instant::now();
    debug!(clang = %options.clang, ll = %ll_path.display(), "invoking clang");
    let output = Command::new(&options.clang)
        .arg("-Werror")
        .arg("-Wno-override-module")
        .arg("-o")
        .arg(&bin_path)
        .arg(&ll_path)
        .output()?;
    let elapsed_ms = started.elapsed().as_millis() as u64;

    if !output.status.success() {
        return Err(CodegenError::Backend(BackendError {
            exit_code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            ir: ir.to_string(),
        }));
    }
    Ok((bin_path, elapsed_ms, dir))
}

fn write_ir_file(path: &Path, ir: &str) -> Result<(), CodegenError> {
    let mut file = std::fs::File::create(path)
        .map_err(|source| CodegenError::WriteIr { path: path.to_path_buf(), source })?;
    file.write_all(ir.as_bytes())
        .map_err(|source| CodegenError::WriteIr { path: path.to_path_buf(), source })
}

/// Run the linked binary to completion and capture its stdout. A non-zero
/// exit is surfaced as [`RuntimeError`], carrying both streams.
fn run_binary(bin_path: &Path) -> Result<String, CodegenError> {
    let output = Command::new(bin_path).output()?;
    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    if !output.status.success() {
        return Err(CodegenError::Runtime(RuntimeError {
            exit_code: output.status.code().unwrap_or(-1),
            stdout,
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        }));
    }
    Ok(stdout)
}

/// True once, cached, for the lifetime of the process: whether `clang` is
/// reachable on `PATH`. Back-end-dependent tests use this to skip rather
/// than fail in environments without a system assembler.
pub fn clang_available(clang: &str) -> bool {
    use std::sync::OnceLock;
    static CACHE: OnceLock<bool> = OnceLock::new();
    *CACHE.get_or_init(|| {
        Command::new(clang)
            .arg("--version")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_options_use_bare_clang() {
        let opts = CompileOptions::default();
        assert_eq!(opts.clang, "clang");
        assert!(!opts.keep_temp);
    }

    #[test]
    fn missing_assembler_is_reported_cleanly() {
        assert!(!clang_available("si-codegen-definitely-not-a-real-binary"));
    }
}
