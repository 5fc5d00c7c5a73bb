use std::{path::Path, process::Command};

use anyhow::{Context, Result};
use flint::{
    codegen::interface::Target,
    error::{BackendError, Error},
};
use tracing::debug;

/// Compiles the IR file at `ir` into the executable `out_exe` with clang.
pub fn link_exe(ir: &Path, out_exe: &Path, target: &Target, stdlib: bool) -> Result<()> {
    let clang = which::which("clang")
        .map_err(|_| backend("clang was not found in PATH; it is needed to build executables"))?;

    let mut cmd = Command::new(&clang);
    cmd.arg("-x")
        .arg("ir")
        .arg(ir)
        .arg("-o")
        .arg(out_exe)
        .arg(format!("--target={}", target.triple()))
        .arg("-Wno-override-module");
    if stdlib {
        cmd.arg("-lm");
    }
    debug!(?cmd, "linking");

    let output = cmd
        .output()
        .with_context(|| format!("failed to run {}", clang.display()))?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(backend(format!("clang failed: {}", stderr.trim())));
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = std::fs::metadata(out_exe)?.permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(out_exe, perms)?;
    }
    Ok(())
}

/// Runs the built executable, returning its exit status as a process code.
pub fn run_exe(exe: &Path) -> Result<u8> {
    // A bare file name would otherwise be looked up in PATH.
    let exe = if exe.is_relative() && exe.parent().is_none_or(|p| p.as_os_str().is_empty()) {
        Path::new(".").join(exe)
    } else {
        exe.to_path_buf()
    };
    debug!(exe = %exe.display(), "running");
    let status = Command::new(&exe)
        .status()
        .with_context(|| format!("failed to run {}", exe.display()))?;
    Ok(status
        .code()
        .and_then(|code| u8::try_from(code).ok())
        .unwrap_or(1))
}

fn backend(message: impl Into<String>) -> anyhow::Error {
    Error::from(BackendError::new(message)).into()
}
