//! External tool invocation: GNU `as` for assembly and `gcc` for
//! linking against the `libcdd` runtime. These subprocesses are the only
//! trust boundary the compiler crosses; temporary `.s` and `.o` files
//! are named deterministically from the output path.

use std::path::Path;
use std::process::Command;

use anyhow::{bail, Context, Result};
use log::debug;

/// Development-tree locations probed for `libcdd.so` before falling back
/// to the system library path.
const LIBCDD_CANDIDATES: &[&str] = &[".", "../build", "build"];

/// Assemble `asm_file` and link the object against libcdd into
/// `output_file`.
pub fn assemble_and_link(asm_file: &str, output_file: &str) -> Result<()> {
    let obj_file = match asm_file.rfind('.') {
        Some(dot) => format!("{}.o", &asm_file[..dot]),
        None => format!("{}.o", asm_file),
    };

    debug!("assembling {} -> {}", asm_file, obj_file);
    let status = Command::new("as")
        .args(["-o", &obj_file, asm_file])
        .output()
        .context("failed to run 'as'")?;
    if !status.status.success() {
        bail!(
            "assembler failed on {}: {}",
            asm_file,
            String::from_utf8_lossy(&status.stderr)
        );
    }

    let mut cmd = Command::new("gcc");
    cmd.args(["-o", output_file, &obj_file, "-no-pie"]);
    if let Some(dir) = find_libcdd_dir() {
        cmd.arg(format!("-L{}", dir));
        cmd.arg(format!("-Wl,-rpath,{}", dir));
    }
    cmd.arg("-lcdd");

    debug!("linking {} -> {}", obj_file, output_file);
    let status = cmd.output().context("failed to run 'gcc'")?;
    if !status.status.success() {
        bail!(
            "linker failed for {}: {}",
            output_file,
            String::from_utf8_lossy(&status.stderr)
        );
    }
    Ok(())
}

fn find_libcdd_dir() -> Option<&'static str> {
    LIBCDD_CANDIDATES
        .iter()
        .copied()
        .find(|dir| Path::new(dir).join("libcdd.so").exists())
}
