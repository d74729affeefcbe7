use std::io;
use std::path::Path;

use miette::{miette, Diagnostic, Report, Severity};
use thiserror::Error;

/// Reasons the machine stops before reaching a `HALT`.
#[derive(Debug, Error, Diagnostic)]
pub enum RunError {
    #[error("Encountered illegal opcode {opcode:#x} in instruction {instr:#06x} at {pc:#06x}")]
    #[diagnostic(
        code(run::illegal_opcode),
        help("opcodes 0x8 (RTI) and 0xD (reserved) cannot be executed")
    )]
    IllegalOpcode { opcode: u16, instr: u16, pc: u16 },

    #[error("Failed to read keyboard input")]
    #[diagnostic(
        code(run::input),
        help("the program was waiting for a character when input closed")
    )]
    Input(#[source] io::Error),

    #[error("Failed to write program output")]
    #[diagnostic(code(run::output))]
    Output(#[source] io::Error),
}

// Loader errors

pub fn load_open(path: &Path, e: io::Error) -> Report {
    miette!(
        severity = Severity::Error,
        code = "load::open",
        help = "check that the path exists and is readable",
        "failed to load image: {}: {e}",
        path.display(),
    )
}

pub fn load_read(path: &Path, e: io::Error) -> Report {
    miette!(
        severity = Severity::Error,
        code = "load::read",
        "failed to load image: {}: {e}",
        path.display(),
    )
}

pub fn load_short(path: &Path) -> Report {
    miette!(
        severity = Severity::Error,
        code = "load::short",
        help = "an image starts with a big-endian origin word, followed by program words",
        "failed to load image: {}: file is too short to contain an origin",
        path.display(),
    )
}

pub fn load_glob(pattern: &str, reason: &str) -> Report {
    miette!(
        severity = Severity::Error,
        code = "load::glob",
        help = "quote the path if it contains `*`, `?` or `[` literally",
        "failed to load image: {pattern}: {reason}",
    )
}
