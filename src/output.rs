use std::fmt::Write as _;
use std::path::Path;

use colored::{ColoredString, Colorize};

use crate::state::Registers;

#[derive(Clone, Copy, Debug)]
pub enum MsgColor {
    Green,
    Cyan,
    Red,
}

/// Print an operator status line, unless running with minimal output.
///
/// Always goes to stderr, so it never mixes with what the program itself writes.
pub fn message(color: MsgColor, left: &str, right: &str) {
    if crate::env::is_minimal() {
        return;
    }
    eprintln!("{} {right}", status_word(color, left));
}

pub fn file_message(color: MsgColor, left: &str, right: &Path) {
    let right = format!("target {}", right.display());
    message(color, left, &right);
}

fn status_word(color: MsgColor, left: &str) -> ColoredString {
    let left = format!("{left:>12}");
    match color {
        MsgColor::Green => left.green(),
        MsgColor::Cyan => left.cyan(),
        MsgColor::Red => left.red(),
    }
}

/// Render the register file, as a table or as plain lines suited for blackbox tests.
pub fn format_registers(reg: &Registers, minimal: bool) -> String {
    let mut out = String::new();
    if minimal {
        for i in 0..8 {
            let _ = writeln!(out, "R{} {}", i, reg.get(i));
        }
        let _ = writeln!(out, "PC {}", reg.pc);
        let _ = writeln!(out, "CC {:03b}", reg.flag as u8);
        return out;
    }

    out.push_str("\x1b[2m┌───────────────────────────────┐\x1b[0m\n");
    out.push_str("\x1b[2m│        \x1b[3mhex     int    uint\x1b[0m\x1b[2m   │\x1b[0m\n");
    for i in 0..8 {
        let val = reg.get(i);
        let _ = writeln!(
            out,
            "\x1b[2m│\x1b[0m \x1b[1mR{i}\x1b[0m  0x{val:04x}  {:-6}  {val:-6}  \x1b[2m│\x1b[0m",
            val as i16,
        );
    }
    let _ = writeln!(
        out,
        "\x1b[2m│\x1b[0m \x1b[1mPC\x1b[0m  0x{:04x}      \x1b[1mCC\x1b[0m  {}       \x1b[2m│\x1b[0m",
        reg.pc, reg.flag,
    );
    out.push_str("\x1b[2m└───────────────────────────────┘\x1b[0m\n");
    out
}
