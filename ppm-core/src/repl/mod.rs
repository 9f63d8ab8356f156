//! Operator console shared between firmware and emulator targets.
//!
//! [`line`] assembles bytes into lines, [`grammar`] parses them with `winnow`,
//! and [`commands`] applies the result to the control block.

use core::fmt;

pub mod commands;
pub mod grammar;
pub mod line;

pub use commands::{CommandError, CommandExecutor, CommandOutcome, ControlSurface};
pub use line::{Feed, LineBuffer, MAX_LINE_LEN};

/// Writes a command result framed as `\r\n<text>\r\n`.
pub fn write_response<W: fmt::Write>(
    out: &mut W,
    result: &Result<CommandOutcome, CommandError<'_>>,
) -> fmt::Result {
    match result {
        Ok(outcome) => write!(out, "\r\n{outcome}\r\n"),
        Err(err) => write!(out, "\r\n{err}\r\n"),
    }
}
