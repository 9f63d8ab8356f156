//! Parser for the single-line operator commands.
//!
//! ```text
//! T | t                 toggle test mode
//! C:<int> | c:<int>     set code (clamped later)
//! P:<float> | p:<float> set sweep update period in seconds
//! ```
//!
//! Whitespace is allowed around the line and after the colon. Anything else,
//! including trailing characters and integers that overflow `i32`, is rejected.

use core::fmt;

use winnow::ascii::{dec_int, float, space0};
use winnow::combinator::{alt, preceded};
use winnow::error::ContextError;
use winnow::prelude::*;
use winnow::token::one_of;

/// Parsed operator command.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Command {
    ToggleTestMode,
    /// Raw requested code before clamping.
    SetCode(i32),
    /// Requested sweep update period in seconds.
    SetTestPeriod(f32),
}

/// Line that matched no command.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ParseError<'a> {
    pub line: &'a str,
}

impl fmt::Display for ParseError<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Unrecognized command: {}", self.line)
    }
}

/// Parses one trimmed command line.
pub fn parse(line: &str) -> Result<Command, ParseError<'_>> {
    let line = line.trim();
    command().parse(line).map_err(|_| ParseError { line })
}

fn command<'a>() -> impl Parser<&'a str, Command, ContextError> {
    alt((
        one_of(['T', 't']).value(Command::ToggleTestMode),
        preceded((one_of(['C', 'c']), ':', space0), dec_int).map(Command::SetCode),
        preceded((one_of(['P', 'p']), ':', space0), float).map(Command::SetTestPeriod),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ok(input: &str) -> Command {
        parse(input).expect("command should parse")
    }

    #[test]
    fn toggle_accepts_either_case() {
        assert_eq!(parse_ok("T"), Command::ToggleTestMode);
        assert_eq!(parse_ok("t\r\n"), Command::ToggleTestMode);
    }

    #[test]
    fn code_accepts_sign_and_spacing() {
        assert_eq!(parse_ok("C:500"), Command::SetCode(500));
        assert_eq!(parse_ok("c: 12"), Command::SetCode(12));
        assert_eq!(parse_ok("C:-7"), Command::SetCode(-7));
        assert_eq!(parse_ok("  C:2000  "), Command::SetCode(2000));
    }

    #[test]
    fn period_parses_float_seconds() {
        assert_eq!(parse_ok("P:0.5"), Command::SetTestPeriod(0.5));
        assert_eq!(parse_ok("p:2"), Command::SetTestPeriod(2.0));
    }

    #[test]
    fn rejects_everything_else() {
        for line in [
            "X",
            "",
            "Tx",
            "C:",
            "C500",
            "C:12abc",
            "C:99999999999",
            "P:fast",
            "status",
        ] {
            assert_eq!(parse(line), Err(ParseError { line: line.trim() }), "{line:?}");
        }
    }

    #[test]
    fn error_text_names_the_line() {
        let err = parse("X").expect_err("unknown command");
        let mut text: heapless::String<32> = heapless::String::new();
        core::fmt::write(&mut text, format_args!("{err}")).expect("fits");
        assert_eq!(text.as_str(), "Unrecognized command: X");
    }
}
