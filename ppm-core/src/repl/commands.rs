//! Command dispatcher.
//!
//! Turns parsed commands into writes on a [`ControlSurface`] and produces the
//! acknowledgement text sent back to the operator. A rejected command never
//! touches the surface.

use core::fmt;
use core::time::Duration;

use crate::control::{ControlBlock, MIN_TEST_UPDATE_PERIOD, PeriodError};
use crate::timing::Code;

use super::grammar::{self, Command};

/// Writable side of the shared control state.
pub trait ControlSurface {
    /// Flips test mode and returns the new state.
    fn toggle_test_mode(&mut self) -> bool;

    fn set_code(&mut self, code: Code);

    fn set_test_update_period(&mut self, period: Duration) -> Result<(), PeriodError>;
}

impl ControlSurface for &ControlBlock {
    fn toggle_test_mode(&mut self) -> bool {
        ControlBlock::toggle_test_mode(self)
    }

    fn set_code(&mut self, code: Code) {
        ControlBlock::set_code(self, code);
    }

    fn set_test_update_period(&mut self, period: Duration) -> Result<(), PeriodError> {
        ControlBlock::set_test_update_period(self, period)
    }
}

/// Successful command acknowledgements.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum CommandOutcome {
    TestMode { enabled: bool },
    Code { code: Code, requested: i32 },
    Period { period: Duration },
}

impl CommandOutcome {
    /// Returns `true` when the requested code had to be clamped.
    pub fn was_clamped(&self) -> bool {
        matches!(self, CommandOutcome::Code { code, requested } if i32::from(code.get()) != *requested)
    }
}

impl fmt::Display for CommandOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandOutcome::TestMode { enabled: true } => f.write_str("Test mode enabled"),
            CommandOutcome::TestMode { enabled: false } => f.write_str("Test mode disabled"),
            CommandOutcome::Code { code, requested } => {
                write!(f, "PPM code sent: {code}")?;
                if self.was_clamped() {
                    write!(f, " (clamped from {requested})")?;
                }
                Ok(())
            }
            CommandOutcome::Period { period } => {
                write!(f, "Test update period set: {:.3} s", period.as_secs_f32())
            }
        }
    }
}

/// Rejected commands.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CommandError<'a> {
    Parse(grammar::ParseError<'a>),
    InvalidPeriod(PeriodError),
}

impl<'a> From<grammar::ParseError<'a>> for CommandError<'a> {
    fn from(error: grammar::ParseError<'a>) -> Self {
        Self::Parse(error)
    }
}

impl From<PeriodError> for CommandError<'_> {
    fn from(error: PeriodError) -> Self {
        Self::InvalidPeriod(error)
    }
}

impl fmt::Display for CommandError<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandError::Parse(err) => err.fmt(f),
            CommandError::InvalidPeriod(PeriodError::TooShort) => {
                write!(
                    f,
                    "Period must be greater than {:.3} s",
                    MIN_TEST_UPDATE_PERIOD.as_secs_f32()
                )
            }
            CommandError::InvalidPeriod(PeriodError::TooLong) => f.write_str("Period too long"),
        }
    }
}

/// Applies operator commands to a control surface.
pub struct CommandExecutor<S> {
    surface: S,
}

impl<S> CommandExecutor<S> {
    pub const fn new(surface: S) -> Self {
        Self { surface }
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    pub fn into_inner(self) -> S {
        self.surface
    }
}

impl<S: ControlSurface> CommandExecutor<S> {
    /// Parses and executes one command line.
    pub fn execute<'a>(&mut self, line: &'a str) -> Result<CommandOutcome, CommandError<'a>> {
        let command = grammar::parse(line)?;
        self.dispatch(command)
    }

    pub fn dispatch<'a>(&mut self, command: Command) -> Result<CommandOutcome, CommandError<'a>> {
        match command {
            Command::ToggleTestMode => Ok(CommandOutcome::TestMode {
                enabled: self.surface.toggle_test_mode(),
            }),
            Command::SetCode(requested) => {
                let code = Code::saturating_from_i32(requested);
                self.surface.set_code(code);
                Ok(CommandOutcome::Code { code, requested })
            }
            Command::SetTestPeriod(seconds) => {
                let period = period_from_secs(seconds)?;
                self.surface.set_test_update_period(period)?;
                Ok(CommandOutcome::Period { period })
            }
        }
    }
}

fn period_from_secs(seconds: f32) -> Result<Duration, PeriodError> {
    if seconds.is_nan() || seconds <= MIN_TEST_UPDATE_PERIOD.as_secs_f32() {
        return Err(PeriodError::TooShort);
    }
    Duration::try_from_secs_f32(seconds).map_err(|_| PeriodError::TooLong)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        toggles: u32,
        code: Option<Code>,
        period: Option<Duration>,
    }

    impl ControlSurface for Recorder {
        fn toggle_test_mode(&mut self) -> bool {
            self.toggles += 1;
            self.toggles % 2 == 1
        }

        fn set_code(&mut self, code: Code) {
            self.code = Some(code);
        }

        fn set_test_update_period(&mut self, period: Duration) -> Result<(), PeriodError> {
            self.period = Some(period);
            Ok(())
        }
    }

    fn text(value: &dyn fmt::Display) -> heapless::String<64> {
        let mut out = heapless::String::new();
        fmt::write(&mut out, format_args!("{value}")).expect("fits");
        out
    }

    #[test]
    fn code_is_clamped_and_reported() {
        let mut executor = CommandExecutor::new(Recorder::default());

        let outcome = executor.execute("C:2000").expect("code command");
        assert!(outcome.was_clamped());
        assert_eq!(executor.surface().code, Some(Code::MAX));
        assert_eq!(text(&outcome).as_str(), "PPM code sent: 1024 (clamped from 2000)");

        let outcome = executor.execute("c:-5").expect("code command");
        assert_eq!(text(&outcome).as_str(), "PPM code sent: 0 (clamped from -5)");

        let outcome = executor.execute("C:500").expect("code command");
        assert_eq!(text(&outcome).as_str(), "PPM code sent: 500");
    }

    #[test]
    fn toggle_reports_new_state() {
        let mut executor = CommandExecutor::new(Recorder::default());
        let first = executor.execute("T").expect("toggle");
        let second = executor.execute("t").expect("toggle");
        assert_eq!(text(&first).as_str(), "Test mode enabled");
        assert_eq!(text(&second).as_str(), "Test mode disabled");
    }

    #[test]
    fn short_period_is_rejected_without_writing() {
        let mut executor = CommandExecutor::new(Recorder::default());
        for line in ["P:0.01", "P:0", "P:-1", "P:nan"] {
            let err = executor.execute(line).expect_err("period too short");
            assert_eq!(err, CommandError::InvalidPeriod(PeriodError::TooShort));
            assert_eq!(text(&err).as_str(), "Period must be greater than 0.010 s");
        }
        assert_eq!(executor.surface().period, None);

        let outcome = executor.execute("P:0.5").expect("period");
        assert_eq!(text(&outcome).as_str(), "Test update period set: 0.500 s");
        assert_eq!(executor.surface().period, Some(Duration::from_millis(500)));
    }

    #[test]
    fn unknown_line_leaves_surface_untouched() {
        let mut executor = CommandExecutor::new(Recorder::default());
        let err = executor.execute("X").expect_err("unknown");
        assert!(matches!(err, CommandError::Parse(_)));
        assert_eq!(text(&err).as_str(), "Unrecognized command: X");
        assert_eq!(executor.surface().toggles, 0);
        assert_eq!(executor.surface().code, None);
    }
}
