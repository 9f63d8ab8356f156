//! Shared control state written by the command surface and read by the engine.
//!
//! All fields are atomics so the block can live in a `static` and be shared
//! between the REPL task and the frame task (or interrupt context) without a
//! lock. The engine reads the code exactly once per frame.

use core::fmt;
use core::time::Duration;

use portable_atomic::{AtomicBool, AtomicU16, AtomicU32, Ordering};

use crate::timing::Code;

/// Shortest accepted sweep update period (exclusive).
pub const MIN_TEST_UPDATE_PERIOD: Duration = Duration::from_millis(10);

/// Rejected sweep update periods.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PeriodError {
    /// Not strictly greater than [`MIN_TEST_UPDATE_PERIOD`].
    TooShort,
    /// Does not fit the microsecond counter.
    TooLong,
}

impl fmt::Display for PeriodError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PeriodError::TooShort => f.write_str("period must be greater than 0.010 s"),
            PeriodError::TooLong => f.write_str("period too long"),
        }
    }
}

/// Point-in-time copy of the control block.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ControlSnapshot {
    pub code: Code,
    pub test_mode: bool,
    pub test_update_period: Duration,
    pub sweep_epoch: u32,
}

pub struct ControlBlock {
    code: AtomicU16,
    test_mode: AtomicBool,
    /// Bumped on every test-mode activation so the engine can restart its sweep.
    sweep_epoch: AtomicU32,
    test_period_us: AtomicU32,
}

impl ControlBlock {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            code: AtomicU16::new(0),
            test_mode: AtomicBool::new(false),
            sweep_epoch: AtomicU32::new(0),
            test_period_us: AtomicU32::new(0),
        }
    }

    pub fn code(&self) -> Code {
        Code::new(self.code.load(Ordering::Acquire))
    }

    pub fn set_code(&self, code: Code) {
        self.code.store(code.get(), Ordering::Release);
    }

    /// Stores `next` only if the code still equals `current`.
    ///
    /// The sweep uses this so a code written by the operator between two
    /// frames is not overwritten.
    pub fn replace_code(&self, current: Code, next: Code) -> bool {
        self.code
            .compare_exchange(current.get(), next.get(), Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn test_mode(&self) -> bool {
        self.test_mode.load(Ordering::Acquire)
    }

    /// Flips test mode and returns the new state.
    pub fn toggle_test_mode(&self) -> bool {
        let enabled = !self.test_mode.fetch_xor(true, Ordering::AcqRel);
        if enabled {
            self.restart_sweep();
        }
        enabled
    }

    pub fn set_test_mode(&self, enabled: bool) {
        let was_enabled = self.test_mode.swap(enabled, Ordering::AcqRel);
        if enabled && !was_enabled {
            self.restart_sweep();
        }
    }

    pub fn sweep_epoch(&self) -> u32 {
        self.sweep_epoch.load(Ordering::Acquire)
    }

    /// Zero means the sweep steps every frame.
    pub fn test_update_period(&self) -> Duration {
        Duration::from_micros(u64::from(self.test_period_us.load(Ordering::Relaxed)))
    }

    pub fn set_test_update_period(&self, period: Duration) -> Result<(), PeriodError> {
        if period <= MIN_TEST_UPDATE_PERIOD {
            return Err(PeriodError::TooShort);
        }
        let micros = u32::try_from(period.as_micros()).map_err(|_| PeriodError::TooLong)?;
        self.test_period_us.store(micros, Ordering::Relaxed);
        Ok(())
    }

    pub fn snapshot(&self) -> ControlSnapshot {
        ControlSnapshot {
            code: self.code(),
            test_mode: self.test_mode(),
            test_update_period: self.test_update_period(),
            sweep_epoch: self.sweep_epoch(),
        }
    }

    fn restart_sweep(&self) {
        self.code.store(0, Ordering::Release);
        self.sweep_epoch.fetch_add(1, Ordering::AcqRel);
    }
}

impl Default for ControlBlock {
    fn default() -> Self {
        Self::new()
    }
}
