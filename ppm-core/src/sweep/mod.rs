//! Triangle-wave code generator for self-test.

use core::time::Duration;

use crate::timing::{Code, FrameTiming};

/// Upper turnaround point of the sweep.
pub const SWEEP_UPPER: u16 = 1023;
/// Lower turnaround point of the sweep.
pub const SWEEP_LOWER: u16 = 1;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Direction {
    Up,
    Down,
}

/// Bounces the code between [`SWEEP_LOWER`] and [`SWEEP_UPPER`], one step
/// every `interval` completed frames.
#[derive(Clone, Debug)]
pub struct TestSweeper {
    direction: Direction,
    interval: u32,
    countdown: u32,
}

impl TestSweeper {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            direction: Direction::Up,
            interval: 1,
            countdown: 1,
        }
    }

    pub const fn direction(&self) -> Direction {
        self.direction
    }

    pub const fn interval(&self) -> u32 {
        self.interval
    }

    /// Restarts the sweep climbing from the bottom.
    pub fn reset(&mut self) {
        self.direction = Direction::Up;
        self.countdown = self.interval;
    }

    /// Sets how many frames pass between steps (at least one).
    pub fn set_interval(&mut self, frames: u32) {
        self.interval = frames.max(1);
        self.countdown = self.countdown.min(self.interval);
    }

    /// Moves `code` one step, turning around at the bounds.
    pub fn advance(&mut self, code: Code) -> Code {
        let value = code.get();
        let stepped = match self.direction {
            Direction::Up => value.saturating_add(1),
            Direction::Down => value.saturating_sub(1),
        };

        if stepped >= SWEEP_UPPER {
            self.direction = Direction::Down;
            Code::new(SWEEP_UPPER)
        } else if stepped <= SWEEP_LOWER {
            self.direction = Direction::Up;
            Code::new(SWEEP_LOWER)
        } else {
            Code::new(stepped)
        }
    }

    /// Called once per completed frame; returns the new code on step frames.
    pub fn on_frame(&mut self, code: Code) -> Option<Code> {
        self.countdown = self.countdown.saturating_sub(1);
        if self.countdown > 0 {
            return None;
        }
        self.countdown = self.interval;
        Some(self.advance(code))
    }
}

impl Default for TestSweeper {
    fn default() -> Self {
        Self::new()
    }
}

/// Frames per sweep step for an update period; zero means every frame.
#[must_use]
pub fn frames_for(period: Duration, timing: &FrameTiming) -> u32 {
    let micros = u64::try_from(period.as_micros()).unwrap_or(u64::MAX);
    let cycles = timing.cycles_for_micros(micros);
    let frames = cycles / u64::from(timing.frame_period());
    u32::try_from(frames).unwrap_or(u32::MAX).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timing::TimingConfig;

    #[test]
    fn climbs_then_turns_at_upper_bound() {
        let mut sweeper = TestSweeper::new();
        let mut code = Code::ZERO;
        for expected in 1..=1023u16 {
            code = sweeper.advance(code);
            assert_eq!(code.get(), expected);
        }
        assert_eq!(sweeper.direction(), Direction::Down);

        code = sweeper.advance(code);
        assert_eq!(code.get(), 1022);
    }

    #[test]
    fn turns_at_lower_bound() {
        let mut sweeper = TestSweeper::new();
        let mut code = Code::new(1023);
        code = sweeper.advance(code);
        assert_eq!(sweeper.direction(), Direction::Down);

        while sweeper.direction() == Direction::Down {
            code = sweeper.advance(code);
        }
        assert_eq!(code.get(), SWEEP_LOWER);
        assert_eq!(sweeper.advance(code).get(), 2);
    }

    #[test]
    fn interval_gates_steps() {
        let mut sweeper = TestSweeper::new();
        sweeper.set_interval(3);
        sweeper.reset();

        assert_eq!(sweeper.on_frame(Code::new(10)), None);
        assert_eq!(sweeper.on_frame(Code::new(10)), None);
        assert_eq!(sweeper.on_frame(Code::new(10)), Some(Code::new(11)));
        assert_eq!(sweeper.on_frame(Code::new(11)), None);
    }

    #[test]
    fn period_converts_to_frames() {
        let timing = TimingConfig::default().derive();
        assert_eq!(frames_for(Duration::ZERO, &timing), 1);
        // 500 ms at 2770 cycles per frame
        assert_eq!(frames_for(Duration::from_millis(500), &timing), 24_007);
    }
}
