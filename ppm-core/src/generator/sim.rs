//! Cycle-accurate software generator used by tests and the emulator.

use heapless::{HistoryBuf, OldestOrdered};

use super::{PulseGenerator, SequencedGenerator, TriggeredGenerator};
use crate::timing::{CycleInstant, SplitCycles};

/// Number of pulse start times retained.
pub const PULSE_HISTORY: usize = 64;

/// Software model of the output pin.
///
/// `now` is advanced by the driver; `cursor` marks where the queued waveform
/// ends. Delays and pulses never start before `now`, so an idle generator
/// holds the line low until the next request.
pub struct SimulatedGenerator {
    now: CycleInstant,
    cursor: CycleInstant,
    pulses: HistoryBuf<CycleInstant, PULSE_HISTORY>,
    pulse_count: u64,
    pending_completion: Option<CycleInstant>,
}

impl SimulatedGenerator {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            now: CycleInstant::ZERO,
            cursor: CycleInstant::ZERO,
            pulses: HistoryBuf::new(),
            pulse_count: 0,
            pending_completion: None,
        }
    }

    /// Moves simulated time forward; going backwards is ignored.
    pub fn advance_to(&mut self, now: CycleInstant) {
        if now > self.now {
            self.now = now;
        }
    }

    #[must_use]
    pub const fn now(&self) -> CycleInstant {
        self.now
    }

    /// Instant at which everything queued so far has been emitted.
    #[must_use]
    pub const fn busy_until(&self) -> CycleInstant {
        self.cursor
    }

    #[must_use]
    pub const fn pulse_count(&self) -> u64 {
        self.pulse_count
    }

    /// Pulse start times, oldest first.
    pub fn pulses(&self) -> OldestOrdered<'_, CycleInstant> {
        self.pulses.oldest_ordered()
    }

    /// Takes the completion instant of the last requested pulse, if any.
    pub fn take_completion(&mut self) -> Option<CycleInstant> {
        self.pending_completion.take()
    }

    fn start_point(&self) -> CycleInstant {
        if self.cursor > self.now {
            self.cursor
        } else {
            self.now
        }
    }

    fn record_pulse(&mut self) -> CycleInstant {
        let start = self.start_point();
        self.pulses.write(start);
        self.pulse_count += 1;
        self.cursor = start + Self::PULSE_CYCLES;
        self.cursor
    }
}

impl Default for SimulatedGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl PulseGenerator for SimulatedGenerator {
    fn emit_pulse(&mut self) {
        self.record_pulse();
    }

    fn apply_delay(&mut self, delay: SplitCycles) {
        let start = self.start_point();
        self.cursor = CycleInstant::from_cycles(start.as_cycles().saturating_add(delay.total()));
    }
}

impl SequencedGenerator for SimulatedGenerator {
    fn ready_for_frame(&self) -> bool {
        self.cursor <= self.now
    }
}

impl TriggeredGenerator for SimulatedGenerator {
    fn request_pulse(&mut self) {
        let done = self.record_pulse();
        self.pending_completion = Some(done);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timing::{DEFAULT_SPLIT_MODULUS, split};

    #[test]
    fn delays_and_pulses_accumulate() {
        let mut generator = SimulatedGenerator::new();
        generator.apply_delay(split(100, DEFAULT_SPLIT_MODULUS));
        generator.emit_pulse();
        generator.apply_delay(split(50, DEFAULT_SPLIT_MODULUS));
        generator.emit_pulse();

        let starts: heapless::Vec<u64, 4> = generator.pulses().map(|at| at.as_cycles()).collect();
        assert_eq!(starts.as_slice(), &[100, 152]);
        assert_eq!(generator.busy_until().as_cycles(), 154);
        assert!(!generator.ready_for_frame());

        generator.advance_to(CycleInstant::from_cycles(154));
        assert!(generator.ready_for_frame());
    }

    #[test]
    fn idle_line_waits_for_now() {
        let mut generator = SimulatedGenerator::new();
        generator.advance_to(CycleInstant::from_cycles(1_000));
        generator.request_pulse();

        assert_eq!(
            generator.take_completion(),
            Some(CycleInstant::from_cycles(1_002))
        );
        assert_eq!(generator.take_completion(), None);
        assert_eq!(generator.pulse_count(), 1);
    }
}
