//! PIO-backed implementations of the engine's generator traits.

#![cfg(target_os = "none")]

use embassy_rp::Peri;
use embassy_rp::pio::{
    Common, Config, Direction, FifoJoin, Instance, PioPin, ShiftConfig, ShiftDirection,
    StateMachine,
};
use ppm_core::generator::{FrameProgram, PulseGenerator, SequencedGenerator, TriggeredGenerator};
use ppm_core::timing::{CycleCount, SplitCycles};

use super::program;
use super::words::WordStager;

/// Marker word pushed to request one triggered pulse.
const PULSE_REQUEST: u32 = 0;

/// Sequenced generator: whole frames are streamed through the TX FIFO and
/// the state machine times every phase itself.
pub struct SequencedPio<'d, P: Instance, const SM: usize> {
    sm: StateMachine<'d, P, SM>,
    words: WordStager,
    primed: bool,
}

impl<'d, P: Instance, const SM: usize> SequencedPio<'d, P, SM> {
    pub fn new(
        common: &mut Common<'d, P>,
        mut sm: StateMachine<'d, P, SM>,
        pin: Peri<'d, impl PioPin>,
    ) -> Self {
        let loaded = common.load_program(&program::sequenced());
        let pin = common.make_pio_pin(pin);

        let mut config = Config::default();
        config.use_program(&loaded, &[&pin]);
        config.shift_out = ShiftConfig {
            threshold: 32,
            direction: ShiftDirection::Right,
            auto_fill: false,
        };
        config.fifo_join = FifoJoin::TxOnly;

        sm.set_config(&config);
        sm.set_pin_dirs(Direction::Out, &[&pin]);
        sm.set_enable(true);

        Self {
            sm,
            words: WordStager::new(),
            primed: false,
        }
    }

    /// Moves staged words into the TX FIFO, waiting for space as needed.
    ///
    /// A delay still waiting for its pulse is committed first.
    pub async fn flush(&mut self) {
        self.words.commit();
        while let Some(word) = self.words.pop_front() {
            self.sm.tx().wait_push(word).await;
        }
    }

    /// Returns `true` if the state machine ran out of words since the last call.
    ///
    /// The very first pull always waits for data and is not counted.
    pub fn take_stall(&mut self) -> bool {
        let stalled = self.sm.tx().stalled();
        if self.primed {
            stalled
        } else {
            self.primed = true;
            false
        }
    }

    pub const fn rejected_frames(&self) -> u32 {
        self.words.rejected_frames()
    }
}

impl<P: Instance, const SM: usize> PulseGenerator for SequencedPio<'_, P, SM> {
    const SPLIT_MODULUS: u32 = <WordStager as PulseGenerator>::SPLIT_MODULUS;
    const PULSE_CYCLES: CycleCount = <WordStager as PulseGenerator>::PULSE_CYCLES;
    const PHASE_OVERHEAD_CYCLES: CycleCount =
        <WordStager as PulseGenerator>::PHASE_OVERHEAD_CYCLES;

    fn emit_pulse(&mut self) {
        self.words.emit_pulse();
    }

    fn apply_delay(&mut self, delay: SplitCycles) {
        self.words.apply_delay(delay);
    }
}

impl<P: Instance, const SM: usize> SequencedGenerator for SequencedPio<'_, P, SM> {
    fn ready_for_frame(&self) -> bool {
        self.words.ready_for_frame()
    }

    fn load_frame(&mut self, frame: &FrameProgram) {
        self.words.load_frame(frame);
    }
}

/// Triggered generator: one pulse per request, completion signalled on IRQ 0.
pub struct TriggeredPio<'d, P: Instance, const SM: usize> {
    sm: StateMachine<'d, P, SM>,
}

impl<'d, P: Instance, const SM: usize> TriggeredPio<'d, P, SM> {
    pub fn new(
        common: &mut Common<'d, P>,
        mut sm: StateMachine<'d, P, SM>,
        pin: Peri<'d, impl PioPin>,
    ) -> Self {
        let loaded = common.load_program(&program::triggered());
        let pin = common.make_pio_pin(pin);

        let mut config = Config::default();
        config.use_program(&loaded, &[&pin]);

        sm.set_config(&config);
        sm.set_pin_dirs(Direction::Out, &[&pin]);
        sm.set_enable(true);

        Self { sm }
    }
}

impl<P: Instance, const SM: usize> TriggeredGenerator for TriggeredPio<'_, P, SM> {
    fn request_pulse(&mut self) {
        if !self.sm.tx().try_push(PULSE_REQUEST) {
            defmt::warn!("pio: pulse request dropped, FIFO full");
        }
    }
}
