//! Pulse generator capabilities.
//!
//! The engine never touches hardware directly. It talks to one of two adapter
//! shapes: a [`SequencedGenerator`] that takes a whole frame program and runs
//! it autonomously, or a [`TriggeredGenerator`] that fires one pulse per
//! request and reports each completion back. Firmware implements these on the
//! PIO block; tests and the emulator use [`sim::SimulatedGenerator`].

use core::fmt;

use crate::timing::{
    CycleCount, CycleInstant, DEFAULT_SPLIT_MODULUS, FramePlan, PackError, SplitCycles,
    TimingConfig, split,
};

pub mod sim;

/// Default cycles one minimal-width pulse occupies.
pub const DEFAULT_PULSE_CYCLES: CycleCount = 2;

/// Primitive operations every cycle-counting generator offers.
pub trait PulseGenerator {
    /// Width of the hardware decrement loop.
    const SPLIT_MODULUS: u32 = DEFAULT_SPLIT_MODULUS;
    /// Cycles one pulse occupies on the output.
    const PULSE_CYCLES: CycleCount = DEFAULT_PULSE_CYCLES;
    /// Fixed cycles every [`apply_delay`](Self::apply_delay) spends in
    /// addition to the requested count.
    const PHASE_OVERHEAD_CYCLES: CycleCount = 0;

    /// Produces one minimal-width pulse.
    fn emit_pulse(&mut self);

    /// Holds the output low for `delay.total()` cycles.
    fn apply_delay(&mut self, delay: SplitCycles);
}

/// Generator that runs an entire frame from a preloaded program.
pub trait SequencedGenerator: PulseGenerator {
    /// Returns `true` when the generator can accept another frame without blocking.
    fn ready_for_frame(&self) -> bool;

    /// Queues delay → pulse → delay → pulse → delay.
    fn load_frame(&mut self, program: &FrameProgram) {
        self.apply_delay(program.lead_gap);
        self.emit_pulse();
        self.apply_delay(program.code_delay);
        self.emit_pulse();
        self.apply_delay(program.completion);
    }
}

/// Generator that fires one pulse per request and notifies on completion.
///
/// The notification path is platform specific (PIO IRQ, simulated event) and
/// is routed to [`FrameEngine::on_pulse_complete`](crate::engine::FrameEngine::on_pulse_complete).
pub trait TriggeredGenerator {
    /// Starts a single pulse as soon as possible.
    fn request_pulse(&mut self);
}

/// Fixed per-frame cost of a generator: two pulses plus the completion
/// phase's overhead.
///
/// The lead gap and code delay are trimmed by [`FrameProgram::for_generator`]
/// instead, so the pulse spacing on the wire is exactly `code_delay`.
#[must_use]
pub const fn frame_overhead<G: PulseGenerator + ?Sized>() -> CycleCount {
    2 * G::PULSE_CYCLES + G::PHASE_OVERHEAD_CYCLES
}

impl TimingConfig {
    /// Configuration whose pulse overhead matches generator `G`.
    #[must_use]
    pub const fn for_generator<G: PulseGenerator + ?Sized>(
        clock_frequency_hz: u32,
        sample_rate_hz: u32,
    ) -> Self {
        Self::new(clock_frequency_hz, sample_rate_hz).with_pulse_overhead(frame_overhead::<G>())
    }
}

/// Adapter strategy selected at start-up.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum GeneratorMode {
    Sequenced,
    Triggered,
}

impl GeneratorMode {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            GeneratorMode::Sequenced => "sequenced",
            GeneratorMode::Triggered => "triggered",
        }
    }

    /// Parses a mode tag (`sequenced`/`a` or `triggered`/`b`).
    pub fn from_tag(tag: &str) -> Option<Self> {
        if tag.eq_ignore_ascii_case("sequenced") || tag.eq_ignore_ascii_case("a") {
            Some(Self::Sequenced)
        } else if tag.eq_ignore_ascii_case("triggered") || tag.eq_ignore_ascii_case("b") {
            Some(Self::Triggered)
        } else {
            None
        }
    }
}

impl fmt::Display for GeneratorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// The three split delays of one frame, ready for a sequenced generator.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct FrameProgram {
    pub lead_gap: SplitCycles,
    pub code_delay: SplitCycles,
    pub completion: SplitCycles,
}

impl FrameProgram {
    /// Splits the plan as-is, for a generator without phase overhead.
    #[must_use]
    pub const fn from_plan(plan: &FramePlan, modulus: u32) -> Self {
        Self::trimmed(plan, modulus, 0)
    }

    /// Splits the plan for `G`, trimming its phase overhead from the lead gap
    /// and the code delay.
    ///
    /// Gaps shorter than the overhead are stretched to it.
    #[must_use]
    pub const fn for_generator<G: PulseGenerator + ?Sized>(plan: &FramePlan) -> Self {
        Self::trimmed(plan, G::SPLIT_MODULUS, G::PHASE_OVERHEAD_CYCLES)
    }

    const fn trimmed(plan: &FramePlan, modulus: u32, phase_overhead: CycleCount) -> Self {
        Self {
            lead_gap: split(plan.min_gap.saturating_sub(phase_overhead), modulus),
            code_delay: split(plan.code_delay.saturating_sub(phase_overhead), modulus),
            completion: split(plan.frame_completion, modulus),
        }
    }

    /// Packs the program into the three FIFO words of the sequenced PIO program.
    pub const fn words(&self) -> Result<[u32; 3], PackError> {
        let lead = match self.lead_gap.pack(true) {
            Ok(word) => word,
            Err(err) => return Err(err),
        };
        let code = match self.code_delay.pack(true) {
            Ok(word) => word,
            Err(err) => return Err(err),
        };
        let tail = match self.completion.pack(false) {
            Ok(word) => word,
            Err(err) => return Err(err),
        };
        Ok([lead, code, tail])
    }
}

/// Handshake state for the edge-triggered variant.
///
/// Notifications carry no phase information, so the engine tracks which pulse
/// is outstanding. A notification that arrives while no pulse is in flight is
/// spurious and ignored.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum GeneratorState<I = CycleInstant> {
    #[default]
    FrameIdle,
    FirstPulseInFlight,
    AwaitingSecondPulse {
        due: I,
    },
    SecondPulseInFlight,
}

impl<I> GeneratorState<I> {
    /// Returns `true` while a pulse has been requested but not yet confirmed.
    pub const fn is_in_flight(&self) -> bool {
        matches!(
            self,
            GeneratorState::FirstPulseInFlight | GeneratorState::SecondPulseInFlight
        )
    }

    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            GeneratorState::FrameIdle => "frame-idle",
            GeneratorState::FirstPulseInFlight => "first-pulse",
            GeneratorState::AwaitingSecondPulse { .. } => "awaiting-second",
            GeneratorState::SecondPulseInFlight => "second-pulse",
        }
    }
}
