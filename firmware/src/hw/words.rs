//! FIFO word staging for the sequenced PIO program.
//!
//! The program takes one word per delay, with bit 31 asking for a pulse once
//! the delay has run out. [`WordStager`] keeps the most recent delay pending
//! so the next `emit_pulse` can fold into the same word; a delay followed by
//! another delay, or by the end of a frame, is staged on its own.

use heapless::Deque;
use ppm_core::generator::{FrameProgram, PulseGenerator, SequencedGenerator};
use ppm_core::timing::{CycleCount, DEFAULT_SPLIT_MODULUS, PackError, SplitCycles, split};

use super::program;

/// Words staged between `load_frame` and the FIFO flush; one frame needs three.
pub const STAGE_DEPTH: usize = 8;

pub struct WordStager {
    staged: Deque<u32, STAGE_DEPTH>,
    pending: Option<SplitCycles>,
    rejected_frames: u32,
}

impl WordStager {
    pub const fn new() -> Self {
        Self {
            staged: Deque::new(),
            pending: None,
            rejected_frames: 0,
        }
    }

    pub fn pop_front(&mut self) -> Option<u32> {
        self.staged.pop_front()
    }

    pub fn is_empty(&self) -> bool {
        self.staged.is_empty() && self.pending.is_none()
    }

    pub const fn rejected_frames(&self) -> u32 {
        self.rejected_frames
    }

    /// Stages the pending delay, if any, without a pulse.
    pub fn commit(&mut self) {
        if let Some(delay) = self.pending.take() {
            self.stage_split(delay, false);
        }
    }

    fn stage_split(&mut self, delay: SplitCycles, pulse_after: bool) {
        match delay.pack(pulse_after) {
            Ok(word) => {
                if self.staged.push_back(word).is_err() {
                    log_dropped_word(word);
                }
            }
            Err(err) => log_pack_error(&err),
        }
    }
}

impl Default for WordStager {
    fn default() -> Self {
        Self::new()
    }
}

impl PulseGenerator for WordStager {
    const SPLIT_MODULUS: u32 = DEFAULT_SPLIT_MODULUS;
    const PULSE_CYCLES: CycleCount = program::PULSE_CYCLES;
    const PHASE_OVERHEAD_CYCLES: CycleCount = program::PHASE_OVERHEAD_CYCLES;

    fn emit_pulse(&mut self) {
        let delay = self
            .pending
            .take()
            .unwrap_or_else(|| split(0, Self::SPLIT_MODULUS));
        self.stage_split(delay, true);
    }

    fn apply_delay(&mut self, delay: SplitCycles) {
        if let Some(previous) = self.pending.replace(delay) {
            self.stage_split(previous, false);
        }
    }
}

impl SequencedGenerator for WordStager {
    fn ready_for_frame(&self) -> bool {
        self.is_empty()
    }

    fn load_frame(&mut self, frame: &FrameProgram) {
        // Reject up front so a frame is never half staged.
        if let Err(err) = frame.words() {
            self.rejected_frames = self.rejected_frames.saturating_add(1);
            log_pack_error(&err);
            return;
        }

        self.apply_delay(frame.lead_gap);
        self.emit_pulse();
        self.apply_delay(frame.code_delay);
        self.emit_pulse();
        self.apply_delay(frame.completion);
        self.commit();
    }
}

#[cfg(target_os = "none")]
fn log_pack_error(err: &PackError) {
    defmt::error!("pio: frame rejected: {}", defmt::Display2Format(err));
}

#[cfg(not(target_os = "none"))]
fn log_pack_error(_err: &PackError) {}

#[cfg(target_os = "none")]
fn log_dropped_word(word: u32) {
    defmt::warn!("pio: staging full, word {=u32:#x} dropped", word);
}

#[cfg(not(target_os = "none"))]
fn log_dropped_word(_word: u32) {}

#[cfg(test)]
mod tests {
    use super::*;
    use ppm_core::timing::{Code, TimingConfig, plan};

    fn drain(stager: &mut WordStager) -> heapless::Vec<u32, STAGE_DEPTH> {
        let mut words = heapless::Vec::new();
        while let Some(word) = stager.pop_front() {
            words.push(word).expect("capacity");
        }
        words
    }

    #[test]
    fn frame_stages_the_packed_program() {
        let config = TimingConfig::for_generator::<WordStager>(133_000_000, 48_000);
        let frame = FrameProgram::for_generator::<WordStager>(&plan(Code::new(300), &config));
        let mut stager = WordStager::new();

        stager.load_frame(&frame);

        assert!(!stager.ready_for_frame());
        let words = drain(&mut stager);
        assert_eq!(words.as_slice(), &frame.words().expect("fits"));
        assert!(stager.ready_for_frame());
    }

    #[test]
    fn back_to_back_delays_are_staged_separately() {
        let mut stager = WordStager::new();

        stager.apply_delay(split(100, 32));
        stager.apply_delay(split(40, 32));
        stager.emit_pulse();
        stager.emit_pulse();

        let words = drain(&mut stager);
        assert_eq!(words.len(), 3);
        assert_eq!(SplitCycles::unpack(words[0]), (split(100, 32), false));
        assert_eq!(SplitCycles::unpack(words[1]), (split(40, 32), true));
        assert_eq!(SplitCycles::unpack(words[2]), (split(0, 32), true));
    }

    #[test]
    fn trailing_delay_waits_for_commit() {
        let mut stager = WordStager::new();

        stager.apply_delay(split(70, 32));
        assert!(stager.pop_front().is_none());
        assert!(!stager.is_empty());

        stager.commit();
        assert_eq!(drain(&mut stager).as_slice(), &[70]);
    }

    #[test]
    fn unpackable_frame_is_rejected_whole() {
        let huge = split(u32::MAX, 32);
        let frame = FrameProgram {
            lead_gap: split(10, 32),
            code_delay: huge,
            completion: split(10, 32),
        };
        let mut stager = WordStager::new();

        stager.load_frame(&frame);

        assert_eq!(stager.rejected_frames(), 1);
        assert!(stager.is_empty());
    }
}
