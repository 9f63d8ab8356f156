//! Event loops that drive a [`FrameEngine`] against [`SimulatedGenerator`].
//!
//! These mirror the firmware tasks but jump simulated time straight to the
//! next interesting instant instead of sleeping.

use super::{EdgeAction, FrameEngine, FrameRecord, SequencedPoll};
use crate::generator::sim::SimulatedGenerator;
use crate::timing::CycleInstant;

/// Runs `frames` frames through the sequenced path, calling `observe` after each.
///
/// Returns the number of frames completed; fewer than requested means the
/// engine is stopped.
pub fn run_sequenced<F>(
    engine: &mut FrameEngine<'_, CycleInstant>,
    generator: &mut SimulatedGenerator,
    frames: u32,
    mut observe: F,
) -> u32
where
    F: FnMut(&FrameRecord<CycleInstant>),
{
    let mut completed = 0;
    while completed < frames {
        match engine.poll_sequenced(generator.now(), generator) {
            SequencedPoll::Loaded { .. } => {
                let end = generator.busy_until();
                generator.advance_to(end);
                engine.complete_sequenced(end);
                if let Some(record) = engine.last_frame() {
                    observe(&record);
                }
                completed += 1;
            }
            SequencedPoll::Wait(deadline) => generator.advance_to(deadline),
            SequencedPoll::GeneratorBusy => generator.advance_to(generator.busy_until()),
            SequencedPoll::Idle | SequencedPoll::Busy => break,
        }
    }
    completed
}

/// Runs `frames` frames through the triggered path, calling `observe` after each.
pub fn run_triggered<F>(
    engine: &mut FrameEngine<'_, CycleInstant>,
    generator: &mut SimulatedGenerator,
    frames: u32,
    mut observe: F,
) -> u32
where
    F: FnMut(&FrameRecord<CycleInstant>),
{
    let mut completed = 0;
    while completed < frames {
        if let Some(done) = generator.take_completion() {
            generator.advance_to(done);
            if let EdgeAction::FrameComplete(_) = engine.on_pulse_complete(done) {
                if let Some(record) = engine.last_frame() {
                    observe(&record);
                }
                completed += 1;
            }
            continue;
        }

        let Some(wake) = engine.next_wakeup() else {
            break;
        };
        generator.advance_to(wake);
        engine.on_timer(generator.now(), generator);
    }
    completed
}
