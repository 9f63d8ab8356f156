//! PIO programs for both generator variants and their cycle accounting.
//!
//! The sequenced program consumes one FIFO word per delay phase in the
//! packed `SplitCycles` format: bits 0..5 are spun in a single-cycle loop,
//! bits 5..31 in a 32-cycle loop, and bit 31 requests a pulse once the
//! delay has elapsed. The triggered program emits one pulse per FIFO word
//! and raises IRQ 0 when it is done.

use ppm_core::timing::{CycleCount, DEFAULT_SPLIT_MODULUS, SplitCycles};

/// Instruction memory of one PIO block.
pub const PROGRAM_SIZE: usize = 32;

/// Cycles occupied by one pulse (`nop side 1`, `nop side 0`).
pub const PULSE_CYCLES: CycleCount = 2;

/// Fixed cost of one sequenced phase: `pull`, two `out`s, the final outer
/// test, `mov`, the inner loop exit, the flag `out` and its branch.
pub const PHASE_OVERHEAD_CYCLES: CycleCount = 8;

/// Count loaded by `set y, 28` in the outer loop body.
pub const OUTER_SPIN: u32 = 28;

/// One outer iteration: `jmp x--`, `set`, the spin, `jmp check`.
pub const OUTER_ITERATION_CYCLES: u32 = 1 + 1 + (OUTER_SPIN + 1) + 1;

/// Per-frame cost of the sequenced program outside the delay counts. The lead
/// gap and code delay words are packed short by `PHASE_OVERHEAD_CYCLES`, so
/// only the completion phase's fixed cost remains.
pub const SEQUENCED_FRAME_OVERHEAD: CycleCount = 2 * PULSE_CYCLES + PHASE_OVERHEAD_CYCLES;

/// Per-frame cost of the triggered program; delays are timed by the CPU.
pub const TRIGGERED_FRAME_OVERHEAD: CycleCount = 2 * PULSE_CYCLES;

pub type Program = pio::Program<PROGRAM_SIZE>;

pub fn sequenced() -> Program {
    pio::pio_asm!(
        ".side_set 1 opt"
        ".wrap_target"
        "next_word:"
            "pull block side 0"
            "out isr, 5"
            "out x, 26"
        "check:"
            "jmp x-- outer"
            "mov y, isr"
        "inner:"
            "jmp y-- inner"
            "out y, 1"
            "jmp !y next_word"
            "nop side 1"
            "nop side 0"
        ".wrap"
        "outer:"
            "set y, 28"
        "spin:"
            "jmp y-- spin"
            "jmp check"
    )
    .program
}

pub fn triggered() -> Program {
    pio::pio_asm!(
        ".side_set 1 opt"
        ".wrap_target"
            "pull block side 0"
            "nop side 1"
            "nop side 0"
            "irq 0"
        ".wrap"
    )
    .program
}

/// Cycles the sequenced program spends on one FIFO word.
pub const fn word_cycles(word: u32) -> u64 {
    let (delay, pulse) = SplitCycles::unpack(word);
    let pulse_cycles = if pulse { PULSE_CYCLES } else { 0 };
    delay.outer as u64 * OUTER_ITERATION_CYCLES as u64
        + delay.inner as u64
        + PHASE_OVERHEAD_CYCLES as u64
        + pulse_cycles as u64
}

const _: () = assert!(OUTER_ITERATION_CYCLES == DEFAULT_SPLIT_MODULUS);
