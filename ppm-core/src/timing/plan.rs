//! Frame phase model: one code in, three delays out.

use super::{CODE_MAX, Code, CycleCount, FrameTiming, TimingConfig};

/// Delays for one frame: `min_gap` → pulse → `code_delay` → pulse → `frame_completion`.
///
/// For any feasible configuration
/// `min_gap + code_delay + frame_completion + pulse_overhead == cycles_per_frame`.
/// Rounding only ever lands in `frame_completion`.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct FramePlan {
    pub code: Code,
    pub min_gap: CycleCount,
    pub code_delay: CycleCount,
    pub frame_completion: CycleCount,
    pub pulse_overhead: CycleCount,
    /// `frame_completion` had to be clamped to zero; this frame runs long.
    pub overrun: bool,
}

impl FramePlan {
    /// Sum of all phases plus overhead.
    #[must_use]
    pub const fn total(&self) -> u64 {
        self.min_gap as u64
            + self.code_delay as u64
            + self.frame_completion as u64
            + self.pulse_overhead as u64
    }
}

/// Plans one frame directly from a configuration.
#[must_use]
pub fn plan(code: Code, config: &TimingConfig) -> FramePlan {
    plan_with(code, &config.derive())
}

/// Plans one frame from pre-derived timing; this is the per-frame hot path.
#[must_use]
pub fn plan_with(code: Code, timing: &FrameTiming) -> FramePlan {
    let scaled = u64::from(code.get()) * u64::from(timing.available) / u64::from(CODE_MAX);
    let code_delay = timing
        .min_gap
        .saturating_add(CycleCount::try_from(scaled).unwrap_or(CycleCount::MAX));

    let spent = u64::from(timing.min_gap) + u64::from(code_delay) + u64::from(timing.pulse_overhead);
    let (frame_completion, overrun) = match u64::from(timing.cycles_per_frame).checked_sub(spent) {
        Some(rest) => (CycleCount::try_from(rest).unwrap_or(CycleCount::MAX), false),
        None => (0, true),
    };

    FramePlan {
        code,
        min_gap: timing.min_gap,
        code_delay,
        frame_completion,
        pulse_overhead: timing.pulse_overhead,
        overrun,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silence_keeps_minimum_separation() {
        let frame = plan(Code::ZERO, &TimingConfig::default());
        assert_eq!(frame.min_gap, 399);
        assert_eq!(frame.code_delay, 399);
        assert_eq!(frame.frame_completion, 2770 - 399 - 399 - 4);
        assert!(!frame.overrun);
    }

    #[test]
    fn full_scale_consumes_every_spare_cycle() {
        let frame = plan(Code::MAX, &TimingConfig::default());
        assert_eq!(frame.code_delay, 399 + 1968);
        assert_eq!(frame.frame_completion, 0);
        assert!(!frame.overrun);
        assert_eq!(frame.total(), 2770);
    }

    #[test]
    fn midpoint_scales_linearly() {
        let frame = plan(Code::new(512), &TimingConfig::default());
        assert_eq!(frame.code_delay, 399 + 984);
    }

    #[test]
    fn infeasible_config_marks_overrun() {
        let config = TimingConfig::new(133_000_000, 200_000);
        let frame = plan(Code::ZERO, &config);
        assert_eq!(frame.code_delay, frame.min_gap);
        assert_eq!(frame.frame_completion, 0);
        assert!(frame.overrun);
    }
}
