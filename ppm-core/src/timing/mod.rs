//! Frame timing primitives shared by the engine, firmware adapters, and host tooling.
//!
//! Everything here is expressed in generator clock cycles. The configuration is
//! turned into a [`FrameTiming`] once at start-up; per-frame work only runs the
//! phase model in [`plan`] and the counter split in [`split`].

use core::fmt;
use core::ops::Add;

pub mod plan;
pub mod split;

pub use plan::{FramePlan, plan, plan_with};
pub use split::{DEFAULT_SPLIT_MODULUS, PackError, SplitCycles, split};

/// Count of generator clock cycles.
pub type CycleCount = u32;

/// Largest encodable code value (inclusive).
pub const CODE_MAX: u16 = 1024;

/// Default generator clock (RP2040 system clock used by the encoder).
pub const DEFAULT_CLOCK_HZ: u32 = 133_000_000;
/// Default frame rate (audio sample rate).
pub const DEFAULT_SAMPLE_RATE_HZ: u32 = 48_000;
/// Default minimum separation between any two pulses.
pub const DEFAULT_MIN_GAP_US: u32 = 3;
/// Two minimal-width pulses at two cycles each.
pub const DEFAULT_PULSE_OVERHEAD_CYCLES: CycleCount = 4;

const MICROS_PER_SECOND: u64 = 1_000_000;

/// Sample value carried by one frame, always within `0..=CODE_MAX`.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Code(u16);

impl Code {
    pub const ZERO: Self = Self(0);
    pub const MAX: Self = Self(CODE_MAX);

    /// Builds a code, clamping anything above [`CODE_MAX`].
    #[must_use]
    pub const fn new(value: u16) -> Self {
        if value > CODE_MAX {
            Self(CODE_MAX)
        } else {
            Self(value)
        }
    }

    /// Clamps a signed request into range (negative values become zero).
    #[must_use]
    pub const fn saturating_from_i32(raw: i32) -> Self {
        if raw <= 0 {
            Self::ZERO
        } else if raw >= CODE_MAX as i32 {
            Self::MAX
        } else {
            Self(raw as u16)
        }
    }

    #[must_use]
    pub const fn get(self) -> u16 {
        self.0
    }
}

impl From<Code> for u16 {
    fn from(code: Code) -> Self {
        code.0
    }
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Monotonic instant measured in generator clock cycles.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct CycleInstant(u64);

impl CycleInstant {
    pub const ZERO: Self = Self(0);

    #[must_use]
    pub const fn from_cycles(cycles: u64) -> Self {
        Self(cycles)
    }

    #[must_use]
    pub const fn as_cycles(self) -> u64 {
        self.0
    }

    /// Converts a tick count from a clock running at `tick_hz`, rounding down.
    #[must_use]
    pub const fn from_ticks(ticks: u64, tick_hz: u32, clock_hz: u32) -> Self {
        if tick_hz == 0 {
            return Self::ZERO;
        }
        let cycles = (ticks as u128 * clock_hz as u128) / tick_hz as u128;
        Self(saturate_u64(cycles))
    }

    /// Converts to ticks of a clock running at `tick_hz`, rounding up so a
    /// timer armed with the result never fires before this instant.
    #[must_use]
    pub const fn to_ticks(self, tick_hz: u32, clock_hz: u32) -> u64 {
        if clock_hz == 0 {
            return u64::MAX;
        }
        let scaled = self.0 as u128 * tick_hz as u128;
        let ticks = scaled.div_ceil(clock_hz as u128);
        saturate_u64(ticks)
    }

    /// Cycles elapsed since `earlier`, zero if `earlier` is in the future.
    #[must_use]
    pub const fn saturating_cycles_since(self, earlier: Self) -> u64 {
        self.0.saturating_sub(earlier.0)
    }
}

impl Add<CycleCount> for CycleInstant {
    type Output = Self;

    fn add(self, rhs: CycleCount) -> Self {
        Self(self.0.saturating_add(u64::from(rhs)))
    }
}

const fn saturate_u64(value: u128) -> u64 {
    if value > u64::MAX as u128 {
        u64::MAX
    } else {
        value as u64
    }
}

/// Static timing inputs for the phase model.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct TimingConfig {
    pub clock_frequency_hz: u32,
    pub sample_rate_hz: u32,
    pub min_gap_us: u32,
    /// Fixed generator cost per frame that is not part of any delay phase.
    pub pulse_overhead_cycles: CycleCount,
}

impl TimingConfig {
    /// Creates a configuration with the default gap and pulse overhead.
    #[must_use]
    pub const fn new(clock_frequency_hz: u32, sample_rate_hz: u32) -> Self {
        Self {
            clock_frequency_hz,
            sample_rate_hz,
            min_gap_us: DEFAULT_MIN_GAP_US,
            pulse_overhead_cycles: DEFAULT_PULSE_OVERHEAD_CYCLES,
        }
    }

    #[must_use]
    pub const fn with_min_gap_us(mut self, min_gap_us: u32) -> Self {
        self.min_gap_us = min_gap_us;
        self
    }

    #[must_use]
    pub const fn with_pulse_overhead(mut self, cycles: CycleCount) -> Self {
        self.pulse_overhead_cycles = cycles;
        self
    }

    /// Derives the per-frame constants, flagging infeasible settings.
    #[must_use]
    pub fn derive(&self) -> FrameTiming {
        FrameTiming::from_config(self)
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self::new(DEFAULT_CLOCK_HZ, DEFAULT_SAMPLE_RATE_HZ)
    }
}

/// Configuration problems detected while deriving [`FrameTiming`].
///
/// None of these are fatal: the engine clamps and keeps running, and the
/// issue is surfaced once through telemetry.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ConfigIssue {
    /// Sample rate of zero; treated as 1 Hz.
    ZeroSampleRate,
    /// Frame too short for two minimum gaps plus pulse overhead.
    NoCodeRange { deficit: CycleCount },
}

impl fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigIssue::ZeroSampleRate => f.write_str("sample rate is zero"),
            ConfigIssue::NoCodeRange { deficit } => {
                write!(f, "frame is {deficit} cycles short of two gaps plus pulses")
            }
        }
    }
}

/// Per-frame constants derived from a [`TimingConfig`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct FrameTiming {
    pub clock_frequency_hz: u32,
    pub sample_rate_hz: u32,
    pub cycles_per_frame: CycleCount,
    pub min_gap: CycleCount,
    /// Cycles the code scales across (`cycles_per_frame - 2*min_gap - overhead`).
    pub available: CycleCount,
    pub pulse_overhead: CycleCount,
    /// Cycles per second lost to the integer frame division.
    pub rounding_remainder: u32,
    pub issue: Option<ConfigIssue>,
}

impl FrameTiming {
    #[must_use]
    pub fn from_config(config: &TimingConfig) -> Self {
        let mut issue = None;
        let sample_rate_hz = if config.sample_rate_hz == 0 {
            issue = Some(ConfigIssue::ZeroSampleRate);
            1
        } else {
            config.sample_rate_hz
        };

        let cycles_per_frame = config.clock_frequency_hz / sample_rate_hz;
        let rounding_remainder = config.clock_frequency_hz % sample_rate_hz;

        let min_gap_wide =
            u64::from(config.clock_frequency_hz) * u64::from(config.min_gap_us) / MICROS_PER_SECOND;
        let min_gap = CycleCount::try_from(min_gap_wide).unwrap_or(CycleCount::MAX);

        let reserved = 2 * u64::from(min_gap) + u64::from(config.pulse_overhead_cycles);
        let available = match u64::from(cycles_per_frame).checked_sub(reserved) {
            Some(value) => CycleCount::try_from(value).unwrap_or(CycleCount::MAX),
            None => {
                let deficit = reserved - u64::from(cycles_per_frame);
                if issue.is_none() {
                    issue = Some(ConfigIssue::NoCodeRange {
                        deficit: CycleCount::try_from(deficit).unwrap_or(CycleCount::MAX),
                    });
                }
                0
            }
        };

        Self {
            clock_frequency_hz: config.clock_frequency_hz,
            sample_rate_hz,
            cycles_per_frame,
            min_gap,
            available,
            pulse_overhead: config.pulse_overhead_cycles,
            rounding_remainder,
            issue,
        }
    }

    /// Frame period in cycles; never zero so it can anchor a deadline grid.
    #[must_use]
    pub const fn frame_period(&self) -> CycleCount {
        if self.cycles_per_frame == 0 {
            1
        } else {
            self.cycles_per_frame
        }
    }

    /// Frame rate actually produced by the truncated period, in millihertz.
    #[must_use]
    pub fn effective_rate_mhz(&self) -> u64 {
        u64::from(self.clock_frequency_hz) * 1_000 / u64::from(self.frame_period())
    }

    /// Deviation of the produced rate from the nominal rate, in parts per million.
    #[must_use]
    pub fn rate_error_ppm(&self) -> i64 {
        let nominal = i64::from(self.sample_rate_hz) * 1_000;
        let effective = i64::try_from(self.effective_rate_mhz()).unwrap_or(i64::MAX);
        (effective - nominal) * 1_000_000 / nominal
    }

    /// Converts a wall-clock duration in microseconds into generator cycles.
    #[must_use]
    pub fn cycles_for_micros(&self, micros: u64) -> u64 {
        micros.saturating_mul(u64::from(self.clock_frequency_hz)) / MICROS_PER_SECOND
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_pico_encoder() {
        let timing = TimingConfig::default().derive();
        assert_eq!(timing.cycles_per_frame, 2770);
        assert_eq!(timing.min_gap, 399);
        assert_eq!(timing.available, 2770 - 2 * 399 - 4);
        assert_eq!(timing.rounding_remainder, 133_000_000 % 48_000);
        assert_eq!(timing.issue, None);
    }

    #[test]
    fn truncation_error_is_reported_in_ppm() {
        let timing = TimingConfig::default().derive();
        // 133 MHz / 2770 = 48014.44 Hz
        assert_eq!(timing.effective_rate_mhz(), 48_014_440);
        assert_eq!(timing.rate_error_ppm(), 300);

        let exact = TimingConfig::new(96_000_000, 48_000).derive();
        assert_eq!(exact.rounding_remainder, 0);
        assert_eq!(exact.rate_error_ppm(), 0);
    }

    #[test]
    fn short_frames_are_flagged_not_rejected() {
        let timing = TimingConfig::new(133_000_000, 200_000).derive();
        assert_eq!(timing.cycles_per_frame, 665);
        assert_eq!(timing.available, 0);
        assert_eq!(
            timing.issue,
            Some(ConfigIssue::NoCodeRange {
                deficit: 2 * 399 + 4 - 665
            })
        );
    }

    #[test]
    fn zero_sample_rate_is_clamped() {
        let timing = TimingConfig::new(1_000, 0).derive();
        assert_eq!(timing.sample_rate_hz, 1);
        assert_eq!(timing.issue, Some(ConfigIssue::ZeroSampleRate));
    }

    #[test]
    fn codes_clamp_instead_of_wrapping() {
        assert_eq!(Code::new(5000), Code::MAX);
        assert_eq!(Code::saturating_from_i32(-7), Code::ZERO);
        assert_eq!(Code::saturating_from_i32(1025), Code::MAX);
        assert_eq!(Code::saturating_from_i32(500).get(), 500);
    }

    #[test]
    fn tick_conversion_never_rounds_early() {
        let instant = CycleInstant::from_cycles(2770);
        // 2770 cycles at 133 MHz is 20.83 us; a 1 MHz timer must wait 21 ticks.
        assert_eq!(instant.to_ticks(1_000_000, 133_000_000), 21);
        assert_eq!(
            CycleInstant::from_ticks(21, 1_000_000, 133_000_000).as_cycles(),
            2793
        );
    }
}
