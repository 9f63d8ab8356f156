//! Two-level counter representation for the generator's narrow decrement loop.

use core::fmt;

use super::CycleCount;

/// Loop width of the 5-bit inner counter.
pub const DEFAULT_SPLIT_MODULUS: u32 = 32;

const PACK_INNER_BITS: u32 = 5;
const PACK_OUTER_BITS: u32 = 26;
const PACK_OUTER_MAX: u32 = (1 << PACK_OUTER_BITS) - 1;
const PACK_PULSE_FLAG: u32 = 1 << 31;

/// `total = outer * modulus + inner` with `inner < modulus`.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct SplitCycles {
    pub outer: u32,
    pub inner: u32,
    modulus: u32,
}

impl SplitCycles {
    /// Returns the loop width this pair was split with.
    #[must_use]
    pub const fn modulus(&self) -> u32 {
        self.modulus
    }

    /// Recombines the pair into a cycle count.
    #[must_use]
    pub const fn total(&self) -> u64 {
        self.outer as u64 * self.modulus as u64 + self.inner as u64
    }

    /// Encodes the pair into one generator FIFO word.
    ///
    /// Bits 0..5 hold `inner`, bits 5..31 hold `outer`, and bit 31 requests a
    /// pulse once the delay has elapsed.
    pub const fn pack(&self, pulse_after: bool) -> Result<u32, PackError> {
        if self.modulus != DEFAULT_SPLIT_MODULUS {
            return Err(PackError::ModulusMismatch {
                modulus: self.modulus,
            });
        }
        if self.outer > PACK_OUTER_MAX {
            return Err(PackError::OuterOverflow { outer: self.outer });
        }

        let flag = if pulse_after { PACK_PULSE_FLAG } else { 0 };
        Ok(self.inner | (self.outer << PACK_INNER_BITS) | flag)
    }

    /// Decodes a FIFO word produced by [`SplitCycles::pack`].
    #[must_use]
    pub const fn unpack(word: u32) -> (Self, bool) {
        let split = Self {
            inner: word & (DEFAULT_SPLIT_MODULUS - 1),
            outer: (word >> PACK_INNER_BITS) & PACK_OUTER_MAX,
            modulus: DEFAULT_SPLIT_MODULUS,
        };
        (split, word & PACK_PULSE_FLAG != 0)
    }
}

/// Splits `total` cycles into an `(outer, inner)` pair for a loop of width `modulus`.
///
/// A zero modulus is treated as 1 so the function stays total.
#[must_use]
pub const fn split(total: CycleCount, modulus: u32) -> SplitCycles {
    let modulus = if modulus == 0 { 1 } else { modulus };
    SplitCycles {
        outer: total / modulus,
        inner: total % modulus,
        modulus,
    }
}

/// Reasons a [`SplitCycles`] cannot be encoded as a FIFO word.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PackError {
    ModulusMismatch { modulus: u32 },
    OuterOverflow { outer: u32 },
}

impl fmt::Display for PackError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PackError::ModulusMismatch { modulus } => {
                write!(f, "word format needs modulus 32, got {modulus}")
            }
            PackError::OuterOverflow { outer } => {
                write!(f, "outer count {outer} exceeds 26 bits")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_min_gap() {
        let pair = split(399, DEFAULT_SPLIT_MODULUS);
        assert_eq!(pair.outer, 12);
        assert_eq!(pair.inner, 15);
        assert_eq!(pair.total(), 399);
    }

    #[test]
    fn small_totals_have_no_outer_loops() {
        for total in 0..DEFAULT_SPLIT_MODULUS {
            let pair = split(total, DEFAULT_SPLIT_MODULUS);
            assert_eq!(pair.outer, 0);
            assert_eq!(pair.inner, total);
        }
    }

    #[test]
    fn recombination_holds_across_frame_range() {
        for total in (0..=2770).step_by(7) {
            let pair = split(total, DEFAULT_SPLIT_MODULUS);
            assert!(pair.inner < DEFAULT_SPLIT_MODULUS);
            assert_eq!(pair.total(), u64::from(total));
        }
    }

    #[test]
    fn zero_modulus_degrades_to_plain_count() {
        let pair = split(17, 0);
        assert_eq!(pair.modulus(), 1);
        assert_eq!(pair.outer, 17);
        assert_eq!(pair.inner, 0);
    }

    #[test]
    fn packed_words_keep_flag_and_counts() {
        let pair = split(2367, DEFAULT_SPLIT_MODULUS);
        let word = pair.pack(true).expect("pack");
        assert_eq!(word & 0x1f, 2367 % 32);
        assert_eq!((word >> 5) & 0x3ff_ffff, 2367 / 32);
        assert_ne!(word & (1 << 31), 0);

        let (decoded, pulse) = SplitCycles::unpack(word);
        assert_eq!(decoded, pair);
        assert!(pulse);
    }

    #[test]
    fn pack_rejects_foreign_modulus() {
        let pair = split(100, 16);
        assert_eq!(
            pair.pack(false),
            Err(PackError::ModulusMismatch { modulus: 16 })
        );
    }

    #[test]
    fn pack_rejects_outer_overflow() {
        let pair = split(u32::MAX, DEFAULT_SPLIT_MODULUS);
        assert!(matches!(
            pair.pack(false),
            Err(PackError::OuterOverflow { .. })
        ));
    }
}
