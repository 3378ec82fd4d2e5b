//! Rollover-free reconstruction of wide counter values from two narrow words.
//!
//! A counter that is split into a high and a low word (a hardware timer with two 32 bit
//! registers or two chained PWM counters) cannot be read atomically. Reading the pair twice,
//! `hi1, lo1, hi2, lo2`, and assuming the high word increments at most once during those four
//! reads allows reconstructing the value as of `lo1` without ambiguity.
use crate::design_parameters::TIME_SCALE;

/// Reconstruct `hi * scale + lo1` with the high word that was current when `lo1` was read.
///
/// # Args
/// * `scale` - Modulus of the low word.
/// * `hi1`, `lo1`, `hi2`, `lo2` - Two consecutive reads of the high and low words in that order.
pub fn reduce(scale: u64, hi1: u32, lo1: u32, hi2: u32, lo2: u32) -> u64 {
    let hi = if hi1 == hi2 {
        hi1
    } else if lo1 < lo2 {
        // No low wrap between the two low reads: the increment preceded `lo1`.
        hi2
    } else {
        hi1
    };
    (hi as u64).wrapping_mul(scale).wrapping_add(lo1 as u64)
}

/// Two back-to-back reads of a (high, low) counter pair.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct RawCounterPair {
    pub hi1: u32,
    pub lo1: u32,
    pub hi2: u32,
    pub lo2: u32,
}

impl RawCounterPair {
    pub fn reduce(&self, scale: u64) -> u64 {
        reduce(scale, self.hi1, self.lo1, self.hi2, self.lo2)
    }

    /// Whether the high word changed between the reads.
    pub fn rolled_over(&self) -> bool {
        self.hi1 != self.hi2
    }
}

/// A counter split into a high and a low word that can be read live.
pub trait CounterPair {
    fn high(&self) -> u32;
    fn low(&self) -> u32;

    /// Read the pair twice in the order `hi1, lo1, hi2, lo2`.
    fn read(&self) -> RawCounterPair {
        let hi1 = self.high();
        let lo1 = self.low();
        let hi2 = self.high();
        let lo2 = self.low();
        RawCounterPair { hi1, lo1, hi2, lo2 }
    }
}

/// Current microseconds since power-up from two live reads of the timer pair.
pub fn micro_time(timer: &impl CounterPair) -> u64 {
    timer.read().reduce(TIME_SCALE)
}

#[cfg(test)]
mod test {
    use super::*;
    use core::cell::Cell;
    use rand::{prelude::*, rngs::StdRng};

    #[test]
    fn vectors() {
        assert_eq!(reduce(0x10000, 100, 40, 100, 45), 100 * 0x10000 + 40);
        assert_eq!(reduce(0x10000, 100, 0xfff5, 101, 45), 100 * 0x10000 + 0xfff5);
        assert_eq!(reduce(0x10000, 100, 40, 101, 45), 101 * 0x10000 + 40);
    }

    #[test]
    fn decision_table() {
        let mut rng = StdRng::seed_from_u64(0);
        for _ in 0..10_000 {
            let scale = rng.gen_range(2..=1u64 << 32);
            let lo_max = (scale - 1).min(u32::MAX as u64) as u32;
            let hi1 = rng.gen_range(0..u32::MAX);
            let hi2 = hi1 + rng.gen_range(0..=1);
            let lo1 = rng.gen_range(0..=lo_max);
            let lo2 = rng.gen_range(0..=lo_max);
            let hi = if hi1 == hi2 || lo1 >= lo2 { hi1 } else { hi2 };
            assert_eq!(
                reduce(scale, hi1, lo1, hi2, lo2),
                (hi as u64).wrapping_mul(scale).wrapping_add(lo1 as u64)
            );
        }
    }

    /// A counter advancing by a fixed step on every register access.
    struct Ticking {
        value: Cell<u64>,
        step: u64,
        scale: u64,
    }

    impl Ticking {
        fn tick(&self) -> u64 {
            let v = self.value.get();
            self.value.set(v + self.step);
            v
        }
    }

    impl CounterPair for Ticking {
        fn high(&self) -> u32 {
            (self.tick() / self.scale) as u32
        }

        fn low(&self) -> u32 {
            (self.tick() % self.scale) as u32
        }
    }

    #[test]
    fn live_reads() {
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..10_000 {
            let scale = 50_000;
            let start = rng.gen_range(0..scale * 1000);
            let counter = Ticking {
                value: Cell::new(start),
                step: rng.gen_range(0..10),
                scale,
            };
            // `lo1` is the second access.
            let at_lo1 = start + counter.step;
            assert_eq!(counter.read().reduce(scale), at_lo1);
        }
    }

    #[test]
    fn micro_time_across_rollover() {
        let timer = Ticking {
            value: Cell::new(TIME_SCALE - 2),
            step: 1,
            scale: TIME_SCALE,
        };
        assert_eq!(micro_time(&timer), TIME_SCALE - 1);
        assert_eq!(micro_time(&timer), TIME_SCALE + 3);
    }
}
