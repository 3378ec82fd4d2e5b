use crate::{design_parameters::TIME_SCALE, observation::RawCounterPair};

/// One PPS referenced reading of the reference counter and the microsecond timer.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Sample {
    /// Microseconds since power-up.
    pub time: u64,
    /// Composite reference count, modulo the counter chain's wrap.
    pub count: u64,
    /// Timer words `th1, tl1, th2, tl2`.
    pub timer: RawCounterPair,
    /// Slow/fast counter words `b1, a1, b2, a2`.
    pub counter: RawCounterPair,
}

impl Sample {
    pub fn new(timer: RawCounterPair, counter: RawCounterPair, count_scale: u64) -> Self {
        Self {
            time: timer.reduce(TIME_SCALE),
            count: counter.reduce(count_scale),
            timer,
            counter,
        }
    }

    /// Build from the eight gathered words in gather order
    /// `th1, tl1, th2, tl2, b1, a1, b2, a2`.
    pub fn from_words(words: &[u32; 8], count_scale: u64) -> Self {
        let [th1, tl1, th2, tl2, b1, a1, b2, a2] = *words;
        Self::new(
            RawCounterPair {
                hi1: th1,
                lo1: tl1,
                hi2: th2,
                lo2: tl2,
            },
            RawCounterPair {
                hi1: b1,
                lo1: a1,
                hi2: b2,
                lo2: a2,
            },
            count_scale,
        )
    }

    /// The raw words in gather order.
    pub fn words(&self) -> [u32; 8] {
        let (t, c) = (self.timer, self.counter);
        [t.hi1, t.lo1, t.hi2, t.lo2, c.hi1, c.lo1, c.hi2, c.lo2]
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn gather_order() {
        let words = [7, 0xffff_fff0, 8, 3, 100, 49_990, 101, 5];
        let s = Sample::from_words(&words, 50_000);
        assert_eq!(s.time, 7 * TIME_SCALE + 0xffff_fff0);
        assert_eq!(s.count, 100 * 50_000 + 49_990);
        assert_eq!(s.words(), words);
    }
}
