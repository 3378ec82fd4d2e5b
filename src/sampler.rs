//! Sources of [Sample]s.
//!
//! # Design
//! The production path is the [DmaSampler]: the DMA gather copies the eight counter words
//! into a [ResultBuffer] within a few hundred nanoseconds of the PPS edge and the sampler only
//! picks them up. The [DirectSampler] reads the same registers in the same order with the CPU.
//! Interrupt latency and bus contention make its samples jitter by microseconds so it is only
//! useful for bring-up and diagnostics.
//!
//! A consumed [ResultBuffer] is tainted by overwriting the slow counter words and the last
//! fast counter word with [SENTINEL]. None of them can legitimately hold that value, so a buffer
//! that still carries any of them has not been (completely) refilled by the gather.
use core::sync::atomic::{fence, AtomicU32, Ordering};

use crate::{
    design_parameters::SENTINEL,
    observation::CounterPair,
    sample::Sample,
};

/// A source of samples.
pub trait Sampler {
    /// Take the next sample, `None` if there is no new one.
    fn collect(&mut self) -> Option<Sample>;
}

/// Word index of the first slow counter read.
pub const B1: usize = 4;
/// Word index of the first fast counter read.
pub const A1: usize = 5;
/// Word index of the second slow counter read.
pub const B2: usize = 6;
/// Word index of the second fast counter read, the last word gathered.
pub const A2: usize = 7;

/// Destination of the DMA gather.
#[repr(C, align(32))]
pub struct ResultBuffer {
    words: [AtomicU32; 8],
}

impl Default for ResultBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl ResultBuffer {
    /// A tainted buffer.
    pub const fn new() -> Self {
        Self {
            words: [const { AtomicU32::new(SENTINEL) }; 8],
        }
    }

    /// Bus address of a word, the gather's write target.
    pub fn address(&self, index: usize) -> u32 {
        self.words[index].as_ptr() as usize as u32
    }

    /// Store a word the way the gather does.
    pub fn store(&self, index: usize, value: u32) {
        self.words[index].store(value, Ordering::Relaxed);
    }

    pub fn words(&self) -> [u32; 8] {
        // Order w.r.t. the DMA writes.
        fence(Ordering::SeqCst);
        core::array::from_fn(|i| self.words[i].load(Ordering::Relaxed))
    }

    /// Whether the gather has filled the buffer since the last [ResultBuffer::taint].
    pub fn is_fresh(&self) -> bool {
        fence(Ordering::SeqCst);
        [B1, B2, A2]
            .iter()
            .all(|&i| self.words[i].load(Ordering::Relaxed) != SENTINEL)
    }

    /// Mark the contents as consumed.
    pub fn taint(&self) {
        for i in [B1, B2, A2] {
            self.words[i].store(SENTINEL, Ordering::Relaxed);
        }
        fence(Ordering::SeqCst);
    }
}

/// Samples gathered by the DMA chain.
pub struct DmaSampler<'a> {
    buffer: &'a ResultBuffer,
    count_scale: u64,
}

impl<'a> DmaSampler<'a> {
    pub fn new(buffer: &'a ResultBuffer, count_scale: u64) -> Self {
        Self {
            buffer,
            count_scale,
        }
    }

    pub fn is_fresh(&self) -> bool {
        self.buffer.is_fresh()
    }
}

impl Sampler for DmaSampler<'_> {
    fn collect(&mut self) -> Option<Sample> {
        if !self.buffer.is_fresh() {
            return None;
        }
        let words = self.buffer.words();
        self.buffer.taint();
        Some(Sample::from_words(&words, self.count_scale))
    }
}

/// Samples read by the CPU.
///
/// Reads the timer pair and then the counter pair, each twice, in gather order.
pub struct DirectSampler<T, C> {
    timer: T,
    counter: C,
    count_scale: u64,
}

impl<T: CounterPair, C: CounterPair> DirectSampler<T, C> {
    pub fn new(timer: T, counter: C, count_scale: u64) -> Self {
        Self {
            timer,
            counter,
            count_scale,
        }
    }
}

impl<T: CounterPair, C: CounterPair> Sampler for DirectSampler<T, C> {
    fn collect(&mut self) -> Option<Sample> {
        let timer = self.timer.read();
        let counter = self.counter.read();
        Some(Sample::new(timer, counter, self.count_scale))
    }
}
