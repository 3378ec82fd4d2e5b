//! Chained DMA gather of the counter words on each PPS edge.
//!
//! # Design
//! Three channels cooperate without any CPU involvement:
//!
//! * `trigger` is paced by the PIO RX FIFO (DREQ). The edge detector pushes the value `2`
//!   into the FIFO and `trigger` copies it into `control`'s `AL1_TRANS_COUNT_TRIG`, which
//!   starts `control` with a transfer count of two words.
//! * `control` walks the list of [ControlBlock]s. Each block is two words written to
//!   `gather`'s `AL2_READ_ADDR` and `AL2_WRITE_ADDR_TRIG` (a write ring of 8 bytes keeps it on
//!   these two registers). The second write starts `gather`.
//! * `gather` copies the single word and chains back to `control` for the next block.
//!
//! The list is terminated by a null block. Writing zero to a trigger register does not start
//! `gather` but raises its (otherwise quiet) interrupt. The interrupt handler re-arms the chain
//! by resetting `control`'s read address to the start of the list.
//!
//! The gather order `TH1, TL1, TH2, TL2, B1, A1, B2, A2` is fixed: each counter pair is read
//! high, low, high, low so that it can be reduced without rollover ambiguity.
use arbitrary_int::{u4, u6};
use bitbybit::{bitenum, bitfield};
use core::cell::Cell;
use embassy_sync::blocking_mutex::{raw::CriticalSectionRawMutex, Mutex};

use crate::{
    design_parameters::memory_map::{self, DMA_BASE, DMA_CHANNEL_STRIDE, DMA_INTE0},
    sampler::ResultBuffer,
};

/// Number of DMA channels.
pub const CHANNELS: u8 = 12;

/// Channel register offsets including the trigger aliases.
pub mod register {
    pub const READ_ADDR: u32 = 0x00;
    pub const WRITE_ADDR: u32 = 0x04;
    pub const TRANS_COUNT: u32 = 0x08;
    pub const CTRL_TRIG: u32 = 0x0c;
    pub const AL1_CTRL: u32 = 0x10;
    pub const AL1_READ_ADDR: u32 = 0x14;
    pub const AL1_WRITE_ADDR: u32 = 0x18;
    pub const AL1_TRANS_COUNT_TRIG: u32 = 0x1c;
    pub const AL2_CTRL: u32 = 0x20;
    pub const AL2_TRANS_COUNT: u32 = 0x24;
    pub const AL2_READ_ADDR: u32 = 0x28;
    pub const AL2_WRITE_ADDR_TRIG: u32 = 0x2c;
    pub const AL3_CTRL: u32 = 0x30;
    pub const AL3_WRITE_ADDR: u32 = 0x34;
    pub const AL3_TRANS_COUNT: u32 = 0x38;
    pub const AL3_READ_ADDR_TRIG: u32 = 0x3c;
}

/// Bus address of a channel register.
pub const fn channel_register(channel: u8, offset: u32) -> u32 {
    DMA_BASE + channel as u32 * DMA_CHANNEL_STRIDE + offset
}

#[bitenum(u2, exhaustive = true)]
#[derive(Debug, PartialEq)]
pub enum DataSize {
    Byte = 0,
    HalfWord = 1,
    Word = 2,
    Reserved = 3,
}

/// `CHx_CTRL_TRIG`
#[bitfield(u32, default = 0)]
#[derive(Debug, PartialEq)]
pub struct ChannelConfig {
    #[bit(0, rw)]
    en: bool,
    #[bit(1, rw)]
    high_priority: bool,
    #[bits(2..=3, rw)]
    data_size: DataSize,
    #[bit(4, rw)]
    incr_read: bool,
    #[bit(5, rw)]
    incr_write: bool,
    /// log2 of the ring size in bytes, 0 is off
    #[bits(6..=9, rw)]
    ring_size: u4,
    /// Ring on the write (true) or read (false) address
    #[bit(10, rw)]
    ring_sel: bool,
    /// Chaining to the channel itself disables chaining
    #[bits(11..=14, rw)]
    chain_to: u4,
    #[bits(15..=20, rw)]
    treq_sel: u6,
    /// Interrupt only on null triggers
    #[bit(21, rw)]
    irq_quiet: bool,
    #[bit(22, rw)]
    bswap: bool,
    #[bit(23, rw)]
    sniff_en: bool,
    #[bit(24, r)]
    busy: bool,
}

/// Transfer request source.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Dreq {
    PioTx { pio: u8, sm: u8 },
    PioRx { pio: u8, sm: u8 },
    PwmWrap(u8),
    /// Unpaced
    Permanent,
}

impl Dreq {
    pub fn raw(self) -> u6 {
        u6::new(match self {
            Self::PioTx { pio, sm } => (pio & 1) * 8 + (sm & 3),
            Self::PioRx { pio, sm } => (pio & 1) * 8 + 4 + (sm & 3),
            Self::PwmWrap(slice) => 0x18 + (slice & 7),
            Self::Permanent => 0x3f,
        })
    }
}

/// A claimable set of DMA channels.
pub struct ChannelPool {
    claimed: Mutex<CriticalSectionRawMutex, Cell<u16>>,
}

impl Default for ChannelPool {
    fn default() -> Self {
        Self::new()
    }
}

impl ChannelPool {
    pub const fn new() -> Self {
        Self {
            claimed: Mutex::new(Cell::new(0)),
        }
    }

    /// Claim the lowest free channel.
    pub fn claim(&self) -> Option<Channel<'_>> {
        self.claimed.lock(|claimed| {
            let mask = claimed.get();
            let index = (!mask).trailing_zeros() as u8;
            if index >= CHANNELS {
                return None;
            }
            claimed.set(mask | (1 << index));
            Some(Channel { pool: self, index })
        })
    }

    /// Bit mask of the claimed channels.
    pub fn claimed(&self) -> u16 {
        self.claimed.lock(|claimed| claimed.get())
    }
}

/// A claimed channel, released on drop.
#[derive(Debug)]
pub struct Channel<'a> {
    pool: &'a ChannelPool,
    index: u8,
}

impl core::fmt::Debug for ChannelPool {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "ChannelPool({:#05x})", self.claimed())
    }
}

impl Channel<'_> {
    pub fn index(&self) -> u8 {
        self.index
    }

    pub fn register(&self, offset: u32) -> u32 {
        channel_register(self.index, offset)
    }

    fn num(&self) -> u4 {
        u4::new(self.index)
    }
}

impl Drop for Channel<'_> {
    fn drop(&mut self) {
        let bit = 1 << self.index;
        self.pool.claimed.lock(|claimed| claimed.set(claimed.get() & !bit));
    }
}

/// A single descriptor: the next source and destination of `gather`.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[repr(C)]
pub struct ControlBlock {
    pub read: u32,
    pub write: u32,
}

/// The gather descriptor list, eight words plus the null terminator.
#[derive(Debug, PartialEq, Eq)]
#[repr(C, align(8))]
pub struct ControlBlocks {
    pub blocks: [ControlBlock; 9],
}

/// Source registers in gather order for a counter chain.
pub fn gather_sources(fast_slice: u8, slow_slice: u8) -> [u32; 8] {
    use memory_map::{pwm_register, PWM_CTR, TIMERAWH, TIMERAWL};
    let slow = pwm_register(slow_slice, PWM_CTR);
    let fast = pwm_register(fast_slice, PWM_CTR);
    [TIMERAWH, TIMERAWL, TIMERAWH, TIMERAWL, slow, fast, slow, fast]
}

impl ControlBlocks {
    pub fn new(sources: &[u32; 8], buffer: &ResultBuffer) -> Self {
        let mut blocks = [ControlBlock::default(); 9];
        for (i, (block, &read)) in blocks.iter_mut().zip(sources.iter()).enumerate() {
            *block = ControlBlock {
                read,
                write: buffer.address(i),
            };
        }
        Self { blocks }
    }

    pub fn address(&self) -> u32 {
        self.blocks.as_ptr() as usize as u32
    }
}

/// A register store.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RegisterWrite {
    pub address: u32,
    pub value: u32,
}

impl RegisterWrite {
    fn new(address: u32, value: u32) -> Self {
        Self { address, value }
    }
}

/// The three channels of the gather chain.
#[derive(Debug)]
pub struct Topology<'a> {
    pub trigger: Channel<'a>,
    pub control: Channel<'a>,
    pub gather: Channel<'a>,
}

impl<'a> Topology<'a> {
    /// Claim three channels, `None` if the pool is exhausted.
    pub fn claim(pool: &'a ChannelPool) -> Option<Self> {
        Some(Self {
            trigger: pool.claim()?,
            control: pool.claim()?,
            gather: pool.claim()?,
        })
    }

    pub fn trigger_config(&self, dreq: Dreq) -> ChannelConfig {
        ChannelConfig::new_with_raw_value(0)
            .with_en(true)
            .with_data_size(DataSize::Word)
            .with_chain_to(self.trigger.num())
            .with_treq_sel(dreq.raw())
            .with_irq_quiet(true)
    }

    pub fn control_config(&self) -> ChannelConfig {
        ChannelConfig::new_with_raw_value(0)
            .with_en(true)
            .with_high_priority(true)
            .with_data_size(DataSize::Word)
            .with_incr_read(true)
            .with_incr_write(true)
            .with_ring_size(u4::new(3))
            .with_ring_sel(true)
            .with_chain_to(self.control.num())
            .with_treq_sel(Dreq::Permanent.raw())
            .with_irq_quiet(true)
    }

    pub fn gather_config(&self) -> ChannelConfig {
        ChannelConfig::new_with_raw_value(0)
            .with_en(true)
            .with_high_priority(true)
            .with_data_size(DataSize::Word)
            .with_chain_to(self.control.num())
            .with_treq_sel(Dreq::Permanent.raw())
            .with_irq_quiet(true)
    }

    /// The register stores setting up the chain, in order.
    ///
    /// Only the last store (`trigger`'s `CTRL_TRIG`) starts anything.
    ///
    /// # Args
    /// * `blocks` - Address of the [ControlBlocks].
    /// * `fifo` - Address of the PIO RX FIFO.
    /// * `dreq` - The FIFO's DREQ.
    pub fn program(&self, blocks: u32, fifo: u32, dreq: Dreq) -> [RegisterWrite; 12] {
        use register::*;
        let (t, c, g) = (&self.trigger, &self.control, &self.gather);
        [
            RegisterWrite::new(g.register(READ_ADDR), 0),
            RegisterWrite::new(g.register(WRITE_ADDR), 0),
            RegisterWrite::new(g.register(TRANS_COUNT), 1),
            RegisterWrite::new(g.register(AL1_CTRL), self.gather_config().raw_value()),
            RegisterWrite::new(c.register(READ_ADDR), blocks),
            RegisterWrite::new(c.register(WRITE_ADDR), g.register(AL2_READ_ADDR)),
            RegisterWrite::new(c.register(TRANS_COUNT), 2),
            RegisterWrite::new(c.register(AL1_CTRL), self.control_config().raw_value()),
            RegisterWrite::new(t.register(READ_ADDR), fifo),
            RegisterWrite::new(t.register(WRITE_ADDR), c.register(AL1_TRANS_COUNT_TRIG)),
            RegisterWrite::new(t.register(TRANS_COUNT), u32::MAX),
            RegisterWrite::new(t.register(CTRL_TRIG), self.trigger_config(dreq).raw_value()),
        ]
    }

    /// Point `control` back to the start of the list.
    pub fn rearm(&self, blocks: u32) -> RegisterWrite {
        RegisterWrite::new(self.control.register(register::READ_ADDR), blocks)
    }

    /// `INTE0`/`INTS0` bit of the completion interrupt.
    pub fn interrupt_mask(&self) -> u32 {
        1 << self.gather.index
    }

    /// Register holding the busy flag of the gather.
    pub fn busy_register(&self) -> u32 {
        self.gather.register(register::AL1_CTRL)
    }
}

/// Whether `CTRL` reads busy.
pub fn is_busy(ctrl: u32) -> bool {
    ChannelConfig::new_with_raw_value(ctrl).busy()
}

/// `INTE0` with the completion interrupt enabled.
pub fn enable_interrupt(inte0: u32, mask: u32) -> RegisterWrite {
    RegisterWrite::new(DMA_INTE0, inte0 | mask)
}

#[cfg(test)]
mod test {
    use super::*;
    use register::*;

    #[test]
    fn pool() {
        let pool = ChannelPool::new();
        let a = pool.claim().unwrap();
        let b = pool.claim().unwrap();
        assert_eq!((a.index(), b.index()), (0, 1));
        drop(a);
        assert_eq!(pool.claimed(), 0b10);
        assert_eq!(pool.claim().unwrap().index(), 0);
        let all: heapless::Vec<_, 12> = core::iter::from_fn(|| pool.claim()).collect();
        assert_eq!(all.len(), 11);
        assert!(pool.claim().is_none());
        assert!(Topology::claim(&pool).is_none());
        drop(all);
        assert_eq!(pool.claimed(), 0b10);
    }

    #[test]
    fn topology_release() {
        let pool = ChannelPool::new();
        let held: heapless::Vec<_, 12> = (0..10).map_while(|_| pool.claim()).collect();
        // Only two channels left: nothing stays claimed.
        assert!(Topology::claim(&pool).is_none());
        assert_eq!(pool.claimed(), 0x3ff);
        drop(held);
        let t = Topology::claim(&pool).unwrap();
        assert_eq!(
            (t.trigger.index(), t.control.index(), t.gather.index()),
            (0, 1, 2)
        );
        assert_eq!(t.interrupt_mask(), 1 << 2);
    }

    #[test]
    fn configs() {
        let pool = ChannelPool::new();
        let t = Topology::claim(&pool).unwrap();
        let dreq = Dreq::PioRx { pio: 0, sm: 0 };
        assert_eq!(dreq.raw().value(), 4);
        assert_eq!(t.trigger_config(dreq).raw_value(), 0x0022_0009);
        assert_eq!(t.control_config().raw_value(), 0x003f_8cfb);
        assert_eq!(t.gather_config().raw_value(), 0x003f_880b);
        assert!(is_busy(0x0100_0000 | t.gather_config().raw_value()));
        assert!(!is_busy(t.gather_config().raw_value()));
    }

    #[test]
    fn dreq() {
        assert_eq!(Dreq::PioTx { pio: 0, sm: 0 }.raw().value(), 0);
        assert_eq!(Dreq::PioRx { pio: 1, sm: 3 }.raw().value(), 15);
        assert_eq!(Dreq::PwmWrap(0).raw().value(), 0x18);
        assert_eq!(Dreq::Permanent.raw().value(), 0x3f);
    }

    #[test]
    fn program() {
        let pool = ChannelPool::new();
        let t = Topology::claim(&pool).unwrap();
        let w = t.program(0x2000_1000, memory_map::PIO0_RXF0, Dreq::PioRx { pio: 0, sm: 0 });
        // Started last by the trigger channel
        assert_eq!(w[11].address, 0x5000_000c);
        assert!(w[..11]
            .iter()
            .all(|w| w.address & 0x3f != CTRL_TRIG && w.address & 0x3f != AL1_TRANS_COUNT_TRIG));
        assert_eq!(w[8].value, 0x5020_0020);
        // trigger -> control's transfer count trigger -> gather's read/write pair
        assert_eq!(w[9].value, 0x5000_0040 + AL1_TRANS_COUNT_TRIG);
        assert_eq!(w[5].value, 0x5000_0080 + AL2_READ_ADDR);
        assert_eq!(w[5].value % 8, 0);
        assert_eq!(w[5].value + 4, 0x5000_0080 + AL2_WRITE_ADDR_TRIG);
        assert_eq!(w[4].value, 0x2000_1000);
        assert_eq!(t.rearm(0x2000_1000), w[4]);
        assert_eq!(t.busy_register(), 0x5000_0090);
    }

    #[test]
    fn blocks() {
        let buffer = ResultBuffer::new();
        let sources = gather_sources(0, 1);
        assert_eq!(
            sources,
            [
                0x4005_4024,
                0x4005_4028,
                0x4005_4024,
                0x4005_4028,
                0x4005_001c,
                0x4005_0008,
                0x4005_001c,
                0x4005_0008
            ]
        );
        let blocks = ControlBlocks::new(&sources, &buffer);
        assert_eq!(blocks.address() % 8, 0);
        for i in 0..8 {
            assert_eq!(blocks.blocks[i].read, sources[i]);
            assert_eq!(blocks.blocks[i].write, buffer.address(i));
        }
        assert_eq!(blocks.blocks[8], ControlBlock::default());
    }
}
