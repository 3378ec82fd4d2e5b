/// Modulus of the fast (reference clocked) PWM counter.
///
/// The counter is configured with `TOP = FAST_WRAP - 1` so that it takes exactly
/// `FAST_WRAP` values.
pub const FAST_WRAP: u32 = 50_000;

/// Modulus of the slow PWM counter that is clocked by the fast counter's wrap output.
pub const SLOW_WRAP: u32 = 50_000;

/// Modulus of the composite reference count.
///
/// The consumer adds this once whenever the composite count decreases between two samples.
pub const COUNT_WRAP: u64 = FAST_WRAP as u64 * SLOW_WRAP as u64;

/// Modulus of the low word of the microsecond timer.
pub const TIME_SCALE: u64 = 1 << 32;

/// Value written over the slow counter words after a buffer has been consumed.
///
/// The counters never exceed their wrap values, so this never appears in a DMA gather.
pub const SENTINEL: u32 = u32::MAX;

/// Capacity of the sample queue between the edge interrupt and the monitor.
pub const SAMPLE_QUEUE_DEPTH: usize = 2;

/// Number of times the edge interrupt polls the result buffer for the gather to land.
pub const MAX_WAIT_POLLS: u32 = 1000;

/// Nominal interval between PPS edges in microseconds.
pub const PPS_PERIOD_US: u64 = 1_000_000;

/// Crystal frequency of the RP2040.
pub const XOSC_HZ: u32 = 12_000_000;

/// Nominal reference (crystal) frequency of the Si5351.
pub const SI5351_REFERENCE: f64 = 25e6;

/// GPIO of the PPS input, sampled by the PIO edge detector.
pub const PPS_PIN: u8 = 2;

/// Compare level of the fast slice's A output for a counter modulus.
///
/// A is high for the upper half of the count, one rising edge per wrap.
pub const fn wrap_compare(fast_wrap: u32) -> u16 {
    (fast_wrap / 2) as u16
}

/// PWM slice counting the reference signal on its B input.
pub const FAST_SLICE: u8 = 0;

/// PWM slice counting the wraps of the fast slice.
///
/// The fast slice's A output (GPIO 0) is wired to this slice's B input (GPIO 3).
pub const SLOW_SLICE: u8 = 1;

/// RP2040 peripheral memory map used by the gather.
pub mod memory_map {
    pub const TIMER_BASE: u32 = 0x4005_4000;
    /// Raw read of the timer high word, no latching side effects
    pub const TIMERAWH: u32 = TIMER_BASE + 0x24;
    /// Raw read of the timer low word
    pub const TIMERAWL: u32 = TIMER_BASE + 0x28;

    pub const PWM_BASE: u32 = 0x4005_0000;
    pub const PWM_SLICE_STRIDE: u32 = 0x14;
    pub const PWM_CSR: u32 = 0x00;
    pub const PWM_DIV: u32 = 0x04;
    pub const PWM_CTR: u32 = 0x08;
    pub const PWM_CC: u32 = 0x0c;
    pub const PWM_TOP: u32 = 0x10;

    pub const DMA_BASE: u32 = 0x5000_0000;
    pub const DMA_CHANNEL_STRIDE: u32 = 0x40;
    pub const DMA_INTE0: u32 = DMA_BASE + 0x404;
    pub const DMA_INTS0: u32 = DMA_BASE + 0x40c;
    pub const DMA_CHAN_ABORT: u32 = DMA_BASE + 0x444;

    pub const PIO0_BASE: u32 = 0x5020_0000;
    /// RX FIFO of state machine 0, stride 4 per state machine
    pub const PIO0_RXF0: u32 = PIO0_BASE + 0x20;

    /// Address of a register of a PWM slice.
    pub const fn pwm_register(slice: u8, offset: u32) -> u32 {
        PWM_BASE + slice as u32 * PWM_SLICE_STRIDE + offset
    }
}
