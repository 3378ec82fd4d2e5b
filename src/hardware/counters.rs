//! Live counters: the microsecond timer and the chained PWM reference counter.
//!
//! The fast slice counts rising edges of the reference on its B input and toggles its A
//! output once per wrap. The A output is jumpered to the slow slice's B input so the slow
//! slice counts the fast wraps. Together they form a counter of modulus
//! `fast_wrap * slow_wrap`.
use embedded_hal::pwm::SetDutyCycle;

use super::{hal, read_register};
use crate::{
    design_parameters::{
        memory_map::{pwm_register, PWM_CTR, TIMERAWH, TIMERAWL},
        wrap_compare, FAST_SLICE, SLOW_SLICE,
    },
    observation::CounterPair,
};

/// The 64 bit microsecond timer.
#[derive(Copy, Clone, Debug, Default)]
pub struct Timer;

impl CounterPair for Timer {
    fn high(&self) -> u32 {
        unsafe { read_register(TIMERAWH) }
    }

    fn low(&self) -> u32 {
        unsafe { read_register(TIMERAWL) }
    }
}

/// The chained PWM counters, slow slice high, fast slice low.
#[derive(Copy, Clone, Debug)]
pub struct CounterChain {
    slow: u32,
    fast: u32,
}

impl Default for CounterChain {
    fn default() -> Self {
        Self {
            slow: pwm_register(SLOW_SLICE, PWM_CTR),
            fast: pwm_register(FAST_SLICE, PWM_CTR),
        }
    }
}

impl CounterPair for CounterChain {
    fn high(&self) -> u32 {
        unsafe { read_register(self.slow) }
    }

    fn low(&self) -> u32 {
        unsafe { read_register(self.fast) }
    }
}

pub type Slices = hal::pwm::Slices;

pub type ReferenceInput =
    hal::gpio::Pin<hal::gpio::bank0::Gpio1, hal::gpio::FunctionNull, hal::gpio::PullDown>;
pub type WrapOutput =
    hal::gpio::Pin<hal::gpio::bank0::Gpio0, hal::gpio::FunctionNull, hal::gpio::PullDown>;
pub type WrapInput =
    hal::gpio::Pin<hal::gpio::bank0::Gpio3, hal::gpio::FunctionNull, hal::gpio::PullDown>;

/// Configure and start the counter chain.
///
/// # Args
/// * `slices` - The PWM slices, taken out of reset.
/// * `pins` - Reference input, fast wrap output and slow count input.
/// * `fast_wrap` - Modulus of the fast counter.
/// * `slow_wrap` - Modulus of the slow counter.
pub fn start(
    slices: Slices,
    pins: (ReferenceInput, WrapOutput, WrapInput),
    fast_wrap: u32,
    slow_wrap: u32,
) -> CounterChain {
    let (reference, output, input) = pins;

    let mut fast = slices.pwm0.into_mode::<hal::pwm::CountRisingEdge>();
    fast.set_div_int(1);
    fast.set_top((fast_wrap - 1) as u16);
    fast.channel_b.input_from(reference);
    fast.channel_a.output_to(output);
    fast.channel_a
        .set_duty_cycle(wrap_compare(fast_wrap))
        .unwrap_or_else(|e| match e {});

    let mut slow = slices.pwm1.into_mode::<hal::pwm::CountRisingEdge>();
    slow.set_div_int(1);
    slow.set_top((slow_wrap - 1) as u16);
    slow.channel_b.input_from(input);

    slow.enable();
    fast.enable();
    log::info!("Counter chain {} x {} started", fast_wrap, slow_wrap);
    CounterChain::default()
}
