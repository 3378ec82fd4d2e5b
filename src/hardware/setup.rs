//! Beacon hardware initialization and setup.
//!
//! This file contains all of the hardware-specific configuration of the beacon: clocks, the
//! Si5351 synthesizer, the PWM counter chain, the PIO edge detector and the DMA gather.
use fugit::RateExtU32;

use super::{
    counters::{self, CounterChain, Timer},
    gather::DmaGather,
    hal::{
        self,
        clocks::init_clocks_and_plls,
        gpio::{self, FunctionI2C, FunctionPio0, PullNone, PullUp},
        pio::PIOExt,
        Sio, Watchdog,
    },
    Mono,
};
use crate::{
    design_parameters::{FAST_SLICE, PPS_PIN, SLOW_SLICE, XOSC_HZ},
    dma::{gather_sources, ChannelPool, ControlBlocks, Topology},
    pio::edge_detector,
    pipeline::{EdgeHandler, SampleChannel, SampleReceiver},
    sampler::{DirectSampler, DmaSampler, ResultBuffer},
    settings::Settings,
    status::Diagnostics,
    tones::{self, Plan},
};

/// Synthesizer output feeding the reference counter.
pub const SYNTHESIZER_OUTPUT: u8 = 0;

pub type SynthesizerI2c = hal::I2C<
    hal::pac::I2C0,
    (
        gpio::Pin<gpio::bank0::Gpio4, FunctionI2C, PullUp>,
        gpio::Pin<gpio::bank0::Gpio5, FunctionI2C, PullUp>,
    ),
>;

pub type Synthesizer = si5351::Si5351<SynthesizerI2c>;

#[derive(Debug, thiserror::Error)]
pub enum SetupError {
    #[error("Clock and PLL initialization failed")]
    Clocks,
    #[error("Synthesizer: {0}")]
    Synthesizer(#[from] si5351::Error),
    #[error("Tone plan: {0}")]
    Plan(#[from] si5351::ConfigError),
    #[error("PIO instruction memory exhausted")]
    Pio,
    #[error("Not enough free DMA channels")]
    DmaChannels,
    #[error("Setup already ran")]
    Reentered,
}

static DMA_CHANNELS: ChannelPool = ChannelPool::new();
static RESULT_BUFFER: ResultBuffer = ResultBuffer::new();
static SAMPLES: SampleChannel = SampleChannel::new();
static DIAGNOSTICS: Diagnostics = Diagnostics::new();

/// The initialized beacon.
pub struct Beacon {
    pub handler: EdgeHandler<'static, DmaGather>,
    pub receiver: SampleReceiver<'static>,
    pub diagnostics: &'static Diagnostics,
    pub direct: DirectSampler<Timer, CounterChain>,
    pub synthesizer: Synthesizer,
    /// The configuration currently applied to [SYNTHESIZER_OUTPUT].
    pub config: si5351::Config,
    pub plan: Plan,
    pub settings: Settings,
}

/// Configure the beacon hardware.
///
/// # Args
/// * `device` - The RP2040 peripherals.
/// * `settings` - Validated settings.
pub fn setup(mut device: hal::pac::Peripherals, settings: Settings) -> Result<Beacon, SetupError> {
    // Logging first so that all later errors are visible.
    {
        // The gather runs without the CPU, so logging may mask interrupts.
        let channels = rtt_target::rtt_init_default!();
        // Note(unsafe): The closure runs `f` inside a critical section as demanded.
        unsafe {
            rtt_target::set_print_channel_cs(
                channels.up.0,
                &((|arg, f| cortex_m::interrupt::free(|_| f(arg)))
                    as rtt_target::CriticalSectionFunc),
            );
        }

        static LOGGER: rtt_logger::RTTLogger =
            rtt_logger::RTTLogger::new(log::LevelFilter::Info);
        log::set_logger(&LOGGER)
            .map(|()| log::set_max_level(log::LevelFilter::Trace))
            .map_err(|_| SetupError::Reentered)?;
        log::info!("Starting");
    }

    let mut watchdog = Watchdog::new(device.WATCHDOG);
    let clocks = init_clocks_and_plls(
        XOSC_HZ,
        device.XOSC,
        device.CLOCKS,
        device.PLL_SYS,
        device.PLL_USB,
        &mut device.RESETS,
        &mut watchdog,
    )
    .map_err(|_| SetupError::Clocks)?;

    // The watchdog tick set up above clocks the timer at 1 MHz.
    Mono::start(device.TIMER, &device.RESETS);

    let sio = Sio::new(device.SIO);
    let pins = gpio::Pins::new(
        device.IO_BANK0,
        device.PADS_BANK0,
        sio.gpio_bank0,
        &mut device.RESETS,
    );

    // Synthesizer
    let sda: gpio::Pin<_, FunctionI2C, PullUp> = pins.gpio4.reconfigure();
    let scl: gpio::Pin<_, FunctionI2C, PullUp> = pins.gpio5.reconfigure();
    let i2c = hal::I2C::i2c0(
        device.I2C0,
        sda,
        scl,
        400.kHz(),
        &mut device.RESETS,
        &clocks.system_clock,
    );
    let mut synthesizer = si5351::Si5351::new(i2c);
    let plan = tones::plan(settings.reference, settings.frequency)?;
    let config = si5351::Config::new(settings.reference, settings.pll, settings.frequency)?;
    synthesizer.init(si5351::CrystalLoad::Pf10)?;
    synthesizer.apply(
        SYNTHESIZER_OUTPUT,
        si5351::Pll::A,
        &config,
        si5351::Drive::Ma8,
    )?;
    synthesizer.set_output_enable(1 << SYNTHESIZER_OUTPUT)?;
    log::info!(
        "Synthesizer: {} Hz (error {:e} Hz), PLL {} Hz, R {}",
        config.f,
        config.eps,
        config.pll,
        config.r
    );

    // Counter chain
    let slices = hal::pwm::Slices::new(device.PWM, &mut device.RESETS);
    let counter = counters::start(
        slices,
        (pins.gpio1, pins.gpio0, pins.gpio3),
        settings.fast_wrap,
        settings.slow_wrap,
    );

    // DMA gather, armed before the edge detector can push
    let _ = hal::dma::DMAExt::split(device.DMA, &mut device.RESETS);
    let topology = Topology::claim(&DMA_CHANNELS).ok_or(SetupError::DmaChannels)?;
    let blocks = cortex_m::singleton!(: ControlBlocks = ControlBlocks::new(
        &gather_sources(FAST_SLICE, SLOW_SLICE),
        &RESULT_BUFFER,
    ))
    .ok_or(SetupError::Reentered)?;
    let gather = DmaGather::start(topology, blocks);

    // Edge detector
    let _pps: gpio::Pin<_, FunctionPio0, PullNone> = pins.gpio2.reconfigure();
    let (mut pio, sm0, _, _, _) = device.PIO0.split(&mut device.RESETS);
    let program = pio.install(&edge_detector()).map_err(|_| SetupError::Pio)?;
    let (sm, _rx, _tx) = hal::pio::PIOBuilder::from_installed_program(program)
        .in_pin_base(PPS_PIN)
        .build(sm0);
    let _sm = sm.start();
    log::info!("PPS edge detector on GPIO {}", PPS_PIN);

    let count_scale = settings.fast_wrap as u64;
    Ok(Beacon {
        handler: EdgeHandler::new(
            gather,
            DmaSampler::new(&RESULT_BUFFER, count_scale),
            SAMPLES.sender(),
            &DIAGNOSTICS,
        ),
        receiver: SAMPLES.receiver(),
        diagnostics: &DIAGNOSTICS,
        direct: DirectSampler::new(Timer, counter, count_scale),
        synthesizer,
        config,
        plan,
        settings,
    })
}
