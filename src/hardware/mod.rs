//! Module for all hardware-specific setup of the beacon
pub use rp2040_hal as hal;

pub mod counters;
pub mod gather;
pub mod setup;

pub use setup::{setup, Beacon, SetupError};

rtic_monotonics::rp2040_timer_monotonic!(Mono);

/// Volatile read of a peripheral register.
///
/// # Safety
/// `address` must be a readable, word aligned peripheral register without read side effects.
#[inline(always)]
pub unsafe fn read_register(address: u32) -> u32 {
    core::ptr::read_volatile(address as *const u32)
}

/// Volatile write of a peripheral register.
///
/// # Safety
/// `address` must be a writable, word aligned peripheral register that is not owned by
/// a HAL driver.
#[inline(always)]
pub unsafe fn write_register(address: u32, value: u32) {
    core::ptr::write_volatile(address as *mut u32, value)
}

/// Reboot into the USB mass storage bootloader.
pub fn reboot_to_bootloader() -> ! {
    log::warn!("Rebooting to bootloader");
    hal::rom_data::reset_to_usb_boot(0, 0);
    #[allow(clippy::empty_loop)]
    loop {}
}

#[inline(never)]
#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    use core::{
        fmt::Write,
        sync::atomic::{AtomicBool, Ordering},
    };
    use cortex_m::asm;
    use rtt_target::{ChannelMode, UpChannel};

    cortex_m::interrupt::disable();

    // Recursion protection
    static PANICKED: AtomicBool = AtomicBool::new(false);
    while PANICKED.load(Ordering::Relaxed) {
        asm::bkpt();
    }
    PANICKED.store(true, Ordering::Relaxed);

    // Analogous to panic-rtt-target
    if let Some(mut channel) = unsafe { UpChannel::conjure(0) } {
        channel.set_mode(ChannelMode::BlockIfFull);
        writeln!(channel, "{}", info).ok();
    }

    // Abort
    asm::udf();
}

#[cortex_m_rt::exception]
unsafe fn HardFault(ef: &cortex_m_rt::ExceptionFrame) -> ! {
    panic!("HardFault at {:#?}", ef);
}

#[cortex_m_rt::exception]
unsafe fn DefaultHandler(irqn: i16) {
    panic!("Unhandled exception (IRQn = {})", irqn);
}
