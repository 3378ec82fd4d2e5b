#![cfg_attr(target_os = "none", no_std)]
#![cfg_attr(target_os = "none", no_main)]

use gps_beacon::settings::Settings;

#[cfg(target_os = "none")]
#[link_section = ".boot2"]
#[used]
pub static BOOT2_FIRMWARE: [u8; 256] = rp2040_boot2::BOOT_LOADER_W25Q080;

#[cfg(not(target_os = "none"))]
fn main() {
    use gps_beacon::{metadata::ApplicationMetadata, tones};
    println!("{:?}", ApplicationMetadata::new());
    let s = Settings::default();
    println!("{}", s.to_json().unwrap());
    let plan = tones::plan(s.reference, s.frequency).unwrap();
    for (symbol, tone) in plan.tones().iter().enumerate() {
        println!(
            "tone {symbol}: {:.6} Hz (error {:.3e} Hz) PLL {} Hz feedback {:?} output {:?} R {}",
            tone.f, tone.eps, tone.pll, tone.feedback, tone.output, tone.r
        );
    }
}

#[cfg(target_os = "none")]
#[rtic::app(device = gps_beacon::hardware::hal::pac, peripherals = true, dispatchers = [SW0_IRQ])]
mod app {
    use super::*;

    use fugit::ExtU64;
    use rtic_monotonics::Monotonic;

    use gps_beacon::{
        hardware::{self, gather::DmaGather, Mono},
        metadata::ApplicationMetadata,
        monitor::{next_event, Monitor},
        observation::micro_time,
        pipeline::{EdgeHandler, SampleReceiver},
        sampler::Sampler,
        status::Diagnostics,
    };

    #[shared]
    struct Shared {}

    #[local]
    struct Local {
        handler: EdgeHandler<'static, DmaGather>,
        receiver: SampleReceiver<'static>,
        diagnostics: &'static Diagnostics,
        monitor: Monitor,
        settings: Settings,
        programmed: f64,
    }

    #[init]
    fn init(c: init::Context) -> (Shared, Local) {
        let settings = Settings::default().validate().unwrap();
        let hardware::Beacon {
            handler,
            receiver,
            diagnostics,
            mut direct,
            config,
            plan,
            settings,
            ..
        } = hardware::setup(c.device, settings).unwrap();

        log::info!("{:?}", ApplicationMetadata::new());
        for (symbol, tone) in plan.tones().iter().enumerate() {
            log::info!("Tone {}: {} Hz", symbol, tone.f);
        }
        // CPU read for comparison with the first gathered sample
        if let Some(sample) = direct.collect() {
            log::info!(
                "Direct sample: count {} at {} us ({} us)",
                sample.count,
                sample.time,
                micro_time(&hardware::counters::Timer)
            );
        }

        supervise::spawn().unwrap();

        (
            Shared {},
            Local {
                handler,
                receiver,
                diagnostics,
                monitor: Monitor::new(settings.count_wrap()),
                programmed: config.f,
                settings,
            },
        )
    }

    #[task(binds = DMA_IRQ_0, priority = 2, local = [handler])]
    fn edge(c: edge::Context) {
        c.local.handler.handle();
    }

    #[task(priority = 1, local = [receiver, diagnostics, monitor, settings, programmed])]
    async fn supervise(c: supervise::Context) -> ! {
        let supervise::LocalResources {
            receiver,
            diagnostics,
            monitor,
            settings,
            programmed,
            ..
        } = c.local;

        let mut events = 0;
        loop {
            let timeout = Mono::delay((settings.timeout_ms as u64).millis());
            let event = next_event(receiver, timeout).await;
            if let Some(measurement) = monitor.handle(event, diagnostics) {
                log::info!(
                    "Reference {:.3} Hz",
                    measurement.corrected_reference(settings.reference, *programmed)
                );
            }
            if monitor.statistics().count() >= 60 {
                let deviation = monitor
                    .take_statistics()
                    .get_relative(*programmed);
                log::info!("Counts per second: {:?}", deviation);
            }

            events += 1;
            if settings.reboot_after != 0 && events >= settings.reboot_after {
                hardware::reboot_to_bootloader();
            }
        }
    }
}
