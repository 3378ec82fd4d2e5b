//! Consumer side of the sample queue.
//!
//! The monitor waits for either the next [Sample] or a timeout, whichever comes first, and
//! turns consecutive samples into [Measurement]s. The composite count wraps every
//! [COUNT_WRAP](crate::design_parameters::COUNT_WRAP) cycles; a decreasing count is
//! corrected by one wrap. Missing samples are counted and reported once more than one
//! timeout passed in a row.
use core::future::Future;

use embassy_futures::select::{select, Either};
use log::{debug, info, warn};

use crate::{
    design_parameters::PPS_PERIOD_US,
    pipeline::SampleReceiver,
    sample::Sample,
    statistics,
    status::{Diagnostics, Status},
};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Event {
    Sample(Sample),
    Timeout,
}

/// Wait for the next sample or the timeout.
pub async fn next_event(receiver: &SampleReceiver<'_>, timeout: impl Future<Output = ()>) -> Event {
    match select(receiver.receive(), timeout).await {
        Either::First(sample) => Event::Sample(sample),
        Either::Second(()) => Event::Timeout,
    }
}

/// Reference frequency measured between two samples.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Measurement {
    /// Reference cycles, wrap corrected.
    pub delta_count: u64,
    /// Elapsed microseconds on the local timer.
    pub delta_time_us: u64,
    /// Number of PPS periods covered.
    pub seconds: u64,
    /// Reference frequency in Hz (GPS seconds).
    pub frequency: f64,
    /// Whether the wrap correction was applied.
    pub wrapped: bool,
}

impl Measurement {
    /// The actual reference oscillator frequency.
    ///
    /// # Args
    /// * `f0` - Nominal reference frequency the synthesizer was configured with.
    /// * `programmed` - Frequency the synthesizer was programmed to emit (and that is counted).
    pub fn corrected_reference(&self, f0: f64, programmed: f64) -> f64 {
        f0 * self.frequency / programmed
    }
}

#[derive(Clone, Debug)]
pub struct Monitor {
    wrap: u64,
    last: Option<Sample>,
    missed: u32,
    status: u32,
    statistics: statistics::State,
}

impl Monitor {
    /// # Args
    /// * `wrap` - Modulus of the composite count.
    pub fn new(wrap: u64) -> Self {
        Self {
            wrap,
            last: None,
            missed: 0,
            status: Status::Ok.into(),
            statistics: Default::default(),
        }
    }

    /// Number of consecutive timeouts.
    pub fn missed(&self) -> u32 {
        self.missed
    }

    /// Count per second statistics since the last [Monitor::take_statistics].
    pub fn statistics(&self) -> &statistics::State {
        &self.statistics
    }

    pub fn take_statistics(&mut self) -> statistics::State {
        core::mem::take(&mut self.statistics)
    }

    /// Process an event and report changes of the interrupt status.
    pub fn handle(&mut self, event: Event, diagnostics: &Diagnostics) -> Option<Measurement> {
        let status = diagnostics.raw_status();
        if status != self.status {
            self.status = status;
            if status == u32::from(Status::Ok) {
                info!("Interrupt status recovered");
            } else {
                warn!(
                    "Interrupt status: {} (interrupts {}, waits {})",
                    Status::describe(status),
                    diagnostics.interrupts(),
                    diagnostics.waits()
                );
            }
        }
        match event {
            Event::Sample(sample) => self.on_sample(&sample),
            Event::Timeout => {
                self.on_timeout();
                None
            }
        }
    }

    /// Record a missed window, returns the number of consecutive misses.
    pub fn on_timeout(&mut self) -> u32 {
        self.missed += 1;
        if self.missed > 1 {
            warn!("Missed {} sample windows", self.missed);
        }
        self.missed
    }

    /// Measure against the previous sample, `None` for the first one.
    ///
    /// A sample older than the previous one yields no measurement and becomes the new base.
    pub fn on_sample(&mut self, sample: &Sample) -> Option<Measurement> {
        self.missed = 0;
        if sample.counter.rolled_over() {
            debug!("Slow counter incremented during gather: {:?}", sample.words());
        }
        let last = self.last.replace(*sample)?;

        let wrapped = sample.count < last.count;
        let delta_count = if wrapped {
            sample.count + self.wrap - last.count
        } else {
            sample.count - last.count
        };
        let Some(delta_time_us) = sample.time.checked_sub(last.time) else {
            warn!("Timer went backwards: {} us after {} us", sample.time, last.time);
            return None;
        };
        let seconds = (delta_time_us.saturating_add(PPS_PERIOD_US / 2) / PPS_PERIOD_US).max(1);
        let frequency = delta_count as f64 / seconds as f64;

        if let Ok(per_second) = i32::try_from(delta_count / seconds) {
            self.statistics.update(per_second);
        }

        let m = Measurement {
            delta_count,
            delta_time_us,
            seconds,
            frequency,
            wrapped,
        };
        info!(
            "dc {} dt {} us f {:.3} Hz{}",
            m.delta_count,
            m.delta_time_us,
            m.frequency,
            if wrapped { " (wrapped)" } else { "" }
        );
        Some(m)
    }
}
