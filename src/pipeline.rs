//! Edge interrupt: from the gathered words to a queued [Sample].
//!
//! The DMA chain raises its interrupt once the gather has landed in the
//! [ResultBuffer](crate::sampler::ResultBuffer). The handler reduces the words, hands the
//! sample to the monitor without blocking and re-arms the chain for the next edge.
use embassy_sync::{
    blocking_mutex::raw::CriticalSectionRawMutex,
    channel::{Channel, Receiver, Sender},
};

use crate::{
    design_parameters::{MAX_WAIT_POLLS, SAMPLE_QUEUE_DEPTH},
    sample::Sample,
    sampler::{DmaSampler, Sampler},
    status::{Diagnostics, Status},
};

pub type SampleChannel = Channel<CriticalSectionRawMutex, Sample, SAMPLE_QUEUE_DEPTH>;
pub type SampleSender<'a> = Sender<'a, CriticalSectionRawMutex, Sample, SAMPLE_QUEUE_DEPTH>;
pub type SampleReceiver<'a> = Receiver<'a, CriticalSectionRawMutex, Sample, SAMPLE_QUEUE_DEPTH>;

/// Control of the DMA gather chain.
pub trait Gather {
    /// Clear the completion interrupt.
    fn acknowledge(&mut self);

    /// Whether a gather is in flight.
    fn busy(&self) -> bool;

    /// Arm the chain for the next edge.
    fn rearm(&mut self);
}

pub struct EdgeHandler<'a, G> {
    gather: G,
    sampler: DmaSampler<'a>,
    sender: SampleSender<'a>,
    diagnostics: &'a Diagnostics,
    rearm_pending: bool,
}

impl<'a, G: Gather> EdgeHandler<'a, G> {
    pub fn new(
        gather: G,
        sampler: DmaSampler<'a>,
        sender: SampleSender<'a>,
        diagnostics: &'a Diagnostics,
    ) -> Self {
        Self {
            gather,
            sampler,
            sender,
            diagnostics,
            rearm_pending: false,
        }
    }

    pub fn gather(&self) -> &G {
        &self.gather
    }

    /// Whether the chain was left disarmed because the gather never went idle.
    ///
    /// The running walk ends in the null block and interrupts again; that invocation re-arms.
    pub fn rearm_pending(&self) -> bool {
        self.rearm_pending
    }

    /// Handle one completion interrupt.
    ///
    /// Never blocks. The outcome is also recorded in the status register.
    pub fn handle(&mut self) -> Status {
        let Some(_running) = self.diagnostics.enter() else {
            return self.record(Status::InterruptRunning);
        };
        self.diagnostics.count_interrupt();
        self.gather.acknowledge();
        if self.rearm_pending && !self.gather.busy() {
            self.rearm();
        }

        let mut polls = 0;
        while !self.sampler.is_fresh() && polls < MAX_WAIT_POLLS {
            self.diagnostics.count_wait();
            polls += 1;
        }

        if self.gather.busy() {
            self.record(Status::DmaBusy);
            // Re-arming under the running gather would restart the descriptor walk mid-list.
            let mut polls = 0;
            while self.gather.busy() && polls < MAX_WAIT_POLLS {
                self.diagnostics.count_wait();
                polls += 1;
            }
            if self.gather.busy() {
                self.rearm_pending = true;
            } else {
                self.rearm();
            }
            return Status::DmaBusy;
        }

        let status = match self.sampler.collect() {
            None => Status::NoDmaData,
            Some(sample) => match self.sender.try_send(sample) {
                Ok(()) => Status::Ok,
                Err(_) => match self.diagnostics.status() {
                    Ok(previous) if previous.is_send_failure() => Status::SecondSendFailed,
                    _ => Status::FirstSendFailed,
                },
            },
        };
        self.rearm();
        self.record(status)
    }

    fn rearm(&mut self) {
        self.gather.rearm();
        self.rearm_pending = false;
    }

    fn record(&self, status: Status) -> Status {
        self.diagnostics.set_status(status);
        status
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{design_parameters::FAST_WRAP, sampler::ResultBuffer};
    use core::cell::Cell;

    /// Simulated chain, `busy` counts down the polls until the gather goes idle.
    #[derive(Default)]
    struct Chain {
        busy: Cell<u32>,
        rearmed: Cell<u32>,
        acknowledged: Cell<u32>,
    }

    impl Gather for &Chain {
        fn acknowledge(&mut self) {
            self.acknowledged.set(self.acknowledged.get() + 1);
        }
        fn busy(&self) -> bool {
            let busy = self.busy.get();
            self.busy.set(busy.saturating_sub(1));
            busy != 0
        }
        fn rearm(&mut self) {
            self.rearmed.set(self.rearmed.get() + 1);
        }
    }

    fn land(buffer: &ResultBuffer, b: u32, a: u32) {
        for (i, w) in [0, 10, 0, 11, b, a, b, a + 1].iter().enumerate() {
            buffer.store(i, *w);
        }
    }

    #[test]
    fn send_failures() {
        let buffer = ResultBuffer::new();
        let channel = SampleChannel::new();
        let diagnostics = Diagnostics::new();
        let chain = Chain::default();
        let mut handler = EdgeHandler::new(
            &chain,
            DmaSampler::new(&buffer, FAST_WRAP as _),
            channel.sender(),
            &diagnostics,
        );

        let mut outcomes = [Status::Ok; 5];
        for (i, outcome) in outcomes.iter_mut().enumerate() {
            land(&buffer, i as u32, 100);
            *outcome = handler.handle();
        }
        assert_eq!(
            outcomes,
            [
                Status::Ok,
                Status::Ok,
                Status::FirstSendFailed,
                Status::SecondSendFailed,
                Status::SecondSendFailed
            ]
        );
        assert_eq!(channel.try_receive().unwrap().count, 100);
        land(&buffer, 5, 100);
        assert_eq!(handler.handle(), Status::Ok);
        assert_eq!(diagnostics.interrupts(), 6);
        assert_eq!(diagnostics.waits(), 0);
        assert_eq!(chain.rearmed.get(), 6);
        assert_eq!(chain.acknowledged.get(), 6);
    }

    #[test]
    fn stale() {
        let buffer = ResultBuffer::new();
        let channel = SampleChannel::new();
        let diagnostics = Diagnostics::new();
        let chain = Chain::default();
        let mut handler = EdgeHandler::new(
            &chain,
            DmaSampler::new(&buffer, FAST_WRAP as _),
            channel.sender(),
            &diagnostics,
        );
        assert_eq!(handler.handle(), Status::NoDmaData);
        assert_eq!(diagnostics.waits(), MAX_WAIT_POLLS);
        assert_eq!(chain.rearmed.get(), 1);
        assert!(channel.try_receive().is_err());
    }

    #[test]
    fn busy_gather_is_rearmed_once_idle() {
        let buffer = ResultBuffer::new();
        let channel = SampleChannel::new();
        let diagnostics = Diagnostics::new();
        let chain = Chain::default();
        let mut handler = EdgeHandler::new(
            &chain,
            DmaSampler::new(&buffer, FAST_WRAP as _),
            channel.sender(),
            &diagnostics,
        );

        land(&buffer, 1, 2);
        chain.busy.set(10);
        assert_eq!(handler.handle(), Status::DmaBusy);
        assert_eq!(diagnostics.status(), Ok(Status::DmaBusy));
        assert_eq!(chain.rearmed.get(), 1);
        assert!(!handler.rearm_pending());
        assert!(channel.try_receive().is_err());

        // The next edge is serviced normally.
        land(&buffer, 3, 4);
        assert_eq!(handler.handle(), Status::Ok);
        assert_eq!(channel.try_receive().unwrap().count, 3 * FAST_WRAP as u64 + 4);
        assert_eq!(chain.rearmed.get(), 2);
    }

    #[test]
    fn stuck_gather_is_rearmed_by_next_interrupt() {
        let buffer = ResultBuffer::new();
        let channel = SampleChannel::new();
        let diagnostics = Diagnostics::new();
        let chain = Chain::default();
        let mut handler = EdgeHandler::new(
            &chain,
            DmaSampler::new(&buffer, FAST_WRAP as _),
            channel.sender(),
            &diagnostics,
        );

        land(&buffer, 1, 2);
        chain.busy.set(u32::MAX);
        assert_eq!(handler.handle(), Status::DmaBusy);
        assert_eq!(chain.rearmed.get(), 0);
        assert_eq!(diagnostics.waits(), MAX_WAIT_POLLS);
        assert!(handler.rearm_pending());

        // The walk finishes and its null block interrupts again.
        chain.busy.set(0);
        land(&buffer, 5, 6);
        assert_eq!(handler.handle(), Status::Ok);
        assert!(!handler.rearm_pending());
        assert_eq!(chain.rearmed.get(), 2);
        assert_eq!(channel.try_receive().unwrap().count, 5 * FAST_WRAP as u64 + 6);
    }

    #[test]
    fn reentry() {
        let buffer = ResultBuffer::new();
        let channel = SampleChannel::new();
        let diagnostics = Diagnostics::new();
        let chain = Chain::default();
        let mut handler = EdgeHandler::new(
            &chain,
            DmaSampler::new(&buffer, FAST_WRAP as _),
            channel.sender(),
            &diagnostics,
        );
        land(&buffer, 1, 2);
        let running = diagnostics.enter().unwrap();
        assert_eq!(handler.handle(), Status::InterruptRunning);
        assert_eq!(diagnostics.interrupts(), 0);
        drop(running);
        assert_eq!(handler.handle(), Status::Ok);
        assert!(buffer.words()[7] == crate::design_parameters::SENTINEL);
    }
}
