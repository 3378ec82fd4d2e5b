//! Interrupt context diagnostics.
//!
//! The edge interrupt has no caller to return errors to. It records its outcome in a
//! single word status register and bumps two counters that the monitor polls.
//! Only plain loads and stores are used: the RP2040 (ARMv6-M) has no atomic read-modify-write
//! and all writers run in the same interrupt.
use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use num_enum::{IntoPrimitive, TryFromPrimitive};

/// Outcome of the last edge interrupt.
#[derive(Copy, Clone, Debug, PartialEq, Eq, TryFromPrimitive, IntoPrimitive)]
#[repr(u32)]
pub enum Status {
    Ok = 0,
    InterruptRunning = 1,
    FirstSendFailed = 2,
    SecondSendFailed = 3,
    NoDmaData = 4,
    DmaBusy = 5,
}

impl Status {
    pub fn message(self) -> &'static str {
        match self {
            Self::Ok => "Interrupt OK",
            Self::InterruptRunning => "Interrupt Running",
            Self::FirstSendFailed => "First Send Failed",
            Self::SecondSendFailed => "Second Send Failed",
            Self::NoDmaData => "No DMA Data",
            Self::DmaBusy => "DMA Busy",
        }
    }

    pub fn is_send_failure(self) -> bool {
        matches!(self, Self::FirstSendFailed | Self::SecondSendFailed)
    }

    /// Describe a raw status word. Undefined codes keep their value.
    pub fn describe(raw: u32) -> Described {
        Described(raw)
    }
}

/// Display of a raw status word.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Described(pub u32);

impl core::fmt::Display for Described {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match Status::try_from(self.0) {
            Ok(status) => f.write_str(status.message()),
            Err(_) => write!(f, "Unknown ({:#x})", self.0),
        }
    }
}

impl core::fmt::Display for Status {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.message())
    }
}

/// Status register and counters shared between the edge interrupt and the monitor.
#[derive(Debug, Default)]
pub struct Diagnostics {
    status: AtomicU32,
    waits: AtomicU32,
    interrupts: AtomicU32,
    running: AtomicBool,
}

/// Held while an edge interrupt is being handled.
pub struct Running<'a>(&'a AtomicBool);

impl Drop for Running<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

fn increment(counter: &AtomicU32) {
    counter.store(counter.load(Ordering::Relaxed).wrapping_add(1), Ordering::Relaxed);
}

impl Diagnostics {
    pub const fn new() -> Self {
        Self {
            status: AtomicU32::new(0),
            waits: AtomicU32::new(0),
            interrupts: AtomicU32::new(0),
            running: AtomicBool::new(false),
        }
    }

    /// The raw status word.
    pub fn raw_status(&self) -> u32 {
        self.status.load(Ordering::Relaxed)
    }

    /// The decoded status, the raw word if it is not a known code.
    pub fn status(&self) -> Result<Status, u32> {
        let raw = self.raw_status();
        Status::try_from(raw).map_err(|_| raw)
    }

    pub fn set_status(&self, status: Status) {
        self.status.store(status.into(), Ordering::Relaxed);
    }

    /// Number of polls spent waiting for the DMA gather.
    pub fn waits(&self) -> u32 {
        self.waits.load(Ordering::Relaxed)
    }

    /// Number of edge interrupts entered.
    pub fn interrupts(&self) -> u32 {
        self.interrupts.load(Ordering::Relaxed)
    }

    pub(crate) fn count_wait(&self) {
        increment(&self.waits);
    }

    pub(crate) fn count_interrupt(&self) {
        increment(&self.interrupts);
    }

    /// Mark the handler as running, `None` if it already is.
    pub fn enter(&self) -> Option<Running<'_>> {
        if self.running.load(Ordering::Acquire) {
            return None;
        }
        self.running.store(true, Ordering::Release);
        Some(Running(&self.running))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn messages() {
        assert_eq!(Status::describe(0).to_string(), "Interrupt OK");
        assert_eq!(Status::describe(3).to_string(), "Second Send Failed");
        assert_eq!(Status::describe(5).to_string(), "DMA Busy");
        assert_eq!(Status::describe(6).to_string(), "Unknown (0x6)");
        assert_eq!(Status::describe(0xdead).to_string(), "Unknown (0xdead)");
        assert_eq!(Status::NoDmaData.to_string(), "No DMA Data");
        assert_eq!(u32::from(Status::InterruptRunning), 1);
    }

    #[test]
    fn register() {
        let d = Diagnostics::new();
        assert_eq!(d.status(), Ok(Status::Ok));
        d.set_status(Status::DmaBusy);
        assert_eq!(d.status(), Ok(Status::DmaBusy));
        d.status.store(42, Ordering::Relaxed);
        assert_eq!(d.status(), Err(42));
        d.count_wait();
        d.count_wait();
        d.count_interrupt();
        assert_eq!((d.waits(), d.interrupts()), (2, 1));
    }

    #[test]
    fn reentrancy() {
        let d = Diagnostics::new();
        let guard = d.enter().unwrap();
        assert!(d.enter().is_none());
        drop(guard);
        assert!(d.enter().is_some());
    }
}
