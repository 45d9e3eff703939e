use crate::{SoftTlb, Status};
use core::sync::atomic::{AtomicU32, Ordering};
use kernel_sync::{InterruptMask, IrqSpinLockGuard, SpinLock};

/// Exclusive TLB access with interrupts disabled.
pub type TlbAccess<'a> = IrqSpinLockGuard<'a, SoftTlb, Cp0>;

/// Emulated coprocessor 0 of a single processor.
///
/// Holds the TLB and the `Status` register. TLB access goes through
/// [`Cp0::tlb`], which raises the interrupt level for as long as the returned
/// guard lives.
#[derive(Debug)]
pub struct Cp0 {
    tlb: SpinLock<SoftTlb>,
    status: AtomicU32,
}

impl Cp0 {
    /// Processor state after reset: TLB invalid, kernel mode, interrupts on.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            tlb: SpinLock::new(SoftTlb::new()),
            status: AtomicU32::new(Status::new().with_iec(true).into_bits()),
        }
    }

    /// Disable interrupts and lock the TLB.
    #[inline]
    pub fn tlb(&self) -> TlbAccess<'_> {
        self.tlb.lock_irq(self)
    }

    /// Current `Status` register value.
    #[inline]
    pub fn status(&self) -> Status {
        Status::from_bits(self.status.load(Ordering::Acquire))
    }
}

impl Default for Cp0 {
    fn default() -> Self {
        Self::new()
    }
}

impl InterruptMask for Cp0 {
    fn interrupts_enabled(&self) -> bool {
        self.status().iec()
    }

    fn set_interrupts_enabled(&self, enabled: bool) {
        let _ = self
            .status
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |bits| {
                Some(Status::from_bits(bits).with_iec(enabled).into_bits())
            });
    }
}
