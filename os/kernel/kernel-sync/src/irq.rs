use crate::{SpinLock, SpinLockGuard};
use core::ops::{Deref, DerefMut};

/// Processor-local interrupt enable switch.
///
/// On MIPS this is the `IEc` bit of the coprocessor-0 `Status` register. The
/// trait exists so the same critical-section code runs against real hardware
/// and against the emulated processor used by the tests.
pub trait InterruptMask {
    /// Whether interrupts are currently enabled on this processor.
    fn interrupts_enabled(&self) -> bool;

    /// Enable (`true`) or disable (`false`) interrupts on this processor.
    fn set_interrupts_enabled(&self, enabled: bool);
}

impl<T: InterruptMask + ?Sized> InterruptMask for &T {
    fn interrupts_enabled(&self) -> bool {
        (**self).interrupts_enabled()
    }

    fn set_interrupts_enabled(&self, enabled: bool) {
        (**self).set_interrupts_enabled(enabled);
    }
}

/// RAII guard that disables interrupts on creation and restores them on drop.
///
/// `IrqGuard::new()` snapshots the enable bit. If interrupts were enabled it
/// clears the bit; on drop it sets it again **only** if it was set before, so
/// guards nest and the outermost one restores the original state.
///
/// This is the `splhigh()` / `splx()` pair expressed as a scope: every return
/// path out of the guarded block, including early returns, restores the prior
/// level.
///
/// # Examples
///
/// ```
/// use core::sync::atomic::{AtomicBool, Ordering};
/// use kernel_sync::{InterruptMask, IrqGuard};
///
/// struct Cpu(AtomicBool);
///
/// impl InterruptMask for Cpu {
///     fn interrupts_enabled(&self) -> bool {
///         self.0.load(Ordering::Relaxed)
///     }
///     fn set_interrupts_enabled(&self, enabled: bool) {
///         self.0.store(enabled, Ordering::Relaxed);
///     }
/// }
///
/// let cpu = Cpu(AtomicBool::new(true));
/// {
///     let _g = IrqGuard::new(&cpu);
///     assert!(!cpu.interrupts_enabled());
/// }
/// assert!(cpu.interrupts_enabled());
/// ```
#[must_use = "interrupts are restored as soon as the guard is dropped"]
pub struct IrqGuard<'a, M: InterruptMask + ?Sized> {
    mask: &'a M,
    /// Whether interrupts were enabled when the guard was created.
    were_enabled: bool,
}

impl<'a, M: InterruptMask + ?Sized> IrqGuard<'a, M> {
    /// Disables interrupts if they are currently enabled and remembers the state.
    #[inline]
    pub fn new(mask: &'a M) -> Self {
        let were_enabled = mask.interrupts_enabled();
        if were_enabled {
            mask.set_interrupts_enabled(false);
        }
        Self { mask, were_enabled }
    }

    /// Whether this guard will re-enable interrupts when dropped.
    #[inline]
    #[must_use]
    pub const fn restores_interrupts(&self) -> bool {
        self.were_enabled
    }
}

impl<M: InterruptMask + ?Sized> Drop for IrqGuard<'_, M> {
    fn drop(&mut self) {
        if self.were_enabled {
            self.mask.set_interrupts_enabled(true);
        }
    }
}

/// A [`SpinLockGuard`] taken with interrupts disabled.
///
/// Created by [`SpinLock::lock_irq`]. Fields drop in declaration order: the
/// lock is released first, then the interrupt state is restored.
pub struct IrqSpinLockGuard<'a, T, M: InterruptMask + ?Sized> {
    guard: SpinLockGuard<'a, T>,
    _irq: IrqGuard<'a, M>,
}

impl<T> SpinLock<T> {
    /// Disable interrupts on `mask`, then acquire the lock.
    ///
    /// This keeps an interrupt handler on the same processor from preempting
    /// the critical section and spinning on a lock its own processor holds.
    #[inline]
    pub fn lock_irq<'a, M: InterruptMask + ?Sized>(
        &'a self,
        mask: &'a M,
    ) -> IrqSpinLockGuard<'a, T, M> {
        let irq = IrqGuard::new(mask);
        let guard = self.lock();
        IrqSpinLockGuard { guard, _irq: irq }
    }
}

impl<T, M: InterruptMask + ?Sized> Deref for IrqSpinLockGuard<'_, T, M> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.guard
    }
}

impl<T, M: InterruptMask + ?Sized> DerefMut for IrqSpinLockGuard<'_, T, M> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.guard
    }
}
