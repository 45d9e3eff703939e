//! # Kernel synchronization primitives
//!
//! - [`SpinLock`]: test-and-test-and-set lock guarding a value. The frame table
//!   lives behind one of these.
//! - [`IrqGuard`]: scoped "interrupts off" section over any [`InterruptMask`];
//!   the previous interrupt state is restored on every exit path.
//! - [`SpinLock::lock_irq`]: both at once, for state that is touched from the
//!   fault path (the TLB).

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

pub mod irq;
mod spin_lock;

pub use irq::{InterruptMask, IrqGuard, IrqSpinLockGuard};
pub use spin_lock::{SpinLock, SpinLockGuard};
