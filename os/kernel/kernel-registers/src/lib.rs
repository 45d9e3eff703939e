//! # Typed MIPS32 Coprocessor-0 Registers
//!
//! The VM system only touches a handful of CP0 state:
//!
//! | Register | Type | Used for |
//! |----------|------|----------|
//! | `EntryHi` | [`EntryHi`] | virtual page number (and ASID) of a TLB entry |
//! | `EntryLo` | [`EntryLo`] | physical frame and `D`/`V`/`G`/`N` bits of a TLB entry |
//! | `Status` | [`Status`] | the current interrupt enable bit (`IEc`) |
//! | `Index` / `Random` | slot numbers | `tlbwi` / `tlbwr` targets |
//!
//! The [`Tlb`] trait is the instruction-level interface (`tlbr`, `tlbwi`,
//! `tlbwr`, `tlbp`). [`Cp0`] is an emulated coprocessor implementing it along
//! with [`InterruptMask`](kernel_sync::InterruptMask), so the VM code runs
//! unchanged on a host.

#![cfg_attr(not(any(test, doctest)), no_std)]

mod cp0;
mod entry_hi;
mod entry_lo;
mod status;
mod tlb;

pub use crate::cp0::{Cp0, TlbAccess};
pub use crate::entry_hi::EntryHi;
pub use crate::entry_lo::EntryLo;
pub use crate::status::Status;
pub use crate::tlb::{NUM_TLB, SoftTlb, TLB_RANDOM_LOWER, Tlb, TlbEntry};
