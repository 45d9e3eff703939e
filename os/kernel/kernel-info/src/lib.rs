//! # Kernel Configuration and Memory Layout
//!
//! This crate defines the memory layout constants and the boot-time RAM
//! configuration shared by the frame allocator, the address-space code and the
//! fault handler. It is the single source for the user/kernel split of the
//! 32-bit MIPS address space and for the one physical ↔ kernel-virtual
//! translation used everywhere else.
//!
//! ## Architecture
//!
//! ### Memory Layout ([`memory`])
//! * **Segments**: `kuseg` (TLB mapped, per process) and `kseg0` (direct mapped,
//!   cached, kernel only)
//! * **User stack**: a fixed window directly below [`memory::USERSTACK`]
//! * **Translation**: [`memory::paddr_to_kvaddr`] / [`memory::kvaddr_to_paddr`]
//!
//! ### Boot Configuration ([`boot`])
//! * **RAM geometry**: size of physical memory and of the loaded kernel image
//!
//! ### Error Numbers ([`errno`])
//! * `ENOMEM`, `EFAULT`, `EINVAL` as seen by the trap layer
//!
//! ## Virtual Memory Architecture
//!
//! ```text
//! Virtual Address Space Layout (32-bit):
//!
//! 0x0000_0000 ┌─────────────────────────────────┐
//!             │         kuseg (user)            │
//!             │   regions: code, data, heap     │
//!             │              ...                │
//!             │   stack window (VM_STACKPAGES)  │
//! 0x8000_0000 ├─────────────────────────────────┤ USERSTACK / MIPS_KSEG0
//!             │   kseg0: phys 0.. direct map    │
//! 0xa000_0000 ├─────────────────────────────────┤ MIPS_KSEG1
//!             │   kseg1: uncached direct map    │
//! 0xc000_0000 ├─────────────────────────────────┤ MIPS_KSEG2
//!             │   kseg2: kernel TLB mapped      │
//! 0xffff_ffff └─────────────────────────────────┘
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]

pub mod boot;
pub mod errno;
pub mod memory;
