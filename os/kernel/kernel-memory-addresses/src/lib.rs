//! # Virtual and Physical Memory Address Types (MIPS32)
//!
//! Strongly typed wrappers for the 32-bit raw addresses and page bases used by
//! the frame allocator, the page tables and the TLB code.
//!
//! ## Overview
//!
//! The machine has a 32-bit address space and a single page size of 4 KiB.
//! Every higher-level memory abstraction is built from a few principal types:
//!
//! | Concept | Description |
//! |----------|-------------|
//! | [`MemoryAddress`] | A raw 32-bit address, either physical or virtual. |
//! | [`MemoryPage`] | A page-aligned base address. |
//! | [`MemoryAddressOffset`] | An offset within a page (`0..PAGE_SIZE`). |
//!
//! These are then wrapped to distinguish between virtual and physical spaces:
//!
//! | Wrapper | Meaning |
//! |----------|----------|
//! | [`VirtualAddress`] / [`VirtualPage`] | User (`kuseg`) or kernel (`kseg0`) virtual memory. |
//! | [`PhysicalAddress`] / [`PhysicalPage`] | Physical RAM, addressed by frame. |
//!
//! ## Typical Usage
//!
//! ```rust
//! # use kernel_memory_addresses::*;
//! let va = VirtualAddress::new(0x0040_1234);
//!
//! // Split it into a page base and an in-page offset
//! let (page, off) = va.split();
//! assert_eq!(page.base().as_u32(), 0x0040_1000);
//! assert_eq!(off.as_u32(), 0x234);
//!
//! // Join them back to the same address
//! assert_eq!(page.join(off), va);
//! ```
//!
//! ## Design Notes
//!
//! - The types are `#[repr(transparent)]` and implement `Copy`, `Eq`, `Ord`, and
//!   `Hash`, making them suitable as map keys or for storing inside page tables.
//! - All alignment and offset calculations are `const fn`.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(clippy::inline_always)]

mod memory_address;
mod memory_address_offset;
mod memory_page;
mod physical_address;
mod physical_page;
mod virtual_address;
mod virtual_page;

pub use crate::memory_address::MemoryAddress;
pub use crate::memory_address_offset::MemoryAddressOffset;
pub use crate::memory_page::MemoryPage;
pub use crate::physical_address::PhysicalAddress;
pub use crate::physical_page::PhysicalPage;
pub use crate::virtual_address::VirtualAddress;
pub use crate::virtual_page::VirtualPage;

/// Page size in bytes.
pub const PAGE_SIZE: u32 = 4096;

/// log2([`PAGE_SIZE`]), i.e. the number of low bits used for the in-page offset.
pub const PAGE_SHIFT: u32 = 12;

/// Mask that keeps the page-number bits of an address.
pub const PAGE_FRAME: u32 = !(PAGE_SIZE - 1);

const _: () = assert!(1 << PAGE_SHIFT == PAGE_SIZE);
