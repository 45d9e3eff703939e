//! # Two-Level Page Table
//!
//! ```text
//! | 31 ‒ 22 | 21 ‒ 12 | 11 ‒ 0 |
//! |   PD    |   PT    | Offset |
//! ```
//!
//! Both levels are one 4 KiB frame holding 1024 32-bit entries, so a table
//! frame is exactly a `[u32; 1024]`. The [`PageDirectory`] (root) selects a
//! [`PageTable`] by the top ten bits; the page table selects the data frame by
//! the next ten.
//!
//! Tables live in frames handed out by the frame allocator and are reached
//! through a [`PhysMapper`](crate::PhysMapper); entries name frames by frame
//! number, never by pointer.

pub mod pd;
pub mod pt;

pub use pd::{PageDirectory, PdEntry, PdEntryKind, PdIndex};
pub use pt::{PageTable, PtEntry, PtEntryKind, PtIndex};

use kernel_memory_addresses::VirtualAddress;

/// Entries per table at either level.
pub const ENTRIES_PER_TABLE: usize = 1024;

/// Split `va` into its directory and table indices.
#[inline]
#[must_use]
pub const fn split_indices(va: VirtualAddress) -> (PdIndex, PtIndex) {
    (PdIndex::from(va), PtIndex::from(va))
}
