//! # Page Directory (root level)
//!
//! - [`PdIndex`]: index type for VA bits `[31:22]`.
//! - [`PdEntry`]: either absent or naming the frame of a [`PageTable`](super::PageTable).
//! - [`PageDirectory`]: a 4 KiB-aligned array of 1024 entries; one per address space.
//!
//! A directory entry never maps user memory directly.

use super::ENTRIES_PER_TABLE;
use crate::PageEntryBits;
use kernel_memory_addresses::{PhysicalPage, VirtualAddress};

/// Index into the page directory (derived from VA bits `[31:22]`).
#[repr(transparent)]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct PdIndex(u16);

/// What a directory slot holds.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PdEntryKind {
    /// No second-level table yet.
    Absent,
    /// Frame of the second-level table covering this 4 MiB slice.
    Table(PhysicalPage),
}

/// A single page directory entry.
#[doc(alias = "PDE")]
#[repr(transparent)]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct PdEntry(PageEntryBits);

/// The root table: 1024 entries, 4 KiB-aligned.
#[doc(alias = "PD")]
#[repr(C, align(4096))]
pub struct PageDirectory {
    entries: [PdEntry; ENTRIES_PER_TABLE],
}

impl PdIndex {
    /// Extract bits `[31:22]` of `va`.
    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn from(va: VirtualAddress) -> Self {
        Self::new((va.as_u32() >> 22) as u16)
    }

    /// ### Debug assertions
    /// - Asserts `v < 1024` in debug builds.
    #[inline]
    #[must_use]
    pub const fn new(v: u16) -> Self {
        debug_assert!((v as usize) < ENTRIES_PER_TABLE);
        Self(v)
    }

    #[inline]
    #[must_use]
    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }

    /// First virtual address covered by this slot.
    #[inline]
    #[must_use]
    pub const fn base(self) -> VirtualAddress {
        VirtualAddress::new((self.0 as u32) << 22)
    }
}

impl PdEntry {
    #[inline]
    #[must_use]
    pub const fn absent() -> Self {
        Self(PageEntryBits::new())
    }

    /// Entry pointing at the page table in `frame`.
    #[inline]
    #[must_use]
    pub const fn table(frame: PhysicalPage) -> Self {
        Self(PageEntryBits::for_frame(frame))
    }

    #[inline]
    #[must_use]
    pub const fn kind(self) -> PdEntryKind {
        match self.0.frame() {
            Some(frame) => PdEntryKind::Table(frame),
            None => PdEntryKind::Absent,
        }
    }

    #[inline]
    #[must_use]
    pub const fn is_present(self) -> bool {
        self.0.valid()
    }

    #[inline]
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0.into_bits()
    }
}

impl PageDirectory {
    /// Read the entry at `i`.
    #[inline]
    #[must_use]
    pub const fn get(&self, i: PdIndex) -> PdEntry {
        self.entries[i.as_usize()]
    }

    /// Write the entry at `i`.
    #[inline]
    pub const fn set(&mut self, i: PdIndex, e: PdEntry) {
        self.entries[i.as_usize()] = e;
    }

    /// Present second-level tables in ascending index order.
    #[allow(clippy::cast_possible_truncation)]
    pub fn tables(&self) -> impl Iterator<Item = (PdIndex, PhysicalPage)> + '_ {
        self.entries
            .iter()
            .enumerate()
            .filter_map(|(i, e)| match e.kind() {
                PdEntryKind::Table(frame) => Some((PdIndex::new(i as u16), frame)),
                PdEntryKind::Absent => None,
            })
    }
}
