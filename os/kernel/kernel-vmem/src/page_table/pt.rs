//! # Page Table (leaf level)
//!
//! - [`PtIndex`]: index type for VA bits `[21:12]`.
//! - [`PtEntry`]: unmapped, or mapping one 4 KiB user page to a frame.
//! - [`PageTable`]: a 4 KiB-aligned array of 1024 entries.
//!
//! ## Invariants
//!
//! - A mapped entry owns its frame exclusively; no two mapped entries, in this
//!   or any other address space, name the same frame.
//! - Permissions are not stored here. The refill path takes them from the
//!   region containing the page.

use super::ENTRIES_PER_TABLE;
use crate::PageEntryBits;
use kernel_memory_addresses::{PhysicalPage, VirtualAddress};

/// Index into a page table (derived from VA bits `[21:12]`).
#[repr(transparent)]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct PtIndex(u16);

/// What a page-table slot holds.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PtEntryKind {
    /// No frame committed yet; the first touch allocates one.
    Unmapped,
    /// The page lives in this frame.
    Mapped(PhysicalPage),
}

/// A single page table entry.
#[doc(alias = "PTE")]
#[repr(transparent)]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct PtEntry(PageEntryBits);

/// A second-level table: 1024 entries, 4 KiB-aligned.
#[doc(alias = "PT")]
#[repr(C, align(4096))]
pub struct PageTable {
    entries: [PtEntry; ENTRIES_PER_TABLE],
}

impl PtIndex {
    /// Extract bits `[21:12]` of `va`.
    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn from(va: VirtualAddress) -> Self {
        Self::new(((va.as_u32() >> 12) & 0x3FF) as u16)
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
}

impl PtEntry {
    #[inline]
    #[must_use]
    pub const fn unmapped() -> Self {
        Self(PageEntryBits::new())
    }

    /// Leaf mapping onto `frame`.
    #[inline]
    #[must_use]
    pub const fn mapped(frame: PhysicalPage) -> Self {
        Self(PageEntryBits::for_frame(frame))
    }

    #[inline]
    #[must_use]
    pub const fn kind(self) -> PtEntryKind {
        match self.0.frame() {
            Some(frame) => PtEntryKind::Mapped(frame),
            None => PtEntryKind::Unmapped,
        }
    }

    #[inline]
    #[must_use]
    pub const fn is_mapped(self) -> bool {
        self.0.valid()
    }

    #[inline]
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0.into_bits()
    }
}

impl PageTable {
    #[inline]
    #[must_use]
    pub const fn get(&self, i: PtIndex) -> PtEntry {
        self.entries[i.as_usize()]
    }

    /// Write the entry at `i`.
    ///
    /// Replacing a mapped entry loses its frame; callers free it first.
    #[inline]
    pub const fn set(&mut self, i: PtIndex, e: PtEntry) {
        self.entries[i.as_usize()] = e;
    }

    /// Mapped pages in ascending index order.
    #[allow(clippy::cast_possible_truncation)]
    pub fn mappings(&self) -> impl Iterator<Item = (PtIndex, PhysicalPage)> + '_ {
        self.entries
            .iter()
            .enumerate()
            .filter_map(|(i, e)| match e.kind() {
                PtEntryKind::Mapped(frame) => Some((PtIndex::new(i as u16), frame)),
                PtEntryKind::Unmapped => None,
            })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn pte_maps_frame() {
        let frame = PhysicalPage::from_frame_number(0x5555);
        let e = PtEntry::mapped(frame);
        assert_eq!(e.kind(), PtEntryKind::Mapped(frame));
        assert_eq!(e.raw(), 0x0555_5001);
        assert!(!PtEntry::unmapped().is_mapped());
    }

    #[test]
    fn index_uses_middle_bits() {
        assert_eq!(PtIndex::from(VirtualAddress::new(0x0040_3fff)).as_usize(), 3);
        assert_eq!(PtIndex::from(VirtualAddress::new(0x003f_f000)).as_usize(), 0x3ff);
    }
}
