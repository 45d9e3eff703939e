use crate::{MemoryAddressOffset, MemoryPage, PhysicalAddress};
use core::fmt;

/// Physical page frame base.
///
/// A `PhysicalPage` represents the **page-aligned base** of one 4 KiB frame of
/// RAM. It is a thin wrapper over [`MemoryPage`] with physical-address intent.
///
/// ### Invariants
/// - The low 12 bits of the base are always zero (page aligned).
#[repr(transparent)]
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct PhysicalPage(pub(crate) MemoryPage);

impl PhysicalPage {
    #[inline]
    #[must_use]
    pub const fn from_addr(p: PhysicalAddress) -> Self {
        Self(MemoryPage::from_addr(p.0))
    }

    /// Frame with physical frame number `pfn`.
    #[inline]
    #[must_use]
    pub const fn from_frame_number(pfn: u32) -> Self {
        Self(MemoryPage::from_number(pfn))
    }

    #[inline]
    #[must_use]
    pub const fn base(self) -> PhysicalAddress {
        PhysicalAddress(self.0.base())
    }

    /// The physical frame number (`base >> 12`), as stored in `EntryLo.PFN`.
    #[inline]
    #[must_use]
    pub const fn frame_number(self) -> u32 {
        self.0.number()
    }

    #[inline]
    #[must_use]
    pub const fn join(self, off: MemoryAddressOffset) -> PhysicalAddress {
        PhysicalAddress(self.0.join(off))
    }
}

impl fmt::Display for PhysicalPage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl fmt::Debug for PhysicalPage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PhysicalPage(0x{:08X})", self.0.base().as_u32())
    }
}

impl From<MemoryPage> for PhysicalPage {
    #[inline]
    fn from(p: MemoryPage) -> Self {
        Self(p)
    }
}
