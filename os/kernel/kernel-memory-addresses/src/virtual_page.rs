use crate::{MemoryAddressOffset, MemoryPage, VirtualAddress};
use core::fmt;

/// Virtual memory page base.
///
/// A `VirtualPage` is the **page-aligned base** of a 4 KiB virtual page, i.e.
/// the unit the page table and the TLB (`EntryHi.VPN`) work with.
#[repr(transparent)]
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct VirtualPage(pub(crate) MemoryPage);

impl VirtualPage {
    #[inline]
    #[must_use]
    pub const fn from_addr(va: VirtualAddress) -> Self {
        Self(MemoryPage::from_addr(va.0))
    }

    /// Page that contains the raw address `addr`.
    #[inline]
    #[must_use]
    pub const fn containing(addr: u32) -> Self {
        Self(MemoryPage::containing(addr))
    }

    /// Page with virtual page number `vpn`.
    #[inline]
    #[must_use]
    pub const fn from_number(vpn: u32) -> Self {
        Self(MemoryPage::from_number(vpn))
    }

    #[inline]
    #[must_use]
    pub const fn base(self) -> VirtualAddress {
        VirtualAddress(self.0.base())
    }

    /// The virtual page number (`base >> 12`).
    #[inline]
    #[must_use]
    pub const fn number(self) -> u32 {
        self.0.number()
    }

    #[inline]
    #[must_use]
    pub const fn join(self, off: MemoryAddressOffset) -> VirtualAddress {
        VirtualAddress(self.0.join(off))
    }
}

impl fmt::Display for VirtualPage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl fmt::Debug for VirtualPage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VirtualPage(0x{:08X})", self.0.base().as_u32())
    }
}

impl From<MemoryPage> for VirtualPage {
    #[inline]
    fn from(p: MemoryPage) -> Self {
        Self(p)
    }
}
