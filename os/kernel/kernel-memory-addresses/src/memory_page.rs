use crate::{MemoryAddress, MemoryAddressOffset, PAGE_FRAME, PAGE_SHIFT};
use core::fmt;

/// A page base address (lower [`PAGE_SHIFT`] bits are zero).
#[repr(transparent)]
#[derive(Copy, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct MemoryPage(u32);

impl fmt::Display for MemoryPage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08X}/4K", self.0)
    }
}

impl MemoryPage {
    /// Create from a raw address, aligning down to the page boundary.
    #[inline]
    #[must_use]
    pub const fn from_addr(addr: MemoryAddress) -> Self {
        Self(addr.as_u32() & PAGE_FRAME)
    }

    /// Page that contains `addr` (aligns down).
    #[inline]
    #[must_use]
    pub const fn containing(addr: u32) -> Self {
        Self(addr & PAGE_FRAME)
    }

    /// Page with page number `number` (`base >> PAGE_SHIFT`).
    #[inline]
    #[must_use]
    pub const fn from_number(number: u32) -> Self {
        Self(number << PAGE_SHIFT)
    }

    /// Return the base as `MemoryAddress`.
    #[inline]
    #[must_use]
    pub const fn base(self) -> MemoryAddress {
        MemoryAddress::new(self.0)
    }

    /// The page number, i.e. the base shifted right by [`PAGE_SHIFT`].
    #[inline]
    #[must_use]
    pub const fn number(self) -> u32 {
        self.0 >> PAGE_SHIFT
    }

    /// Combine with an offset to form a full address.
    #[inline]
    #[must_use]
    pub const fn join(self, off: MemoryAddressOffset) -> MemoryAddress {
        MemoryAddress::new(self.0 | off.as_u32())
    }
}

impl fmt::Debug for MemoryPage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MemoryPage(0x{:08X})", self.0)
    }
}

impl From<MemoryAddress> for MemoryPage {
    #[inline]
    fn from(addr: MemoryAddress) -> Self {
        Self::from_addr(addr)
    }
}
