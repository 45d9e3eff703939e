use crate::{MemoryAddress, MemoryPage, PAGE_SIZE};
use core::fmt;
use core::ops::Add;

/// The offset within a page (`0..PAGE_SIZE`).
#[repr(transparent)]
#[derive(Copy, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct MemoryAddressOffset(u32);

impl MemoryAddressOffset {
    /// Create from a raw value, asserting it is < [`PAGE_SIZE`] in debug.
    #[inline]
    #[must_use]
    pub const fn new(value: u32) -> Self {
        debug_assert!(value < PAGE_SIZE, "offset must be < page size");
        Self(value & (PAGE_SIZE - 1))
    }

    /// Construct from a full address's offset bits.
    #[inline]
    #[must_use]
    pub const fn from_addr(addr: MemoryAddress) -> Self {
        Self(addr.as_u32() & (PAGE_SIZE - 1))
    }

    #[inline]
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }

    /// The offset as a byte index into a page buffer.
    #[inline]
    #[must_use]
    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for MemoryAddressOffset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Offset({:#X})", self.0)
    }
}

impl Add<MemoryAddressOffset> for MemoryPage {
    type Output = MemoryAddress;
    #[inline]
    fn add(self, rhs: MemoryAddressOffset) -> Self::Output {
        self.join(rhs)
    }
}

impl From<MemoryAddress> for MemoryAddressOffset {
    #[inline]
    fn from(addr: MemoryAddress) -> Self {
        Self::from_addr(addr)
    }
}
