use bitfield_struct::bitfield;
use kernel_memory_addresses::PhysicalPage;

/// CP0 `EntryLo`: the data half of a TLB entry.
///
/// ```text
/// | 31 ........ 12 | 11 | 10 | 9 | 8 | 7 .. 0 |
/// |      PFN       |  N |  D | V | G |   0    |
/// ```
#[bitfield(u32)]
#[derive(PartialEq, Eq)]
pub struct EntryLo {
    /// Bits 0–7 — Reserved (must be 0).
    #[bits(8)]
    __reserved: u8,

    /// Bit 8 — G: global; the ASID is ignored on lookup.
    pub global: bool,

    /// Bit 9 — V: the entry is valid. A lookup that hits an entry with `V`
    /// clear raises a TLB miss as if nothing matched.
    pub valid: bool,

    /// Bit 10 — D: "dirty", really *write enable*. A store through an entry
    /// with `D` clear raises a TLB-modify (read-only) fault.
    pub dirty: bool,

    /// Bit 11 — N: non-cacheable.
    pub nocache: bool,

    /// Bits 12–31 — Physical frame number.
    #[bits(20)]
    pub pfn: u32,
}

impl EntryLo {
    /// The data loaded into an unused TLB slot: all zero, `V` clear.
    #[inline]
    #[must_use]
    pub const fn invalid() -> Self {
        Self::new()
    }

    /// A valid mapping of `frame`; `writable` sets the `D` bit.
    #[inline]
    #[must_use]
    pub const fn mapping(frame: PhysicalPage, writable: bool) -> Self {
        Self::new()
            .with_pfn(frame.frame_number())
            .with_valid(true)
            .with_dirty(writable)
    }

    /// Frame this entry maps.
    #[inline]
    #[must_use]
    pub const fn frame(self) -> PhysicalPage {
        PhysicalPage::from_frame_number(self.pfn())
    }
}
