use bitfield_struct::bitfield;
use kernel_memory_addresses::VirtualPage;

/// Page number of the first `kseg0` page.
const KSEG0_VPN: u32 = 0x8_0000;

/// CP0 `EntryHi`: the tag half of a TLB entry.
///
/// ```text
/// | 31 ........ 12 | 11 .. 6 | 5 .. 0 |
/// |      VPN       |  ASID   |   0    |
/// ```
#[bitfield(u32)]
#[derive(PartialEq, Eq)]
pub struct EntryHi {
    /// Bits 0–5 — Reserved (must be 0).
    #[bits(6)]
    __reserved: u8,

    /// Bits 6–11 — Address space identifier.
    ///
    /// Always 0 here; address spaces are separated by flushing the TLB.
    #[bits(6)]
    pub asid: u8,

    /// Bits 12–31 — Virtual page number.
    #[bits(20)]
    pub vpn: u32,
}

impl EntryHi {
    /// Tag for `page` with ASID 0.
    #[inline]
    #[must_use]
    pub const fn for_page(page: VirtualPage) -> Self {
        Self::new().with_vpn(page.number())
    }

    /// The tag loaded into an unused TLB `slot`.
    ///
    /// Each slot gets a distinct `kseg0` page number. `kseg0` is never
    /// translated through the TLB, so these tags never match a lookup, and
    /// being distinct they never trip the duplicate-entry machine check.
    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn invalid(slot: usize) -> Self {
        Self::new().with_vpn(KSEG0_VPN + slot as u32)
    }

    /// Page this tag translates.
    #[inline]
    #[must_use]
    pub const fn page(self) -> VirtualPage {
        VirtualPage::from_number(self.vpn())
    }

    /// Whether two tags select the same translation.
    #[inline]
    #[must_use]
    pub const fn matches(self, other: Self) -> bool {
        self.vpn() == other.vpn() && self.asid() == other.asid()
    }
}
