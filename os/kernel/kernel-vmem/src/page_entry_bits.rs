use bitfield_struct::bitfield;
use kernel_memory_addresses::PhysicalPage;

/// Raw 32-bit page-table entry, shared by both levels.
///
/// | Bits  | Name    | Meaning |
/// |-------|---------|---------|
/// | 0     | `V`     | Entry holds a frame |
/// | 1–11  | —       | Reserved (0) |
/// | 12–31 | `frame` | Physical frame number |
///
/// In the page directory the frame is a second-level table; in a page table
/// it is the data frame of a user page. A zero word is "nothing here".
///
/// ### Example
/// ```rust
/// # use kernel_memory_addresses::PhysicalPage;
/// # use kernel_vmem::PageEntryBits;
/// let e = PageEntryBits::for_frame(PhysicalPage::from_frame_number(0x42));
/// assert!(e.valid());
/// assert_eq!(e.into_bits(), 0x0004_2001);
/// ```
#[bitfield(u32)]
#[derive(PartialEq, Eq)]
pub struct PageEntryBits {
    /// Valid (bit 0).
    pub valid: bool,

    /// Bits 1–11 — Reserved.
    #[bits(11)]
    __reserved: u16,

    /// Bits 12–31 — Physical frame number.
    #[bits(20)]
    frame_number: u32,
}

impl PageEntryBits {
    /// A valid entry naming `frame`.
    #[inline]
    #[must_use]
    pub const fn for_frame(frame: PhysicalPage) -> Self {
        Self::new()
            .with_valid(true)
            .with_frame_number(frame.frame_number())
    }

    /// The frame, if the entry is valid.
    #[inline]
    #[must_use]
    pub const fn frame(self) -> Option<PhysicalPage> {
        if self.valid() {
            Some(PhysicalPage::from_frame_number(self.frame_number()))
        } else {
            None
        }
    }
}
