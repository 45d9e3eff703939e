//! # Regions
//!
//! A region is a page-aligned run of virtual pages with one set of
//! [`Permissions`]. The loader defines one per ELF segment; the stack is not a
//! region but a fixed window (see [`stack_window`]).

use bitfield_struct::bitfield;
use kernel_info::memory::{USERSTACK_BASE, VM_STACKPAGES};
use kernel_memory_addresses::{PAGE_SIZE, VirtualAddress, VirtualPage};

/// Access rights of a region.
#[bitfield(u8)]
#[derive(PartialEq, Eq)]
pub struct Permissions {
    pub readable: bool,
    pub writable: bool,
    pub executable: bool,
    #[bits(5)]
    __reserved: u8,
}

impl Permissions {
    /// Build from the three ELF-style flags.
    #[inline]
    #[must_use]
    pub const fn from_flags(readable: bool, writable: bool, executable: bool) -> Self {
        Self::new()
            .with_readable(readable)
            .with_writable(writable)
            .with_executable(executable)
    }

    /// Readable and writable, not executable.
    pub const RW: Self = Self::from_flags(true, true, false);

    /// Readable and executable.
    pub const RX: Self = Self::from_flags(true, false, true);

    /// Read only.
    pub const RO: Self = Self::from_flags(true, false, false);
}

/// One contiguous virtual range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Region {
    base: VirtualPage,
    pages: u32,
    permissions: Permissions,
    /// Permissions in effect before [`Region::prepare_load`].
    saved: Option<Permissions>,
}

impl Region {
    /// A region of `pages` pages starting at `base`.
    #[must_use]
    pub const fn new(base: VirtualPage, pages: u32, permissions: Permissions) -> Self {
        Self {
            base,
            pages,
            permissions,
            saved: None,
        }
    }

    #[inline]
    #[must_use]
    pub const fn base(&self) -> VirtualPage {
        self.base
    }

    #[inline]
    #[must_use]
    pub const fn pages(&self) -> u32 {
        self.pages
    }

    /// One past the last byte. May equal `USERSTACK` but never wraps.
    #[inline]
    #[must_use]
    pub const fn end(&self) -> VirtualAddress {
        VirtualAddress::new(self.base.base().as_u32() + self.pages * PAGE_SIZE)
    }

    /// Permissions currently in effect.
    #[inline]
    #[must_use]
    pub const fn permissions(&self) -> Permissions {
        self.permissions
    }

    /// Whether the region is between `prepare_load` and `complete_load`.
    #[inline]
    #[must_use]
    pub const fn is_loading(&self) -> bool {
        self.saved.is_some()
    }

    #[inline]
    #[must_use]
    pub const fn contains(&self, va: VirtualAddress) -> bool {
        va.as_u32() >= self.base.base().as_u32() && va.as_u32() < self.end().as_u32()
    }

    /// Whether `[base, base + pages)` shares a page with this region.
    #[must_use]
    pub const fn overlaps(&self, base: VirtualPage, pages: u32) -> bool {
        let (a0, a1) = (self.base.number(), self.base.number() + self.pages);
        let (b0, b1) = (base.number(), base.number() + pages);
        a0 < b1 && b0 < a1
    }

    /// Make the region writable for loading, remembering the real permissions.
    ///
    /// A second call before [`complete_load`](Self::complete_load) keeps the
    /// first saved value.
    pub fn prepare_load(&mut self) {
        if self.saved.is_none() {
            self.saved = Some(self.permissions);
            self.permissions = self.permissions.with_writable(true);
        }
    }

    /// Restore the permissions saved by [`prepare_load`](Self::prepare_load).
    pub fn complete_load(&mut self) {
        if let Some(saved) = self.saved.take() {
            self.permissions = saved;
        }
    }
}

/// The fixed user stack window `[USERSTACK - VM_STACKPAGES pages, USERSTACK)`.
///
/// Always readable and writable, never executable.
#[must_use]
pub const fn stack_window() -> Region {
    Region::new(
        VirtualPage::containing(USERSTACK_BASE),
        VM_STACKPAGES,
        Permissions::RW,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use kernel_info::memory::USERSTACK;

    fn region(base: u32, pages: u32) -> Region {
        Region::new(VirtualPage::containing(base), pages, Permissions::RX)
    }

    #[test]
    fn bounds_are_half_open() {
        let r = region(0x0040_0000, 2);
        assert_eq!(r.end().as_u32(), 0x0040_2000);
        assert!(r.contains(VirtualAddress::new(0x0040_0000)));
        assert!(r.contains(VirtualAddress::new(0x0040_1fff)));
        assert!(!r.contains(VirtualAddress::new(0x0040_2000)));
        assert!(!r.contains(VirtualAddress::new(0x003f_ffff)));
    }

    #[test]
    fn overlap_is_page_granular() {
        let r = region(0x0040_0000, 2);
        assert!(r.overlaps(VirtualPage::containing(0x0040_1000), 1));
        assert!(r.overlaps(VirtualPage::containing(0x003f_f000), 2));
        assert!(!r.overlaps(VirtualPage::containing(0x0040_2000), 4));
        assert!(!r.overlaps(VirtualPage::containing(0x003f_e000), 2));
    }

    #[test]
    fn load_bracketing_restores_original() {
        let mut r = region(0x0040_0000, 1);
        r.prepare_load();
        assert!(r.permissions().writable());
        assert!(r.permissions().executable());
        r.prepare_load();
        r.complete_load();
        assert_eq!(r.permissions(), Permissions::RX);
        assert!(!r.is_loading());
        r.complete_load();
        assert_eq!(r.permissions(), Permissions::RX);
    }

    #[test]
    fn stack_window_sits_below_userstack() {
        let s = stack_window();
        assert_eq!(s.base().base().as_u32(), 0x7fff_0000);
        assert_eq!(s.end().as_u32(), USERSTACK);
        assert!(s.permissions().writable());
        assert!(!s.permissions().executable());
    }
}
