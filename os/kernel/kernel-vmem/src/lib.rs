//! # Virtual Memory Support
//!
//! Per-process address spaces for a 32-bit MIPS kernel with a software-refilled
//! TLB.
//!
//! ## What you get
//! - An [`AddressSpace`]: a two-level page table plus the list of [`Region`]s
//!   that make up a process image, with create/copy/destroy and ELF-load
//!   bracketing.
//! - A typed [`page_table`] ([`PageDirectory`] → [`PageTable`]) stored in
//!   physical frames.
//! - The allocator/mapper seams ([`FrameAlloc`], [`PhysMapper`]) the address
//!   space is built on, bundled as a [`VmContext`].
//!
//! ## MIPS32 Virtual Address → Physical Address Walk
//!
//! ```text
//! | 31‒22 | 21‒12 | 11‒0   |
//! |  PD   |  PT   | Offset |
//! ```
//!
//! ```text
//!  PD (root, one per address space)  →  PT  →  Physical Page
//!   │                                      │
//!   │                                      └───► PTE → maps one 4 KiB page
//!   └──────────────────────────────────────────► PDE → names a PT frame
//! ```
//!
//! Hardware never walks these tables. A TLB miss traps to the kernel, which
//! walks them in software, commits a frame on first touch and loads the
//! translation into the TLB.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code, clippy::inline_always)]

extern crate alloc;

pub mod address_space;
mod page_entry_bits;
pub mod page_table;
pub mod region;

#[cfg(test)]
mod test_ram;

use core::ptr::NonNull;
use kernel_memory_addresses::{PAGE_SIZE, PhysicalAddress, PhysicalPage};

pub use crate::address_space::{AddressSpace, AddressSpaceError};
pub use crate::page_entry_bits::PageEntryBits;
pub use crate::page_table::{PageDirectory, PageTable};
pub use crate::region::{Permissions, Region};

/// Re-export constants as info module.
pub use kernel_info::memory as info;

/// Source of single **physical** 4 KiB frames.
///
/// The frames are handed out uninitialized; callers that need zeroed memory
/// clear it through the [`PhysMapper`].
pub trait FrameAlloc {
    /// Allocate one frame, or `None` when memory is exhausted.
    fn alloc_frame(&self) -> Option<PhysicalPage>;

    /// Return a frame obtained from [`alloc_frame`](Self::alloc_frame).
    fn free_frame(&self, frame: PhysicalPage);
}

impl<T: FrameAlloc + ?Sized> FrameAlloc for &T {
    fn alloc_frame(&self) -> Option<PhysicalPage> {
        (**self).alloc_frame()
    }

    fn free_frame(&self, frame: PhysicalPage) {
        (**self).free_frame(frame);
    }
}

/// Converts physical addresses to pointers the kernel can dereference.
///
/// On the real machine this is the fixed `kseg0` offset; the simulated RAM
/// used on a host resolves it into its backing buffer.
pub trait PhysMapper {
    /// Kernel pointer to the `len` bytes starting at `pa`.
    ///
    /// Implementations panic if the range is not backed by RAM.
    fn phys_to_ptr(&self, pa: PhysicalAddress, len: usize) -> NonNull<u8>;

    /// Borrow the `T` stored at `pa`.
    ///
    /// # Safety
    /// - `pa` must be suitably aligned for `T` and the bytes must be a valid `T`.
    /// - No other reference to those bytes may be live for `'a`.
    #[inline]
    unsafe fn phys_to_mut<'a, T>(&self, pa: PhysicalAddress) -> &'a mut T {
        let ptr = self.phys_to_ptr(pa, size_of::<T>()).cast::<T>();
        debug_assert!(ptr.is_aligned(), "{pa:?} is misaligned for the target type");
        // SAFETY: bounds checked by phys_to_ptr; the rest is on the caller.
        unsafe { &mut *ptr.as_ptr() }
    }

    /// Fill `frame` with zeros.
    fn zero_frame(&self, frame: PhysicalPage) {
        let ptr = self.phys_to_ptr(frame.base(), PAGE_SIZE as usize);
        // SAFETY: the mapper vouched for PAGE_SIZE bytes at this frame.
        unsafe { core::ptr::write_bytes(ptr.as_ptr(), 0, PAGE_SIZE as usize) }
    }

    /// Copy the full contents of `src` into `dst`.
    fn copy_frame(&self, src: PhysicalPage, dst: PhysicalPage) {
        debug_assert_ne!(src, dst);
        let from = self.phys_to_ptr(src.base(), PAGE_SIZE as usize);
        let to = self.phys_to_ptr(dst.base(), PAGE_SIZE as usize);
        // SAFETY: both ranges are valid for a page and distinct frames never overlap.
        unsafe { core::ptr::copy_nonoverlapping(from.as_ptr(), to.as_ptr(), PAGE_SIZE as usize) }
    }

    /// Copy bytes out of physical memory.
    fn read_phys(&self, pa: PhysicalAddress, buf: &mut [u8]) {
        let from = self.phys_to_ptr(pa, buf.len());
        // SAFETY: the mapper vouched for buf.len() bytes at pa.
        unsafe { core::ptr::copy_nonoverlapping(from.as_ptr(), buf.as_mut_ptr(), buf.len()) }
    }

    /// Copy bytes into physical memory.
    fn write_phys(&self, pa: PhysicalAddress, data: &[u8]) {
        let to = self.phys_to_ptr(pa, data.len());
        // SAFETY: the mapper vouched for data.len() bytes at pa.
        unsafe { core::ptr::copy_nonoverlapping(data.as_ptr(), to.as_ptr(), data.len()) }
    }
}

/// The frame source and physical-memory view every address-space operation
/// runs against.
pub struct VmContext<'k, A: ?Sized, M: ?Sized> {
    pub frames: &'k A,
    pub mapper: &'k M,
}

impl<'k, A: FrameAlloc + ?Sized, M: PhysMapper + ?Sized> VmContext<'k, A, M> {
    #[inline]
    pub const fn new(frames: &'k A, mapper: &'k M) -> Self {
        Self { frames, mapper }
    }

    /// Allocate a frame and clear it.
    #[inline]
    pub(crate) fn alloc_zeroed(&self) -> Option<PhysicalPage> {
        let frame = self.frames.alloc_frame()?;
        self.mapper.zero_frame(frame);
        Some(frame)
    }
}

impl<A: ?Sized, M: ?Sized> Clone for VmContext<'_, A, M> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<A: ?Sized, M: ?Sized> Copy for VmContext<'_, A, M> {}
