//! # Physical Frame Allocator
//!
//! Two phases:
//!
//! 1. **Before [`bootstrap`](FrameAllocator::bootstrap)**: requests of any
//!    size are carved off the boot RAM with `ram_stealmem`. Those pages are
//!    never returned.
//! 2. **After**: the [`FrameTable`] serves exactly one frame per request from
//!    its LIFO free list.
//!
//! Every operation holds the allocator's [`SpinLock`] for its whole duration;
//! nothing reads or writes the frame table without it.

use crate::frame_table::{ENTRY_BYTES, FrameTable, FrameTableEntry, Leak};
use crate::ram::BootRam;
use core::ptr::NonNull;
use kernel_info::memory::{MIPS_KSEG0, is_kseg0, kvaddr_to_paddr, paddr_to_kvaddr};
use kernel_memory_addresses::{PAGE_SIZE, PhysicalAddress, PhysicalPage, VirtualAddress};
use kernel_sync::SpinLock;
use kernel_vmem::{FrameAlloc, PhysMapper};
use log::{debug, info, trace, warn};

#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum FrameAllocError {
    #[error("out of physical frames")]
    OutOfFrames,
    #[error("cannot allocate {pages} contiguous pages once the frame table is live")]
    MultiPageRequest { pages: u32 },
    #[error("boot RAM cannot supply {pages} pages")]
    StealFailed { pages: u32 },
    #[error("frame table for {frames} frames needs {table_frames} of them")]
    FrameTableTooLarge { frames: u32, table_frames: u32 },
    #[error("frame table already initialized")]
    AlreadyBootstrapped,
}

/// The kernel's physical memory allocator over boot RAM `R`.
pub struct FrameAllocator<R> {
    ram: R,
    table: SpinLock<Option<FrameTable>>,
}

impl<R: BootRam + PhysMapper> FrameAllocator<R> {
    pub const fn new(ram: R) -> Self {
        Self {
            ram,
            table: SpinLock::new(None),
        }
    }

    /// The underlying RAM, for physical memory access.
    #[inline]
    pub const fn ram(&self) -> &R {
        &self.ram
    }

    #[inline]
    pub fn is_bootstrapped(&self) -> bool {
        self.table.lock().is_some()
    }

    /// Take over all remaining RAM and build the frame table at its start.
    ///
    /// # Errors
    /// - [`FrameAllocError::AlreadyBootstrapped`] on a second call.
    /// - [`FrameAllocError::FrameTableTooLarge`] if the table would not leave
    ///   a single frame to hand out.
    pub fn bootstrap(&self) -> Result<(), FrameAllocError> {
        let mut slot = self.table.lock();
        if slot.is_some() {
            return Err(FrameAllocError::AlreadyBootstrapped);
        }

        let (first, last) = self.ram.ram_getsize();
        debug_assert!(first.is_page_aligned() && last.is_page_aligned());
        let frames = (last.as_u32() - first.as_u32()) / PAGE_SIZE;
        let table_frames = FrameTable::table_frames(frames);
        if table_frames >= frames {
            return Err(FrameAllocError::FrameTableTooLarge {
                frames,
                table_frames,
            });
        }

        let bytes = frames as usize * ENTRY_BYTES as usize;
        let entries: NonNull<FrameTableEntry> = self.ram.phys_to_ptr(first, bytes).cast();
        // SAFETY: ram_getsize handed us [first, last) exclusively and the
        // table fits in its leading `table_frames` frames.
        let table = unsafe { FrameTable::init(entries, first.page(), frames) };

        debug!(
            "frametable: {frames} frames in [{first}, {last}), {table_frames} reserved, first free {:?}",
            table.first_allocatable()
        );
        info!("frametable: {} frames free", table.free_frames());
        *slot = Some(table);
        Ok(())
    }

    /// Allocate `pages` contiguous physical pages.
    ///
    /// # Errors
    /// - Before bootstrap: [`FrameAllocError::StealFailed`].
    /// - After: [`FrameAllocError::MultiPageRequest`] for `pages != 1`,
    ///   [`FrameAllocError::OutOfFrames`] when the free list is empty.
    pub fn alloc_ppages(&self, pages: u32) -> Result<PhysicalAddress, FrameAllocError> {
        let mut slot = self.table.lock();
        let Some(table) = slot.as_mut() else {
            let pa = self
                .ram
                .ram_stealmem(pages)
                .ok_or(FrameAllocError::StealFailed { pages })?;
            trace!("getppages: stole {pages} pages at {pa}");
            return Ok(pa);
        };

        if pages != 1 {
            return Err(FrameAllocError::MultiPageRequest { pages });
        }
        let frame = table.pop().ok_or(FrameAllocError::OutOfFrames)?;
        trace!("getppages: {frame:?}");
        Ok(frame.base())
    }

    /// Return a page obtained from [`alloc_ppages`](Self::alloc_ppages).
    ///
    /// Pages stolen before bootstrap, frames of the table itself, addresses
    /// outside RAM and double frees are logged and otherwise ignored.
    pub fn free_ppages(&self, pa: PhysicalAddress) {
        let mut slot = self.table.lock();
        let Some(table) = slot.as_mut() else {
            warn!("freeppages: {pa} freed before the frame table exists; leaking");
            return;
        };
        match table.push(pa.page()) {
            Ok(()) => trace!("freeppages: {pa}"),
            Err(Leak::DoubleFree) => warn!("freeppages: {pa} is already free"),
            Err(e) => warn!("freeppages: {pa}: {e}; leaking"),
        }
    }

    /// Allocate `pages` pages and return their `kseg0` address.
    ///
    /// # Errors
    /// As [`alloc_ppages`](Self::alloc_ppages).
    pub fn alloc_kpages(&self, pages: u32) -> Result<VirtualAddress, FrameAllocError> {
        self.alloc_ppages(pages).map(paddr_to_kvaddr)
    }

    /// Free the page at `kseg0` address `va`.
    pub fn free_kpages(&self, va: VirtualAddress) {
        if !is_kseg0(va) {
            warn!("free_kpages: {va} is not a kseg0 address (base {MIPS_KSEG0:#x}); leaking");
            return;
        }
        self.free_ppages(kvaddr_to_paddr(va));
    }

    /// Frames currently on the free list; 0 before bootstrap.
    pub fn free_frames(&self) -> usize {
        self.table.lock().as_ref().map_or(0, |t| t.free_frames() as usize)
    }

    /// Frames covered by the table, reserved ones included.
    pub fn total_frames(&self) -> usize {
        self.table.lock().as_ref().map_or(0, |t| t.total_frames() as usize)
    }

    /// Frames holding the table itself.
    pub fn reserved_frames(&self) -> usize {
        self.table.lock().as_ref().map_or(0, |t| t.reserved_frames() as usize)
    }

    /// Whether `frame` is on the free list.
    pub fn is_free(&self, frame: PhysicalPage) -> bool {
        self.table.lock().as_ref().is_some_and(|t| t.is_free(frame))
    }
}

impl<R: BootRam + PhysMapper> FrameAlloc for FrameAllocator<R> {
    fn alloc_frame(&self) -> Option<PhysicalPage> {
        self.alloc_ppages(1).ok().map(PhysicalAddress::page)
    }

    fn free_frame(&self, frame: PhysicalPage) {
        self.free_ppages(frame.base());
    }
}

impl<R: BootRam + PhysMapper> PhysMapper for FrameAllocator<R> {
    fn phys_to_ptr(&self, pa: PhysicalAddress, len: usize) -> NonNull<u8> {
        self.ram.phys_to_ptr(pa, len)
    }
}

impl<R: core::fmt::Debug> core::fmt::Debug for FrameAllocator<R> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("FrameAllocator")
            .field("ram", &self.ram)
            .field("table", &self.table)
            .finish()
    }
}
