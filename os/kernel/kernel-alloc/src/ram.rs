//! # Boot RAM
//!
//! What the boot environment knows about physical memory before the frame
//! table exists: where the kernel image ends, where RAM ends, and a bump
//! pointer for stealing pages in between.

use alloc::alloc::{Layout, alloc_zeroed, dealloc, handle_alloc_error};
use core::ptr::NonNull;
use kernel_info::boot::RamConfig;
use kernel_memory_addresses::{PAGE_SIZE, PhysicalAddress};
use kernel_sync::SpinLock;
use kernel_vmem::PhysMapper;
use log::trace;

/// The boot-time physical memory interface.
pub trait BootRam {
    /// The usable range `[first, last)`, both page aligned.
    ///
    /// This hands all remaining memory to the caller: afterwards
    /// [`ram_stealmem`](Self::ram_stealmem) always fails.
    fn ram_getsize(&self) -> (PhysicalAddress, PhysicalAddress);

    /// Take `pages` contiguous pages from the bottom of the free range.
    ///
    /// Returns `None` when there is not enough left or after
    /// [`ram_getsize`](Self::ram_getsize).
    fn ram_stealmem(&self, pages: u32) -> Option<PhysicalAddress>;
}

/// Bump state of the boot allocator.
#[derive(Debug)]
struct Bump {
    first_free: u32,
    last: u32,
}

/// Host-memory stand-in for the machine's physical RAM.
///
/// Physical address `pa` is byte `pa` of one zero-initialized, page-aligned
/// allocation of `config.ram_top()` bytes.
pub struct SimulatedRam {
    config: RamConfig,
    memory: NonNull<u8>,
    layout: Layout,
    bump: SpinLock<Bump>,
}

// Safety: the backing buffer is owned; concurrent access to the same frame is
// excluded by frame ownership, and the bump pointer is locked.
unsafe impl Send for SimulatedRam {}
unsafe impl Sync for SimulatedRam {}

impl SimulatedRam {
    /// Allocate the backing memory for `config`.
    ///
    /// # Panics
    /// If the configuration leaves no page above the kernel image.
    #[must_use]
    pub fn new(config: RamConfig) -> Self {
        assert!(
            config.first_free() < config.ram_top(),
            "ram: kernel image ({:#x} bytes) fills all of RAM ({:#x} bytes)",
            config.kernel_image_bytes,
            config.ram_bytes
        );

        let layout = match Layout::from_size_align(config.ram_top() as usize, PAGE_SIZE as usize)
        {
            Ok(layout) => layout,
            Err(e) => panic!("ram: bad layout for {:#x} bytes: {e}", config.ram_top()),
        };
        // SAFETY: layout has a non-zero size.
        let memory = unsafe { alloc_zeroed(layout) };
        let Some(memory) = NonNull::new(memory) else {
            handle_alloc_error(layout)
        };

        trace!(
            "ram: {:#x} bytes, kernel image {:#x} bytes",
            config.ram_top(),
            config.first_free()
        );
        Self {
            config,
            memory,
            layout,
            bump: SpinLock::new(Bump {
                first_free: config.first_free(),
                last: config.ram_top(),
            }),
        }
    }

    #[must_use]
    pub const fn config(&self) -> RamConfig {
        self.config
    }

    /// One past the last byte of RAM.
    #[must_use]
    pub const fn ram_top(&self) -> PhysicalAddress {
        PhysicalAddress::new(self.config.ram_top())
    }
}

impl BootRam for SimulatedRam {
    fn ram_getsize(&self) -> (PhysicalAddress, PhysicalAddress) {
        let mut bump = self.bump.lock();
        let range = (
            PhysicalAddress::new(bump.first_free),
            PhysicalAddress::new(bump.last),
        );
        bump.first_free = 0;
        bump.last = 0;
        range
    }

    fn ram_stealmem(&self, pages: u32) -> Option<PhysicalAddress> {
        let mut bump = self.bump.lock();
        let size = pages.checked_mul(PAGE_SIZE)?;
        let end = bump.first_free.checked_add(size)?;
        if end > bump.last {
            return None;
        }
        let pa = PhysicalAddress::new(bump.first_free);
        bump.first_free = end;
        Some(pa)
    }
}

impl PhysMapper for SimulatedRam {
    fn phys_to_ptr(&self, pa: PhysicalAddress, len: usize) -> NonNull<u8> {
        let start = pa.as_u32() as usize;
        assert!(
            start.checked_add(len).is_some_and(|end| end <= self.layout.size()),
            "ram: {pa:?} + {len:#x} is outside physical memory"
        );
        // SAFETY: in bounds of the backing allocation.
        unsafe { self.memory.add(start) }
    }
}

impl Drop for SimulatedRam {
    fn drop(&mut self) {
        // SAFETY: allocated in `new` with this layout.
        unsafe { dealloc(self.memory.as_ptr(), self.layout) }
    }
}

impl core::fmt::Debug for SimulatedRam {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SimulatedRam")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
