//! # Virtual Memory Subsystem
//!
//! [`Vm`] ties the pieces together for one machine: the [`FrameAllocator`]
//! over boot RAM, the processor's [`Cp0`] (TLB and interrupt state), and the
//! per-process [`AddressSpace`]s built on both.
//!
//! ```text
//!   trap layer ──► Vm::fault ──► AddressSpace::ensure_page ──► FrameAllocator
//!                     │
//!                     └──► refill ──► Cp0 TLB (interrupts off)
//! ```
//!
//! The current address space is passed in explicitly; there is no ambient
//! "current thread" here.
//!
//! ## Example
//!
//! ```rust
//! use kernel_alloc::SimulatedRam;
//! use kernel_info::boot::RamConfig;
//! use kernel_memory_addresses::VirtualAddress;
//! use kernel_vm::{Vm, fault::VM_FAULT_WRITE};
//! use kernel_vmem::Permissions;
//!
//! let vm = Vm::new(SimulatedRam::new(RamConfig::SYS161_DEFAULT));
//! vm.bootstrap();
//!
//! let mut space = vm.create_space().unwrap();
//! let code = VirtualAddress::new(0x0040_0000);
//! vm.define_region(&mut space, code, 0x2000, Permissions::RW).unwrap();
//! vm.activate(&space);
//!
//! vm.fault(Some(&mut space), VM_FAULT_WRITE, code + 0x10).unwrap();
//! assert!(vm.destroy_space(space) > 0);
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]

pub mod fault;
pub mod logger;

use crate::fault::{FaultError, FaultKind, Refill, refill};
use kernel_alloc::{BootRam, FrameAllocError, FrameAllocator};
use kernel_memory_addresses::{VirtualAddress, VirtualPage};
use kernel_registers::{Cp0, EntryHi, EntryLo, Tlb, TlbEntry};
use kernel_vmem::{AddressSpace, AddressSpaceError, Permissions, PhysMapper, VmContext};
use log::{error, trace};

/// A cross-processor TLB invalidation request.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct TlbShootdown {
    pub page: VirtualPage,
}

/// The virtual memory system of a single-processor machine.
#[derive(Debug)]
pub struct Vm<R> {
    frames: FrameAllocator<R>,
    cpu: Cp0,
}

impl<R: BootRam + PhysMapper> Vm<R> {
    pub const fn new(ram: R) -> Self {
        Self {
            frames: FrameAllocator::new(ram),
            cpu: Cp0::new(),
        }
    }

    /// Build the frame table. Until this runs, page allocations steal boot RAM.
    ///
    /// # Panics
    /// If the frame table cannot be built; the machine is unusable then.
    pub fn bootstrap(&self) {
        if let Err(e) = self.frames.bootstrap() {
            panic!("vm: {e}");
        }
    }

    #[inline]
    pub const fn frames(&self) -> &FrameAllocator<R> {
        &self.frames
    }

    #[inline]
    pub const fn cpu(&self) -> &Cp0 {
        &self.cpu
    }

    /// Frame source and physical view for address-space operations.
    #[inline]
    pub const fn cx(&self) -> VmContext<'_, FrameAllocator<R>, FrameAllocator<R>> {
        VmContext::new(&self.frames, &self.frames)
    }

    /// Allocate `pages` kernel pages.
    ///
    /// # Errors
    /// See [`FrameAllocator::alloc_kpages`].
    pub fn alloc_kpages(&self, pages: u32) -> Result<VirtualAddress, FrameAllocError> {
        self.frames.alloc_kpages(pages)
    }

    pub fn free_kpages(&self, va: VirtualAddress) {
        self.frames.free_kpages(va);
    }

    /// # Errors
    /// [`AddressSpaceError::OutOfMemory`] if the root table cannot be allocated.
    pub fn create_space(&self) -> Result<AddressSpace, AddressSpaceError> {
        AddressSpace::create(self.cx())
    }

    /// Deep copy of `space` for `fork`.
    ///
    /// # Errors
    /// [`AddressSpaceError::OutOfMemory`]; nothing is leaked and `space` is
    /// unchanged.
    pub fn copy_space(&self, space: &AddressSpace) -> Result<AddressSpace, AddressSpaceError> {
        space.copy(self.cx())
    }

    /// Release every frame of `space`; returns how many.
    #[must_use]
    pub fn destroy_space(&self, space: AddressSpace) -> usize {
        space.destroy(self.cx())
    }

    /// # Errors
    /// See [`AddressSpace::define_region`].
    pub fn define_region(
        &self,
        space: &mut AddressSpace,
        vbase: VirtualAddress,
        size: u32,
        permissions: Permissions,
    ) -> Result<(), AddressSpaceError> {
        space.define_region(self.cx(), vbase, size, permissions)
    }

    /// Set up the stack window and return the initial stack pointer.
    ///
    /// # Errors
    /// [`AddressSpaceError::OutOfMemory`].
    pub fn define_stack(&self, space: &mut AddressSpace) -> Result<VirtualAddress, AddressSpaceError> {
        space.define_stack(self.cx())
    }

    pub fn prepare_load(&self, space: &mut AddressSpace) {
        space.prepare_load();
    }

    /// End segment loading. Entries refilled while every region was writable
    /// carry the dirty bit, so the TLB is flushed as well.
    pub fn complete_load(&self, space: &mut AddressSpace) {
        space.complete_load();
        self.cpu.tlb().flush();
    }

    /// Switch to `space` on this processor.
    pub fn activate(&self, space: &AddressSpace) {
        let mut tlb = self.cpu.tlb();
        space.activate(&mut *tlb);
    }

    /// Resolve a TLB miss at `addr` in `space`.
    ///
    /// `fault_type` is one of the raw `VM_FAULT_*` codes from [`fault`]. On
    /// success the faulting instruction can be restarted.
    ///
    /// # Errors
    /// - [`FaultError::InvalidFaultType`] for an unknown code.
    /// - [`FaultError::ReadOnly`] for any write to a read-only mapping.
    /// - [`FaultError::NoAddressSpace`] if `space` is `None`.
    /// - [`FaultError::BadAddress`] outside every region and the stack.
    /// - [`FaultError::OutOfMemory`] if no frame was left for the page or its table.
    pub fn fault(
        &self,
        space: Option<&mut AddressSpace>,
        fault_type: u32,
        addr: VirtualAddress,
    ) -> Result<Refill, FaultError> {
        self.resolve(space, fault_type, addr).inspect_err(|e| {
            error!("vm_fault: {e}");
        })
    }

    fn resolve(
        &self,
        space: Option<&mut AddressSpace>,
        fault_type: u32,
        addr: VirtualAddress,
    ) -> Result<Refill, FaultError> {
        match FaultKind::try_from(fault_type)? {
            FaultKind::ReadOnly => return Err(FaultError::ReadOnly(addr)),
            FaultKind::Read | FaultKind::Write => {}
        }
        let space = space.ok_or(FaultError::NoAddressSpace)?;

        let page = addr.page();
        let permissions = space
            .permissions_at(page.base())
            .ok_or(FaultError::BadAddress(addr))?;
        let frame = space
            .ensure_page(self.cx(), page)
            .map_err(|_| FaultError::OutOfMemory(addr))?;

        let entry = TlbEntry::new(
            EntryHi::for_page(page),
            EntryLo::mapping(frame, permissions.writable()),
        );
        let slot = {
            let mut tlb = self.cpu.tlb();
            refill(&mut *tlb, entry)
        };
        trace!("vm_fault: {addr} -> {frame:?} in {slot:?}");
        Ok(slot)
    }

    /// # Panics
    /// Always; only one processor is supported.
    pub fn tlb_shootdown_all(&self) -> ! {
        panic!("vm tried to do tlb shootdown?!");
    }

    /// # Panics
    /// Always; only one processor is supported.
    pub fn tlb_shootdown(&self, _request: &TlbShootdown) -> ! {
        panic!("vm tried to do tlb shootdown?!");
    }
}
