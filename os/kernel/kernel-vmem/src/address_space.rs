//! # Address Space (MIPS32, two-level, software refilled)
//!
//! One [`AddressSpace`] per process: the frame holding its [`PageDirectory`]
//! plus the ordered list of [`Region`]s the program loader defined.
//!
//! ## Highlights
//!
//! - [`AddressSpace::define_region`] / [`AddressSpace::define_stack`] record
//!   valid ranges and pre-create their second-level tables, leaving every leaf
//!   unmapped.
//! - [`AddressSpace::ensure_page`] commits a zeroed frame on first touch
//!   (demand paging); the fault handler calls it on every TLB miss.
//! - [`AddressSpace::copy`] deep-copies tables and page contents for `fork`.
//! - [`AddressSpace::destroy`] returns every frame it owns.
//!
//! ## Ownership
//!
//! Every frame reachable from the root (tables and data pages) belongs to
//! exactly this address space. The structure is not locked: only the owning
//! thread touches it, and `copy` runs before the child thread exists.

use crate::page_table::{
    PageDirectory, PageTable, PdEntry, PdEntryKind, PdIndex, PtEntry, PtEntryKind, split_indices,
};
use crate::region::{Permissions, Region, stack_window};
use crate::{FrameAlloc, PhysMapper, VmContext};
use alloc::vec::Vec;
use kernel_info::errno::{EFAULT, EINVAL, ENOMEM};
use kernel_info::memory::{USERSPACE_TOP, USERSTACK};
use kernel_memory_addresses::{PAGE_SIZE, PhysicalAddress, PhysicalPage, VirtualAddress, VirtualPage};
use kernel_registers::Tlb;
use log::{debug, trace, warn};

/// Handle to a single, concrete address space.
///
/// Must be torn down with [`destroy`](Self::destroy); dropping it leaks every
/// frame it owns.
#[derive(Debug)]
#[must_use = "dropping an address space leaks its frames; call `destroy`"]
pub struct AddressSpace {
    /// Page directory frame.
    root: PhysicalPage,
    regions: Vec<Region>,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum AddressSpaceError {
    #[error("out of memory")]
    OutOfMemory,
    #[error("region has zero size")]
    EmptyRegion,
    #[error("region {base} + {size:#x} does not fit in user space")]
    InvalidRange { base: VirtualAddress, size: u32 },
    #[error("region at {base} ({pages} pages) overlaps an existing region or the stack")]
    Overlap { base: VirtualAddress, pages: u32 },
    #[error("{0} is not mapped")]
    NotMapped(VirtualAddress),
}

impl AddressSpaceError {
    /// Kernel error number for this failure.
    #[must_use]
    pub const fn errno(&self) -> i32 {
        match self {
            Self::OutOfMemory => ENOMEM,
            Self::EmptyRegion | Self::InvalidRange { .. } | Self::Overlap { .. } => EINVAL,
            Self::NotMapped(_) => EFAULT,
        }
    }
}

impl AddressSpace {
    /// A new, empty address space: zeroed page directory, no regions.
    ///
    /// # Errors
    /// [`AddressSpaceError::OutOfMemory`] if no frame is left for the directory.
    pub fn create<A, M>(cx: VmContext<'_, A, M>) -> Result<Self, AddressSpaceError>
    where
        A: FrameAlloc + ?Sized,
        M: PhysMapper + ?Sized,
    {
        let root = cx.alloc_zeroed().ok_or(AddressSpaceError::OutOfMemory)?;
        debug!("as_create: page directory in {root:?}");
        Ok(Self {
            root,
            regions: Vec::new(),
        })
    }

    /// Frame holding the page directory.
    #[inline]
    #[must_use]
    pub const fn root(&self) -> PhysicalPage {
        self.root
    }

    /// Regions in definition order. The stack is not listed.
    #[inline]
    #[must_use]
    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    /// Borrow the page directory.
    #[inline]
    fn directory<'a, M: PhysMapper + ?Sized>(&self, mapper: &M) -> &'a mut PageDirectory {
        // SAFETY: the root frame is owned by this address space and was
        // zeroed at creation, which is a valid empty directory.
        unsafe { mapper.phys_to_mut(self.root.base()) }
    }

    /// Define a region of `size` bytes at `vbase`.
    ///
    /// The range is widened to whole pages (base rounded down, end rounded
    /// up). Second-level tables covering it are created now; the pages
    /// themselves stay unmapped until first touched.
    ///
    /// # Errors
    /// - [`EmptyRegion`](AddressSpaceError::EmptyRegion) for `size == 0`.
    /// - [`InvalidRange`](AddressSpaceError::InvalidRange) if the range leaves user space.
    /// - [`Overlap`](AddressSpaceError::Overlap) if it shares a page with a
    ///   defined region or the stack window.
    /// - [`OutOfMemory`](AddressSpaceError::OutOfMemory) if a table frame
    ///   could not be allocated. The region is not added; tables created so
    ///   far stay with the address space.
    pub fn define_region<A, M>(
        &mut self,
        cx: VmContext<'_, A, M>,
        vbase: VirtualAddress,
        size: u32,
        permissions: Permissions,
    ) -> Result<(), AddressSpaceError>
    where
        A: FrameAlloc + ?Sized,
        M: PhysMapper + ?Sized,
    {
        if size == 0 {
            return Err(AddressSpaceError::EmptyRegion);
        }

        let (base, offset) = vbase.split();
        let span = u64::from(offset.as_u32()) + u64::from(size);
        let pages = span.div_ceil(u64::from(PAGE_SIZE));
        let end = u64::from(base.base().as_u32()) + pages * u64::from(PAGE_SIZE);
        if end > u64::from(USERSPACE_TOP) {
            return Err(AddressSpaceError::InvalidRange { base: vbase, size });
        }
        let pages = u32::try_from(pages)
            .map_err(|_| AddressSpaceError::InvalidRange { base: vbase, size })?;

        let stack = stack_window();
        if self
            .regions
            .iter()
            .chain(core::iter::once(&stack))
            .any(|r| r.overlaps(base, pages))
        {
            return Err(AddressSpaceError::Overlap {
                base: base.base(),
                pages,
            });
        }

        self.ensure_tables(cx, base, pages)?;
        self.regions.push(Region::new(base, pages, permissions));
        debug!(
            "as_define_region: {:?} +{pages} pages r={} w={} x={}",
            base.base(),
            permissions.readable(),
            permissions.writable(),
            permissions.executable()
        );
        Ok(())
    }

    /// Make every region writable while the loader copies segments in.
    pub fn prepare_load(&mut self) {
        for region in &mut self.regions {
            region.prepare_load();
        }
    }

    /// Restore the permissions in effect before [`prepare_load`](Self::prepare_load).
    pub fn complete_load(&mut self) {
        for region in &mut self.regions {
            region.complete_load();
        }
    }

    /// Create the tables for the stack window and return the initial stack
    /// pointer.
    ///
    /// # Errors
    /// [`AddressSpaceError::OutOfMemory`] if a table frame could not be allocated.
    pub fn define_stack<A, M>(
        &mut self,
        cx: VmContext<'_, A, M>,
    ) -> Result<VirtualAddress, AddressSpaceError>
    where
        A: FrameAlloc + ?Sized,
        M: PhysMapper + ?Sized,
    {
        let stack = stack_window();
        self.ensure_tables(cx, stack.base(), stack.pages())?;
        Ok(VirtualAddress::new(USERSTACK))
    }

    /// Permissions at `va`: those of the containing region, else those of the
    /// stack window, else `None` (not a valid user address).
    #[must_use]
    pub fn permissions_at(&self, va: VirtualAddress) -> Option<Permissions> {
        if let Some(region) = self.regions.iter().find(|r| r.contains(va)) {
            return Some(region.permissions());
        }
        let stack = stack_window();
        stack.contains(va).then_some(stack.permissions())
    }

    /// Return the page table for directory slot `pd`, creating it if absent.
    fn ensure_table<A, M>(
        &self,
        cx: VmContext<'_, A, M>,
        pd: PdIndex,
    ) -> Result<PhysicalPage, AddressSpaceError>
    where
        A: FrameAlloc + ?Sized,
        M: PhysMapper + ?Sized,
    {
        let dir = self.directory(cx.mapper);
        match dir.get(pd).kind() {
            PdEntryKind::Table(frame) => Ok(frame),
            PdEntryKind::Absent => {
                let frame = cx.alloc_zeroed().ok_or(AddressSpaceError::OutOfMemory)?;
                dir.set(pd, PdEntry::table(frame));
                trace!("page table for {:?} in {frame:?}", pd.base());
                Ok(frame)
            }
        }
    }

    /// Create every page table covering `pages` pages from `first`.
    #[allow(clippy::cast_possible_truncation)]
    fn ensure_tables<A, M>(
        &self,
        cx: VmContext<'_, A, M>,
        first: VirtualPage,
        pages: u32,
    ) -> Result<(), AddressSpaceError>
    where
        A: FrameAlloc + ?Sized,
        M: PhysMapper + ?Sized,
    {
        if pages == 0 {
            return Ok(());
        }
        let last = VirtualPage::from_number(first.number() + pages - 1);
        let (lo, _) = split_indices(first.base());
        let (hi, _) = split_indices(last.base());
        for i in lo.as_usize()..=hi.as_usize() {
            self.ensure_table(cx, PdIndex::new(i as u16))?;
        }
        Ok(())
    }

    /// Frame backing `page`, committing a zeroed one if the page has none.
    ///
    /// Repeated calls for the same page return the same frame. Does not check
    /// that `page` lies in a region; the caller has done so.
    ///
    /// # Errors
    /// [`AddressSpaceError::OutOfMemory`] if a table or data frame could not
    /// be allocated.
    pub fn ensure_page<A, M>(
        &mut self,
        cx: VmContext<'_, A, M>,
        page: VirtualPage,
    ) -> Result<PhysicalPage, AddressSpaceError>
    where
        A: FrameAlloc + ?Sized,
        M: PhysMapper + ?Sized,
    {
        let (pd, pt) = split_indices(page.base());
        let table_frame = self.ensure_table(cx, pd)?;
        let table = table_mut(cx.mapper, table_frame);
        match table.get(pt).kind() {
            PtEntryKind::Mapped(frame) => Ok(frame),
            PtEntryKind::Unmapped => {
                let frame = cx.alloc_zeroed().ok_or(AddressSpaceError::OutOfMemory)?;
                table.set(pt, PtEntry::mapped(frame));
                trace!("demand page {page:?} -> {frame:?}");
                Ok(frame)
            }
        }
    }

    /// Frame currently backing `page`, without allocating.
    fn mapped_frame<M: PhysMapper + ?Sized>(
        &self,
        mapper: &M,
        page: VirtualPage,
    ) -> Option<PhysicalPage> {
        let (pd, pt) = split_indices(page.base());
        match self.directory(mapper).get(pd).kind() {
            PdEntryKind::Absent => None,
            PdEntryKind::Table(table) => match table_mut(mapper, table).get(pt).kind() {
                PtEntryKind::Mapped(frame) => Some(frame),
                PtEntryKind::Unmapped => None,
            },
        }
    }

    /// Translate `va` to the physical address currently mapped for it.
    #[must_use]
    pub fn translate<A, M>(&self, cx: VmContext<'_, A, M>, va: VirtualAddress) -> Option<PhysicalAddress>
    where
        A: FrameAlloc + ?Sized,
        M: PhysMapper + ?Sized,
    {
        let (page, offset) = va.split();
        self.mapped_frame(cx.mapper, page).map(|f| f.join(offset))
    }

    /// Copy `buf.len()` bytes of user memory starting at `va` into `buf`.
    ///
    /// Only already-mapped pages are read; nothing is demand-paged.
    ///
    /// # Errors
    /// [`AddressSpaceError::NotMapped`] naming the first unmapped address.
    pub fn read<A, M>(
        &self,
        cx: VmContext<'_, A, M>,
        va: VirtualAddress,
        buf: &mut [u8],
    ) -> Result<(), AddressSpaceError>
    where
        A: FrameAlloc + ?Sized,
        M: PhysMapper + ?Sized,
    {
        self.for_each_chunk(cx.mapper, va, buf.len(), |pa, range| {
            cx.mapper.read_phys(pa, &mut buf[range]);
        })
    }

    /// Copy `data` into user memory starting at `va`.
    ///
    /// # Errors
    /// [`AddressSpaceError::NotMapped`] naming the first unmapped address.
    /// Pages before it have already been written.
    pub fn write<A, M>(
        &self,
        cx: VmContext<'_, A, M>,
        va: VirtualAddress,
        data: &[u8],
    ) -> Result<(), AddressSpaceError>
    where
        A: FrameAlloc + ?Sized,
        M: PhysMapper + ?Sized,
    {
        self.for_each_chunk(cx.mapper, va, data.len(), |pa, range| {
            cx.mapper.write_phys(pa, &data[range]);
        })
    }

    /// Split `[va, va + len)` at page boundaries and hand each mapped piece
    /// to `f` as (physical start, byte range within the caller's buffer).
    fn for_each_chunk<M: PhysMapper + ?Sized>(
        &self,
        mapper: &M,
        va: VirtualAddress,
        len: usize,
        mut f: impl FnMut(PhysicalAddress, core::ops::Range<usize>),
    ) -> Result<(), AddressSpaceError> {
        let mut done = 0;
        let mut cur = va;
        while done < len {
            let (page, offset) = cur.split();
            let frame = self
                .mapped_frame(mapper, page)
                .ok_or(AddressSpaceError::NotMapped(cur))?;
            let chunk = (PAGE_SIZE as usize - offset.as_usize()).min(len - done);
            f(frame.join(offset), done..done + chunk);
            done += chunk;
            if done < len {
                #[allow(clippy::cast_possible_truncation)]
                let next = cur.checked_add(chunk as u32);
                cur = next.ok_or(AddressSpaceError::NotMapped(cur))?;
            }
        }
        Ok(())
    }

    /// Deep copy for `fork`: same regions, fresh tables, fresh frames with
    /// identical contents. Nothing is shared with `self`.
    ///
    /// # Errors
    /// [`AddressSpaceError::OutOfMemory`]. The partial copy has already been
    /// destroyed; `self` is untouched.
    pub fn copy<A, M>(&self, cx: VmContext<'_, A, M>) -> Result<Self, AddressSpaceError>
    where
        A: FrameAlloc + ?Sized,
        M: PhysMapper + ?Sized,
    {
        let mut child = Self::create(cx)?;
        child.regions.clone_from(&self.regions);

        if let Err(e) = self.copy_tables_into(cx, &child) {
            let released = child.destroy(cx);
            warn!("as_copy: {e}, discarded partial copy ({released} frames)");
            return Err(e);
        }

        debug!("as_copy: {:?} -> {:?}", self.root, child.root);
        Ok(child)
    }

    fn copy_tables_into<A, M>(
        &self,
        cx: VmContext<'_, A, M>,
        child: &Self,
    ) -> Result<(), AddressSpaceError>
    where
        A: FrameAlloc + ?Sized,
        M: PhysMapper + ?Sized,
    {
        let src_dir = self.directory(cx.mapper);
        let dst_dir = child.directory(cx.mapper);

        for (pd, src_table_frame) in src_dir.tables() {
            let dst_table_frame = cx.alloc_zeroed().ok_or(AddressSpaceError::OutOfMemory)?;
            dst_dir.set(pd, PdEntry::table(dst_table_frame));

            let src_table = table_mut(cx.mapper, src_table_frame);
            let dst_table = table_mut(cx.mapper, dst_table_frame);
            for (pt, src_frame) in src_table.mappings() {
                let dst_frame = cx
                    .frames
                    .alloc_frame()
                    .ok_or(AddressSpaceError::OutOfMemory)?;
                cx.mapper.copy_frame(src_frame, dst_frame);
                dst_table.set(pt, PtEntry::mapped(dst_frame));
            }
        }
        Ok(())
    }

    /// Free every data frame, every page table and the directory.
    ///
    /// Returns the number of frames released.
    #[must_use]
    pub fn destroy<A, M>(mut self, cx: VmContext<'_, A, M>) -> usize
    where
        A: FrameAlloc + ?Sized,
        M: PhysMapper + ?Sized,
    {
        let regions = core::mem::take(&mut self.regions);
        if regions.is_empty() {
            warn!("as_destroy: address space {:?} has no regions", self.root);
        }

        let mut released = 0;
        let dir = self.directory(cx.mapper);
        for (_, table_frame) in dir.tables() {
            let table = table_mut(cx.mapper, table_frame);
            for (_, frame) in table.mappings() {
                cx.frames.free_frame(frame);
                released += 1;
            }
            cx.frames.free_frame(table_frame);
            released += 1;
        }
        cx.frames.free_frame(self.root);
        released += 1;

        debug!("as_destroy: {:?}, {released} frames released", self.root);
        core::mem::forget(self);
        released
    }

    /// Make this the current address space: drop every cached translation so
    /// the next access to each page faults and is refilled from these tables.
    pub fn activate<T: Tlb + ?Sized>(&self, tlb: &mut T) {
        tlb.flush();
        trace!("as_activate: {:?}", self.root);
    }
}

impl Drop for AddressSpace {
    fn drop(&mut self) {
        warn!("address space {:?} dropped without destroy; its frames leak", self.root);
    }
}

/// Borrow the page table in `frame`.
#[inline]
fn table_mut<'a, M: PhysMapper + ?Sized>(mapper: &M, frame: PhysicalPage) -> &'a mut PageTable {
    // SAFETY: only called with frames taken from a directory entry of an
    // address space, which were zeroed when installed.
    unsafe { mapper.phys_to_mut(frame.base()) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_ram::TestRam;
    use kernel_info::memory::USERSTACK_BASE;

    const CODE: u32 = 0x0040_0000;

    fn page(va: u32) -> VirtualPage {
        VirtualPage::containing(va)
    }

    #[test]
    fn create_uses_one_frame_and_maps_nothing() {
        let ram = TestRam::with_frames(16);
        let before = ram.free_count();
        let aspace = AddressSpace::create(ram.cx()).unwrap();
        assert_eq!(ram.free_count(), before - 1);
        assert!(aspace.regions().is_empty());
        assert_eq!(aspace.translate(ram.cx(), VirtualAddress::new(CODE)), None);
        assert_eq!(aspace.directory(&ram).tables().count(), 0);
    }

    #[test]
    fn create_fails_without_frames() {
        let ram = TestRam::with_frames(4);
        ram.limit_free(0);
        assert_eq!(
            AddressSpace::create(ram.cx()).unwrap_err(),
            AddressSpaceError::OutOfMemory
        );
    }

    #[test]
    fn define_region_rounds_to_pages_and_creates_tables() {
        let ram = TestRam::with_frames(16);
        let mut aspace = AddressSpace::create(ram.cx()).unwrap();
        aspace
            .define_region(ram.cx(), VirtualAddress::new(CODE + 0x10), 0x1ff0, Permissions::RX)
            .unwrap();

        let r = &aspace.regions()[0];
        assert_eq!(r.base(), page(CODE));
        assert_eq!(r.pages(), 2);
        assert_eq!(aspace.directory(&ram).tables().count(), 1);
        assert_eq!(aspace.translate(ram.cx(), VirtualAddress::new(CODE)), None);
    }

    #[test]
    fn unaligned_tail_adds_a_page() {
        let ram = TestRam::with_frames(16);
        let mut aspace = AddressSpace::create(ram.cx()).unwrap();
        aspace
            .define_region(ram.cx(), VirtualAddress::new(CODE + 0xfff), 2, Permissions::RO)
            .unwrap();
        assert_eq!(aspace.regions()[0].pages(), 2);
    }

    #[test]
    fn region_spanning_directory_slots_gets_two_tables() {
        let ram = TestRam::with_frames(16);
        let mut aspace = AddressSpace::create(ram.cx()).unwrap();
        aspace
            .define_region(ram.cx(), VirtualAddress::new(0x003f_f000), 2 * PAGE_SIZE, Permissions::RW)
            .unwrap();
        assert_eq!(aspace.directory(&ram).tables().count(), 2);
    }

    #[test]
    fn define_region_out_of_tables_adds_nothing() {
        let ram = TestRam::with_frames(16);
        let mut aspace = AddressSpace::create(ram.cx()).unwrap();

        // enough for the first of two page tables
        ram.limit_free(1);
        assert_eq!(
            aspace.define_region(ram.cx(), VirtualAddress::new(0x003f_f000), 2 * PAGE_SIZE, Permissions::RW),
            Err(AddressSpaceError::OutOfMemory)
        );
        assert!(aspace.regions().is_empty());
        assert_eq!(aspace.permissions_at(VirtualAddress::new(0x003f_f000)), None);
        assert_eq!(ram.free_count(), 0);

        assert_eq!(aspace.define_stack(ram.cx()), Err(AddressSpaceError::OutOfMemory));

        // root + the one table that was created
        assert_eq!(aspace.destroy(ram.cx()), 2);
        assert_eq!(ram.free_count(), 2);
    }

    #[test]
    fn define_region_rejects_bad_requests() {
        let ram = TestRam::with_frames(16);
        let mut aspace = AddressSpace::create(ram.cx()).unwrap();
        let cx = ram.cx();

        assert_eq!(
            aspace.define_region(cx, VirtualAddress::new(CODE), 0, Permissions::RW),
            Err(AddressSpaceError::EmptyRegion)
        );
        assert!(matches!(
            aspace.define_region(cx, VirtualAddress::new(0x7fff_f000), 0x2000, Permissions::RW),
            Err(AddressSpaceError::InvalidRange { .. })
        ));
        assert!(matches!(
            aspace.define_region(cx, VirtualAddress::new(USERSTACK_BASE - PAGE_SIZE), 0x2000, Permissions::RW),
            Err(AddressSpaceError::Overlap { .. })
        ));

        aspace
            .define_region(cx, VirtualAddress::new(CODE), 0x2000, Permissions::RX)
            .unwrap();
        assert_eq!(
            aspace.define_region(cx, VirtualAddress::new(CODE + 0x1000), 0x1000, Permissions::RW),
            Err(AddressSpaceError::Overlap {
                base: VirtualAddress::new(CODE + 0x1000),
                pages: 1
            })
        );
        assert_eq!(aspace.regions().len(), 1);
    }

    #[test]
    fn ensure_page_commits_once_per_page() {
        let ram = TestRam::with_frames(16);
        let mut aspace = AddressSpace::create(ram.cx()).unwrap();
        aspace
            .define_region(ram.cx(), VirtualAddress::new(CODE), 0x2000, Permissions::RW)
            .unwrap();

        let a = aspace.ensure_page(ram.cx(), page(CODE)).unwrap();
        let free = ram.free_count();
        let again = aspace.ensure_page(ram.cx(), page(CODE)).unwrap();
        assert_eq!(a, again);
        assert_eq!(ram.free_count(), free);

        let b = aspace.ensure_page(ram.cx(), page(CODE + PAGE_SIZE)).unwrap();
        assert_ne!(a, b);
        assert_eq!(
            aspace.translate(ram.cx(), VirtualAddress::new(CODE + 0x123)),
            Some(a.join(VirtualAddress::new(0x123).offset()))
        );
    }

    #[test]
    fn ensure_page_creates_a_missing_table() {
        let ram = TestRam::with_frames(16);
        let mut aspace = AddressSpace::create(ram.cx()).unwrap();
        let va = VirtualAddress::new(USERSTACK - 4);
        let before = ram.free_count();

        let frame = aspace.ensure_page(ram.cx(), va.page()).unwrap();
        assert_eq!(ram.free_count(), before - 2);
        assert_eq!(aspace.directory(&ram).tables().count(), 1);
        assert_eq!(aspace.translate(ram.cx(), va), Some(frame.join(va.offset())));

        assert_eq!(aspace.destroy(ram.cx()), 3);
    }

    #[test]
    fn demand_paged_frames_are_zeroed() {
        let ram = TestRam::with_frames(16);
        for n in 1..16 {
            ram.write_phys(PhysicalPage::from_frame_number(n).base(), &[0xAA; 4096]);
        }

        let mut aspace = AddressSpace::create(ram.cx()).unwrap();
        aspace
            .define_region(ram.cx(), VirtualAddress::new(CODE), 0x1000, Permissions::RW)
            .unwrap();
        aspace.ensure_page(ram.cx(), page(CODE)).unwrap();

        let mut buf = [0xFF; 64];
        aspace.read(ram.cx(), VirtualAddress::new(CODE), &mut buf).unwrap();
        assert_eq!(buf, [0; 64]);
    }

    #[test]
    fn read_and_write_cross_pages_but_not_holes() {
        let ram = TestRam::with_frames(16);
        let mut aspace = AddressSpace::create(ram.cx()).unwrap();
        aspace
            .define_region(ram.cx(), VirtualAddress::new(CODE), 0x3000, Permissions::RW)
            .unwrap();
        aspace.ensure_page(ram.cx(), page(CODE)).unwrap();
        aspace.ensure_page(ram.cx(), page(CODE + PAGE_SIZE)).unwrap();

        let at = VirtualAddress::new(CODE + PAGE_SIZE - 2);
        aspace.write(ram.cx(), at, b"abcd").unwrap();
        let mut back = [0u8; 4];
        aspace.read(ram.cx(), at, &mut back).unwrap();
        assert_eq!(&back, b"abcd");

        let hole = VirtualAddress::new(CODE + 2 * PAGE_SIZE);
        assert_eq!(
            aspace.write(ram.cx(), VirtualAddress::new(CODE + 2 * PAGE_SIZE - 1), b"xy"),
            Err(AddressSpaceError::NotMapped(hole))
        );
    }

    #[test]
    fn stack_is_implicitly_valid() {
        let ram = TestRam::with_frames(16);
        let mut aspace = AddressSpace::create(ram.cx()).unwrap();
        let sp = aspace.define_stack(ram.cx()).unwrap();
        assert_eq!(sp.as_u32(), USERSTACK);
        assert_eq!(aspace.directory(&ram).tables().count(), 1);

        let top = aspace.permissions_at(VirtualAddress::new(USERSTACK - 4)).unwrap();
        assert!(top.readable() && top.writable() && !top.executable());
        assert!(aspace.permissions_at(VirtualAddress::new(USERSTACK_BASE)).is_some());
        assert!(aspace.permissions_at(VirtualAddress::new(USERSTACK_BASE - 1)).is_none());
        assert!(aspace.permissions_at(VirtualAddress::new(USERSTACK)).is_none());
    }

    #[test]
    fn load_bracketing_toggles_writability() {
        let ram = TestRam::with_frames(16);
        let mut aspace = AddressSpace::create(ram.cx()).unwrap();
        aspace
            .define_region(ram.cx(), VirtualAddress::new(CODE), 0x1000, Permissions::RX)
            .unwrap();
        let va = VirtualAddress::new(CODE);

        aspace.prepare_load();
        assert!(aspace.permissions_at(va).unwrap().writable());
        aspace.complete_load();
        assert_eq!(aspace.permissions_at(va), Some(Permissions::RX));
    }

    #[test]
    fn copy_is_deep() {
        let ram = TestRam::with_frames(32);
        let mut parent = AddressSpace::create(ram.cx()).unwrap();
        parent
            .define_region(ram.cx(), VirtualAddress::new(CODE), 0x2000, Permissions::RW)
            .unwrap();
        parent.ensure_page(ram.cx(), page(CODE)).unwrap();
        let va = VirtualAddress::new(CODE + 8);
        parent.write(ram.cx(), va, b"parent").unwrap();

        let child = parent.copy(ram.cx()).unwrap();
        assert_eq!(child.regions(), parent.regions());
        assert_ne!(child.root(), parent.root());
        assert_ne!(child.translate(ram.cx(), va), parent.translate(ram.cx(), va));

        let mut buf = [0u8; 6];
        child.read(ram.cx(), va, &mut buf).unwrap();
        assert_eq!(&buf, b"parent");

        child.write(ram.cx(), va, b"child!").unwrap();
        parent.read(ram.cx(), va, &mut buf).unwrap();
        assert_eq!(&buf, b"parent");
        assert_eq!(child.translate(ram.cx(), VirtualAddress::new(CODE + PAGE_SIZE)), None);
    }

    #[test]
    fn copy_out_of_memory_leaves_no_trace() {
        let ram = TestRam::with_frames(32);
        let mut parent = AddressSpace::create(ram.cx()).unwrap();
        parent
            .define_region(ram.cx(), VirtualAddress::new(CODE), 0x3000, Permissions::RW)
            .unwrap();
        for i in 0..3 {
            parent.ensure_page(ram.cx(), page(CODE + i * PAGE_SIZE)).unwrap();
        }
        parent.write(ram.cx(), VirtualAddress::new(CODE), b"keep").unwrap();

        // root + table + one data page, then out
        ram.limit_free(3);
        assert_eq!(parent.copy(ram.cx()).unwrap_err(), AddressSpaceError::OutOfMemory);
        assert_eq!(ram.free_count(), 3);

        let mut buf = [0u8; 4];
        parent.read(ram.cx(), VirtualAddress::new(CODE), &mut buf).unwrap();
        assert_eq!(&buf, b"keep");
    }

    #[test]
    fn destroy_returns_every_frame() {
        let ram = TestRam::with_frames(32);
        let before = ram.free_count();

        let mut aspace = AddressSpace::create(ram.cx()).unwrap();
        aspace
            .define_region(ram.cx(), VirtualAddress::new(CODE), 0x2000, Permissions::RW)
            .unwrap();
        aspace.define_stack(ram.cx()).unwrap();
        aspace.ensure_page(ram.cx(), page(CODE)).unwrap();
        aspace.ensure_page(ram.cx(), page(USERSTACK - PAGE_SIZE)).unwrap();

        // root + two tables + two data pages
        assert_eq!(aspace.destroy(ram.cx()), 5);
        assert_eq!(ram.free_count(), before);
    }

    #[test]
    fn destroy_without_regions_still_frees_root() {
        let ram = TestRam::with_frames(8);
        let before = ram.free_count();
        let aspace = AddressSpace::create(ram.cx()).unwrap();
        assert_eq!(aspace.destroy(ram.cx()), 1);
        assert_eq!(ram.free_count(), before);
    }

    #[test]
    fn dropped_space_keeps_its_frames() {
        let ram = TestRam::with_frames(8);
        let mut aspace = AddressSpace::create(ram.cx()).unwrap();
        aspace
            .define_region(ram.cx(), VirtualAddress::new(CODE), PAGE_SIZE, Permissions::RW)
            .unwrap();
        aspace.ensure_page(ram.cx(), page(CODE)).unwrap();
        let free = ram.free_count();

        drop(aspace);
        assert_eq!(ram.free_count(), free);
    }

    #[test]
    fn errno_mapping() {
        assert_eq!(AddressSpaceError::OutOfMemory.errno(), ENOMEM);
        assert_eq!(AddressSpaceError::EmptyRegion.errno(), EINVAL);
        assert_eq!(AddressSpaceError::NotMapped(VirtualAddress::zero()).errno(), EFAULT);
    }
}
