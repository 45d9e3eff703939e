//! In-crate test machine: a few frames of "physical RAM" and a LIFO free list.

use crate::{FrameAlloc, PhysMapper, VmContext};
use core::cell::RefCell;
use core::ptr::NonNull;
use kernel_memory_addresses::{PAGE_SIZE, PhysicalAddress, PhysicalPage};

#[repr(align(4096))]
struct Aligned4K([u8; PAGE_SIZE as usize]);

/// Frame 0 is never handed out so that a zero entry can't alias a real frame.
pub struct TestRam {
    base: NonNull<Aligned4K>,
    frames: usize,
    free: RefCell<Vec<PhysicalPage>>,
}

impl TestRam {
    pub fn with_frames(frames: usize) -> Self {
        let backing: Box<[Aligned4K]> = (0..frames)
            .map(|_| Aligned4K([0; PAGE_SIZE as usize]))
            .collect();
        let base = NonNull::new(Box::into_raw(backing).cast::<Aligned4K>()).unwrap();
        let free = (1..frames as u32)
            .rev()
            .map(PhysicalPage::from_frame_number)
            .collect();
        Self {
            base,
            frames,
            free: RefCell::new(free),
        }
    }

    pub fn free_count(&self) -> usize {
        self.free.borrow().len()
    }

    /// Pretend all but `n` frames are in use.
    pub fn limit_free(&self, n: usize) {
        let mut free = self.free.borrow_mut();
        let len = free.len();
        free.drain(..len - n);
    }

    pub fn cx(&self) -> VmContext<'_, Self, Self> {
        VmContext::new(self, self)
    }
}

impl FrameAlloc for TestRam {
    fn alloc_frame(&self) -> Option<PhysicalPage> {
        self.free.borrow_mut().pop()
    }

    fn free_frame(&self, frame: PhysicalPage) {
        let mut free = self.free.borrow_mut();
        assert!(!free.contains(&frame), "double free of {frame:?}");
        free.push(frame);
    }
}

impl PhysMapper for TestRam {
    fn phys_to_ptr(&self, pa: PhysicalAddress, len: usize) -> NonNull<u8> {
        let end = pa.as_u32() as usize + len;
        assert!(end <= self.frames * PAGE_SIZE as usize, "{pa:?} outside test RAM");
        // SAFETY: in bounds of the backing allocation.
        unsafe { self.base.cast::<u8>().add(pa.as_u32() as usize) }
    }
}

impl Drop for TestRam {
    fn drop(&mut self) {
        let slice = core::ptr::slice_from_raw_parts_mut(self.base.as_ptr(), self.frames);
        // SAFETY: created by Box::into_raw in with_frames.
        drop(unsafe { Box::from_raw(slice) });
    }
}
