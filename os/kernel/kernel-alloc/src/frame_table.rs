//! # Frame Table
//!
//! One [`FrameTableEntry`] per frame of the usable range, stored in the
//! leading frames of that range. Free frames are threaded into a singly
//! linked list by frame *index* (offset from the first usable frame):
//!
//! ```text
//!  index:   0     1   |  2      3      4      5
//!          [table  ]  | [→3]  [→4]   [→5]   [end]
//!          reserved   |  ^ head
//! ```
//!
//! The list is LIFO: a freed frame becomes the new head.

use bitfield_struct::bitfield;
use core::ptr::NonNull;
use kernel_memory_addresses::{PAGE_SIZE, PhysicalPage};

/// Bookkeeping for one physical frame.
#[bitfield(u32)]
#[derive(PartialEq, Eq)]
pub struct FrameTableEntry {
    /// Bit 0 — frame is on the free list.
    pub free: bool,

    /// Bit 1 — `next` is meaningful (not the end of the list).
    pub has_next: bool,

    /// Bits 2–31 — index of the next free frame.
    #[bits(30)]
    pub next: u32,
}

impl FrameTableEntry {
    /// Allocated (or reserved) frame.
    pub const IN_USE: Self = Self::new();

    /// Free frame followed by `next` on the list.
    #[inline]
    #[must_use]
    pub const fn free_with_next(next: Option<u32>) -> Self {
        match next {
            Some(next) => Self::new().with_free(true).with_has_next(true).with_next(next),
            None => Self::new().with_free(true),
        }
    }

    #[inline]
    #[must_use]
    pub const fn next_index(self) -> Option<u32> {
        if self.has_next() { Some(self.next()) } else { None }
    }
}

/// Why a frame was not put back on the free list.
#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum Leak {
    #[error("frame lies below the end of the frame table")]
    Reserved,
    #[error("frame lies outside the managed range")]
    OutOfRange,
    #[error("frame is already free")]
    DoubleFree,
}

/// The arena of frame descriptors plus the free-list head.
pub struct FrameTable {
    entries: NonNull<FrameTableEntry>,
    /// Frame of index 0.
    first: PhysicalPage,
    frames: u32,
    reserved: u32,
    head: Option<u32>,
    free: u32,
}

// Safety: the entries are only touched through `&mut self`, i.e. under the
// allocator lock.
unsafe impl Send for FrameTable {}

/// Bytes of one [`FrameTableEntry`].
pub const ENTRY_BYTES: u32 = 4;

const _: () = assert!(size_of::<FrameTableEntry>() == ENTRY_BYTES as usize);

impl FrameTable {
    /// Frames needed to hold the table for `frames` frames.
    #[must_use]
    pub const fn table_frames(frames: u32) -> u32 {
        (frames * ENTRY_BYTES).div_ceil(PAGE_SIZE)
    }

    /// Build the table in place over `frames` frames starting at `first`.
    ///
    /// Index `i < table_frames(frames)` is marked in use; the rest form the
    /// free list in ascending order.
    ///
    /// # Safety
    /// `entries` must point to `frames` writable, exclusively owned entries
    /// that stay valid for the lifetime of the table.
    #[must_use]
    pub unsafe fn init(entries: NonNull<FrameTableEntry>, first: PhysicalPage, frames: u32) -> Self {
        let reserved = Self::table_frames(frames);
        debug_assert!(reserved < frames);

        let mut table = Self {
            entries,
            first,
            frames,
            reserved,
            head: (reserved < frames).then_some(reserved),
            free: frames.saturating_sub(reserved),
        };

        let slots = table.entries_mut();
        for (i, slot) in (0..frames).zip(slots.iter_mut()) {
            *slot = if i < reserved {
                FrameTableEntry::IN_USE
            } else {
                FrameTableEntry::free_with_next((i + 1 < frames).then_some(i + 1))
            };
        }
        table
    }

    fn entries_mut(&mut self) -> &mut [FrameTableEntry] {
        // SAFETY: init's contract.
        unsafe { core::slice::from_raw_parts_mut(self.entries.as_ptr(), self.frames as usize) }
    }

    fn entries(&self) -> &[FrameTableEntry] {
        // SAFETY: init's contract.
        unsafe { core::slice::from_raw_parts(self.entries.as_ptr(), self.frames as usize) }
    }

    fn frame_at(&self, index: u32) -> PhysicalPage {
        PhysicalPage::from_frame_number(self.first.frame_number() + index)
    }

    /// Index of `frame`, or `None` if it is not managed by this table.
    fn index_of(&self, frame: PhysicalPage) -> Option<u32> {
        let index = frame.frame_number().checked_sub(self.first.frame_number())?;
        (index < self.frames).then_some(index)
    }

    /// Pop the head of the free list.
    pub fn pop(&mut self) -> Option<PhysicalPage> {
        let index = self.head?;
        let entries = self.entries_mut();
        let entry = entries[index as usize];
        debug_assert!(entry.free(), "free list names an in-use frame");
        entries[index as usize] = FrameTableEntry::IN_USE;
        self.head = entry.next_index();
        self.free -= 1;
        Some(self.frame_at(index))
    }

    /// Push `frame` onto the head of the free list.
    ///
    /// # Errors
    /// The frame is left untouched and the reason returned when it is part of
    /// the table itself, outside the managed range, or already free.
    pub fn push(&mut self, frame: PhysicalPage) -> Result<(), Leak> {
        let index = self.index_of(frame).ok_or(Leak::OutOfRange)?;
        if index < self.reserved {
            return Err(Leak::Reserved);
        }
        let head = self.head;
        let entry = &mut self.entries_mut()[index as usize];
        if entry.free() {
            return Err(Leak::DoubleFree);
        }
        *entry = FrameTableEntry::free_with_next(head);
        self.head = Some(index);
        self.free += 1;
        Ok(())
    }

    /// Whether `frame` is currently on the free list.
    #[must_use]
    pub fn is_free(&self, frame: PhysicalPage) -> bool {
        self.index_of(frame)
            .is_some_and(|i| self.entries()[i as usize].free())
    }

    /// First frame handed out by the table (just past its own storage).
    #[must_use]
    pub fn first_allocatable(&self) -> PhysicalPage {
        self.frame_at(self.reserved)
    }

    #[must_use]
    pub const fn free_frames(&self) -> u32 {
        self.free
    }

    #[must_use]
    pub const fn total_frames(&self) -> u32 {
        self.frames
    }

    #[must_use]
    pub const fn reserved_frames(&self) -> u32 {
        self.reserved
    }
}
