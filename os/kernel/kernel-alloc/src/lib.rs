//! # Kernel Physical Memory Allocation
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │              FrameAllocator                         │
//! │    • alloc_kpages / free_kpages (kseg0 addresses)   │
//! │    • FrameAlloc for page tables and user pages      │
//! └─────────────────┬───────────────────────────────────┘
//!                   │ SpinLock
//! ┌─────────────────▼───────────────────────────────────┐
//! │              FrameTable                             │
//! │    • one descriptor per frame, indexed by frame     │
//! │    • LIFO free list threaded through descriptors    │
//! └─────────────────┬───────────────────────────────────┘
//!                   │ ram_getsize / ram_stealmem
//! ┌─────────────────▼───────────────────────────────────┐
//! │              BootRam (SimulatedRam)                 │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! ## Physical layout after bootstrap
//!
//! ```text
//! 0 ┌──────────────┐
//!   │ kernel image │
//!   ├──────────────┤ pages stolen before bootstrap
//!   │ stolen pages │
//!   ├──────────────┤ first (ram_getsize)
//!   │ frame table  │ reserved, never handed out
//!   ├──────────────┤
//!   │ free frames  │ one per alloc_kpages(1)
//!   └──────────────┘ last
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use kernel_alloc::{FrameAllocator, SimulatedRam};
//! use kernel_info::boot::RamConfig;
//!
//! let frames = FrameAllocator::new(SimulatedRam::new(RamConfig::SYS161_DEFAULT));
//! frames.bootstrap().unwrap();
//!
//! let before = frames.free_frames();
//! let page = frames.alloc_kpages(1).unwrap();
//! assert_eq!(frames.free_frames(), before - 1);
//! frames.free_kpages(page);
//! assert_eq!(frames.free_frames(), before);
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

extern crate alloc;

pub mod frame_alloc;
pub mod frame_table;
pub mod ram;

pub use crate::frame_alloc::{FrameAllocError, FrameAllocator};
pub use crate::ram::{BootRam, SimulatedRam};
