//! # Kernel Error Numbers
//!
//! The subset of `<kern/errno.h>` returned by the VM system to the trap and
//! syscall layers.

/// Out of memory.
pub const ENOMEM: i32 = 3;

/// Bad memory reference.
pub const EFAULT: i32 = 6;

/// Invalid argument.
pub const EINVAL: i32 = 8;
