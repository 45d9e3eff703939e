//! # Boot RAM Configuration

use kernel_memory_addresses::PAGE_SIZE;

/// Geometry of physical memory handed to the VM system at boot.
///
/// Physical memory starts at address 0. The first `kernel_image_bytes` hold the
/// kernel image and exception vectors and are never handed out; everything
/// from there up to `ram_bytes` is available to the boot allocator and later
/// to the frame table.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct RamConfig {
    /// Total installed RAM in bytes.
    pub ram_bytes: u32,

    /// Bytes occupied by the loaded kernel, starting at physical 0.
    pub kernel_image_bytes: u32,
}

impl RamConfig {
    /// The default System/161 machine: 4 MiB of RAM, 256 KiB kernel.
    pub const SYS161_DEFAULT: Self = Self::new(4 * 1024 * 1024, 256 * 1024);

    #[must_use]
    pub const fn new(ram_bytes: u32, kernel_image_bytes: u32) -> Self {
        Self {
            ram_bytes,
            kernel_image_bytes,
        }
    }

    /// A machine with `frames` usable frames above a one-page kernel image.
    #[must_use]
    pub const fn with_usable_frames(frames: u32) -> Self {
        Self::new((frames + 1) * PAGE_SIZE, PAGE_SIZE)
    }

    /// Installed RAM, rounded down to whole pages.
    #[must_use]
    pub const fn ram_top(&self) -> u32 {
        self.ram_bytes & !(PAGE_SIZE - 1)
    }

    /// First byte past the kernel image, rounded up to a page boundary.
    #[must_use]
    pub const fn first_free(&self) -> u32 {
        self.kernel_image_bytes.next_multiple_of(PAGE_SIZE)
    }
}

impl Default for RamConfig {
    fn default() -> Self {
        Self::SYS161_DEFAULT
    }
}

const _: () = {
    assert!(RamConfig::SYS161_DEFAULT.first_free() < RamConfig::SYS161_DEFAULT.ram_top());
};
