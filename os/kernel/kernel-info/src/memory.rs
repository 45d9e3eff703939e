//! # Memory Layout

use kernel_memory_addresses::{PAGE_SIZE, PhysicalAddress, VirtualAddress};

/// Start of the user segment.
pub const MIPS_KUSEG: u32 = 0x0000_0000;

/// Start of the direct-mapped, cached kernel segment.
///
/// Physical address `pa` is visible to the kernel at `MIPS_KSEG0 + pa`.
pub const MIPS_KSEG0: u32 = 0x8000_0000;

/// Start of the direct-mapped, uncached kernel segment.
pub const MIPS_KSEG1: u32 = 0xa000_0000;

/// Start of the TLB-mapped kernel segment.
pub const MIPS_KSEG2: u32 = 0xc000_0000;

/// Size of the physical window reachable through `kseg0`.
pub const KSEG0_SIZE: u32 = MIPS_KSEG1 - MIPS_KSEG0;

/// First address past user space.
pub const USERSPACE_TOP: u32 = MIPS_KSEG0;

/// Initial user stack pointer; the stack grows down from here.
pub const USERSTACK: u32 = USERSPACE_TOP;

/// Number of pages in the fixed user stack window below [`USERSTACK`].
pub const VM_STACKPAGES: u32 = 16;

/// Lowest address of the user stack window.
pub const USERSTACK_BASE: u32 = USERSTACK - VM_STACKPAGES * PAGE_SIZE;

const _: () = {
    assert!(USERSTACK.is_multiple_of(PAGE_SIZE));
    assert!(USERSTACK_BASE < USERSTACK);
    assert!(MIPS_KSEG0 > MIPS_KUSEG);
};

/// Translate a physical address into its `kseg0` kernel virtual address.
///
/// This is the only place where the fixed offset between the two spaces is
/// applied.
#[inline]
#[must_use]
pub const fn paddr_to_kvaddr(pa: PhysicalAddress) -> VirtualAddress {
    debug_assert!(pa.as_u32() < KSEG0_SIZE, "physical address not reachable via kseg0");
    VirtualAddress::new(pa.as_u32() + MIPS_KSEG0)
}

/// Translate a `kseg0` kernel virtual address back into a physical address.
#[inline]
#[must_use]
pub const fn kvaddr_to_paddr(va: VirtualAddress) -> PhysicalAddress {
    debug_assert!(is_kseg0(va), "not a kseg0 address");
    PhysicalAddress::new(va.as_u32() - MIPS_KSEG0)
}

/// Whether `va` lies in the direct-mapped `kseg0` segment.
#[inline]
#[must_use]
pub const fn is_kseg0(va: VirtualAddress) -> bool {
    va.as_u32() >= MIPS_KSEG0 && va.as_u32() < MIPS_KSEG1
}

/// Whether `va` is a user-segment address.
#[inline]
#[must_use]
pub const fn is_user(va: VirtualAddress) -> bool {
    va.as_u32() < USERSPACE_TOP
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kseg0_translation_is_an_offset() {
        let pa = PhysicalAddress::new(0x0004_2000);
        let va = paddr_to_kvaddr(pa);
        assert_eq!(va.as_u32(), 0x8004_2000);
        assert!(is_kseg0(va));
        assert_eq!(kvaddr_to_paddr(va), pa);
    }

    #[test]
    fn stack_window_is_below_kseg0() {
        assert_eq!(USERSTACK_BASE, 0x7fff_0000);
        assert!(is_user(VirtualAddress::new(USERSTACK - 1)));
        assert!(!is_user(VirtualAddress::new(USERSTACK)));
    }
}
