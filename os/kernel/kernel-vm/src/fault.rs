//! # TLB Miss Handling
//!
//! The trap layer hands every TLB exception to [`Vm::fault`](crate::Vm::fault)
//! as a raw fault code plus the faulting address. This module decodes the
//! code, defines what can go wrong, and implements the refill policy.

use kernel_info::errno::{EFAULT, EINVAL, ENOMEM};
use kernel_memory_addresses::VirtualAddress;
use kernel_registers::{NUM_TLB, Tlb, TlbEntry};
use log::trace;

/// Load or instruction fetch missed the TLB.
pub const VM_FAULT_READ: u32 = 0;
/// Store missed the TLB.
pub const VM_FAULT_WRITE: u32 = 1;
/// Store hit a TLB entry without the dirty bit.
pub const VM_FAULT_READONLY: u32 = 2;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum FaultKind {
    Read,
    Write,
    ReadOnly,
}

impl TryFrom<u32> for FaultKind {
    type Error = FaultError;

    fn try_from(code: u32) -> Result<Self, Self::Error> {
        match code {
            VM_FAULT_READ => Ok(Self::Read),
            VM_FAULT_WRITE => Ok(Self::Write),
            VM_FAULT_READONLY => Ok(Self::ReadOnly),
            other => Err(FaultError::InvalidFaultType(other)),
        }
    }
}

/// A fault that could not be resolved. All of these end the faulting process
/// except [`OutOfMemory`](Self::OutOfMemory), which the caller may report.
#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum FaultError {
    #[error("write to read-only page at {0}")]
    ReadOnly(VirtualAddress),
    #[error("unknown fault type {0}")]
    InvalidFaultType(u32),
    #[error("fault without an address space")]
    NoAddressSpace,
    #[error("{0} lies outside every region and the stack")]
    BadAddress(VirtualAddress),
    #[error("out of memory resolving a fault at {0}")]
    OutOfMemory(VirtualAddress),
}

impl FaultError {
    /// Kernel error number for this failure.
    #[must_use]
    pub const fn errno(&self) -> i32 {
        match self {
            Self::ReadOnly(_) | Self::NoAddressSpace | Self::BadAddress(_) => EFAULT,
            Self::InvalidFaultType(_) => EINVAL,
            Self::OutOfMemory(_) => ENOMEM,
        }
    }
}

/// Where [`refill`] put the new translation.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Refill {
    /// Overwrote a stale entry for the same page.
    Replaced(usize),
    /// Took a slot that held no translation.
    Filled(usize),
    /// Evicted the translation in a randomly chosen slot.
    Evicted(usize),
}

impl Refill {
    #[must_use]
    pub const fn slot(self) -> usize {
        match self {
            Self::Replaced(slot) | Self::Filled(slot) | Self::Evicted(slot) => slot,
        }
    }
}

/// Install `entry`, keeping at most one translation per page.
///
/// An existing entry for the same page is replaced in place, otherwise the
/// first invalid slot is used, otherwise the `Random` register picks a victim.
/// The caller must hold the TLB with interrupts disabled for the whole call.
pub fn refill<T: Tlb + ?Sized>(tlb: &mut T, entry: TlbEntry) -> Refill {
    let refill = if let Some(slot) = tlb.probe(entry.hi) {
        tlb.write(entry, slot);
        Refill::Replaced(slot)
    } else if let Some(slot) = (0..NUM_TLB).find(|&i| !tlb.read(i).is_valid()) {
        tlb.write(entry, slot);
        Refill::Filled(slot)
    } else {
        Refill::Evicted(tlb.write_random(entry))
    };
    trace!("tlb: {:?} -> {:?}, {refill:?}", entry.hi.page(), entry.lo.frame());
    refill
}

#[cfg(test)]
mod tests {
    use super::*;
    use kernel_memory_addresses::{PhysicalPage, VirtualPage};
    use kernel_registers::{EntryHi, EntryLo, SoftTlb, TLB_RANDOM_LOWER};

    fn entry(vpn: u32, pfn: u32) -> TlbEntry {
        TlbEntry::new(
            EntryHi::for_page(VirtualPage::from_number(vpn)),
            EntryLo::mapping(PhysicalPage::from_frame_number(pfn), false),
        )
    }

    #[test]
    fn fault_codes_decode() {
        assert_eq!(FaultKind::try_from(0), Ok(FaultKind::Read));
        assert_eq!(FaultKind::try_from(1), Ok(FaultKind::Write));
        assert_eq!(FaultKind::try_from(2), Ok(FaultKind::ReadOnly));
        assert_eq!(FaultKind::try_from(7), Err(FaultError::InvalidFaultType(7)));
    }

    #[test]
    fn errno_mapping() {
        let va = VirtualAddress::new(0x1000);
        assert_eq!(FaultError::ReadOnly(va).errno(), EFAULT);
        assert_eq!(FaultError::BadAddress(va).errno(), EFAULT);
        assert_eq!(FaultError::NoAddressSpace.errno(), EFAULT);
        assert_eq!(FaultError::InvalidFaultType(9).errno(), EINVAL);
        assert_eq!(FaultError::OutOfMemory(va).errno(), ENOMEM);
    }

    #[test]
    fn fills_invalid_slots_in_order() {
        let mut tlb = SoftTlb::new();
        assert_eq!(refill(&mut tlb, entry(1, 100)), Refill::Filled(0));
        assert_eq!(refill(&mut tlb, entry(2, 101)), Refill::Filled(1));
        assert_eq!(tlb.valid_entries(), 2);
    }

    #[test]
    fn same_page_is_replaced_in_place() {
        let mut tlb = SoftTlb::new();
        refill(&mut tlb, entry(1, 100));
        refill(&mut tlb, entry(2, 101));
        assert_eq!(refill(&mut tlb, entry(1, 200)), Refill::Replaced(0));
        assert_eq!(tlb.valid_entries(), 2);
        assert_eq!(tlb.read(0).lo.frame(), PhysicalPage::from_frame_number(200));
    }

    #[test]
    fn full_tlb_evicts_exactly_one_unwired_slot() {
        let mut tlb = SoftTlb::new();
        for vpn in 0..NUM_TLB as u32 {
            assert!(matches!(refill(&mut tlb, entry(vpn, vpn)), Refill::Filled(_)));
        }
        let Refill::Evicted(slot) = refill(&mut tlb, entry(500, 500)) else {
            panic!("expected an eviction");
        };
        assert!((TLB_RANDOM_LOWER..NUM_TLB).contains(&slot));
        assert_eq!(tlb.valid_entries(), NUM_TLB);
        assert_eq!(tlb.probe(entry(500, 0).hi), Some(slot));
    }
}
