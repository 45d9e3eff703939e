use kernel_alloc::SimulatedRam;
use kernel_info::boot::RamConfig;
use kernel_info::errno::{EFAULT, EINVAL, ENOMEM};
use kernel_info::memory::{USERSTACK, USERSTACK_BASE};
use kernel_memory_addresses::{PAGE_SIZE, PhysicalPage, VirtualAddress};
use kernel_registers::{EntryHi, NUM_TLB, Tlb};
use kernel_sync::InterruptMask;
use kernel_vm::Vm;
use kernel_vm::fault::{FaultError, Refill, VM_FAULT_READ, VM_FAULT_READONLY, VM_FAULT_WRITE};
use kernel_vmem::{AddressSpace, PhysMapper, Permissions};

const CODE: u32 = 0x0040_0000;
const DATA: u32 = 0x1000_0000;

fn vm(usable: u32) -> Vm<SimulatedRam> {
    let vm = Vm::new(SimulatedRam::new(RamConfig::with_usable_frames(usable)));
    vm.bootstrap();
    vm
}

fn space(vm: &Vm<SimulatedRam>) -> AddressSpace {
    let mut space = vm.create_space().unwrap();
    vm.define_region(&mut space, VirtualAddress::new(CODE), 2 * PAGE_SIZE, Permissions::RX)
        .unwrap();
    vm.define_region(&mut space, VirtualAddress::new(DATA), 2 * PAGE_SIZE, Permissions::RW)
        .unwrap();
    vm.define_stack(&mut space).unwrap();
    vm.activate(&space);
    space
}

fn installed_frame(vm: &Vm<SimulatedRam>, va: VirtualAddress) -> PhysicalPage {
    let tlb = vm.cpu().tlb();
    let slot = tlb.probe(EntryHi::for_page(va.page())).unwrap();
    tlb.read(slot).lo.frame()
}

#[test]
fn first_touch_commits_a_zeroed_frame_and_reuses_it() {
    let vm = vm(64);
    let mut space = space(&vm);
    let va = VirtualAddress::new(DATA + 0x123);

    let before = vm.frames().free_frames();
    vm.fault(Some(&mut space), VM_FAULT_READ, va).unwrap();
    assert_eq!(vm.frames().free_frames(), before - 1);
    let frame = installed_frame(&vm, va);

    let mut page = [0xffu8; PAGE_SIZE as usize];
    vm.frames().read_phys(frame.base(), &mut page);
    assert!(page.iter().all(|&b| b == 0));

    vm.activate(&space);
    vm.fault(Some(&mut space), VM_FAULT_WRITE, va).unwrap();
    assert_eq!(vm.frames().free_frames(), before - 1);
    assert_eq!(installed_frame(&vm, va), frame);

    let next = VirtualAddress::new(DATA + PAGE_SIZE);
    vm.fault(Some(&mut space), VM_FAULT_WRITE, next).unwrap();
    assert_ne!(installed_frame(&vm, next), frame);
    assert_eq!(vm.frames().free_frames(), before - 2);
}

#[test]
fn stack_fault_without_table_commits_table_and_page() {
    let vm = vm(16);
    let mut space = vm.create_space().unwrap();
    vm.activate(&space);
    let va = VirtualAddress::new(USERSTACK - 4);

    let before = vm.frames().free_frames();
    vm.fault(Some(&mut space), VM_FAULT_WRITE, va).unwrap();
    assert_eq!(vm.frames().free_frames(), before - 2);
    assert_eq!(
        space.translate(vm.cx(), va),
        Some(installed_frame(&vm, va).join(va.offset()))
    );
    assert_eq!(vm.destroy_space(space), 3);
}

#[test]
fn dirty_bit_follows_region_writability() {
    let vm = vm(64);
    let mut space = space(&vm);

    vm.fault(Some(&mut space), VM_FAULT_READ, VirtualAddress::new(CODE)).unwrap();
    vm.fault(Some(&mut space), VM_FAULT_WRITE, VirtualAddress::new(DATA)).unwrap();
    vm.fault(Some(&mut space), VM_FAULT_WRITE, VirtualAddress::new(USERSTACK - 4)).unwrap();

    let tlb = vm.cpu().tlb();
    let lo = |va: u32| {
        let slot = tlb.probe(EntryHi::for_page(VirtualAddress::new(va).page())).unwrap();
        tlb.read(slot).lo
    };
    assert!(lo(CODE).valid());
    assert!(!lo(CODE).dirty());
    assert!(lo(DATA).dirty());
    assert!(lo(USERSTACK - 4).dirty());
}

#[test]
fn readonly_fault_is_always_fatal() {
    let vm = vm(64);
    let mut space = space(&vm);
    let before = vm.frames().free_frames();

    let va = VirtualAddress::new(DATA);
    let err = vm.fault(Some(&mut space), VM_FAULT_READONLY, va).unwrap_err();
    assert_eq!(err, FaultError::ReadOnly(va));
    assert_eq!(err.errno(), EFAULT);
    assert_eq!(vm.frames().free_frames(), before);
}

#[test]
fn unknown_fault_type_is_invalid() {
    let vm = vm(64);
    let mut space = space(&vm);
    let err = vm.fault(Some(&mut space), 3, VirtualAddress::new(DATA)).unwrap_err();
    assert_eq!(err, FaultError::InvalidFaultType(3));
    assert_eq!(err.errno(), EINVAL);
}

#[test]
fn fault_without_address_space_fails() {
    let vm = vm(16);
    let err = vm.fault(None, VM_FAULT_READ, VirtualAddress::new(DATA)).unwrap_err();
    assert_eq!(err, FaultError::NoAddressSpace);
    assert_eq!(err.errno(), EFAULT);
}

#[test]
fn addresses_outside_regions_and_stack_are_fatal() {
    let vm = vm(64);
    let mut space = space(&vm);
    let before = vm.frames().free_frames();

    for va in [
        0,
        CODE - 1,
        CODE + 2 * PAGE_SIZE,
        DATA + 2 * PAGE_SIZE,
        USERSTACK_BASE - 1,
        USERSTACK,
    ] {
        let va = VirtualAddress::new(va);
        assert_eq!(
            vm.fault(Some(&mut space), VM_FAULT_READ, va),
            Err(FaultError::BadAddress(va))
        );
    }
    assert_eq!(vm.frames().free_frames(), before);
    assert_eq!(vm.cpu().tlb().valid_entries(), 0);
}

#[test]
fn fresh_space_resolves_nothing() {
    let vm = vm(16);
    let mut space = vm.create_space().unwrap();
    let va = VirtualAddress::new(DATA);
    assert_eq!(
        vm.fault(Some(&mut space), VM_FAULT_READ, va),
        Err(FaultError::BadAddress(va))
    );
    assert_eq!(space.translate(vm.cx(), va), None);
    assert_eq!(vm.destroy_space(space), 1);
}

#[test]
fn out_of_frames_is_reported() {
    // 4 usable frames: table + root + one page table leaves one data frame.
    let vm = vm(4);
    let mut space = vm.create_space().unwrap();
    vm.define_region(&mut space, VirtualAddress::new(DATA), 2 * PAGE_SIZE, Permissions::RW)
        .unwrap();
    assert_eq!(vm.frames().free_frames(), 1);

    vm.fault(Some(&mut space), VM_FAULT_WRITE, VirtualAddress::new(DATA)).unwrap();
    let va = VirtualAddress::new(DATA + PAGE_SIZE);
    let err = vm.fault(Some(&mut space), VM_FAULT_WRITE, va).unwrap_err();
    assert_eq!(err, FaultError::OutOfMemory(va));
    assert_eq!(err.errno(), ENOMEM);
}

#[test]
fn refill_fills_invalid_slots_before_evicting() {
    let vm = vm(128);
    let mut space = vm.create_space().unwrap();
    vm.define_region(
        &mut space,
        VirtualAddress::new(DATA),
        (NUM_TLB as u32 + 1) * PAGE_SIZE,
        Permissions::RW,
    )
    .unwrap();
    vm.activate(&space);

    for k in 0..NUM_TLB {
        let va = VirtualAddress::new(DATA + k as u32 * PAGE_SIZE);
        let refill = vm.fault(Some(&mut space), VM_FAULT_READ, va).unwrap();
        assert_eq!(refill, Refill::Filled(k));
        assert_eq!(vm.cpu().tlb().valid_entries(), k + 1);
    }

    let before: Vec<_> = {
        let tlb = vm.cpu().tlb();
        (0..NUM_TLB).map(|i| tlb.read(i)).collect()
    };
    let va = VirtualAddress::new(DATA + NUM_TLB as u32 * PAGE_SIZE);
    let Refill::Evicted(victim) = vm.fault(Some(&mut space), VM_FAULT_READ, va).unwrap() else {
        panic!("a full TLB must evict");
    };

    let tlb = vm.cpu().tlb();
    let changed: Vec<_> = (0..NUM_TLB).filter(|&i| tlb.read(i) != before[i]).collect();
    assert_eq!(changed, [victim]);
    assert_eq!(tlb.valid_entries(), NUM_TLB);
}

#[test]
fn repeated_fault_keeps_one_entry_per_page() {
    let vm = vm(64);
    let mut space = space(&vm);
    let va = VirtualAddress::new(DATA);

    let first = vm.fault(Some(&mut space), VM_FAULT_READ, va).unwrap();
    let second = vm.fault(Some(&mut space), VM_FAULT_WRITE, va).unwrap();
    assert_eq!(second, Refill::Replaced(first.slot()));
    assert_eq!(vm.cpu().tlb().valid_entries(), 1);
}

#[test]
fn refill_restores_interrupts() {
    let vm = vm(64);
    let mut space = space(&vm);
    assert!(vm.cpu().interrupts_enabled());
    vm.fault(Some(&mut space), VM_FAULT_READ, VirtualAddress::new(DATA)).unwrap();
    assert!(vm.cpu().interrupts_enabled());
    let _ = vm.fault(Some(&mut space), VM_FAULT_READ, VirtualAddress::new(0));
    assert!(vm.cpu().interrupts_enabled());
}

#[test]
fn complete_load_drops_writable_translations() {
    let vm = vm(64);
    let mut space = space(&vm);
    let code = VirtualAddress::new(CODE);

    vm.prepare_load(&mut space);
    vm.fault(Some(&mut space), VM_FAULT_WRITE, code).unwrap();
    assert!(installed_entry_dirty(&vm, code));

    vm.complete_load(&mut space);
    assert_eq!(vm.cpu().tlb().valid_entries(), 0);
    vm.fault(Some(&mut space), VM_FAULT_READ, code).unwrap();
    assert!(!installed_entry_dirty(&vm, code));
}

fn installed_entry_dirty(vm: &Vm<SimulatedRam>, va: VirtualAddress) -> bool {
    let tlb = vm.cpu().tlb();
    let slot = tlb.probe(EntryHi::for_page(va.page())).unwrap();
    tlb.read(slot).lo.dirty()
}

#[test]
#[should_panic(expected = "vm tried to do tlb shootdown?!")]
fn shootdown_is_unsupported() {
    vm(4).tlb_shootdown_all();
}
