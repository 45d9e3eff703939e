use kernel_alloc::SimulatedRam;
use kernel_info::boot::RamConfig;
use kernel_memory_addresses::{PAGE_SIZE, VirtualAddress};
use kernel_vm::Vm;
use kernel_vm::logger::{Console, KernelLogger};
use kernel_vmem::Permissions;
use log::LevelFilter;
use std::sync::Mutex;

struct Capture(Mutex<String>);

impl Console for Capture {
    fn write_str(&self, s: &str) {
        self.0.lock().unwrap().push_str(s);
    }
}

static LOGGER: KernelLogger<Capture> =
    KernelLogger::new(Capture(Mutex::new(String::new())), LevelFilter::Warn);

fn take() -> String {
    std::mem::take(&mut *LOGGER.console().0.lock().unwrap())
}

#[test]
fn dropping_a_space_without_destroy_warns() {
    LOGGER.init().unwrap();
    let vm = Vm::new(SimulatedRam::new(RamConfig::with_usable_frames(16)));
    vm.bootstrap();
    take();

    let mut space = vm.create_space().unwrap();
    vm.define_region(&mut space, VirtualAddress::new(0x0040_0000), PAGE_SIZE, Permissions::RW)
        .unwrap();
    assert_eq!(vm.destroy_space(space), 2);
    assert!(!take().contains("dropped without destroy"));

    let mut space = vm.create_space().unwrap();
    vm.define_region(&mut space, VirtualAddress::new(0x0040_0000), PAGE_SIZE, Permissions::RW)
        .unwrap();
    let free = vm.frames().free_frames();
    drop(space);
    assert_eq!(vm.frames().free_frames(), free);
    assert!(take().contains("dropped without destroy; its frames leak"));
}
