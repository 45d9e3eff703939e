use kernel_sync::{InterruptMask, IrqGuard, SpinLock};
use std::panic;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Processor stand-in that counts enable-bit writes.
struct Cpu {
    enabled: AtomicBool,
    writes: AtomicUsize,
}

impl Cpu {
    fn new(enabled: bool) -> Self {
        Self {
            enabled: AtomicBool::new(enabled),
            writes: AtomicUsize::new(0),
        }
    }
}

impl InterruptMask for Cpu {
    fn interrupts_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    fn set_interrupts_enabled(&self, enabled: bool) {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.enabled.store(enabled, Ordering::SeqCst);
    }
}

#[test]
fn guard_disables_and_restores() {
    let cpu = Cpu::new(true);
    {
        let g = IrqGuard::new(&cpu);
        assert!(g.restores_interrupts());
        assert!(!cpu.interrupts_enabled());
    }
    assert!(cpu.interrupts_enabled());
    assert_eq!(cpu.writes.load(Ordering::SeqCst), 2);
}

#[test]
fn guard_leaves_disabled_state_alone() {
    let cpu = Cpu::new(false);
    {
        let g = IrqGuard::new(&cpu);
        assert!(!g.restores_interrupts());
    }
    assert!(!cpu.interrupts_enabled());
    assert_eq!(cpu.writes.load(Ordering::SeqCst), 0);
}

#[test]
fn nested_guards_restore_only_at_the_outermost() {
    let cpu = Cpu::new(true);
    let outer = IrqGuard::new(&cpu);
    {
        let _inner = IrqGuard::new(&cpu);
        assert!(!cpu.interrupts_enabled());
    }
    assert!(!cpu.interrupts_enabled());
    drop(outer);
    assert!(cpu.interrupts_enabled());
}

#[test]
fn early_exit_restores_interrupts() {
    fn bail(cpu: &Cpu) -> Result<(), ()> {
        let _g = IrqGuard::new(cpu);
        Err::<(), ()>(())?;
        Ok(())
    }

    let cpu = Cpu::new(true);
    assert!(bail(&cpu).is_err());
    assert!(cpu.interrupts_enabled());

    let res = panic::catch_unwind(panic::AssertUnwindSafe(|| {
        let _g = IrqGuard::new(&cpu);
        panic!("fault in critical section");
    }));
    assert!(res.is_err());
    assert!(cpu.interrupts_enabled());
}

#[test]
fn lock_irq_holds_both_until_drop() {
    let cpu = Cpu::new(true);
    let slots = SpinLock::new([0u32; 4]);
    {
        let mut g = slots.lock_irq(&cpu);
        g[2] = 9;
        assert!(slots.is_locked());
        assert!(!cpu.interrupts_enabled());
    }
    assert!(!slots.is_locked());
    assert!(cpu.interrupts_enabled());
    assert_eq!(slots.lock()[2], 9);
}
