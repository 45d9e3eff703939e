use bitfield_struct::bitfield;

/// CP0 `Status`, the R3000 subset.
///
/// The low six bits form a three-deep stack of (interrupt enable, kernel/user)
/// pairs that is pushed on exception entry and popped by `rfe`. Only the
/// current pair matters to the VM system.
#[bitfield(u32)]
#[derive(PartialEq, Eq)]
pub struct Status {
    /// Bit 0 — `IEc`: interrupts currently enabled.
    pub iec: bool,
    /// Bit 1 — `KUc`: currently in user mode.
    pub kuc: bool,
    /// Bit 2 — `IEp`: previous interrupt enable.
    pub iep: bool,
    /// Bit 3 — `KUp`: previous user mode.
    pub kup: bool,
    /// Bit 4 — `IEo`: old interrupt enable.
    pub ieo: bool,
    /// Bit 5 — `KUo`: old user mode.
    pub kuo: bool,
    /// Bits 6–31 — interrupt mask, cache control and coprocessor usability.
    #[bits(26)]
    pub rest: u32,
}
