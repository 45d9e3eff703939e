use crate::{EntryHi, EntryLo};

/// Number of TLB entries on the R3000.
pub const NUM_TLB: usize = 64;

/// Lowest value of the `Random` register. Slots below this are "wired" and
/// never chosen by `tlbwr`.
pub const TLB_RANDOM_LOWER: usize = 8;

/// One TLB slot: tag plus data.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct TlbEntry {
    pub hi: EntryHi,
    pub lo: EntryLo,
}

impl TlbEntry {
    #[inline]
    #[must_use]
    pub const fn new(hi: EntryHi, lo: EntryLo) -> Self {
        Self { hi, lo }
    }

    /// Contents of an unused `slot`.
    #[inline]
    #[must_use]
    pub const fn invalid(slot: usize) -> Self {
        Self::new(EntryHi::invalid(slot), EntryLo::invalid())
    }

    #[inline]
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.lo.valid()
    }
}

/// The TLB instructions.
///
/// | Method | Instruction |
/// |--------|-------------|
/// | [`read`](Tlb::read) | `tlbr` |
/// | [`write`](Tlb::write) | `tlbwi` |
/// | [`write_random`](Tlb::write_random) | `tlbwr` |
/// | [`probe`](Tlb::probe) | `tlbp` |
///
/// Slot indices must be below [`NUM_TLB`].
pub trait Tlb {
    /// Read the entry in `slot`.
    fn read(&self, slot: usize) -> TlbEntry;

    /// Overwrite the entry in `slot`.
    fn write(&mut self, entry: TlbEntry, slot: usize);

    /// Overwrite the slot selected by the `Random` register and return it.
    ///
    /// The returned slot is always in `TLB_RANDOM_LOWER..NUM_TLB`.
    fn write_random(&mut self, entry: TlbEntry) -> usize;

    /// Slot whose tag matches `hi`, if any.
    fn probe(&self, hi: EntryHi) -> Option<usize>;

    /// Reset every slot to its invalid encoding.
    fn flush(&mut self) {
        for slot in 0..NUM_TLB {
            self.write(TlbEntry::invalid(slot), slot);
        }
    }
}

/// Software model of the R3000 TLB.
///
/// The `Random` register counts down from `NUM_TLB - 1` to
/// [`TLB_RANDOM_LOWER`] and wraps; here it advances on every `tlbwr` instead
/// of every cycle.
#[derive(Debug, Clone)]
pub struct SoftTlb {
    entries: [TlbEntry; NUM_TLB],
    random: usize,
}

impl SoftTlb {
    /// A TLB with every slot invalid.
    #[must_use]
    pub const fn new() -> Self {
        let mut entries = [TlbEntry::invalid(0); NUM_TLB];
        let mut slot = 1;
        while slot < NUM_TLB {
            entries[slot] = TlbEntry::invalid(slot);
            slot += 1;
        }
        Self {
            entries,
            random: NUM_TLB - 1,
        }
    }

    /// Current value of the `Random` register.
    #[inline]
    #[must_use]
    pub const fn random(&self) -> usize {
        self.random
    }

    /// Number of slots whose `V` bit is set.
    #[must_use]
    pub fn valid_entries(&self) -> usize {
        self.entries.iter().filter(|e| e.is_valid()).count()
    }

    fn step_random(&mut self) {
        self.random = if self.random <= TLB_RANDOM_LOWER {
            NUM_TLB - 1
        } else {
            self.random - 1
        };
    }
}

impl Default for SoftTlb {
    fn default() -> Self {
        Self::new()
    }
}

impl Tlb for SoftTlb {
    fn read(&self, slot: usize) -> TlbEntry {
        assert!(slot < NUM_TLB, "tlbr: slot {slot} out of range");
        self.entries[slot]
    }

    fn write(&mut self, entry: TlbEntry, slot: usize) {
        assert!(slot < NUM_TLB, "tlbwi: slot {slot} out of range");
        self.entries[slot] = entry;
    }

    fn write_random(&mut self, entry: TlbEntry) -> usize {
        let slot = self.random;
        self.entries[slot] = entry;
        self.step_random();
        slot
    }

    fn probe(&self, hi: EntryHi) -> Option<usize> {
        self.entries.iter().position(|e| {
            e.hi.vpn() == hi.vpn() && (e.lo.global() || e.hi.asid() == hi.asid())
        })
    }
}
