use std::cell::Cell;
use std::rc::Rc;

/// The two asynchronous signals a C64 delivers to the CPU. CIA1 and the
/// VIC drive [`Interrupt::Irq`], CIA2 drives [`Interrupt::Nmi`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupt {
    Irq,
    Nmi,
}

/// A chip-to-CPU interrupt line. Chips pulse it, the CPU drains it at
/// instruction boundaries; pulses between two polls coalesce into one
/// service, as on the real bus.
#[derive(Clone, Default)]
pub struct InterruptLine {
    raised: Rc<Cell<u64>>,
    taken: Rc<Cell<u64>>,
}

impl InterruptLine {
    pub fn raise(&self) {
        self.raised.set(self.raised.get() + 1);
    }

    /// True iff the line was pulsed since the last `take`; consumes the
    /// pending pulses.
    pub fn take(&self) -> bool {
        let pending = self.raised.get() != self.taken.get();
        self.taken.set(self.raised.get());
        pending
    }

    pub fn is_raised(&self) -> bool {
        self.raised.get() != self.taken.get()
    }

    /// Total pulses ever put on the line. Monotonic; lets tests assert
    /// "exactly one pulse" without racing the CPU's poll.
    pub fn pulse_count(&self) -> u64 {
        self.raised.get()
    }
}
