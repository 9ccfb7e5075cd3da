//! The two MOS 6526 Complex Interface Adapters.
//!
//! Both chips share one register layout; they differ in what hangs off
//! their ports and which CPU line they pulse. CIA1 (0xDC00) scans the
//! keyboard matrix and drives IRQ; CIA2 (0xDD00) holds the VIC bank
//! select in port A and drives NMI.
//!
//! Register map, mirrored every 16 bytes within each chip's 256-byte
//! window:
//!
//! | offset | write                       | read                        |
//! |--------|-----------------------------|-----------------------------|
//! | 0x0    | data port A                 | CIA1: 0xFF, CIA2: port A    |
//! | 0x1    | data port B                 | CIA1: keyboard row, CIA2: B |
//! | 0x2/3  | direction A / B             | verbatim                    |
//! | 0x4/5  | timer A latch lo/hi         | timer A counter lo/hi       |
//! | 0x6/7  | timer B latch lo/hi         | timer B counter lo/hi       |
//! | 0x8..B | TOD (stub, discarded)       | 0                           |
//! | 0xC    | serial data register        | verbatim                    |
//! | 0xD    | bit 7 sets/clears mask bits | IRQ status, cleared on read |
//! | 0xE/F  | timer A / B control         | verbatim                    |

pub mod keyboard;

use crate::interrupt::InterruptLine;
use crate::peripheral::Peripherals;
use crate::utils::R2C;

bitflags! {
    /// Interrupt sources of a 6526. Only the timers fire here; TOD,
    /// serial and FLAG stay quiet but their mask bits are honored.
    #[derive(Default)]
    pub struct InterruptSources: u8 {
        const TIMER_A    = 0b0000_0001;
        const TIMER_B    = 0b0000_0010;
        const TOD_ALARM  = 0b0000_0100;
        const SERIAL_REG = 0b0000_1000;
        const FLAG_LINE  = 0b0001_0000;
    }
}

const IRQ_ASSERTED: u8 = 0b1000_0000;

const CTRL_START: u8 = 0b0000_0001;
const CTRL_ONE_SHOT: u8 = 0b0000_1000;
const CTRL_FORCE_LOAD: u8 = 0b0001_0000;

/// One 16-bit down-counter. Writes to the timer registers land in the
/// latch; the counter picks the latch up on underflow or force-load.
struct Timer {
    latch: u16,
    counter: u16,
    running: bool,
    one_shot: bool,
    control: u8,
}

impl Timer {
    fn new() -> Self {
        Timer { latch: 0, counter: 0, running: false, one_shot: false, control: 0 }
    }

    fn write_control(&mut self, val: u8) {
        self.control = val;
        self.running = val & CTRL_START != 0;
        self.one_shot = val & CTRL_ONE_SHOT != 0;
        if val & CTRL_FORCE_LOAD != 0 {
            self.counter = self.latch;
        }
    }

    /// Advance one tick; true on underflow.
    fn step(&mut self) -> bool {
        if !self.running {
            return false;
        }
        self.counter = self.counter.wrapping_sub(1);
        if self.counter != 0 {
            return false;
        }
        self.counter = self.latch;
        if self.one_shot {
            self.running = false;
            self.control &= !CTRL_START;
        }
        true
    }
}

pub struct CIA {
    name: &'static str,

    port_a: u8,
    port_b: u8,
    ddr_a: u8,
    ddr_b: u8,
    serial_data: u8,

    timer_a: Timer,
    timer_b: Timer,
    irq_status: u8,
    irq_mask: InterruptSources,

    /// IRQ for chip 1, NMI for chip 2.
    line: InterruptLine,
    /// Keyboard matrix source; present on chip 1 only.
    peripherals: Option<R2C<dyn Peripherals>>,
}

impl CIA {
    pub fn new_chip1(line: InterruptLine, peripherals: R2C<dyn Peripherals>) -> Self {
        CIA::new("CIA1", line, Some(peripherals))
    }

    pub fn new_chip2(line: InterruptLine) -> Self {
        CIA::new("CIA2", line, None)
    }

    fn new(name: &'static str, line: InterruptLine, peripherals: Option<R2C<dyn Peripherals>>) -> Self {
        CIA {
            name,
            port_a: 0,
            port_b: 0,
            ddr_a: 0,
            ddr_b: 0,
            serial_data: 0,
            timer_a: Timer::new(),
            timer_b: Timer::new(),
            irq_status: 0,
            irq_mask: InterruptSources::default(),
            line,
            peripherals,
        }
    }

    /// Low two bits of port A, complemented, select the VIC's 16 KiB bank.
    /// The bus reads this when resolving the VIC view.
    pub fn port_a(&self) -> u8 {
        self.port_a
    }

    /// One CPU-rate tick: advance both timers; a masked-in underflow
    /// latches the status bit, asserts bit 7 and pulses the chip's line
    /// exactly once.
    pub fn step(&mut self) {
        let mut fired = InterruptSources::empty();
        if self.timer_a.step() {
            fired |= InterruptSources::TIMER_A;
        }
        if self.timer_b.step() {
            fired |= InterruptSources::TIMER_B;
        }
        for source in [InterruptSources::TIMER_A, InterruptSources::TIMER_B].iter() {
            if fired.contains(*source) && self.irq_mask.contains(*source) {
                self.irq_status |= source.bits() | IRQ_ASSERTED;
                self.line.raise();
            }
        }
    }

    pub fn read(&mut self, addr: u16) -> u8 {
        match addr & 0x0f {
            0x0 => match &self.peripherals {
                // Keyboard lines idle high; with no key held and no
                // joystick attached chip 1 reads back all ones.
                Some(_) => 0xff,
                None => self.port_a,
            },
            0x1 => match &self.peripherals {
                Some(peripherals) => Self::scan_keyboard(self.port_a, &**peripherals),
                None => self.port_b,
            },
            0x2 => self.ddr_a,
            0x3 => self.ddr_b,
            0x4 => self.timer_a.counter as u8,
            0x5 => (self.timer_a.counter >> 8) as u8,
            0x6 => self.timer_b.counter as u8,
            0x7 => (self.timer_b.counter >> 8) as u8,
            0x8..=0xb => 0, // TOD stub
            0xc => self.serial_data,
            0xd => {
                let status = self.irq_status;
                self.irq_status = 0;
                status
            }
            0xe => self.timer_a.control,
            0xf => self.timer_b.control,
            _ => unreachable!("offsets are masked to 4 bits"),
        }
    }

    pub fn write(&mut self, addr: u16, val: u8) {
        match addr & 0x0f {
            0x0 => self.port_a = val,
            0x1 => self.port_b = val,
            0x2 => self.ddr_a = val,
            0x3 => self.ddr_b = val,
            0x4 => self.timer_a.latch = (self.timer_a.latch & 0xff00) | val as u16,
            0x5 => self.timer_a.latch = (self.timer_a.latch & 0x00ff) | ((val as u16) << 8),
            0x6 => self.timer_b.latch = (self.timer_b.latch & 0xff00) | val as u16,
            0x7 => self.timer_b.latch = (self.timer_b.latch & 0x00ff) | ((val as u16) << 8),
            0x8..=0xb => (), // TOD stub: writes discarded
            0xc => self.serial_data = val,
            0xd => {
                // bit 7 decides whether the other set bits set or clear
                // their mask bits; zero bits stay untouched
                let sources = InterruptSources::from_bits_truncate(val);
                if val & 0x80 != 0 {
                    self.irq_mask.insert(sources);
                } else {
                    self.irq_mask.remove(sources);
                }
                log::debug!("{} irq mask now {:?}", self.name, self.irq_mask);
            }
            0xe => {
                self.timer_a.write_control(val);
                log::debug!("{} timer A control {:#04x}", self.name, val);
            }
            0xf => {
                self.timer_b.write_control(val);
                log::debug!("{} timer B control {:#04x}", self.name, val);
            }
            _ => unreachable!("offsets are masked to 4 bits"),
        }
    }

    /// The KERNAL drives a complemented row mask onto port A and samples
    /// port B: 0xFF selects nothing, otherwise the first zero bit names
    /// the row to fetch from the matrix.
    fn scan_keyboard(written_a: u8, peripherals: &std::cell::RefCell<dyn Peripherals>) -> u8 {
        if written_a == 0xff {
            return 0xff;
        }
        let row = (!written_a).trailing_zeros() as u8;
        peripherals.borrow().read_keyboard_matrix(row)
    }
}
