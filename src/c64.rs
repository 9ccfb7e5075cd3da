//! Machine aggregation and scheduling.
//!
//! Construction order follows the hardware's wiring: the CIAs exist
//! first, the bus aggregates them, the VIC gets a bus handle for its
//! memory view and is then attached to the bus (the one deliberate
//! reference cycle in the core), and the CPU sees only the bus plus the
//! two interrupt lines.

use crate::cia::CIA;
use crate::interrupt::InterruptLine;
use crate::mem::MemoryBus;
use crate::mos6510::MOS6510;
use crate::peripheral::Peripherals;
use crate::rom;
use crate::rom::{RomError, RomTarget};
use crate::utils::R2C;
use crate::vic;
use crate::vic::VicII;
use std::path::Path;

pub struct C64 {
    pub cpu: MOS6510,
    pub bus: R2C<MemoryBus>,
    pub cia1: R2C<CIA>,
    pub cia2: R2C<CIA>,
    pub vic: R2C<VicII>,
    pub irq: InterruptLine,
    pub nmi: InterruptLine,
    cycles: u64,
}

impl C64 {
    pub fn new(peripherals: R2C<dyn Peripherals>) -> Self {
        let irq = InterruptLine::default();
        let nmi = InterruptLine::default();
        let cia1 = r2c_new!(CIA::new_chip1(irq.clone(), peripherals.clone()));
        let cia2 = r2c_new!(CIA::new_chip2(nmi.clone()));
        let bus = r2c_new!(MemoryBus::new(cia1.clone(), cia2.clone()));
        let vic = r2c_new!(VicII::new(bus.clone(), peripherals, irq.clone()));
        bus.borrow_mut().set_vic(vic.clone());
        let cpu = MOS6510::new(bus.clone(), irq.clone(), nmi.clone());
        C64 { cpu, bus, cia1, cia2, vic, irq, nmi, cycles: 0 }
    }

    pub fn load_rom(&self, bytes: &[u8], base: u16, target: RomTarget) {
        self.bus.borrow_mut().load_rom(bytes, base, target);
    }

    /// BASIC, KERNAL and character generator from a directory of stock
    /// image dumps.
    pub fn load_stock_roms(&self, dir: &Path) -> Result<(), RomError> {
        for (image, base) in &[
            (rom::BASIC_ROM_IMAGE, rom::BASIC_ROM_BASE),
            (rom::KERNAL_ROM_IMAGE, rom::KERNAL_ROM_BASE),
            (rom::CHAR_ROM_IMAGE, rom::CHAR_ROM_BASE),
        ] {
            let bytes = rom::read_image(&dir.join(image), *base)?;
            self.load_rom(&bytes, *base, RomTarget::Rom);
        }
        Ok(())
    }

    pub fn reset(&mut self) {
        self.cpu.reset();
    }

    /// One raster line of emulation: the VIC processes the line and
    /// selects the CPU's cycle share, the CIAs tick once per cycle, then
    /// the CPU consumes its share. Interrupt lines raised by the chips
    /// are polled by the CPU at instruction boundaries within the same
    /// line.
    pub fn step_line(&mut self) {
        let budget = self.vic.borrow_mut().step_line();
        for _ in 0..vic::LINE_CYCLES {
            self.cia1.borrow_mut().step();
            self.cia2.borrow_mut().step();
        }
        self.cpu.feed_cycles(budget);
        self.cycles += vic::LINE_CYCLES as u64;
    }

    /// Total clock cycles emulated so far.
    pub fn cycles(&self) -> u64 {
        self.cycles
    }
}
