//! The C64 memory bus: 64 KiB RAM and ROM shadows, PLA bank switching
//! driven by the CPU port register at 0x0001, I/O dispatch to the chips,
//! and the VIC's separate 14-bit view of the address space.
//!
//! Bank resolution per region (LORAM/HIRAM/CHAREN are the low three bits
//! of RAM[0x0001]):
//!
//! | region        | condition                  | mode            |
//! |---------------|----------------------------|-----------------|
//! | 0xE000-0xFFFF | HIRAM                      | KERNAL ROM      |
//! | 0xA000-0xBFFF | LORAM and HIRAM            | BASIC ROM       |
//! | 0xD000-0xDFFF | (LORAM or HIRAM) and CHAREN| I/O             |
//! | 0xD000-0xDFFF | (LORAM or HIRAM)           | character ROM   |
//! | otherwise     |                            | RAM             |
//!
//! Writes always land in RAM, even where the address currently reads ROM
//! (RAM-under-ROM); I/O-mode writes go to the addressed chip instead.

use crate::cia::CIA;
use crate::color_ram::ColorRAM;
use crate::rom::RomTarget;
use crate::utils::R2C;
use crate::vic::VicII;

/// The 6510's on-chip port at 0x0001; its low three bits select the
/// banking configuration.
pub const CPU_PORT: u16 = 0x0001;

/// The on-chip data direction register at 0x0000. Direction semantics are
/// not modeled; it reads back the power-on default.
const CPU_PORT_DDR_DEFAULT: u8 = 0x2f;

bitflags! {
    pub struct CpuControlLines: u8 {
        const LORAM  = 0b001;
        const HIRAM  = 0b010;
        const CHAREN = 0b100;
    }
}

impl Default for CpuControlLines {
    fn default() -> Self {
        CpuControlLines::all()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BankMode {
    Ram,
    Rom,
    Io,
}

pub struct MemoryBus {
    ram: Box<[u8; 0x1_0000]>,
    rom: Box<[u8; 0x1_0000]>,
    color_ram: ColorRAM,
    cia1: R2C<CIA>,
    cia2: R2C<CIA>,
    /// Attached after construction; the VIC in turn holds a bus handle
    /// for its memory view.
    vic: Option<R2C<VicII>>,
}

fn zeroed_64k() -> Box<[u8; 0x1_0000]> {
    use std::convert::TryInto;
    vec![0u8; 0x1_0000].into_boxed_slice().try_into().expect("length is 0x10000")
}

impl MemoryBus {
    pub fn new(cia1: R2C<CIA>, cia2: R2C<CIA>) -> Self {
        let mut bus = MemoryBus {
            ram: zeroed_64k(),
            rom: zeroed_64k(),
            color_ram: ColorRAM::default(),
            cia1,
            cia2,
            vic: None,
        };
        bus.ram[CPU_PORT as usize] = CpuControlLines::default().bits();
        bus
    }

    pub fn set_vic(&mut self, vic: R2C<VicII>) {
        self.vic = Some(vic);
    }

    fn vic(&self) -> &R2C<VicII> {
        self.vic.as_ref().expect("VIC attached during machine construction")
    }

    fn control_lines(&self) -> CpuControlLines {
        CpuControlLines::from_bits_truncate(self.ram[CPU_PORT as usize])
    }

    pub fn bank_mode(&self, addr: u16) -> BankMode {
        let lines = self.control_lines();
        let loram = lines.contains(CpuControlLines::LORAM);
        let hiram = lines.contains(CpuControlLines::HIRAM);
        let charen = lines.contains(CpuControlLines::CHAREN);
        match addr {
            0xe000..=0xffff if hiram => BankMode::Rom,
            0xa000..=0xbfff if loram && hiram => BankMode::Rom,
            0xd000..=0xdfff if (loram || hiram) && charen => BankMode::Io,
            0xd000..=0xdfff if loram || hiram => BankMode::Rom,
            _ => BankMode::Ram,
        }
    }

    pub fn read(&self, addr: u16) -> u8 {
        if addr == 0x0000 {
            return CPU_PORT_DDR_DEFAULT;
        }
        match self.bank_mode(addr) {
            BankMode::Rom => self.rom[addr as usize],
            BankMode::Io => self.io_read(addr),
            BankMode::Ram => self.ram[addr as usize],
        }
    }

    pub fn read_word(&self, addr: u16) -> u16 {
        self.read(addr) as u16 | ((self.read(addr.wrapping_add(1)) as u16) << 8)
    }

    pub fn write(&mut self, addr: u16, val: u8) {
        if addr == 0x0000 {
            log::debug!("write {:#04x} to CPU port DDR ignored (directions not modeled)", val);
            return;
        }
        if addr == CPU_PORT {
            if (self.ram[CPU_PORT as usize] ^ val) & 0b111 != 0 {
                log::info!(
                    "bank switch: {:03b} -> {:03b}",
                    self.ram[CPU_PORT as usize] & 0b111,
                    val & 0b111
                );
            }
            self.ram[CPU_PORT as usize] = val;
            return;
        }
        if self.bank_mode(addr) == BankMode::Io {
            match addr {
                0xd000..=0xd3ff => self.vic().borrow_mut().write(addr, val),
                0xd400..=0xd7ff => (), // SID stub: writes discarded
                0xd800..=0xdbff => self.color_ram.write(addr - 0xd800, val),
                0xdc00..=0xdcff => self.cia1.borrow_mut().write(addr, val),
                0xdd00..=0xddff => self.cia2.borrow_mut().write(addr, val),
                0xde00..=0xdfff => (), // expansion I/O stub
                _ => unreachable!("I/O mode only covers 0xd000-0xdfff"),
            }
            return;
        }
        // RAM-under-ROM: the write lands in RAM regardless of what the
        // address currently reads
        self.ram[addr as usize] = val;
    }

    fn io_read(&self, addr: u16) -> u8 {
        match addr {
            0xd000..=0xd3ff => self.vic().borrow().read(addr),
            0xd400..=0xd7ff => 0, // SID stub
            0xd800..=0xdbff => self.color_ram.read(addr - 0xd800),
            0xdc00..=0xdcff => self.cia1.borrow_mut().read(addr),
            0xdd00..=0xddff => self.cia2.borrow_mut().read(addr),
            0xde00..=0xdfff => 0, // expansion I/O stub
            _ => unreachable!("I/O mode only covers 0xd000-0xdfff"),
        }
    }

    /// The VIC's 14-bit view. CIA2 port A (complemented low two bits)
    /// selects the 16 KiB bank; within banks 0 and 2 the character ROM is
    /// hard-wired over 0x1000-0x1FFF resp. 0x9000-0x9FFF. Everything else
    /// resolves like a CPU read, except the VIC sees RAM where the CPU
    /// sees I/O.
    pub fn vic_read(&self, addr: u16) -> u8 {
        let bank = ((!self.cia2.borrow().port_a() & 0b11) as u16) << 14;
        let addr = bank + (addr & 0x3fff);
        if (0x1000..0x2000).contains(&addr) || (0x9000..0xa000).contains(&addr) {
            return self.rom[(crate::rom::CHAR_ROM_BASE + (addr & 0x0fff)) as usize];
        }
        match self.bank_mode(addr) {
            BankMode::Rom => self.rom[addr as usize],
            _ => self.ram[addr as usize],
        }
    }

    /// Color RAM as the VIC sees it: always reachable, not subject to
    /// banking.
    pub fn color_ram_read(&self, idx: u16) -> u8 {
        self.color_ram.read(idx)
    }

    /// Load an image into one of the shadows. Firmware goes to the ROM
    /// shadow and becomes visible through banking; test programs go
    /// straight to RAM.
    pub fn load_rom(&mut self, bytes: &[u8], base: u16, target: RomTarget) {
        assert!(
            base as usize + bytes.len() <= 0x1_0000,
            "image of {} bytes does not fit at {:#06x}",
            bytes.len(),
            base
        );
        let shadow = match target {
            RomTarget::Ram => &mut self.ram,
            RomTarget::Rom => &mut self.rom,
        };
        shadow[base as usize..base as usize + bytes.len()].copy_from_slice(bytes);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interrupt::InterruptLine;

    fn bus() -> MemoryBus {
        let cia1 = r2c_new!(CIA::new_chip2(InterruptLine::default()));
        let cia2 = r2c_new!(CIA::new_chip2(InterruptLine::default()));
        MemoryBus::new(cia1, cia2)
    }

    #[test]
    fn default_banking_maps_roms_and_io() {
        let bus = bus();
        assert_eq!(bus.bank_mode(0x0400), BankMode::Ram);
        assert_eq!(bus.bank_mode(0xa000), BankMode::Rom);
        assert_eq!(bus.bank_mode(0xd000), BankMode::Io);
        assert_eq!(bus.bank_mode(0xe000), BankMode::Rom);
    }

    #[test]
    fn bank_table_follows_control_lines() {
        let mut bus = bus();
        // 0b101: BASIC out, KERNAL out, I/O still visible
        bus.write(CPU_PORT, 0b101);
        assert_eq!(bus.bank_mode(0xa000), BankMode::Ram);
        assert_eq!(bus.bank_mode(0xd000), BankMode::Io);
        assert_eq!(bus.bank_mode(0xe000), BankMode::Ram);
        // 0b011: character ROM instead of I/O
        bus.write(CPU_PORT, 0b011);
        assert_eq!(bus.bank_mode(0xd000), BankMode::Rom);
        // 0b000: flat RAM
        bus.write(CPU_PORT, 0b000);
        assert_eq!(bus.bank_mode(0xa000), BankMode::Ram);
        assert_eq!(bus.bank_mode(0xd000), BankMode::Ram);
        assert_eq!(bus.bank_mode(0xe000), BankMode::Ram);
    }

    #[test]
    fn ram_under_rom() {
        let mut bus = bus();
        bus.load_rom(&[0x94], 0xa000, crate::rom::RomTarget::Rom);
        bus.write(CPU_PORT, 0x07);
        bus.write(0xa000, 0x42);
        assert_eq!(bus.read(0xa000), 0x94, "ROM visible while banked in");
        bus.write(CPU_PORT, 0x05);
        assert_eq!(bus.read(0xa000), 0x42, "write went to RAM underneath");
    }

    #[test]
    fn read_word_is_little_endian() {
        let mut bus = bus();
        bus.write(0x2000, 0xcd);
        bus.write(0x2001, 0xab);
        assert_eq!(bus.read_word(0x2000), 0xabcd);
    }

    #[test]
    fn color_ram_behind_io() {
        let mut bus = bus();
        bus.write(0xd800, 0xff);
        assert_eq!(bus.read(0xd800), 0x0f);
        assert_eq!(bus.color_ram_read(0), 0x0f);
        // color RAM stays reachable for the VIC with I/O banked out
        bus.write(CPU_PORT, 0b000);
        assert_eq!(bus.color_ram_read(0), 0x0f);
    }

    #[test]
    fn sid_and_expansion_are_stubs() {
        let mut bus = bus();
        bus.write(0xd418, 0x0f);
        assert_eq!(bus.read(0xd418), 0);
        assert_eq!(bus.read(0xde00), 0);
    }

    #[test]
    fn cia_dispatch_is_mirrored() {
        let bus = bus();
        bus.cia1.borrow_mut().write(0x0, 0x55);
        assert_eq!(bus.read(0xdc00), 0x55);
        assert_eq!(bus.read(0xdcf0), 0x55, "CIA1 mirrors every 16 bytes");
    }

    #[test]
    fn vic_view_char_rom_windows() {
        let mut bus = bus();
        let mut char_image = vec![0u8; 0x1000];
        char_image[0x123] = 0x77;
        bus.load_rom(&char_image, crate::rom::CHAR_ROM_BASE, crate::rom::RomTarget::Rom);

        // bank 0 (port A low bits = 0b11): 0x1000-0x1fff is character ROM
        bus.cia2.borrow_mut().write(0x0, 0b11);
        assert_eq!(bus.vic_read(0x1123), 0x77);

        // bank 2 (port A low bits = 0b01): 0x9000-0x9fff is character ROM
        bus.cia2.borrow_mut().write(0x0, 0b01);
        assert_eq!(bus.vic_read(0x1123), 0x77);
    }

    #[test]
    fn vic_view_bank_selection() {
        let mut bus = bus();
        bus.write(0x0400, 0x11);
        bus.write(0x4400, 0x22);
        bus.cia2.borrow_mut().write(0x0, 0b11); // bank 0
        assert_eq!(bus.vic_read(0x0400), 0x11);
        bus.cia2.borrow_mut().write(0x0, 0b10); // bank 1
        assert_eq!(bus.vic_read(0x0400), 0x22);
    }

    #[test]
    fn vic_view_sees_ram_not_io() {
        let mut bus = bus();
        bus.write(CPU_PORT, 0x07);
        // CPU sees I/O at 0xd020; the VIC (bank 3) must see the RAM below
        bus.cia2.borrow_mut().write(0x0, 0b00); // bank 3: 0xc000-0xffff
        bus.ram[0xd020] = 0x5a;
        assert_eq!(bus.vic_read(0x1020), 0x5a);
    }

    #[test]
    fn cpu_port_ddr_is_a_stub() {
        let mut bus = bus();
        bus.write(0x0000, 0x00);
        assert_eq!(bus.read(0x0000), 0x2f);
    }
}
