//! VIC-II raster state machine and standard-character-mode renderer.
//!
//! The chip advances one whole raster line per step. Stepping renders the
//! line into the peripheral framebuffer, picks the CPU's cycle share for
//! that line (the VIC steals most of a "bad line" for its matrix fetch),
//! advances the raster counter modulo 312 and raises the raster-match
//! interrupt on entering the programmed line.
//!
//! Register file (repeated every 64 bytes in 0xD000-0xD3FF):
//!
//!  #| Adr.  |Bit7|Bit6|Bit5|Bit4|Bit3|Bit2|Bit1|Bit0| Function
//! --+-------+----+----+----+----+----+----+----+----+------------------------
//!  0..15    |            M0X..M7Y                   | Sprite coordinates
//! --+-------+----+----+----+----+----+----+----+----+------------------------
//! 16| $d010 |M7X8|M6X8|M5X8|M4X8|M3X8|M2X8|M1X8|M0X8| MSBs of X coordinates
//! --+-------+----+----+----+----+----+----+----+----+------------------------
//! 17| $d011 |RST8| ECM| BMM| DEN|RSEL|    YSCROLL   | Control register 1
//! --+-------+----+----+----+----+----+--------------+------------------------
//! 18| $d012 |                 RASTER                | Raster counter
//! --+-------+---------------------------------------+------------------------
//! 19| $d013 |                  LPX                  | Light pen X
//! --+-------+---------------------------------------+------------------------
//! 20| $d014 |                  LPY                  | Light pen Y
//! --+-------+----+----+----+----+----+----+----+----+------------------------
//! 21| $d015 | M7E| M6E| M5E| M4E| M3E| M2E| M1E| M0E| Sprite enabled
//! --+-------+----+----+----+----+----+----+----+----+------------------------
//! 22| $d016 |  - |  - | RES| MCM|CSEL|    XSCROLL   | Control register 2
//! --+-------+----+----+----+----+----+----+----+----+------------------------
//! 23| $d017 |M7YE|M6YE|M5YE|M4YE|M3YE|M2YE|M1YE|M0YE| Sprite Y expansion
//! --+-------+----+----+----+----+----+----+----+----+------------------------
//! 24| $d018 |VM13|VM12|VM11|VM10|CB13|CB12|CB11|  - | Memory pointers
//! --+-------+----+----+----+----+----+----+----+----+------------------------
//! 25| $d019 | IRQ|  - |  - |  - | ILP|IMMC|IMBC|IRST| Interrupt register
//! --+-------+----+----+----+----+----+----+----+----+------------------------
//! 26| $d01a |  - |  - |  - |  - | ELP|EMMC|EMBC|ERST| Interrupt enabled
//! --+-------+----+----+----+----+----+----+----+----+------------------------
//! 27| $d01b |M7DP|M6DP|M5DP|M4DP|M3DP|M2DP|M1DP|M0DP| Sprite data priority
//! --+-------+----+----+----+----+----+----+----+----+------------------------
//! 28| $d01c |M7MC|M6MC|M5MC|M4MC|M3MC|M2MC|M1MC|M0MC| Sprite multicolor
//! --+-------+----+----+----+----+----+----+----+----+------------------------
//! 29| $d01d |M7XE|M6XE|M5XE|M4XE|M3XE|M2XE|M1XE|M0XE| Sprite X expansion
//! --+-------+----+----+----+----+----+----+----+----+------------------------
//! 30| $d01e | M7M| M6M| M5M| M4M| M3M| M2M| M1M| M0M| Sprite-sprite collision
//! --+-------+----+----+----+----+----+----+----+----+------------------------
//! 31| $d01f | M7D| M6D| M5D| M4D| M3D| M2D| M1D| M0D| Sprite-data collision
//! --+-------+----+----+----+----+----+----+----+----+------------------------
//! 32| $d020 |  - |  - |  - |  - |         EC        | Border color
//! --+-------+----+----+----+----+-------------------+------------------------
//! 33..36    |         B0C..B3C                      | Background colors
//! --+-------+----+----+----+----+-------------------+------------------------
//! 37..38    |         MM0..MM1                      | Sprite multicolors
//! --+-------+----+----+----+----+-------------------+------------------------
//! 39..46    |         M0C..M7C                      | Sprite colors
//! --+-------+----+----+----+----+-------------------+------------------------
//!
//!  - Bits marked '-' are not connected and read back as 1.
//!  - The unused offsets 0x2F..0x3F are not registers at all.
//!  - RST8 in $d011 is bit 8 of $d012; writing the pair sets the raster
//!    interrupt comparison line, reading reflects the current line.

use crate::interrupt::InterruptLine;
use crate::mem::MemoryBus;
use crate::peripheral::{Color, Peripherals, VISIBLE_HEIGHT, VISIBLE_WIDTH};
use crate::utils::R2C;
use num_enum::TryFromPrimitive;
use std::convert::TryFrom;

pub const RASTER_LINES: u16 = 312;
pub const FIRST_VISIBLE_LINE: u16 = 14;
pub const FIRST_TEXT_LINE: u16 = 56;
pub const TEXT_LINES: u16 = 200;
pub const FIRST_TEXT_COL: usize = 42;
pub const TEXT_WIDTH: usize = 320;
pub const TEXT_COLS: u16 = 40;
pub const LINE_CYCLES: usize = 63;
pub const BAD_LINE_CYCLES: usize = 23;

bitflags! {
    #[derive(Default)]
    pub struct ControlRegister1: u8 {
        const YSCROLL = 0b0000_0111;
        const RSEL    = 0b0000_1000;
        const DEN     = 0b0001_0000;
        const BMM     = 0b0010_0000;
        const ECM     = 0b0100_0000;
        const RST8    = 0b1000_0000;
    }
}

bitflags! {
    #[derive(Default)]
    pub struct ControlRegister2: u8 {
        const XSCROLL = 0b0000_0111;
        const CSEL    = 0b0000_1000;
        const MCM     = 0b0001_0000;
        const RES     = 0b0010_0000;
    }
}

bitflags! {
    #[derive(Default)]
    pub struct InterruptStatus: u8 {
        const IRST = 0b0000_0001;
        const IMBC = 0b0000_0010;
        const IMMC = 0b0000_0100;
        const ILP  = 0b0000_1000;
    }
}

bitflags! {
    #[derive(Default)]
    pub struct InterruptEnabled: u8 {
        const ERST = 0b0000_0001;
        const EMBC = 0b0000_0010;
        const EMMC = 0b0000_0100;
        const ELP  = 0b0000_1000;
    }
}

/// ECM/BMM from control register 1 and MCM from control register 2 select
/// the display mode. Only `StdChar` renders; the rest fall back to border.
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[repr(u8)]
pub enum GraphicMode {
    StdChar = 0,
    MultiColorChar = 1,
    StdBitmap = 2,
    MultiColorBitmap = 3,
    ExtBG = 4,
    Invalid = 5,
}

#[derive(Default)]
struct Registers {
    sprite_pos: [u8; 16],
    sprite_msb_x: u8,
    control_1: ControlRegister1,
    light_pen: [u8; 2],
    sprite_enabled: u8,
    control_2: ControlRegister2,
    sprite_exp_y: u8,
    memory_pointers: u8,
    interrupt_status: InterruptStatus,
    interrupt_enabled: InterruptEnabled,
    sprite_data_priority: u8,
    sprite_multicolor_sel: u8,
    sprite_exp_x: u8,
    border_color: u8,
    background_color: [u8; 4],
    sprite_multicolor: [u8; 2],
    sprite_color: [u8; 8],
}

pub struct VicII {
    mem: R2C<MemoryBus>,
    peripherals: R2C<dyn Peripherals>,
    irq: InterruptLine,

    regs: Registers,
    raster_line: u16,
    raster_irq_match: u16,

    mode: GraphicMode,
    char_base: u16,
    screen_base: u16,
    bitmap_base: u16,

    /// Modes already complained about, bit per `GraphicMode`.
    unimplemented_mode_logged: u8,
}

impl VicII {
    pub fn new(mem: R2C<MemoryBus>, peripherals: R2C<dyn Peripherals>, irq: InterruptLine) -> Self {
        VicII {
            mem,
            peripherals,
            irq,
            regs: Registers::default(),
            raster_line: 0,
            raster_irq_match: 0,
            mode: GraphicMode::StdChar,
            char_base: 0,
            screen_base: 0,
            bitmap_base: 0,
            unimplemented_mode_logged: 0,
        }
    }

    pub fn raster_line(&self) -> u16 {
        self.raster_line
    }

    pub fn graphic_mode(&self) -> GraphicMode {
        self.mode
    }

    pub fn screen_base(&self) -> u16 {
        self.screen_base
    }

    pub fn char_base(&self) -> u16 {
        self.char_base
    }

    /// Parsed from the memory-pointer register like the others; only
    /// consulted once bitmap modes render.
    pub fn bitmap_base(&self) -> u16 {
        self.bitmap_base
    }

    pub fn read(&self, addr: u16) -> u8 {
        let reg = (addr & 0x3f) as usize;
        match reg {
            0x00..=0x0f => self.regs.sprite_pos[reg],
            0x10 => self.regs.sprite_msb_x,
            0x11 => {
                (self.regs.control_1.bits() & 0x7f) | (((self.raster_line >> 8) as u8 & 1) << 7)
            }
            0x12 => self.raster_line as u8,
            0x13 => self.regs.light_pen[0],
            0x14 => self.regs.light_pen[1],
            0x15 => self.regs.sprite_enabled,
            0x16 => self.regs.control_2.bits() | 0b1100_0000,
            0x17 => self.regs.sprite_exp_y,
            0x18 => self.regs.memory_pointers | 0b0000_0001,
            0x19 => {
                let latched = self.regs.interrupt_status.bits();
                let asserted = latched & self.regs.interrupt_enabled.bits() != 0;
                latched | ((asserted as u8) << 7) | 0b0111_0000
            }
            0x1a => self.regs.interrupt_enabled.bits() | 0b1111_0000,
            0x1b => self.regs.sprite_data_priority,
            0x1c => self.regs.sprite_multicolor_sel,
            0x1d => self.regs.sprite_exp_x,
            0x1e | 0x1f => 0, // collision latches never fill without sprites
            0x20 => self.regs.border_color | 0b1111_0000,
            0x21..=0x24 => self.regs.background_color[reg - 0x21] | 0b1111_0000,
            0x25..=0x26 => self.regs.sprite_multicolor[reg - 0x25] | 0b1111_0000,
            0x27..=0x2e => self.regs.sprite_color[reg - 0x27] | 0b1111_0000,
            _ => {
                log::warn!("read of unmapped VIC register offset {:#04x}", reg);
                0
            }
        }
    }

    pub fn write(&mut self, addr: u16, val: u8) {
        let reg = (addr & 0x3f) as usize;
        match reg {
            0x00..=0x0f => self.regs.sprite_pos[reg] = val,
            0x10 => self.regs.sprite_msb_x = val,
            0x11 => {
                // bit 7 is not stored: on write it is bit 8 of the raster
                // match, on read it reflects the current raster line
                self.regs.control_1 =
                    ControlRegister1::from_bits_truncate(val) & !ControlRegister1::RST8;
                self.raster_irq_match =
                    (self.raster_irq_match & 0x00ff) | (((val & 0x80) as u16) << 1);
                self.update_graphic_mode();
            }
            0x12 => {
                self.raster_irq_match = (self.raster_irq_match & 0x0100) | val as u16;
            }
            0x13 => self.regs.light_pen[0] = val,
            0x14 => self.regs.light_pen[1] = val,
            0x15 => self.regs.sprite_enabled = val,
            0x16 => {
                self.regs.control_2 = ControlRegister2::from_bits_truncate(val);
                self.update_graphic_mode();
            }
            0x17 => self.regs.sprite_exp_y = val,
            0x18 => {
                self.regs.memory_pointers = val | 1;
                self.char_base = ((val & 0x0e) as u16) << 10;
                self.screen_base = ((val & 0xf0) as u16) << 6;
                self.bitmap_base = ((val & 0x08) as u16) << 10;
            }
            0x19 => {
                // writing ones acknowledges the corresponding latches
                self.regs.interrupt_status &= !InterruptStatus::from_bits_truncate(val);
            }
            0x1a => self.regs.interrupt_enabled = InterruptEnabled::from_bits_truncate(val),
            0x1b => self.regs.sprite_data_priority = val,
            0x1c => self.regs.sprite_multicolor_sel = val,
            0x1d => self.regs.sprite_exp_x = val,
            0x1e | 0x1f => (), // collision latches are read-only
            0x20 => self.regs.border_color = val & 0x0f,
            0x21..=0x24 => self.regs.background_color[reg - 0x21] = val & 0x0f,
            0x25..=0x26 => self.regs.sprite_multicolor[reg - 0x25] = val & 0x0f,
            0x27..=0x2e => self.regs.sprite_color[reg - 0x27] = val & 0x0f,
            _ => log::warn!("write of {:#04x} to unmapped VIC register offset {:#04x}", val, reg),
        }
    }

    fn update_graphic_mode(&mut self) {
        let bits = ((self.regs.control_1.bits() & 0x60) >> 4) | ((self.regs.control_2.bits() & 0x10) >> 4);
        let mode = GraphicMode::try_from(bits).unwrap_or(GraphicMode::Invalid);
        if mode != self.mode {
            log::info!("graphic mode {:?}", mode);
        }
        self.mode = mode;
    }

    /// Process the current raster line and return the CPU's cycle share
    /// for it. Wrapping to line 0 presents the finished frame.
    pub fn step_line(&mut self) -> usize {
        let line = self.raster_line;
        self.render_line(line);

        let budget = if self.is_bad_line(line) { BAD_LINE_CYCLES } else { LINE_CYCLES };

        self.raster_line = (line + 1) % RASTER_LINES;
        if self.raster_line == 0 {
            self.peripherals.borrow_mut().refresh_screen();
        }
        if self.regs.interrupt_enabled.contains(InterruptEnabled::ERST)
            && self.raster_line == self.raster_irq_match
        {
            self.regs.interrupt_status.insert(InterruptStatus::IRST);
            self.irq.raise();
        }

        budget
    }

    /// A Bad Line Condition is given for RASTER in 0x30..=0xF7 whose low
    /// three bits equal YSCROLL; the VIC fetches the video matrix on such
    /// lines and leaves the CPU only 23 of the 63 cycles.
    fn is_bad_line(&self, line: u16) -> bool {
        (0x30..=0xf7).contains(&line)
            && line & 0x07 == (self.regs.control_1.bits() & ControlRegister1::YSCROLL.bits()) as u16
    }

    fn render_line(&mut self, line: u16) {
        if !(FIRST_VISIBLE_LINE..FIRST_VISIBLE_LINE + VISIBLE_HEIGHT as u16).contains(&line) {
            return;
        }
        let y = (line - FIRST_VISIBLE_LINE) as usize;

        let border = Color::from_nibble(self.regs.border_color);
        {
            let mut peripherals = self.peripherals.borrow_mut();
            for x in 0..VISIBLE_WIDTH {
                peripherals.set_frame_pixel(x, y, border);
            }
        }

        if !(FIRST_TEXT_LINE..FIRST_TEXT_LINE + TEXT_LINES).contains(&line) {
            return;
        }
        if !self.regs.control_1.contains(ControlRegister1::DEN) {
            return;
        }

        match self.mode {
            GraphicMode::StdChar => self.render_char_line(line, y),
            mode => self.log_unimplemented_mode(mode),
        }
    }

    fn render_char_line(&mut self, line: u16, y: usize) {
        let background = Color::from_nibble(self.regs.background_color[0]);
        {
            let mut peripherals = self.peripherals.borrow_mut();
            for x in 0..TEXT_WIDTH {
                peripherals.set_frame_pixel(FIRST_TEXT_COL + x, y, background);
            }
        }

        let text_line = line - FIRST_TEXT_LINE;
        let row = text_line / 8;
        let slice_line = text_line % 8;

        let mem = self.mem.borrow();
        let mut peripherals = self.peripherals.borrow_mut();
        for col in 0..TEXT_COLS {
            let cell = row * TEXT_COLS + col;
            let ch = mem.vic_read(self.screen_base + cell);
            let color = Color::from_nibble(mem.color_ram_read(cell));
            let slice = mem.vic_read(self.char_base + (ch as u16) * 8 + slice_line);
            for bit in 0..8usize {
                if slice & (0x80 >> bit) != 0 {
                    peripherals.set_frame_pixel(FIRST_TEXT_COL + col as usize * 8 + bit, y, color);
                }
            }
        }
    }

    fn log_unimplemented_mode(&mut self, mode: GraphicMode) {
        let bit = 1u8 << mode as u8;
        if self.unimplemented_mode_logged & bit == 0 {
            self.unimplemented_mode_logged |= bit;
            log::warn!("graphic mode {:?} not implemented, rendering border only", mode);
        }
    }
}
