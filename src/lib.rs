//! PAL Commodore 64 emulation core.
//!
//! Five cooperating pieces: the MOS 6510 interpreter ([`mos6510`]), the
//! VIC-II raster state machine ([`vic`]), the two 6526 CIAs ([`cia`]), the
//! banked memory bus ([`mem`]) and a wall-clock pacer ([`clock`]). The
//! [`c64`] module wires them together and owns the per-raster-line
//! scheduling step. Host concerns (window, keyboard capture) live behind
//! the [`peripheral::Peripherals`] trait with two stock implementations in
//! [`backend`].

#[macro_use]
extern crate strum_macros;

#[macro_use]
extern crate bitflags;

#[macro_use]
pub mod utils;
pub mod c64;
pub mod cia;
pub mod clock;
pub mod color_ram;
pub mod interrupt;
pub mod mem;
pub mod mos6510;
pub mod peripheral;
pub mod rom;
pub mod vic;

pub mod backend {
    pub mod fb_minifb;
    pub mod noninteractive;
}
