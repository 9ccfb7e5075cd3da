//! Headless peripheral: keeps the frame in memory and exposes a
//! scriptable key matrix. Used by `--no-gui` runs and the test suite.

use crate::cia::keyboard::{C64Key, KeyboardMatrix};
use crate::peripheral::{framebuffer::ARGB, Color, Peripherals, VISIBLE_HEIGHT, VISIBLE_WIDTH};

pub struct Noninteractive {
    frame: Vec<u32>,
    refreshes: u64,
    matrix: KeyboardMatrix,
}

impl Default for Noninteractive {
    fn default() -> Self {
        Noninteractive::new()
    }
}

impl Noninteractive {
    pub fn new() -> Self {
        Noninteractive {
            frame: vec![0; VISIBLE_WIDTH * VISIBLE_HEIGHT],
            refreshes: 0,
            matrix: KeyboardMatrix::default(),
        }
    }

    pub fn pixel(&self, x: usize, y: usize) -> u32 {
        self.frame[y * VISIBLE_WIDTH + x]
    }

    pub fn refreshes(&self) -> u64 {
        self.refreshes
    }

    pub fn press(&mut self, key: C64Key) {
        self.matrix[key] = true;
    }

    pub fn release(&mut self, key: C64Key) {
        self.matrix[key] = false;
    }
}

impl Peripherals for Noninteractive {
    fn set_frame_pixel(&mut self, x: usize, y: usize, color: Color) {
        self.frame[y * VISIBLE_WIDTH + x] = ARGB::from(color).0;
    }

    fn refresh_screen(&mut self) {
        self.refreshes += 1;
    }

    fn read_keyboard_matrix(&self, row: u8) -> u8 {
        self.matrix.row_byte(row)
    }
}
