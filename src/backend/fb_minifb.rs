//! Windowed host backend: a minifb window on its own thread presents the
//! shared framebuffer at roughly PAL frame rate and feeds the currently
//! held host keys into the keyboard matrix.

use crate::cia::keyboard::{C64Key, KeyboardMatrix};
use crate::peripheral::{framebuffer, Color, Peripherals, Point, VISIBLE_HEIGHT, VISIBLE_WIDTH};
use minifb::{Key, Scale, Window, WindowOptions};
use spin::Mutex;
use std::convert::TryFrom;
use std::sync::Arc;

pub struct Minifb {
    fb: framebuffer::Writer,
    pressed_keys: Arc<Mutex<Vec<Key>>>,
    _jh: std::thread::JoinHandle<()>,
}

impl Minifb {
    pub fn new(scale: usize) -> Self {
        let (fb_reader, fb_writer) = framebuffer::new();
        let pressed_keys = Arc::new(Mutex::new(Vec::new()));

        let _jh = {
            let pressed_keys = pressed_keys.clone();
            std::thread::spawn(move || {
                let mut winopts = WindowOptions::default();
                winopts.scale = match scale {
                    1 => Scale::X1,
                    4 => Scale::X4,
                    _ => Scale::X2,
                };
                let mut window =
                    Window::new("pal64", VISIBLE_WIDTH, VISIBLE_HEIGHT, winopts).unwrap();

                while window.is_open() {
                    std::thread::sleep(std::time::Duration::from_millis(20));
                    if let Err(e) = window.update_with_buffer(
                        fb_reader.as_u32_slice(),
                        VISIBLE_WIDTH,
                        VISIBLE_HEIGHT,
                    ) {
                        log::error!("framebuffer present failed: {}", e);
                    }
                    *pressed_keys.lock() = window.get_keys();
                }
                // window closed: take the whole emulator down
                std::process::exit(0);
            })
        };

        Minifb { fb: fb_writer, pressed_keys, _jh }
    }
}

impl Peripherals for Minifb {
    fn set_frame_pixel(&mut self, x: usize, y: usize, color: Color) {
        self.fb.set_px(Point(x, y), color.into());
    }

    fn refresh_screen(&mut self) {
        // the window thread presents at its own cadence
    }

    fn read_keyboard_matrix(&self, row: u8) -> u8 {
        let matrix = KeyboardMatrix::from(
            self.pressed_keys.lock().iter().cloned().filter_map(|k| C64Key::try_from(k).ok()),
        );
        matrix.row_byte(row)
    }
}

pub struct UnmappedKey;

impl TryFrom<Key> for C64Key {
    type Error = UnmappedKey;

    /// Keys without a direct equivalent borrow a nearby host key:
    /// Escape/End are STOP, Home is CLR/HOME, the super keys stand in
    /// for the Commodore key, and the bracket/backslash cluster maps to
    /// the @ * + symbols.
    #[rustfmt::skip]
    fn try_from(key: Key) -> Result<Self, Self::Error> {
        use Key::*;
        match key {
            Key0           => Ok(C64Key::Zero),
            Key1           => Ok(C64Key::One),
            Key2           => Ok(C64Key::Two),
            Key3           => Ok(C64Key::Three),
            Key4           => Ok(C64Key::Four),
            Key5           => Ok(C64Key::Five),
            Key6           => Ok(C64Key::Six),
            Key7           => Ok(C64Key::Seven),
            Key8           => Ok(C64Key::Eight),
            Key9           => Ok(C64Key::Nine),
            A              => Ok(C64Key::A),
            B              => Ok(C64Key::B),
            C              => Ok(C64Key::C),
            D              => Ok(C64Key::D),
            E              => Ok(C64Key::E),
            F              => Ok(C64Key::F),
            G              => Ok(C64Key::G),
            H              => Ok(C64Key::H),
            I              => Ok(C64Key::I),
            J              => Ok(C64Key::J),
            K              => Ok(C64Key::K),
            L              => Ok(C64Key::L),
            M              => Ok(C64Key::M),
            N              => Ok(C64Key::N),
            O              => Ok(C64Key::O),
            P              => Ok(C64Key::P),
            Q              => Ok(C64Key::Q),
            R              => Ok(C64Key::R),
            S              => Ok(C64Key::S),
            T              => Ok(C64Key::T),
            U              => Ok(C64Key::U),
            V              => Ok(C64Key::V),
            W              => Ok(C64Key::W),
            X              => Ok(C64Key::X),
            Y              => Ok(C64Key::Y),
            Z              => Ok(C64Key::Z),
            F1             => Ok(C64Key::F1),
            F3             => Ok(C64Key::F3),
            F5             => Ok(C64Key::F5),
            F7             => Ok(C64Key::F7),
            Down           => Ok(C64Key::CursorDown),
            Left           => Ok(C64Key::Left),
            Right          => Ok(C64Key::CursorRight),
            Up             => Ok(C64Key::Up),
            Apostrophe     => Ok(C64Key::Colon),
            Backquote      => Ok(C64Key::Currency),
            Backslash      => Ok(C64Key::Plus),
            Comma          => Ok(C64Key::Comma),
            Equal          => Ok(C64Key::Equal),
            LeftBracket    => Ok(C64Key::AtSign),
            Minus          => Ok(C64Key::Dash),
            Period         => Ok(C64Key::Period),
            RightBracket   => Ok(C64Key::Star),
            Semicolon      => Ok(C64Key::Semicolon),
            Slash          => Ok(C64Key::Slash),
            Backspace      => Ok(C64Key::Delete),
            Delete         => Ok(C64Key::Delete),
            End            => Ok(C64Key::Stop),
            Enter          => Ok(C64Key::Return),
            Escape         => Ok(C64Key::Stop),
            Home           => Ok(C64Key::Home),
            Space          => Ok(C64Key::Space),
            LeftShift      => Ok(C64Key::LShift),
            RightShift     => Ok(C64Key::RShift),
            LeftCtrl       => Ok(C64Key::Ctrl),
            RightCtrl      => Ok(C64Key::Ctrl),
            NumPad0        => Ok(C64Key::Zero),
            NumPad1        => Ok(C64Key::One),
            NumPad2        => Ok(C64Key::Two),
            NumPad3        => Ok(C64Key::Three),
            NumPad4        => Ok(C64Key::Four),
            NumPad5        => Ok(C64Key::Five),
            NumPad6        => Ok(C64Key::Six),
            NumPad7        => Ok(C64Key::Seven),
            NumPad8        => Ok(C64Key::Eight),
            NumPad9        => Ok(C64Key::Nine),
            NumPadDot      => Ok(C64Key::Period),
            NumPadSlash    => Ok(C64Key::Slash),
            NumPadAsterisk => Ok(C64Key::Star),
            NumPadMinus    => Ok(C64Key::Dash),
            NumPadPlus     => Ok(C64Key::Plus),
            NumPadEnter    => Ok(C64Key::Return),
            LeftSuper      => Ok(C64Key::Commodore),
            RightSuper     => Ok(C64Key::Commodore),
            _              => Err(UnmappedKey),
        }
    }
}
