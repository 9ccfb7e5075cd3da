//! Pixel transport between the emulation loop and the presentation
//! thread.
//!
//! The VIC stores single pixels at raster pace; the window thread reads
//! the whole frame back at its own cadence. The frame is one flat array
//! of atomic ARGB cells with relaxed ordering: no lock, no double
//! buffering. A present that overlaps a raster line shows some stale
//! pixels for one refresh, which looks no different from the beam racing
//! the host display.

use super::{Color, Point, VISIBLE_HEIGHT, VISIBLE_WIDTH};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

struct Frame {
    px: Box<[AtomicU32]>,
}

/// Emulation-side handle; the VIC paints through this.
pub struct Writer {
    frame: Arc<Frame>,
}

/// Presentation-side handle.
#[derive(Clone)]
pub struct Reader {
    frame: Arc<Frame>,
}

/// A connected reader/writer pair over one visible-window frame.
pub fn new() -> (Reader, Writer) {
    let px = (0..VISIBLE_WIDTH * VISIBLE_HEIGHT).map(|_| AtomicU32::new(0)).collect();
    let frame = Arc::new(Frame { px });
    (Reader { frame: frame.clone() }, Writer { frame })
}

impl Writer {
    #[inline]
    pub fn set_px(&self, p: Point, col: ARGB) {
        let Point(x, y) = p;
        assert!(x < VISIBLE_WIDTH);
        assert!(y < VISIBLE_HEIGHT);
        self.frame.px[y * VISIBLE_WIDTH + x].store(col.0, Ordering::Relaxed);
    }
}

impl Reader {
    pub const fn width(&self) -> usize {
        VISIBLE_WIDTH
    }

    pub const fn height(&self) -> usize {
        VISIBLE_HEIGHT
    }

    /// The frame as the plain `u32` slice minifb wants. `AtomicU32` has
    /// the same in-memory representation as `u32`, so this only drops the
    /// atomic typing of the cells; tearing against concurrent stores is
    /// accepted above.
    pub fn as_u32_slice(&self) -> &[u32] {
        let px: &[AtomicU32] = &self.frame.px;
        unsafe { std::slice::from_raw_parts(px.as_ptr() as *const u32, px.len()) }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct ARGB(pub u32);

/// The fixed 16-entry palette, ARGB8888.
const PALETTE: [u32; 16] = [
    0xff000000, // black
    0xffffffff, // white
    0xffab3126, // red
    0xff66daff, // cyan
    0xffbb3fb8, // purple
    0xff55ce58, // green
    0xff1d0e97, // blue
    0xffeaf57c, // yellow
    0xffb97418, // orange
    0xff785300, // brown
    0xffdd9387, // light red
    0xff5b5b5b, // dark grey
    0xff8b8b8b, // mid grey
    0xffb0f4ac, // light green
    0xffaa9def, // light blue
    0xffb8b8b8, // light grey
];

impl From<Color> for ARGB {
    fn from(col: Color) -> Self {
        ARGB(PALETTE[col as usize])
    }
}
