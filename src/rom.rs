//! ROM image loading.
//!
//! The core itself is ROM-agnostic; this module knows the stock image
//! geometry (BASIC 8 KiB at 0xA000, KERNAL 8 KiB at 0xE000, character
//! generator 4 KiB at 0xD000) and reads files into byte vectors the bus
//! can ingest. Images are loaded fresh each session.

use std::path::{Path, PathBuf};
use thiserror::Error;

pub const BASIC_ROM_BASE: u16 = 0xa000;
pub const KERNAL_ROM_BASE: u16 = 0xe000;
pub const CHAR_ROM_BASE: u16 = 0xd000;

/// Stock image file names, as dumped from the 1982 board revision.
pub const BASIC_ROM_IMAGE: &str = "basic.901226-01.bin";
pub const KERNAL_ROM_IMAGE: &str = "kernal.901227-03.bin";
pub const CHAR_ROM_IMAGE: &str = "characters.901225-01.bin";

/// Which 64 KiB shadow a loaded image lands in. Test programs load into
/// RAM; firmware loads into the ROM shadow and becomes visible through
/// bank switching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RomTarget {
    Ram,
    Rom,
}

#[derive(Debug, Error)]
pub enum RomError {
    #[error("cannot read ROM image {path:?}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("ROM image {path:?} ({len} bytes) does not fit at base {base:#06x}")]
    DoesNotFit { path: PathBuf, len: usize, base: u16 },
}

/// Read an image and check it fits the address space at `base`. The caller
/// hands the bytes to [`crate::mem::MemoryBus::load_rom`].
pub fn read_image(path: &Path, base: u16) -> Result<Vec<u8>, RomError> {
    let bytes = std::fs::read(path).map_err(|source| RomError::Unreadable {
        path: path.to_owned(),
        source,
    })?;
    if base as usize + bytes.len() > 0x1_0000 {
        return Err(RomError::DoesNotFit {
            path: path.to_owned(),
            len: bytes.len(),
            base,
        });
    }
    Ok(bytes)
}
