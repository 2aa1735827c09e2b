//! Flash image loading.
//!
//! Images are raw little-endian binaries placed at the bottom of ROM, vector
//! table first: word 0 is the initial stack pointer, word 1 the reset entry
//! point (Thumb bit set).

use crate::common::Fault;
use crate::core::machine::Machine;
use std::path::Path;
use tracing::info;

/// The built-in test image.
///
/// Stack at the top of SRAM, entry at `0x8`, and two instructions:
/// `MOVS r0, #42` followed by a branch-to-self.
pub const TEST_FLASH: [u32; 3] = [0x2000_FFFC, 0x0000_0009, 0xE7FE_202A];

/// Loads a raw flash image file into ROM.
pub fn flash_file(m: &mut Machine, path: &Path) -> Result<(), Fault> {
    let bytes = std::fs::read(path).map_err(|e| Fault::BadFlash {
        reason: format!("{}: {e}", path.display()),
    })?;
    info!(path = %path.display(), bytes = bytes.len(), "loading flash image");
    flash_bytes(m, &bytes)
}

/// Places raw image bytes at the bottom of ROM.
///
/// Runs before the first cycle, so the words land directly in live state
/// with no history records.
pub fn flash_bytes(m: &mut Machine, bytes: &[u8]) -> Result<(), Fault> {
    let rom = m.rom();
    let capacity = (rom.top() - rom.base()) as usize;
    if bytes.len() > capacity {
        return Err(Fault::BadFlash {
            reason: format!("image is {} bytes, rom holds {capacity}", bytes.len()),
        });
    }
    if bytes.len() < 8 {
        return Err(Fault::BadFlash {
            reason: format!("image is {} bytes, too small for a vector table", bytes.len()),
        });
    }
    for (i, chunk) in bytes.chunks(4).enumerate() {
        let mut word = [0u8; 4];
        word[..chunk.len()].copy_from_slice(chunk);
        let addr = rom.base() + (i as u32) * 4;
        m.log.poke(rom.cell_at(addr), u32::from_le_bytes(word));
    }
    Ok(())
}

/// Places whole words at the bottom of ROM.
pub fn flash_words(m: &mut Machine, words: &[u32]) -> Result<(), Fault> {
    let rom = m.rom();
    let capacity = ((rom.top() - rom.base()) / 4) as usize;
    if words.len() > capacity {
        return Err(Fault::BadFlash {
            reason: format!("image is {} words, rom holds {capacity}", words.len()),
        });
    }
    for (i, &word) in words.iter().enumerate() {
        let addr = rom.base() + (i as u32) * 4;
        m.log.poke(rom.cell_at(addr), word);
    }
    Ok(())
}
