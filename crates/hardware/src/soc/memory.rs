//! RAM and ROM regions backed by tracked cells.
//!
//! Each memory word is one state-log cell, so ordinary loads and stores are
//! rewindable exactly like register writes.

use crate::common::{Fault, Stage};
use crate::core::state::{CellId, StateLog};
use crate::soc::memmap::{ReadHandler, WriteHandler};

/// A read-write memory region.
#[derive(Clone, Copy, Debug)]
pub struct RamRegion {
    base: u32,
    first: CellId,
    words: usize,
}

impl RamRegion {
    /// Allocates `size` bytes (rounded down to whole words) of tracked RAM.
    pub fn new(log: &mut StateLog, name: &'static str, base: u32, size: u32) -> Self {
        let words = (size / 4) as usize;
        Self {
            base,
            first: log.alloc_cells(name, words, 0),
            words,
        }
    }

    /// The region's base address.
    pub fn base(&self) -> u32 {
        self.base
    }

    /// One past the last valid address.
    pub fn top(&self) -> u32 {
        self.base + (self.words as u32) * 4
    }

    /// The cell backing the word at `addr`.
    pub fn cell_at(&self, addr: u32) -> CellId {
        self.first.offset(((addr - self.base) / 4) as usize)
    }
}

impl ReadHandler for RamRegion {
    fn read_word(&self, log: &mut StateLog, addr: u32) -> Result<u32, Fault> {
        Ok(log.get(self.cell_at(addr)))
    }
}

impl WriteHandler for RamRegion {
    fn write_word(
        &self,
        log: &mut StateLog,
        stage: Stage,
        addr: u32,
        val: u32,
    ) -> Result<(), Fault> {
        log.write(stage, self.cell_at(addr), val);
        Ok(())
    }
}

/// A read-only memory region; writes are refused by the memory map since no
/// write handler is ever registered for it.
#[derive(Clone, Copy, Debug)]
pub struct RomRegion {
    inner: RamRegion,
}

impl RomRegion {
    /// Allocates `size` bytes of tracked ROM.
    pub fn new(log: &mut StateLog, name: &'static str, base: u32, size: u32) -> Self {
        Self {
            inner: RamRegion::new(log, name, base, size),
        }
    }

    /// The region's base address.
    pub fn base(&self) -> u32 {
        self.inner.base()
    }

    /// One past the last valid address.
    pub fn top(&self) -> u32 {
        self.inner.top()
    }

    /// The cell backing the word at `addr`. The flash loader pokes these
    /// before the first cycle.
    pub fn cell_at(&self, addr: u32) -> CellId {
        self.inner.cell_at(addr)
    }
}

impl ReadHandler for RomRegion {
    fn read_word(&self, log: &mut StateLog, addr: u32) -> Result<u32, Fault> {
        self.inner.read_word(log, addr)
    }
}
