//! The memory map registry.
//!
//! Address decode for the simulated bus. It provides:
//! 1. **Registration:** Half-open word ranges bound to read and/or write
//!    handlers, checked for overlap per handler kind at construction.
//! 2. **Dispatch:** Word accesses resolve to the unique containing range;
//!    misses, missing handler kinds, and misaligned addresses are faults.
//!
//! The registry is immutable once the machine is built; handlers receive the
//! state log so device reads and writes are tracked like any other state.

use crate::common::{Fault, Stage};
use crate::core::state::StateLog;

/// A handler for word reads within a registered range.
///
/// Reads may carry side effects (a UART data register pops its FIFO), which
/// is why the handler receives the log mutably.
pub trait ReadHandler: Send {
    /// Reads the word at `addr`. The address is word-aligned and within the
    /// registered range.
    fn read_word(&self, log: &mut StateLog, addr: u32) -> Result<u32, Fault>;
}

/// A handler for word writes within a registered range.
pub trait WriteHandler: Send {
    /// Writes `val` to the word at `addr`, attributed to `stage`.
    fn write_word(&self, log: &mut StateLog, stage: Stage, addr: u32, val: u32)
    -> Result<(), Fault>;
}

struct Region<H> {
    base: u32,
    top: u32,
    handler: H,
}

impl<H> Region<H> {
    fn contains(&self, addr: u32) -> bool {
        addr >= self.base && addr < self.top
    }
}

/// The memory map: separate read and write range lists, each kept sorted by
/// base address.
pub struct MemMap {
    reads: Vec<Region<Box<dyn ReadHandler>>>,
    writes: Vec<Region<Box<dyn WriteHandler>>>,
}

impl std::fmt::Debug for MemMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemMap")
            .field("read_ranges", &self.reads.len())
            .field("write_ranges", &self.writes.len())
            .finish()
    }
}

impl MemMap {
    /// Creates an empty memory map.
    pub fn new() -> Self {
        Self {
            reads: Vec::new(),
            writes: Vec::new(),
        }
    }

    /// Registers a read handler for `[base, top)`.
    ///
    /// Overlap with an existing read range is a fatal configuration error.
    pub fn register_read_word(
        &mut self,
        base: u32,
        top: u32,
        handler: Box<dyn ReadHandler>,
    ) -> Result<(), Fault> {
        Self::insert(&mut self.reads, base, top, handler)
    }

    /// Registers a write handler for `[base, top)`.
    ///
    /// Overlap with an existing write range is a fatal configuration error.
    pub fn register_write_word(
        &mut self,
        base: u32,
        top: u32,
        handler: Box<dyn WriteHandler>,
    ) -> Result<(), Fault> {
        Self::insert(&mut self.writes, base, top, handler)
    }

    fn insert<H>(list: &mut Vec<Region<H>>, base: u32, top: u32, handler: H) -> Result<(), Fault> {
        if base >= top {
            return Err(Fault::Unpredictable {
                reason: format!("empty memory range {base:#010x}..{top:#010x}"),
            });
        }
        if list.iter().any(|r| base < r.top && r.base < top) {
            return Err(Fault::Unpredictable {
                reason: format!("overlapping memory range {base:#010x}..{top:#010x}"),
            });
        }
        let at = list.partition_point(|r| r.base < base);
        list.insert(at, Region { base, top, handler });
        Ok(())
    }

    /// Reads the word at `addr`.
    pub fn read_word(&self, log: &mut StateLog, addr: u32) -> Result<u32, Fault> {
        if addr & 0x3 != 0 {
            return Err(Fault::InvalidAddr { addr, write: false });
        }
        match self.reads.iter().find(|r| r.contains(addr)) {
            Some(r) => r.handler.read_word(log, addr),
            None if self.writes.iter().any(|r| r.contains(addr)) => {
                Err(Fault::WriteOnly { addr })
            }
            None => Err(Fault::InvalidAddr { addr, write: false }),
        }
    }

    /// Writes the word at `addr`.
    pub fn write_word(
        &self,
        log: &mut StateLog,
        stage: Stage,
        addr: u32,
        val: u32,
    ) -> Result<(), Fault> {
        if addr & 0x3 != 0 {
            return Err(Fault::InvalidAddr { addr, write: true });
        }
        match self.writes.iter().find(|r| r.contains(addr)) {
            Some(r) => r.handler.write_word(log, stage, addr, val),
            None if self.reads.iter().any(|r| r.contains(addr)) => Err(Fault::ReadOnly { addr }),
            None => Err(Fault::InvalidAddr { addr, write: true }),
        }
    }

    /// Reads one byte, little-endian within its containing word.
    pub fn read_byte(&self, log: &mut StateLog, addr: u32) -> Result<u8, Fault> {
        let word = self.read_word(log, addr & !0x3)?;
        Ok((word >> ((addr & 0x3) * 8)) as u8)
    }

    /// Reads one halfword, little-endian within its containing word. The
    /// address must be halfword-aligned.
    pub fn read_halfword(&self, log: &mut StateLog, addr: u32) -> Result<u16, Fault> {
        if addr & 0x1 != 0 {
            return Err(Fault::InvalidAddr { addr, write: false });
        }
        let word = self.read_word(log, addr & !0x3)?;
        Ok((word >> ((addr & 0x2) * 8)) as u16)
    }
}

impl Default for MemMap {
    fn default() -> Self {
        Self::new()
    }
}
