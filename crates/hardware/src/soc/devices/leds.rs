//! The LED latch block: three word-wide latches (red, green, blue).
//!
//! Each latch drives eight LEDs from its low byte. Writes raise the
//! per-cycle `LED_WRITTEN` flag so the driver can print the LED line.

use crate::common::{Fault, Stage};
use crate::core::state::{flags, CellId, StateLog};
use crate::soc::memmap::{MemMap, ReadHandler, WriteHandler};

/// Index of the red latch.
pub const RED: usize = 0;
/// Index of the green latch.
pub const GREEN: usize = 1;
/// Index of the blue latch.
pub const BLUE: usize = 2;

/// The LED latch block.
#[derive(Clone, Copy, Debug)]
pub struct LedBlock {
    base: u32,
    cells: [CellId; 3],
}

impl LedBlock {
    /// Allocates the three latch cells.
    pub fn new(log: &mut StateLog, base: u32) -> Self {
        Self {
            base,
            cells: [
                log.alloc_cell("led_red", 0),
                log.alloc_cell("led_grn", 0),
                log.alloc_cell("led_blu", 0),
            ],
        }
    }

    /// Registers the block's word range for reads and writes.
    pub fn register(self, map: &mut MemMap) -> Result<(), Fault> {
        map.register_read_word(self.base, self.base + 12, Box::new(self))?;
        map.register_write_word(self.base, self.base + 12, Box::new(self))
    }

    /// Live value of one latch.
    pub fn read(&self, log: &StateLog, color: usize) -> u32 {
        log.get(self.cells[color])
    }

    fn index(&self, addr: u32) -> usize {
        ((addr - self.base) / 4) as usize
    }
}

impl ReadHandler for LedBlock {
    fn read_word(&self, log: &mut StateLog, addr: u32) -> Result<u32, Fault> {
        Ok(log.get(self.cells[self.index(addr)]))
    }
}

impl WriteHandler for LedBlock {
    fn write_word(
        &self,
        log: &mut StateLog,
        stage: Stage,
        addr: u32,
        val: u32,
    ) -> Result<(), Fault> {
        log.set_flag(flags::LED_WRITTEN);
        log.write(stage, self.cells[self.index(addr)], val);
        Ok(())
    }
}
