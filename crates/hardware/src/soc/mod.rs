//! System-on-chip: the memory map and everything hanging off it.

pub mod devices;
pub mod memmap;
pub mod memory;

pub use memmap::{MemMap, ReadHandler, WriteHandler};
pub use memory::{RamRegion, RomRegion};
