//! Memory-mapped peripherals.

pub mod leds;
pub mod uart;
