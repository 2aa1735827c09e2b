//! Common types shared across the simulator.
//!
//! This module collects the small vocabulary types every other module speaks:
//! 1. **Faults:** The fatal fault taxonomy and the tolerable seek errors.
//! 2. **Stages:** Pipeline stage identifiers whose bit values double as stall flags.

pub mod error;
pub mod stage;

pub use error::{Fault, SeekError};
pub use stage::Stage;
