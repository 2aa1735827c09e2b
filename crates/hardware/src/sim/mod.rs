//! The simulation driver and its supporting pieces: flash loading, state
//! dumps, and the interactive shell.

pub mod driver;
pub mod dump;
pub mod loader;
pub mod shell;

pub use driver::Driver;
