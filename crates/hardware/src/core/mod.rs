//! The simulated core: machine assembly, the register facade, the pipeline
//! stages, and the rewindable state log they all write through.

pub mod facade;
pub mod machine;
pub mod pipeline;
pub mod state;

pub use machine::{Machine, SharedMachine};
