//! ARMv7-M core simulator library.
//!
//! This crate implements a cycle-accurate Thumb core simulator with the following:
//! 1. **State:** A rewindable per-cycle history of every tracked write, with
//!    forward and backward seeks.
//! 2. **Core:** A three-stage pipeline (fetch, decode, execute) runnable
//!    inline or as coordinated worker threads.
//! 3. **ISA:** Mask-based Thumb opcode registration and decode.
//! 4. **SoC:** A memory-map registry, tracked RAM/ROM, LED latches, and a
//!    TCP-bridged polling UART.
//! 5. **Simulation:** Flash loading, the driver loop, an interactive shell,
//!    and a GDB remote stub with reverse execution.

/// Common types (pipeline stages, faults, seek errors).
pub mod common;
/// Simulator configuration (defaults, enums, hierarchical config structures).
pub mod config;
/// CPU core (machine assembly, register facade, pipeline, state history).
pub mod core;
/// GDB remote stub (packet framing, command handling).
pub mod gdb;
/// Instruction set (opcode table, builtin Thumb operations).
pub mod isa;
/// Simulation (driver loop, flash loader, shell, dumps).
pub mod sim;
/// System-on-chip (memory map, RAM/ROM regions, LED and UART devices).
pub mod soc;

/// Root configuration type; use `Config::default()` or deserialize from JSON.
pub use crate::config::Config;
/// The assembled machine: state log, memory map, opcodes, latches, devices.
pub use crate::core::Machine;
/// The simulation driver; construct with `Driver::new` and call `run`.
pub use crate::sim::Driver;
