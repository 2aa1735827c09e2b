//! Configuration system for the simulator.
//!
//! This module defines all configuration structures used to parameterize the
//! simulator. It provides:
//! 1. **Defaults:** Baseline memory map and peripheral constants.
//! 2. **Structures:** Hierarchical config for general, memory, pipeline, and debug.
//! 3. **Enums:** Pipeline execution mode and stalled-write retention policy.
//!
//! Configuration is supplied via JSON from the CLI (`--config`) or use
//! `Config::default()`.

use serde::Deserialize;
use std::path::PathBuf;

/// Default configuration constants for the simulator.
mod defaults {
    /// Base address of flash ROM.
    ///
    /// The reset vector table lives at the bottom of this region: word 0 is
    /// the initial stack pointer, word 1 the reset entry point.
    pub const ROM_BASE: u32 = 0x0000_0000;

    /// Total size of flash ROM in bytes (64 KiB).
    pub const ROM_SIZE: u32 = 0x1_0000;

    /// Base address of SRAM.
    pub const RAM_BASE: u32 = 0x2000_0000;

    /// Total size of SRAM in bytes (64 KiB).
    pub const RAM_SIZE: u32 = 0x1_0000;

    /// Base address of the LED latch block (red, green, blue words).
    pub const LED_BASE: u32 = 0x4000_0000;

    /// Base address of the polling UART register block.
    pub const UART_BASE: u32 = 0x4000_0100;
}

/// Pipeline execution mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum PipelineMode {
    /// Three concurrent stage workers driven by a per-cycle barrier.
    #[default]
    Threaded,
    /// All three stages run inline on the driver thread, writes applied
    /// immediately. One instruction completes per cycle; this is the
    /// reference semantics the threaded mode is checked against.
    Inline,
}

/// What happens to a stalled stage's writes at commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum StallPolicy {
    /// Drop the records entirely. Lean on memory; the history never shows
    /// the voided write.
    #[default]
    Drop,
    /// Keep the records in the log, marked void, so history inspection can
    /// see what a stalled stage attempted.
    Keep,
}

/// Root configuration structure containing all simulator settings.
///
/// # Examples
///
/// ```
/// use armsim_core::config::Config;
///
/// let config = Config::default();
/// assert_eq!(config.memory.ram_base, 0x2000_0000);
/// assert!(config.general.limit_cycles.is_none());
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// General simulation settings.
    #[serde(default)]
    pub general: GeneralConfig,
    /// Memory map geometry.
    #[serde(default)]
    pub memory: MemoryConfig,
    /// Pipeline execution settings.
    #[serde(default)]
    pub pipeline: PipelineConfig,
    /// Debugging interfaces (GDB stub, UART bridge).
    #[serde(default)]
    pub debug: DebugConfig,
}

impl Config {
    /// Deserializes a configuration from JSON text. Absent sections and
    /// fields take their defaults.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

/// General simulation settings and options.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GeneralConfig {
    /// Path to the flash image to load at ROM base.
    #[serde(default)]
    pub flash_image: Option<PathBuf>,

    /// Load the built-in test image instead of a flash file.
    #[serde(default)]
    pub use_test_flash: bool,

    /// Entry point override; defaults to the reset vector in ROM.
    #[serde(default)]
    pub start_pc: Option<u32>,

    /// Stop with a fault after this many cycles.
    #[serde(default)]
    pub limit_cycles: Option<i64>,

    /// Drop to the shell when the PC first reaches this address.
    #[serde(default)]
    pub dump_at_pc: Option<u32>,

    /// Drop to the shell when the cycle counter reaches this value.
    #[serde(default)]
    pub dump_at_cycle: Option<i64>,

    /// Print register state every cycle.
    #[serde(default)]
    pub print_cycles: bool,

    /// Print the LED line whenever an LED latch was written this cycle.
    #[serde(default)]
    pub show_led_writes: bool,

    /// Sleep ~100ms per cycle, for watching a program crawl.
    #[serde(default)]
    pub slow_sim: bool,

    /// Use r0 as the process exit status on clean termination.
    #[serde(default)]
    pub return_r0: bool,

    /// Directory for RAM/ROM dump files; defaults to the system temp dir.
    #[serde(default)]
    pub dump_dir: Option<PathBuf>,
}

/// Memory map geometry.
#[derive(Debug, Clone, Deserialize)]
pub struct MemoryConfig {
    /// Flash ROM base address.
    #[serde(default = "MemoryConfig::default_rom_base")]
    pub rom_base: u32,

    /// Flash ROM size in bytes.
    #[serde(default = "MemoryConfig::default_rom_size")]
    pub rom_size: u32,

    /// SRAM base address.
    #[serde(default = "MemoryConfig::default_ram_base")]
    pub ram_base: u32,

    /// SRAM size in bytes.
    #[serde(default = "MemoryConfig::default_ram_size")]
    pub ram_size: u32,

    /// LED latch block base address.
    #[serde(default = "MemoryConfig::default_led_base")]
    pub led_base: u32,

    /// Polling UART register block base address.
    #[serde(default = "MemoryConfig::default_uart_base")]
    pub uart_base: u32,
}

impl MemoryConfig {
    /// Returns the default flash ROM base address.
    fn default_rom_base() -> u32 {
        defaults::ROM_BASE
    }

    /// Returns the default flash ROM size in bytes.
    fn default_rom_size() -> u32 {
        defaults::ROM_SIZE
    }

    /// Returns the default SRAM base address.
    fn default_ram_base() -> u32 {
        defaults::RAM_BASE
    }

    /// Returns the default SRAM size in bytes.
    fn default_ram_size() -> u32 {
        defaults::RAM_SIZE
    }

    /// Returns the default LED latch block base address.
    fn default_led_base() -> u32 {
        defaults::LED_BASE
    }

    /// Returns the default UART register block base address.
    fn default_uart_base() -> u32 {
        defaults::UART_BASE
    }
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            rom_base: defaults::ROM_BASE,
            rom_size: defaults::ROM_SIZE,
            ram_base: defaults::RAM_BASE,
            ram_size: defaults::RAM_SIZE,
            led_base: defaults::LED_BASE,
            uart_base: defaults::UART_BASE,
        }
    }
}

/// Pipeline execution settings.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PipelineConfig {
    /// Threaded stage workers or the inline reference loop.
    #[serde(default)]
    pub mode: PipelineMode,

    /// Retention policy for writes voided by a stall.
    #[serde(default)]
    pub stall_policy: StallPolicy,
}

/// Debugging interfaces.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct DebugConfig {
    /// TCP port for the GDB remote stub; `None` leaves the stub off.
    #[serde(default)]
    pub gdb_port: Option<u16>,

    /// TCP port for the polling UART bridge; `None` leaves the bridge
    /// disconnected (the UART registers still exist).
    #[serde(default)]
    pub uart_port: Option<u16>,
}
