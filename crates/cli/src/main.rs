//! ARMv7-M cycle-accurate simulator CLI.
//!
//! This binary loads a flash image (or the built-in test image), assembles
//! the machine, and runs the simulation driver. Debugging interfaces (GDB
//! stub, UART TCP bridge, the interactive shell) are enabled by flags; full
//! configuration can also be supplied as JSON.

use armsim_core::config::{Config, PipelineMode};
use clap::Parser;
use std::path::PathBuf;
use std::process;
use tracing_subscriber::EnvFilter;

use armsim_core::sim::Driver;

#[derive(Parser, Debug)]
#[command(
    name = "armsim",
    author,
    version,
    about = "ARMv7-M cycle-accurate simulator with rewindable history",
    long_about = "Simulate a Thumb flash image on a three-stage pipelined core.\n\
        Every write is recorded per cycle, so execution can be rewound and\n\
        replayed from the shell or over GDB (reverse-step/reverse-continue).\n\n\
        Examples:\n  \
        armsim --flash image.bin\n  \
        armsim --usetestflash --return-r0\n  \
        armsim --flash image.bin --gdb 3333 --uart 4444\n  \
        armsim --flash image.bin --dump-at-pc 0x100"
)]
struct Cli {
    /// Raw flash image to load at the bottom of ROM.
    #[arg(short, long)]
    flash: Option<PathBuf>,

    /// Load the built-in test image instead of a flash file.
    #[arg(long)]
    usetestflash: bool,

    /// TCP port for the GDB remote stub; blocks until a debugger connects.
    #[arg(long, value_name = "PORT")]
    gdb: Option<u16>,

    /// TCP port for the polling UART bridge.
    #[arg(long, value_name = "PORT")]
    uart: Option<u16>,

    /// Entry point override (hex), instead of the reset vector.
    #[arg(long, value_name = "HEXADDR", value_parser = parse_hex)]
    start_pc: Option<u32>,

    /// Abort with a fault after this many cycles.
    #[arg(long, value_name = "N")]
    limit_cycles: Option<i64>,

    /// Drop to the shell when the fetch PC first reaches this address (hex).
    #[arg(long, value_name = "HEXADDR", value_parser = parse_hex)]
    dump_at_pc: Option<u32>,

    /// Drop to the shell at this cycle.
    #[arg(long, value_name = "N")]
    dump_at_cycle: Option<i64>,

    /// Print register state every cycle.
    #[arg(long)]
    print_cycles: bool,

    /// Print the LED line whenever an LED latch is written.
    #[arg(long)]
    show_led_writes: bool,

    /// Sleep ~100ms per cycle.
    #[arg(long)]
    slow: bool,

    /// Exit with r0 as the process status on clean termination.
    #[arg(long)]
    return_r0: bool,

    /// Run all stages inline on one thread, one instruction per cycle.
    #[arg(long)]
    no_pipeline: bool,

    /// Directory for the RAM/ROM dump files.
    #[arg(long, value_name = "DIR")]
    dump_dir: Option<PathBuf>,

    /// Full configuration as a JSON file; flags override it.
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
}

fn parse_hex(s: &str) -> Result<u32, String> {
    u32::from_str_radix(s.trim_start_matches("0x"), 16)
        .map_err(|e| format!("bad hex address: {e}"))
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();
    let config = match build_config(&cli) {
        Ok(config) => config,
        Err(msg) => {
            eprintln!("armsim: {msg}");
            process::exit(1);
        }
    };

    tracing::info!(
        mode = ?config.pipeline.mode,
        gdb = ?config.debug.gdb_port,
        uart = ?config.debug.uart_port,
        "starting simulation"
    );

    let mut driver = match Driver::new(config) {
        Ok(driver) => driver,
        Err(fault) => {
            eprintln!("armsim: {fault}");
            process::exit(fault.exit_code());
        }
    };

    // The driver prints a final state dump on both paths before returning.
    match driver.run() {
        Ok(status) => process::exit(status),
        Err(fault) => {
            eprintln!("armsim: {fault}");
            process::exit(fault.exit_code());
        }
    }
}

/// Builds the configuration: the JSON file (when given) as the base, CLI
/// flags layered on top.
fn build_config(cli: &Cli) -> Result<Config, String> {
    let mut config = match &cli.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .map_err(|e| format!("{}: {e}", path.display()))?;
            Config::from_json(&text).map_err(|e| format!("{}: {e}", path.display()))?
        }
        None => Config::default(),
    };

    if cli.flash.is_some() {
        config.general.flash_image.clone_from(&cli.flash);
    }
    config.general.use_test_flash |= cli.usetestflash;
    if cli.start_pc.is_some() {
        config.general.start_pc = cli.start_pc;
    }
    if cli.limit_cycles.is_some() {
        config.general.limit_cycles = cli.limit_cycles;
    }
    if cli.dump_at_pc.is_some() {
        config.general.dump_at_pc = cli.dump_at_pc;
    }
    if cli.dump_at_cycle.is_some() {
        config.general.dump_at_cycle = cli.dump_at_cycle;
    }
    config.general.print_cycles |= cli.print_cycles;
    config.general.show_led_writes |= cli.show_led_writes;
    config.general.slow_sim |= cli.slow;
    config.general.return_r0 |= cli.return_r0;
    if cli.dump_dir.is_some() {
        config.general.dump_dir.clone_from(&cli.dump_dir);
    }
    if cli.no_pipeline {
        config.pipeline.mode = PipelineMode::Inline;
    }
    if cli.gdb.is_some() {
        config.debug.gdb_port = cli.gdb;
    }
    if cli.uart.is_some() {
        config.debug.uart_port = cli.uart;
    }

    if config.general.use_test_flash && config.general.flash_image.is_some() {
        return Err("--flash and --usetestflash are mutually exclusive".into());
    }
    Ok(config)
}
