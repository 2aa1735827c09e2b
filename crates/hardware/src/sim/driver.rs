//! The simulation driver.
//!
//! Owns the machine, the stage workers, the UART bridge, and the optional
//! GDB session, and runs the cycle loop: begin, tick, tock, check. It
//! provides:
//! 1. **Startup:** Flash selection, peripheral bridge and debugger setup,
//!    and the reset cycle.
//! 2. **The loop:** Cycle limits, pause points, the bare-metal
//!    branch-to-self termination idiom, and fault collection.
//! 3. **Shutdown:** Worker joins, a final state printout, and binary
//!    memory dumps.

use crate::common::Fault;
use crate::config::{Config, PipelineMode};
use crate::core::machine::{Machine, SharedMachine};
use crate::core::pipeline::{stages, Coordinator};
use crate::core::state::flags;
use crate::gdb::{self, GdbStub};
use crate::sim::{dump, loader, shell};
use crate::soc::devices::uart::UartShared;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{info, warn};

const SLOW_SIM_DELAY: Duration = Duration::from_millis(100);

/// The simulation driver.
pub struct Driver {
    config: Config,
    machine: SharedMachine,
    gdb: Option<GdbStub>,
    uart_shutdown: Arc<UartShared>,
    uart_thread: Option<JoinHandle<()>>,
    /// Cycle to pause at, from `--dump-at-cycle`, the shell, or the
    /// debugger's step.
    stop_at_cycle: Option<i64>,
    /// One-shot PC pause point, from `--dump-at-pc` or the shell's `pc`
    /// command.
    stop_at_pc: Option<u32>,
}

impl std::fmt::Debug for Driver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Driver").finish_non_exhaustive()
    }
}

impl Driver {
    /// Builds the machine, loads flash, and brings up the configured
    /// debugging interfaces. Blocks until a debugger connects when a GDB
    /// port is configured.
    pub fn new(config: Config) -> Result<Self, Fault> {
        let mut m = Machine::new(&config)?;

        if config.general.use_test_flash {
            info!("loading built-in test image");
            loader::flash_words(&mut m, &loader::TEST_FLASH)?;
        } else if let Some(path) = &config.general.flash_image {
            loader::flash_file(&mut m, path)?;
        } else if config.debug.gdb_port.is_some() {
            warn!("no flash image; ROM is blank and the debugger drives everything");
        } else {
            return Err(Fault::BadFlash {
                reason: "no flash image configured".into(),
            });
        }

        let uart = m.uart.clone();
        let machine = SharedMachine::new(m);
        let uart_shutdown = uart.shared();
        let uart_thread = match config.debug.uart_port {
            Some(port) => Some(uart.spawn_bridge(machine.clone(), port)?),
            None => None,
        };
        let gdb = match config.debug.gdb_port {
            Some(port) => Some(GdbStub::listen(port)?),
            None => None,
        };

        Ok(Self {
            stop_at_cycle: config.general.dump_at_cycle,
            stop_at_pc: config.general.dump_at_pc,
            config,
            machine,
            gdb,
            uart_shutdown,
            uart_thread,
        })
    }

    /// Shared handle to the machine, for inspection while the driver is
    /// between runs.
    pub fn machine(&self) -> SharedMachine {
        self.machine.clone()
    }

    /// Runs the simulation to completion.
    ///
    /// # Returns
    ///
    /// The process exit status: r0 when `return_r0` is configured, zero
    /// otherwise.
    pub fn run(&mut self) -> Result<i32, Fault> {
        let coordinator = match self.config.pipeline.mode {
            PipelineMode::Threaded => Some(Coordinator::spawn(&self.machine)?),
            PipelineMode::Inline => None,
        };

        let outcome = self.main_loop(coordinator.as_ref());

        if let Some(c) = coordinator {
            c.shutdown();
        }
        self.uart_shutdown.request_shutdown();
        if let Some(t) = self.uart_thread.take() {
            let _ = t.join();
        }

        {
            let m = self.machine.lock();
            dump::print_full_state(&m);
            if let Err(e) = dump::dump_memory(&m, self.config.general.dump_dir.as_deref()) {
                warn!("memory dump failed: {e}");
            }
        }

        outcome?;
        let status = if self.config.general.return_r0 {
            self.machine.lock().reg_read(0) as i32
        } else {
            0
        };
        info!(status, "simulation terminated");
        Ok(status)
    }

    fn main_loop(&mut self, coordinator: Option<&Coordinator>) -> Result<(), Fault> {
        // Cycle 0 is the reset sequence; no stage runs.
        {
            let mut m = self.machine.lock();
            m.log.begin_cycle();
            m.reset(self.config.general.start_pc)?;
            m.tock()?;
        }

        // Let an attached debugger set up before the first fetch.
        if self.gdb.is_some() && !self.serve_debugger(false)? {
            return Ok(());
        }

        let mut prev_fetch_pc = None;
        loop {
            let (cycle, fetch_pc) = {
                let m = self.machine.lock();
                (m.cycle(), m.log.get(m.latches.pre_if_pc))
            };

            if let Some(limit) = self.config.general.limit_cycles {
                if cycle >= limit {
                    return Err(Fault::CycleLimit { limit });
                }
            }

            if self.stop_at_cycle.is_some_and(|s| cycle >= s) {
                self.stop_at_cycle = None;
                if !self.pause()? {
                    return Ok(());
                }
            }
            if self.stop_at_pc.is_some_and(|pc| pc & !1 == fetch_pc) {
                self.stop_at_pc = None;
                if !self.pause()? {
                    return Ok(());
                }
            }

            // A fetch PC that stopped moving means the program sits in a
            // branch-to-self: the bare-metal "done".
            if coordinator.is_none() && prev_fetch_pc == Some(fetch_pc) {
                info!(cycle, pc = format_args!("{fetch_pc:#010x}"), "program reached its final branch");
                if !self.serve_debugger(true)? {
                    return Ok(());
                }
            }
            prev_fetch_pc = Some(fetch_pc);

            if self.config.general.slow_sim {
                std::thread::sleep(SLOW_SIM_DELAY);
            }

            self.machine.lock().log.begin_cycle();
            match coordinator {
                Some(c) => c.tick()?,
                None => {
                    let mut m = self.machine.lock();
                    if let Err(fault) = stages::step_inline(&mut m) {
                        m.fault = Some(fault);
                    }
                }
            }

            let self_branch = {
                let mut m = self.machine.lock();
                m.tock()?;
                if let Some(fault) = m.take_fault() {
                    return Err(fault);
                }
                if self.config.general.print_cycles {
                    dump::print_reg_state(&m);
                }
                if self.config.general.show_led_writes && m.log.flag_set(flags::LED_WRITTEN) {
                    dump::print_leds_line(&m);
                }
                m.self_branch
            };

            if self_branch {
                let cycle = self.machine.lock().cycle();
                info!(cycle, "program reached its final branch");
                if !self.serve_debugger(true)? {
                    return Ok(());
                }
                self.machine.lock().self_branch = false;
            }
        }
    }

    /// Pauses at a configured stop point: the debugger when attached, the
    /// shell otherwise.
    ///
    /// # Returns
    ///
    /// `false` when the simulation should terminate.
    fn pause(&mut self) -> Result<bool, Fault> {
        match self.gdb.as_mut() {
            Some(gdb) => match gdb.report_stop(&self.machine)? {
                gdb::Outcome::Kill => Ok(false),
                gdb::Outcome::Resume { stop_at } => {
                    self.stop_at_cycle = stop_at;
                    Ok(true)
                }
            },
            None => {
                let mut m = self.machine.lock();
                match shell::interact(&mut m)? {
                    shell::Outcome::Terminate => Ok(false),
                    shell::Outcome::Resume { stop_at_cycle, stop_at_pc } => {
                        self.stop_at_cycle = stop_at_cycle;
                        if stop_at_pc.is_some() {
                            self.stop_at_pc = stop_at_pc;
                        }
                        Ok(true)
                    }
                }
            }
        }
    }

    /// Hands control to the debugger.
    ///
    /// # Arguments
    ///
    /// * `stopped` - Whether to open with a stop reply (a break) rather than
    ///   waiting for the debugger to speak first.
    ///
    /// # Returns
    ///
    /// `false` when the simulation should terminate: no debugger is
    /// attached, or the debugger killed the session.
    fn serve_debugger(&mut self, stopped: bool) -> Result<bool, Fault> {
        let Some(gdb) = self.gdb.as_mut() else {
            return Ok(false);
        };
        let outcome = if stopped {
            gdb.report_stop(&self.machine)?
        } else {
            gdb.wait(&self.machine)?
        };
        match outcome {
            gdb::Outcome::Kill => Ok(false),
            gdb::Outcome::Resume { stop_at } => {
                self.stop_at_cycle = stop_at;
                Ok(true)
            }
        }
    }
}
