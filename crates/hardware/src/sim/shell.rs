//! The interactive shell.
//!
//! The driver drops into the shell when a configured dump point is reached.
//! While the shell holds the machine, the debugger flag is raised so edits
//! mutate live state directly instead of entering history.

use crate::common::Fault;
use crate::core::machine::Machine;
use crate::core::state::CellId;
use crate::sim::dump;
use std::io::{BufRead, Write};
use tracing::warn;

/// A parsed shell command.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    /// Advance one cycle and return to the shell.
    Step,
    /// Leave the shell and run freely.
    Continue,
    /// Run `n` more cycles and return to the shell.
    Cycle(i64),
    /// Seek to an absolute cycle.
    Seek(i64),
    /// Stop when fetch reaches an address.
    BreakPc(u32),
    /// Set the PC (flushes the pipeline).
    SetPc(u32),
    /// Print registers, latches, and LEDs.
    Show,
    /// Hexdump a memory window. `rom` selects ROM over RAM.
    Mem {
        /// Dump ROM instead of RAM.
        rom: bool,
        /// Start address; the region base when absent.
        addr: Option<u32>,
        /// Word count; 16 when absent.
        words: Option<usize>,
    },
    /// End the simulation.
    Terminate,
    /// Print the command list.
    Help,
}

/// What the driver should do after the shell returns.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// Keep simulating; stop again at these points if set.
    Resume {
        /// Cycle to re-enter the shell at.
        stop_at_cycle: Option<i64>,
        /// Fetch address to re-enter the shell at.
        stop_at_pc: Option<u32>,
    },
    /// Shut the simulation down.
    Terminate,
}

/// Parses one shell line.
///
/// # Returns
///
/// The command, or a usage string for the user.
pub fn parse(line: &str) -> Result<Command, String> {
    let mut parts = line.split_whitespace();
    let Some(word) = parts.next() else {
        return Ok(Command::Step);
    };
    let cmd = match word {
        "continue" | "c" => Command::Continue,
        "terminate" | "quit" | "q" => Command::Terminate,
        "show" | "s" => Command::Show,
        "help" | "h" | "?" => Command::Help,
        "cycle" => Command::Cycle(
            parse_num(parts.next().ok_or("usage: cycle <n>")?)
                .ok_or("usage: cycle <n>")?,
        ),
        "seek" => Command::Seek(
            parse_num(parts.next().ok_or("usage: seek <cycle>")?)
                .ok_or("usage: seek <cycle>")?,
        ),
        "pc" => Command::BreakPc(
            parse_hex(parts.next().ok_or("usage: pc <hexaddr>")?)
                .ok_or("usage: pc <hexaddr>")?,
        ),
        "setpc" => Command::SetPc(
            parse_hex(parts.next().ok_or("usage: setpc <hexaddr>")?)
                .ok_or("usage: setpc <hexaddr>")?,
        ),
        "ram" | "rom" => Command::Mem {
            rom: word == "rom",
            addr: match parts.next() {
                Some(a) => Some(parse_hex(a).ok_or("bad address")?),
                None => None,
            },
            words: match parts.next() {
                Some(w) => Some(w.parse().map_err(|_| "bad word count")?),
                None => None,
            },
        },
        other => return Err(format!("unknown command '{other}'; try 'help'")),
    };
    if parts.next().is_some() {
        return Err("trailing arguments; try 'help'".into());
    }
    Ok(cmd)
}

fn parse_num(s: &str) -> Option<i64> {
    s.parse().ok()
}

fn parse_hex(s: &str) -> Option<u32> {
    u32::from_str_radix(s.trim_start_matches("0x"), 16).ok()
}

const HELP: &str = "\
  <enter>           advance one cycle
  cycle <n>         advance n cycles
  seek <cycle>      jump to an absolute cycle (backward seeks rewind history)
  pc <hexaddr>      stop when fetch reaches an address
  setpc <hexaddr>   set the PC and flush the pipeline
  show              print registers, pipeline latches, and LEDs
  ram [addr [n]]    hexdump n words of RAM (addresses in hex)
  rom [addr [n]]    hexdump n words of ROM
  continue          leave the shell and run freely
  terminate         end the simulation";

/// Runs the shell until the user resumes or terminates.
///
/// The debugger flag is held for the whole interaction, so `setpc` writes
/// and any register edits apply directly without history records.
pub fn interact(m: &mut Machine) -> Result<Outcome, Fault> {
    println!("--- paused at cycle {} ---", m.cycle());
    dump::print_full_state(m);
    m.log.enter_debugging();
    let outcome = shell_loop(m);
    m.log.exit_debugging();
    outcome
}

fn shell_loop(m: &mut Machine) -> Result<Outcome, Fault> {
    let stdin = std::io::stdin();
    let mut line = String::new();
    let mut stop_at_pc = None;
    loop {
        print!("sim> ");
        std::io::stdout().flush()?;
        line.clear();
        if stdin.lock().read_line(&mut line)? == 0 {
            // Stdin closed; nothing left to wait for.
            return Ok(Outcome::Resume {
                stop_at_cycle: None,
                stop_at_pc: stop_at_pc.take(),
            });
        }
        match parse(&line) {
            Err(usage) => println!("{usage}"),
            Ok(cmd) => {
                if let Some(outcome) = run_command(m, cmd, &mut stop_at_pc) {
                    return Ok(outcome);
                }
            }
        }
    }
}

/// Applies one parsed command. `pc` arms a fetch-address breakpoint that a
/// later resume carries to the driver. `None` keeps the shell open.
pub fn run_command(m: &mut Machine, cmd: Command, stop_at_pc: &mut Option<u32>) -> Option<Outcome> {
    match cmd {
        Command::Step => {
            return Some(Outcome::Resume {
                stop_at_cycle: Some(m.cycle() + 1),
                stop_at_pc: stop_at_pc.take(),
            })
        }
        Command::Cycle(n) => {
            return Some(Outcome::Resume {
                stop_at_cycle: Some(m.cycle() + n.max(1)),
                stop_at_pc: stop_at_pc.take(),
            })
        }
        Command::Continue => {
            return Some(Outcome::Resume {
                stop_at_cycle: None,
                stop_at_pc: stop_at_pc.take(),
            })
        }
        Command::Terminate => return Some(Outcome::Terminate),
        Command::Show => dump::print_full_state(m),
        Command::Help => println!("{HELP}"),
        Command::BreakPc(addr) => {
            *stop_at_pc = Some(addr);
            println!("will stop when fetch reaches {:08x}", addr & !1);
        }
        Command::SetPc(addr) => {
            m.reg_write(crate::common::Stage::Sim, 15, addr);
            println!("pc set to {:08x}; pipeline flushed", addr & !1);
        }
        Command::Seek(target) => match m.log.seek(target) {
            Ok(()) => {
                println!("now at cycle {}", m.cycle());
                dump::print_full_state(m);
            }
            Err(e) => warn!("{e}"),
        },
        Command::Mem { rom, addr, words } => hexdump(m, rom, addr, words),
    }
    None
}

fn hexdump(m: &Machine, rom: bool, addr: Option<u32>, words: Option<usize>) {
    let (base, top) = if rom {
        (m.rom().base(), m.rom().top())
    } else {
        (m.ram().base(), m.ram().top())
    };
    let cell_at = |a: u32| -> CellId {
        if rom {
            m.rom().cell_at(a)
        } else {
            m.ram().cell_at(a)
        }
    };
    let start = addr.unwrap_or(base) & !3;
    let count = words.unwrap_or(16);
    if start < base || start >= top {
        println!("{start:08x} is outside {base:08x}..{top:08x}");
        return;
    }
    for (i, a) in (start..top).step_by(4).take(count).enumerate() {
        if i % 4 == 0 {
            if i > 0 {
                println!();
            }
            print!("{a:08x}:");
        }
        print!(" {:08x}", m.log.get(cell_at(a)));
    }
    println!();
}
