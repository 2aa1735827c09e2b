//! The GDB remote stub.
//!
//! A minimal remote-serial-protocol server on TCP. It provides:
//! 1. **Framing:** Packet encode/decode with acknowledgements and
//!    retransmission ([`packet`]).
//! 2. **Commands:** Register and memory reads, single-step, continue, and
//!    reverse execution backed by the state log's seek.
//!
//! The stub holds the machine only while handling a command; resume-class
//! commands hand control back to the driver with a stop condition.

pub mod packet;

use crate::common::{Fault, SeekError, Stage};
use crate::core::machine::{Machine, SharedMachine};
use std::io::Write;
use std::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};

const STOP_REPLY: &str = "S05";
const SUPPORTED: &str = "PacketSize=127;qReverseContinue+;qReverseStep+";

/// What the driver should do after the stub hands control back.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// Keep simulating; stop and report at this cycle if set.
    Resume {
        /// Cycle to report a stop at; `None` runs freely.
        stop_at: Option<i64>,
    },
    /// The debugger killed the session.
    Kill,
}

/// Per-command result, before framing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CommandOutcome {
    /// Send this payload back.
    Reply(String),
    /// Hand control back to the driver.
    Resume {
        /// Cycle to report a stop at.
        stop_at: Option<i64>,
    },
    /// Kill the session.
    Kill,
}

/// A connected GDB remote session.
pub struct GdbStub {
    stream: TcpStream,
}

impl std::fmt::Debug for GdbStub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("GdbStub")
    }
}

impl GdbStub {
    /// Binds the port and blocks until a debugger connects.
    pub fn listen(port: u16) -> Result<Self, Fault> {
        let listener = TcpListener::bind(("0.0.0.0", port))?;
        info!(port, "GDB stub listening (target remote :port)");
        let (stream, peer) = listener.accept()?;
        info!(%peer, "debugger connected");
        Ok(Self { stream })
    }

    /// Sends one payload, retransmitting until the debugger acknowledges.
    pub fn send(&mut self, payload: &str) -> Result<(), Fault> {
        let frame = packet::encode(payload);
        loop {
            self.stream.write_all(&frame)?;
            match self.read_ack()? {
                b'+' => return Ok(()),
                b'-' => debug!(payload, "retransmitting"),
                other => {
                    return Err(Fault::GdbDesync {
                        reason: format!("expected ack, got {other:#04x}"),
                    })
                }
            }
        }
    }

    fn read_ack(&mut self) -> Result<u8, Fault> {
        use std::io::Read;
        let mut buf = [0u8; 1];
        if self.stream.read(&mut buf)? == 0 {
            return Err(Fault::GdbDesync {
                reason: "connection closed awaiting ack".into(),
            });
        }
        Ok(buf[0])
    }

    /// Serves commands until the debugger resumes execution or kills the
    /// session.
    ///
    /// The debugger flag is raised around each command, so register and
    /// memory edits mutate live state directly.
    pub fn wait(&mut self, machine: &SharedMachine) -> Result<Outcome, Fault> {
        loop {
            let cmd = packet::read_packet(&mut self.stream)?;
            self.stream.write_all(b"+")?;
            debug!(cmd, "gdb command");
            let outcome = {
                let mut m = machine.lock();
                m.log.enter_debugging();
                let outcome = handle_command(&mut m, &cmd);
                m.log.exit_debugging();
                outcome
            };
            match outcome {
                CommandOutcome::Reply(payload) => self.send(&payload)?,
                CommandOutcome::Resume { stop_at } => return Ok(Outcome::Resume { stop_at }),
                CommandOutcome::Kill => return Ok(Outcome::Kill),
            }
        }
    }

    /// Reports a stop to the debugger and serves commands until it resumes.
    pub fn report_stop(&mut self, machine: &SharedMachine) -> Result<Outcome, Fault> {
        self.send(STOP_REPLY)?;
        self.wait(machine)
    }
}

/// Handles one unframed command.
pub fn handle_command(m: &mut Machine, cmd: &str) -> CommandOutcome {
    match cmd.as_bytes().first() {
        Some(b'?') => CommandOutcome::Reply(STOP_REPLY.into()),
        Some(b'g') => CommandOutcome::Reply(read_all_regs(m)),
        Some(b'm') => CommandOutcome::Reply(read_memory(m, &cmd[1..])),
        Some(b's') => CommandOutcome::Resume {
            stop_at: Some(m.cycle() + 1),
        },
        Some(b'c') => CommandOutcome::Resume { stop_at: None },
        Some(b'k') => CommandOutcome::Kill,
        // Thread selection; there is exactly one thread.
        Some(b'H') => CommandOutcome::Reply("OK".into()),
        Some(b'P') => CommandOutcome::Reply(write_reg(m, &cmd[1..])),
        _ if cmd == "qC" => CommandOutcome::Reply(String::new()),
        _ if cmd.starts_with("qSupported") => CommandOutcome::Reply(SUPPORTED.into()),
        _ if cmd == "bs" => CommandOutcome::Reply(reverse_step(m)),
        _ if cmd == "bc" => CommandOutcome::Reply(reverse_continue(m)),
        // Anything unrecognized gets the standard empty reply.
        _ => CommandOutcome::Reply(String::new()),
    }
}

/// `g`: all sixteen core registers, each in target byte order.
fn read_all_regs(m: &Machine) -> String {
    let mut reply = String::with_capacity(16 * 8);
    for r in 0..16 {
        let val = m.reg_read(r);
        reply.push_str(&format!("{:08x}", val.swap_bytes()));
    }
    reply
}

/// `m addr,len`: hex-encoded memory bytes.
fn read_memory(m: &mut Machine, args: &str) -> String {
    let Some((addr, len)) = args.split_once(',') else {
        return "E01".into();
    };
    let (Ok(addr), Ok(len)) = (
        u32::from_str_radix(addr, 16),
        u32::from_str_radix(len, 16),
    ) else {
        return "E01".into();
    };
    let mut reply = String::with_capacity(len as usize * 2);
    for offset in 0..len {
        match m.read_byte(addr.wrapping_add(offset)) {
            Ok(byte) => reply.push_str(&format!("{byte:02x}")),
            Err(fault) => {
                warn!(%fault, "gdb memory read refused");
                return "E01".into();
            }
        }
    }
    reply
}

/// `P n=value`: write one register, value in target byte order.
fn write_reg(m: &mut Machine, args: &str) -> String {
    let Some((reg, val)) = args.split_once('=') else {
        return "E01".into();
    };
    let (Ok(reg), Ok(val)) = (
        usize::from_str_radix(reg, 16),
        u32::from_str_radix(val, 16),
    ) else {
        return "E01".into();
    };
    if reg > 15 {
        return "E01".into();
    }
    m.reg_write(Stage::Sim, reg, val.swap_bytes());
    "OK".into()
}

/// `bs`: rewind exactly one cycle.
fn reverse_step(m: &mut Machine) -> String {
    match m.log.seek(m.cycle() - 1) {
        Ok(()) | Err(SeekError::AtTarget { .. }) => STOP_REPLY.into(),
        Err(e) => {
            warn!("{e}");
            "E01".into()
        }
    }
}

/// `bc`: rewind as far as history allows, stopping after any I/O barrier.
fn reverse_continue(m: &mut Machine) -> String {
    match m.log.seek(0) {
        Ok(()) | Err(SeekError::AtTarget { .. }) => STOP_REPLY.into(),
        Err(SeekError::IoBarrier { cycle }) => match m.log.seek(cycle) {
            Ok(()) | Err(SeekError::AtTarget { .. }) => STOP_REPLY.into(),
            Err(e) => {
                warn!("{e}");
                "E01".into()
            }
        },
        Err(e) => {
            warn!("{e}");
            "E01".into()
        }
    }
}
