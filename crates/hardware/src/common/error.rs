//! Fault and seek-error definitions.
//!
//! This module defines the two error families of the simulator:
//! 1. **`Fault`:** Fatal conditions. The driver dumps core and the process
//!    exits with a per-fault status code.
//! 2. **`SeekError`:** Tolerable time-travel failures. The caller warns and
//!    the simulation continues from wherever it stands.

use super::stage::Stage;
use thiserror::Error;

/// A fatal simulation fault.
///
/// Faults propagate up to the simulation driver, which prints a full core
/// dump and exits the process with [`Fault::exit_code`].
#[derive(Debug, Error)]
pub enum Fault {
    /// A read or write touched an address no registered range contains,
    /// or the address was not word-aligned.
    #[error("invalid address {addr:#010x} ({} access)", if *.write { "write" } else { "read" })]
    InvalidAddr {
        /// The faulting address.
        addr: u32,
        /// Whether the access was a write.
        write: bool,
    },

    /// A write touched a range registered with only a read handler.
    #[error("{addr:#010x} is read-only")]
    ReadOnly {
        /// The faulting address.
        addr: u32,
    },

    /// A read touched a range registered with only a write handler.
    #[error("{addr:#010x} is write-only")]
    WriteOnly {
        /// The faulting address.
        addr: u32,
    },

    /// No opcode mask matched the fetched encoding.
    #[error("illegal instruction {inst:#06x}")]
    IllegalInstr {
        /// The raw encoding (16-bit in the low half, 32-bit packed high/low).
        inst: u32,
    },

    /// Architecturally unpredictable behavior was requested.
    #[error("unpredictable: {reason}")]
    Unpredictable {
        /// What went wrong.
        reason: String,
    },

    /// A recognized operation the simulator does not implement.
    #[error("not implemented: {what}")]
    NotImplemented {
        /// The missing piece.
        what: &'static str,
    },

    /// Two opcode registrations carried the same (ones, zeros) mask pair.
    #[error("duplicate opcode mask for {name}: ones {ones:#010x}, zeros {zeros:#010x}")]
    DuplicateMask {
        /// Name attached to the later registration.
        name: &'static str,
        /// The offending ones mask.
        ones: u32,
        /// The offending zeros mask.
        zeros: u32,
    },

    /// An opcode registration was malformed.
    #[error("bad opcode registration for {name}: {reason}")]
    BadOpcode {
        /// Name attached to the registration.
        name: &'static str,
        /// Why it was rejected.
        reason: &'static str,
    },

    /// Two unstalled writes hit the same word cell in one cycle.
    #[error("cell {cell} was aliased: expected {expected:#010x}, found {found:#010x}")]
    Aliasing {
        /// Name of the aliased cell.
        cell: &'static str,
        /// The value the earlier record expected to survive the cycle.
        expected: u32,
        /// The value actually present after commit.
        found: u32,
    },

    /// A stall was requested for a stage past decode.
    #[error("stalling {stage} is not supported")]
    IllegalStall {
        /// The stage that cannot be stalled.
        stage: Stage,
    },

    /// The configured cycle limit ran out.
    #[error("cycle limit ({limit}) reached")]
    CycleLimit {
        /// The configured limit.
        limit: i64,
    },

    /// A pipeline stage worker exited outside of coordinated shutdown.
    #[error("pipeline stage thread exited unexpectedly")]
    CoreThreadExit,

    /// The flash image could not be loaded.
    #[error("bad flash image: {reason}")]
    BadFlash {
        /// Why the image was rejected.
        reason: String,
    },

    /// The GDB remote connection lost protocol synchronization.
    #[error("gdb protocol desync: {reason}")]
    GdbDesync {
        /// What broke the framing.
        reason: String,
    },

    /// An I/O error from a socket or dump file.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl Fault {
    /// The process exit status for this fault.
    pub fn exit_code(&self) -> i32 {
        match self {
            Fault::InvalidAddr { .. } => 2,
            Fault::ReadOnly { .. } => 3,
            Fault::WriteOnly { .. } => 4,
            Fault::IllegalInstr { .. } => 5,
            Fault::Unpredictable { .. } | Fault::Aliasing { .. } | Fault::IllegalStall { .. } => 6,
            Fault::NotImplemented { .. } => 7,
            Fault::DuplicateMask { .. } | Fault::BadOpcode { .. } => 8,
            Fault::CycleLimit { .. } => 9,
            Fault::CoreThreadExit => 10,
            Fault::BadFlash { .. } => 11,
            Fault::GdbDesync { .. } => 12,
            Fault::Io(_) => 13,
        }
    }
}

/// A tolerable failure while seeking through recorded history.
///
/// These are warnings, not faults: the state log guarantees simulated state
/// is untouched when a seek is refused.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SeekError {
    /// The target cycle lies outside recorded history.
    #[error("state is only known up to cycle {known}")]
    PastHistory {
        /// The newest (or oldest) cycle the log can reach.
        known: i64,
    },

    /// The target cycle is the current cycle.
    #[error("already at cycle {cycle}")]
    AtTarget {
        /// The current cycle.
        cycle: i64,
    },

    /// Rewinding would cross a cycle with externally visible I/O.
    #[error("cannot rewind past I/O performed at cycle {cycle}")]
    IoBarrier {
        /// The cycle carrying the barrier.
        cycle: i64,
    },
}
