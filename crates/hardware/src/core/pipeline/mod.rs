//! The three-stage pipeline: latches, stage functions, and the threaded
//! coordinator.
//!
//! One simulated cycle is a *tick* (every stage runs once against the latch
//! values the previous cycle committed) followed by a *tock* (the machine
//! commits the cycle's writes). The inline mode runs the three stages
//! sequentially on the driver thread with writes applied as issued, so one
//! instruction completes per cycle; the threaded mode runs them as three
//! workers against deferred writes, which is where hazards, bubbles, and
//! flushes become visible.

pub mod coordinator;
pub mod stages;

pub use coordinator::Coordinator;

use crate::core::state::{CellId, PtrCellId, StateLog};
use crate::isa::thumb::BUBBLE;

/// PC value marking a latch as holding no instruction.
pub const STALL_PC: u32 = 0xFFFF_FFFF;

/// The inter-stage latches.
///
/// Each latch is a tracked cell, so the pipeline's in-flight state rewinds
/// with everything else.
#[derive(Clone, Copy, Debug)]
pub struct Latches {
    /// Address the fetch stage reads next.
    pub pre_if_pc: CellId,
    /// PC of the fetched instruction, as the instruction itself reads it
    /// (address plus four).
    pub if_id_pc: CellId,
    /// The fetched encoding. 16-bit encodings sit in the low halfword;
    /// 32-bit encodings carry their first halfword in the high half.
    pub if_id_inst: CellId,
    /// PC of the instruction in execute.
    pub id_ex_pc: CellId,
    /// Encoding of the instruction in execute.
    pub id_ex_inst: CellId,
    /// Decoded opcode of the instruction in execute.
    pub id_ex_op: PtrCellId,
}

impl Latches {
    /// Allocates the latch cells, seeded with bubbles.
    pub fn new(log: &mut StateLog) -> Self {
        Self {
            pre_if_pc: log.alloc_cell("pre_if_pc", 0),
            if_id_pc: log.alloc_cell("if_id_pc", STALL_PC),
            if_id_inst: log.alloc_cell("if_id_inst", u32::from(BUBBLE)),
            id_ex_pc: log.alloc_cell("id_ex_pc", STALL_PC),
            id_ex_inst: log.alloc_cell("id_ex_inst", u32::from(BUBBLE)),
            id_ex_op: log.alloc_ptr_cell("id_ex_op"),
        }
    }
}
