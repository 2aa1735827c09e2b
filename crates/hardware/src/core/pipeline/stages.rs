//! The stage functions.
//!
//! Each function performs one stage's work for one cycle. In the threaded
//! mode all reads observe the previous cycle's committed latch values, so the
//! order the workers happen to run in does not matter.

use crate::common::Fault;
use crate::common::Stage;
use crate::core::machine::Machine;
use crate::core::pipeline::STALL_PC;
use crate::isa::OpHandler;

/// Whether a leading halfword opens a 32-bit encoding.
#[inline]
pub fn is_wide(hw: u16) -> bool {
    hw >= 0xE800
}

/// Fetch: reads the next encoding and advances the fetch PC.
///
/// A 32-bit encoding is read whole, both halfwords in one cycle. The latched
/// PC is the fetch address plus four, which is the value the instruction
/// itself observes in register 15.
pub fn fetch(m: &mut Machine) -> Result<(), Fault> {
    let l = m.latches;
    let addr = m.log.get(l.pre_if_pc);
    let hw1 = m.read_halfword(addr)?;
    let (inst, advance) = if is_wide(hw1) {
        let hw2 = m.read_halfword(addr.wrapping_add(2))?;
        ((u32::from(hw1) << 16) | u32::from(hw2), 4)
    } else {
        (u32::from(hw1), 2)
    };
    m.log
        .write(Stage::PreFetch, l.pre_if_pc, addr.wrapping_add(advance));
    m.log.write(Stage::Fetch, l.if_id_pc, addr.wrapping_add(4));
    m.log.write(Stage::Fetch, l.if_id_inst, inst);
    Ok(())
}

/// Decode: resolves the fetched encoding against the opcode table.
///
/// An unrecognized encoding latches as no opcode rather than faulting here;
/// a flush may void it before it ever reaches execute, and only execution of
/// an unrecognized encoding is illegal.
pub fn decode(m: &mut Machine) -> Result<(), Fault> {
    let l = m.latches;
    let pc = m.log.get(l.if_id_pc);
    let inst = m.log.get(l.if_id_inst);
    let op = m.opcodes.find(inst);
    m.log.write(Stage::Decode, l.id_ex_pc, pc);
    m.log.write(Stage::Decode, l.id_ex_inst, inst);
    m.log.write_ptr(Stage::Decode, l.id_ex_op, op);
    Ok(())
}

/// Execute: dispatches the latched opcode's handler.
///
/// Bubbles do nothing. Executing the same address twice in a row means the
/// program branched to itself, the bare-metal idiom for "done"; the machine
/// raises its self-branch marker for the driver.
pub fn execute(m: &mut Machine) -> Result<(), Fault> {
    let l = m.latches;
    let pc = m.log.get(l.id_ex_pc);
    if pc == STALL_PC {
        return Ok(());
    }
    let inst = m.log.get(l.id_ex_inst);
    let Some(op) = m.log.get_ptr(l.id_ex_op) else {
        return Err(Fault::IllegalInstr { inst });
    };
    if m.opcodes.is_bubble(op) {
        return Ok(());
    }
    if m.prev_exec_pc == Some(pc) {
        m.self_branch = true;
    }
    m.prev_exec_pc = Some(pc);
    match m.opcodes.handler(op) {
        OpHandler::Thumb16(f) => f(m, inst as u16),
        OpHandler::Thumb32(f) => f(m, inst),
    }
}

/// Runs all three stages sequentially for the inline pipeline mode.
///
/// Writes apply as issued, so the instruction fetched this cycle is also
/// decoded and executed this cycle.
pub fn step_inline(m: &mut Machine) -> Result<(), Fault> {
    fetch(m)?;
    decode(m)?;
    execute(m)
}
