//! Builtin Thumb opcode set.
//!
//! A deliberately small set: enough to boot the vector table, move an exit
//! status into r0, and sit in the terminating self-branch. Full ISA semantics
//! belong to opcode packs registered on top of this table.

use crate::common::{Fault, Stage};
use crate::core::machine::Machine;
use crate::isa::OpcodeTable;

/// Encoding of the pipeline bubble pseudo-op.
///
/// `0xDExx` is the permanently-undefined Thumb space, so no real program
/// carries this halfword.
pub const BUBBLE: u16 = 0xDEAD;

/// APSR negative flag.
pub const APSR_N: u32 = 1 << 31;
/// APSR zero flag.
pub const APSR_Z: u32 = 1 << 30;

/// Registers the builtin opcodes (and the bubble pseudo-op) on a table.
pub fn register_builtin(table: &mut OpcodeTable) -> Result<(), Fault> {
    let _ = table.register_mask16(0x2000, 0xD800, movs_imm8, "MOVS imm8")?;
    let _ = table.register_mask16(0xE000, 0x1800, b_t2, "B T2")?;
    let _ = table.register_mask16(0xBF00, !0xBF00, nop, "NOP")?;
    let bubble = table.register_mask16(BUBBLE, !BUBBLE, pipeline_bubble, "Pipeline Bubble")?;
    table.set_bubble(bubble);
    Ok(())
}

/// MOVS <Rd>, #<imm8> — encoding T1: `0010 0ddd iiii iiii`.
fn movs_imm8(m: &mut Machine, inst: u16) -> Result<(), Fault> {
    let rd = usize::from(inst >> 8) & 0x7;
    let imm = u32::from(inst & 0xFF);
    m.reg_write(Stage::Execute, rd, imm);

    let mut apsr = m.apsr_read() & !(APSR_N | APSR_Z);
    if imm == 0 {
        apsr |= APSR_Z;
    }
    // imm8 can never be negative; N always clears.
    m.apsr_write(Stage::Execute, apsr);
    Ok(())
}

/// B — encoding T2: `1110 0iii iiii iiii`, unconditional, imm11.
fn b_t2(m: &mut Machine, inst: u16) -> Result<(), Fault> {
    let imm11 = u32::from(inst & 0x7FF);
    // imm11:'0', sign-extended from 12 bits.
    let offset = ((imm11 << 1) as i32) << 20 >> 20;
    let target = m.reg_read(15).wrapping_add(offset as u32);
    m.reg_write(Stage::Execute, 15, target);
    Ok(())
}

/// NOP — encoding T1: `0xBF00`.
fn nop(_m: &mut Machine, _inst: u16) -> Result<(), Fault> {
    Ok(())
}

/// The bubble a pipeline flush injects; executing it does nothing.
fn pipeline_bubble(_m: &mut Machine, _inst: u16) -> Result<(), Fault> {
    Ok(())
}
