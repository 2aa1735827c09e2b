//! The architectural register facade.
//!
//! Reads and writes of r0..r15 and the status registers, with the
//! architectural quirks applied at the boundary:
//! - The stack pointer forces its low two bits clear on both directions.
//! - Register 15 reads as the execute-stage PC with the Thumb bit cleared;
//!   writes to it steer the fetch stage and, in the threaded pipeline,
//!   schedule a flush unless the target is already in flight.

use crate::common::Stage;
use crate::config::PipelineMode;
use crate::core::machine::Machine;
use crate::core::state::flags;

const SP: usize = 13;
const PC: usize = 15;

impl Machine {
    /// Reads an architectural register.
    ///
    /// Register 15 resolves to the PC of the instruction currently in the
    /// execute stage, which for Thumb reads as the instruction's address
    /// plus four.
    pub fn reg_read(&self, reg: usize) -> u32 {
        match reg {
            PC => self.log.get(self.latches.id_ex_pc) & !1,
            SP => self.log.get(self.regs[SP]) & !3,
            r => self.log.get(self.regs[r]),
        }
    }

    /// Writes an architectural register, attributed to `stage`.
    ///
    /// Writes to register 15 are branches. In the inline pipeline the fetch
    /// PC is simply redirected. In the threaded pipeline the write is
    /// absorbed when the target is the halfword fetch already has in flight;
    /// otherwise a flush is scheduled for this cycle's tock. Debugger writes
    /// always flush, immediately.
    pub fn reg_write(&mut self, stage: Stage, reg: usize, val: u32) {
        match reg {
            PC => self.pc_write(stage, val & !1),
            SP => self.log.write(stage, self.regs[SP], val & !3),
            r => self.log.write(stage, self.regs[r], val),
        }
    }

    fn pc_write(&mut self, stage: Stage, target: u32) {
        if self.log.flag_set(flags::DEBUGGING) {
            // Direct-write mode: the latches take the flush right now.
            self.flush_writes(target);
            return;
        }
        if self.mode == PipelineMode::Inline {
            self.log.write(stage, self.latches.pre_if_pc, target);
            return;
        }
        let in_flight = (self.log.get(self.latches.if_id_pc) & !1).wrapping_sub(4);
        if in_flight == target {
            // The branch lands exactly where fetch already is; nothing to
            // throw away.
            return;
        }
        self.log.set_flag(flags::PIPELINE_FLUSH);
        self.pending_flush = Some(target);
    }

    /// Reads the application status register.
    pub fn apsr_read(&self) -> u32 {
        self.log.get(self.apsr)
    }

    /// Writes the application status register.
    pub fn apsr_write(&mut self, stage: Stage, val: u32) {
        self.log.write(stage, self.apsr, val);
    }

    /// Reads the interrupt status register.
    pub fn ipsr_read(&self) -> u32 {
        self.log.get(self.ipsr)
    }

    /// Writes the interrupt status register. Only the exception number bits
    /// are held.
    pub fn ipsr_write(&mut self, stage: Stage, val: u32) {
        self.log.write(stage, self.ipsr, val & 0x1FF);
    }

    /// Reads the execution status register.
    pub fn epsr_read(&self) -> u32 {
        self.log.get(self.epsr)
    }

    /// Writes the execution status register.
    pub fn epsr_write(&mut self, stage: Stage, val: u32) {
        self.log.write(stage, self.epsr, val);
    }
}
