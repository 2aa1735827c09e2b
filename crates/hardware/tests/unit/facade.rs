//! Register facade tests.
//!
//! Verifies the architectural quirks at the register boundary: SP bit
//! forcing, PC reads from the execute latch, and the three flavors of PC
//! write (inline redirect, threaded flush-or-absorb, debugger flush).

use crate::common::TestContext;
use armsim_core::common::Stage;
use armsim_core::core::pipeline::STALL_PC;
use pretty_assertions::assert_eq;

// ══════════════════════════════════════════════════════════
// 1. Reads and plain writes
// ══════════════════════════════════════════════════════════

#[test]
fn general_registers_round_trip() {
    let mut ctx = TestContext::inline();
    ctx.machine.reg_write(Stage::Execute, 5, 0xCAFE_F00D);
    assert_eq!(ctx.machine.reg_read(5), 0xCAFE_F00D);
}

#[test]
fn sp_forces_word_alignment_both_ways() {
    let mut ctx = TestContext::inline();
    ctx.machine.reg_write(Stage::Execute, 13, 0x2000_FFFD);
    assert_eq!(ctx.machine.reg_read(13), 0x2000_FFFC);
}

#[test]
fn pc_reads_the_execute_latch_with_thumb_bit_clear() {
    let ctx = TestContext::inline();
    let mut m = ctx.machine;
    let latches = m.latches();
    m.log.poke(latches.id_ex_pc, 0x0000_000F);
    assert_eq!(m.reg_read(15), 0x0000_000E);
}

#[test]
fn ipsr_holds_only_the_exception_number() {
    let mut ctx = TestContext::inline();
    ctx.machine.ipsr_write(Stage::Execute, 0xFFFF_FFFF);
    assert_eq!(ctx.machine.ipsr_read(), 0x1FF);
}

// ══════════════════════════════════════════════════════════
// 2. PC writes
// ══════════════════════════════════════════════════════════

#[test]
fn inline_pc_write_redirects_fetch_directly() {
    let mut ctx = TestContext::inline();
    ctx.machine.reg_write(Stage::Execute, 15, 0x0000_0101);
    let latches = ctx.machine.latches();
    assert_eq!(ctx.machine.log.get(latches.pre_if_pc), 0x0000_0100);
}

#[test]
fn threaded_pc_write_flushes_at_tock() {
    let mut ctx = TestContext::threaded();
    let m = &mut ctx.machine;
    let latches = m.latches();
    m.log.begin_cycle();
    m.reg_write(Stage::Execute, 15, 0x0000_0100);
    // Nothing moves until the commit runs the flush sub-phase.
    assert_ne!(m.log.get(latches.pre_if_pc), 0x0000_0100);
    m.tock().unwrap();
    assert_eq!(m.log.get(latches.pre_if_pc), 0x0000_0100);
    assert_eq!(m.log.get(latches.if_id_pc), STALL_PC);
}

#[test]
fn branch_to_the_in_flight_address_is_absorbed() {
    let mut ctx = TestContext::threaded();
    let m = &mut ctx.machine;
    let latches = m.latches();
    // Fetch already holds the instruction at 0x100.
    m.log.poke(latches.if_id_pc, 0x0000_0104);
    m.log.begin_cycle();
    m.reg_write(Stage::Execute, 15, 0x0000_0100);
    m.tock().unwrap();
    // No flush: the fetched instruction survives.
    assert_eq!(m.log.get(latches.if_id_pc), 0x0000_0104);
}

#[test]
fn debugger_pc_write_flushes_immediately() {
    let mut ctx = TestContext::threaded();
    let m = &mut ctx.machine;
    let latches = m.latches();
    m.log.begin_cycle();
    m.log.enter_debugging();
    m.reg_write(Stage::Sim, 15, 0x0000_0200);
    m.log.exit_debugging();
    assert_eq!(m.log.get(latches.pre_if_pc), 0x0000_0200);
    assert_eq!(m.log.get(latches.if_id_pc), STALL_PC);
}
