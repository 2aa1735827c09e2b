//! Pipeline behavior tests.
//!
//! Runs whole cycles through the stage functions in both execution modes
//! and verifies fill, flush, wide fetch, and the branch-to-self marker.

use crate::common::{self_branch_image, test_image, TestContext};
use armsim_core::common::Fault;
use armsim_core::core::pipeline::STALL_PC;
use armsim_core::core::state::flags;
use pretty_assertions::assert_eq;

// ══════════════════════════════════════════════════════════
// 1. Inline mode
// ══════════════════════════════════════════════════════════

#[test]
fn inline_completes_one_instruction_per_cycle() {
    let mut ctx = TestContext::inline().load_words(&test_image()).reset();
    ctx.run_cycle();
    assert_eq!(ctx.machine.reg_read(0), 42);
    assert_eq!(ctx.machine.cycle(), 1);
}

#[test]
fn inline_branch_to_self_redirects_fetch_in_place() {
    let mut ctx = TestContext::inline().load_words(&test_image()).reset();
    ctx.run_cycles(2);
    let latches = ctx.machine.latches();
    // The final branch keeps aiming fetch back at its own address.
    assert_eq!(ctx.machine.log.get(latches.pre_if_pc), 0xA);
}

// ══════════════════════════════════════════════════════════
// 2. Threaded mode
// ══════════════════════════════════════════════════════════

#[test]
fn threaded_pipeline_takes_three_cycles_to_fill() {
    let mut ctx = TestContext::threaded().load_words(&test_image()).reset();
    ctx.run_cycles(2);
    assert_eq!(ctx.machine.reg_read(0), 0);
    ctx.run_cycle();
    assert_eq!(ctx.machine.reg_read(0), 42);
}

#[test]
fn taken_branch_flushes_the_in_flight_instructions() {
    let mut ctx = TestContext::threaded().load_words(&test_image()).reset();
    // Cycle 4 executes the branch; its tock voids fetch and decode output.
    ctx.run_cycles(4);
    let m = &ctx.machine;
    let latches = m.latches();
    assert_eq!(m.log.get(latches.if_id_pc), STALL_PC);
    assert_eq!(m.log.get(latches.id_ex_pc), STALL_PC);
    assert_eq!(m.log.get(latches.pre_if_pc), 0xA);
    // The flush request is on the record: the cycle's flag word drove the
    // commit sub-phase and keeps it visible in history.
    assert!(m.log.flag_set(flags::PIPELINE_FLUSH));
}

#[test]
fn unflushed_cycles_do_not_raise_the_flush_flag() {
    let mut ctx = TestContext::threaded().load_words(&test_image()).reset();
    ctx.run_cycle();
    assert!(!ctx.machine.log.flag_set(flags::PIPELINE_FLUSH));
}

#[test]
fn re_executed_branch_raises_the_self_branch_marker() {
    let mut ctx = TestContext::threaded().load_words(&test_image()).reset();
    let mut guard = 0;
    while !ctx.machine.self_branch() {
        ctx.run_cycle();
        guard += 1;
        assert!(guard < 20, "branch-to-self never detected");
    }
    assert_eq!(ctx.machine.reg_read(0), 42);
}

#[test]
fn wide_encodings_fetch_both_halfwords_in_one_cycle() {
    // NOP.W (F3AF 8000) at the entry point.
    let image = [0x2000_FFFC, 0x0000_0009, 0x8000_F3AF];
    let mut ctx = TestContext::threaded().load_words(&image).reset();
    ctx.run_cycle();
    let m = &ctx.machine;
    let latches = m.latches();
    assert_eq!(m.log.get(latches.if_id_inst), 0xF3AF_8000);
    assert_eq!(m.log.get(latches.if_id_pc), 0xC);
    assert_eq!(m.log.get(latches.pre_if_pc), 0xC);
}

#[test]
fn executing_an_unknown_encoding_is_illegal() {
    let image = [0x2000_FFFC, 0x0000_0009, 0x0000_0000];
    let mut ctx = TestContext::threaded().load_words(&image).reset();
    ctx.run_cycles(2);
    let err = ctx.try_run_cycle().unwrap_err();
    assert!(matches!(err, Fault::IllegalInstr { inst: 0 }), "{err}");
}

// ══════════════════════════════════════════════════════════
// 3. Mode agreement
// ══════════════════════════════════════════════════════════

#[test]
fn both_modes_agree_on_the_final_register_state() {
    for mut ctx in [
        TestContext::inline().load_words(&test_image()).reset(),
        TestContext::threaded().load_words(&test_image()).reset(),
    ] {
        let mut guard = 0;
        while !ctx.machine.self_branch() {
            ctx.run_cycle();
            guard += 1;
            assert!(guard < 20, "branch-to-self never detected");
        }
        assert_eq!(ctx.machine.reg_read(0), 42);
        assert_eq!(ctx.machine.reg_read(13), 0x2000_FFFC);
    }
}

#[test]
fn entry_self_branch_detects_without_executing_anything_else() {
    let mut ctx = TestContext::threaded().load_words(&self_branch_image()).reset();
    let mut guard = 0;
    while !ctx.machine.self_branch() {
        ctx.run_cycle();
        guard += 1;
        assert!(guard < 20, "branch-to-self never detected");
    }
    assert_eq!(ctx.machine.reg_read(0), 0);
}
