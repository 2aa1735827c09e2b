//! Opcode table tests.
//!
//! Verifies mask registration rules, duplicate detection, exception
//! submasks, and decode of the builtin Thumb set.

use armsim_core::common::Fault;
use armsim_core::core::Machine;
use armsim_core::isa::{thumb, OpcodeTable};
use pretty_assertions::assert_eq;

fn stub16(_: &mut Machine, _: u16) -> Result<(), Fault> {
    Ok(())
}

fn stub32(_: &mut Machine, _: u32) -> Result<(), Fault> {
    Ok(())
}

fn builtin() -> OpcodeTable {
    let mut table = OpcodeTable::new();
    thumb::register_builtin(&mut table).unwrap();
    table
}

// ══════════════════════════════════════════════════════════
// 1. Registration rules
// ══════════════════════════════════════════════════════════

#[test]
fn duplicate_mask_pair_is_fatal() {
    let mut table = OpcodeTable::new();
    let _ = table.register_mask16(0x2000, 0xD800, stub16, "first").unwrap();
    let err = table
        .register_mask16(0x2000, 0xD800, stub16, "second")
        .unwrap_err();
    assert!(
        matches!(err, Fault::DuplicateMask { name: "second", .. }),
        "{err}"
    );
}

#[test]
fn same_ones_different_zeros_is_allowed() {
    let mut table = OpcodeTable::new();
    let _ = table.register_mask16(0x2000, 0xD800, stub16, "first").unwrap();
    let _ = table.register_mask16(0x2000, 0xD000, stub16, "second").unwrap();
    assert_eq!(table.len(), 2);
}

#[test]
fn wide_mask_must_constrain_the_top_halfword() {
    let mut table = OpcodeTable::new();
    let err = table
        .register_mask32(0x0000_F000, 0x0000_0F00, stub32, "bad")
        .unwrap_err();
    assert!(matches!(err, Fault::BadOpcode { name: "bad", .. }), "{err}");
}

// ══════════════════════════════════════════════════════════
// 2. Decode
// ══════════════════════════════════════════════════════════

#[test]
fn builtin_encodings_decode_to_their_opcodes() {
    let table = builtin();
    // MOVS r0, #42
    let movs = table.find(0x202A).unwrap();
    assert_eq!(table.name(movs), "MOVS imm8");
    // B .
    let b = table.find(0xE7FE).unwrap();
    assert_eq!(table.name(b), "B T2");
    // NOP
    assert_eq!(table.name(table.find(0xBF00).unwrap()), "NOP");
}

#[test]
fn bubble_is_registered_and_recognized() {
    let table = builtin();
    let op = table.find(u32::from(thumb::BUBBLE)).unwrap();
    assert!(table.is_bubble(op));
    assert_eq!(op, table.bubble());
}

#[test]
fn unknown_encoding_decodes_to_none() {
    let table = builtin();
    assert_eq!(table.find(0x0000), None);
}

#[test]
fn halfword_mask_never_matches_wide_encodings() {
    let table = builtin();
    // Same low halfword as MOVS, but arriving as a 32-bit encoding.
    assert_eq!(table.find(0xF000_202A), None);
}

#[test]
fn exception_submask_carves_an_encoding_out() {
    let mut table = OpcodeTable::new();
    // All of 0x4xxx except the 0x4800 sub-space.
    let _ = table
        .register_mask16_ex(0x4000, 0x8000, stub16, "wide", &[(0x4800, 0x8000)])
        .unwrap();
    let _ = table.register_mask16(0x4800, 0x8000, stub16, "carved").unwrap();
    assert_eq!(table.name(table.find(0x4001).unwrap()), "wide");
    assert_eq!(table.name(table.find(0x4801).unwrap()), "carved");
}
