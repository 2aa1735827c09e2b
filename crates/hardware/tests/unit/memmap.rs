//! Memory-map registration and dispatch tests.
//!
//! Verifies range registration checks, the read-only/write-only fault split,
//! alignment faults, and sub-word reads.

use armsim_core::common::Fault;
use armsim_core::config::StallPolicy;
use armsim_core::core::state::StateLog;
use armsim_core::soc::{MemMap, RamRegion, RomRegion};
use pretty_assertions::assert_eq;

const RAM_BASE: u32 = 0x2000_0000;

/// A map with 4 KiB of RAM (read+write) and 4 KiB of ROM (read-only) at 0.
fn small_system() -> (StateLog, MemMap, RamRegion, RomRegion) {
    let mut log = StateLog::new(StallPolicy::Drop, false);
    let rom = RomRegion::new(&mut log, "rom", 0, 0x1000);
    let ram = RamRegion::new(&mut log, "ram", RAM_BASE, 0x1000);
    let mut map = MemMap::new();
    map.register_read_word(rom.base(), rom.top(), Box::new(rom)).unwrap();
    map.register_read_word(ram.base(), ram.top(), Box::new(ram)).unwrap();
    map.register_write_word(ram.base(), ram.top(), Box::new(ram)).unwrap();
    (log, map, ram, rom)
}

// ══════════════════════════════════════════════════════════
// 1. Registration
// ══════════════════════════════════════════════════════════

#[test]
fn overlapping_read_ranges_are_rejected() {
    let (mut log, mut map, _, _) = small_system();
    let extra = RamRegion::new(&mut log, "extra", RAM_BASE + 0x800, 0x1000);
    let err = map
        .register_read_word(extra.base(), extra.top(), Box::new(extra))
        .unwrap_err();
    assert!(matches!(err, Fault::Unpredictable { .. }), "{err}");
}

#[test]
fn read_and_write_ranges_overlap_freely_across_kinds() {
    // RAM registers the same span for both kinds; that must not collide.
    let (_, map, _, _) = small_system();
    drop(map);
}

#[test]
fn empty_range_is_rejected() {
    let (mut log, mut map, _, _) = small_system();
    let extra = RamRegion::new(&mut log, "extra", 0x5000_0000, 0x1000);
    let err = map
        .register_read_word(0x5000_0000, 0x5000_0000, Box::new(extra))
        .unwrap_err();
    assert!(matches!(err, Fault::Unpredictable { .. }), "{err}");
}

// ══════════════════════════════════════════════════════════
// 2. Dispatch and faults
// ══════════════════════════════════════════════════════════

#[test]
fn ram_write_then_read_round_trips() {
    let (mut log, map, _, _) = small_system();
    map.write_word(&mut log, armsim_core::common::Stage::Execute, RAM_BASE + 8, 0xDEAD_BEEF)
        .unwrap();
    assert_eq!(map.read_word(&mut log, RAM_BASE + 8).unwrap(), 0xDEAD_BEEF);
}

#[test]
fn rom_write_is_read_only_fault() {
    let (mut log, map, _, _) = small_system();
    let err = map
        .write_word(&mut log, armsim_core::common::Stage::Execute, 0x10, 1)
        .unwrap_err();
    assert!(matches!(err, Fault::ReadOnly { addr: 0x10 }), "{err}");
}

#[test]
fn write_only_range_read_faults() {
    let (mut log, mut map, ram, _) = small_system();
    // A span registered with only a write handler.
    map.register_write_word(0x4000_0000, 0x4000_0004, Box::new(ram))
        .unwrap();
    let err = map.read_word(&mut log, 0x4000_0000).unwrap_err();
    assert!(matches!(err, Fault::WriteOnly { addr: 0x4000_0000 }), "{err}");
}

#[test]
fn unmapped_address_faults() {
    let (mut log, map, _, _) = small_system();
    let err = map.read_word(&mut log, 0x9000_0000).unwrap_err();
    assert!(matches!(err, Fault::InvalidAddr { addr: 0x9000_0000, write: false }));
    let err = map
        .write_word(&mut log, armsim_core::common::Stage::Execute, 0x9000_0000, 0)
        .unwrap_err();
    assert!(matches!(err, Fault::InvalidAddr { addr: 0x9000_0000, write: true }));
}

#[test]
fn misaligned_word_access_faults() {
    let (mut log, map, _, _) = small_system();
    let err = map.read_word(&mut log, RAM_BASE + 2).unwrap_err();
    assert!(matches!(err, Fault::InvalidAddr { write: false, .. }));
}

// ══════════════════════════════════════════════════════════
// 3. Sub-word reads
// ══════════════════════════════════════════════════════════

#[test]
fn byte_and_halfword_reads_extract_little_endian() {
    let (mut log, map, ram, _) = small_system();
    log.poke(ram.cell_at(RAM_BASE), 0x4433_2211);
    assert_eq!(map.read_byte(&mut log, RAM_BASE).unwrap(), 0x11);
    assert_eq!(map.read_byte(&mut log, RAM_BASE + 3).unwrap(), 0x44);
    assert_eq!(map.read_halfword(&mut log, RAM_BASE).unwrap(), 0x2211);
    assert_eq!(map.read_halfword(&mut log, RAM_BASE + 2).unwrap(), 0x4433);
}

#[test]
fn misaligned_halfword_read_faults() {
    let (mut log, map, _, _) = small_system();
    let err = map.read_halfword(&mut log, RAM_BASE + 1).unwrap_err();
    assert!(matches!(err, Fault::InvalidAddr { write: false, .. }));
}
