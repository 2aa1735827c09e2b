//! End-to-end driver tests.
//!
//! Runs the built-in test image to its final branch in both execution modes
//! and checks termination, exit status, and the memory dump files.

use armsim_core::common::Fault;
use armsim_core::config::{Config, PipelineMode};
use armsim_core::sim::Driver;
use pretty_assertions::assert_eq;
use rstest::rstest;

fn quiet_config(mode: PipelineMode, dump_dir: &std::path::Path) -> Config {
    let mut config = Config::default();
    config.pipeline.mode = mode;
    config.general.use_test_flash = true;
    config.general.return_r0 = true;
    config.general.dump_dir = Some(dump_dir.to_path_buf());
    config
}

#[rstest]
#[case::inline(PipelineMode::Inline)]
#[case::threaded(PipelineMode::Threaded)]
fn test_image_runs_to_its_final_branch(#[case] mode: PipelineMode) {
    let dir = tempfile::tempdir().unwrap();
    let mut driver = Driver::new(quiet_config(mode, dir.path())).unwrap();
    let status = driver.run().unwrap();
    assert_eq!(status, 42);
}

#[test]
fn memory_dumps_cover_both_regions() {
    let dir = tempfile::tempdir().unwrap();
    let mut driver = Driver::new(quiet_config(PipelineMode::Inline, dir.path())).unwrap();
    assert_eq!(driver.run().unwrap(), 42);
    let ram = std::fs::metadata(dir.path().join("armsim.ram")).unwrap();
    let rom = std::fs::metadata(dir.path().join("armsim.rom")).unwrap();
    assert_eq!(ram.len(), 0x1_0000);
    assert_eq!(rom.len(), 0x1_0000);
    // The test image's first word is at the bottom of the ROM dump.
    let rom_bytes = std::fs::read(dir.path().join("armsim.rom")).unwrap();
    assert_eq!(&rom_bytes[..4], &0x2000_FFFCu32.to_le_bytes());
}

#[test]
fn inline_mode_terminates_when_fetch_stops_moving() {
    let dir = tempfile::tempdir().unwrap();
    let mut driver = Driver::new(quiet_config(PipelineMode::Inline, dir.path())).unwrap();
    assert_eq!(driver.run().unwrap(), 42);
    // MOVS at cycle 1, the branch lands fetch on itself at cycle 2.
    assert_eq!(driver.machine().lock().cycle(), 2);
}

#[test]
fn a_flash_file_loads_and_runs() {
    let dir = tempfile::tempdir().unwrap();
    // Vector table plus a branch-to-self at the entry point.
    let words: [u32; 3] = [0x2000_FFFC, 0x0000_0009, 0xE7FE_E7FE];
    let image: Vec<u8> = words.iter().flat_map(|w| w.to_le_bytes()).collect();
    let path = dir.path().join("image.bin");
    std::fs::write(&path, &image).unwrap();

    let mut config = quiet_config(PipelineMode::Inline, dir.path());
    config.general.use_test_flash = false;
    config.general.flash_image = Some(path);
    let mut driver = Driver::new(config).unwrap();
    assert_eq!(driver.run().unwrap(), 0);
    assert_eq!(driver.machine().lock().cycle(), 1);
}

#[test]
fn a_cycle_limit_stops_a_runaway_program() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = quiet_config(PipelineMode::Threaded, dir.path());
    // The threaded pipeline needs several cycles to reach the final branch;
    // cut it off before it gets there.
    config.general.limit_cycles = Some(3);
    let mut driver = Driver::new(config).unwrap();
    let err = driver.run().unwrap_err();
    assert!(matches!(err, Fault::CycleLimit { limit: 3 }), "{err}");
}

#[test]
fn missing_flash_is_refused_up_front() {
    let mut config = Config::default();
    config.general.flash_image = Some("/nonexistent/image.bin".into());
    assert!(matches!(Driver::new(config.clone()).unwrap_err(), Fault::BadFlash { .. }));
    config.general.flash_image = None;
    assert!(matches!(Driver::new(config).unwrap_err(), Fault::BadFlash { .. }));
}

#[test]
fn an_undersized_image_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tiny.bin");
    std::fs::write(&path, [0u8; 4]).unwrap();
    let mut config = Config::default();
    config.general.flash_image = Some(path);
    let err = Driver::new(config).unwrap_err();
    assert!(matches!(err, Fault::BadFlash { .. }), "{err}");
}
