//! State dumps: human-readable register and pipeline printouts, the LED
//! line, and binary RAM/ROM dump files.

use crate::common::Fault;
use crate::core::machine::Machine;
use crate::core::pipeline::STALL_PC;
use crate::soc::devices::leds;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

/// Prints the architectural registers on two lines.
pub fn print_reg_state(m: &Machine) {
    print!("[{:>8}] ", m.cycle());
    for r in 0..8 {
        print!("r{r}:{:08x} ", m.reg_read(r));
    }
    println!();
    print!("           ");
    for r in 8..13 {
        print!("r{r}:{:08x} ", m.reg_read(r));
    }
    println!(
        "sp:{:08x} lr:{:08x} pc:{:08x} apsr:{:08x}",
        m.reg_read(13),
        m.reg_read(14),
        m.reg_read(15),
        m.apsr_read()
    );
}

/// Prints the pipeline latches with the decoded opcode's name.
pub fn print_stages(m: &Machine) {
    let l = m.latches;
    println!(
        "  IF  next fetch {}",
        fmt_pc(m.log.get(l.pre_if_pc))
    );
    println!(
        "  ID  pc {} inst {:08x}",
        fmt_pc(m.log.get(l.if_id_pc)),
        m.log.get(l.if_id_inst)
    );
    let op = match m.log.get_ptr(l.id_ex_op) {
        Some(op) => m.opcodes.name(op),
        None => "<none>",
    };
    println!(
        "  EX  pc {} inst {:08x} op {op}",
        fmt_pc(m.log.get(l.id_ex_pc)),
        m.log.get(l.id_ex_inst)
    );
}

fn fmt_pc(pc: u32) -> String {
    if pc == STALL_PC {
        "--------".into()
    } else {
        format!("{pc:08x}")
    }
}

/// Prints the LED line: eight lamps per latch, lit from the low byte.
pub fn print_leds_line(m: &Machine) {
    println!(
        "[{:>8}] LEDs R:{} G:{} B:{}",
        m.cycle(),
        lamps(m.led(leds::RED)),
        lamps(m.led(leds::GREEN)),
        lamps(m.led(leds::BLUE))
    );
}

fn lamps(latch: u32) -> String {
    (0..8)
        .rev()
        .map(|bit| if latch & (1 << bit) != 0 { '*' } else { '.' })
        .collect()
}

/// Prints everything: registers, pipeline latches, and LEDs.
pub fn print_full_state(m: &Machine) {
    print_reg_state(m);
    print_stages(m);
    print_leds_line(m);
}

/// Writes RAM and ROM as little-endian binaries, returning the file paths.
///
/// Files land in `dir` when given, otherwise the system temp directory.
pub fn dump_memory(m: &Machine, dir: Option<&Path>) -> Result<(PathBuf, PathBuf), Fault> {
    let dir = dir.map_or_else(std::env::temp_dir, Path::to_path_buf);
    let ram_path = dir.join("armsim.ram");
    let rom_path = dir.join("armsim.rom");
    let ram = m.ram();
    let rom = m.rom();
    write_words(&ram_path, (ram.base()..ram.top()).step_by(4).map(|a| m.log.get(ram.cell_at(a))))?;
    write_words(&rom_path, (rom.base()..rom.top()).step_by(4).map(|a| m.log.get(rom.cell_at(a))))?;
    info!(ram = %ram_path.display(), rom = %rom_path.display(), "memory dumped");
    Ok((ram_path, rom_path))
}

fn write_words(path: &Path, words: impl Iterator<Item = u32>) -> Result<(), Fault> {
    let mut file = std::io::BufWriter::new(std::fs::File::create(path)?);
    for word in words {
        file.write_all(&word.to_le_bytes())?;
    }
    file.flush()?;
    Ok(())
}
