//! Machine assembly and the end-of-cycle commit.
//!
//! [`Machine`] wires the state log, the memory map, the opcode table, the
//! pipeline latches, and the peripherals into one simulated SoC. It provides:
//! 1. **Construction:** Region registration and opcode registration from a
//!    [`Config`], with every fault surfaced before the first cycle.
//! 2. **Bus access:** Word/halfword/byte reads and word writes that route
//!    through the memory map and the state log.
//! 3. **Tock:** The end-of-cycle commit, including the pipeline-flush
//!    sub-phase that redirects fetch and voids the in-flight latches.

use crate::common::{Fault, Stage};
use crate::config::{Config, PipelineMode};
use crate::core::pipeline::{Latches, STALL_PC};
use crate::core::state::{flags, CellId, StateLog};
use crate::isa::thumb::{self, BUBBLE};
use crate::isa::OpcodeTable;
use crate::soc::devices::leds::LedBlock;
use crate::soc::devices::uart::PollUart;
use crate::soc::{MemMap, RamRegion, RomRegion};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

const REG_NAMES: [&str; 15] = [
    "r0", "r1", "r2", "r3", "r4", "r5", "r6", "r7", "r8", "r9", "r10", "r11", "r12", "sp", "lr",
];

/// The assembled machine.
pub struct Machine {
    /// The rewindable state history every write routes through.
    pub log: StateLog,
    pub(crate) memmap: MemMap,
    pub(crate) opcodes: OpcodeTable,
    pub(crate) latches: Latches,
    /// r0..r12, sp, lr. The PC is not a cell; reads of register 15 resolve
    /// to the execute-stage latch.
    pub(crate) regs: [CellId; 15],
    pub(crate) apsr: CellId,
    pub(crate) ipsr: CellId,
    pub(crate) epsr: CellId,
    pub(crate) rom: RomRegion,
    pub(crate) ram: RamRegion,
    pub(crate) leds: LedBlock,
    pub(crate) uart: PollUart,
    pub(crate) mode: PipelineMode,
    /// Branch target a PC write scheduled for the flush sub-phase.
    pub(crate) pending_flush: Option<u32>,
    /// Fault raised by a stage worker, collected by the driver at tock.
    pub(crate) fault: Option<Fault>,
    /// Raised by the execute stage when an instruction branches to itself.
    pub(crate) self_branch: bool,
    pub(crate) prev_exec_pc: Option<u32>,
}

impl std::fmt::Debug for Machine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Machine")
            .field("cycle", &self.log.cycle())
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

impl Machine {
    /// Builds a machine from a configuration: allocates all tracked cells,
    /// registers the memory regions and peripherals, and registers the
    /// builtin opcode set.
    pub fn new(config: &Config) -> Result<Self, Fault> {
        let mode = config.pipeline.mode;
        let mut log = StateLog::new(
            config.pipeline.stall_policy,
            mode == PipelineMode::Inline,
        );

        let mut regs = [CellId::default(); 15];
        for (i, name) in REG_NAMES.into_iter().enumerate() {
            regs[i] = log.alloc_cell(name, 0);
        }
        let apsr = log.alloc_cell("apsr", 0);
        let ipsr = log.alloc_cell("ipsr", 0);
        let epsr = log.alloc_cell("epsr", 0);

        let latches = Latches::new(&mut log);
        // The prefetch advance and a taken branch both write the fetch PC in
        // one cycle; that race is the pipeline working as intended.
        log.set_alias_exempt(latches.pre_if_pc);

        let mem = &config.memory;
        let rom = RomRegion::new(&mut log, "rom", mem.rom_base, mem.rom_size);
        let ram = RamRegion::new(&mut log, "ram", mem.ram_base, mem.ram_size);
        let leds = LedBlock::new(&mut log, mem.led_base);
        let uart = PollUart::new(&mut log, mem.uart_base);

        let mut memmap = MemMap::new();
        memmap.register_read_word(rom.base(), rom.top(), Box::new(rom))?;
        memmap.register_read_word(ram.base(), ram.top(), Box::new(ram))?;
        memmap.register_write_word(ram.base(), ram.top(), Box::new(ram))?;
        leds.register(&mut memmap)?;
        uart.register(&mut memmap)?;

        let mut opcodes = OpcodeTable::new();
        thumb::register_builtin(&mut opcodes)?;
        debug!(opcodes = opcodes.len(), "machine assembled");

        Ok(Self {
            log,
            memmap,
            opcodes,
            latches,
            regs,
            apsr,
            ipsr,
            epsr,
            rom,
            ram,
            leds,
            uart,
            mode,
            pending_flush: None,
            fault: None,
            self_branch: false,
            prev_exec_pc: None,
        })
    }

    // ── Accessors ──────────────────────────────────────────────────

    /// The current cycle number.
    pub fn cycle(&self) -> i64 {
        self.log.cycle()
    }

    /// The pipeline execution mode.
    pub fn mode(&self) -> PipelineMode {
        self.mode
    }

    /// The pipeline latch cells.
    pub fn latches(&self) -> Latches {
        self.latches
    }

    /// The flash ROM region.
    pub fn rom(&self) -> RomRegion {
        self.rom
    }

    /// The SRAM region.
    pub fn ram(&self) -> RamRegion {
        self.ram
    }

    /// Live value of one LED latch.
    pub fn led(&self, color: usize) -> u32 {
        self.leds.read(&self.log, color)
    }

    /// Whether the execute stage saw an instruction branch to itself.
    pub fn self_branch(&self) -> bool {
        self.self_branch
    }

    /// Takes the fault a stage worker left behind, if any.
    pub fn take_fault(&mut self) -> Option<Fault> {
        self.fault.take()
    }

    // ── Bus access ─────────────────────────────────────────────────

    /// Reads a word from the bus.
    pub fn read_word(&mut self, addr: u32) -> Result<u32, Fault> {
        self.memmap.read_word(&mut self.log, addr)
    }

    /// Reads a halfword from the bus.
    pub fn read_halfword(&mut self, addr: u32) -> Result<u16, Fault> {
        self.memmap.read_halfword(&mut self.log, addr)
    }

    /// Reads a byte from the bus.
    pub fn read_byte(&mut self, addr: u32) -> Result<u8, Fault> {
        self.memmap.read_byte(&mut self.log, addr)
    }

    /// Writes a word to the bus, attributed to `stage`.
    pub fn write_word(&mut self, stage: Stage, addr: u32, val: u32) -> Result<(), Fault> {
        self.memmap.write_word(&mut self.log, stage, addr, val)
    }

    // ── Reset ──────────────────────────────────────────────────────

    /// Applies the reset sequence: loads the initial stack pointer and entry
    /// point from the vector table at the bottom of ROM (or `start_pc`) and
    /// aims the fetch stage at the first instruction. The in-flight latches
    /// start as bubbles.
    pub fn reset(&mut self, start_pc: Option<u32>) -> Result<(), Fault> {
        let base = self.rom.base();
        let sp = self.read_word(base)?;
        let vector = self.read_word(base + 4)?;
        let entry = start_pc.unwrap_or(vector) & !1;
        debug!(sp = format_args!("{sp:#010x}"), entry = format_args!("{entry:#010x}"), "reset");
        self.log.write(Stage::Sim, self.regs[13], sp & !3);
        self.log.write(Stage::Sim, self.latches.pre_if_pc, entry);
        Ok(())
    }

    // ── Tock ───────────────────────────────────────────────────────

    /// Ends the cycle: commits every record written since `begin_cycle`,
    /// then runs the pipeline-flush sub-phase if a taken branch scheduled
    /// one.
    ///
    /// Asynchronous peripheral writes that arrive while the commit holds the
    /// machine lock apply immediately rather than queueing into the cycle
    /// being sealed.
    pub fn tock(&mut self) -> Result<(), Fault> {
        self.log.set_flag(flags::BLOCKING_ASYNC);
        let result = self.commit_with_flush();
        self.log.clear_flag(flags::BLOCKING_ASYNC);
        result
    }

    fn commit_with_flush(&mut self) -> Result<(), Fault> {
        self.log.commit_cycle()?;
        if !self.log.flag_set(flags::PIPELINE_FLUSH) {
            return Ok(());
        }
        // The facade recorded the branch target alongside the flag.
        let Some(target) = self.pending_flush.take() else {
            return Ok(());
        };
        self.log.set_flag(flags::PIPELINE_RUNNING);
        let anchor = self.log.head();
        self.flush_writes(target);
        let result = self.log.commit_after(anchor);
        self.log.clear_flag(flags::PIPELINE_RUNNING);
        result
    }

    /// Redirects fetch to `target` and voids the in-flight latches with
    /// bubbles.
    pub(crate) fn flush_writes(&mut self, target: u32) {
        debug!(target = format_args!("{target:#010x}"), "pipeline flush");
        let l = self.latches;
        let bubble = self.opcodes.bubble();
        self.log.write(Stage::Pipeline, l.pre_if_pc, target);
        self.log.write(Stage::Pipeline, l.if_id_pc, STALL_PC);
        self.log.write(Stage::Pipeline, l.if_id_inst, u32::from(BUBBLE));
        self.log.write(Stage::Pipeline, l.id_ex_pc, STALL_PC);
        self.log.write(Stage::Pipeline, l.id_ex_inst, u32::from(BUBBLE));
        self.log.write_ptr(Stage::Pipeline, l.id_ex_op, Some(bubble));
    }
}

/// A machine behind a mutex, shared with the stage workers, the UART bridge,
/// and the GDB stub.
#[derive(Clone)]
pub struct SharedMachine(Arc<Mutex<Machine>>);

impl SharedMachine {
    /// Wraps a machine for sharing.
    pub fn new(machine: Machine) -> Self {
        Self(Arc::new(Mutex::new(machine)))
    }

    /// Locks the machine. A worker that panicked while holding the lock has
    /// already surfaced its failure; the state itself is still consistent
    /// enough to dump, so poisoning is ignored.
    pub fn lock(&self) -> MutexGuard<'_, Machine> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for SharedMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SharedMachine")
    }
}
