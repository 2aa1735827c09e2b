//! The rewindable state history log.
//!
//! Every mutation of simulated state routes through here. The log provides:
//! 1. **Tracking:** Each write becomes a [`ChangeRecord`] in an arena-backed
//!    doubly-linked sequence ordered by cycle.
//! 2. **Commit:** At end-of-cycle ("tock") the cycle's records are applied
//!    atomically, stalled writes are voided, and an aliasing re-check verifies
//!    no two live writes fought over one word cell.
//! 3. **Time travel:** [`StateLog::seek`] replays committed values forward or
//!    captured previous values backward to land on any recorded cycle, and
//!    re-execution after a rewind discards the stale future.
//!
//! Cells are allocated up front (registers, latches, memory words, peripheral
//! state) and addressed by index; records reference cells by index too, so
//! the log owns no pointers and the arena can be truncated freely.

pub mod flags;
pub mod record;

pub use record::{CellId, CellTarget, ChangeRecord, PtrCellId, RecordId};

use crate::common::{Fault, SeekError, Stage};
use crate::config::StallPolicy;
use crate::isa::OpId;
use tracing::{debug, warn};

impl CellId {
    /// Handle to the `words`-th cell of a contiguous allocation starting at
    /// `self`. Only meaningful within a run returned by
    /// [`StateLog::alloc_cells`].
    #[inline]
    pub fn offset(self, words: usize) -> CellId {
        CellId(self.0 + words)
    }
}

/// The state history log.
pub struct StateLog {
    records: Vec<ChangeRecord>,
    /// Oldest record still linked.
    first: Option<RecordId>,
    /// Newest record at or before the current point in time.
    head: Option<RecordId>,
    /// Value of `head` when the current cycle began.
    cycle_anchor: Option<RecordId>,
    cycle: i64,
    /// One flag word per cycle, indexed by cycle number.
    flags: Vec<u32>,
    cells: Vec<u32>,
    cell_names: Vec<&'static str>,
    ptr_cells: Vec<Option<OpId>>,
    ptr_cell_names: Vec<&'static str>,
    stall_policy: StallPolicy,
    /// Inline pipeline mode: writes apply as they are issued.
    inline_apply: bool,
    /// Cell allowed to take two live writes per cycle (the inline-mode fetch
    /// PC, which branches legally overwrite in the same cycle).
    alias_exempt: Option<CellId>,
}

impl std::fmt::Debug for StateLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateLog")
            .field("cycle", &self.cycle)
            .field("records", &self.records.len())
            .field("cells", &self.cells.len())
            .finish_non_exhaustive()
    }
}

impl StateLog {
    /// Creates an empty log.
    pub fn new(stall_policy: StallPolicy, inline_apply: bool) -> Self {
        Self {
            records: Vec::new(),
            first: None,
            head: None,
            cycle_anchor: None,
            cycle: -1,
            flags: Vec::new(),
            cells: Vec::new(),
            cell_names: Vec::new(),
            ptr_cells: Vec::new(),
            ptr_cell_names: Vec::new(),
            stall_policy,
            inline_apply,
            alias_exempt: None,
        }
    }

    /// Exempts one word cell from the aliasing re-check.
    pub fn set_alias_exempt(&mut self, cell: CellId) {
        self.alias_exempt = Some(cell);
    }

    // ── Cell allocation ────────────────────────────────────────────

    /// Allocates one tracked word cell.
    pub fn alloc_cell(&mut self, name: &'static str, init: u32) -> CellId {
        self.cells.push(init);
        self.cell_names.push(name);
        CellId(self.cells.len() - 1)
    }

    /// Allocates `count` contiguous word cells and returns the first.
    pub fn alloc_cells(&mut self, name: &'static str, count: usize, init: u32) -> CellId {
        let first = CellId(self.cells.len());
        for _ in 0..count {
            self.cells.push(init);
            self.cell_names.push(name);
        }
        first
    }

    /// Allocates one tracked decoded-opcode slot.
    pub fn alloc_ptr_cell(&mut self, name: &'static str) -> PtrCellId {
        self.ptr_cells.push(None);
        self.ptr_cell_names.push(name);
        PtrCellId(self.ptr_cells.len() - 1)
    }

    // ── Live state access ──────────────────────────────────────────

    /// Reads a word cell's live value.
    #[inline]
    pub fn get(&self, cell: CellId) -> u32 {
        self.cells[cell.0]
    }

    /// Reads an opcode slot's live value.
    #[inline]
    pub fn get_ptr(&self, cell: PtrCellId) -> Option<OpId> {
        self.ptr_cells[cell.0]
    }

    /// The name a word cell was allocated under.
    pub fn cell_name(&self, cell: CellId) -> &'static str {
        self.cell_names[cell.0]
    }

    /// Writes a word cell directly, without a record.
    ///
    /// For initialization only (flash loading, latch seeding before cycle 0).
    pub fn poke(&mut self, cell: CellId, val: u32) {
        self.cells[cell.0] = val;
    }

    /// Writes an opcode slot directly, without a record.
    pub fn poke_ptr(&mut self, cell: PtrCellId, val: Option<OpId>) {
        self.ptr_cells[cell.0] = val;
    }

    // ── Cycle flags ────────────────────────────────────────────────

    /// The current cycle number. `-1` before the first cycle begins.
    #[inline]
    pub fn cycle(&self) -> i64 {
        self.cycle
    }

    /// The current cycle's flag word.
    pub fn current_flags(&self) -> u32 {
        self.flags_for(self.cycle)
    }

    fn flags_for(&self, cycle: i64) -> u32 {
        usize::try_from(cycle)
            .ok()
            .and_then(|c| self.flags.get(c).copied())
            .unwrap_or(0)
    }

    /// Sets bits in the current cycle's flag word.
    pub fn set_flag(&mut self, bits: u32) {
        if let Some(f) = usize::try_from(self.cycle)
            .ok()
            .and_then(|c| self.flags.get_mut(c))
        {
            *f |= bits;
        }
    }

    /// Clears bits in the current cycle's flag word.
    pub fn clear_flag(&mut self, bits: u32) {
        if let Some(f) = usize::try_from(self.cycle)
            .ok()
            .and_then(|c| self.flags.get_mut(c))
        {
            *f &= !bits;
        }
    }

    /// Whether any of `bits` is set in the current cycle's flag word.
    #[inline]
    pub fn flag_set(&self, bits: u32) -> bool {
        self.current_flags() & bits != 0
    }

    /// Marks the current cycle as containing externally visible I/O.
    ///
    /// Backward seeks refuse to cross such a cycle: the bytes are already on
    /// the wire and cannot be unsent.
    pub fn mark_io_barrier(&mut self) {
        self.set_flag(flags::IO_BARRIER);
    }

    /// Enters debugger direct-write mode: writes mutate live state without
    /// records until [`StateLog::exit_debugging`].
    pub fn enter_debugging(&mut self) {
        self.set_flag(flags::DEBUGGING);
    }

    /// Leaves debugger direct-write mode.
    pub fn exit_debugging(&mut self) {
        self.clear_flag(flags::DEBUGGING);
    }

    /// Stalls a stage for the current cycle.
    ///
    /// Only the front of the pipeline may stall; see [`Stage::stallable`].
    pub fn stall(&mut self, stage: Stage) -> Result<(), Fault> {
        if !stage.stallable() {
            return Err(Fault::IllegalStall { stage });
        }
        self.set_flag(stage.bit());
        Ok(())
    }

    // ── Writes ─────────────────────────────────────────────────────

    /// Records a write to a word cell.
    ///
    /// In debugger mode the live value is mutated directly with no record.
    /// Otherwise a record captures the live value and the write is deferred
    /// to commit, unless the inline pipeline mode, an async I/O block, or the
    /// flush sub-phase is active, in which case it also applies immediately.
    pub fn write(&mut self, stage: Stage, cell: CellId, val: u32) {
        if self.flag_set(flags::DEBUGGING) {
            self.cells[cell.0] = val;
            return;
        }
        // Writes issued while their stage is already stalled carry no
        // information; under the lean policy they are not even recorded.
        if self.stall_policy == StallPolicy::Drop
            && self.current_flags() & stage.bit() & flags::STALL_MASK != 0
        {
            return;
        }
        let prev = self.cells[cell.0];
        self.push(stage, CellTarget::Word { cell, val, prev }, false);
        if self.apply_immediately() {
            self.cells[cell.0] = val;
        }
    }

    /// Records a write to a decoded-opcode slot.
    pub fn write_ptr(&mut self, stage: Stage, cell: PtrCellId, val: Option<OpId>) {
        if self.flag_set(flags::DEBUGGING) {
            self.ptr_cells[cell.0] = val;
            return;
        }
        if self.stall_policy == StallPolicy::Drop
            && self.current_flags() & stage.bit() & flags::STALL_MASK != 0
        {
            return;
        }
        let prev = self.ptr_cells[cell.0];
        self.push(stage, CellTarget::Ptr { cell, val, prev }, false);
        if self.apply_immediately() {
            self.ptr_cells[cell.0] = val;
        }
    }

    /// Records a write from an asynchronous peripheral.
    ///
    /// Applies immediately and is exempt from the aliasing re-check, since
    /// peripheral writes legally race the pipeline stages.
    pub fn write_async(&mut self, stage: Stage, cell: CellId, val: u32) {
        let prev = self.cells[cell.0];
        self.push(stage, CellTarget::Word { cell, val, prev }, true);
        self.cells[cell.0] = val;
    }

    fn apply_immediately(&self) -> bool {
        self.inline_apply || self.flag_set(flags::BLOCKING_ASYNC | flags::PIPELINE_RUNNING)
    }

    fn push(&mut self, stage: Stage, target: CellTarget, via_async: bool) {
        // Writes before the first cycle are initialization; apply directly.
        if self.flags.is_empty() {
            self.apply_target(target);
            return;
        }
        let id = RecordId(self.records.len());
        self.records.push(ChangeRecord {
            cycle: self.cycle,
            stage,
            target,
            voided: false,
            via_async,
            dead: false,
            prev: self.head,
            next: None,
        });
        if let Some(h) = self.head {
            self.records[h.0].next = Some(id);
        } else {
            self.first = Some(id);
        }
        self.head = Some(id);
    }

    // ── Commit ─────────────────────────────────────────────────────

    /// Begins a new cycle: advances the counter, anchors the commit walk, and
    /// allocates a fresh flag word.
    ///
    /// When the head still has successors the simulator is re-executing after
    /// a rewind; the entire stale future is discarded first.
    pub fn begin_cycle(&mut self) {
        self.cycle += 1;
        let has_future = match self.head {
            Some(h) => self.records[h.0].next.is_some(),
            None => !self.records.is_empty(),
        };
        if has_future {
            warn!(cycle = self.cycle, "re-executing; discarding all future state");
            match self.head {
                Some(h) => {
                    self.records.truncate(h.0 + 1);
                    self.records[h.0].next = None;
                }
                None => {
                    self.records.clear();
                    self.first = None;
                }
            }
        }
        self.cycle_anchor = self.head;
        let c = usize::try_from(self.cycle).unwrap_or(0);
        self.flags.truncate(c);
        self.flags.push(0);
    }

    /// The record the next commit span starts after. Used to anchor the
    /// flush sub-phase at the current head.
    pub fn head(&self) -> Option<RecordId> {
        self.head
    }

    /// Commits the current cycle's records.
    pub fn commit_cycle(&mut self) -> Result<(), Fault> {
        let start = self.span_start(self.cycle_anchor);
        if start.is_none() {
            warn!(cycle = self.cycle, "nothing written this cycle");
        }
        self.commit_span(start)
    }

    /// Commits the records appended after `anchor`. Used by the pipeline
    /// flush sub-phase to walk only its own writes.
    pub fn commit_after(&mut self, anchor: Option<RecordId>) -> Result<(), Fault> {
        let start = self.span_start(anchor);
        self.commit_span(start)
    }

    fn span_start(&self, anchor: Option<RecordId>) -> Option<RecordId> {
        match anchor {
            Some(a) => self.records[a.0].next,
            None => self.first,
        }
    }

    fn commit_span(&mut self, start: Option<RecordId>) -> Result<(), Fault> {
        // Pass 1: apply, voiding writes whose stage stalled this cycle.
        let mut cur = start;
        while let Some(id) = cur {
            let r = self.records[id.0];
            cur = r.next;
            let stalled =
                !r.via_async && self.flags_for(r.cycle) & r.stage.bit() & flags::STALL_MASK != 0;
            if stalled {
                match self.stall_policy {
                    StallPolicy::Keep => self.records[id.0].voided = true,
                    StallPolicy::Drop => self.unlink(id),
                }
            } else {
                self.apply_target(r.target);
            }
        }

        // Pass 2: every live word record must find exactly its own value in
        // the cell, or two writes aliased within the cycle.
        let mut cur = start;
        while let Some(id) = cur {
            let r = self.records[id.0];
            cur = r.next;
            if r.dead || r.voided || r.via_async {
                continue;
            }
            if let CellTarget::Word { cell, val, .. } = r.target {
                if Some(cell) == self.alias_exempt {
                    continue;
                }
                let found = self.cells[cell.0];
                if found != val {
                    return Err(Fault::Aliasing {
                        cell: self.cell_names[cell.0],
                        expected: val,
                        found,
                    });
                }
            }
        }
        Ok(())
    }

    fn apply_target(&mut self, target: CellTarget) {
        match target {
            CellTarget::Word { cell, val, .. } => self.cells[cell.0] = val,
            CellTarget::Ptr { cell, val, .. } => self.ptr_cells[cell.0] = val,
        }
    }

    fn unlink(&mut self, id: RecordId) {
        let (prev, next) = {
            let r = &mut self.records[id.0];
            r.dead = true;
            (r.prev, r.next)
        };
        match prev {
            Some(p) => self.records[p.0].next = next,
            None => self.first = next,
        }
        if let Some(n) = next {
            self.records[n.0].prev = prev;
        }
        if self.head == Some(id) {
            self.head = prev;
        }
    }

    // ── Time travel ────────────────────────────────────────────────

    /// Seeks to `target` cycle by replaying recorded values.
    ///
    /// Forward seeks re-apply committed values from retained future state;
    /// backward seeks restore each record's captured previous value. A
    /// refused seek leaves simulated state untouched.
    pub fn seek(&mut self, target: i64) -> Result<(), SeekError> {
        if target == self.cycle {
            return Err(SeekError::AtTarget { cycle: self.cycle });
        }
        if target > self.cycle {
            self.seek_forward(target)
        } else {
            self.seek_backward(target)
        }
    }

    fn seek_forward(&mut self, target: i64) -> Result<(), SeekError> {
        debug!(from = self.cycle, to = target, "seeking forward");
        while self.cycle < target {
            let next = self.span_start(self.head);
            let Some(id) = next else {
                warn!(
                    target,
                    known = self.cycle,
                    "seek past known state; simulator left at last known cycle"
                );
                return Err(SeekError::PastHistory { known: self.cycle });
            };
            let r = self.records[id.0];
            if !r.voided {
                self.apply_target(r.target);
            }
            self.head = Some(id);
            let last_of_cycle = match r.next {
                None => true,
                Some(n) => self.records[n.0].cycle > r.cycle,
            };
            if last_of_cycle {
                self.cycle = r.cycle;
            }
        }
        Ok(())
    }

    fn seek_backward(&mut self, target: i64) -> Result<(), SeekError> {
        if target < 0 {
            return Err(SeekError::PastHistory { known: 0 });
        }
        // Scan before undoing anything: a refused rewind must not move.
        for c in (target + 1)..=self.cycle {
            if self.flags_for(c) & flags::IO_BARRIER != 0 {
                warn!(cycle = c, "cannot rewind past I/O access");
                return Err(SeekError::IoBarrier { cycle: c });
            }
        }
        debug!(from = self.cycle, to = target, "seeking backward");
        while let Some(id) = self.head {
            let r = self.records[id.0];
            if r.cycle <= target {
                break;
            }
            if !r.voided {
                match r.target {
                    CellTarget::Word { cell, prev, .. } => self.cells[cell.0] = prev,
                    CellTarget::Ptr { cell, prev, .. } => self.ptr_cells[cell.0] = prev,
                }
            }
            self.head = r.prev;
        }
        self.cycle = match self.head {
            Some(h) => self.records[h.0].cycle,
            None => -1,
        };
        Ok(())
    }

    // ── Inspection ─────────────────────────────────────────────────

    /// All arena records, including voided and unlinked ones.
    pub fn records(&self) -> &[ChangeRecord] {
        &self.records
    }
}
