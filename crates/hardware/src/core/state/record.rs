//! Change records: one entry per tracked write.

use crate::common::Stage;
use crate::isa::OpId;

/// Index of a record in the state log arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RecordId(pub(crate) usize);

/// Handle to a tracked 32-bit word of simulated state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CellId(pub(crate) usize);

/// Handle to a tracked decoded-opcode slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PtrCellId(pub(crate) usize);

/// What a record writes: exactly one word cell or one opcode slot.
///
/// The variant carries both the committed value and the value captured from
/// live state when the record was created, which is what a backward seek
/// restores.
#[derive(Clone, Copy, Debug)]
pub enum CellTarget {
    /// A 32-bit word cell write.
    Word {
        /// The written cell.
        cell: CellId,
        /// The value this record commits.
        val: u32,
        /// Live value at record creation.
        prev: u32,
    },
    /// A decoded-opcode slot write.
    Ptr {
        /// The written slot.
        cell: PtrCellId,
        /// The opcode this record commits.
        val: Option<OpId>,
        /// Live opcode at record creation.
        prev: Option<OpId>,
    },
}

/// One tracked write.
///
/// Records form a doubly-linked sequence threaded through the arena in
/// non-decreasing cycle order. `voided` records were stalled out of their
/// cycle and are skipped by commit and replay; `dead` records have been
/// unlinked entirely and survive only as arena slack.
#[derive(Clone, Copy, Debug)]
pub struct ChangeRecord {
    /// Cycle the write belongs to.
    pub cycle: i64,
    /// Stage that issued the write.
    pub stage: Stage,
    /// The written location and values.
    pub target: CellTarget,
    /// Stalled out of its cycle; kept for inspection but never applied.
    pub voided: bool,
    /// Issued by an asynchronous peripheral; exempt from the aliasing
    /// re-check since such writes legally race the pipeline stages.
    pub via_async: bool,
    /// Unlinked from the sequence.
    pub(crate) dead: bool,
    /// Previous record in the sequence.
    pub(crate) prev: Option<RecordId>,
    /// Next record in the sequence.
    pub(crate) next: Option<RecordId>,
}
