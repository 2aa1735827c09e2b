//! Per-cycle flag word bits.
//!
//! Every cycle carries one `u32` of flags. The low byte aligns with
//! [`Stage`](crate::common::Stage) bit values, so a stage's bit set in the
//! flag word means that stage is stalled this cycle.

/// Mask covering all per-stage stall bits.
pub const STALL_MASK: u32 = 0xFF;

/// Externally visible I/O happened this cycle; rewinding across it is refused.
pub const IO_BARRIER: u32 = 0x100;

/// A branch resolved against the speculative fetch; the commit phase must run
/// the flush sub-phase for this cycle.
pub const PIPELINE_FLUSH: u32 = 0x1000;

/// Marks the flush sub-phase of commit; writes issued under it apply
/// immediately and land in the same cycle as the records they correct.
pub const PIPELINE_RUNNING: u32 = 0x8000;

/// An LED latch was written this cycle.
pub const LED_WRITTEN: u32 = 0x1_0000;

/// Asynchronous I/O holds the state lock; writes apply immediately.
pub const BLOCKING_ASYNC: u32 = 0x80_0000;

/// A debugger is mutating state directly; writes bypass the log.
pub const DEBUGGING: u32 = 0x100_0000;
