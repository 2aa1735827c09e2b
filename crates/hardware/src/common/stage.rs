//! Pipeline stage identifiers.
//!
//! Every tracked write is attributed to the stage that issued it. The
//! discriminant values live in the low byte of the per-cycle flag word, so a
//! stage's bit doubles as its stall flag.

/// The hardware stage (or software agent) responsible for a tracked write.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum Stage {
    /// Pre-fetch: the next-PC selection logic.
    PreFetch = 0x01,
    /// Instruction fetch.
    Fetch = 0x02,
    /// Instruction decode.
    Decode = 0x04,
    /// Instruction execute.
    Execute = 0x08,
    /// Pipeline control (flush and bubble injection).
    Pipeline = 0x10,
    /// The simulation driver itself (reset, loaders).
    Sim = 0x20,
    /// Attribution unknown; peripherals writing asynchronously.
    Unknown = 0x40,
}

impl Stage {
    /// The stage's bit in the per-cycle flag word.
    #[inline]
    pub fn bit(self) -> u32 {
        self as u32
    }

    /// Stages that may legally be stalled.
    ///
    /// Only the front of the pipeline can hold: stalling execute or later
    /// would tear an instruction in half.
    pub fn stallable(self) -> bool {
        matches!(self, Stage::PreFetch | Stage::Fetch | Stage::Decode)
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::PreFetch => "PRE",
            Stage::Fetch => "IF",
            Stage::Decode => "ID",
            Stage::Execute => "EX",
            Stage::Pipeline => "PIPE",
            Stage::Sim => "SIM",
            Stage::Unknown => "UNK",
        };
        write!(f, "{name}")
    }
}
