//! Opcode registration and decode.
//!
//! Instructions are recognized by mask pairs: `ones` bits that must be set
//! and `zeros` bits that must be clear, optionally minus exception submask
//! pairs that carve encodings back out of a wider pattern. It provides:
//! 1. **Registration:** 16/32-bit mask registration with a fatal check for
//!    exact duplicate mask pairs.
//! 2. **Decode:** Linear mask match returning a handle into the table.
//! 3. **Bubble:** The pseudo-op the flush path injects into emptied latches.

pub mod thumb;

use crate::common::Fault;
use crate::core::machine::Machine;

/// Handle to a registered opcode.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OpId(usize);

/// An opcode's execute handler.
#[derive(Clone, Copy)]
pub enum OpHandler {
    /// Handler for a 16-bit encoding.
    Thumb16(fn(&mut Machine, u16) -> Result<(), Fault>),
    /// Handler for a 32-bit encoding (first halfword in the high half).
    Thumb32(fn(&mut Machine, u32) -> Result<(), Fault>),
}

impl std::fmt::Debug for OpHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OpHandler::Thumb16(_) => f.write_str("Thumb16"),
            OpHandler::Thumb32(_) => f.write_str("Thumb32"),
        }
    }
}

/// One registered opcode: masks, exceptions, and the handler.
#[derive(Debug)]
pub struct Opcode {
    /// Name for diagnostics and history labels.
    pub name: &'static str,
    /// Bits that must be set.
    pub ones: u32,
    /// Bits that must be clear.
    pub zeros: u32,
    /// Whether this is a 16-bit encoding.
    pub is16: bool,
    /// Submask pairs whose match excludes this opcode.
    pub exceptions: Vec<(u32, u32)>,
    /// The execute handler.
    pub handler: OpHandler,
}

/// The opcode table.
///
/// Registration happens once at machine construction; decode is a linear
/// scan in registration order.
#[derive(Debug)]
pub struct OpcodeTable {
    ops: Vec<Opcode>,
    bubble: Option<OpId>,
}

impl OpcodeTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self {
            ops: Vec::new(),
            bubble: None,
        }
    }

    /// Registers a 16-bit opcode mask.
    pub fn register_mask16(
        &mut self,
        ones: u16,
        zeros: u16,
        handler: fn(&mut Machine, u16) -> Result<(), Fault>,
        name: &'static str,
    ) -> Result<OpId, Fault> {
        self.register_mask16_ex(ones, zeros, handler, name, &[])
    }

    /// Registers a 16-bit opcode mask with exception submasks.
    pub fn register_mask16_ex(
        &mut self,
        ones: u16,
        zeros: u16,
        handler: fn(&mut Machine, u16) -> Result<(), Fault>,
        name: &'static str,
        exceptions: &[(u16, u16)],
    ) -> Result<OpId, Fault> {
        // A halfword encoding requires the top half absent.
        let zeros = 0xFFFF_0000 | u32::from(zeros);
        self.insert(Opcode {
            name,
            ones: u32::from(ones),
            zeros,
            is16: true,
            exceptions: exceptions
                .iter()
                .map(|&(o, z)| (u32::from(o), u32::from(z)))
                .collect(),
            handler: OpHandler::Thumb16(handler),
        })
    }

    /// Registers a 32-bit opcode mask.
    pub fn register_mask32(
        &mut self,
        ones: u32,
        zeros: u32,
        handler: fn(&mut Machine, u32) -> Result<(), Fault>,
        name: &'static str,
    ) -> Result<OpId, Fault> {
        self.register_mask32_ex(ones, zeros, handler, name, &[])
    }

    /// Registers a 32-bit opcode mask with exception submasks.
    pub fn register_mask32_ex(
        &mut self,
        ones: u32,
        zeros: u32,
        handler: fn(&mut Machine, u32) -> Result<(), Fault>,
        name: &'static str,
        exceptions: &[(u32, u32)],
    ) -> Result<OpId, Fault> {
        if zeros & 0xFFFF_0000 == 0 {
            return Err(Fault::BadOpcode {
                name,
                reason: "32-bit mask requires none of the top halfword; register as 16-bit",
            });
        }
        self.insert(Opcode {
            name,
            ones,
            zeros,
            is16: false,
            exceptions: exceptions.to_vec(),
            handler: OpHandler::Thumb32(handler),
        })
    }

    fn insert(&mut self, op: Opcode) -> Result<OpId, Fault> {
        if let Some(existing) = self
            .ops
            .iter()
            .find(|o| o.ones == op.ones && o.zeros == op.zeros)
        {
            tracing::error!(
                existing = existing.name,
                attempted = op.name,
                "duplicate opcode mask"
            );
            return Err(Fault::DuplicateMask {
                name: op.name,
                ones: op.ones,
                zeros: op.zeros,
            });
        }
        self.ops.push(op);
        Ok(OpId(self.ops.len() - 1))
    }

    /// Decodes an encoding to a registered opcode.
    ///
    /// 16-bit encodings arrive with a zero top halfword; 32-bit encodings
    /// carry their first halfword in the high half.
    pub fn find(&self, inst: u32) -> Option<OpId> {
        let is16 = inst >> 16 == 0;
        'op: for (idx, op) in self.ops.iter().enumerate() {
            if op.is16 != is16 {
                continue;
            }
            if inst & op.ones != op.ones || !inst & op.zeros != op.zeros {
                continue;
            }
            for &(eo, ez) in &op.exceptions {
                if inst & eo == eo && !inst & ez == ez {
                    continue 'op;
                }
            }
            return Some(OpId(idx));
        }
        None
    }

    /// The opcode's handler, copied out so dispatch can reborrow the machine.
    pub fn handler(&self, id: OpId) -> OpHandler {
        self.ops[id.0].handler
    }

    /// The opcode's name.
    pub fn name(&self, id: OpId) -> &'static str {
        self.ops[id.0].name
    }

    /// Number of registered opcodes.
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// The pipeline-bubble pseudo-op.
    ///
    /// # Panics
    ///
    /// Panics if the builtin set was never registered; the machine
    /// constructor always registers it.
    pub fn bubble(&self) -> OpId {
        match self.bubble {
            Some(id) => id,
            None => unreachable!("bubble op registered at construction"),
        }
    }

    /// Whether `id` is the pipeline bubble.
    pub fn is_bubble(&self, id: OpId) -> bool {
        self.bubble == Some(id)
    }

    pub(crate) fn set_bubble(&mut self, id: OpId) {
        self.bubble = Some(id);
    }
}

impl Default for OpcodeTable {
    fn default() -> Self {
        Self::new()
    }
}
