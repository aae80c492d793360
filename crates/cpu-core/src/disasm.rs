//! Instruction disassembly rows shared by every family.

use std::fmt;

use crate::CpuCore;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A single disassembled instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DisassemblyRow {
    /// Address of the first byte.
    pub address: u32,
    /// Instruction bytes in fetch order.
    pub bytes: Vec<u8>,
    /// Mnemonic, e.g. `ADD` or `XMI`.
    pub mnemonic: String,
    /// Formatted operands, empty when there are none.
    pub operands: String,
    /// Whether the opcode has no defined behavior.
    pub is_illegal: bool,
}

impl DisassemblyRow {
    /// Length of the instruction in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Returns `true` for a row that consumed no bytes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl fmt::Display for DisassemblyRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04X}: ", self.address)?;
        for byte in &self.bytes {
            write!(f, "{byte:02X} ")?;
        }
        for _ in self.bytes.len()..3 {
            f.write_str("   ")?;
        }
        f.write_str(&self.mnemonic)?;
        if !self.operands.is_empty() {
            write!(f, " {}", self.operands)?;
        }
        Ok(())
    }
}

/// Disassembles `count` consecutive instructions starting at `start`.
///
/// `peek` must read program memory without side effects. Addresses advance
/// the way the core's program counter does, so a uCOM-4 listing stays inside
/// its 256-byte page.
pub fn disassemble_range(
    core: &dyn CpuCore,
    start: u32,
    count: usize,
    mut peek: impl FnMut(u32) -> u8,
) -> Vec<DisassemblyRow> {
    let mut rows = Vec::with_capacity(count);
    let mut pc = start;
    let mut window = Vec::new();
    for _ in 0..count {
        window.clear();
        let mut address = pc;
        for _ in 0..core.max_instruction_bytes() {
            window.push(peek(address));
            address = core.next_pc(address);
        }
        let row = core.disassemble(pc, &window);
        for _ in 0..row.len().max(1) {
            pc = core.next_pc(pc);
        }
        rows.push(row);
    }
    rows
}
