//! Per-core counters for hosts and debuggers. All counters saturate.

/// Location and value of an illegal opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct IllegalOpcodeRecord {
    /// Address the opcode was fetched from.
    pub pc: u32,
    /// Raw opcode byte.
    pub opcode: u8,
}

/// Saturating event counters kept by every core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct Diagnostics {
    /// Instructions retired, including skipped and illegal ones.
    pub instructions: u64,
    /// Interrupts dispatched.
    pub interrupts: u64,
    /// Illegal opcodes fetched.
    pub illegal_opcodes: u64,
    /// Wait-state cycles charged by address spaces.
    pub wait_states: u64,
    /// Most recent illegal opcode.
    pub last_illegal: Option<IllegalOpcodeRecord>,
}

impl Diagnostics {
    /// Counts one retired instruction.
    pub fn record_instruction(&mut self) {
        self.instructions = self.instructions.saturating_add(1);
    }

    /// Counts one dispatched interrupt.
    pub fn record_interrupt(&mut self) {
        self.interrupts = self.interrupts.saturating_add(1);
    }

    /// Counts an illegal opcode and remembers where it was.
    pub fn record_illegal(&mut self, pc: u32, opcode: u8) {
        self.illegal_opcodes = self.illegal_opcodes.saturating_add(1);
        self.last_illegal = Some(IllegalOpcodeRecord { pc, opcode });
    }

    /// Adds wait-state cycles.
    pub fn record_wait_states(&mut self, cycles: u32) {
        self.wait_states = self.wait_states.saturating_add(u64::from(cycles));
    }

    /// Clears every counter.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
