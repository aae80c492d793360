//! Execution contract every core implements.
//!
//! A host builds a core with its address spaces, resolves line names once,
//! then drives it with cycle budgets. Everything between two instruction
//! boundaries is atomic from the host's point of view.

use crate::{
    resolve_line, ConfigError, Diagnostics, DisassemblyRow, ExecState, Fault, InputLine,
    LineDescriptor, LineHandle, LineLevel, StateEntry, StateIndex,
};
use crate::timing::CycleCounter;

/// Result of one boundary action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StepOutcome {
    /// One instruction retired, including skipped and illegal-as-no-op ones.
    Retired {
        /// Address the instruction was fetched from.
        pc: u32,
        /// Cycles charged, wait states included.
        cycles: u32,
    },
    /// The interrupt entry sequence ran.
    Interrupt {
        /// Address execution continues at.
        vector: u32,
        /// Cycles charged for the entry sequence.
        cycles: u32,
    },
    /// The core was halted or held in reset and only burned time.
    Idle {
        /// Cycles burned.
        cycles: u32,
    },
}

impl StepOutcome {
    /// Cycles charged by this action.
    #[must_use]
    pub const fn cycles(self) -> u32 {
        match self {
            Self::Retired { cycles, .. } | Self::Interrupt { cycles, .. } | Self::Idle { cycles } => {
                cycles
            }
        }
    }
}

/// Aggregate of one `execute_run` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunOutcome {
    /// Cycles consumed; at least the budget, overshooting by less than one
    /// instruction.
    pub cycles: u64,
    /// Instructions retired.
    pub instructions: u64,
    /// Interrupts dispatched.
    pub interrupts: u64,
    /// State the core rests in afterwards.
    pub state: ExecState,
}

/// Common contract of every CPU core.
///
/// Cores are single-threaded and never share mutable state except through
/// their address spaces and line handles.
pub trait CpuCore {
    /// Part name used in logs and errors.
    fn name(&self) -> &'static str;

    /// Puts the core in its power-on state. Line levels requested by devices
    /// are kept; latched edges are dropped. `total_cycles` keeps counting.
    fn reset(&mut self);

    /// Performs one boundary action: dispatch a pending interrupt or run one
    /// instruction. A halted or reset-held core instead idles for up to
    /// `remaining` cycles, rounded up to its idle granularity.
    ///
    /// # Errors
    ///
    /// Returns the latched [`Fault`] when the core is or becomes faulted.
    fn advance(&mut self, remaining: u64) -> Result<StepOutcome, Fault>;

    /// Runs exactly one boundary action.
    ///
    /// # Errors
    ///
    /// Same as [`CpuCore::advance`].
    fn step(&mut self) -> Result<StepOutcome, Fault> {
        self.advance(1)
    }

    /// Runs until at least `budget` cycles are consumed. The instruction in
    /// progress when the budget runs out always completes.
    ///
    /// # Errors
    ///
    /// Returns the [`Fault`] that stopped the core. Cycles consumed before the
    /// fault are still reflected in [`CpuCore::total_cycles`].
    fn execute_run(&mut self, budget: u64) -> Result<RunOutcome, Fault> {
        let mut counter = CycleCounter::new(budget);
        let mut outcome = RunOutcome::default();
        while !counter.exhausted() {
            let step = self.advance(counter.remaining())?;
            match step {
                StepOutcome::Retired { .. } => outcome.instructions += 1,
                StepOutcome::Interrupt { .. } => outcome.interrupts += 1,
                StepOutcome::Idle { .. } => {}
            }
            counter.charge(u64::from(step.cycles()));
        }
        outcome.cycles = counter.consumed();
        outcome.state = self.exec_state();
        Ok(outcome)
    }

    /// Input lines the core accepts.
    fn input_lines(&self) -> &[LineDescriptor];

    /// Resolves an input line by name. Meant to be called once at setup.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnsupportedLine`] for an unknown name.
    fn resolve_input_line(&self, name: &str) -> Result<InputLine, ConfigError> {
        resolve_line(self.name(), self.input_lines(), name)
    }

    /// Shared handle to the core's line latch.
    fn line_handle(&self) -> LineHandle;

    /// Requests a line level. Takes effect at the next instruction boundary.
    fn set_line(&mut self, line: InputLine, level: LineLevel) {
        self.line_handle().set_line(line, level);
    }

    /// Exported state entries.
    fn state_entries(&self) -> &[StateEntry];

    /// Reads an exported value, masked to the entry width. Has no side
    /// effects.
    fn state_get(&self, index: StateIndex) -> Option<u64>;

    /// Writes an exported value through the core's own mutators.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownStateEntry`] for an index the core does
    /// not export.
    fn state_set(&mut self, index: StateIndex, value: u64) -> Result<(), ConfigError>;

    /// Current execution state.
    fn exec_state(&self) -> ExecState;

    /// Cycles consumed since construction.
    fn total_cycles(&self) -> u64;

    /// Diagnostic counters.
    fn diagnostics(&self) -> &Diagnostics;

    /// Input clock in Hz.
    fn clock_hz(&self) -> u64;

    /// Input clocks per core cycle.
    fn clocks_per_cycle(&self) -> u32;

    /// Longest instruction encoding in bytes.
    fn max_instruction_bytes(&self) -> usize;

    /// Address following `pc` in fetch order.
    fn next_pc(&self, pc: u32) -> u32;

    /// Disassembles the instruction whose bytes start `bytes`.
    fn disassemble(&self, pc: u32, bytes: &[u8]) -> DisassemblyRow;
}

#[cfg(test)]
mod tests {
    use super::StepOutcome;

    #[test]
    fn step_cycles_cover_every_variant() {
        assert_eq!(StepOutcome::Retired { pc: 0, cycles: 4 }.cycles(), 4);
        assert_eq!(StepOutcome::Interrupt { vector: 0x40, cycles: 20 }.cycles(), 20);
        assert_eq!(StepOutcome::Idle { cycles: 8 }.cycles(), 8);
    }
}
