//! Cycle-counted CPU interpreter cores behind a common execution contract.
//!
//! Every core owns its register file and a precomputed dispatch table, and
//! talks to the outside world through injected [`AddressSpace`] handles and a
//! [`LineHandle`] for input lines. Hosts drive cores through [`CpuCore`],
//! either directly or via the round-robin [`Scheduler`].

/// Execution faults and configuration errors.
pub mod fault;
pub use fault::{ConfigError, Fault};

/// Configuration types for cores and families.
pub mod config;
pub use config::{
    CoreConfig, IllegalOpcodePolicy, PortLayout, Sm83Config, Ucom4Config, Ucom4Family,
    Ucom4Layout, Ucom4Variant,
};

/// Address-space contract and backing stores.
pub mod memory;
pub use memory::{
    AccessWidth, AddressMap, AddressSpace, Endianness, ReadHandler, SharedSpace, SpaceConfig,
    WriteHandler,
};

/// Input/output line plumbing.
pub mod lines;
pub use lines::{
    resolve_line, InputLine, LineDescriptor, LineHandle, LineLatch, LineLevel, LineSink,
    NullLineSink, OutputLine, RecordingLineSink, Trigger,
};

/// Debugger-facing state export and the execution state machine.
pub mod state;
pub use state::{find_entry, find_symbol, ExecState, StateEntry, StateIndex};

/// Saturating per-core diagnostic counters.
pub mod diag;
pub use diag::{Diagnostics, IllegalOpcodeRecord};

/// Cycle budget bookkeeping and clock conversion helpers.
pub mod timing;
pub use timing::{cycles_at, CycleCounter};

/// Flag-register helpers shared by the instruction handlers.
pub mod flags;

/// Disassembly rows shared by every family.
pub mod disasm;
pub use disasm::{disassemble_range, DisassemblyRow};

/// Common execution contract implemented by every core.
pub mod api;
pub use api::{CpuCore, RunOutcome, StepOutcome};

/// Deterministic multi-core scheduling.
pub mod scheduler;
pub use scheduler::{CoreId, Scheduler};

/// Sharp SM83 (LR35902) interpreter.
pub mod sm83;
pub use sm83::Sm83;

/// NEC uCOM-4 interpreter.
pub mod ucom4;
pub use ucom4::Ucom4;

#[cfg(test)]
use proptest as _;
#[cfg(test)]
use rstest as _;
#[cfg(test)]
use tracing_subscriber as _;
