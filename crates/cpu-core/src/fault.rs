use thiserror::Error;

/// Fatal fault raised while a core executes.
///
/// A fault latches the core: every later run reports the same fault until the
/// core is reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum Fault {
    /// Opcode has no defined behavior and the core runs with the fatal policy.
    #[error("illegal opcode {opcode:#04x} at {pc:#06x}")]
    IllegalOpcode {
        /// Address the opcode was fetched from.
        pc: u32,
        /// Raw opcode byte.
        opcode: u8,
    },
}

impl Fault {
    /// Program counter at which the fault was raised.
    #[must_use]
    pub const fn pc(self) -> u32 {
        match self {
            Self::IllegalOpcode { pc, .. } => pc,
        }
    }
}

/// Error reported while wiring a core into a system.
///
/// These only surface at setup time; nothing on the execution path returns a
/// `ConfigError`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// Line name is unknown to the core.
    #[error("{core} has no input line named `{name}`")]
    UnsupportedLine {
        /// Core that rejected the name.
        core: &'static str,
        /// Name that was requested.
        name: String,
    },
    /// Supplied address space does not match what the core needs.
    #[error("{space} space needs {expected}, got {actual}")]
    SpaceMismatch {
        /// Role of the space (`program`, `data`, `io`).
        space: &'static str,
        /// Human-readable requirement.
        expected: String,
        /// Human-readable description of what was supplied.
        actual: String,
    },
    /// A numeric parameter is outside its legal range.
    #[error("invalid {parameter}: {reason}")]
    InvalidParameter {
        /// Parameter name.
        parameter: &'static str,
        /// Why it was rejected.
        reason: String,
    },
    /// A state index is not exported by the core.
    #[error("{core} exports no state entry {index}")]
    UnknownStateEntry {
        /// Core that rejected the index.
        core: &'static str,
        /// Raw index value.
        index: i32,
    },
    /// An address-map region overlaps another or leaves the space.
    #[error("region {start:#x}..={end:#x} overlaps another mapping or exceeds the space")]
    InvalidRegion {
        /// Inclusive start address.
        start: u32,
        /// Inclusive end address.
        end: u32,
    },
}
