use crate::Fault;

/// Where a core is in its fetch-decode-execute cycle.
///
/// Between calls a core rests in `Fetching`, `Halted`, `Idle` or
/// `FaultLatched`; `Executing` and `ServicingInterrupt` are only observed
/// from inside a bus access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum ExecState {
    /// Held in reset or not yet started.
    #[default]
    Idle,
    /// At an instruction boundary, about to fetch.
    Fetching,
    /// Running an instruction handler.
    Executing,
    /// Running the interrupt entry sequence.
    ServicingInterrupt,
    /// Stopped by a halt-type instruction until an interrupt or reset.
    Halted,
    /// Stopped by a fatal fault until reset.
    FaultLatched(Fault),
}

impl ExecState {
    /// Returns the latched fault, if any.
    #[must_use]
    pub const fn latched_fault(self) -> Option<Fault> {
        match self {
            Self::FaultLatched(fault) => Some(fault),
            Self::Idle
            | Self::Fetching
            | Self::Executing
            | Self::ServicingInterrupt
            | Self::Halted => None,
        }
    }

    /// Returns `true` when the core makes no progress until woken.
    #[must_use]
    pub const fn is_stopped(self) -> bool {
        matches!(self, Self::Idle | Self::Halted | Self::FaultLatched(_))
    }
}

#[cfg(test)]
mod tests {
    use super::ExecState;
    use crate::Fault;

    #[test]
    fn default_is_idle() {
        assert_eq!(ExecState::default(), ExecState::Idle);
    }

    #[test]
    fn latched_fault_only_reported_by_fault_state() {
        let fault = Fault::IllegalOpcode { pc: 0, opcode: 0 };
        assert_eq!(ExecState::Fetching.latched_fault(), None);
        assert_eq!(ExecState::Halted.latched_fault(), None);
        assert_eq!(ExecState::FaultLatched(fault).latched_fault(), Some(fault));
        assert!(ExecState::FaultLatched(fault).is_stopped());
        assert!(!ExecState::Fetching.is_stopped());
    }
}
