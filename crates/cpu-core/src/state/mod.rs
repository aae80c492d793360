//! Debugger-facing projection of a core's registers.
//!
//! The register file stays the primary storage; entries only describe how a
//! value is named, masked and shown.

/// Execution state machine shared by every core.
pub mod run_state;

pub use run_state::ExecState;

/// Identifier of an exported state value.
///
/// Family registers use small positive indices. The generic aliases are
/// negative so they never collide with them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct StateIndex(pub i32);

impl StateIndex {
    /// Current program counter.
    pub const GENPC: Self = Self(-1);
    /// Address of the instruction being executed.
    pub const GENPCBASE: Self = Self(-2);
    /// Stack pointer, where the family has one.
    pub const GENSP: Self = Self(-3);
    /// Flags packed into one value.
    pub const GENFLAGS: Self = Self(-4);
}

/// One exported value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StateEntry {
    /// Index used with `state_get`/`state_set`.
    pub index: StateIndex,
    /// Display name.
    pub symbol: &'static str,
    /// Bits the value occupies.
    pub mask: u64,
    /// Whether a debugger lists the entry by default.
    pub show: bool,
}

impl StateEntry {
    /// Creates a visible entry `bits` wide.
    #[must_use]
    pub const fn new(index: StateIndex, symbol: &'static str, bits: u32) -> Self {
        let mask = if bits >= 64 {
            u64::MAX
        } else {
            (1 << bits) - 1
        };
        Self {
            index,
            symbol,
            mask,
            show: true,
        }
    }

    /// Hides the entry from default listings.
    #[must_use]
    pub const fn noshow(mut self) -> Self {
        self.show = false;
        self
    }

    /// Truncates `value` to the entry width.
    #[must_use]
    pub const fn apply_mask(&self, value: u64) -> u64 {
        value & self.mask
    }

    /// Formats `value` as zero-padded hex sized to the entry.
    #[must_use]
    pub fn format_value(&self, value: u64) -> String {
        let bits = 64 - self.mask.leading_zeros();
        let digits = bits.div_ceil(4).max(1) as usize;
        format!("{:0digits$X}", self.apply_mask(value))
    }
}

/// Looks up an entry by index.
#[must_use]
pub fn find_entry(entries: &[StateEntry], index: StateIndex) -> Option<&StateEntry> {
    entries.iter().find(|entry| entry.index == index)
}

/// Looks up an entry by symbol, ignoring case.
#[must_use]
pub fn find_symbol<'a>(entries: &'a [StateEntry], symbol: &str) -> Option<&'a StateEntry> {
    entries
        .iter()
        .find(|entry| entry.symbol.eq_ignore_ascii_case(symbol))
}
