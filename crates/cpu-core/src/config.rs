//! Configuration accepted by the core constructors.
//!
//! Everything here is validated once when a core is built. A core that was
//! constructed successfully never reports a configuration problem later.

use crate::{ConfigError, Trigger};

/// What a core does when it fetches an opcode with no defined behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum IllegalOpcodePolicy {
    /// Log, count, and continue as a no-op of one fetch.
    Nop,
    /// Latch a [`Fault`](crate::Fault) and stop the core.
    Fatal,
}

/// Configuration shared by every core family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct CoreConfig {
    /// Input clock in Hz.
    pub clock_hz: u64,
    /// Overrides the family default illegal-opcode policy when set.
    pub illegal_opcode_policy: Option<IllegalOpcodePolicy>,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self::with_clock(1_000_000)
    }
}

impl CoreConfig {
    /// Creates a configuration with the family default policy.
    #[must_use]
    pub const fn with_clock(clock_hz: u64) -> Self {
        Self {
            clock_hz,
            illegal_opcode_policy: None,
        }
    }

    /// Returns a copy with an explicit illegal-opcode policy.
    #[must_use]
    pub const fn with_illegal_opcode_policy(mut self, policy: IllegalOpcodePolicy) -> Self {
        self.illegal_opcode_policy = Some(policy);
        self
    }

    /// Resolves the configured policy against a family default.
    #[must_use]
    pub const fn policy_or(&self, family_default: IllegalOpcodePolicy) -> IllegalOpcodePolicy {
        match self.illegal_opcode_policy {
            Some(policy) => policy,
            None => family_default,
        }
    }

    /// Checks the shared fields.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidParameter`] for a zero clock.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.clock_hz == 0 {
            return Err(ConfigError::InvalidParameter {
                parameter: "clock_hz",
                reason: "clock must be non-zero".to_owned(),
            });
        }
        Ok(())
    }
}

/// Configuration for [`Sm83`](crate::Sm83).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct Sm83Config {
    /// Shared configuration. The family default policy is fatal.
    pub core: CoreConfig,
    /// Reset to the register values left behind by the boot ROM and start
    /// at `0x0100` instead of `0x0000`.
    pub skip_boot: bool,
}

impl Default for Sm83Config {
    fn default() -> Self {
        Self {
            core: CoreConfig::with_clock(4_194_304),
            skip_boot: false,
        }
    }
}

/// Instruction-set family of a uCOM-4 part.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum Ucom4Family {
    /// Full instruction set: timer, extra RAM registers, `EI`/`DI`.
    Ucom43,
    /// Reduced instruction set; interrupts are always enabled.
    Ucom44,
}

/// Which I/O ports a part actually has.
///
/// Bit `n` of `inputs`/`outputs` stands for port `A + n`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct PortLayout {
    /// Readable ports.
    pub inputs: u16,
    /// Writable ports.
    pub outputs: u16,
    /// Bits that reach the pins on each output port.
    pub output_masks: [u8; 16],
}

impl PortLayout {
    /// Inputs on A-D, outputs on C-I; port I is three bits wide.
    pub const STANDARD: Self = Self {
        inputs: 0b0_0000_1111,
        outputs: 0b1_1111_1100,
        output_masks: [
            0xF, 0xF, 0xF, 0xF, 0xF, 0xF, 0xF, 0xF, 0x7, 0xF, 0xF, 0xF, 0xF, 0xF, 0xF, 0xF,
        ],
    };

    /// uPD557L: no port B, no H/I outputs, only G0 on port G.
    pub const UPD557L: Self = Self {
        inputs: 0b0_0000_1101,
        outputs: 0b0_0111_1100,
        output_masks: [
            0xF, 0xF, 0xF, 0xF, 0xF, 0xF, 0x1, 0xF, 0x7, 0xF, 0xF, 0xF, 0xF, 0xF, 0xF, 0xF,
        ],
    };

    /// Returns `true` when `port` can be read.
    #[must_use]
    pub const fn readable(&self, port: u8) -> bool {
        port < 16 && self.inputs & (1 << port) != 0
    }

    /// Returns `true` when `port` can be written.
    #[must_use]
    pub const fn writable(&self, port: u8) -> bool {
        port < 16 && self.outputs & (1 << port) != 0
    }

    /// Bits of `port` that reach the pins.
    #[must_use]
    pub const fn output_mask(&self, port: u8) -> u8 {
        self.output_masks[(port & 0xF) as usize]
    }
}

/// Geometry of a uCOM-4 part.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct Ucom4Layout {
    /// Instruction-set family.
    pub family: Ucom4Family,
    /// Program counter width in bits.
    pub prg_width: u8,
    /// Data RAM address width in bits.
    pub data_width: u8,
    /// Depth of the hardware call stack.
    pub stack_levels: u8,
    /// I/O ports present on the part.
    pub ports: PortLayout,
}

impl Ucom4Layout {
    /// Mask applied to the program counter.
    #[must_use]
    pub const fn prg_mask(&self) -> u16 {
        (1 << self.prg_width) - 1
    }

    /// Mask applied to data RAM addresses.
    #[must_use]
    pub const fn data_mask(&self) -> u8 {
        ((1u16 << self.data_width) - 1) as u8
    }

    /// Mask applied to `DPH`.
    #[must_use]
    pub const fn dph_mask(&self) -> u8 {
        self.data_mask() >> 4
    }

    /// Checks that the geometry is something the interpreter can run.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidParameter`] naming the first bad field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let check = |parameter: &'static str, value: u8, range: std::ops::RangeInclusive<u8>| {
            if range.contains(&value) {
                Ok(())
            } else {
                Err(ConfigError::InvalidParameter {
                    parameter,
                    reason: format!(
                        "{value} is outside {}..={}",
                        range.start(),
                        range.end()
                    ),
                })
            }
        };
        check("prg_width", self.prg_width, 8..=11)?;
        check("data_width", self.data_width, 4..=7)?;
        check("stack_levels", self.stack_levels, 1..=3)
    }
}

/// Known uCOM-4 parts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum Ucom4Variant {
    /// uPD546, uCOM-43, 2K program, 96x4 RAM.
    Upd546,
    /// uPD553, uCOM-43, 2K program, 96x4 RAM.
    Upd553,
    /// uPD557L, uCOM-43 with a reduced port set.
    Upd557l,
    /// uPD650, uCOM-43, 2K program, 96x4 RAM.
    Upd650,
    /// uPD552, uCOM-44, 1K program, 64x4 RAM, one stack level.
    Upd552,
    /// Caller-supplied geometry.
    Custom(Ucom4Layout),
}

impl Ucom4Variant {
    /// Geometry of the part.
    #[must_use]
    pub const fn layout(self) -> Ucom4Layout {
        const UCOM43: Ucom4Layout = Ucom4Layout {
            family: Ucom4Family::Ucom43,
            prg_width: 11,
            data_width: 7,
            stack_levels: 3,
            ports: PortLayout::STANDARD,
        };
        match self {
            Self::Upd546 | Self::Upd553 | Self::Upd650 => UCOM43,
            Self::Upd557l => Ucom4Layout {
                ports: PortLayout::UPD557L,
                ..UCOM43
            },
            Self::Upd552 => Ucom4Layout {
                family: Ucom4Family::Ucom44,
                prg_width: 10,
                data_width: 6,
                stack_levels: 1,
                ports: PortLayout::STANDARD,
            },
            Self::Custom(layout) => layout,
        }
    }

    /// Part name used in logs and errors.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Upd546 => "uPD546",
            Self::Upd553 => "uPD553",
            Self::Upd557l => "uPD557L",
            Self::Upd650 => "uPD650",
            Self::Upd552 => "uPD552",
            Self::Custom(_) => "uCOM-4",
        }
    }
}

/// Configuration for [`Ucom4`](crate::Ucom4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct Ucom4Config {
    /// Shared configuration. The family default policy is no-op.
    pub core: CoreConfig,
    /// Part being emulated.
    pub variant: Ucom4Variant,
    /// Trigger mode of `INT`.
    pub int_trigger: Trigger,
}

impl Ucom4Config {
    /// Default configuration for a part: 400 kHz, edge-triggered `INT`.
    #[must_use]
    pub const fn new(variant: Ucom4Variant) -> Self {
        Self {
            core: CoreConfig::with_clock(400_000),
            variant,
            int_trigger: Trigger::Edge,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{
        CoreConfig, IllegalOpcodePolicy, PortLayout, Ucom4Family, Ucom4Layout, Ucom4Variant,
    };
    use crate::ConfigError;

    #[test]
    fn explicit_policy_overrides_family_default() {
        let config = CoreConfig::default();
        assert_eq!(
            config.policy_or(IllegalOpcodePolicy::Fatal),
            IllegalOpcodePolicy::Fatal
        );
        let config = config.with_illegal_opcode_policy(IllegalOpcodePolicy::Nop);
        assert_eq!(
            config.policy_or(IllegalOpcodePolicy::Fatal),
            IllegalOpcodePolicy::Nop
        );
    }

    #[test]
    fn zero_clock_is_rejected() {
        assert!(matches!(
            CoreConfig::with_clock(0).validate(),
            Err(ConfigError::InvalidParameter {
                parameter: "clock_hz",
                ..
            })
        ));
    }

    #[test]
    fn upd552_is_a_small_ucom44() {
        let layout = Ucom4Variant::Upd552.layout();
        assert_eq!(layout.family, Ucom4Family::Ucom44);
        assert_eq!(layout.prg_mask(), 0x3FF);
        assert_eq!(layout.data_mask(), 0x3F);
        assert_eq!(layout.dph_mask(), 0x3);
    }

    #[test]
    fn upd557l_drops_port_b_and_high_outputs() {
        let ports = Ucom4Variant::Upd557l.layout().ports;
        assert!(!ports.readable(1));
        assert!(ports.readable(2));
        assert!(!ports.writable(7));
        assert_eq!(ports.output_mask(6), 0x1);
        assert!(PortLayout::STANDARD.writable(8));
    }

    #[test]
    fn custom_layout_is_range_checked() {
        let layout = Ucom4Layout {
            stack_levels: 4,
            ..Ucom4Variant::Upd553.layout()
        };
        assert!(matches!(
            layout.validate(),
            Err(ConfigError::InvalidParameter {
                parameter: "stack_levels",
                ..
            })
        ));
        assert!(Ucom4Variant::Upd650.layout().validate().is_ok());
    }
}
