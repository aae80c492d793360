/// Port `A`, read by `IA` and `TPA`.
pub const PORT_A: u8 = 0;
/// Port `C`, low nibble of `OCD`.
pub const PORT_C: u8 = 2;
/// Port `D`, high nibble of `OCD`.
pub const PORT_D: u8 = 3;
/// Port `E`, written by `OE`, `SEB` and `REB`.
pub const PORT_E: u8 = 4;

/// Deepest call stack any part has.
pub const MAX_STACK_LEVELS: usize = 3;

/// uCOM-4 register file.
///
/// Every register except `PC` and the stack is four bits wide; the setters
/// mask accordingly. `PC` is masked by the core, which knows the part's
/// program width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct Registers {
    pub(super) pc: u16,
    pub(super) acc: u8,
    pub(super) dpl: u8,
    pub(super) dph: u8,
    pub(super) carry: bool,
    pub(super) carry_save: bool,
    pub(super) timer_f: bool,
    pub(super) int_f: bool,
    pub(super) inte_f: bool,
    pub(super) stack: [u16; MAX_STACK_LEVELS],
    pub(super) port_out: [u8; 16],
}

impl Registers {
    /// Program counter.
    #[must_use]
    pub const fn pc(&self) -> u16 {
        self.pc
    }

    /// Accumulator.
    #[must_use]
    pub const fn acc(&self) -> u8 {
        self.acc
    }

    /// Data pointer, low nibble (RAM column).
    #[must_use]
    pub const fn dpl(&self) -> u8 {
        self.dpl
    }

    /// Data pointer, high nibble (RAM row).
    #[must_use]
    pub const fn dph(&self) -> u8 {
        self.dph
    }

    /// Carry flag.
    #[must_use]
    pub const fn carry(&self) -> bool {
        self.carry
    }

    /// Carry-save flag exchanged by `XC`.
    #[must_use]
    pub const fn carry_save(&self) -> bool {
        self.carry_save
    }

    /// Timer-out flag tested by `TTM`.
    #[must_use]
    pub const fn timer_flag(&self) -> bool {
        self.timer_f
    }

    /// Pending interrupt flag.
    #[must_use]
    pub const fn int_flag(&self) -> bool {
        self.int_f
    }

    /// Interrupt enable flag.
    #[must_use]
    pub const fn int_enable(&self) -> bool {
        self.inte_f
    }

    /// Call stack, most recent entry first.
    #[must_use]
    pub const fn stack(&self) -> [u16; MAX_STACK_LEVELS] {
        self.stack
    }

    /// Last value written to `port`.
    #[must_use]
    pub const fn port_out(&self, port: u8) -> u8 {
        self.port_out[(port & 0xF) as usize]
    }

    /// `DPH:DPL` as one RAM address, before masking to the RAM width.
    #[must_use]
    pub const fn data_pointer(&self) -> u8 {
        self.dph << 4 | self.dpl
    }

    /// Sets the accumulator.
    pub fn set_acc(&mut self, value: u8) {
        self.acc = value & 0xF;
    }

    /// Sets `DPL`.
    pub fn set_dpl(&mut self, value: u8) {
        self.dpl = value & 0xF;
    }

    /// Sets `DPH`.
    pub fn set_dph(&mut self, value: u8) {
        self.dph = value & 0xF;
    }

    /// Sets the carry flag.
    pub fn set_carry(&mut self, value: bool) {
        self.carry = value;
    }

    /// Sets the carry-save flag.
    pub fn set_carry_save(&mut self, value: bool) {
        self.carry_save = value;
    }

    /// Sets the timer-out flag.
    pub fn set_timer_flag(&mut self, value: bool) {
        self.timer_f = value;
    }

    /// Sets the pending interrupt flag.
    pub fn set_int_flag(&mut self, value: bool) {
        self.int_f = value;
    }

    /// Sets the interrupt enable flag.
    pub fn set_int_enable(&mut self, value: bool) {
        self.inte_f = value;
    }

    /// Shifts `return_to` onto a stack `levels` deep; the deepest entry
    /// falls off.
    pub(super) fn push(&mut self, levels: usize, return_to: u16) {
        let levels = levels.clamp(1, MAX_STACK_LEVELS);
        self.stack.copy_within(0..levels - 1, 1);
        self.stack[0] = return_to;
    }

    /// Shifts the top entry off a stack `levels` deep. The deepest entry is
    /// duplicated, so popping an empty stack keeps returning it.
    pub(super) fn pop(&mut self, levels: usize) -> u16 {
        let levels = levels.clamp(1, MAX_STACK_LEVELS);
        let top = self.stack[0];
        self.stack.copy_within(1..levels, 0);
        top
    }

    /// Replaces one stack slot.
    pub fn set_stack_entry(&mut self, level: usize, value: u16) {
        if let Some(slot) = self.stack.get_mut(level) {
            *slot = value;
        }
    }
}
