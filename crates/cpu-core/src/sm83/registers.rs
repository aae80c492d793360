/// `F` bit for a zero result.
pub const FLAG_Z: u8 = 0x80;
/// `F` bit set by subtractions.
pub const FLAG_N: u8 = 0x40;
/// `F` bit for a carry out of bit 3 (borrow into bit 4).
pub const FLAG_H: u8 = 0x20;
/// `F` bit for a carry out of bit 7 (borrow).
pub const FLAG_C: u8 = 0x10;
/// Bits of `F` that exist; the low nibble always reads zero.
pub const FLAGS_MASK: u8 = FLAG_Z | FLAG_N | FLAG_H | FLAG_C;
/// Interrupt sources present in `IE`/`IF`.
pub const INTERRUPT_MASK: u8 = 0x1F;

/// SM83 register file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct Registers {
    pub(super) a: u8,
    pub(super) f: u8,
    pub(super) b: u8,
    pub(super) c: u8,
    pub(super) d: u8,
    pub(super) e: u8,
    pub(super) h: u8,
    pub(super) l: u8,
    pub(super) sp: u16,
    pub(super) pc: u16,
    pub(super) ime: bool,
    pub(super) ie: u8,
    pub(super) iflag: u8,
}

impl Registers {
    /// Values the DMG boot ROM leaves behind when it jumps to `0x0100`.
    #[must_use]
    pub const fn post_boot() -> Self {
        Self {
            a: 0x01,
            f: 0xB0,
            b: 0x00,
            c: 0x13,
            d: 0x00,
            e: 0xD8,
            h: 0x01,
            l: 0x4D,
            sp: 0xFFFE,
            pc: 0x0100,
            ime: false,
            ie: 0x00,
            iflag: 0x01,
        }
    }

    /// Accumulator.
    #[must_use]
    pub const fn a(&self) -> u8 {
        self.a
    }

    /// Flags register.
    #[must_use]
    pub const fn f(&self) -> u8 {
        self.f
    }

    /// `B`.
    #[must_use]
    pub const fn b(&self) -> u8 {
        self.b
    }

    /// `C`.
    #[must_use]
    pub const fn c(&self) -> u8 {
        self.c
    }

    /// `D`.
    #[must_use]
    pub const fn d(&self) -> u8 {
        self.d
    }

    /// `E`.
    #[must_use]
    pub const fn e(&self) -> u8 {
        self.e
    }

    /// `H`.
    #[must_use]
    pub const fn h(&self) -> u8 {
        self.h
    }

    /// `L`.
    #[must_use]
    pub const fn l(&self) -> u8 {
        self.l
    }

    /// Stack pointer.
    #[must_use]
    pub const fn sp(&self) -> u16 {
        self.sp
    }

    /// Program counter.
    #[must_use]
    pub const fn pc(&self) -> u16 {
        self.pc
    }

    /// Interrupt master enable.
    #[must_use]
    pub const fn ime(&self) -> bool {
        self.ime
    }

    /// Interrupt enable register (`0xFFFF`).
    #[must_use]
    pub const fn ie(&self) -> u8 {
        self.ie
    }

    /// Interrupt request register (`0xFF0F`), without the constant high bits.
    #[must_use]
    pub const fn iflag(&self) -> u8 {
        self.iflag
    }

    /// `AF` pair.
    #[must_use]
    pub const fn af(&self) -> u16 {
        u16::from_be_bytes([self.a, self.f])
    }

    /// `BC` pair.
    #[must_use]
    pub const fn bc(&self) -> u16 {
        u16::from_be_bytes([self.b, self.c])
    }

    /// `DE` pair.
    #[must_use]
    pub const fn de(&self) -> u16 {
        u16::from_be_bytes([self.d, self.e])
    }

    /// `HL` pair.
    #[must_use]
    pub const fn hl(&self) -> u16 {
        u16::from_be_bytes([self.h, self.l])
    }

    /// Returns `true` when every bit of `flag` is set in `F`.
    #[must_use]
    pub const fn flag(&self, flag: u8) -> bool {
        self.f & flag == flag
    }

    /// Sets the accumulator.
    pub fn set_a(&mut self, value: u8) {
        self.a = value;
    }

    /// Sets `F`; the low nibble is forced to zero.
    pub fn set_f(&mut self, value: u8) {
        self.f = value & FLAGS_MASK;
    }

    /// Sets `B`.
    pub fn set_b(&mut self, value: u8) {
        self.b = value;
    }

    /// Sets `C`.
    pub fn set_c(&mut self, value: u8) {
        self.c = value;
    }

    /// Sets `D`.
    pub fn set_d(&mut self, value: u8) {
        self.d = value;
    }

    /// Sets `E`.
    pub fn set_e(&mut self, value: u8) {
        self.e = value;
    }

    /// Sets `H`.
    pub fn set_h(&mut self, value: u8) {
        self.h = value;
    }

    /// Sets `L`.
    pub fn set_l(&mut self, value: u8) {
        self.l = value;
    }

    /// Sets the stack pointer.
    pub fn set_sp(&mut self, value: u16) {
        self.sp = value;
    }

    /// Sets the program counter.
    pub fn set_pc(&mut self, value: u16) {
        self.pc = value;
    }

    /// Sets the interrupt master enable.
    pub fn set_ime(&mut self, value: bool) {
        self.ime = value;
    }

    /// Sets `IE`.
    pub fn set_ie(&mut self, value: u8) {
        self.ie = value;
    }

    /// Sets `IF`; only the five source bits are stored.
    pub fn set_iflag(&mut self, value: u8) {
        self.iflag = value & INTERRUPT_MASK;
    }

    /// Sets `AF`, masking the flags.
    pub fn set_af(&mut self, value: u16) {
        let [a, f] = value.to_be_bytes();
        self.a = a;
        self.set_f(f);
    }

    /// Sets `BC`.
    pub fn set_bc(&mut self, value: u16) {
        [self.b, self.c] = value.to_be_bytes();
    }

    /// Sets `DE`.
    pub fn set_de(&mut self, value: u16) {
        [self.d, self.e] = value.to_be_bytes();
    }

    /// Sets `HL`.
    pub fn set_hl(&mut self, value: u16) {
        [self.h, self.l] = value.to_be_bytes();
    }
}
