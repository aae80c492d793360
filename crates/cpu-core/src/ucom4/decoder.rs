//! uCOM-4 opcode decoding.
//!
//! The table is built once per core for its family: on uCOM-44 parts the
//! uCOM-43 extension opcodes resolve to [`Op::Illegal`]. Bit-addressing
//! opcodes carry their bit number, `LM`/`XM` carry the `DPH` xor value.

use crate::Ucom4Family;

/// Decoded operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum Op {
    Nop,
    Di,
    S,
    Tit,
    Tc,
    Ttm,
    Daa,
    Tal,
    Ad,
    Ads,
    Das,
    Clc,
    Cm,
    Inc,
    Op,
    Dec,
    Cma,
    Cia,
    Tla,
    Ded,
    Stm,
    Ldi,
    Cli,
    Ci,
    Exl,
    Adc,
    Xc,
    Stc,
    Inm,
    Ocd,
    Dem,
    Rar,
    Ei,
    Ip,
    Ind,
    Ia,
    Jpa,
    Taz,
    Taw,
    Oe,
    Tly,
    Thx,
    Rt,
    Rts,
    Xaz,
    Xaw,
    Xls,
    Xhr,
    Xly,
    Xhx,
    Fbf(u8),
    Tab(u8),
    Xm(u8),
    Xmd(u8),
    Cmb(u8),
    Lm(u8),
    Xmi(u8),
    Tpb(u8),
    Tpa(u8),
    Tmb(u8),
    Fbt(u8),
    Rpb(u8),
    Reb(u8),
    Rmb(u8),
    Rfb(u8),
    Spb(u8),
    Seb(u8),
    Smb(u8),
    Sfb(u8),
    Ldz(u8),
    Li(u8),
    Jmp(u8),
    Cal(u8),
    Czp(u8),
    Jcp(u8),
    Illegal,
}

impl Op {
    /// Returns `true` for the uCOM-43 extension set.
    #[must_use]
    pub const fn is_ucom43_only(self) -> bool {
        matches!(
            self,
            Self::Taw
                | Self::Taz
                | Self::Thx
                | Self::Tly
                | Self::Xaw
                | Self::Xaz
                | Self::Xhr
                | Self::Xhx
                | Self::Xls
                | Self::Xly
                | Self::Sfb(_)
                | Self::Rfb(_)
                | Self::Fbt(_)
                | Self::Fbf(_)
                | Self::Stm
                | Self::Ttm
                | Self::Ei
                | Self::Di
        )
    }

    /// Assembler mnemonic.
    #[must_use]
    pub const fn mnemonic(self) -> &'static str {
        match self {
            Self::Nop => "NOP",
            Self::Di => "DI",
            Self::S => "S",
            Self::Tit => "TIT",
            Self::Tc => "TC",
            Self::Ttm => "TTM",
            Self::Daa => "DAA",
            Self::Tal => "TAL",
            Self::Ad => "AD",
            Self::Ads => "ADS",
            Self::Das => "DAS",
            Self::Clc => "CLC",
            Self::Cm => "CM",
            Self::Inc => "INC",
            Self::Op => "OP",
            Self::Dec => "DEC",
            Self::Cma => "CMA",
            Self::Cia => "CIA",
            Self::Tla => "TLA",
            Self::Ded => "DED",
            Self::Stm => "STM",
            Self::Ldi => "LDI",
            Self::Cli => "CLI",
            Self::Ci => "CI",
            Self::Exl => "EXL",
            Self::Adc => "ADC",
            Self::Xc => "XC",
            Self::Stc => "STC",
            Self::Inm => "INM",
            Self::Ocd => "OCD",
            Self::Dem => "DEM",
            Self::Rar => "RAR",
            Self::Ei => "EI",
            Self::Ip => "IP",
            Self::Ind => "IND",
            Self::Ia => "IA",
            Self::Jpa => "JPA",
            Self::Taz => "TAZ",
            Self::Taw => "TAW",
            Self::Oe => "OE",
            Self::Tly => "TLY",
            Self::Thx => "THX",
            Self::Rt => "RT",
            Self::Rts => "RTS",
            Self::Xaz => "XAZ",
            Self::Xaw => "XAW",
            Self::Xls => "XLS",
            Self::Xhr => "XHR",
            Self::Xly => "XLY",
            Self::Xhx => "XHX",
            Self::Fbf(_) => "FBF",
            Self::Tab(_) => "TAB",
            Self::Xm(_) => "XM",
            Self::Xmd(_) => "XMD",
            Self::Cmb(_) => "CMB",
            Self::Lm(_) => "LM",
            Self::Xmi(_) => "XMI",
            Self::Tpb(_) => "TPB",
            Self::Tpa(_) => "TPA",
            Self::Tmb(_) => "TMB",
            Self::Fbt(_) => "FBT",
            Self::Rpb(_) => "RPB",
            Self::Reb(_) => "REB",
            Self::Rmb(_) => "RMB",
            Self::Rfb(_) => "RFB",
            Self::Spb(_) => "SPB",
            Self::Seb(_) => "SEB",
            Self::Smb(_) => "SMB",
            Self::Sfb(_) => "SFB",
            Self::Ldz(_) => "LDZ",
            Self::Li(_) => "LI",
            Self::Jmp(_) => "JMP",
            Self::Cal(_) => "CAL",
            Self::Czp(_) => "CZP",
            Self::Jcp(_) => "JCP",
            Self::Illegal => "?",
        }
    }
}

/// One dispatch-table slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Entry {
    /// Operation.
    pub op: Op,
    /// Bytes fetched, argument included.
    pub length: u8,
    /// Machine cycles: one per byte fetched, one more for returns.
    pub cycles: u8,
}

/// Returns `true` for opcodes followed by an argument byte
/// (`STM`/`LDI`/`CLI`/`CI`, `JMP`/`CAL`, `OCD`).
#[must_use]
pub const fn has_argument(opcode: u8) -> bool {
    opcode & 0xFC == 0x14 || opcode & 0xF0 == 0xA0 || opcode == 0x1E
}

const fn decode_op(opcode: u8) -> Op {
    let low = opcode & 0x0F;
    let bit = opcode & 0x03;
    match opcode & 0xF0 {
        0x80 => return Op::Ldz(low),
        0x90 => return Op::Li(low),
        0xA0 if opcode & 0x08 == 0 => return Op::Jmp(opcode & 0x07),
        0xA0 => return Op::Cal(opcode & 0x07),
        0xB0 => return Op::Czp(low),
        0xC0..=0xF0 => return Op::Jcp(opcode & 0x3F),
        _ => {}
    }
    match opcode {
        0x00 => Op::Nop,
        0x01 => Op::Di,
        0x02 => Op::S,
        0x03 => Op::Tit,
        0x04 => Op::Tc,
        0x05 => Op::Ttm,
        0x06 => Op::Daa,
        0x07 => Op::Tal,
        0x08 => Op::Ad,
        0x09 => Op::Ads,
        0x0A => Op::Das,
        0x0B => Op::Clc,
        0x0C => Op::Cm,
        0x0D => Op::Inc,
        0x0E => Op::Op,
        0x0F => Op::Dec,
        0x10 => Op::Cma,
        0x11 => Op::Cia,
        0x12 => Op::Tla,
        0x13 => Op::Ded,
        0x14 => Op::Stm,
        0x15 => Op::Ldi,
        0x16 => Op::Cli,
        0x17 => Op::Ci,
        0x18 => Op::Exl,
        0x19 => Op::Adc,
        0x1A => Op::Xc,
        0x1B => Op::Stc,
        0x1D => Op::Inm,
        0x1E => Op::Ocd,
        0x1F => Op::Dem,
        0x30 => Op::Rar,
        0x31 => Op::Ei,
        0x32 => Op::Ip,
        0x33 => Op::Ind,
        0x40 => Op::Ia,
        0x41 => Op::Jpa,
        0x42 => Op::Taz,
        0x43 => Op::Taw,
        0x44 => Op::Oe,
        0x46 => Op::Tly,
        0x47 => Op::Thx,
        0x48 => Op::Rt,
        0x49 => Op::Rts,
        0x4A => Op::Xaz,
        0x4B => Op::Xaw,
        0x4C => Op::Xls,
        0x4D => Op::Xhr,
        0x4E => Op::Xly,
        0x4F => Op::Xhx,
        0x1C | 0x45 => Op::Illegal,
        _ => match opcode & 0xFC {
            0x20 => Op::Fbf(bit),
            0x24 => Op::Tab(bit),
            0x28 => Op::Xm(bit),
            0x2C => Op::Xmd(bit),
            0x34 => Op::Cmb(bit),
            0x38 => Op::Lm(bit),
            0x3C => Op::Xmi(bit),
            0x50 => Op::Tpb(bit),
            0x54 => Op::Tpa(bit),
            0x58 => Op::Tmb(bit),
            0x5C => Op::Fbt(bit),
            0x60 => Op::Rpb(bit),
            0x64 => Op::Reb(bit),
            0x68 => Op::Rmb(bit),
            0x6C => Op::Rfb(bit),
            0x70 => Op::Spb(bit),
            0x74 => Op::Seb(bit),
            0x78 => Op::Smb(bit),
            _ => Op::Sfb(bit),
        },
    }
}

/// Decodes `opcode` for a part of `family`.
#[must_use]
pub const fn decode(opcode: u8, family: Ucom4Family) -> Entry {
    let mut op = decode_op(opcode);
    if matches!(family, Ucom4Family::Ucom44) && op.is_ucom43_only() {
        op = Op::Illegal;
    }
    let length = if has_argument(opcode) { 2 } else { 1 };
    let cycles = if matches!(op, Op::Rt | Op::Rts) {
        length + 1
    } else {
        length
    };
    Entry { op, length, cycles }
}

/// Per-family dispatch table.
#[derive(Debug, Clone)]
pub struct DispatchTable {
    entries: [Entry; 256],
}

impl DispatchTable {
    /// Decodes every opcode for `family`.
    #[must_use]
    pub fn new(family: Ucom4Family) -> Self {
        Self {
            entries: std::array::from_fn(|index| decode(index as u8, family)),
        }
    }

    /// Entry for `opcode`.
    #[must_use]
    pub const fn get(&self, opcode: u8) -> Entry {
        self.entries[opcode as usize]
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::{decode, has_argument, DispatchTable, Op};
    use crate::Ucom4Family;

    #[rstest]
    #[case(0x00, Op::Nop)]
    #[case(0x08, Op::Ad)]
    #[case(0x2B, Op::Xm(3))]
    #[case(0x3D, Op::Xmi(1))]
    #[case(0x7E, Op::Sfb(2))]
    #[case(0x85, Op::Ldz(5))]
    #[case(0x9C, Op::Li(0xC))]
    #[case(0xA3, Op::Jmp(3))]
    #[case(0xAD, Op::Cal(5))]
    #[case(0xBF, Op::Czp(0xF))]
    #[case(0xC0, Op::Jcp(0x00))]
    #[case(0xFF, Op::Jcp(0x3F))]
    fn opcode_groups(#[case] opcode: u8, #[case] op: Op) {
        assert_eq!(decode(opcode, Ucom4Family::Ucom43).op, op);
    }

    #[test]
    fn argument_bytes_and_cycles() {
        let with_argument: Vec<u8> = (0..=255u8).filter(|&op| has_argument(op)).collect();
        assert_eq!(with_argument.len(), 4 + 16 + 1);
        let stm = decode(0x14, Ucom4Family::Ucom43);
        assert_eq!((stm.length, stm.cycles), (2, 2));
        let rts = decode(0x49, Ucom4Family::Ucom43);
        assert_eq!((rts.length, rts.cycles), (1, 2));
        assert_eq!(decode(0x00, Ucom4Family::Ucom43).cycles, 1);
    }

    #[test]
    fn ucom44_rejects_extension_opcodes() {
        let table = DispatchTable::new(Ucom4Family::Ucom44);
        assert_eq!(table.get(0x31).op, Op::Illegal);
        assert_eq!(table.get(0x14).op, Op::Illegal);
        assert_eq!(table.get(0x14).length, 2);
        assert_eq!(table.get(0x03).op, Op::Tit);
        let illegal = (0..=255u8)
            .filter(|&opcode| table.get(opcode).op == Op::Illegal)
            .count();
        assert_eq!(illegal, 2 + 10 + 16 + 4);
    }

    #[test]
    fn ucom43_has_two_holes() {
        let table = DispatchTable::new(Ucom4Family::Ucom43);
        let illegal: Vec<u8> = (0..=255u8)
            .filter(|&opcode| table.get(opcode).op == Op::Illegal)
            .collect();
        assert_eq!(illegal, vec![0x1C, 0x45]);
    }
}
