#![allow(clippy::cast_possible_wrap, clippy::cast_sign_loss)]

use super::decoder::{DispatchTable, Op};
use crate::DisassemblyRow;

fn byte(bytes: &[u8], index: usize) -> u8 {
    bytes.get(index).copied().unwrap_or(0)
}

fn word(bytes: &[u8]) -> u16 {
    u16::from_le_bytes([byte(bytes, 1), byte(bytes, 2)])
}

fn relative(pc: u32, offset: u8) -> u16 {
    (pc as u16).wrapping_add(2).wrapping_add(offset as i8 as u16)
}

fn signed(offset: u8) -> String {
    let value = offset as i8;
    if value < 0 {
        format!("-${:02X}", value.unsigned_abs())
    } else {
        format!("+${value:02X}")
    }
}

/// Formats the instruction at `pc`. Missing trailing bytes read as zero.
pub(super) fn disassemble(table: &DispatchTable, pc: u32, bytes: &[u8]) -> DisassemblyRow {
    let mut entry = table.main(byte(bytes, 0));
    if entry.op == Op::Prefix {
        entry = table.cb(byte(bytes, 1));
    }
    let imm8 = byte(bytes, 1);
    let imm16 = word(bytes);
    let (mnemonic, operands) = match entry.op {
        Op::Nop => ("NOP", String::new()),
        Op::Stop => ("STOP", String::new()),
        Op::Halt => ("HALT", String::new()),
        Op::Di => ("DI", String::new()),
        Op::Ei => ("EI", String::new()),
        Op::LdR16Imm(pair) => ("LD", format!("{},${imm16:04X}", pair.name())),
        Op::LdIndA(pointer) => ("LD", format!("{},A", pointer.name())),
        Op::LdAInd(pointer) => ("LD", format!("A,{}", pointer.name())),
        Op::LdImmSp => ("LD", format!("(${imm16:04X}),SP")),
        Op::IncR16(pair) => ("INC", pair.name().to_owned()),
        Op::DecR16(pair) => ("DEC", pair.name().to_owned()),
        Op::AddHl(pair) => ("ADD", format!("HL,{}", pair.name())),
        Op::IncR8(operand) => ("INC", operand.name().to_owned()),
        Op::DecR8(operand) => ("DEC", operand.name().to_owned()),
        Op::LdR8Imm(operand) => ("LD", format!("{},${imm8:02X}", operand.name())),
        Op::Rlca => ("RLCA", String::new()),
        Op::Rrca => ("RRCA", String::new()),
        Op::Rla => ("RLA", String::new()),
        Op::Rra => ("RRA", String::new()),
        Op::Daa => ("DAA", String::new()),
        Op::Cpl => ("CPL", String::new()),
        Op::Scf => ("SCF", String::new()),
        Op::Ccf => ("CCF", String::new()),
        Op::Jr => ("JR", format!("${:04X}", relative(pc, imm8))),
        Op::JrCond(cond) => ("JR", format!("{},${:04X}", cond.name(), relative(pc, imm8))),
        Op::LdR8R8 { dst, src } => ("LD", format!("{},{}", dst.name(), src.name())),
        Op::Alu(op, operand) => (op.mnemonic(), format!("A,{}", operand.name())),
        Op::AluImm(op) => (op.mnemonic(), format!("A,${imm8:02X}")),
        Op::Ret => ("RET", String::new()),
        Op::Reti => ("RETI", String::new()),
        Op::RetCond(cond) => ("RET", cond.name().to_owned()),
        Op::Pop(pair) => ("POP", pair.name().to_owned()),
        Op::Push(pair) => ("PUSH", pair.name().to_owned()),
        Op::Jp => ("JP", format!("${imm16:04X}")),
        Op::JpHl => ("JP", "HL".to_owned()),
        Op::JpCond(cond) => ("JP", format!("{},${imm16:04X}", cond.name())),
        Op::Call => ("CALL", format!("${imm16:04X}")),
        Op::CallCond(cond) => ("CALL", format!("{},${imm16:04X}", cond.name())),
        Op::Rst(vector) => ("RST", format!("${vector:02X}")),
        Op::LdhImmA => ("LDH", format!("($FF{imm8:02X}),A")),
        Op::LdhAImm => ("LDH", format!("A,($FF{imm8:02X})")),
        Op::LdhCA => ("LD", "($FF00+C),A".to_owned()),
        Op::LdhAC => ("LD", "A,($FF00+C)".to_owned()),
        Op::LdAbsA => ("LD", format!("(${imm16:04X}),A")),
        Op::LdAAbs => ("LD", format!("A,(${imm16:04X})")),
        Op::AddSpImm => ("ADD", format!("SP,{}", signed(imm8))),
        Op::LdHlSpImm => ("LD", format!("HL,SP{}", signed(imm8))),
        Op::LdSpHl => ("LD", "SP,HL".to_owned()),
        Op::Rot(op, operand) => (op.mnemonic(), operand.name().to_owned()),
        Op::Bit(index, operand) => ("BIT", format!("{index},{}", operand.name())),
        Op::Res(index, operand) => ("RES", format!("{index},{}", operand.name())),
        Op::Set(index, operand) => ("SET", format!("{index},{}", operand.name())),
        Op::Prefix | Op::Illegal => ("DB", format!("${:02X}", byte(bytes, 0))),
    };
    let length = usize::from(entry.length);
    DisassemblyRow {
        address: pc,
        bytes: (0..length).map(|index| byte(bytes, index)).collect(),
        mnemonic: mnemonic.to_owned(),
        operands,
        is_illegal: entry.op == Op::Illegal,
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::disassemble;
    use crate::sm83::decoder::DispatchTable;

    #[rstest]
    #[case(&[0x80], "ADD", "A,B")]
    #[case(&[0x01, 0x34, 0x12], "LD", "BC,$1234")]
    #[case(&[0x18, 0xFE], "JR", "$0100")]
    #[case(&[0xE8, 0xF8], "ADD", "SP,-$08")]
    #[case(&[0xCB, 0x7E], "BIT", "7,(HL)")]
    #[case(&[0xE0, 0x0F], "LDH", "($FF0F),A")]
    fn formats_operands(#[case] bytes: &[u8], #[case] mnemonic: &str, #[case] operands: &str) {
        let row = disassemble(&DispatchTable::new(), 0x0100, bytes);
        assert_eq!(row.mnemonic, mnemonic);
        assert_eq!(row.operands, operands);
        assert_eq!(row.len(), bytes.len());
    }

    #[test]
    fn illegal_opcode_is_flagged() {
        let row = disassemble(&DispatchTable::new(), 0, &[0xD3, 0x00, 0x00]);
        assert!(row.is_illegal);
        assert_eq!(row.to_string(), "0000: D3       DB $D3");
    }
}
