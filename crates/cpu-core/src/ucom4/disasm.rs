use super::decoder::{DispatchTable, Op};
use crate::DisassemblyRow;

/// Formats the instruction at `pc`. `next` is the address following `pc`
/// in fetch order, used to resolve `JCP` targets.
pub(super) fn disassemble(table: &DispatchTable, pc: u16, next: u16, bytes: &[u8]) -> DisassemblyRow {
    let opcode = bytes.first().copied().unwrap_or(0);
    let arg = bytes.get(1).copied().unwrap_or(0);
    let entry = table.get(opcode);
    let operands = match entry.op {
        Op::Ldz(value) | Op::Li(value) => format!("${value:X}"),
        Op::Jmp(high) | Op::Cal(high) => format!("${:03X}", u16::from(high) << 8 | u16::from(arg)),
        Op::Czp(vector) => format!("${:03X}", u16::from(vector) << 2),
        Op::Jcp(low) => format!("${:03X}", (next & 0x7C0) | u16::from(low)),
        Op::Stm | Op::Ldi | Op::Cli | Op::Ci | Op::Ocd => format!("${arg:02X}"),
        Op::Fbf(n)
        | Op::Tab(n)
        | Op::Xm(n)
        | Op::Xmd(n)
        | Op::Cmb(n)
        | Op::Lm(n)
        | Op::Xmi(n)
        | Op::Tpb(n)
        | Op::Tpa(n)
        | Op::Tmb(n)
        | Op::Fbt(n)
        | Op::Rpb(n)
        | Op::Reb(n)
        | Op::Rmb(n)
        | Op::Rfb(n)
        | Op::Spb(n)
        | Op::Seb(n)
        | Op::Smb(n)
        | Op::Sfb(n) => n.to_string(),
        Op::Illegal => format!("${opcode:02X}"),
        _ => String::new(),
    };
    let mnemonic = if entry.op == Op::Illegal {
        "DB"
    } else {
        entry.op.mnemonic()
    };
    DisassemblyRow {
        address: u32::from(pc),
        bytes: bytes
            .iter()
            .copied()
            .chain(std::iter::repeat(0))
            .take(usize::from(entry.length))
            .collect(),
        mnemonic: mnemonic.to_owned(),
        operands,
        is_illegal: entry.op == Op::Illegal,
    }
}
