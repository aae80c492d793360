//! Pure ALU helpers. Each returns the result together with the complete new
//! `F`; callers that preserve some flags pass the current `F` in.

use super::decoder::{AluOp, RotOp};
use super::registers::{FLAG_C, FLAG_H, FLAG_N, FLAG_Z};
use crate::flags::{flag_if, half_borrow_sub, half_carry_add, half_carry_add16};

/// `ADD`/`ADC`.
#[must_use]
pub const fn add(a: u8, b: u8, carry_in: bool) -> (u8, u8) {
    let sum = a as u16 + b as u16 + carry_in as u16;
    let value = sum as u8;
    let flags = flag_if(value == 0, FLAG_Z)
        | flag_if(half_carry_add(a, b, carry_in), FLAG_H)
        | flag_if(sum > 0xFF, FLAG_C);
    (value, flags)
}

/// `SUB`/`SBC`/`CP`.
#[must_use]
pub const fn sub(a: u8, b: u8, borrow_in: bool) -> (u8, u8) {
    let diff = a as i16 - b as i16 - borrow_in as i16;
    let value = diff as u8;
    let flags = FLAG_N
        | flag_if(value == 0, FLAG_Z)
        | flag_if(half_borrow_sub(a, b, borrow_in), FLAG_H)
        | flag_if(diff < 0, FLAG_C);
    (value, flags)
}

/// Applies an accumulator operation. `CP` leaves `a` unchanged.
#[must_use]
pub const fn alu(op: AluOp, a: u8, b: u8, flags: u8) -> (u8, u8) {
    let carry = flags & FLAG_C != 0;
    match op {
        AluOp::Add => add(a, b, false),
        AluOp::Adc => add(a, b, carry),
        AluOp::Sub => sub(a, b, false),
        AluOp::Sbc => sub(a, b, carry),
        AluOp::And => {
            let value = a & b;
            (value, FLAG_H | flag_if(value == 0, FLAG_Z))
        }
        AluOp::Xor => {
            let value = a ^ b;
            (value, flag_if(value == 0, FLAG_Z))
        }
        AluOp::Or => {
            let value = a | b;
            (value, flag_if(value == 0, FLAG_Z))
        }
        AluOp::Cp => (a, sub(a, b, false).1),
    }
}

/// 8-bit `INC`; `C` is preserved.
#[must_use]
pub const fn inc8(value: u8, flags: u8) -> (u8, u8) {
    let result = value.wrapping_add(1);
    let flags = (flags & FLAG_C)
        | flag_if(result == 0, FLAG_Z)
        | flag_if(result & 0x0F == 0, FLAG_H);
    (result, flags)
}

/// 8-bit `DEC`; `C` is preserved.
#[must_use]
pub const fn dec8(value: u8, flags: u8) -> (u8, u8) {
    let result = value.wrapping_sub(1);
    let flags = (flags & FLAG_C)
        | FLAG_N
        | flag_if(result == 0, FLAG_Z)
        | flag_if(result & 0x0F == 0x0F, FLAG_H);
    (result, flags)
}

/// `ADD HL,rr`; `Z` is preserved.
#[must_use]
pub const fn add16(hl: u16, operand: u16, flags: u8) -> (u16, u8) {
    let sum = hl as u32 + operand as u32;
    let flags = (flags & FLAG_Z)
        | flag_if(half_carry_add16(hl, operand), FLAG_H)
        | flag_if(sum > 0xFFFF, FLAG_C);
    (sum as u16, flags)
}

/// `ADD SP,e` and `LD HL,SP+e`: carries come from the low byte of an
/// unsigned add, `Z` and `N` are cleared.
#[must_use]
pub const fn add_sp(sp: u16, offset: u8) -> (u16, u8) {
    let low = sp as u8;
    let flags = flag_if(low as u16 + offset as u16 > 0xFF, FLAG_C)
        | flag_if(half_carry_add(low, offset, false), FLAG_H);
    (sp.wrapping_add(offset as i8 as i16 as u16), flags)
}

/// `CB`-page rotate/shift.
#[must_use]
pub const fn rotate(op: RotOp, value: u8, flags: u8) -> (u8, u8) {
    let carry_in = flags & FLAG_C != 0;
    let (result, carry_out) = match op {
        RotOp::Rlc => (value.rotate_left(1), value & 0x80 != 0),
        RotOp::Rrc => (value.rotate_right(1), value & 0x01 != 0),
        RotOp::Rl => ((value << 1) | carry_in as u8, value & 0x80 != 0),
        RotOp::Rr => ((value >> 1) | ((carry_in as u8) << 7), value & 0x01 != 0),
        RotOp::Sla => (value << 1, value & 0x80 != 0),
        RotOp::Sra => ((value >> 1) | (value & 0x80), value & 0x01 != 0),
        RotOp::Swap => (value.rotate_left(4), false),
        RotOp::Srl => (value >> 1, value & 0x01 != 0),
    };
    (
        result,
        flag_if(result == 0, FLAG_Z) | flag_if(carry_out, FLAG_C),
    )
}

/// Accumulator rotates (`RLCA`, `RRCA`, `RLA`, `RRA`) only report `C`.
#[must_use]
pub const fn rotate_a(op: RotOp, value: u8, flags: u8) -> (u8, u8) {
    let (result, new_flags) = rotate(op, value, flags);
    (result, new_flags & FLAG_C)
}

/// `BIT n,r`: `C` preserved, `H` set, `Z` from the tested bit.
#[must_use]
pub const fn bit(index: u8, value: u8, flags: u8) -> u8 {
    (flags & FLAG_C) | FLAG_H | flag_if(value & (1 << index) == 0, FLAG_Z)
}

/// `DAA`, including the way a borrow without half-borrow wraps.
#[must_use]
pub const fn daa(a: u8, flags: u8) -> (u8, u8) {
    let mut tmp = a as i32;
    if flags & FLAG_N == 0 {
        if flags & FLAG_H != 0 || tmp & 0x0F > 9 {
            tmp += 6;
        }
        if flags & FLAG_C != 0 || tmp > 0x9F {
            tmp += 0x60;
        }
    } else {
        if flags & FLAG_H != 0 {
            tmp -= 6;
            if flags & FLAG_C == 0 {
                tmp &= 0xFF;
            }
        }
        if flags & FLAG_C != 0 {
            tmp -= 0x60;
        }
    }
    let value = (tmp & 0xFF) as u8;
    let flags = (flags & !(FLAG_H | FLAG_Z))
        | flag_if(tmp & 0x100 != 0, FLAG_C)
        | flag_if(value == 0, FLAG_Z);
    (value, flags)
}
