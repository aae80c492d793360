//! Instruction handlers.
//!
//! Every handler issues its bus cycles in the order the part does. Operand
//! fetches advance `PC` as they happen, so relative jumps and pushed return
//! addresses see the address of the following instruction.

#![allow(clippy::cast_possible_wrap, clippy::cast_sign_loss)]

use super::alu;
use super::decoder::{Cond, Entry, Op, R16Mem, R16Stack, RotOp, R16, R8};
use super::registers::{FLAG_C, FLAG_H, FLAG_N, FLAG_Z};
use super::{Sm83, IE_ADDRESS, IF_ADDRESS};

impl Sm83 {
    pub(super) fn read8(&mut self, address: u16) -> u8 {
        match address {
            IE_ADDRESS => self.regs.ie,
            IF_ADDRESS => self.regs.iflag | 0xE0,
            _ => self.program.read_byte(u32::from(address)),
        }
    }

    pub(super) fn write8(&mut self, address: u16, value: u8) {
        match address {
            IE_ADDRESS => self.regs.set_ie(value),
            IF_ADDRESS => self.regs.set_iflag(value),
            _ => self.program.write_byte(u32::from(address), value),
        }
    }

    fn fetch8(&mut self) -> u8 {
        let value = self.read8(self.regs.pc);
        self.regs.pc = self.regs.pc.wrapping_add(1);
        value
    }

    fn fetch16(&mut self) -> u16 {
        let low = self.fetch8();
        let high = self.fetch8();
        u16::from_le_bytes([low, high])
    }

    pub(super) fn push16(&mut self, value: u16) {
        let [low, high] = value.to_le_bytes();
        self.regs.sp = self.regs.sp.wrapping_sub(1);
        self.write8(self.regs.sp, high);
        self.regs.sp = self.regs.sp.wrapping_sub(1);
        self.write8(self.regs.sp, low);
    }

    fn pop16(&mut self) -> u16 {
        let low = self.read8(self.regs.sp);
        self.regs.sp = self.regs.sp.wrapping_add(1);
        let high = self.read8(self.regs.sp);
        self.regs.sp = self.regs.sp.wrapping_add(1);
        u16::from_le_bytes([low, high])
    }

    fn get_r8(&mut self, operand: R8) -> u8 {
        match operand {
            R8::B => self.regs.b,
            R8::C => self.regs.c,
            R8::D => self.regs.d,
            R8::E => self.regs.e,
            R8::H => self.regs.h,
            R8::L => self.regs.l,
            R8::HlInd => self.read8(self.regs.hl()),
            R8::A => self.regs.a,
        }
    }

    fn set_r8(&mut self, operand: R8, value: u8) {
        match operand {
            R8::B => self.regs.b = value,
            R8::C => self.regs.c = value,
            R8::D => self.regs.d = value,
            R8::E => self.regs.e = value,
            R8::H => self.regs.h = value,
            R8::L => self.regs.l = value,
            R8::HlInd => self.write8(self.regs.hl(), value),
            R8::A => self.regs.a = value,
        }
    }

    const fn get_r16(&self, pair: R16) -> u16 {
        match pair {
            R16::Bc => self.regs.bc(),
            R16::De => self.regs.de(),
            R16::Hl => self.regs.hl(),
            R16::Sp => self.regs.sp,
        }
    }

    fn set_r16(&mut self, pair: R16, value: u16) {
        match pair {
            R16::Bc => self.regs.set_bc(value),
            R16::De => self.regs.set_de(value),
            R16::Hl => self.regs.set_hl(value),
            R16::Sp => self.regs.sp = value,
        }
    }

    fn indirect_address(&mut self, pointer: R16Mem) -> u16 {
        match pointer {
            R16Mem::Bc => self.regs.bc(),
            R16Mem::De => self.regs.de(),
            R16Mem::HlInc => {
                let hl = self.regs.hl();
                self.regs.set_hl(hl.wrapping_add(1));
                hl
            }
            R16Mem::HlDec => {
                let hl = self.regs.hl();
                self.regs.set_hl(hl.wrapping_sub(1));
                hl
            }
        }
    }

    const fn condition(&self, cond: Cond) -> bool {
        match cond {
            Cond::Nz => !self.regs.flag(FLAG_Z),
            Cond::Z => self.regs.flag(FLAG_Z),
            Cond::Nc => !self.regs.flag(FLAG_C),
            Cond::C => self.regs.flag(FLAG_C),
        }
    }

    fn update(&mut self, value: u8, flags: u8) {
        self.regs.a = value;
        self.regs.set_f(flags);
    }

    fn jump_relative(&mut self, offset: u8) {
        self.regs.pc = self.regs.pc.wrapping_add(offset as i8 as u16);
    }

    /// Runs one decoded entry whose opcode byte was already fetched and
    /// returns its cost in clock cycles. Illegal entries are filtered out by
    /// the caller.
    pub(super) fn execute(&mut self, entry: Entry) -> u32 {
        let mut taken = false;
        match entry.op {
            Op::Nop | Op::Illegal => {}
            Op::Stop => {
                self.fetch8();
                self.enter_halt(true);
            }
            Op::Halt => {
                if !self.regs.ime && self.pending_interrupts() != 0 {
                    self.halt_bug = true;
                } else {
                    self.enter_halt(false);
                }
            }
            Op::Di => {
                self.regs.ime = false;
                self.ei_delay = false;
            }
            Op::Ei => {
                self.regs.ime = true;
                self.ei_delay = true;
            }
            Op::LdR16Imm(pair) => {
                let value = self.fetch16();
                self.set_r16(pair, value);
            }
            Op::LdIndA(pointer) => {
                let address = self.indirect_address(pointer);
                self.write8(address, self.regs.a);
            }
            Op::LdAInd(pointer) => {
                let address = self.indirect_address(pointer);
                self.regs.a = self.read8(address);
            }
            Op::LdImmSp => {
                let address = self.fetch16();
                let [low, high] = self.regs.sp.to_le_bytes();
                self.write8(address, low);
                self.write8(address.wrapping_add(1), high);
            }
            Op::IncR16(pair) => self.set_r16(pair, self.get_r16(pair).wrapping_add(1)),
            Op::DecR16(pair) => self.set_r16(pair, self.get_r16(pair).wrapping_sub(1)),
            Op::AddHl(pair) => {
                let (value, flags) = alu::add16(self.regs.hl(), self.get_r16(pair), self.regs.f);
                self.regs.set_hl(value);
                self.regs.set_f(flags);
            }
            Op::IncR8(operand) => {
                let value = self.get_r8(operand);
                let (value, flags) = alu::inc8(value, self.regs.f);
                self.set_r8(operand, value);
                self.regs.set_f(flags);
            }
            Op::DecR8(operand) => {
                let value = self.get_r8(operand);
                let (value, flags) = alu::dec8(value, self.regs.f);
                self.set_r8(operand, value);
                self.regs.set_f(flags);
            }
            Op::LdR8Imm(operand) => {
                let value = self.fetch8();
                self.set_r8(operand, value);
            }
            Op::Rlca => self.rotate_accumulator(RotOp::Rlc),
            Op::Rrca => self.rotate_accumulator(RotOp::Rrc),
            Op::Rla => self.rotate_accumulator(RotOp::Rl),
            Op::Rra => self.rotate_accumulator(RotOp::Rr),
            Op::Daa => {
                let (value, flags) = alu::daa(self.regs.a, self.regs.f);
                self.update(value, flags);
            }
            Op::Cpl => {
                let flags = self.regs.f | FLAG_N | FLAG_H;
                self.update(!self.regs.a, flags);
            }
            Op::Scf => self.regs.set_f((self.regs.f & FLAG_Z) | FLAG_C),
            Op::Ccf => self.regs.set_f((self.regs.f & (FLAG_Z | FLAG_C)) ^ FLAG_C),
            Op::Jr => {
                let offset = self.fetch8();
                self.jump_relative(offset);
            }
            Op::JrCond(cond) => {
                let offset = self.fetch8();
                taken = self.condition(cond);
                if taken {
                    self.jump_relative(offset);
                }
            }
            Op::LdR8R8 { dst, src } => {
                let value = self.get_r8(src);
                self.set_r8(dst, value);
            }
            Op::Alu(op, operand) => {
                let value = self.get_r8(operand);
                let (value, flags) = alu::alu(op, self.regs.a, value, self.regs.f);
                self.update(value, flags);
            }
            Op::AluImm(op) => {
                let value = self.fetch8();
                let (value, flags) = alu::alu(op, self.regs.a, value, self.regs.f);
                self.update(value, flags);
            }
            Op::Ret => self.regs.pc = self.pop16(),
            Op::Reti => {
                self.regs.pc = self.pop16();
                self.regs.ime = true;
            }
            Op::RetCond(cond) => {
                taken = self.condition(cond);
                if taken {
                    self.regs.pc = self.pop16();
                }
            }
            Op::Pop(pair) => {
                let value = self.pop16();
                match pair {
                    R16Stack::Bc => self.regs.set_bc(value),
                    R16Stack::De => self.regs.set_de(value),
                    R16Stack::Hl => self.regs.set_hl(value),
                    R16Stack::Af => self.regs.set_af(value),
                }
            }
            Op::Push(pair) => {
                let value = match pair {
                    R16Stack::Bc => self.regs.bc(),
                    R16Stack::De => self.regs.de(),
                    R16Stack::Hl => self.regs.hl(),
                    R16Stack::Af => self.regs.af(),
                };
                self.push16(value);
            }
            Op::Jp => self.regs.pc = self.fetch16(),
            Op::JpHl => self.regs.pc = self.regs.hl(),
            Op::JpCond(cond) => {
                let target = self.fetch16();
                taken = self.condition(cond);
                if taken {
                    self.regs.pc = target;
                }
            }
            Op::Call => {
                let target = self.fetch16();
                self.push16(self.regs.pc);
                self.regs.pc = target;
            }
            Op::CallCond(cond) => {
                let target = self.fetch16();
                taken = self.condition(cond);
                if taken {
                    self.push16(self.regs.pc);
                    self.regs.pc = target;
                }
            }
            Op::Rst(vector) => {
                self.push16(self.regs.pc);
                self.regs.pc = u16::from(vector);
            }
            Op::LdhImmA => {
                let offset = self.fetch8();
                self.write8(0xFF00 | u16::from(offset), self.regs.a);
            }
            Op::LdhAImm => {
                let offset = self.fetch8();
                self.regs.a = self.read8(0xFF00 | u16::from(offset));
            }
            Op::LdhCA => self.write8(0xFF00 | u16::from(self.regs.c), self.regs.a),
            Op::LdhAC => self.regs.a = self.read8(0xFF00 | u16::from(self.regs.c)),
            Op::LdAbsA => {
                let address = self.fetch16();
                self.write8(address, self.regs.a);
            }
            Op::LdAAbs => {
                let address = self.fetch16();
                self.regs.a = self.read8(address);
            }
            Op::AddSpImm => {
                let offset = self.fetch8();
                let (value, flags) = alu::add_sp(self.regs.sp, offset);
                self.regs.sp = value;
                self.regs.set_f(flags);
            }
            Op::LdHlSpImm => {
                let offset = self.fetch8();
                let (value, flags) = alu::add_sp(self.regs.sp, offset);
                self.regs.set_hl(value);
                self.regs.set_f(flags);
            }
            Op::LdSpHl => self.regs.sp = self.regs.hl(),
            Op::Prefix => {
                let opcode = self.fetch8();
                return self.execute(self.table.cb(opcode));
            }
            Op::Rot(op, operand) => {
                let value = self.get_r8(operand);
                let (value, flags) = alu::rotate(op, value, self.regs.f);
                self.set_r8(operand, value);
                self.regs.set_f(flags);
            }
            Op::Bit(index, operand) => {
                let value = self.get_r8(operand);
                self.regs.set_f(alu::bit(index, value, self.regs.f));
            }
            Op::Res(index, operand) => {
                let value = self.get_r8(operand);
                self.set_r8(operand, value & !(1 << index));
            }
            Op::Set(index, operand) => {
                let value = self.get_r8(operand);
                self.set_r8(operand, value | (1 << index));
            }
        }
        u32::from(if taken {
            entry.cost.taken
        } else {
            entry.cost.base
        })
    }

    fn rotate_accumulator(&mut self, op: RotOp) {
        let (value, flags) = alu::rotate_a(op, self.regs.a, self.regs.f);
        self.update(value, flags);
    }
}
