//! Instruction handlers and the bus helpers they share.

use tracing::warn;

use super::decoder::Op;
use super::registers::{PORT_A, PORT_C, PORT_D, PORT_E};
use super::Ucom4;

/// uCOM-43 registers kept at the top of data RAM, by offset from the last
/// RAM address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub(super) enum ExtraRegister {
    X = 0,
    Y = 1,
    R = 2,
    S = 3,
    W = 4,
    Z = 5,
    F = 6,
}

impl Ucom4 {
    pub(super) fn increment_pc(&mut self) {
        self.regs.pc = self.next_address(self.regs.pc);
    }

    /// Address after `pc`: only the low eight bits count, the field bits
    /// above them never carry.
    pub(super) const fn next_address(&self, pc: u16) -> u16 {
        ((pc & !0xFF) | (pc.wrapping_add(1) & 0xFF)) & self.layout.prg_mask()
    }

    pub(super) fn fetch(&mut self) -> u8 {
        let value = self.program.read_byte(u32::from(self.regs.pc));
        self.increment_pc();
        value
    }

    fn ram_address(&self) -> u32 {
        u32::from(self.regs.data_pointer() & self.layout.data_mask())
    }

    fn ram_read(&mut self) -> u8 {
        let address = self.ram_address();
        self.data.read_byte(address) & 0xF
    }

    fn ram_write(&mut self, value: u8) {
        let address = self.ram_address();
        self.data.write_byte(address, value & 0xF);
    }

    fn extra_address(&self, register: ExtraRegister) -> u32 {
        u32::from(self.layout.data_mask() - register as u8)
    }

    pub(super) fn extra_read(&mut self, register: ExtraRegister) -> u8 {
        let address = self.extra_address(register);
        self.data.read_byte(address) & 0xF
    }

    pub(super) fn extra_write(&mut self, register: ExtraRegister, value: u8) {
        let address = self.extra_address(register);
        self.data.write_byte(address, value & 0xF);
    }

    /// Reads a port. Ports that are also outputs read back their latch ORed
    /// into the pins.
    pub(super) fn input(&mut self, port: u8) -> u8 {
        let port = port & 0xF;
        let ports = self.layout.ports;
        if !ports.readable(port) {
            warn!(
                core = self.name,
                port = %port_name(port),
                pc = self.prev_pc,
                "read from unknown port"
            );
            return 0;
        }
        let mut value = self.io.read_byte(u32::from(port));
        if ports.writable(port) {
            value |= self.regs.port_out(port);
        }
        value & 0xF
    }

    /// Drives a port and latches the value that reached the pins.
    pub(super) fn output(&mut self, port: u8, value: u8) {
        let port = port & 0xF;
        let ports = self.layout.ports;
        if !ports.writable(port) {
            warn!(
                core = self.name,
                port = %port_name(port),
                value,
                pc = self.prev_pc,
                "write to unknown port"
            );
            return;
        }
        let value = value & 0xF & ports.output_mask(port);
        self.io.write_byte(u32::from(port), value);
        self.regs.port_out[usize::from(port)] = value;
    }

    fn push(&mut self) {
        let levels = usize::from(self.layout.stack_levels);
        self.regs.push(levels, self.regs.pc);
    }

    fn pop(&mut self) {
        let levels = usize::from(self.layout.stack_levels);
        self.regs.pc = self.regs.pop(levels) & self.layout.prg_mask();
    }

    fn exchange_ram(&mut self, dph_xor: u8) {
        let old = self.regs.acc;
        self.regs.acc = self.ram_read();
        self.ram_write(old);
        self.regs.dph = (self.regs.dph ^ dph_xor) & 0xF;
    }

    fn add_with_carry(&mut self) {
        let sum = self.ram_read() + self.regs.acc + u8::from(self.regs.carry);
        self.regs.carry = sum & 0x10 != 0;
        self.regs.acc = sum & 0xF;
    }

    fn exchange_extra(&mut self, register: ExtraRegister, value: u8) -> u8 {
        let old = self.extra_read(register);
        self.extra_write(register, value);
        old
    }

    /// Runs one decoded operation. The opcode and its argument byte have
    /// already been fetched. Illegal entries are filtered out by the caller.
    #[allow(clippy::too_many_lines)]
    pub(super) fn execute(&mut self, op: Op) {
        let arg = self.arg;
        match op {
            Op::Nop | Op::Illegal => {}

            // loads and data pointer
            Op::Ldz(low) => {
                self.regs.dph = 0;
                self.regs.dpl = low;
            }
            Op::Li(value) => self.regs.acc = value,
            Op::Ldi => {
                self.regs.dph = (arg >> 4) & self.layout.dph_mask();
                self.regs.dpl = arg & 0xF;
            }
            Op::Lm(dph_xor) => {
                self.regs.acc = self.ram_read();
                self.regs.dph = (self.regs.dph ^ dph_xor) & 0xF;
            }
            Op::S => self.ram_write(self.regs.acc),
            Op::Tal => self.regs.dpl = self.regs.acc,
            Op::Tla => self.regs.acc = self.regs.dpl,
            Op::Xm(dph_xor) => self.exchange_ram(dph_xor),
            Op::Xmi(dph_xor) => {
                self.exchange_ram(dph_xor);
                self.regs.dpl = (self.regs.dpl + 1) & 0xF;
                self.skip = self.regs.dpl == 0;
            }
            Op::Xmd(dph_xor) => {
                self.exchange_ram(dph_xor);
                self.regs.dpl = self.regs.dpl.wrapping_sub(1) & 0xF;
                self.skip = self.regs.dpl == 0xF;
            }

            // arithmetic
            Op::Ad => {
                let sum = self.ram_read() + self.regs.acc;
                self.skip = sum & 0x10 != 0;
                self.regs.acc = sum & 0xF;
            }
            Op::Adc => self.add_with_carry(),
            Op::Ads => {
                self.add_with_carry();
                self.skip = self.regs.carry;
            }
            Op::Daa => self.regs.acc = (self.regs.acc + 6) & 0xF,
            Op::Das => self.regs.acc = (self.regs.acc + 10) & 0xF,
            Op::Exl => {
                let value = self.ram_read();
                self.regs.acc ^= value;
            }
            Op::Cma => self.regs.acc ^= 0xF,
            Op::Cia => self.regs.acc = ((self.regs.acc ^ 0xF) + 1) & 0xF,
            Op::Rar => {
                let carry_out = self.regs.acc & 1 != 0;
                self.regs.acc = (self.regs.acc >> 1) | (u8::from(self.regs.carry) << 3);
                self.regs.carry = carry_out;
            }

            // carry
            Op::Clc => self.regs.carry = false,
            Op::Stc => self.regs.carry = true,
            Op::Tc => self.skip = self.regs.carry,
            Op::Xc => std::mem::swap(&mut self.regs.carry, &mut self.regs.carry_save),

            // increment and decrement
            Op::Inc => {
                self.regs.acc = (self.regs.acc + 1) & 0xF;
                self.skip = self.regs.acc == 0;
            }
            Op::Dec => {
                self.regs.acc = self.regs.acc.wrapping_sub(1) & 0xF;
                self.skip = self.regs.acc == 0xF;
            }
            Op::Ind => {
                self.regs.dpl = (self.regs.dpl + 1) & 0xF;
                self.skip = self.regs.dpl == 0;
            }
            Op::Ded => {
                self.regs.dpl = self.regs.dpl.wrapping_sub(1) & 0xF;
                self.skip = self.regs.dpl == 0xF;
            }
            Op::Inm => {
                let value = (self.ram_read() + 1) & 0xF;
                self.ram_write(value);
                self.skip = value == 0;
            }
            Op::Dem => {
                let value = self.ram_read().wrapping_sub(1) & 0xF;
                self.ram_write(value);
                self.skip = value == 0xF;
            }

            // bit manipulation
            Op::Rmb(bit) => {
                let value = self.ram_read() & !(1 << bit);
                self.ram_write(value);
            }
            Op::Smb(bit) => {
                let value = self.ram_read() | (1 << bit);
                self.ram_write(value);
            }
            Op::Reb(bit) => self.output(PORT_E, self.regs.port_out(PORT_E) & !(1 << bit)),
            Op::Seb(bit) => self.output(PORT_E, self.regs.port_out(PORT_E) | (1 << bit)),
            Op::Rpb(bit) => {
                let port = self.regs.dpl;
                self.output(port, self.regs.port_out(port) & !(1 << bit));
            }
            Op::Spb(bit) => {
                let port = self.regs.dpl;
                self.output(port, self.regs.port_out(port) | (1 << bit));
            }

            // jumps, calls and returns
            Op::Jmp(high) => {
                self.regs.pc = (u16::from(high) << 8 | u16::from(arg)) & self.layout.prg_mask();
            }
            Op::Cal(high) => {
                self.push();
                self.regs.pc = (u16::from(high) << 8 | u16::from(arg)) & self.layout.prg_mask();
            }
            Op::Jcp(low) => {
                self.regs.pc = ((self.regs.pc & 0x7C0) | u16::from(low)) & self.layout.prg_mask();
            }
            Op::Jpa => {
                self.regs.pc =
                    ((self.regs.pc & 0x7C0) | u16::from(self.regs.acc) << 2) & self.layout.prg_mask();
            }
            Op::Czp(vector) => {
                self.push();
                self.regs.pc = u16::from(vector) << 2;
            }
            Op::Rt => self.pop(),
            Op::Rts => {
                self.pop();
                self.skip = true;
            }

            // comparisons and tests
            Op::Ci => {
                self.skip = self.regs.acc == arg & 0xF;
                if arg & 0xF0 != 0xC0 {
                    warn!(core = self.name, arg, pc = self.prev_pc, "CI with unexpected argument");
                }
            }
            Op::Cm => {
                let value = self.ram_read();
                self.skip = self.regs.acc == value;
            }
            Op::Cmb(bit) => {
                let mask = 1 << bit;
                let value = self.ram_read();
                self.skip = self.regs.acc & mask == value & mask;
            }
            Op::Tab(bit) => self.skip = self.regs.acc & (1 << bit) != 0,
            Op::Cli => {
                self.skip = self.regs.dpl == arg & 0xF;
                if arg & 0xF0 != 0xE0 {
                    warn!(core = self.name, arg, pc = self.prev_pc, "CLI with unexpected argument");
                }
            }
            Op::Tmb(bit) => self.skip = self.ram_read() & (1 << bit) != 0,
            Op::Tpa(bit) => self.skip = self.input(PORT_A) & (1 << bit) != 0,
            Op::Tpb(bit) => {
                let port = self.regs.dpl;
                self.skip = self.input(port) & (1 << bit) != 0;
            }
            Op::Tit => {
                self.skip = self.regs.int_f;
                self.regs.int_f = false;
            }

            // input and output
            Op::Ia => self.regs.acc = self.input(PORT_A),
            Op::Ip => {
                let port = self.regs.dpl;
                self.regs.acc = self.input(port);
            }
            Op::Oe => self.output(PORT_E, self.regs.acc),
            Op::Op => {
                let port = self.regs.dpl;
                self.output(port, self.regs.acc);
            }
            Op::Ocd => {
                self.output(PORT_D, arg >> 4);
                self.output(PORT_C, arg & 0xF);
            }

            // uCOM-43 extension set
            Op::Taw => self.extra_write(ExtraRegister::W, self.regs.acc),
            Op::Taz => self.extra_write(ExtraRegister::Z, self.regs.acc),
            Op::Thx => self.extra_write(ExtraRegister::X, self.regs.dph),
            Op::Tly => self.extra_write(ExtraRegister::Y, self.regs.dpl),
            Op::Xaw => self.regs.acc = self.exchange_extra(ExtraRegister::W, self.regs.acc),
            Op::Xaz => self.regs.acc = self.exchange_extra(ExtraRegister::Z, self.regs.acc),
            Op::Xhr => self.regs.dph = self.exchange_extra(ExtraRegister::R, self.regs.dph),
            Op::Xhx => self.regs.dph = self.exchange_extra(ExtraRegister::X, self.regs.dph),
            Op::Xls => self.regs.dpl = self.exchange_extra(ExtraRegister::S, self.regs.dpl),
            Op::Xly => self.regs.dpl = self.exchange_extra(ExtraRegister::Y, self.regs.dpl),
            Op::Sfb(bit) => {
                let value = self.extra_read(ExtraRegister::F) | (1 << bit);
                self.extra_write(ExtraRegister::F, value);
            }
            Op::Rfb(bit) => {
                let value = self.extra_read(ExtraRegister::F) & !(1 << bit);
                self.extra_write(ExtraRegister::F, value);
            }
            Op::Fbt(bit) => self.skip = self.extra_read(ExtraRegister::F) & (1 << bit) != 0,
            Op::Fbf(bit) => self.skip = self.extra_read(ExtraRegister::F) & (1 << bit) == 0,
            Op::Stm => {
                self.regs.timer_f = false;
                self.timer = Some((u32::from(arg & 0x3F) + 1) * 63);
                if arg & 0xC0 != 0x80 {
                    warn!(core = self.name, arg, pc = self.prev_pc, "STM with unexpected argument");
                }
            }
            Op::Ttm => self.skip = self.regs.timer_f,
            Op::Ei => self.regs.inte_f = true,
            Op::Di => self.regs.inte_f = false,
        }
    }
}

/// Port letter for logs.
pub(super) fn port_name(port: u8) -> char {
    char::from(b'A' + (port & 0xF))
}
