//! Opcode decoding and the precomputed dispatch tables.
//!
//! Both pages are decoded once, from the `x/y/z` fields of the opcode, when
//! a core is built. Execution only indexes the tables.

/// 8-bit operand selected by a 3-bit field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum R8 {
    /// `B`.
    B,
    /// `C`.
    C,
    /// `D`.
    D,
    /// `E`.
    E,
    /// `H`.
    H,
    /// `L`.
    L,
    /// Memory at `HL`.
    HlInd,
    /// `A`.
    A,
}

impl R8 {
    const fn from_bits(bits: u8) -> Self {
        match bits & 7 {
            0 => Self::B,
            1 => Self::C,
            2 => Self::D,
            3 => Self::E,
            4 => Self::H,
            5 => Self::L,
            6 => Self::HlInd,
            _ => Self::A,
        }
    }

    /// Assembler spelling.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::B => "B",
            Self::C => "C",
            Self::D => "D",
            Self::E => "E",
            Self::H => "H",
            Self::L => "L",
            Self::HlInd => "(HL)",
            Self::A => "A",
        }
    }
}

/// Register pair for loads and arithmetic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum R16 {
    Bc,
    De,
    Hl,
    Sp,
}

impl R16 {
    const fn from_bits(bits: u8) -> Self {
        match bits & 3 {
            0 => Self::Bc,
            1 => Self::De,
            2 => Self::Hl,
            _ => Self::Sp,
        }
    }

    /// Assembler spelling.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Bc => "BC",
            Self::De => "DE",
            Self::Hl => "HL",
            Self::Sp => "SP",
        }
    }
}

/// Register pair for `PUSH`/`POP`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum R16Stack {
    Bc,
    De,
    Hl,
    Af,
}

impl R16Stack {
    const fn from_bits(bits: u8) -> Self {
        match bits & 3 {
            0 => Self::Bc,
            1 => Self::De,
            2 => Self::Hl,
            _ => Self::Af,
        }
    }

    /// Assembler spelling.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Bc => "BC",
            Self::De => "DE",
            Self::Hl => "HL",
            Self::Af => "AF",
        }
    }
}

/// Indirect pointer for `LD (rr),A` and `LD A,(rr)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum R16Mem {
    /// `(BC)`.
    Bc,
    /// `(DE)`.
    De,
    /// `(HL+)`.
    HlInc,
    /// `(HL-)`.
    HlDec,
}

impl R16Mem {
    const fn from_bits(bits: u8) -> Self {
        match bits & 3 {
            0 => Self::Bc,
            1 => Self::De,
            2 => Self::HlInc,
            _ => Self::HlDec,
        }
    }

    /// Assembler spelling.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Bc => "(BC)",
            Self::De => "(DE)",
            Self::HlInc => "(HL+)",
            Self::HlDec => "(HL-)",
        }
    }
}

/// Branch condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum Cond {
    Nz,
    Z,
    Nc,
    C,
}

impl Cond {
    const fn from_bits(bits: u8) -> Self {
        match bits & 3 {
            0 => Self::Nz,
            1 => Self::Z,
            2 => Self::Nc,
            _ => Self::C,
        }
    }

    /// Assembler spelling.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Nz => "NZ",
            Self::Z => "Z",
            Self::Nc => "NC",
            Self::C => "C",
        }
    }
}

/// Accumulator arithmetic/logic operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum AluOp {
    Add,
    Adc,
    Sub,
    Sbc,
    And,
    Xor,
    Or,
    Cp,
}

impl AluOp {
    const fn from_bits(bits: u8) -> Self {
        match bits & 7 {
            0 => Self::Add,
            1 => Self::Adc,
            2 => Self::Sub,
            3 => Self::Sbc,
            4 => Self::And,
            5 => Self::Xor,
            6 => Self::Or,
            _ => Self::Cp,
        }
    }

    /// Assembler mnemonic.
    #[must_use]
    pub const fn mnemonic(self) -> &'static str {
        match self {
            Self::Add => "ADD",
            Self::Adc => "ADC",
            Self::Sub => "SUB",
            Self::Sbc => "SBC",
            Self::And => "AND",
            Self::Xor => "XOR",
            Self::Or => "OR",
            Self::Cp => "CP",
        }
    }
}

/// `CB`-page rotate/shift operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum RotOp {
    Rlc,
    Rrc,
    Rl,
    Rr,
    Sla,
    Sra,
    Swap,
    Srl,
}

impl RotOp {
    const fn from_bits(bits: u8) -> Self {
        match bits & 7 {
            0 => Self::Rlc,
            1 => Self::Rrc,
            2 => Self::Rl,
            3 => Self::Rr,
            4 => Self::Sla,
            5 => Self::Sra,
            6 => Self::Swap,
            _ => Self::Srl,
        }
    }

    /// Assembler mnemonic.
    #[must_use]
    pub const fn mnemonic(self) -> &'static str {
        match self {
            Self::Rlc => "RLC",
            Self::Rrc => "RRC",
            Self::Rl => "RL",
            Self::Rr => "RR",
            Self::Sla => "SLA",
            Self::Sra => "SRA",
            Self::Swap => "SWAP",
            Self::Srl => "SRL",
        }
    }
}

/// Decoded operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum Op {
    Nop,
    Stop,
    Halt,
    Di,
    Ei,
    LdR16Imm(R16),
    LdIndA(R16Mem),
    LdAInd(R16Mem),
    LdImmSp,
    IncR16(R16),
    DecR16(R16),
    AddHl(R16),
    IncR8(R8),
    DecR8(R8),
    LdR8Imm(R8),
    Rlca,
    Rrca,
    Rla,
    Rra,
    Daa,
    Cpl,
    Scf,
    Ccf,
    Jr,
    JrCond(Cond),
    LdR8R8 { dst: R8, src: R8 },
    Alu(AluOp, R8),
    AluImm(AluOp),
    Ret,
    Reti,
    RetCond(Cond),
    Pop(R16Stack),
    Push(R16Stack),
    Jp,
    JpHl,
    JpCond(Cond),
    Call,
    CallCond(Cond),
    Rst(u8),
    LdhImmA,
    LdhAImm,
    LdhCA,
    LdhAC,
    LdAbsA,
    LdAAbs,
    AddSpImm,
    LdHlSpImm,
    LdSpHl,
    Prefix,
    Rot(RotOp, R8),
    Bit(u8, R8),
    Res(u8, R8),
    Set(u8, R8),
    Illegal,
}

/// Cycle cost of an entry, in clock cycles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Cost {
    /// Cost when a condition fails or for unconditional instructions.
    pub base: u8,
    /// Cost when a conditional branch is taken.
    pub taken: u8,
}

impl Cost {
    const fn fixed(cycles: u8) -> Self {
        Self {
            base: cycles,
            taken: cycles,
        }
    }

    const fn branch(not_taken: u8, taken: u8) -> Self {
        Self {
            base: not_taken,
            taken,
        }
    }
}

/// One dispatch-table slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Entry {
    /// Operation.
    pub op: Op,
    /// Encoded length in bytes, prefix included.
    pub length: u8,
    /// Cycle cost.
    pub cost: Cost,
}

impl Entry {
    const fn new(op: Op, length: u8, cost: Cost) -> Self {
        Self { op, length, cost }
    }
}

const fn with_hl(operand: R8, register: u8, memory: u8) -> u8 {
    if matches!(operand, R8::HlInd) {
        memory
    } else {
        register
    }
}

/// Decodes a main-page opcode.
#[must_use]
pub const fn decode_main(opcode: u8) -> Entry {
    let x = opcode >> 6;
    let y = (opcode >> 3) & 7;
    let z = opcode & 7;
    let p = y >> 1;
    let q = y & 1;
    match x {
        0 => match z {
            0 => match y {
                0 => Entry::new(Op::Nop, 1, Cost::fixed(4)),
                1 => Entry::new(Op::LdImmSp, 3, Cost::fixed(20)),
                2 => Entry::new(Op::Stop, 2, Cost::fixed(4)),
                3 => Entry::new(Op::Jr, 2, Cost::fixed(12)),
                _ => Entry::new(Op::JrCond(Cond::from_bits(y - 4)), 2, Cost::branch(8, 12)),
            },
            1 if q == 0 => Entry::new(Op::LdR16Imm(R16::from_bits(p)), 3, Cost::fixed(12)),
            1 => Entry::new(Op::AddHl(R16::from_bits(p)), 1, Cost::fixed(8)),
            2 if q == 0 => Entry::new(Op::LdIndA(R16Mem::from_bits(p)), 1, Cost::fixed(8)),
            2 => Entry::new(Op::LdAInd(R16Mem::from_bits(p)), 1, Cost::fixed(8)),
            3 if q == 0 => Entry::new(Op::IncR16(R16::from_bits(p)), 1, Cost::fixed(8)),
            3 => Entry::new(Op::DecR16(R16::from_bits(p)), 1, Cost::fixed(8)),
            4 => {
                let r = R8::from_bits(y);
                Entry::new(Op::IncR8(r), 1, Cost::fixed(with_hl(r, 4, 12)))
            }
            5 => {
                let r = R8::from_bits(y);
                Entry::new(Op::DecR8(r), 1, Cost::fixed(with_hl(r, 4, 12)))
            }
            6 => {
                let r = R8::from_bits(y);
                Entry::new(Op::LdR8Imm(r), 2, Cost::fixed(with_hl(r, 8, 12)))
            }
            _ => {
                let op = match y {
                    0 => Op::Rlca,
                    1 => Op::Rrca,
                    2 => Op::Rla,
                    3 => Op::Rra,
                    4 => Op::Daa,
                    5 => Op::Cpl,
                    6 => Op::Scf,
                    _ => Op::Ccf,
                };
                Entry::new(op, 1, Cost::fixed(4))
            }
        },
        1 => {
            if opcode == 0x76 {
                return Entry::new(Op::Halt, 1, Cost::fixed(4));
            }
            let dst = R8::from_bits(y);
            let src = R8::from_bits(z);
            let cycles = if matches!(dst, R8::HlInd) || matches!(src, R8::HlInd) {
                8
            } else {
                4
            };
            Entry::new(Op::LdR8R8 { dst, src }, 1, Cost::fixed(cycles))
        }
        2 => {
            let r = R8::from_bits(z);
            Entry::new(Op::Alu(AluOp::from_bits(y), r), 1, Cost::fixed(with_hl(r, 4, 8)))
        }
        _ => match z {
            0 => match y {
                0..=3 => Entry::new(Op::RetCond(Cond::from_bits(y)), 1, Cost::branch(8, 20)),
                4 => Entry::new(Op::LdhImmA, 2, Cost::fixed(12)),
                5 => Entry::new(Op::AddSpImm, 2, Cost::fixed(16)),
                6 => Entry::new(Op::LdhAImm, 2, Cost::fixed(12)),
                _ => Entry::new(Op::LdHlSpImm, 2, Cost::fixed(12)),
            },
            1 if q == 0 => Entry::new(Op::Pop(R16Stack::from_bits(p)), 1, Cost::fixed(12)),
            1 => match p {
                0 => Entry::new(Op::Ret, 1, Cost::fixed(16)),
                1 => Entry::new(Op::Reti, 1, Cost::fixed(16)),
                2 => Entry::new(Op::JpHl, 1, Cost::fixed(4)),
                _ => Entry::new(Op::LdSpHl, 1, Cost::fixed(8)),
            },
            2 => match y {
                0..=3 => Entry::new(Op::JpCond(Cond::from_bits(y)), 3, Cost::branch(12, 16)),
                4 => Entry::new(Op::LdhCA, 1, Cost::fixed(8)),
                5 => Entry::new(Op::LdAbsA, 3, Cost::fixed(16)),
                6 => Entry::new(Op::LdhAC, 1, Cost::fixed(8)),
                _ => Entry::new(Op::LdAAbs, 3, Cost::fixed(16)),
            },
            3 => match y {
                0 => Entry::new(Op::Jp, 3, Cost::fixed(16)),
                1 => Entry::new(Op::Prefix, 2, Cost::fixed(0)),
                6 => Entry::new(Op::Di, 1, Cost::fixed(4)),
                7 => Entry::new(Op::Ei, 1, Cost::fixed(4)),
                _ => Entry::new(Op::Illegal, 1, Cost::fixed(4)),
            },
            4 if y < 4 => Entry::new(Op::CallCond(Cond::from_bits(y)), 3, Cost::branch(12, 24)),
            5 if q == 0 => Entry::new(Op::Push(R16Stack::from_bits(p)), 1, Cost::fixed(16)),
            5 if p == 0 => Entry::new(Op::Call, 3, Cost::fixed(24)),
            4 | 5 => Entry::new(Op::Illegal, 1, Cost::fixed(4)),
            6 => Entry::new(Op::AluImm(AluOp::from_bits(y)), 2, Cost::fixed(8)),
            _ => Entry::new(Op::Rst(y * 8), 1, Cost::fixed(16)),
        },
    }
}

/// Decodes the byte following a `CB` prefix. Costs include the prefix.
#[must_use]
pub const fn decode_cb(opcode: u8) -> Entry {
    let y = (opcode >> 3) & 7;
    let r = R8::from_bits(opcode);
    match opcode >> 6 {
        0 => Entry::new(Op::Rot(RotOp::from_bits(y), r), 2, Cost::fixed(with_hl(r, 8, 16))),
        1 => Entry::new(Op::Bit(y, r), 2, Cost::fixed(with_hl(r, 8, 12))),
        2 => Entry::new(Op::Res(y, r), 2, Cost::fixed(with_hl(r, 8, 16))),
        _ => Entry::new(Op::Set(y, r), 2, Cost::fixed(with_hl(r, 8, 16))),
    }
}

/// Both opcode pages, decoded once.
#[derive(Debug, Clone)]
pub struct DispatchTable {
    main: [Entry; 256],
    cb: [Entry; 256],
}

impl Default for DispatchTable {
    fn default() -> Self {
        Self::new()
    }
}

impl DispatchTable {
    /// Builds both pages.
    #[must_use]
    pub fn new() -> Self {
        Self {
            main: std::array::from_fn(|index| decode_main(index as u8)),
            cb: std::array::from_fn(|index| decode_cb(index as u8)),
        }
    }

    /// Main-page entry.
    #[must_use]
    pub const fn main(&self, opcode: u8) -> Entry {
        self.main[opcode as usize]
    }

    /// `CB`-page entry.
    #[must_use]
    pub const fn cb(&self, opcode: u8) -> Entry {
        self.cb[opcode as usize]
    }
}
