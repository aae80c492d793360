//! Sharp SM83 core, the CPU of the DMG.
//!
//! `IE` (`0xFFFF`) and `IF` (`0xFF0F`) live in the core and are intercepted
//! before the program space sees the access. Interrupt request lines latch
//! rising edges into `IF`; dispatch happens only at instruction boundaries.

use tracing::{debug, trace, warn};

use crate::memory::require_space;
use crate::state::find_entry;
use crate::{
    AddressSpace, ConfigError, CpuCore, Diagnostics, DisassemblyRow, ExecState, Fault,
    IllegalOpcodePolicy, InputLine, LineDescriptor, LineHandle, LineSink, NullLineSink,
    OutputLine, Sm83Config, StateEntry, StateIndex, StepOutcome, Trigger,
};

/// Flag, ALU and rotate helpers.
pub mod alu;
/// Opcode decoding and dispatch tables.
pub mod decoder;
mod disasm;
mod execute;
/// Register file.
pub mod registers;

use decoder::{DispatchTable, Op};
pub use registers::Registers;
use registers::INTERRUPT_MASK;

const NAME: &str = "sm83";

pub(super) const IE_ADDRESS: u16 = 0xFFFF;
pub(super) const IF_ADDRESS: u16 = 0xFF0F;

const INTERRUPT_CYCLES: u32 = 20;
const WAKE_CYCLES: u32 = 4;
/// Upper bound of one idle step, in clock cycles.
const IDLE_CHUNK: u64 = 4096;

/// Vertical blank request, `IF` bit 0.
pub const VBLANK: InputLine = InputLine(0);
/// LCD status request, `IF` bit 1.
pub const STAT: InputLine = InputLine(1);
/// Timer overflow request, `IF` bit 2.
pub const TIMER: InputLine = InputLine(2);
/// Serial transfer request, `IF` bit 3.
pub const SERIAL: InputLine = InputLine(3);
/// Joypad request, `IF` bit 4. Also wakes the core from `STOP`.
pub const JOYPAD: InputLine = InputLine(4);
/// Reset input; the core is held in reset while it is asserted.
pub const RESET: InputLine = InputLine(5);

/// Asserted while the core is halted or stopped.
pub const HALT_OUT: OutputLine = OutputLine(0);
/// Pulsed once per dispatched interrupt.
pub const IACK_OUT: OutputLine = OutputLine(1);

const LINES: &[LineDescriptor] = &[
    LineDescriptor::new("VBLANK", VBLANK, Trigger::Edge),
    LineDescriptor::new("STAT", STAT, Trigger::Edge),
    LineDescriptor::new("TIMER", TIMER, Trigger::Edge),
    LineDescriptor::new("SERIAL", SERIAL, Trigger::Edge),
    LineDescriptor::new("JOYPAD", JOYPAD, Trigger::Edge),
    LineDescriptor::new("RESET", RESET, Trigger::Level),
];

/// Program counter.
pub const STATE_PC: StateIndex = StateIndex(0);
/// Stack pointer.
pub const STATE_SP: StateIndex = StateIndex(1);
/// Accumulator.
pub const STATE_A: StateIndex = StateIndex(2);
/// Flags.
pub const STATE_F: StateIndex = StateIndex(3);
/// `B`.
pub const STATE_B: StateIndex = StateIndex(4);
/// `C`.
pub const STATE_C: StateIndex = StateIndex(5);
/// `D`.
pub const STATE_D: StateIndex = StateIndex(6);
/// `E`.
pub const STATE_E: StateIndex = StateIndex(7);
/// `H`.
pub const STATE_H: StateIndex = StateIndex(8);
/// `L`.
pub const STATE_L: StateIndex = StateIndex(9);
/// Interrupt master enable.
pub const STATE_IME: StateIndex = StateIndex(10);
/// Interrupt enable register.
pub const STATE_IE: StateIndex = StateIndex(11);
/// Interrupt request register.
pub const STATE_IF: StateIndex = StateIndex(12);
/// Last fetched opcode.
pub const STATE_OP: StateIndex = StateIndex(13);
/// Pending `EI` delay.
pub const STATE_EI_DELAY: StateIndex = StateIndex(14);
/// `AF` pair.
pub const STATE_AF: StateIndex = StateIndex(15);
/// `BC` pair.
pub const STATE_BC: StateIndex = StateIndex(16);
/// `DE` pair.
pub const STATE_DE: StateIndex = StateIndex(17);
/// `HL` pair.
pub const STATE_HL: StateIndex = StateIndex(18);
/// Halt latch, set by `HALT` and `STOP`.
pub const STATE_HALTED: StateIndex = StateIndex(19);
/// Halted by `STOP`; only a joypad request wakes the core.
pub const STATE_STOPPED: StateIndex = StateIndex(20);
/// Next fetch repeats its byte.
pub const STATE_HALT_BUG: StateIndex = StateIndex(21);

const STATE_ENTRIES: &[StateEntry] = &[
    StateEntry::new(STATE_PC, "PC", 16),
    StateEntry::new(STATE_SP, "SP", 16),
    StateEntry::new(STATE_A, "A", 8),
    StateEntry::new(STATE_F, "F", 8),
    StateEntry::new(STATE_B, "B", 8),
    StateEntry::new(STATE_C, "C", 8),
    StateEntry::new(STATE_D, "D", 8),
    StateEntry::new(STATE_E, "E", 8),
    StateEntry::new(STATE_H, "H", 8),
    StateEntry::new(STATE_L, "L", 8),
    StateEntry::new(STATE_IME, "IME", 1),
    StateEntry::new(STATE_IE, "IE", 8),
    StateEntry::new(STATE_IF, "IF", 8),
    StateEntry::new(STATE_OP, "OP", 8).noshow(),
    StateEntry::new(STATE_EI_DELAY, "EID", 1).noshow(),
    StateEntry::new(STATE_AF, "AF", 16).noshow(),
    StateEntry::new(STATE_BC, "BC", 16).noshow(),
    StateEntry::new(STATE_DE, "DE", 16).noshow(),
    StateEntry::new(STATE_HL, "HL", 16).noshow(),
    StateEntry::new(StateIndex::GENPC, "GENPC", 16).noshow(),
    StateEntry::new(StateIndex::GENPCBASE, "CURPC", 16).noshow(),
    StateEntry::new(StateIndex::GENSP, "GENSP", 16).noshow(),
    StateEntry::new(StateIndex::GENFLAGS, "GENFLAGS", 8).noshow(),
    // after the PC entries, which clear the halt bug
    StateEntry::new(STATE_HALTED, "HALT", 1).noshow(),
    StateEntry::new(STATE_STOPPED, "STOP", 1).noshow(),
    StateEntry::new(STATE_HALT_BUG, "HBUG", 1).noshow(),
];

/// SM83 interpreter.
pub struct Sm83 {
    regs: Registers,
    program: Box<dyn AddressSpace>,
    lines: LineHandle,
    outputs: Box<dyn LineSink>,
    table: DispatchTable,
    config: Sm83Config,
    policy: IllegalOpcodePolicy,
    exec: ExecState,
    stopped: bool,
    halt_bug: bool,
    ei_delay: bool,
    in_reset: bool,
    prev_pc: u16,
    opcode: u8,
    total_cycles: u64,
    diag: Diagnostics,
}

impl std::fmt::Debug for Sm83 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sm83")
            .field("regs", &self.regs)
            .field("exec", &self.exec)
            .field("policy", &self.policy)
            .field("total_cycles", &self.total_cycles)
            .finish_non_exhaustive()
    }
}

impl Sm83 {
    /// Builds a core over a 16-bit, 8-bit-wide program space and resets it.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the clock is zero or the space has the
    /// wrong shape.
    pub fn new(config: Sm83Config, program: Box<dyn AddressSpace>) -> Result<Self, ConfigError> {
        config.core.validate()?;
        require_space("program", program.config(), 16, 8)?;
        let mut core = Self {
            regs: Registers::default(),
            program,
            lines: LineHandle::new(LINES.len()),
            outputs: Box::new(NullLineSink),
            table: DispatchTable::new(),
            config,
            policy: config.core.policy_or(IllegalOpcodePolicy::Fatal),
            exec: ExecState::Fetching,
            stopped: false,
            halt_bug: false,
            ei_delay: false,
            in_reset: false,
            prev_pc: 0,
            opcode: 0,
            total_cycles: 0,
            diag: Diagnostics::default(),
        };
        core.reset();
        Ok(core)
    }

    /// Replaces the sink that receives `HALT` and `IACK`.
    #[must_use]
    pub fn with_line_sink(mut self, sink: Box<dyn LineSink>) -> Self {
        self.outputs = sink;
        self
    }

    /// Register file.
    #[must_use]
    pub const fn registers(&self) -> &Registers {
        &self.regs
    }

    /// Mutable register file, for hosts that poke state directly.
    pub fn registers_mut(&mut self) -> &mut Registers {
        &mut self.regs
    }

    /// Program space the core was built with.
    pub fn program_space(&mut self) -> &mut dyn AddressSpace {
        self.program.as_mut()
    }

    /// Effective illegal-opcode policy.
    #[must_use]
    pub const fn policy(&self) -> IllegalOpcodePolicy {
        self.policy
    }

    /// Returns `true` while the core sits in `STOP` rather than `HALT`.
    #[must_use]
    pub const fn is_stopped(&self) -> bool {
        self.stopped
    }

    pub(super) const fn pending_interrupts(&self) -> u8 {
        self.regs.ie & self.regs.iflag & INTERRUPT_MASK
    }

    pub(super) fn enter_halt(&mut self, stopped: bool) {
        self.exec = ExecState::Halted;
        self.stopped = stopped;
        self.outputs.set_output(HALT_OUT, true);
        debug!(core = NAME, pc = self.regs.pc, stopped, "halted");
    }

    fn wake(&mut self) {
        self.exec = ExecState::Fetching;
        self.stopped = false;
        self.outputs.set_output(HALT_OUT, false);
        debug!(core = NAME, pc = self.regs.pc, "woke up");
    }

    fn charge(&mut self, cycles: u32) {
        self.total_cycles = self.total_cycles.saturating_add(u64::from(cycles));
    }

    fn drain_wait_states(&mut self) -> u32 {
        let cycles = self.program.take_wait_states();
        self.diag.record_wait_states(cycles);
        cycles
    }

    fn idle(&mut self, remaining: u64) -> StepOutcome {
        let chunks = remaining.div_ceil(4).clamp(1, IDLE_CHUNK / 4);
        let cycles = u32::try_from(chunks * 4).unwrap_or(WAKE_CYCLES);
        self.charge(cycles);
        StepOutcome::Idle { cycles }
    }

    /// Tracks the reset line. Returns `true` while the core is held.
    fn sample_reset(&mut self) -> bool {
        let held = self.lines.with(|latch| latch.sample(RESET, Trigger::Level));
        if held && !self.in_reset {
            self.reset();
            self.in_reset = true;
            self.exec = ExecState::Idle;
        } else if !held && self.in_reset {
            self.in_reset = false;
            self.exec = ExecState::Fetching;
            debug!(core = NAME, "reset released");
        }
        held
    }

    /// Moves latched request edges into `IF` and returns the newly raised
    /// bits.
    fn latch_requests(&mut self) -> u8 {
        let raised = self.lines.with(|latch| {
            (0..5u8).fold(0, |bits, bit| {
                if latch.sample(InputLine(bit), Trigger::Edge) {
                    bits | (1 << bit)
                } else {
                    bits
                }
            })
        });
        self.regs.iflag |= raised;
        raised
    }

    fn dispatch(&mut self) -> Option<StepOutcome> {
        let pending = self.pending_interrupts();
        if !self.regs.ime || pending == 0 {
            return None;
        }
        let bit = pending.trailing_zeros() as u8;
        self.exec = ExecState::ServicingInterrupt;
        self.regs.ime = false;
        self.regs.iflag &= !(1 << bit);
        self.lines.with(|latch| latch.acknowledge(InputLine(bit)));
        let vector = 0x40 + 8 * u16::from(bit);
        self.prev_pc = self.regs.pc;
        self.push16(self.regs.pc);
        self.regs.pc = vector;
        self.outputs.set_output(IACK_OUT, true);
        self.outputs.set_output(IACK_OUT, false);
        let cycles = INTERRUPT_CYCLES + self.drain_wait_states();
        self.charge(cycles);
        self.diag.record_interrupt();
        self.exec = ExecState::Fetching;
        debug!(core = NAME, bit, vector, "interrupt dispatched");
        Some(StepOutcome::Interrupt {
            vector: u32::from(vector),
            cycles,
        })
    }

    fn run_instruction(&mut self) -> Result<StepOutcome, Fault> {
        let pc = self.regs.pc;
        self.prev_pc = pc;
        self.exec = ExecState::Executing;
        let opcode = self.read8(pc);
        if self.halt_bug {
            self.halt_bug = false;
        } else {
            self.regs.pc = pc.wrapping_add(1);
        }
        self.opcode = opcode;
        let entry = self.table.main(opcode);
        let cycles = if entry.op == Op::Illegal {
            self.diag.record_illegal(u32::from(pc), opcode);
            warn!(core = NAME, pc, opcode, policy = ?self.policy, "illegal opcode");
            if self.policy == IllegalOpcodePolicy::Fatal {
                let fault = Fault::IllegalOpcode {
                    pc: u32::from(pc),
                    opcode,
                };
                self.exec = ExecState::FaultLatched(fault);
                return Err(fault);
            }
            u32::from(entry.cost.base)
        } else {
            self.execute(entry)
        };
        if self.exec == ExecState::Executing {
            self.exec = ExecState::Fetching;
        }
        let cycles = cycles + self.drain_wait_states();
        self.charge(cycles);
        self.diag.record_instruction();
        trace!(core = NAME, pc, opcode, cycles, "retired");
        Ok(StepOutcome::Retired {
            pc: u32::from(pc),
            cycles,
        })
    }

    fn read_state(&self, index: StateIndex) -> Option<u64> {
        let regs = &self.regs;
        let value = match index {
            STATE_PC | StateIndex::GENPC => regs.pc,
            StateIndex::GENPCBASE => self.prev_pc,
            STATE_SP | StateIndex::GENSP => regs.sp,
            STATE_A => u16::from(regs.a),
            STATE_F | StateIndex::GENFLAGS => u16::from(regs.f),
            STATE_B => u16::from(regs.b),
            STATE_C => u16::from(regs.c),
            STATE_D => u16::from(regs.d),
            STATE_E => u16::from(regs.e),
            STATE_H => u16::from(regs.h),
            STATE_L => u16::from(regs.l),
            STATE_IME => u16::from(regs.ime),
            STATE_IE => u16::from(regs.ie),
            STATE_IF => u16::from(regs.iflag | 0xE0),
            STATE_OP => u16::from(self.opcode),
            STATE_EI_DELAY => u16::from(self.ei_delay),
            STATE_AF => regs.af(),
            STATE_BC => regs.bc(),
            STATE_DE => regs.de(),
            STATE_HL => regs.hl(),
            STATE_HALTED => u16::from(self.exec == ExecState::Halted),
            STATE_STOPPED => u16::from(self.stopped),
            STATE_HALT_BUG => u16::from(self.halt_bug),
            _ => return None,
        };
        Some(u64::from(value))
    }
}

impl CpuCore for Sm83 {
    fn name(&self) -> &'static str {
        NAME
    }

    fn reset(&mut self) {
        if self.exec == ExecState::Halted {
            self.outputs.set_output(HALT_OUT, false);
        }
        self.regs = if self.config.skip_boot {
            Registers::post_boot()
        } else {
            Registers::default()
        };
        self.exec = ExecState::Fetching;
        self.stopped = false;
        self.halt_bug = false;
        self.ei_delay = false;
        self.prev_pc = self.regs.pc;
        self.opcode = 0;
        self.diag.reset();
        self.lines.with(crate::LineLatch::discard_edges);
        debug!(core = NAME, pc = self.regs.pc, "reset");
    }

    fn advance(&mut self, remaining: u64) -> Result<StepOutcome, Fault> {
        if let Some(fault) = self.exec.latched_fault() {
            return Err(fault);
        }
        if self.sample_reset() {
            return Ok(self.idle(remaining));
        }
        let raised = self.latch_requests();
        if self.exec == ExecState::Halted {
            let wake = if self.stopped {
                raised & (1 << JOYPAD.0) != 0
            } else {
                self.pending_interrupts() != 0
            };
            if !wake {
                return Ok(self.idle(remaining));
            }
            self.wake();
            self.charge(WAKE_CYCLES);
            return Ok(StepOutcome::Idle {
                cycles: WAKE_CYCLES,
            });
        }
        if self.ei_delay {
            self.ei_delay = false;
        } else if let Some(outcome) = self.dispatch() {
            return Ok(outcome);
        }
        self.run_instruction()
    }

    fn input_lines(&self) -> &[LineDescriptor] {
        LINES
    }

    fn line_handle(&self) -> LineHandle {
        self.lines.clone()
    }

    fn state_entries(&self) -> &[StateEntry] {
        STATE_ENTRIES
    }

    fn state_get(&self, index: StateIndex) -> Option<u64> {
        let entry = find_entry(STATE_ENTRIES, index)?;
        self.read_state(index).map(|value| entry.apply_mask(value))
    }

    #[allow(clippy::cast_possible_truncation)]
    fn state_set(&mut self, index: StateIndex, value: u64) -> Result<(), ConfigError> {
        let entry = find_entry(STATE_ENTRIES, index).ok_or(ConfigError::UnknownStateEntry {
            core: NAME,
            index: index.0,
        })?;
        let value = entry.apply_mask(value);
        let byte = value as u8;
        let word = value as u16;
        let regs = &mut self.regs;
        match index {
            STATE_PC | StateIndex::GENPC => {
                regs.set_pc(word);
                self.halt_bug = false;
            }
            StateIndex::GENPCBASE => self.prev_pc = word,
            STATE_SP | StateIndex::GENSP => regs.set_sp(word),
            STATE_A => regs.set_a(byte),
            STATE_F | StateIndex::GENFLAGS => regs.set_f(byte),
            STATE_B => regs.set_b(byte),
            STATE_C => regs.set_c(byte),
            STATE_D => regs.set_d(byte),
            STATE_E => regs.set_e(byte),
            STATE_H => regs.set_h(byte),
            STATE_L => regs.set_l(byte),
            STATE_IME => regs.set_ime(value != 0),
            STATE_IE => regs.set_ie(byte),
            STATE_IF => regs.set_iflag(byte),
            STATE_OP => self.opcode = byte,
            STATE_EI_DELAY => self.ei_delay = value != 0,
            STATE_AF => regs.set_af(word),
            STATE_BC => regs.set_bc(word),
            STATE_DE => regs.set_de(word),
            STATE_HL => regs.set_hl(word),
            STATE_HALTED => {
                let halted = self.exec == ExecState::Halted;
                if value != 0 && !halted {
                    self.enter_halt(self.stopped);
                } else if value == 0 && halted {
                    self.wake();
                }
            }
            STATE_STOPPED => self.stopped = value != 0,
            STATE_HALT_BUG => self.halt_bug = value != 0,
            _ => {
                return Err(ConfigError::UnknownStateEntry {
                    core: NAME,
                    index: index.0,
                })
            }
        }
        Ok(())
    }

    fn exec_state(&self) -> ExecState {
        self.exec
    }

    fn total_cycles(&self) -> u64 {
        self.total_cycles
    }

    fn diagnostics(&self) -> &Diagnostics {
        &self.diag
    }

    fn clock_hz(&self) -> u64 {
        self.config.core.clock_hz
    }

    fn clocks_per_cycle(&self) -> u32 {
        1
    }

    fn max_instruction_bytes(&self) -> usize {
        3
    }

    fn next_pc(&self, pc: u32) -> u32 {
        pc.wrapping_add(1) & 0xFFFF
    }

    fn disassemble(&self, pc: u32, bytes: &[u8]) -> DisassemblyRow {
        disasm::disassemble(&self.table, pc & 0xFFFF, bytes)
    }
}
