//! NEC uCOM-4 family core (uCOM-43 and uCOM-44 parts).
//!
//! The core reads opcodes from an 8-bit program space, keeps its 4-bit data
//! RAM in a data space and drives ports through an I/O space indexed by port
//! number (`A` = 0 .. `I` = 8). Cycles are machine cycles of four clocks.

use tracing::{debug, trace, warn};

use crate::memory::require_space;
use crate::state::find_entry;
use crate::{
    AddressSpace, ConfigError, CpuCore, Diagnostics, DisassemblyRow, ExecState, Fault,
    IllegalOpcodePolicy, InputLine, LineDescriptor, LineHandle, LineSink, NullLineSink,
    OutputLine, StateEntry, StateIndex, StepOutcome, Trigger, Ucom4Config, Ucom4Family,
    Ucom4Layout,
};

/// Opcode decoding and dispatch tables.
pub mod decoder;
mod disasm;
mod execute;
/// Register file.
pub mod registers;

use decoder::{DispatchTable, Op};
pub use registers::Registers;

/// Interrupt request input.
pub const INT: InputLine = InputLine(0);
/// Reset input; the core is held in reset while it is asserted.
pub const RESET: InputLine = InputLine(1);
/// Pulsed once per interrupt entry.
pub const IACK_OUT: OutputLine = OutputLine(0);

/// Address the interrupt entry jumps to.
pub const INTERRUPT_VECTOR: u16 = 0x03C;
const INTERRUPT_CYCLES: u32 = 1;
/// Upper bound of one idle step, in machine cycles.
const IDLE_CHUNK: u64 = 1024;

/// Program counter.
pub const STATE_PC: StateIndex = StateIndex(0);
/// Data pointer, low nibble.
pub const STATE_DPL: StateIndex = StateIndex(1);
/// Data pointer, high nibble.
pub const STATE_DPH: StateIndex = StateIndex(2);
/// Accumulator.
pub const STATE_ACC: StateIndex = StateIndex(3);
/// Carry flag.
pub const STATE_CARRY: StateIndex = StateIndex(4);
/// Carry-save flag.
pub const STATE_CARRY_SAVE: StateIndex = StateIndex(5);
/// Timer-out flag.
pub const STATE_TIMER: StateIndex = StateIndex(6);
/// Pending interrupt flag.
pub const STATE_INT: StateIndex = StateIndex(7);
/// Interrupt enable flag.
pub const STATE_INTE: StateIndex = StateIndex(8);
/// First call stack level; deeper levels follow.
pub const STATE_STACK0: StateIndex = StateIndex(9);
/// Last fetched opcode.
pub const STATE_OP: StateIndex = StateIndex(12);
/// Pending skip.
pub const STATE_SKIP: StateIndex = StateIndex(13);
/// Cycles left on the timer; 0 while it is stopped.
pub const STATE_TIMER_COUNT: StateIndex = StateIndex(14);

const STACK_SYMBOLS: [&str; 3] = ["STK0", "STK1", "STK2"];

// GENFLAGS packing, most significant first: INTE INT TIMER CS C.
const GENFLAG_INTE: u8 = 0x10;
const GENFLAG_INT: u8 = 0x08;
const GENFLAG_TIMER: u8 = 0x04;
const GENFLAG_CARRY_SAVE: u8 = 0x02;
const GENFLAG_CARRY: u8 = 0x01;

fn build_state_entries(layout: &Ucom4Layout) -> Vec<StateEntry> {
    let prg_bits = u32::from(layout.prg_width);
    let mut entries = vec![
        StateEntry::new(STATE_PC, "PC", prg_bits),
        StateEntry::new(STATE_DPL, "DPL", 4),
        StateEntry::new(STATE_DPH, "DPH", 4),
        StateEntry::new(STATE_ACC, "ACC", 4),
        StateEntry::new(STATE_CARRY, "C", 1),
        StateEntry::new(STATE_CARRY_SAVE, "CS", 1),
        StateEntry::new(STATE_TIMER, "TIMF", 1),
        StateEntry::new(STATE_INT, "INTF", 1),
        StateEntry::new(STATE_INTE, "INTE", 1),
    ];
    for (level, symbol) in STACK_SYMBOLS
        .iter()
        .enumerate()
        .take(usize::from(layout.stack_levels))
    {
        let index = StateIndex(STATE_STACK0.0 + level as i32);
        entries.push(StateEntry::new(index, symbol, prg_bits));
    }
    // SKIP goes last: restoring entries in order must not lose it to a PC write
    entries.extend([
        StateEntry::new(StateIndex::GENPC, "GENPC", prg_bits).noshow(),
        StateEntry::new(StateIndex::GENPCBASE, "CURPC", prg_bits).noshow(),
        StateEntry::new(StateIndex::GENFLAGS, "GENFLAGS", 5).noshow(),
        StateEntry::new(STATE_TIMER_COUNT, "TIMC", 12).noshow(),
        StateEntry::new(STATE_OP, "OP", 8).noshow(),
        StateEntry::new(STATE_SKIP, "SKIP", 1).noshow(),
    ]);
    entries
}

/// uCOM-4 interpreter.
pub struct Ucom4 {
    name: &'static str,
    regs: Registers,
    program: Box<dyn AddressSpace>,
    data: Box<dyn AddressSpace>,
    io: Box<dyn AddressSpace>,
    lines: LineHandle,
    line_table: [LineDescriptor; 2],
    outputs: Box<dyn LineSink>,
    table: DispatchTable,
    config: Ucom4Config,
    layout: Ucom4Layout,
    policy: IllegalOpcodePolicy,
    entries: Vec<StateEntry>,
    exec: ExecState,
    skip: bool,
    op: u8,
    arg: u8,
    prev_pc: u16,
    timer: Option<u32>,
    in_reset: bool,
    total_cycles: u64,
    diag: Diagnostics,
}

impl std::fmt::Debug for Ucom4 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ucom4")
            .field("name", &self.name)
            .field("regs", &self.regs)
            .field("exec", &self.exec)
            .field("skip", &self.skip)
            .field("total_cycles", &self.total_cycles)
            .finish_non_exhaustive()
    }
}

impl Ucom4 {
    /// Builds a core for `config.variant` and resets it.
    ///
    /// `program` needs 8-bit units and at least the part's program width,
    /// `data` 4-bit units and at least its RAM width, `io` 4-bit units
    /// addressed by port number.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for a zero clock, an invalid custom layout or
    /// a space of the wrong shape.
    pub fn new(
        config: Ucom4Config,
        program: Box<dyn AddressSpace>,
        data: Box<dyn AddressSpace>,
        io: Box<dyn AddressSpace>,
    ) -> Result<Self, ConfigError> {
        config.core.validate()?;
        let layout = config.variant.layout();
        layout.validate()?;
        require_space("program", program.config(), layout.prg_width, 8)?;
        require_space("data", data.config(), layout.data_width, 4)?;
        require_space("io", io.config(), 4, 4)?;
        let mut core = Self {
            name: config.variant.name(),
            regs: Registers::default(),
            program,
            data,
            io,
            lines: LineHandle::new(2),
            line_table: [
                LineDescriptor::new("INT", INT, config.int_trigger),
                LineDescriptor::new("RESET", RESET, Trigger::Level),
            ],
            outputs: Box::new(NullLineSink),
            table: DispatchTable::new(layout.family),
            config,
            layout,
            policy: config.core.policy_or(IllegalOpcodePolicy::Nop),
            entries: build_state_entries(&layout),
            exec: ExecState::Fetching,
            skip: false,
            op: 0,
            arg: 0,
            prev_pc: 0,
            timer: None,
            in_reset: false,
            total_cycles: 0,
            diag: Diagnostics::default(),
        };
        core.reset();
        Ok(core)
    }

    /// Replaces the sink that receives `IACK`.
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

    /// Geometry of the part.
    #[must_use]
    pub const fn layout(&self) -> Ucom4Layout {
        self.layout
    }

    /// Effective illegal-opcode policy.
    #[must_use]
    pub const fn policy(&self) -> IllegalOpcodePolicy {
        self.policy
    }

    /// Returns `true` when the next fetched opcode will be skipped.
    #[must_use]
    pub const fn skip_pending(&self) -> bool {
        self.skip
    }

    /// Machine cycles left on the `STM` timer, if it runs.
    #[must_use]
    pub const fn timer_remaining(&self) -> Option<u32> {
        self.timer
    }

    /// Program space the core was built with.
    pub fn program_space(&mut self) -> &mut dyn AddressSpace {
        self.program.as_mut()
    }

    /// Data space the core was built with.
    pub fn data_space(&mut self) -> &mut dyn AddressSpace {
        self.data.as_mut()
    }

    /// I/O space the core was built with.
    pub fn io_space(&mut self) -> &mut dyn AddressSpace {
        self.io.as_mut()
    }

    fn charge(&mut self, cycles: u32) {
        self.total_cycles = self.total_cycles.saturating_add(u64::from(cycles));
        self.tick_timer(cycles);
    }

    fn tick_timer(&mut self, cycles: u32) {
        if let Some(left) = self.timer {
            if left <= cycles {
                self.timer = None;
                self.regs.timer_f = true;
                trace!(core = self.name, "timer expired");
            } else {
                self.timer = Some(left - cycles);
            }
        }
    }

    fn drain_wait_states(&mut self) -> u32 {
        let cycles = self
            .program
            .take_wait_states()
            .saturating_add(self.data.take_wait_states())
            .saturating_add(self.io.take_wait_states());
        self.diag.record_wait_states(cycles);
        cycles
    }

    fn sample_reset(&mut self) -> bool {
        let held = self.lines.with(|latch| latch.sample(RESET, Trigger::Level));
        if held && !self.in_reset {
            self.reset();
            self.in_reset = true;
            self.exec = ExecState::Idle;
        } else if !held && self.in_reset {
            self.in_reset = false;
            self.exec = ExecState::Fetching;
            debug!(core = self.name, "reset released");
        }
        held
    }

    const fn interrupt_allowed(&self) -> bool {
        self.regs.int_f
            && self.regs.inte_f
            && self.op & 0xF0 != 0x90
            && self.op != 0x31
            && !self.skip
    }

    fn dispatch(&mut self) -> StepOutcome {
        self.exec = ExecState::ServicingInterrupt;
        self.lines.with(|latch| latch.acknowledge(INT));
        let levels = usize::from(self.layout.stack_levels);
        self.regs.push(levels, self.regs.pc);
        self.regs.pc = INTERRUPT_VECTOR & self.layout.prg_mask();
        self.regs.int_f = false;
        self.regs.inte_f = self.layout.family == Ucom4Family::Ucom44;
        self.outputs.set_output(IACK_OUT, true);
        self.outputs.set_output(IACK_OUT, false);
        let cycles = INTERRUPT_CYCLES + self.drain_wait_states();
        self.charge(cycles);
        self.diag.record_interrupt();
        self.exec = ExecState::Fetching;
        debug!(core = self.name, vector = INTERRUPT_VECTOR, "interrupt dispatched");
        StepOutcome::Interrupt {
            vector: u32::from(self.regs.pc),
            cycles,
        }
    }

    fn run_instruction(&mut self) -> Result<StepOutcome, Fault> {
        self.exec = ExecState::Executing;
        let pc = self.regs.pc;
        self.prev_pc = pc;
        let opcode = self.fetch();
        let entry = self.table.get(opcode);
        if entry.length == 2 {
            self.arg = self.fetch();
        }
        self.op = opcode;
        let illegal = !self.skip && entry.op == Op::Illegal;
        if illegal {
            self.diag.record_illegal(u32::from(pc), opcode);
            warn!(core = self.name, pc, opcode, policy = ?self.policy, "illegal opcode");
            if self.policy == IllegalOpcodePolicy::Fatal {
                let fault = Fault::IllegalOpcode {
                    pc: u32::from(pc),
                    opcode,
                };
                self.exec = ExecState::FaultLatched(fault);
                return Err(fault);
            }
        }
        // fetch cycles elapse before the operation runs
        let cycles = if self.skip {
            u32::from(entry.length)
        } else {
            u32::from(entry.cycles)
        };
        self.tick_timer(cycles);
        if self.skip {
            self.skip = false;
            self.op = 0;
        } else if !illegal {
            self.execute(entry.op);
        }
        self.exec = ExecState::Fetching;
        let waits = self.drain_wait_states();
        self.tick_timer(waits);
        let cycles = cycles + waits;
        self.total_cycles = self.total_cycles.saturating_add(u64::from(cycles));
        self.diag.record_instruction();
        trace!(core = self.name, pc, opcode, cycles, "retired");
        Ok(StepOutcome::Retired {
            pc: u32::from(pc),
            cycles,
        })
    }

    #[allow(clippy::cast_possible_truncation)]
    fn read_state(&self, index: StateIndex) -> Option<u64> {
        let regs = &self.regs;
        let value = match index {
            STATE_PC | StateIndex::GENPC => regs.pc,
            StateIndex::GENPCBASE => self.prev_pc,
            STATE_DPL => u16::from(regs.dpl),
            STATE_DPH => u16::from(regs.dph),
            STATE_ACC => u16::from(regs.acc),
            STATE_CARRY => u16::from(regs.carry),
            STATE_CARRY_SAVE => u16::from(regs.carry_save),
            STATE_TIMER => u16::from(regs.timer_f),
            STATE_INT => u16::from(regs.int_f),
            STATE_INTE => u16::from(regs.inte_f),
            STATE_OP => u16::from(self.op),
            STATE_SKIP => u16::from(self.skip),
            STATE_TIMER_COUNT => self.timer.map_or(0, |left| left as u16),
            StateIndex::GENFLAGS => u16::from(self.packed_flags()),
            StateIndex(level) if (STATE_STACK0.0..STATE_STACK0.0 + 3).contains(&level) => {
                regs.stack[(level - STATE_STACK0.0) as usize]
            }
            _ => return None,
        };
        Some(u64::from(value))
    }

    const fn packed_flags(&self) -> u8 {
        let regs = &self.regs;
        (if regs.inte_f { GENFLAG_INTE } else { 0 })
            | (if regs.int_f { GENFLAG_INT } else { 0 })
            | (if regs.timer_f { GENFLAG_TIMER } else { 0 })
            | (if regs.carry_save { GENFLAG_CARRY_SAVE } else { 0 })
            | (if regs.carry { GENFLAG_CARRY } else { 0 })
    }

    /// `GENFLAGS` as a debugger shows it, e.g. `EiTsC`.
    #[must_use]
    pub fn flags_string(&self) -> String {
        let flags = self.packed_flags();
        [
            (GENFLAG_INTE, 'E'),
            (GENFLAG_INT, 'I'),
            (GENFLAG_TIMER, 'T'),
            (GENFLAG_CARRY_SAVE, 'S'),
            (GENFLAG_CARRY, 'C'),
        ]
        .iter()
        .map(|&(bit, letter)| {
            if flags & bit != 0 {
                letter
            } else {
                letter.to_ascii_lowercase()
            }
        })
        .collect()
    }
}

impl CpuCore for Ucom4 {
    fn name(&self) -> &'static str {
        self.name
    }

    fn reset(&mut self) {
        self.regs.pc = 0;
        self.op = 0;
        self.prev_pc = 0;
        self.skip = false;
        self.timer = None;
        self.regs.int_f = false;
        self.regs.inte_f = self.layout.family == Ucom4Family::Ucom44;
        self.exec = ExecState::Fetching;
        self.diag.reset();
        self.lines.with(crate::LineLatch::discard_edges);
        for port in registers::PORT_C..=8 {
            if self.layout.ports.writable(port) {
                self.output(port, 0);
            }
        }
        self.drain_wait_states();
        debug!(core = self.name, "reset");
    }

    fn advance(&mut self, remaining: u64) -> Result<StepOutcome, Fault> {
        if let Some(fault) = self.exec.latched_fault() {
            return Err(fault);
        }
        if self.sample_reset() {
            let cycles = u32::try_from(remaining.clamp(1, IDLE_CHUNK)).unwrap_or(1);
            self.charge(cycles);
            return Ok(StepOutcome::Idle { cycles });
        }
        let trigger = self.line_table[0].trigger;
        if self.lines.with(|latch| latch.sample(INT, trigger)) {
            self.regs.int_f = true;
        }
        if self.interrupt_allowed() {
            return Ok(self.dispatch());
        }
        self.run_instruction()
    }

    fn input_lines(&self) -> &[LineDescriptor] {
        &self.line_table
    }

    fn line_handle(&self) -> LineHandle {
        self.lines.clone()
    }

    fn state_entries(&self) -> &[StateEntry] {
        &self.entries
    }

    fn state_get(&self, index: StateIndex) -> Option<u64> {
        let entry = find_entry(&self.entries, index)?;
        self.read_state(index).map(|value| entry.apply_mask(value))
    }

    #[allow(clippy::cast_possible_truncation)]
    fn state_set(&mut self, index: StateIndex, value: u64) -> Result<(), ConfigError> {
        let unknown = ConfigError::UnknownStateEntry {
            core: self.name,
            index: index.0,
        };
        let Some(entry) = find_entry(&self.entries, index) else {
            return Err(unknown);
        };
        let value = entry.apply_mask(value);
        let word = value as u16;
        let nibble = value as u8;
        let flag = value != 0;
        let regs = &mut self.regs;
        match index {
            STATE_PC | StateIndex::GENPC => {
                regs.pc = word;
                self.skip = false;
            }
            StateIndex::GENPCBASE => self.prev_pc = word,
            STATE_DPL => regs.set_dpl(nibble),
            STATE_DPH => regs.set_dph(nibble),
            STATE_ACC => regs.set_acc(nibble),
            STATE_CARRY => regs.set_carry(flag),
            STATE_CARRY_SAVE => regs.set_carry_save(flag),
            STATE_TIMER => regs.set_timer_flag(flag),
            STATE_INT => regs.set_int_flag(flag),
            STATE_INTE => regs.set_int_enable(flag),
            STATE_OP => self.op = nibble,
            STATE_SKIP => self.skip = flag,
            STATE_TIMER_COUNT => self.timer = (word != 0).then_some(u32::from(word)),
            StateIndex::GENFLAGS => {
                regs.set_int_enable(nibble & GENFLAG_INTE != 0);
                regs.set_int_flag(nibble & GENFLAG_INT != 0);
                regs.set_timer_flag(nibble & GENFLAG_TIMER != 0);
                regs.set_carry_save(nibble & GENFLAG_CARRY_SAVE != 0);
                regs.set_carry(nibble & GENFLAG_CARRY != 0);
            }
            StateIndex(level) if (STATE_STACK0.0..STATE_STACK0.0 + 3).contains(&level) => {
                regs.set_stack_entry((level - STATE_STACK0.0) as usize, word);
            }
            _ => return Err(unknown),
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
        4
    }

    fn max_instruction_bytes(&self) -> usize {
        2
    }

    #[allow(clippy::cast_possible_truncation)]
    fn next_pc(&self, pc: u32) -> u32 {
        let pc = (pc as u16) & self.layout.prg_mask();
        u32::from(self.next_address(pc))
    }

    #[allow(clippy::cast_possible_truncation)]
    fn disassemble(&self, pc: u32, bytes: &[u8]) -> DisassemblyRow {
        let pc = (pc as u16) & self.layout.prg_mask();
        disasm::disassemble(&self.table, pc, self.next_address(pc), bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::{Ucom4, IACK_OUT, INT, STATE_ACC, STATE_PC, STATE_SKIP};
    use crate::{
        AddressMap, CpuCore, IllegalOpcodePolicy, LineLevel, RecordingLineSink, SpaceConfig,
        StepOutcome, Ucom4Config, Ucom4Variant,
    };

    fn build(variant: Ucom4Variant, program: &[u8]) -> Ucom4 {
        let layout = variant.layout();
        let mut rom = AddressMap::new(SpaceConfig::new("program", layout.prg_width, 8))
            .expect("program map");
        rom.map_rom(0, program).expect("rom");
        let mut ram = AddressMap::new(SpaceConfig::new("data", layout.data_width, 4))
            .expect("data map");
        ram.map_ram(0, u32::from(layout.data_mask())).expect("ram");
        let io = AddressMap::new(SpaceConfig::new("io", 4, 4))
            .expect("io map")
            .with_unmapped_fill(0);
        Ucom4::new(
            Ucom4Config::new(variant),
            Box::new(rom),
            Box::new(ram),
            Box::new(io),
        )
        .expect("core")
    }

    #[test]
    fn reset_state_depends_on_family() {
        let ucom43 = build(Ucom4Variant::Upd553, &[0x00]);
        assert!(!ucom43.registers().int_enable());
        let ucom44 = build(Ucom4Variant::Upd552, &[0x00]);
        assert!(ucom44.registers().int_enable());
        assert_eq!(ucom44.name(), "uPD552");
    }

    #[test]
    fn pc_increment_stays_in_page() {
        // JMP $0FF, then NOP at $0FF wraps to $000.
        let mut program = vec![0xA0, 0xFF];
        program.resize(0x100, 0x00);
        let mut cpu = build(Ucom4Variant::Upd553, &program);
        assert_eq!(cpu.step(), Ok(StepOutcome::Retired { pc: 0, cycles: 2 }));
        assert_eq!(cpu.registers().pc(), 0x0FF);
        cpu.step().expect("nop");
        assert_eq!(cpu.registers().pc(), 0x000);
    }

    #[test]
    fn skip_turns_next_opcode_into_nop() {
        // LI 0; INC (A=1, no skip); LI 15; INC (A=0, skip); LI 5
        let mut cpu = build(Ucom4Variant::Upd553, &[0x90, 0x0D, 0x9F, 0x0D, 0x95, 0x00]);
        for _ in 0..4 {
            cpu.step().expect("step");
        }
        assert!(cpu.skip_pending());
        assert_eq!(cpu.state_get(STATE_SKIP), Some(1));
        assert_eq!(cpu.step(), Ok(StepOutcome::Retired { pc: 4, cycles: 1 }));
        assert_eq!(cpu.state_get(STATE_ACC), Some(0));
        assert_eq!(cpu.registers().pc(), 5);
    }

    #[test]
    fn call_and_return_cost_an_extra_cycle() {
        // CZP 1 -> $004: RT
        let mut cpu = build(Ucom4Variant::Upd553, &[0xB1, 0x00, 0x00, 0x00, 0x48]);
        assert_eq!(cpu.step().expect("czp").cycles(), 1);
        assert_eq!(cpu.registers().pc(), 0x004);
        assert_eq!(cpu.step().expect("rt").cycles(), 2);
        assert_eq!(cpu.registers().pc(), 0x001);
    }

    #[test]
    fn interrupt_waits_for_enable_and_li() {
        // EI; LI 1; NOP
        let sink = RecordingLineSink::new();
        let mut cpu =
            build(Ucom4Variant::Upd553, &[0x31, 0x91, 0x00]).with_line_sink(Box::new(sink.clone()));
        cpu.set_line(INT, LineLevel::Assert);
        cpu.step().expect("ei");
        assert!(cpu.registers().int_flag());
        // not right after EI
        assert!(matches!(cpu.step(), Ok(StepOutcome::Retired { pc: 1, .. })));
        // not right after LI
        assert!(matches!(cpu.step(), Ok(StepOutcome::Retired { pc: 2, .. })));
        assert_eq!(
            cpu.step(),
            Ok(StepOutcome::Interrupt {
                vector: 0x03C,
                cycles: 1
            })
        );
        assert!(!cpu.registers().int_enable());
        assert_eq!(cpu.registers().stack()[0], 3);
        assert_eq!(sink.events(), vec![(IACK_OUT, true), (IACK_OUT, false)]);
    }

    #[test]
    fn ports_c_and_d_read_back_outputs() {
        // OCD $5A; LDZ 2; IP
        let mut cpu = build(Ucom4Variant::Upd553, &[0x1E, 0x5A, 0x82, 0x32]);
        cpu.step().expect("ocd");
        assert_eq!(cpu.registers().port_out(3), 0x5);
        assert_eq!(cpu.registers().port_out(2), 0xA);
        cpu.step().expect("ldz");
        cpu.step().expect("ip");
        assert_eq!(cpu.registers().acc(), 0xA);
    }

    #[test]
    fn upd557l_masks_port_g() {
        // LI 15; LDZ 6; OP
        let mut cpu = build(Ucom4Variant::Upd557l, &[0x9F, 0x86, 0x0E]);
        for _ in 0..3 {
            cpu.step().expect("step");
        }
        assert_eq!(cpu.registers().port_out(6), 0x1);
    }

    #[test]
    fn stm_timer_sets_flag_after_expiry() {
        // STM $80 (63 cycles); then a loop of NOPs
        let mut program = vec![0x14, 0x80];
        program.resize(0x100, 0x00);
        let mut cpu = build(Ucom4Variant::Upd553, &program);
        cpu.step().expect("stm");
        assert_eq!(cpu.timer_remaining(), Some(63));
        cpu.execute_run(62).expect("run");
        assert!(!cpu.registers().timer_flag());
        cpu.step().expect("nop");
        assert!(cpu.registers().timer_flag());
        assert_eq!(cpu.timer_remaining(), None);
    }

    #[test]
    fn illegal_opcode_defaults_to_nop() {
        let mut cpu = build(Ucom4Variant::Upd553, &[0x1C, 0x00]);
        assert_eq!(cpu.policy(), IllegalOpcodePolicy::Nop);
        assert_eq!(cpu.step(), Ok(StepOutcome::Retired { pc: 0, cycles: 1 }));
        assert_eq!(cpu.diagnostics().illegal_opcodes, 1);
        assert_eq!(cpu.state_get(STATE_PC), Some(1));
    }

    #[test]
    fn extra_registers_live_at_top_of_ram() {
        // LI 9; TAW; LI 0; XAW
        let mut cpu = build(Ucom4Variant::Upd553, &[0x99, 0x43, 0x90, 0x4B]);
        for _ in 0..4 {
            cpu.step().expect("step");
        }
        assert_eq!(cpu.registers().acc(), 9);
        assert_eq!(cpu.data_space().read_byte(0x7F - 4), 0);
    }

    #[test]
    fn flags_string_uses_case_for_state() {
        let mut cpu = build(Ucom4Variant::Upd552, &[0x1B]);
        cpu.step().expect("stc");
        assert_eq!(cpu.flags_string(), "EitsC");
    }
}
