//! SM83 integration suite: whole programs, line handling and bus timing.

#![allow(clippy::pedantic, clippy::nursery, clippy::cast_possible_truncation)]

use cpu_core::sm83::registers::{FLAG_C, FLAG_Z};
use cpu_core::sm83::{self, STATE_F, STATE_SP};
use cpu_core::{
    disassemble_range, AddressMap, CpuCore, ExecState, IllegalOpcodePolicy, LineLevel,
    RecordingLineSink, Sm83, Sm83Config, SpaceConfig, StepOutcome,
};
use proptest as _;
use rstest::rstest;
#[cfg(feature = "serde")]
use serde as _;
use thiserror as _;
use tracing as _;
use tracing_subscriber as _;

fn ram_with(program: &[u8]) -> AddressMap {
    let mut map = AddressMap::new(SpaceConfig::new("program", 16, 8)).expect("map");
    map.map_ram(0x0000, 0xFFFE).expect("ram");
    map.load(0x0000, program);
    map
}

fn boot(program: &[u8]) -> Sm83 {
    Sm83::new(Sm83Config::default(), Box::new(ram_with(program))).expect("core")
}

fn run_until_halted(cpu: &mut Sm83, limit: usize) {
    for _ in 0..limit {
        if cpu.exec_state() == ExecState::Halted {
            return;
        }
        cpu.step().expect("step");
    }
    panic!("core never halted");
}

#[test]
fn countdown_loop_sums_and_counts_cycles() {
    // LD A,0; LD B,5; loop: ADD A,B; DEC B; JR NZ,loop; HALT
    let mut cpu = boot(&[0x3E, 0x00, 0x06, 0x05, 0x80, 0x05, 0x20, 0xFC, 0x76]);
    run_until_halted(&mut cpu, 64);
    assert_eq!(cpu.registers().a(), 15);
    assert_eq!(cpu.registers().b(), 0);
    assert_eq!(cpu.total_cycles(), 116);
    assert_eq!(cpu.diagnostics().instructions, 18);
}

#[test]
fn pop_af_drops_low_flag_bits() {
    // LD SP,$D000; LD BC,$12FF; PUSH BC; POP AF
    let mut cpu = boot(&[0x31, 0x00, 0xD0, 0x01, 0xFF, 0x12, 0xC5, 0xF1]);
    for _ in 0..4 {
        cpu.step().expect("step");
    }
    assert_eq!(cpu.registers().a(), 0x12);
    assert_eq!(cpu.state_get(STATE_F), Some(0xF0));
    assert_eq!(cpu.state_get(STATE_SP), Some(0xD000));
}

#[test]
fn prefixed_ops_charge_prefix_inclusive_costs() {
    // LD A,$F0; SWAP A; BIT 7,A
    let mut cpu = boot(&[0x3E, 0xF0, 0xCB, 0x37, 0xCB, 0x7F]);
    cpu.step().expect("ld");
    assert_eq!(cpu.step().expect("swap").cycles(), 8);
    assert_eq!(cpu.registers().a(), 0x0F);
    assert_eq!(cpu.registers().f(), 0x00);
    assert_eq!(cpu.step().expect("bit").cycles(), 8);
    assert_eq!(cpu.registers().f(), 0xA0);
    assert_eq!(cpu.registers().pc(), 6);
}

#[test]
fn daa_adjusts_bcd_sum() {
    // LD A,$19; ADD A,$28; DAA
    let mut cpu = boot(&[0x3E, 0x19, 0xC6, 0x28, 0x27]);
    cpu.step().expect("ld");
    cpu.step().expect("add");
    assert_eq!(cpu.registers().a(), 0x41);
    assert_eq!(cpu.registers().f(), 0x20);
    cpu.step().expect("daa");
    assert_eq!(cpu.registers().a(), 0x47);
    assert_eq!(cpu.registers().f(), 0x00);
}

#[rstest]
#[case::jp_nz_taken(0xC2, 0x00, 16)]
#[case::jp_nz_not_taken(0xC2, 0x80, 12)]
#[case::call_z_taken(0xCC, 0x80, 24)]
#[case::call_z_not_taken(0xCC, 0x00, 12)]
#[case::ret_z_taken(0xC8, 0x80, 20)]
#[case::ret_z_not_taken(0xC8, 0x00, 8)]
fn conditional_branches_cost_more_when_taken(
    #[case] opcode: u8,
    #[case] flags: u64,
    #[case] cycles: u32,
) {
    let mut cpu = boot(&[opcode, 0x00, 0x10]);
    cpu.state_set(STATE_SP, 0xD000).expect("sp");
    cpu.state_set(STATE_F, flags).expect("f");
    assert_eq!(cpu.step().expect("branch").cycles(), cycles);
}

#[test]
fn reti_returns_and_reenables_interrupts() {
    // EI; NOP; NOP ... $0040: RETI
    let mut program = vec![0xFB, 0x00, 0x00, 0x00];
    program.resize(0x40, 0x00);
    program.push(0xD9);
    let mut cpu = boot(&program);
    cpu.registers_mut().set_sp(0xD000);
    cpu.registers_mut().set_ie(0x01);
    cpu.set_line(sm83::VBLANK, LineLevel::Assert);
    cpu.step().expect("ei");
    cpu.step().expect("delayed nop");
    assert_eq!(
        cpu.step().expect("dispatch"),
        StepOutcome::Interrupt {
            vector: 0x40,
            cycles: 20
        }
    );
    assert_eq!(
        cpu.step().expect("reti"),
        StepOutcome::Retired {
            pc: 0x40,
            cycles: 16
        }
    );
    assert_eq!(cpu.registers().pc(), 2);
    assert!(cpu.registers().ime());
    assert_eq!(cpu.diagnostics().interrupts, 1);
}

#[test]
fn stop_only_wakes_on_joypad() {
    let sink = RecordingLineSink::new();
    // STOP 0; NOP
    let mut cpu = boot(&[0x10, 0x00, 0x00]).with_line_sink(Box::new(sink.clone()));
    cpu.step().expect("stop");
    assert!(cpu.is_stopped());
    assert_eq!(cpu.exec_state(), ExecState::Halted);

    cpu.set_line(sm83::VBLANK, LineLevel::Assert);
    assert_eq!(cpu.step().expect("idle"), StepOutcome::Idle { cycles: 4 });
    assert!(cpu.is_stopped());

    cpu.set_line(sm83::JOYPAD, LineLevel::Assert);
    assert_eq!(cpu.step().expect("wake"), StepOutcome::Idle { cycles: 4 });
    assert!(!cpu.is_stopped());
    assert_eq!(
        cpu.step().expect("nop"),
        StepOutcome::Retired { pc: 2, cycles: 4 }
    );
    assert_eq!(
        sink.events(),
        vec![(sm83::HALT_OUT, true), (sm83::HALT_OUT, false)]
    );
}

#[test]
fn halted_core_idles_in_whole_machine_cycles() {
    let mut cpu = boot(&[0x76]);
    cpu.step().expect("halt");
    assert_eq!(cpu.advance(10), Ok(StepOutcome::Idle { cycles: 12 }));
    assert_eq!(cpu.advance(100_000), Ok(StepOutcome::Idle { cycles: 4096 }));
    let run = cpu.execute_run(1000).expect("run");
    assert_eq!(run.cycles, 1000);
    assert_eq!(run.instructions, 0);
    assert_eq!(run.state, ExecState::Halted);
}

#[test]
fn reset_line_holds_core_until_released() {
    let mut cpu = boot(&[0x3C, 0x3C, 0x3C]);
    cpu.step().expect("inc");
    cpu.step().expect("inc");
    assert_eq!(cpu.registers().a(), 2);

    let reset = cpu.resolve_input_line("reset").expect("line");
    cpu.set_line(reset, LineLevel::Assert);
    assert!(matches!(cpu.step(), Ok(StepOutcome::Idle { .. })));
    assert_eq!(cpu.exec_state(), ExecState::Idle);
    assert_eq!(cpu.registers().pc(), 0);
    assert!(matches!(cpu.step(), Ok(StepOutcome::Idle { .. })));

    cpu.set_line(reset, LineLevel::Clear);
    assert_eq!(
        cpu.step().expect("inc"),
        StepOutcome::Retired { pc: 0, cycles: 4 }
    );
    assert_eq!(cpu.registers().a(), 1);
    assert!(cpu.total_cycles() > 12);
}

#[test]
fn wait_states_are_charged_per_access() {
    let mut map = ram_with(&[0x00, 0xFA, 0x00, 0xC0]);
    assert!(map.set_wait_states(0x0000, 2));
    let mut cpu = Sm83::new(Sm83Config::default(), Box::new(map)).expect("core");
    assert_eq!(cpu.step().expect("nop").cycles(), 6);
    // LD A,($C000): four accesses
    assert_eq!(cpu.step().expect("ld").cycles(), 24);
    assert_eq!(cpu.diagnostics().wait_states, 10);
}

#[test]
fn lenient_policy_counts_every_hole() {
    let config = Sm83Config {
        core: Sm83Config::default()
            .core
            .with_illegal_opcode_policy(IllegalOpcodePolicy::Nop),
        ..Sm83Config::default()
    };
    let holes = [0xD3, 0xDB, 0xDD, 0xE3, 0xE4, 0xEB, 0xEC, 0xED, 0xF4, 0xFC, 0xFD];
    let mut cpu = Sm83::new(config, Box::new(ram_with(&holes))).expect("core");
    for _ in 0..holes.len() {
        cpu.step().expect("hole");
    }
    assert_eq!(cpu.diagnostics().illegal_opcodes, holes.len() as u64);
    assert_eq!(cpu.registers().pc(), holes.len() as u16);
    let last = cpu.diagnostics().last_illegal.expect("recorded");
    assert_eq!((last.pc, last.opcode), (10, 0xFD));
}

#[test]
fn listing_matches_program_layout() {
    let program = [0x3E, 0x0F, 0x06, 0x01, 0x80, 0x76];
    let map = ram_with(&program);
    let cpu = boot(&program);
    let listing: Vec<String> = disassemble_range(&cpu, 0, 4, |address| map.peek(address))
        .iter()
        .map(ToString::to_string)
        .collect();
    assert_eq!(
        listing,
        vec![
            "0000: 3E 0F    LD A,$0F",
            "0002: 06 01    LD B,$01",
            "0004: 80       ADD A,B",
            "0005: 76       HALT",
        ]
    );
}

#[rstest]
#[case::inc_r(&[0x04], FLAG_C)]
#[case::dec_r(&[0x05], FLAG_C)]
#[case::add_hl_rr(&[0x09], FLAG_Z)]
#[case::bit(&[0xCB, 0x47], FLAG_C)]
#[case::scf(&[0x37], FLAG_Z)]
#[case::ccf(&[0x3F], FLAG_Z)]
#[case::cpl(&[0x2F], FLAG_Z | FLAG_C)]
fn undefined_flags_survive(
    #[case] program: &[u8],
    #[case] kept: u8,
    #[values(0xF0, 0x00)] preset: u8,
) {
    let mut cpu = boot(program);
    cpu.state_set(STATE_F, u64::from(preset)).expect("f");
    cpu.step().expect("step");
    let flags = cpu.state_get(STATE_F).expect("f") as u8;
    assert_eq!(flags & kept, preset & kept, "flags {flags:#04x}");
}
