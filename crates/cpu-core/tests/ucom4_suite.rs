//! uCOM-4 integration suite: RAM loops, ports, interrupts, timer and stack.

#![allow(clippy::pedantic, clippy::nursery, clippy::cast_possible_truncation)]

use std::cell::RefCell;
use std::rc::Rc;

use cpu_core::ucom4::{self, Ucom4, STATE_TIMER_COUNT};
use cpu_core::{
    disassemble_range, AddressMap, CpuCore, ExecState, Fault, IllegalOpcodePolicy, LineLevel,
    RecordingLineSink, SpaceConfig, StateIndex, StepOutcome, Trigger, Ucom4Config, Ucom4Variant,
};
use proptest as _;
use rstest::rstest;
#[cfg(feature = "serde")]
use serde as _;
use thiserror as _;
use tracing as _;
use tracing_subscriber as _;

/// Pins seen by the core and every port write it made.
#[derive(Clone, Default)]
struct Pins {
    inputs: Rc<RefCell<[u8; 16]>>,
    writes: Rc<RefCell<Vec<(u32, u8)>>>,
}

fn program_image(variant: Ucom4Variant, program: &[u8]) -> Vec<u8> {
    let size = 1usize << variant.layout().prg_width;
    let mut image = vec![0x00; size];
    image[..program.len()].copy_from_slice(program);
    image
}

fn build_with(config: Ucom4Config, image: &[u8], pins: &Pins) -> Ucom4 {
    let layout = config.variant.layout();
    let mut rom = AddressMap::new(SpaceConfig::new("program", layout.prg_width, 8)).expect("rom");
    rom.map_rom(0, image).expect("image");
    let mut ram = AddressMap::new(SpaceConfig::new("data", layout.data_width, 4)).expect("ram");
    ram.map_ram(0, u32::from(layout.data_mask())).expect("cells");
    let mut io = AddressMap::new(SpaceConfig::new("io", 4, 4)).expect("io");
    let inputs = Rc::clone(&pins.inputs);
    let writes = Rc::clone(&pins.writes);
    io.map_device(
        0,
        15,
        Box::new(move |port| inputs.borrow()[port as usize]),
        Box::new(move |port, value| writes.borrow_mut().push((port, value))),
    )
    .expect("ports");
    Ucom4::new(config, Box::new(rom), Box::new(ram), Box::new(io)).expect("core")
}

fn build(variant: Ucom4Variant, program: &[u8]) -> (Ucom4, Pins) {
    let pins = Pins::default();
    let core = build_with(
        Ucom4Config::new(variant),
        &program_image(variant, program),
        &pins,
    );
    pins.writes.borrow_mut().clear();
    (core, pins)
}

#[test]
fn reset_clears_output_ports() {
    let pins = Pins::default();
    let core = build_with(
        Ucom4Config::new(Ucom4Variant::Upd553),
        &program_image(Ucom4Variant::Upd553, &[]),
        &pins,
    );
    let ports: Vec<u32> = pins.writes.borrow().iter().map(|&(port, _)| port).collect();
    assert_eq!(ports, vec![2, 3, 4, 5, 6, 7, 8]);
    assert!(pins.writes.borrow().iter().all(|&(_, value)| value == 0));
    assert_eq!(core.registers().pc(), 0);
}

#[test]
fn xmi_loop_fills_a_ram_row() {
    // LDI $10; loop: LI 7; XMI 0; JCP loop; NOP
    let (mut cpu, _) = build(Ucom4Variant::Upd553, &[0x15, 0x10, 0x97, 0x3C, 0xC2, 0x00]);
    for _ in 0..49 {
        cpu.step().expect("step");
    }
    assert_eq!(cpu.registers().pc(), 5);
    assert_eq!(cpu.total_cycles(), 50);
    for address in 0x10..0x20 {
        assert_eq!(cpu.data_space().read_byte(address), 7, "cell {address:#x}");
    }
    assert_eq!(cpu.data_space().read_byte(0x20), 0);
}

#[test]
fn ports_follow_the_pins() {
    // IA; TPA 3; LI 10; OE; SEB 0; REB 3
    let (mut cpu, pins) = build(Ucom4Variant::Upd553, &[0x40, 0x57, 0x9A, 0x44, 0x74, 0x67]);
    pins.inputs.borrow_mut()[0] = 0x9;
    cpu.step().expect("ia");
    assert_eq!(cpu.registers().acc(), 0x9);
    cpu.step().expect("tpa");
    assert!(cpu.skip_pending());
    cpu.step().expect("skipped li");
    assert_eq!(cpu.registers().acc(), 0x9);
    cpu.step().expect("oe");
    cpu.step().expect("seb");
    cpu.step().expect("reb");
    assert_eq!(*pins.writes.borrow(), vec![(4, 0x9), (4, 0x9), (4, 0x1)]);
    assert_eq!(cpu.registers().port_out(ucom4::registers::PORT_E), 0x1);
}

#[test]
fn level_triggered_int_on_ucom44_keeps_interrupts_enabled() {
    let sink = RecordingLineSink::new();
    let config = Ucom4Config {
        int_trigger: Trigger::Level,
        ..Ucom4Config::new(Ucom4Variant::Upd552)
    };
    let pins = Pins::default();
    let mut cpu = build_with(
        config,
        &program_image(Ucom4Variant::Upd552, &[0x00, 0x00]),
        &pins,
    )
    .with_line_sink(Box::new(sink.clone()));
    cpu.step().expect("nop");
    cpu.set_line(ucom4::INT, LineLevel::Hold);
    assert_eq!(
        cpu.step(),
        Ok(StepOutcome::Interrupt {
            vector: 0x03C,
            cycles: 1
        })
    );
    assert!(cpu.registers().int_enable());
    assert_eq!(cpu.registers().stack()[0], 1);
    assert_eq!(cpu.line_handle().level(ucom4::INT), LineLevel::Clear);
    assert!(matches!(
        cpu.step(),
        Ok(StepOutcome::Retired { pc: 0x03C, .. })
    ));
    assert_eq!(
        sink.events(),
        vec![(ucom4::IACK_OUT, true), (ucom4::IACK_OUT, false)]
    );
}

#[test]
fn tit_consumes_pending_interrupt() {
    // TIT; LI 1; NOP
    let (mut cpu, _) = build(Ucom4Variant::Upd553, &[0x03, 0x91, 0x00]);
    cpu.set_line(ucom4::INT, LineLevel::Assert);
    cpu.step().expect("tit");
    assert!(!cpu.registers().int_flag());
    assert!(cpu.skip_pending());
    cpu.step().expect("skipped li");
    assert_eq!(cpu.registers().acc(), 0);
    assert_eq!(cpu.diagnostics().interrupts, 0);
}

#[test]
fn stack_overflow_drops_the_oldest_return() {
    let mut program = vec![0x00; 0x42];
    program[0x00..0x02].copy_from_slice(&[0xA8, 0x10]); // CAL $010
    program[0x10..0x12].copy_from_slice(&[0xA8, 0x20]); // CAL $020
    program[0x12] = 0x48; // RT
    program[0x20..0x22].copy_from_slice(&[0xA8, 0x30]); // CAL $030
    program[0x22] = 0x48;
    program[0x30..0x32].copy_from_slice(&[0xA8, 0x40]); // CAL $040
    program[0x32] = 0x48;
    program[0x40] = 0x48;
    let (mut cpu, _) = build(Ucom4Variant::Upd553, &program);
    for _ in 0..4 {
        cpu.step().expect("cal");
    }
    assert_eq!(cpu.registers().stack(), [0x032, 0x022, 0x012]);
    let mut returns = Vec::new();
    for _ in 0..4 {
        cpu.step().expect("rt");
        returns.push(cpu.registers().pc());
    }
    assert_eq!(returns, vec![0x032, 0x022, 0x012, 0x012]);
}

#[test]
fn timer_flag_is_seen_by_ttm_after_expiry() {
    // STM $80; loop: TTM; JCP loop; NOP
    let (mut cpu, _) = build(Ucom4Variant::Upd553, &[0x14, 0x80, 0x05, 0xC2, 0x00]);
    let mut steps = 0;
    while cpu.registers().pc() != 4 {
        cpu.step().expect("step");
        steps += 1;
        assert!(steps < 200, "timer never fired");
    }
    assert!(cpu.registers().timer_flag());
    assert_eq!(cpu.timer_remaining(), None);
    assert_eq!(cpu.total_cycles(), 66);
}

#[test]
fn ucom43_extensions_follow_the_policy_on_ucom44() {
    // STM $80 keeps its length; EI is a single byte.
    let (mut lenient, _) = build(Ucom4Variant::Upd552, &[0x14, 0x80, 0x31, 0x00]);
    assert_eq!(
        lenient.step(),
        Ok(StepOutcome::Retired { pc: 0, cycles: 2 })
    );
    assert_eq!(lenient.timer_remaining(), None);
    lenient.step().expect("ei as nop");
    assert_eq!(lenient.registers().pc(), 3);
    assert_eq!(lenient.diagnostics().illegal_opcodes, 2);

    let config = Ucom4Config {
        core: Ucom4Config::new(Ucom4Variant::Upd552)
            .core
            .with_illegal_opcode_policy(IllegalOpcodePolicy::Fatal),
        ..Ucom4Config::new(Ucom4Variant::Upd552)
    };
    let pins = Pins::default();
    let mut strict = build_with(
        config,
        &program_image(Ucom4Variant::Upd552, &[0x31]),
        &pins,
    );
    let fault = Fault::IllegalOpcode { pc: 0, opcode: 0x31 };
    assert_eq!(strict.step(), Err(fault));
    assert_eq!(strict.exec_state(), ExecState::FaultLatched(fault));
    assert_eq!(strict.execute_run(10), Err(fault));
    strict.reset();
    assert_eq!(strict.exec_state(), ExecState::Fetching);
}

#[rstest]
#[case::tc_after_stc(&[0x1B, 0x04], 2, true)]
#[case::tc_after_clc(&[0x0B, 0x04], 2, false)]
#[case::ci_match(&[0x95, 0x17, 0xC5], 2, true)]
#[case::ci_mismatch(&[0x95, 0x17, 0xC6], 2, false)]
#[case::inc_wraps(&[0x9F, 0x0D], 2, true)]
#[case::dec_wraps(&[0x90, 0x0F], 2, true)]
#[case::tab_set(&[0x98, 0x27], 2, true)]
#[case::tab_clear(&[0x97, 0x27], 2, false)]
#[case::ads_carry(&[0x99, 0x02, 0x99, 0x09], 4, true)]
fn skip_conditions(#[case] program: &[u8], #[case] steps: usize, #[case] skip: bool) {
    let (mut cpu, _) = build(Ucom4Variant::Upd553, program);
    for _ in 0..steps {
        cpu.step().expect("step");
    }
    assert_eq!(cpu.skip_pending(), skip);
}

#[test]
fn listing_resolves_page_relative_targets() {
    let program = [0x15, 0x10, 0x97, 0x3C, 0xC2];
    let image = program_image(Ucom4Variant::Upd553, &program);
    let (cpu, _) = build(Ucom4Variant::Upd553, &program);
    let listing: Vec<String> = disassemble_range(&cpu, 0, 4, |address| image[address as usize])
        .iter()
        .map(ToString::to_string)
        .collect();
    assert_eq!(
        listing,
        vec![
            "0000: 15 10    LDI $10",
            "0002: 97       LI $7",
            "0003: 3C       XMI 0",
            "0004: C2       JCP $002",
        ]
    );
}

// GENFLAGS bits the tests preload: TIMER, CS, C.
const TIMER_CS_C: u64 = 0x07;

#[rstest]
#[case::ad(0x08, 0x00)]
#[case::ads(0x09, 0x01)]
#[case::adc(0x19, 0x01)]
#[case::rar(0x30, 0x01)]
#[case::stc(0x1B, 0x01)]
#[case::clc(0x0B, 0x01)]
#[case::xc(0x1A, 0x03)]
fn untouched_flags_survive(
    #[case] opcode: u8,
    #[case] written: u64,
    #[values(TIMER_CS_C, 0x00)] preset: u64,
) {
    let (mut cpu, _) = build(Ucom4Variant::Upd553, &[opcode]);
    cpu.state_set(StateIndex::GENFLAGS, preset).expect("flags");
    cpu.step().expect("step");
    let flags = cpu.state_get(StateIndex::GENFLAGS).expect("flags");
    let kept = TIMER_CS_C & !written;
    assert_eq!(flags & kept, preset & kept, "flags {}", cpu.flags_string());
}

#[test]
fn xc_swaps_carry_with_its_save() {
    let (mut cpu, _) = build(Ucom4Variant::Upd553, &[0x1A, 0x1A]);
    cpu.registers_mut().set_carry(true);
    cpu.step().expect("xc");
    assert!(!cpu.registers().carry());
    assert!(cpu.registers().carry_save());
    cpu.step().expect("xc");
    assert!(cpu.registers().carry());
    assert!(!cpu.registers().carry_save());
}

#[test]
fn reset_line_holds_ports_low_and_drops_pending_edges() {
    // LI 9; OE; NOP
    let (mut cpu, pins) = build(Ucom4Variant::Upd552, &[0x99, 0x44, 0x00]);
    cpu.step().expect("li");
    cpu.step().expect("oe");
    assert_eq!(cpu.registers().port_out(ucom4::registers::PORT_E), 0x9);
    pins.writes.borrow_mut().clear();

    cpu.set_line(ucom4::INT, LineLevel::Assert);
    cpu.set_line(ucom4::RESET, LineLevel::Assert);
    for _ in 0..3 {
        assert!(matches!(cpu.step(), Ok(StepOutcome::Idle { .. })));
        assert_eq!(cpu.exec_state(), ExecState::Idle);
    }
    assert_eq!(cpu.diagnostics().instructions, 0);
    let ports: Vec<u32> = pins.writes.borrow().iter().map(|&(port, _)| port).collect();
    assert_eq!(ports, vec![2, 3, 4, 5, 6, 7, 8]);
    assert!(pins.writes.borrow().iter().all(|&(_, value)| value == 0));
    for port in ucom4::registers::PORT_C..=8 {
        assert_eq!(cpu.registers().port_out(port), 0, "port {port}");
    }

    cpu.set_line(ucom4::RESET, LineLevel::Clear);
    assert!(cpu.registers().int_enable());
    assert_eq!(
        cpu.step(),
        Ok(StepOutcome::Retired { pc: 0, cycles: 1 })
    );
    assert!(!cpu.registers().int_flag());
    assert_eq!(cpu.diagnostics().interrupts, 0);
}

#[test]
fn fatal_hole_leaves_timer_and_cycles_untouched() {
    let config = Ucom4Config {
        core: Ucom4Config::new(Ucom4Variant::Upd553)
            .core
            .with_illegal_opcode_policy(IllegalOpcodePolicy::Fatal),
        ..Ucom4Config::new(Ucom4Variant::Upd553)
    };
    let pins = Pins::default();
    // STM $80; hole
    let mut cpu = build_with(
        config,
        &program_image(Ucom4Variant::Upd553, &[0x14, 0x80, 0x1C]),
        &pins,
    );
    cpu.step().expect("stm");
    let timer = cpu.timer_remaining();
    let cycles = cpu.total_cycles();
    assert!(timer.is_some());
    assert_eq!(
        cpu.step(),
        Err(Fault::IllegalOpcode { pc: 2, opcode: 0x1C })
    );
    assert_eq!(cpu.timer_remaining(), timer);
    assert_eq!(cpu.total_cycles(), cycles);
    assert_eq!(cpu.diagnostics().illegal_opcodes, 1);
}

#[test]
fn running_timer_is_restored_from_state() {
    // STM $80; NOP
    let (mut cpu, _) = build(Ucom4Variant::Upd553, &[0x14, 0x80, 0x00]);
    cpu.step().expect("stm");
    let left = cpu.state_get(STATE_TIMER_COUNT).expect("timer");
    assert_eq!(Some(left as u32), cpu.timer_remaining());

    let (mut copy, _) = build(Ucom4Variant::Upd553, &[0x14, 0x80, 0x00]);
    for entry in cpu.state_entries().to_vec() {
        let value = cpu.state_get(entry.index).expect("entry");
        copy.state_set(entry.index, value).expect("entry");
    }
    assert_eq!(copy.timer_remaining(), cpu.timer_remaining());
    copy.step().expect("nop");
    cpu.step().expect("nop");
    assert_eq!(copy.timer_remaining(), cpu.timer_remaining());

    copy.state_set(STATE_TIMER_COUNT, 0).expect("timer");
    assert_eq!(copy.timer_remaining(), None);
}
