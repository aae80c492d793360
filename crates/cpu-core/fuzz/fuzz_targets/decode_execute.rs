#![no_main]

use cpu_core::{
    disassemble_range, AddressMap, CpuCore, IllegalOpcodePolicy, InputLine, LineLevel, Sm83,
    Sm83Config, SpaceConfig, Ucom4, Ucom4Config, Ucom4Variant,
};
use libfuzzer_sys::fuzz_target;

const VARIANTS: [Ucom4Variant; 5] = [
    Ucom4Variant::Upd546,
    Ucom4Variant::Upd553,
    Ucom4Variant::Upd557l,
    Ucom4Variant::Upd650,
    Ucom4Variant::Upd552,
];

fn sm83(image: &[u8]) -> Option<Sm83> {
    let mut map = AddressMap::new(SpaceConfig::new("program", 16, 8)).ok()?;
    map.map_ram(0x0000, 0xFFFE).ok()?;
    map.load(0x0000, image);
    let config = Sm83Config {
        core: Sm83Config::default()
            .core
            .with_illegal_opcode_policy(IllegalOpcodePolicy::Nop),
        ..Sm83Config::default()
    };
    Sm83::new(config, Box::new(map)).ok()
}

fn ucom4(variant: Ucom4Variant, image: &[u8]) -> Option<Ucom4> {
    let layout = variant.layout();
    let mut rom = AddressMap::new(SpaceConfig::new("program", layout.prg_width, 8)).ok()?;
    let len = image.len().min(1 << layout.prg_width);
    rom.map_rom(0, &image[..len]).ok()?;
    let mut ram = AddressMap::new(SpaceConfig::new("data", layout.data_width, 4)).ok()?;
    ram.map_ram(0, u32::from(layout.data_mask())).ok()?;
    let io = AddressMap::new(SpaceConfig::new("io", 4, 4)).ok()?;
    let config = Ucom4Config {
        core: Ucom4Config::new(variant)
            .core
            .with_illegal_opcode_policy(IllegalOpcodePolicy::Nop),
        ..Ucom4Config::new(variant)
    };
    Ucom4::new(config, Box::new(rom), Box::new(ram), Box::new(io)).ok()
}

fn exercise(core: &mut dyn CpuCore, lines: u8, image: &[u8]) {
    let count = core.input_lines().len();
    for step in 0..64u8 {
        if count > 0 && lines & (1 << (step % 8)) != 0 {
            let line = InputLine(step % u8::try_from(count).unwrap_or(1));
            core.set_line(line, LineLevel::Assert);
        }
        if core.step().is_err() {
            break;
        }
    }
    let _ = core.execute_run(256);
    for entry in core.state_entries().to_vec() {
        if let Some(value) = core.state_get(entry.index) {
            let _ = core.state_set(entry.index, value);
        }
    }
    let _ = disassemble_range(&*core, 0, 16, |address| {
        image.get(address as usize).copied().unwrap_or(0)
    });
}

fuzz_target!(|data: &[u8]| {
    if data.len() < 2 {
        return;
    }
    let lines = data[0];
    let image = &data[1..];

    if let Some(mut cpu) = sm83(image) {
        exercise(&mut cpu, lines, image);
    }
    let variant = VARIANTS[usize::from(lines) % VARIANTS.len()];
    if let Some(mut cpu) = ucom4(variant, image) {
        exercise(&mut cpu, lines, image);
    }
});
